use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use presence::{PublishLocation, UserLocation};

struct Entry {
    location: UserLocation,
    touched: Instant,
}

/// Last published fix per participant.
///
/// Entries not refreshed within `ttl` are dropped, so a client that vanishes
/// without calling `DELETE /location` disappears from listings on its own.
pub struct PresenceStore {
    entries: Mutex<HashMap<String, Entry>>,
    ttl: Duration,
    site_name: String,
}

impl PresenceStore {
    pub fn new(ttl: Duration, site_name: impl Into<String>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            site_name: site_name.into(),
        }
    }

    pub fn site_name(&self) -> &str {
        &self.site_name
    }

    /// Insert or refresh a participant's fix. The record id survives
    /// refreshes.
    pub fn upsert(
        &self,
        participant_id: &str,
        participant_name: Option<&str>,
        fix: PublishLocation,
        now: Instant,
        stamp: DateTime<Utc>,
    ) -> UserLocation {
        let mut entries = self.entries.lock();
        let updated_at = stamp.to_rfc3339_opts(SecondsFormat::Millis, true);
        let entry = entries
            .entry(participant_id.to_string())
            .or_insert_with(|| Entry {
                location: UserLocation {
                    id: uuid::Uuid::new_v4().to_string(),
                    participant_id: participant_id.to_string(),
                    participant_name: participant_id.to_string(),
                    avatar_url: None,
                    team_name: None,
                    latitude: fix.latitude,
                    longitude: fix.longitude,
                    site_name: self.site_name.clone(),
                    updated_at: updated_at.clone(),
                },
                touched: now,
            });

        if let Some(name) = participant_name.filter(|n| !n.trim().is_empty()) {
            entry.location.participant_name = name.to_string();
        }
        entry.location.latitude = fix.latitude;
        entry.location.longitude = fix.longitude;
        entry.location.updated_at = updated_at;
        entry.touched = now;
        entry.location.clone()
    }

    pub fn remove(&self, participant_id: &str) -> bool {
        self.entries.lock().remove(participant_id).is_some()
    }

    /// Live entries, ordered by participant id. Expired ones are purged.
    pub fn list(&self, now: Instant) -> Vec<UserLocation> {
        let mut entries = self.entries.lock();
        let ttl = self.ttl;
        entries.retain(|_, e| now.saturating_duration_since(e.touched) <= ttl);
        let mut out: Vec<_> = entries.values().map(|e| e.location.clone()).collect();
        out.sort_by(|a, b| a.participant_id.cmp(&b.participant_id));
        out
    }

    pub fn purge_expired(&self, now: Instant) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        let ttl = self.ttl;
        entries.retain(|_, e| now.saturating_duration_since(e.touched) <= ttl);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

pub fn valid_fix(fix: &PublishLocation) -> bool {
    fix.position().is_valid()
}
