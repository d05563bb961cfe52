//! Roster polling.
//!
//! Runs on a fixed interval whether or not the caller shares its own
//! position. Each successful tick replaces the roster wholesale; there is no
//! merge, so staleness is bounded by one interval.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use foundation::LatLng;
use parking_lot::Mutex;
use runtime::{every, FirstTick, Metrics, Slot};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::backend::PresenceBackend;
use crate::error::BackendError;
use crate::protocol::{LocationsResponse, UserLocation};
use crate::view::{CameraReason, MapViewController};

pub const POLL_PERIOD: Duration = Duration::from_secs(3);

/// Other participants' last known fixes plus the viewer's permissions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Roster {
    /// Never contains the caller's own participant id.
    pub participants: Vec<UserLocation>,
    pub user_site: Option<String>,
    pub is_admin: bool,
    pub can_share: bool,
}

impl Roster {
    pub fn from_response(resp: LocationsResponse, self_id: &str) -> Self {
        Self {
            participants: exclude_self(resp.locations, self_id),
            user_site: resp.user_site,
            is_admin: resp.is_admin,
            can_share: resp.can_share,
        }
    }

    pub fn find(&self, participant_id: &str) -> Option<&UserLocation> {
        self.participants
            .iter()
            .find(|p| p.participant_id == participant_id)
    }

    pub fn positions(&self) -> Vec<LatLng> {
        self.participants.iter().map(UserLocation::position).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }
}

pub fn exclude_self(locations: Vec<UserLocation>, self_id: &str) -> Vec<UserLocation> {
    locations
        .into_iter()
        .filter(|l| l.participant_id != self_id)
        .collect()
}

struct PollShared {
    backend: Arc<dyn PresenceBackend>,
    self_id: String,
    /// Upper bound on one listing call, so a hung request cannot stall the
    /// timer past its next tick.
    deadline: Duration,
    roster: watch::Sender<Roster>,
    /// Set until the first non-empty roster has centered the camera.
    first_load: AtomicBool,
    view: Arc<MapViewController>,
    metrics: Arc<Metrics>,
}

impl PollShared {
    async fn tick(&self) -> Result<usize, BackendError> {
        let listed = tokio::time::timeout(self.deadline, self.backend.list())
            .await
            .unwrap_or(Err(BackendError::Timeout(self.deadline)));
        let resp = match listed {
            Ok(resp) => resp,
            Err(err) => {
                self.metrics.inc("poll.failed");
                warn!("polling locations failed: {err}");
                return Err(err);
            }
        };
        self.metrics.inc("poll.ok");

        let roster = Roster::from_response(resp, &self.self_id);
        let count = roster.participants.len();
        let points = roster.positions();
        self.roster.send_replace(roster);
        debug!(participants = count, "roster replaced");

        if count > 0 && self.first_load.swap(false, Ordering::SeqCst) {
            info!(participants = count, "centering on first roster");
            self.view.frame_points(&points, CameraReason::FirstLoad);
        }
        Ok(count)
    }
}

pub struct PresencePoller {
    shared: Arc<PollShared>,
    period: Duration,
    timer: Mutex<Slot>,
}

impl PresencePoller {
    pub fn new(
        backend: Arc<dyn PresenceBackend>,
        self_id: impl Into<String>,
        period: Duration,
        view: Arc<MapViewController>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let (roster, _) = watch::channel(Roster::default());
        Self {
            shared: Arc::new(PollShared {
                backend,
                self_id: self_id.into(),
                deadline: period,
                roster,
                first_load: AtomicBool::new(true),
                view,
                metrics,
            }),
            period,
            timer: Mutex::new(Slot::new()),
        }
    }

    /// Start the poll timer; the first tick runs immediately. Returns false
    /// if it was already running.
    pub fn start(&self) -> bool {
        let shared = self.shared.clone();
        let period = self.period;
        self.timer.lock().acquire_with(move || {
            every("roster-poll", period, FirstTick::Immediate, move || {
                let shared = shared.clone();
                async move {
                    let _ = shared.tick().await;
                }
            })
        })
    }

    pub fn stop(&self) -> bool {
        self.timer.lock().release()
    }

    pub fn is_running(&self) -> bool {
        self.timer.lock().is_occupied()
    }

    /// Run one poll outside the timer. Returns the number of other
    /// participants on success.
    pub async fn poll_once(&self) -> Result<usize, BackendError> {
        self.shared.tick().await
    }

    pub fn roster(&self) -> Roster {
        self.shared.roster.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Roster> {
        self.shared.roster.subscribe()
    }
}
