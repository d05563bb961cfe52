use std::collections::BTreeMap;

use parking_lot::Mutex;

/// Shared counters for background activity (publishes, polls, route requests).
///
/// Snapshots use sorted maps so their ordering is stable.
#[derive(Debug, Default)]
pub struct Metrics {
    counters: Mutex<BTreeMap<&'static str, u64>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc(&self, name: &'static str) {
        self.add(name, 1);
    }

    pub fn add(&self, name: &'static str, by: u64) {
        *self.counters.lock().entry(name).or_insert(0) += by;
    }

    pub fn counter(&self, name: &str) -> u64 {
        self.counters.lock().get(name).copied().unwrap_or(0)
    }

    pub fn snapshot(&self) -> Vec<(&'static str, u64)> {
        self.counters
            .lock()
            .iter()
            .map(|(k, v)| (*k, *v))
            .collect()
    }
}
