use std::future::Future;
use std::time::Duration;

use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::task::TaskHandle;

/// When the first tick of a [`every`] timer fires.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FirstTick {
    /// Fire as soon as the task is scheduled, then every period.
    Immediate,
    /// Wait one full period before the first tick.
    AfterPeriod,
}

/// Spawn a fixed-period timer that awaits `tick` on every firing.
///
/// Ticks of one timer never overlap: a slow tick delays the next one instead
/// of stacking up. The returned handle cancels the timer, including an
/// in-flight tick, when aborted or dropped.
pub fn every<F, Fut>(name: &'static str, period: Duration, first: FirstTick, mut tick: F) -> TaskHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let start = match first {
        FirstTick::Immediate => Instant::now(),
        FirstTick::AfterPeriod => Instant::now() + period,
    };
    TaskHandle::spawn(name, async move {
        let mut timer = interval_at(start, period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            timer.tick().await;
            tick().await;
        }
    })
}
