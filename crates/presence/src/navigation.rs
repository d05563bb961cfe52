//! Walking navigation to one chosen participant.
//!
//! At most one refresh timer is alive: choosing a new target releases the
//! previous timer before the next one is created. Every tick re-reads the
//! latest self fix and roster and replaces the route wholesale.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use foundation::LatLng;
use parking_lot::Mutex;
use runtime::{every, FirstTick, Metrics, Slot};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::{NavigationError, RoutingError};
use crate::model::{MyLocation, RouteInfo};
use crate::notice::{Notice, NoticeBus};
use crate::poller::Roster;
use crate::routing::{RouteOutcome, RoutingService};

pub const ROUTE_REFRESH_PERIOD: Duration = Duration::from_secs(10);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum RouteStatus {
    #[default]
    Idle,
    /// Target chosen, first answer pending.
    Computing,
    Ready,
    /// The service found no path or could not be reached. The timer keeps
    /// retrying.
    Unavailable,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NavigationState {
    pub target: Option<String>,
    pub route: Option<RouteInfo>,
    pub status: RouteStatus,
}

/// One navigation target. Ticks carry it so a result for a replaced target
/// can be recognized and dropped.
struct Leg {
    generation: u64,
    target_id: String,
    /// Used when the target drops off the roster mid-navigation.
    last_target: Mutex<LatLng>,
}

struct PlanShared {
    router: Arc<dyn RoutingService>,
    fixes: watch::Receiver<Option<MyLocation>>,
    roster: watch::Receiver<Roster>,
    state: watch::Sender<NavigationState>,
    /// Upper bound on one routing call; a request that outlives it counts
    /// as a failure and the next tick retries.
    deadline: Duration,
    generation: AtomicU64,
    notices: Arc<NoticeBus>,
    metrics: Arc<Metrics>,
}

impl PlanShared {
    async fn tick(&self, leg: &Leg) {
        let me = *self.fixes.borrow();
        let Some(me) = me else {
            debug!(participant = %leg.target_id, "no own fix, skipping route refresh");
            return;
        };
        let target = {
            let roster = self.roster.borrow();
            let mut last = leg.last_target.lock();
            if let Some(p) = roster.find(&leg.target_id) {
                *last = p.position();
            }
            *last
        };

        let answer = tokio::time::timeout(self.deadline, self.router.route(me.position(), target))
            .await
            .unwrap_or(Err(RoutingError::Timeout(self.deadline)));
        let (route, status, reason) = match answer {
            Ok(RouteOutcome::Route(route)) => {
                self.metrics.inc("route.ok");
                (Some(route), RouteStatus::Ready, None)
            }
            Ok(RouteOutcome::NoRoute { reason }) => {
                self.metrics.inc("route.none");
                (None, RouteStatus::Unavailable, Some(reason))
            }
            Err(err) => {
                self.metrics.inc("route.failed");
                warn!(participant = %leg.target_id, "route request failed: {err}");
                (None, RouteStatus::Unavailable, Some(err.to_string()))
            }
        };

        let mut previous = RouteStatus::Idle;
        let applied = self.state.send_if_modified(|state| {
            if self.generation.load(Ordering::SeqCst) != leg.generation {
                return false;
            }
            previous = state.status;
            state.route = route;
            state.status = status;
            true
        });
        if !applied {
            debug!(participant = %leg.target_id, "dropping route for a replaced target");
            return;
        }
        if let Some(reason) = reason {
            if previous != RouteStatus::Unavailable {
                self.notices.emit(Notice::RouteUnavailable {
                    target: leg.target_id.clone(),
                    reason,
                });
            }
        }
    }
}

pub struct RoutePlanner {
    shared: Arc<PlanShared>,
    period: Duration,
    timer: Mutex<Slot>,
}

impl RoutePlanner {
    pub fn new(
        router: Arc<dyn RoutingService>,
        fixes: watch::Receiver<Option<MyLocation>>,
        roster: watch::Receiver<Roster>,
        period: Duration,
        notices: Arc<NoticeBus>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let (state, _) = watch::channel(NavigationState::default());
        Self {
            shared: Arc::new(PlanShared {
                router,
                fixes,
                roster,
                state,
                deadline: period,
                generation: AtomicU64::new(0),
                notices,
                metrics,
            }),
            period,
            timer: Mutex::new(Slot::new()),
        }
    }

    /// Navigate to `target_id`. The first route request is issued right away
    /// on the refresh timer's immediate tick.
    pub fn start_navigation(&self, target_id: &str) -> Result<(), NavigationError> {
        if self.shared.fixes.borrow().is_none() {
            return Err(NavigationError::NoSelfFix);
        }
        let target = self
            .shared
            .roster
            .borrow()
            .find(target_id)
            .map(|p| p.position())
            .ok_or_else(|| NavigationError::UnknownTarget(target_id.to_string()))?;

        let mut timer = self.timer.lock();
        if timer.release() {
            debug!("released previous route timer");
        }
        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.shared.state.send_replace(NavigationState {
            target: Some(target_id.to_string()),
            route: None,
            status: RouteStatus::Computing,
        });

        let leg = Arc::new(Leg {
            generation,
            target_id: target_id.to_string(),
            last_target: Mutex::new(target),
        });
        let shared = self.shared.clone();
        timer.replace(every(
            "route-refresh",
            self.period,
            FirstTick::Immediate,
            move || {
                let shared = shared.clone();
                let leg = leg.clone();
                async move { shared.tick(&leg).await }
            },
        ));
        info!(participant = target_id, "navigation started");
        Ok(())
    }

    /// Drop the timer and the route. Safe to call at any time.
    pub fn stop_navigation(&self) {
        let released = self.timer.lock().release();
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
        self.shared.state.send_replace(NavigationState::default());
        if released {
            info!("navigation stopped");
        }
    }

    pub fn state(&self) -> NavigationState {
        self.shared.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<NavigationState> {
        self.shared.state.subscribe()
    }

    pub fn is_refreshing(&self) -> bool {
        self.timer.lock().is_occupied()
    }
}
