//! In-memory fakes for the provider, backend and router seams.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use foundation::LatLng;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::error::{BackendError, RoutingError};
use crate::geolocation::{
    GeolocationProvider, Position, PositionError, PositionOptions, PositionWatch,
};
use crate::model::{RouteInfo, RouteStep};
use crate::protocol::{LocationsResponse, PublishLocation, UserLocation};
use crate::routing::{RouteOutcome, RoutingService};
use crate::BoxFuture;

pub(crate) struct ScriptedProvider {
    script: Mutex<VecDeque<Result<Position, PositionError>>>,
    fallback: Mutex<Option<Result<Position, PositionError>>>,
    hang: bool,
    requested: Mutex<Vec<PositionOptions>>,
    watch_tx: Mutex<Option<mpsc::Sender<Result<Position, PositionError>>>>,
    watches_opened: AtomicUsize,
}

impl ScriptedProvider {
    pub(crate) fn new(script: impl IntoIterator<Item = Result<Position, PositionError>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            fallback: Mutex::new(None),
            hang: false,
            requested: Mutex::new(Vec::new()),
            watch_tx: Mutex::new(None),
            watches_opened: AtomicUsize::new(0),
        }
    }

    /// Always succeeds with `position`.
    pub(crate) fn steady(position: Position) -> Self {
        let p = Self::new([]);
        *p.fallback.lock() = Some(Ok(position));
        p
    }

    /// Never answers.
    pub(crate) fn hanging() -> Self {
        Self {
            hang: true,
            ..Self::new([])
        }
    }

    pub(crate) fn set_fallback(&self, value: Result<Position, PositionError>) {
        *self.fallback.lock() = Some(value);
    }

    pub(crate) fn request_count(&self) -> usize {
        self.requested.lock().len()
    }

    pub(crate) fn requested_options(&self) -> Vec<PositionOptions> {
        self.requested.lock().clone()
    }

    pub(crate) fn watches_opened(&self) -> usize {
        self.watches_opened.load(Ordering::SeqCst)
    }

    /// True when no watch is open or its receiver has been dropped.
    pub(crate) fn watch_closed(&self) -> bool {
        self.watch_tx.lock().as_ref().is_none_or(|tx| tx.is_closed())
    }

    pub(crate) fn push_watch(&self, value: Result<Position, PositionError>) -> bool {
        match self.watch_tx.lock().as_ref() {
            Some(tx) => tx.try_send(value).is_ok(),
            None => false,
        }
    }
}

impl GeolocationProvider for ScriptedProvider {
    fn current_position(
        &self,
        options: PositionOptions,
    ) -> BoxFuture<'_, Result<Position, PositionError>> {
        self.requested.lock().push(options);
        if self.hang {
            return Box::pin(std::future::pending::<Result<Position, PositionError>>());
        }
        let next = self
            .script
            .lock()
            .pop_front()
            .or_else(|| self.fallback.lock().clone())
            .unwrap_or_else(|| Err(PositionError::unavailable()));
        Box::pin(async move { next })
    }

    fn watch_position(&self, _options: PositionOptions) -> PositionWatch {
        let (tx, rx) = mpsc::channel(16);
        *self.watch_tx.lock() = Some(tx);
        self.watches_opened.fetch_add(1, Ordering::SeqCst);
        rx
    }
}

#[derive(Default)]
pub(crate) struct FakeBackend {
    listing: Mutex<LocationsResponse>,
    fail_list: AtomicBool,
    stall_list: AtomicBool,
    fail_publish: AtomicBool,
    publish_delay: Mutex<Option<Duration>>,
    published: Mutex<Vec<PublishLocation>>,
    /// Whether the store currently holds the caller's fix.
    stored: AtomicBool,
    lists: AtomicUsize,
    removes: AtomicUsize,
}

impl FakeBackend {
    pub(crate) fn with_locations(locations: Vec<UserLocation>) -> Self {
        let backend = Self::default();
        backend.set_locations(locations);
        backend
    }

    pub(crate) fn set_locations(&self, locations: Vec<UserLocation>) {
        self.listing.lock().locations = locations;
    }

    pub(crate) fn set_fail_list(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }

    /// The next listing call never answers.
    pub(crate) fn stall_next_list(&self) {
        self.stall_list.store(true, Ordering::SeqCst);
    }

    pub(crate) fn set_fail_publish(&self, fail: bool) {
        self.fail_publish.store(fail, Ordering::SeqCst);
    }

    /// Publishes land only after `delay`.
    pub(crate) fn set_publish_delay(&self, delay: Duration) {
        *self.publish_delay.lock() = Some(delay);
    }

    pub(crate) fn published(&self) -> Vec<PublishLocation> {
        self.published.lock().clone()
    }

    pub(crate) fn holds_fix(&self) -> bool {
        self.stored.load(Ordering::SeqCst)
    }

    pub(crate) fn list_calls(&self) -> usize {
        self.lists.load(Ordering::SeqCst)
    }

    pub(crate) fn remove_calls(&self) -> usize {
        self.removes.load(Ordering::SeqCst)
    }
}

impl crate::backend::PresenceBackend for FakeBackend {
    fn list(&self) -> BoxFuture<'_, Result<LocationsResponse, BackendError>> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        if self.stall_list.swap(false, Ordering::SeqCst) {
            return Box::pin(std::future::pending::<Result<LocationsResponse, BackendError>>());
        }
        let result = if self.fail_list.load(Ordering::SeqCst) {
            Err(BackendError::Status { status: 503 })
        } else {
            Ok(self.listing.lock().clone())
        };
        Box::pin(async move { result })
    }

    fn publish(&self, fix: PublishLocation) -> BoxFuture<'_, Result<(), BackendError>> {
        let delay = *self.publish_delay.lock();
        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_publish.load(Ordering::SeqCst) {
                return Err(BackendError::Status { status: 502 });
            }
            self.published.lock().push(fix);
            self.stored.store(true, Ordering::SeqCst);
            Ok(())
        })
    }

    fn remove(&self) -> BoxFuture<'_, Result<(), BackendError>> {
        self.removes.fetch_add(1, Ordering::SeqCst);
        self.stored.store(false, Ordering::SeqCst);
        Box::pin(async { Ok(()) })
    }
}

pub(crate) struct FakeRouter {
    script: Mutex<VecDeque<Result<RouteOutcome, RoutingError>>>,
    stall: AtomicBool,
    calls: Mutex<Vec<(LatLng, LatLng)>>,
}

impl FakeRouter {
    pub(crate) fn new(script: impl IntoIterator<Item = Result<RouteOutcome, RoutingError>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            stall: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// The next route request never answers.
    pub(crate) fn stall_next(&self) {
        self.stall.store(true, Ordering::SeqCst);
    }

    pub(crate) fn calls(&self) -> Vec<(LatLng, LatLng)> {
        self.calls.lock().clone()
    }
}

impl RoutingService for FakeRouter {
    /// Scripted outcomes first; afterwards a straight two-point route.
    fn route(&self, from: LatLng, to: LatLng) -> BoxFuture<'_, Result<RouteOutcome, RoutingError>> {
        self.calls.lock().push((from, to));
        if self.stall.swap(false, Ordering::SeqCst) {
            return Box::pin(std::future::pending::<Result<RouteOutcome, RoutingError>>());
        }
        let next = self
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(RouteOutcome::Route(straight_route(from, to))));
        Box::pin(async move { next })
    }
}

pub(crate) fn straight_route(from: LatLng, to: LatLng) -> RouteInfo {
    let distance = foundation::haversine_m(from, to);
    RouteInfo {
        coordinates: vec![from, to],
        distance,
        duration: distance / 1.4,
        steps: vec![
            RouteStep {
                instruction: "Head out".to_string(),
                distance,
                duration: distance / 1.4,
                maneuver: "depart".to_string(),
            },
            RouteStep {
                instruction: "Arrive at destination".to_string(),
                distance: 0.0,
                duration: 0.0,
                maneuver: "arrive".to_string(),
            },
        ],
    }
}

pub(crate) fn user_location(participant_id: &str, lat: f64, lng: f64) -> UserLocation {
    UserLocation {
        id: format!("loc-{participant_id}"),
        participant_id: participant_id.to_string(),
        participant_name: participant_id.to_uppercase(),
        avatar_url: None,
        team_name: None,
        latitude: lat,
        longitude: lng,
        site_name: "HQ".to_string(),
        updated_at: "2026-10-18T09:00:00Z".to_string(),
    }
}

/// Let spawned tasks run until they block.
pub(crate) async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}
