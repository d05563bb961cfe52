//! Composition root tying the components together.
//!
//! The publisher's fix channel feeds the planner and follow mode; the
//! poller's roster channel feeds the planner and center-on-all. Sharing and
//! polling are independent, so a failed start never stops the roster.

use std::sync::Arc;

use runtime::Metrics;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::backend::{HttpPresenceBackend, PresenceBackend};
use crate::config::WidgetConfig;
use crate::error::{AcquireError, ConfigError, NavigationError};
use crate::geolocation::GeolocationProvider;
use crate::model::MyLocation;
use crate::navigation::{NavigationState, RoutePlanner};
use crate::notice::NoticeBus;
use crate::poller::{PresencePoller, Roster};
use crate::publisher::{PresencePublisher, StartOutcome};
use crate::routing::{OsrmRouter, RoutingService};
use crate::view::{CameraCommand, MapViewController, MapViewState};

pub struct PresenceWidget {
    config: WidgetConfig,
    publisher: PresencePublisher,
    poller: PresencePoller,
    planner: RoutePlanner,
    view: Arc<MapViewController>,
    notices: Arc<NoticeBus>,
    metrics: Arc<Metrics>,
}

impl PresenceWidget {
    pub fn new(
        config: WidgetConfig,
        backend: Arc<dyn PresenceBackend>,
        router: Arc<dyn RoutingService>,
        provider: Arc<dyn GeolocationProvider>,
    ) -> Self {
        let notices = Arc::new(NoticeBus::new());
        let metrics = Arc::new(Metrics::new());
        let view = Arc::new(MapViewController::new(config.initial_view()));

        let publisher = PresencePublisher::new(
            backend.clone(),
            provider,
            config.acquisition(),
            config.publisher_options(),
            notices.clone(),
            metrics.clone(),
        );
        let poller = PresencePoller::new(
            backend,
            config.participant_id.clone(),
            config.poll_interval(),
            view.clone(),
            metrics.clone(),
        );
        let planner = RoutePlanner::new(
            router,
            publisher.subscribe_fix(),
            poller.subscribe(),
            config.route_refresh(),
            notices.clone(),
            metrics.clone(),
        );

        Self {
            config,
            publisher,
            poller,
            planner,
            view,
            notices,
            metrics,
        }
    }

    /// Build against the HTTP presence backend and an OSRM router.
    pub fn connect(
        config: WidgetConfig,
        provider: Arc<dyn GeolocationProvider>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;
        let backend = HttpPresenceBackend::new(http.clone(), &config.presence_url)
            .with_participant(&config.participant_id)
            .with_token(config.token.clone());
        let router =
            OsrmRouter::new(http, &config.routing_url).with_profile(&config.routing_profile);
        Ok(Self::new(config, Arc::new(backend), Arc::new(router), provider))
    }

    pub fn config(&self) -> &WidgetConfig {
        &self.config
    }

    /// Begin polling the roster. Sharing is started separately.
    pub fn start(&self) -> bool {
        let started = self.poller.start();
        if started {
            info!(participant = %self.config.participant_id, "presence widget started");
        }
        started
    }

    pub async fn start_sharing(&self) -> Result<StartOutcome, AcquireError> {
        self.publisher.start_sharing().await
    }

    pub async fn stop_sharing(&self) -> bool {
        self.publisher.stop_sharing().await
    }

    pub fn is_sharing(&self) -> bool {
        self.publisher.is_sharing()
    }

    pub fn my_location(&self) -> Option<MyLocation> {
        self.publisher.my_location()
    }

    pub fn roster(&self) -> Roster {
        self.poller.roster()
    }

    pub fn subscribe_roster(&self) -> watch::Receiver<Roster> {
        self.poller.subscribe()
    }

    pub fn start_navigation(&self, target_id: &str) -> Result<(), NavigationError> {
        self.planner.start_navigation(target_id)
    }

    pub fn stop_navigation(&self) {
        self.planner.stop_navigation();
    }

    pub fn navigation(&self) -> NavigationState {
        self.planner.state()
    }

    pub fn subscribe_navigation(&self) -> watch::Receiver<NavigationState> {
        self.planner.subscribe()
    }

    pub fn center_on_me(&self) -> bool {
        self.view.center_on_me(self.publisher.my_location().as_ref())
    }

    pub fn center_on_all(&self) -> bool {
        let me = self.publisher.my_location();
        self.view
            .center_on_all(me.as_ref(), &self.poller.roster().participants)
    }

    pub fn set_follow(&self, enabled: bool) {
        self.view.set_follow(enabled, self.publisher.subscribe_fix());
    }

    pub fn is_following(&self) -> bool {
        self.view.is_following()
    }

    pub fn user_moved(&self, state: MapViewState) {
        self.view.user_moved(state.center, state.zoom);
    }

    pub fn camera(&self) -> MapViewState {
        self.view.state()
    }

    pub fn take_camera_commands(&self) -> Option<mpsc::UnboundedReceiver<CameraCommand>> {
        self.view.take_commands()
    }

    pub fn notices(&self) -> Arc<NoticeBus> {
        self.notices.clone()
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        self.metrics.clone()
    }

    /// Release every timer and subscription and remove the published fix.
    pub async fn shutdown(&self) {
        self.release_local();
        self.publisher.stop_sharing().await;
        info!("presence widget shut down");
    }

    fn release_local(&self) {
        self.planner.stop_navigation();
        self.view.stop_follow();
        self.poller.stop();
    }
}

impl Drop for PresenceWidget {
    fn drop(&mut self) {
        self.release_local();
        if !self.publisher.halt() {
            return;
        }
        // Still sharing at teardown: the fix is owed a removal call.
        let backend = self.publisher.backend();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(err) = backend.remove().await {
                        warn!("removing published position on teardown failed: {err}");
                    }
                });
            }
            Err(_) => debug!("no runtime at teardown, published position left to expire"),
        }
    }
}
