//! Camera mediation between automatic moves and user interaction.
//!
//! Camera state lives apart from roster data. Automatic moves are issued as
//! [`CameraCommand`]s on a single-consumer queue: the rendering layer drains
//! it and applies each move exactly once, so re-rendering never re-forces the
//! camera. User pans and zooms only update the recorded state. Until a
//! consumer takes the queue, moves update the state only and nothing queues.

use std::sync::Arc;

use foundation::{centroid, GeoBounds, LatLng};
use parking_lot::Mutex;
use runtime::{Slot, TaskHandle};
use tokio::sync::{mpsc, watch};
use tracing::debug;

use crate::model::MyLocation;
use crate::protocol::UserLocation;

/// Zoom used by center-on-me and follow mode.
pub const ZOOM_CLOSE: f64 = 16.0;
/// Spread above 1°.
pub const ZOOM_REGION: f64 = 8.0;
/// Spread above 0.1°.
pub const ZOOM_CITY: f64 = 11.0;
/// Spread above 0.01°.
pub const ZOOM_DISTRICT: f64 = 13.0;
/// A single point or near-zero spread.
pub const ZOOM_STREET: f64 = 15.0;

/// Pick a zoom tier from the larger of the lat/lng spreads (degrees).
pub fn zoom_for_spread(spread_deg: f64) -> f64 {
    if spread_deg > 1.0 {
        ZOOM_REGION
    } else if spread_deg > 0.1 {
        ZOOM_CITY
    } else if spread_deg > 0.01 {
        ZOOM_DISTRICT
    } else {
        ZOOM_STREET
    }
}

/// Center and zoom that frame `points`, or `None` for an empty set.
pub fn frame(points: &[LatLng]) -> Option<(LatLng, f64)> {
    let center = centroid(points)?;
    let spread = GeoBounds::from_points(points).map_or(0.0, |b| b.max_span());
    Some((center, zoom_for_spread(spread)))
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct MapViewState {
    pub center: LatLng,
    pub zoom: f64,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CameraReason {
    CenterOnMe,
    Follow,
    CenterOnAll,
    FirstLoad,
}

/// Instruction to move the camera once.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CameraCommand {
    pub center: LatLng,
    pub zoom: f64,
    pub reason: CameraReason,
}

struct Camera {
    state: Mutex<MapViewState>,
    /// Present once a consumer has taken the queue.
    commands: Mutex<Option<mpsc::UnboundedSender<CameraCommand>>>,
}

impl Camera {
    fn apply(&self, center: LatLng, zoom: f64, reason: CameraReason) {
        *self.state.lock() = MapViewState { center, zoom };
        debug!(?reason, lat = center.lat, lng = center.lng, zoom, "camera move");
        if let Some(tx) = self.commands.lock().as_ref() {
            let cmd = CameraCommand {
                center,
                zoom,
                reason,
            };
            if tx.send(cmd).is_err() {
                debug!("camera consumer is gone");
            }
        }
    }
}

pub struct MapViewController {
    camera: Arc<Camera>,
    follow: Mutex<Slot>,
}

impl MapViewController {
    pub fn new(initial: MapViewState) -> Self {
        Self {
            camera: Arc::new(Camera {
                state: Mutex::new(initial),
                commands: Mutex::new(None),
            }),
            follow: Mutex::new(Slot::new()),
        }
    }

    pub fn state(&self) -> MapViewState {
        *self.camera.state.lock()
    }

    /// Hand the command queue to the rendering layer. Only the first call
    /// gets it; moves made before that are not replayed.
    pub fn take_commands(&self) -> Option<mpsc::UnboundedReceiver<CameraCommand>> {
        let mut commands = self.camera.commands.lock();
        if commands.is_some() {
            return None;
        }
        let (tx, rx) = mpsc::unbounded_channel();
        *commands = Some(tx);
        Some(rx)
    }

    /// Record a pan/zoom made by the user. Emits no command.
    pub fn user_moved(&self, center: LatLng, zoom: f64) {
        *self.camera.state.lock() = MapViewState { center, zoom };
    }

    /// Frame `points` (centroid plus spread zoom). No-op for an empty set.
    pub fn frame_points(&self, points: &[LatLng], reason: CameraReason) -> bool {
        match frame(points) {
            Some((center, zoom)) => {
                self.camera.apply(center, zoom, reason);
                true
            }
            None => false,
        }
    }

    pub fn center_on_me(&self, me: Option<&MyLocation>) -> bool {
        match me {
            Some(fix) => {
                self.camera.apply(fix.position(), ZOOM_CLOSE, CameraReason::CenterOnMe);
                true
            }
            None => false,
        }
    }

    /// Frame self plus every roster participant.
    pub fn center_on_all(&self, me: Option<&MyLocation>, roster: &[UserLocation]) -> bool {
        let points: Vec<LatLng> = me
            .map(MyLocation::position)
            .into_iter()
            .chain(roster.iter().map(UserLocation::position))
            .collect();
        self.frame_points(&points, CameraReason::CenterOnAll)
    }

    /// Toggle follow mode. While enabled, every new self fix recenters the
    /// camera; disabling stops that without touching the current camera.
    pub fn set_follow(&self, enabled: bool, fixes: watch::Receiver<Option<MyLocation>>) {
        if !enabled {
            self.stop_follow();
            return;
        }
        let camera = self.camera.clone();
        self.follow.lock().acquire_with(|| {
            debug!("follow mode on");
            TaskHandle::spawn("follow-me", follow_loop(camera, fixes))
        });
    }

    pub fn stop_follow(&self) -> bool {
        let released = self.follow.lock().release();
        if released {
            debug!("follow mode off");
        }
        released
    }

    pub fn is_following(&self) -> bool {
        self.follow.lock().is_occupied()
    }
}

async fn follow_loop(camera: Arc<Camera>, mut fixes: watch::Receiver<Option<MyLocation>>) {
    loop {
        let fix = *fixes.borrow_and_update();
        if let Some(fix) = fix {
            camera.apply(fix.position(), ZOOM_CLOSE, CameraReason::Follow);
        }
        if fixes.changed().await.is_err() {
            return;
        }
    }
}
