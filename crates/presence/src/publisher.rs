//! Position sharing lifecycle.
//!
//! A sharing session owns exactly two live update sources: the platform
//! position watch and a fixed-period refresh that re-queries the position even
//! when the watch stays silent (stationary devices). Both feed the same sink,
//! which stores the fix locally and republishes it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use runtime::{every, FirstTick, Metrics, Slot, TaskHandle};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::backend::PresenceBackend;
use crate::error::{AcquireError, BackendError};
use crate::geolocation::{
    current_position_within, Acquired, AcquisitionStrategy, GeolocationProvider,
    PositionErrorCode, PositionOptions,
};
use crate::model::MyLocation;
use crate::notice::{Notice, NoticeBus};
use crate::protocol::PublishLocation;

/// Period of the unconditional re-query while sharing.
pub const PUBLISH_REFRESH_PERIOD: Duration = Duration::from_secs(15);

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Session {
    Idle,
    Starting(u64),
    Active(u64),
}

/// Result of [`PresencePublisher::start_sharing`].
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum StartOutcome {
    Started(Acquired),
    /// A session was already starting or active; nothing new was created.
    AlreadySharing,
    /// `stop_sharing` ran while the first fix was being acquired.
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct PublisherOptions {
    pub refresh_period: Duration,
    pub refresh_position: PositionOptions,
    pub watch_position: PositionOptions,
}

impl Default for PublisherOptions {
    fn default() -> Self {
        Self {
            refresh_period: PUBLISH_REFRESH_PERIOD,
            refresh_position: PositionOptions::new(
                true,
                Duration::from_secs(10),
                Duration::ZERO,
            ),
            watch_position: PositionOptions::new(
                true,
                Duration::from_secs(30),
                Duration::from_secs(5),
            ),
        }
    }
}

struct Inner {
    session: Session,
    next_session: u64,
    watch: Slot,
    refresh: Slot,
}

/// Stores a fix and republishes it, but only for the session that is still
/// active. A tick that races a stop is discarded.
#[derive(Clone)]
struct FixSink {
    backend: Arc<dyn PresenceBackend>,
    fix: Arc<watch::Sender<Option<MyLocation>>>,
    active: Arc<AtomicU64>,
    /// Upper bound on one backend call.
    deadline: Duration,
    metrics: Arc<Metrics>,
}

impl FixSink {
    async fn record(&self, session: u64, fix: MyLocation) {
        let stored = self.fix.send_if_modified(|current| {
            if self.active.load(Ordering::SeqCst) != session {
                return false;
            }
            *current = Some(fix);
            true
        });
        if !stored {
            debug!(session, "dropping fix for a stopped session");
            return;
        }
        self.publish(session, fix).await;
    }

    /// Publish `fix` for `session`. If the session stopped while the request
    /// was in flight, the removal may have reached the backend first, so the
    /// fix is removed again.
    async fn publish(&self, session: u64, fix: MyLocation) {
        let sent = tokio::time::timeout(
            self.deadline,
            self.backend.publish(PublishLocation::from(fix.position())),
        )
        .await
        .unwrap_or(Err(BackendError::Timeout(self.deadline)));
        match sent {
            Ok(()) => self.metrics.inc("publish.ok"),
            Err(err) => {
                self.metrics.inc("publish.failed");
                warn!("publishing position failed: {err}");
            }
        }
        if self.active.load(Ordering::SeqCst) != session {
            debug!(session, "sharing stopped during publish, removing fix again");
            self.remove().await;
        }
    }

    async fn remove(&self) {
        let removed = tokio::time::timeout(self.deadline, self.backend.remove())
            .await
            .unwrap_or(Err(BackendError::Timeout(self.deadline)));
        match removed {
            Ok(()) => self.metrics.inc("remove.ok"),
            Err(err) => {
                self.metrics.inc("remove.failed");
                warn!("removing published position failed: {err}");
            }
        }
    }
}

pub struct PresencePublisher {
    provider: Arc<dyn GeolocationProvider>,
    strategy: AcquisitionStrategy,
    options: PublisherOptions,
    sink: FixSink,
    notices: Arc<NoticeBus>,
    inner: Mutex<Inner>,
}

impl PresencePublisher {
    pub fn new(
        backend: Arc<dyn PresenceBackend>,
        provider: Arc<dyn GeolocationProvider>,
        strategy: AcquisitionStrategy,
        options: PublisherOptions,
        notices: Arc<NoticeBus>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let (fix, _) = watch::channel(None);
        let deadline = options.refresh_period;
        Self {
            provider,
            strategy,
            options,
            sink: FixSink {
                backend,
                fix: Arc::new(fix),
                active: Arc::new(AtomicU64::new(0)),
                deadline,
                metrics,
            },
            notices,
            inner: Mutex::new(Inner {
                session: Session::Idle,
                next_session: 1,
                watch: Slot::new(),
                refresh: Slot::new(),
            }),
        }
    }

    /// Current own fix; `None` unless sharing.
    pub fn my_location(&self) -> Option<MyLocation> {
        *self.sink.fix.borrow()
    }

    pub fn subscribe_fix(&self) -> watch::Receiver<Option<MyLocation>> {
        self.sink.fix.subscribe()
    }

    pub fn is_sharing(&self) -> bool {
        matches!(self.inner.lock().session, Session::Active(_))
    }

    /// Whether the watch subscription and the refresh timer are held.
    pub fn handles_present(&self) -> (bool, bool) {
        let inner = self.inner.lock();
        (inner.watch.is_occupied(), inner.refresh.is_occupied())
    }

    pub async fn start_sharing(&self) -> Result<StartOutcome, AcquireError> {
        let session = {
            let mut inner = self.inner.lock();
            if inner.session != Session::Idle {
                debug!(state = ?inner.session, "sharing already in progress");
                return Ok(StartOutcome::AlreadySharing);
            }
            let id = inner.next_session;
            inner.next_session += 1;
            inner.session = Session::Starting(id);
            id
        };

        let acquired = self.strategy.acquire(self.provider.as_ref()).await;

        let acquired = {
            let mut inner = self.inner.lock();
            if inner.session != Session::Starting(session) {
                info!(session, "sharing start cancelled");
                return Ok(StartOutcome::Cancelled);
            }
            match acquired {
                Err(err) => {
                    inner.session = Session::Idle;
                    drop(inner);
                    warn!("cannot start sharing: {err}");
                    self.notices.emit(Notice::from_acquire_error(&err));
                    return Err(err);
                }
                Ok(acquired) => {
                    inner.session = Session::Active(session);
                    self.sink.active.store(session, Ordering::SeqCst);
                    self.sink.fix.send_replace(Some(acquired.fix));
                    inner.watch.acquire_with(|| self.spawn_watch(session));
                    inner.refresh.acquire_with(|| self.spawn_refresh(session));
                    acquired
                }
            }
        };

        info!(
            session,
            accuracy_m = acquired.fix.accuracy,
            "sharing started"
        );
        self.notices.emit(Notice::SharingStarted);
        if acquired.low_accuracy {
            self.notices.emit(Notice::LowAccuracy {
                accuracy_m: acquired.fix.accuracy,
            });
        }
        self.sink.publish(session, acquired.fix).await;
        Ok(StartOutcome::Started(acquired))
    }

    /// Stop sharing and remove the published fix. A second call does nothing.
    pub async fn stop_sharing(&self) -> bool {
        if !self.halt() {
            return false;
        }
        self.sink.remove().await;
        true
    }

    /// Synchronous half of [`stop_sharing`](Self::stop_sharing): release both
    /// handles and clear the local fix. Returns true when a published fix is
    /// owed a removal call.
    pub fn halt(&self) -> bool {
        let mut inner = self.inner.lock();
        match inner.session {
            Session::Idle => false,
            Session::Starting(session) => {
                inner.session = Session::Idle;
                debug!(session, "sharing start aborted");
                false
            }
            Session::Active(session) => {
                inner.session = Session::Idle;
                self.sink.active.store(0, Ordering::SeqCst);
                inner.watch.release();
                inner.refresh.release();
                self.sink.fix.send_replace(None);
                drop(inner);
                info!(session, "sharing stopped");
                self.notices.emit(Notice::SharingStopped);
                true
            }
        }
    }

    pub(crate) fn backend(&self) -> Arc<dyn PresenceBackend> {
        self.sink.backend.clone()
    }

    fn spawn_watch(&self, session: u64) -> TaskHandle {
        let mut updates = self.provider.watch_position(self.options.watch_position);
        let sink = self.sink.clone();
        let notices = self.notices.clone();
        TaskHandle::spawn("position-watch", async move {
            while let Some(update) = updates.recv().await {
                match update {
                    Ok(position) => sink.record(session, MyLocation::from(position)).await,
                    Err(err) if err.code == PositionErrorCode::PermissionDenied => {
                        warn!("position watch lost permission");
                        notices.emit(Notice::PermissionDenied);
                    }
                    Err(err) => debug!(code = ?err.code, "position watch error: {}", err.message),
                }
            }
            debug!(session, "position watch ended");
        })
    }

    fn spawn_refresh(&self, session: u64) -> TaskHandle {
        let provider = self.provider.clone();
        let sink = self.sink.clone();
        let options = self.options.refresh_position;
        every(
            "publish-refresh",
            self.options.refresh_period,
            FirstTick::AfterPeriod,
            move || {
                let provider = provider.clone();
                let sink = sink.clone();
                async move {
                    match current_position_within(provider.as_ref(), options).await {
                        Ok(position) => sink.record(session, MyLocation::from(position)).await,
                        Err(err) => debug!(code = ?err.code, "refresh position failed: {}", err.message),
                    }
                }
            },
        )
    }
}
