use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::BackendError;
use crate::protocol::{LocationsResponse, PublishLocation};
use crate::BoxFuture;

/// Header naming the calling participant for backends without a session layer.
pub const PARTICIPANT_HEADER: &str = "x-participant-id";

/// Shared presence store.
///
/// Implementations must be `Send + Sync` for use across async tasks.
pub trait PresenceBackend: Send + Sync {
    /// Every participant's last published fix, the caller's own included.
    fn list(&self) -> BoxFuture<'_, Result<LocationsResponse, BackendError>>;

    /// Publish or update the caller's fix.
    fn publish(&self, fix: PublishLocation) -> BoxFuture<'_, Result<(), BackendError>>;

    /// Remove the caller's fix.
    fn remove(&self) -> BoxFuture<'_, Result<(), BackendError>>;
}

/// HTTP presence backend rooted at `base_url` (`{base_url}/location`).
///
/// Authentication is delegated: an optional bearer token and participant id
/// are attached to every request when configured.
#[derive(Clone)]
pub struct HttpPresenceBackend {
    http: reqwest::Client,
    base_url: String,
    participant_id: Option<String>,
    token: Option<String>,
}

impl HttpPresenceBackend {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            participant_id: None,
            token: None,
        }
    }

    pub fn with_participant(mut self, participant_id: impl Into<String>) -> Self {
        self.participant_id = Some(participant_id.into());
        self
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.trim().is_empty());
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/location", self.base_url.trim_end_matches('/'))
    }

    fn request(&self, method: reqwest::Method) -> reqwest::RequestBuilder {
        let mut req = self.http.request(method, self.endpoint());
        if let Some(id) = &self.participant_id {
            req = req.header(PARTICIPANT_HEADER, id);
        }
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        req
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Result<reqwest::Response, BackendError> {
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(BackendError::Status {
                status: status.as_u16(),
            });
        }
        Ok(resp)
    }

    async fn fetch_json<T: DeserializeOwned>(&self) -> Result<T, BackendError> {
        let resp = self.send(self.request(reqwest::Method::GET)).await?;
        resp.json::<T>()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))
    }

    async fn post_fix(&self, fix: PublishLocation) -> Result<(), BackendError> {
        debug!(lat = fix.latitude, lng = fix.longitude, "publishing fix");
        self.send(self.request(reqwest::Method::POST).json(&fix))
            .await
            .map(|_| ())
    }

    async fn delete_fix(&self) -> Result<(), BackendError> {
        debug!("removing published fix");
        self.send(self.request(reqwest::Method::DELETE))
            .await
            .map(|_| ())
    }
}

impl PresenceBackend for HttpPresenceBackend {
    fn list(&self) -> BoxFuture<'_, Result<LocationsResponse, BackendError>> {
        Box::pin(self.fetch_json::<LocationsResponse>())
    }

    fn publish(&self, fix: PublishLocation) -> BoxFuture<'_, Result<(), BackendError>> {
        Box::pin(self.post_fix(fix))
    }

    fn remove(&self) -> BoxFuture<'_, Result<(), BackendError>> {
        Box::pin(self.delete_fix())
    }
}
