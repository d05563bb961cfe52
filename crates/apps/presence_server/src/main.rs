use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use presence::{LocationsResponse, PublishLocation, UserLocation, PARTICIPANT_HEADER};
use runtime::{every, FirstTick};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod store;

use store::{valid_fix, PresenceStore};

const NAME_HEADER: &str = "x-participant-name";

#[derive(Clone)]
struct AppState {
    store: Arc<PresenceStore>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let addr: SocketAddr = env::var("PRESENCE_ADDR")
        .unwrap_or_else(|_| "127.0.0.1:9200".to_string())
        .parse()?;
    let ttl = Duration::from_secs(env_var_u64("PRESENCE_TTL_SECS", 120).max(1));
    let site = env::var("PRESENCE_SITE").unwrap_or_else(|_| "HQ".to_string());

    let state = AppState {
        store: Arc::new(PresenceStore::new(ttl, site)),
    };

    let sweeper_store = state.store.clone();
    let _sweeper = every("expiry-sweep", ttl / 4, FirstTick::AfterPeriod, move || {
        let store = sweeper_store.clone();
        async move {
            let purged = store.purge_expired(Instant::now());
            if purged > 0 {
                debug!(purged, "expired presence entries");
            }
        }
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS]);

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route(
            "/api/location",
            get(list_locations).post(publish_location).delete(remove_location),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    info!(%addr, ttl_secs = ttl.as_secs(), "presence server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

fn api_error(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "error": message.into() })))
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn participant(headers: &HeaderMap) -> Result<&str, (StatusCode, Json<Value>)> {
    header(headers, PARTICIPANT_HEADER).ok_or_else(|| {
        api_error(
            StatusCode::UNAUTHORIZED,
            format!("{PARTICIPANT_HEADER} header is required"),
        )
    })
}

async fn list_locations(State(state): State<AppState>, headers: HeaderMap) -> Json<LocationsResponse> {
    let can_share = header(&headers, PARTICIPANT_HEADER).is_some();
    Json(LocationsResponse {
        locations: state.store.list(Instant::now()),
        user_site: Some(state.store.site_name().to_string()),
        is_admin: false,
        can_share,
    })
}

async fn publish_location(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(fix): Json<PublishLocation>,
) -> Result<Json<UserLocation>, (StatusCode, Json<Value>)> {
    let id = participant(&headers)?;
    if !valid_fix(&fix) {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "latitude must be within [-90, 90] and longitude within [-180, 180]",
        ));
    }
    let saved = state.store.upsert(
        id,
        header(&headers, NAME_HEADER),
        fix,
        Instant::now(),
        chrono::Utc::now(),
    );
    debug!(participant = id, lat = fix.latitude, lng = fix.longitude, "fix published");
    Ok(Json(saved))
}

async fn remove_location(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, (StatusCode, Json<Value>)> {
    let id = participant(&headers)?;
    if state.store.remove(id) {
        debug!(participant = id, "fix removed");
    }
    Ok((StatusCode::NO_CONTENT, ""))
}

fn env_var_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
