use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use foundation::{haversine_m, initial_bearing_deg, LatLng, Timestamp};
use presence::{
    format_distance, FixedProvider, GeolocationProvider, NavigationState, Position, PositionError,
    PositionErrorCode, PresenceWidget, RouteStatus, Roster, StartOutcome, WidgetConfig,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Headless presence client: observe, share and navigate")]
struct Args {
    /// Presence backend base URL (default: PRESENCE_URL)
    #[arg(long)]
    presence_url: Option<String>,

    /// OSRM-compatible routing host (default: ROUTING_URL)
    #[arg(long)]
    routing_url: Option<String>,

    /// Own participant id (default: PARTICIPANT_ID)
    #[arg(long)]
    participant: Option<String>,

    /// Stop after this many seconds instead of waiting for Ctrl-C
    #[arg(long)]
    duration_secs: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the roster whenever it changes, without sharing
    Watch {
        /// Reference latitude for distance/bearing output
        #[arg(long, requires = "lng", allow_negative_numbers = true)]
        lat: Option<f64>,
        #[arg(long, requires = "lat", allow_negative_numbers = true)]
        lng: Option<f64>,
    },

    /// Share a simulated fixed position
    Share {
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        #[arg(long, allow_negative_numbers = true)]
        lng: f64,
        /// Reported accuracy radius in meters
        #[arg(long, default_value_t = 10.0)]
        accuracy: f64,
    },

    /// Share a fixed position and keep a walking route to a participant
    Route {
        /// Target participant id
        #[arg(long)]
        to: String,
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        #[arg(long, allow_negative_numbers = true)]
        lng: f64,
        #[arg(long, default_value_t = 10.0)]
        accuracy: f64,
        /// How long to wait for the target to appear on the roster
        #[arg(long, default_value_t = 15)]
        wait_secs: u64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let mut config = WidgetConfig::from_env();
    if let Some(url) = args.presence_url {
        config.presence_url = url;
    }
    if let Some(url) = args.routing_url {
        config.routing_url = url;
    }
    if let Some(id) = args.participant {
        config.participant_id = id;
    }
    let deadline = args.duration_secs.map(Duration::from_secs);

    match args.command {
        Command::Watch { lat, lng } => {
            let origin = lat.zip(lng).map(|(lat, lng)| LatLng::new(lat, lng));
            let provider = FixedProvider::failing(PositionError::new(
                PositionErrorCode::PositionUnavailable,
                "observer only",
            ));
            let widget = PresenceWidget::connect(config, Arc::new(provider))?;
            watch(&widget, origin, deadline).await;
            widget.shutdown().await;
        }
        Command::Share { lat, lng, accuracy } => {
            let widget = connect_at(config, lat, lng, accuracy)?;
            widget.start();
            share(&widget).await?;
            wait(deadline).await;
            widget.shutdown().await;
        }
        Command::Route {
            to,
            lat,
            lng,
            accuracy,
            wait_secs,
        } => {
            let widget = connect_at(config, lat, lng, accuracy)?;
            widget.start();
            share(&widget).await?;
            if await_target(&widget, &to, Duration::from_secs(wait_secs)).await {
                widget.start_navigation(&to)?;
                follow_route(&widget, deadline).await;
            } else {
                warn!(participant = %to, "participant did not appear on the roster");
            }
            widget.shutdown().await;
        }
    }
    Ok(())
}

fn connect_at(
    config: WidgetConfig,
    lat: f64,
    lng: f64,
    accuracy: f64,
) -> Result<PresenceWidget, Box<dyn std::error::Error>> {
    let provider: Arc<dyn GeolocationProvider> =
        Arc::new(FixedProvider::new(Position::new(lat, lng, accuracy)));
    Ok(PresenceWidget::connect(config, provider)?)
}

async fn share(widget: &PresenceWidget) -> Result<(), Box<dyn std::error::Error>> {
    match widget.start_sharing().await? {
        StartOutcome::Started(acquired) => {
            info!(
                lat = acquired.fix.lat,
                lng = acquired.fix.lng,
                low_accuracy = acquired.low_accuracy,
                "sharing position"
            );
        }
        other => warn!(?other, "sharing did not start"),
    }
    Ok(())
}

/// Resolve on Ctrl-C or after `deadline`, whichever comes first.
async fn wait(deadline: Option<Duration>) {
    match deadline {
        Some(d) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = tokio::time::sleep(d) => {}
            }
        }
        None => {
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

async fn watch(widget: &PresenceWidget, origin: Option<LatLng>, deadline: Option<Duration>) {
    let mut roster = widget.subscribe_roster();
    widget.start();
    let started = Timestamp::now();
    let stop = wait(deadline);
    tokio::pin!(stop);
    loop {
        tokio::select! {
            _ = &mut stop => return,
            changed = roster.changed() => {
                if changed.is_err() {
                    return;
                }
                let snapshot = roster.borrow_and_update().clone();
                print_roster(&snapshot, origin, Timestamp::now().since(started));
            }
        }
    }
}

fn print_roster(roster: &Roster, origin: Option<LatLng>, elapsed_ms: u64) {
    println!(
        "[{:>7.1}s] {} participant(s){}",
        elapsed_ms as f64 / 1000.0,
        roster.participants.len(),
        roster
            .user_site
            .as_deref()
            .map(|s| format!(" at {s}"))
            .unwrap_or_default()
    );
    for p in &roster.participants {
        let relative = origin
            .map(|o| {
                let to = p.position();
                format!(
                    "  {} @ {:.0}°",
                    format_distance(haversine_m(o, to)),
                    initial_bearing_deg(o, to)
                )
            })
            .unwrap_or_default();
        println!(
            "  {:<16} {:>10.5}, {:>10.5}  {}{}",
            p.participant_name, p.latitude, p.longitude, p.updated_at, relative
        );
    }
}

async fn await_target(widget: &PresenceWidget, target: &str, limit: Duration) -> bool {
    let mut roster = widget.subscribe_roster();
    let found = tokio::time::timeout(limit, async {
        loop {
            if roster.borrow_and_update().find(target).is_some() {
                return true;
            }
            if roster.changed().await.is_err() {
                return false;
            }
        }
    })
    .await;
    found.unwrap_or(false)
}

async fn follow_route(widget: &PresenceWidget, deadline: Option<Duration>) {
    let mut nav = widget.subscribe_navigation();
    let stop = wait(deadline);
    tokio::pin!(stop);
    loop {
        tokio::select! {
            _ = &mut stop => return,
            changed = nav.changed() => {
                if changed.is_err() {
                    return;
                }
                let state = nav.borrow_and_update().clone();
                print_navigation(&state);
            }
        }
    }
}

fn print_navigation(state: &NavigationState) {
    let target = state.target.as_deref().unwrap_or("-");
    match (state.status, &state.route) {
        (RouteStatus::Ready, Some(route)) => {
            println!("route to {target}: {}", route.summary());
            for (i, step) in route.steps.iter().enumerate() {
                println!(
                    "  {:>2}. {:<40} {:>8}  ({})",
                    i + 1,
                    step.instruction,
                    format_distance(step.distance),
                    step.maneuver
                );
            }
        }
        (RouteStatus::Unavailable, _) => println!("route to {target}: unavailable"),
        (RouteStatus::Computing, _) => println!("route to {target}: computing..."),
        _ => {}
    }
}
