//! HistoryAI - conversations with historical computing pioneers
//!
//! Serves chat sessions to the HistoryAI web front-end. Replies are simulated:
//! each one is composed locally and revealed word by word, the way a streamed
//! model response would arrive.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod conversation;
mod core;
mod routes;

use config::{CharacterRoster, Config};
use crate::core::SessionRegistry;

/// How often abandoned sessions are looked for
const SWEEP_PERIOD: Duration = Duration::from_secs(60);

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionRegistry>,
}

impl AppState {
    pub fn new(config: &Config, roster: CharacterRoster) -> Self {
        let sessions = SessionRegistry::new(config.session, Arc::new(roster));
        Self {
            sessions: Arc::new(sessions),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "historyai=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    let roster = config.load_roster()?;
    tracing::info!("🎭 Loaded {} character(s): {}", roster.len(), roster.names().join(", "));
    tracing::debug!(
        reply_delay_ms = config.session.reply_delay.as_millis() as u64,
        reveal_interval_ms = config.session.reveal_interval.as_millis() as u64,
        throttle_ms = config.session.throttle_window.as_millis() as u64,
        idle_timeout_secs = config.session.idle_timeout.as_secs(),
        max_chars = config.session.max_chars,
        "Session settings"
    );

    let state = AppState::new(&config, roster);
    let _sweeper = state.sessions.spawn_sweeper(SWEEP_PERIOD);

    let app = Router::new()
        .merge(routes::router())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    tracing::info!("📜 HistoryAI running at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
