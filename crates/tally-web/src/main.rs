mod api;
mod config;
mod dto;
mod error;
mod identity;
mod middleware;
mod pages;
mod retention;
mod state;

use std::sync::Arc;

use axum::http::{header, Method};
use axum::middleware::from_fn;
use axum::routing::get;
use tally_core::VoteStore;
use tower_governor::{governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer};
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::ServerConfig;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tally_web=debug,tally_core=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::load()?;
    let bind_addr = config.bind_addr;
    let vote_rpm = config.rate_limit.vote_requests_per_minute;
    let retention_days = config.database.retention_days;
    tracing::info!(
        "Identifying voters by {:?}, {} votes per day",
        config.identity.scheme,
        config.voting.daily_limit
    );

    let store = VoteStore::open(&config.database.path)?;
    let state = AppState::new(config, store.clone());

    if let Some(days) = retention_days {
        tracing::info!("Pruning vote records older than {days} day(s) before today");
        retention::spawn_purge_task(store, days);
    }

    // CORS: same-origin only (no cross-origin requests allowed)
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    // Request throttling (per-IP), separate from the daily vote limit
    let period_per_request = (60 / vote_rpm.max(1)).max(1);
    let governor_config = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(period_per_request.into())
            .burst_size(vote_rpm.max(1))
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("invalid vote throttle configuration"))?,
    );

    let vote_routes = api::vote_router()
        .layer(GovernorLayer::<_, _, axum::body::Body>::new(governor_config));

    let app = axum::Router::new()
        .route("/", get(pages::index))
        .merge(vote_routes)
        .merge(api::read_router())
        .fallback(pages::static_handler)
        .layer(from_fn(middleware::security_headers::security_headers))
        .layer(RequestBodyLimitLayer::new(16 * 1024))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("tally-web listening on http://{}", bind_addr);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}
