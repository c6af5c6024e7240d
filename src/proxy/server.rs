//! Server setup and routing

use axum::{
    extract::State,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handler::ProxyHandler;
use crate::config::AppConfig;
use crate::mediator::Mediator;

/// Shared state for the proxy
#[derive(Clone)]
pub struct ProxyState {
    pub config: Arc<AppConfig>,
    pub mediator: Arc<Mediator>,
}

impl ProxyState {
    pub fn new(config: AppConfig, mediator: Mediator) -> Self {
        Self {
            config: Arc::new(config),
            mediator: Arc::new(mediator),
        }
    }

    /// Build state with HTTP backends taken from the configuration
    pub fn from_config(config: AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let mediator = Mediator::from_config(&config)?;
        Ok(Self::new(config, mediator))
    }
}

/// Routes: the mediated completion endpoint and a health check
pub fn build_router(state: ProxyState) -> Router {
    let route = state.config.server.route.clone();

    Router::new()
        .route("/health", get(health_handler))
        .route(&route, post(proxy_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)),
        )
        .with_state(state)
}

/// Run the proxy server
pub async fn run_server(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let state = ProxyState::from_config(config)?;

    tracing::info!(
        sentinel_retcode = state.config.fallback.sentinel_retcode,
        phrases = state.mediator.policy().phrases().len(),
        "Fallback policy configured"
    );

    let route = state.config.server.route.clone();
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("fallback-proxy listening on {} (POST {})", addr, route);

    Ok(axum::serve(listener, app).await?)
}

/// Health check endpoint
async fn health_handler() -> &'static str {
    "OK"
}

async fn proxy_handler(State(state): State<ProxyState>, req: axum::extract::Request) -> axum::response::Response {
    let handler = ProxyHandler::new(state);
    handler.handle(req).await
}
