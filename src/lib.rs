use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

pub mod config;
pub mod domain;
pub mod errors;
pub mod http;
pub mod logging;
pub mod mcp;
pub mod registry;
pub mod transport;

use config::Config;
use mcp::Dispatcher;
use transport::SessionRegistry;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub dispatcher: Arc<Dispatcher>,
    pub sessions: Arc<SessionRegistry>,
}

impl AppState {
    pub fn new(config: Config, dispatcher: Dispatcher) -> Self {
        Self {
            config: Arc::new(config),
            dispatcher: Arc::new(dispatcher),
            sessions: Arc::new(SessionRegistry::new()),
        }
    }
}

pub fn build_app(state: AppState) -> Router {
    let sse_path = state.config.sse_path.clone();
    let message_path = state.config.message_path.clone();

    Router::new()
        .route("/health", get(http::handlers::health))
        .route("/.well-known/mcp", get(http::handlers::discovery))
        .route(
            &sse_path,
            get(http::handlers::subscribe)
                .post(http::handlers::direct_submit)
                .delete(http::handlers::terminate),
        )
        .route(&message_path, post(http::handlers::message_endpoint))
        .layer(middleware::from_fn(logging::request_logging_middleware))
        .with_state(state)
}
