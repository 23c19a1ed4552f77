use std::{sync::Arc, time::Instant};

use axum::{extract::Request, middleware::Next, response::Response};
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, reload, EnvFilter, Registry};

/// Runtime control over the active log verbosity, used by `logging/setLevel`.
pub trait LevelControl: Send + Sync {
    fn set_level(&self, level: Level) -> Result<(), String>;
}

pub struct ReloadLevelControl {
    handle: reload::Handle<EnvFilter, Registry>,
}

impl LevelControl for ReloadLevelControl {
    fn set_level(&self, level: Level) -> Result<(), String> {
        let directive = level.as_str().to_ascii_lowercase();
        self.handle
            .reload(EnvFilter::new(directive))
            .map_err(|err| err.to_string())
    }
}

pub fn init_logging() -> Arc<dyn LevelControl> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let (filter, handle) = reload::Layer::new(filter);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    Arc::new(ReloadLevelControl { handle })
}

/// Maps an MCP logging level name onto the closest tracing level.
pub fn parse_mcp_level(level: &str) -> Option<Level> {
    match level {
        "debug" => Some(Level::DEBUG),
        "info" | "notice" => Some(Level::INFO),
        "warning" => Some(Level::WARN),
        "error" | "critical" | "alert" | "emergency" => Some(Level::ERROR),
        _ => None,
    }
}

pub async fn request_logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started_at = Instant::now();

    let response = next.run(request).await;
    let status = response.status();
    let elapsed_ms = started_at.elapsed().as_millis();

    info!(
        method = %method,
        path = %path,
        status = status.as_u16(),
        duration_ms = elapsed_ms,
        "request summary"
    );

    if status.is_server_error() {
        warn!(method = %method, path = %path, "request failed");
    }

    response
}
