use std::sync::Arc;

use mcp_sse_runtime::{
    build_app,
    config::Config,
    domain::{Catalog, ServerFacts},
    logging,
    mcp::Dispatcher,
    registry::Registry,
    AppState,
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let level_control = logging::init_logging();

    let config = Config::from_env()?;
    let registry = Registry::builder()
        .with_source(&Catalog::new(ServerFacts::from_config(&config)))
        .build();
    let (tools, resources, prompts) = registry.counts();
    info!(tools, resources, prompts, "capabilities registered");

    let dispatcher = Dispatcher::new(&config, Arc::new(registry)).with_level_control(level_control);
    let bind_socket = config.bind_socket()?;
    let state = AppState::new(config, dispatcher);
    let app = build_app(state.clone());
    let listener = tokio::net::TcpListener::bind(bind_socket).await?;

    info!(
        bind_addr = %state.config.bind_addr,
        bind_port = state.config.bind_port,
        sse_path = %state.config.sse_path,
        message_path = %state.config.message_path,
        "server starting"
    );

    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
