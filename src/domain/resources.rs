//! Read-only resources exposed under `info://` URIs

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde_json::json;

use super::ServerFacts;
use crate::registry::Resource;

pub const STATUS_RESOURCE_URI: &str = "info://status";
pub const SERVER_RESOURCE_URI: &str = "info://server";

pub fn resources(facts: Arc<ServerFacts>) -> Vec<Resource> {
    let status_facts = Arc::clone(&facts);
    vec![
        Resource::new(STATUS_RESOURCE_URI, move || {
            let uptime_secs = (Utc::now() - status_facts.started_at).num_seconds();
            Ok(json!({
                "status": "ok",
                "uptime_secs": uptime_secs,
                "started_at_utc": status_facts
                    .started_at
                    .to_rfc3339_opts(SecondsFormat::Secs, true),
            })
            .to_string())
        })
        .named("Server Status")
        .describe("Liveness and uptime of this server")
        .mime_type("application/json"),
        Resource::new(SERVER_RESOURCE_URI, move || {
            Ok(format!("{} {}", facts.name, facts.version))
        })
        .named("Server Identity")
        .describe("Name and version of this server"),
    ]
}
