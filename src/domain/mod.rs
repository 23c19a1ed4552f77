//! Sample capability catalog served by the binary
//!
//! Stands in for application-provided capabilities: a handful of tools, two
//! resources and a prompt, all sharing one `ServerFacts` instance.

pub mod prompts;
pub mod resources;
pub mod tools;

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::Config;
use crate::registry::{CapabilitySource, Registration};

#[derive(Debug, Clone)]
pub struct ServerFacts {
    pub name: String,
    pub version: String,
    pub started_at: DateTime<Utc>,
}

impl ServerFacts {
    pub fn from_config(config: &Config) -> Self {
        Self {
            name: config.server_name.clone(),
            version: config.server_version.clone(),
            started_at: Utc::now(),
        }
    }
}

pub struct Catalog {
    facts: Arc<ServerFacts>,
}

impl Catalog {
    pub fn new(facts: ServerFacts) -> Self {
        Self {
            facts: Arc::new(facts),
        }
    }
}

impl CapabilitySource for Catalog {
    fn discover(&self) -> Vec<Registration> {
        let mut registrations = tools::tools()
            .into_iter()
            .map(Registration::from)
            .collect::<Vec<_>>();
        registrations.extend(
            resources::resources(Arc::clone(&self.facts))
                .into_iter()
                .map(Registration::from),
        );
        registrations.extend(prompts::prompts().into_iter().map(Registration::from));
        registrations
    }
}
