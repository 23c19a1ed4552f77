//! Capability registry: tools, resources and prompts keyed by name or URI
//!
//! Built once from the registrations supplied by capability sources, then frozen
//! and shared read-only across request handlers.

pub mod coercion;
pub mod descriptor;

use std::{
    collections::HashMap,
    fmt,
    panic::{catch_unwind, AssertUnwindSafe},
};

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

pub use coercion::{coerce, ArgValue, CoercionError, ParamShape};
pub use descriptor::{
    Arguments, ParameterDescriptor, Prompt, PromptDescriptor, Registration, Resource, Tool,
    ToolDescriptor,
};

pub const MAX_COMPLETION_VALUES: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapabilityKind {
    Tool,
    Resource,
    Prompt,
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Tool => "tool",
            Self::Resource => "resource",
            Self::Prompt => "prompt",
        })
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Unknown {kind}: {key}")]
    NotFound { kind: CapabilityKind, key: String },
    #[error("arguments must be a JSON object, got {0}")]
    InvalidArguments(&'static str),
    #[error("missing required parameter '{0}'")]
    MissingRequiredParameter(String),
    #[error("parameter '{parameter}': {source}")]
    Coercion {
        parameter: String,
        source: CoercionError,
    },
    #[error("{0}")]
    Fault(anyhow::Error),
}

/// Supplies the initial capability set at startup.
pub trait CapabilitySource {
    fn discover(&self) -> Vec<Registration>;
}

impl<F> CapabilitySource for F
where
    F: Fn() -> Vec<Registration>,
{
    fn discover(&self) -> Vec<Registration> {
        self()
    }
}

/// Insertion-ordered table where re-inserting a key replaces the entry in place.
#[derive(Debug)]
struct Table<T> {
    entries: Vec<T>,
    index: HashMap<String, usize>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T> Table<T> {
    /// Returns `true` when an existing entry was replaced.
    fn insert(&mut self, key: String, entry: T) -> bool {
        match self.index.get(&key) {
            Some(&position) => {
                self.entries[position] = entry;
                true
            }
            None => {
                self.index.insert(key, self.entries.len());
                self.entries.push(entry);
                false
            }
        }
    }

    fn get(&self, key: &str) -> Option<&T> {
        self.index.get(key).map(|&position| &self.entries[position])
    }

    fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[derive(Debug, Default)]
pub struct RegistryBuilder {
    tools: Table<Tool>,
    resources: Table<Resource>,
    prompts: Table<Prompt>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, source: &dyn CapabilitySource) -> Self {
        for registration in source.discover() {
            self.register(registration);
        }
        self
    }

    pub fn with(mut self, registration: impl Into<Registration>) -> Self {
        self.register(registration.into());
        self
    }

    /// Inserts or replaces; the last registration for a key wins.
    pub fn register(&mut self, registration: Registration) {
        let (kind, key, replaced) = match registration {
            Registration::Tool(tool) => {
                let key = tool.name.clone();
                let replaced = self.tools.insert(key.clone(), tool);
                (CapabilityKind::Tool, key, replaced)
            }
            Registration::Resource(resource) => {
                let key = resource.uri.clone();
                let replaced = self.resources.insert(key.clone(), resource);
                (CapabilityKind::Resource, key, replaced)
            }
            Registration::Prompt(prompt) => {
                let key = prompt.name.clone();
                let replaced = self.prompts.insert(key.clone(), prompt);
                (CapabilityKind::Prompt, key, replaced)
            }
        };

        if replaced {
            warn!(kind = %kind, key = %key, "capability registration replaced");
        } else {
            debug!(kind = %kind, key = %key, "capability registered");
        }
    }

    pub fn build(self) -> Registry {
        Registry {
            tools: self.tools,
            resources: self.resources,
            prompts: self.prompts,
        }
    }
}

#[derive(Debug, Default)]
pub struct Registry {
    tools: Table<Tool>,
    resources: Table<Resource>,
    prompts: Table<Prompt>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    pub fn counts(&self) -> (usize, usize, usize) {
        (self.tools.len(), self.resources.len(), self.prompts.len())
    }

    pub fn list_tools(&self) -> Vec<ToolDescriptor> {
        self.tools.iter().map(ToolDescriptor::from).collect()
    }

    pub fn list_resources(&self) -> Vec<&Resource> {
        self.resources.iter().collect()
    }

    pub fn list_prompts(&self) -> Vec<PromptDescriptor> {
        self.prompts.iter().map(PromptDescriptor::from).collect()
    }

    pub fn resource(&self, uri: &str) -> Option<&Resource> {
        self.resources.get(uri)
    }

    pub fn prompt(&self, name: &str) -> Option<&Prompt> {
        self.prompts.get(name)
    }

    /// Looks up `key` in the table for `kind` and runs it with `args`.
    ///
    /// Resources ignore `args`. Faults raised by the callable, panics included,
    /// come back as `RegistryError::Fault`.
    pub fn invoke(
        &self,
        kind: CapabilityKind,
        key: &str,
        args: Option<&Value>,
    ) -> Result<String, RegistryError> {
        let not_found = || RegistryError::NotFound {
            kind,
            key: key.to_string(),
        };

        match kind {
            CapabilityKind::Tool => {
                let tool = self.tools.get(key).ok_or_else(not_found)?;
                let arguments = bind_arguments(&tool.parameters, args)?;
                run_guarded(|| (tool.handler)(&arguments))
            }
            CapabilityKind::Prompt => {
                let prompt = self.prompts.get(key).ok_or_else(not_found)?;
                let arguments = bind_arguments(&prompt.parameters, args)?;
                run_guarded(|| (prompt.handler)(&arguments))
            }
            CapabilityKind::Resource => {
                let resource = self.resources.get(key).ok_or_else(not_found)?;
                run_guarded(|| (resource.handler)())
            }
        }
    }

    /// Enum values of a prompt argument starting with `prefix`.
    pub fn complete_prompt_argument(
        &self,
        prompt: &str,
        argument: &str,
        prefix: &str,
    ) -> Result<Vec<String>, RegistryError> {
        let prompt = self
            .prompts
            .get(prompt)
            .ok_or_else(|| RegistryError::NotFound {
                kind: CapabilityKind::Prompt,
                key: prompt.to_string(),
            })?;

        Ok(prompt
            .parameters
            .iter()
            .find(|parameter| parameter.name == argument)
            .and_then(ParameterDescriptor::enum_values)
            .unwrap_or_default()
            .iter()
            .filter(|value| value.starts_with(prefix))
            .cloned()
            .collect())
    }
}

/// Binds a JSON arguments object onto `parameters`, in declaration order.
pub fn bind_arguments(
    parameters: &[ParameterDescriptor],
    args: Option<&Value>,
) -> Result<Arguments, RegistryError> {
    let supplied = match args {
        None | Some(Value::Null) => None,
        Some(Value::Object(map)) => Some(map),
        Some(other) => return Err(RegistryError::InvalidArguments(coercion::value_kind(other))),
    };

    let mut bound = Vec::with_capacity(parameters.len());
    for parameter in parameters {
        // An explicit null only binds for nullable parameters; otherwise it
        // counts as absent.
        let provided = supplied
            .and_then(|map| map.get(&parameter.name))
            .filter(|value| parameter.nullable || !value.is_null());

        let value = match provided {
            Some(value) => coerce(value, &parameter.shape).map_err(|source| {
                RegistryError::Coercion {
                    parameter: parameter.name.clone(),
                    source,
                }
            })?,
            None => match parameter
                .default_value
                .as_ref()
                .filter(|default| parameter.nullable || !default.is_null())
            {
                Some(default) => coerce(default, &parameter.shape).map_err(|source| {
                    RegistryError::Coercion {
                        parameter: parameter.name.clone(),
                        source,
                    }
                })?,
                None if parameter.nullable => ArgValue::Null,
                None => {
                    return Err(RegistryError::MissingRequiredParameter(
                        parameter.name.clone(),
                    ))
                }
            },
        };
        bound.push((parameter.name.clone(), value));
    }

    Ok(Arguments::new(bound))
}

fn run_guarded<F>(call: F) -> Result<String, RegistryError>
where
    F: FnOnce() -> anyhow::Result<String>,
{
    match catch_unwind(AssertUnwindSafe(call)) {
        Ok(result) => result.map_err(RegistryError::Fault),
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|message| (*message).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(RegistryError::Fault(anyhow::anyhow!(
                "capability panicked: {message}"
            )))
        }
    }
}
