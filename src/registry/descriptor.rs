//! Registration records for tools, resources and prompts

use std::{fmt, sync::Arc};

use anyhow::{anyhow, Context};
use serde::Serialize;
use serde_json::{json, Map, Value};

use super::coercion::{ArgValue, ParamShape};

pub type CallHandler = Arc<dyn Fn(&Arguments) -> anyhow::Result<String> + Send + Sync>;
pub type ReadHandler = Arc<dyn Fn() -> anyhow::Result<String> + Send + Sync>;

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDescriptor {
    pub name: String,
    pub shape: ParamShape,
    pub description: String,
    pub required: bool,
    pub default_value: Option<Value>,
    pub nullable: bool,
}

impl ParameterDescriptor {
    /// A required parameter; `with_default` or `nullable` make it optional.
    pub fn new(name: impl Into<String>, shape: ParamShape) -> Self {
        Self {
            name: name.into(),
            shape,
            description: String::new(),
            required: true,
            default_value: None,
            nullable: false,
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self.required = false;
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self.required = false;
        self
    }

    pub fn enum_values(&self) -> Option<&[String]> {
        match &self.shape {
            ParamShape::Enum(values) => Some(values.as_slice()),
            _ => None,
        }
    }

    fn property_schema(&self) -> Value {
        let mut property = Map::new();
        property.insert("type".to_string(), json!(self.shape.json_type()));
        if !self.description.is_empty() {
            property.insert("description".to_string(), json!(self.description));
        }
        if let Some(values) = self.enum_values() {
            property.insert("enum".to_string(), json!(values));
        }
        if let Some(default) = &self.default_value {
            property.insert("default".to_string(), default.clone());
        }
        Value::Object(property)
    }
}

/// Builds the `inputSchema` object advertised by `tools/list`.
pub fn input_schema(parameters: &[ParameterDescriptor]) -> Value {
    let properties = parameters
        .iter()
        .map(|parameter| (parameter.name.clone(), parameter.property_schema()))
        .collect::<Map<_, _>>();
    let required = parameters
        .iter()
        .filter(|parameter| parameter.required)
        .map(|parameter| parameter.name.clone())
        .collect::<Vec<_>>();

    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

/// Positionally bound arguments, in parameter declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    entries: Vec<(String, ArgValue)>,
}

impl Arguments {
    pub fn new(entries: Vec<(String, ArgValue)>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn at(&self, index: usize) -> Option<&ArgValue> {
        self.entries.get(index).map(|(_, value)| value)
    }

    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArgValue)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    fn require(&self, name: &str) -> anyhow::Result<&ArgValue> {
        self.get(name)
            .with_context(|| format!("parameter '{name}' is not declared"))
    }

    pub fn str(&self, name: &str) -> anyhow::Result<&str> {
        match self.require(name)? {
            ArgValue::String(value) => Ok(value.as_str()),
            other => Err(mismatch(name, "string", other)),
        }
    }

    pub fn opt_str(&self, name: &str) -> anyhow::Result<Option<&str>> {
        match self.require(name)? {
            ArgValue::Null => Ok(None),
            ArgValue::String(value) => Ok(Some(value.as_str())),
            other => Err(mismatch(name, "string", other)),
        }
    }

    pub fn i64(&self, name: &str) -> anyhow::Result<i64> {
        match self.require(name)? {
            ArgValue::Integer(value) => Ok(*value),
            other => Err(mismatch(name, "integer", other)),
        }
    }

    pub fn f64(&self, name: &str) -> anyhow::Result<f64> {
        match self.require(name)? {
            ArgValue::Number(value) => Ok(*value),
            ArgValue::Integer(value) => Ok(*value as f64),
            other => Err(mismatch(name, "number", other)),
        }
    }

    pub fn bool(&self, name: &str) -> anyhow::Result<bool> {
        match self.require(name)? {
            ArgValue::Boolean(value) => Ok(*value),
            other => Err(mismatch(name, "boolean", other)),
        }
    }

    pub fn array(&self, name: &str) -> anyhow::Result<&[Value]> {
        match self.require(name)? {
            ArgValue::Array(items) => Ok(items.as_slice()),
            other => Err(mismatch(name, "array", other)),
        }
    }

    pub fn object(&self, name: &str) -> anyhow::Result<&Map<String, Value>> {
        match self.require(name)? {
            ArgValue::Object(map) => Ok(map),
            other => Err(mismatch(name, "object", other)),
        }
    }
}

fn mismatch(name: &str, expected: &str, found: &ArgValue) -> anyhow::Error {
    anyhow!(
        "parameter '{name}' expected {expected}, got {}",
        found.kind()
    )
}

#[derive(Clone)]
pub struct Tool {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParameterDescriptor>,
    pub handler: CallHandler,
}

impl Tool {
    pub fn new<F>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Arguments) -> anyhow::Result<String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: String::new(),
            parameters: Vec::new(),
            handler: Arc::new(handler),
        }
    }

    /// Binds the handler to an owning instance shared with other capabilities.
    pub fn bound<T, F>(name: impl Into<String>, instance: Arc<T>, method: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&T, &Arguments) -> anyhow::Result<String> + Send + Sync + 'static,
    {
        Self::new(name, move |args| method(&*instance, args))
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn param(mut self, parameter: ParameterDescriptor) -> Self {
        self.parameters.push(parameter);
        self
    }
}

impl fmt::Debug for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub struct Resource {
    pub uri: String,
    pub name: String,
    pub description: String,
    pub mime_type: String,
    pub handler: ReadHandler,
}

impl Resource {
    pub fn new<F>(uri: impl Into<String>, handler: F) -> Self
    where
        F: Fn() -> anyhow::Result<String> + Send + Sync + 'static,
    {
        let uri = uri.into();
        Self {
            name: uri.clone(),
            uri,
            description: String::new(),
            mime_type: "text/plain".to_string(),
            handler: Arc::new(handler),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("uri", &self.uri)
            .field("mime_type", &self.mime_type)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub struct Prompt {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParameterDescriptor>,
    pub handler: CallHandler,
}

impl Prompt {
    pub fn new<F>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Arguments) -> anyhow::Result<String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: String::new(),
            parameters: Vec::new(),
            handler: Arc::new(handler),
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn param(mut self, parameter: ParameterDescriptor) -> Self {
        self.parameters.push(parameter);
        self
    }
}

impl fmt::Debug for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Prompt")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

/// Tagged registration record handed over by a capability source.
#[derive(Debug, Clone)]
pub enum Registration {
    Tool(Tool),
    Resource(Resource),
    Prompt(Prompt),
}

impl From<Tool> for Registration {
    fn from(tool: Tool) -> Self {
        Self::Tool(tool)
    }
}

impl From<Resource> for Registration {
    fn from(resource: Resource) -> Self {
        Self::Resource(resource)
    }
}

impl From<Prompt> for Registration {
    fn from(prompt: Prompt) -> Self {
        Self::Prompt(prompt)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub input_schema: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct PromptArgumentDescriptor {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub required: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PromptDescriptor {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub arguments: Vec<PromptArgumentDescriptor>,
}

impl From<&Tool> for ToolDescriptor {
    fn from(tool: &Tool) -> Self {
        Self {
            name: tool.name.clone(),
            description: tool.description.clone(),
            input_schema: input_schema(&tool.parameters),
        }
    }
}

impl From<&Prompt> for PromptDescriptor {
    fn from(prompt: &Prompt) -> Self {
        Self {
            name: prompt.name.clone(),
            description: prompt.description.clone(),
            arguments: prompt
                .parameters
                .iter()
                .map(|parameter| PromptArgumentDescriptor {
                    name: parameter.name.clone(),
                    description: parameter.description.clone(),
                    required: parameter.required,
                })
                .collect(),
        }
    }
}
