//! The central Model Context Protocol engine
//!
//! Decodes JSON-RPC envelopes, routes methods to the capability registry or the
//! fixed protocol handlers, and produces response envelopes. Notifications are
//! processed but never answered.

use std::sync::Arc;

use rust_mcp_sdk::schema::{
    CallToolRequestParams, CallToolResult, ContentBlock, Implementation, InitializeResult,
    ListResourcesResult, ReadResourceContent, ReadResourceRequestParams, ReadResourceResult,
    Resource as McpResource, ServerCapabilities, ServerCapabilitiesPrompts,
    ServerCapabilitiesResources, ServerCapabilitiesTools, TextContent, TextResourceContents,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::errors::AppError;
use crate::logging::{parse_mcp_level, LevelControl};
use crate::mcp::rpc::{
    app_error_to_json_rpc, is_json_rpc_error, is_valid_id, json_rpc_result,
    JSONRPC_VERSION, NOTIFICATION_PREFIX,
};
use crate::registry::{CapabilityKind, Registry, RegistryError, MAX_COMPLETION_VALUES};

#[derive(Debug, Deserialize)]
struct GetPromptParams {
    name: String,
    #[serde(default)]
    arguments: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct SetLevelParams {
    level: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum CompletionReference {
    #[serde(rename = "ref/prompt")]
    Prompt { name: String },
    /// `ref/resource` and anything newer; these have no completions.
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct CompletionArgument {
    name: String,
    #[serde(default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct CompleteParams {
    #[serde(rename = "ref")]
    reference: CompletionReference,
    argument: CompletionArgument,
}

pub struct Dispatcher {
    registry: Arc<Registry>,
    server_name: String,
    server_version: String,
    protocol_version: String,
    level_control: Option<Arc<dyn LevelControl>>,
}

impl Dispatcher {
    pub fn new(config: &Config, registry: Arc<Registry>) -> Self {
        Self {
            registry,
            server_name: config.server_name.clone(),
            server_version: config.server_version.clone(),
            protocol_version: config.protocol_version.clone(),
            level_control: None,
        }
    }

    pub fn with_level_control(mut self, control: Arc<dyn LevelControl>) -> Self {
        self.level_control = Some(control);
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Handles one raw request body, a single envelope or a batch.
    ///
    /// Returns `None` when nothing must be sent back (notifications only).
    pub fn handle_payload(&self, body: &[u8]) -> Option<Value> {
        let payload: Value = match serde_json::from_slice(body) {
            Ok(value) => value,
            Err(err) => {
                debug!(error = %err, "rejecting unparseable payload");
                return Some(app_error_to_json_rpc(None, &AppError::Parse));
            }
        };

        let Value::Array(batch) = payload else {
            return self.handle_json_rpc_value(payload);
        };

        if batch.is_empty() {
            return Some(invalid_request(None, "batch must not be empty"));
        }

        let responses = batch
            .into_iter()
            .filter_map(|item| self.handle_json_rpc_value(item))
            .collect::<Vec<_>>();
        (!responses.is_empty()).then_some(Value::Array(responses))
    }

    pub fn handle_json_rpc_value(&self, payload: Value) -> Option<Value> {
        let Value::Object(mut envelope) = payload else {
            return Some(invalid_request(None, "envelope must be a JSON object"));
        };

        let id = envelope.remove("id");
        if id.as_ref().is_some_and(|id| !is_valid_id(id)) {
            return Some(invalid_request(None, "id must be a string, number or null"));
        }

        if envelope.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
            return Some(invalid_request(id, "jsonrpc must be \"2.0\""));
        }

        let method = match envelope.remove("method") {
            Some(Value::String(method)) if !method.trim().is_empty() => method,
            _ => return Some(invalid_request(id, "method must be a non-empty string")),
        };
        let params = envelope.remove("params");

        if id.is_none() || method.starts_with(NOTIFICATION_PREFIX) {
            self.handle_notification(&method, params);
            return None;
        }

        Some(self.handle_json_rpc_request(id, &method, params))
    }

    fn handle_notification(&self, method: &str, params: Option<Value>) {
        if method.starts_with(NOTIFICATION_PREFIX) {
            debug!(method = %method, "notification received");
            return;
        }

        // A request without an id still runs; its outcome is discarded.
        let _ = self.handle_json_rpc_request(None, method, params);
    }

    pub fn handle_json_rpc_request(
        &self,
        id: Option<Value>,
        method: &str,
        params: Option<Value>,
    ) -> Value {
        let audit_params = redact_audit_params(params.as_ref());

        let response = match self.route(method, params) {
            Ok(result) => json_rpc_result(id, result),
            Err(err) => app_error_to_json_rpc(id, &err),
        };

        info!(
            method = %method,
            params = %audit_params,
            outcome = if is_json_rpc_error(&response) { "failure" } else { "success" },
            "mcp action audited"
        );

        response
    }

    fn route(&self, method: &str, params: Option<Value>) -> Result<Value, AppError> {
        match method {
            "initialize" => self.initialize(),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({ "tools": self.registry.list_tools() })),
            "tools/call" => self.call_tool(params),
            "resources/list" => self.list_resources(),
            "resources/read" => self.read_resource(params),
            "resources/templates/list" => Ok(json!({ "resourceTemplates": [] })),
            "prompts/list" => Ok(json!({ "prompts": self.registry.list_prompts() })),
            "prompts/get" => self.get_prompt(params),
            "roots/list" => Ok(json!({ "roots": [] })),
            "logging/setLevel" => self.set_level(params),
            "completion/complete" => self.complete(params),
            other => Err(AppError::MethodNotFound(other.to_string())),
        }
    }

    fn initialize(&self) -> Result<Value, AppError> {
        let initialize_result = InitializeResult {
            server_info: Implementation {
                name: self.server_name.clone(),
                version: self.server_version.clone(),
                title: None,
                description: None,
                icons: vec![],
                website_url: None,
            },
            capabilities: ServerCapabilities {
                tools: Some(ServerCapabilitiesTools {
                    list_changed: Some(false),
                }),
                resources: Some(ServerCapabilitiesResources {
                    subscribe: Some(false),
                    list_changed: Some(false),
                }),
                prompts: Some(ServerCapabilitiesPrompts {
                    list_changed: Some(false),
                }),
                logging: Some(Map::new()),
                completions: Some(Map::new()),
                ..Default::default()
            },
            protocol_version: self.protocol_version.clone(),
            instructions: None,
            meta: None,
        };

        to_result_value(initialize_result, "initialize")
    }

    /// Capability faults become an `isError` result; lookup and argument
    /// failures stay JSON-RPC errors.
    fn call_tool(&self, params: Option<Value>) -> Result<Value, AppError> {
        let tool_call: CallToolRequestParams = parse_params(params)?;
        let arguments = tool_call.arguments.map(Value::Object);

        info!(tool = %tool_call.name, "tool invoked");
        let result = match self
            .registry
            .invoke(CapabilityKind::Tool, &tool_call.name, arguments.as_ref())
        {
            Ok(text) => text_tool_result(text, false),
            Err(RegistryError::Fault(fault)) => {
                warn!(tool = %tool_call.name, error = %fault, "tool execution failed");
                text_tool_result(format!("Error: {fault}"), true)
            }
            Err(err) => return Err(err.into()),
        };

        to_result_value(result, "tools/call")
    }

    fn list_resources(&self) -> Result<Value, AppError> {
        let resources = self
            .registry
            .list_resources()
            .into_iter()
            .map(|resource| McpResource {
                annotations: None,
                description: Some(resource.description.clone())
                    .filter(|description| !description.is_empty()),
                icons: vec![],
                meta: None,
                mime_type: Some(resource.mime_type.clone()),
                name: resource.name.clone(),
                size: None,
                title: None,
                uri: resource.uri.clone(),
            })
            .collect();

        to_result_value(
            ListResourcesResult {
                meta: None,
                next_cursor: None,
                resources,
            },
            "resources/list",
        )
    }

    fn read_resource(&self, params: Option<Value>) -> Result<Value, AppError> {
        let resource_read: ReadResourceRequestParams = parse_params(params)?;
        let text = self
            .registry
            .invoke(CapabilityKind::Resource, &resource_read.uri, None)?;
        let mime_type = self
            .registry
            .resource(&resource_read.uri)
            .map(|resource| resource.mime_type.clone());

        to_result_value(
            ReadResourceResult {
                contents: vec![ReadResourceContent::from(TextResourceContents {
                    meta: None,
                    mime_type,
                    text,
                    uri: resource_read.uri,
                })],
                meta: None,
            },
            "resources/read",
        )
    }

    fn get_prompt(&self, params: Option<Value>) -> Result<Value, AppError> {
        let prompt_get: GetPromptParams = parse_params(params)?;
        let text = self.registry.invoke(
            CapabilityKind::Prompt,
            &prompt_get.name,
            prompt_get.arguments.as_ref(),
        )?;
        let description = self
            .registry
            .prompt(&prompt_get.name)
            .map(|prompt| prompt.description.clone())
            .unwrap_or_default();

        Ok(json!({
            "description": description,
            "messages": [{
                "role": "user",
                "content": { "type": "text", "text": text }
            }]
        }))
    }

    fn set_level(&self, params: Option<Value>) -> Result<Value, AppError> {
        let SetLevelParams { level } = parse_params(params)?;
        let parsed = parse_mcp_level(&level)
            .ok_or_else(|| AppError::invalid_params(format!("unsupported log level '{level}'")))?;

        if let Some(control) = &self.level_control {
            control.set_level(parsed).map_err(AppError::internal)?;
        }
        info!(level = %level, "log level changed");

        Ok(json!({}))
    }

    fn complete(&self, params: Option<Value>) -> Result<Value, AppError> {
        let CompleteParams {
            reference,
            argument,
        } = parse_params(params)?;

        let mut values = match reference {
            CompletionReference::Prompt { name } => {
                self.registry
                    .complete_prompt_argument(&name, &argument.name, &argument.value)?
            }
            CompletionReference::Other => Vec::new(),
        };

        let total = values.len();
        values.truncate(MAX_COMPLETION_VALUES);
        Ok(json!({
            "completion": {
                "values": values,
                "total": total,
                "hasMore": total > MAX_COMPLETION_VALUES,
            }
        }))
    }
}

fn invalid_request(id: Option<Value>, detail: &str) -> Value {
    app_error_to_json_rpc(id, &AppError::InvalidRequest(detail.to_string()))
}

fn parse_params<T: DeserializeOwned>(params: Option<Value>) -> Result<T, AppError> {
    let raw = params.ok_or_else(|| AppError::invalid_params("params are required"))?;
    serde_json::from_value(raw).map_err(|err| AppError::invalid_params(err.to_string()))
}

fn to_result_value<T: Serialize>(result: T, method: &str) -> Result<Value, AppError> {
    serde_json::to_value(result)
        .map_err(|err| AppError::internal(format!("{method} result serialization: {err}")))
}

fn text_tool_result(text: String, is_error: bool) -> CallToolResult {
    CallToolResult {
        content: vec![ContentBlock::from(TextContent::new(text, None, None))],
        is_error: Some(is_error),
        meta: None,
        structured_content: None,
    }
}

pub fn redact_audit_params(params: Option<&Value>) -> Value {
    params.map(redact_audit_value).unwrap_or(Value::Null)
}

pub fn redact_audit_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, item)| {
                    if is_sensitive_key(key) {
                        (key.clone(), Value::String("[REDACTED]".to_string()))
                    } else {
                        (key.clone(), redact_audit_value(item))
                    }
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact_audit_value).collect()),
        _ => value.clone(),
    }
}

pub fn is_sensitive_key(key: &str) -> bool {
    let normalized = key.trim().to_ascii_lowercase();
    matches!(
        normalized.as_str(),
        "authorization" | "bearer" | "api_key" | "apikey"
    ) || normalized.contains("token")
        || normalized.contains("secret")
        || normalized.contains("password")
        || normalized.contains("credential")
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;
    use tracing::Level;

    use super::*;
    use crate::registry::{ParamShape, ParameterDescriptor, Prompt, Resource, Tool};

    fn dispatcher() -> Dispatcher {
        let registry = Registry::builder()
            .with(
                Tool::new("add", |args| Ok((args.f64("a")? + args.f64("b")?).to_string()))
                    .describe("Add two numbers")
                    .param(ParameterDescriptor::new("a", ParamShape::Number))
                    .param(ParameterDescriptor::new("b", ParamShape::Number)),
            )
            .with(Tool::new("fail", |_| anyhow::bail!("backend unavailable")))
            .with(
                Resource::new("info://status", || Ok("all systems nominal".to_string()))
                    .mime_type("text/plain"),
            )
            .with(Resource::new("info://broken", || anyhow::bail!("sensor offline")))
            .with(
                Prompt::new("summarize", |args| {
                    Ok(format!("Summarize {} in a {} tone", args.str("topic")?, args.str("tone")?))
                })
                .describe("Summarize a topic")
                .param(ParameterDescriptor::new("topic", ParamShape::String))
                .param(
                    ParameterDescriptor::new(
                        "tone",
                        ParamShape::enumeration(["neutral", "friendly", "formal"]),
                    )
                    .with_default("neutral"),
                ),
            )
            .with(Prompt::new("broken", |_| anyhow::bail!("template store offline")))
            .build();

        let config = Config {
            server_name: "test-server".to_string(),
            server_version: "9.9.9".to_string(),
            protocol_version: "2024-11-05".to_string(),
            ..Config::default()
        };
        Dispatcher::new(&config, Arc::new(registry))
    }

    fn call(dispatcher: &Dispatcher, request: Value) -> Value {
        dispatcher
            .handle_payload(request.to_string().as_bytes())
            .expect("request must be answered")
    }

    #[test]
    fn tools_call_returns_text_result() {
        let response = call(
            &dispatcher(),
            json!({"jsonrpc": "2.0", "id": 1, "method": "tools/call",
                   "params": {"name": "add", "arguments": {"a": 2, "b": 3}}}),
        );

        assert_eq!(response["id"], 1);
        assert_eq!(response["result"]["content"][0]["type"], "text");
        assert_eq!(response["result"]["content"][0]["text"], "5");
        assert_eq!(response["result"]["isError"], false);
    }

    #[test]
    fn tools_call_unknown_tool_is_invalid_params() {
        let response = call(
            &dispatcher(),
            json!({"jsonrpc": "2.0", "id": 2, "method": "tools/call",
                   "params": {"name": "subtract", "arguments": {}}}),
        );

        assert_eq!(response["error"]["code"], -32602);
        let message = response["error"]["message"].as_str().expect("message");
        assert!(message.contains("subtract"), "{message}");
    }

    #[test]
    fn tools_call_missing_parameter_is_invalid_params() {
        let response = call(
            &dispatcher(),
            json!({"jsonrpc": "2.0", "id": 3, "method": "tools/call",
                   "params": {"name": "add", "arguments": {"a": 2}}}),
        );

        assert_eq!(response["error"]["code"], -32602);
        assert!(response["error"]["message"]
            .as_str()
            .is_some_and(|message| message.contains("'b'")));
    }

    #[test]
    fn explicit_null_for_a_required_parameter_is_invalid_params() {
        let dispatcher = dispatcher();

        let response = call(
            &dispatcher,
            json!({"jsonrpc": "2.0", "id": 4, "method": "tools/call",
                   "params": {"name": "add", "arguments": {"a": null, "b": 3}}}),
        );
        assert_eq!(response["error"]["code"], -32602);
        assert!(response["error"]["message"]
            .as_str()
            .is_some_and(|message| message.contains("'a'")));

        let response = call(
            &dispatcher,
            json!({"jsonrpc": "2.0", "id": 5, "method": "prompts/get",
                   "params": {"name": "summarize", "arguments": {"topic": null}}}),
        );
        assert_eq!(response["error"]["code"], -32602);
        assert!(response["error"]["message"]
            .as_str()
            .is_some_and(|message| message.contains("'topic'")));
    }

    #[test]
    fn explicit_null_for_a_defaulted_parameter_takes_the_default() {
        let response = call(
            &dispatcher(),
            json!({"jsonrpc": "2.0", "id": 6, "method": "prompts/get",
                   "params": {"name": "summarize",
                              "arguments": {"topic": "tides", "tone": null}}}),
        );
        assert_eq!(
            response["result"]["messages"][0]["content"]["text"],
            "Summarize tides in a neutral tone"
        );
    }

    #[test]
    fn tools_call_fault_is_reported_in_band() {
        let response = call(
            &dispatcher(),
            json!({"jsonrpc": "2.0", "id": 4, "method": "tools/call",
                   "params": {"name": "fail"}}),
        );

        assert!(response.get("error").is_none());
        assert_eq!(response["result"]["isError"], true);
        assert_eq!(
            response["result"]["content"][0]["text"],
            "Error: backend unavailable"
        );
    }

    #[test]
    fn resources_read_unknown_uri_is_invalid_params() {
        let response = call(
            &dispatcher(),
            json!({"jsonrpc": "2.0", "id": 5, "method": "resources/read",
                   "params": {"uri": "info://missing"}}),
        );

        assert_eq!(response["error"]["code"], -32602);
    }

    #[test]
    fn resources_read_fault_is_internal_error() {
        let response = call(
            &dispatcher(),
            json!({"jsonrpc": "2.0", "id": 6, "method": "resources/read",
                   "params": {"uri": "info://broken"}}),
        );

        assert_eq!(response["error"]["code"], -32603);
        assert!(response["error"]["message"]
            .as_str()
            .is_some_and(|message| message.contains("sensor offline")));
    }

    #[test]
    fn resources_read_returns_text_contents() {
        let response = call(
            &dispatcher(),
            json!({"jsonrpc": "2.0", "id": 7, "method": "resources/read",
                   "params": {"uri": "info://status"}}),
        );

        let contents = &response["result"]["contents"][0];
        assert_eq!(contents["uri"], "info://status");
        assert_eq!(contents["mimeType"], "text/plain");
        assert_eq!(contents["text"], "all systems nominal");
    }

    #[test]
    fn initialize_reports_configured_identity() {
        let dispatcher = dispatcher();
        for id in [10, 11] {
            let response = call(
                &dispatcher,
                json!({"jsonrpc": "2.0", "id": id, "method": "initialize",
                       "params": {"protocolVersion": "2099-01-01", "capabilities": {},
                                  "clientInfo": {"name": "c", "version": "1"}}}),
            );

            assert_eq!(response["result"]["protocolVersion"], "2024-11-05");
            assert_eq!(response["result"]["serverInfo"]["name"], "test-server");
            assert_eq!(response["result"]["serverInfo"]["version"], "9.9.9");
            assert!(response["result"]["capabilities"]["tools"].is_object());
            assert!(response["result"]["capabilities"]["prompts"].is_object());
        }
    }

    #[test]
    fn listings_follow_registration_order() {
        let dispatcher = dispatcher();

        let tools = call(
            &dispatcher,
            json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}),
        );
        assert_eq!(tools["result"]["tools"][0]["name"], "add");
        assert_eq!(tools["result"]["tools"][1]["name"], "fail");
        assert_eq!(
            tools["result"]["tools"][0]["inputSchema"]["required"],
            json!(["a", "b"])
        );

        let resources = call(
            &dispatcher,
            json!({"jsonrpc": "2.0", "id": 2, "method": "resources/list"}),
        );
        assert_eq!(resources["result"]["resources"][0]["uri"], "info://status");

        let prompts = call(
            &dispatcher,
            json!({"jsonrpc": "2.0", "id": 3, "method": "prompts/list"}),
        );
        assert_eq!(prompts["result"]["prompts"][0]["name"], "summarize");
        assert_eq!(prompts["result"]["prompts"][0]["arguments"][1]["required"], false);
    }

    #[test]
    fn prompts_get_renders_a_user_message() {
        let response = call(
            &dispatcher(),
            json!({"jsonrpc": "2.0", "id": 8, "method": "prompts/get",
                   "params": {"name": "summarize", "arguments": {"topic": "Rust"}}}),
        );

        assert_eq!(response["result"]["description"], "Summarize a topic");
        assert_eq!(response["result"]["messages"][0]["role"], "user");
        assert_eq!(
            response["result"]["messages"][0]["content"]["text"],
            "Summarize Rust in a neutral tone"
        );
    }

    #[test]
    fn prompts_get_rejects_values_outside_an_enum() {
        let response = call(
            &dispatcher(),
            json!({"jsonrpc": "2.0", "id": 9, "method": "prompts/get",
                   "params": {"name": "summarize",
                              "arguments": {"topic": "Rust", "tone": "angry"}}}),
        );

        assert_eq!(response["error"]["code"], -32602);
    }

    #[test]
    fn completion_suggests_enum_values() {
        let response = call(
            &dispatcher(),
            json!({"jsonrpc": "2.0", "id": 12, "method": "completion/complete",
                   "params": {"ref": {"type": "ref/prompt", "name": "summarize"},
                              "argument": {"name": "tone", "value": "f"}}}),
        );

        assert_eq!(
            response["result"]["completion"]["values"],
            json!(["friendly", "formal"])
        );
        assert_eq!(response["result"]["completion"]["hasMore"], false);
    }

    #[test]
    fn completion_for_other_references_is_empty() {
        let dispatcher = dispatcher();
        for reference in [
            json!({"type": "ref/resource", "uri": "info://status"}),
            json!({"type": "ref/other", "name": "anything"}),
        ] {
            let response = call(
                &dispatcher,
                json!({"jsonrpc": "2.0", "id": 13, "method": "completion/complete",
                       "params": {"ref": reference,
                                  "argument": {"name": "tone", "value": ""}}}),
            );

            assert_eq!(response["result"]["completion"]["values"], json!([]));
            assert_eq!(response["result"]["completion"]["total"], 0);
            assert_eq!(response["result"]["completion"]["hasMore"], false);
        }
    }

    #[test]
    fn fixed_methods_return_empty_collections() {
        let dispatcher = dispatcher();
        let ping = call(&dispatcher, json!({"jsonrpc": "2.0", "id": 1, "method": "ping"}));
        assert_eq!(ping["result"], json!({}));

        let roots = call(&dispatcher, json!({"jsonrpc": "2.0", "id": 2, "method": "roots/list"}));
        assert_eq!(roots["result"]["roots"], json!([]));

        let templates = call(
            &dispatcher,
            json!({"jsonrpc": "2.0", "id": 3, "method": "resources/templates/list"}),
        );
        assert_eq!(templates["result"]["resourceTemplates"], json!([]));
    }

    #[test]
    fn set_level_applies_through_the_level_control() {
        #[derive(Default)]
        struct Recorder(Mutex<Option<Level>>);

        impl LevelControl for Recorder {
            fn set_level(&self, level: Level) -> Result<(), String> {
                *self.0.lock() = Some(level);
                Ok(())
            }
        }

        let recorder = Arc::new(Recorder::default());
        let dispatcher = dispatcher().with_level_control(recorder.clone());

        let response = call(
            &dispatcher,
            json!({"jsonrpc": "2.0", "id": 1, "method": "logging/setLevel",
                   "params": {"level": "warning"}}),
        );
        assert_eq!(response["result"], json!({}));
        assert_eq!(*recorder.0.lock(), Some(Level::WARN));

        let response = call(
            &dispatcher,
            json!({"jsonrpc": "2.0", "id": 2, "method": "logging/setLevel",
                   "params": {"level": "chatty"}}),
        );
        assert_eq!(response["error"]["code"], -32602);
    }

    #[test]
    fn unknown_methods_are_method_not_found() {
        let response = call(
            &dispatcher(),
            json!({"jsonrpc": "2.0", "id": 1, "method": "Tools/List"}),
        );
        assert_eq!(response["error"]["code"], -32601);
    }

    #[test]
    fn notifications_never_produce_a_response() {
        let dispatcher = dispatcher();
        let notifications = [
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
            json!({"jsonrpc": "2.0", "id": 5, "method": "notifications/cancelled"}),
            json!({"jsonrpc": "2.0", "method": "tools/call",
                   "params": {"name": "fail"}}),
            json!({"jsonrpc": "2.0", "method": "tools/call",
                   "params": {"name": "no-such-tool"}}),
            json!({"jsonrpc": "2.0", "method": "no/such/method"}),
            json!({"jsonrpc": "2.0", "method": "resources/read",
                   "params": {"uri": "info://broken"}}),
            json!({"jsonrpc": "2.0", "method": "prompts/get",
                   "params": {"name": "broken"}}),
        ];

        for notification in notifications {
            assert_eq!(
                dispatcher.handle_payload(notification.to_string().as_bytes()),
                None,
                "{notification}"
            );
        }
    }

    #[test]
    fn malformed_payloads_are_classified() {
        let dispatcher = dispatcher();

        let response = dispatcher
            .handle_payload(b"{not json")
            .expect("parse errors are answered");
        assert_eq!(response["error"]["code"], -32700);
        assert!(response["id"].is_null());

        let response = call(&dispatcher, json!({"jsonrpc": "2.0", "id": 3}));
        assert_eq!(response["error"]["code"], -32600);
        assert_eq!(response["id"], 3);

        let response = call(&dispatcher, json!({"jsonrpc": "1.0", "id": 4, "method": "ping"}));
        assert_eq!(response["error"]["code"], -32600);

        let response = call(&dispatcher, json!("ping"));
        assert_eq!(response["error"]["code"], -32600);

        let response = call(&dispatcher, json!([]));
        assert_eq!(response["error"]["code"], -32600);
    }

    #[test]
    fn batches_answer_requests_and_drop_notifications() {
        let dispatcher = dispatcher();
        let response = call(
            &dispatcher,
            json!([
                {"jsonrpc": "2.0", "id": 1, "method": "ping"},
                {"jsonrpc": "2.0", "method": "notifications/initialized"},
                {"jsonrpc": "2.0", "id": 2, "method": "unknown"}
            ]),
        );

        let responses = response.as_array().expect("batch response");
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["id"], 1);
        assert_eq!(responses[1]["error"]["code"], -32601);

        let only_notifications = json!([{"jsonrpc": "2.0", "method": "notifications/initialized"}]);
        assert_eq!(
            dispatcher.handle_payload(only_notifications.to_string().as_bytes()),
            None
        );
    }

    #[test]
    fn redacts_sensitive_fields_in_audit_params() {
        let params = json!({
            "name": "deploy",
            "arguments": {
                "target": "prod",
                "token": "should-not-appear",
                "api_key": "should-not-appear",
                "nested": { "client_secret": "should-not-appear" }
            }
        });

        let redacted = redact_audit_params(Some(&params));

        assert_eq!(redacted["name"], json!("deploy"));
        assert_eq!(redacted["arguments"]["target"], json!("prod"));
        assert_eq!(redacted["arguments"]["token"], json!("[REDACTED]"));
        assert_eq!(redacted["arguments"]["api_key"], json!("[REDACTED]"));
        assert_eq!(
            redacted["arguments"]["nested"]["client_secret"],
            json!("[REDACTED]")
        );
    }
}
