//! Tool registry and dispatch.
//!
//! Every tool follows the same path: read and normalize arguments, validate
//! structure, pass the confirmation gate when destructive, resolve a client,
//! perform one remote operation, and map its outcome. Any failure before the
//! client is resolved means no remote call happened.

pub mod args;
mod cloud_app_control;
mod device_management;
mod network_apps;
mod network_service_groups;
mod network_services;
mod url_categories;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value, json};
use zia_mcp_core::{CallContext, PendingConfirmation, ToolError, codes};

use crate::client::{ClientResolver, Resource, ZiaClient};
use crate::util::{URL_LOOKUP_DELAY_ENV, url_lookup_delay};
use args::{arg_bool, arg_string};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolAccess {
    Read,
    Write,
    /// Irreversible; gated behind confirmation.
    Destructive,
}

#[derive(Debug)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
    pub access: ToolAccess,
}

impl ToolDefinition {
    pub fn is_write(&self) -> bool {
        self.access != ToolAccess::Read
    }

    pub fn to_value(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "inputSchema": self.input_schema,
            "annotations": {
                "readOnlyHint": self.access == ToolAccess::Read,
                "destructiveHint": self.access == ToolAccess::Destructive
            }
        })
    }
}

pub fn tool_definitions() -> Vec<ToolDefinition> {
    let mut tools = Vec::new();
    tools.extend(cloud_app_control::definitions());
    tools.extend(device_management::definitions());
    tools.extend(network_apps::definitions());
    tools.extend(network_services::definitions());
    tools.extend(network_service_groups::definitions());
    tools.extend(url_categories::definitions());
    tools
}

pub fn find_tool(name: &str) -> Option<ToolDefinition> {
    tool_definitions().into_iter().find(|tool| tool.name == name)
}

/// Builds an object schema and appends the client-selection parameters every
/// tool accepts. Destructive tools stay open to extra properties so the hidden
/// confirmation argument passes schema-validating clients.
fn object_schema(properties: Value, required: &[&str], access: ToolAccess) -> Value {
    let mut props = match properties {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    props.insert(
        "use_legacy".to_string(),
        json!({
            "type": "boolean",
            "default": false,
            "description": "Use the legacy session-based API client."
        }),
    );
    props.insert(
        "service".to_string(),
        json!({
            "type": "string",
            "default": "zia",
            "description": "Service selector passed to the client resolver."
        }),
    );

    let mut schema = json!({
        "type": "object",
        "properties": props
    });
    if !required.is_empty() {
        schema["required"] = json!(required);
    }
    if access != ToolAccess::Destructive {
        schema["additionalProperties"] = Value::Bool(false);
    }
    schema
}

fn list_schema(description: &str) -> Value {
    json!({
        "description": description,
        "oneOf": [
            { "type": "array", "items": { "type": ["string", "integer"] } },
            { "type": "string", "description": "JSON-encoded list, or comma-separated values." }
        ]
    })
}

fn id_schema(description: &str) -> Value {
    json!({ "type": ["string", "integer"], "description": description })
}

/// Which service and authentication mode a call targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceTarget {
    pub service: String,
    pub use_legacy: bool,
}

impl ServiceTarget {
    pub fn from_args(args: &Map<String, Value>) -> Result<Self, ToolError> {
        Ok(Self {
            service: arg_string(args, "service", "zia")?,
            use_legacy: arg_bool(args, "use_legacy", false)?,
        })
    }
}

/// Shared collaborators for tool execution.
#[derive(Clone)]
pub struct ToolContext {
    resolver: Arc<dyn ClientResolver>,
    url_lookup_delay: Duration,
}

impl ToolContext {
    pub fn new(resolver: Arc<dyn ClientResolver>) -> Self {
        Self {
            resolver,
            url_lookup_delay: url_lookup_delay(None),
        }
    }

    pub fn from_env(resolver: Arc<dyn ClientResolver>) -> Self {
        Self::new(resolver)
            .with_url_lookup_delay(url_lookup_delay(std::env::var(URL_LOOKUP_DELAY_ENV).ok()))
    }

    pub fn with_url_lookup_delay(mut self, delay: Duration) -> Self {
        self.url_lookup_delay = delay;
        self
    }

    pub fn url_lookup_delay(&self) -> Duration {
        self.url_lookup_delay
    }

    /// Resolves a fresh client for this call. Resolver failures are surfaced
    /// with their own message.
    pub fn client(&self, target: &ServiceTarget) -> Result<Arc<dyn ZiaClient>, ToolError> {
        self.resolver
            .get_client(&target.service, target.use_legacy)
            .map_err(|err| {
                tracing::warn!(service = %target.service, use_legacy = target.use_legacy, error = %err, "client resolution failed");
                ToolError::new(
                    codes::CLIENT_UNAVAILABLE,
                    format!("Could not obtain a '{}' client: {err}", target.service),
                )
                .with_field("service")
                .with_docs_hint(
                    "Set ZSCALER_ACCESS_TOKEN, or ZIA_CLOUD and ZIA_LEGACY_SESSION when use_legacy=true.",
                )
            })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    Resource(Map<String, Value>),
    Resources(Vec<Map<String, Value>>),
    Values(Vec<String>),
    Status(String),
    Pending(PendingConfirmation),
}

impl ToolOutput {
    pub fn resource(resource: Resource) -> Self {
        Self::Resource(resource.to_mapping())
    }

    pub fn resources(resources: Vec<Resource>) -> Self {
        Self::Resources(resources.iter().map(Resource::to_mapping).collect())
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }

    pub fn into_envelope(self, tool: &str) -> Value {
        let data = match self {
            Self::Pending(pending) => {
                return json!({
                    "status": "confirmation_required",
                    "tool": tool,
                    "pending": pending.to_value()
                });
            }
            Self::Resource(mapping) => Value::Object(mapping),
            Self::Resources(mappings) => {
                Value::Array(mappings.into_iter().map(Value::Object).collect())
            }
            Self::Values(values) => json!(values),
            Self::Status(message) => json!({ "message": message }),
        };
        json!({
            "status": "success",
            "tool": tool,
            "data": data
        })
    }
}

/// Refusal for a write tool when the caller has not opted into writes.
pub fn write_tools_disabled(tool: &str) -> ToolError {
    ToolError::new(
        codes::WRITE_TOOLS_DISABLED,
        format!("Tool '{tool}' modifies configuration and write tools are disabled"),
    )
    .with_field("name")
    .with_docs_hint("Pass --enable-write-tools or set ZIA_MCP_ENABLE_WRITE_TOOLS=true.")
}

pub fn error_envelope(tool: &str, err: &ToolError) -> Value {
    json!({
        "status": "error",
        "tool": tool,
        "error": err.to_value()
    })
}

pub async fn execute_tool(
    ctx: &ToolContext,
    tool_name: &str,
    args: &Map<String, Value>,
    call: CallContext,
) -> Result<ToolOutput, ToolError> {
    tracing::info!(tool = tool_name, confirmed = call.confirmed, "executing tool");
    match tool_name {
        "zia_list_cloud_app_control_actions" => {
            cloud_app_control::list_cloud_app_control_actions(ctx, args).await
        }
        "zia_list_device_groups" => device_management::list_device_groups(ctx, args).await,
        "zia_list_devices" => device_management::list_devices(ctx, args).await,
        "zia_list_devices_lite" => device_management::list_devices_lite(ctx, args).await,
        "zia_list_network_apps" => network_apps::list_network_apps(ctx, args).await,
        "zia_get_network_app" => network_apps::get_network_app(ctx, args).await,
        "zia_list_network_services" => network_services::list_network_services(ctx, args).await,
        "zia_get_network_service" => network_services::get_network_service(ctx, args).await,
        "zia_create_network_service" => network_services::create_network_service(ctx, args).await,
        "zia_update_network_service" => network_services::update_network_service(ctx, args).await,
        "zia_delete_network_service" => {
            network_services::delete_network_service(ctx, args, call).await
        }
        "zia_list_network_svc_groups" => {
            network_service_groups::list_network_svc_groups(ctx, args).await
        }
        "zia_get_network_svc_group" => {
            network_service_groups::get_network_svc_group(ctx, args).await
        }
        "zia_create_network_svc_group" => {
            network_service_groups::create_network_svc_group(ctx, args).await
        }
        "zia_update_network_svc_group" => {
            network_service_groups::update_network_svc_group(ctx, args).await
        }
        "zia_delete_network_svc_group" => {
            network_service_groups::delete_network_svc_group(ctx, args, call).await
        }
        "zia_list_url_categories" => url_categories::list_url_categories(ctx, args).await,
        "zia_url_lookup" => url_categories::url_lookup(ctx, args).await,
        "zia_get_url_category" => url_categories::get_url_category(ctx, args).await,
        "zia_create_url_category" => url_categories::create_url_category(ctx, args).await,
        "zia_update_url_category" => url_categories::update_url_category(ctx, args).await,
        "zia_add_urls_to_category" => url_categories::add_urls_to_category(ctx, args).await,
        "zia_remove_urls_from_category" => {
            url_categories::remove_urls_from_category(ctx, args, call).await
        }
        "zia_delete_url_category" => url_categories::delete_url_category(ctx, args, call).await,
        _ => Err(ToolError::new(
            codes::UNKNOWN_TOOL,
            format!("Unknown tool '{tool_name}'"),
        )
        .with_field("name")
        .with_docs_hint("Call tools/list to see the available tool names.")),
    }
}
