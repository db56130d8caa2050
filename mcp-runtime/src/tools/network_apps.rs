use serde_json::{Map, Value, json};
use zia_mcp_core::ToolError;
use zia_mcp_core::validate::LOCALES;

use super::args::{arg_optional_string, required_id};
use super::{ServiceTarget, ToolAccess, ToolContext, ToolDefinition, ToolOutput, id_schema, object_schema};
use crate::client::QueryParams;

pub(super) fn definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "zia_list_network_apps",
            description: "List network applications, optionally filtered by search text and locale.",
            input_schema: object_schema(
                json!({
                    "search": { "type": "string" },
                    "locale": { "type": "string", "enum": LOCALES.allowed }
                }),
                &[],
                ToolAccess::Read,
            ),
            access: ToolAccess::Read,
        },
        ToolDefinition {
            name: "zia_get_network_app",
            description: "Get one network application by ID.",
            input_schema: object_schema(
                json!({ "app_id": id_schema("Network application ID.") }),
                &["app_id"],
                ToolAccess::Read,
            ),
            access: ToolAccess::Read,
        },
    ]
}

pub(super) async fn list_network_apps(
    ctx: &ToolContext,
    args: &Map<String, Value>,
) -> Result<ToolOutput, ToolError> {
    let mut query = QueryParams::new();
    if let Some(search) = arg_optional_string(args, "search")? {
        query.push(("search".into(), search));
    }
    if let Some(locale) = LOCALES.check_optional(arg_optional_string(args, "locale")?.as_deref())? {
        query.push(("locale".into(), locale.to_string()));
    }
    let target = ServiceTarget::from_args(args)?;

    let client = ctx.client(&target)?;
    let apps = client
        .cloud_firewall()
        .list_network_apps(&query)
        .await
        .into_result("list network applications", None)?;
    Ok(ToolOutput::resources(apps))
}

pub(super) async fn get_network_app(
    ctx: &ToolContext,
    args: &Map<String, Value>,
) -> Result<ToolOutput, ToolError> {
    let app_id = required_id(args, "app_id")?;
    let target = ServiceTarget::from_args(args)?;

    let client = ctx.client(&target)?;
    let app = client
        .cloud_firewall()
        .get_network_app(&app_id)
        .await
        .into_result(&format!("get network application {app_id}"), Some(app_id.as_str()))?;
    Ok(ToolOutput::resource(app))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{args, recording_context};

    #[tokio::test]
    async fn search_is_passed_through_once() {
        let (ctx, client) = recording_context();
        let output = list_network_apps(&ctx, &args(json!({ "search": "ICMP" })))
            .await
            .unwrap();

        let calls = client.calls_to("list_network_apps");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].args, json!({ "search": "ICMP" }));
        match output {
            ToolOutput::Resources(items) => {
                assert_eq!(items.len(), 2);
                assert_eq!(items[0]["name"], "app-1");
            }
            other => panic!("expected resources, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unsupported_locale_fails_before_any_call() {
        let (ctx, client) = recording_context();
        let err = list_network_apps(&ctx, &args(json!({ "locale": "pt-BR" })))
            .await
            .expect_err("pt-BR is not offered");
        assert!(err.message.contains("Supported values"));
        assert_eq!(client.total_calls(), 0);
    }

    #[tokio::test]
    async fn get_accepts_numeric_id() {
        let (ctx, client) = recording_context();
        let output = get_network_app(&ctx, &args(json!({ "app_id": 42 }))).await.unwrap();
        assert_eq!(client.calls()[0].args, json!("42"));
        assert!(matches!(output, ToolOutput::Resource(ref m) if m["id"] == "42"));
    }

    #[tokio::test]
    async fn get_requires_id() {
        let (ctx, client) = recording_context();
        let err = get_network_app(&ctx, &Map::new()).await.expect_err("id required");
        assert_eq!(err.field.as_deref(), Some("app_id"));
        assert_eq!(client.total_calls(), 0);
    }
}
