use serde_json::{Map, Value, json};
use zia_mcp_core::ToolError;

use super::args::{required_string, required_string_list};
use super::{ServiceTarget, ToolAccess, ToolContext, ToolDefinition, ToolOutput, list_schema, object_schema};

pub(super) fn definitions() -> Vec<ToolDefinition> {
    vec![ToolDefinition {
        name: "zia_list_cloud_app_control_actions",
        description: "List the actions available for cloud applications under a cloud app control rule type.",
        input_schema: object_schema(
            json!({
                "rule_type": {
                    "type": "string",
                    "description": "Rule type, e.g. STREAMING_MEDIA, WEBMAIL, FILE_SHARE."
                },
                "cloud_apps": list_schema("Cloud applications to query, e.g. [\"DROPBOX\", \"GOOGLE_WEBMAIL\"].")
            }),
            &["rule_type", "cloud_apps"],
            ToolAccess::Read,
        ),
        access: ToolAccess::Read,
    }]
}

pub(super) async fn list_cloud_app_control_actions(
    ctx: &ToolContext,
    args: &Map<String, Value>,
) -> Result<ToolOutput, ToolError> {
    let rule_type = required_string(args, "rule_type")?;
    let cloud_apps = required_string_list(args, "cloud_apps", "cloud application")?;
    let target = ServiceTarget::from_args(args)?;

    let client = ctx.client(&target)?;
    let actions = client
        .cloud_app_control()
        .list_available_actions(&rule_type, &cloud_apps)
        .await
        .into_result("list cloud app control actions", Some(rule_type.as_str()))?;
    Ok(ToolOutput::Values(actions))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{args, recording_context};

    #[tokio::test]
    async fn json_string_and_native_list_reach_the_client_identically() {
        let (ctx, client) = recording_context();
        let encoded = args(json!({
            "rule_type": "STREAMING_MEDIA",
            "cloud_apps": "[\"DROPBOX\", \"GOOGLE_WEBMAIL\"]"
        }));
        let native = args(json!({
            "rule_type": "STREAMING_MEDIA",
            "cloud_apps": ["DROPBOX", "GOOGLE_WEBMAIL"]
        }));

        let first = list_cloud_app_control_actions(&ctx, &encoded).await.unwrap();
        let second = list_cloud_app_control_actions(&ctx, &native).await.unwrap();
        assert_eq!(first, second);

        let calls = client.calls_to("list_available_actions");
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].args, calls[1].args);
        assert_eq!(calls[0].args["cloud_apps"], json!(["DROPBOX", "GOOGLE_WEBMAIL"]));
    }

    #[tokio::test]
    async fn comma_separated_apps_are_accepted() {
        let (ctx, client) = recording_context();
        let output = list_cloud_app_control_actions(
            &ctx,
            &args(json!({ "rule_type": "WEBMAIL", "cloud_apps": "DROPBOX, BOX" })),
        )
        .await
        .unwrap();
        assert!(matches!(output, ToolOutput::Values(ref v) if v.len() == 2));
        assert_eq!(
            client.calls()[0].args["cloud_apps"],
            json!(["DROPBOX", "BOX"])
        );
    }

    #[tokio::test]
    async fn empty_app_list_is_rejected_before_any_call() {
        let (ctx, client) = recording_context();
        let err = list_cloud_app_control_actions(
            &ctx,
            &args(json!({ "rule_type": "WEBMAIL", "cloud_apps": [] })),
        )
        .await
        .expect_err("empty list");
        assert!(err.is_validation());
        assert_eq!(client.total_calls(), 0);
        assert!(client.resolutions().is_empty());
    }

    #[tokio::test]
    async fn remote_error_is_prefixed_with_action() {
        let (ctx, client) = recording_context();
        client.fail_with("INVALID_INPUT_ARGUMENT");
        let err = list_cloud_app_control_actions(
            &ctx,
            &args(json!({ "rule_type": "WEBMAIL", "cloud_apps": ["BOX"] })),
        )
        .await
        .expect_err("remote failure");
        assert_eq!(
            err.message,
            "Failed to list cloud app control actions: INVALID_INPUT_ARGUMENT"
        );
    }
}
