use serde_json::{Map, Value, json};
use zia_mcp_core::ToolError;
use zia_mcp_core::validate::check_range;

use super::args::{arg_optional_bool, arg_optional_i64, arg_optional_string, optional_string_list};
use super::{ServiceTarget, ToolAccess, ToolContext, ToolDefinition, ToolOutput, list_schema, object_schema};
use crate::client::QueryParams;

const MAX_PAGE_SIZE: i64 = 1000;

pub(super) fn definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "zia_list_device_groups",
            description: "List device groups, optionally with device info and pseudo groups.",
            input_schema: object_schema(
                json!({
                    "include_device_info": { "type": "boolean" },
                    "include_pseudo_groups": { "type": "boolean" }
                }),
                &[],
                ToolAccess::Read,
            ),
            access: ToolAccess::Read,
        },
        ToolDefinition {
            name: "zia_list_devices",
            description: "List devices with optional name, user and paging filters.",
            input_schema: object_schema(
                json!({
                    "name": { "type": "string", "description": "Device name filter." },
                    "user_ids": list_schema("User IDs whose devices to list."),
                    "include_all": { "type": "boolean" },
                    "page": { "type": "integer", "minimum": 1 },
                    "page_size": { "type": "integer", "minimum": 1, "maximum": MAX_PAGE_SIZE }
                }),
                &[],
                ToolAccess::Read,
            ),
            access: ToolAccess::Read,
        },
        ToolDefinition {
            name: "zia_list_devices_lite",
            description: "List devices with only ID, name and owner.",
            input_schema: object_schema(json!({}), &[], ToolAccess::Read),
            access: ToolAccess::Read,
        },
    ]
}

pub(super) async fn list_device_groups(
    ctx: &ToolContext,
    args: &Map<String, Value>,
) -> Result<ToolOutput, ToolError> {
    let mut query = QueryParams::new();
    if let Some(include) = arg_optional_bool(args, "include_device_info")? {
        query.push(("includeDeviceInfo".into(), include.to_string()));
    }
    if let Some(include) = arg_optional_bool(args, "include_pseudo_groups")? {
        query.push(("includePseudoGroups".into(), include.to_string()));
    }
    let target = ServiceTarget::from_args(args)?;

    let client = ctx.client(&target)?;
    let groups = client
        .device_management()
        .list_device_groups(&query)
        .await
        .into_result("list device groups", None)?;
    Ok(ToolOutput::resources(groups))
}

pub(super) async fn list_devices(
    ctx: &ToolContext,
    args: &Map<String, Value>,
) -> Result<ToolOutput, ToolError> {
    let mut query = QueryParams::new();
    if let Some(name) = arg_optional_string(args, "name")? {
        query.push(("name".into(), name));
    }
    if let Some(user_ids) = optional_string_list(args, "user_ids")? {
        query.push(("userIds".into(), user_ids.join(",")));
    }
    if let Some(include_all) = arg_optional_bool(args, "include_all")? {
        query.push(("includeAll".into(), include_all.to_string()));
    }
    if let Some(page) = arg_optional_i64(args, "page")? {
        check_range("page", page, 1, None)?;
        query.push(("page".into(), page.to_string()));
    }
    if let Some(page_size) = arg_optional_i64(args, "page_size")? {
        check_range("page_size", page_size, 1, Some(MAX_PAGE_SIZE))?;
        query.push(("pageSize".into(), page_size.to_string()));
    }
    let target = ServiceTarget::from_args(args)?;

    let client = ctx.client(&target)?;
    let devices = client
        .device_management()
        .list_devices(&query)
        .await
        .into_result("list devices", None)?;
    Ok(ToolOutput::resources(devices))
}

pub(super) async fn list_devices_lite(
    ctx: &ToolContext,
    args: &Map<String, Value>,
) -> Result<ToolOutput, ToolError> {
    let target = ServiceTarget::from_args(args)?;
    let client = ctx.client(&target)?;
    let devices = client
        .device_management()
        .list_devices_lite()
        .await
        .into_result("list devices (lite)", None)?;
    Ok(ToolOutput::resources(devices))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{args, recording_context};

    #[tokio::test]
    async fn device_filters_become_api_query_parameters() {
        let (ctx, client) = recording_context();
        let output = list_devices(
            &ctx,
            &args(json!({
                "name": "laptop",
                "user_ids": "[101, 102]",
                "include_all": true,
                "page": 2,
                "page_size": 50
            })),
        )
        .await
        .unwrap();
        assert!(matches!(output, ToolOutput::Resources(ref items) if items.len() == 2));

        let calls = client.calls_to("list_devices");
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0].args,
            json!({
                "name": "laptop",
                "userIds": "101,102",
                "includeAll": "true",
                "page": "2",
                "pageSize": "50"
            })
        );
    }

    #[tokio::test]
    async fn paging_out_of_range_is_rejected_without_calls() {
        let (ctx, client) = recording_context();
        let err = list_devices(&ctx, &args(json!({ "page_size": 5000 })))
            .await
            .expect_err("page_size too large");
        assert_eq!(err.message, "page_size must be between 1 and 1000");

        let err = list_devices(&ctx, &args(json!({ "page": 0 })))
            .await
            .expect_err("page must be positive");
        assert_eq!(err.field.as_deref(), Some("page"));
        assert_eq!(client.total_calls(), 0);
    }

    #[tokio::test]
    async fn empty_user_id_list_is_omitted() {
        let (ctx, client) = recording_context();
        list_devices(&ctx, &args(json!({ "user_ids": [] }))).await.unwrap();
        assert_eq!(client.calls()[0].args, json!({}));
    }

    #[tokio::test]
    async fn device_group_flags_use_api_names() {
        let (ctx, client) = recording_context();
        list_device_groups(
            &ctx,
            &args(json!({ "include_device_info": true, "include_pseudo_groups": false })),
        )
        .await
        .unwrap();
        assert_eq!(
            client.calls()[0].args,
            json!({ "includeDeviceInfo": "true", "includePseudoGroups": "false" })
        );
    }

    #[tokio::test]
    async fn lite_listing_takes_no_filters() {
        let (ctx, client) = recording_context();
        list_devices_lite(&ctx, &Map::new()).await.unwrap();
        assert_eq!(client.calls_to("list_devices_lite").len(), 1);
    }
}
