use serde_json::{Map, Value, json};
use zia_mcp_core::{CallContext, ToolError, check_confirmation};

use super::args::{
    arg_optional_string, optional_string_list, required_id, required_string, required_string_list,
};
use super::{
    ServiceTarget, ToolAccess, ToolContext, ToolDefinition, ToolOutput, id_schema, list_schema,
    object_schema,
};
use crate::client::{NetworkServiceGroupDraft, QueryParams};

pub(super) fn definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "zia_list_network_svc_groups",
            description: "List network service groups, optionally filtered by search text.",
            input_schema: object_schema(
                json!({ "search": { "type": "string" } }),
                &[],
                ToolAccess::Read,
            ),
            access: ToolAccess::Read,
        },
        ToolDefinition {
            name: "zia_get_network_svc_group",
            description: "Get one network service group by ID.",
            input_schema: object_schema(
                json!({ "group_id": id_schema("Network service group ID.") }),
                &["group_id"],
                ToolAccess::Read,
            ),
            access: ToolAccess::Read,
        },
        ToolDefinition {
            name: "zia_create_network_svc_group",
            description: "Create a network service group from existing network service IDs.",
            input_schema: object_schema(
                json!({
                    "name": { "type": "string" },
                    "description": { "type": "string" },
                    "service_ids": list_schema("Network service IDs to include.")
                }),
                &["name", "service_ids"],
                ToolAccess::Write,
            ),
            access: ToolAccess::Write,
        },
        ToolDefinition {
            name: "zia_update_network_svc_group",
            description: "Update a network service group. Supplied service_ids replace the current members.",
            input_schema: object_schema(
                json!({
                    "group_id": id_schema("Network service group ID."),
                    "name": { "type": "string" },
                    "description": { "type": "string" },
                    "service_ids": list_schema("Replacement member service IDs; omit to keep the current members.")
                }),
                &["group_id", "name"],
                ToolAccess::Write,
            ),
            access: ToolAccess::Write,
        },
        ToolDefinition {
            name: "zia_delete_network_svc_group",
            description: "Delete a network service group. Irreversible; returns a confirmation request until re-invoked with confirmation.",
            input_schema: object_schema(
                json!({ "group_id": id_schema("Network service group ID.") }),
                &["group_id"],
                ToolAccess::Destructive,
            ),
            access: ToolAccess::Destructive,
        },
    ]
}

pub(super) async fn list_network_svc_groups(
    ctx: &ToolContext,
    args: &Map<String, Value>,
) -> Result<ToolOutput, ToolError> {
    let mut query = QueryParams::new();
    if let Some(search) = arg_optional_string(args, "search")? {
        query.push(("search".into(), search));
    }
    let target = ServiceTarget::from_args(args)?;

    let client = ctx.client(&target)?;
    let groups = client
        .cloud_firewall()
        .list_network_svc_groups(&query)
        .await
        .into_result("list network service groups", None)?;
    Ok(ToolOutput::resources(groups))
}

pub(super) async fn get_network_svc_group(
    ctx: &ToolContext,
    args: &Map<String, Value>,
) -> Result<ToolOutput, ToolError> {
    let group_id = required_id(args, "group_id")?;
    let target = ServiceTarget::from_args(args)?;

    let client = ctx.client(&target)?;
    let group = client
        .cloud_firewall()
        .get_network_svc_group(&group_id)
        .await
        .into_result(
            &format!("get network service group {group_id}"),
            Some(group_id.as_str()),
        )?;
    Ok(ToolOutput::resource(group))
}

pub(super) async fn create_network_svc_group(
    ctx: &ToolContext,
    args: &Map<String, Value>,
) -> Result<ToolOutput, ToolError> {
    let draft = NetworkServiceGroupDraft {
        name: required_string(args, "name")?,
        description: arg_optional_string(args, "description")?,
        service_ids: Some(required_string_list(args, "service_ids", "service ID")?),
    };
    let target = ServiceTarget::from_args(args)?;

    let client = ctx.client(&target)?;
    let created = client
        .cloud_firewall()
        .add_network_svc_group(&draft)
        .await
        .into_result("create network service group", Some(draft.name.as_str()))?;
    Ok(ToolOutput::resource(created))
}

pub(super) async fn update_network_svc_group(
    ctx: &ToolContext,
    args: &Map<String, Value>,
) -> Result<ToolOutput, ToolError> {
    let group_id = required_id(args, "group_id")?;
    let draft = NetworkServiceGroupDraft {
        name: required_string(args, "name")?,
        description: arg_optional_string(args, "description")?,
        service_ids: optional_string_list(args, "service_ids")?,
    };
    let target = ServiceTarget::from_args(args)?;

    let client = ctx.client(&target)?;
    let updated = client
        .cloud_firewall()
        .update_network_svc_group(&group_id, &draft)
        .await
        .into_result(
            &format!("update network service group {group_id}"),
            Some(group_id.as_str()),
        )?;
    Ok(ToolOutput::resource(updated))
}

pub(super) async fn delete_network_svc_group(
    ctx: &ToolContext,
    args: &Map<String, Value>,
    call: CallContext,
) -> Result<ToolOutput, ToolError> {
    let group_id = required_id(args, "group_id")?;
    let target = ServiceTarget::from_args(args)?;

    let mut context = Map::new();
    context.insert("group_id".into(), json!(group_id));
    if let Some(pending) =
        check_confirmation("zia_delete_network_svc_group", call.confirmed, &context)
    {
        return Ok(ToolOutput::Pending(pending));
    }

    let client = ctx.client(&target)?;
    client
        .cloud_firewall()
        .delete_network_svc_group(&group_id)
        .await
        .into_status(
            &format!("delete network service group {group_id}"),
            Some(group_id.as_str()),
        )?;
    Ok(ToolOutput::Status(format!(
        "Network service group {group_id} deleted successfully"
    )))
}
