use serde_json::{Map, Value, json};
use zia_mcp_core::validate::{NETWORK_SERVICE_PROTOCOLS, parse_port_definitions, require_non_empty};
use zia_mcp_core::{CallContext, PortDefinition, SequenceInput, ToolError, check_confirmation};

use super::args::{arg_optional_string, required_id, required_string};
use super::{ServiceTarget, ToolAccess, ToolContext, ToolDefinition, ToolOutput, id_schema, object_schema};
use crate::client::{NetworkServiceDraft, QueryParams};

fn ports_schema(description: &str) -> Value {
    json!({
        "description": description,
        "oneOf": [
            {
                "type": "array",
                "items": {
                    "type": "array",
                    "minItems": 3,
                    "items": { "type": ["string", "integer"] }
                }
            },
            { "type": "string", "description": "JSON-encoded list of port tuples." }
        ]
    })
}

pub(super) fn definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "zia_list_network_services",
            description: "List network services, optionally filtered by search text, protocol and locale.",
            input_schema: object_schema(
                json!({
                    "search": { "type": "string" },
                    "protocol": {
                        "type": "string",
                        "description": "One of ICMP, TCP, UDP, GRE, ESP, OTHER (any case)."
                    },
                    "locale": { "type": "string", "description": "Locale for localized service names, e.g. en-US." }
                }),
                &[],
                ToolAccess::Read,
            ),
            access: ToolAccess::Read,
        },
        ToolDefinition {
            name: "zia_get_network_service",
            description: "Get one network service by ID.",
            input_schema: object_schema(
                json!({ "service_id": id_schema("Network service ID.") }),
                &["service_id"],
                ToolAccess::Read,
            ),
            access: ToolAccess::Read,
        },
        ToolDefinition {
            name: "zia_create_network_service",
            description: "Create a custom network service from port tuples such as [[\"dest\", \"tcp\", \"22\"]] or [[\"src\", \"udp\", \"1000\", \"2000\"]].",
            input_schema: object_schema(
                json!({
                    "name": { "type": "string" },
                    "description": { "type": "string" },
                    "ports": ports_schema("Port tuples: (direction src|dest, protocol tcp|udp, start_port, end_port?).")
                }),
                &["name", "ports"],
                ToolAccess::Write,
            ),
            access: ToolAccess::Write,
        },
        ToolDefinition {
            name: "zia_update_network_service",
            description: "Update a network service. Supplied ports replace all existing port ranges.",
            input_schema: object_schema(
                json!({
                    "service_id": id_schema("Network service ID."),
                    "name": { "type": "string" },
                    "description": { "type": "string" },
                    "ports": ports_schema("Replacement port tuples; omit to keep the current ranges.")
                }),
                &["service_id", "name"],
                ToolAccess::Write,
            ),
            access: ToolAccess::Write,
        },
        ToolDefinition {
            name: "zia_delete_network_service",
            description: "Delete a network service. Irreversible; returns a confirmation request until re-invoked with confirmation.",
            input_schema: object_schema(
                json!({ "service_id": id_schema("Network service ID.") }),
                &["service_id"],
                ToolAccess::Destructive,
            ),
            access: ToolAccess::Destructive,
        },
    ]
}

fn required_ports(args: &Map<String, Value>) -> Result<Vec<PortDefinition>, ToolError> {
    let input = SequenceInput::from_arg(args, "ports")?
        .ok_or_else(|| ToolError::validation("ports", "Missing required field 'ports'"))?;
    let ports = parse_port_definitions("ports", input)?;
    require_non_empty("ports", ports, "port definition")
}

fn optional_ports(args: &Map<String, Value>) -> Result<Option<Vec<PortDefinition>>, ToolError> {
    let Some(input) = SequenceInput::from_arg(args, "ports")? else {
        return Ok(None);
    };
    let ports = parse_port_definitions("ports", input)?;
    Ok(if ports.is_empty() { None } else { Some(ports) })
}

pub(super) async fn list_network_services(
    ctx: &ToolContext,
    args: &Map<String, Value>,
) -> Result<ToolOutput, ToolError> {
    let mut query = QueryParams::new();
    if let Some(search) = arg_optional_string(args, "search")? {
        query.push(("search".into(), search));
    }
    let protocol = arg_optional_string(args, "protocol")?;
    if let Some(protocol) = NETWORK_SERVICE_PROTOCOLS.check_optional(protocol.as_deref())? {
        query.push(("protocol".into(), protocol.to_string()));
    }
    if let Some(locale) = arg_optional_string(args, "locale")? {
        query.push(("locale".into(), locale));
    }
    let target = ServiceTarget::from_args(args)?;

    let client = ctx.client(&target)?;
    let services = client
        .cloud_firewall()
        .list_network_services(&query)
        .await
        .into_result("list network services", None)?;
    Ok(ToolOutput::resources(services))
}

pub(super) async fn get_network_service(
    ctx: &ToolContext,
    args: &Map<String, Value>,
) -> Result<ToolOutput, ToolError> {
    let service_id = required_id(args, "service_id")?;
    let target = ServiceTarget::from_args(args)?;

    let client = ctx.client(&target)?;
    let service = client
        .cloud_firewall()
        .get_network_service(&service_id)
        .await
        .into_result(
            &format!("get network service {service_id}"),
            Some(service_id.as_str()),
        )?;
    Ok(ToolOutput::resource(service))
}

pub(super) async fn create_network_service(
    ctx: &ToolContext,
    args: &Map<String, Value>,
) -> Result<ToolOutput, ToolError> {
    let draft = NetworkServiceDraft {
        name: required_string(args, "name")?,
        description: arg_optional_string(args, "description")?,
        ports: Some(required_ports(args)?),
    };
    let target = ServiceTarget::from_args(args)?;

    let client = ctx.client(&target)?;
    let created = client
        .cloud_firewall()
        .add_network_service(&draft)
        .await
        .into_result("create network service", Some(draft.name.as_str()))?;
    tracing::info!(name = %draft.name, "network service created");
    Ok(ToolOutput::resource(created))
}

pub(super) async fn update_network_service(
    ctx: &ToolContext,
    args: &Map<String, Value>,
) -> Result<ToolOutput, ToolError> {
    let service_id = required_id(args, "service_id")?;
    let draft = NetworkServiceDraft {
        name: required_string(args, "name")?,
        description: arg_optional_string(args, "description")?,
        ports: optional_ports(args)?,
    };
    let target = ServiceTarget::from_args(args)?;

    let client = ctx.client(&target)?;
    let updated = client
        .cloud_firewall()
        .update_network_service(&service_id, &draft)
        .await
        .into_result(
            &format!("update network service {service_id}"),
            Some(service_id.as_str()),
        )?;
    Ok(ToolOutput::resource(updated))
}

pub(super) async fn delete_network_service(
    ctx: &ToolContext,
    args: &Map<String, Value>,
    call: CallContext,
) -> Result<ToolOutput, ToolError> {
    let service_id = required_id(args, "service_id")?;
    let target = ServiceTarget::from_args(args)?;

    let mut context = Map::new();
    context.insert("service_id".into(), json!(service_id));
    if let Some(pending) =
        check_confirmation("zia_delete_network_service", call.confirmed, &context)
    {
        return Ok(ToolOutput::Pending(pending));
    }

    let client = ctx.client(&target)?;
    client
        .cloud_firewall()
        .delete_network_service(&service_id)
        .await
        .into_status(
            &format!("delete network service {service_id}"),
            Some(service_id.as_str()),
        )?;
    Ok(ToolOutput::Status(format!(
        "Network service {service_id} deleted successfully"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{args, recording_context};

    #[tokio::test]
    async fn list_forwards_locale_unchecked() {
        let (ctx, client) = recording_context();
        list_network_services(&ctx, &args(json!({ "locale": "pt-BR", "protocol": "TCP" })))
            .await
            .unwrap();

        let calls = client.calls_to("list_network_services");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].args["locale"], "pt-BR");
        assert_eq!(calls[0].args["protocol"], "TCP");
    }

    #[tokio::test]
    async fn create_sends_one_validated_tuple() {
        let (ctx, client) = recording_context();
        let output = create_network_service(
            &ctx,
            &args(json!({ "name": "Custom SSH", "ports": [["dest", "tcp", "22"]] })),
        )
        .await
        .unwrap();

        let calls = client.calls_to("add_network_service");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].args["name"], "Custom SSH");
        assert_eq!(
            calls[0].args["ports"],
            json!([{ "direction": "dest", "protocol": "tcp", "start": "22" }])
        );
        match output {
            ToolOutput::Resource(mapping) => assert_eq!(mapping["name"], "Custom SSH"),
            other => panic!("expected resource, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn json_encoded_ports_match_native_ports() {
        let (ctx, client) = recording_context();
        create_network_service(
            &ctx,
            &args(json!({ "name": "A", "ports": [["src", "UDP", 1000, 2000]] })),
        )
        .await
        .unwrap();
        create_network_service(
            &ctx,
            &args(json!({ "name": "A", "ports": "[[\"src\", \"UDP\", 1000, 2000]]" })),
        )
        .await
        .unwrap();
        let calls = client.calls_to("add_network_service");
        assert_eq!(calls[0].args, calls[1].args);
    }

    #[tokio::test]
    async fn invalid_tuples_never_reach_the_client() {
        let (ctx, client) = recording_context();
        for ports in [
            json!([["dest", "tcp"]]),
            json!([["up", "tcp", "22"]]),
            json!([["dest", "sctp", "22"]]),
            json!("[[\"dest\", \"tcp\", \"22\""),
            json!("dest,tcp,22"),
            json!([]),
        ] {
            let err = create_network_service(&ctx, &args(json!({ "name": "Bad", "ports": ports })))
                .await
                .expect_err("invalid ports must fail");
            assert!(err.is_validation(), "unexpected error: {err:?}");
            assert_eq!(err.field.as_deref(), Some("ports"));
        }
        assert_eq!(client.total_calls(), 0);
        assert!(client.resolutions().is_empty());
    }

    #[tokio::test]
    async fn update_with_empty_ports_keeps_existing_ranges() {
        let (ctx, client) = recording_context();
        update_network_service(
            &ctx,
            &args(json!({ "service_id": 159143, "name": "Renamed", "ports": "[]" })),
        )
        .await
        .unwrap();
        let calls = client.calls_to("update_network_service");
        assert_eq!(calls[0].args["id"], "159143");
        assert_eq!(calls[0].args["ports"], Value::Null);
    }

    #[tokio::test]
    async fn protocol_filter_is_upper_cased() {
        let (ctx, client) = recording_context();
        list_network_services(&ctx, &args(json!({ "protocol": "tcp", "search": "ssh" })))
            .await
            .unwrap();
        assert_eq!(
            client.calls()[0].args,
            json!({ "search": "ssh", "protocol": "TCP" })
        );

        let err = list_network_services(&ctx, &args(json!({ "protocol": "SCTP" })))
            .await
            .expect_err("unknown protocol");
        assert!(err.message.contains("ICMP, TCP, UDP, GRE, ESP, OTHER"));
        assert_eq!(client.total_calls(), 1);
    }

    #[tokio::test]
    async fn delete_requires_confirmation() {
        let (ctx, client) = recording_context();
        let request = args(json!({ "service_id": "7" }));

        let output = delete_network_service(&ctx, &request, CallContext::default())
            .await
            .unwrap();
        assert!(output.is_pending());
        assert_eq!(client.total_calls(), 0);

        let output = delete_network_service(&ctx, &request, CallContext::confirmed())
            .await
            .unwrap();
        assert_eq!(
            output,
            ToolOutput::Status("Network service 7 deleted successfully".into())
        );
        assert_eq!(client.calls_to("delete_network_service").len(), 1);
    }

    #[tokio::test]
    async fn delete_remote_failure_names_the_service() {
        let (ctx, client) = recording_context();
        client.fail_with("RESOURCE_IN_USE");
        let err = delete_network_service(
            &ctx,
            &args(json!({ "service_id": "7" })),
            CallContext::confirmed(),
        )
        .await
        .expect_err("remote failure");
        assert_eq!(err.message, "Failed to delete network service 7: RESOURCE_IN_USE");
    }
}
