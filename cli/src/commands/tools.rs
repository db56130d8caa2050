use std::sync::Arc;

use serde_json::{Map, Value, json};
use zia_mcp_core::CallContext;
use zia_mcp_core::confirmation::CONFIRMATION_ARG;
use zia_mcp_runtime::http_client::HttpClientResolver;
use zia_mcp_runtime::tools::{
    ToolContext, error_envelope, execute_tool, find_tool, tool_definitions, write_tools_disabled,
};

use crate::util::{exit_error, print_json};

pub fn list(enable_write_tools: bool, names_only: bool) -> i32 {
    let tools: Vec<Value> = tool_definitions()
        .iter()
        .filter(|tool| enable_write_tools || !tool.is_write())
        .map(|tool| {
            if names_only {
                json!(tool.name)
            } else {
                tool.to_value()
            }
        })
        .collect();
    print_json(&json!({ "tools": tools }));
    0
}

/// Runs one tool and prints its envelope. Pending confirmation counts as success.
pub async fn call(tool: &str, args: Value, confirm: bool, enable_write_tools: bool) -> i32 {
    let (args, call) = prepare_arguments(args, confirm).unwrap_or_else(|message| {
        exit_error(
            &message,
            Some("Example: zia call zia_list_network_apps --args '{\"search\": \"ICMP\"}'"),
        )
    });

    let ctx = ToolContext::from_env(Arc::new(HttpClientResolver::from_env()));
    let (code, envelope) = invoke(&ctx, tool, &args, call, enable_write_tools).await;
    print_json(&envelope);
    code
}

/// Splits `--args` into tool arguments and the confirmation side channel.
/// `--confirm` behaves like passing `kwargs: {"confirmed": true}`.
fn prepare_arguments(
    args: Value,
    confirm: bool,
) -> Result<(Map<String, Value>, CallContext), String> {
    let Value::Object(mut args) = args else {
        return Err("Tool arguments must be a JSON object".to_string());
    };
    if confirm {
        args.insert(CONFIRMATION_ARG.into(), json!({ "confirmed": true }));
    }
    let call = CallContext::split_from(&mut args);
    Ok((args, call))
}

async fn invoke(
    ctx: &ToolContext,
    tool: &str,
    args: &Map<String, Value>,
    call: CallContext,
    enable_write_tools: bool,
) -> (i32, Value) {
    if find_tool(tool).is_some_and(|def| def.is_write()) && !enable_write_tools {
        return (1, error_envelope(tool, &write_tools_disabled(tool)));
    }

    tracing::debug!(tool, confirmed = call.confirmed, "invoking tool from cli");
    match execute_tool(ctx, tool, args, call).await {
        Ok(output) => (0, output.into_envelope(tool)),
        Err(err) => (1, error_envelope(tool, &err)),
    }
}
