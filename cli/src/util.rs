use std::io::Read;

use serde_json::{Value, json};

pub fn exit_error(message: &str, docs_hint: Option<&str>) -> ! {
    let mut err = json!({
        "error": "cli_error",
        "message": message
    });
    if let Some(hint) = docs_hint {
        err["docs_hint"] = json!(hint);
    }
    eprintln!("{}", zia_mcp_runtime::to_pretty_json(&err));
    std::process::exit(1);
}

pub fn print_json(value: &Value) {
    println!("{}", zia_mcp_runtime::to_pretty_json(value));
}

/// Reads tool arguments from inline JSON, `@path`, or `-` for stdin.
pub fn read_json_arg(raw: &str) -> Result<Value, String> {
    let (source, text) = if raw == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| format!("Failed to read stdin: {e}"))?;
        ("stdin".to_string(), buf)
    } else if let Some(path) = raw.strip_prefix('@') {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read file '{path}': {e}"))?;
        (format!("'{path}'"), text)
    } else {
        ("--args".to_string(), raw.to_string())
    };
    serde_json::from_str(&text).map_err(|e| format!("Invalid JSON in {source}: {e}"))
}
