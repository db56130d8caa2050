//! Two-step confirmation for irreversible operations.
//!
//! The confirmation flag travels in a side-channel argument (`kwargs`) that is
//! never advertised in a tool's input schema. An unconfirmed call gets back a
//! [`PendingConfirmation`] describing what would happen; the caller re-issues
//! the same call with `{"confirmed": true}` to actually perform it.
//!
//! There is no deduplication: every confirmed call performs the operation.

use serde::Serialize;
use serde_json::{Map, Value, json};

/// Name of the hidden side-channel argument.
pub const CONFIRMATION_ARG: &str = "kwargs";

/// Out-of-band state threaded alongside a tool request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallContext {
    pub confirmed: bool,
}

impl CallContext {
    pub fn confirmed() -> Self {
        Self { confirmed: true }
    }

    /// Removes the side-channel argument from `args` and extracts its state,
    /// leaving only the tool's declared parameters behind.
    pub fn split_from(args: &mut Map<String, Value>) -> Self {
        let raw = args.remove(CONFIRMATION_ARG);
        Self {
            confirmed: extract_confirmed(raw.as_ref()),
        }
    }
}

/// Reads `confirmed` from the side-channel value. Accepts a JSON-encoded
/// string or an already-decoded object; anything malformed means "not confirmed".
pub fn extract_confirmed(raw: Option<&Value>) -> bool {
    let decoded;
    let object = match raw {
        Some(Value::Object(map)) => map,
        Some(Value::String(text)) => {
            decoded = match serde_json::from_str::<Value>(text) {
                Ok(value) => value,
                Err(err) => {
                    tracing::debug!(error = %err, "ignoring undecodable confirmation kwargs");
                    return false;
                }
            };
            match decoded.as_object() {
                Some(map) => map,
                None => return false,
            }
        }
        _ => return false,
    };
    matches!(object.get("confirmed"), Some(Value::Bool(true)))
}

/// Returned instead of performing an unconfirmed destructive operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingConfirmation {
    pub operation: String,
    pub message: String,
    pub how_to_confirm: Value,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub context: Map<String, Value>,
}

impl PendingConfirmation {
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| {
            json!({
                "operation": self.operation,
                "message": self.message
            })
        })
    }
}

/// Gate for destructive tools. `None` means the caller may proceed.
pub fn check_confirmation(
    operation: &str,
    confirmed: bool,
    context: &Map<String, Value>,
) -> Option<PendingConfirmation> {
    if confirmed {
        tracing::info!(operation, "destructive operation confirmed");
        return None;
    }

    let target = describe_context(context);
    let message = format!(
        "Confirmation required: {operation} performs an irreversible change{target}. \
         Nothing has been changed yet. Re-invoke {operation} with the same arguments and \
         kwargs='{{\"confirmed\": true}}' to proceed."
    );
    tracing::info!(operation, "destructive operation awaiting confirmation");

    Some(PendingConfirmation {
        operation: operation.to_string(),
        message,
        how_to_confirm: json!({
            "argument": CONFIRMATION_ARG,
            "value": "{\"confirmed\": true}"
        }),
        context: context.clone(),
    })
}

fn describe_context(context: &Map<String, Value>) -> String {
    if context.is_empty() {
        return String::new();
    }
    let parts: Vec<String> = context
        .iter()
        .map(|(key, value)| match value {
            Value::String(text) => format!("{key}={text}"),
            other => format!("{key}={other}"),
        })
        .collect();
    format!(" on {}", parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn extracts_confirmation_from_string_and_object() {
        assert!(extract_confirmed(Some(&json!("{\"confirmed\": true}"))));
        assert!(extract_confirmed(Some(&json!({ "confirmed": true }))));
        assert!(!extract_confirmed(Some(&json!("{\"confirmed\": false}"))));
        assert!(!extract_confirmed(Some(&json!("{}"))));
        assert!(!extract_confirmed(Some(&json!("not json"))));
        assert!(!extract_confirmed(Some(&json!("[true]"))));
        assert!(!extract_confirmed(Some(&json!({ "confirmed": "yes" }))));
        assert!(!extract_confirmed(None));
    }

    #[test]
    fn split_removes_side_channel_from_arguments() {
        let mut args = json!({
            "group_id": "12345",
            "kwargs": "{\"confirmed\": true}"
        })
        .as_object()
        .cloned()
        .unwrap();

        let ctx = CallContext::split_from(&mut args);
        assert!(ctx.confirmed);
        assert!(!args.contains_key(CONFIRMATION_ARG));
        assert_eq!(args["group_id"], "12345");
    }

    #[test]
    fn unconfirmed_call_returns_pending_description() {
        let pending = check_confirmation(
            "zia_delete_network_svc_group",
            false,
            &context(&[("group_id", json!("12345"))]),
        )
        .expect("unconfirmed calls must be held");

        assert_eq!(pending.operation, "zia_delete_network_svc_group");
        assert!(pending.message.starts_with("Confirmation required: zia_delete_network_svc_group"));
        assert!(pending.message.contains("group_id=12345"));
        assert!(pending.message.contains("\"confirmed\": true"));
        assert_eq!(pending.to_value()["context"]["group_id"], "12345");
    }

    #[test]
    fn confirmed_call_passes_the_gate() {
        assert!(check_confirmation("zia_delete_url_category", true, &Map::new()).is_none());
    }
}
