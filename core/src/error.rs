use serde::Serialize;
use serde_json::{Value, json};

/// Structured tool error, shaped for agents rather than humans.
/// Carries enough for the caller to see what went wrong and how to fix the request.
#[derive(Debug, Clone, Serialize, thiserror::Error)]
#[error("{message}")]
pub struct ToolError {
    /// Machine-readable error code (see [`codes`])
    #[serde(rename = "error")]
    pub code: String,
    /// Human/agent-readable description of what went wrong
    pub message: String,
    /// Which request field caused the error (if applicable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Hint about what the correct usage looks like
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docs_hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Error codes used across the tool surface
pub mod codes {
    pub const VALIDATION_FAILED: &str = "validation_failed";
    pub const REMOTE_OPERATION_FAILED: &str = "remote_operation_failed";
    pub const CLIENT_UNAVAILABLE: &str = "client_unavailable";
    pub const WRITE_TOOLS_DISABLED: &str = "write_tools_disabled";
    pub const UNKNOWN_TOOL: &str = "unknown_tool";
}

impl ToolError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            field: None,
            docs_hint: None,
            details: None,
        }
    }

    /// Input validation failure attributed to one request field.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(codes::VALIDATION_FAILED, message).with_field(field)
    }

    /// The remote call completed but reported an error. The remote message is
    /// kept verbatim; only the attempted action is prefixed.
    pub fn remote(action: &str, target: Option<&str>, remote_message: &str) -> Self {
        let mut details = json!({ "action": action });
        if let Some(target) = target {
            details["target"] = Value::String(target.to_string());
        }
        Self::new(
            codes::REMOTE_OPERATION_FAILED,
            format!("Failed to {action}: {remote_message}"),
        )
        .with_details(details)
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_docs_hint(mut self, docs_hint: impl Into<String>) -> Self {
        self.docs_hint = Some(docs_hint.into());
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn is_validation(&self) -> bool {
        self.code == codes::VALIDATION_FAILED
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| {
            json!({
                "error": self.code,
                "message": self.message
            })
        })
    }
}
