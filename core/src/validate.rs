//! Structural validation run before any remote call.
//!
//! Rules fail fast on the first offending element and name both the element
//! and the expected shape. Nothing here touches the network, so a validation
//! failure can never leave remote state half-changed.

use serde::Serialize;
use serde_json::Value;

use crate::error::ToolError;
use crate::normalize::{Fallback, SequenceInput, normalize_sequence};

const PORT_TUPLE_FORMAT: &str = "('src'|'dest', 'tcp'|'udp', 'start_port', 'end_port')";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PortDirection {
    Src,
    Dest,
}

impl PortDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            PortDirection::Src => "src",
            PortDirection::Dest => "dest",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PortProtocol {
    Tcp,
    Udp,
}

impl PortProtocol {
    pub fn as_str(self) -> &'static str {
        match self {
            PortProtocol::Tcp => "tcp",
            PortProtocol::Udp => "udp",
        }
    }
}

/// One validated `(direction, protocol, start, end?)` tuple.
/// Port numbers are kept as text; range checks belong to the remote API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortDefinition {
    pub direction: PortDirection,
    pub protocol: PortProtocol,
    pub start: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
}

/// Normalizes (strictly) and validates a port-definition list.
pub fn parse_port_definitions(
    field: &str,
    input: SequenceInput,
) -> Result<Vec<PortDefinition>, ToolError> {
    let items = normalize_sequence(field, input, Fallback::Strict)?;
    validate_port_definitions(field, &items)
}

pub fn validate_port_definitions(
    field: &str,
    items: &[Value],
) -> Result<Vec<PortDefinition>, ToolError> {
    items
        .iter()
        .map(|item| validate_port_tuple(field, item))
        .collect()
}

fn validate_port_tuple(field: &str, item: &Value) -> Result<PortDefinition, ToolError> {
    let invalid_tuple = || {
        ToolError::validation(
            field,
            format!("Invalid port tuple {item}. Format: {PORT_TUPLE_FORMAT}"),
        )
        .with_details(serde_json::json!({ "tuple": item }))
    };

    let parts = item.as_array().ok_or_else(invalid_tuple)?;
    if parts.len() < 3 {
        return Err(invalid_tuple());
    }

    let direction = match parts[0].as_str() {
        Some("src") => PortDirection::Src,
        Some("dest") => PortDirection::Dest,
        _ => {
            return Err(ToolError::validation(
                field,
                format!(
                    "Invalid direction '{}'. Must be 'src' or 'dest'.",
                    display_scalar(&parts[0])
                ),
            ));
        }
    };

    let protocol = match parts[1].as_str().map(str::to_ascii_lowercase).as_deref() {
        Some("tcp") => PortProtocol::Tcp,
        Some("udp") => PortProtocol::Udp,
        _ => {
            return Err(ToolError::validation(
                field,
                format!(
                    "Invalid protocol '{}'. Must be 'tcp' or 'udp'.",
                    display_scalar(&parts[1])
                ),
            ));
        }
    };

    let start = port_value(&parts[2]).ok_or_else(invalid_tuple)?;
    let end = match parts.get(3) {
        None | Some(Value::Null) => None,
        Some(value) => Some(port_value(value).ok_or_else(invalid_tuple)?),
    };

    Ok(PortDefinition {
        direction,
        protocol,
        start,
        end,
    })
}

fn port_value(value: &Value) -> Option<String> {
    match value {
        Value::String(v) => Some(v.trim().to_string()),
        Value::Number(v) => Some(v.to_string()),
        _ => None,
    }
}

fn display_scalar(value: &Value) -> String {
    match value {
        Value::String(v) => v.clone(),
        other => other.to_string(),
    }
}

/// A closed set of accepted values for one string field.
#[derive(Debug, Clone, Copy)]
pub struct EnumRule {
    pub field: &'static str,
    pub allowed: &'static [&'static str],
    pub case_insensitive: bool,
}

/// Network-service protocol filter; accepted in any case, sent upper-cased.
pub const NETWORK_SERVICE_PROTOCOLS: EnumRule = EnumRule {
    field: "protocol",
    allowed: &["ICMP", "TCP", "UDP", "GRE", "ESP", "OTHER"],
    case_insensitive: true,
};

pub const LOCALES: EnumRule = EnumRule {
    field: "locale",
    allowed: &["de-DE", "en-US", "es-ES", "fr-FR", "ja-JP", "zh-CN"],
    case_insensitive: false,
};

impl EnumRule {
    /// Returns the canonical spelling of `value` from the allowed set.
    pub fn check(&self, value: &str) -> Result<&'static str, ToolError> {
        let found = self.allowed.iter().copied().find(|allowed| {
            if self.case_insensitive {
                allowed.eq_ignore_ascii_case(value)
            } else {
                *allowed == value
            }
        });
        found.ok_or_else(|| {
            ToolError::validation(
                self.field,
                format!(
                    "Invalid {}: {value}. Supported values: {}",
                    self.field,
                    self.allowed.join(", ")
                ),
            )
        })
    }

    pub fn check_optional(&self, value: Option<&str>) -> Result<Option<&'static str>, ToolError> {
        value.map(|v| self.check(v)).transpose()
    }
}

/// Mandatory sequence fields must hold at least one element after normalization.
pub fn require_non_empty<T>(field: &str, items: Vec<T>, what: &str) -> Result<Vec<T>, ToolError> {
    if items.is_empty() {
        return Err(ToolError::validation(
            field,
            format!("{field} must contain at least one {what}"),
        ));
    }
    Ok(items)
}

/// Inclusive numeric bounds check for paging parameters.
pub fn check_range(field: &str, value: i64, min: i64, max: Option<i64>) -> Result<i64, ToolError> {
    let too_small = value < min;
    let too_large = max.is_some_and(|max| value > max);
    if too_small || too_large {
        let message = match max {
            Some(max) => format!("{field} must be between {min} and {max}"),
            None => format!("{field} must be {min} or greater"),
        };
        return Err(ToolError::validation(field, message));
    }
    Ok(value)
}
