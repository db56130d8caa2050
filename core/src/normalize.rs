//! Parameter normalization for list-shaped tool arguments.
//!
//! Agents send list parameters either as native JSON arrays or as JSON-encoded
//! strings (`'["a", "b"]'`), and occasionally as bare comma-separated text.
//! Everything is collapsed into a native `Vec` here, at the boundary, so tool
//! code never branches on the wire representation.

use serde_json::{Map, Value};

use crate::error::ToolError;

/// A list-shaped argument as it arrived, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum SequenceInput {
    Raw(String),
    Parsed(Vec<Value>),
}

/// What to do when a string-encoded list is not valid JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    /// Split on commas, trim, drop empty tokens.
    CommaSplit,
    /// Reject with a validation error.
    Strict,
}

impl SequenceInput {
    /// Reads `key` from a request map. Absent and `null` both mean "not supplied".
    pub fn from_arg(args: &Map<String, Value>, key: &str) -> Result<Option<Self>, ToolError> {
        match args.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => Self::from_value(key, value).map(Some),
        }
    }

    pub fn from_value(field: &str, value: &Value) -> Result<Self, ToolError> {
        match value {
            Value::String(raw) => Ok(Self::Raw(raw.clone())),
            Value::Array(items) => Ok(Self::Parsed(items.clone())),
            _ => Err(ToolError::validation(
                field,
                format!("{field} must be a list or a JSON-encoded list string"),
            )),
        }
    }
}

/// Collapses a list argument into its native form without touching elements.
pub fn normalize_sequence(
    field: &str,
    input: SequenceInput,
    fallback: Fallback,
) -> Result<Vec<Value>, ToolError> {
    let raw = match input {
        SequenceInput::Parsed(items) => return Ok(items),
        SequenceInput::Raw(raw) => raw,
    };

    let decoded = match serde_json::from_str::<Value>(&raw) {
        Ok(value) => value,
        Err(err) => match fallback {
            Fallback::CommaSplit => {
                tracing::debug!(field, "list argument is not JSON; splitting on commas");
                return Ok(split_comma_list(&raw));
            }
            Fallback::Strict => {
                return Err(ToolError::validation(
                    field,
                    format!("Invalid JSON for {field}: {err}"),
                ));
            }
        },
    };

    match decoded {
        Value::Array(items) => Ok(items),
        _ => Err(ToolError::validation(
            field,
            format!("{field} must be a list, got a JSON {}", json_kind(&decoded)),
        )),
    }
}

/// Normalizes a list of identifiers or names. Every element must be a scalar;
/// numbers and booleans are stringified, surrounding whitespace is trimmed and
/// blank entries are dropped.
pub fn normalize_string_list(
    field: &str,
    input: SequenceInput,
    fallback: Fallback,
) -> Result<Vec<String>, ToolError> {
    let items = normalize_sequence(field, input, fallback)?;
    let mut out = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let text = match item {
            Value::String(v) => v.trim().to_string(),
            Value::Number(v) => v.to_string(),
            Value::Bool(v) => v.to_string(),
            _ => {
                return Err(ToolError::validation(
                    field,
                    format!(
                        "{field}[{index}] must be a string or number, got a JSON {}",
                        json_kind(item)
                    ),
                ));
            }
        };
        if !text.is_empty() {
            out.push(text);
        }
    }
    Ok(out)
}

/// Reads and normalizes an optional string-list argument in one step.
/// An empty list after normalization is reported as "not supplied".
pub fn optional_string_list(
    args: &Map<String, Value>,
    key: &str,
    fallback: Fallback,
) -> Result<Option<Vec<String>>, ToolError> {
    let Some(input) = SequenceInput::from_arg(args, key)? else {
        return Ok(None);
    };
    let items = normalize_string_list(key, input, fallback)?;
    Ok(if items.is_empty() { None } else { Some(items) })
}

fn split_comma_list(raw: &str) -> Vec<Value> {
    raw.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| Value::String(token.to_string()))
        .collect()
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
