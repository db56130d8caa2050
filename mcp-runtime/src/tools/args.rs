use serde_json::{Map, Value};
use zia_mcp_core::normalize::{self, normalize_string_list};
use zia_mcp_core::validate::require_non_empty;
use zia_mcp_core::{Fallback, SequenceInput, ToolError};

pub fn arg_bool(args: &Map<String, Value>, key: &str, default: bool) -> Result<bool, ToolError> {
    Ok(arg_optional_bool(args, key)?.unwrap_or(default))
}

pub fn arg_string(args: &Map<String, Value>, key: &str, default: &str) -> Result<String, ToolError> {
    Ok(arg_optional_string(args, key)?.unwrap_or_else(|| default.to_string()))
}

pub fn required_string(args: &Map<String, Value>, key: &str) -> Result<String, ToolError> {
    let value = args
        .get(key)
        .filter(|value| !value.is_null())
        .ok_or_else(|| ToolError::validation(key, format!("Missing required field '{key}'")))?;
    match value {
        Value::String(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        Value::String(_) => Err(ToolError::validation(key, format!("'{key}' must not be empty"))),
        _ => Err(ToolError::validation(key, format!("'{key}' must be a string"))),
    }
}

/// Identifiers arrive as strings or integers; both are carried as text.
pub fn required_id(args: &Map<String, Value>, key: &str) -> Result<String, ToolError> {
    match args.get(key) {
        Some(Value::Number(n)) if n.is_i64() || n.is_u64() => Ok(n.to_string()),
        Some(Value::Number(_)) => Err(ToolError::validation(
            key,
            format!("'{key}' must be a string or an integer"),
        )),
        _ => required_string(args, key),
    }
}

pub fn arg_optional_string(args: &Map<String, Value>, key: &str) -> Result<Option<String>, ToolError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(v)) if v.trim().is_empty() => Ok(None),
        Some(Value::String(v)) => Ok(Some(v.clone())),
        Some(_) => Err(ToolError::validation(key, format!("'{key}' must be a string"))),
    }
}

/// Booleans also accept their string spellings, which some agents send.
pub fn arg_optional_bool(args: &Map<String, Value>, key: &str) -> Result<Option<bool>, ToolError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(v)) => Ok(Some(*v)),
        Some(Value::String(v)) if v.eq_ignore_ascii_case("true") => Ok(Some(true)),
        Some(Value::String(v)) if v.eq_ignore_ascii_case("false") => Ok(Some(false)),
        Some(_) => Err(ToolError::validation(key, format!("'{key}' must be a boolean"))),
    }
}

pub fn arg_optional_i64(args: &Map<String, Value>, key: &str) -> Result<Option<i64>, ToolError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| ToolError::validation(key, format!("'{key}' must be an integer"))),
        Some(_) => Err(ToolError::validation(key, format!("'{key}' must be an integer"))),
    }
}

/// A mandatory flat list (identifiers, names, URLs) holding at least one entry.
pub fn required_string_list(
    args: &Map<String, Value>,
    key: &str,
    what: &str,
) -> Result<Vec<String>, ToolError> {
    let input = SequenceInput::from_arg(args, key)?
        .ok_or_else(|| ToolError::validation(key, format!("Missing required field '{key}'")))?;
    let items = normalize_string_list(key, input, Fallback::CommaSplit)?;
    require_non_empty(key, items, what)
}

/// An optional flat list; empty after normalization means "leave unchanged".
pub fn optional_string_list(
    args: &Map<String, Value>,
    key: &str,
) -> Result<Option<Vec<String>>, ToolError> {
    normalize::optional_string_list(args, key, Fallback::CommaSplit)
}

/// Accepts an object map, a `[{key, value}]` array, or either one JSON-encoded.
pub fn parse_query_pairs(
    field: &str,
    query_value: Option<&Value>,
) -> Result<Vec<(String, String)>, ToolError> {
    let decoded;
    let query_value = match query_value {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::String(raw)) if raw.trim().is_empty() => return Ok(Vec::new()),
        Some(Value::String(raw)) => {
            decoded = serde_json::from_str::<Value>(raw).map_err(|e| {
                ToolError::validation(field, format!("Invalid JSON for {field}: {e}"))
            })?;
            &decoded
        }
        Some(other) => other,
    };

    match query_value {
        Value::Object(map) => {
            let mut out = Vec::with_capacity(map.len());
            for (k, v) in map {
                if v.is_null() {
                    continue;
                }
                out.push((k.clone(), scalar_to_string(v, field)?));
            }
            Ok(out)
        }
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                let obj = item.as_object().ok_or_else(|| {
                    ToolError::validation(
                        field,
                        format!("{field}[{index}] must be an object with key/value"),
                    )
                })?;
                let key = obj
                    .get("key")
                    .and_then(Value::as_str)
                    .filter(|s| !s.trim().is_empty())
                    .ok_or_else(|| {
                        ToolError::validation(
                            field,
                            format!("{field}[{index}].key must be a non-empty string"),
                        )
                    })?;
                let value = obj.get("value").ok_or_else(|| {
                    ToolError::validation(field, format!("{field}[{index}].value is required"))
                })?;
                out.push((key.to_string(), scalar_to_string(value, field)?));
            }
            Ok(out)
        }
        _ => Err(ToolError::validation(
            field,
            format!("'{field}' must be an object map or [{{key,value}}] array"),
        )),
    }
}

pub fn scalar_to_string(value: &Value, field: &str) -> Result<String, ToolError> {
    match value {
        Value::String(v) => Ok(v.clone()),
        Value::Number(v) => Ok(v.to_string()),
        Value::Bool(v) => Ok(v.to_string()),
        _ => Err(ToolError::validation(
            field,
            format!("'{field}' values must be scalar (string/number/bool)"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn required_id_accepts_strings_and_integers() {
        let a = args(json!({ "s": " 12345 ", "n": 159143, "f": 1.5, "e": "" }));
        assert_eq!(required_id(&a, "s").unwrap(), "12345");
        assert_eq!(required_id(&a, "n").unwrap(), "159143");
        assert!(required_id(&a, "f").is_err());
        assert_eq!(
            required_id(&a, "e").unwrap_err().message,
            "'e' must not be empty"
        );
        assert_eq!(
            required_id(&a, "missing").unwrap_err().message,
            "Missing required field 'missing'"
        );
    }

    #[test]
    fn optional_bool_accepts_string_spellings() {
        let a = args(json!({ "t": "True", "f": false, "bad": 1 }));
        assert_eq!(arg_optional_bool(&a, "t").unwrap(), Some(true));
        assert_eq!(arg_optional_bool(&a, "f").unwrap(), Some(false));
        assert!(arg_optional_bool(&a, "bad").is_err());
        assert!(arg_bool(&a, "missing", true).unwrap());
    }

    #[test]
    fn required_string_list_rejects_missing_and_empty() {
        let a = args(json!({ "urls": "[]", "apps": "[\"DROPBOX\", \"BOX\"]" }));
        assert_eq!(
            required_string_list(&a, "urls", "URL").unwrap_err().message,
            "urls must contain at least one URL"
        );
        assert!(required_string_list(&a, "missing", "URL").is_err());
        assert_eq!(
            required_string_list(&a, "apps", "cloud application").unwrap(),
            vec!["DROPBOX", "BOX"]
        );
    }

    #[test]
    fn parse_query_pairs_accepts_object_array_and_encoded_string() {
        let from_object = parse_query_pairs(
            "query_params",
            Some(&json!({ "customOnly": true, "skip": null })),
        )
        .unwrap();
        assert_eq!(from_object, vec![("customOnly".to_string(), "true".to_string())]);

        let from_array = parse_query_pairs(
            "query_params",
            Some(&json!([{ "key": "search", "value": "finance" }])),
        )
        .unwrap();
        assert_eq!(from_array, vec![("search".to_string(), "finance".to_string())]);

        let from_string =
            parse_query_pairs("query_params", Some(&json!("{\"search\": \"news\"}"))).unwrap();
        assert_eq!(from_string, vec![("search".to_string(), "news".to_string())]);

        assert!(parse_query_pairs("query_params", Some(&json!({ "nested": {} }))).is_err());
        assert!(parse_query_pairs("query_params", None).unwrap().is_empty());
    }
}
