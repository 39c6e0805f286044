//! Argument binding (§4.6 "Argument binding"): the engine's JSON input
//! map is checked against an operation's declared parameter signature
//! before the implementation ever sees it. Unknown keys are rejected and
//! `Optional` parameters fill in `null` when absent; everything else
//! must be present and type-correct.

use gravy_operations::{OperationDeclaration, ParamType};
use serde_json::Value;
use shared::errors::ApiError;
use std::collections::HashMap;

fn type_matches(param_type: &ParamType, value: &Value) -> bool {
    match param_type {
        ParamType::String | ParamType::ItemId | ParamType::Cursor => value.is_string(),
        ParamType::Integer => value.is_i64() || value.is_u64(),
        ParamType::Boolean => value.is_boolean(),
        ParamType::Optional { inner } => value.is_null() || type_matches(inner, value),
        ParamType::Object { .. } => value.is_object(),
    }
}

/// Binds `input` (a JSON object) against `decl.params`, returning a
/// name → value map the handler can pull typed arguments out of.
pub fn bind_arguments(decl: &OperationDeclaration, input: &Value) -> Result<HashMap<String, Value>, ApiError> {
    let input_object = input.as_object().ok_or_else(|| ApiError::InvalidArguments {
        message: "arguments must be a JSON object".to_string(),
    })?;

    let known_names: std::collections::HashSet<&str> = decl.params.iter().map(|p| p.name.as_str()).collect();
    if let Some(unknown) = input_object.keys().find(|k| !known_names.contains(k.as_str())) {
        return Err(ApiError::InvalidArguments { message: format!("unknown argument {unknown:?}") });
    }

    let mut bound = HashMap::with_capacity(decl.params.len());
    for param in &decl.params {
        let value = match input_object.get(&param.name) {
            Some(v) => v.clone(),
            None => match &param.param_type {
                ParamType::Optional { .. } => Value::Null,
                _ => return Err(ApiError::InvalidArguments { message: format!("missing required argument {:?}", param.name) }),
            },
        };
        if !type_matches(&param.param_type, &value) {
            return Err(ApiError::InvalidArguments {
                message: format!("argument {:?} does not match its declared type", param.name),
            });
        }
        bound.insert(param.name.clone(), value);
    }
    Ok(bound)
}

pub fn string_arg(bound: &HashMap<String, Value>, name: &str) -> Result<String, ApiError> {
    bound
        .get(name)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| ApiError::InvalidArguments { message: format!("argument {name:?} must be a string") })
}

/// An `Optional { inner: Cursor }` argument defaults to the empty cursor
/// (start-of-listing) when omitted, matching every provider's
/// `page_cursor: &str` convention.
pub fn optional_string_arg(bound: &HashMap<String, Value>, name: &str) -> String {
    bound.get(name).and_then(|v| v.as_str()).unwrap_or("").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use gravy_domain::Capabilities;
    use gravy_operations::{ExecutionMode, Interface, Param};

    fn decl() -> OperationDeclaration {
        OperationDeclaration {
            interface: Interface::Storage,
            name: "list_child_items".to_string(),
            capability: Capabilities::ACCESS,
            params: vec![
                Param { name: "item_id".to_string(), param_type: ParamType::ItemId },
                Param { name: "page_cursor".to_string(), param_type: ParamType::Optional { inner: Box::new(ParamType::Cursor) } },
            ],
            result_type: ParamType::Object { fields: vec![] },
            execution_mode: ExecutionMode::Immediate,
        }
    }

    #[test]
    fn test_bind_rejects_unknown_key() {
        let input = serde_json::json!({"item_id": "1", "bogus": true});
        assert!(bind_arguments(&decl(), &input).is_err());
    }

    #[test]
    fn test_bind_rejects_missing_required() {
        let input = serde_json::json!({});
        assert!(bind_arguments(&decl(), &input).is_err());
    }

    #[test]
    fn test_bind_fills_optional_default() {
        let input = serde_json::json!({"item_id": "1"});
        let bound = bind_arguments(&decl(), &input).unwrap();
        assert_eq!(optional_string_arg(&bound, "page_cursor"), "");
    }

    #[test]
    fn test_bind_rejects_wrong_type() {
        let input = serde_json::json!({"item_id": 5});
        assert!(bind_arguments(&decl(), &input).is_err());
    }
}
