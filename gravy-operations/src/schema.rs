//! JSON schema derivation from an operation's declared parameter types
//! (§4.4, §6: "The argument object for each operation is validated
//! against a JSON schema derived from the operation's signature").

use crate::declaration::{OperationDeclaration, ParamType};
use serde_json::{json, Value};

fn schema_for_type(param_type: &ParamType) -> Value {
    match param_type {
        ParamType::String | ParamType::ItemId | ParamType::Cursor => json!({"type": "string"}),
        ParamType::Integer => json!({"type": "integer"}),
        ParamType::Boolean => json!({"type": "boolean"}),
        ParamType::Optional { inner } => {
            let mut inner_schema = schema_for_type(inner);
            if let Value::Object(map) = &mut inner_schema {
                map.insert("nullable".to_string(), json!(true));
            }
            inner_schema
        }
        ParamType::Object { fields } => {
            let properties: serde_json::Map<String, Value> =
                fields.iter().map(|(name, field_type)| (name.clone(), schema_for_type(field_type))).collect();
            let required: Vec<&str> = fields
                .iter()
                .filter(|(_, field_type)| !matches!(field_type, ParamType::Optional { .. }))
                .map(|(name, _)| name.as_str())
                .collect();
            json!({"type": "object", "properties": properties, "required": required})
        }
    }
}

/// Builds the JSON schema an invocation's `input_arguments` object is
/// validated against before binding (§4.6 "Argument binding").
pub fn argument_schema(decl: &OperationDeclaration) -> Value {
    let properties: serde_json::Map<String, Value> =
        decl.params.iter().map(|param| (param.name.clone(), schema_for_type(&param.param_type))).collect();
    let required: Vec<&str> = decl
        .params
        .iter()
        .filter(|param| !matches!(param.param_type, ParamType::Optional { .. }))
        .map(|param| param.name.as_str())
        .collect();

    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declaration::{ExecutionMode, Interface, Param};
    use gravy_domain::Capabilities;

    #[test]
    fn test_required_params_excluded_when_optional() {
        let decl = OperationDeclaration {
            interface: Interface::Storage,
            name: "list_child_items".to_string(),
            capability: Capabilities::ACCESS,
            params: vec![
                Param { name: "item_id".to_string(), param_type: ParamType::ItemId },
                Param { name: "cursor".to_string(), param_type: ParamType::Optional { inner: Box::new(ParamType::Cursor) } },
            ],
            result_type: ParamType::String,
            execution_mode: ExecutionMode::Immediate,
        };
        let schema = argument_schema(&decl);
        let required = schema["required"].as_array().unwrap();
        assert!(required.contains(&json!("item_id")));
        assert!(!required.contains(&json!("cursor")));
        assert_eq!(schema["properties"]["cursor"]["nullable"], json!(true));
    }
}
