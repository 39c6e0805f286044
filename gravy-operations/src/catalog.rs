//! The standard operation declarations for the three interfaces
//! `gravy-providers` implements. One list per interface, registered once
//! at startup via `Registry::declare_operations` — analogous to the
//! teacher's `main.rs` "Step N" service wiring, but for addon operations
//! instead of HTTP services.

use gravy_domain::Capabilities;

use crate::declaration::{ExecutionMode, Interface, OperationDeclaration, Param, ParamType};

fn op(interface: Interface, name: &str, capability: Capabilities, params: Vec<Param>, result_type: ParamType) -> OperationDeclaration {
    OperationDeclaration { interface, name: name.to_string(), capability, params, result_type, execution_mode: ExecutionMode::Immediate }
}

fn param(name: &str, param_type: ParamType) -> Param {
    Param { name: name.to_string(), param_type }
}

pub fn storage_operations() -> Vec<OperationDeclaration> {
    vec![
        op(
            Interface::Storage,
            "get_root_items",
            Capabilities::ACCESS,
            vec![param("page_cursor", ParamType::Optional { inner: Box::new(ParamType::Cursor) })],
            ParamType::Object { fields: vec![] },
        ),
        op(
            Interface::Storage,
            "list_child_items",
            Capabilities::ACCESS,
            vec![
                param("item_id", ParamType::ItemId),
                param("page_cursor", ParamType::Optional { inner: Box::new(ParamType::Cursor) }),
            ],
            ParamType::Object { fields: vec![] },
        ),
        op(
            Interface::Storage,
            "delete_item",
            Capabilities::UPDATE,
            vec![param("item_id", ParamType::ItemId)],
            ParamType::Object { fields: vec![] },
        ),
    ]
}

pub fn citation_operations() -> Vec<OperationDeclaration> {
    vec![
        op(Interface::Citation, "get_external_account_id", Capabilities::ACCESS, vec![], ParamType::String),
        op(
            Interface::Citation,
            "list_root_collections",
            Capabilities::ACCESS,
            vec![],
            ParamType::Object { fields: vec![] },
        ),
        op(
            Interface::Citation,
            "list_collection_items",
            Capabilities::ACCESS,
            vec![param("collection_id", ParamType::ItemId)],
            ParamType::Object { fields: vec![] },
        ),
    ]
}

pub fn link_operations() -> Vec<OperationDeclaration> {
    vec![
        op(
            Interface::Link,
            "build_url_for_id",
            Capabilities::ACCESS,
            vec![param("item_id", ParamType::ItemId)],
            ParamType::String,
        ),
        op(Interface::Link, "get_external_account_id", Capabilities::ACCESS, vec![], ParamType::String),
        op(
            Interface::Link,
            "list_root_items",
            Capabilities::ACCESS,
            vec![param("page_cursor", ParamType::Optional { inner: Box::new(ParamType::Cursor) })],
            ParamType::Object { fields: vec![] },
        ),
        op(
            Interface::Link,
            "list_child_items",
            Capabilities::ACCESS,
            vec![
                param("item_id", ParamType::ItemId),
                param("page_cursor", ParamType::Optional { inner: Box::new(ParamType::Cursor) }),
            ],
            ParamType::Object { fields: vec![] },
        ),
    ]
}

/// Every operation declared by the interfaces `gravy-providers` covers.
/// Fed to `Registry::declare_operations` once at startup.
pub fn standard_operations() -> Vec<OperationDeclaration> {
    let mut all = storage_operations();
    all.extend(citation_operations());
    all.extend(link_operations());
    all
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_operations_cover_all_three_interfaces() {
        let ops = standard_operations();
        assert!(ops.iter().any(|o| o.interface == Interface::Storage));
        assert!(ops.iter().any(|o| o.interface == Interface::Citation));
        assert!(ops.iter().any(|o| o.interface == Interface::Link));
        assert_eq!(ops.len(), 10);
    }

    #[test]
    fn test_delete_item_is_the_only_update_capability_operation() {
        let ops = standard_operations();
        let update_ops: Vec<_> = ops.iter().filter(|o| o.capability == Capabilities::UPDATE).collect();
        assert_eq!(update_ops.len(), 1);
        assert_eq!(update_ops[0].name, "delete_item");
        assert_eq!(update_ops[0].interface, Interface::Storage);
    }
}
