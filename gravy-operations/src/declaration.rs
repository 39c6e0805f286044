//! The static `OperationDeclaration` shape (§3, §4.4): one per addon
//! interface method, shared across every provider that implements it.

use gravy_domain::Capabilities;
use serde::{Deserialize, Serialize};

/// The addon interfaces a provider implementation declares against.
/// New interfaces are added here, not invented per-provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interface {
    Storage,
    Citation,
    Compute,
    Link,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    Immediate,
    Redirect,
    Deferred,
}

/// A semantic parameter/result type an operation's JSON schema (§6) is
/// derived from. Intentionally small: operations in this domain pass
/// item ids, paths, and small structured payloads, never arbitrary blobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParamType {
    String,
    Integer,
    Boolean,
    ItemId,
    Cursor,
    Optional { inner: Box<ParamType> },
    Object { fields: Vec<(String, ParamType)> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub param_type: ParamType,
}

/// One operation, as declared by an interface (e.g. `storage:list_child_items`).
/// Immutable after process start (§3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationDeclaration {
    pub interface: Interface,
    pub name: String,
    pub capability: Capabilities,
    pub params: Vec<Param>,
    pub result_type: ParamType,
    pub execution_mode: ExecutionMode,
}

impl OperationDeclaration {
    /// The `"<IMP>:<operation>"` wire identifier (§6), where `<IMP>` is
    /// the interface name rather than the provider — operations are
    /// declared once per interface and shared by every implementer.
    pub fn qualified_name(&self) -> String {
        let interface = match self.interface {
            Interface::Storage => "storage",
            Interface::Citation => "citation",
            Interface::Compute => "compute",
            Interface::Link => "link",
        };
        format!("{interface}:{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qualified_name_combines_interface_and_operation() {
        let decl = OperationDeclaration {
            interface: Interface::Storage,
            name: "list_child_items".to_string(),
            capability: Capabilities::ACCESS,
            params: vec![Param { name: "item_id".to_string(), param_type: ParamType::ItemId }],
            result_type: ParamType::String,
            execution_mode: ExecutionMode::Immediate,
        };
        assert_eq!(decl.qualified_name(), "storage:list_child_items");
    }
}
