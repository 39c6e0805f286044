//! The provider registry (§4.4): providers are listed by a short name
//! with a stable integer identifier used in persisted references, so the
//! table can be reorganized without rewriting `ExternalService` rows.

use crate::declaration::OperationDeclaration;
use gravy_domain::Capabilities;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

pub type ProviderId = i32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("provider id {id} is already registered to {existing_name:?}, cannot register {new_name:?}")]
    DuplicateId { id: ProviderId, existing_name: String, new_name: String },

    #[error("provider name {name:?} is already registered with id {existing_id}, cannot register under id {new_id}")]
    NameIdMismatch { name: String, existing_id: ProviderId, new_id: ProviderId },

    #[error("no provider registered with id {0}")]
    UnknownProviderId(ProviderId),
}

/// One provider's registration: its stable id, short name, and the
/// operation names it implements (a subset of what its interface
/// declares — §4.4 "determined structurally by whether its method is the
/// inherited default or overridden").
#[derive(Debug, Clone)]
struct ProviderEntry {
    id: ProviderId,
    name: String,
    implemented_operations: HashSet<String>,
}

/// The process-wide operation + provider table, built once at startup.
#[derive(Debug, Default)]
pub struct Registry {
    declarations: Vec<OperationDeclaration>,
    providers: HashMap<ProviderId, ProviderEntry>,
    name_to_id: HashMap<String, ProviderId>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the set of operations an interface declares. Called once
    /// per interface at startup, before any provider registers against it.
    pub fn declare_operations(&mut self, operations: impl IntoIterator<Item = OperationDeclaration>) {
        self.declarations.extend(operations);
    }

    /// Registers a provider under `name`/`id` with the set of operation
    /// names (unqualified — e.g. `"list_child_items"`, not
    /// `"storage:list_child_items"`) it implements.
    ///
    /// Re-registering the same `(name, id)` pair is a no-op (§4.4 "a
    /// third-party provider registering itself at startup" may run more
    /// than once, e.g. under test harnesses that re-initialize the
    /// registry). A colliding id under a different name, or vice versa,
    /// is a fatal error.
    pub fn register_provider(
        &mut self,
        id: ProviderId,
        name: &str,
        implemented_operations: impl IntoIterator<Item = String>,
    ) -> Result<(), RegistryError> {
        let implemented_operations: HashSet<String> = implemented_operations.into_iter().collect();

        if let Some(existing) = self.providers.get(&id) {
            if existing.name != name {
                return Err(RegistryError::DuplicateId {
                    id,
                    existing_name: existing.name.clone(),
                    new_name: name.to_string(),
                });
            }
            return Ok(());
        }
        if let Some(&existing_id) = self.name_to_id.get(name) {
            if existing_id != id {
                return Err(RegistryError::NameIdMismatch { name: name.to_string(), existing_id, new_id: id });
            }
        }

        self.providers.insert(id, ProviderEntry { id, name: name.to_string(), implemented_operations });
        self.name_to_id.insert(name.to_string(), id);
        Ok(())
    }

    /// The declared operations whose capability tag is in `caps` (§4.4).
    pub fn operations_for_capabilities(&self, caps: Capabilities) -> Vec<&OperationDeclaration> {
        self.declarations.iter().filter(|op| op.capability.is_subset_of(caps)).collect()
    }

    /// `implemented(provider) ∩ operations_for_capabilities(caps)` (§4.4):
    /// the operations a specific account may actually invoke.
    pub fn authorized_operations(
        &self,
        provider_id: ProviderId,
        caps: Capabilities,
    ) -> Result<Vec<&OperationDeclaration>, RegistryError> {
        let provider = self.providers.get(&provider_id).ok_or(RegistryError::UnknownProviderId(provider_id))?;
        Ok(self
            .operations_for_capabilities(caps)
            .into_iter()
            .filter(|op| provider.implemented_operations.contains(&op.name))
            .collect())
    }

    pub fn provider_id_for_name(&self, name: &str) -> Option<ProviderId> {
        self.name_to_id.get(name).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declaration::{ExecutionMode, Interface, ParamType};

    fn op(name: &str, capability: Capabilities) -> OperationDeclaration {
        OperationDeclaration {
            interface: Interface::Storage,
            name: name.to_string(),
            capability,
            params: vec![],
            result_type: ParamType::String,
            execution_mode: ExecutionMode::Immediate,
        }
    }

    #[test]
    fn test_duplicate_id_under_different_name_is_fatal() {
        let mut registry = Registry::new();
        registry.register_provider(1, "BOX", ["list_child_items".to_string()]).unwrap();
        let err = registry.register_provider(1, "DROPBOX", ["list_child_items".to_string()]).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateId { .. }));
    }

    #[test]
    fn test_reregistration_of_same_name_and_id_is_noop() {
        let mut registry = Registry::new();
        registry.register_provider(1, "BOX", ["list_child_items".to_string()]).unwrap();
        registry.register_provider(1, "BOX", ["list_child_items".to_string()]).unwrap();
        assert_eq!(registry.provider_id_for_name("BOX"), Some(1));
    }

    #[test]
    fn test_authorized_operations_intersects_capability_and_implementation() {
        let mut registry = Registry::new();
        registry.declare_operations([op("list_child_items", Capabilities::ACCESS), op("delete_item", Capabilities::UPDATE)]);
        registry.register_provider(1, "BOX", ["list_child_items".to_string()]).unwrap();

        let authorized = registry.authorized_operations(1, Capabilities::ACCESS | Capabilities::UPDATE).unwrap();
        assert_eq!(authorized.len(), 1);
        assert_eq!(authorized[0].name, "list_child_items");
    }

    #[test]
    fn test_capability_filter_excludes_ungranted_operations() {
        let mut registry = Registry::new();
        registry.declare_operations([op("list_child_items", Capabilities::ACCESS), op("delete_item", Capabilities::UPDATE)]);
        registry.register_provider(1, "BOX", ["list_child_items".to_string(), "delete_item".to_string()]).unwrap();

        let authorized = registry.authorized_operations(1, Capabilities::ACCESS).unwrap();
        assert_eq!(authorized.len(), 1);
        assert_eq!(authorized[0].name, "list_child_items");
    }
}
