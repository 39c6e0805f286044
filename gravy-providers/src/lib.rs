//! Provider Implementations (C9, §4.9).
//!
//! Three representative leaves, one per addon interface, grounded on real
//! provider modules rather than invented: [`box_dot_com`] (storage),
//! [`zotero`] (citation), [`zenodo`] (link). Per REDESIGN FLAGS, each
//! defines exactly one canonical shape — the corpus carries conflicting
//! variants of some of these providers; this picks one rather than
//! modeling the conflict.

pub mod box_dot_com;
pub mod config;
pub mod interfaces;
pub mod zenodo;
pub mod zotero;

pub use config::ProviderConfig;
pub use interfaces::{CitationAddon, Item, ItemType, LinkAddon, ProviderError, StorageAddon};
