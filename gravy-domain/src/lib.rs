//! Account & Addon Domain Model (C8, §3 & §4.8).
//!
//! Entities map directly to tables the way `auth-service`'s domain module
//! does (`FromRow` structs, `New*` construction DTOs); the invariants in
//! §3/§4.8 are enforced in constructors and setters here rather than left
//! to callers, so nothing outside this crate can build an inconsistent
//! `AuthorizedAccount` or `ConfiguredAddon`.

pub mod capabilities;
pub mod entities;
pub mod repository;

pub use capabilities::Capabilities;
pub use entities::{
    AuthorizedAccount, ConfiguredAddon, ExternalCredentialsRecord, ExternalService, OAuth1ClientConfig,
    OAuth2ClientConfig, ResourceReference, UserReference,
};
