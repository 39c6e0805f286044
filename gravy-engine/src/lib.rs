//! Addon Instance Factory & Invocation Engine (C5 + C6, §4.5-§4.6).
//!
//! Wires the lower crates together: `gravy-domain` repositories for
//! account/service/addon/credentials lookups, `gravy-crypto` for
//! decrypting the credentials blob, `gravy-oauth` for refresh
//! coalescing, `gravy-http` for the outbound `Requestor`, and
//! `gravy-providers` for the actual addon call. Nothing here talks to a
//! provider's HTTP API directly; that's `gravy-providers`' job.

pub mod binding;
pub mod credentials_provider;
pub mod deferred;
pub mod engine;
pub mod factory;
pub mod handlers;
pub mod invocation;

pub use credentials_provider::{AccountCredentialsProvider, OAuth2ClientParams};
pub use deferred::{run_worker, DeferredQueue, InProcessDeferredQueue};
pub use engine::InvocationEngine;
pub use factory::{AddonInstanceFactory, ProviderInstance};
pub use invocation::{InvocationRepository, InvocationState, OperationInvocation};
