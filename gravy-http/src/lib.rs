//! # GravyValet — Constrained HTTP Requestor (C1)
//!
//! The only way a provider implementation can reach the network. A
//! [`Requestor`] is constructed with a prefix URL and a credentials
//! reference; every relative path it is asked to send against is resolved
//! and checked against that prefix before a single byte leaves the
//! process (see [`url::resolve`]).
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`url`] | Prefix-pinned relative-URL resolution |
//! | [`requestor`] | The `Requestor` type and its per-method bindings |
//! | [`response`] | Response handle with lazy JSON/text parsing |
//! | [`query`] | Percent-encoded query-string construction |

pub mod query;
pub mod requestor;
pub mod response;
pub mod url;

pub use requestor::{CredentialsProvider, HttpError, Requestor};
pub use response::ResponseHandle;
