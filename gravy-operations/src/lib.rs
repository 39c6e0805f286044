//! Operation Declaration & Registry (C4, §4.4).
//!
//! Where the Python original discovers operations by walking method
//! resolution order at import time (decorator-annotated methods, runtime
//! attribute lookup for "is this overridden"), this is a static table
//! built once at process start (§9 "Dynamic dispatch of operations").

pub mod catalog;
pub mod declaration;
pub mod registry;
pub mod schema;

pub use catalog::standard_operations;
pub use declaration::{ExecutionMode, Interface, OperationDeclaration, Param, ParamType};
pub use registry::{ProviderId, Registry};
