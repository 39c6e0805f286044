//! Pagination & Cursor Model (C7, §4.7).
//!
//! Providers paginate in incompatible ways — some page by numeric
//! offset, some by an opaque marker the API hands back. Rather than
//! modeling that as a base `Cursor` class with per-provider subclasses
//! (per REDESIGN FLAGS "Cursor unification"), this is a two-variant sum
//! type with one `serialize`/`parse` pair shared by both.

pub mod cursor;
pub mod sample;

pub use cursor::{Cursor, InvalidCursor};
pub use sample::ItemSampleResult;
