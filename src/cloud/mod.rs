//! Cloud integration for the platforms whose credentials the vault holds.
//!
//! This layer is orchestration glue: it calls platform REST APIs with plain
//! strings from the vault and reports plain results back. Nothing in here
//! touches vault internals or key material.

pub mod github;
pub mod probe;
