//! Connection strings for usql-gate.
//!
//! Connection strings are loaded once at startup from `DB_CS_<n>` variables
//! and looked up by number for each request.

pub mod registry;

pub use registry::{redact, ConnectionRegistry, CONNECTION_VAR_PREFIX};
