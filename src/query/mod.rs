//! Query execution for usql-gate.
//!
//! Isolates the usql subprocess so it can be tested without the handler.

pub mod executor;

pub use executor::{build_args, QueryRunner, DEFAULT_TIMEOUT_MS};
