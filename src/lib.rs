//! usql-gate - read-only SQL through usql.
//!
//! This library exposes the core modules for use in integration tests.

pub mod cli;
pub mod config;
pub mod connection;
pub mod error;
pub mod handler;
pub mod install;
pub mod logging;
pub mod platform;
pub mod query;
pub mod safety;
pub mod server;
