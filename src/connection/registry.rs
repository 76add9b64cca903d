//! Immutable registry of numbered connection strings.

use std::collections::BTreeMap;

use tracing::debug;
use url::Url;

use crate::error::{GateError, Result};

/// Prefix of the environment variables holding connection strings.
pub const CONNECTION_VAR_PREFIX: &str = "DB_CS_";

/// Numbered connection strings, built once and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionRegistry {
    entries: BTreeMap<u32, String>,
}

impl ConnectionRegistry {
    /// Builds a registry from `(name, value)` pairs such as environment variables.
    ///
    /// Only names of the form `DB_CS_<digits>` with a positive number and a
    /// non-empty value are kept. Fails if nothing is left.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut entries = BTreeMap::new();

        for (name, value) in vars {
            let Some(number) = parse_var_number(name.as_ref()) else {
                continue;
            };
            let value = value.into();
            if value.is_empty() {
                debug!("Skipping empty connection string {}", name.as_ref());
                continue;
            }
            entries.insert(number, value);
        }

        if entries.is_empty() {
            return Err(GateError::config(
                "No connection strings provided! Use the DB_CS_1 as env var!",
            ));
        }

        Ok(Self { entries })
    }

    /// Builds a registry from the process environment.
    pub fn from_env() -> Result<Self> {
        // Non-UTF-8 variables cannot be DB_CS_ names we care about.
        Self::from_vars(std::env::vars_os().filter_map(|(name, value)| {
            Some((name.into_string().ok()?, value.into_string().ok()?))
        }))
    }

    /// Returns the connection string registered under `number`.
    pub fn get(&self, number: u32) -> Option<&str> {
        self.entries.get(&number).map(String::as_str)
    }

    /// Like [`get`](Self::get), but signals a missing entry as an error.
    pub fn resolve(&self, number: u32) -> Result<&str> {
        self.get(number)
            .ok_or(GateError::ConnectionNotFound(number))
    }

    /// Registered connection numbers in ascending order.
    pub fn numbers(&self) -> impl Iterator<Item = u32> + '_ {
        self.entries.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Extracts `<n>` from `DB_CS_<n>`; rejects signs, non-digits and zero.
fn parse_var_number(name: &str) -> Option<u32> {
    let suffix = name.strip_prefix(CONNECTION_VAR_PREFIX)?;
    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    suffix.parse::<u32>().ok().filter(|n| *n > 0)
}

/// Returns a log-safe form of a connection string with any password masked.
pub fn redact(connection_string: &str) -> String {
    match Url::parse(connection_string) {
        Ok(url) if url.cannot_be_a_base() => format!("{}:***", url.scheme()),
        Ok(mut url) if url.password().is_some() => {
            let _ = url.set_password(Some("***"));
            url.to_string()
        }
        Ok(url) => url.to_string(),
        // Not a URL (e.g. a DSN); only the scheme-ish prefix is safe to show.
        Err(_) => match connection_string.split_once(':') {
            Some((scheme, _)) => format!("{scheme}:***"),
            None => "***".to_string(),
        },
    }
}
