//! Lexical checks behind the read-only gate.

use std::sync::OnceLock;

use regex::Regex;

use super::{Rejection, ValidationOutcome, FORBIDDEN_KEYWORDS, READ_ONLY_PREFIXES};

/// Compiled patterns for the read-only gate.
#[derive(Debug)]
pub struct QueryValidator {
    read_only_start: Regex,
    forbidden: Regex,
}

impl Default for QueryValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryValidator {
    /// Creates a validator from the keyword tables.
    pub fn new() -> Self {
        let read_only_start = format!(r"(?i)^\s*({})\b", READ_ONLY_PREFIXES.join("|"));
        let forbidden = format!(r"(?i)\b({})\b", FORBIDDEN_KEYWORDS.join("|"));

        Self {
            read_only_start: Regex::new(&read_only_start).expect("read-only prefix pattern"),
            forbidden: Regex::new(&forbidden).expect("forbidden keyword pattern"),
        }
    }

    /// Runs the checks in order; the first failure wins.
    pub fn validate<'a>(&self, query: &'a str) -> ValidationOutcome<'a> {
        if query.trim().is_empty() {
            return ValidationOutcome::Rejected(Rejection::EmptyQuery);
        }

        if !self.read_only_start.is_match(query) {
            return ValidationOutcome::Rejected(Rejection::NotReadOnly);
        }

        if self.forbidden.is_match(query) {
            return ValidationOutcome::Rejected(Rejection::ForbiddenKeyword);
        }

        if query.contains(';') {
            return ValidationOutcome::Rejected(Rejection::MultipleStatements);
        }

        ValidationOutcome::Accepted(query)
    }
}

/// Validates a query with a shared, lazily compiled validator.
pub fn validate(query: &str) -> ValidationOutcome<'_> {
    static VALIDATOR: OnceLock<QueryValidator> = OnceLock::new();
    VALIDATOR.get_or_init(QueryValidator::new).validate(query)
}
