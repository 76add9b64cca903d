//! Read-only query gate.
//!
//! A lexical allow/deny check that restricts submitted text to statement
//! shapes believed to be non-mutating. This is not a SQL parser: keywords are
//! matched anywhere in the text, including inside string literals and
//! comments, so some legitimate queries are refused. Treat it as one layer of
//! defense and pair it with a read-only database role.

mod validator;

pub use validator::{validate, QueryValidator};

use std::fmt;

/// Statement keywords a query may start with.
pub const READ_ONLY_PREFIXES: &[&str] = &["WITH", "SELECT", "EXPLAIN"];

/// Keywords that are refused anywhere in the query text.
pub const FORBIDDEN_KEYWORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "DROP", "ALTER", "CREATE", "TRUNCATE", "REPLACE", "MERGE",
];

/// Why a query was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rejection {
    /// The query is empty or only whitespace.
    EmptyQuery,
    /// The query does not start with WITH, SELECT or EXPLAIN.
    NotReadOnly,
    /// The query mentions a DDL/DML keyword.
    ForbiddenKeyword,
    /// The query contains a `;`.
    MultipleStatements,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyQuery => write!(f, "Query cannot be empty"),
            Self::NotReadOnly => {
                write!(f, "Only read-only queries are allowed (SELECT, WITH, EXPLAIN)")
            }
            Self::ForbiddenKeyword => write!(f, "DDL/DML queries are not allowed"),
            Self::MultipleStatements => write!(f, "Multiple statements (;) are not allowed"),
        }
    }
}

/// Result of running a query through the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome<'a> {
    /// The query passed every check; the text is returned untouched.
    Accepted(&'a str),
    /// The query was refused for the given reason.
    Rejected(Rejection),
}

impl<'a> ValidationOutcome<'a> {
    /// Returns true if the query was accepted.
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }

    /// Converts the outcome into a `Result`, for use with `?`.
    pub fn into_result(self) -> Result<&'a str, Rejection> {
        match self {
            Self::Accepted(query) => Ok(query),
            Self::Rejected(reason) => Err(reason),
        }
    }
}
