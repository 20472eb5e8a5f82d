//! Error types for policy loading and request handling.

use std::path::PathBuf;

use thiserror::Error;

/// Error returned when a policy cannot be loaded or decoded.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// The policy file could not be read.
    #[error("Failed to read policy file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A statement in the policy text is malformed.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// A serialized policy document could not be decoded.
    #[error("Failed to decode policy document: {0}")]
    Json(#[from] serde_json::Error),

    /// A decoded policy document violates a model invariant.
    #[error("Invalid policy document: {0}")]
    Invalid(String),
}

/// Result type for policy loading.
pub type Result<T> = std::result::Result<T, PolicyError>;

/// A malformed policy statement. Loading stops at the first one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {kind}: `{text}`")]
pub struct ParseError {
    /// 1-based line number in the policy text.
    pub line: usize,
    /// The raw line as it appeared in the input.
    pub text: String,
    /// What is wrong with the statement.
    pub kind: ParseErrorKind,
}

/// The specific problem found in a malformed statement.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    #[error("unknown statement (expected userAttrib, resourceAttrib or rule)")]
    UnknownStatement,

    #[error("statement arguments must be enclosed in parentheses")]
    MissingParenthesis,

    #[error("unexpected text `{0}` after the closing parenthesis")]
    TrailingText(String),

    #[error("entity identifier is empty")]
    MissingIdentifier,

    #[error("attribute `{0}` is not of the form key=value")]
    MissingAssignment(String),

    #[error("identifier attribute `{attribute}` is `{found}` but the entity is `{expected}`")]
    IdentifierMismatch {
        attribute: String,
        expected: String,
        found: String,
    },

    #[error("rule has {found} `;`-separated sections, expected 4")]
    SectionCount { found: usize },

    #[error("clause `{0}` has no operator")]
    MissingOperator(String),

    #[error("clause `{0}` has an empty attribute name")]
    EmptyOperand(String),

    #[error("set literal `{0}` is not terminated by `}}`")]
    UnterminatedSet(String),
}

/// A batch request line that is not of the form `subject,object,action`.
///
/// Rejected individually; the rest of the batch is still evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: malformed request `{text}`: {reason}")]
pub struct RequestError {
    /// 1-based line number in the request input.
    pub line: usize,
    /// The raw line as it appeared in the input.
    pub text: String,
    /// Why the line was rejected.
    pub reason: String,
}

/// A permission query naming something the policy does not contain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("user '{0}' does not exist")]
    UnknownSubject(String),

    #[error("resource '{0}' does not exist")]
    UnknownObject(String),

    #[error("action '{0}' is not granted by any rule")]
    UnknownAction(String),
}
