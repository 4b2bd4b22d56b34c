//! Error taxonomy for table queries
//!
//! Every failure a query can surface is one of these variants. API errors
//! carry the AWS error code parsed from the wire so callers (and the get
//! path) can suppress configured not-found codes.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The AWS API rejected the call. `code` is the AWS error code
    /// (e.g. `NoSuchEntity`) when one could be extracted.
    #[error("AWS API error {code:?} (http {status}): {message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// Network-level failure before an API response was obtained.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Malformed payload: undecodable response body, embedded JSON, or a
    /// value that cannot be coerced to its declared column type.
    #[error("malformed {context}: {message}")]
    Decode { context: String, message: String },

    /// A hydrator ran before its declared dependency produced a result.
    #[error("hydrator '{hydrator}' ran before its dependency '{dependency}'")]
    MissingDependency {
        hydrator: String,
        dependency: String,
    },

    /// A column or dependency references a hydrator the table never declared.
    #[error("unknown hydrator: {0}")]
    UnknownHydrator(String),

    /// The hydrator dependency graph is not acyclic.
    #[error("hydrate dependency cycle involving '{0}'")]
    HydrateCycle(String),

    #[error("unknown table: {0}")]
    UnknownTable(String),

    #[error("table '{0}' does not support get")]
    GetUnsupported(&'static str),

    #[error("missing key column '{0}'")]
    MissingKey(&'static str),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn decode(context: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Error::Decode {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// The AWS error code, if this is an API error that carried one.
    pub fn code(&self) -> Option<&str> {
        match self {
            Error::Api { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}
