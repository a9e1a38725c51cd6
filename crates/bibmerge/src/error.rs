//! Error types for the bibliography pipeline.
//!
//! Uses `thiserror` for structured error handling with automatic `From` implementations.
//! Every fatal stage failure ends up in [`PipelineError`]; recoverable canonicalization
//! misses are plain data (see [`crate::normalize::CanonicalizationMiss`]).

use std::path::PathBuf;

use crate::models::SourceRole;

/// Errors from the source acquisition layer.
#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    /// HTTP transport error (connection, DNS, TLS, body decoding, etc.)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Middleware error (retry exhaustion, etc.)
    #[error("Middleware error: {0}")]
    Middleware(#[from] reqwest_middleware::Error),

    /// Source does not exist (404 response)
    #[error("Source not found: {url}")]
    NotFound {
        /// Requested URL
        url: String,
    },

    /// Server error (5xx response)
    #[error("Server error ({status}) for {url}: {message}")]
    Server {
        /// Requested URL
        url: String,
        /// HTTP status code
        status: u16,
        /// Response body or message
        message: String,
    },

    /// Any other non-success status
    #[error("Unexpected status {status} for {url}: {message}")]
    UnexpectedStatus {
        /// Requested URL
        url: String,
        /// HTTP status code
        status: u16,
        /// Response body or message
        message: String,
    },
}

impl FetchError {
    /// Create a not found error.
    #[must_use]
    pub fn not_found(url: impl Into<String>) -> Self {
        Self::NotFound { url: url.into() }
    }

    /// Create a server error.
    #[must_use]
    pub fn server(url: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        Self::Server { url: url.into(), status, message: message.into() }
    }

    /// Returns true if a later attempt could succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::Server { .. } | Self::Middleware(_) => true,
            Self::NotFound { .. } | Self::UnexpectedStatus { .. } => false,
        }
    }
}

/// What went wrong while reading the entry-format text.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// Input ended inside an entry.
    #[error("unexpected end of input")]
    UnexpectedEof,

    /// A character that does not fit the grammar at this point.
    #[error("expected {expected}, found '{found}'")]
    Unexpected {
        /// What the grammar allows here
        expected: &'static str,
        /// What was actually read
        found: char,
    },

    /// An opening delimiter with no matching closer.
    #[error("unbalanced '{open}'")]
    Unbalanced {
        /// The delimiter that was never closed
        open: char,
    },

    /// An entry without a citation key.
    #[error("entry has no citation key")]
    MissingKey,

    /// A macro referenced before (or without) its `@string` definition.
    #[error("undefined macro '{0}'")]
    UndefinedMacro(String),

    /// The same field appears twice in one entry.
    #[error("field '{field}' appears twice in entry '{key}'")]
    DuplicateField {
        /// Citation key of the entry
        key: String,
        /// Repeated field name
        field: String,
    },

    /// The same citation key is used by two entries.
    #[error("duplicate citation key '{0}'")]
    DuplicateKey(String),
}

/// Structurally invalid entry text. Always fatal.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("malformed entry at line {line}, column {column}: {kind}")]
pub struct MalformedEntryError {
    /// What went wrong
    pub kind: ParseErrorKind,
    /// 1-based line of the offending position
    pub line: usize,
    /// 1-based column (in characters) of the offending position
    pub column: usize,
}

/// Two sources handed to the merge stage under the wrong roles.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("expected the {expected} source, got the {found} source")]
pub struct SourceOrderError {
    /// Role the position requires
    pub expected: SourceRole,
    /// Role the source carried
    pub found: SourceRole,
}

/// A field-selection spec that cannot be projected.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidFieldSpecError {
    /// No field names at all.
    #[error("field spec is empty")]
    Empty,

    /// A name listed more than once.
    #[error("field '{0}' is listed more than once")]
    Duplicate(String),

    /// A name that can never occur as a field.
    #[error("'{0}' is not a valid field name")]
    InvalidName(String),
}

/// A record that could not be encoded as a JSON line.
#[derive(thiserror::Error, Debug)]
#[error("record '{key}' could not be serialized: {source}")]
pub struct SerializationError {
    /// Citation key of the record
    pub key: String,
    /// Encoder failure
    #[source]
    pub source: serde_json::Error,
}

/// Errors from writing the output file.
#[derive(thiserror::Error, Debug)]
pub enum EmitError {
    /// Encoding failed before anything was written.
    #[error(transparent)]
    Serialization(#[from] SerializationError),

    /// Writing or renaming the output file failed.
    #[error("Failed to write {}: {source}", .path.display())]
    Io {
        /// Destination path
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },
}

impl EmitError {
    /// Create an I/O error for the given destination.
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}

/// Errors from the dataset publication step.
#[derive(thiserror::Error, Debug)]
pub enum PublishError {
    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Middleware error
    #[error("Middleware error: {0}")]
    Middleware(#[from] reqwest_middleware::Error),

    /// Reading the local artifact failed
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        /// Local artifact path
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// Credential rejected (401/403 response)
    #[error("Unauthorized ({status}): {message}")]
    Unauthorized {
        /// HTTP status code
        status: u16,
        /// Response body or message
        message: String,
    },

    /// Dataset does not exist (404 response)
    #[error("Dataset not found: {dataset}")]
    NotFound {
        /// Dataset identifier
        dataset: String,
    },

    /// Server error (5xx response)
    #[error("Server error ({status}): {message}")]
    Server {
        /// HTTP status code
        status: u16,
        /// Response body or message
        message: String,
    },

    /// Unexpected HTTP status
    #[error("Unexpected status {status}: {message}")]
    UnexpectedStatus {
        /// HTTP status code
        status: u16,
        /// Response body or message
        message: String,
    },

    /// The large-file transfer was refused or could not be completed
    #[error("LFS upload failed: {0}")]
    Lfs(String),
}

impl PublishError {
    /// Create an LFS transfer error.
    #[must_use]
    pub fn lfs(message: impl Into<String>) -> Self {
        Self::Lfs(message.into())
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Server { .. } | Self::Middleware(_))
    }
}

/// Fatal pipeline failures. A run that returns one of these produced no output.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    /// Configuration rejected before any work started
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Projection spec rejected before any work started
    #[error("Invalid field spec: {0}")]
    InvalidFieldSpec(#[from] InvalidFieldSpecError),

    /// A source could not be acquired
    #[error("Failed to fetch {role} source: {source}")]
    Fetch {
        /// Which source failed
        role: SourceRole,
        /// Transport failure
        #[source]
        source: FetchError,
    },

    /// Sources passed to the merge stage in the wrong order
    #[error("Sources out of order: {0}")]
    SourceOrder(#[from] SourceOrderError),

    /// The merged text is not valid entry-format text
    #[error(transparent)]
    MalformedEntry(#[from] MalformedEntryError),

    /// The output file could not be produced
    #[error(transparent)]
    Emit(#[from] EmitError),
}

impl PipelineError {
    /// Create a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Wrap a fetch failure with the role of the source that failed.
    #[must_use]
    pub const fn fetch(role: SourceRole, source: FetchError) -> Self {
        Self::Fetch { role, source }
    }

    /// True for failures that indicate a defect rather than bad input.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::SourceOrder(_) | Self::Emit(EmitError::Serialization(_)))
    }

    /// Convert to a user-friendly message for the CLI.
    #[must_use]
    pub fn to_user_message(&self) -> String {
        match self {
            Self::Fetch { role, source: FetchError::NotFound { url } } => {
                format!("The {role} source was not found at {url}. Check the URL.")
            }
            Self::MalformedEntry(e) => {
                format!("Bibliography is malformed ({e}). Nothing was written.")
            }
            Self::InvalidFieldSpec(e) => format!("Invalid --fields value: {e}"),
            Self::SourceOrder(e) => format!("Internal error, please report it: {e}"),
            Self::Emit(EmitError::Serialization(e)) => {
                format!("Internal error, please report it: {e}")
            }
            _ => self.to_string(),
        }
    }
}

/// Result type alias for acquisition.
pub type FetchResult<T> = Result<T, FetchError>;

/// Result type alias for publication.
pub type PublishResult<T> = Result<T, PublishError>;

/// Result type alias for whole-pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;
