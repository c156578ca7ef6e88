//! Error types for the WPILog decoder.

use thiserror::Error;

/// Result type alias for WPILog operations.
pub type Result<T> = std::result::Result<T, WpilogError>;

/// Errors that can occur while decoding a WPILog stream.
#[derive(Error, Debug)]
pub enum WpilogError {
    /// Malformed file: bad magic, truncated record, invalid control tag, bad boolean byte
    #[error("Invalid WPILOG format: {0}")]
    InvalidFormat(String),

    /// The byte source ended before the requested number of bytes was available
    #[error("Stream exhausted: requested {requested} bytes, only {read} available")]
    StreamExhausted { requested: usize, read: usize },

    /// A data record references an entry ID with no active Start registration
    #[error("No entry registered for entry ID {0}")]
    UnregisteredEntry(u32),

    /// A struct schema closes a dependency cycle
    #[error("Cycle detected in the struct dependency graph for '{0}'")]
    DependencyCycle(String),

    /// A feature the decoder deliberately does not support (bit-field members)
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    /// A struct declaration is syntactically valid but semantically out of range
    #[error("Invalid struct declaration: {0}")]
    DeclarationRange(String),

    /// A struct declaration could not be lexed or parsed
    #[error("Struct declaration syntax error: {0}")]
    DeclarationSyntax(String),

    /// Payload parsing error (e.g., wrong payload size for the entry type)
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Struct definition lookup failed
    #[error("Schema error: {0}")]
    SchemaError(String),

    /// MessagePack payload could not be decoded
    #[error("MsgPack decode error: {0}")]
    MsgPack(#[from] rmpv::decode::Error),

    /// I/O error occurred while reading the byte source
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WpilogError {
    /// Converts stream exhaustion in the middle of a record into a format error.
    ///
    /// Exhaustion is only a clean end-of-file at a record boundary; anywhere else
    /// the file was truncated.
    pub(crate) fn truncated(self, context: &str) -> Self {
        match self {
            WpilogError::StreamExhausted { requested, read } => WpilogError::InvalidFormat(format!(
                "{} truncated: expected {} bytes, found {}",
                context, requested, read
            )),
            other => other,
        }
    }
}
