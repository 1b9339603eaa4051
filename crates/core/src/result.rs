//! Core result and error types.

use thiserror::Error;

/// Core error type encompassing all core module errors.
#[derive(Debug, Error)]
pub enum Error {
    /// A method name matched more than one method.
    #[error("ambiguous method name: {0}")]
    AmbiguousMethod(String),

    /// The decompiler could not produce output.
    #[error("decompilation failed: {0}")]
    Decompile(String),

    /// Failed to read file at the specified path.
    #[error("could not read file '{path}': {source}")]
    FileRead {
        /// The path to the file that could not be read.
        path: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Failed to parse textual IL at the specified line.
    #[error("il parse error at line {line}: {msg} ⇒ `{raw}`")]
    ParseError {
        /// The line number where parsing failed.
        line: usize,
        /// Description of the parsing error.
        msg: String,
        /// The raw content that failed to parse.
        raw: String,
    },

    /// A rewrite callback reported a failure.
    #[error("rewrite callback failed: {0}")]
    Rewrite(String),

    /// No instruction exists at the referenced offset.
    #[error("no instruction at offset IL_{0:04x}")]
    UnknownOffset(u32),

    /// A method lookup failed.
    #[error("unknown method: {0}")]
    UnknownMethod(String),
}

/// Core result type
pub type Result<T> = std::result::Result<T, Error>;
