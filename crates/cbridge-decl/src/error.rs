//! Declaration document error types.

/// Errors that can occur while loading or querying a declaration document.
#[derive(Debug, thiserror::Error)]
pub enum DeclError {
    /// The document is structurally valid JSON but violates the schema.
    #[error("invalid declaration document: {detail}")]
    InvalidDocument { detail: String },

    /// A node references a type identity that the document does not define.
    #[error("unknown type identity '{id}' referenced from {context}")]
    UnknownType { id: String, context: String },

    /// A file identity is referenced but not listed in `files`.
    #[error("unknown file identity '{id}' referenced from {context}")]
    UnknownFile { id: String, context: String },

    /// Typedef chain loops back onto itself.
    #[error("typedef chain starting at '{id}' does not terminate")]
    TypedefCycle { id: String },

    /// JSON parsing error.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for declaration operations.
pub type Result<T> = std::result::Result<T, DeclError>;
