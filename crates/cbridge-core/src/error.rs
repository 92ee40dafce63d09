//! Binding generation error types.

use cbridge_decl::DeclError;

/// Errors that can occur while lowering declarations into bindings.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// A native type kind or fundamental type with no managed counterpart.
    #[error("unsupported native type '{id}': {detail}")]
    UnsupportedType { id: String, detail: String },

    /// `void` reached a position that needs a value.
    #[error("void used as a value in {context}")]
    VoidValue { context: String },

    /// The name pattern of a package failed to compile.
    #[error("invalid name pattern for package '{package}': {source}")]
    InvalidPattern {
        package: String,
        #[source]
        source: regex::Error,
    },

    /// A callback pairing does not describe a function pointer plus user data.
    #[error("invalid callback in function '{function}': {detail}")]
    InvalidCallback { function: String, detail: String },

    /// A package includes a package that is not configured.
    #[error("package '{package}' includes unknown package '{include}'")]
    UnknownInclude { package: String, include: String },

    /// Package inclusion loops back onto itself.
    #[error("package inclusion cycle through '{package}'")]
    IncludeCycle { package: String },

    /// A package was requested that is not configured.
    #[error("unknown package '{package}'")]
    UnknownPackage { package: String },

    /// Two packages share a name.
    #[error("duplicate package '{package}'")]
    DuplicatePackage { package: String },

    /// Declaration document error.
    #[error(transparent)]
    Decl(#[from] DeclError),
}

/// Result type alias for binding generation.
pub type Result<T> = std::result::Result<T, BridgeError>;
