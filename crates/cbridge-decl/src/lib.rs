//! Native declaration source for the cbridge binding generator.
//!
//! Loads the JSON document produced by the native compiler's declaration
//! extractor and answers structural queries over it.
//!
//! ## Modules
//!
//! - [`document`]: Declaration document model and queries
//! - [`fundamental`]: Built-in C types and their cgo spellings
//! - [`error`]: Error types

pub mod document;
pub mod error;
pub mod fundamental;

pub use document::{
    Argument, CallbackHint, Composite, Declarations, EnumValue, Enumeration, Field, FileId,
    FunctionType, NativeFunction, NativeType, NativeVariable, PointerKind, SourceFile, TypeId,
    Typedef,
};
pub use error::{DeclError, Result};
pub use fundamental::{Fundamental, NumClass};
