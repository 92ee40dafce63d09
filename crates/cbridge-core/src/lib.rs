//! Binding generation core for cbridge.
//!
//! Lowers native C declarations into Go declarations and the cgo marshaling
//! code that moves values across the call boundary in both directions.
//!
//! ## Modules
//!
//! - [`naming`]: Name filters, camel casing and collision-free name tables
//! - [`types`]: Managed type descriptors and the declaration map
//! - [`lower`]: Native type nodes to descriptors, with the field fixed point
//! - [`conv`]: Native ↔ managed conversion statements
//! - [`func`]: Functions, methods and global variables
//! - [`callback`]: Function-pointer/user-data pairs and trampolines
//! - [`package`]: Per-package configuration and preparation
//! - [`generator`]: Multi-package include ordering
//! - [`bindings`]: Emission set, ordering and statistics
//! - [`render`]: Go, C and header source text

pub mod bindings;
pub mod callback;
pub mod conv;
pub mod error;
pub mod func;
pub mod generator;
pub mod lower;
pub mod naming;
pub mod package;
pub mod render;
pub mod types;

pub use bindings::{Bindings, Statistics};
pub use callback::{CallbackSite, Trampoline};
pub use error::{BridgeError, Result};
pub use func::{Function, Variable};
pub use generator::Generator;
pub use naming::{NameFilter, NameTable};
pub use package::{Package, PackageConfig};
pub use types::{DeclMap, Declarable, TypeDesc};
