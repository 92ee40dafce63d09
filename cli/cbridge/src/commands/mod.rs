//! CLI command implementations.

pub mod decls;
pub mod generate;
pub mod inspect;
