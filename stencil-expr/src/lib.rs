//! Expression sub-language for stencil templates.
//!
//! `compile` turns the body of a `{{ }}` block into an [`Node`] tree.
//! [`evaluate`] runs it against a [`Resolver`], [`generate`] lowers it to
//! Rust tokens through a [`Glue`].

mod ast;
mod error;
mod eval;
mod generate;
mod parser;
pub mod value;

pub use ast::{BinaryOp, Identifier, Node, UnaryOp};
pub use error::{ExprError, Result};
pub use eval::{Resolver, evaluate};
pub use generate::{Glue, generate, literal};
pub use parser::compile;

/// Names that can't be used as loop index variables.
pub const RESERVED: &[&str] = &["true", "false", "null", "undefined", "this", "$event"];

/// Identifier bound to the event payload inside event handlers.
pub const EVENT: &str = "$event";

pub fn is_reserved(name: &str) -> bool {
    RESERVED.contains(&name)
}
