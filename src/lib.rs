pub use crate::ast::SExpr;
pub use crate::config::CompilerConfig;
pub use crate::errors::{ErrorKind, SableError};

pub mod ast;
pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod expander;
pub mod macros;
pub mod modules;
pub mod runtime;
pub mod syntax;
