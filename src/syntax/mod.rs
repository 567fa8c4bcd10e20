//! Text to s-expressions.

pub mod parser;

pub use parser::{parse, parse_one};
