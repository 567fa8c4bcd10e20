//! # Sable Pattern Engine
//!
//! Structural matching and template instantiation over s-expressions, plus
//! the record of individual macro expansion steps.
//!
//! Derived forms are written entirely in terms of this module: a shorthand
//! pattern picks the input apart and a shorthand template puts the output
//! together. User macros run through the evaluator instead, but their steps
//! are recorded the same way.

use serde::Serialize;

use crate::ast::SExpr;

pub mod pattern;
pub mod shorthand;

pub use pattern::{match_pattern, unmatch, Datum, MatchObject, Pattern, PatternLeaf, UnmatchCursor};
pub use shorthand::{compile_pattern, instantiate, match_shorthand};

/// Where a transformer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MacroProvenance {
    /// A derived form implemented in Rust.
    Native,
    /// A `define-syntax` procedure.
    User,
}

/// One transformer application.
#[derive(Debug, Clone, Serialize)]
pub struct ExpansionStep {
    pub macro_name: String,
    pub provenance: MacroProvenance,
    pub input: SExpr,
    pub output: SExpr,
}
