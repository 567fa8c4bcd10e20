//! Runtime: binding frames, procedures, primitives and the FEP evaluator.
//!
//! The evaluator runs in two places: at compile time for `define-syntax`
//! right-hand sides, and when a required module is instantiated.

pub mod env;
pub mod eval;
pub mod primitives;
pub mod procedure;

pub use env::{Bindings, Env, Frame, Lookup};
pub use eval::{apply, eval, instantiate_module};
pub use procedure::Procedure;
