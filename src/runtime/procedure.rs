//! Procedure values.
//!
//! Procedures live inside `SExpr::Boxed`, so they flow through the same
//! channels as data: bound in frames, passed as arguments, returned from
//! macro transformers.

use std::fmt;
use std::rc::Rc;

use crate::ast::fep::Statement;
use crate::ast::{Opaque, SExpr};
use crate::errors::{ErrorKind, SableError};
use crate::runtime::env::Env;

const PROCEDURE_TAG: &str = "procedure";

/// A primitive operation over already-evaluated arguments.
pub type PrimitiveFn = fn(&[SExpr]) -> Result<SExpr, SableError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exactly(usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(&self, count: usize) -> bool {
        match self {
            Arity::Exactly(n) => count == *n,
            Arity::AtLeast(n) => count >= *n,
        }
    }

    fn describe(&self) -> String {
        match self {
            Arity::Exactly(n) => n.to_string(),
            Arity::AtLeast(n) => format!("at least {}", n),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Primitive {
    pub name: &'static str,
    pub arity: Arity,
    pub func: PrimitiveFn,
}

#[derive(Clone)]
pub struct Closure {
    pub params: Vec<String>,
    pub body: Rc<Vec<Statement>>,
    pub env: Env,
}

impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Closure")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub enum Procedure {
    Primitive(Primitive),
    Closure(Closure),
}

impl Procedure {
    pub fn into_value(self) -> SExpr {
        SExpr::boxed(Opaque::new(PROCEDURE_TAG, self))
    }

    pub fn from_value(value: &SExpr) -> Option<&Procedure> {
        value.as_opaque()?.downcast_ref::<Procedure>()
    }

    pub fn name(&self) -> &str {
        match self {
            Procedure::Primitive(p) => p.name,
            Procedure::Closure(_) => "#<procedure>",
        }
    }

    pub fn arity(&self) -> Arity {
        match self {
            Procedure::Primitive(p) => p.arity,
            Procedure::Closure(c) => Arity::Exactly(c.params.len()),
        }
    }

    pub fn check_arity(&self, count: usize) -> Result<(), SableError> {
        let arity = self.arity();
        if arity.accepts(count) {
            return Ok(());
        }
        Err(ErrorKind::Arity {
            name: self.name().to_string(),
            expected: arity.describe(),
            actual: count,
        }
        .into())
    }
}

pub fn primitive(name: &'static str, arity: Arity, func: PrimitiveFn) -> SExpr {
    Procedure::Primitive(Primitive { name, arity, func }).into_value()
}

pub fn is_procedure(value: &SExpr) -> bool {
    Procedure::from_value(value).is_some()
}
