//! # Primitive Procedures
//!
//! The run-time operations `#%builtin-primitives` exports. Every primitive is
//! a pure function over already-evaluated arguments; arity is checked by the
//! caller before the function runs.
//!
//! ## Primitives Provided
//!
//! - **Constants**: `pi`
//! - **Arithmetic**: `+`, `-`, `*`, `/`
//! - **Comparison**: `=`, `<`, `>`, `<=`, `>=`
//! - **Pairs**: `cons`, `car`, `cdr`, `list`
//! - **Predicates**: `null?`, `pair?`, `symbol?`, `number?`, `boolean?`, `procedure?`
//! - **Equality**: `eq?`, `equal?`
//! - **Logic**: `not`, `%if`
//! - **Errors**: `error`

use crate::ast::{equals, identical, SExpr};
use crate::errors::{ErrorKind, ErrorReporting, SableError, Unsourced};
use crate::runtime::env::{Bindings, Definition};
use crate::runtime::procedure::{is_procedure, primitive, Arity, PrimitiveFn};

// ============================================================================
// HELPERS
// ============================================================================

fn extract_number(value: &SExpr, name: &str) -> Result<f64, SableError> {
    value
        .as_number()
        .ok_or_else(|| Unsourced.type_mismatch(name, "number", value))
}

fn numbers(args: &[SExpr], name: &str) -> Result<Vec<f64>, SableError> {
    args.iter().map(|arg| extract_number(arg, name)).collect()
}

fn compare(args: &[SExpr], name: &str, holds: fn(f64, f64) -> bool) -> Result<SExpr, SableError> {
    let values = numbers(args, name)?;
    Ok(SExpr::boolean(values.windows(2).all(|w| holds(w[0], w[1]))))
}

// ============================================================================
// ARITHMETIC
// ============================================================================

/// Usage: (+ <n> ...) ; => sum, 0 for no arguments
pub const PRIM_ADD: PrimitiveFn = |args| Ok(SExpr::number(numbers(args, "+")?.iter().sum()));

/// Usage: (- <n>) negates; (- <a> <b> ...) subtracts left to right
pub const PRIM_SUB: PrimitiveFn = |args| {
    let values = numbers(args, "-")?;
    match values.split_first() {
        Some((only, [])) => Ok(SExpr::number(-only)),
        Some((first, rest)) => Ok(SExpr::number(rest.iter().fold(*first, |acc, n| acc - n))),
        None => Err(ErrorKind::Arity {
            name: "-".into(),
            expected: "at least 1".into(),
            actual: 0,
        }
        .into()),
    }
};

/// Usage: (* <n> ...) ; => product, 1 for no arguments
pub const PRIM_MUL: PrimitiveFn = |args| Ok(SExpr::number(numbers(args, "*")?.iter().product()));

/// Usage: (/ <n>) is the reciprocal; (/ <a> <b> ...) divides left to right
pub const PRIM_DIV: PrimitiveFn = |args| {
    let values = numbers(args, "/")?;
    let (first, rest) = match values.split_first() {
        Some((only, [])) => (1.0, std::slice::from_ref(only)),
        Some((first, rest)) => (*first, rest),
        None => return Ok(SExpr::number(1.0)),
    };
    let mut result = first;
    for divisor in rest {
        if *divisor == 0.0 {
            return Err(ErrorKind::DivisionByZero.into());
        }
        result /= divisor;
    }
    Ok(SExpr::number(result))
};

pub const PRIM_EQ_NUM: PrimitiveFn = |args| compare(args, "=", |a, b| a == b);
pub const PRIM_LT: PrimitiveFn = |args| compare(args, "<", |a, b| a < b);
pub const PRIM_GT: PrimitiveFn = |args| compare(args, ">", |a, b| a > b);
pub const PRIM_LE: PrimitiveFn = |args| compare(args, "<=", |a, b| a <= b);
pub const PRIM_GE: PrimitiveFn = |args| compare(args, ">=", |a, b| a >= b);

// ============================================================================
// PAIRS
// ============================================================================

pub const PRIM_CONS: PrimitiveFn = |args| Ok(SExpr::cons(args[0].clone(), args[1].clone()));

pub const PRIM_CAR: PrimitiveFn = |args| {
    args[0]
        .car()
        .cloned()
        .ok_or_else(|| Unsourced.type_mismatch("car", "pair", &args[0]))
};

pub const PRIM_CDR: PrimitiveFn = |args| {
    args[0]
        .cdr()
        .ok_or_else(|| Unsourced.type_mismatch("cdr", "pair", &args[0]))
};

pub const PRIM_LIST: PrimitiveFn = |args| Ok(SExpr::list(args.to_vec()));

// ============================================================================
// PREDICATES AND LOGIC
// ============================================================================

pub const PRIM_NULL_P: PrimitiveFn = |args| Ok(SExpr::boolean(args[0].is_nil()));
pub const PRIM_PAIR_P: PrimitiveFn = |args| Ok(SExpr::boolean(args[0].is_list()));
pub const PRIM_SYMBOL_P: PrimitiveFn = |args| Ok(SExpr::boolean(args[0].is_symbol()));
pub const PRIM_NUMBER_P: PrimitiveFn = |args| Ok(SExpr::boolean(args[0].is_number()));
pub const PRIM_BOOLEAN_P: PrimitiveFn = |args| Ok(SExpr::boolean(args[0].is_boolean()));
pub const PRIM_PROCEDURE_P: PrimitiveFn = |args| Ok(SExpr::boolean(is_procedure(&args[0])));

pub const PRIM_EQ_P: PrimitiveFn = |args| Ok(SExpr::boolean(identical(&args[0], &args[1])));
pub const PRIM_EQUAL_P: PrimitiveFn = |args| Ok(SExpr::boolean(equals(&args[0], &args[1])));

pub const PRIM_NOT: PrimitiveFn = |args| Ok(SExpr::boolean(!args[0].is_truthy()));

/// Usage: (%if <test> <then> <else>) ; => <then> unless <test> is #f
///
/// Selects a value without evaluating anything; `if` passes thunks and
/// applies the result.
pub const PRIM_IF: PrimitiveFn = |args| {
    Ok(if args[0].is_truthy() {
        args[1].clone()
    } else {
        args[2].clone()
    })
};

/// Usage: (error <value> ...) ; raises with the printed values as message
pub const PRIM_ERROR: PrimitiveFn = |args| {
    let message = args
        .iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join(" ");
    Err(ErrorKind::User { message }.into())
};

// ============================================================================
// REGISTRATION
// ============================================================================

const PRIMITIVES: &[(&str, Arity, PrimitiveFn)] = &[
    ("+", Arity::AtLeast(0), PRIM_ADD),
    ("-", Arity::AtLeast(1), PRIM_SUB),
    ("*", Arity::AtLeast(0), PRIM_MUL),
    ("/", Arity::AtLeast(1), PRIM_DIV),
    ("=", Arity::AtLeast(1), PRIM_EQ_NUM),
    ("<", Arity::AtLeast(1), PRIM_LT),
    (">", Arity::AtLeast(1), PRIM_GT),
    ("<=", Arity::AtLeast(1), PRIM_LE),
    (">=", Arity::AtLeast(1), PRIM_GE),
    ("cons", Arity::Exactly(2), PRIM_CONS),
    ("car", Arity::Exactly(1), PRIM_CAR),
    ("cdr", Arity::Exactly(1), PRIM_CDR),
    ("list", Arity::AtLeast(0), PRIM_LIST),
    ("null?", Arity::Exactly(1), PRIM_NULL_P),
    ("pair?", Arity::Exactly(1), PRIM_PAIR_P),
    ("symbol?", Arity::Exactly(1), PRIM_SYMBOL_P),
    ("number?", Arity::Exactly(1), PRIM_NUMBER_P),
    ("boolean?", Arity::Exactly(1), PRIM_BOOLEAN_P),
    ("procedure?", Arity::Exactly(1), PRIM_PROCEDURE_P),
    ("eq?", Arity::Exactly(2), PRIM_EQ_P),
    ("equal?", Arity::Exactly(2), PRIM_EQUAL_P),
    ("not", Arity::Exactly(1), PRIM_NOT),
    ("%if", Arity::Exactly(3), PRIM_IF),
    ("error", Arity::AtLeast(1), PRIM_ERROR),
];

/// Bind `pi` and every primitive procedure as initialized definitions.
pub fn register_primitives(bindings: &mut Bindings) {
    bindings.define("pi", Definition::Value(SExpr::number(std::f64::consts::PI)));
    for &(name, arity, func) in PRIMITIVES {
        bindings.define(name, Definition::Value(primitive(name, arity, func)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(value: f64) -> SExpr {
        SExpr::number(value)
    }

    #[test]
    fn arithmetic() {
        assert_eq!(PRIM_ADD(&[n(1.0), n(2.0), n(3.0)]).unwrap(), n(6.0));
        assert_eq!(PRIM_ADD(&[]).unwrap(), n(0.0));
        assert_eq!(PRIM_SUB(&[n(5.0)]).unwrap(), n(-5.0));
        assert_eq!(PRIM_SUB(&[n(10.0), n(3.0), n(2.0)]).unwrap(), n(5.0));
        assert_eq!(PRIM_DIV(&[n(8.0), n(2.0)]).unwrap(), n(4.0));
        assert_eq!(PRIM_DIV(&[n(4.0)]).unwrap(), n(0.25));
    }

    #[test]
    fn division_by_zero_is_reported() {
        let err = PRIM_DIV(&[n(1.0), n(0.0)]).unwrap_err();
        assert_eq!(err.code(), "sable::eval::division_by_zero");
    }

    #[test]
    fn type_errors_name_the_primitive() {
        let err = PRIM_ADD(&[n(1.0), SExpr::from("a")]).unwrap_err();
        assert_eq!(err.to_string(), "+: contract violation, expected number, got a");
        let err = PRIM_CAR(&[SExpr::Nil]).unwrap_err();
        assert_eq!(err.code(), "sable::eval::type_mismatch");
    }

    #[test]
    fn comparisons_chain() {
        assert_eq!(PRIM_LT(&[n(1.0), n(2.0), n(3.0)]).unwrap(), SExpr::boolean(true));
        assert_eq!(PRIM_LT(&[n(1.0), n(3.0), n(2.0)]).unwrap(), SExpr::boolean(false));
    }

    #[test]
    fn only_false_is_false() {
        assert_eq!(PRIM_NOT(&[SExpr::boolean(false)]).unwrap(), SExpr::boolean(true));
        assert_eq!(PRIM_NOT(&[SExpr::Nil]).unwrap(), SExpr::boolean(false));
        assert_eq!(PRIM_IF(&[SExpr::Nil, n(1.0), n(2.0)]).unwrap(), n(1.0));
    }

    #[test]
    fn registration_covers_the_table() {
        let mut bindings = Bindings::default();
        register_primitives(&mut bindings);
        assert_eq!(bindings.len(), PRIMITIVES.len() + 1);
        assert!(bindings.lookup("pi").is_some());
        assert!(bindings.lookup("%if").is_some());
    }
}
