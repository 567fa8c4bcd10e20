//! # Evaluator
//!
//! A tree-walking interpreter over fully-expanded programs. The expander
//! uses it for `define-syntax` right-hand sides and for applying user
//! transformers; module loading uses it to instantiate compiled modules.
//!
//! Recursion is bounded by [`MAX_EVAL_DEPTH`] nested applications.

use tracing::debug;

use crate::ast::fep::{Fep, FepModule, Statement};
use crate::ast::SExpr;
use crate::errors::{ErrorKind, ErrorReporting, SableError, Unsourced};
use crate::modules::{self, host::Host, Module};
use crate::runtime::env::{
    find, get_value, install_bindings, set_define, set_syntax, Bindings, Definition, Env, Frame,
    Lookup, Transformer,
};
use crate::runtime::procedure::{Closure, Procedure};

/// Deepest chain of nested procedure applications. Sized so that a debug
/// build stays inside the 2 MiB stack of a spawned thread.
pub const MAX_EVAL_DEPTH: usize = 128;

// ============================================================================
// PUBLIC API
// ============================================================================

/// Evaluate one expression.
pub fn eval(expr: &Fep, env: &Env) -> Result<SExpr, SableError> {
    Evaluator::default().eval(expr, env)
}

/// Apply a procedure value to arguments.
pub fn apply(func: &SExpr, args: Vec<SExpr>) -> Result<SExpr, SableError> {
    Evaluator::default().apply(func, args)
}

/// Run a compiled module body and build its provides.
///
/// Returns the module together with the values of its top-level expression
/// statements, in order.
pub fn instantiate_module(fep: &FepModule, host: &dyn Host) -> Result<(Module, Vec<SExpr>), SableError> {
    debug!(module = %fep.name, "instantiating module");
    let parent = modules::resolve(host, &fep.parent, fep.origin.as_deref())?;
    let outer = Frame::with_bindings(parent.provides, None);
    let frame = Frame::child(&outer);

    predeclare(&fep.body, &frame);

    let mut evaluator = Evaluator::default();
    let mut provided = Vec::new();
    let mut values = Vec::new();
    for statement in &fep.body {
        match statement {
            Statement::Define { name, value } => {
                let value = evaluator.eval(value, &frame)?;
                set_define(&frame, name, Definition::Value(value));
            }
            Statement::DefineSyntax { name, value } => {
                let transformer = evaluator.eval(value, &frame)?;
                install_transformer(&frame, name, transformer)?;
            }
            Statement::Require { path } => {
                let required = modules::resolve(host, path, fep.origin.as_deref())?;
                install_bindings(&frame, &required.provides);
            }
            Statement::Provide { names } => provided.extend(names.iter().cloned()),
            Statement::Expr { expr } => values.push(evaluator.eval(expr, &frame)?),
        }
    }

    let provides = collect_provides(&provided, &frame)?;
    Ok((
        Module {
            name: fep.name.clone(),
            provides,
        },
        values,
    ))
}

/// Install a `define-syntax` value, which must be a procedure.
pub fn install_transformer(frame: &Env, name: &str, value: SExpr) -> Result<(), SableError> {
    if Procedure::from_value(&value).is_none() {
        return Err(Unsourced.report(ErrorKind::NotATransformer {
            name: name.into(),
            found: value.to_string(),
        }));
    }
    set_syntax(frame, name, Transformer::Procedure(value));
    Ok(())
}

// ============================================================================
// INTERNAL HELPERS
// ============================================================================

/// Bind every `define` of a body as uninitialized so closures may refer
/// forward.
fn predeclare(body: &[Statement], frame: &Env) {
    for statement in body {
        if let Statement::Define { name, .. } = statement {
            set_define(frame, name, Definition::Uninitialized);
        }
    }
}

fn collect_provides(names: &[String], frame: &Env) -> Result<Bindings, SableError> {
    let mut provides = Bindings::default();
    for name in names {
        match find(name, frame) {
            // The module's own definitions are all assigned by now; an
            // uninitialized one was imported from a host module.
            Some((_, Lookup::Definition(Definition::Uninitialized))) => {
                return Err(Unsourced.report(ErrorKind::ProvideUninitialized { name: name.clone() }));
            }
            Some((_, lookup)) => provides.insert(name, lookup),
            None => return Err(Unsourced.unbound_variable(name)),
        }
    }
    Ok(provides)
}

#[derive(Default)]
struct Evaluator {
    depth: usize,
}

impl Evaluator {
    fn eval(&mut self, expr: &Fep, env: &Env) -> Result<SExpr, SableError> {
        match expr {
            Fep::Quote { datum } => Ok(datum.clone()),
            Fep::VarRef { name } => get_value(name, env),
            Fep::App { func, args } => {
                let func = self.eval(func, env)?;
                let args = args
                    .iter()
                    .map(|arg| self.eval(arg, env))
                    .collect::<Result<Vec<_>, _>>()?;
                self.apply(&func, args)
            }
            Fep::Lambda { params, body } => Ok(Procedure::Closure(Closure {
                params: params.clone(),
                body: body.clone(),
                env: env.clone(),
            })
            .into_value()),
        }
    }

    fn apply(&mut self, func: &SExpr, args: Vec<SExpr>) -> Result<SExpr, SableError> {
        let Some(procedure) = Procedure::from_value(func) else {
            return Err(Unsourced.report(ErrorKind::NotAProcedure {
                found: func.to_string(),
            }));
        };
        procedure.check_arity(args.len())?;

        match procedure {
            Procedure::Primitive(primitive) => (primitive.func)(&args),
            Procedure::Closure(closure) => {
                if self.depth >= MAX_EVAL_DEPTH {
                    return Err(Unsourced.report(ErrorKind::RecursionLimit {
                        depth: MAX_EVAL_DEPTH,
                    }));
                }
                self.depth += 1;
                let frame = Frame::child(&closure.env);
                for (param, arg) in closure.params.iter().zip(args) {
                    set_define(&frame, param, Definition::Value(arg));
                }
                let result = self.exec_body(&closure.body, &frame);
                self.depth -= 1;
                result
            }
        }
    }

    /// Run a lambda body; its value is the value of the last statement.
    fn exec_body(&mut self, body: &[Statement], frame: &Env) -> Result<SExpr, SableError> {
        predeclare(body, frame);
        let mut last = SExpr::Nil;
        for statement in body {
            last = SExpr::Nil;
            match statement {
                Statement::Define { name, value } => {
                    let value = self.eval(value, frame)?;
                    set_define(frame, name, Definition::Value(value));
                }
                Statement::DefineSyntax { name, value } => {
                    let transformer = self.eval(value, frame)?;
                    install_transformer(frame, name, transformer)?;
                }
                Statement::Expr { expr } => last = self.eval(expr, frame)?,
                Statement::Require { .. } => return Err(Unsourced.wrong_context("#%require", "lambda body")),
                Statement::Provide { .. } => return Err(Unsourced.wrong_context("#%provide", "lambda body")),
            }
        }
        Ok(last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::primitives::register_primitives;
    use std::rc::Rc;

    fn prelude() -> Env {
        let mut bindings = Bindings::default();
        register_primitives(&mut bindings);
        Frame::with_bindings(bindings, None)
    }

    fn var(name: &str) -> Fep {
        Fep::VarRef { name: name.into() }
    }

    fn quote(value: f64) -> Fep {
        Fep::Quote { datum: value.into() }
    }

    #[test]
    fn applies_primitives() {
        let env = prelude();
        let expr = Fep::App {
            func: Box::new(var("+")),
            args: vec![quote(1.0), quote(2.0)],
        };
        assert_eq!(eval(&expr, &env).unwrap(), SExpr::from(3.0));
    }

    #[test]
    fn closures_capture_their_frame() {
        let env = prelude();
        // ((lambda (x) (lambda (y) (+ x y))) 1) applied to 2
        let inner = Fep::Lambda {
            params: vec!["y".into()],
            body: Rc::new(vec![Statement::Expr {
                expr: Fep::App {
                    func: Box::new(var("+")),
                    args: vec![var("x"), var("y")],
                },
            }]),
        };
        let outer = Fep::Lambda {
            params: vec!["x".into()],
            body: Rc::new(vec![Statement::Expr { expr: inner }]),
        };
        let adder = eval(
            &Fep::App {
                func: Box::new(outer),
                args: vec![quote(1.0)],
            },
            &env,
        )
        .unwrap();
        assert_eq!(apply(&adder, vec![2.0.into()]).unwrap(), SExpr::from(3.0));
    }

    #[test]
    fn arity_is_checked() {
        let env = prelude();
        let identity = eval(
            &Fep::Lambda {
                params: vec!["x".into()],
                body: Rc::new(vec![Statement::Expr { expr: var("x") }]),
            },
            &env,
        )
        .unwrap();
        let err = apply(&identity, vec![]).unwrap_err();
        assert_eq!(err.code(), "sable::eval::arity");
    }

    #[test]
    fn applying_a_non_procedure_fails() {
        let err = apply(&SExpr::from(1.0), vec![]).unwrap_err();
        assert_eq!(err.to_string(), "application: not a procedure: 1");
    }

    #[test]
    fn runaway_recursion_is_bounded() {
        let env = prelude();
        let frame = Frame::child(&env);
        let call_spin = || Fep::App {
            func: Box::new(var("spin")),
            args: vec![],
        };
        let body = vec![
            Statement::Define {
                name: "spin".into(),
                value: Fep::Lambda {
                    params: vec![],
                    body: Rc::new(vec![Statement::Expr { expr: call_spin() }]),
                },
            },
            Statement::Expr { expr: call_spin() },
        ];
        let err = Evaluator::default().exec_body(&body, &frame).unwrap_err();
        assert_eq!(err.code(), "sable::eval::recursion_limit");
    }

    #[test]
    fn recursion_up_to_the_limit_succeeds() {
        // (define down (lambda (n) ((%if (= n 0) (lambda () 0) (lambda () (down (- n 1)))))))
        let env = prelude();
        let frame = Frame::child(&env);
        let app = |func: Fep, args: Vec<Fep>| Fep::App {
            func: Box::new(func),
            args,
        };
        let thunk = |expr: Fep| Fep::Lambda {
            params: vec![],
            body: Rc::new(vec![Statement::Expr { expr }]),
        };
        let recurse = app(var("down"), vec![app(var("-"), vec![var("n"), quote(1.0)])]);
        let down = Fep::Lambda {
            params: vec!["n".into()],
            body: Rc::new(vec![Statement::Expr {
                expr: app(
                    app(
                        var("%if"),
                        vec![app(var("="), vec![var("n"), quote(0.0)]), thunk(quote(0.0)), thunk(recurse)],
                    ),
                    vec![],
                ),
            }]),
        };
        let body = |n: f64| {
            vec![
                Statement::Define {
                    name: "down".into(),
                    value: down.clone(),
                },
                Statement::Expr {
                    expr: app(var("down"), vec![quote(n)]),
                },
            ]
        };
        // Each step nests a call to `down` and a call to the chosen thunk.
        let depth = (MAX_EVAL_DEPTH / 2 - 1) as f64;
        assert!(Evaluator::default().exec_body(&body(depth), &frame).is_ok());
        let err = Evaluator::default().exec_body(&body(MAX_EVAL_DEPTH as f64), &frame).unwrap_err();
        assert_eq!(err.code(), "sable::eval::recursion_limit");
    }
}
