//! Fully-expanded programs.
//!
//! The module compiler's output. Every node has a canonical surface shape
//! produced by `to_sexpr`, which is what `sable compile` prints. The
//! evaluator walks these nodes directly.

use std::path::PathBuf;
use std::rc::Rc;

use serde::Serialize;

use crate::ast::SExpr;
use crate::modules::ModulePath;

/// A fully-expanded expression.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Fep {
    Quote {
        datum: SExpr,
    },
    VarRef {
        name: String,
    },
    App {
        func: Box<Fep>,
        args: Vec<Fep>,
    },
    Lambda {
        params: Vec<String>,
        body: Rc<Vec<Statement>>,
    },
}

/// A fully-expanded body form.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Statement {
    Define { name: String, value: Fep },
    DefineSyntax { name: String, value: Fep },
    Require { path: ModulePath },
    Provide { names: Vec<String> },
    Expr { expr: Fep },
}

/// A fully-expanded module.
#[derive(Debug, Clone, Serialize)]
pub struct FepModule {
    pub name: String,
    pub parent: ModulePath,
    pub body: Vec<Statement>,
    /// File the module was read from; relative requires resolve against it.
    #[serde(skip)]
    pub origin: Option<PathBuf>,
}

fn contains_boxed(datum: &SExpr) -> bool {
    let mut pending = vec![datum.clone()];
    while let Some(value) = pending.pop() {
        if value.is_boxed() {
            return true;
        }
        if value.is_list() {
            let mut iter = value.iter();
            pending.extend(iter.by_ref());
            pending.push(iter.rest().clone());
        }
    }
    false
}

fn tagged(head: &str, rest: impl IntoIterator<Item = SExpr>) -> SExpr {
    let mut items = vec![SExpr::atom(head)];
    items.extend(rest);
    SExpr::list(items)
}

impl Fep {
    /// True when the expression quotes a run-time value, such as a procedure
    /// a transformer spliced into its output.
    pub fn quotes_boxed_value(&self) -> bool {
        match self {
            Fep::Quote { datum } => contains_boxed(datum),
            Fep::VarRef { .. } => false,
            Fep::App { func, args } => func.quotes_boxed_value() || args.iter().any(Fep::quotes_boxed_value),
            Fep::Lambda { body, .. } => body.iter().any(Statement::quotes_boxed_value),
        }
    }

    pub fn to_sexpr(&self) -> SExpr {
        match self {
            Fep::Quote { datum } => tagged("quote", [datum.clone()]),
            Fep::VarRef { name } => tagged("#%variable-reference", [SExpr::atom(name.as_str())]),
            Fep::App { func, args } => tagged(
                "#%plain-app",
                std::iter::once(func.to_sexpr()).chain(args.iter().map(Fep::to_sexpr)),
            ),
            Fep::Lambda { params, body } => {
                let formals = SExpr::list(params.iter().map(|p| SExpr::atom(p.as_str())).collect());
                tagged(
                    "#%plain-lambda",
                    std::iter::once(formals).chain(body.iter().map(Statement::to_sexpr)),
                )
            }
        }
    }
}

impl Statement {
    pub fn quotes_boxed_value(&self) -> bool {
        match self {
            Statement::Define { value, .. } | Statement::DefineSyntax { value, .. } | Statement::Expr { expr: value } => {
                value.quotes_boxed_value()
            }
            Statement::Require { .. } | Statement::Provide { .. } => false,
        }
    }

    pub fn to_sexpr(&self) -> SExpr {
        match self {
            Statement::Define { name, value } => {
                tagged("define", [SExpr::atom(name.as_str()), value.to_sexpr()])
            }
            Statement::DefineSyntax { name, value } => {
                tagged("define-syntax", [SExpr::atom(name.as_str()), value.to_sexpr()])
            }
            Statement::Require { path } => tagged("#%require", [path.to_sexpr()]),
            Statement::Provide { names } => {
                tagged("#%provide", names.iter().map(|n| SExpr::atom(n.as_str())))
            }
            Statement::Expr { expr } => expr.to_sexpr(),
        }
    }
}

impl FepModule {
    pub fn to_sexpr(&self) -> SExpr {
        let begin = tagged(
            "#%plain-module-begin",
            self.body.iter().map(Statement::to_sexpr),
        );
        tagged(
            "module",
            [SExpr::atom(self.name.as_str()), self.parent.to_sexpr(), begin],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_prints_canonical_shape() {
        let module = FepModule {
            name: "demo".into(),
            parent: ModulePath::Builtin("#%builtin-kernel".into()),
            body: vec![
                Statement::Define {
                    name: "x".into(),
                    value: Fep::Quote { datum: 1.0.into() },
                },
                Statement::Expr {
                    expr: Fep::App {
                        func: Box::new(Fep::VarRef { name: "f".into() }),
                        args: vec![Fep::VarRef { name: "x".into() }],
                    },
                },
            ],
            origin: None,
        };
        assert_eq!(
            module.to_sexpr().to_string(),
            "(module demo (quote #%builtin-kernel) (#%plain-module-begin \
             (define x (quote 1)) \
             (#%plain-app (#%variable-reference f) (#%variable-reference x))))"
        );
    }

    #[test]
    fn lambda_prints_formals_and_body() {
        let lambda = Fep::Lambda {
            params: vec!["a".into(), "b".into()],
            body: Rc::new(vec![Statement::Expr {
                expr: Fep::VarRef { name: "b".into() },
            }]),
        };
        assert_eq!(
            lambda.to_sexpr().to_string(),
            "(#%plain-lambda (a b) (#%variable-reference b))"
        );
    }
}
