//! Core forms.
//!
//! The closed set of primitive syntax everything else expands into. The four
//! expression forms compile straight to [`Fep`] nodes. The structural
//! keywords are only meaningful at the head of a body statement, where the
//! body algorithm consumes them; anywhere else they are a context error.

use std::rc::Rc;

use crate::ast::fep::{Fep, Statement};
use crate::ast::SExpr;
use crate::errors::{ErrorKind, ErrorReporting, SableError};
use crate::expander::{release_frame, BodyContext, Expander};
use crate::macros::match_shorthand;
use crate::runtime::env::{find, set_define, Bindings, Definition, Env, Frame, Lookup};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoreForm {
    Quote,
    VariableReference,
    PlainApp,
    PlainLambda,
    Begin,
    Define,
    DefineSyntax,
    Require,
    Provide,
    PlainModuleBegin,
}

impl CoreForm {
    pub const ALL: [CoreForm; 10] = [
        CoreForm::Quote,
        CoreForm::VariableReference,
        CoreForm::PlainApp,
        CoreForm::PlainLambda,
        CoreForm::Begin,
        CoreForm::Define,
        CoreForm::DefineSyntax,
        CoreForm::Require,
        CoreForm::Provide,
        CoreForm::PlainModuleBegin,
    ];

    /// The keyword this form is bound to.
    pub fn name(&self) -> &'static str {
        match self {
            CoreForm::Quote => "quote",
            CoreForm::VariableReference => "#%variable-reference",
            CoreForm::PlainApp => "#%plain-app",
            CoreForm::PlainLambda => "#%plain-lambda",
            CoreForm::Begin => "begin",
            CoreForm::Define => "define",
            CoreForm::DefineSyntax => "define-syntax",
            CoreForm::Require => "#%require",
            CoreForm::Provide => "#%provide",
            CoreForm::PlainModuleBegin => "#%plain-module-begin",
        }
    }

    /// True for keywords that only make sense as body statements.
    pub fn is_structural(&self) -> bool {
        !matches!(
            self,
            CoreForm::Quote | CoreForm::VariableReference | CoreForm::PlainApp | CoreForm::PlainLambda
        )
    }
}

/// Bind every core form under its keyword.
pub fn register_core_forms(bindings: &mut Bindings) {
    for core in CoreForm::ALL {
        bindings.define_core(core.name(), core);
    }
}

/// Compile a form headed by a core keyword, in expression context.
pub fn expand_core(
    core: CoreForm,
    form: &SExpr,
    expander: &mut Expander<'_>,
    env: &Env,
) -> Result<Fep, SableError> {
    match core {
        CoreForm::Quote => quote(form, expander),
        CoreForm::VariableReference => variable_reference(form, expander, env),
        CoreForm::PlainApp => plain_app(form, expander, env),
        CoreForm::PlainLambda => plain_lambda(form, expander, env),
        structural => Err(expander
            .wrong_context(structural.name(), "an expression")
            .with_form(form)),
    }
}

// ============================================================================
// EXPRESSION FORMS
// ============================================================================

fn quote(form: &SExpr, expander: &Expander<'_>) -> Result<Fep, SableError> {
    let Some(m) = match_shorthand("('quote datum)", form)? else {
        return Err(expander
            .bad_syntax("quote", "a proper list of exactly 1 argument")
            .with_form(form));
    };
    let datum = m.first("datum").cloned().unwrap_or(SExpr::Nil);
    Ok(Fep::Quote { datum })
}

fn variable_reference(form: &SExpr, expander: &Expander<'_>, env: &Env) -> Result<Fep, SableError> {
    let Some(m) = match_shorthand("('#%variable-reference sym-id)", form)? else {
        return Err(expander
            .bad_syntax("#%variable-reference", "exactly one identifier")
            .with_form(form));
    };
    let name = m.first("id").and_then(SExpr::as_symbol).unwrap_or_default();
    match find(name, env) {
        Some((_, Lookup::Definition(_))) => Ok(Fep::VarRef { name: name.to_string() }),
        Some((_, Lookup::Syntax(_) | Lookup::Core(_))) => Err(expander
            .report(ErrorKind::NotAVariable { name: name.into() })
            .with_form(form)),
        None => Err(expander.unbound_variable(name).with_form(form)),
    }
}

fn plain_app(form: &SExpr, expander: &mut Expander<'_>, env: &Env) -> Result<Fep, SableError> {
    let Some(m) = match_shorthand("('#%plain-app f args ...)", form)? else {
        return Err(expander
            .bad_syntax("#%plain-app", "a procedure expression followed by arguments")
            .with_form(form));
    };
    let func = match m.first("f") {
        Some(f) => expander.compile_expr(f, env)?,
        None => unreachable!("pattern binds f"),
    };
    let args = m
        .get("args")
        .iter()
        .map(|arg| expander.compile_expr(arg, env))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Fep::App {
        func: Box::new(func),
        args,
    })
}

fn plain_lambda(form: &SExpr, expander: &mut Expander<'_>, env: &Env) -> Result<Fep, SableError> {
    let Some(m) = match_shorthand("('#%plain-lambda (sym-params ...) body ...+)", form)? else {
        return Err(expander
            .bad_syntax("#%plain-lambda", "(#%plain-lambda (id ...) body ...+)")
            .with_form(form));
    };

    let mut params: Vec<String> = Vec::new();
    for param in m.get("params") {
        let name = param.as_symbol().unwrap_or_default().to_string();
        if params.contains(&name) {
            return Err(expander
                .bad_syntax("#%plain-lambda", "distinct parameter names")
                .with_form(form));
        }
        params.push(name);
    }

    let frame = Frame::child(env);
    for param in &params {
        set_define(&frame, param, Definition::Uninitialized);
    }
    let body = expander.compile_body(m.get("body").to_vec(), &frame, BodyContext::Lambda);
    release_frame(&frame, body.as_deref().unwrap_or_default());
    let body = body?;
    if !matches!(body.last(), Some(Statement::Expr { .. })) {
        return Err(expander
            .bad_syntax("lambda", "an expression after the internal definitions")
            .with_form(form));
    }

    Ok(Fep::Lambda {
        params,
        body: Rc::new(body),
    })
}
