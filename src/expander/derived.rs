//! Derived forms.
//!
//! Native transformers that rewrite a form into simpler syntax and hand the
//! result back to the expander. Each one is a shorthand pattern plus a
//! shorthand template; none of them compile anything themselves.

use crate::ast::SExpr;
use crate::errors::{ErrorReporting, SableError, Unsourced};
use crate::expander::core::CoreForm;
use crate::macros::{instantiate, match_shorthand};
use crate::runtime::env::{get_core, Bindings, Env, NativeFn, Transformer};

/// Try each `(pattern, template)` rule in order; the first match wins.
fn rewrite(form: &SExpr, rules: &[(&str, &str)], name: &str, expected: &str) -> Result<SExpr, SableError> {
    for (pattern, template) in rules {
        if let Some(m) = match_shorthand(pattern, form)? {
            return instantiate(template, &m);
        }
    }
    Err(Unsourced.bad_syntax(name, expected).with_form(form))
}

fn register(bindings: &mut Bindings, forms: &[(&'static str, NativeFn)]) {
    for &(name, func) in forms {
        bindings.define_syntax(name, Transformer::Native { name, func });
    }
}

// ============================================================================
// MODULE AND KERNEL FORMS
// ============================================================================

pub fn module_begin(form: &SExpr, _env: &Env) -> Result<SExpr, SableError> {
    rewrite(
        form,
        &[("('#%module-begin forms ...)", "('#%plain-module-begin forms ...)")],
        "#%module-begin",
        "a proper list of body forms",
    )
}

pub fn app(form: &SExpr, _env: &Env) -> Result<SExpr, SableError> {
    rewrite(
        form,
        &[("('#%app f args ...)", "('#%plain-app f args ...)")],
        "#%app",
        "a procedure expression followed by arguments",
    )
}

/// Literal data quote themselves, but only where `quote` is the core form.
pub fn datum(form: &SExpr, env: &Env) -> Result<SExpr, SableError> {
    if get_core("quote", env) != Some(CoreForm::Quote) {
        return Err(Unsourced.unbound_variable("quote").with_form(form));
    }
    rewrite(form, &[("('#%datum . d)", "('quote d)")], "#%datum", "a datum")
}

pub fn top(form: &SExpr, _env: &Env) -> Result<SExpr, SableError> {
    rewrite(
        form,
        &[("('#%top . sym-id)", "('#%variable-reference sym-id)")],
        "#%top",
        "an identifier",
    )
}

pub fn lambda(form: &SExpr, _env: &Env) -> Result<SExpr, SableError> {
    rewrite(
        form,
        &[(
            "('lambda (sym-params ...) body ...+)",
            "('#%plain-lambda (sym-params ...) body ...+)",
        )],
        "lambda",
        "(lambda (id ...) body ...+)",
    )
}

pub fn expression(form: &SExpr, _env: &Env) -> Result<SExpr, SableError> {
    rewrite(form, &[("('#%expression e)", "e")], "#%expression", "exactly one expression")
}

// ============================================================================
// BASE LANGUAGE FORMS
// ============================================================================

pub fn let_form(form: &SExpr, _env: &Env) -> Result<SExpr, SableError> {
    rewrite(
        form,
        &[(
            "('let ((sym-names values) ...) body ...+)",
            "(('lambda (sym-names ...) body ...+) values ...)",
        )],
        "let",
        "(let ((id expr) ...) body ...+)",
    )
}

/// `if` selects between thunks with the `%if` primitive and calls the winner.
pub fn if_form(form: &SExpr, _env: &Env) -> Result<SExpr, SableError> {
    rewrite(
        form,
        &[(
            "('if test then else)",
            "(('%if test ('lambda () then) ('lambda () else)))",
        )],
        "if",
        "(if test then else)",
    )
}

pub fn and_form(form: &SExpr, _env: &Env) -> Result<SExpr, SableError> {
    rewrite(
        form,
        &[
            ("('and)", "#t"),
            ("('and e)", "e"),
            ("('and e rest ...+)", "('if e ('and rest ...+) #f)"),
        ],
        "and",
        "a proper list of expressions",
    )
}

pub fn or_form(form: &SExpr, _env: &Env) -> Result<SExpr, SableError> {
    rewrite(
        form,
        &[
            ("('or)", "#f"),
            ("('or e)", "e"),
            (
                "('or e rest ...+)",
                "('let (('%or-value e)) ('if '%or-value '%or-value ('or rest ...+)))",
            ),
        ],
        "or",
        "a proper list of expressions",
    )
}

// ============================================================================
// REGISTRATION
// ============================================================================

pub fn register_module_begin(bindings: &mut Bindings) {
    register(bindings, &[("#%module-begin", module_begin)]);
}

pub fn register_kernel_forms(bindings: &mut Bindings) {
    register(
        bindings,
        &[
            ("#%app", app),
            ("#%datum", datum),
            ("#%top", top),
            ("lambda", lambda),
            ("#%expression", expression),
        ],
    );
}

pub fn register_base_lang_forms(bindings: &mut Bindings) {
    register(
        bindings,
        &[("let", let_form), ("if", if_form), ("and", and_form), ("or", or_form)],
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SourceContext;
    use crate::expander::core::register_core_forms;
    use crate::runtime::env::Frame;
    use crate::syntax::parse_one;

    fn read(text: &str) -> SExpr {
        parse_one(text, &SourceContext::from_file("test", text)).unwrap()
    }

    fn core_env() -> Env {
        let mut bindings = Bindings::default();
        register_core_forms(&mut bindings);
        Frame::with_bindings(bindings, None)
    }

    fn expand(func: NativeFn, text: &str) -> String {
        func(&read(text), &core_env()).unwrap().to_string()
    }

    #[test]
    fn kernel_rewrites() {
        assert_eq!(expand(app, "(#%app f 1 2)"), "(#%plain-app f 1 2)");
        assert_eq!(expand(top, "(#%top . x)"), "(#%variable-reference x)");
        assert_eq!(expand(datum, "(#%datum . 5)"), "(quote 5)");
        assert_eq!(expand(expression, "(#%expression (f x))"), "(f x)");
        assert_eq!(
            expand(lambda, "(lambda (x y) (f x) y)"),
            "(#%plain-lambda (x y) (f x) y)"
        );
        assert_eq!(
            expand(module_begin, "(#%module-begin (define x 1) x)"),
            "(#%plain-module-begin (define x 1) x)"
        );
    }

    #[test]
    fn datum_needs_core_quote() {
        let err = datum(&read("(#%datum . 5)"), &Frame::root()).unwrap_err();
        assert_eq!(err.to_string(), "quote: unbound identifier");
    }

    #[test]
    fn lambda_rejects_non_identifier_params() {
        let err = lambda(&read("(lambda (x 1) x)"), &core_env()).unwrap_err();
        assert_eq!(err.code(), "sable::compile::bad_syntax");
        assert!(lambda(&read("(lambda (x))"), &core_env()).is_err());
    }

    #[test]
    fn base_language_rewrites() {
        assert_eq!(
            expand(let_form, "(let ((a 1) (b 2)) (+ a b))"),
            "((lambda (a b) (+ a b)) 1 2)"
        );
        assert_eq!(
            expand(if_form, "(if c 1 2)"),
            "((%if c (lambda () 1) (lambda () 2)))"
        );
        assert_eq!(expand(and_form, "(and)"), "#t");
        assert_eq!(expand(and_form, "(and a b c)"), "(if a (and b c) #f)");
        assert_eq!(expand(or_form, "(or a)"), "a");
        assert_eq!(
            expand(or_form, "(or a b)"),
            "(let ((%or-value a)) (if %or-value %or-value (or b)))"
        );
    }
}
