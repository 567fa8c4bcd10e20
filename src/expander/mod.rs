//! # Sable Module Compiler
//!
//! Turns a `(module name parent form ...)` datum into a [`FepModule`] by
//! partial expansion.
//!
//! ## Algorithm
//!
//! 1. Resolve the parent module and open a frame over its provides.
//! 2. Normalize the body into `#%plain-module-begin` form.
//! 3. **Pass 1**: expand each body form only until its head is a core form,
//!    then act on the structural ones (`begin`, `define`, `define-syntax`,
//!    `#%require`, `#%provide`) right away. Everything else waits.
//! 4. **Pass 2**: compile the deferred definition right-hand sides and
//!    expressions, in order, now that every body-level name is bound.
//!
//! Lambda bodies run the same two passes in a fresh frame.
//!
//! ## Expansion Steps
//!
//! Partial expansion is a loop, not recursion. Every transformer application
//! counts against the configured `expansion_limit`, so a macro that
//! reproduces itself fails cleanly instead of spinning forever.
//!
//! Expansion is unhygienic: names introduced by a transformer resolve in
//! the environment where the output lands.

use std::path::PathBuf;

use tracing::{debug, trace};

use crate::ast::fep::{Fep, FepModule, Statement};
use crate::ast::SExpr;
use crate::errors::{ErrorKind, ErrorReporting, SableError};
use crate::macros::{match_shorthand, ExpansionStep, MacroProvenance};
use crate::modules::{self, host::Host, Module, ModulePath};
use crate::runtime::env::{
    find, get_core, get_syntax, install_bindings, set_define, Definition, Env, Frame, Lookup,
    Transformer,
};
use crate::runtime::eval;

pub mod core;
pub mod derived;

use self::core::{expand_core, CoreForm};

const PLAIN_MODULE_BEGIN: &str = "#%plain-module-begin";
const MODULE_BEGIN: &str = "#%module-begin";

// ============================================================================
// CORE DATA STRUCTURES
// ============================================================================

/// Where a body is being compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyContext {
    Module,
    Lambda,
}

impl BodyContext {
    fn describe(&self) -> &'static str {
        match self {
            BodyContext::Module => "module body",
            BodyContext::Lambda => "lambda body",
        }
    }
}

/// A body statement after pass 1.
enum Pending {
    Define(String, SExpr),
    Expr(SExpr),
    Done(Statement),
}

/// What partial expansion does next with a form.
enum Step {
    Stop,
    Apply(String, Transformer),
    Insert(&'static str),
}

/// Compiles one module. Holds the step budget and, when enabled, the trace.
pub struct Expander<'h> {
    host: &'h dyn Host,
    origin: Option<PathBuf>,
    steps: usize,
    limit: usize,
    trace: Option<Vec<ExpansionStep>>,
}

impl ErrorReporting for Expander<'_> {
    fn report(&self, kind: ErrorKind) -> SableError {
        SableError::new(kind)
    }
}

// ============================================================================
// PUBLIC API IMPLEMENTATION
// ============================================================================

impl<'h> Expander<'h> {
    pub fn new(host: &'h dyn Host) -> Self {
        let config = host.config();
        Self {
            host,
            origin: None,
            steps: 0,
            limit: config.expansion_limit,
            trace: config.record_trace.then(Vec::new),
        }
    }

    /// Resolve relative requires against `origin`.
    pub fn with_origin(mut self, origin: Option<PathBuf>) -> Self {
        self.origin = origin;
        self
    }

    /// Record every step, regardless of configuration.
    pub fn with_trace(mut self) -> Self {
        self.trace.get_or_insert_with(Vec::new);
        self
    }

    /// Transformer applications so far.
    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn take_trace(&mut self) -> Vec<ExpansionStep> {
        self.trace.take().unwrap_or_default()
    }

    /// Compile a `(module name parent form ...)` datum.
    pub fn compile_module(&mut self, form: &SExpr) -> Result<FepModule, SableError> {
        let Some(m) = match_shorthand("('module sym-name parent . body)", form)? else {
            return Err(self
                .report(ErrorKind::ModuleShape {
                    message: "expected (module name parent form ...)".into(),
                })
                .with_form(form));
        };
        let name = m.first("name").and_then(SExpr::as_symbol).unwrap_or_default().to_string();
        let Some(parent_path) = m.first("parent").and_then(ModulePath::from_sexpr) else {
            return Err(self
                .report(ErrorKind::ModuleShape {
                    message: "parent must be a symbol or (quote symbol)".into(),
                })
                .with_form(form));
        };
        let Some(body) = m.first("body").and_then(SExpr::to_vec) else {
            return Err(self
                .report(ErrorKind::ModuleShape {
                    message: "body must be a proper list".into(),
                })
                .with_form(form));
        };

        debug!(module = %name, parent = %parent_path, "compiling module");
        let parent = self.resolve_module(&parent_path)?;
        let outer = Frame::with_bindings(parent.provides, None);
        let env = Frame::child(&outer);

        let compiled = self
            .normalize_body(body, &env)
            .and_then(|forms| self.compile_body(forms, &env, BodyContext::Module));
        release_frame(&env, compiled.as_deref().unwrap_or_default());
        let body = compiled?;
        debug!(module = %name, steps = self.steps, "compiled module");

        Ok(FepModule {
            name,
            parent: parent_path,
            body,
            origin: self.origin.clone(),
        })
    }

    /// Expand `form` until its head is no longer a macro.
    ///
    /// Inserts `#%app`, `#%datum` or `#%top` where the form calls for them
    /// and they are bound.
    pub fn partial_expand(&mut self, form: SExpr, env: &Env) -> Result<SExpr, SableError> {
        let mut form = form;
        loop {
            form = match self.classify(&form, env)? {
                Step::Stop => return Ok(form),
                Step::Apply(name, transformer) => self.apply_transformer(&name, &transformer, &form, env)?,
                Step::Insert(keyword) => SExpr::cons(SExpr::atom(keyword), form),
            };
        }
    }

    /// Fully compile `form` in expression context.
    pub fn compile_expr(&mut self, form: &SExpr, env: &Env) -> Result<Fep, SableError> {
        let form = self.partial_expand(form.clone(), env)?;
        match &form {
            SExpr::Atom(name) => match find(name, env) {
                Some((_, Lookup::Definition(_))) => Ok(Fep::VarRef {
                    name: name.to_string(),
                }),
                Some((_, Lookup::Core(core))) => expand_core(core, &form, self, env),
                Some((_, Lookup::Syntax(_))) => Err(self
                    .report(ErrorKind::NotAVariable { name: name.to_string() })
                    .with_form(&form)),
                None => Err(self.unbound_variable(name).with_form(&form)),
            },
            SExpr::Boxed(_) => Ok(Fep::Quote { datum: form.clone() }),
            _ => match form.car().and_then(SExpr::as_symbol).and_then(|head| get_core(head, env)) {
                Some(core) => expand_core(core, &form, self, env),
                None => unreachable!("partial expansion stops only at core forms"),
            },
        }
    }

    /// Run both passes over a body in `env`.
    pub fn compile_body(
        &mut self,
        forms: Vec<SExpr>,
        env: &Env,
        context: BodyContext,
    ) -> Result<Vec<Statement>, SableError> {
        let mut worklist: Vec<SExpr> = forms.into_iter().rev().collect();
        let mut pending = Vec::new();
        let mut provided = Vec::new();

        while let Some(form) = worklist.pop() {
            let form = self.partial_expand(form, env)?;
            let structural = form
                .car()
                .and_then(SExpr::as_symbol)
                .and_then(|head| get_core(head, env))
                .filter(CoreForm::is_structural);

            match structural {
                Some(CoreForm::Begin) => {
                    let Some(m) = match_shorthand("('begin forms ...)", &form)? else {
                        return Err(self.bad_syntax("begin", "a proper list of forms").with_form(&form));
                    };
                    worklist.extend(m.get("forms").iter().rev().cloned());
                }
                Some(CoreForm::Define) => {
                    let Some(m) = match_shorthand("('define sym-name rhs)", &form)? else {
                        return Err(self.bad_syntax("define", "(define id expr)").with_form(&form));
                    };
                    let name = symbol_capture(&m, "name");
                    set_define(env, &name, Definition::Uninitialized);
                    pending.push(Pending::Define(name, capture(&m, "rhs")));
                }
                Some(CoreForm::DefineSyntax) => {
                    let Some(m) = match_shorthand("('define-syntax sym-name rhs)", &form)? else {
                        return Err(self
                            .bad_syntax("define-syntax", "(define-syntax id expr)")
                            .with_form(&form));
                    };
                    let name = symbol_capture(&m, "name");
                    let value = self.compile_expr(&capture(&m, "rhs"), env)?;
                    let transformer = eval::eval(&value, env).map_err(|e| e.with_form(&form))?;
                    eval::install_transformer(env, &name, transformer).map_err(|e| e.with_form(&form))?;
                    debug!(name = %name, "defined syntax");
                    pending.push(Pending::Done(Statement::DefineSyntax { name, value }));
                }
                Some(CoreForm::Require) => {
                    self.check_module_context(CoreForm::Require, context, &form)?;
                    let path = match_shorthand("('#%require spec)", &form)?
                        .and_then(|m| m.first("spec").and_then(ModulePath::from_sexpr));
                    let Some(path) = path else {
                        return Err(self
                            .bad_syntax("#%require", "a module path: a symbol or (quote symbol)")
                            .with_form(&form));
                    };
                    let required = self.resolve_module(&path)?;
                    install_bindings(env, &required.provides);
                    pending.push(Pending::Done(Statement::Require { path }));
                }
                Some(CoreForm::Provide) => {
                    self.check_module_context(CoreForm::Provide, context, &form)?;
                    let names = self.provide_names(&form)?;
                    provided.extend(names.iter().cloned());
                    pending.push(Pending::Done(Statement::Provide { names }));
                }
                _ => pending.push(Pending::Expr(form)),
            }
        }

        for name in &provided {
            if find(name, env).is_none() {
                return Err(self.unbound_variable(name).with_help("provided names must be bound in the module"));
            }
        }

        pending
            .into_iter()
            .map(|p| match p {
                Pending::Define(name, rhs) => {
                    let value = self.compile_expr(&rhs, env)?;
                    Ok(Statement::Define { name, value })
                }
                Pending::Expr(form) => Ok(Statement::Expr {
                    expr: self.compile_expr(&form, env)?,
                }),
                Pending::Done(statement) => Ok(statement),
            })
            .collect()
    }

    pub fn resolve_module(&self, path: &ModulePath) -> Result<Module, SableError> {
        modules::resolve(self.host, path, self.origin.as_deref())
    }
}

// ============================================================================
// INTERNAL HELPERS
// ============================================================================

/// Empty a compile frame once its body is compiled. Transformers installed
/// in it close over it. Compiled code that quotes a run-time value may still
/// reach the frame through that value, so such a frame is kept.
pub(crate) fn release_frame(env: &Env, body: &[Statement]) {
    if !body.iter().any(Statement::quotes_boxed_value) {
        env.release();
    }
}

impl Expander<'_> {
    fn classify(&self, form: &SExpr, env: &Env) -> Result<Step, SableError> {
        match form {
            SExpr::Atom(name) => {
                if find(name, env).is_some() {
                    return Ok(Step::Stop);
                }
                self.implicit("#%top", env)
                    .ok_or_else(|| self.unbound_variable(name).with_form(form))
            }
            SExpr::Boxed(_) => Ok(Step::Stop),
            SExpr::Cons(..) | SExpr::List(_) => {
                if let Some(head) = form.car().and_then(SExpr::as_symbol) {
                    match find(head, env) {
                        Some((_, Lookup::Syntax(transformer))) => {
                            return Ok(Step::Apply(head.to_string(), transformer))
                        }
                        Some((_, Lookup::Core(_))) => return Ok(Step::Stop),
                        _ => {}
                    }
                }
                self.implicit("#%app", env)
                    .ok_or_else(|| self.unbound_variable("#%app").with_form(form))
            }
            SExpr::Number(_) | SExpr::Boolean(_) | SExpr::Nil => self
                .implicit("#%datum", env)
                .ok_or_else(|| self.unbound_variable("#%datum").with_form(form)),
        }
    }

    fn implicit(&self, keyword: &'static str, env: &Env) -> Option<Step> {
        get_syntax(keyword, env).map(|_| Step::Insert(keyword))
    }

    fn apply_transformer(
        &mut self,
        name: &str,
        transformer: &Transformer,
        form: &SExpr,
        env: &Env,
    ) -> Result<SExpr, SableError> {
        self.steps += 1;
        if self.steps > self.limit {
            return Err(self
                .report(ErrorKind::ExpansionLimit { limit: self.limit })
                .with_form(form));
        }

        let (output, provenance) = match transformer {
            Transformer::Native { func, .. } => (func(form, env)?, MacroProvenance::Native),
            Transformer::Procedure(procedure) => (
                eval::apply(procedure, vec![form.clone()]).map_err(|e| e.with_form(form))?,
                MacroProvenance::User,
            ),
        };

        trace!(macro_name = name, input = %form, output = %output, "expansion step");
        if let Some(steps) = &mut self.trace {
            steps.push(ExpansionStep {
                macro_name: name.to_string(),
                provenance,
                input: form.clone(),
                output: output.clone(),
            });
        }
        Ok(output)
    }

    /// Reduce a module body to the forms of its `#%plain-module-begin`.
    fn normalize_body(&mut self, body: Vec<SExpr>, env: &Env) -> Result<Vec<SExpr>, SableError> {
        let body = match body.as_slice() {
            [] => return Ok(body),
            [single] => {
                let expanded = self.partial_expand(single.clone(), env)?;
                if let Some(forms) = plain_module_begin_forms(&expanded) {
                    return Ok(forms);
                }
                vec![expanded]
            }
            _ => body,
        };
        if get_syntax(MODULE_BEGIN, env).is_none() {
            return Err(self.unbound_variable(MODULE_BEGIN).with_help("the parent module provides no #%module-begin"));
        }

        let wrapped = SExpr::cons(SExpr::atom(MODULE_BEGIN), SExpr::list(body));
        let expanded = self.partial_expand(wrapped, env)?;
        plain_module_begin_forms(&expanded).ok_or_else(|| {
            self.report(ErrorKind::BadModuleBegin {
                found: expanded.to_string(),
            })
        })
    }

    fn check_module_context(
        &self,
        core: CoreForm,
        context: BodyContext,
        form: &SExpr,
    ) -> Result<(), SableError> {
        if context == BodyContext::Module {
            return Ok(());
        }
        Err(self.wrong_context(core.name(), context.describe()).with_form(form))
    }

    fn provide_names(&self, form: &SExpr) -> Result<Vec<String>, SableError> {
        let Some(specs) = form.cdr().and_then(|rest| rest.to_vec()) else {
            return Err(self.bad_syntax("#%provide", "a proper list of identifiers").with_form(form));
        };
        specs
            .iter()
            .map(|spec| match spec.as_symbol() {
                Some(name) => Ok(name.to_string()),
                None => Err(self
                    .report(ErrorKind::ProvideNotSymbol {
                        found: spec.to_string(),
                    })
                    .with_form(form)),
            })
            .collect()
    }
}

fn plain_module_begin_forms(form: &SExpr) -> Option<Vec<SExpr>> {
    if !form.has_head(PLAIN_MODULE_BEGIN) {
        return None;
    }
    form.cdr()?.to_vec()
}

fn capture(m: &crate::macros::MatchObject, name: &str) -> SExpr {
    m.first(name).cloned().unwrap_or(SExpr::Nil)
}

fn symbol_capture(m: &crate::macros::MatchObject, name: &str) -> String {
    m.first(name).and_then(SExpr::as_symbol).unwrap_or_default().to_string()
}
