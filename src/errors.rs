//! Sable Error Handling
//!
//! One error type, [`SableError`], covers every failure the front end can
//! report: reading text, compiling modules, evaluating compile-time code,
//! loading configuration and touching the file system. The variant-specific
//! data lives in [`ErrorKind`]; where and how to help lives in
//! [`ErrorContext`].
//!
//! Errors render through `miette`. Diagnostic codes follow the
//! `sable::<phase>::<kind>` scheme so tests and tooling can match on them
//! without parsing messages.

use std::fmt;
use std::sync::Arc;

use miette::{Diagnostic, LabeledSpan, NamedSource, SourceCode};
use thiserror::Error;

// ============================================================================
// SOURCE CONTEXT
// ============================================================================

/// Byte range in a source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// Named source text used for error reporting.
#[derive(Debug, Clone)]
pub struct SourceContext {
    pub name: String,
    pub content: String,
}

impl SourceContext {
    /// Create a source context from real file content.
    pub fn from_file(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Create a fallback when real source is unavailable.
    pub fn fallback(context: &str) -> Self {
        Self {
            name: "fallback".to_string(),
            content: format!("; {}", context),
        }
    }

    pub fn to_named_source(&self) -> Arc<NamedSource<String>> {
        Arc::new(NamedSource::new(self.name.clone(), self.content.clone()))
    }
}

impl Default for SourceContext {
    fn default() -> Self {
        Self::fallback("default context")
    }
}

// ============================================================================
// ERROR KINDS
// ============================================================================

/// Everything that can go wrong, with the data needed to say so.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ErrorKind {
    // Read errors
    #[error("read error: {message}")]
    Read { message: String },

    // Compile errors
    #[error("module: bad syntax, {message}")]
    ModuleShape { message: String },
    #[error("cannot resolve module {module}: {reason}")]
    ModuleNotFound { module: String, reason: String },
    #[error("cycle in module requires: {chain}")]
    ModuleCycle { chain: String },
    #[error("{name}: unbound identifier")]
    UnboundVariable { name: String },
    #[error("{name}: syntax cannot be used as a variable")]
    NotAVariable { name: String },
    #[error("{form}: bad syntax, expected {expected}")]
    BadSyntax { form: String, expected: String },
    #[error("{form}: not allowed in {context} context")]
    WrongContext { form: String, context: String },
    #[error("#%provide: expected a symbol, found {found}")]
    ProvideNotSymbol { found: String },
    #[error("{name}: provided but never initialized")]
    ProvideUninitialized { name: String },
    #[error("#%module-begin: expansion must produce #%plain-module-begin, found {found}")]
    BadModuleBegin { found: String },
    #[error("{name}: define-syntax expects a procedure, found {found}")]
    NotATransformer { name: String, found: String },
    #[error("macro expansion exceeded {limit} steps")]
    ExpansionLimit { limit: usize },
    #[error("bad pattern {pattern}: {reason}")]
    Pattern { pattern: String, reason: String },

    // Evaluation errors
    #[error("{name}: used before initialization")]
    Uninitialized { name: String },
    #[error("application: not a procedure: {found}")]
    NotAProcedure { found: String },
    #[error("{name}: arity mismatch, expected {expected}, got {actual}")]
    Arity {
        name: String,
        expected: String,
        actual: usize,
    },
    #[error("{name}: contract violation, expected {expected}, got {found}")]
    TypeMismatch {
        name: String,
        expected: String,
        found: String,
    },
    #[error("evaluation exceeded {depth} nested applications")]
    RecursionLimit { depth: usize },
    #[error("/: division by zero")]
    DivisionByZero,
    #[error("error: {message}")]
    User { message: String },

    // Environment errors
    #[error("invalid configuration: {message}")]
    Config { message: String },
    #[error("{path}: {message}")]
    Io { path: String, message: String },
}

/// Broad error classes, one per pipeline phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Read,
    Compile,
    Eval,
    Config,
    Io,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Read => "read",
            ErrorCategory::Compile => "compile",
            ErrorCategory::Eval => "eval",
            ErrorCategory::Config => "config",
            ErrorCategory::Io => "io",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ErrorKind {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Read { .. } => ErrorCategory::Read,

            Self::ModuleShape { .. }
            | Self::ModuleNotFound { .. }
            | Self::ModuleCycle { .. }
            | Self::UnboundVariable { .. }
            | Self::NotAVariable { .. }
            | Self::BadSyntax { .. }
            | Self::WrongContext { .. }
            | Self::ProvideNotSymbol { .. }
            | Self::ProvideUninitialized { .. }
            | Self::BadModuleBegin { .. }
            | Self::NotATransformer { .. }
            | Self::ExpansionLimit { .. }
            | Self::Pattern { .. } => ErrorCategory::Compile,

            Self::Uninitialized { .. }
            | Self::NotAProcedure { .. }
            | Self::Arity { .. }
            | Self::TypeMismatch { .. }
            | Self::RecursionLimit { .. }
            | Self::DivisionByZero
            | Self::User { .. } => ErrorCategory::Eval,

            Self::Config { .. } => ErrorCategory::Config,
            Self::Io { .. } => ErrorCategory::Io,
        }
    }

    /// Stable suffix for diagnostic codes.
    pub const fn code_suffix(&self) -> &'static str {
        match self {
            Self::Read { .. } => "read",
            Self::ModuleShape { .. } => "module_shape",
            Self::ModuleNotFound { .. } => "module_not_found",
            Self::ModuleCycle { .. } => "module_cycle",
            Self::UnboundVariable { .. } => "unbound_variable",
            Self::NotAVariable { .. } => "not_a_variable",
            Self::BadSyntax { .. } => "bad_syntax",
            Self::WrongContext { .. } => "wrong_context",
            Self::ProvideNotSymbol { .. } => "provide_not_symbol",
            Self::ProvideUninitialized { .. } => "provide_uninitialized",
            Self::BadModuleBegin { .. } => "bad_module_begin",
            Self::NotATransformer { .. } => "not_a_transformer",
            Self::ExpansionLimit { .. } => "expansion_limit",
            Self::Pattern { .. } => "pattern",
            Self::Uninitialized { .. } => "uninitialized",
            Self::NotAProcedure { .. } => "not_a_procedure",
            Self::Arity { .. } => "arity",
            Self::TypeMismatch { .. } => "type_mismatch",
            Self::RecursionLimit { .. } => "recursion_limit",
            Self::DivisionByZero => "division_by_zero",
            Self::User { .. } => "user",
            Self::Config { .. } => "config",
            Self::Io { .. } => "io",
        }
    }

    fn primary_label(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Read => "cannot read this",
            ErrorCategory::Compile => "while compiling this",
            ErrorCategory::Eval => "while evaluating this",
            ErrorCategory::Config | ErrorCategory::Io => "here",
        }
    }
}

// ============================================================================
// THE ERROR TYPE
// ============================================================================

/// Where an error happened and how to help.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    pub source: Option<Arc<NamedSource<String>>>,
    pub span: Option<Span>,
    /// Printed text of the offending form.
    pub form: Option<String>,
    pub help: Option<String>,
}

/// The single error type of the crate.
#[derive(Debug, Error)]
#[error("{kind}")]
pub struct SableError {
    pub kind: ErrorKind,
    pub context: ErrorContext,
}

impl SableError {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: ErrorContext::default(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        self.kind.category()
    }

    /// Diagnostic code, e.g. `sable::compile::unbound_variable`.
    pub fn code(&self) -> String {
        format!("sable::{}::{}", self.category(), self.kind.code_suffix())
    }

    /// Attach the offending form. The innermost form wins. Long forms are
    /// cut to [`FORM_TEXT_LIMIT`] bytes.
    pub fn with_form(mut self, form: impl fmt::Display) -> Self {
        if self.context.form.is_none() {
            self.context.form = Some(abbreviate(&form));
        }
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.context.help = Some(help.into());
        self
    }

    pub fn with_source(mut self, source: &SourceContext, span: Span) -> Self {
        self.context.source = Some(source.to_named_source());
        self.context.span = Some(span);
        self
    }
}

impl Diagnostic for SableError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(SableError::code(self)))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        let text = match (&self.context.help, &self.context.form) {
            (Some(help), Some(form)) => format!("{}\nin: {}", help, form),
            (Some(help), None) => help.clone(),
            (None, Some(form)) => format!("in: {}", form),
            (None, None) => return None,
        };
        Some(Box::new(text))
    }

    fn source_code(&self) -> Option<&dyn SourceCode> {
        self.context
            .source
            .as_ref()
            .map(|s| s.as_ref() as &dyn SourceCode)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let span = self.context.span?;
        let source = self.context.source.as_ref()?;
        // A zero-width span still gets a one-character label, except at the
        // very end of the input.
        let available = source.inner().len().saturating_sub(span.start);
        let len = span.end.saturating_sub(span.start).max(1).min(available);
        let label = LabeledSpan::new(Some(self.kind.primary_label().into()), span.start, len);
        Some(Box::new(std::iter::once(label)))
    }
}

impl From<ErrorKind> for SableError {
    fn from(kind: ErrorKind) -> Self {
        SableError::new(kind)
    }
}

// ============================================================================
// ERROR REPORTING
// ============================================================================

/// Context-aware error creation. Each pipeline stage knows which extra
/// context to attach; the convenience methods cover the common kinds.
pub trait ErrorReporting {
    fn report(&self, kind: ErrorKind) -> SableError;

    fn unbound_variable(&self, name: &str) -> SableError {
        self.report(ErrorKind::UnboundVariable { name: name.into() })
    }

    fn bad_syntax(&self, form: &str, expected: &str) -> SableError {
        self.report(ErrorKind::BadSyntax {
            form: form.into(),
            expected: expected.into(),
        })
    }

    fn wrong_context(&self, form: &str, context: &str) -> SableError {
        self.report(ErrorKind::WrongContext {
            form: form.into(),
            context: context.into(),
        })
    }

    fn type_mismatch(&self, name: &str, expected: &str, found: impl fmt::Display) -> SableError {
        self.report(ErrorKind::TypeMismatch {
            name: name.into(),
            expected: expected.into(),
            found: found.to_string(),
        })
    }
}

impl ErrorReporting for SourceContext {
    fn report(&self, kind: ErrorKind) -> SableError {
        let mut error = SableError::new(kind);
        error.context.source = Some(self.to_named_source());
        error
    }
}

/// Reporter for code that has no source text at hand.
pub struct Unsourced;

impl ErrorReporting for Unsourced {
    fn report(&self, kind: ErrorKind) -> SableError {
        SableError::new(kind)
    }
}

// ============================================================================
// ERROR FORMATTING UTILITIES
// ============================================================================

/// Longest form text kept in an error.
pub const FORM_TEXT_LIMIT: usize = 200;

/// A writer that refuses input past its limit, which stops the formatter
/// early instead of printing a huge form only to throw most of it away.
struct Bounded {
    text: String,
    truncated: bool,
}

impl fmt::Write for Bounded {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let room = FORM_TEXT_LIMIT - self.text.len();
        if s.len() <= room {
            self.text.push_str(s);
            return Ok(());
        }
        let mut cut = room;
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        self.text.push_str(&s[..cut]);
        self.truncated = true;
        Err(fmt::Error)
    }
}

fn abbreviate(form: &impl fmt::Display) -> String {
    let mut out = Bounded {
        text: String::new(),
        truncated: false,
    };
    let _ = fmt::write(&mut out, format_args!("{}", form));
    if out.truncated {
        out.text.push_str(" ...");
    }
    out.text
}

/// Prints a SableError with full miette diagnostics to stderr.
pub fn print_error(error: SableError) {
    let report = miette::Report::new(error);
    eprintln!("{report:?}");
}
