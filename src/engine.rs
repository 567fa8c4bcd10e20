//! Pipeline entry points: read, compile, instantiate.
//!
//! Every path through the crate, CLI and hosts included, goes through these
//! functions so source names and error context are attached the same way.

use std::fs;
use std::path::{Path, PathBuf};

use crate::ast::fep::FepModule;
use crate::ast::SExpr;
use crate::config::CompilerConfig;
use crate::errors::{ErrorKind, SableError, SourceContext};
use crate::expander::Expander;
use crate::macros::ExpansionStep;
use crate::modules::host::{FileHost, Host};
use crate::modules::Module;
use crate::runtime::eval::instantiate_module;
use crate::syntax::parser;

// ============================================================================
// READING
// ============================================================================

/// Read every datum in `text`.
pub fn read_program(text: &str, source_name: &str) -> Result<Vec<SExpr>, SableError> {
    let source = SourceContext::from_file(source_name, text);
    parser::parse(text, &source)
}

/// Read a file with standardized error handling.
pub fn read_file(path: &Path) -> Result<String, SableError> {
    fs::read_to_string(path).map_err(|error| {
        SableError::new(ErrorKind::Io {
            path: path.display().to_string(),
            message: error.to_string(),
        })
    })
}

fn read_module_form(text: &str, source_name: &str) -> Result<SExpr, SableError> {
    let source = SourceContext::from_file(source_name, text);
    parser::parse_one(text, &source)
        .map_err(|e| e.with_help("a source file holds exactly one (module ...) form"))
}

// ============================================================================
// COMPILING
// ============================================================================

/// Compile one module and return it with its expansion trace.
///
/// The trace is empty unless `record_trace` is set in the host's config.
pub fn expand_source(
    text: &str,
    source_name: &str,
    origin: Option<PathBuf>,
    host: &dyn Host,
) -> Result<(FepModule, Vec<ExpansionStep>), SableError> {
    let form = read_module_form(text, source_name)?;
    let mut expander = Expander::new(host).with_origin(origin);
    let module = expander.compile_module(&form)?;
    Ok((module, expander.take_trace()))
}

/// Compile the single module form in `text`.
pub fn compile_source(text: &str, host: &dyn Host) -> Result<FepModule, SableError> {
    expand_source(text, "<source>", None, host).map(|(module, _)| module)
}

/// Compile, then instantiate. Returns the module and the values of its
/// top-level expressions.
pub fn compile_and_instantiate(
    text: &str,
    source_name: &str,
    origin: Option<PathBuf>,
    host: &dyn Host,
) -> Result<(Module, Vec<SExpr>), SableError> {
    let (fep, _) = expand_source(text, source_name, origin, host)?;
    instantiate_module(&fep, host)
}

// ============================================================================
// FILES
// ============================================================================

fn canonical(path: &Path) -> Result<PathBuf, SableError> {
    path.canonicalize().map_err(|error| {
        SableError::new(ErrorKind::Io {
            path: path.display().to_string(),
            message: error.to_string(),
        })
    })
}

/// Compile a file with a fresh [`FileHost`].
pub fn compile_file(path: &Path, config: CompilerConfig) -> Result<FepModule, SableError> {
    trace_file(path, config).map(|(module, _)| module)
}

/// Compile a file, recording every expansion step.
pub fn trace_file(path: &Path, config: CompilerConfig) -> Result<(FepModule, Vec<ExpansionStep>), SableError> {
    let text = read_file(path)?;
    let origin = canonical(path)?;
    let host = FileHost::new(config);
    let form = read_module_form(&text, &path.display().to_string())?;
    let mut expander = Expander::new(&host).with_origin(Some(origin)).with_trace();
    let module = expander.compile_module(&form)?;
    Ok((module, expander.take_trace()))
}

/// Compile and instantiate a file.
pub fn run_file(path: &Path, config: CompilerConfig) -> Result<(Module, Vec<SExpr>), SableError> {
    let text = read_file(path)?;
    let origin = canonical(path)?;
    let host = FileHost::new(config);
    compile_and_instantiate(&text, &path.display().to_string(), Some(origin), &host)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::host::MemoryHost;

    #[test]
    fn compile_source_needs_exactly_one_form() {
        let host = MemoryHost::default();
        let two = "(module a '#%builtin-empty) (module b '#%builtin-empty)";
        let err = compile_source(two, &host).unwrap_err();
        assert_eq!(err.code(), "sable::read::read");
        assert!(compile_source("", &host).is_err());
    }

    #[test]
    fn instantiation_returns_expression_values() {
        let host = MemoryHost::default();
        let (module, values) = compile_and_instantiate(
            "(module m '#%builtin-base-lang (define x 2) (* x 21) (if #f 1 2))",
            "m",
            None,
            &host,
        )
        .unwrap();
        assert_eq!(module.name, "m");
        assert!(module.provides.is_empty());
        assert_eq!(values, vec![SExpr::from(42.0), SExpr::from(2.0)]);
    }

    #[test]
    fn trace_is_off_unless_configured() {
        let host = MemoryHost::default();
        let source = "(module m '#%builtin-kernel (define f 1) f)";
        let (_, trace) = expand_source(source, "m", None, &host).unwrap();
        assert!(trace.is_empty());

        let host = MemoryHost::new(CompilerConfig {
            record_trace: true,
            ..CompilerConfig::default()
        });
        let (_, trace) = expand_source(source, "m", None, &host).unwrap();
        assert_eq!(trace[0].macro_name, "#%module-begin");
        assert!(trace.iter().any(|step| step.macro_name == "#%datum"));
    }
}
