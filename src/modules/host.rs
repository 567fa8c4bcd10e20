//! Module resolution.
//!
//! The compiler never touches the file system itself; it asks a [`Host`].
//! [`FileHost`] reads modules from disk, [`MemoryHost`] serves them from a
//! table of source texts. Both compile and instantiate each module once,
//! cache the result by path, and refuse to load a module that is already
//! being loaded further up the require chain.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::{BuiltinModules, Module};
use crate::config::CompilerConfig;
use crate::engine;
use crate::errors::{ErrorKind, SableError};

pub trait Host {
    fn resolve_builtin_module(&self, name: &str) -> Result<Module, SableError>;

    /// Resolve a file module named `path`, relative to the file `relative_to`
    /// when there is one.
    fn resolve_file_module(&self, path: &str, relative_to: Option<&Path>) -> Result<Module, SableError>;

    fn config(&self) -> &CompilerConfig;
}

// ============================================================================
// MODULE CACHE
// ============================================================================

/// Per-host memo of loaded modules plus the chain currently loading.
#[derive(Debug, Default)]
struct ModuleCache {
    modules: RefCell<HashMap<PathBuf, Module>>,
    in_flight: RefCell<Vec<PathBuf>>,
}

impl ModuleCache {
    fn get_or_load(
        &self,
        key: PathBuf,
        load: impl FnOnce() -> Result<Module, SableError>,
    ) -> Result<Module, SableError> {
        if let Some(module) = self.modules.borrow().get(&key) {
            debug!(path = %key.display(), "module cache hit");
            return Ok(module.clone());
        }

        if self.in_flight.borrow().contains(&key) {
            let chain = self
                .in_flight
                .borrow()
                .iter()
                .chain(std::iter::once(&key))
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(" -> ");
            return Err(SableError::new(ErrorKind::ModuleCycle { chain }));
        }

        self.in_flight.borrow_mut().push(key.clone());
        let result = load();
        self.in_flight.borrow_mut().pop();

        let module = result?;
        self.modules.borrow_mut().insert(key, module.clone());
        Ok(module)
    }
}

fn not_found(path: &str, reason: impl Into<String>) -> SableError {
    SableError::new(ErrorKind::ModuleNotFound {
        module: path.to_string(),
        reason: reason.into(),
    })
}

// ============================================================================
// FILE HOST
// ============================================================================

/// Loads file modules from disk.
#[derive(Debug, Default)]
pub struct FileHost {
    config: CompilerConfig,
    builtins: BuiltinModules,
    cache: ModuleCache,
}

impl FileHost {
    pub fn new(config: CompilerConfig) -> Self {
        Self {
            config,
            builtins: BuiltinModules::new(),
            cache: ModuleCache::default(),
        }
    }

    /// Directory a relative path is resolved against.
    fn base_dir(&self, relative_to: Option<&Path>) -> PathBuf {
        if let Some(dir) = relative_to.and_then(Path::parent) {
            return dir.to_path_buf();
        }
        self.config
            .module_root
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

impl Host for FileHost {
    fn resolve_builtin_module(&self, name: &str) -> Result<Module, SableError> {
        self.builtins.get(name)
    }

    fn resolve_file_module(&self, path: &str, relative_to: Option<&Path>) -> Result<Module, SableError> {
        let candidate = self.base_dir(relative_to).join(path);
        let canonical = candidate
            .canonicalize()
            .map_err(|e| not_found(path, format!("{}: {}", candidate.display(), e)))?;

        self.cache.get_or_load(canonical.clone(), || {
            debug!(path = %canonical.display(), "loading file module");
            let text = fs::read_to_string(&canonical).map_err(|e| {
                SableError::new(ErrorKind::Io {
                    path: canonical.display().to_string(),
                    message: e.to_string(),
                })
            })?;
            let name = canonical.display().to_string();
            let (module, _) = engine::compile_and_instantiate(&text, &name, Some(canonical.clone()), self)?;
            let stem = canonical.file_stem().and_then(|s| s.to_str());
            if stem != Some(module.name.as_str()) {
                warn!(path = %canonical.display(), module = %module.name, "module name differs from its file name");
            }
            Ok(module)
        })
    }

    fn config(&self) -> &CompilerConfig {
        &self.config
    }
}

// ============================================================================
// MEMORY HOST
// ============================================================================

/// Serves file modules from in-memory source texts keyed by path.
#[derive(Debug, Default)]
pub struct MemoryHost {
    config: CompilerConfig,
    builtins: BuiltinModules,
    sources: HashMap<String, String>,
    cache: ModuleCache,
}

impl MemoryHost {
    pub fn new(config: CompilerConfig) -> Self {
        Self {
            config,
            builtins: BuiltinModules::new(),
            sources: HashMap::new(),
            cache: ModuleCache::default(),
        }
    }

    pub fn with_module(mut self, path: impl Into<String>, source: impl Into<String>) -> Self {
        self.sources.insert(path.into(), source.into());
        self
    }
}

impl Host for MemoryHost {
    fn resolve_builtin_module(&self, name: &str) -> Result<Module, SableError> {
        self.builtins.get(name)
    }

    fn resolve_file_module(&self, path: &str, _relative_to: Option<&Path>) -> Result<Module, SableError> {
        let Some(text) = self.sources.get(path) else {
            return Err(not_found(path, "no such module"));
        };
        self.cache.get_or_load(PathBuf::from(path), || {
            engine::compile_and_instantiate(text, path, Some(PathBuf::from(path)), self).map(|(module, _)| module)
        })
    }

    fn config(&self) -> &CompilerConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_host_links_and_caches() {
        let host = MemoryHost::default().with_module(
            "lib",
            "(module lib '#%builtin-kernel (define answer (quote 42)) (#%provide answer))",
        );
        let first = host.resolve_file_module("lib", None).unwrap();
        assert!(first.provides.lookup("answer").is_some());
        assert_eq!(host.cache.modules.borrow().len(), 1);
        host.resolve_file_module("lib", None).unwrap();
        assert_eq!(host.cache.modules.borrow().len(), 1);
    }

    #[test]
    fn self_require_is_a_cycle() {
        let host = MemoryHost::default().with_module("loop", "(module loop '#%builtin-kernel (#%require loop))");
        let err = host.resolve_file_module("loop", None).unwrap_err();
        assert_eq!(err.code(), "sable::compile::module_cycle");
        assert!(host.cache.in_flight.borrow().is_empty());
    }

    #[test]
    fn missing_modules_are_not_found() {
        let err = MemoryHost::default().resolve_file_module("nope", None).unwrap_err();
        assert_eq!(err.code(), "sable::compile::module_not_found");
        let err = FileHost::default()
            .resolve_file_module("definitely/not/here.sbl", None)
            .unwrap_err();
        assert_eq!(err.code(), "sable::compile::module_not_found");
    }
}
