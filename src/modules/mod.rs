//! # Modules
//!
//! A module is a name plus the bindings it provides. The four builtin
//! modules bootstrap every program; each one extends the previous:
//!
//! | Module | Adds |
//! |--------|------|
//! | `#%builtin-empty` | nothing |
//! | `#%builtin-primitives` | primitive procedures, core forms, `#%module-begin` |
//! | `#%builtin-kernel` | `#%app`, `#%datum`, `#%top`, `lambda`, `#%expression` |
//! | `#%builtin-base-lang` | `let`, `if`, `and`, `or` |
//!
//! File modules are compiled and instantiated on demand by a [`host::Host`].

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde::Serialize;

use crate::ast::SExpr;
use crate::errors::{ErrorKind, SableError};
use crate::expander::{core::register_core_forms, derived};
use crate::runtime::env::Bindings;
use crate::runtime::primitives::register_primitives;

pub mod host;

pub const BUILTIN_EMPTY: &str = "#%builtin-empty";
pub const BUILTIN_PRIMITIVES: &str = "#%builtin-primitives";
pub const BUILTIN_KERNEL: &str = "#%builtin-kernel";
pub const BUILTIN_BASE_LANG: &str = "#%builtin-base-lang";

// ============================================================================
// CORE DATA STRUCTURES
// ============================================================================

#[derive(Debug, Clone)]
pub struct Module {
    pub name: String,
    pub provides: Bindings,
}

/// How a module is named in `module` parents and `#%require`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum ModulePath {
    /// Written `(quote name)`.
    Builtin(String),
    /// Written as a bare symbol, read as a path.
    File(String),
}

impl ModulePath {
    pub fn from_sexpr(value: &SExpr) -> Option<Self> {
        if let Some(path) = value.as_symbol() {
            return Some(ModulePath::File(path.to_string()));
        }
        if !value.has_head("quote") {
            return None;
        }
        match value.cdr()?.to_vec()?.as_slice() {
            [SExpr::Atom(name)] => Some(ModulePath::Builtin(name.to_string())),
            _ => None,
        }
    }

    pub fn to_sexpr(&self) -> SExpr {
        match self {
            ModulePath::Builtin(name) => SExpr::list(vec![SExpr::atom("quote"), SExpr::atom(name.as_str())]),
            ModulePath::File(path) => SExpr::atom(path.as_str()),
        }
    }
}

impl fmt::Display for ModulePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_sexpr())
    }
}

/// Resolve `path` through `host`; file paths are relative to `origin`.
pub fn resolve(host: &dyn host::Host, path: &ModulePath, origin: Option<&Path>) -> Result<Module, SableError> {
    match path {
        ModulePath::Builtin(name) => host.resolve_builtin_module(name),
        ModulePath::File(file) => host.resolve_file_module(file, origin),
    }
}

// ============================================================================
// BUILTIN MODULES
// ============================================================================

/// The builtin module table, built once per host.
#[derive(Debug, Clone)]
pub struct BuiltinModules {
    modules: HashMap<&'static str, Module>,
}

impl BuiltinModules {
    pub fn new() -> Self {
        let primitives = {
            let mut b = Bindings::default();
            register_primitives(&mut b);
            register_core_forms(&mut b);
            derived::register_module_begin(&mut b);
            b
        };
        let kernel = {
            let mut b = primitives.clone();
            derived::register_kernel_forms(&mut b);
            b
        };
        let base_lang = {
            let mut b = kernel.clone();
            derived::register_base_lang_forms(&mut b);
            b
        };

        let modules = [
            (BUILTIN_EMPTY, Bindings::default()),
            (BUILTIN_PRIMITIVES, primitives),
            (BUILTIN_KERNEL, kernel),
            (BUILTIN_BASE_LANG, base_lang),
        ]
        .into_iter()
        .map(|(name, provides)| {
            (
                name,
                Module {
                    name: name.to_string(),
                    provides,
                },
            )
        })
        .collect();
        Self { modules }
    }

    pub fn get(&self, name: &str) -> Result<Module, SableError> {
        self.modules.get(name).cloned().ok_or_else(|| {
            SableError::new(ErrorKind::ModuleNotFound {
                module: format!("'{}", name),
                reason: "no such builtin module".into(),
            })
        })
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.modules.keys().copied().collect();
        names.sort();
        names
    }
}

impl Default for BuiltinModules {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_paths_round_trip() {
        let builtin = ModulePath::Builtin(BUILTIN_KERNEL.into());
        assert_eq!(builtin.to_string(), "(quote #%builtin-kernel)");
        assert_eq!(ModulePath::from_sexpr(&builtin.to_sexpr()), Some(builtin));

        let file = ModulePath::File("lib/util.sbl".into());
        assert_eq!(ModulePath::from_sexpr(&file.to_sexpr()), Some(file));
    }

    #[test]
    fn malformed_paths_are_rejected() {
        assert_eq!(ModulePath::from_sexpr(&SExpr::from(1.0)), None);
        let two = SExpr::list(vec!["quote".into(), "a".into(), "b".into()]);
        assert_eq!(ModulePath::from_sexpr(&two), None);
        let nested = SExpr::list(vec!["quote".into(), SExpr::list(vec!["a".into()])]);
        assert_eq!(ModulePath::from_sexpr(&nested), None);
    }

    #[test]
    fn builtins_extend_each_other() {
        let builtins = BuiltinModules::new();
        assert!(builtins.get(BUILTIN_EMPTY).unwrap().provides.is_empty());

        let primitives = builtins.get(BUILTIN_PRIMITIVES).unwrap().provides;
        assert!(primitives.lookup("pi").is_some());
        assert!(primitives.lookup("#%module-begin").is_some());
        assert!(primitives.lookup("#%app").is_none());

        let kernel = builtins.get(BUILTIN_KERNEL).unwrap().provides;
        assert!(kernel.lookup("#%app").is_some());
        assert!(kernel.lookup("let").is_none());

        let base = builtins.get(BUILTIN_BASE_LANG).unwrap().provides;
        assert!(base.lookup("let").is_some());
        assert!(base.lookup("quote").is_some());
    }

    #[test]
    fn unknown_builtin_is_not_found() {
        let err = BuiltinModules::new().get("#%builtin-nope").unwrap_err();
        assert_eq!(err.code(), "sable::compile::module_not_found");
    }
}
