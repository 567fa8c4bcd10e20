//! Binding frames.
//!
//! A frame holds three disjoint namespaces: run-time definitions, macro
//! transformers and core forms. Installing a name in one namespace of a frame
//! removes it from the other two in that frame. Lookup walks frames innermost
//! first and stops at the first frame that binds the name in any namespace.
//!
//! Bindings live in persistent maps, so copying a module's provides into a
//! frame shares structure instead of copying it.

use std::cell::{Ref, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::ast::SExpr;
use crate::errors::{ErrorKind, SableError};
use crate::expander::core::CoreForm;

// ============================================================================
// CORE DATA STRUCTURES
// ============================================================================

/// Signature of derived forms written in Rust.
pub type NativeFn = fn(&SExpr, &Env) -> Result<SExpr, SableError>;

#[derive(Debug, Clone)]
pub enum Definition {
    /// Declared by `define` or a lambda formal, not yet assigned.
    Uninitialized,
    Value(SExpr),
}

#[derive(Clone)]
pub enum Transformer {
    Native { name: &'static str, func: NativeFn },
    /// A procedure value from `define-syntax`, applied to the whole form.
    Procedure(SExpr),
}

impl fmt::Debug for Transformer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transformer::Native { name, .. } => write!(f, "Native({})", name),
            Transformer::Procedure(p) => write!(f, "Procedure({})", p),
        }
    }
}

/// What a name resolved to.
#[derive(Debug, Clone)]
pub enum Lookup {
    Definition(Definition),
    Syntax(Transformer),
    Core(CoreForm),
}

#[derive(Debug, Clone, Default)]
pub struct Bindings {
    definitions: im::HashMap<String, Definition>,
    syntaxes: im::HashMap<String, Transformer>,
    cores: im::HashMap<String, CoreForm>,
}

impl Bindings {
    pub fn define(&mut self, name: &str, definition: Definition) {
        self.syntaxes.remove(name);
        self.cores.remove(name);
        self.definitions.insert(name.to_string(), definition);
    }

    pub fn define_syntax(&mut self, name: &str, transformer: Transformer) {
        self.definitions.remove(name);
        self.cores.remove(name);
        self.syntaxes.insert(name.to_string(), transformer);
    }

    pub fn define_core(&mut self, name: &str, core: CoreForm) {
        self.definitions.remove(name);
        self.syntaxes.remove(name);
        self.cores.insert(name.to_string(), core);
    }

    /// Install a resolved binding under `name`.
    pub fn insert(&mut self, name: &str, lookup: Lookup) {
        match lookup {
            Lookup::Definition(d) => self.define(name, d),
            Lookup::Syntax(t) => self.define_syntax(name, t),
            Lookup::Core(c) => self.define_core(name, c),
        }
    }

    pub fn lookup(&self, name: &str) -> Option<Lookup> {
        if let Some(d) = self.definitions.get(name) {
            return Some(Lookup::Definition(d.clone()));
        }
        if let Some(t) = self.syntaxes.get(name) {
            return Some(Lookup::Syntax(t.clone()));
        }
        self.cores.get(name).map(|c| Lookup::Core(*c))
    }

    /// Copy every binding of `other` over this one.
    pub fn extend(&mut self, other: &Bindings) {
        for (name, d) in other.definitions.iter() {
            self.define(name, d.clone());
        }
        for (name, t) in other.syntaxes.iter() {
            self.define_syntax(name, t.clone());
        }
        for (name, c) in other.cores.iter() {
            self.define_core(name, *c);
        }
    }

    /// All bound names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .definitions
            .keys()
            .chain(self.syntaxes.keys())
            .chain(self.cores.keys())
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.definitions.len() + self.syntaxes.len() + self.cores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// FRAMES
// ============================================================================

#[derive(Debug)]
pub struct Frame {
    bindings: RefCell<Bindings>,
    parent: Option<Env>,
}

pub type Env = Rc<Frame>;

impl Frame {
    pub fn root() -> Env {
        Rc::new(Frame {
            bindings: RefCell::new(Bindings::default()),
            parent: None,
        })
    }

    pub fn child(parent: &Env) -> Env {
        Self::with_bindings(Bindings::default(), Some(parent))
    }

    pub fn with_bindings(bindings: Bindings, parent: Option<&Env>) -> Env {
        Rc::new(Frame {
            bindings: RefCell::new(bindings),
            parent: parent.cloned(),
        })
    }

    pub fn parent(&self) -> Option<&Env> {
        self.parent.as_ref()
    }

    pub fn bindings(&self) -> Ref<'_, Bindings> {
        self.bindings.borrow()
    }

    /// Empty the frame. A closure stored in the frame it closes over keeps
    /// that frame alive through `Rc`; emptying a finished frame breaks the
    /// loop.
    pub fn release(&self) {
        let released = self.bindings.replace(Bindings::default());
        drop(released);
    }
}

// ============================================================================
// PUBLIC API
// ============================================================================

/// Resolve `name`, returning the binding frame and what it holds.
pub fn find(name: &str, env: &Env) -> Option<(Env, Lookup)> {
    let mut frame = Some(env);
    while let Some(current) = frame {
        if let Some(lookup) = current.bindings().lookup(name) {
            return Some((Rc::clone(current), lookup));
        }
        frame = current.parent();
    }
    None
}

/// The run-time value of `name`.
pub fn get_value(name: &str, env: &Env) -> Result<SExpr, SableError> {
    match find(name, env) {
        Some((_, Lookup::Definition(Definition::Value(value)))) => Ok(value),
        Some((_, Lookup::Definition(Definition::Uninitialized))) => {
            Err(ErrorKind::Uninitialized { name: name.into() }.into())
        }
        Some((_, Lookup::Syntax(_) | Lookup::Core(_))) => {
            Err(ErrorKind::NotAVariable { name: name.into() }.into())
        }
        None => Err(ErrorKind::UnboundVariable { name: name.into() }.into()),
    }
}

pub fn get_syntax(name: &str, env: &Env) -> Option<Transformer> {
    match find(name, env) {
        Some((_, Lookup::Syntax(t))) => Some(t),
        _ => None,
    }
}

pub fn get_core(name: &str, env: &Env) -> Option<CoreForm> {
    match find(name, env) {
        Some((_, Lookup::Core(c))) => Some(c),
        _ => None,
    }
}

pub fn set_define(frame: &Env, name: &str, definition: Definition) {
    frame.bindings.borrow_mut().define(name, definition);
}

pub fn set_syntax(frame: &Env, name: &str, transformer: Transformer) {
    frame.bindings.borrow_mut().define_syntax(name, transformer);
}

pub fn set_core(frame: &Env, name: &str, core: CoreForm) {
    frame.bindings.borrow_mut().define_core(name, core);
}

pub fn install_bindings(frame: &Env, bindings: &Bindings) {
    frame.bindings.borrow_mut().extend(bindings);
}
