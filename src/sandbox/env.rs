//! Lexical environments.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::error::EvalError;
use super::value::Value;

/// What a name is bound to.
#[derive(Clone)]
pub enum Slot {
    Value(Value),
    /// Declared with `let`/`const`/`class` but not yet initialized.
    Uninit,
    /// A live import: export `name` of bundled module `module`.
    Import { module: usize, name: String },
    /// `import * as ns`
    Namespace(usize),
    /// A binding from a module that is not part of the bundle.
    External(String),
}

#[derive(Clone)]
pub struct Binding {
    pub slot: Slot,
    pub mutable: bool,
}

/// A scope frame. Frames form a chain through `parent`.
#[derive(Default)]
pub struct Scope {
    vars: RefCell<HashMap<String, Binding>>,
    parent: Option<Rc<Scope>>,
}

impl Scope {
    pub fn root() -> Rc<Self> {
        Rc::new(Scope::default())
    }

    pub fn child(parent: &Rc<Scope>) -> Rc<Self> {
        Rc::new(Scope {
            vars: RefCell::new(HashMap::new()),
            parent: Some(parent.clone()),
        })
    }

    pub fn declare(&self, name: &str, slot: Slot, mutable: bool) {
        self.vars
            .borrow_mut()
            .insert(name.to_string(), Binding { slot, mutable });
    }

    pub fn has_own(&self, name: &str) -> bool {
        self.vars.borrow().contains_key(name)
    }

    /// The binding for `name`, searching outwards.
    pub fn lookup(&self, name: &str) -> Option<Binding> {
        if let Some(binding) = self.vars.borrow().get(name) {
            return Some(binding.clone());
        }
        self.parent.as_ref().and_then(|parent| parent.lookup(name))
    }

    /// Initialize a declared binding, ending its dead zone.
    pub fn initialize(&self, name: &str, value: Value) {
        if let Some(binding) = self.vars.borrow_mut().get_mut(name) {
            binding.slot = Slot::Value(value);
        }
    }

    /// Assign to an existing binding, searching outwards.
    pub fn assign(&self, name: &str, value: Value) -> Result<(), EvalError> {
        {
            let mut vars = self.vars.borrow_mut();
            if let Some(binding) = vars.get_mut(name) {
                return match binding.slot {
                    Slot::Uninit => Err(EvalError::Reference(format!(
                        "cannot access `{name}` before initialization"
                    ))),
                    Slot::Value(_) if binding.mutable => {
                        binding.slot = Slot::Value(value);
                        Ok(())
                    }
                    _ => Err(EvalError::Type(format!("assignment to constant `{name}`"))),
                };
            }
        }
        match &self.parent {
            Some(parent) => parent.assign(name, value),
            None => Err(EvalError::Reference(format!("`{name}` is not defined"))),
        }
    }

    /// Names bound directly in this frame.
    pub fn names(&self) -> Vec<String> {
        self.vars.borrow().keys().cloned().collect()
    }
}
