//! Module resolution for evaluated test sources.
//!
//! Every `import` goes through a [`ModuleTable`]: exact-specifier
//! substitutions first (the fake test framework and harness), then a
//! fallback [`ModuleResolver`]. A specifier neither can provide is a
//! `MissingDependency` and stops the run.

mod project;
mod type_config;

pub use project::ProjectResolver;

use crate::error::{HarvestError, Result};
use crate::script::{ObjectMap, Value};
use indexmap::IndexMap;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// What a resolved module exports.
#[derive(Debug, Clone)]
pub enum ModuleExports {
    /// A fixed export table.
    Table(Rc<ObjectMap>),
    /// A validation rule module: every named export is an opaque rule
    /// carrying its own name.
    Rules,
}

impl ModuleExports {
    pub fn table(exports: ObjectMap) -> Self {
        ModuleExports::Table(Rc::new(exports))
    }

    pub fn export(&self, name: &str) -> Option<Value> {
        match self {
            ModuleExports::Table(exports) => exports.get(name).cloned(),
            ModuleExports::Rules => Some(Value::Rule(Rc::from(name))),
        }
    }

    /// The `import * as ns` object.
    pub fn namespace(&self) -> Value {
        match self {
            ModuleExports::Table(exports) => Value::object(exports.as_ref().clone()),
            ModuleExports::Rules => Value::object(ObjectMap::new()),
        }
    }
}

pub trait ModuleResolver {
    /// Exports for `specifier`, or `None` when this resolver cannot provide it.
    fn resolve(&self, specifier: &str) -> Option<ModuleExports>;

    /// Resolver name for logging
    fn name(&self) -> &str;
}

/// Resolves nothing; every non-substituted import is missing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFallback;

impl ModuleResolver for NoFallback {
    fn resolve(&self, _specifier: &str) -> Option<ModuleExports> {
        None
    }

    fn name(&self) -> &str {
        "none"
    }
}

/// Specifier-to-exports mapping shared by every file in a run.
pub struct ModuleTable {
    substitutions: IndexMap<String, ModuleExports>,
    fallback: Box<dyn ModuleResolver>,
    resolved: RefCell<HashMap<String, ModuleExports>>,
}

impl ModuleTable {
    pub fn new(fallback: Box<dyn ModuleResolver>) -> Self {
        Self {
            substitutions: IndexMap::new(),
            fallback,
            resolved: RefCell::new(HashMap::new()),
        }
    }

    /// Maps `specifier` to `exports`, shadowing the fallback.
    pub fn substitute(mut self, specifier: impl Into<String>, exports: ModuleExports) -> Self {
        self.substitutions.insert(specifier.into(), exports);
        self
    }

    pub fn substituted(&self) -> impl Iterator<Item = &str> {
        self.substitutions.keys().map(String::as_str)
    }

    /// Resolves `specifier` as imported by `importer`. Fallback results are
    /// cached so every importer sees the same exported values.
    pub fn load(&self, specifier: &str, importer: &str) -> Result<ModuleExports> {
        if let Some(exports) = self.substitutions.get(specifier) {
            tracing::trace!(specifier, importer, "substituted module");
            return Ok(exports.clone());
        }
        if let Some(exports) = self.resolved.borrow().get(specifier) {
            return Ok(exports.clone());
        }
        match self.fallback.resolve(specifier) {
            Some(exports) => {
                tracing::trace!(
                    specifier,
                    importer,
                    resolver = self.fallback.name(),
                    "resolved module"
                );
                self.resolved
                    .borrow_mut()
                    .insert(specifier.to_string(), exports.clone());
                Ok(exports)
            }
            None => Err(HarvestError::MissingDependency {
                specifier: specifier.to_string(),
                importer: importer.to_string(),
            }),
        }
    }
}
