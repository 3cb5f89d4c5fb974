//! Run-wide recording state shared by the fake modules.

use crate::normalize::normalize_whitespace;
use crate::schema::{SchemaDef, SchemaLibrary, SchemaRegistry};
use crate::script::Value;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::cell::{Ref, RefCell};
use std::rc::Rc;

/// How the breadcrumb trail becomes a fixture name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BreadcrumbPolicy {
    /// Drop the outermost block name (usually the rule's own `describe`).
    #[default]
    DropOutermost,
    /// Join every block name.
    Full,
}

impl std::fmt::Display for BreadcrumbPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BreadcrumbPolicy::DropOutermost => write!(f, "drop-outermost"),
            BreadcrumbPolicy::Full => write!(f, "full"),
        }
    }
}

/// An expected validation error exactly as the test source wrote it.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct ErrorDescriptor(pub Value);

impl ErrorDescriptor {
    /// Splits an authored expectation into descriptors: an array yields one
    /// per element, `undefined` yields none, anything else is one descriptor.
    pub fn from_expected(expected: &Value) -> Vec<ErrorDescriptor> {
        match expected {
            Value::Undefined => Vec::new(),
            Value::Array(items) => items.borrow().iter().cloned().map(ErrorDescriptor).collect(),
            other => vec![ErrorDescriptor(other.clone())],
        }
    }
}

/// One harvested fixture. Field order is the serialized key order.
#[derive(Debug, Clone, Serialize)]
pub struct FixtureRecord {
    pub name: String,
    pub rule: String,
    pub schema: usize,
    pub query: String,
    pub errors: Vec<ErrorDescriptor>,
}

/// Breadcrumb stack, per-file accumulator and schema registry for one run.
pub struct HarvestContext {
    policy: BreadcrumbPolicy,
    library: Rc<dyn SchemaLibrary>,
    breadcrumbs: RefCell<Vec<String>>,
    records: RefCell<Vec<FixtureRecord>>,
    schemas: RefCell<SchemaRegistry>,
}

impl HarvestContext {
    pub fn new(policy: BreadcrumbPolicy, library: Rc<dyn SchemaLibrary>) -> Rc<Self> {
        Rc::new(Self {
            policy,
            library,
            breadcrumbs: RefCell::new(Vec::new()),
            records: RefCell::new(Vec::new()),
            schemas: RefCell::new(SchemaRegistry::new()),
        })
    }

    pub fn policy(&self) -> BreadcrumbPolicy {
        self.policy
    }

    pub fn library(&self) -> &Rc<dyn SchemaLibrary> {
        &self.library
    }

    /// Clears the per-file state. The schema registry is kept.
    pub fn begin_file(&self, file: &str) {
        let leftover = self.records.borrow().len();
        if leftover > 0 {
            tracing::warn!(file, leftover, "discarding records that were never taken");
        }
        self.breadcrumbs.borrow_mut().clear();
        self.records.borrow_mut().clear();
    }

    /// Pushes a block name. The returned guard pops it again, also when the
    /// block body fails.
    pub fn enter(self: &Rc<Self>, name: impl Into<String>) -> BreadcrumbGuard {
        let mut breadcrumbs = self.breadcrumbs.borrow_mut();
        let depth = breadcrumbs.len();
        breadcrumbs.push(name.into());
        BreadcrumbGuard {
            ctx: Rc::clone(self),
            depth,
        }
    }

    pub fn depth(&self) -> usize {
        self.breadcrumbs.borrow().len()
    }

    /// Fixture name for the current breadcrumb stack.
    pub fn trail(&self) -> String {
        let breadcrumbs = self.breadcrumbs.borrow();
        let skip = match self.policy {
            BreadcrumbPolicy::DropOutermost => 1,
            BreadcrumbPolicy::Full => 0,
        };
        breadcrumbs
            .iter()
            .skip(skip)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Appends a fixture for the current breadcrumb position.
    pub fn record(
        &self,
        schema: &Rc<SchemaDef>,
        rule: &Value,
        query: &Value,
        errors: Vec<ErrorDescriptor>,
    ) {
        let record = FixtureRecord {
            name: self.trail(),
            rule: rule_name(rule),
            schema: self.schemas.borrow_mut().register(schema),
            query: normalize_whitespace(&query.to_display()),
            errors,
        };
        tracing::trace!(
            name = %record.name,
            rule = %record.rule,
            schema = record.schema,
            errors = record.errors.len(),
            "recorded fixture"
        );
        self.records.borrow_mut().push(record);
    }

    pub fn take_records(&self) -> Vec<FixtureRecord> {
        std::mem::take(&mut *self.records.borrow_mut())
    }

    pub fn schemas(&self) -> Ref<'_, SchemaRegistry> {
        self.schemas.borrow()
    }
}

/// Restores the breadcrumb stack to its depth before [`HarvestContext::enter`].
#[must_use = "the breadcrumb is popped when the guard drops"]
pub struct BreadcrumbGuard {
    ctx: Rc<HarvestContext>,
    depth: usize,
}

impl Drop for BreadcrumbGuard {
    fn drop(&mut self) {
        self.ctx.breadcrumbs.borrow_mut().truncate(self.depth);
    }
}

/// The rule's identifier with a trailing `Rule` removed.
pub fn rule_name(rule: &Value) -> String {
    let identifier = rule_identifier(rule);
    identifier
        .strip_suffix("Rule")
        .map(str::to_string)
        .unwrap_or(identifier)
}

/// Name of a rule or function value as a script would read `.name`.
pub fn rule_identifier(rule: &Value) -> String {
    match rule {
        Value::Rule(name) | Value::Str(name) => name.to_string(),
        Value::Function(closure) => closure.def.name.clone().unwrap_or_default(),
        Value::Native(native) => native.name.clone(),
        Value::Object(map) => map
            .borrow()
            .get("name")
            .map(Value::to_display)
            .unwrap_or_default(),
        _ => String::new(),
    }
}
