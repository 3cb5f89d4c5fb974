//! Call-path stand-in returned by assertion helpers.
//!
//! Test sources chain arbitrary accesses and calls on whatever an assertion
//! helper returns (`expect(x).to.have.nested.property(...)`). A stand-in
//! accepts every such chain. When a pending fixture is attached, accessing
//! its terminal member yields a [`CallPath::Terminal`] whose invocation
//! completes the fixture.

use super::context::{ErrorDescriptor, HarvestContext};
use crate::schema::SchemaDef;
use crate::script::Value;
use std::cell::Cell;
use std::rc::Rc;

#[derive(Debug)]
pub enum CallPath {
    Chain {
        path: String,
        pending: Option<Rc<PendingFixture>>,
    },
    Terminal {
        path: String,
        pending: Rc<PendingFixture>,
    },
}

impl CallPath {
    /// A chain whose terminal member completes `pending`.
    pub fn pending(root: impl Into<String>, pending: Rc<PendingFixture>) -> Self {
        CallPath::Chain {
            path: root.into(),
            pending: Some(pending),
        }
    }

    /// A chain that swallows everything.
    pub fn inert(root: impl Into<String>) -> Self {
        CallPath::Chain {
            path: root.into(),
            pending: None,
        }
    }

    /// Dotted path accumulated so far, for diagnostics.
    pub fn path(&self) -> &str {
        match self {
            CallPath::Chain { path, .. } | CallPath::Terminal { path, .. } => path,
        }
    }

    pub fn member(&self, prop: &str) -> CallPath {
        let path = format!("{}.{prop}", self.path());
        match self {
            CallPath::Chain {
                pending: Some(pending),
                ..
            } if pending.terminal == prop => CallPath::Terminal {
                path,
                pending: Rc::clone(pending),
            },
            CallPath::Chain { pending, .. } => CallPath::Chain {
                path,
                pending: pending.clone(),
            },
            CallPath::Terminal { .. } => CallPath::inert(path),
        }
    }

    /// Calling a chain extends it; calling a terminal completes its fixture
    /// and yields `undefined`.
    pub fn invoke(&self, args: &[Value]) -> Value {
        match self {
            CallPath::Chain { path, pending } => Value::Stub(Rc::new(CallPath::Chain {
                path: format!("{path}()"),
                pending: pending.clone(),
            })),
            CallPath::Terminal { pending, .. } => {
                pending.complete(args.first().unwrap_or(&Value::Undefined));
                Value::Undefined
            }
        }
    }
}

/// What completing a pending fixture does.
pub enum PendingAction {
    Record {
        ctx: Rc<HarvestContext>,
        schema: Rc<SchemaDef>,
        rule: Value,
        query: Value,
    },
    /// SDL fixtures are not harvested.
    Ignore,
}

/// A fixture waiting for its terminal call. Completes at most once.
pub struct PendingFixture {
    terminal: &'static str,
    action: PendingAction,
    fired: Cell<bool>,
}

impl PendingFixture {
    pub fn new(terminal: &'static str, action: PendingAction) -> Rc<Self> {
        Rc::new(Self {
            terminal,
            action,
            fired: Cell::new(false),
        })
    }

    pub fn is_fired(&self) -> bool {
        self.fired.get()
    }

    fn complete(&self, expected: &Value) {
        if self.is_fired() {
            tracing::debug!(terminal = self.terminal, "pending fixture already completed");
            return;
        }
        self.fired.set(true);
        match &self.action {
            PendingAction::Record {
                ctx,
                schema,
                rule,
                query,
            } => ctx.record(schema, rule, query, ErrorDescriptor::from_expected(expected)),
            PendingAction::Ignore => {}
        }
    }
}

impl Drop for PendingFixture {
    fn drop(&mut self) {
        if !self.is_fired() && matches!(self.action, PendingAction::Record { .. }) {
            tracing::debug!(
                terminal = self.terminal,
                "assertion dropped before its terminal call; no fixture recorded"
            );
        }
    }
}

impl std::fmt::Debug for PendingFixture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingFixture")
            .field("terminal", &self.terminal)
            .field("fired", &self.is_fired())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::BreadcrumbPolicy;
    use crate::schema::SdlSchemaLibrary;

    fn recording() -> (Rc<HarvestContext>, Rc<PendingFixture>) {
        let ctx = HarvestContext::new(BreadcrumbPolicy::Full, Rc::new(SdlSchemaLibrary));
        let pending = PendingFixture::new(
            "toDeepEqual",
            PendingAction::Record {
                ctx: Rc::clone(&ctx),
                schema: Rc::new(SchemaDef::Sdl("type Query { a: String }".into())),
                rule: Value::Rule(Rc::from("ExampleRule")),
                query: Value::str("{ a }"),
            },
        );
        (ctx, pending)
    }

    #[test]
    fn test_inert_chain_accepts_anything() {
        let mut path = CallPath::inert("expect");
        for prop in ["to", "have", "nested", "property"] {
            path = path.member(prop);
        }
        let Value::Stub(called) = path.invoke(&[Value::str("a.b")]) else {
            panic!("calling a chain yields a chain");
        };
        assert_eq!(called.path(), "expect.to.have.nested.property()");
    }

    #[test]
    fn test_terminal_records_once() {
        let (ctx, pending) = recording();
        let chain = CallPath::pending("expectValidationErrors", Rc::clone(&pending));
        let terminal = chain.member("toDeepEqual");
        assert!(matches!(terminal, CallPath::Terminal { .. }));

        terminal.invoke(&[Value::array(vec![])]);
        terminal.invoke(&[Value::array(vec![])]);
        chain.member("toDeepEqual").invoke(&[]);

        assert!(pending.is_fired());
        assert_eq!(ctx.take_records().len(), 1);
    }

    #[test]
    fn test_unrelated_members_do_not_record() {
        let (ctx, pending) = recording();
        let chain = CallPath::pending("expectValidationErrors", pending);
        chain.member("toEqual").invoke(&[]);
        chain.member("to").member("deep").invoke(&[]);
        assert!(ctx.take_records().is_empty());
    }
}
