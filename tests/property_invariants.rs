//! Property-Based Invariant Testing
//!
//! Invariants that must hold for any input:
//! - Whitespace normalization is idempotent and keeps the first line
//! - Schema indices follow first registration and never change
//! - The breadcrumb stack is balanced after any nesting, failing or not
//! - Stand-in chains accept any access sequence and record at most once

use std::rc::Rc;

use gql_fixture_harvest::harness::{
    BreadcrumbPolicy, CallPath, HarvestContext, PendingAction, PendingFixture,
};
use gql_fixture_harvest::normalize_whitespace;
use gql_fixture_harvest::schema::{SchemaDef, SchemaRegistry, SdlSchemaLibrary};
use gql_fixture_harvest::script::Value;
use proptest::prelude::*;

// =============================================================================
// Whitespace Normalization
// =============================================================================

fn query_text() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![
            Just(String::new()),
            "[ ]{0,8}",
            "[ ]{0,8}[a-z{}()$:]{1,12}",
        ],
        0..8,
    )
    .prop_flat_map(|lines| {
        let count = lines.len().saturating_sub(1);
        (
            Just(lines),
            prop::collection::vec(prop_oneof![Just("\n"), Just("\r\n"), Just("\r")], count),
        )
    })
    .prop_map(|(lines, breaks)| {
        let mut out = String::new();
        for (idx, line) in lines.iter().enumerate() {
            if idx > 0 {
                out.push_str(breaks[idx - 1]);
            }
            out.push_str(line);
        }
        out
    })
}

proptest! {
    #[test]
    fn normalization_is_idempotent(raw in query_text()) {
        let once = normalize_whitespace(&raw);
        prop_assert_eq!(normalize_whitespace(&once), once);
    }

    #[test]
    fn normalization_keeps_first_line_and_line_count(raw in query_text()) {
        let normalized = normalize_whitespace(&raw);
        prop_assert!(!normalized.contains('\r'));

        let first = raw.split(['\n', '\r']).next().unwrap_or_default();
        prop_assert!(normalized.starts_with(first));

        let raw_lines = raw.replace("\r\n", "\n").replace('\r', "\n").split('\n').count();
        prop_assert_eq!(normalized.split('\n').count(), raw_lines);
    }

    #[test]
    fn normalization_never_shortens_text_lines(raw in query_text()) {
        let normalized = normalize_whitespace(&raw);
        let unified = raw.replace("\r\n", "\n").replace('\r', "\n");
        for (before, after) in unified.split('\n').zip(normalized.split('\n')) {
            if !before.trim().is_empty() {
                prop_assert_eq!(before, after);
            }
        }
    }
}

// =============================================================================
// Schema Registry
// =============================================================================

proptest! {
    #[test]
    fn registry_indices_follow_first_registration(picks in prop::collection::vec(0usize..6, 1..40)) {
        let pool: Vec<Rc<SchemaDef>> = (0..6)
            .map(|n| Rc::new(SchemaDef::Sdl(format!("type Query {{ f{n}: String }}"))))
            .collect();

        let mut registry = SchemaRegistry::new();
        let mut first_seen: Vec<usize> = Vec::new();
        for pick in picks {
            let index = registry.register(&pool[pick]);
            match first_seen.iter().position(|seen| *seen == pick) {
                Some(expected) => prop_assert_eq!(index, expected),
                None => {
                    prop_assert_eq!(index, first_seen.len());
                    first_seen.push(pick);
                }
            }
        }
        prop_assert_eq!(registry.len(), first_seen.len());

        let (slots, failures) = registry.canonicalize(&SdlSchemaLibrary);
        prop_assert!(failures.is_empty());
        prop_assert_eq!(slots.len(), first_seen.len() + 1);
        prop_assert_eq!(slots.last().cloned().flatten(), Some(String::new()));
    }
}

// =============================================================================
// Breadcrumb Balance
// =============================================================================

#[derive(Debug, Clone)]
enum Block {
    Leaf,
    Nested(Vec<Block>),
    Failing,
}

fn block_tree() -> impl Strategy<Value = Vec<Block>> {
    let leaf = prop_oneof![Just(Block::Leaf), Just(Block::Failing)];
    let tree = leaf.prop_recursive(4, 32, 4, |inner| {
        prop::collection::vec(inner, 0..4).prop_map(Block::Nested)
    });
    prop::collection::vec(tree, 0..5)
}

/// Walks the tree the way the fake `describe`/`it` do; `Err` unwinds like a
/// failing block body.
fn run_blocks(ctx: &Rc<HarvestContext>, blocks: &[Block], depth: usize) -> Result<(), ()> {
    for (idx, block) in blocks.iter().enumerate() {
        let _crumb = ctx.enter(format!("block {depth}.{idx}"));
        assert_eq!(ctx.depth(), depth + 1);
        match block {
            Block::Leaf => {}
            Block::Nested(children) => run_blocks(ctx, children, depth + 1)?,
            Block::Failing => return Err(()),
        }
    }
    Ok(())
}

proptest! {
    #[test]
    fn breadcrumbs_are_balanced(blocks in block_tree()) {
        let ctx = HarvestContext::new(BreadcrumbPolicy::DropOutermost, Rc::new(SdlSchemaLibrary));
        let _ = run_blocks(&ctx, &blocks, 0);
        prop_assert_eq!(ctx.depth(), 0);
        prop_assert_eq!(ctx.trail(), "");
    }
}

// =============================================================================
// Stand-in Chains
// =============================================================================

#[derive(Debug, Clone)]
enum Step {
    Member(String),
    Invoke,
}

fn steps() -> impl Strategy<Value = Vec<Step>> {
    prop::collection::vec(
        prop_oneof![
            prop_oneof![
                Just("to".to_string()),
                Just("deep".to_string()),
                Just("toDeepEqual".to_string()),
                "[a-z]{1,8}",
            ]
            .prop_map(Step::Member),
            Just(Step::Invoke),
        ],
        0..24,
    )
}

proptest! {
    #[test]
    fn chains_accept_any_sequence_and_record_at_most_once(steps in steps()) {
        let ctx = HarvestContext::new(BreadcrumbPolicy::Full, Rc::new(SdlSchemaLibrary));
        let schema = Rc::new(SchemaDef::Sdl("type Query { a: String }".to_string()));
        let _crumb = ctx.enter("chain");
        let pending = PendingFixture::new(
            "toDeepEqual",
            PendingAction::Record {
                ctx: Rc::clone(&ctx),
                schema,
                rule: Value::str("ExampleRule"),
                query: Value::str("{ a }"),
            },
        );

        let mut current = Value::Stub(Rc::new(CallPath::pending("expectValidationErrors", Rc::clone(&pending))));
        for step in &steps {
            current = match (&current, step) {
                (Value::Stub(path), Step::Member(name)) => Value::Stub(Rc::new(path.member(name))),
                (Value::Stub(path), Step::Invoke) => path.invoke(&[Value::array(Vec::new())]),
                (_, _) => Value::Stub(Rc::new(CallPath::pending("expectValidationErrors", Rc::clone(&pending)))),
            };
        }

        let records = ctx.take_records();
        prop_assert!(records.len() <= 1);
        prop_assert_eq!(records.len() == 1, pending.is_fired());
        if let Some(record) = records.first() {
            prop_assert_eq!(record.name.as_str(), "chain");
            prop_assert_eq!(record.rule.as_str(), "Example");
        }
    }
}
