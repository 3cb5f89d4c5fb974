//! Fake `mocha`, `chai` and `./harness` modules.
//!
//! Block functions run their bodies synchronously under a breadcrumb. The
//! assertion helpers record fixtures instead of validating anything.

use super::context::{ErrorDescriptor, HarvestContext};
use super::stub::{CallPath, PendingAction, PendingFixture};
use crate::error::{HarvestError, Result};
use crate::modules::{ModuleExports, ModuleTable};
use crate::schema::SchemaDef;
use crate::script::{Interpreter, NativeFunction, ObjectMap, Value};
use std::rc::Rc;

/// SDL of the schema `./harness` exports as `testSchema`.
pub const TEST_SCHEMA_SDL: &str = include_str!("../../assets/test_schema.graphql");

pub const MOCHA: &str = "mocha";
pub const CHAI: &str = "chai";
pub const HARNESS: &str = "./harness";

/// Registers the three fake modules on `table`. The harness test schema is
/// built once here and shared by every file of the run.
pub fn install(table: ModuleTable, ctx: &Rc<HarvestContext>) -> Result<ModuleTable> {
    let test_schema = ctx
        .library()
        .build_schema(TEST_SCHEMA_SDL)
        .map_err(|err| HarvestError::Eval {
            file: HARNESS.to_string(),
            message: format!("test schema: {err}"),
        })?;
    Ok(table
        .substitute(MOCHA, mocha_module(ctx))
        .substitute(CHAI, chai_module())
        .substitute(HARNESS, harness_module(ctx, test_schema)))
}

// =============================================================================
// MOCHA
// =============================================================================

fn block(ctx: &Rc<HarvestContext>, name: &str) -> NativeFunction {
    let ctx = Rc::clone(ctx);
    NativeFunction::new(name, move |interp, args| {
        let title = args.first().map(Value::to_display).unwrap_or_default();
        let body = args.get(1).cloned().unwrap_or_default();
        let _crumb = ctx.enter(title);
        if !body.is_nullish() {
            interp.call_value(&body, Vec::new())?;
        }
        Ok(Value::Undefined)
    })
}

pub fn mocha_module(ctx: &Rc<HarvestContext>) -> ModuleExports {
    let mut exports = ObjectMap::new();
    for name in ["describe", "it"] {
        let function = block(ctx, name)
            .with_prop("skip", Value::native(block(ctx, &format!("{name}.skip"))))
            .with_prop("only", Value::native(block(ctx, &format!("{name}.only"))));
        exports.insert(name.to_string(), Value::native(function));
    }
    ModuleExports::table(exports)
}

// =============================================================================
// CHAI
// =============================================================================

pub fn chai_module() -> ModuleExports {
    let mut exports = ObjectMap::new();
    exports.insert(
        "expect".to_string(),
        Value::native(NativeFunction::new("expect", |_, _| {
            Ok(Value::Stub(Rc::new(CallPath::inert("expect"))))
        })),
    );
    ModuleExports::table(exports)
}

// =============================================================================
// HARNESS
// =============================================================================

fn schema_at(interp: &Interpreter<'_>, function: &str, args: &[Value]) -> Result<Rc<SchemaDef>> {
    match args.first() {
        Some(Value::Schema(schema)) => Ok(Rc::clone(schema)),
        other => Err(interp.error(format!(
            "{function}: first argument must be a schema, got {}",
            other.map_or("nothing".to_string(), Value::to_display)
        ))),
    }
}

fn arg(args: &[Value], idx: usize) -> Value {
    args.get(idx).cloned().unwrap_or_default()
}

/// `expectValidationErrors*`: the fixture is recorded by `.toDeepEqual(errors)`.
fn deep_equal_helper(
    ctx: &Rc<HarvestContext>,
    name: &'static str,
    default_schema: Option<Rc<SchemaDef>>,
) -> Value {
    let ctx = Rc::clone(ctx);
    Value::native(NativeFunction::new(name, move |interp, args| {
        let (schema, rest) = match &default_schema {
            Some(schema) => (Rc::clone(schema), args),
            None => (schema_at(interp, name, args)?, args.get(1..).unwrap_or_default()),
        };
        let pending = PendingFixture::new(
            "toDeepEqual",
            PendingAction::Record {
                ctx: Rc::clone(&ctx),
                schema,
                rule: arg(rest, 0),
                query: arg(rest, 1),
            },
        );
        Ok(Value::Stub(Rc::new(CallPath::pending(name, pending))))
    }))
}

/// `expectPassesRule*` / `expectFailsRule*`: recorded on the spot.
fn immediate_helper(
    ctx: &Rc<HarvestContext>,
    name: &'static str,
    default_schema: Option<Rc<SchemaDef>>,
    expects_errors: bool,
) -> Value {
    let ctx = Rc::clone(ctx);
    Value::native(NativeFunction::new(name, move |interp, args| {
        let (schema, rest) = match &default_schema {
            Some(schema) => (Rc::clone(schema), args),
            None => (schema_at(interp, name, args)?, args.get(1..).unwrap_or_default()),
        };
        let errors = if expects_errors {
            ErrorDescriptor::from_expected(&arg(rest, 2))
        } else {
            Vec::new()
        };
        ctx.record(&schema, &arg(rest, 0), &arg(rest, 1), errors);
        Ok(if expects_errors {
            Value::Stub(Rc::new(CallPath::inert("errors")))
        } else {
            Value::Undefined
        })
    }))
}

pub fn harness_module(ctx: &Rc<HarvestContext>, test_schema: Rc<SchemaDef>) -> ModuleExports {
    let mut exports = ObjectMap::new();
    let mut export = |name: &str, value: Value| {
        exports.insert(name.to_string(), value);
    };

    export("testSchema", Value::Schema(Rc::clone(&test_schema)));

    export(
        "expectValidationErrors",
        deep_equal_helper(ctx, "expectValidationErrors", Some(Rc::clone(&test_schema))),
    );
    export(
        "expectValidationErrorsWithSchema",
        deep_equal_helper(ctx, "expectValidationErrorsWithSchema", None),
    );
    export(
        "expectSDLValidationErrors",
        Value::native(NativeFunction::new("expectSDLValidationErrors", |_, _| {
            let pending = PendingFixture::new("toDeepEqual", PendingAction::Ignore);
            Ok(Value::Stub(Rc::new(CallPath::pending(
                "expectSDLValidationErrors",
                pending,
            ))))
        })),
    );

    export(
        "expectPassesRule",
        immediate_helper(ctx, "expectPassesRule", Some(Rc::clone(&test_schema)), false),
    );
    export(
        "expectPassesRuleWithSchema",
        immediate_helper(ctx, "expectPassesRuleWithSchema", None, false),
    );
    export(
        "expectFailsRule",
        immediate_helper(ctx, "expectFailsRule", Some(Rc::clone(&test_schema)), true),
    );
    export(
        "expectFailsRuleWithSchema",
        immediate_helper(ctx, "expectFailsRuleWithSchema", None, true),
    );

    ModuleExports::table(exports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::BreadcrumbPolicy;
    use crate::modules::NoFallback;
    use crate::schema::SdlSchemaLibrary;
    use crate::script::evaluate;

    fn setup() -> (Rc<HarvestContext>, ModuleTable) {
        let ctx = HarvestContext::new(BreadcrumbPolicy::DropOutermost, Rc::new(SdlSchemaLibrary));
        let table = install(ModuleTable::new(Box::new(NoFallback)), &ctx).unwrap();
        (ctx, table)
    }

    #[test]
    fn test_describe_it_nesting_names_records() {
        let (ctx, table) = setup();
        let source = r#"
            import { describe, it } from 'mocha';
            import { expectValidationErrors } from './harness';

            const ExampleRule = { name: 'ExampleRule' };

            describe('Validate: Example', () => {
              describe('nested', () => {
                it('passes', () => {
                  expectValidationErrors(ExampleRule, '{ dog }').toDeepEqual([]);
                });
              });
            });
        "#;
        evaluate(source, "Example-test.ts", &table).unwrap();

        let records = ctx.take_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "nested/passes");
        assert_eq!(records[0].rule, "Example");
        assert_eq!(ctx.depth(), 0);
    }

    #[test]
    fn test_failing_body_still_pops_breadcrumbs() {
        let (ctx, table) = setup();
        let source = r#"
            import { describe, it } from 'mocha';
            describe('outer', () => {
              it('explodes', () => { notDefined(); });
            });
        "#;
        assert!(evaluate(source, "Boom-test.ts", &table).is_err());
        assert_eq!(ctx.depth(), 0);
    }

    #[test]
    fn test_chai_chains_are_inert() {
        let (ctx, table) = setup();
        let source = r#"
            import { expect } from 'chai';
            expect(1).to.have.nested.property('a.b', 2);
            expect([]).to.deep.equal([]);
        "#;
        evaluate(source, "Chai-test.ts", &table).unwrap();
        assert!(ctx.take_records().is_empty());
    }

    #[test]
    fn test_sdl_helper_is_ignored() {
        let (ctx, table) = setup();
        let source = r#"
            import { expectSDLValidationErrors } from './harness';
            expectSDLValidationErrors(undefined, 'LoneSchemaDefinitionRule', 'schema { query: Q }').toDeepEqual([]);
        "#;
        evaluate(source, "Sdl-test.ts", &table).unwrap();
        assert!(ctx.take_records().is_empty());
    }

    #[test]
    fn test_fails_rule_family_records_immediately() {
        let (ctx, table) = setup();
        let source = r#"
            import { describe, it } from 'mocha';
            import { expectFailsRule, expectPassesRule, testSchema } from './harness';

            describe('Validate: Unique names', () => {
              it('passes', () => { expectPassesRule('UniqueNamesRule', '{ a }'); });
              it('fails', () => {
                expectFailsRule('UniqueNamesRule', '{ a }', [{ message: 'dup' }]).errors.length;
              });
            });
        "#;
        evaluate(source, "Unique-test.ts", &table).unwrap();
        let records = ctx.take_records();
        assert_eq!(records.len(), 2);
        assert!(records[0].errors.is_empty());
        assert_eq!(records[1].errors.len(), 1);
        assert_eq!(records[0].schema, records[1].schema);
    }
}
