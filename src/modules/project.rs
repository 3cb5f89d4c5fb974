//! Fallback resolver for the project modules validation tests import.
//!
//! Nothing here runs real GraphQL code. Rule modules hand out opaque rule
//! handles, schema utilities build [`SchemaDef`] handles through the
//! [`SchemaLibrary`], and the remaining helpers are small enough to mirror.

use super::type_config::assemble_schema;
use super::{ModuleExports, ModuleResolver};
use crate::error::Result;
use crate::harness::CallPath;
use crate::schema::{SchemaDef, SchemaLibrary};
use crate::script::{Interpreter, NativeFunction, ObjectMap, Value};
use std::rc::Rc;

pub struct ProjectResolver {
    library: Rc<dyn SchemaLibrary>,
}

impl ProjectResolver {
    pub fn new(library: Rc<dyn SchemaLibrary>) -> Self {
        Self { library }
    }
}

impl ModuleResolver for ProjectResolver {
    fn resolve(&self, specifier: &str) -> Option<ModuleExports> {
        if specifier.contains("/rules/") {
            return Some(ModuleExports::Rules);
        }
        let module = specifier.rsplit('/').next().unwrap_or(specifier);
        let parent = specifier
            .rsplit('/')
            .nth(1)
            .unwrap_or_default();
        let exports = match (parent, module) {
            (_, "buildASTSchema") => build_ast_schema_exports(&self.library),
            (_, "extendSchema") => extend_schema_exports(&self.library),
            ("language", "parser") => parser_exports(),
            ("type", "schema") => schema_exports(&self.library),
            ("type", "definition") => definition_exports(),
            ("type", "scalars") => scalar_exports(),
            ("type", "directives") => directive_exports(),
            (_, "dedent") => single("dedent", NativeFunction::new("dedent", dedent)),
            (_, "inspect") => single("inspect", NativeFunction::new("inspect", |_, args| {
                Ok(Value::str(inspect(args.first().unwrap_or(&Value::Undefined))))
            })),
            (_, "invariant") => single("invariant", NativeFunction::new("invariant", invariant)),
            (_, "expectJSON") => inert_export("expectJSON"),
            (_, "validate") => inert_export("validate"),
            _ => return None,
        };
        Some(ModuleExports::table(exports))
    }

    fn name(&self) -> &str {
        "project"
    }
}

fn single(name: &str, function: NativeFunction) -> ObjectMap {
    let mut exports = ObjectMap::new();
    exports.insert(name.to_string(), Value::native(function));
    exports
}

/// A function whose result swallows every access and call. Stands in for
/// helpers that would run real validation.
fn inert_export(name: &'static str) -> ObjectMap {
    single(
        name,
        NativeFunction::new(name, move |_, _| Ok(Value::Stub(Rc::new(CallPath::inert(name))))),
    )
}

fn schema_arg(interp: &Interpreter<'_>, function: &str, value: Option<&Value>) -> Result<Rc<SchemaDef>> {
    match value {
        Some(Value::Schema(schema)) => Ok(Rc::clone(schema)),
        other => Err(interp.error(format!(
            "{function} expects a schema, got {}",
            other.map_or("nothing".to_string(), Value::to_display)
        ))),
    }
}

/// SDL text from a string or from a document returned by `parse`.
fn sdl_arg(interp: &Interpreter<'_>, function: &str, value: Option<&Value>) -> Result<String> {
    match value {
        Some(Value::Str(sdl)) => Ok(sdl.to_string()),
        Some(Value::Object(document)) => match document.borrow().get("source") {
            Some(Value::Str(sdl)) => Ok(sdl.to_string()),
            _ => Err(interp.error(format!("{function} expects a parsed document"))),
        },
        _ => Err(interp.error(format!("{function} expects SDL"))),
    }
}

fn build_ast_schema_exports(library: &Rc<dyn SchemaLibrary>) -> ObjectMap {
    let mut exports = ObjectMap::new();
    for name in ["buildSchema", "buildASTSchema"] {
        let library = Rc::clone(library);
        exports.insert(
            name.to_string(),
            Value::native(NativeFunction::new(name, move |interp, args| {
                let sdl = sdl_arg(interp, name, args.first())?;
                library
                    .build_schema(&sdl)
                    .map(Value::Schema)
                    .map_err(|err| interp.error(format!("{name}: {err}")))
            })),
        );
    }
    exports
}

fn extend_schema_exports(library: &Rc<dyn SchemaLibrary>) -> ObjectMap {
    let library = Rc::clone(library);
    single(
        "extendSchema",
        NativeFunction::new("extendSchema", move |interp, args| {
            let base = schema_arg(interp, "extendSchema", args.first())?;
            let sdl = sdl_arg(interp, "extendSchema", args.get(1))?;
            library
                .extend_schema(&base, &sdl)
                .map(Value::Schema)
                .map_err(|err| interp.error(format!("extendSchema: {err}")))
        }),
    )
}

fn parser_exports() -> ObjectMap {
    single(
        "parse",
        NativeFunction::new("parse", |_, args| {
            let mut document = ObjectMap::new();
            document.insert("kind".to_string(), Value::str("Document"));
            document.insert(
                "source".to_string(),
                Value::str(args.first().map(Value::to_display).unwrap_or_default()),
            );
            Ok(Value::object(document))
        }),
    )
}

/// `new GraphQLSchema(config)`: an empty config is the empty schema, anything
/// else is assembled from its type objects. A config that does not resolve
/// to named types stays unprintable.
fn schema_exports(library: &Rc<dyn SchemaLibrary>) -> ObjectMap {
    let library = Rc::clone(library);
    single(
        "GraphQLSchema",
        NativeFunction::new("GraphQLSchema", move |interp, args| {
            let config = args.first().cloned().unwrap_or_default();
            let has_entries = match &config {
                Value::Object(map) => map.borrow().values().any(|value| !value.is_nullish()),
                _ => false,
            };
            if !has_entries {
                return library
                    .build_schema("")
                    .map(Value::Schema)
                    .map_err(|err| interp.error(format!("GraphQLSchema: {err}")));
            }
            let schema = match assemble_schema(interp, &config) {
                Ok(assembled) => SchemaDef::Assembled(assembled),
                Err(reason) => {
                    tracing::debug!(file = interp.file(), %reason, "schema config left unassembled");
                    SchemaDef::Programmatic { reason }
                }
            };
            Ok(Value::Schema(Rc::new(schema)))
        }),
    )
}

/// Type constructors return their config tagged with the constructor name.
/// Wrappers keep their argument as `ofType`.
fn type_constructor(name: &'static str) -> Value {
    let wrapper = matches!(name, "GraphQLList" | "GraphQLNonNull");
    Value::native(NativeFunction::new(name, move |_, args| {
        let mut config = ObjectMap::new();
        config.insert("__kind".to_string(), Value::str(name));
        match args.first() {
            Some(Value::Object(source)) if !wrapper => {
                for (key, value) in source.borrow().iter() {
                    config.insert(key.clone(), value.clone());
                }
            }
            Some(other) => {
                config.insert("ofType".to_string(), other.clone());
            }
            None => {}
        }
        Ok(Value::object(config))
    }))
}

fn definition_exports() -> ObjectMap {
    [
        "GraphQLObjectType",
        "GraphQLInterfaceType",
        "GraphQLUnionType",
        "GraphQLEnumType",
        "GraphQLInputObjectType",
        "GraphQLScalarType",
        "GraphQLList",
        "GraphQLNonNull",
    ]
    .into_iter()
    .map(|name| (name.to_string(), type_constructor(name)))
    .collect()
}

fn named(name: &str) -> Value {
    let mut scalar = ObjectMap::new();
    scalar.insert("name".to_string(), Value::str(name));
    Value::object(scalar)
}

fn scalar_exports() -> ObjectMap {
    [
        ("GraphQLString", "String"),
        ("GraphQLInt", "Int"),
        ("GraphQLFloat", "Float"),
        ("GraphQLBoolean", "Boolean"),
        ("GraphQLID", "ID"),
    ]
    .into_iter()
    .map(|(export, name)| (export.to_string(), named(name)))
    .collect()
}

fn directive_exports() -> ObjectMap {
    let builtins = [
        ("GraphQLIncludeDirective", "include"),
        ("GraphQLSkipDirective", "skip"),
        ("GraphQLDeprecatedDirective", "deprecated"),
        ("GraphQLSpecifiedByDirective", "specifiedBy"),
    ];
    let mut exports: ObjectMap = builtins
        .iter()
        .map(|(export, name)| (export.to_string(), named(name)))
        .collect();
    exports.insert(
        "specifiedDirectives".to_string(),
        Value::array(builtins.iter().map(|(_, name)| named(name)).collect()),
    );
    exports.insert("GraphQLDirective".to_string(), type_constructor("GraphQLDirective"));
    exports
}

/// Tagged-template dedent: interpolate, drop leading newlines and trailing
/// blanks, then strip the first line's indentation from every line.
fn dedent(_: &mut Interpreter<'_>, args: &[Value]) -> Result<Value> {
    let raw = match args.first() {
        Some(Value::Array(strings)) => {
            let strings = strings.borrow();
            let mut out = String::new();
            for (idx, part) in strings.iter().enumerate() {
                if idx > 0 {
                    out.push_str(&args.get(idx).map(Value::to_display).unwrap_or_default());
                }
                out.push_str(&part.to_display());
            }
            out
        }
        Some(other) => other.to_display(),
        None => String::new(),
    };
    Ok(Value::str(dedent_string(&raw)))
}

fn dedent_string(raw: &str) -> String {
    let trimmed = raw
        .trim_start_matches('\n')
        .trim_end_matches([' ', '\t', '\n']);
    let indent_len = trimmed.len() - trimmed.trim_start_matches([' ', '\t']).len();
    let indent = &trimmed[..indent_len];
    trimmed
        .split('\n')
        .map(|line| line.strip_prefix(indent).unwrap_or(line))
        .collect::<Vec<_>>()
        .join("\n")
}

fn invariant(interp: &mut Interpreter<'_>, args: &[Value]) -> Result<Value> {
    if args.first().is_some_and(Value::truthy) {
        return Ok(Value::Undefined);
    }
    let message = args
        .get(1)
        .map(Value::to_display)
        .unwrap_or_else(|| "Unexpected invariant triggered.".to_string());
    Err(interp.error(message))
}

fn inspect(value: &Value) -> String {
    match value {
        Value::Str(s) => format!("{s:?}"),
        Value::Array(items) => format!(
            "[{}]",
            items
                .borrow()
                .iter()
                .map(inspect)
                .collect::<Vec<_>>()
                .join(", ")
        ),
        Value::Object(map) => {
            let map = map.borrow();
            if map.is_empty() {
                return "{}".to_string();
            }
            format!(
                "{{ {} }}",
                map.iter()
                    .map(|(key, value)| format!("{key}: {}", inspect(value)))
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        }
        Value::Function(_) | Value::Native(_) | Value::Rule(_) => {
            let name = crate::harness::rule_identifier(value);
            if name.is_empty() {
                "[function]".to_string()
            } else {
                format!("[function {name}]")
            }
        }
        other => other.to_display(),
    }
}
