//! Resolves `new GraphQLSchema(config)` arguments into an [`AssembledSchema`].
//!
//! Type constructors hand back their config objects tagged with `__kind`, so
//! the schema config is a graph of plain script values. Named types are
//! collected depth first from `types`, the root types and the directive
//! arguments, the order the reference schema constructor discovers them in.
//! `fields`, `interfaces` and union `types` may be thunks; they are called
//! once here.

use indexmap::IndexMap;

use crate::schema::{
    AssembledSchema, DirectiveDef, EnumValueDef, FieldDef, InputValueDef, NamedTypeDef, TypeKind,
    TypeRef, string_literal,
};
use crate::script::value::number_to_string;
use crate::script::{Interpreter, Value};

type Assembly<T> = std::result::Result<T, String>;

/// Builds the schema, or explains which part of the config has no SDL form.
pub fn assemble_schema(interp: &mut Interpreter<'_>, config: &Value) -> Assembly<AssembledSchema> {
    let mut assembler = Assembler {
        interp,
        types: IndexMap::new(),
    };
    for ty in items(&prop(config, "types")) {
        assembler.named_type(&ty)?;
    }
    let query = assembler.root(config, "query")?;
    let mutation = assembler.root(config, "mutation")?;
    let subscription = assembler.root(config, "subscription")?;
    let directives = items(&prop(config, "directives"))
        .iter()
        .map(|directive| assembler.directive(directive))
        .collect::<Assembly<Vec<_>>>()?;

    let types = assembler
        .types
        .into_iter()
        .map(|(name, def)| def.ok_or_else(|| format!("type {name} was never completed")))
        .collect::<Assembly<Vec<_>>>()?;
    Ok(AssembledSchema {
        description: text(&prop(config, "description")),
        query,
        mutation,
        subscription,
        directives,
        types,
    })
}

struct Assembler<'i, 'm> {
    interp: &'i mut Interpreter<'m>,
    /// `None` while a type's own references are being collected.
    types: IndexMap<String, Option<NamedTypeDef>>,
}

impl Assembler<'_, '_> {
    fn root(&mut self, config: &Value, operation: &str) -> Assembly<Option<String>> {
        let root = prop(config, operation);
        if root.is_nullish() {
            return Ok(None);
        }
        self.named_type(&root)
            .map(Some)
            .map_err(|reason| format!("{operation}: {reason}"))
    }

    fn thunk(&mut self, value: Value) -> Assembly<Value> {
        match value {
            Value::Function(_) | Value::Native(_) => self
                .interp
                .call_value(&value, Vec::new())
                .map_err(|err| err.to_string()),
            other => Ok(other),
        }
    }

    fn type_ref(&mut self, value: &Value) -> Assembly<TypeRef> {
        match kind(value) {
            Some("GraphQLList") => Ok(TypeRef::List(Box::new(
                self.type_ref(&prop(value, "ofType"))?,
            ))),
            Some("GraphQLNonNull") => Ok(TypeRef::NonNull(Box::new(
                self.type_ref(&prop(value, "ofType"))?,
            ))),
            _ => self.named_type(value).map(TypeRef::Named),
        }
    }

    fn named_type(&mut self, value: &Value) -> Assembly<String> {
        if !matches!(value, Value::Object(_)) {
            return Err(format!("expected a type, got {}", value.to_display()));
        }
        let name = text(&prop(value, "name")).ok_or_else(|| "type without a name".to_string())?;
        if self.types.contains_key(&name) {
            return Ok(name);
        }
        self.types.insert(name.clone(), None);
        let kind = self
            .type_kind(value)
            .map_err(|reason| format!("{name}: {reason}"))?;
        self.types.insert(
            name.clone(),
            Some(NamedTypeDef {
                name: name.clone(),
                description: text(&prop(value, "description")),
                kind,
            }),
        );
        Ok(name)
    }

    fn type_kind(&mut self, value: &Value) -> Assembly<TypeKind> {
        Ok(match kind(value) {
            Some("GraphQLObjectType") => {
                let interfaces = self.interfaces(value)?;
                TypeKind::Object {
                    interfaces,
                    fields: self.fields(value)?,
                }
            }
            Some("GraphQLInterfaceType") => {
                let interfaces = self.interfaces(value)?;
                TypeKind::Interface {
                    interfaces,
                    fields: self.fields(value)?,
                }
            }
            Some("GraphQLUnionType") => {
                let members = self.thunk(prop(value, "types"))?;
                TypeKind::Union {
                    members: items(&members)
                        .iter()
                        .map(|member| self.named_type(member))
                        .collect::<Assembly<_>>()?,
                }
            }
            Some("GraphQLEnumType") => TypeKind::Enum {
                values: entries(&prop(value, "values"))
                    .into_iter()
                    .map(|(name, config)| EnumValueDef {
                        name,
                        description: text(&prop(&config, "description")),
                        deprecation: text(&prop(&config, "deprecationReason")),
                    })
                    .collect(),
            },
            Some("GraphQLInputObjectType") => {
                let fields = self.thunk(prop(value, "fields"))?;
                TypeKind::InputObject {
                    fields: self.input_values(&fields)?,
                }
            }
            Some("GraphQLScalarType") | None => TypeKind::Scalar {
                specified_by: text(&prop(value, "specifiedByURL"))
                    .or_else(|| text(&prop(value, "specifiedByUrl"))),
            },
            Some(other) => return Err(format!("{other} is not a named type")),
        })
    }

    fn interfaces(&mut self, value: &Value) -> Assembly<Vec<String>> {
        let interfaces = self.thunk(prop(value, "interfaces"))?;
        items(&interfaces)
            .iter()
            .map(|interface| self.named_type(interface))
            .collect()
    }

    fn fields(&mut self, value: &Value) -> Assembly<Vec<FieldDef>> {
        let fields = self.thunk(prop(value, "fields"))?;
        entries(&fields)
            .into_iter()
            .map(|(name, config)| {
                let ty = self
                    .type_ref(&prop(&config, "type"))
                    .map_err(|reason| format!("field {name}: {reason}"))?;
                let args = self.input_values(&prop(&config, "args"))?;
                Ok(FieldDef {
                    description: text(&prop(&config, "description")),
                    deprecation: text(&prop(&config, "deprecationReason")),
                    name,
                    args,
                    ty,
                })
            })
            .collect()
    }

    fn input_values(&mut self, values: &Value) -> Assembly<Vec<InputValueDef>> {
        entries(values)
            .into_iter()
            .map(|(name, config)| {
                let declared = prop(&config, "type");
                let ty = self
                    .type_ref(&declared)
                    .map_err(|reason| format!("argument {name}: {reason}"))?;
                let default = match prop(&config, "defaultValue") {
                    Value::Undefined => None,
                    value => Some(literal(&value, &declared)),
                };
                Ok(InputValueDef {
                    description: text(&prop(&config, "description")),
                    deprecation: text(&prop(&config, "deprecationReason")),
                    name,
                    ty,
                    default,
                })
            })
            .collect()
    }

    fn directive(&mut self, value: &Value) -> Assembly<DirectiveDef> {
        let name = text(&prop(value, "name")).ok_or_else(|| "directive without a name".to_string())?;
        let args = self
            .input_values(&prop(value, "args"))
            .map_err(|reason| format!("@{name}: {reason}"))?;
        Ok(DirectiveDef {
            description: text(&prop(value, "description")),
            repeatable: prop(value, "isRepeatable").truthy(),
            locations: items(&prop(value, "locations"))
                .iter()
                .map(Value::to_display)
                .collect(),
            name,
            args,
        })
    }
}

fn prop(value: &Value, key: &str) -> Value {
    match value {
        Value::Object(map) => map.borrow().get(key).cloned().unwrap_or_default(),
        _ => Value::Undefined,
    }
}

fn kind(value: &Value) -> Option<&'static str> {
    let tag = prop(value, "__kind");
    [
        "GraphQLObjectType",
        "GraphQLInterfaceType",
        "GraphQLUnionType",
        "GraphQLEnumType",
        "GraphQLInputObjectType",
        "GraphQLScalarType",
        "GraphQLList",
        "GraphQLNonNull",
        "GraphQLDirective",
    ]
    .into_iter()
    .find(|name| tag.as_str() == Some(*name))
}

fn text(value: &Value) -> Option<String> {
    value.as_str().map(str::to_string)
}

fn items(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.borrow().clone(),
        _ => Vec::new(),
    }
}

fn entries(value: &Value) -> Vec<(String, Value)> {
    match value {
        Value::Object(map) => map
            .borrow()
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect(),
        _ => Vec::new(),
    }
}

/// The named type behind list and non-null wrappers.
fn unwrap_named(ty: &Value) -> Value {
    match kind(ty) {
        Some("GraphQLList" | "GraphQLNonNull") => unwrap_named(&prop(ty, "ofType")),
        _ => ty.clone(),
    }
}

/// A default value as a GraphQL literal. Enum defaults print as the name of
/// the value they hold.
fn literal(value: &Value, declared: &Value) -> String {
    let named = unwrap_named(declared);
    if kind(&named) == Some("GraphQLEnumType") {
        let found = entries(&prop(&named, "values"))
            .into_iter()
            .find(|(name, config)| match prop(config, "value") {
                Value::Undefined => value.as_str() == Some(name.as_str()),
                held => held.strict_equals(value),
            });
        if let Some((name, _)) = found {
            return name;
        }
    }
    match value {
        Value::Null | Value::Undefined => "null".to_string(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(n) => number_to_string(*n),
        Value::Str(s) => string_literal(s),
        Value::Array(values) => format!(
            "[{}]",
            values
                .borrow()
                .iter()
                .map(|item| literal(item, declared))
                .collect::<Vec<_>>()
                .join(", ")
        ),
        Value::Object(map) => format!(
            "{{{}}}",
            map.borrow()
                .iter()
                .map(|(key, item)| format!("{key}: {}", literal(item, &Value::Undefined)))
                .collect::<Vec<_>>()
                .join(", ")
        ),
        other => string_literal(&other.to_display()),
    }
}

#[cfg(test)]
mod tests {
    use crate::modules::{ModuleExports, ModuleTable, ProjectResolver};
    use crate::schema::{SchemaDef, SchemaLibrary, SdlSchemaLibrary};
    use crate::script::{NativeFunction, ObjectMap, Value, evaluate};
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Evaluates `source`, which hands its schema to `keep`, and prints it.
    fn printed(source: &str) -> Result<String, String> {
        let library = Rc::new(SdlSchemaLibrary);
        let kept = Rc::new(RefCell::new(None));
        let slot = Rc::clone(&kept);
        let mut exports = ObjectMap::new();
        exports.insert(
            "keep".to_string(),
            Value::native(NativeFunction::new("keep", move |_, args| {
                *slot.borrow_mut() = args.first().cloned();
                Ok(Value::Undefined)
            })),
        );
        let table = ModuleTable::new(Box::new(ProjectResolver::new(library.clone())))
            .substitute("./keep", ModuleExports::table(exports));
        evaluate(source, "schema-test.ts", &table).map_err(|err| err.to_string())?;

        let Some(Value::Schema(schema)) = kept.borrow().clone() else {
            return Err("no schema kept".to_string());
        };
        if let SchemaDef::Programmatic { reason } = schema.as_ref() {
            return Err(reason.clone());
        }
        library.print_schema(&schema).map_err(|err| err.to_string())
    }

    const IMPORTS: &str = "
        import { GraphQLSchema } from '../../type/schema';
        import {
          GraphQLObjectType, GraphQLScalarType, GraphQLInputObjectType, GraphQLEnumType,
          GraphQLInterfaceType, GraphQLUnionType, GraphQLList, GraphQLNonNull,
        } from '../../type/definition';
        import { GraphQLString, GraphQLInt } from '../../type/scalars';
        import { keep } from './keep';
    ";

    #[test]
    fn test_custom_scalar_argument() {
        let source = format!(
            "{IMPORTS}
            const customScalar = new GraphQLScalarType({{
              name: 'Invalid',
              parseValue: (value) => value,
            }});
            const schema = new GraphQLSchema({{
              query: new GraphQLObjectType({{
                name: 'Query',
                fields: {{
                  invalidArg: {{ type: GraphQLString, args: {{ arg: {{ type: customScalar }} }} }},
                }},
              }}),
            }});
            keep(schema);
            "
        );
        assert_eq!(
            printed(&source).unwrap(),
            "type Query {\n  invalidArg(arg: Invalid): String\n}\n\nscalar Invalid"
        );
    }

    #[test]
    fn test_thunks_wrappers_inputs_and_enums() {
        let source = format!(
            "{IMPORTS}
            const Color = new GraphQLEnumType({{ name: 'Color', values: {{ RED: {{ value: 0 }}, BLUE: {{ value: 1 }} }} }});
            const Filter = new GraphQLInputObjectType({{
              name: 'Filter',
              fields: () => ({{ color: {{ type: Color, defaultValue: 1 }}, tags: {{ type: new GraphQLList(GraphQLString) }} }}),
            }});
            const Node = new GraphQLInterfaceType({{ name: 'Node', fields: {{ id: {{ type: new GraphQLNonNull(GraphQLString) }} }} }});
            const Item = new GraphQLObjectType({{
              name: 'Item',
              interfaces: () => [Node],
              fields: () => ({{
                id: {{ type: new GraphQLNonNull(GraphQLString) }},
                parent: {{ type: Item }},
              }}),
            }});
            const Result = new GraphQLUnionType({{ name: 'Result', types: [Item] }});
            const schema = new GraphQLSchema({{
              query: new GraphQLObjectType({{
                name: 'Root',
                fields: {{
                  search: {{
                    type: new GraphQLList(new GraphQLNonNull(Result)),
                    args: {{ filter: {{ type: Filter }}, first: {{ type: GraphQLInt, defaultValue: 10 }} }},
                  }},
                }},
              }}),
            }});
            keep(schema);
            "
        );
        assert_eq!(
            printed(&source).unwrap(),
            "schema {\n  query: Root\n}\n\n\
             type Root {\n  search(filter: Filter, first: Int = 10): [Result!]\n}\n\n\
             union Result = Item\n\n\
             type Item implements Node {\n  id: String!\n  parent: Item\n}\n\n\
             interface Node {\n  id: String!\n}\n\n\
             input Filter {\n  color: Color = BLUE\n  tags: [String]\n}\n\n\
             enum Color {\n  RED\n  BLUE\n}"
        );
    }

    #[test]
    fn test_field_without_type_is_unresolved() {
        let source = format!(
            "{IMPORTS}
            const schema = new GraphQLSchema({{
              query: new GraphQLObjectType({{ name: 'Query', fields: {{ broken: {{}} }} }}),
            }});
            keep(schema);
            "
        );
        assert_eq!(
            printed(&source).unwrap_err(),
            "query: Query: field broken: expected a type, got undefined"
        );
    }
}
