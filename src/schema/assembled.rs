//! Schemas assembled from type objects, and their SDL rendering.
//!
//! Layout follows the reference printer: an optional `schema { ... }` block
//! when the root types are not named `Query`, `Mutation` and `Subscription`,
//! then custom directives, then named types in discovery order, separated by
//! blank lines. Built-in scalars and introspection types are never printed.

use std::fmt::Write;

const STANDARD_SCALARS: &[&str] = &["String", "Int", "Float", "Boolean", "ID"];
const SPECIFIED_DIRECTIVES: &[&str] = &["include", "skip", "deprecated", "specifiedBy", "oneOf"];
const DEFAULT_DEPRECATION_REASON: &str = "No longer supported";

/// A reference to a type from a field, argument or input field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
    Named(String),
    List(Box<TypeRef>),
    NonNull(Box<TypeRef>),
}

impl std::fmt::Display for TypeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeRef::Named(name) => f.write_str(name),
            TypeRef::List(inner) => write!(f, "[{inner}]"),
            TypeRef::NonNull(inner) => write!(f, "{inner}!"),
        }
    }
}

/// An argument or input field. `default` is already a GraphQL literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputValueDef {
    pub name: String,
    pub description: Option<String>,
    pub ty: TypeRef,
    pub default: Option<String>,
    pub deprecation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub name: String,
    pub description: Option<String>,
    pub args: Vec<InputValueDef>,
    pub ty: TypeRef,
    pub deprecation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumValueDef {
    pub name: String,
    pub description: Option<String>,
    pub deprecation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeKind {
    Scalar { specified_by: Option<String> },
    Object { interfaces: Vec<String>, fields: Vec<FieldDef> },
    Interface { interfaces: Vec<String>, fields: Vec<FieldDef> },
    Union { members: Vec<String> },
    Enum { values: Vec<EnumValueDef> },
    InputObject { fields: Vec<InputValueDef> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedTypeDef {
    pub name: String,
    pub description: Option<String>,
    pub kind: TypeKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectiveDef {
    pub name: String,
    pub description: Option<String>,
    pub args: Vec<InputValueDef>,
    pub repeatable: bool,
    pub locations: Vec<String>,
}

/// Everything `new GraphQLSchema(config)` was handed, resolved to names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssembledSchema {
    pub description: Option<String>,
    pub query: Option<String>,
    pub mutation: Option<String>,
    pub subscription: Option<String>,
    pub directives: Vec<DirectiveDef>,
    /// Named types in discovery order.
    pub types: Vec<NamedTypeDef>,
}

impl AssembledSchema {
    /// Renders the schema as SDL without a trailing newline.
    pub fn to_sdl(&self) -> String {
        let mut blocks = Vec::new();
        if let Some(definition) = self.schema_definition() {
            blocks.push(definition);
        }
        blocks.extend(
            self.directives
                .iter()
                .filter(|directive| !SPECIFIED_DIRECTIVES.contains(&directive.name.as_str()))
                .map(print_directive),
        );
        blocks.extend(
            self.types
                .iter()
                .filter(|ty| !is_builtin_type(&ty.name))
                .map(print_type),
        );
        blocks.join("\n\n")
    }

    fn schema_definition(&self) -> Option<String> {
        let roots = [
            ("query", &self.query, "Query"),
            ("mutation", &self.mutation, "Mutation"),
            ("subscription", &self.subscription, "Subscription"),
        ];
        let common = roots
            .iter()
            .all(|(_, name, common)| name.as_deref().is_none_or(|name| name == *common));
        if common && self.description.is_none() {
            return None;
        }
        let mut out = description_block(self.description.as_deref(), "", true);
        out.push_str("schema {\n");
        for (operation, name, _) in roots {
            if let Some(name) = name {
                let _ = writeln!(out, "  {operation}: {name}");
            }
        }
        out.push('}');
        Some(out)
    }
}

fn is_builtin_type(name: &str) -> bool {
    STANDARD_SCALARS.contains(&name) || name.starts_with("__")
}

fn print_type(ty: &NamedTypeDef) -> String {
    let mut out = description_block(ty.description.as_deref(), "", true);
    match &ty.kind {
        TypeKind::Scalar { specified_by } => {
            let _ = write!(out, "scalar {}", ty.name);
            if let Some(url) = specified_by {
                let _ = write!(out, " @specifiedBy(url: {})", string_literal(url));
            }
        }
        TypeKind::Object { interfaces, fields } => {
            let _ = write!(out, "type {}{}", ty.name, implements(interfaces));
            out.push_str(&field_block(fields));
        }
        TypeKind::Interface { interfaces, fields } => {
            let _ = write!(out, "interface {}{}", ty.name, implements(interfaces));
            out.push_str(&field_block(fields));
        }
        TypeKind::Union { members } => {
            let _ = write!(out, "union {}", ty.name);
            if !members.is_empty() {
                let _ = write!(out, " = {}", members.join(" | "));
            }
        }
        TypeKind::Enum { values } => {
            let _ = write!(out, "enum {}", ty.name);
            let lines: Vec<String> = values
                .iter()
                .enumerate()
                .map(|(idx, value)| {
                    format!(
                        "{}  {}{}",
                        description_block(value.description.as_deref(), "  ", idx == 0),
                        value.name,
                        deprecated(value.deprecation.as_deref())
                    )
                })
                .collect();
            out.push_str(&block(&lines));
        }
        TypeKind::InputObject { fields } => {
            let _ = write!(out, "input {}", ty.name);
            let lines: Vec<String> = fields
                .iter()
                .enumerate()
                .map(|(idx, field)| {
                    format!(
                        "{}  {}",
                        description_block(field.description.as_deref(), "  ", idx == 0),
                        input_value(field)
                    )
                })
                .collect();
            out.push_str(&block(&lines));
        }
    }
    out
}

fn print_directive(directive: &DirectiveDef) -> String {
    let mut out = description_block(directive.description.as_deref(), "", true);
    let _ = write!(out, "directive @{}{}", directive.name, arguments(&directive.args, ""));
    if directive.repeatable {
        out.push_str(" repeatable");
    }
    let _ = write!(out, " on {}", directive.locations.join(" | "));
    out
}

fn implements(interfaces: &[String]) -> String {
    if interfaces.is_empty() {
        String::new()
    } else {
        format!(" implements {}", interfaces.join(" & "))
    }
}

fn field_block(fields: &[FieldDef]) -> String {
    let lines: Vec<String> = fields
        .iter()
        .enumerate()
        .map(|(idx, field)| {
            format!(
                "{}  {}{}: {}{}",
                description_block(field.description.as_deref(), "  ", idx == 0),
                field.name,
                arguments(&field.args, "  "),
                field.ty,
                deprecated(field.deprecation.as_deref())
            )
        })
        .collect();
    block(&lines)
}

fn block(lines: &[String]) -> String {
    if lines.is_empty() {
        String::new()
    } else {
        format!(" {{\n{}\n}}", lines.join("\n"))
    }
}

fn arguments(args: &[InputValueDef], indentation: &str) -> String {
    if args.is_empty() {
        return String::new();
    }
    if args.iter().all(|arg| arg.description.is_none()) {
        let inline: Vec<String> = args.iter().map(input_value).collect();
        return format!("({})", inline.join(", "));
    }
    let lines: Vec<String> = args
        .iter()
        .enumerate()
        .map(|(idx, arg)| {
            let nested = format!("  {indentation}");
            format!(
                "{}{nested}{}",
                description_block(arg.description.as_deref(), &nested, idx == 0),
                input_value(arg)
            )
        })
        .collect();
    format!("(\n{}\n{indentation})", lines.join("\n"))
}

fn input_value(value: &InputValueDef) -> String {
    let mut out = format!("{}: {}", value.name, value.ty);
    if let Some(default) = &value.default {
        let _ = write!(out, " = {default}");
    }
    out.push_str(&deprecated(value.deprecation.as_deref()));
    out
}

fn deprecated(reason: Option<&str>) -> String {
    match reason {
        None => String::new(),
        Some(DEFAULT_DEPRECATION_REASON) => " @deprecated".to_string(),
        Some(reason) => format!(" @deprecated(reason: {})", string_literal(reason)),
    }
}

/// Description lines ending in a newline; entries after the first in a block
/// get a blank line before them.
fn description_block(description: Option<&str>, indentation: &str, first_in_block: bool) -> String {
    let Some(description) = description else {
        return String::new();
    };
    let text = if description.contains('\n') {
        format!("\"\"\"\n{}\n\"\"\"", description.replace("\"\"\"", "\\\"\"\""))
    } else if description.ends_with('"') || description.ends_with('\\') {
        string_literal(description)
    } else {
        format!("\"\"\"{}\"\"\"", description.replace("\"\"\"", "\\\"\"\""))
    };
    let prefix = if !indentation.is_empty() && !first_in_block {
        format!("\n{indentation}")
    } else {
        indentation.to_string()
    };
    format!("{prefix}{}\n", text.replace('\n', &format!("\n{indentation}")))
}

/// A GraphQL string literal.
pub fn string_literal(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| format!("\"{text}\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(name: &str) -> TypeRef {
        TypeRef::Named(name.to_string())
    }

    fn field(name: &str, ty: TypeRef) -> FieldDef {
        FieldDef {
            name: name.to_string(),
            description: None,
            args: Vec::new(),
            ty,
            deprecation: None,
        }
    }

    fn arg(name: &str, ty: TypeRef) -> InputValueDef {
        InputValueDef {
            name: name.to_string(),
            description: None,
            ty,
            default: None,
            deprecation: None,
        }
    }

    #[test]
    fn test_object_with_arguments_and_custom_scalar() {
        let mut invalid_arg = field("invalidArg", named("String"));
        invalid_arg.args.push(arg("arg", named("Invalid")));
        let schema = AssembledSchema {
            query: Some("Query".to_string()),
            types: vec![
                NamedTypeDef {
                    name: "Query".to_string(),
                    description: None,
                    kind: TypeKind::Object {
                        interfaces: Vec::new(),
                        fields: vec![invalid_arg],
                    },
                },
                NamedTypeDef {
                    name: "String".to_string(),
                    description: None,
                    kind: TypeKind::Scalar { specified_by: None },
                },
                NamedTypeDef {
                    name: "Invalid".to_string(),
                    description: None,
                    kind: TypeKind::Scalar { specified_by: None },
                },
            ],
            ..AssembledSchema::default()
        };
        assert_eq!(
            schema.to_sdl(),
            "type Query {\n  invalidArg(arg: Invalid): String\n}\n\nscalar Invalid"
        );
    }

    #[test]
    fn test_wrappers_defaults_and_deprecation() {
        let mut list = field(
            "list",
            TypeRef::List(Box::new(TypeRef::NonNull(Box::new(named("Int"))))),
        );
        let mut limit = arg("limit", TypeRef::NonNull(Box::new(named("Int"))));
        limit.default = Some("10".to_string());
        list.args.push(limit);
        list.deprecation = Some(DEFAULT_DEPRECATION_REASON.to_string());
        let mut old = field("old", named("String"));
        old.deprecation = Some("Use list".to_string());

        let mut shape = arg("shape", named("String"));
        shape.description = Some("Outline".to_string());
        let schema = AssembledSchema {
            query: Some("Root".to_string()),
            types: vec![
                NamedTypeDef {
                    name: "Root".to_string(),
                    description: Some("Entry point".to_string()),
                    kind: TypeKind::Object {
                        interfaces: vec!["Node".to_string()],
                        fields: vec![list, old],
                    },
                },
                NamedTypeDef {
                    name: "Filter".to_string(),
                    description: None,
                    kind: TypeKind::InputObject { fields: vec![shape] },
                },
            ],
            ..AssembledSchema::default()
        };
        assert_eq!(
            schema.to_sdl(),
            "schema {\n  query: Root\n}\n\n\
             \"\"\"Entry point\"\"\"\n\
             type Root implements Node {\n  \
             list(limit: Int! = 10): [Int!] @deprecated\n  \
             old: String @deprecated(reason: \"Use list\")\n}\n\n\
             input Filter {\n  \"\"\"Outline\"\"\"\n  shape: String\n}"
        );
    }

    #[test]
    fn test_enum_union_and_directive() {
        let schema = AssembledSchema {
            directives: vec![
                DirectiveDef {
                    name: "include".to_string(),
                    description: None,
                    args: Vec::new(),
                    repeatable: false,
                    locations: Vec::new(),
                },
                DirectiveDef {
                    name: "tag".to_string(),
                    description: None,
                    args: vec![arg("name", TypeRef::NonNull(Box::new(named("String"))))],
                    repeatable: true,
                    locations: vec!["FIELD".to_string(), "QUERY".to_string()],
                },
            ],
            types: vec![
                NamedTypeDef {
                    name: "Color".to_string(),
                    description: None,
                    kind: TypeKind::Enum {
                        values: vec![
                            EnumValueDef {
                                name: "RED".to_string(),
                                description: None,
                                deprecation: None,
                            },
                            EnumValueDef {
                                name: "GREEN".to_string(),
                                description: None,
                                deprecation: Some(DEFAULT_DEPRECATION_REASON.to_string()),
                            },
                        ],
                    },
                },
                NamedTypeDef {
                    name: "Pet".to_string(),
                    description: None,
                    kind: TypeKind::Union {
                        members: vec!["Dog".to_string(), "Cat".to_string()],
                    },
                },
            ],
            ..AssembledSchema::default()
        };
        assert_eq!(
            schema.to_sdl(),
            "directive @tag(name: String!) repeatable on FIELD | QUERY\n\n\
             enum Color {\n  RED\n  GREEN @deprecated\n}\n\n\
             union Pet = Dog | Cat"
        );
    }

    #[test]
    fn test_empty_assembly_prints_nothing() {
        assert_eq!(AssembledSchema::default().to_sdl(), "");
    }
}
