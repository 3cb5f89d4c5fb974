//! Schema construction and canonical printing.

use super::SchemaDef;
use std::rc::Rc;
use thiserror::Error;

/// `printIntrospectionSchema` output for the introspection types and the
/// specified directives.
pub const INTROSPECTION_SDL: &str = include_str!("../../assets/introspection.graphql");

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("invalid SDL: {0}")]
    InvalidSdl(String),

    #[error("{kind} schema cannot be printed: {reason}")]
    Unprintable { kind: &'static str, reason: String },
}

// =============================================================================
// SCHEMA LIBRARY TRAIT
// =============================================================================

/// The schema collaborator. Test sources build schemas through it and the
/// registry prints every distinct schema through it once at the end of a run.
pub trait SchemaLibrary {
    /// `buildSchema(sdl)`
    fn build_schema(&self, sdl: &str) -> Result<Rc<SchemaDef>, SchemaError>;

    /// `extendSchema(base, parse(sdl))`
    fn extend_schema(&self, base: &Rc<SchemaDef>, sdl: &str)
    -> Result<Rc<SchemaDef>, SchemaError>;

    /// Canonical SDL for a schema.
    fn print_schema(&self, schema: &SchemaDef) -> Result<String, SchemaError>;

    /// Canonical SDL of the introspection types, independent of any schema.
    fn print_introspection_schema(&self) -> String;

    /// Name for logging
    fn name(&self) -> &str;
}

// =============================================================================
// SDL-BACKED LIBRARY
// =============================================================================

/// Keeps the SDL a schema was built from and prints it back in canonical
/// layout. Assembled schemas are rendered from their type definitions; a
/// config that never resolved to types is rejected by the printer.
#[derive(Debug, Default, Clone, Copy)]
pub struct SdlSchemaLibrary;

impl SchemaLibrary for SdlSchemaLibrary {
    fn build_schema(&self, sdl: &str) -> Result<Rc<SchemaDef>, SchemaError> {
        check_balanced(sdl)?;
        Ok(Rc::new(SchemaDef::Sdl(sdl.to_string())))
    }

    fn extend_schema(
        &self,
        base: &Rc<SchemaDef>,
        sdl: &str,
    ) -> Result<Rc<SchemaDef>, SchemaError> {
        check_balanced(sdl)?;
        Ok(Rc::new(SchemaDef::Extended {
            base: base.clone(),
            sdl: sdl.to_string(),
        }))
    }

    fn print_schema(&self, schema: &SchemaDef) -> Result<String, SchemaError> {
        match schema {
            SchemaDef::Sdl(sdl) => Ok(canonical_sdl(sdl)),
            SchemaDef::Extended { base, sdl } => {
                let base = self.print_schema(base)?;
                let extension = canonical_sdl(sdl);
                Ok(match (base.is_empty(), extension.is_empty()) {
                    (_, true) => base,
                    (true, false) => extension,
                    (false, false) => format!("{base}\n\n{extension}"),
                })
            }
            SchemaDef::Assembled(assembled) => Ok(assembled.to_sdl()),
            SchemaDef::Programmatic { reason } => Err(SchemaError::Unprintable {
                kind: schema.kind(),
                reason: reason.clone(),
            }),
        }
    }

    fn print_introspection_schema(&self) -> String {
        canonical_sdl(INTROSPECTION_SDL)
    }

    fn name(&self) -> &str {
        "sdl"
    }
}

/// Dedents, strips trailing whitespace, collapses blank-line runs and trims.
fn canonical_sdl(sdl: &str) -> String {
    let lines: Vec<&str> = sdl.lines().map(str::trim_end).collect();
    let indent = lines
        .iter()
        .filter(|line| !line.is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);

    let mut out: Vec<&str> = Vec::with_capacity(lines.len());
    for line in lines {
        let line = line.get(indent..).unwrap_or_else(|| line.trim_start());
        if line.is_empty() && out.last().is_none_or(|prev| prev.is_empty()) {
            continue;
        }
        out.push(line);
    }
    while out.last().is_some_and(|line| line.is_empty()) {
        out.pop();
    }
    out.join("\n")
}

/// Rejects SDL whose braces, parentheses or brackets do not pair up outside
/// of strings and comments.
fn check_balanced(sdl: &str) -> Result<(), SchemaError> {
    let mut stack = Vec::new();
    let mut chars = sdl.chars();
    while let Some(c) = chars.next() {
        match c {
            '#' => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            '"' => {
                let mut escaped = false;
                for c in chars.by_ref() {
                    match c {
                        '\\' if !escaped => escaped = true,
                        '"' if !escaped => break,
                        _ => escaped = false,
                    }
                }
            }
            '{' | '(' | '[' => stack.push(c),
            '}' | ')' | ']' => {
                let expected = match c {
                    '}' => '{',
                    ')' => '(',
                    _ => '[',
                };
                if stack.pop() != Some(expected) {
                    return Err(SchemaError::InvalidSdl(format!("unexpected '{c}'")));
                }
            }
            _ => {}
        }
    }
    match stack.pop() {
        Some(open) => Err(SchemaError::InvalidSdl(format!("unclosed '{open}'"))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_layout() {
        let sdl = "\n      type Query {\n        a: String   \n\n\n        b: Int\n      }\n    ";
        assert_eq!(
            canonical_sdl(sdl),
            "type Query {\n  a: String\n\n  b: Int\n}"
        );
    }

    #[test]
    fn test_extended_schema_prints_base_then_extension() {
        let lib = SdlSchemaLibrary;
        let base = lib.build_schema("type Query { a: String }").unwrap();
        let extended = lib
            .extend_schema(&base, "\n  extend type Query { b: Int }\n")
            .unwrap();
        assert_eq!(
            lib.print_schema(&extended).unwrap(),
            "type Query { a: String }\n\nextend type Query { b: Int }"
        );
    }

    #[test]
    fn test_unresolved_programmatic_schema_is_unprintable() {
        let lib = SdlSchemaLibrary;
        let schema = SchemaDef::Programmatic {
            reason: "query: type without a name".to_string(),
        };
        assert!(matches!(
            lib.print_schema(&schema),
            Err(SchemaError::Unprintable { kind: "programmatic", .. })
        ));
    }

    #[test]
    fn test_extension_of_assembled_schema() {
        use crate::schema::{AssembledSchema, FieldDef, NamedTypeDef, TypeKind, TypeRef};

        let lib = SdlSchemaLibrary;
        let base = Rc::new(SchemaDef::Assembled(AssembledSchema {
            query: Some("Query".to_string()),
            types: vec![NamedTypeDef {
                name: "Query".to_string(),
                description: None,
                kind: TypeKind::Object {
                    interfaces: Vec::new(),
                    fields: vec![FieldDef {
                        name: "a".to_string(),
                        description: None,
                        args: Vec::new(),
                        ty: TypeRef::Named("String".to_string()),
                        deprecation: None,
                    }],
                },
            }],
            ..AssembledSchema::default()
        }));
        let extended = lib.extend_schema(&base, "extend type Query { b: Int }").unwrap();
        assert_eq!(
            lib.print_schema(&extended).unwrap(),
            "type Query {\n  a: String\n}\n\nextend type Query { b: Int }"
        );
    }

    #[test]
    fn test_unbalanced_sdl_is_rejected() {
        let lib = SdlSchemaLibrary;
        assert!(lib.build_schema("type Query { a: String").is_err());
        assert!(lib.build_schema("\"a } in a description\" scalar X").is_ok());
        assert!(lib.build_schema("# comment with {\nscalar X").is_ok());
    }

    #[test]
    fn test_introspection_text_starts_with_directives() {
        let text = SdlSchemaLibrary.print_introspection_schema();
        assert!(text.contains("directive @include("));
        assert!(text.contains("type __Schema {"));
        assert!(!text.ends_with('\n'));
    }
}
