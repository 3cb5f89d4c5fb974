//! Schema handles, the printing collaborator and the run-wide registry.

mod assembled;
mod library;
mod registry;

pub use assembled::{
    AssembledSchema, DirectiveDef, EnumValueDef, FieldDef, InputValueDef, NamedTypeDef, TypeKind,
    TypeRef, string_literal,
};
pub use library::{INTROSPECTION_SDL, SchemaError, SchemaLibrary, SdlSchemaLibrary};
pub use registry::{EMPTY_SCHEMA_SLOT, SCHEMA_ZERO_PATCH, SchemaRegistry};

use std::rc::Rc;

/// A schema as built by a test source. Handles are shared as `Rc` and
/// compared by pointer identity, never by content.
#[derive(Debug)]
pub enum SchemaDef {
    /// Built from SDL text (`buildSchema`).
    Sdl(String),
    /// `extendSchema(base, parse(sdl))`.
    Extended { base: Rc<SchemaDef>, sdl: String },
    /// Assembled from type objects (`new GraphQLSchema({...})`).
    Assembled(AssembledSchema),
    /// A `new GraphQLSchema({...})` config that could not be resolved to
    /// named types.
    Programmatic { reason: String },
}

impl SchemaDef {
    pub fn kind(&self) -> &'static str {
        match self {
            SchemaDef::Sdl(_) => "sdl",
            SchemaDef::Extended { .. } => "extended",
            SchemaDef::Assembled(_) => "assembled",
            SchemaDef::Programmatic { .. } => "programmatic",
        }
    }
}
