use super::{SchemaDef, SchemaLibrary};
use crate::error::HarvestError;
use std::rc::Rc;

/// Appended to the first canonical schema: types and fields the harvested
/// fixtures query but the upstream test schema never declares.
pub const SCHEMA_ZERO_PATCH: &str = "
# injected becuase upstream spec is missing some types
extend type QueryRoot {
    field: T
    f1: Type
    f2: Type
    f3: Type
}

type Type {
    a: String
    b: String
    c: String
}
type T {
    a: String
    b: String
    c: String
    d: String
    y: String
    deepField: T
    deeperField: T
}";

/// Trailing entry for fixtures that validate against an entirely empty schema.
pub const EMPTY_SCHEMA_SLOT: &str = "";

/// Identity-deduplicated, insertion-ordered set of schemas seen during a run.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    schemas: Vec<Rc<SchemaDef>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of `schema`, registering it on first sight. Two structurally
    /// equal schemas built separately get distinct indices.
    pub fn register(&mut self, schema: &Rc<SchemaDef>) -> usize {
        if let Some(idx) = self.schemas.iter().position(|s| Rc::ptr_eq(s, schema)) {
            return idx;
        }
        self.schemas.push(schema.clone());
        tracing::debug!(
            index = self.schemas.len() - 1,
            kind = schema.kind(),
            "registered schema"
        );
        self.schemas.len() - 1
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Prints every schema once, in registration order. A schema the printer
    /// rejects leaves a `None` slot so the other indices stay valid.
    ///
    /// Returns the slots and the failures that produced the `None` slots.
    pub fn canonicalize(
        &self,
        library: &dyn SchemaLibrary,
    ) -> (Vec<Option<String>>, Vec<HarvestError>) {
        let mut failures = Vec::new();
        let mut slots: Vec<Option<String>> = self
            .schemas
            .iter()
            .enumerate()
            .map(|(index, schema)| match library.print_schema(schema) {
                Ok(text) => Some(text),
                Err(err) => {
                    let failure = HarvestError::SchemaCanonicalization {
                        index,
                        reason: err.to_string(),
                    };
                    let code = failure.code();
                    tracing::warn!(
                        index,
                        library = library.name(),
                        code = %code,
                        category = code.category(),
                        error = %failure,
                        "schema left empty in schema document"
                    );
                    failures.push(failure);
                    None
                }
            })
            .collect();

        if let Some(Some(first)) = slots.first_mut() {
            first.push_str(SCHEMA_ZERO_PATCH);
        }
        slots.push(Some(EMPTY_SCHEMA_SLOT.to_string()));
        (slots, failures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SdlSchemaLibrary;

    fn sdl(text: &str) -> Rc<SchemaDef> {
        Rc::new(SchemaDef::Sdl(text.to_string()))
    }

    #[test]
    fn test_register_is_identity_based() {
        let mut registry = SchemaRegistry::new();
        let a = sdl("type Query { a: String }");
        let twin = sdl("type Query { a: String }");

        assert_eq!(registry.register(&a), 0);
        assert_eq!(registry.register(&twin), 1);
        assert_eq!(registry.register(&a), 0);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_canonicalize_patches_first_and_appends_empty_slot() {
        let mut registry = SchemaRegistry::new();
        registry.register(&sdl("type QueryRoot { a: String }"));
        registry.register(&sdl("type Query { b: Int }"));

        let (slots, failures) = registry.canonicalize(&SdlSchemaLibrary);
        assert!(failures.is_empty());
        assert_eq!(slots.len(), 3);
        assert_eq!(
            slots[0].as_deref(),
            Some(format!("type QueryRoot {{ a: String }}{SCHEMA_ZERO_PATCH}").as_str())
        );
        assert_eq!(slots[1].as_deref(), Some("type Query { b: Int }"));
        assert_eq!(slots[2].as_deref(), Some(""));
    }

    #[test]
    fn test_empty_registry_still_has_trailing_slot() {
        let (slots, failures) = SchemaRegistry::new().canonicalize(&SdlSchemaLibrary);
        assert!(failures.is_empty());
        assert_eq!(slots, vec![Some(String::new())]);
    }

    #[test]
    fn test_unprintable_schema_leaves_null_slot() {
        let mut registry = SchemaRegistry::new();
        registry.register(&sdl("type Query { a: String }"));
        registry.register(&Rc::new(SchemaDef::Programmatic {
            reason: "query: type without a name".to_string(),
        }));
        registry.register(&sdl("type Query { c: ID }"));

        let (slots, failures) = registry.canonicalize(&SdlSchemaLibrary);
        assert_eq!(slots.len(), 4);
        assert!(slots[1].is_none());
        assert_eq!(slots[2].as_deref(), Some("type Query { c: ID }"));
        assert_eq!(failures.len(), 1);
        assert!(matches!(
            failures[0],
            HarvestError::SchemaCanonicalization { index: 1, .. }
        ));
        let code = failures[0].code();
        assert_eq!(code.category(), "lossy");
        assert!(!code.is_fatal());
    }
}
