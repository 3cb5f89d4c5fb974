//! The prelude document: implicitly declared types every schema loader
//! needs, followed by the introspection schema.

use crate::schema::SchemaLibrary;

pub const PRELUDE_HEADER: &str = "# This file defines all the implicitly declared types that are required by the graphql spec. It is implicitly included by calls to LoadSchema\n";

pub const BUILTIN_SCALARS: &str = r#"
"The `Int` scalar type represents non-fractional signed whole numeric values. Int can represent values between -(2^31) and 2^31 - 1."
scalar Int

"The `Float` scalar type represents signed double-precision fractional values as specified by [IEEE 754](http://en.wikipedia.org/wiki/IEEE_floating_point)."
scalar Float

"The `String`scalar type represents textual data, represented as UTF-8 character sequences. The String type is most often used by GraphQL to represent free-form human-readable text."
scalar String

"The `Boolean` scalar type represents `true` or `false`."
scalar Boolean

"""The `ID` scalar type represents a unique identifier, often used to refetch an object or as key for a cache. The ID type appears in a JSON response as a String; however, it is not intended to be human-readable. When expected as an input type, any string (such as "4") or integer (such as 4) input value will be accepted as an ID."""
scalar ID
"#;

pub const DEFER_DIRECTIVE: &str = r#"
"Directs the executor to defer this fragment when the `if` argument is true or undefined."
directive @defer(
  "Deferred when true or undefined."
  if: Boolean = true,
  "Unique name"
  label: String
) on FRAGMENT_SPREAD | INLINE_FRAGMENT

"#;

/// Header, built-in scalars, `@defer`, then the library's introspection SDL.
pub fn render_prelude(library: &dyn SchemaLibrary) -> String {
    let introspection = library.print_introspection_schema();
    let mut out = String::with_capacity(
        PRELUDE_HEADER.len() + BUILTIN_SCALARS.len() + DEFER_DIRECTIVE.len() + introspection.len(),
    );
    out.push_str(PRELUDE_HEADER);
    out.push_str(BUILTIN_SCALARS);
    out.push_str(DEFER_DIRECTIVE);
    out.push_str(&introspection);
    out
}
