//! Runtime values of the test-source evaluator.

use super::ast::FunctionDef;
use super::interp::{Interpreter, Scope};
use crate::error::Result;
use crate::harness::stub::CallPath;
use crate::schema::SchemaDef;
use indexmap::IndexMap;
use serde::ser::{Error as _, Serialize, SerializeMap, SerializeSeq, Serializer};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

pub type ObjectMap = IndexMap<String, Value>;

pub type NativeCall = dyn Fn(&mut Interpreter<'_>, &[Value]) -> Result<Value>;

#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
    Array(Rc<RefCell<Vec<Value>>>),
    Object(Rc<RefCell<ObjectMap>>),
    Function(Rc<Closure>),
    Native(Rc<NativeFunction>),
    /// Call-path stand-in: tolerates any member access or call.
    Stub(Rc<CallPath>),
    /// Opaque schema handle; compared by identity.
    Schema(Rc<SchemaDef>),
    /// Opaque validation rule reference; only its name matters.
    Rule(Rc<str>),
}

pub struct Closure {
    pub def: Rc<FunctionDef>,
    pub scope: Rc<Scope>,
}

/// A host function exposed to scripts. Host functions may carry properties
/// of their own (`describe.skip`).
pub struct NativeFunction {
    pub name: String,
    pub props: RefCell<ObjectMap>,
    pub call: Box<NativeCall>,
}

impl NativeFunction {
    pub fn new(
        name: impl Into<String>,
        call: impl Fn(&mut Interpreter<'_>, &[Value]) -> Result<Value> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            props: RefCell::new(ObjectMap::new()),
            call: Box::new(call),
        }
    }

    pub fn with_prop(self, key: impl Into<String>, value: Value) -> Self {
        self.props.borrow_mut().insert(key.into(), value);
        self
    }
}

impl Value {
    pub fn str(s: impl AsRef<str>) -> Self {
        Value::Str(Rc::from(s.as_ref()))
    }

    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    pub fn object(map: ObjectMap) -> Self {
        Value::Object(Rc::new(RefCell::new(map)))
    }

    pub fn native(function: NativeFunction) -> Self {
        Value::Native(Rc::new(function))
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "object",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Function(_) | Value::Native(_) | Value::Stub(_) => "function",
            Value::Array(_) | Value::Object(_) | Value::Schema(_) | Value::Rule(_) => "object",
        }
    }

    /// String conversion used by `+`, template literals and `String(x)`.
    pub fn to_display(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => number_to_string(*n),
            Value::Str(s) => s.to_string(),
            Value::Array(items) => items
                .borrow()
                .iter()
                .map(|item| {
                    if item.is_nullish() {
                        String::new()
                    } else {
                        item.to_display()
                    }
                })
                .collect::<Vec<_>>()
                .join(","),
            Value::Object(_) | Value::Schema(_) => "[object Object]".to_string(),
            Value::Function(closure) => format!(
                "function {}() {{}}",
                closure.def.name.as_deref().unwrap_or_default()
            ),
            Value::Native(native) => format!("function {}() {{}}", native.name),
            Value::Stub(path) => path.path().to_string(),
            Value::Rule(name) => format!("function {name}() {{}}"),
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::Str(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse().unwrap_or(f64::NAN)
                }
            }
            _ => f64::NAN,
        }
    }

    /// `===`: primitives by value, everything else by reference.
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => Rc::ptr_eq(a, b),
            (Value::Stub(a), Value::Stub(b)) => Rc::ptr_eq(a, b),
            (Value::Schema(a), Value::Schema(b)) => Rc::ptr_eq(a, b),
            (Value::Rule(a), Value::Rule(b)) => a == b,
            _ => false,
        }
    }

    /// `==`: `null == undefined`, number/string coercion, otherwise `===`.
    pub fn loose_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() && b.is_nullish() => true,
            (Value::Number(_), Value::Str(_)) | (Value::Str(_), Value::Number(_)) => {
                self.to_number() == other.to_number()
            }
            _ => self.strict_equals(other),
        }
    }
}

/// Formats a number the way scripts print it: integral values without a
/// fractional part.
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Array(items) => f.debug_list().entries(items.borrow().iter()).finish(),
            Value::Object(map) => f.debug_map().entries(map.borrow().iter()).finish(),
            Value::Stub(path) => write!(f, "<stand-in {}>", path.path()),
            Value::Schema(_) => write!(f, "<schema>"),
            other => write!(f, "{}", other.to_display()),
        }
    }
}

/// Values serialize the way the YAML emitter should see authored data.
/// `undefined` object members are skipped, `undefined` array items become
/// null, and host objects (functions, stand-ins, schemas, rules) are errors.
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Undefined | Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 9.007_199_254_740_992e15 {
                    serializer.serialize_i64(*n as i64)
                } else {
                    serializer.serialize_f64(*n)
                }
            }
            Value::Str(s) => serializer.serialize_str(s),
            Value::Array(items) => {
                let items = items.borrow();
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items.iter() {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Object(map) => {
                let map = map.borrow();
                let present = map.values().filter(|v| !matches!(v, Value::Undefined)).count();
                let mut out = serializer.serialize_map(Some(present))?;
                for (key, value) in map.iter() {
                    if !matches!(value, Value::Undefined) {
                        out.serialize_entry(key, value)?;
                    }
                }
                out.end()
            }
            other => Err(S::Error::custom(format!(
                "cannot represent {} value",
                other.type_of_host()
            ))),
        }
    }
}

impl Value {
    fn type_of_host(&self) -> &'static str {
        match self {
            Value::Function(_) | Value::Native(_) => "function",
            Value::Stub(_) => "stand-in",
            Value::Schema(_) => "schema",
            Value::Rule(_) => "rule",
            _ => "plain",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_formatting() {
        assert_eq!(number_to_string(3.0), "3");
        assert_eq!(number_to_string(-0.5), "-0.5");
        assert_eq!(number_to_string(f64::NAN), "NaN");
    }

    #[test]
    fn test_serializes_authored_error_shape() {
        let mut location = ObjectMap::new();
        location.insert("line".into(), Value::Number(2.0));
        location.insert("column".into(), Value::Number(9.0));
        let mut error = ObjectMap::new();
        error.insert("message".into(), Value::str("Unknown type \"Foo\"."));
        error.insert("locations".into(), Value::array(vec![Value::object(location)]));
        error.insert("path".into(), Value::Undefined);

        let json = serde_json::to_value(Value::object(error)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "message": "Unknown type \"Foo\".",
                "locations": [{ "line": 2, "column": 9 }]
            })
        );
    }

    #[test]
    fn test_host_values_are_not_serializable() {
        let rule = Value::array(vec![Value::Rule(Rc::from("KnownTypeNamesRule"))]);
        assert!(serde_json::to_value(&rule).is_err());
    }

    #[test]
    fn test_equality() {
        let a = Value::array(vec![]);
        assert!(a.strict_equals(&a.clone()));
        assert!(!a.strict_equals(&Value::array(vec![])));
        assert!(Value::Null.loose_equals(&Value::Undefined));
        assert!(Value::Number(1.0).loose_equals(&Value::str("1")));
    }
}
