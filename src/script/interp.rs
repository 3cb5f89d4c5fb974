//! Tree-walking evaluator for parsed test sources.
//!
//! Evaluation is strictly synchronous: a callback handed to a host function
//! runs to completion before the host function returns.

use super::ast::*;
use super::value::{Closure, NativeFunction, ObjectMap, Value};
use crate::error::{HarvestError, Result};
use crate::modules::ModuleTable;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Script calls nest Rust frames several deep; this keeps a runaway recursion
/// in a source file from overflowing the host stack.
const MAX_CALL_DEPTH: usize = 64;

#[derive(Default, Debug)]
pub struct Scope {
    vars: RefCell<HashMap<String, Value>>,
    parent: Option<Rc<Scope>>,
}

impl Scope {
    pub fn root() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn child(parent: &Rc<Scope>) -> Rc<Self> {
        Rc::new(Self {
            vars: RefCell::new(HashMap::new()),
            parent: Some(parent.clone()),
        })
    }

    pub fn declare(&self, name: impl Into<String>, value: Value) {
        self.vars.borrow_mut().insert(name.into(), value);
    }

    pub fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.vars.borrow().get(name) {
            return Some(value.clone());
        }
        self.parent.as_ref().and_then(|parent| parent.lookup(name))
    }

    fn assign(&self, name: &str, value: Value) -> bool {
        if let Some(slot) = self.vars.borrow_mut().get_mut(name) {
            *slot = value;
            return true;
        }
        match &self.parent {
            Some(parent) => parent.assign(name, value),
            None => false,
        }
    }
}

enum Flow {
    Normal,
    Return(Value),
}

pub struct Interpreter<'m> {
    file: String,
    modules: &'m ModuleTable,
    globals: Rc<Scope>,
    depth: usize,
}

impl<'m> Interpreter<'m> {
    pub fn new(file: impl Into<String>, modules: &'m ModuleTable) -> Self {
        Self {
            file: file.into(),
            modules,
            globals: builtin_globals(),
            depth: 0,
        }
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    /// Builds an evaluation error attributed to the current file.
    pub fn error(&self, message: impl Into<String>) -> HarvestError {
        HarvestError::Eval {
            file: self.file.clone(),
            message: message.into(),
        }
    }

    /// Evaluates a whole file: imports first, then the body top to bottom.
    pub fn run(&mut self, program: &Program) -> Result<()> {
        let scope = Scope::child(&self.globals);
        for stmt in &program.body {
            if let Stmt::Import(decl) = stmt {
                self.bind_import(decl, &scope)?;
            }
        }
        self.exec_block(&program.body, &scope)?;
        Ok(())
    }

    fn bind_import(&mut self, decl: &ImportDecl, scope: &Rc<Scope>) -> Result<()> {
        let exports = self.modules.load(&decl.specifier, &self.file)?;
        if let Some(local) = &decl.default {
            let value = exports
                .export("default")
                .unwrap_or_else(|| exports.namespace());
            scope.declare(local.clone(), value);
        }
        if let Some(local) = &decl.namespace {
            scope.declare(local.clone(), exports.namespace());
        }
        for (imported, local) in &decl.named {
            let value = exports.export(imported).unwrap_or_else(|| {
                tracing::debug!(
                    file = %self.file,
                    module = %decl.specifier,
                    name = %imported,
                    "import binding not provided, using undefined"
                );
                Value::Undefined
            });
            scope.declare(local.clone(), value);
        }
        Ok(())
    }

    /// `require(specifier)` from CommonJS-flavoured sources.
    pub fn require(&mut self, specifier: &str) -> Result<Value> {
        let exports = self.modules.load(specifier, &self.file)?;
        Ok(exports.namespace())
    }

    // ---------------------------------------------------------------------
    // statements
    // ---------------------------------------------------------------------

    fn exec_block(&mut self, body: &[Stmt], scope: &Rc<Scope>) -> Result<Flow> {
        for stmt in body {
            if let Stmt::Function(def) = stmt {
                if let Some(name) = &def.name {
                    scope.declare(name.clone(), self.make_closure(def, scope));
                }
            }
        }
        for stmt in body {
            if let Flow::Return(value) = self.exec_stmt(stmt, scope)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&mut self, stmt: &Stmt, scope: &Rc<Scope>) -> Result<Flow> {
        match stmt {
            Stmt::Import(_) | Stmt::Function(_) | Stmt::Empty => {}
            Stmt::Declare(decls) => {
                for (pattern, init) in decls {
                    let value = match init {
                        Some(expr) => self.eval(expr, scope)?,
                        None => Value::Undefined,
                    };
                    self.bind_pattern(pattern, value, scope)?;
                }
            }
            Stmt::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(expr, scope)?,
                    None => Value::Undefined,
                };
                return Ok(Flow::Return(value));
            }
            Stmt::Throw(expr) => {
                let value = self.eval(expr, scope)?;
                let message = match &value {
                    Value::Object(map) => map
                        .borrow()
                        .get("message")
                        .map(Value::to_display)
                        .unwrap_or_else(|| value.to_display()),
                    other => other.to_display(),
                };
                return Err(self.error(format!("uncaught exception: {message}")));
            }
            Stmt::If {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test, scope)?.truthy() {
                    return self.exec_nested(consequent, scope);
                } else if let Some(alternate) = alternate {
                    return self.exec_nested(alternate, scope);
                }
            }
            Stmt::ForOf {
                binding,
                iterable,
                body,
            } => {
                let items = match self.eval(iterable, scope)? {
                    Value::Array(items) => items.borrow().clone(),
                    Value::Str(s) => s.chars().map(|c| Value::str(c.to_string())).collect(),
                    other => {
                        return Err(self.error(format!("{} is not iterable", other.to_display())));
                    }
                };
                for item in items {
                    let iteration = Scope::child(scope);
                    self.bind_pattern(binding, item, &iteration)?;
                    if let Flow::Return(value) = self.exec_nested(body, &iteration)? {
                        return Ok(Flow::Return(value));
                    }
                }
            }
            Stmt::Block(body) => {
                let inner = Scope::child(scope);
                return self.exec_block(body, &inner);
            }
            Stmt::Expr(expr) => {
                self.eval(expr, scope)?;
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_nested(&mut self, stmt: &Stmt, scope: &Rc<Scope>) -> Result<Flow> {
        match stmt {
            Stmt::Block(body) => {
                let inner = Scope::child(scope);
                self.exec_block(body, &inner)
            }
            other => self.exec_stmt(other, scope),
        }
    }

    fn bind_pattern(&mut self, pattern: &Pattern, value: Value, scope: &Rc<Scope>) -> Result<()> {
        match pattern {
            Pattern::Ident(name) => {
                scope.declare(name.clone(), value);
            }
            Pattern::Object(props) => {
                let mut taken = Vec::new();
                for prop in props {
                    if prop.binding.rest {
                        let mut rest = ObjectMap::new();
                        if let Value::Object(map) = &value {
                            for (key, item) in map.borrow().iter() {
                                if !taken.contains(key) {
                                    rest.insert(key.clone(), item.clone());
                                }
                            }
                        }
                        self.bind_pattern(&prop.binding.pattern, Value::object(rest), scope)?;
                        continue;
                    }
                    let item = self.get_member(&value, &prop.key)?;
                    let item = self.apply_default(item, &prop.binding, scope)?;
                    self.bind_pattern(&prop.binding.pattern, item, scope)?;
                    taken.push(prop.key.clone());
                }
            }
            Pattern::Array(items) => {
                let source = match &value {
                    Value::Array(source) => source.borrow().clone(),
                    other => {
                        return Err(self.error(format!("{} is not iterable", other.to_display())));
                    }
                };
                for (idx, binding) in items.iter().enumerate() {
                    let Some(binding) = binding else { continue };
                    let item = if binding.rest {
                        Value::array(source.iter().skip(idx).cloned().collect())
                    } else {
                        source.get(idx).cloned().unwrap_or_default()
                    };
                    let item = self.apply_default(item, binding, scope)?;
                    self.bind_pattern(&binding.pattern, item, scope)?;
                }
            }
        }
        Ok(())
    }

    fn apply_default(&mut self, value: Value, binding: &Binding, scope: &Rc<Scope>) -> Result<Value> {
        match (&value, &binding.default) {
            (Value::Undefined, Some(default)) => self.eval(default, scope),
            _ => Ok(value),
        }
    }

    // ---------------------------------------------------------------------
    // expressions
    // ---------------------------------------------------------------------

    fn make_closure(&self, def: &Rc<FunctionDef>, scope: &Rc<Scope>) -> Value {
        Value::Function(Rc::new(Closure {
            def: def.clone(),
            scope: scope.clone(),
        }))
    }

    pub fn eval(&mut self, expr: &Expr, scope: &Rc<Scope>) -> Result<Value> {
        match expr {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Null => Ok(Value::Null),
            Expr::Undefined | Expr::This => Ok(Value::Undefined),
            Expr::Template {
                quasis,
                substitutions,
            } => {
                let mut out = String::new();
                for (idx, quasi) in quasis.iter().enumerate() {
                    out.push_str(quasi);
                    if let Some(sub) = substitutions.get(idx) {
                        out.push_str(&self.eval(sub, scope)?.to_display());
                    }
                }
                Ok(Value::str(out))
            }
            Expr::TaggedTemplate {
                tag,
                quasis,
                substitutions,
            } => {
                let tag = self.eval(tag, scope)?;
                let strings = Value::array(quasis.iter().map(Value::str).collect());
                let mut args = vec![strings];
                for sub in substitutions {
                    args.push(self.eval(sub, scope)?);
                }
                self.call_value(&tag, args)
            }
            Expr::Ident(name) => scope
                .lookup(name)
                .ok_or_else(|| self.error(format!("{name} is not defined"))),
            Expr::Array(items) => Ok(Value::array(self.eval_elements(items, scope)?)),
            Expr::Object(props) => self.eval_object(props, scope),
            Expr::Function(def) => Ok(self.make_closure(def, scope)),
            Expr::Member {
                object,
                property,
                optional,
            } => {
                let object = self.eval(object, scope)?;
                if *optional && object.is_nullish() {
                    return Ok(Value::Undefined);
                }
                let key = self.member_key(property, scope)?;
                self.get_member(&object, &key)
            }
            Expr::Call {
                callee,
                args,
                optional,
            } => self.eval_call(callee, args, *optional, scope),
            Expr::New { callee, args } => {
                let constructor = self.eval(callee, scope)?;
                let args = self.eval_elements(args, scope)?;
                match &constructor {
                    Value::Native(_) | Value::Stub(_) => self.call_value(&constructor, args),
                    Value::Function(_) => {
                        let result = self.call_value(&constructor, args)?;
                        Ok(match result {
                            Value::Object(_) | Value::Array(_) => result,
                            _ => Value::object(ObjectMap::new()),
                        })
                    }
                    other => Err(self.error(format!(
                        "{} is not a constructor",
                        other.to_display()
                    ))),
                }
            }
            Expr::Unary { op, operand } => {
                if *op == UnaryOp::TypeOf {
                    if let Expr::Ident(name) = operand.as_ref() {
                        return Ok(Value::str(
                            scope.lookup(name).map_or("undefined", |v| v.type_of()),
                        ));
                    }
                }
                let value = self.eval(operand, scope)?;
                Ok(match op {
                    UnaryOp::Not => Value::Bool(!value.truthy()),
                    UnaryOp::Neg => Value::Number(-value.to_number()),
                    UnaryOp::Plus => Value::Number(value.to_number()),
                    UnaryOp::TypeOf => Value::str(value.type_of()),
                })
            }
            Expr::Binary { op, left, right } => {
                let left = self.eval(left, scope)?;
                let right = self.eval(right, scope)?;
                Ok(binary(*op, &left, &right))
            }
            Expr::Logical { op, left, right } => {
                let left = self.eval(left, scope)?;
                let short_circuit = match op {
                    LogicalOp::And => !left.truthy(),
                    LogicalOp::Or => left.truthy(),
                    LogicalOp::Coalesce => !left.is_nullish(),
                };
                if short_circuit {
                    Ok(left)
                } else {
                    self.eval(right, scope)
                }
            }
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test, scope)?.truthy() {
                    self.eval(consequent, scope)
                } else {
                    self.eval(alternate, scope)
                }
            }
            Expr::Assign { target, op, value } => {
                let mut value = self.eval(value, scope)?;
                if let Some(op) = op {
                    let current = self.eval(target, scope)?;
                    value = binary(*op, &current, &value);
                }
                match target.as_ref() {
                    Expr::Ident(name) => {
                        if !scope.assign(name, value.clone()) {
                            return Err(self.error(format!("assignment to undeclared {name}")));
                        }
                    }
                    Expr::Member {
                        object, property, ..
                    } => {
                        let object = self.eval(object, scope)?;
                        let key = self.member_key(property, scope)?;
                        self.set_member(&object, &key, value.clone())?;
                    }
                    _ => return Err(self.error("invalid assignment target")),
                }
                Ok(value)
            }
        }
    }

    fn member_key(&mut self, property: &MemberKey, scope: &Rc<Scope>) -> Result<String> {
        Ok(match property {
            MemberKey::Name(name) => name.clone(),
            MemberKey::Computed(expr) => self.eval(expr, scope)?.to_display(),
        })
    }

    fn eval_elements(&mut self, items: &[Element], scope: &Rc<Scope>) -> Result<Vec<Value>> {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Element::Item(expr) => out.push(self.eval(expr, scope)?),
                Element::Spread(expr) => match self.eval(expr, scope)? {
                    Value::Array(spread) => out.extend(spread.borrow().iter().cloned()),
                    Value::Str(s) => out.extend(s.chars().map(|c| Value::str(c.to_string()))),
                    other => {
                        return Err(self.error(format!("{} is not iterable", other.to_display())));
                    }
                },
            }
        }
        Ok(out)
    }

    fn eval_object(&mut self, props: &[Property], scope: &Rc<Scope>) -> Result<Value> {
        let mut map = ObjectMap::new();
        for prop in props {
            match prop {
                Property::KeyValue(key, expr) => {
                    let key = match key {
                        PropertyKey::Static(name) => name.clone(),
                        PropertyKey::Computed(expr) => self.eval(expr, scope)?.to_display(),
                    };
                    let value = self.eval(expr, scope)?;
                    map.insert(key, value);
                }
                Property::Spread(expr) => match self.eval(expr, scope)? {
                    Value::Object(source) => {
                        for (key, value) in source.borrow().iter() {
                            map.insert(key.clone(), value.clone());
                        }
                    }
                    Value::Array(source) => {
                        for (idx, value) in source.borrow().iter().enumerate() {
                            map.insert(idx.to_string(), value.clone());
                        }
                    }
                    _ => {}
                },
            }
        }
        Ok(Value::object(map))
    }

    fn eval_call(
        &mut self,
        callee: &Expr,
        args: &[Element],
        optional: bool,
        scope: &Rc<Scope>,
    ) -> Result<Value> {
        if let Expr::Member {
            object,
            property,
            optional: optional_member,
        } = callee
        {
            let object = self.eval(object, scope)?;
            if *optional_member && object.is_nullish() {
                return Ok(Value::Undefined);
            }
            let key = self.member_key(property, scope)?;
            let args = self.eval_elements(args, scope)?;
            if optional {
                let method = self.get_member(&object, &key)?;
                if method.is_nullish() {
                    return Ok(Value::Undefined);
                }
            }
            return self.call_method(object, &key, args);
        }

        let function = self.eval(callee, scope)?;
        if optional && function.is_nullish() {
            return Ok(Value::Undefined);
        }
        let args = self.eval_elements(args, scope)?;
        self.call_value(&function, args)
    }

    // ---------------------------------------------------------------------
    // member access and calls
    // ---------------------------------------------------------------------

    pub fn get_member(&mut self, object: &Value, key: &str) -> Result<Value> {
        Ok(match object {
            Value::Undefined | Value::Null => {
                return Err(self.error(format!(
                    "cannot read property '{key}' of {}",
                    object.to_display()
                )));
            }
            Value::Object(map) => map.borrow().get(key).cloned().unwrap_or_default(),
            Value::Array(items) => {
                let items = items.borrow();
                if key == "length" {
                    Value::Number(items.len() as f64)
                } else {
                    key.parse::<usize>()
                        .ok()
                        .and_then(|idx| items.get(idx).cloned())
                        .unwrap_or_default()
                }
            }
            Value::Str(s) => {
                if key == "length" {
                    Value::Number(s.encode_utf16().count() as f64)
                } else {
                    key.parse::<usize>()
                        .ok()
                        .and_then(|idx| s.chars().nth(idx))
                        .map(|c| Value::str(c.to_string()))
                        .unwrap_or_default()
                }
            }
            Value::Native(native) => match native.props.borrow().get(key) {
                Some(value) => value.clone(),
                None if key == "name" => Value::str(&native.name),
                None => Value::Undefined,
            },
            Value::Function(closure) if key == "name" => {
                Value::str(closure.def.name.as_deref().unwrap_or_default())
            }
            Value::Stub(path) => Value::Stub(Rc::new(path.member(key))),
            Value::Rule(name) if key == "name" => Value::Str(name.clone()),
            _ => Value::Undefined,
        })
    }

    fn set_member(&mut self, object: &Value, key: &str, value: Value) -> Result<()> {
        match object {
            Value::Object(map) => {
                map.borrow_mut().insert(key.to_string(), value);
            }
            Value::Array(items) => {
                let Ok(idx) = key.parse::<usize>() else {
                    return Err(self.error(format!("cannot set array property '{key}'")));
                };
                let mut items = items.borrow_mut();
                match idx.cmp(&items.len()) {
                    std::cmp::Ordering::Less => items[idx] = value,
                    std::cmp::Ordering::Equal => items.push(value),
                    std::cmp::Ordering::Greater => {
                        return Err(self.error(format!(
                            "array index {idx} is past the end of an array of length {}",
                            items.len()
                        )));
                    }
                }
            }
            Value::Native(native) => {
                native.props.borrow_mut().insert(key.to_string(), value);
            }
            // Writes to a stand-in are swallowed like every other access.
            Value::Stub(_) => {}
            other => {
                return Err(self.error(format!(
                    "cannot set property '{key}' on {}",
                    other.to_display()
                )));
            }
        }
        Ok(())
    }

    pub fn call_method(&mut self, object: Value, key: &str, args: Vec<Value>) -> Result<Value> {
        match &object {
            Value::Array(items) => {
                if let Some(result) = self.array_method(items, key, &args)? {
                    return Ok(result);
                }
            }
            Value::Str(s) => {
                if let Some(result) = string_method(s, key, &args) {
                    return Ok(result);
                }
            }
            _ => {}
        }
        let method = self.get_member(&object, key)?;
        if matches!(method, Value::Undefined) {
            return Err(self.error(format!(
                "{}.{key} is not a function",
                describe_receiver(&object)
            )));
        }
        self.call_value(&method, args)
    }

    pub fn call_value(&mut self, function: &Value, args: Vec<Value>) -> Result<Value> {
        match function {
            Value::Function(closure) => self.call_closure(closure, args),
            Value::Native(native) => (native.call)(self, &args),
            Value::Stub(path) => Ok(path.invoke(&args)),
            Value::Rule(name) => Err(self.error(format!(
                "validation rule {name} is opaque and cannot be executed"
            ))),
            other => Err(self.error(format!("{} is not a function", other.to_display()))),
        }
    }

    fn call_closure(&mut self, closure: &Rc<Closure>, args: Vec<Value>) -> Result<Value> {
        if self.depth >= MAX_CALL_DEPTH {
            return Err(self.error(format!(
                "maximum call depth of {MAX_CALL_DEPTH} exceeded"
            )));
        }
        self.depth += 1;
        let result = self.invoke_closure(closure, args);
        self.depth -= 1;
        result
    }

    fn invoke_closure(&mut self, closure: &Rc<Closure>, args: Vec<Value>) -> Result<Value> {
        let scope = Scope::child(&closure.scope);
        for (idx, param) in closure.def.params.iter().enumerate() {
            let value = if param.rest {
                Value::array(args.iter().skip(idx).cloned().collect())
            } else {
                args.get(idx).cloned().unwrap_or_default()
            };
            let value = self.apply_default(value, param, &scope)?;
            self.bind_pattern(&param.pattern, value, &scope)?;
        }
        match &closure.def.body {
            FunctionBody::Block(body) => match self.exec_block(body, &scope)? {
                Flow::Return(value) => Ok(value),
                Flow::Normal => Ok(Value::Undefined),
            },
            FunctionBody::Expr(expr) => self.eval(expr, &scope),
        }
    }

    fn array_method(
        &mut self,
        items: &Rc<RefCell<Vec<Value>>>,
        key: &str,
        args: &[Value],
    ) -> Result<Option<Value>> {
        let arg = |idx: usize| args.get(idx).cloned().unwrap_or_default();
        let snapshot = items.borrow().clone();
        let result = match key {
            "map" | "forEach" | "filter" | "find" | "some" | "every" => {
                let callback = arg(0);
                let mut mapped = Vec::new();
                for (idx, item) in snapshot.iter().enumerate() {
                    let out = self.call_value(
                        &callback,
                        vec![item.clone(), Value::Number(idx as f64)],
                    )?;
                    match key {
                        "map" => mapped.push(out),
                        "filter" if out.truthy() => mapped.push(item.clone()),
                        "find" if out.truthy() => return Ok(Some(item.clone())),
                        "some" if out.truthy() => return Ok(Some(Value::Bool(true))),
                        "every" if !out.truthy() => return Ok(Some(Value::Bool(false))),
                        _ => {}
                    }
                }
                match key {
                    "map" | "filter" => Value::array(mapped),
                    "some" => Value::Bool(false),
                    "every" => Value::Bool(true),
                    _ => Value::Undefined,
                }
            }
            "join" => {
                let separator = match arg(0) {
                    Value::Undefined => ",".to_string(),
                    other => other.to_display(),
                };
                Value::str(
                    snapshot
                        .iter()
                        .map(|v| if v.is_nullish() { String::new() } else { v.to_display() })
                        .collect::<Vec<_>>()
                        .join(&separator),
                )
            }
            "concat" => {
                let mut out = snapshot;
                for extra in args {
                    match extra {
                        Value::Array(more) => out.extend(more.borrow().iter().cloned()),
                        other => out.push(other.clone()),
                    }
                }
                Value::array(out)
            }
            "push" => {
                let mut items = items.borrow_mut();
                items.extend(args.iter().cloned());
                Value::Number(items.len() as f64)
            }
            "includes" => Value::Bool(snapshot.iter().any(|v| v.strict_equals(&arg(0)))),
            "indexOf" => Value::Number(
                snapshot
                    .iter()
                    .position(|v| v.strict_equals(&arg(0)))
                    .map_or(-1.0, |idx| idx as f64),
            ),
            "slice" => {
                let (start, end) = slice_bounds(snapshot.len(), &arg(0), &arg(1));
                Value::array(snapshot[start..end].to_vec())
            }
            _ => return Ok(None),
        };
        Ok(Some(result))
    }
}

fn describe_receiver(object: &Value) -> String {
    match object {
        Value::Object(_) => "object".to_string(),
        Value::Native(native) => native.name.clone(),
        other => other.type_of().to_string(),
    }
}

fn slice_bounds(len: usize, start: &Value, end: &Value) -> (usize, usize) {
    let resolve = |value: &Value, default: usize| -> usize {
        match value {
            Value::Undefined => default,
            other => {
                let n = other.to_number();
                if n.is_nan() {
                    0
                } else if n < 0.0 {
                    len.saturating_sub((-n) as usize)
                } else {
                    (n as usize).min(len)
                }
            }
        }
    };
    let start = resolve(start, 0);
    let end = resolve(end, len);
    (start, end.max(start))
}

fn string_method(s: &str, key: &str, args: &[Value]) -> Option<Value> {
    let arg_str = |idx: usize| args.get(idx).map(Value::to_display).unwrap_or_default();
    Some(match key {
        "trim" => Value::str(s.trim()),
        "trimStart" => Value::str(s.trim_start()),
        "trimEnd" => Value::str(s.trim_end()),
        "toUpperCase" => Value::str(s.to_uppercase()),
        "toLowerCase" => Value::str(s.to_lowercase()),
        "includes" => Value::Bool(s.contains(arg_str(0).as_str())),
        "startsWith" => Value::Bool(s.starts_with(arg_str(0).as_str())),
        "endsWith" => Value::Bool(s.ends_with(arg_str(0).as_str())),
        "repeat" => {
            let count = args.first().map(Value::to_number).unwrap_or(0.0);
            Value::str(s.repeat(if count > 0.0 { count as usize } else { 0 }))
        }
        "replace" => Value::str(s.replacen(arg_str(0).as_str(), &arg_str(1), 1)),
        "replaceAll" => Value::str(s.replace(arg_str(0).as_str(), &arg_str(1))),
        "split" => {
            let separator = arg_str(0);
            let parts: Vec<Value> = if separator.is_empty() {
                s.chars().map(|c| Value::str(c.to_string())).collect()
            } else {
                s.split(separator.as_str()).map(Value::str).collect()
            };
            Value::array(parts)
        }
        "concat" => {
            let mut out = s.to_string();
            for arg in args {
                out.push_str(&arg.to_display());
            }
            Value::str(out)
        }
        "slice" => {
            let chars: Vec<char> = s.chars().collect();
            let start = args.first().cloned().unwrap_or_default();
            let end = args.get(1).cloned().unwrap_or_default();
            let (start, end) = slice_bounds(chars.len(), &start, &end);
            Value::str(chars[start..end].iter().collect::<String>())
        }
        "toString" => Value::str(s),
        _ => return None,
    })
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Value {
    match op {
        BinaryOp::Add => {
            let stringish = |v: &Value| {
                matches!(
                    v,
                    Value::Str(_) | Value::Array(_) | Value::Object(_) | Value::Stub(_)
                )
            };
            if stringish(left) || stringish(right) {
                Value::str(format!("{}{}", left.to_display(), right.to_display()))
            } else {
                Value::Number(left.to_number() + right.to_number())
            }
        }
        BinaryOp::Sub => Value::Number(left.to_number() - right.to_number()),
        BinaryOp::Mul => Value::Number(left.to_number() * right.to_number()),
        BinaryOp::Div => Value::Number(left.to_number() / right.to_number()),
        BinaryOp::Rem => Value::Number(left.to_number() % right.to_number()),
        BinaryOp::StrictEq => Value::Bool(left.strict_equals(right)),
        BinaryOp::StrictNe => Value::Bool(!left.strict_equals(right)),
        BinaryOp::LooseEq => Value::Bool(left.loose_equals(right)),
        BinaryOp::LooseNe => Value::Bool(!left.loose_equals(right)),
        BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge => {
            let ordering = match (left, right) {
                (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
                _ => left.to_number().partial_cmp(&right.to_number()),
            };
            let Some(ordering) = ordering else {
                return Value::Bool(false);
            };
            Value::Bool(match op {
                BinaryOp::Lt => ordering.is_lt(),
                BinaryOp::Gt => ordering.is_gt(),
                BinaryOp::Le => ordering.is_le(),
                _ => ordering.is_ge(),
            })
        }
    }
}

fn builtin_globals() -> Rc<Scope> {
    let globals = Scope::root();

    let json = NativeFunction::new("JSON", |interp, _| {
        Err(interp.error("JSON is not a function"))
    })
    .with_prop(
        "stringify",
        Value::native(NativeFunction::new("stringify", |_, args| {
            let value = args.first().cloned().unwrap_or_default();
            let pretty = args.get(2).is_some_and(|indent| indent.truthy());
            let encoded = if pretty {
                serde_json::to_string_pretty(&value)
            } else {
                serde_json::to_string(&value)
            };
            Ok(encoded.map(Value::str).unwrap_or_default())
        })),
    );
    globals.declare("JSON", Value::native(json));

    let object = NativeFunction::new("Object", |_, args| {
        Ok(args
            .first()
            .cloned()
            .unwrap_or_else(|| Value::object(ObjectMap::new())))
    })
    .with_prop(
        "keys",
        Value::native(NativeFunction::new("keys", |_, args| {
            Ok(match args.first() {
                Some(Value::Object(map)) => {
                    Value::array(map.borrow().keys().map(Value::str).collect())
                }
                Some(Value::Array(items)) => Value::array(
                    (0..items.borrow().len())
                        .map(|idx| Value::str(idx.to_string()))
                        .collect(),
                ),
                _ => Value::array(Vec::new()),
            })
        })),
    )
    .with_prop(
        "assign",
        Value::native(NativeFunction::new("assign", |interp, args| {
            let target = args.first().cloned().unwrap_or_default();
            let Value::Object(map) = &target else {
                return Err(interp.error("Object.assign target must be an object"));
            };
            for source in &args[1..] {
                if let Value::Object(source) = source {
                    if Rc::ptr_eq(map, source) {
                        continue;
                    }
                    for (key, value) in source.borrow().iter() {
                        map.borrow_mut().insert(key.clone(), value.clone());
                    }
                }
            }
            Ok(target)
        })),
    )
    .with_prop(
        "freeze",
        Value::native(NativeFunction::new("freeze", |_, args| {
            Ok(args.first().cloned().unwrap_or_default())
        })),
    );
    globals.declare("Object", Value::native(object));

    globals.declare(
        "String",
        Value::native(NativeFunction::new("String", |_, args| {
            Ok(Value::str(
                args.first()
                    .map(Value::to_display)
                    .unwrap_or_default(),
            ))
        })),
    );
    globals.declare(
        "Number",
        Value::native(NativeFunction::new("Number", |_, args| {
            Ok(Value::Number(
                args.first().map(Value::to_number).unwrap_or(0.0),
            ))
        })),
    );
    globals.declare(
        "Boolean",
        Value::native(NativeFunction::new("Boolean", |_, args| {
            Ok(Value::Bool(args.first().is_some_and(Value::truthy)))
        })),
    );
    globals.declare(
        "Array",
        Value::native(
            NativeFunction::new("Array", |_, args| Ok(Value::array(args.to_vec()))).with_prop(
                "isArray",
                Value::native(NativeFunction::new("isArray", |_, args| {
                    Ok(Value::Bool(matches!(args.first(), Some(Value::Array(_)))))
                })),
            ),
        ),
    );
    globals.declare(
        "Error",
        Value::native(NativeFunction::new("Error", |_, args| {
            let mut map = ObjectMap::new();
            map.insert(
                "message".to_string(),
                Value::str(args.first().map(Value::to_display).unwrap_or_default()),
            );
            Ok(Value::object(map))
        })),
    );

    let log = |level: &'static str| {
        Value::native(NativeFunction::new(level, move |interp, args| {
            let line = args
                .iter()
                .map(Value::to_display)
                .collect::<Vec<_>>()
                .join(" ");
            tracing::debug!(file = %interp.file(), console = level, "{}", line);
            Ok(Value::Undefined)
        }))
    };
    let console = NativeFunction::new("console", |interp, _| {
        Err(interp.error("console is not a function"))
    })
    .with_prop("log", log("log"))
    .with_prop("warn", log("warn"))
    .with_prop("error", log("error"));
    globals.declare("console", Value::native(console));

    globals.declare(
        "require",
        Value::native(NativeFunction::new("require", |interp, args| {
            let specifier = args.first().map(Value::to_display).unwrap_or_default();
            interp.require(&specifier)
        })),
    );
    globals.declare("NaN", Value::Number(f64::NAN));
    globals.declare("Infinity", Value::Number(f64::INFINITY));
    globals.declare("undefined", Value::Undefined);

    globals
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::{ModuleExports, ModuleTable, NoFallback};
    use crate::script::{lexer::tokenize, parser::parse_program};

    fn run(src: &str, modules: &ModuleTable) -> Result<Rc<Scope>> {
        let program = parse_program(tokenize(src, "t.ts")?, "t.ts")?;
        let mut interp = Interpreter::new("t.ts", modules);
        let scope = Scope::child(&interp.globals);
        interp.exec_block(&program.body, &scope)?;
        Ok(scope)
    }

    fn eval_to_string(src: &str) -> String {
        let modules = ModuleTable::new(Box::new(NoFallback));
        let scope = run(&format!("const __out = {src};"), &modules).unwrap();
        scope.lookup("__out").unwrap().to_display()
    }

    #[test]
    fn test_arithmetic_and_strings() {
        assert_eq!(eval_to_string("1 + 2 * 3"), "7");
        assert_eq!(eval_to_string("'a' + 1"), "a1");
        assert_eq!(eval_to_string("`x${1 + 1}y`"), "x2y");
        assert_eq!(eval_to_string("[1, 2, 3].map((n) => n * 2).join('-')"), "2-4-6");
        assert_eq!(eval_to_string("null ?? 'fallback'"), "fallback");
        assert_eq!(eval_to_string("'  pad '.trim().length"), "3");
    }

    #[test]
    fn test_functions_are_hoisted_and_close_over_later_consts() {
        let modules = ModuleTable::new(Box::new(NoFallback));
        let scope = run(
            "const result = helper();\n\
             function helper() { return late; }\n\
             const late = 1;",
            &modules,
        );
        // `late` is read before its declaration ran.
        assert!(scope.is_err());

        let scope = run(
            "function helper() { return late; }\n\
             const late = 'ok';\n\
             const result = helper();",
            &modules,
        )
        .unwrap();
        assert_eq!(scope.lookup("result").unwrap().to_display(), "ok");
    }

    #[test]
    fn test_destructuring_and_defaults() {
        let modules = ModuleTable::new(Box::new(NoFallback));
        let scope = run(
            "const { a, b: [first, ...others], c = 5 } = { a: 1, b: [2, 3, 4] };\n\
             const f = ({ x } = { x: 'dflt' }) => x;\n\
             const fromDefault = f();",
            &modules,
        )
        .unwrap();
        assert_eq!(scope.lookup("a").unwrap().to_display(), "1");
        assert_eq!(scope.lookup("first").unwrap().to_display(), "2");
        assert_eq!(scope.lookup("others").unwrap().to_display(), "3,4");
        assert_eq!(scope.lookup("c").unwrap().to_display(), "5");
        assert_eq!(scope.lookup("fromDefault").unwrap().to_display(), "dflt");
    }

    #[test]
    fn test_runaway_recursion_is_an_error() {
        let modules = ModuleTable::new(Box::new(NoFallback));
        let err = run("function loop() { return loop(); }\nloop();", &modules).unwrap_err();
        assert!(err.to_string().contains("maximum call depth"));
    }

    #[test]
    fn test_array_writes_stay_within_one_past_the_end() {
        let modules = ModuleTable::new(Box::new(NoFallback));
        let scope = run("const a = [1];\na[0] = 'x';\na[1] = 'y';", &modules).unwrap();
        assert_eq!(scope.lookup("a").unwrap().to_display(), "x,y");

        let err = run("const a = [];\na[1e9] = 1;", &modules).unwrap_err();
        assert_eq!(
            err.to_string(),
            "t.ts: array index 1000000000 is past the end of an array of length 0"
        );
    }

    #[test]
    fn test_imports_bind_from_module_table() {
        let mut exports = ObjectMap::new();
        exports.insert("answer".to_string(), Value::Number(42.0));
        let modules = ModuleTable::new(Box::new(NoFallback))
            .substitute("./consts", ModuleExports::table(exports));
        let program = parse_program(
            tokenize("import { answer as a } from './consts';\nconst b = a + 1;", "t.ts")
                .unwrap(),
            "t.ts",
        )
        .unwrap();
        let mut interp = Interpreter::new("t.ts", &modules);
        interp.run(&program).unwrap();
    }

    #[test]
    fn test_unknown_import_is_missing_dependency() {
        let modules = ModuleTable::new(Box::new(NoFallback));
        let program =
            parse_program(tokenize("import x from 'left-pad';", "t.ts").unwrap(), "t.ts")
                .unwrap();
        let err = Interpreter::new("t.ts", &modules).run(&program).unwrap_err();
        assert!(matches!(err, HarvestError::MissingDependency { ref specifier, .. } if specifier == "left-pad"));
    }
}
