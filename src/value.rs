//! Script-side values.
//!
//! [`Value`] is the dynamic value type crossing the bridge in both
//! directions. Aggregates (`List`, `Table`) are `Rc`-shared and interior
//! mutable so the bridge can rewrite a script-provided table in place, the
//! way the registration adapters bind declarative field entries. `Func`
//! holds a native callable with the script calling convention.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use bytes::Bytes;
use rustc_hash::FxHashMap;

use crate::ctx::ScriptCtx;
use crate::error::ScriptError;
use crate::handle::Handle;

/// A script callable: receives the bridge context and its arguments,
/// returns its result values or a script-level error.
pub type ScriptFn = Rc<dyn Fn(&mut ScriptCtx, &[Value]) -> Result<Vec<Value>, ScriptError>>;

/// Shared, mutable string-keyed table.
pub type TableRef = Rc<RefCell<FxHashMap<String, Value>>>;

/// Shared, mutable sequence.
pub type ListRef = Rc<RefCell<Vec<Value>>>;

/// A dynamic script value.
#[derive(Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Str(Rc<str>),
    Bytes(Bytes),
    List(ListRef),
    Table(TableRef),
    Func(ScriptFn),
    Handle(Handle),
}

impl Value {
    pub fn str(s: impl AsRef<str>) -> Value {
        Value::Str(Rc::from(s.as_ref()))
    }

    pub fn table() -> Value {
        Value::Table(Rc::new(RefCell::new(FxHashMap::default())))
    }

    pub fn table_from<I, S>(entries: I) -> Value
    where
        I: IntoIterator<Item = (S, Value)>,
        S: Into<String>,
    {
        let map = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v))
            .collect::<FxHashMap<_, _>>();
        Value::Table(Rc::new(RefCell::new(map)))
    }

    pub fn list_from(items: Vec<Value>) -> Value {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn func(
        f: impl Fn(&mut ScriptCtx, &[Value]) -> Result<Vec<Value>, ScriptError> + 'static,
    ) -> Value {
        Value::Func(Rc::new(f))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// The name used in argument-error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Str(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::List(_) => "list",
            Value::Table(_) => "table",
            Value::Func(_) => "function",
            Value::Handle(_) => "handle",
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Bytes(b) => write!(f, "bytes[{}]", b.len()),
            Value::List(items) => write!(f, "list[{}]", items.borrow().len()),
            Value::Table(map) => write!(f, "table[{}]", map.borrow().len()),
            Value::Func(_) => write!(f, "function"),
            Value::Handle(h) => write!(f, "{h:?}"),
        }
    }
}

/// Structural equality where it is cheap; reference identity for
/// aggregates and functions.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
            (Value::Table(a), Value::Table(b)) => Rc::ptr_eq(a, b),
            (Value::Func(a), Value::Func(b)) => Rc::ptr_eq(a, b),
            (Value::Handle(a), Value::Handle(b)) => a == b,
            _ => false,
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::str(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(Rc::from(v.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_names() {
        assert_eq!(Value::Nil.type_name(), "nil");
        assert_eq!(Value::Int(1).type_name(), "integer");
        assert_eq!(Value::table().type_name(), "table");
    }

    #[test]
    fn tables_are_reference_equal_only() {
        let a = Value::table();
        let b = a.clone();
        assert_eq!(a, b);
        assert_ne!(a, Value::table());
    }

    #[test]
    fn table_from_builds_entries() {
        let t = Value::table_from([("name", Value::str("x"))]);
        let Value::Table(map) = &t else { panic!() };
        assert_eq!(map.borrow().get("name"), Some(&Value::str("x")));
    }
}
