//! Dynamic values crossing the remote boundary.
//!
//! A remote hook is opaque to the host: arguments go in as an ordered list of
//! [`Value`]s and a single [`Value`] comes back. Containers are reference
//! counted so cloning a value (or an argument list) never copies its
//! contents, which is what makes pointer-identity comparison meaningful.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

/// Callable stored inside a [`Value`], e.g. a setter returned by a hook.
pub type Callback = Rc<dyn Fn(&[Value]) -> Value>;

/// Ordered argument list passed to a remote hook.
pub type HookArgs = Vec<Value>;

#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    List(Rc<[Value]>),
    Map(Rc<IndexMap<String, Value>>),
    Callback(Callback),
}

impl Value {
    pub fn str(value: impl Into<Rc<str>>) -> Self {
        Value::Str(value.into())
    }

    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Value::List(items.into_iter().collect())
    }

    pub fn map<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::Map(Rc::new(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value))
                .collect(),
        ))
    }

    pub fn callback(f: impl Fn(&[Value]) -> Value + 'static) -> Self {
        Value::Callback(Rc::new(f))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(value) => Some(*value),
            Value::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(value) => Some(&**value),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(&**items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Map(entries) => Some(&**entries),
            _ => None,
        }
    }

    /// Field of a map value; `None` for other variants or a missing key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map().and_then(|entries| entries.get(key))
    }

    /// Invoke a callback value. Non-callbacks yield `Null`.
    pub fn call(&self, args: &[Value]) -> Value {
        match self {
            Value::Callback(f) => f(args),
            _ => Value::Null,
        }
    }

    /// Cheap change check: scalars and strings compare by value, lists, maps
    /// and callbacks by pointer.
    pub fn shallow_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            // Bitwise, so NaN equals itself and re-renders settle.
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
            (Value::Map(a), Value::Map(b)) => Rc::ptr_eq(a, b),
            (Value::Callback(a), Value::Callback(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Element-wise [`Value::shallow_eq`] over two argument lists.
pub fn args_shallow_eq(a: &[Value], b: &[Value]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(a, b)| a.shallow_eq(b))
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            _ => self.shallow_eq(other),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(value) => write!(f, "Bool({value})"),
            Value::Int(value) => write!(f, "Int({value})"),
            Value::Float(value) => write!(f, "Float({value})"),
            Value::Str(value) => write!(f, "Str({value:?})"),
            Value::List(items) => f.debug_list().entries(items.iter()).finish(),
            Value::Map(entries) => f.debug_map().entries(entries.iter()).finish(),
            Value::Callback(callback) => write!(f, "Callback({:p})", Rc::as_ptr(callback)),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value.into())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.into())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value.into())
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items.into())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shallow_eq_compares_containers_by_identity() {
        let list = Value::list([Value::from(1), Value::from(2)]);
        let same = list.clone();
        let rebuilt = Value::list([Value::from(1), Value::from(2)]);

        assert!(list.shallow_eq(&same));
        assert!(!list.shallow_eq(&rebuilt));
        assert_eq!(list, rebuilt);
    }

    #[test]
    fn shallow_eq_compares_scalars_and_strings_by_value() {
        assert!(Value::from("abc").shallow_eq(&Value::str(String::from("abc"))));
        assert!(Value::from(3).shallow_eq(&Value::Int(3)));
        assert!(Value::Float(f64::NAN).shallow_eq(&Value::Float(f64::NAN)));
        assert!(!Value::from(3).shallow_eq(&Value::Float(3.0)));
        assert!(!Value::Null.shallow_eq(&Value::Bool(false)));
    }

    #[test]
    fn callbacks_are_equal_only_to_themselves() {
        let inc = Value::callback(|args| Value::from(args.len() as i64));
        let other = Value::callback(|args| Value::from(args.len() as i64));
        assert_eq!(inc, inc.clone());
        assert_ne!(inc, other);
        assert_eq!(inc.call(&[Value::Null, Value::Null]), Value::from(2));
        assert_eq!(Value::from(1).call(&[]), Value::Null);
    }

    #[test]
    fn args_shallow_eq_checks_length_and_elements() {
        let shared = Value::map([("k", Value::from(1))]);
        let a = vec![Value::from("x"), shared.clone()];
        let b = vec![Value::from("x"), shared];
        assert!(args_shallow_eq(&a, &b));
        assert!(!args_shallow_eq(&a, &b[..1]));
        assert!(args_shallow_eq(&[], &[]));
    }

    #[test]
    fn map_lookup() {
        let value = Value::map([("count", Value::from(4)), ("label", Value::from("n"))]);
        assert_eq!(value.get("count").and_then(Value::as_int), Some(4));
        assert_eq!(value.get("label").and_then(Value::as_str), Some("n"));
        assert!(value.get("missing").is_none());
        assert!(Value::Null.get("count").is_none());
    }
}
