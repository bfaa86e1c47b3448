//! Semantic values produced during a parse.
//!
//! Values form a tree of immutable primitives, lists, and dicts. Dicts
//! preserve insertion order. Callables appear as values only so that
//! identifiers naming built-ins or externs can be passed to `map` and
//! friends; applying anything else is a host error.

use indexmap::IndexMap;

use crate::error::HostError;

/// A runtime value.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Dict(IndexMap<String, Value>),
    Func(FuncRef),
}

/// A reference to a callable: a built-in function or a declared extern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FuncRef {
    Builtin(&'static str),
    Extern(String),
}

impl FuncRef {
    pub fn name(&self) -> &str {
        match self {
            FuncRef::Builtin(n) => n,
            FuncRef::Extern(n) => n,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                *a as f64 == *b
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Dict(a), Value::Dict(b)) => {
                a.len() == b.len() && a.iter().all(|(k, v)| b.get(k) == Some(v))
            }
            (Value::Func(a), Value::Func(b)) => a == b,
            _ => false,
        }
    }
}

impl Value {
    /// The type name used in error messages and by the `is_*` built-ins.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Dict(_) => "dict",
            Value::Func(_) => "func",
        }
    }

    /// Truthiness, used by `e_not`: null, false, zero, the empty
    /// string, and empty containers are falsey.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(xs) => !xs.is_empty(),
            Value::Dict(d) => !d.is_empty(),
            Value::Func(_) => true,
        }
    }

    pub fn as_str(&self) -> Result<&str, HostError> {
        match self {
            Value::Str(s) => Ok(s),
            _ => Err(HostError::runtime(format!(
                "Expected a string, got {}",
                self.type_name()
            ))),
        }
    }

    pub fn as_int(&self) -> Result<i64, HostError> {
        match self {
            Value::Int(i) => Ok(*i),
            _ => Err(HostError::runtime(format!(
                "Expected an int, got {}",
                self.type_name()
            ))),
        }
    }

    pub fn as_list(&self) -> Result<&[Value], HostError> {
        match self {
            Value::List(xs) => Ok(xs),
            _ => Err(HostError::runtime(format!(
                "Expected a list, got {}",
                self.type_name()
            ))),
        }
    }

    pub fn as_dict(&self) -> Result<&IndexMap<String, Value>, HostError> {
        match self {
            Value::Dict(d) => Ok(d),
            _ => Err(HostError::runtime(format!(
                "Expected a dict, got {}",
                self.type_name()
            ))),
        }
    }

    /// `a + b`: numeric addition with int→float promotion, string
    /// concatenation, or list concatenation. Anything else raises.
    pub fn add(&self, other: &Value) -> Result<Value, HostError> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a
                .checked_add(*b)
                .map(Value::Int)
                .ok_or_else(|| HostError::runtime("Integer overflow in +")),
            (Value::Int(a), Value::Float(b)) => Ok(Value::Float(*a as f64 + b)),
            (Value::Float(a), Value::Int(b)) => Ok(Value::Float(a + *b as f64)),
            (Value::Float(a), Value::Float(b)) => Ok(Value::Float(a + b)),
            (Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{a}{b}"))),
            (Value::List(a), Value::List(b)) => {
                let mut xs = a.clone();
                xs.extend(b.iter().cloned());
                Ok(Value::List(xs))
            }
            _ => Err(HostError::runtime(format!(
                "Unsupported operand types for +: {} and {}",
                self.type_name(),
                other.type_name()
            ))),
        }
    }

    /// `a - b`: numeric only.
    pub fn sub(&self, other: &Value) -> Result<Value, HostError> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a
                .checked_sub(*b)
                .map(Value::Int)
                .ok_or_else(|| HostError::runtime("Integer overflow in -")),
            (Value::Int(a), Value::Float(b)) => Ok(Value::Float(*a as f64 - b)),
            (Value::Float(a), Value::Int(b)) => Ok(Value::Float(a - *b as f64)),
            (Value::Float(a), Value::Float(b)) => Ok(Value::Float(a - b)),
            _ => Err(HostError::runtime(format!(
                "Unsupported operand types for -: {} and {}",
                self.type_name(),
                other.type_name()
            ))),
        }
    }

    /// Index a list (int key) or dict (string key).
    pub fn get_item(&self, key: &Value) -> Result<Value, HostError> {
        match (self, key) {
            (Value::List(xs), Value::Int(i)) => {
                let idx = usize::try_from(*i)
                    .ok()
                    .filter(|&idx| idx < xs.len())
                    .ok_or_else(|| {
                        HostError::runtime(format!("List index {i} out of range"))
                    })?;
                Ok(xs[idx].clone())
            }
            (Value::Str(s), Value::Int(i)) => {
                let idx = usize::try_from(*i).ok().ok_or_else(|| {
                    HostError::runtime(format!("String index {i} out of range"))
                })?;
                s.chars().nth(idx).map(|c| Value::Str(c.to_string())).ok_or_else(
                    || HostError::runtime(format!("String index {i} out of range")),
                )
            }
            (Value::Dict(d), Value::Str(k)) => d.get(k).cloned().ok_or_else(|| {
                HostError::runtime(format!("Missing key {k:?} in dict"))
            }),
            _ => Err(HostError::runtime(format!(
                "Cannot index {} with {}",
                self.type_name(),
                key.type_name()
            ))),
        }
    }

    /// Convert to JSON for display and tests. Callables render as
    /// their names.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Value::from(*f),
            Value::Str(s) => serde_json::Value::from(s.as_str()),
            Value::List(xs) => {
                serde_json::Value::Array(xs.iter().map(Value::to_json).collect())
            }
            Value::Dict(d) => serde_json::Value::Object(
                d.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            Value::Func(f) => serde_json::Value::from(f.name()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Value {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Value {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Value {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Value {
        Value::Str(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(xs: Vec<Value>) -> Value {
        Value::List(xs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_promotion() {
        assert_eq!(
            Value::Int(1).add(&Value::Float(2.5)).unwrap(),
            Value::Float(3.5)
        );
        assert_eq!(Value::Int(1).sub(&Value::Int(4)).unwrap(), Value::Int(-3));
    }

    #[test]
    fn test_string_concat() {
        assert_eq!(
            Value::from("ab").add(&Value::from("c")).unwrap(),
            Value::from("abc")
        );
        assert!(Value::from("ab").add(&Value::Int(1)).is_err());
    }

    #[test]
    fn test_overflow_is_an_error() {
        assert!(Value::Int(i64::MAX).add(&Value::Int(1)).is_err());
    }

    #[test]
    fn test_get_item() {
        let xs = Value::List(vec![Value::from("a"), Value::from("b")]);
        assert_eq!(xs.get_item(&Value::Int(1)).unwrap(), Value::from("b"));
        assert!(xs.get_item(&Value::Int(2)).is_err());
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.truthy());
        assert!(!Value::from("").truthy());
        assert!(Value::Int(2).truthy());
        assert!(!Value::List(vec![]).truthy());
    }
}
