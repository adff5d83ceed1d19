//! The runtime values.

use std::{fmt, rc::Rc};

use compact_str::CompactString;

use crate::{
    compiler::code::ConstValue,
    libs::Builtin,
    utils::{escape_str, Float, Join},
};

/// A function value: the function index and the values it captured.
#[derive(Debug, Clone, PartialEq)]
pub struct Closure {
    pub function: u32,
    pub captures: Vec<Value>,
}

/// Enum of all runtime values.
///
/// Values are immutable. Lists have value semantics, an index assignment
/// copies the list unless it is the only reference.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// `unit` - The value of statements and functions without a result.
    #[default]
    Unit,
    /// `int` - A 64-bit integer.
    Int(i64),
    /// `float` - A 64-bit floating point number.
    Float(f64),
    /// `bool` - A `true` / `false` value.
    Bool(bool),
    /// `str` - A UTF-8 string.
    Str(CompactString),
    /// `[T]` - A list.
    List(Rc<Vec<Value>>),
    /// `fn(T..) -> R` - A function.
    Function(Rc<Closure>),
    /// A builtin function.
    Builtin(Builtin),
}

impl Value {
    pub const fn type_name(&self) -> &'static str {
        match self {
            Value::Unit => "unit",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Function(_) => "function",
            Value::Builtin(_) => "builtin",
        }
    }

    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Rc::new(items))
    }

    /// The printed form of a value inside a list.
    pub fn repr(&self) -> String {
        if let Value::Str(s) = self {
            format!("\"{}\"", escape_str(s))
        } else {
            self.to_string()
        }
    }

    /// The constant of a scalar value, `None` for composite values.
    pub fn to_const(&self) -> Option<ConstValue> {
        Some(match self {
            Value::Unit => ConstValue::Unit,
            Value::Int(v) => ConstValue::Int(*v),
            Value::Float(v) => ConstValue::Float(Float(*v)),
            Value::Bool(v) => ConstValue::Bool(*v),
            Value::Str(v) => ConstValue::Str(v.clone()),
            Value::Builtin(v) => ConstValue::Builtin(*v),
            Value::List(_) | Value::Function(_) => return None,
        })
    }
}

impl From<&ConstValue> for Value {
    fn from(value: &ConstValue) -> Self {
        match value {
            ConstValue::Unit => Value::Unit,
            ConstValue::Int(v) => Value::Int(*v),
            ConstValue::Float(v) => Value::Float(v.0),
            ConstValue::Bool(v) => Value::Bool(*v),
            ConstValue::Str(v) => Value::Str(v.clone()),
            ConstValue::Function(function) => Value::Function(Rc::new(Closure {
                function: *function,
                captures: Vec::new(),
            })),
            ConstValue::Builtin(v) => Value::Builtin(*v),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Unit, Value::Unit) => true,
            (Value::Int(l), Value::Int(r)) => l == r,
            (Value::Float(l), Value::Float(r)) => l == r,
            (Value::Bool(l), Value::Bool(r)) => l == r,
            (Value::Str(l), Value::Str(r)) => l == r,
            (Value::List(l), Value::List(r)) => l == r,
            (Value::Function(l), Value::Function(r)) => Rc::ptr_eq(l, r),
            (Value::Builtin(l), Value::Builtin(r)) => l == r,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unit => write!(f, "()"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{}", Float(*v)),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Str(v) => write!(f, "{v}"),
            Value::List(items) => write!(f, "[{}]", items.iter().map(Value::repr).join(", ")),
            Value::Function(closure) => write!(f, "<function {}>", closure.function),
            Value::Builtin(builtin) => write!(f, "<builtin {builtin}>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_display() {
        let list = Value::list(vec![Value::Int(1), Value::Str("a\"b".into())]);
        assert_eq!(list.to_string(), "[1, \"a\\\"b\"]");
        assert_eq!(Value::Float(2.0).to_string(), "2.0");
        assert_eq!(Value::Unit.to_string(), "()");
    }

    #[test]
    fn float_equality_follows_ieee() {
        assert_ne!(Value::Float(f64::NAN), Value::Float(f64::NAN));
        assert_eq!(Value::Float(0.0), Value::Float(-0.0));
    }
}
