//! The type system.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{libs::Builtin, utils::Join};

/// All types of the language. Types are compared structurally.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Int,
    Float,
    Bool,
    Str,
    Unit,
    List(Box<Type>),
    Function {
        params: Vec<Type>,
        returns: Box<Type>,
    },
    /// A builtin function. Builtins are polymorphic, so each one has its own
    /// type and calls to it are checked by the builtin's own rule.
    Builtin(Builtin),
    /// The type of an ill-typed node. It only exists during analysis and
    /// unifies with everything, so one error is reported once.
    Error,
}

impl Type {
    pub fn list(item: Type) -> Type {
        Type::List(Box::new(item))
    }

    pub fn function(params: Vec<Type>, returns: Type) -> Type {
        Type::Function {
            params,
            returns: Box::new(returns),
        }
    }

    pub fn is_error(&self) -> bool {
        match self {
            Type::Error => true,
            Type::List(item) => item.is_error(),
            Type::Function { params, returns } => {
                params.iter().any(Type::is_error) || returns.is_error()
            }
            _ => false,
        }
    }

    /// Whether a value of type `self` can be used where `expected` is
    /// required. The error type is compatible with everything.
    pub fn compatible(&self, expected: &Type) -> bool {
        match (self, expected) {
            (Type::Error, _) | (_, Type::Error) => true,
            (Type::List(a), Type::List(b)) => a.compatible(b),
            (
                Type::Function {
                    params: p1,
                    returns: r1,
                },
                Type::Function {
                    params: p2,
                    returns: r2,
                },
            ) => {
                p1.len() == p2.len()
                    && p1.iter().zip(p2).all(|(a, b)| a.compatible(b))
                    && r1.compatible(r2)
            }
            (a, b) => a == b,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Type::Int | Type::Float)
    }

    /// Whether values of this type can be compared with `==`.
    pub fn is_equatable(&self) -> bool {
        match self {
            Type::Function { .. } | Type::Builtin(_) => false,
            Type::List(item) => item.is_equatable(),
            _ => true,
        }
    }

    pub fn scalar(&self) -> Option<ScalarType> {
        match self {
            Type::Int => Some(ScalarType::Int),
            Type::Float => Some(ScalarType::Float),
            Type::Bool => Some(ScalarType::Bool),
            Type::Str => Some(ScalarType::Str),
            _ => None,
        }
    }
}

impl From<ScalarType> for Type {
    fn from(value: ScalarType) -> Self {
        match value {
            ScalarType::Int => Type::Int,
            ScalarType::Float => Type::Float,
            ScalarType::Bool => Type::Bool,
            ScalarType::Str => Type::Str,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::Float => write!(f, "float"),
            Type::Bool => write!(f, "bool"),
            Type::Str => write!(f, "str"),
            Type::Unit => write!(f, "unit"),
            Type::List(item) => write!(f, "[{item}]"),
            Type::Function { params, returns } => {
                write!(f, "fn({}) -> {}", params.iter().join(", "), returns)
            }
            Type::Builtin(builtin) => write!(f, "builtin {}", builtin.name()),
            Type::Error => write!(f, "{{error}}"),
        }
    }
}

/// The target types of a cast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarType {
    Int,
    Float,
    Bool,
    Str,
}

impl ScalarType {
    pub const fn name(self) -> &'static str {
        match self {
            ScalarType::Int => "int",
            ScalarType::Float => "float",
            ScalarType::Bool => "bool",
            ScalarType::Str => "str",
        }
    }

    pub fn from_name(name: &str) -> Option<ScalarType> {
        match name {
            "int" => Some(ScalarType::Int),
            "float" => Some(ScalarType::Float),
            "bool" => Some(ScalarType::Bool),
            "str" => Some(ScalarType::Str),
            _ => None,
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_display() {
        let ty = Type::function(vec![Type::Int, Type::list(Type::Str)], Type::Unit);
        assert_eq!(ty.to_string(), "fn(int, [str]) -> unit");
    }

    #[test]
    fn error_type_is_compatible() {
        assert!(Type::Error.compatible(&Type::Int));
        assert!(Type::list(Type::Error).compatible(&Type::list(Type::Bool)));
        assert!(!Type::Int.compatible(&Type::Float));
    }
}
