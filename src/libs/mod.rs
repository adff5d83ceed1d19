//! The builtin functions.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::compiler::typing::Type;

mod builtin;

pub(crate) use builtin::call_builtin;

/// A builtin function. Builtins live in the prelude scope, the outermost
/// scope of every program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Builtin {
    /// `print(any) -> unit`
    Print,
    /// `len([T] | str) -> int`
    Len,
    /// `arg(int) -> str`, the i-th run input.
    Arg,
    /// `arg_count() -> int`
    ArgCount,
    /// `push([T], T) -> [T]`, a new list with the item appended.
    Push,
}

impl Builtin {
    pub const ALL: [Builtin; 5] = [
        Builtin::Print,
        Builtin::Len,
        Builtin::Arg,
        Builtin::ArgCount,
        Builtin::Push,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Builtin::Print => "print",
            Builtin::Len => "len",
            Builtin::Arg => "arg",
            Builtin::ArgCount => "arg_count",
            Builtin::Push => "push",
        }
    }

    pub fn from_name(name: &str) -> Option<Builtin> {
        Builtin::ALL.into_iter().find(|builtin| builtin.name() == name)
    }

    pub const fn arity(self) -> usize {
        match self {
            Builtin::ArgCount => 0,
            Builtin::Print | Builtin::Len | Builtin::Arg => 1,
            Builtin::Push => 2,
        }
    }

    /// The result type when the argument types are unknown.
    pub fn returns(self) -> Type {
        match self {
            Builtin::Print => Type::Unit,
            Builtin::Len | Builtin::ArgCount => Type::Int,
            Builtin::Arg => Type::Str,
            Builtin::Push => Type::Error,
        }
    }
}

impl fmt::Display for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
