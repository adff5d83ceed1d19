//! The error types.

use thiserror::Error;

use crate::compiler::{code::VerifyError, diagnostic::Diagnostics};

/// Kind of RuntimeError.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeErrorKind {
    #[error("division by zero")]
    DivisionByZero,
    #[error("negative exponent {0}")]
    NegativeExponent(i64),
    #[error("can not cast {value} to {target}")]
    InvalidCast { value: String, target: &'static str },
    #[error("index out of range (index {index}, length {len})")]
    IndexOutOfRange { index: i64, len: usize },
    #[error("operator `{operator}` can not be applied to {ty}")]
    InvalidOperand { operator: &'static str, ty: &'static str },
    #[error("wrong number of arguments (expected {expected}, found {found})")]
    ArityMismatch { expected: usize, found: usize },
    #[error("call stack exhausted (max depth {0})")]
    StackExhausted(usize),
    #[error("instruction budget exceeded")]
    BudgetExceeded,
    #[error("cancelled")]
    Cancelled,
    #[error("operand stack underflow")]
    StackUnderflow,
    #[error("output error ({0})")]
    Output(String),
}

/// A runtime fault, with the instruction that raised it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} (in function {function} at {pc})")]
pub struct RuntimeError {
    pub kind: RuntimeErrorKind,
    /// Index of the function.
    pub function: usize,
    /// Offset of the instruction.
    pub pc: usize,
}

impl RuntimeError {
    pub fn new(kind: RuntimeErrorKind, function: usize, pc: usize) -> Self {
        RuntimeError { kind, function, pc }
    }
}

/// Any error of compiling or running a program.
#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Compile(#[from] Diagnostics),
    #[error("invalid program ({0})")]
    Invalid(#[from] VerifyError),
    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),
}
