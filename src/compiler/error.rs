//! The compiler error types.

use std::fmt;

use text_size::TextRange;
use thiserror::Error;

use crate::utils::{EscapeError, Join, Locatable, Location};

use super::{code::VerifyError, token::TokenKind, typing::Type};

/// The lexical rule being matched when a lexical error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LexRule {
    Token,
    Number,
    String,
    BlockComment,
}

impl fmt::Display for LexRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LexRule::Token => "token",
            LexRule::Number => "number literal",
            LexRule::String => "string literal",
            LexRule::BlockComment => "block comment",
        })
    }
}

/// Kind of lexical error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexicalErrorKind {
    #[error("unexpected character {0:?}")]
    UnexpectedChar(char),
    #[error("unterminated string")]
    UnterminatedStr,
    #[error("unterminated block comment")]
    UnterminatedBlockComment,
    #[error("missing digits after the integer base prefix")]
    EmptyInt,
    #[error("expected at least one digit in exponent")]
    EmptyExponent,
    #[error("float literal with a non-decimal base")]
    NonDecimalFloat,
    #[error("integer literal is out of range")]
    IntOutOfRange,
    #[error("invalid digit")]
    InvalidDigit,
    #[error("{0}")]
    Escape(EscapeError),
}

/// The lexical error type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} (in {rule})")]
pub struct LexicalError {
    pub kind: LexicalErrorKind,
    /// The rule being matched.
    pub rule: LexRule,
    pub range: TextRange,
    pub location: Location,
}

impl Locatable for LexicalError {
    fn range(&self) -> TextRange {
        self.range
    }
}

/// The syntax error type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyntaxError {
    #[error(
        "unexpected token (expected {}, found {})",
        .expected.iter().join(", "),
        .found,
    )]
    UnexpectedToken {
        expected: Vec<TokenKind>,
        found: TokenKind,
        range: TextRange,
    },
    #[error("invalid literal ({error})")]
    InvalidLiteral {
        error: LexicalErrorKind,
        range: TextRange,
    },
    #[error("unknown type `{name}`")]
    UnknownType { name: String, range: TextRange },
    #[error("can not cast to {ty}")]
    InvalidCastTarget { ty: Type, range: TextRange },
}

impl Locatable for SyntaxError {
    fn range(&self) -> TextRange {
        match self {
            SyntaxError::UnexpectedToken { range, .. } => *range,
            SyntaxError::InvalidLiteral { range, .. } => *range,
            SyntaxError::UnknownType { range, .. } => *range,
            SyntaxError::InvalidCastTarget { range, .. } => *range,
        }
    }
}

/// Kind of semantic error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SemanticErrorKind {
    #[error("undefined reference to `{name}`")]
    UndefinedReference { name: String },
    #[error("type mismatch (expected {expected}, found {found})")]
    TypeMismatch { expected: Type, found: Type },
    #[error("`{name}` is already declared in this scope")]
    Redeclaration { name: String },
    #[error("wrong number of arguments (expected {expected}, found {found})")]
    ArityMismatch { expected: usize, found: usize },
    #[error("invalid assignment target")]
    InvalidAssignTarget,
    #[error("can not capture local `{name}` of an enclosing function")]
    InvalidCapture { name: String },
    #[error("can not assign to captured variable `{name}`")]
    AssignToCapture { name: String },
    #[error("break outside loop")]
    BreakOutsideLoop,
    #[error("continue outside loop")]
    ContinueOutsideLoop,
    #[error("operator `{operator}` can not be applied to {ty}")]
    InvalidOperand { operator: String, ty: Type },
    #[error("can not infer the type of this expression")]
    CannotInfer,
}

/// The semantic error type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}")]
pub struct SemanticError {
    pub kind: SemanticErrorKind,
    pub range: TextRange,
}

impl SemanticError {
    pub fn new(kind: SemanticErrorKind, range: TextRange) -> Self {
        SemanticError { kind, range }
    }
}

impl Locatable for SemanticError {
    fn range(&self) -> TextRange {
        self.range
    }
}

/// An internal invariant of the compiler was violated. Always fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InternalError {
    #[error("optimizer did not reach a fixed point after {iterations} iterations")]
    OptimizerDiverged { iterations: usize },
    #[error("unresolved identifier reached code generation")]
    Unresolved { range: TextRange },
    #[error("node has no type after analysis")]
    Untyped { range: TextRange },
    #[error("generated program is invalid: {0}")]
    InvalidProgram(#[from] VerifyError),
}

impl Locatable for InternalError {
    fn range(&self) -> TextRange {
        match self {
            InternalError::Unresolved { range } | InternalError::Untyped { range } => *range,
            InternalError::OptimizerDiverged { .. } | InternalError::InvalidProgram(_) => {
                TextRange::default()
            }
        }
    }
}
