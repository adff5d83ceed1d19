//! The token.

use std::fmt;

use serde::{Deserialize, Serialize};
use text_size::TextRange;

use crate::utils::Location;

/// A token produced by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub range: TextRange,
    /// Location of the first character of the token.
    pub location: Location,
}

impl Token {
    pub const fn new(kind: TokenKind, range: TextRange, location: Location) -> Self {
        Token {
            kind,
            range,
            location,
        }
    }

    /// The lexeme of this token in `input`.
    pub fn lexeme<'a>(&self, input: &'a str) -> &'a str {
        &input[self.range]
    }
}

/// Kind of token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// An identifier.
    Ident,
    /// A literal.
    Lit(LitKind),
    /// An operator, e.g. "+".
    Operator(Operator),
    /// A keyword, e.g. "let".
    Keyword(Keyword),
    /// A punctuation, e.g. "(".
    Punct(Punct),
    /// End of input.
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Ident => write!(f, "identifier"),
            TokenKind::Lit(kind) => write!(f, "{kind} literal"),
            TokenKind::Operator(op) => write!(f, "operator `{op}`"),
            TokenKind::Keyword(kw) => write!(f, "keyword `{kw}`"),
            TokenKind::Punct(p) => write!(f, "`{p}`"),
            TokenKind::Eof => write!(f, "end of input"),
        }
    }
}

/// Kind of literal token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LitKind {
    Int,
    Float,
    Str,
}

impl fmt::Display for LitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LitKind::Int => "int",
            LitKind::Float => "float",
            LitKind::Str => "string",
        })
    }
}

/// Keywords. The spelling of each keyword is defined by the grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Keyword {
    Let,
    Fn,
    If,
    Else,
    While,
    Loop,
    Break,
    Continue,
    Return,
    True,
    False,
    As,
}

impl Keyword {
    pub const ALL: [Keyword; 12] = [
        Keyword::Let,
        Keyword::Fn,
        Keyword::If,
        Keyword::Else,
        Keyword::While,
        Keyword::Loop,
        Keyword::Break,
        Keyword::Continue,
        Keyword::Return,
        Keyword::True,
        Keyword::False,
        Keyword::As,
    ];

    /// The default spelling.
    pub const fn name(self) -> &'static str {
        match self {
            Keyword::Let => "let",
            Keyword::Fn => "fn",
            Keyword::If => "if",
            Keyword::Else => "else",
            Keyword::While => "while",
            Keyword::Loop => "loop",
            Keyword::Break => "break",
            Keyword::Continue => "continue",
            Keyword::Return => "return",
            Keyword::True => "true",
            Keyword::False => "false",
            Keyword::As => "as",
        }
    }

    /// Keywords that can start a statement, used for error recovery.
    pub const fn starts_stmt(self) -> bool {
        matches!(
            self,
            Keyword::Let
                | Keyword::Fn
                | Keyword::If
                | Keyword::While
                | Keyword::Loop
                | Keyword::Break
                | Keyword::Continue
                | Keyword::Return
        )
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Operators. The spelling, precedence and associativity of each operator
/// are defined by the grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Not,
    Assign,
}

impl Operator {
    /// The default spelling.
    pub const fn name(self) -> &'static str {
        match self {
            Operator::Add => "+",
            Operator::Sub => "-",
            Operator::Mul => "*",
            Operator::Div => "/",
            Operator::Rem => "%",
            Operator::Pow => "**",
            Operator::Eq => "==",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::And => "&&",
            Operator::Or => "||",
            Operator::Not => "!",
            Operator::Assign => "=",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Punctuation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Punct {
    OpenParen,
    CloseParen,
    OpenBrace,
    CloseBrace,
    OpenBracket,
    CloseBracket,
    Comma,
    Semicolon,
    Colon,
    Arrow,
}

impl Punct {
    /// The default spelling.
    pub const fn name(self) -> &'static str {
        match self {
            Punct::OpenParen => "(",
            Punct::CloseParen => ")",
            Punct::OpenBrace => "{",
            Punct::CloseBrace => "}",
            Punct::OpenBracket => "[",
            Punct::CloseBracket => "]",
            Punct::Comma => ",",
            Punct::Semicolon => ";",
            Punct::Colon => ":",
            Punct::Arrow => "->",
        }
    }
}

impl fmt::Display for Punct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
