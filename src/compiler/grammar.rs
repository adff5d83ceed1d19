//! The grammar definition.
//!
//! Keyword spellings, operator and punctuation symbols, comment delimiters and
//! the binary operator precedence table are data, so the lexer and parser can
//! serve more than one surface syntax. A grammar can be loaded from TOML.
//! Tables missing from the file keep their defaults; keywords missing from
//! `[keywords]` keep their default spelling.
//!
//! ```toml
//! line_comment = "#"
//!
//! [keywords]
//! var = "let"
//! func = "fn"
//! ```

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{
    lexer::{is_id_continue, is_id_start},
    token::{Keyword, Operator, Punct},
};

/// Associativity of a binary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Assoc {
    #[default]
    Left,
    Right,
}

/// Maps a symbol to an operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorRule {
    pub symbol: String,
    pub operator: Operator,
}

/// Maps a symbol to a punctuation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PunctRule {
    pub symbol: String,
    pub punct: Punct,
}

/// Precedence and associativity of a binary operator.
/// Higher precedence binds tighter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryRule {
    pub operator: Operator,
    pub precedence: u8,
    #[serde(default)]
    pub assoc: Assoc,
}

/// A grammar definition.
///
/// Fields missing from a grammar file keep their default value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Grammar {
    /// Keyword spellings.
    pub keywords: IndexMap<String, Keyword>,
    /// Operator symbols. Symbols made of identifier characters are word
    /// operators (e.g. `and`).
    pub operators: Vec<OperatorRule>,
    /// Punctuation symbols.
    pub punctuation: Vec<PunctRule>,
    /// The binary operator table.
    pub binary: Vec<BinaryRule>,
    /// Prefix operators.
    pub unary: Vec<Operator>,
    /// Precedence of prefix operators.
    pub unary_precedence: u8,
    /// Precedence of the postfix cast (`expr as type`).
    pub cast_precedence: u8,
    pub line_comment: Option<String>,
    pub block_comment: Option<(String, String)>,
}

/// The error raised by an invalid grammar.
#[derive(Debug, Error)]
pub enum GrammarError {
    #[error("read grammar file error: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse grammar file error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("keyword {0} has no spelling")]
    MissingKeyword(Keyword),
    #[error("punctuation {0:?} has no symbol")]
    MissingPunct(Punct),
    #[error("operator {0:?} has no symbol")]
    MissingOperator(Operator),
    #[error("symbol `{0}` is defined more than once")]
    DuplicateSymbol(String),
    #[error("`{0}` is not a valid keyword spelling")]
    InvalidKeyword(String),
    #[error("`{0}` is not a valid symbol")]
    InvalidSymbol(String),
    #[error("operator {0:?} is listed twice in the binary table")]
    DuplicateBinary(Operator),
    #[error("operator {0:?} can not be a prefix operator")]
    InvalidUnary(Operator),
    #[error("binary operator {0:?} can not have precedence 0")]
    ZeroPrecedence(Operator),
}

impl Default for Grammar {
    fn default() -> Self {
        use Operator::*;
        let keywords = Keyword::ALL
            .iter()
            .map(|kw| (kw.name().to_owned(), *kw))
            .collect();
        let operators = [
            Add, Sub, Mul, Div, Rem, Pow, Eq, Ne, Lt, Le, Gt, Ge, And, Or, Not, Assign,
        ]
        .into_iter()
        .map(|operator| OperatorRule {
            symbol: operator.name().to_owned(),
            operator,
        })
        .collect();
        let punctuation = [
            Punct::OpenParen,
            Punct::CloseParen,
            Punct::OpenBrace,
            Punct::CloseBrace,
            Punct::OpenBracket,
            Punct::CloseBracket,
            Punct::Comma,
            Punct::Semicolon,
            Punct::Colon,
            Punct::Arrow,
        ]
        .into_iter()
        .map(|punct| PunctRule {
            symbol: punct.name().to_owned(),
            punct,
        })
        .collect();
        let binary = [
            (Assign, 1, Assoc::Right),
            (Or, 2, Assoc::Left),
            (And, 3, Assoc::Left),
            (Eq, 4, Assoc::Left),
            (Ne, 4, Assoc::Left),
            (Lt, 5, Assoc::Left),
            (Le, 5, Assoc::Left),
            (Gt, 5, Assoc::Left),
            (Ge, 5, Assoc::Left),
            (Add, 6, Assoc::Left),
            (Sub, 6, Assoc::Left),
            (Mul, 7, Assoc::Left),
            (Div, 7, Assoc::Left),
            (Rem, 7, Assoc::Left),
            (Pow, 11, Assoc::Right),
        ]
        .into_iter()
        .map(|(operator, precedence, assoc)| BinaryRule {
            operator,
            precedence,
            assoc,
        })
        .collect();
        let mut grammar = Grammar {
            keywords,
            operators,
            punctuation,
            binary,
            unary: vec![Sub, Not],
            unary_precedence: 10,
            cast_precedence: 9,
            line_comment: Some("//".to_owned()),
            block_comment: Some(("/*".to_owned(), "*/".to_owned())),
        };
        grammar.sort_symbols();
        grammar
    }
}

impl Grammar {
    /// Parses and validates a grammar from TOML text.
    pub fn from_toml(text: &str) -> Result<Self, GrammarError> {
        let mut grammar: Grammar = toml::from_str(text)?;
        grammar.fill_keywords();
        grammar.validate()
    }

    /// Reads, parses and validates a grammar file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, GrammarError> {
        Self::from_toml(&fs::read_to_string(path)?)
    }

    /// Checks the grammar is usable and sorts symbols for longest-match
    /// lexing.
    pub fn validate(mut self) -> Result<Self, GrammarError> {
        for kw in Keyword::ALL {
            if !self.keywords.values().any(|k| *k == kw) {
                return Err(GrammarError::MissingKeyword(kw));
            }
        }
        for spelling in self.keywords.keys() {
            if !is_word(spelling) {
                return Err(GrammarError::InvalidKeyword(spelling.clone()));
            }
        }
        for punct in [
            Punct::OpenParen,
            Punct::CloseParen,
            Punct::OpenBrace,
            Punct::CloseBrace,
            Punct::OpenBracket,
            Punct::CloseBracket,
            Punct::Comma,
            Punct::Semicolon,
            Punct::Colon,
            Punct::Arrow,
        ] {
            if !self.punctuation.iter().any(|rule| rule.punct == punct) {
                return Err(GrammarError::MissingPunct(punct));
            }
        }

        let mut symbols: Vec<&str> = self.keywords.keys().map(String::as_str).collect();
        for symbol in self
            .operators
            .iter()
            .map(|rule| rule.symbol.as_str())
            .chain(self.punctuation.iter().map(|rule| rule.symbol.as_str()))
        {
            if symbol.is_empty()
                || symbol.chars().any(char::is_whitespace)
                || symbol.starts_with(|c: char| c.is_ascii_digit() || c == '"' || c == '\'')
                || (symbol.starts_with(is_id_start) && !is_word(symbol))
            {
                return Err(GrammarError::InvalidSymbol(symbol.to_owned()));
            }
            if symbols.contains(&symbol) {
                return Err(GrammarError::DuplicateSymbol(symbol.to_owned()));
            }
            symbols.push(symbol);
        }

        for (i, rule) in self.binary.iter().enumerate() {
            if self.binary[..i].iter().any(|r| r.operator == rule.operator) {
                return Err(GrammarError::DuplicateBinary(rule.operator));
            }
            if rule.precedence == 0 {
                return Err(GrammarError::ZeroPrecedence(rule.operator));
            }
            if rule.operator == Operator::Not {
                return Err(GrammarError::InvalidUnary(Operator::Not));
            }
        }
        for op in &self.unary {
            if !matches!(op, Operator::Sub | Operator::Not) {
                return Err(GrammarError::InvalidUnary(*op));
            }
        }
        for op in self
            .binary
            .iter()
            .map(|rule| rule.operator)
            .chain(self.unary.iter().copied())
        {
            if !self.operators.iter().any(|rule| rule.operator == op) {
                return Err(GrammarError::MissingOperator(op));
            }
        }

        self.sort_symbols();
        Ok(self)
    }

    /// Orders operator and punctuation symbols longest first.
    fn sort_symbols(&mut self) {
        self.operators
            .sort_by(|a, b| b.symbol.len().cmp(&a.symbol.len()));
        self.punctuation
            .sort_by(|a, b| b.symbol.len().cmp(&a.symbol.len()));
    }

    /// Gives every keyword missing from the table its default spelling,
    /// unless that spelling is taken.
    fn fill_keywords(&mut self) {
        for kw in Keyword::ALL {
            if !self.keywords.values().any(|k| *k == kw) && !self.keywords.contains_key(kw.name()) {
                self.keywords.insert(kw.name().to_owned(), kw);
            }
        }
    }

    /// Looks up a keyword or word operator spelled `word`.
    pub fn word(&self, word: &str) -> Option<Word> {
        if let Some(kw) = self.keywords.get(word) {
            return Some(Word::Keyword(*kw));
        }
        self.operators
            .iter()
            .find(|rule| rule.symbol == word)
            .map(|rule| Word::Operator(rule.operator))
    }

    /// The binary rule of `operator`, if it is a binary operator.
    pub fn binary_rule(&self, operator: Operator) -> Option<BinaryRule> {
        self.binary
            .iter()
            .find(|rule| rule.operator == operator)
            .copied()
    }

    pub fn is_unary(&self, operator: Operator) -> bool {
        self.unary.contains(&operator)
    }

    /// The spelling of `keyword` in this grammar.
    pub fn keyword_spelling(&self, keyword: Keyword) -> &str {
        self.keywords
            .iter()
            .find(|(_, kw)| **kw == keyword)
            .map_or(keyword.name(), |(spelling, _)| spelling.as_str())
    }
}

/// A word that is not an identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Word {
    Keyword(Keyword),
    Operator(Operator),
}

fn is_word(s: &str) -> bool {
    let mut chars = s.chars();
    chars.next().is_some_and(is_id_start) && chars.all(is_id_continue)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_grammar_is_valid() {
        let grammar = Grammar::default().validate().unwrap();
        assert_eq!(grammar.operators[0].symbol.len(), 2);
        assert_eq!(
            grammar.binary_rule(Operator::Pow).map(|rule| rule.assoc),
            Some(Assoc::Right)
        );
    }

    #[test]
    fn grammar_from_toml() {
        let mut text = toml::to_string(&Grammar::default()).unwrap();
        text = text.replace("[keywords]\nlet = \"let\"", "[keywords]\nvar = \"let\"");
        let grammar = Grammar::from_toml(&text).unwrap();
        assert_eq!(grammar.word("var"), Some(Word::Keyword(Keyword::Let)));
        assert_eq!(grammar.word("let"), None);
    }

    #[test]
    fn grammar_from_partial_toml() {
        let grammar = Grammar::from_toml("line_comment = \"#\"\n\n[keywords]\nvar = \"let\"\nfunc = \"fn\"\n").unwrap();
        assert_eq!(grammar.word("var"), Some(Word::Keyword(Keyword::Let)));
        assert_eq!(grammar.word("func"), Some(Word::Keyword(Keyword::Fn)));
        assert_eq!(grammar.word("let"), None);
        assert_eq!(grammar.word("while"), Some(Word::Keyword(Keyword::While)));
        assert_eq!(grammar.line_comment.as_deref(), Some("#"));
        assert_eq!(grammar.binary, Grammar::default().binary);

        let grammar = Grammar::from_toml("[keywords]\nvar = \"let\"\n").unwrap();
        assert_eq!(grammar.word("var"), Some(Word::Keyword(Keyword::Let)));
    }

    #[test]
    fn default_grammar_orders_symbols_longest_first() {
        let grammar = Grammar::default();
        assert_eq!(grammar, grammar.clone().validate().unwrap());
    }

    #[test]
    fn grammar_rejects_duplicate_symbols() {
        let mut grammar = Grammar::default();
        grammar.operators.push(OperatorRule {
            symbol: "+".to_owned(),
            operator: Operator::Sub,
        });
        assert!(matches!(
            grammar.validate(),
            Err(GrammarError::DuplicateSymbol(_))
        ));
    }
}
