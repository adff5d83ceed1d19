//! The lexer.

use std::{num::IntErrorKind, str::Chars};

use text_size::{TextRange, TextSize};

use crate::utils::{unescape_str, Location};

use super::{
    error::{LexRule, LexicalError, LexicalErrorKind},
    grammar::{Grammar, Word},
    token::{LitKind, Token, TokenKind},
};

/// What the lexer does after a lexical error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LexerRecovery {
    /// Stop after the first error.
    #[default]
    Halt,
    /// Skip to the next whitespace or punctuation boundary and continue.
    Skip,
}

/// Peekable iterator over a char sequence.
///
/// Next characters can be peeked via `first` method,
/// and position can be shifted forward via `bump` method.
#[derive(Clone)]
struct Cursor<'a> {
    /// The input string.
    input: &'a str,
    /// Iterator over chars. Slightly faster than a &str.
    chars: Chars<'a>,
    lineno: u32,
    column: u32,
    #[cfg(debug_assertions)]
    prev: char,
}

const EOF_CHAR: char = '\0';

impl<'a> Cursor<'a> {
    fn new(input: &'a str) -> Cursor<'a> {
        Cursor {
            input,
            chars: input.chars(),
            lineno: 1,
            column: 1,
            #[cfg(debug_assertions)]
            prev: EOF_CHAR,
        }
    }

    /// Returns the last eaten symbol (or `'\0'` in release builds).
    /// (For debug assertions only.)
    fn prev(&self) -> char {
        #[cfg(debug_assertions)]
        {
            self.prev
        }

        #[cfg(not(debug_assertions))]
        {
            EOF_CHAR
        }
    }

    /// Peeks the next symbol from the input stream without consuming it.
    /// If requested position doesn't exist, `EOF_CHAR` is returned.
    /// However, getting `EOF_CHAR` doesn't always mean actual end of file,
    /// it should be checked with `is_eof` method.
    fn first(&self) -> char {
        // `.next()` optimizes better than `.nth(0)`
        self.chars.clone().next().unwrap_or(EOF_CHAR)
    }

    /// Peeks the second symbol from the input stream without consuming it.
    fn second(&self) -> char {
        // `.next()` optimizes better than `.nth(1)`
        let mut iter = self.chars.clone();
        iter.next();
        iter.next().unwrap_or(EOF_CHAR)
    }

    /// The input not consumed yet.
    fn rest(&self) -> &'a str {
        self.chars.as_str()
    }

    /// Checks if there is nothing more to consume.
    fn is_eof(&self) -> bool {
        self.chars.as_str().is_empty()
    }

    /// Returns position of cursor.
    fn pos(&self) -> TextSize {
        let pos = self.input.len() - self.chars.as_str().len();
        TextSize::from(u32::try_from(pos).unwrap_or(u32::MAX))
    }

    /// Returns location of cursor.
    fn location(&self) -> Location {
        Location {
            lineno: self.lineno,
            column: self.column,
            offset: self.pos().into(),
        }
    }

    /// Moves to the next character.
    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.lineno += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }

        #[cfg(debug_assertions)]
        {
            self.prev = c;
        }

        Some(c)
    }

    /// Eats `s` if the rest of the input starts with it.
    fn eat_str(&mut self, s: &str) -> bool {
        if !s.is_empty() && self.rest().starts_with(s) {
            for _ in s.chars() {
                self.bump();
            }
            true
        } else {
            false
        }
    }

    /// Eats symbols while predicate returns true or until the end of file is reached.
    fn eat_while(&mut self, mut predicate: impl FnMut(char) -> bool) {
        while predicate(self.first()) && !self.is_eof() {
            self.bump();
        }
    }
}

/// A lazy, single-pass iterator of tokens over the input string.
///
/// Whitespace and comments are elided. The last item is always an
/// end-of-input token, unless lexing halted on an error.
#[derive(Clone)]
pub struct Lexer<'a> {
    grammar: &'a Grammar,
    cursor: Cursor<'a>,
    recovery: LexerRecovery,
    done: bool,
}

/// Creates an iterator that produces tokens from the input string.
pub fn tokenize<'a>(input: &'a str, grammar: &'a Grammar, recovery: LexerRecovery) -> Lexer<'a> {
    Lexer::new(input, grammar, recovery)
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str, grammar: &'a Grammar, recovery: LexerRecovery) -> Self {
        Lexer {
            grammar,
            cursor: Cursor::new(input),
            recovery,
            done: false,
        }
    }

    /// Rewinds the lexer to the start of the input.
    pub fn restart(&mut self) {
        self.cursor = Cursor::new(self.cursor.input);
        self.done = false;
    }

    pub fn input(&self) -> &'a str {
        self.cursor.input
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Token, LexicalError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = self.advance_token();
        match &item {
            Ok(token) if token.kind == TokenKind::Eof => self.done = true,
            Ok(_) => (),
            Err(_) => match self.recovery {
                LexerRecovery::Halt => self.done = true,
                LexerRecovery::Skip => self.skip_to_boundary(),
            },
        }
        Some(item)
    }
}

/// True if `c` is considered a whitespace.
pub fn is_whitespace(c: char) -> bool {
    // This is Pattern_White_Space.
    //
    // Note that this set is stable (ie, it doesn't change with different
    // Unicode versions), so it's ok to just hard-code the values.

    matches!(
        c,
        // Usual ASCII suspects
        '\u{0009}'   // \t
        | '\u{000A}' // \n
        | '\u{000B}' // vertical tab
        | '\u{000C}' // form feed
        | '\u{000D}' // \r
        | '\u{0020}' // space

        // NEXT LINE from latin1
        | '\u{0085}'

        // Bidi markers
        | '\u{200E}' // LEFT-TO-RIGHT MARK
        | '\u{200F}' // RIGHT-TO-LEFT MARK

        // Dedicated whitespace characters from Unicode
        | '\u{2028}' // LINE SEPARATOR
        | '\u{2029}' // PARAGRAPH SEPARATOR
    )
}

/// True if `c` is valid as a first character of an identifier.
pub fn is_id_start(c: char) -> bool {
    // This is XID_Start OR '_' (which formally is not a XID_Start).
    c == '_' || unicode_ident::is_xid_start(c)
}

/// True if `c` is valid as a non-first character of an identifier.
pub fn is_id_continue(c: char) -> bool {
    unicode_ident::is_xid_continue(c)
}

/// Base of numeric literal encoding according to its prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Base {
    /// Literal starts with "0b".
    Binary = 2,
    /// Literal starts with "0o".
    Octal = 8,
    /// Literal doesn't contain a prefix.
    Decimal = 10,
    /// Literal starts with "0x".
    Hexadecimal = 16,
}

/// Parses the text of an int literal token.
pub fn parse_int(text: &str) -> Result<i64, LexicalErrorKind> {
    let mut s = text.to_owned();
    s.retain(|c| c != '_');
    let base = match s.as_bytes() {
        [b'0', b'x', ..] => Base::Hexadecimal,
        [b'0', b'o', ..] => Base::Octal,
        [b'0', b'b', ..] => Base::Binary,
        _ => Base::Decimal,
    };
    let digits = &s[if base != Base::Decimal { 2 } else { 0 }..];
    i64::from_str_radix(digits, base as u32).map_err(|e| match e.kind() {
        IntErrorKind::Empty => LexicalErrorKind::EmptyInt,
        IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => LexicalErrorKind::IntOutOfRange,
        _ => LexicalErrorKind::InvalidDigit,
    })
}

/// Parses the text of a float literal token.
pub fn parse_float(text: &str) -> Result<f64, LexicalErrorKind> {
    let mut s = text.to_owned();
    s.retain(|c| c != '_');
    s.parse::<f64>().map_err(|_| LexicalErrorKind::InvalidDigit)
}

/// Parses the text of a string literal token, quotes included.
pub fn parse_str(text: &str) -> Result<String, LexicalErrorKind> {
    let body = text
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .ok_or(LexicalErrorKind::UnterminatedStr)?;
    unescape_str(body).map_err(LexicalErrorKind::Escape)
}

impl Lexer<'_> {
    /// Parses a token from the input string.
    fn advance_token(&mut self) -> Result<Token, LexicalError> {
        self.skip_trivia()?;
        let start = self.cursor.pos();
        let location = self.cursor.location();
        let first_char = self.cursor.first();
        if self.cursor.is_eof() {
            return Ok(Token::new(TokenKind::Eof, TextRange::empty(start), location));
        }
        let kind = match first_char {
            // Identifier, keyword or word operator.
            c if is_id_start(c) => {
                self.cursor.bump();
                self.ident_or_word(start)
            }

            // Numeric literal.
            c @ '0'..='9' => {
                self.cursor.bump();
                self.number(c)
                    .map_err(|kind| self.error(kind, LexRule::Number, start, location))?
            }

            // String literal.
            '"' => {
                self.cursor.bump();
                self.string()
                    .map_err(|kind| self.error(kind, LexRule::String, start, location))?
            }

            // Operator or punctuation.
            c => match self.symbol() {
                Some(kind) => kind,
                None => {
                    self.cursor.bump();
                    return Err(self.error(
                        LexicalErrorKind::UnexpectedChar(c),
                        LexRule::Token,
                        start,
                        location,
                    ));
                }
            },
        };
        let end = self.cursor.pos();
        Ok(Token::new(kind, TextRange::new(start, end), location))
    }

    fn error(
        &self,
        kind: LexicalErrorKind,
        rule: LexRule,
        start: TextSize,
        location: Location,
    ) -> LexicalError {
        LexicalError {
            kind,
            rule,
            range: TextRange::new(start, self.cursor.pos()),
            location,
        }
    }

    /// Skips whitespace and comments.
    fn skip_trivia(&mut self) -> Result<(), LexicalError> {
        let grammar = self.grammar;
        loop {
            if is_whitespace(self.cursor.first()) && !self.cursor.is_eof() {
                self.cursor.eat_while(is_whitespace);
                continue;
            }
            if let Some(line_comment) = &grammar.line_comment {
                if self.cursor.eat_str(line_comment) {
                    self.cursor.eat_while(|c| c != '\n');
                    continue;
                }
            }
            if let Some((open, close)) = &grammar.block_comment {
                let start = self.cursor.pos();
                let location = self.cursor.location();
                if self.cursor.eat_str(open) {
                    if !self.block_comment(open, close) {
                        return Err(self.error(
                            LexicalErrorKind::UnterminatedBlockComment,
                            LexRule::BlockComment,
                            start,
                            location,
                        ));
                    }
                    continue;
                }
            }
            return Ok(());
        }
    }

    /// Eats a nestable block comment after its opening delimiter. Returns
    /// false if the comment is not closed.
    fn block_comment(&mut self, open: &str, close: &str) -> bool {
        let mut depth = 1usize;
        while !self.cursor.is_eof() {
            if self.cursor.eat_str(close) {
                depth -= 1;
                if depth == 0 {
                    // This block comment is closed, so for a construction like "/* */ */"
                    // there will be a successfully parsed block comment "/* */"
                    // and " */" will be processed separately.
                    return true;
                }
            } else if self.cursor.eat_str(open) {
                depth += 1;
            } else {
                self.cursor.bump();
            }
        }
        false
    }

    fn ident_or_word(&mut self, start: TextSize) -> TokenKind {
        debug_assert!(is_id_start(self.cursor.prev()));
        self.cursor.eat_while(is_id_continue);
        let range = TextRange::new(start, self.cursor.pos());
        match self.grammar.word(&self.cursor.input[range]) {
            Some(Word::Keyword(kw)) => TokenKind::Keyword(kw),
            Some(Word::Operator(op)) => TokenKind::Operator(op),
            None => TokenKind::Ident,
        }
    }

    /// Longest match over the operator and punctuation symbols of the grammar.
    fn symbol(&mut self) -> Option<TokenKind> {
        let grammar = self.grammar;
        let rest = self.cursor.rest();
        let operator = grammar
            .operators
            .iter()
            .filter(|rule| !rule.symbol.starts_with(is_id_start))
            .filter(|rule| rest.starts_with(rule.symbol.as_str()))
            .max_by_key(|rule| rule.symbol.len());
        let punct = grammar
            .punctuation
            .iter()
            .filter(|rule| rest.starts_with(rule.symbol.as_str()))
            .max_by_key(|rule| rule.symbol.len());
        let (symbol, kind) = match (operator, punct) {
            (Some(o), Some(p)) if p.symbol.len() > o.symbol.len() => {
                (p.symbol.as_str(), TokenKind::Punct(p.punct))
            }
            (Some(o), _) => (o.symbol.as_str(), TokenKind::Operator(o.operator)),
            (None, Some(p)) => (p.symbol.as_str(), TokenKind::Punct(p.punct)),
            (None, None) => return None,
        };
        self.cursor.eat_str(symbol);
        Some(kind)
    }

    fn number(&mut self, first_digit: char) -> Result<TokenKind, LexicalErrorKind> {
        debug_assert!(self.cursor.prev().is_ascii_digit());
        let start = self.cursor.pos() - TextSize::of(first_digit);
        let mut base = Base::Decimal;
        if first_digit == '0' {
            // Attempt to parse encoding base.
            match self.cursor.first() {
                'b' => {
                    base = Base::Binary;
                    self.cursor.bump();
                    if !self.eat_decimal_digits() {
                        return Err(LexicalErrorKind::EmptyInt);
                    }
                }
                'o' => {
                    base = Base::Octal;
                    self.cursor.bump();
                    if !self.eat_decimal_digits() {
                        return Err(LexicalErrorKind::EmptyInt);
                    }
                }
                'x' => {
                    base = Base::Hexadecimal;
                    self.cursor.bump();
                    if !self.eat_hexadecimal_digits() {
                        return Err(LexicalErrorKind::EmptyInt);
                    }
                }
                // Not a base prefix; consume additional digits.
                '0'..='9' | '_' => {
                    self.eat_decimal_digits();
                }
                _ => (),
            }
        } else {
            // No base prefix, parse number in the usual way.
            self.eat_decimal_digits();
        };

        let is_float = match self.cursor.first() {
            // A fraction must start with a digit, so `1.x` is not a float.
            '.' if self.cursor.second().is_ascii_digit() => {
                self.cursor.bump();
                self.eat_decimal_digits();
                if matches!(self.cursor.first(), 'e' | 'E') {
                    self.cursor.bump();
                    if !self.eat_float_exponent() {
                        return Err(LexicalErrorKind::EmptyExponent);
                    }
                }
                true
            }
            'e' | 'E' if base == Base::Decimal => {
                self.cursor.bump();
                if !self.eat_float_exponent() {
                    return Err(LexicalErrorKind::EmptyExponent);
                }
                true
            }
            _ => false,
        };
        if is_id_continue(self.cursor.first()) {
            self.cursor.eat_while(is_id_continue);
            return Err(LexicalErrorKind::InvalidDigit);
        }

        let text = &self.cursor.input[TextRange::new(start, self.cursor.pos())];
        if is_float {
            if base != Base::Decimal {
                return Err(LexicalErrorKind::NonDecimalFloat);
            }
            parse_float(text)?;
            Ok(TokenKind::Lit(LitKind::Float))
        } else {
            parse_int(text)?;
            Ok(TokenKind::Lit(LitKind::Int))
        }
    }

    fn string(&mut self) -> Result<TokenKind, LexicalErrorKind> {
        debug_assert!(self.cursor.prev() == '"');
        let start = self.cursor.pos() - TextSize::of('"');
        loop {
            match self.cursor.bump() {
                Some('"') => break,
                Some('\\') => {
                    // Bump again to skip escaped character.
                    self.cursor.bump();
                }
                Some(_) => (),
                // End of file reached.
                None => return Err(LexicalErrorKind::UnterminatedStr),
            }
        }
        parse_str(&self.cursor.input[TextRange::new(start, self.cursor.pos())])?;
        Ok(TokenKind::Lit(LitKind::Str))
    }

    fn eat_decimal_digits(&mut self) -> bool {
        let mut has_digits = false;
        loop {
            match self.cursor.first() {
                '_' => {
                    self.cursor.bump();
                }
                '0'..='9' => {
                    has_digits = true;
                    self.cursor.bump();
                }
                _ => break,
            }
        }
        has_digits
    }

    fn eat_hexadecimal_digits(&mut self) -> bool {
        let mut has_digits = false;
        loop {
            match self.cursor.first() {
                '_' => {
                    self.cursor.bump();
                }
                '0'..='9' | 'a'..='f' | 'A'..='F' => {
                    has_digits = true;
                    self.cursor.bump();
                }
                _ => break,
            }
        }
        has_digits
    }

    /// Eats the float exponent. Returns true if at least one digit was met,
    /// and returns false otherwise.
    fn eat_float_exponent(&mut self) -> bool {
        debug_assert!(self.cursor.prev() == 'e' || self.cursor.prev() == 'E');
        if self.cursor.first() == '-' || self.cursor.first() == '+' {
            self.cursor.bump();
        }
        self.eat_decimal_digits()
    }

    /// Skips to the next whitespace or punctuation boundary.
    fn skip_to_boundary(&mut self) {
        while !self.cursor.is_eof()
            && !is_whitespace(self.cursor.first())
            && !self
                .grammar
                .punctuation
                .iter()
                .any(|rule| self.cursor.rest().starts_with(rule.symbol.as_str()))
        {
            self.cursor.bump();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::token::{Keyword, Operator, Punct};

    fn kinds(input: &str) -> Vec<TokenKind> {
        let grammar = Grammar::default();
        tokenize(input, &grammar, LexerRecovery::Halt)
            .map(|token| token.unwrap().kind)
            .collect()
    }

    #[test]
    fn lex_let_statement() {
        assert_eq!(
            kinds("let x = 1 ** 2.5; // done"),
            vec![
                TokenKind::Keyword(Keyword::Let),
                TokenKind::Ident,
                TokenKind::Operator(Operator::Assign),
                TokenKind::Lit(LitKind::Int),
                TokenKind::Operator(Operator::Pow),
                TokenKind::Lit(LitKind::Float),
                TokenKind::Punct(Punct::Semicolon),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lex_arithmetic() {
        assert_eq!(
            kinds("1 + 2 * 3"),
            vec![
                TokenKind::Lit(LitKind::Int),
                TokenKind::Operator(Operator::Add),
                TokenKind::Lit(LitKind::Int),
                TokenKind::Operator(Operator::Mul),
                TokenKind::Lit(LitKind::Int),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lex_multi_char_operators() {
        assert_eq!(
            kinds("a <= b ** c >= d"),
            vec![
                TokenKind::Ident,
                TokenKind::Operator(Operator::Le),
                TokenKind::Ident,
                TokenKind::Operator(Operator::Pow),
                TokenKind::Ident,
                TokenKind::Operator(Operator::Ge),
                TokenKind::Ident,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lex_longest_match_in_any_order() {
        let mut grammar = Grammar::default();
        grammar.operators.reverse();
        grammar.punctuation.reverse();
        let kinds: Vec<_> = tokenize("x**2<=y", &grammar, LexerRecovery::Halt)
            .map(|token| token.unwrap().kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Ident,
                TokenKind::Operator(Operator::Pow),
                TokenKind::Lit(LitKind::Int),
                TokenKind::Operator(Operator::Le),
                TokenKind::Ident,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lex_longest_match() {
        assert_eq!(
            kinds("a->b<=c/* x /* nested */ */"),
            vec![
                TokenKind::Ident,
                TokenKind::Punct(Punct::Arrow),
                TokenKind::Ident,
                TokenKind::Operator(Operator::Le),
                TokenKind::Ident,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lex_locations() {
        let grammar = Grammar::default();
        let tokens: Vec<_> = tokenize("a\n  bc", &grammar, LexerRecovery::Halt)
            .map(Result::unwrap)
            .collect();
        assert_eq!(tokens[1].location.lineno, 2);
        assert_eq!(tokens[1].location.column, 3);
        assert_eq!(tokens[1].location.offset, 4);
        assert_eq!(tokens[2].kind, TokenKind::Eof);
    }

    #[test]
    fn lex_numbers() {
        assert_eq!(parse_int("0x_ff"), Ok(255));
        assert_eq!(parse_int("1_000"), Ok(1000));
        assert_eq!(
            parse_int("9223372036854775808"),
            Err(LexicalErrorKind::IntOutOfRange)
        );
        assert_eq!(parse_float("1.5e3"), Ok(1500.0));
    }

    #[test]
    fn lex_halt_and_skip() {
        let grammar = Grammar::default();
        let input = "let a = 1 $ 2; let b = 0x; \"open";
        let halted: Vec<_> = tokenize(input, &grammar, LexerRecovery::Halt).collect();
        assert!(halted.last().unwrap().is_err());
        assert_eq!(halted.iter().filter(|t| t.is_err()).count(), 1);

        let skipped: Vec<_> = tokenize(input, &grammar, LexerRecovery::Skip).collect();
        let errors: Vec<_> = skipped
            .iter()
            .filter_map(|t| t.as_ref().err())
            .map(|e| e.kind.clone())
            .collect();
        assert_eq!(
            errors,
            vec![
                LexicalErrorKind::UnexpectedChar('$'),
                LexicalErrorKind::EmptyInt,
                LexicalErrorKind::UnterminatedStr,
            ]
        );
        assert_eq!(
            skipped.last().map(|t| t.as_ref().map(|t| t.kind).ok()),
            Some(Some(TokenKind::Eof))
        );
    }

    #[test]
    fn lex_restart() {
        let grammar = Grammar::default();
        let mut lexer = tokenize("a b", &grammar, LexerRecovery::Halt);
        assert_eq!(lexer.by_ref().count(), 3);
        assert!(lexer.next().is_none());
        lexer.restart();
        assert_eq!(lexer.input(), "a b");
        assert_eq!(lexer.count(), 3);
    }

    #[test]
    fn lex_word_operator() {
        let mut grammar = Grammar::default();
        for rule in &mut grammar.operators {
            if rule.operator == Operator::And {
                rule.symbol = "and".to_owned();
            }
        }
        let grammar = grammar.validate().unwrap();
        let kinds: Vec<_> = tokenize("a and band", &grammar, LexerRecovery::Halt)
            .map(|t| t.unwrap().kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Ident,
                TokenKind::Operator(Operator::And),
                TokenKind::Ident,
                TokenKind::Eof,
            ]
        );
    }
}
