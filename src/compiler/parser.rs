//! The parser.
//!
//! Recursive descent for statements, precedence climbing for expressions.
//! Binary operator precedence and associativity come from the [`Grammar`].

use std::iter::Peekable;

use compact_str::CompactString;
use text_size::{TextRange, TextSize};

use super::{
    ast::{Ast, BinOp, Lit, NodeKind, Param, Signature, UnOp},
    error::SyntaxError,
    grammar::{Assoc, Grammar},
    index::NodeId,
    lexer::{parse_float, parse_int, parse_str},
    token::{Keyword, LitKind, Operator, Punct, Token, TokenKind},
    typing::Type,
};
use crate::utils::{Float, Location};

/// Parse the tokens into AST.
///
/// Parsing never stops at the first error: on a malformed statement the
/// error is recorded and the parser skips to the next statement boundary.
pub fn parse<I>(input: &str, grammar: &Grammar, tokens: I) -> (Ast, Vec<SyntaxError>)
where
    I: IntoIterator<Item = Token>,
    I::IntoIter: Clone,
{
    Parser::new(input, grammar, tokens.into_iter()).parse()
}

struct Parser<'a, I: Iterator<Item = Token>> {
    input: &'a str,
    grammar: &'a Grammar,
    token_iter: Peekable<I>,
    prev_token_end: TextSize,
    /// Number of tokens consumed, used to guarantee progress when recovering.
    consumed: usize,
    expected_kinds: Vec<TokenKind>,
    errors: Vec<SyntaxError>,
    ast: Ast,
}

/// A statement, or the trailing expression of a body.
enum Item {
    Stmt(NodeId),
    Tail(NodeId),
}

impl<'a, I: Iterator<Item = Token> + Clone> Parser<'a, I> {
    /// Constructs a new `Parser` with a token iter.
    fn new(input: &'a str, grammar: &'a Grammar, token_iter: I) -> Self {
        Self {
            input,
            grammar,
            token_iter: token_iter.peekable(),
            prev_token_end: TextSize::default(),
            consumed: 0,
            expected_kinds: Vec::new(),
            errors: Vec::new(),
            ast: Ast::new(),
        }
    }

    /// Returns the current token.
    fn current_token(&mut self) -> Token {
        let prev_token_end = self.prev_token_end;
        self.token_iter.peek().copied().unwrap_or_else(|| {
            Token::new(
                TokenKind::Eof,
                TextRange::empty(prev_token_end),
                Location::default(),
            )
        })
    }

    /// Returns the kind of the current token.
    fn current_kind(&mut self) -> TokenKind {
        self.current_token().kind
    }

    /// Returns the kind of the token after the current token.
    fn second_kind(&mut self) -> TokenKind {
        let mut iter = self.token_iter.clone();
        iter.next();
        iter.next().map_or(TokenKind::Eof, |token| token.kind)
    }

    /// Moves to the next token.
    fn bump(&mut self) {
        self.expected_kinds.clear();
        if let Some(token) = self.token_iter.next() {
            self.prev_token_end = token.range.end();
            self.consumed += 1;
        }
    }

    /// Checks if the current token is `t`, and returns `true` if so.
    /// This method will automatically add `t` to `expected_kinds` if `t` is not encountered.
    fn check(&mut self, t: TokenKind) -> bool {
        let is_present = self.current_kind() == t;
        if !is_present {
            self.expected_kinds.push(t);
        }
        is_present
    }

    /// Consumes a token 't' if it exists. Returns whether the given token was present.
    fn eat(&mut self, t: TokenKind) -> bool {
        let is_present = self.check(t);
        if is_present {
            self.bump();
        }
        is_present
    }

    /// Expects and consumes the token `t`. Signals an error if the next token is not `t`.
    fn expect(&mut self, t: TokenKind) -> Result<(), SyntaxError> {
        let is_present = self.eat(t);
        if !is_present {
            return Err(self.unexpected());
        }
        Ok(())
    }

    /// Returns an error for an unexpected token.
    fn unexpected(&mut self) -> SyntaxError {
        let token = self.current_token();
        let mut expected = self.expected_kinds.clone();
        expected.dedup();
        SyntaxError::UnexpectedToken {
            expected,
            found: token.kind,
            range: token.range,
        }
    }

    /// Start a new range.
    fn start_range(&mut self) -> TextSize {
        self.current_token().range.start()
    }

    /// End a new range.
    fn end_range(&mut self, start: TextSize) -> TextRange {
        TextRange::new(start, self.prev_token_end.max(start))
    }

    fn push(&mut self, kind: NodeKind, start: TextSize) -> NodeId {
        let range = self.end_range(start);
        self.ast.push(kind, range)
    }

    /// Parse token iter into AST.
    fn parse(mut self) -> (Ast, Vec<SyntaxError>) {
        let (stmts, tail) = self.parse_stmts(TokenKind::Eof, true);
        let root = self.ast.root;
        let end = TextSize::of(self.input);
        self.ast.nodes[root].kind = NodeKind::Program { stmts, tail };
        self.ast.nodes[root].range = TextRange::up_to(end);
        (self.ast, self.errors)
    }

    /// Parses statements up to and including `end_token`.
    fn parse_stmts(
        &mut self,
        end_token: TokenKind,
        allow_tail: bool,
    ) -> (Vec<NodeId>, Option<NodeId>) {
        let mut stmts = Vec::new();
        let mut tail = None;
        while !self.eat(end_token) {
            if self.check(TokenKind::Eof) {
                let e = self.unexpected();
                self.errors.push(e);
                break;
            }
            let consumed = self.consumed;
            match self.parse_item(end_token, allow_tail) {
                Ok(Item::Stmt(stmt)) => stmts.push(stmt),
                Ok(Item::Tail(expr)) => {
                    tail = Some(expr);
                    if let Err(e) = self.expect(end_token) {
                        self.errors.push(e);
                    }
                    break;
                }
                Err(e) => {
                    self.errors.push(e);
                    self.synchronize(end_token);
                    if self.consumed == consumed {
                        self.bump();
                    }
                }
            }
        }
        (stmts, tail)
    }

    /// Skips tokens up to the next statement boundary: after a `;`, or before
    /// `end_token` or a keyword starting a statement.
    fn synchronize(&mut self, end_token: TokenKind) {
        loop {
            match self.current_kind() {
                TokenKind::Eof => break,
                TokenKind::Punct(Punct::Semicolon) => {
                    self.bump();
                    break;
                }
                TokenKind::Keyword(kw) if kw.starts_stmt() => break,
                kind if kind == end_token => break,
                _ => self.bump(),
            }
        }
    }

    fn parse_block(&mut self, allow_tail: bool) -> Result<NodeId, SyntaxError> {
        let start = self.start_range();
        self.expect(TokenKind::Punct(Punct::OpenBrace))?;
        let (stmts, tail) = self.parse_stmts(TokenKind::Punct(Punct::CloseBrace), allow_tail);
        Ok(self.push(NodeKind::Block { stmts, tail }, start))
    }

    fn parse_item(&mut self, end_token: TokenKind, allow_tail: bool) -> Result<Item, SyntaxError> {
        let start = self.start_range();
        let kind = if self.eat(TokenKind::Keyword(Keyword::Let)) {
            let name = self.parse_ident()?;
            let ty = if self.eat(TokenKind::Punct(Punct::Colon)) {
                Some(self.parse_type()?)
            } else {
                None
            };
            self.expect(TokenKind::Operator(Operator::Assign))?;
            let init = self.parse_expr()?;
            self.expect(TokenKind::Punct(Punct::Semicolon))?;
            NodeKind::Let { name, ty, init }
        } else if self.check(TokenKind::Keyword(Keyword::Fn)) && self.second_kind() == TokenKind::Ident
        {
            self.bump();
            let name = self.parse_ident()?;
            let signature = self.parse_signature()?;
            let body = self.parse_block(true)?;
            NodeKind::FnDecl {
                name,
                signature,
                body,
            }
        } else if self.eat(TokenKind::Keyword(Keyword::Return)) {
            let value = if self.check(TokenKind::Punct(Punct::Semicolon)) {
                None
            } else {
                Some(self.parse_expr()?)
            };
            self.expect(TokenKind::Punct(Punct::Semicolon))?;
            NodeKind::Return { value }
        } else if self.check(TokenKind::Keyword(Keyword::If)) {
            return self.parse_if().map(Item::Stmt);
        } else if self.eat(TokenKind::Keyword(Keyword::While)) {
            let test = self.parse_expr()?;
            let body = self.parse_block(false)?;
            NodeKind::While { test, body }
        } else if self.eat(TokenKind::Keyword(Keyword::Loop)) {
            let body = self.parse_block(false)?;
            NodeKind::Loop { body }
        } else if self.eat(TokenKind::Keyword(Keyword::Break)) {
            self.expect(TokenKind::Punct(Punct::Semicolon))?;
            NodeKind::Break
        } else if self.eat(TokenKind::Keyword(Keyword::Continue)) {
            self.expect(TokenKind::Punct(Punct::Semicolon))?;
            NodeKind::Continue
        } else if self.check(TokenKind::Punct(Punct::OpenBrace)) {
            return self.parse_block(false).map(Item::Stmt);
        } else {
            let expr = self.parse_expr()?;
            if allow_tail && self.check(end_token) {
                return Ok(Item::Tail(expr));
            }
            self.expect(TokenKind::Punct(Punct::Semicolon))?;
            NodeKind::ExprStmt { expr }
        };
        Ok(Item::Stmt(self.push(kind, start)))
    }

    fn parse_if(&mut self) -> Result<NodeId, SyntaxError> {
        let start = self.start_range();
        self.expect(TokenKind::Keyword(Keyword::If))?;
        let test = self.parse_expr()?;
        let consequent = self.parse_block(false)?;
        let alternate = if self.eat(TokenKind::Keyword(Keyword::Else)) {
            if self.check(TokenKind::Keyword(Keyword::If)) {
                Some(self.parse_if()?)
            } else {
                Some(self.parse_block(false)?)
            }
        } else {
            None
        };
        Ok(self.push(
            NodeKind::If {
                test,
                consequent,
                alternate,
            },
            start,
        ))
    }

    /// Parses `(params) -> returns`. A missing return type is `unit`.
    fn parse_signature(&mut self) -> Result<Signature, SyntaxError> {
        let params = self.parse_items_between(
            TokenKind::Punct(Punct::OpenParen),
            |p| {
                let start = p.start_range();
                let name = p.parse_ident()?;
                p.expect(TokenKind::Punct(Punct::Colon))?;
                let ty = p.parse_type()?;
                let range = p.end_range(start);
                Ok(Param { name, ty, range })
            },
            TokenKind::Punct(Punct::CloseParen),
        )?;
        let returns = if self.eat(TokenKind::Punct(Punct::Arrow)) {
            self.parse_type()?
        } else {
            Type::Unit
        };
        Ok(Signature { params, returns })
    }

    /// Parses zero or more items separated by `,` between `start` and `end`.
    /// Allowing trailing `,`. The `end` will be consumed.
    fn parse_items_between<T, F: Fn(&mut Self) -> Result<T, SyntaxError>>(
        &mut self,
        start: TokenKind,
        parse_func: F,
        end: TokenKind,
    ) -> Result<Vec<T>, SyntaxError> {
        self.expect(start)?;
        let mut items = Vec::new();
        while !self.eat(end) {
            items.push(parse_func(self)?);
            if self.eat(end) {
                break;
            }
            self.expect(TokenKind::Punct(Punct::Comma))?;
        }
        Ok(items)
    }

    fn parse_expr(&mut self) -> Result<NodeId, SyntaxError> {
        self.parse_expr_precedence(1)
    }

    fn parse_expr_precedence(&mut self, min_precedence: u8) -> Result<NodeId, SyntaxError> {
        let start = self.start_range();
        let mut left = self.parse_expr_unary()?;
        loop {
            let kind = match self.current_kind() {
                TokenKind::Keyword(Keyword::As) => {
                    if self.grammar.cast_precedence < min_precedence {
                        break;
                    }
                    self.bump();
                    let ty_start = self.start_range();
                    let ty = self.parse_type()?;
                    let Some(ty) = ty.scalar() else {
                        return Err(SyntaxError::InvalidCastTarget {
                            ty,
                            range: self.end_range(ty_start),
                        });
                    };
                    NodeKind::Cast { expr: left, ty }
                }
                TokenKind::Operator(operator) => {
                    let Some(rule) = self.grammar.binary_rule(operator) else {
                        break;
                    };
                    if rule.precedence < min_precedence {
                        break;
                    }
                    self.bump();
                    let next_precedence = match rule.assoc {
                        Assoc::Left => rule.precedence + 1,
                        Assoc::Right => rule.precedence,
                    };
                    let right = self.parse_expr_precedence(next_precedence)?;
                    match BinOp::from_operator(operator) {
                        Some(operator) => NodeKind::Binary {
                            operator,
                            left,
                            right,
                        },
                        None => NodeKind::Assign {
                            target: left,
                            value: right,
                        },
                    }
                }
                _ => break,
            };
            left = self.push(kind, start);
        }
        Ok(left)
    }

    fn parse_expr_unary(&mut self) -> Result<NodeId, SyntaxError> {
        let start = self.start_range();
        let operator = match self.current_kind() {
            TokenKind::Operator(op) if self.grammar.is_unary(op) => match op {
                Operator::Sub => UnOp::Neg,
                _ => UnOp::Not,
            },
            _ => return self.parse_expr_primary(),
        };
        self.bump();
        let operand = self.parse_expr_precedence(self.grammar.unary_precedence)?;
        Ok(self.push(NodeKind::Unary { operator, operand }, start))
    }

    fn parse_expr_primary(&mut self) -> Result<NodeId, SyntaxError> {
        let start = self.start_range();
        let mut node = self.parse_expr_atom()?;
        loop {
            let kind = if self.check(TokenKind::Punct(Punct::OpenParen)) {
                let args = self.parse_items_between(
                    TokenKind::Punct(Punct::OpenParen),
                    Parser::parse_expr,
                    TokenKind::Punct(Punct::CloseParen),
                )?;
                NodeKind::Call { callee: node, args }
            } else if self.eat(TokenKind::Punct(Punct::OpenBracket)) {
                let index = self.parse_expr()?;
                self.expect(TokenKind::Punct(Punct::CloseBracket))?;
                NodeKind::Index {
                    target: node,
                    index,
                }
            } else {
                break;
            };
            node = self.push(kind, start);
        }
        Ok(node)
    }

    fn parse_expr_atom(&mut self) -> Result<NodeId, SyntaxError> {
        let start = self.start_range();
        let kind = if self.eat(TokenKind::Punct(Punct::OpenParen)) {
            let expr = self.parse_expr()?;
            self.expect(TokenKind::Punct(Punct::CloseParen))?;
            return Ok(expr);
        } else if self.check(TokenKind::Ident) {
            NodeKind::Ident(self.parse_ident()?)
        } else if self.check(TokenKind::Punct(Punct::OpenBracket)) {
            let items = self.parse_items_between(
                TokenKind::Punct(Punct::OpenBracket),
                Parser::parse_expr,
                TokenKind::Punct(Punct::CloseBracket),
            )?;
            NodeKind::List { items }
        } else if self.eat(TokenKind::Keyword(Keyword::Fn)) {
            let signature = self.parse_signature()?;
            let body = self.parse_block(true)?;
            NodeKind::Lambda { signature, body }
        } else {
            NodeKind::Lit(self.parse_lit()?)
        };
        Ok(self.push(kind, start))
    }

    fn parse_lit(&mut self) -> Result<Lit, SyntaxError> {
        let token = self.current_token();
        let range = token.range;
        let text = token.lexeme(self.input);
        let invalid = |error| SyntaxError::InvalidLiteral { error, range };
        let lit = match token.kind {
            TokenKind::Keyword(Keyword::True) => Lit::Bool(true),
            TokenKind::Keyword(Keyword::False) => Lit::Bool(false),
            TokenKind::Lit(LitKind::Int) => Lit::Int(parse_int(text).map_err(invalid)?),
            TokenKind::Lit(LitKind::Float) => Lit::Float(Float(parse_float(text).map_err(invalid)?)),
            TokenKind::Lit(LitKind::Str) => Lit::Str(parse_str(text).map_err(invalid)?.into()),
            _ => {
                for kind in [
                    TokenKind::Lit(LitKind::Int),
                    TokenKind::Lit(LitKind::Float),
                    TokenKind::Lit(LitKind::Str),
                    TokenKind::Keyword(Keyword::True),
                    TokenKind::Keyword(Keyword::False),
                ] {
                    self.check(kind);
                }
                return Err(self.unexpected());
            }
        };
        self.bump();
        Ok(lit)
    }

    fn parse_ident(&mut self) -> Result<CompactString, SyntaxError> {
        let token = self.current_token();
        if !self.check(TokenKind::Ident) {
            return Err(self.unexpected());
        }
        self.bump();
        Ok(token.lexeme(self.input).into())
    }

    /// Parses a type: `int`, `float`, `bool`, `str`, `unit`, `[T]` or
    /// `fn(T, ...) -> R`.
    fn parse_type(&mut self) -> Result<Type, SyntaxError> {
        if self.eat(TokenKind::Punct(Punct::OpenBracket)) {
            let item = self.parse_type()?;
            self.expect(TokenKind::Punct(Punct::CloseBracket))?;
            Ok(Type::list(item))
        } else if self.eat(TokenKind::Keyword(Keyword::Fn)) {
            let params = self.parse_items_between(
                TokenKind::Punct(Punct::OpenParen),
                Parser::parse_type,
                TokenKind::Punct(Punct::CloseParen),
            )?;
            let returns = if self.eat(TokenKind::Punct(Punct::Arrow)) {
                self.parse_type()?
            } else {
                Type::Unit
            };
            Ok(Type::function(params, returns))
        } else {
            let range = self.current_token().range;
            let name = self.parse_ident()?;
            match name.as_str() {
                "int" => Ok(Type::Int),
                "float" => Ok(Type::Float),
                "bool" => Ok(Type::Bool),
                "str" => Ok(Type::Str),
                "unit" => Ok(Type::Unit),
                _ => Err(SyntaxError::UnknownType {
                    name: name.into(),
                    range,
                }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::lexer::{tokenize, LexerRecovery};

    fn parse_str_ok(input: &str) -> Ast {
        let grammar = Grammar::default();
        let tokens: Vec<_> = tokenize(input, &grammar, LexerRecovery::Halt)
            .map(Result::unwrap)
            .collect();
        let (ast, errors) = parse(input, &grammar, tokens);
        assert_eq!(errors, Vec::new());
        ast
    }

    fn parse_errors(input: &str) -> Vec<SyntaxError> {
        let grammar = Grammar::default();
        let tokens: Vec<_> = tokenize(input, &grammar, LexerRecovery::Halt)
            .map(Result::unwrap)
            .collect();
        parse(input, &grammar, tokens).1
    }

    #[test]
    fn parse_precedence() {
        let ast = parse_str_ok("1 + 2 * 3");
        assert_eq!(ast.to_string(), "(1 + (2 * 3))\n");
        let ast = parse_str_ok("-2 ** 2 ** 3;");
        assert_eq!(ast.to_string(), "(-(2 ** (2 ** 3)));\n");
        let ast = parse_str_ok("a = b = 1 - 2 - 3;");
        assert_eq!(ast.to_string(), "a = b = ((1 - 2) - 3);\n");
        let ast = parse_str_ok("x * 2 as float < 1.5 && !ok;");
        assert_eq!(
            ast.to_string(),
            "(((x * (2 as float)) < 1.5) && (!ok));\n"
        );
    }

    #[test]
    fn parse_statements() {
        let input = "fn f(n: int, xs: [int]) -> int { if n < 2 { return n; } else { return xs[0]; } }\n\
                     let g: fn(int) -> int = fn(a: int) -> int { a + 1 };\n\
                     while true { loop { break; } continue; }";
        let ast = parse_str_ok(input);
        let NodeKind::Program { stmts, tail } = ast.kind(ast.root) else {
            panic!("root is not a program");
        };
        assert_eq!(stmts.len(), 3);
        assert_eq!(*tail, None);
        assert!(matches!(ast.kind(stmts[0]), NodeKind::FnDecl { .. }));
        assert!(matches!(ast.kind(stmts[1]), NodeKind::Let { .. }));
        assert!(matches!(ast.kind(stmts[2]), NodeKind::While { .. }));
    }

    #[test]
    fn parse_children_match_arity() {
        let ast = parse_str_ok("fn f() { return; } let xs = [1, 2]; if xs[0] == 1 { f(); } xs");
        for id in ast.reachable() {
            let kind = ast.kind(id);
            assert!(kind.arity().accepts(kind.children().len()), "{kind:?}");
        }
    }

    #[test]
    fn parse_recovers_from_errors() {
        let errors = parse_errors("let = 1; let y = ; let z = 3; z");
        assert_eq!(errors.len(), 2);
        assert!(matches!(
            &errors[0],
            SyntaxError::UnexpectedToken {
                found: TokenKind::Operator(Operator::Assign),
                ..
            }
        ));
    }

    #[test]
    fn parse_tail_only_in_bodies() {
        assert_eq!(parse_errors("if true { 1 }").len(), 1);
        assert!(parse_errors("fn f() -> int { 1 }").is_empty());
    }

    #[test]
    fn parse_unknown_type() {
        let errors = parse_errors("let x: integer = 1;");
        assert!(matches!(&errors[0], SyntaxError::UnknownType { name, .. } if name == "integer"));
    }
}
