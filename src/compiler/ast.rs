//! The Abstract Syntax Tree (AST).
//!
//! All nodes of a program live in one arena ([`Ast::nodes`]) and refer to
//! their children by [`NodeId`]. Each reachable node has exactly one parent.

use std::fmt;

use compact_str::CompactString;
use index_vec::IndexVec;
use text_size::TextRange;

use crate::utils::{escape_str, Float, Join};

use super::{index::NodeId, token::Operator, typing::ScalarType, typing::Type};

/// The syntax tree of one compilation unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Ast {
    pub nodes: IndexVec<NodeId, Node>,
    /// The [`NodeKind::Program`] node.
    pub root: NodeId,
}

/// A node.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub range: TextRange,
}

/// How many children a node kind has.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Exactly `n` child slots, optional ones included.
    Fixed(usize),
    /// At least `min` child slots.
    Variadic { min: usize },
}

impl Arity {
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Arity::Fixed(n) => count == n,
            Arity::Variadic { min } => count >= min,
        }
    }
}

/// A function parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: CompactString,
    pub ty: Type,
    pub range: TextRange,
}

/// Parameters and return type of a function.
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    pub params: Vec<Param>,
    pub returns: Type,
}

impl Signature {
    pub fn ty(&self) -> Type {
        Type::function(
            self.params.iter().map(|param| param.ty.clone()).collect(),
            self.returns.clone(),
        )
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}) -> {}",
            self.params
                .iter()
                .map(|param| format!("{}: {}", param.name, param.ty))
                .join(", "),
            self.returns
        )
    }
}

/// Kind of node.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// The whole program. `tail` is the result expression.
    Program {
        stmts: Vec<NodeId>,
        tail: Option<NodeId>,
    },
    /// A block. `tail` is the result expression of a function body.
    Block {
        stmts: Vec<NodeId>,
        tail: Option<NodeId>,
    },
    /// `let name: ty = init;`
    Let {
        name: CompactString,
        ty: Option<Type>,
        init: NodeId,
    },
    /// `fn name(params) -> returns body`
    FnDecl {
        name: CompactString,
        signature: Signature,
        body: NodeId,
    },
    Return {
        value: Option<NodeId>,
    },
    If {
        test: NodeId,
        consequent: NodeId,
        /// A block or another `if`.
        alternate: Option<NodeId>,
    },
    While {
        test: NodeId,
        body: NodeId,
    },
    Loop {
        body: NodeId,
    },
    Break,
    Continue,
    ExprStmt {
        expr: NodeId,
    },
    Lit(Lit),
    Ident(CompactString),
    Unary {
        operator: UnOp,
        operand: NodeId,
    },
    Binary {
        operator: BinOp,
        left: NodeId,
        right: NodeId,
    },
    /// `target = value`, the target is an identifier or an index expression.
    Assign {
        target: NodeId,
        value: NodeId,
    },
    Call {
        callee: NodeId,
        args: Vec<NodeId>,
    },
    Index {
        target: NodeId,
        index: NodeId,
    },
    List {
        items: Vec<NodeId>,
    },
    Cast {
        expr: NodeId,
        ty: ScalarType,
    },
    /// `fn(params) -> returns body`
    Lambda {
        signature: Signature,
        body: NodeId,
    },
}

impl NodeKind {
    /// The number of child slots of this kind.
    pub fn arity(&self) -> Arity {
        match self {
            NodeKind::Program { .. } | NodeKind::Block { .. } => Arity::Variadic { min: 1 },
            NodeKind::Call { .. } => Arity::Variadic { min: 1 },
            NodeKind::List { .. } => Arity::Variadic { min: 0 },
            NodeKind::Break | NodeKind::Continue | NodeKind::Lit(_) | NodeKind::Ident(_) => {
                Arity::Fixed(0)
            }
            NodeKind::Let { .. }
            | NodeKind::FnDecl { .. }
            | NodeKind::Return { .. }
            | NodeKind::Loop { .. }
            | NodeKind::ExprStmt { .. }
            | NodeKind::Unary { .. }
            | NodeKind::Cast { .. }
            | NodeKind::Lambda { .. } => Arity::Fixed(1),
            NodeKind::While { .. }
            | NodeKind::Binary { .. }
            | NodeKind::Assign { .. }
            | NodeKind::Index { .. } => Arity::Fixed(2),
            NodeKind::If { .. } => Arity::Fixed(3),
        }
    }

    /// Every child slot in order. Optional children are explicit `None`.
    pub fn children(&self) -> Vec<Option<NodeId>> {
        match self {
            NodeKind::Program { stmts, tail } | NodeKind::Block { stmts, tail } => stmts
                .iter()
                .copied()
                .map(Some)
                .chain([*tail])
                .collect(),
            NodeKind::Let { init, .. } => vec![Some(*init)],
            NodeKind::FnDecl { body, .. } | NodeKind::Lambda { body, .. } => vec![Some(*body)],
            NodeKind::Return { value } => vec![*value],
            NodeKind::If {
                test,
                consequent,
                alternate,
            } => vec![Some(*test), Some(*consequent), *alternate],
            NodeKind::While { test, body } => vec![Some(*test), Some(*body)],
            NodeKind::Loop { body } => vec![Some(*body)],
            NodeKind::Break | NodeKind::Continue | NodeKind::Lit(_) | NodeKind::Ident(_) => {
                Vec::new()
            }
            NodeKind::ExprStmt { expr } => vec![Some(*expr)],
            NodeKind::Unary { operand, .. } => vec![Some(*operand)],
            NodeKind::Binary { left, right, .. } => vec![Some(*left), Some(*right)],
            NodeKind::Assign { target, value } => vec![Some(*target), Some(*value)],
            NodeKind::Call { callee, args } => std::iter::once(*callee)
                .chain(args.iter().copied())
                .map(Some)
                .collect(),
            NodeKind::Index { target, index } => vec![Some(*target), Some(*index)],
            NodeKind::List { items } => items.iter().copied().map(Some).collect(),
            NodeKind::Cast { expr, .. } => vec![Some(*expr)],
        }
    }

    /// Whether this kind is a statement.
    pub fn is_stmt(&self) -> bool {
        matches!(
            self,
            NodeKind::Block { .. }
                | NodeKind::Let { .. }
                | NodeKind::FnDecl { .. }
                | NodeKind::Return { .. }
                | NodeKind::If { .. }
                | NodeKind::While { .. }
                | NodeKind::Loop { .. }
                | NodeKind::Break
                | NodeKind::Continue
                | NodeKind::ExprStmt { .. }
        )
    }

    /// The name of this kind, as printed in dumps.
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Program { .. } => "Program",
            NodeKind::Block { .. } => "Block",
            NodeKind::Let { .. } => "Let",
            NodeKind::FnDecl { .. } => "FnDecl",
            NodeKind::Return { .. } => "Return",
            NodeKind::If { .. } => "If",
            NodeKind::While { .. } => "While",
            NodeKind::Loop { .. } => "Loop",
            NodeKind::Break => "Break",
            NodeKind::Continue => "Continue",
            NodeKind::ExprStmt { .. } => "ExprStmt",
            NodeKind::Lit(_) => "Lit",
            NodeKind::Ident(_) => "Ident",
            NodeKind::Unary { .. } => "Unary",
            NodeKind::Binary { .. } => "Binary",
            NodeKind::Assign { .. } => "Assign",
            NodeKind::Call { .. } => "Call",
            NodeKind::Index { .. } => "Index",
            NodeKind::List { .. } => "List",
            NodeKind::Cast { .. } => "Cast",
            NodeKind::Lambda { .. } => "Lambda",
        }
    }
}

/// A literal value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Lit {
    Int(i64),
    Float(Float),
    Bool(bool),
    Str(CompactString),
}

impl Lit {
    pub fn ty(&self) -> Type {
        match self {
            Lit::Int(_) => Type::Int,
            Lit::Float(_) => Type::Float,
            Lit::Bool(_) => Type::Bool,
            Lit::Str(_) => Type::Str,
        }
    }
}

impl fmt::Display for Lit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lit::Int(v) => write!(f, "{v}"),
            Lit::Float(v) => write!(f, "{v}"),
            Lit::Bool(v) => write!(f, "{v}"),
            Lit::Str(v) => write!(f, "\"{}\"", escape_str(v)),
        }
    }
}

/// Unary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnOp {
    /// The `-` operator (negation)
    Neg,
    /// The `!` operator (logical inversion)
    Not,
}

impl fmt::Display for UnOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnOp::Neg => write!(f, "-"),
            UnOp::Not => write!(f, "!"),
        }
    }
}

/// Binary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    /// The `+` operator (addition or concatenation)
    Add,
    /// The `-` operator (subtraction)
    Sub,
    /// The `*` operator (multiplication)
    Mul,
    /// The `/` operator (division)
    Div,
    /// The `%` operator (remainder)
    Rem,
    /// The `**` operator (power)
    Pow,
    /// The `==` operator (equality)
    Eq,
    /// The `!=` operator (not equal to)
    Ne,
    /// The `<` operator (less than)
    Lt,
    /// The `<=` operator (less than or equal to)
    Le,
    /// The `>` operator (greater than)
    Gt,
    /// The `>=` operator (greater than or equal to)
    Ge,
    /// The `&&` operator (short-circuit and)
    And,
    /// The `||` operator (short-circuit or)
    Or,
}

impl BinOp {
    pub fn from_operator(operator: Operator) -> Option<BinOp> {
        Some(match operator {
            Operator::Add => BinOp::Add,
            Operator::Sub => BinOp::Sub,
            Operator::Mul => BinOp::Mul,
            Operator::Div => BinOp::Div,
            Operator::Rem => BinOp::Rem,
            Operator::Pow => BinOp::Pow,
            Operator::Eq => BinOp::Eq,
            Operator::Ne => BinOp::Ne,
            Operator::Lt => BinOp::Lt,
            Operator::Le => BinOp::Le,
            Operator::Gt => BinOp::Gt,
            Operator::Ge => BinOp::Ge,
            Operator::And => BinOp::And,
            Operator::Or => BinOp::Or,
            Operator::Not | Operator::Assign => return None,
        })
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinOp::And | BinOp::Or)
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::Pow => "**",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
        })
    }
}

impl Ast {
    pub fn new() -> Self {
        let mut nodes = IndexVec::new();
        let root = nodes.push(Node {
            kind: NodeKind::Program {
                stmts: Vec::new(),
                tail: None,
            },
            range: TextRange::default(),
        });
        Ast { nodes, root }
    }

    /// Adds a node to the arena.
    pub fn push(&mut self, kind: NodeKind, range: TextRange) -> NodeId {
        self.nodes.push(Node { kind, range })
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id].kind
    }

    pub fn range(&self, id: NodeId) -> TextRange {
        self.nodes[id].range
    }

    /// The ids of all nodes reachable from the root, in pre-order.
    pub fn reachable(&self) -> Vec<NodeId> {
        let mut ids = Vec::new();
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            ids.push(id);
            stack.extend(self.nodes[id].kind.children().into_iter().flatten().rev());
        }
        ids
    }

    /// Displays the subtree of `id` as source text.
    pub fn display(&self, id: NodeId) -> NodeDisplay<'_> {
        NodeDisplay {
            ast: self,
            id,
            indent: 0,
        }
    }

    /// Displays the subtree of `id` as an indented tree of node kinds.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        let mut stack = vec![(Some(self.root), 0usize)];
        while let Some((id, depth)) = stack.pop() {
            out.push_str(&"  ".repeat(depth));
            let Some(id) = id else {
                out.push_str("None\n");
                continue;
            };
            let node = &self.nodes[id];
            out.push_str(node.kind.name());
            match &node.kind {
                NodeKind::Let { name, ty, .. } => {
                    out.push_str(&format!(" {name}"));
                    if let Some(ty) = ty {
                        out.push_str(&format!(": {ty}"));
                    }
                }
                NodeKind::FnDecl {
                    name, signature, ..
                } => out.push_str(&format!(" {name}{signature}")),
                NodeKind::Lambda { signature, .. } => out.push_str(&format!(" {signature}")),
                NodeKind::Lit(lit) => out.push_str(&format!(" {lit}")),
                NodeKind::Ident(name) => out.push_str(&format!(" {name}")),
                NodeKind::Unary { operator, .. } => out.push_str(&format!(" {operator}")),
                NodeKind::Binary { operator, .. } => out.push_str(&format!(" {operator}")),
                NodeKind::Cast { ty, .. } => out.push_str(&format!(" {ty}")),
                _ => (),
            }
            out.push_str(&format!(" @{:?}\n", node.range));
            for child in node.kind.children().into_iter().rev() {
                stack.push((child, depth + 1));
            }
        }
        out
    }
}

impl Default for Ast {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Ast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display(self.root))
    }
}

/// Source text of a subtree, see [`Ast::display`].
pub struct NodeDisplay<'a> {
    ast: &'a Ast,
    id: NodeId,
    indent: usize,
}

impl NodeDisplay<'_> {
    fn child(&self, id: NodeId) -> Self {
        NodeDisplay {
            ast: self.ast,
            id,
            indent: self.indent,
        }
    }

    fn nested(&self, id: NodeId) -> Self {
        NodeDisplay {
            ast: self.ast,
            id,
            indent: self.indent + 4,
        }
    }

    fn fmt_body(
        &self,
        f: &mut fmt::Formatter<'_>,
        stmts: &[NodeId],
        tail: Option<NodeId>,
    ) -> fmt::Result {
        let pad = " ".repeat(self.indent);
        for stmt in stmts {
            writeln!(f, "{pad}{}", self.child(*stmt))?;
        }
        if let Some(tail) = tail {
            writeln!(f, "{pad}{}", self.child(tail))?;
        }
        Ok(())
    }
}

impl fmt::Display for NodeDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.ast.nodes[self.id].kind {
            NodeKind::Program { stmts, tail } => self.fmt_body(f, stmts, *tail),
            NodeKind::Block { stmts, tail } => {
                writeln!(f, "{{")?;
                let inner = self.nested(self.id);
                inner.fmt_body(f, stmts, *tail)?;
                write!(f, "{}}}", " ".repeat(self.indent))
            }
            NodeKind::Let { name, ty, init } => match ty {
                Some(ty) => write!(f, "let {name}: {ty} = {};", self.child(*init)),
                None => write!(f, "let {name} = {};", self.child(*init)),
            },
            NodeKind::FnDecl {
                name,
                signature,
                body,
            } => write!(f, "fn {name}{signature} {}", self.child(*body)),
            NodeKind::Return { value } => match value {
                Some(value) => write!(f, "return {};", self.child(*value)),
                None => write!(f, "return;"),
            },
            NodeKind::If {
                test,
                consequent,
                alternate,
            } => {
                write!(f, "if {} {}", self.child(*test), self.child(*consequent))?;
                if let Some(alternate) = alternate {
                    write!(f, " else {}", self.child(*alternate))?;
                }
                Ok(())
            }
            NodeKind::While { test, body } => {
                write!(f, "while {} {}", self.child(*test), self.child(*body))
            }
            NodeKind::Loop { body } => write!(f, "loop {}", self.child(*body)),
            NodeKind::Break => write!(f, "break;"),
            NodeKind::Continue => write!(f, "continue;"),
            NodeKind::ExprStmt { expr } => write!(f, "{};", self.child(*expr)),
            NodeKind::Lit(lit) => write!(f, "{lit}"),
            NodeKind::Ident(name) => write!(f, "{name}"),
            NodeKind::Unary { operator, operand } => {
                write!(f, "({operator}{})", self.child(*operand))
            }
            NodeKind::Binary {
                operator,
                left,
                right,
            } => write!(
                f,
                "({} {operator} {})",
                self.child(*left),
                self.child(*right)
            ),
            NodeKind::Assign { target, value } => {
                write!(f, "{} = {}", self.child(*target), self.child(*value))
            }
            NodeKind::Call { callee, args } => write!(
                f,
                "{}({})",
                self.child(*callee),
                args.iter().map(|arg| self.child(*arg)).join(", ")
            ),
            NodeKind::Index { target, index } => {
                write!(f, "{}[{}]", self.child(*target), self.child(*index))
            }
            NodeKind::List { items } => write!(
                f,
                "[{}]",
                items.iter().map(|item| self.child(*item)).join(", ")
            ),
            NodeKind::Cast { expr, ty } => write!(f, "({} as {ty})", self.child(*expr)),
            NodeKind::Lambda { signature, body } => {
                write!(f, "fn{signature} {}", self.child(*body))
            }
        }
    }
}
