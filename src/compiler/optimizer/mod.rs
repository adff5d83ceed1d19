//! The tree optimizer.
//!
//! Rewrites the decorated syntax tree in place. Every pass runs to its own
//! fixed point, so running a pass twice never changes the tree again. The
//! driver repeats all passes until none of them changes anything.

mod cse;
mod dce;
mod fold;

use std::fmt;

use compact_str::CompactString;
use text_size::TextRange;

use super::{
    ast::{Ast, BinOp, Lit, NodeKind},
    error::InternalError,
    index::{FunctionId, NodeId, SymbolId},
    semantic::Semantic,
    typing::{ScalarType, Type},
};

/// Upper bound of driver rounds, and of sweeps of a single pass.
pub const MAX_ITERATIONS: usize = 16;

/// An optimization pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pass {
    ConstantFolding,
    DeadCode,
    CommonSubexpr,
}

impl Pass {
    pub const ALL: [Pass; 3] = [Pass::ConstantFolding, Pass::DeadCode, Pass::CommonSubexpr];

    pub const fn name(self) -> &'static str {
        match self {
            Pass::ConstantFolding => "constant-folding",
            Pass::DeadCode => "dead-code",
            Pass::CommonSubexpr => "common-subexpr",
        }
    }
}

impl fmt::Display for Pass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Runs all passes to a fixed point. Returns the number of rounds.
pub fn optimize(ast: &mut Ast, semantic: &mut Semantic) -> Result<usize, InternalError> {
    let mut optimizer = Optimizer { ast, semantic };
    for round in 1..=MAX_ITERATIONS {
        let mut changed = false;
        for pass in Pass::ALL {
            changed |= optimizer.run(pass)?;
        }
        if !changed {
            log::debug!("optimizer reached a fixed point after {round} rounds");
            return Ok(round);
        }
    }
    Err(InternalError::OptimizerDiverged {
        iterations: MAX_ITERATIONS,
    })
}

/// Runs one pass to its fixed point. Returns whether the tree changed.
pub fn run_pass(pass: Pass, ast: &mut Ast, semantic: &mut Semantic) -> Result<bool, InternalError> {
    Optimizer { ast, semantic }.run(pass)
}

pub(crate) struct Optimizer<'a> {
    pub(crate) ast: &'a mut Ast,
    pub(crate) semantic: &'a mut Semantic,
}

impl Optimizer<'_> {
    fn run(&mut self, pass: Pass) -> Result<bool, InternalError> {
        let mut changed = false;
        for _ in 0..MAX_ITERATIONS {
            let swept = match pass {
                Pass::ConstantFolding => self.fold(),
                Pass::DeadCode => self.eliminate_dead_code(),
                Pass::CommonSubexpr => self.eliminate_common_subexpr(),
            };
            if swept == 0 {
                return Ok(changed);
            }
            log::debug!("{pass}: {swept} rewrites");
            changed = true;
        }
        Err(InternalError::OptimizerDiverged {
            iterations: MAX_ITERATIONS,
        })
    }

    fn kind(&self, id: NodeId) -> &NodeKind {
        self.ast.kind(id)
    }

    /// Adds a node with its type.
    fn push(&mut self, kind: NodeKind, range: TextRange, ty: Type) -> NodeId {
        let id = self.ast.push(kind, range);
        self.semantic.types.push(ty);
        id
    }

    /// Adds a variable that holds an intermediate result.
    fn add_temporary(&mut self, ty: Type, function: FunctionId) -> (CompactString, SymbolId) {
        let name = CompactString::from(format!("%t{}", self.semantic.symbols.len()));
        let symbol = self.semantic.add_temporary(name.clone(), ty, function);
        (name, symbol)
    }

    /// Every reachable statement list (program and blocks) with the function
    /// it belongs to, outer lists first.
    fn statement_lists(&self) -> Vec<(NodeId, FunctionId)> {
        let mut lists = Vec::new();
        let mut stack = vec![(self.ast.root, FunctionId::from_raw(0))];
        while let Some((id, function)) = stack.pop() {
            let kind = self.kind(id);
            let function = match kind {
                NodeKind::FnDecl { .. } | NodeKind::Lambda { .. } => self
                    .semantic
                    .node_functions
                    .get(&id)
                    .copied()
                    .unwrap_or(function),
                _ => function,
            };
            if matches!(kind, NodeKind::Program { .. } | NodeKind::Block { .. }) {
                lists.push((id, function));
            }
            for child in kind.children().into_iter().flatten().rev() {
                stack.push((child, function));
            }
        }
        lists
    }

    /// The statements and tail of a program or block.
    fn body(&self, list: NodeId) -> (Vec<NodeId>, Option<NodeId>) {
        match self.kind(list) {
            NodeKind::Program { stmts, tail } | NodeKind::Block { stmts, tail } => {
                (stmts.clone(), *tail)
            }
            _ => (Vec::new(), None),
        }
    }

    fn set_body(&mut self, list: NodeId, new_stmts: Vec<NodeId>, new_tail: Option<NodeId>) {
        if let NodeKind::Program { stmts, tail } | NodeKind::Block { stmts, tail } =
            &mut self.ast.nodes[list].kind
        {
            *stmts = new_stmts;
            *tail = new_tail;
        }
    }

    /// Whether evaluating `id` has no effect and can not fault.
    fn is_pure(&self, id: NodeId) -> bool {
        match self.kind(id) {
            NodeKind::Lit(_) | NodeKind::Ident(_) | NodeKind::Lambda { .. } => true,
            NodeKind::List { items } => items.iter().all(|item| self.is_pure(*item)),
            NodeKind::Unary { operand, .. } => self.is_pure(*operand),
            NodeKind::Binary {
                operator,
                left,
                right,
            } => {
                let safe = match operator {
                    BinOp::Div | BinOp::Rem => self.is_nonzero_lit(*right),
                    BinOp::Pow => {
                        self.semantic.types[*right] == Type::Float
                            || matches!(self.kind(*right), NodeKind::Lit(Lit::Int(v)) if *v >= 0)
                    }
                    _ => true,
                };
                safe && self.is_pure(*left) && self.is_pure(*right)
            }
            NodeKind::Cast { expr, ty } => {
                let safe = match (&self.semantic.types[*expr], ty) {
                    (_, ScalarType::Str) => true,
                    (Type::Int | Type::Bool, _) => true,
                    (Type::Float, ScalarType::Float | ScalarType::Bool) => true,
                    _ => false,
                };
                safe && self.is_pure(*expr)
            }
            _ => false,
        }
    }

    fn is_nonzero_lit(&self, id: NodeId) -> bool {
        match self.kind(id) {
            NodeKind::Lit(Lit::Int(v)) => *v != 0,
            NodeKind::Lit(Lit::Float(v)) => v.0 != 0.0,
            _ => false,
        }
    }

    /// Whether the subtree of `id` refers to `symbol`.
    fn mentions(&self, id: NodeId, symbol: SymbolId) -> bool {
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            if matches!(self.kind(id), NodeKind::Ident(_))
                && self.semantic.resolutions.get(&id) == Some(&symbol)
            {
                return true;
            }
            stack.extend(self.kind(id).children().into_iter().flatten());
        }
        false
    }

    /// Whether control never reaches the statement after `stmt`.
    fn diverges(&self, stmt: NodeId) -> bool {
        match self.kind(stmt) {
            NodeKind::Return { .. } | NodeKind::Break | NodeKind::Continue => true,
            NodeKind::Block { stmts, .. } => stmts.iter().any(|stmt| self.diverges(*stmt)),
            NodeKind::If {
                consequent,
                alternate: Some(alternate),
                ..
            } => self.diverges(*consequent) && self.diverges(*alternate),
            NodeKind::Loop { body } => !self.breaks(*body),
            _ => false,
        }
    }

    /// Whether `id` contains a `break` of the enclosing loop.
    fn breaks(&self, id: NodeId) -> bool {
        match self.kind(id) {
            NodeKind::Break => true,
            NodeKind::Loop { .. }
            | NodeKind::While { .. }
            | NodeKind::FnDecl { .. }
            | NodeKind::Lambda { .. } => false,
            kind => kind
                .children()
                .into_iter()
                .flatten()
                .any(|child| self.breaks(child)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{analyze_source, CompileOptions};

    pub(super) fn optimized(input: &str, passes: &[Pass]) -> (Ast, Semantic) {
        let (mut ast, mut semantic) = analyze_source(input, &CompileOptions::default()).unwrap();
        for pass in passes {
            run_pass(*pass, &mut ast, &mut semantic).unwrap();
        }
        (ast, semantic)
    }

    #[test]
    fn optimize_reaches_fixed_point() {
        let (mut ast, mut semantic) = analyze_source(
            "let a = 2; let b = a * 3 + a * 3; if 1 > 2 { print(b); } return b;",
            &CompileOptions::default(),
        )
        .unwrap();
        let rounds = optimize(&mut ast, &mut semantic).unwrap();
        assert!(rounds <= MAX_ITERATIONS);
        assert_eq!(
            ast.to_string(),
            "let a = 2;\nlet %t7 = (a * 3);\nlet b = (%t7 + %t7);\nreturn b;\n"
        );
    }

    #[test]
    fn passes_are_idempotent() {
        let input = "let x = 1; let y = (x + 2) * (x + 2); x = 3; x = 4; \
                     while false { print(0); } print(y + x); return -(2 ** 3);";
        for pass in Pass::ALL {
            let (mut ast, mut semantic) = optimized(input, &[pass]);
            let before = ast.clone();
            assert!(!run_pass(pass, &mut ast, &mut semantic).unwrap(), "{pass}");
            assert_eq!(ast, before, "{pass}");
        }
    }
}
