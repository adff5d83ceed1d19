//! Common subexpression elimination.
//!
//! Within one expression statement, a pure subexpression computed more than
//! once is computed once into a temporary declared right before the
//! statement. Statements with calls or assignments are skipped, since the
//! operands of a repeated subexpression could change in between.

use rustc_hash::FxHashMap;

use crate::compiler::{
    ast::{BinOp, Lit, NodeKind, UnOp},
    index::{FunctionId, NodeId, SymbolId},
    typing::{ScalarType, Type},
};

use super::Optimizer;

/// The structure of a pure expression, identifiers by symbol.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ExprKey {
    Lit(Lit),
    Sym(SymbolId),
    Unary(UnOp, Box<ExprKey>),
    Binary(BinOp, Box<ExprKey>, Box<ExprKey>),
    Cast(ScalarType, Box<ExprKey>),
}

impl Optimizer<'_> {
    pub(super) fn eliminate_common_subexpr(&mut self) -> usize {
        let mut count = 0;
        for (list, function) in self.statement_lists() {
            let (stmts, tail) = self.body(list);
            let mut out = Vec::with_capacity(stmts.len());
            let mut hoisted = 0;
            for stmt in stmts {
                if let Some(root) = self.root_of(stmt) {
                    let lets = self.hoist_repeated(root, function);
                    hoisted += lets.len();
                    out.extend(lets);
                }
                out.push(stmt);
            }
            if let Some(tail) = tail {
                let lets = self.hoist_repeated(tail, function);
                hoisted += lets.len();
                out.extend(lets);
            }
            if hoisted > 0 {
                self.set_body(list, out, tail);
                count += hoisted;
            }
        }
        count
    }

    /// The expression of a statement evaluated once, before anything else
    /// the statement does.
    fn root_of(&self, stmt: NodeId) -> Option<NodeId> {
        match self.kind(stmt) {
            NodeKind::Let { init, .. } => Some(*init),
            NodeKind::ExprStmt { expr } => Some(*expr),
            NodeKind::Return { value } => *value,
            NodeKind::If { test, .. } => Some(*test),
            _ => None,
        }
    }

    /// Hoists every repeated subexpression of `root`. Returns the new `let`
    /// statements in evaluation order.
    fn hoist_repeated(&mut self, root: NodeId, function: FunctionId) -> Vec<NodeId> {
        let mut lets = Vec::new();
        if self.has_effects(root) {
            return lets;
        }
        while let Some(occurrences) = self.first_repeated(root) {
            let (stmt, init) = self.hoist(&occurrences, function);
            lets.extend(self.hoist_repeated(init, function));
            lets.push(stmt);
        }
        lets
    }

    /// Whether evaluating `id` may write a variable. Lambda bodies do not
    /// run when the lambda is created.
    fn has_effects(&self, id: NodeId) -> bool {
        match self.kind(id) {
            NodeKind::Call { .. } | NodeKind::Assign { .. } => true,
            NodeKind::Lambda { .. } => false,
            kind => kind
                .children()
                .into_iter()
                .flatten()
                .any(|child| self.has_effects(child)),
        }
    }

    /// All occurrences of the first subexpression, in pre-order, that occurs
    /// at least twice.
    fn first_repeated(&self, root: NodeId) -> Option<Vec<NodeId>> {
        let mut candidates = Vec::new();
        self.collect_candidates(root, &mut candidates);
        let mut counts: FxHashMap<&ExprKey, usize> = FxHashMap::default();
        for (_, key) in &candidates {
            *counts.entry(key).or_default() += 1;
        }
        let (_, repeated) = candidates.iter().find(|(_, key)| counts[key] > 1)?;
        Some(
            candidates
                .iter()
                .filter(|(_, key)| key == repeated)
                .map(|(id, _)| *id)
                .collect(),
        )
    }

    /// Pure compound subexpressions that are always evaluated with `id`.
    fn collect_candidates(&self, id: NodeId, out: &mut Vec<(NodeId, ExprKey)>) {
        match self.kind(id) {
            NodeKind::Lambda { .. } => return,
            NodeKind::Binary {
                operator: BinOp::And | BinOp::Or,
                left,
                ..
            } => {
                self.collect_candidates(*left, out);
                return;
            }
            NodeKind::Unary { .. } | NodeKind::Binary { .. } | NodeKind::Cast { .. }
                if self.is_pure(id) =>
            {
                if let Some(key) = self.key(id) {
                    out.push((id, key));
                }
            }
            _ => (),
        }
        for child in self.kind(id).children().into_iter().flatten() {
            self.collect_candidates(child, out);
        }
    }

    fn key(&self, id: NodeId) -> Option<ExprKey> {
        Some(match self.kind(id) {
            NodeKind::Lit(lit) => ExprKey::Lit(lit.clone()),
            NodeKind::Ident(_) => ExprKey::Sym(*self.semantic.resolutions.get(&id)?),
            NodeKind::Unary { operator, operand } => {
                ExprKey::Unary(*operator, Box::new(self.key(*operand)?))
            }
            NodeKind::Binary {
                operator,
                left,
                right,
            } if !operator.is_logical() => ExprKey::Binary(
                *operator,
                Box::new(self.key(*left)?),
                Box::new(self.key(*right)?),
            ),
            NodeKind::Cast { expr, ty } => ExprKey::Cast(*ty, Box::new(self.key(*expr)?)),
            _ => return None,
        })
    }

    /// Moves the first occurrence into a new temporary and replaces every
    /// occurrence by a read of it. Returns the `let` statement and its
    /// initializer.
    fn hoist(&mut self, occurrences: &[NodeId], function: FunctionId) -> (NodeId, NodeId) {
        let first = occurrences[0];
        let range = self.ast.range(first);
        let ty = self.semantic.types[first].clone();
        let (name, symbol) = self.add_temporary(ty.clone(), function);

        let init = self.push(self.kind(first).clone(), range, ty);
        let stmt = self.push(
            NodeKind::Let {
                name: name.clone(),
                ty: None,
                init,
            },
            range,
            Type::Unit,
        );
        self.semantic.resolutions.insert(stmt, symbol);
        for id in occurrences.iter().copied() {
            self.ast.nodes[id].kind = NodeKind::Ident(name.clone());
            self.semantic.resolutions.insert(id, symbol);
        }
        log::trace!("hoisted {} occurrences into {name}", occurrences.len());
        (stmt, init)
    }
}

#[cfg(test)]
mod tests {
    use crate::compiler::optimizer::{tests::optimized, Pass};

    fn cse(input: &str) -> String {
        optimized(input, &[Pass::CommonSubexpr]).0.to_string()
    }

    #[test]
    fn hoist_repeated_subexpression() {
        assert_eq!(
            cse("let a = 2; let b = a * 3 + a * 3; return b;"),
            "let a = 2;\nlet %t7 = (a * 3);\nlet b = (%t7 + %t7);\nreturn b;\n"
        );
    }

    #[test]
    fn hoist_nested_subexpressions() {
        assert_eq!(
            cse("let a = 2; (a + 1) * (a + 1) + (a + 1) * (a + 1)"),
            "let a = 2;\nlet %t7 = (a + 1);\nlet %t6 = (%t7 * %t7);\n(%t6 + %t6)\n"
        );
    }

    #[test]
    fn skip_statements_with_effects() {
        let input = "let a = 1; let b = (a + 1) + len([a]) + (a + 1);";
        assert_eq!(
            cse(input),
            "let a = 1;\nlet b = (((a + 1) + len([a])) + (a + 1));\n"
        );
    }

    #[test]
    fn skip_faulting_and_conditional_subexpressions() {
        assert_eq!(
            cse("let a = 0; (1 / a) + (1 / a)"),
            "let a = 0;\n((1 / a) + (1 / a))\n"
        );
        assert_eq!(
            cse("let a = 0; (a > 1) || (a > 1)"),
            "let a = 0;\n((a > 1) || (a > 1))\n"
        );
    }
}
