//! Dead-code elimination.

use crate::compiler::{
    ast::{Lit, NodeKind},
    index::{NodeId, SymbolId},
    semantic::SymbolKind,
    typing::Type,
};

use super::Optimizer;

impl Optimizer<'_> {
    /// Removes statements without observable effect from every statement
    /// list.
    pub(super) fn eliminate_dead_code(&mut self) -> usize {
        let mut count = 0;
        for (list, _) in self.statement_lists() {
            count += self.sweep_list(list);
        }
        count
    }

    fn sweep_list(&mut self, list: NodeId) -> usize {
        let (stmts, mut tail) = self.body(list);
        let mut count = 0;
        let mut out: Vec<NodeId> = Vec::with_capacity(stmts.len());
        let mut diverged = false;
        for stmt in stmts.iter().copied() {
            if diverged {
                // Declarations are hoisted, they are not executed in place.
                if matches!(self.kind(stmt), NodeKind::FnDecl { .. }) {
                    out.push(stmt);
                } else {
                    count += 1;
                }
                continue;
            }
            match self.simplify_stmt(stmt) {
                Some(kept) => {
                    if kept != stmt {
                        count += 1;
                    }
                    diverged = self.diverges(kept);
                    out.push(kept);
                }
                None => count += 1,
            }
        }
        if diverged && tail.is_some() {
            tail = None;
            count += 1;
        }
        count += self.eliminate_dead_stores(&mut out, tail);
        if count > 0 {
            self.set_body(list, out, tail);
        }
        count
    }

    /// The replacement of a statement, `None` if it is removed.
    fn simplify_stmt(&self, stmt: NodeId) -> Option<NodeId> {
        match self.kind(stmt) {
            NodeKind::ExprStmt { expr } if self.is_pure(*expr) => None,
            NodeKind::Block { stmts, tail: None } if stmts.is_empty() => None,
            NodeKind::If {
                test,
                consequent,
                alternate,
            } => match self.kind(*test) {
                NodeKind::Lit(Lit::Bool(true)) => Some(*consequent),
                NodeKind::Lit(Lit::Bool(false)) => *alternate,
                _ => Some(stmt),
            },
            NodeKind::While { test, .. }
                if matches!(self.kind(*test), NodeKind::Lit(Lit::Bool(false))) =>
            {
                None
            }
            _ => Some(stmt),
        }
    }

    /// The variable a `let` declares, if stores to it may be removed.
    fn local_variable(&self, stmt: NodeId) -> Option<SymbolId> {
        let symbol = *self.semantic.resolutions.get(&stmt)?;
        let info = &self.semantic.symbols[symbol];
        (info.kind == SymbolKind::Variable && !info.escapes).then_some(symbol)
    }

    /// `symbol = value;`
    fn store_of(&self, stmt: NodeId) -> Option<(SymbolId, NodeId)> {
        let NodeKind::ExprStmt { expr } = self.kind(stmt) else {
            return None;
        };
        let NodeKind::Assign { target, value } = self.kind(*expr) else {
            return None;
        };
        if !matches!(self.kind(*target), NodeKind::Ident(_)) {
            return None;
        }
        let symbol = *self.semantic.resolutions.get(target)?;
        Some((symbol, *value))
    }

    /// Replaces a statement by the evaluation of `expr` alone.
    fn keep_effects(&mut self, stmt: NodeId, expr: NodeId) {
        self.ast.nodes[stmt].kind = NodeKind::ExprStmt { expr };
        self.semantic.types[stmt] = Type::Unit;
    }

    /// Removes stores that are overwritten before any read, and stores to
    /// variables of this list that are never read again.
    fn eliminate_dead_stores(&mut self, stmts: &mut Vec<NodeId>, tail: Option<NodeId>) -> usize {
        let mut count = 0;
        let mut i = 0;
        while i < stmts.len() {
            let stmt = stmts[i];
            let next = stmts.get(i + 1).copied();

            // `let y = a; y = b;` becomes `let y = b;`, keeping the effects of `a`.
            if let (NodeKind::Let { init, .. }, Some(next)) = (self.kind(stmt).clone(), next) {
                if let (Some(symbol), Some((target, value))) =
                    (self.local_variable(stmt), self.store_of(next))
                {
                    if symbol == target && !self.mentions(value, symbol) {
                        if let NodeKind::Let { init: slot, .. } = &mut self.ast.nodes[stmt].kind {
                            *slot = value;
                        }
                        if self.is_pure(init) {
                            stmts.remove(i + 1);
                        } else {
                            self.keep_effects(next, init);
                            stmts.swap(i, i + 1);
                        }
                        count += 1;
                        continue;
                    }
                }
            }

            // `y = a; y = b;` becomes `a; y = b;`.
            if let (Some((symbol, value)), Some(next)) = (self.store_of(stmt), next) {
                if let Some((target, next_value)) = self.store_of(next) {
                    if symbol == target
                        && self.removable_store(symbol)
                        && !self.mentions(next_value, symbol)
                    {
                        self.keep_effects(stmt, value);
                        count += 1;
                        continue;
                    }
                }
            }

            // A variable of this list that is never mentioned again.
            let symbol = match self.kind(stmt) {
                NodeKind::Let { .. } => self.local_variable(stmt),
                NodeKind::ExprStmt { .. } => self
                    .store_of(stmt)
                    .map(|(symbol, _)| symbol)
                    .filter(|symbol| self.declared_in(*symbol, &stmts[..i])),
                _ => None,
            };
            if let Some(symbol) = symbol {
                let read_later = stmts[i + 1..]
                    .iter()
                    .chain(tail.iter())
                    .any(|later| self.mentions(*later, symbol));
                if !read_later {
                    let value = match self.kind(stmt) {
                        NodeKind::Let { init, .. } => Some(*init),
                        _ => self.store_of(stmt).map(|(_, value)| value),
                    };
                    if let Some(value) = value {
                        self.keep_effects(stmt, value);
                        count += 1;
                        continue;
                    }
                }
            }

            i += 1;
        }
        count
    }

    fn removable_store(&self, symbol: SymbolId) -> bool {
        let info = &self.semantic.symbols[symbol];
        matches!(info.kind, SymbolKind::Variable | SymbolKind::Parameter) && !info.escapes
    }

    /// Whether `symbol` is declared by one of the `let` statements.
    fn declared_in(&self, symbol: SymbolId, stmts: &[NodeId]) -> bool {
        stmts.iter().any(|stmt| {
            matches!(self.kind(*stmt), NodeKind::Let { .. })
                && self.local_variable(*stmt) == Some(symbol)
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::compiler::optimizer::{tests::optimized, Pass};

    fn dce(input: &str) -> String {
        optimized(input, &[Pass::DeadCode]).0.to_string()
    }

    #[test]
    fn remove_dead_store() {
        assert_eq!(dce("let y = 1; y = 2; return y;"), "let y = 2;\nreturn y;\n");
        assert_eq!(
            dce("let y = 1; print(y); y = 2; y = 3; print(y);"),
            "let y = 1;\nprint(y);\ny = 3;\nprint(y);\n"
        );
    }

    #[test]
    fn keep_effects_of_dead_stores() {
        assert_eq!(
            dce("fn f() -> int { print(1); return 1; } let y = f(); y = 2; return y;"),
            "fn f() -> int {\n    print(1);\n    return 1;\n}\nf();\nlet y = 2;\nreturn y;\n"
        );
    }

    #[test]
    fn remove_unreachable_code() {
        assert_eq!(
            dce("fn f(x: int) -> int { return x; print(x); } return f(1); f(2);"),
            "fn f(x: int) -> int {\n    return x;\n}\nreturn f(1);\n"
        );
        assert_eq!(dce("if false { print(1); } else { print(2); }"), "{\n    print(2);\n}\n");
        assert_eq!(dce("while false { print(1); } 1 + 2;"), "");
    }

    #[test]
    fn keep_faulting_expressions() {
        assert_eq!(dce("let z = 0; 1 / z;"), "let z = 0;\n(1 / z);\n");
    }

    #[test]
    fn stores_read_by_functions_are_kept() {
        let input = "let y = 1; fn get() -> int { return y; } y = 2; print(get());";
        assert_eq!(
            dce(input),
            "let y = 1;\nfn get() -> int {\n    return y;\n}\ny = 2;\nprint(get());\n"
        );
    }
}
