//! Constant folding.

use crate::{
    compiler::{
        ast::{BinOp, Lit, NodeKind},
        index::NodeId,
    },
    ops,
    utils::Float,
    value::Value,
};

use super::Optimizer;

fn value_of(lit: &Lit) -> Value {
    match lit {
        Lit::Int(v) => Value::Int(*v),
        Lit::Float(v) => Value::Float(v.0),
        Lit::Bool(v) => Value::Bool(*v),
        Lit::Str(v) => Value::Str(v.clone()),
    }
}

fn lit_of(value: Value) -> Option<Lit> {
    match value {
        Value::Int(v) => Some(Lit::Int(v)),
        Value::Float(v) => Some(Lit::Float(Float(v))),
        Value::Bool(v) => Some(Lit::Bool(v)),
        Value::Str(v) => Some(Lit::Str(v)),
        _ => None,
    }
}

impl Optimizer<'_> {
    fn lit(&self, id: NodeId) -> Option<Value> {
        match self.kind(id) {
            NodeKind::Lit(lit) => Some(value_of(lit)),
            _ => None,
        }
    }

    /// Replaces every operation on constants by its value. A fold whose
    /// evaluation faults is left for runtime.
    pub(super) fn fold(&mut self) -> usize {
        let mut count = 0;
        // Children come after their parent in pre-order.
        for id in self.ast.reachable().into_iter().rev() {
            let folded = match self.kind(id).clone() {
                NodeKind::Unary { operator, operand } => self
                    .lit(operand)
                    .and_then(|v| ops::unary(operator, &v).ok())
                    .and_then(lit_of)
                    .map(NodeKind::Lit),
                NodeKind::Binary {
                    operator: operator @ (BinOp::And | BinOp::Or),
                    left,
                    right,
                } => match self.lit(left) {
                    // `false && x` is false and `true && x` is x, `||` likewise.
                    Some(Value::Bool(v)) if v == (operator == BinOp::Or) => Some(NodeKind::Lit(Lit::Bool(v))),
                    Some(Value::Bool(_)) => Some(self.kind(right).clone()),
                    _ => None,
                },
                NodeKind::Binary {
                    operator,
                    left,
                    right,
                } => match (self.lit(left), self.lit(right)) {
                    (Some(l), Some(r)) => ops::binary(operator, &l, &r)
                        .ok()
                        .and_then(lit_of)
                        .map(NodeKind::Lit),
                    _ => None,
                },
                NodeKind::Cast { expr, ty } => self
                    .lit(expr)
                    .and_then(|v| ops::cast(&v, ty).ok())
                    .and_then(lit_of)
                    .map(NodeKind::Lit),
                NodeKind::Index { target, index } => match (self.lit(target), self.lit(index)) {
                    (Some(target), Some(index)) => ops::get_item(&target, &index)
                        .ok()
                        .and_then(lit_of)
                        .map(NodeKind::Lit),
                    _ => None,
                },
                _ => None,
            };
            if let Some(kind) = folded {
                self.ast.nodes[id].kind = kind;
                count += 1;
            }
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use crate::compiler::optimizer::{tests::optimized, Pass};

    fn fold(input: &str) -> String {
        optimized(input, &[Pass::ConstantFolding]).0.to_string()
    }

    #[test]
    fn fold_arithmetic() {
        assert_eq!(fold("1 + 2 * 3"), "7\n");
        assert_eq!(fold("-(2 ** 3) as float"), "-8.0\n");
        assert_eq!(fold("\"ab\" + \"c\""), "\"abc\"\n");
        assert_eq!(fold("9223372036854775807 + 1"), "-9223372036854775808\n");
    }

    #[test]
    fn fold_keeps_faults_for_runtime() {
        assert_eq!(fold("1 / 0"), "(1 / 0)\n");
        assert_eq!(fold("\"x\" as int"), "(\"x\" as int)\n");
        assert_eq!(fold("\"abc\"[5]"), "\"abc\"[5]\n");
    }

    #[test]
    fn fold_short_circuit() {
        assert_eq!(fold("let x = false; (1 < 2) && x"), "let x = false;\nx\n");
        assert_eq!(fold("let x = false; false && x"), "let x = false;\nfalse\n");
        assert_eq!(fold("let x = false; true || x"), "let x = false;\ntrue\n");
    }
}
