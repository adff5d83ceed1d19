//! The Code Generator.
//!
//! Lowers the decorated syntax tree to stack machine code. Jumps are emitted
//! against symbolic [`JumpTarget`]s and resolved to instruction offsets once a
//! function is complete.

use indexmap::IndexSet;
use rustc_hash::{FxBuildHasher, FxHashMap};

use super::{
    ast::{Ast, BinOp, Lit, NodeKind},
    code::{AbstractedProgram, ConstValue, FunctionCode},
    error::InternalError,
    index::{FunctionId, NodeId, SymbolId},
    opcode::{JumpTarget, OpCode},
    semantic::{Semantic, Storage},
};

/// Generate code.
pub fn gen_code(ast: &Ast, semantic: &Semantic) -> Result<AbstractedProgram, InternalError> {
    let mut generator = CodeGenerator {
        ast,
        semantic,
        consts: IndexSet::default(),
        context: Context::new(FunctionId::from_raw(0)),
    };
    let mut functions = Vec::with_capacity(semantic.functions.len());
    for function in semantic.functions.indices() {
        functions.push(generator.gen_function_code(function)?);
    }
    let program = AbstractedProgram::new(
        generator.consts.into_iter().collect(),
        semantic.global_count,
        functions,
    );
    program.verify()?;
    log::debug!(
        "generated {} functions, {} constants",
        program.functions.len(),
        program.consts.len()
    );
    Ok(program)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum CodeMarker {
    OpCode(OpCode),
    JumpTarget(JumpTarget),
}

impl From<OpCode> for CodeMarker {
    fn from(value: OpCode) -> Self {
        CodeMarker::OpCode(value)
    }
}

impl From<JumpTarget> for CodeMarker {
    fn from(value: JumpTarget) -> Self {
        CodeMarker::JumpTarget(value)
    }
}

impl From<&Lit> for ConstValue {
    fn from(value: &Lit) -> Self {
        match value {
            Lit::Int(v) => ConstValue::Int(*v),
            Lit::Float(v) => ConstValue::Float(*v),
            Lit::Bool(v) => ConstValue::Bool(*v),
            Lit::Str(v) => ConstValue::Str(v.clone()),
        }
    }
}

#[derive(Debug, Clone)]
struct Context {
    function: FunctionId,
    code: Vec<CodeMarker>,
    jump_target_count: u32,
    continue_stack: Vec<JumpTarget>,
    break_stack: Vec<JumpTarget>,
}

impl Context {
    fn new(function: FunctionId) -> Self {
        Context {
            function,
            code: Vec::new(),
            jump_target_count: 0,
            continue_stack: Vec::new(),
            break_stack: Vec::new(),
        }
    }
}

struct CodeGenerator<'a> {
    ast: &'a Ast,
    semantic: &'a Semantic,
    consts: IndexSet<ConstValue, FxBuildHasher>,
    context: Context,
}

impl CodeGenerator<'_> {
    fn push_code<T: Into<CodeMarker>>(&mut self, code: T) {
        let code = code.into();
        if code == CodeMarker::OpCode(OpCode::Pop) {
            match self.context.code.as_slice() {
                // `load; Pop` does nothing.
                [.., CodeMarker::OpCode(opcode)] if opcode.is_load() => {
                    self.context.code.pop();
                    return;
                }
                // `Copy; Store; Pop` is `Store`.
                [.., CodeMarker::OpCode(OpCode::Copy), CodeMarker::OpCode(store)]
                    if store.is_store() =>
                {
                    let store = *store;
                    let len = self.context.code.len();
                    self.context.code.truncate(len - 2);
                    self.context.code.push(store.into());
                    return;
                }
                _ => (),
            }
        }
        self.context.code.push(code);
    }

    fn push_load_const(&mut self, value: ConstValue) {
        let const_id = self.add_const(value);
        self.push_code(OpCode::LoadConst(const_id));
    }

    fn add_const(&mut self, value: ConstValue) -> u32 {
        let (index, _) = self.consts.insert_full(value);
        index as u32
    }

    fn get_jump_target(&mut self) -> JumpTarget {
        let jump_target = self.context.jump_target_count;
        self.context.jump_target_count += 1;
        JumpTarget(jump_target)
    }

    fn gen_function_code(&mut self, function: FunctionId) -> Result<FunctionCode, InternalError> {
        let (ast, semantic) = (self.ast, self.semantic);
        let info = &semantic.functions[function];
        let (stmts, tail) = match ast.kind(info.node) {
            NodeKind::Program { stmts, tail } => (stmts, *tail),
            NodeKind::FnDecl { body, .. } | NodeKind::Lambda { body, .. } => {
                match ast.kind(*body) {
                    NodeKind::Block { stmts, tail } => (stmts, *tail),
                    _ => return Err(self.unresolved(*body)),
                }
            }
            _ => return Err(self.unresolved(info.node)),
        };
        self.context = Context::new(function);

        for stmt in stmts {
            self.visit_stmt(*stmt)?;
        }
        if let Some(tail) = tail {
            self.visit_expr(tail)?;
            self.push_code(OpCode::Return);
        } else if self.context.code.last() != Some(&CodeMarker::OpCode(OpCode::Return)) {
            self.push_load_const(ConstValue::Unit);
            self.push_code(OpCode::Return);
        }

        Ok(FunctionCode {
            name: info.name.clone(),
            param_count: info.params.len() as u32,
            slot_count: info.slot_count,
            capture_count: info.captures.len() as u32,
            code: self.resolve_jumps(),
        })
    }

    /// Replaces every jump target by the offset of the instruction after it.
    fn resolve_jumps(&mut self) -> Vec<OpCode> {
        let markers = std::mem::take(&mut self.context.code);
        let mut offsets = FxHashMap::default();
        let mut len = 0;
        for marker in &markers {
            match marker {
                CodeMarker::OpCode(_) => len += 1,
                CodeMarker::JumpTarget(target) => {
                    offsets.insert(*target, len);
                }
            }
        }
        markers
            .into_iter()
            .filter_map(|marker| match marker {
                CodeMarker::OpCode(opcode) => Some(opcode.map_jump(|target| {
                    offsets.get(&JumpTarget(target)).copied().unwrap_or(target)
                })),
                CodeMarker::JumpTarget(_) => None,
            })
            .collect()
    }

    fn unresolved(&self, node: NodeId) -> InternalError {
        InternalError::Unresolved {
            range: self.ast.range(node),
        }
    }

    fn storage(&self, node: NodeId) -> Result<(Storage, SymbolId), InternalError> {
        let symbol = *self
            .semantic
            .resolutions
            .get(&node)
            .ok_or_else(|| self.unresolved(node))?;
        Ok((self.semantic.symbols[symbol].storage, symbol))
    }

    fn load(&mut self, node: NodeId) -> Result<(), InternalError> {
        let (storage, symbol) = self.storage(node)?;
        let opcode = match storage {
            Storage::Global(slot) => OpCode::LoadGlobal(slot),
            Storage::Local(slot) if self.semantic.symbols[symbol].function == self.context.function => {
                OpCode::LoadLocal(slot)
            }
            Storage::Local(_) => {
                let index = self.semantic.functions[self.context.function]
                    .captures
                    .get_index_of(&symbol)
                    .ok_or_else(|| self.unresolved(node))?;
                OpCode::LoadCapture(index as u32)
            }
            Storage::Function(function) => {
                self.push_load_const(ConstValue::Function(function.raw()));
                return Ok(());
            }
            Storage::Builtin(builtin) => {
                self.push_load_const(ConstValue::Builtin(builtin));
                return Ok(());
            }
        };
        self.push_code(opcode);
        Ok(())
    }

    fn store(&mut self, node: NodeId) -> Result<(), InternalError> {
        let (storage, symbol) = self.storage(node)?;
        let opcode = match storage {
            Storage::Global(slot) => OpCode::StoreGlobal(slot),
            // Captured variables are never assigned, so a store is always to
            // a slot of the running function.
            Storage::Local(slot) if self.semantic.symbols[symbol].function == self.context.function => {
                OpCode::StoreLocal(slot)
            }
            _ => return Err(self.unresolved(node)),
        };
        self.push_code(opcode);
        Ok(())
    }

    fn visit_stmt(&mut self, stmt: NodeId) -> Result<(), InternalError> {
        let ast = self.ast;
        match ast.kind(stmt) {
            NodeKind::Let { init, .. } => {
                self.visit_expr(*init)?;
                self.store(stmt)?;
            }
            // Declared functions are constants, they have no code here.
            NodeKind::FnDecl { .. } => (),
            NodeKind::Return { value } => {
                match value {
                    Some(value) => self.visit_expr(*value)?,
                    None => self.push_load_const(ConstValue::Unit),
                }
                self.push_code(OpCode::Return);
            }
            NodeKind::If {
                test,
                consequent,
                alternate,
            } => {
                let else_label = self.get_jump_target();
                self.visit_expr(*test)?;
                self.push_code(OpCode::JumpIfFalse(else_label.0));
                self.visit_stmt(*consequent)?;
                match alternate {
                    Some(alternate) => {
                        let end_label = self.get_jump_target();
                        self.push_code(OpCode::Jump(end_label.0));
                        self.push_code(else_label);
                        self.visit_stmt(*alternate)?;
                        self.push_code(end_label);
                    }
                    None => self.push_code(else_label),
                }
            }
            NodeKind::While { test, body } => {
                let continue_label = self.get_jump_target();
                let break_label = self.get_jump_target();
                self.push_code(continue_label);
                self.visit_expr(*test)?;
                self.push_code(OpCode::JumpIfFalse(break_label.0));
                self.visit_loop_body(*body, continue_label, break_label)?;
                self.push_code(OpCode::Jump(continue_label.0));
                self.push_code(break_label);
            }
            NodeKind::Loop { body } => {
                let continue_label = self.get_jump_target();
                let break_label = self.get_jump_target();
                self.push_code(continue_label);
                self.visit_loop_body(*body, continue_label, break_label)?;
                self.push_code(OpCode::Jump(continue_label.0));
                self.push_code(break_label);
            }
            NodeKind::Break => {
                let label = *self
                    .context
                    .break_stack
                    .last()
                    .ok_or_else(|| self.unresolved(stmt))?;
                self.push_code(OpCode::Jump(label.0));
            }
            NodeKind::Continue => {
                let label = *self
                    .context
                    .continue_stack
                    .last()
                    .ok_or_else(|| self.unresolved(stmt))?;
                self.push_code(OpCode::Jump(label.0));
            }
            NodeKind::Block { stmts, tail } => {
                for stmt in stmts {
                    self.visit_stmt(*stmt)?;
                }
                if let Some(tail) = tail {
                    self.visit_expr(*tail)?;
                    self.push_code(OpCode::Pop);
                }
            }
            NodeKind::ExprStmt { expr } => {
                self.visit_expr(*expr)?;
                self.push_code(OpCode::Pop);
            }
            _ => {
                self.visit_expr(stmt)?;
                self.push_code(OpCode::Pop);
            }
        }
        Ok(())
    }

    fn visit_loop_body(
        &mut self,
        body: NodeId,
        continue_label: JumpTarget,
        break_label: JumpTarget,
    ) -> Result<(), InternalError> {
        self.context.continue_stack.push(continue_label);
        self.context.break_stack.push(break_label);
        let result = self.visit_stmt(body);
        self.context.continue_stack.pop();
        self.context.break_stack.pop();
        result
    }

    fn visit_expr(&mut self, expr: NodeId) -> Result<(), InternalError> {
        let (ast, semantic) = (self.ast, self.semantic);
        match ast.kind(expr) {
            NodeKind::Lit(lit) => self.push_load_const(lit.into()),
            NodeKind::Ident(_) => self.load(expr)?,
            NodeKind::Unary { operator, operand } => {
                self.visit_expr(*operand)?;
                self.push_code(OpCode::from(*operator));
            }
            NodeKind::Binary {
                operator: operator @ (BinOp::And | BinOp::Or),
                left,
                right,
            } => {
                let label = self.get_jump_target();
                self.visit_expr(*left)?;
                self.push_code(if *operator == BinOp::And {
                    OpCode::JumpIfFalseOrPop(label.0)
                } else {
                    OpCode::JumpIfTrueOrPop(label.0)
                });
                self.visit_expr(*right)?;
                self.push_code(label);
            }
            NodeKind::Binary {
                operator,
                left,
                right,
            } => {
                self.visit_expr(*left)?;
                self.visit_expr(*right)?;
                let opcode = OpCode::try_from(*operator).map_err(|_| self.unresolved(expr))?;
                self.push_code(opcode);
            }
            NodeKind::Assign { target, value } => match ast.kind(*target) {
                NodeKind::Index {
                    target: base,
                    index,
                } => {
                    self.load(*base)?;
                    self.visit_expr(*index)?;
                    self.visit_expr(*value)?;
                    self.push_code(OpCode::SetItem);
                    self.store(*base)?;
                }
                _ => {
                    self.visit_expr(*value)?;
                    self.push_code(OpCode::Copy);
                    self.store(*target)?;
                }
            },
            NodeKind::Call { callee, args } => {
                self.visit_expr(*callee)?;
                for arg in args {
                    self.visit_expr(*arg)?;
                }
                self.push_code(OpCode::Call(args.len() as u32));
            }
            NodeKind::Index { target, index } => {
                self.visit_expr(*target)?;
                self.visit_expr(*index)?;
                self.push_code(OpCode::GetItem);
            }
            NodeKind::List { items } => {
                for item in items {
                    self.visit_expr(*item)?;
                }
                self.push_code(OpCode::BuildList(items.len() as u32));
            }
            NodeKind::Cast { expr, ty } => {
                self.visit_expr(*expr)?;
                self.push_code(OpCode::Cast(*ty));
            }
            NodeKind::Lambda { .. } => {
                let function = *semantic
                    .node_functions
                    .get(&expr)
                    .ok_or_else(|| self.unresolved(expr))?;
                let captures = &semantic.functions[function].captures;
                if captures.is_empty() {
                    self.push_load_const(ConstValue::Function(function.raw()));
                } else {
                    for symbol in captures.iter().copied() {
                        self.load_capture(symbol, expr)?;
                    }
                    self.push_code(OpCode::Closure(function.raw()));
                }
            }
            _ => return Err(self.unresolved(expr)),
        }
        Ok(())
    }

    /// Loads a value captured by a lambda created in the running function.
    fn load_capture(
        &mut self,
        symbol: SymbolId,
        lambda: NodeId,
    ) -> Result<(), InternalError> {
        let info = &self.semantic.symbols[symbol];
        let opcode = match info.storage {
            Storage::Local(slot) if info.function == self.context.function => OpCode::LoadLocal(slot),
            Storage::Local(_) => {
                let index = self.semantic.functions[self.context.function]
                    .captures
                    .get_index_of(&symbol)
                    .ok_or_else(|| self.unresolved(lambda))?;
                OpCode::LoadCapture(index as u32)
            }
            _ => return Err(self.unresolved(lambda)),
        };
        self.push_code(opcode);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{analyze_source, CompileOptions};

    fn gen(input: &str) -> AbstractedProgram {
        let (ast, semantic) = analyze_source(input, &CompileOptions::default()).unwrap();
        gen_code(&ast, &semantic).unwrap()
    }

    #[test]
    fn gen_globals_and_calls() {
        let program = gen("let x = 1 + 2; print(x);");
        assert_eq!(
            program.consts,
            [
                ConstValue::Int(1),
                ConstValue::Int(2),
                ConstValue::Builtin(crate::libs::Builtin::Print),
                ConstValue::Unit,
            ]
        );
        assert_eq!(program.global_count, 1);
        assert_eq!(
            program.functions[0].code,
            [
                OpCode::LoadConst(0),
                OpCode::LoadConst(1),
                OpCode::Add,
                OpCode::StoreGlobal(0),
                OpCode::LoadConst(2),
                OpCode::LoadGlobal(0),
                OpCode::Call(1),
                OpCode::Pop,
                OpCode::LoadConst(3),
                OpCode::Return,
            ]
        );
    }

    #[test]
    fn gen_loops_and_short_circuit() {
        let program = gen("let i = 0; while i < 3 && true { i = i + 1; } i");
        assert_eq!(
            program.functions[0].code,
            [
                OpCode::LoadConst(0),
                OpCode::StoreGlobal(0),
                OpCode::LoadGlobal(0),
                OpCode::LoadConst(1),
                OpCode::Lt,
                OpCode::JumpIfFalseOrPop(7),
                OpCode::LoadConst(2),
                OpCode::JumpIfFalse(13),
                OpCode::LoadGlobal(0),
                OpCode::LoadConst(3),
                OpCode::Add,
                OpCode::StoreGlobal(0),
                OpCode::Jump(2),
                OpCode::LoadGlobal(0),
                OpCode::Return,
            ]
        );
    }

    #[test]
    fn gen_functions_and_closures() {
        let program = gen(
            "fn add(a: int) -> fn(int) -> int { return fn(b: int) -> int { a + b }; } add(1)(2)",
        );
        assert_eq!(program.functions.len(), 3);
        let add = &program.functions[1];
        assert_eq!((add.param_count, add.slot_count, add.capture_count), (1, 1, 0));
        assert_eq!(
            add.code,
            [OpCode::LoadLocal(0), OpCode::Closure(2), OpCode::Return]
        );
        let lambda = &program.functions[2];
        assert_eq!((lambda.param_count, lambda.capture_count), (1, 1));
        assert_eq!(
            lambda.code,
            [OpCode::LoadCapture(0), OpCode::LoadLocal(0), OpCode::Add, OpCode::Return]
        );
    }

    #[test]
    fn gen_index_assignment() {
        let program = gen("let xs = [1, 2]; xs[0] = 3; xs");
        assert_eq!(
            program.functions[0].code,
            [
                OpCode::LoadConst(0),
                OpCode::LoadConst(1),
                OpCode::BuildList(2),
                OpCode::StoreGlobal(0),
                OpCode::LoadGlobal(0),
                OpCode::LoadConst(2),
                OpCode::LoadConst(3),
                OpCode::SetItem,
                OpCode::StoreGlobal(0),
                OpCode::Pop,
                OpCode::LoadGlobal(0),
                OpCode::Return,
            ]
        );
    }
}
