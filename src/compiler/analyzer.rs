//! The semantic analyzer.
//!
//! Builds the scope tree and symbol table, resolves every identifier and
//! computes the type of every node. Errors are accumulated, an ill-typed node
//! gets the error type so one mistake is reported once.

use std::mem;

use compact_str::CompactString;
use indexmap::IndexSet;
use text_size::TextRange;

use crate::libs::Builtin;

use super::{
    ast::{Ast, BinOp, NodeKind, Signature, UnOp},
    error::{SemanticError, SemanticErrorKind},
    index::{FunctionId, NodeId, ScopeId, SymbolId},
    semantic::{
        FunctionInfo, FunctionKind, Scope, ScopeKind, Semantic, SemanticWarning, Storage, Symbol,
        SymbolKind,
    },
    typing::Type,
};

/// Analyze the program. Returns the semantic information and all errors.
pub fn analyze(ast: &Ast) -> (Semantic, Vec<SemanticError>) {
    let mut analyzer = Analyzer::new(ast);
    analyzer.analyze_program();
    analyzer.finish()
}

/// How an identifier is accessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Read,
    Write,
    /// Index assignment reads the list and writes it back.
    ReadWrite,
}

/// Per function state.
#[derive(Debug, Clone)]
struct FunctionContext {
    function: FunctionId,
    loop_depth: usize,
    next_slot: u32,
    max_slot: u32,
    /// The declared return type, `None` for the program body whose result
    /// type is inferred.
    returns: Option<Type>,
}

impl FunctionContext {
    fn new(function: FunctionId, returns: Option<Type>) -> Self {
        FunctionContext {
            function,
            loop_depth: 0,
            next_slot: 0,
            max_slot: 0,
            returns,
        }
    }
}

struct Analyzer<'a> {
    ast: &'a Ast,
    semantic: Semantic,
    errors: Vec<SemanticError>,
    scope: ScopeId,
    context: FunctionContext,
}

impl<'a> Analyzer<'a> {
    fn new(ast: &'a Ast) -> Self {
        let mut semantic = Semantic::new(ast.nodes.len());
        let main = FunctionId::from_raw(0);
        let prelude = semantic.scopes.push(Scope {
            kind: ScopeKind::Prelude,
            parent: None,
            depth: 0,
            function: main,
            node: None,
            bindings: Default::default(),
        });
        for builtin in Builtin::ALL {
            let symbol = semantic.symbols.push(Symbol {
                name: builtin.name().into(),
                ty: Type::Builtin(builtin),
                depth: 0,
                kind: SymbolKind::Builtin,
                storage: Storage::Builtin(builtin),
                function: main,
                scope: prelude,
                range: TextRange::default(),
                reads: 0,
                escapes: false,
            });
            semantic.scopes[prelude]
                .bindings
                .insert(builtin.name().into(), symbol);
        }
        let program = semantic.scopes.push(Scope {
            kind: ScopeKind::Program,
            parent: Some(prelude),
            depth: 1,
            function: main,
            node: Some(ast.root),
            bindings: Default::default(),
        });
        semantic.functions.push(FunctionInfo {
            name: "main".into(),
            kind: FunctionKind::Main,
            node: ast.root,
            parent: None,
            scope: program,
            params: Vec::new(),
            returns: Type::Unit,
            slot_count: 0,
            captures: IndexSet::default(),
        });
        semantic.node_functions.insert(ast.root, main);
        Analyzer {
            ast,
            semantic,
            errors: Vec::new(),
            scope: program,
            context: FunctionContext::new(main, None),
        }
    }

    fn finish(mut self) -> (Semantic, Vec<SemanticError>) {
        for symbol in &self.semantic.symbols {
            if symbol.kind == SymbolKind::Variable
                && symbol.reads == 0
                && !symbol.name.starts_with('_')
            {
                self.semantic.warnings.push(SemanticWarning::UnusedVariable {
                    name: symbol.name.to_string(),
                    range: symbol.range,
                });
            }
        }
        log::debug!(
            "analyzed {} functions, {} scopes, {} symbols, {} errors",
            self.semantic.functions.len(),
            self.semantic.scopes.len(),
            self.semantic.symbols.len(),
            self.errors.len()
        );
        (self.semantic, self.errors)
    }

    fn error(&mut self, kind: SemanticErrorKind, node: NodeId) {
        self.errors
            .push(SemanticError::new(kind, self.ast.range(node)));
    }

    fn mismatch(&mut self, expected: &Type, found: &Type, node: NodeId) {
        self.error(
            SemanticErrorKind::TypeMismatch {
                expected: expected.clone(),
                found: found.clone(),
            },
            node,
        );
    }

    fn analyze_program(&mut self) {
        let NodeKind::Program { stmts, tail } = self.ast.kind(self.ast.root) else {
            return;
        };
        self.check_body(stmts);
        if let Some(tail) = tail {
            let ty = self.infer_expr(*tail);
            self.expect_return(&ty, *tail);
        } else if !stmts.iter().any(|stmt| self.terminates(*stmt)) {
            self.expect_return(&Type::Unit, self.ast.root);
        }
        let main = self.context.function;
        self.semantic.functions[main].returns = self.context.returns.clone().unwrap_or(Type::Unit);
    }

    /// Records a returned type of the current function.
    fn expect_return(&mut self, ty: &Type, node: NodeId) {
        match &self.context.returns {
            Some(returns) => {
                if !ty.compatible(returns) {
                    let returns = returns.clone();
                    self.mismatch(&returns, ty, node);
                }
            }
            None => self.context.returns = Some(ty.clone()),
        }
    }

    fn enter_scope(&mut self, kind: ScopeKind, node: NodeId) -> (ScopeId, u32) {
        let depth = self.semantic.scopes[self.scope].depth + 1;
        let scope = self.semantic.scopes.push(Scope {
            kind,
            parent: Some(self.scope),
            depth,
            function: self.context.function,
            node: Some(node),
            bindings: Default::default(),
        });
        let saved = (self.scope, self.context.next_slot);
        self.scope = scope;
        saved
    }

    /// Leaves the current scope, its frame slots are reused by the next
    /// sibling scope.
    fn leave_scope(&mut self, (scope, next_slot): (ScopeId, u32)) {
        self.scope = scope;
        self.context.next_slot = next_slot;
    }

    /// Allocates the storage of a new variable of the current function.
    fn alloc_storage(&mut self) -> Storage {
        if self.semantic.functions[self.context.function].kind == FunctionKind::Main {
            self.semantic.global_count += 1;
            Storage::Global(self.semantic.global_count - 1)
        } else {
            let slot = self.context.next_slot;
            self.context.next_slot += 1;
            self.context.max_slot = self.context.max_slot.max(self.context.next_slot);
            Storage::Local(slot)
        }
    }

    /// Declares a symbol in the current scope.
    fn declare(
        &mut self,
        name: &CompactString,
        ty: Type,
        kind: SymbolKind,
        storage: Storage,
        node: NodeId,
        range: TextRange,
    ) -> SymbolId {
        let scope = &self.semantic.scopes[self.scope];
        let symbol = Symbol {
            name: name.clone(),
            ty,
            depth: scope.depth,
            kind,
            storage,
            function: self.context.function,
            scope: self.scope,
            range,
            reads: 0,
            escapes: false,
        };
        let redeclared = scope.bindings.contains_key(name);
        let id = self.semantic.symbols.push(symbol);
        if redeclared {
            self.error(
                SemanticErrorKind::Redeclaration {
                    name: name.to_string(),
                },
                node,
            );
        } else {
            self.semantic.scopes[self.scope]
                .bindings
                .insert(name.clone(), id);
        }
        id
    }

    /// Resolves `name` innermost to outermost.
    fn resolve(&mut self, name: &str, node: NodeId, access: Access) -> Option<SymbolId> {
        let mut scope = Some(self.scope);
        let mut found = None;
        while let Some(id) = scope {
            let s = &self.semantic.scopes[id];
            if let Some(symbol) = s.bindings.get(name) {
                found = Some(*symbol);
                break;
            }
            scope = s.parent;
        }
        let Some(id) = found else {
            self.error(
                SemanticErrorKind::UndefinedReference {
                    name: name.to_owned(),
                },
                node,
            );
            return None;
        };

        let current = self.context.function;
        let owner = self.semantic.symbols[id].function;
        if owner != current && matches!(self.semantic.symbols[id].storage, Storage::Local(_)) {
            // Every function between the use and the declaration captures it.
            let mut function = Some(current);
            while let Some(f) = function {
                if f == owner {
                    break;
                }
                if self.semantic.functions[f].kind != FunctionKind::Lambda {
                    self.error(
                        SemanticErrorKind::InvalidCapture {
                            name: name.to_owned(),
                        },
                        node,
                    );
                    return None;
                }
                self.semantic.functions[f].captures.insert(id);
                function = self.semantic.functions[f].parent;
            }
            if access != Access::Read {
                self.error(
                    SemanticErrorKind::AssignToCapture {
                        name: name.to_owned(),
                    },
                    node,
                );
            }
        }

        let symbol = &mut self.semantic.symbols[id];
        if owner != current {
            symbol.escapes = true;
        }
        if access != Access::Write {
            symbol.reads += 1;
        }
        self.semantic.resolutions.insert(node, id);
        Some(id)
    }

    /// Checks the statements of a body. `fn` declarations are registered
    /// first, so they can be used before they are declared.
    fn check_body(&mut self, stmts: &[NodeId]) {
        for stmt in stmts {
            if let NodeKind::FnDecl {
                name, signature, ..
            } = self.ast.kind(*stmt)
            {
                let function = self.new_function(name.clone(), FunctionKind::Named, *stmt, signature);
                let range = self.ast.range(*stmt);
                let symbol = self.declare(
                    name,
                    signature.ty(),
                    SymbolKind::Function,
                    Storage::Function(function),
                    *stmt,
                    range,
                );
                self.semantic.resolutions.insert(*stmt, symbol);
            }
        }
        for stmt in stmts {
            self.check_stmt(*stmt);
        }
    }

    fn new_function(
        &mut self,
        name: CompactString,
        kind: FunctionKind,
        node: NodeId,
        signature: &Signature,
    ) -> FunctionId {
        let function = self.semantic.functions.push(FunctionInfo {
            name,
            kind,
            node,
            parent: Some(self.context.function),
            scope: self.scope,
            params: Vec::new(),
            returns: signature.returns.clone(),
            slot_count: 0,
            captures: IndexSet::default(),
        });
        self.semantic.node_functions.insert(node, function);
        function
    }

    fn check_function(&mut self, function: FunctionId, signature: &Signature, body: NodeId) {
        let context = FunctionContext::new(function, Some(signature.returns.clone()));
        let outer_context = mem::replace(&mut self.context, context);
        let saved = self.enter_scope(ScopeKind::Function, self.semantic.functions[function].node);
        self.semantic.functions[function].scope = self.scope;

        let mut params = Vec::with_capacity(signature.params.len());
        for param in &signature.params {
            let storage = self.alloc_storage();
            let node = self.semantic.functions[function].node;
            params.push(self.declare(
                &param.name,
                param.ty.clone(),
                SymbolKind::Parameter,
                storage,
                node,
                param.range,
            ));
        }
        self.semantic.functions[function].params = params;

        if let NodeKind::Block { stmts, tail } = self.ast.kind(body) {
            self.check_body(stmts);
            if let Some(tail) = tail {
                self.check_expr(*tail, &signature.returns);
            } else if signature.returns != Type::Unit
                && !signature.returns.is_error()
                && !stmts.iter().any(|stmt| self.terminates(*stmt))
            {
                self.mismatch(&signature.returns, &Type::Unit, body);
            }
        }

        self.leave_scope(saved);
        self.semantic.functions[function].slot_count = self.context.max_slot;
        self.context = outer_context;
    }

    fn check_block(&mut self, block: NodeId) {
        let saved = self.enter_scope(ScopeKind::Block, block);
        if let NodeKind::Block { stmts, .. } = self.ast.kind(block) {
            self.check_body(stmts);
        }
        self.leave_scope(saved);
    }

    fn check_stmt(&mut self, stmt: NodeId) {
        match self.ast.kind(stmt) {
            NodeKind::Let { name, ty, init } => {
                let ty = match ty {
                    Some(ty) => {
                        self.check_expr(*init, ty);
                        ty.clone()
                    }
                    None => self.infer_expr(*init),
                };
                let storage = self.alloc_storage();
                let range = self.ast.range(stmt);
                let symbol = self.declare(name, ty, SymbolKind::Variable, storage, stmt, range);
                self.semantic.resolutions.insert(stmt, symbol);
            }
            NodeKind::FnDecl {
                signature, body, ..
            } => {
                if let Some(function) = self.semantic.node_functions.get(&stmt).copied() {
                    self.check_function(function, signature, *body);
                }
            }
            NodeKind::Return { value } => {
                let ty = match (value, self.context.returns.clone()) {
                    (Some(value), Some(returns)) => {
                        self.check_expr(*value, &returns);
                        return;
                    }
                    (Some(value), None) => self.infer_expr(*value),
                    (None, _) => Type::Unit,
                };
                self.expect_return(&ty, stmt);
            }
            NodeKind::If {
                test,
                consequent,
                alternate,
            } => {
                self.check_expr(*test, &Type::Bool);
                self.check_block(*consequent);
                if let Some(alternate) = alternate {
                    if matches!(self.ast.kind(*alternate), NodeKind::If { .. }) {
                        self.check_stmt(*alternate);
                    } else {
                        self.check_block(*alternate);
                    }
                }
            }
            NodeKind::While { test, body } => {
                self.check_expr(*test, &Type::Bool);
                self.context.loop_depth += 1;
                self.check_block(*body);
                self.context.loop_depth -= 1;
            }
            NodeKind::Loop { body } => {
                self.context.loop_depth += 1;
                self.check_block(*body);
                self.context.loop_depth -= 1;
            }
            NodeKind::Break => {
                if self.context.loop_depth == 0 {
                    self.error(SemanticErrorKind::BreakOutsideLoop, stmt);
                }
            }
            NodeKind::Continue => {
                if self.context.loop_depth == 0 {
                    self.error(SemanticErrorKind::ContinueOutsideLoop, stmt);
                }
            }
            NodeKind::ExprStmt { expr } => {
                self.infer_expr(*expr);
            }
            NodeKind::Block { .. } => self.check_block(stmt),
            _ => {
                self.infer_expr(stmt);
            }
        }
    }

    /// Checks `expr` against the `expected` type.
    fn check_expr(&mut self, expr: NodeId, expected: &Type) -> Type {
        if let (NodeKind::List { items }, Type::List(item_ty)) = (self.ast.kind(expr), expected) {
            for item in items {
                self.check_expr(*item, item_ty);
            }
            self.semantic.types[expr] = expected.clone();
            return expected.clone();
        }
        let ty = self.infer_expr(expr);
        if !ty.compatible(expected) {
            self.mismatch(expected, &ty, expr);
        }
        ty
    }

    /// Computes the type of `expr`.
    fn infer_expr(&mut self, expr: NodeId) -> Type {
        let ty = self.infer_expr_kind(expr);
        self.semantic.types[expr] = ty.clone();
        ty
    }

    fn infer_expr_kind(&mut self, expr: NodeId) -> Type {
        match self.ast.kind(expr) {
            NodeKind::Lit(lit) => lit.ty(),
            NodeKind::Ident(name) => match self.resolve(name, expr, Access::Read) {
                Some(symbol) => self.semantic.symbols[symbol].ty.clone(),
                None => Type::Error,
            },
            NodeKind::Unary { operator, operand } => match operator {
                UnOp::Neg => {
                    let ty = self.infer_expr(*operand);
                    if ty.is_numeric() || ty == Type::Error {
                        ty
                    } else {
                        self.invalid_operand("-", ty, expr)
                    }
                }
                UnOp::Not => {
                    self.check_expr(*operand, &Type::Bool);
                    Type::Bool
                }
            },
            NodeKind::Binary {
                operator,
                left,
                right,
            } => self.infer_binary(*operator, *left, *right, expr),
            NodeKind::Assign { target, value } => self.infer_assign(*target, *value),
            NodeKind::Call { callee, args } => {
                let callee_ty = self.infer_expr(*callee);
                match callee_ty {
                    Type::Function { params, returns } => {
                        if params.len() != args.len() {
                            self.error(
                                SemanticErrorKind::ArityMismatch {
                                    expected: params.len(),
                                    found: args.len(),
                                },
                                expr,
                            );
                            for arg in args {
                                self.infer_expr(*arg);
                            }
                        } else {
                            for (arg, param) in args.iter().zip(&params) {
                                self.check_expr(*arg, param);
                            }
                        }
                        *returns
                    }
                    Type::Builtin(builtin) => self.infer_builtin_call(builtin, args, expr),
                    Type::Error => {
                        for arg in args {
                            self.infer_expr(*arg);
                        }
                        Type::Error
                    }
                    ty => {
                        for arg in args {
                            self.infer_expr(*arg);
                        }
                        self.invalid_operand("()", ty, expr)
                    }
                }
            }
            NodeKind::Index { target, index } => {
                let target_ty = self.infer_expr(*target);
                self.check_expr(*index, &Type::Int);
                match target_ty {
                    Type::List(item) => *item,
                    Type::Str => Type::Str,
                    Type::Error => Type::Error,
                    ty => self.invalid_operand("[]", ty, expr),
                }
            }
            NodeKind::List { items } => match items.split_first() {
                Some((first, rest)) => {
                    let item_ty = self.infer_expr(*first);
                    for item in rest {
                        self.check_expr(*item, &item_ty);
                    }
                    Type::list(item_ty)
                }
                None => {
                    self.error(SemanticErrorKind::CannotInfer, expr);
                    Type::Error
                }
            },
            NodeKind::Cast { expr: operand, ty } => {
                let operand_ty = self.infer_expr(*operand);
                if operand_ty.scalar().is_none() && operand_ty != Type::Error {
                    self.invalid_operand("as", operand_ty, expr);
                }
                Type::from(*ty)
            }
            NodeKind::Lambda { signature, body } => {
                let function = self.new_function("lambda".into(), FunctionKind::Lambda, expr, signature);
                self.check_function(function, signature, *body);
                signature.ty()
            }
            _ => Type::Unit,
        }
    }

    fn invalid_operand(&mut self, operator: &str, ty: Type, node: NodeId) -> Type {
        if ty != Type::Error {
            self.error(
                SemanticErrorKind::InvalidOperand {
                    operator: operator.to_owned(),
                    ty,
                },
                node,
            );
        }
        Type::Error
    }

    fn infer_binary(&mut self, operator: BinOp, left: NodeId, right: NodeId, expr: NodeId) -> Type {
        if operator.is_logical() {
            self.check_expr(left, &Type::Bool);
            self.check_expr(right, &Type::Bool);
            return Type::Bool;
        }
        let left_ty = self.infer_expr(left);
        self.check_expr(right, &left_ty);
        if left_ty == Type::Error {
            return if operator.is_comparison() {
                Type::Bool
            } else {
                Type::Error
            };
        }
        let valid = match operator {
            BinOp::Add => matches!(left_ty, Type::Int | Type::Float | Type::Str),
            BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Rem | BinOp::Pow => left_ty.is_numeric(),
            BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
                matches!(left_ty, Type::Int | Type::Float | Type::Str)
            }
            BinOp::Eq | BinOp::Ne => left_ty.is_equatable(),
            BinOp::And | BinOp::Or => true,
        };
        if !valid {
            let ty = self.invalid_operand(&operator.to_string(), left_ty, expr);
            return if operator.is_comparison() { Type::Bool } else { ty };
        }
        if operator.is_comparison() {
            Type::Bool
        } else {
            left_ty
        }
    }

    fn infer_assign(&mut self, target: NodeId, value: NodeId) -> Type {
        match self.ast.kind(target) {
            NodeKind::Ident(name) => {
                let Some(symbol) = self.resolve(name, target, Access::Write) else {
                    self.infer_expr(value);
                    return Type::Error;
                };
                let symbol = &self.semantic.symbols[symbol];
                if !matches!(symbol.kind, SymbolKind::Variable | SymbolKind::Parameter) {
                    self.error(SemanticErrorKind::InvalidAssignTarget, target);
                    self.infer_expr(value);
                    return Type::Error;
                }
                let ty = symbol.ty.clone();
                self.semantic.types[target] = ty.clone();
                self.check_expr(value, &ty);
                ty
            }
            NodeKind::Index {
                target: base,
                index,
            } if matches!(self.ast.kind(*base), NodeKind::Ident(_)) => {
                let NodeKind::Ident(name) = self.ast.kind(*base) else {
                    return Type::Error;
                };
                let base_ty = match self.resolve(name, *base, Access::ReadWrite) {
                    Some(symbol) => {
                        let symbol = &self.semantic.symbols[symbol];
                        if matches!(symbol.kind, SymbolKind::Variable | SymbolKind::Parameter) {
                            symbol.ty.clone()
                        } else {
                            self.error(SemanticErrorKind::InvalidAssignTarget, target);
                            Type::Error
                        }
                    }
                    None => Type::Error,
                };
                self.semantic.types[*base] = base_ty.clone();
                self.check_expr(*index, &Type::Int);
                let item_ty = match base_ty {
                    Type::List(item) => *item,
                    Type::Error => Type::Error,
                    ty => self.invalid_operand("[]=", ty, target),
                };
                self.semantic.types[target] = item_ty.clone();
                self.check_expr(value, &item_ty);
                item_ty
            }
            _ => {
                self.error(SemanticErrorKind::InvalidAssignTarget, target);
                self.infer_expr(value);
                Type::Error
            }
        }
    }

    fn infer_builtin_call(&mut self, builtin: Builtin, args: &[NodeId], expr: NodeId) -> Type {
        let arity = builtin.arity();
        if args.len() != arity {
            self.error(
                SemanticErrorKind::ArityMismatch {
                    expected: arity,
                    found: args.len(),
                },
                expr,
            );
            for arg in args {
                self.infer_expr(*arg);
            }
            return builtin.returns();
        }
        match builtin {
            Builtin::Print => {
                self.infer_expr(args[0]);
                Type::Unit
            }
            Builtin::Len => {
                let ty = self.infer_expr(args[0]);
                if !matches!(ty, Type::List(_) | Type::Str | Type::Error) {
                    self.invalid_operand("len", ty, args[0]);
                }
                Type::Int
            }
            Builtin::Arg => {
                self.check_expr(args[0], &Type::Int);
                Type::Str
            }
            Builtin::ArgCount => Type::Int,
            Builtin::Push => {
                let list_ty = self.infer_expr(args[0]);
                match &list_ty {
                    Type::List(item) => {
                        self.check_expr(args[1], item);
                        list_ty
                    }
                    Type::Error => {
                        self.infer_expr(args[1]);
                        Type::Error
                    }
                    _ => {
                        self.infer_expr(args[1]);
                        self.invalid_operand("push", list_ty, args[0])
                    }
                }
            }
        }
    }

    /// Whether control never reaches the end of `stmt`.
    fn terminates(&self, stmt: NodeId) -> bool {
        match self.ast.kind(stmt) {
            NodeKind::Return { .. } => true,
            NodeKind::Block { stmts, .. } => stmts.iter().any(|stmt| self.terminates(*stmt)),
            NodeKind::If {
                consequent,
                alternate: Some(alternate),
                ..
            } => self.terminates(*consequent) && self.terminates(*alternate),
            NodeKind::Loop { body } => !self.contains_break(*body),
            _ => false,
        }
    }

    /// Whether `node` contains a `break` of the enclosing loop.
    fn contains_break(&self, node: NodeId) -> bool {
        match self.ast.kind(node) {
            NodeKind::Break => true,
            NodeKind::Loop { .. }
            | NodeKind::While { .. }
            | NodeKind::FnDecl { .. }
            | NodeKind::Lambda { .. } => false,
            kind => kind
                .children()
                .into_iter()
                .flatten()
                .any(|child| self.contains_break(child)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{
        grammar::Grammar,
        lexer::{tokenize, LexerRecovery},
        parser::parse,
    };

    fn analyze_str(input: &str) -> (Ast, Semantic, Vec<SemanticError>) {
        let grammar = Grammar::default();
        let tokens: Vec<_> = tokenize(input, &grammar, LexerRecovery::Halt)
            .map(Result::unwrap)
            .collect();
        let (ast, errors) = parse(input, &grammar, tokens);
        assert!(errors.is_empty(), "{errors:?}");
        let (semantic, errors) = analyze(&ast);
        (ast, semantic, errors)
    }

    fn error_kinds(input: &str) -> Vec<SemanticErrorKind> {
        analyze_str(input).2.into_iter().map(|e| e.kind).collect()
    }

    #[test]
    fn analyze_undefined_reference() {
        assert_eq!(
            error_kinds("x + 1"),
            vec![SemanticErrorKind::UndefinedReference {
                name: "x".to_owned()
            }]
        );
    }

    #[test]
    fn analyze_types() {
        let (ast, semantic, errors) = analyze_str("let x = 1 + 2 * 3; let s = x as str + \"!\"; s");
        assert!(errors.is_empty());
        let NodeKind::Program { tail: Some(tail), .. } = ast.kind(ast.root) else {
            panic!("no tail");
        };
        assert_eq!(semantic.types[*tail], Type::Str);
        assert_eq!(semantic.functions[FunctionId::from_raw(0)].returns, Type::Str);
        assert_eq!(semantic.global_count, 2);
    }

    #[test]
    fn analyze_type_errors() {
        assert_eq!(
            error_kinds("let x: int = 1.5; let b = true + 1;"),
            vec![
                SemanticErrorKind::TypeMismatch {
                    expected: Type::Int,
                    found: Type::Float
                },
                SemanticErrorKind::TypeMismatch {
                    expected: Type::Bool,
                    found: Type::Int
                },
                SemanticErrorKind::InvalidOperand {
                    operator: "+".to_owned(),
                    ty: Type::Bool
                },
            ]
        );
    }

    #[test]
    fn analyze_functions() {
        let input = "fn even(n: int) -> bool { if n == 0 { return true; } return odd(n - 1); }\n\
                     fn odd(n: int) -> bool { if n == 0 { return false; } return even(n - 1); }\n\
                     even(10)";
        let (_, semantic, errors) = analyze_str(input);
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(semantic.functions.len(), 3);
        assert_eq!(semantic.functions[FunctionId::from_raw(1)].slot_count, 1);
    }

    #[test]
    fn analyze_redeclaration_and_arity() {
        assert_eq!(
            error_kinds("let a = 1; let a = 2; fn f(x: int) {} f(a, a);"),
            vec![
                SemanticErrorKind::Redeclaration {
                    name: "a".to_owned()
                },
                SemanticErrorKind::ArityMismatch {
                    expected: 1,
                    found: 2
                },
            ]
        );
    }

    #[test]
    fn analyze_captures() {
        let input = "fn outer(a: int) -> int {\n\
                         let f = fn(b: int) -> int { a + b };\n\
                         return f(1);\n\
                     }\n\
                     outer(2)";
        let (_, semantic, errors) = analyze_str(input);
        assert!(errors.is_empty(), "{errors:?}");
        let lambda = &semantic.functions[FunctionId::from_raw(2)];
        assert_eq!(lambda.kind, FunctionKind::Lambda);
        assert_eq!(lambda.captures.len(), 1);

        assert_eq!(
            error_kinds("fn outer(a: int) -> int { fn inner() -> int { a } return inner(); } outer(1)"),
            vec![SemanticErrorKind::InvalidCapture {
                name: "a".to_owned()
            }]
        );
    }

    #[test]
    fn analyze_loops_and_returns() {
        assert_eq!(
            error_kinds("break; fn f() -> int { if true { return 1; } }"),
            vec![
                SemanticErrorKind::BreakOutsideLoop,
                SemanticErrorKind::TypeMismatch {
                    expected: Type::Int,
                    found: Type::Unit
                },
            ]
        );
        assert!(error_kinds("fn f() -> int { loop { return 1; } } f();").is_empty());
    }

    #[test]
    fn analyze_block_slots_are_reused() {
        let input = "fn f() -> int { { let a = 1; print(a); } { let b = 2; print(b); } return 0; } f()";
        let (_, semantic, errors) = analyze_str(input);
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(semantic.functions[FunctionId::from_raw(1)].slot_count, 1);
    }

    #[test]
    fn analyze_unused_variable_warning() {
        let (_, semantic, errors) = analyze_str("let x = 1; let _y = 2; let z = 3; z");
        assert!(errors.is_empty());
        assert_eq!(
            semantic.warnings,
            vec![SemanticWarning::UnusedVariable {
                name: "x".to_owned(),
                range: TextRange::new(0.into(), 10.into()),
            }]
        );
    }

    #[test]
    fn analyze_empty_list() {
        assert_eq!(
            error_kinds("let xs = [];"),
            vec![SemanticErrorKind::CannotInfer]
        );
        assert!(error_kinds("let xs: [int] = []; xs").is_empty());
    }
}
