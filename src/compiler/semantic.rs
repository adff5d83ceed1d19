//! The semantic information of a program.

use std::fmt;

use compact_str::CompactString;
use index_vec::IndexVec;
use indexmap::{IndexMap, IndexSet};
use rustc_hash::{FxBuildHasher, FxHashMap};
use text_size::TextRange;
use thiserror::Error;

use crate::{libs::Builtin, utils::Locatable};

use super::{
    index::{FunctionId, NodeId, ScopeId, SymbolId},
    typing::Type,
};

/// Semantic information of a program.
///
/// [`Semantic`] contains the results of analyzing a program, including the
/// [function] table, [scope] tree and [symbol] table, plus the side tables
/// that decorate the syntax tree: the type of every node and the symbol every
/// identifier resolves to.
///
/// [function]: FunctionInfo
/// [scope]: Scope
/// [symbol]: Symbol
#[derive(Debug, Clone)]
pub struct Semantic {
    pub functions: IndexVec<FunctionId, FunctionInfo>,
    pub scopes: IndexVec<ScopeId, Scope>,
    pub symbols: IndexVec<SymbolId, Symbol>,
    /// The type of every node. Statements have type `unit`.
    pub types: IndexVec<NodeId, Type>,
    /// The symbol of every identifier and declaration node.
    pub resolutions: FxHashMap<NodeId, SymbolId>,
    /// The function of every program, function declaration and lambda node.
    pub node_functions: FxHashMap<NodeId, FunctionId>,
    /// Number of global slots.
    pub global_count: u32,
    pub warnings: Vec<SemanticWarning>,
}

impl Semantic {
    pub fn new(node_count: usize) -> Self {
        Semantic {
            functions: IndexVec::new(),
            scopes: IndexVec::new(),
            symbols: IndexVec::new(),
            types: IndexVec::from_vec(vec![Type::Unit; node_count]),
            resolutions: FxHashMap::default(),
            node_functions: FxHashMap::default(),
            global_count: 0,
            warnings: Vec::new(),
        }
    }

    /// The symbol an identifier or declaration resolves to.
    pub fn symbol_of(&self, node: NodeId) -> Option<&Symbol> {
        self.resolutions.get(&node).map(|id| &self.symbols[*id])
    }

    /// Adds a variable that is not declared in the source, in the innermost
    /// storage of `function`.
    pub fn add_temporary(&mut self, name: CompactString, ty: Type, function: FunctionId) -> SymbolId {
        let storage = if function == FunctionId::from_raw(0) {
            self.global_count += 1;
            Storage::Global(self.global_count - 1)
        } else {
            let info = &mut self.functions[function];
            info.slot_count += 1;
            Storage::Local(info.slot_count - 1)
        };
        let scope = self.functions[function].scope;
        self.symbols.push(Symbol {
            name,
            ty,
            depth: self.scopes[scope].depth,
            kind: SymbolKind::Variable,
            storage,
            function,
            scope,
            range: TextRange::default(),
            reads: 0,
            escapes: false,
        })
    }
}

impl fmt::Display for Semantic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "globals: {}", self.global_count)?;
        for (id, function) in self.functions.iter_enumerated() {
            writeln!(
                f,
                "function {} {}: params={} slots={} captures=[{}]",
                id.index(),
                function.name,
                function.params.len(),
                function.slot_count,
                function
                    .captures
                    .iter()
                    .map(|symbol| self.symbols[*symbol].name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            )?;
        }
        for (id, scope) in self.scopes.iter_enumerated() {
            writeln!(
                f,
                "scope {} {:?} depth={} parent={:?}",
                id.index(),
                scope.kind,
                scope.depth,
                scope.parent.map(|parent| parent.index())
            )?;
            for symbol in scope.bindings.values() {
                let symbol = &self.symbols[*symbol];
                writeln!(
                    f,
                    "    {}: {} {:?} {}",
                    symbol.name, symbol.ty, symbol.kind, symbol.storage
                )?;
            }
        }
        Ok(())
    }
}

/// Kind of function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionKind {
    /// The program body.
    Main,
    /// A `fn` declaration.
    Named,
    Lambda,
}

/// The semantic information of a function.
#[derive(Debug, Clone)]
pub struct FunctionInfo {
    pub name: CompactString,
    pub kind: FunctionKind,
    /// The program, function declaration or lambda node.
    pub node: NodeId,
    /// The function it is nested in.
    pub parent: Option<FunctionId>,
    /// The outermost scope of the function.
    pub scope: ScopeId,
    pub params: Vec<SymbolId>,
    pub returns: Type,
    /// Number of frame slots, parameters included.
    pub slot_count: u32,
    /// Locals of enclosing functions captured by value, in capture order.
    pub captures: IndexSet<SymbolId, FxBuildHasher>,
}

/// The semantic information of a scope.
#[derive(Debug, Clone)]
pub struct Scope {
    pub kind: ScopeKind,
    /// The parent scope it belongs in.
    pub parent: Option<ScopeId>,
    pub depth: u32,
    /// The function it belongs in.
    pub function: FunctionId,
    /// The node that opens the scope.
    pub node: Option<NodeId>,
    /// Symbol bindings in a scope.
    ///
    /// A binding is a mapping from an identifier name to its [`SymbolId`]
    pub bindings: IndexMap<CompactString, SymbolId, FxBuildHasher>,
}

/// The kind of scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    /// The outermost scope, holds the builtins.
    Prelude,
    Program,
    Function,
    Block,
}

/// The semantic information of a symbol.
#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: CompactString,
    pub ty: Type,
    /// Depth of the scope it is declared in.
    pub depth: u32,
    pub kind: SymbolKind,
    pub storage: Storage,
    /// The function it is declared in.
    pub function: FunctionId,
    pub scope: ScopeId,
    /// The range of the symbol definition.
    pub range: TextRange,
    /// Number of reads.
    pub reads: u32,
    /// Referenced from a function other than the one it is declared in.
    pub escapes: bool,
}

/// The kind of symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    Variable,
    Parameter,
    Function,
    Builtin,
}

/// Where the value of a symbol lives at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Storage {
    /// A global slot, for variables of the program body.
    Global(u32),
    /// A frame slot of the declaring function.
    Local(u32),
    /// A constant function.
    Function(FunctionId),
    Builtin(Builtin),
}

impl fmt::Display for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Storage::Global(slot) => write!(f, "global {slot}"),
            Storage::Local(slot) => write!(f, "local {slot}"),
            Storage::Function(function) => write!(f, "function {}", function.index()),
            Storage::Builtin(builtin) => write!(f, "builtin {}", builtin.name()),
        }
    }
}

/// A semantic warning. Warnings never halt the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SemanticWarning {
    #[error("unused variable `{name}`")]
    UnusedVariable { name: String, range: TextRange },
}

impl Locatable for SemanticWarning {
    fn range(&self) -> TextRange {
        match self {
            SemanticWarning::UnusedVariable { range, .. } => *range,
        }
    }
}
