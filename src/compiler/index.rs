//! The index types used in the compiler.

use index_vec::define_index_type;

define_index_type! {
    /// Index of a node in the syntax tree arena.
    pub struct NodeId = u32;
    DISPLAY_FORMAT = "#{}";
}

define_index_type! {
    /// Index of a function, the program body is function 0.
    pub struct FunctionId = u32;
}

define_index_type! {
    pub struct ScopeId = u32;
}

define_index_type! {
    pub struct SymbolId = u32;
}
