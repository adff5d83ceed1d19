//! The OpCodes of the abstracted program.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{
    ast::{BinOp, UnOp},
    typing::ScalarType,
};

/// The jump target, only used during code generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JumpTarget(pub u32);

/// The operation code.
///
/// Jump operands are instruction offsets in the current function. During
/// code generation they hold a [`JumpTarget`] instead, see
/// [`OpCode::map_jump`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "op", content = "arg", rename_all = "snake_case")]
pub enum OpCode {
    /// Removes the top-of-stack (TOS) item.
    Pop,
    /// Pushes a copy of TOS.
    Copy,
    /// Pushes `consts[i]` onto the stack.
    LoadConst(u32),
    /// Pushes the value of local slot `i` onto the stack.
    LoadLocal(u32),
    /// Stores TOS into local slot `i`.
    StoreLocal(u32),
    /// Pushes the value of global slot `i` onto the stack.
    LoadGlobal(u32),
    /// Stores TOS into global slot `i`.
    StoreGlobal(u32),
    /// Pushes the `i`-th captured value of the running function.
    LoadCapture(u32),
    /// Pops the captures of function `i` and pushes the function value.
    Closure(u32),

    /// Pops `count` items to build a list.
    BuildList(u32),
    /// Implements `TOS = TOS1[TOS]`.
    GetItem,
    /// Implements `TOS2[TOS1] = TOS`, leaving TOS then the updated list.
    SetItem,

    /// Implements `TOS = -TOS`.
    Neg,
    /// Implements `TOS = !TOS`.
    Not,
    /// Implements `TOS = TOS1 + TOS`.
    Add,
    /// Implements `TOS = TOS1 - TOS`.
    Sub,
    /// Implements `TOS = TOS1 * TOS`.
    Mul,
    /// Implements `TOS = TOS1 / TOS`.
    Div,
    /// Implements `TOS = TOS1 % TOS`.
    Rem,
    /// Implements `TOS = TOS1 ** TOS`.
    Pow,
    /// Implements `TOS = TOS1 == TOS`.
    Eq,
    /// Implements `TOS = TOS1 != TOS`.
    Ne,
    /// Implements `TOS = TOS1 < TOS`.
    Lt,
    /// Implements `TOS = TOS1 <= TOS`.
    Le,
    /// Implements `TOS = TOS1 > TOS`.
    Gt,
    /// Implements `TOS = TOS1 >= TOS`.
    Ge,
    /// Implements `TOS = TOS as ty`.
    Cast(ScalarType),

    /// Sets the instruction counter to target.
    Jump(u32),
    /// If TOS is false, sets the instruction counter to target. TOS is popped.
    JumpIfFalse(u32),
    /// If TOS is true, sets the instruction counter to target and leaves TOS on the stack. Otherwise, TOS is popped.
    JumpIfTrueOrPop(u32),
    /// If TOS is false, sets the instruction counter to target and leaves TOS on the stack. Otherwise, TOS is popped.
    JumpIfFalseOrPop(u32),

    /// Pops `count` arguments, then pops a function value and calls it.
    Call(u32),
    /// Returns with TOS to the caller of the function.
    Return,
}

impl OpCode {
    pub fn is_load(self) -> bool {
        matches!(
            self,
            OpCode::LoadConst(_)
                | OpCode::LoadLocal(_)
                | OpCode::LoadGlobal(_)
                | OpCode::LoadCapture(_)
        )
    }

    pub fn is_store(self) -> bool {
        matches!(self, OpCode::StoreLocal(_) | OpCode::StoreGlobal(_))
    }

    /// The jump operand.
    pub fn jump_target(self) -> Option<u32> {
        match self {
            OpCode::Jump(target)
            | OpCode::JumpIfFalse(target)
            | OpCode::JumpIfTrueOrPop(target)
            | OpCode::JumpIfFalseOrPop(target) => Some(target),
            _ => None,
        }
    }

    /// Replaces the jump operand.
    pub fn map_jump(self, f: impl FnOnce(u32) -> u32) -> OpCode {
        match self {
            OpCode::Jump(target) => OpCode::Jump(f(target)),
            OpCode::JumpIfFalse(target) => OpCode::JumpIfFalse(f(target)),
            OpCode::JumpIfTrueOrPop(target) => OpCode::JumpIfTrueOrPop(f(target)),
            OpCode::JumpIfFalseOrPop(target) => OpCode::JumpIfFalseOrPop(f(target)),
            opcode => opcode,
        }
    }

    /// The binary operator this opcode implements.
    pub fn bin_op(self) -> Option<BinOp> {
        Some(match self {
            OpCode::Add => BinOp::Add,
            OpCode::Sub => BinOp::Sub,
            OpCode::Mul => BinOp::Mul,
            OpCode::Div => BinOp::Div,
            OpCode::Rem => BinOp::Rem,
            OpCode::Pow => BinOp::Pow,
            OpCode::Eq => BinOp::Eq,
            OpCode::Ne => BinOp::Ne,
            OpCode::Lt => BinOp::Lt,
            OpCode::Le => BinOp::Le,
            OpCode::Gt => BinOp::Gt,
            OpCode::Ge => BinOp::Ge,
            _ => return None,
        })
    }

    /// The unary operator this opcode implements.
    pub fn un_op(self) -> Option<UnOp> {
        match self {
            OpCode::Neg => Some(UnOp::Neg),
            OpCode::Not => Some(UnOp::Not),
            _ => None,
        }
    }
}

impl From<UnOp> for OpCode {
    fn from(value: UnOp) -> Self {
        match value {
            UnOp::Neg => OpCode::Neg,
            UnOp::Not => OpCode::Not,
        }
    }
}

impl TryFrom<BinOp> for OpCode {
    type Error = BinOp;

    /// Short circuit operators have no opcode.
    fn try_from(value: BinOp) -> Result<Self, BinOp> {
        Ok(match value {
            BinOp::Add => OpCode::Add,
            BinOp::Sub => OpCode::Sub,
            BinOp::Mul => OpCode::Mul,
            BinOp::Div => OpCode::Div,
            BinOp::Rem => OpCode::Rem,
            BinOp::Pow => OpCode::Pow,
            BinOp::Eq => OpCode::Eq,
            BinOp::Ne => OpCode::Ne,
            BinOp::Lt => OpCode::Lt,
            BinOp::Le => OpCode::Le,
            BinOp::Gt => OpCode::Gt,
            BinOp::Ge => OpCode::Ge,
            BinOp::And | BinOp::Or => return Err(value),
        })
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = 20;
        match self {
            Self::Pop => write!(f, "Pop"),
            Self::Copy => write!(f, "Copy"),
            Self::LoadConst(i) => write!(f, "{:width$}{}", "LoadConst", i),
            Self::LoadLocal(i) => write!(f, "{:width$}{}", "LoadLocal", i),
            Self::StoreLocal(i) => write!(f, "{:width$}{}", "StoreLocal", i),
            Self::LoadGlobal(i) => write!(f, "{:width$}{}", "LoadGlobal", i),
            Self::StoreGlobal(i) => write!(f, "{:width$}{}", "StoreGlobal", i),
            Self::LoadCapture(i) => write!(f, "{:width$}{}", "LoadCapture", i),
            Self::Closure(i) => write!(f, "{:width$}{}", "Closure", i),
            Self::BuildList(i) => write!(f, "{:width$}{}", "BuildList", i),
            Self::GetItem => write!(f, "GetItem"),
            Self::SetItem => write!(f, "SetItem"),
            Self::Neg => write!(f, "Neg"),
            Self::Not => write!(f, "Not"),
            Self::Add => write!(f, "Add"),
            Self::Sub => write!(f, "Sub"),
            Self::Mul => write!(f, "Mul"),
            Self::Div => write!(f, "Div"),
            Self::Rem => write!(f, "Rem"),
            Self::Pow => write!(f, "Pow"),
            Self::Eq => write!(f, "Eq"),
            Self::Ne => write!(f, "Ne"),
            Self::Lt => write!(f, "Lt"),
            Self::Le => write!(f, "Le"),
            Self::Gt => write!(f, "Gt"),
            Self::Ge => write!(f, "Ge"),
            Self::Cast(ty) => write!(f, "{:width$}{}", "Cast", ty),
            Self::Jump(i) => write!(f, "{:width$}{}", "Jump", i),
            Self::JumpIfFalse(i) => write!(f, "{:width$}{}", "JumpIfFalse", i),
            Self::JumpIfTrueOrPop(i) => write!(f, "{:width$}{}", "JumpIfTrueOrPop", i),
            Self::JumpIfFalseOrPop(i) => write!(f, "{:width$}{}", "JumpIfFalseOrPop", i),
            Self::Call(i) => write!(f, "{:width$}{}", "Call", i),
            Self::Return => write!(f, "Return"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_serde() {
        let code = vec![OpCode::LoadConst(3), OpCode::Cast(ScalarType::Float), OpCode::Return];
        let json = serde_json::to_string(&code).unwrap();
        assert_eq!(
            json,
            r#"[{"op":"load_const","arg":3},{"op":"cast","arg":"float"},{"op":"return"}]"#
        );
        assert_eq!(serde_json::from_str::<Vec<OpCode>>(&json).unwrap(), code);
    }
}
