//! The abstracted program, the output of code generation.

use std::fmt;

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    libs::Builtin,
    utils::{escape_str, Float},
};

use super::opcode::OpCode;

/// The format tag of serialized programs.
pub const FORMAT: &str = "abstracta";
/// The version of the serialized format.
pub const VERSION: u32 = 1;

/// A compiled program.
///
/// Every function refers to the shared constant pool by index. Function 0 is
/// the entry, it runs with the global slots and returns the program result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbstractedProgram {
    pub format: CompactString,
    pub version: u32,
    /// Deduplicated constants.
    pub consts: Vec<ConstValue>,
    /// Number of global slots.
    pub global_count: u32,
    pub functions: Vec<FunctionCode>,
}

/// The code of a function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCode {
    pub name: CompactString,
    pub param_count: u32,
    /// Number of local slots, parameters included.
    pub slot_count: u32,
    pub capture_count: u32,
    /// Bytecode, a list of OpCodes.
    pub code: Vec<OpCode>,
}

/// The const value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstValue {
    Unit,
    Int(i64),
    Float(Float),
    Bool(bool),
    Str(CompactString),
    /// A function without captures.
    Function(u32),
    Builtin(Builtin),
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstValue::Unit => write!(f, "unit"),
            ConstValue::Int(v) => write!(f, "int {v}"),
            ConstValue::Float(v) => write!(f, "float {v}"),
            ConstValue::Bool(v) => write!(f, "bool {v}"),
            ConstValue::Str(v) => write!(f, "str \"{}\"", escape_str(v)),
            ConstValue::Function(v) => write!(f, "function {v}"),
            ConstValue::Builtin(v) => write!(f, "builtin {v}"),
        }
    }
}

/// A dangling reference or malformed function in a program.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    #[error("program has no entry function")]
    MissingEntry,
    #[error("entry function takes parameters or captures")]
    InvalidEntry,
    #[error("function {function} has more parameters than slots")]
    ParamsExceedSlots { function: usize },
    #[error("function {function} does not end with a return or jump")]
    FallsOffEnd { function: usize },
    #[error("constant {index} out of range (in function {function} at {pc})")]
    ConstOutOfRange {
        function: usize,
        pc: usize,
        index: u32,
    },
    #[error("local slot {index} out of range (in function {function} at {pc})")]
    LocalOutOfRange {
        function: usize,
        pc: usize,
        index: u32,
    },
    #[error("global slot {index} out of range (in function {function} at {pc})")]
    GlobalOutOfRange {
        function: usize,
        pc: usize,
        index: u32,
    },
    #[error("capture {index} out of range (in function {function} at {pc})")]
    CaptureOutOfRange {
        function: usize,
        pc: usize,
        index: u32,
    },
    #[error("jump target {target} out of range (in function {function} at {pc})")]
    JumpOutOfRange {
        function: usize,
        pc: usize,
        target: u32,
    },
    #[error("function {index} out of range")]
    FunctionOutOfRange { index: u32 },
    #[error("constant {index} refers to function {function}, which captures values")]
    CapturingConst { index: usize, function: u32 },
}

/// An error loading a serialized program.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("malformed program ({0})")]
    Json(#[from] serde_json::Error),
    #[error("unknown format `{0}`")]
    Format(CompactString),
    #[error("unsupported version {0}")]
    Version(u32),
    #[error("invalid program ({0})")]
    Invalid(#[from] VerifyError),
}

impl AbstractedProgram {
    pub fn new(consts: Vec<ConstValue>, global_count: u32, functions: Vec<FunctionCode>) -> Self {
        AbstractedProgram {
            format: FORMAT.into(),
            version: VERSION,
            consts,
            global_count,
            functions,
        }
    }

    /// Serializes the program as pretty printed JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Loads and verifies a serialized program.
    pub fn from_json(text: &str) -> Result<Self, ArtifactError> {
        let program: AbstractedProgram = serde_json::from_str(text)?;
        if program.format != FORMAT {
            return Err(ArtifactError::Format(program.format));
        }
        if program.version != VERSION {
            return Err(ArtifactError::Version(program.version));
        }
        program.verify()?;
        Ok(program)
    }

    /// Checks that every reference of the program resolves.
    pub fn verify(&self) -> Result<(), VerifyError> {
        let entry = self.functions.first().ok_or(VerifyError::MissingEntry)?;
        if entry.param_count != 0 || entry.capture_count != 0 {
            return Err(VerifyError::InvalidEntry);
        }
        let function_count = self.functions.len();
        let check_function = |index: u32| {
            if (index as usize) < function_count {
                Ok(())
            } else {
                Err(VerifyError::FunctionOutOfRange { index })
            }
        };
        for (index, value) in self.consts.iter().enumerate() {
            if let ConstValue::Function(function) = *value {
                check_function(function)?;
                if self.functions[function as usize].capture_count != 0 {
                    return Err(VerifyError::CapturingConst { index, function });
                }
            }
        }

        for (function, code) in self.functions.iter().enumerate() {
            if code.param_count > code.slot_count {
                return Err(VerifyError::ParamsExceedSlots { function });
            }
            if !matches!(code.code.last(), Some(OpCode::Return | OpCode::Jump(_))) {
                return Err(VerifyError::FallsOffEnd { function });
            }
            for (pc, opcode) in code.code.iter().copied().enumerate() {
                match opcode {
                    OpCode::LoadConst(index) if index as usize >= self.consts.len() => {
                        return Err(VerifyError::ConstOutOfRange { function, pc, index });
                    }
                    OpCode::LoadLocal(index) | OpCode::StoreLocal(index)
                        if index >= code.slot_count =>
                    {
                        return Err(VerifyError::LocalOutOfRange { function, pc, index });
                    }
                    OpCode::LoadGlobal(index) | OpCode::StoreGlobal(index)
                        if index >= self.global_count =>
                    {
                        return Err(VerifyError::GlobalOutOfRange { function, pc, index });
                    }
                    OpCode::LoadCapture(index) if index >= code.capture_count => {
                        return Err(VerifyError::CaptureOutOfRange { function, pc, index });
                    }
                    OpCode::Closure(index) => check_function(index)?,
                    _ => (),
                }
                if let Some(target) = opcode.jump_target() {
                    if target as usize >= code.code.len() {
                        return Err(VerifyError::JumpOutOfRange {
                            function,
                            pc,
                            target,
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for AbstractedProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} v{}", self.format, self.version)?;
        writeln!(f, "globals: {}", self.global_count)?;
        writeln!(f, "consts:")?;
        for (i, value) in self.consts.iter().enumerate() {
            writeln!(f, "    {i:<5}{value}")?;
        }
        for (i, function) in self.functions.iter().enumerate() {
            writeln!(
                f,
                "function {} {} (params: {}, slots: {}, captures: {}):",
                i, function.name, function.param_count, function.slot_count, function.capture_count
            )?;
            for (pc, opcode) in function.code.iter().enumerate() {
                writeln!(f, "    {pc:<5}{opcode}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn program(code: Vec<OpCode>) -> AbstractedProgram {
        AbstractedProgram::new(
            vec![ConstValue::Int(1), ConstValue::Float(Float(0.1))],
            1,
            vec![FunctionCode {
                name: "main".into(),
                param_count: 0,
                slot_count: 0,
                capture_count: 0,
                code,
            }],
        )
    }

    #[test]
    fn verify_dangling_references() {
        assert_eq!(program(vec![OpCode::LoadConst(1), OpCode::Return]).verify(), Ok(()));
        assert_eq!(
            program(vec![OpCode::LoadConst(2), OpCode::Return]).verify(),
            Err(VerifyError::ConstOutOfRange {
                function: 0,
                pc: 0,
                index: 2
            })
        );
        assert_eq!(
            program(vec![OpCode::Jump(5), OpCode::Return]).verify(),
            Err(VerifyError::JumpOutOfRange {
                function: 0,
                pc: 0,
                target: 5
            })
        );
        assert_eq!(
            program(vec![OpCode::LoadLocal(0), OpCode::Return]).verify(),
            Err(VerifyError::LocalOutOfRange {
                function: 0,
                pc: 0,
                index: 0
            })
        );
        assert_eq!(
            program(vec![OpCode::LoadConst(0)]).verify(),
            Err(VerifyError::FallsOffEnd { function: 0 })
        );
    }

    #[test]
    fn json_round_trip() {
        let program = program(vec![OpCode::LoadConst(1), OpCode::StoreGlobal(0), OpCode::LoadGlobal(0), OpCode::Return]);
        let json = program.to_json().unwrap();
        let loaded = AbstractedProgram::from_json(&json).unwrap();
        assert_eq!(loaded, program);
        assert_eq!(loaded.to_json().unwrap(), json);
    }

    #[test]
    fn reject_unknown_format() {
        let mut program = program(vec![OpCode::Return]);
        program.format = "other".into();
        let json = program.to_json().unwrap();
        assert!(matches!(
            AbstractedProgram::from_json(&json),
            Err(ArtifactError::Format(_))
        ));
    }
}
