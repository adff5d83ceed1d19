//! Call frames.

use std::{fmt, rc::Rc};

use crate::{
    compiler::code::FunctionCode,
    errors::RuntimeErrorKind,
    utils::Join,
    value::{Closure, Value},
};

/// The state of a running function.
#[derive(Debug, Clone)]
pub struct Frame {
    /// The function value being run, with its captured environment.
    pub closure: Rc<Closure>,
    /// Offset of the next instruction.
    pub pc: usize,
    /// Parameters first, then locals.
    pub slots: Vec<Value>,
    /// The operand stack.
    pub stack: Vec<Value>,
}

impl Frame {
    pub(crate) fn new(
        closure: Rc<Closure>,
        code: &FunctionCode,
        mut args: Vec<Value>,
    ) -> Result<Self, RuntimeErrorKind> {
        let param_count = code.param_count as usize;
        if args.len() != param_count {
            return Err(RuntimeErrorKind::ArityMismatch {
                expected: param_count,
                found: args.len(),
            });
        }
        args.resize(code.slot_count as usize, Value::Unit);
        Ok(Frame {
            closure,
            pc: 0,
            slots: args,
            stack: Vec::new(),
        })
    }

    /// Index of the running function.
    pub fn function(&self) -> usize {
        self.closure.function as usize
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "function: {}", self.closure.function)?;
        writeln!(f, "pc: {}", self.pc)?;
        writeln!(f, "slots: [{}]", self.slots.iter().map(Value::repr).join(", "))?;
        writeln!(
            f,
            "captures: [{}]",
            self.closure.captures.iter().map(Value::repr).join(", ")
        )?;
        write!(f, "stack: [{}]", self.stack.iter().map(Value::repr).join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(param_count: u32, slot_count: u32) -> FunctionCode {
        FunctionCode {
            name: "f".into(),
            param_count,
            slot_count,
            capture_count: 0,
            code: Vec::new(),
        }
    }

    #[test]
    fn frame_slots_start_with_arguments() {
        let closure = Rc::new(Closure {
            function: 1,
            captures: Vec::new(),
        });
        let frame = Frame::new(closure.clone(), &code(1, 3), vec![Value::Int(5)]).unwrap();
        assert_eq!(frame.slots, [Value::Int(5), Value::Unit, Value::Unit]);
        assert_eq!(frame.function(), 1);
        assert_eq!(
            Frame::new(closure, &code(2, 2), vec![Value::Int(5)]).unwrap_err(),
            RuntimeErrorKind::ArityMismatch {
                expected: 2,
                found: 1
            }
        );
    }
}
