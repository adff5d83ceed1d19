#![allow(clippy::multiple_inherent_impl)]

use std::{io, rc::Rc};

use crate::{
    compiler::opcode::OpCode,
    errors::RuntimeErrorKind,
    executor::Interpreter,
    libs::call_builtin,
    ops,
    value::{Closure, Value},
};

impl<W: io::Write> Interpreter<'_, W> {
    /// Executes `opcode` in the top frame. The program counter already points
    /// to the next instruction.
    pub(crate) fn execute(&mut self, opcode: OpCode) -> Result<(), RuntimeErrorKind> {
        let Some(frame) = self.frames.last_mut() else {
            return Err(RuntimeErrorKind::StackUnderflow);
        };
        let stack = &mut frame.stack;

        macro_rules! pop {
            () => {
                stack.pop().ok_or(RuntimeErrorKind::StackUnderflow)?
            };
        }
        macro_rules! pop_n {
            ($count:expr) => {{
                let count = $count as usize;
                if stack.len() < count {
                    return Err(RuntimeErrorKind::StackUnderflow);
                }
                stack.split_off(stack.len() - count)
            }};
        }
        macro_rules! top {
            () => {
                stack.last().ok_or(RuntimeErrorKind::StackUnderflow)?
            };
        }

        match opcode {
            OpCode::Pop => {
                pop!();
            }
            OpCode::Copy => {
                let value = top!().clone();
                stack.push(value);
            }
            OpCode::LoadConst(i) => stack.push(self.consts[i as usize].clone()),
            OpCode::LoadLocal(i) => stack.push(frame.slots[i as usize].clone()),
            OpCode::StoreLocal(i) => frame.slots[i as usize] = pop!(),
            OpCode::LoadGlobal(i) => stack.push(self.globals[i as usize].clone()),
            OpCode::StoreGlobal(i) => self.globals[i as usize] = pop!(),
            OpCode::LoadCapture(i) => {
                let value = frame
                    .closure
                    .captures
                    .get(i as usize)
                    .cloned()
                    .ok_or(RuntimeErrorKind::StackUnderflow)?;
                stack.push(value);
            }
            OpCode::Closure(function) => {
                let captures = pop_n!(self.program.functions[function as usize].capture_count);
                stack.push(Value::Function(Rc::new(Closure { function, captures })));
            }
            OpCode::BuildList(count) => {
                let items = pop_n!(count);
                stack.push(Value::list(items));
            }
            OpCode::GetItem => {
                let index = pop!();
                let target = pop!();
                stack.push(ops::get_item(&target, &index)?);
            }
            OpCode::SetItem => {
                let value = pop!();
                let index = pop!();
                let target = pop!();
                let updated = ops::set_item(target, &index, value.clone())?;
                stack.push(value);
                stack.push(updated);
            }
            OpCode::Neg | OpCode::Not => {
                let operand = pop!();
                if let Some(op) = opcode.un_op() {
                    stack.push(ops::unary(op, &operand)?);
                }
            }
            OpCode::Add
            | OpCode::Sub
            | OpCode::Mul
            | OpCode::Div
            | OpCode::Rem
            | OpCode::Pow
            | OpCode::Eq
            | OpCode::Ne
            | OpCode::Lt
            | OpCode::Le
            | OpCode::Gt
            | OpCode::Ge => {
                let rhs = pop!();
                let lhs = pop!();
                if let Some(op) = opcode.bin_op() {
                    stack.push(ops::binary(op, &lhs, &rhs)?);
                }
            }
            OpCode::Cast(ty) => {
                let value = pop!();
                stack.push(ops::cast(&value, ty)?);
            }
            OpCode::Jump(target) => frame.pc = target as usize,
            OpCode::JumpIfFalse(target) => {
                if !truth(&pop!())? {
                    frame.pc = target as usize;
                }
            }
            OpCode::JumpIfTrueOrPop(target) => {
                if truth(top!())? {
                    frame.pc = target as usize;
                } else {
                    stack.pop();
                }
            }
            OpCode::JumpIfFalseOrPop(target) => {
                if truth(top!())? {
                    stack.pop();
                } else {
                    frame.pc = target as usize;
                }
            }
            OpCode::Call(count) => {
                let args = pop_n!(count);
                match pop!() {
                    Value::Function(closure) => self.call_function(closure, args)?,
                    Value::Builtin(builtin) => {
                        let value = call_builtin(builtin, args, &self.options.inputs, &mut self.output)?;
                        stack.push(value);
                    }
                    callee => {
                        return Err(RuntimeErrorKind::InvalidOperand {
                            operator: "()",
                            ty: callee.type_name(),
                        })
                    }
                }
            }
            OpCode::Return => {
                let value = pop!();
                self.return_current(value);
            }
        }
        Ok(())
    }
}

fn truth(value: &Value) -> Result<bool, RuntimeErrorKind> {
    match value {
        Value::Bool(v) => Ok(*v),
        value => Err(RuntimeErrorKind::InvalidOperand {
            operator: "if",
            ty: value.type_name(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        compiler::{
            code::{AbstractedProgram, ConstValue, FunctionCode},
            opcode::OpCode,
        },
        errors::{RuntimeError, RuntimeErrorKind},
        executor::{Interpreter, RunOptions},
        libs::Builtin,
        value::Value,
    };

    fn run(consts: Vec<ConstValue>, code: Vec<OpCode>) -> (Result<Value, RuntimeError>, String) {
        let program = AbstractedProgram::new(
            consts,
            1,
            vec![FunctionCode {
                name: "main".into(),
                param_count: 0,
                slot_count: 1,
                capture_count: 0,
                code,
            }],
        );
        let mut interpreter = Interpreter::new(&program, RunOptions::default(), Vec::new()).unwrap();
        let result = interpreter.run();
        (result, String::from_utf8(interpreter.into_output()).unwrap())
    }

    #[test]
    fn set_item_leaves_value_and_list() {
        let (result, _) = run(
            vec![ConstValue::Int(1), ConstValue::Int(0), ConstValue::Int(9)],
            vec![
                OpCode::LoadConst(0),
                OpCode::LoadConst(0),
                OpCode::BuildList(2),
                OpCode::LoadConst(1),
                OpCode::LoadConst(2),
                OpCode::SetItem,
                OpCode::StoreLocal(0),
                OpCode::LoadLocal(0),
                OpCode::BuildList(2),
                OpCode::Return,
            ],
        );
        assert_eq!(
            result,
            Ok(Value::list(vec![
                Value::Int(9),
                Value::list(vec![Value::Int(9), Value::Int(1)]),
            ]))
        );
    }

    #[test]
    fn short_circuit_jumps_keep_operand() {
        let (result, _) = run(
            vec![ConstValue::Bool(false), ConstValue::Bool(true)],
            vec![
                OpCode::LoadConst(0),
                OpCode::JumpIfFalseOrPop(3),
                OpCode::LoadConst(1),
                OpCode::Return,
            ],
        );
        assert_eq!(result, Ok(Value::Bool(false)));
    }

    #[test]
    fn call_builtin_writes_output() {
        let (result, output) = run(
            vec![ConstValue::Builtin(Builtin::Print), ConstValue::Str("hi".into())],
            vec![OpCode::LoadConst(0), OpCode::LoadConst(1), OpCode::Call(1), OpCode::Return],
        );
        assert_eq!(result, Ok(Value::Unit));
        assert_eq!(output, "hi\n");
    }

    #[test]
    fn faults_carry_position() {
        let (result, _) = run(
            vec![ConstValue::Int(1), ConstValue::Int(0)],
            vec![OpCode::LoadConst(0), OpCode::LoadConst(1), OpCode::Div, OpCode::Return],
        );
        assert_eq!(result, Err(RuntimeError::new(RuntimeErrorKind::DivisionByZero, 0, 2)));

        let (result, _) = run(
            vec![ConstValue::Int(1)],
            vec![OpCode::LoadConst(0), OpCode::Call(0), OpCode::Return],
        );
        assert_eq!(
            result.map_err(|e| e.kind),
            Err(RuntimeErrorKind::InvalidOperand {
                operator: "()",
                ty: "int"
            })
        );
    }
}
