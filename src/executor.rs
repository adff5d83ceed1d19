#![allow(clippy::multiple_inherent_impl)]

//! The step-wise interpreter.

use std::{io, rc::Rc};

use crate::{
    compiler::code::{AbstractedProgram, VerifyError},
    errors::{RuntimeError, RuntimeErrorKind},
    frame::Frame,
    fuel::{CancelToken, Fuel},
    utils::Join,
    value::{Closure, Value},
};

/// The call depth limit used when none is configured.
pub const DEFAULT_MAX_DEPTH: usize = 1024;

/// Limits and inputs of a run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Values returned by the `arg` builtin.
    pub inputs: Vec<String>,
    /// Instruction budget, unlimited if `None`.
    pub max_steps: Option<u64>,
    /// Maximum number of frames on the call stack.
    pub max_depth: usize,
    pub cancel: Option<CancelToken>,
    /// Log every executed instruction at trace level.
    pub trace: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions {
            inputs: Vec::new(),
            max_steps: None,
            max_depth: DEFAULT_MAX_DEPTH,
            cancel: None,
            trace: false,
        }
    }
}

/// The state after a step.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Running,
    /// The entry function returned this value.
    Finished(Value),
}

/// Executes an [`AbstractedProgram`] one instruction at a time.
///
/// Values printed by the program are written to `output`. Once the program
/// finished or failed, further steps report the same outcome again.
#[derive(Debug)]
pub struct Interpreter<'p, W> {
    pub(crate) program: &'p AbstractedProgram,
    pub(crate) consts: Vec<Value>,
    pub(crate) globals: Vec<Value>,
    pub(crate) frames: Vec<Frame>,
    pub(crate) options: RunOptions,
    pub(crate) output: W,
    pub(crate) result: Option<Value>,
    fuel: Fuel,
    fault: Option<RuntimeError>,
    steps: u64,
}

impl<'p, W: io::Write> Interpreter<'p, W> {
    /// Verifies the program and prepares the entry frame.
    pub fn new(program: &'p AbstractedProgram, options: RunOptions, output: W) -> Result<Self, VerifyError> {
        program.verify()?;
        let entry = Rc::new(Closure {
            function: 0,
            captures: Vec::new(),
        });
        let frame = Frame::new(entry, &program.functions[0], Vec::new())
            .map_err(|_| VerifyError::InvalidEntry)?;
        let fuel = options.max_steps.map_or_else(Fuel::unlimited, Fuel::with);
        Ok(Interpreter {
            program,
            consts: program.consts.iter().map(Value::from).collect(),
            globals: vec![Value::Unit; program.global_count as usize],
            frames: vec![frame],
            options,
            output,
            result: None,
            fuel,
            fault: None,
            steps: 0,
        })
    }

    /// Executes one instruction.
    pub fn step(&mut self) -> Result<Step, RuntimeError> {
        if let Some(fault) = &self.fault {
            return Err(fault.clone());
        }
        if let Some(result) = &self.result {
            return Ok(Step::Finished(result.clone()));
        }
        let Some(frame) = self.frames.last_mut() else {
            return Ok(Step::Finished(Value::Unit));
        };
        let (function, pc) = (frame.function(), frame.pc);

        let kind = if self
            .options
            .cancel
            .as_ref()
            .is_some_and(CancelToken::is_cancelled)
        {
            Some(RuntimeErrorKind::Cancelled)
        } else if !self.fuel.consume() {
            Some(RuntimeErrorKind::BudgetExceeded)
        } else {
            None
        };
        if let Some(kind) = kind {
            return Err(self.fail(kind, function, pc));
        }

        let opcode = self.program.functions[function].code[pc];
        if self.options.trace {
            log::trace!(
                "[{function}:{pc}] {opcode} | [{}]",
                frame.stack.iter().map(Value::repr).join(", ")
            );
        }
        frame.pc += 1;
        self.steps += 1;

        if let Err(kind) = self.execute(opcode) {
            return Err(self.fail(kind, function, pc));
        }
        Ok(match &self.result {
            Some(result) => Step::Finished(result.clone()),
            None => Step::Running,
        })
    }

    /// Steps until the program finishes or fails.
    pub fn run(&mut self) -> Result<Value, RuntimeError> {
        loop {
            if let Step::Finished(value) = self.step()? {
                log::debug!("finished after {} steps", self.steps);
                return Ok(value);
            }
        }
    }

    /// Number of executed instructions.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Current call depth.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// The call stack, entry frame first.
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn output(&self) -> &W {
        &self.output
    }

    pub fn into_output(self) -> W {
        self.output
    }

    fn fail(&mut self, kind: RuntimeErrorKind, function: usize, pc: usize) -> RuntimeError {
        let error = RuntimeError::new(kind, function, pc);
        log::debug!("runtime error: {error}");
        self.fault = Some(error.clone());
        error
    }

    /// Pushes a frame for `closure`.
    pub(crate) fn call_function(&mut self, closure: Rc<Closure>, args: Vec<Value>) -> Result<(), RuntimeErrorKind> {
        if self.frames.len() >= self.options.max_depth {
            return Err(RuntimeErrorKind::StackExhausted(self.options.max_depth));
        }
        let code = &self.program.functions[closure.function as usize];
        let frame = Frame::new(closure, code, args)?;
        self.frames.push(frame);
        Ok(())
    }

    /// Pops the running frame and hands `value` to its caller.
    pub(crate) fn return_current(&mut self, value: Value) {
        self.frames.pop();
        match self.frames.last_mut() {
            Some(frame) => frame.stack.push(value),
            None => self.result = Some(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{
        code::{ConstValue, FunctionCode},
        opcode::OpCode,
    };

    fn function(name: &str, param_count: u32, slot_count: u32, code: Vec<OpCode>) -> FunctionCode {
        FunctionCode {
            name: name.into(),
            param_count,
            slot_count,
            capture_count: 0,
            code,
        }
    }

    fn recursive() -> AbstractedProgram {
        // fn f() { f() } f()
        AbstractedProgram::new(
            vec![ConstValue::Function(1)],
            0,
            vec![
                function("main", 0, 0, vec![OpCode::LoadConst(0), OpCode::Call(0), OpCode::Return]),
                function("f", 0, 0, vec![OpCode::LoadConst(0), OpCode::Call(0), OpCode::Return]),
            ],
        )
    }

    #[test]
    fn step_until_finished() {
        let program = AbstractedProgram::new(
            vec![ConstValue::Int(1), ConstValue::Int(2)],
            0,
            vec![function(
                "main",
                0,
                0,
                vec![OpCode::LoadConst(0), OpCode::LoadConst(1), OpCode::Add, OpCode::Return],
            )],
        );
        let mut interpreter = Interpreter::new(&program, RunOptions::default(), Vec::new()).unwrap();
        assert_eq!(interpreter.step(), Ok(Step::Running));
        assert_eq!(interpreter.step(), Ok(Step::Running));
        assert_eq!(interpreter.step(), Ok(Step::Running));
        assert_eq!(interpreter.step(), Ok(Step::Finished(Value::Int(3))));
        assert_eq!(interpreter.step(), Ok(Step::Finished(Value::Int(3))));
        assert_eq!(interpreter.steps(), 4);
    }

    #[test]
    fn budget_is_enforced() {
        let program = recursive();
        let options = RunOptions {
            max_steps: Some(10),
            ..RunOptions::default()
        };
        let mut interpreter = Interpreter::new(&program, options, Vec::new()).unwrap();
        let error = interpreter.run().unwrap_err();
        assert_eq!(error.kind, RuntimeErrorKind::BudgetExceeded);
        assert_eq!(interpreter.steps(), 10);
        assert_eq!(interpreter.step(), Err(error));
    }

    #[test]
    fn depth_is_enforced() {
        let program = recursive();
        let options = RunOptions {
            max_depth: 8,
            ..RunOptions::default()
        };
        let mut interpreter = Interpreter::new(&program, options, Vec::new()).unwrap();
        let error = interpreter.run().unwrap_err();
        assert_eq!(error.kind, RuntimeErrorKind::StackExhausted(8));
        assert_eq!((error.function, error.pc), (1, 1));
        assert_eq!(interpreter.depth(), 8);
        let frames = interpreter.frames();
        assert_eq!(frames[0].function(), 0);
        assert!(frames[1..].iter().all(|frame| frame.function() == 1));
        assert_eq!(frames[7].pc, 2);
    }

    #[test]
    fn cancel_before_next_instruction() {
        let program = recursive();
        let cancel = CancelToken::new();
        let options = RunOptions {
            cancel: Some(cancel.clone()),
            ..RunOptions::default()
        };
        let mut interpreter = Interpreter::new(&program, options, Vec::new()).unwrap();
        assert_eq!(interpreter.step(), Ok(Step::Running));
        cancel.cancel();
        assert_eq!(
            interpreter.step(),
            Err(RuntimeError::new(RuntimeErrorKind::Cancelled, 0, 1))
        );
        assert_eq!(interpreter.steps(), 1);
    }

    #[test]
    fn reject_invalid_programs() {
        let program = AbstractedProgram::new(Vec::new(), 0, Vec::new());
        assert_eq!(
            Interpreter::new(&program, RunOptions::default(), Vec::new()).unwrap_err(),
            VerifyError::MissingEntry
        );
    }
}
