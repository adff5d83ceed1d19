use std::io;

use crate::{
    compiler::{self, code::AbstractedProgram, diagnostic::Diagnostics, CompileOptions, Compilation},
    errors::Error,
    executor::{Interpreter, RunOptions},
    value::Value,
};

/// Compiles and runs programs with a fixed set of options.
#[derive(Debug, Clone, Default)]
pub struct Context {
    pub compile_options: CompileOptions,
    pub run_options: RunOptions,
}

impl Context {
    pub fn new() -> Context {
        Context::default()
    }

    pub fn with_options(compile_options: CompileOptions, run_options: RunOptions) -> Context {
        Context {
            compile_options,
            run_options,
        }
    }

    pub fn compile(&self, input: &str) -> Result<Compilation, Diagnostics> {
        compiler::compile(input, &self.compile_options)
    }

    /// Runs `program` to completion, writing printed values to `output`.
    pub fn execute<W: io::Write>(&self, program: &AbstractedProgram, output: &mut W) -> Result<Value, Error> {
        let mut interpreter = Interpreter::new(program, self.run_options.clone(), output)?;
        Ok(interpreter.run()?)
    }

    /// Compiles and runs `input`.
    pub fn eval<W: io::Write>(&self, input: &str, output: &mut W) -> Result<Value, Error> {
        let compilation = self.compile(input)?;
        for warning in compilation.warnings.iter() {
            log::warn!("{warning}");
        }
        self.execute(&compilation.program, output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::RuntimeErrorKind;

    #[test]
    fn eval_prints_and_returns() {
        let context = Context::new();
        let mut output = Vec::new();
        let value = context
            .eval("fn double(x: int) -> int { return x * 2; } print(double(4)); double(5)", &mut output)
            .unwrap();
        assert_eq!(value, Value::Int(10));
        assert_eq!(output, b"8\n");
    }

    #[test]
    fn eval_reports_errors() {
        let context = Context::new();
        assert!(matches!(context.eval("x + 1", &mut io::sink()), Err(Error::Compile(_))));
        assert!(matches!(
            context.eval("1 / 0", &mut io::sink()),
            Err(Error::Runtime(error)) if error.kind == RuntimeErrorKind::DivisionByZero
        ));
    }
}
