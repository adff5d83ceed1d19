use std::{fs, io};

use abstracta::{
    compiler::{self, code::AbstractedProgram},
    executor::{Interpreter, RunOptions},
    value::Value,
};
use anyhow::Context as _;

use crate::{args::RunCommand, Context};

impl Context {
    pub fn execute_run(&mut self, cmd: RunCommand) -> Result<(), anyhow::Error> {
        let input = fs::read_to_string(&cmd.path)
            .with_context(|| format!("can not read {}", cmd.path.display()))?;
        let program = if cmd.path.extension().is_some_and(|ext| ext == "json") {
            AbstractedProgram::from_json(&input)
                .with_context(|| format!("can not load {}", cmd.path.display()))?
        } else {
            let options = self.compile_options(&cmd.source)?;
            let compilation = compiler::compile(&input, &options)
                .map_err(|diagnostics| self.compile_failed(&diagnostics, cmd.source.diagnostics))?;
            self.report(&compilation.warnings, cmd.source.diagnostics)?;
            compilation.program
        };

        let options = RunOptions {
            inputs: cmd.inputs,
            max_steps: cmd.max_steps,
            max_depth: cmd.max_depth,
            cancel: None,
            trace: cmd.trace,
        };
        let stdout = io::stdout().lock();
        let mut interpreter = Interpreter::new(&program, options, stdout)?;
        let value = interpreter.run().context("runtime error")?;
        if value != Value::Unit {
            println!("{value}");
        }
        Ok(())
    }
}
