use std::fs;

use abstracta::compiler;
use anyhow::Context as _;

use crate::{args::CompileCommand, Context};

impl Context {
    pub fn execute_compile(&mut self, cmd: CompileCommand) -> Result<(), anyhow::Error> {
        let input = fs::read_to_string(&cmd.path)
            .with_context(|| format!("can not read {}", cmd.path.display()))?;
        let options = self.compile_options(&cmd.source)?;
        let compilation = compiler::compile(&input, &options)
            .map_err(|diagnostics| self.compile_failed(&diagnostics, cmd.source.diagnostics))?;
        self.report(&compilation.warnings, cmd.source.diagnostics)?;

        let json = compilation.program.to_json()?;
        match &cmd.output {
            Some(path) => {
                fs::write(path, json).with_context(|| format!("can not write {}", path.display()))?;
                log::info!("wrote {}", path.display());
            }
            None => println!("{json}"),
        }
        Ok(())
    }
}
