use std::fs;

use abstracta::compiler;
use anyhow::Context as _;

use crate::{args::EmitCommand, Context};

impl Context {
    pub fn execute_emit(&mut self, cmd: EmitCommand) -> Result<(), anyhow::Error> {
        let input = fs::read_to_string(&cmd.path)
            .with_context(|| format!("can not read {}", cmd.path.display()))?;
        let options = self.compile_options(&cmd.source)?;
        let out = compiler::emit(&input, cmd.stage.into(), &options)
            .map_err(|diagnostics| self.compile_failed(&diagnostics, cmd.source.diagnostics))?;
        print!("{out}");
        Ok(())
    }
}
