use abstracta::compiler::{diagnostic::Diagnostics, grammar::Grammar, CompileOptions};
use anyhow::Context as _;

use crate::{
    args::{AbstractaCliArgs, AbstractaCliCommand, DiagnosticsFormat, SourceArgs},
    Context,
};

mod compile;
mod emit;
mod run;

impl Context {
    pub fn execute(&mut self, args: AbstractaCliArgs) -> Result<(), anyhow::Error> {
        match args.cmd {
            AbstractaCliCommand::Compile(cmd) => self.execute_compile(cmd),
            AbstractaCliCommand::Run(cmd) => self.execute_run(cmd),
            AbstractaCliCommand::Emit(cmd) => self.execute_emit(cmd),
        }
    }

    fn compile_options(&self, args: &SourceArgs) -> Result<CompileOptions, anyhow::Error> {
        let grammar = match &args.grammar {
            Some(path) => Grammar::from_path(path)
                .with_context(|| format!("can not load grammar {}", path.display()))?,
            None => Grammar::default(),
        };
        Ok(CompileOptions {
            grammar,
            lexer_recovery: args.lexer_recovery.into(),
            optimize: !args.no_optimize,
        })
    }

    /// Writes diagnostics to stderr.
    fn report(&self, diagnostics: &Diagnostics, format: DiagnosticsFormat) -> Result<(), anyhow::Error> {
        if diagnostics.is_empty() {
            return Ok(());
        }
        match format {
            DiagnosticsFormat::Text => eprint!("{diagnostics}"),
            DiagnosticsFormat::Json => eprintln!("{}", diagnostics.to_json()?),
        }
        Ok(())
    }

    /// Reports compile errors and turns them into the command error.
    fn compile_failed(&self, diagnostics: &Diagnostics, format: DiagnosticsFormat) -> anyhow::Error {
        if let Err(err) = self.report(diagnostics, format) {
            return err;
        }
        anyhow::anyhow!("compile failed with {} error(s)", diagnostics.error_count())
    }
}
