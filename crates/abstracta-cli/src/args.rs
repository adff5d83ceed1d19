use std::path::PathBuf;

use abstracta::{
    compiler::{lexer::LexerRecovery, EmitStage},
    executor::DEFAULT_MAX_DEPTH,
};
use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Clone, Parser)]
#[command(name = "abstracta")]
#[command(bin_name = "abstracta")]
#[command(version, about, long_about = None)]
pub struct AbstractaCliArgs {
    #[command(subcommand)]
    pub cmd: AbstractaCliCommand,
}

impl AbstractaCliArgs {
    pub fn trace(&self) -> bool {
        matches!(&self.cmd, AbstractaCliCommand::Run(cmd) if cmd.trace)
    }
}

#[derive(Debug, Clone, Subcommand)]
pub enum AbstractaCliCommand {
    /// Compile a source file into an abstracted program.
    Compile(CompileCommand),
    /// Run a compiled program or a source file.
    Run(RunCommand),
    /// Print the output of a pipeline stage.
    Emit(EmitCommand),
}

#[derive(Debug, Clone, Args)]
pub struct SourceArgs {
    /// A TOML grammar replacing the default one.
    #[arg(long)]
    pub grammar: Option<PathBuf>,
    /// What the lexer does with an invalid character.
    #[arg(long, value_enum, default_value_t = Recovery::Halt)]
    pub lexer_recovery: Recovery,
    /// Skip the optimizer.
    #[arg(long)]
    pub no_optimize: bool,
    /// The format of reported diagnostics.
    #[arg(long, value_enum, default_value_t = DiagnosticsFormat::Text)]
    pub diagnostics: DiagnosticsFormat,
}

#[derive(Debug, Clone, Args)]
pub struct CompileCommand {
    /// The path of the source file.
    pub path: PathBuf,
    /// Write the program to this file instead of stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    #[command(flatten)]
    pub source: SourceArgs,
}

#[derive(Debug, Clone, Args)]
pub struct RunCommand {
    /// A compiled program (`.json`) or a source file.
    pub path: PathBuf,
    /// A program input, read with `arg(i)`.
    #[arg(long = "input")]
    pub inputs: Vec<String>,
    /// Stop after this many instructions.
    #[arg(long)]
    pub max_steps: Option<u64>,
    /// Maximum call depth.
    #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
    pub max_depth: usize,
    /// Log every executed instruction.
    #[arg(long)]
    pub trace: bool,
    #[command(flatten)]
    pub source: SourceArgs,
}

#[derive(Debug, Clone, Args)]
pub struct EmitCommand {
    /// The stage to stop after.
    #[arg(long, value_enum)]
    pub stage: Stage,
    /// The path of the source file.
    pub path: PathBuf,
    #[command(flatten)]
    pub source: SourceArgs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Recovery {
    Halt,
    Skip,
}

impl From<Recovery> for LexerRecovery {
    fn from(value: Recovery) -> Self {
        match value {
            Recovery::Halt => LexerRecovery::Halt,
            Recovery::Skip => LexerRecovery::Skip,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DiagnosticsFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Stage {
    Lexer,
    Parser,
    Semantic,
    Optimizer,
    Codegen,
}

impl From<Stage> for EmitStage {
    fn from(value: Stage) -> Self {
        match value {
            Stage::Lexer => EmitStage::Lexer,
            Stage::Parser => EmitStage::Parser,
            Stage::Semantic => EmitStage::Semantic,
            Stage::Optimizer => EmitStage::Optimizer,
            Stage::Codegen => EmitStage::Codegen,
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn verify_cli() {
        AbstractaCliArgs::command().debug_assert();
    }

    #[test]
    fn parse_run_arguments() {
        let args = AbstractaCliArgs::parse_from([
            "abstracta", "run", "a.json", "--input", "1", "--input", "x", "--max-steps", "10", "--trace",
        ]);
        assert!(args.trace());
        let AbstractaCliCommand::Run(cmd) = args.cmd else {
            panic!("expected run");
        };
        assert_eq!(cmd.inputs, ["1", "x"]);
        assert_eq!(cmd.max_steps, Some(10));
        assert_eq!(cmd.max_depth, DEFAULT_MAX_DEPTH);
    }

    #[test]
    fn parse_emit_arguments() {
        let args = AbstractaCliArgs::parse_from(["abstracta", "emit", "--stage=codegen", "a.abs"]);
        let AbstractaCliCommand::Emit(cmd) = args.cmd else {
            panic!("expected emit");
        };
        assert_eq!(cmd.stage, Stage::Codegen);
        assert_eq!(cmd.source.lexer_recovery, Recovery::Halt);
    }
}
