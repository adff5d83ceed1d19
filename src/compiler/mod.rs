//! The abstracta compiler.
//!
//! Every stage either produces the input of the next one or halts the
//! pipeline with [`Diagnostics`]. Warnings never halt it.

pub mod analyzer;
pub mod ast;
pub mod code;
pub mod codegen;
pub mod diagnostic;
pub mod error;
pub mod grammar;
pub mod index;
pub mod lexer;
pub mod opcode;
pub mod optimizer;
pub mod parser;
pub mod semantic;
pub mod token;
pub mod typing;

use std::{fmt, fmt::Write as _};

use crate::utils::{LineIndex, Locatable};

use self::{
    ast::Ast,
    code::AbstractedProgram,
    diagnostic::{Diagnostic, Diagnostics, Severity, Stage},
    error::InternalError,
    grammar::Grammar,
    lexer::LexerRecovery,
    semantic::Semantic,
    token::Token,
};

/// Options of a compilation.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    pub grammar: Grammar,
    pub lexer_recovery: LexerRecovery,
    /// Run the optimizer between analysis and code generation.
    pub optimize: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            grammar: Grammar::default(),
            lexer_recovery: LexerRecovery::default(),
            optimize: true,
        }
    }
}

/// A compiled program, with the warnings reported while compiling it.
#[derive(Debug, Clone)]
pub struct Compilation {
    pub program: AbstractedProgram,
    pub warnings: Diagnostics,
}

fn internal_error(stage: Stage, error: &InternalError, index: &LineIndex<'_>) -> Diagnostics {
    let diagnostic = if error.range().is_empty() {
        Diagnostic::error(stage, format!("internal error: {error}"))
    } else {
        Diagnostic::error(stage, format!("internal error: {error}")).with_span(error.span(index))
    };
    diagnostic.into()
}

/// Tokenizes the input. With [`LexerRecovery::Skip`] every lexical error is
/// reported, otherwise only the first one.
pub fn lex(input: &str, options: &CompileOptions) -> Result<Vec<Token>, Diagnostics> {
    let index = LineIndex::new(input);
    let mut tokens = Vec::new();
    let mut diagnostics = Diagnostics::new();
    for item in lexer::tokenize(input, &options.grammar, options.lexer_recovery) {
        match item {
            Ok(token) => tokens.push(token),
            Err(error) => {
                diagnostics.push(Diagnostic::located(Stage::Lexer, Severity::Error, &error, &index));
            }
        }
    }
    log::debug!("lexer: {} tokens, {} errors", tokens.len(), diagnostics.len());
    if diagnostics.has_errors() {
        Err(diagnostics)
    } else {
        Ok(tokens)
    }
}

/// Parses the input into a syntax tree.
pub fn parse_source(input: &str, options: &CompileOptions) -> Result<Ast, Diagnostics> {
    let tokens = lex(input, options)?;
    let (ast, errors) = parser::parse(input, &options.grammar, tokens);
    log::debug!("parser: {} nodes, {} errors", ast.nodes.len(), errors.len());
    if errors.is_empty() {
        Ok(ast)
    } else {
        let mut diagnostics = Diagnostics::new();
        diagnostics.extend_located(Stage::Parser, Severity::Error, &errors, &LineIndex::new(input));
        Err(diagnostics)
    }
}

/// Parses and analyzes the input. Warnings stay in [`Semantic::warnings`].
pub fn analyze_source(input: &str, options: &CompileOptions) -> Result<(Ast, Semantic), Diagnostics> {
    let ast = parse_source(input, options)?;
    let (semantic, errors) = analyzer::analyze(&ast);
    if errors.is_empty() {
        Ok((ast, semantic))
    } else {
        let index = LineIndex::new(input);
        let mut diagnostics = Diagnostics::new();
        diagnostics.extend_located(Stage::Semantic, Severity::Error, &errors, &index);
        diagnostics.extend_located(Stage::Semantic, Severity::Warning, &semantic.warnings, &index);
        Err(diagnostics)
    }
}

/// Parses, analyzes and, if enabled, optimizes the input.
pub fn optimize_source(input: &str, options: &CompileOptions) -> Result<(Ast, Semantic), Diagnostics> {
    let (mut ast, mut semantic) = analyze_source(input, options)?;
    if options.optimize {
        optimizer::optimize(&mut ast, &mut semantic)
            .map_err(|error| internal_error(Stage::Optimizer, &error, &LineIndex::new(input)))?;
    }
    Ok((ast, semantic))
}

/// Compiles the input into an abstracted program.
pub fn compile(input: &str, options: &CompileOptions) -> Result<Compilation, Diagnostics> {
    let (ast, semantic) = optimize_source(input, options)?;
    let index = LineIndex::new(input);
    let program = codegen::gen_code(&ast, &semantic)
        .map_err(|error| internal_error(Stage::Codegen, &error, &index))?;
    let mut warnings = Diagnostics::new();
    warnings.extend_located(Stage::Semantic, Severity::Warning, &semantic.warnings, &index);
    Ok(Compilation { program, warnings })
}

/// A stage whose output can be emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmitStage {
    Lexer,
    Parser,
    Semantic,
    Optimizer,
    Codegen,
}

impl EmitStage {
    pub const ALL: [EmitStage; 5] = [
        EmitStage::Lexer,
        EmitStage::Parser,
        EmitStage::Semantic,
        EmitStage::Optimizer,
        EmitStage::Codegen,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            EmitStage::Lexer => "lexer",
            EmitStage::Parser => "parser",
            EmitStage::Semantic => "semantic",
            EmitStage::Optimizer => "optimizer",
            EmitStage::Codegen => "codegen",
        }
    }
}

impl fmt::Display for EmitStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Runs the pipeline up to `stage` and renders its output:
/// tokens, the syntax tree, the symbol tables, the optimized source or the
/// disassembly.
pub fn emit(input: &str, stage: EmitStage, options: &CompileOptions) -> Result<String, Diagnostics> {
    let mut out = String::new();
    match stage {
        EmitStage::Lexer => {
            for token in lex(input, options)? {
                let location = token.location.to_string();
                let kind = token.kind.to_string();
                let _ = writeln!(out, "{location:<8}{kind:<24}{:?}", token.lexeme(input));
            }
        }
        EmitStage::Parser => out = parse_source(input, options)?.dump(),
        EmitStage::Semantic => {
            let (ast, semantic) = analyze_source(input, options)?;
            out = semantic.to_string();
            for id in ast.reachable() {
                if let Some(symbol) = semantic.resolutions.get(&id) {
                    let _ = writeln!(
                        out,
                        "{} {} -> {}: {}",
                        id,
                        ast.kind(id).name(),
                        semantic.symbols[*symbol].name,
                        semantic.types[id]
                    );
                }
            }
        }
        EmitStage::Optimizer => {
            let options = CompileOptions {
                optimize: true,
                ..options.clone()
            };
            out = optimize_source(input, &options)?.0.to_string();
        }
        EmitStage::Codegen => out = compile(input, options)?.program.to_string(),
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_reports_each_stage() {
        let options = CompileOptions::default();
        let lexer = compile("let x = 1 $ 2;", &options).unwrap_err();
        assert_eq!(lexer.iter().next().map(|d| d.stage), Some(Stage::Lexer));

        let parser = compile("let = 1;", &options).unwrap_err();
        assert_eq!(parser.iter().next().map(|d| d.stage), Some(Stage::Parser));

        let semantic = compile("x + 1", &options).unwrap_err();
        let diagnostic = semantic.iter().next().unwrap();
        assert_eq!(diagnostic.stage, Stage::Semantic);
        assert_eq!(diagnostic.message, "undefined reference to `x`");
        assert_eq!(diagnostic.span.map(|span| span.start.column), Some(1));
    }

    #[test]
    fn warnings_do_not_halt() {
        let compilation = compile("let unused = 1; 2", &CompileOptions::default()).unwrap();
        assert!(!compilation.warnings.has_errors());
        assert_eq!(compilation.warnings.len(), 1);
    }

    #[test]
    fn emit_every_stage() {
        let options = CompileOptions::default();
        for stage in EmitStage::ALL {
            let out = emit("let a = 1; a + a * 2", stage, &options).unwrap();
            assert!(!out.is_empty(), "{stage}");
        }
        assert_eq!(
            emit("let a = 1 + 2; a", EmitStage::Optimizer, &options).unwrap(),
            "let a = 3;\na\n"
        );
    }
}
