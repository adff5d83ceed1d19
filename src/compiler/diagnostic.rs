//! Diagnostics reported by the pipeline.

use std::{error::Error, fmt};

use serde::{Deserialize, Serialize};

use crate::utils::{LineIndex, Locatable, Span};

/// The pipeline stage that reported a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Lexer,
    Parser,
    Semantic,
    Optimizer,
    Codegen,
    Runtime,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Lexer => "lexer",
            Stage::Parser => "parser",
            Stage::Semantic => "semantic",
            Stage::Optimizer => "optimizer",
            Stage::Codegen => "codegen",
            Stage::Runtime => "runtime",
        })
    }
}

/// Severity level of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
        })
    }
}

/// A single diagnostic message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub stage: Stage,
    pub severity: Severity,
    pub message: String,
    pub span: Option<Span>,
}

impl Diagnostic {
    pub fn error(stage: Stage, message: impl Into<String>) -> Self {
        Diagnostic {
            stage,
            severity: Severity::Error,
            message: message.into(),
            span: None,
        }
    }

    pub fn warning(stage: Stage, message: impl Into<String>) -> Self {
        Diagnostic {
            stage,
            severity: Severity::Warning,
            message: message.into(),
            span: None,
        }
    }

    /// A diagnostic of a located error.
    pub fn located<E: Error + Locatable>(
        stage: Stage,
        severity: Severity,
        error: &E,
        index: &LineIndex<'_>,
    ) -> Self {
        Diagnostic {
            stage,
            severity,
            message: error.to_string(),
            span: Some(error.span(index)),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]: {}", self.severity, self.stage, self.message)?;
        if let Some(span) = self.span {
            write!(f, "\n  --> {}", span.start)?;
        }
        Ok(())
    }
}

/// An ordered collection of diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Diagnostics {
    diagnostics: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// Adds a diagnostic for each located error.
    pub fn extend_located<'e, E: Error + Locatable + 'e>(
        &mut self,
        stage: Stage,
        severity: Severity,
        errors: impl IntoIterator<Item = &'e E>,
        index: &LineIndex<'_>,
    ) {
        for error in errors {
            self.push(Diagnostic::located(stage, severity, error, index));
        }
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_error()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn append(&mut self, other: &mut Diagnostics) {
        self.diagnostics.append(&mut other.diagnostics);
    }

    /// Renders every diagnostic, one block per diagnostic.
    pub fn to_text(&self) -> String {
        self.diagnostics
            .iter()
            .map(|d| format!("{d}\n"))
            .collect()
    }

    /// Renders the diagnostics as a JSON array.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl From<Diagnostic> for Diagnostics {
    fn from(value: Diagnostic) -> Self {
        Diagnostics {
            diagnostics: vec![value],
        }
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.diagnostics.into_iter()
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl Error for Diagnostics {}

#[cfg(test)]
mod tests {
    use text_size::TextRange;

    use super::*;

    #[test]
    fn render_text_and_json() {
        let index = LineIndex::new("let x = 1;\nx + y");
        let mut diagnostics = Diagnostics::new();
        diagnostics.push(
            Diagnostic::error(Stage::Semantic, "undefined reference to `y`")
                .with_span(index.span(TextRange::new(15.into(), 16.into()))),
        );
        diagnostics.push(Diagnostic::warning(Stage::Semantic, "unused variable `z`"));
        assert!(diagnostics.has_errors());
        assert_eq!(diagnostics.error_count(), 1);
        assert_eq!(
            diagnostics.to_text(),
            "error[semantic]: undefined reference to `y`\n  --> 2:5\nwarning[semantic]: unused variable `z`\n"
        );

        let json: serde_json::Value = serde_json::from_str(&diagnostics.to_json().unwrap()).unwrap();
        assert_eq!(json[0]["stage"], "semantic");
        assert_eq!(json[0]["severity"], "error");
        assert_eq!(json[0]["span"]["start"]["lineno"], 2);
        assert_eq!(json[0]["span"]["start"]["column"], 5);
        assert_eq!(json[1]["span"], serde_json::Value::Null);
    }
}
