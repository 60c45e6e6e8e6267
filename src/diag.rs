//! Error taxonomy and the accumulating diagnostic sink.
//!
//! Assembly never aborts on a bad instruction: every failure is recorded as
//! a [`Diagnostic`] and the faulty instruction is replaced with a zero word,
//! so a single run surfaces as many errors as possible.

use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AsmError {
    #[error("unknown mnemonic '{0}'")]
    UnknownMnemonic(String),

    #[error("unknown register '{0}'")]
    UnknownRegister(String),

    #[error("unsupported directive '{0}'")]
    UnsupportedDirective(String),

    #[error("label '{0}' is already defined")]
    DuplicateLabel(String),

    #[error("undefined symbol '{0}'")]
    UndefinedSymbol(String),

    #[error("'{mnemonic}' expects {expected}, got {found} operand(s)")]
    OperandCount {
        mnemonic: String,
        expected: &'static str,
        found: usize,
    },

    #[error("expected {expected}, got '{found}'")]
    OperandType {
        expected: &'static str,
        found: String,
    },

    #[error("operand {position} is empty")]
    EmptyOperand { position: usize },

    #[error("malformed operand '{0}'")]
    MalformedOperand(String),

    #[error("unclosed memory operand '{0}'")]
    UnclosedMemOperand(String),

    #[error("immediate {value} out of range ({min} to {max})")]
    ImmediateRange { value: i64, min: i64, max: i64 },

    #[error("pc-relative offset {offset} out of range ({min} to {max})")]
    OffsetRange { offset: i64, min: i64, max: i64 },

    #[error("pc-relative offset {0} must be even")]
    MisalignedOffset(i64),
}

pub type Result<T> = std::result::Result<T, AsmError>;

/// One recorded assembly error: where it happened and what went wrong.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub line: usize,
    pub source: String,
    pub error: AsmError,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.error)?;
        let source = self.source.trim();
        if !source.is_empty() {
            write!(f, "\n    | {}", source)?;
        }
        Ok(())
    }
}

/// Accumulating sink for assembly errors.
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one error against its source line.
    pub fn report(&mut self, line: usize, source: &str, error: AsmError) {
        self.entries.push(Diagnostic {
            line,
            source: source.to_string(),
            error,
        });
    }

    pub fn has_errors(&self) -> bool {
        !self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.entries.iter()
    }

    pub fn summary(&self) -> String {
        if self.has_errors() {
            format!("assembly failed with {} error(s)", self.len())
        } else {
            "assembly completed successfully".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_accumulates() {
        let mut diags = Diagnostics::new();
        assert!(!diags.has_errors());

        diags.report(3, "addi x1, x0, 4096", AsmError::ImmediateRange {
            value: 4096,
            min: -2048,
            max: 2047,
        });
        diags.report(7, "beq x1, x0, ghost", AsmError::UndefinedSymbol("ghost".to_string()));

        assert!(diags.has_errors());
        assert_eq!(diags.len(), 2);
        assert_eq!(diags.summary(), "assembly failed with 2 error(s)");
    }

    #[test]
    fn test_diagnostic_display_includes_source() {
        let diag = Diagnostic {
            line: 5,
            source: "  lw x1, 8".to_string(),
            error: AsmError::OperandType {
                expected: "memory operand",
                found: "8".to_string(),
            },
        };
        let text = diag.to_string();
        assert!(text.starts_with("line 5: "));
        assert!(text.contains("lw x1, 8"));
    }

    #[test]
    fn test_empty_summary() {
        let diags = Diagnostics::new();
        assert_eq!(diags.summary(), "assembly completed successfully");
    }
}
