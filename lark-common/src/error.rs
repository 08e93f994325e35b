//! Error handling for the Lark compiler
//!
//! This module defines common error types and error reporting utilities
//! used throughout the compiler.

use crate::source_loc::SourceLocation;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Main compiler error type that encompasses all phases of compilation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompilerError {
    #[error("Lexical error at {location}: {message}")]
    LexError {
        location: SourceLocation,
        message: String,
    },

    #[error("Parse error at {location}: {message}")]
    ParseError {
        location: SourceLocation,
        message: String,
    },

    #[error("Semantic error at {location}: {message}")]
    SemanticError {
        location: SourceLocation,
        message: String,
    },

    #[error("Code generation error at {location}: {message}")]
    CodegenError {
        location: SourceLocation,
        message: String,
    },

    #[error("Invalid compiler input: {message}")]
    InputError { message: String },

    #[error("IO error: {message}")]
    IoError { message: String },

    #[error("Internal compiler error: {message}")]
    InternalError { message: String },
}

impl CompilerError {
    /// Create a codegen error
    pub fn codegen_error(message: String, location: SourceLocation) -> Self {
        CompilerError::CodegenError { location, message }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        CompilerError::InternalError { message: message.into() }
    }

    /// Source location of the error, if it has one
    pub fn location(&self) -> Option<SourceLocation> {
        match self {
            CompilerError::LexError { location, .. }
            | CompilerError::ParseError { location, .. }
            | CompilerError::SemanticError { location, .. }
            | CompilerError::CodegenError { location, .. } => Some(*location),
            CompilerError::InputError { .. }
            | CompilerError::IoError { .. }
            | CompilerError::InternalError { .. } => None,
        }
    }

    /// Bare message without the phase prefix
    pub fn message(&self) -> &str {
        match self {
            CompilerError::LexError { message, .. }
            | CompilerError::ParseError { message, .. }
            | CompilerError::SemanticError { message, .. }
            | CompilerError::CodegenError { message, .. }
            | CompilerError::InputError { message }
            | CompilerError::IoError { message }
            | CompilerError::InternalError { message } => message,
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Note,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Note => write!(f, "note"),
        }
    }
}

/// A diagnostic message with location and severity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub location: SourceLocation,
    #[serde(default)]
    pub notes: Vec<String>,
}

impl Diagnostic {
    pub fn error(message: String, location: SourceLocation) -> Self {
        Self {
            severity: Severity::Error,
            message,
            location,
            notes: Vec::new(),
        }
    }

    pub fn warning(message: String, location: SourceLocation) -> Self {
        Self {
            severity: Severity::Warning,
            message,
            location,
            notes: Vec::new(),
        }
    }

    pub fn note(message: String, location: SourceLocation) -> Self {
        Self {
            severity: Severity::Note,
            message,
            location,
            notes: Vec::new(),
        }
    }

    pub fn with_note(mut self, note: String) -> Self {
        self.notes.push(note);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl From<&CompilerError> for Diagnostic {
    fn from(err: &CompilerError) -> Self {
        Diagnostic::error(err.to_string(), err.location().unwrap_or_default())
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.location.is_known() {
            write!(f, "{}: {}: {}", self.location, self.severity, self.message)?;
        } else {
            write!(f, "{}: {}", self.severity, self.message)?;
        }

        for note in &self.notes {
            write!(f, "\n  note: {}", note)?;
        }

        Ok(())
    }
}

/// Error reporter for collecting and displaying diagnostics
#[derive(Debug, Clone)]
pub struct ErrorReporter {
    diagnostics: Vec<Diagnostic>,
    error_count: usize,
    warning_count: usize,
}

impl ErrorReporter {
    pub fn new() -> Self {
        Self {
            diagnostics: Vec::new(),
            error_count: 0,
            warning_count: 0,
        }
    }

    /// Record a diagnostic, keeping the counters in sync
    pub fn report(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Error => self.error_count += 1,
            Severity::Warning => self.warning_count += 1,
            Severity::Note => {}
        }
        self.diagnostics.push(diagnostic);
    }

    /// Report an error diagnostic
    pub fn error(&mut self, message: String, location: SourceLocation) {
        self.report(Diagnostic::error(message, location));
    }

    /// Report a warning diagnostic
    pub fn warning(&mut self, message: String, location: SourceLocation) {
        self.report(Diagnostic::warning(message, location));
    }

    /// Report a note diagnostic
    pub fn note(&mut self, message: String, location: SourceLocation) {
        self.report(Diagnostic::note(message, location));
    }

    /// Report a compiler error as an error diagnostic
    pub fn compiler_error(&mut self, err: &CompilerError) {
        self.report(Diagnostic::from(err));
    }

    /// Check if any errors have been reported
    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    /// Get the number of errors
    pub fn error_count(&self) -> usize {
        self.error_count
    }

    /// Get the number of warnings
    pub fn warning_count(&self) -> usize {
        self.warning_count
    }

    /// Get all diagnostics
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Iterate over error diagnostics only
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }

    /// Clear all diagnostics
    pub fn clear(&mut self) {
        self.diagnostics.clear();
        self.error_count = 0;
        self.warning_count = 0;
    }

    /// Print all diagnostics to stderr
    pub fn print_diagnostics(&self) {
        for diagnostic in &self.diagnostics {
            eprintln!("{}", diagnostic);
        }
    }

    /// Create a summary string
    pub fn summary(&self) -> String {
        match (self.error_count, self.warning_count) {
            (0, 0) => "No errors or warnings".to_string(),
            (0, w) => format!("{} warning{}", w, if w == 1 { "" } else { "s" }),
            (e, 0) => format!("{} error{}", e, if e == 1 { "" } else { "s" }),
            (e, w) => format!(
                "{} error{} and {} warning{}",
                e,
                if e == 1 { "" } else { "s" },
                w,
                if w == 1 { "" } else { "s" }
            ),
        }
    }
}

impl Default for ErrorReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert from std::io::Error
impl From<std::io::Error> for CompilerError {
    fn from(err: std::io::Error) -> Self {
        CompilerError::IoError {
            message: err.to_string(),
        }
    }
}

/// Convert from String (for simple error cases)
impl From<String> for CompilerError {
    fn from(message: String) -> Self {
        CompilerError::InternalError { message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_creation() {
        let loc = SourceLocation::new(1, 5);
        let diag = Diagnostic::error("Test error".to_string(), loc);
        assert_eq!(diag.severity, Severity::Error);
        assert_eq!(diag.message, "Test error");
        assert_eq!(diag.location, loc);
        assert_eq!(diag.to_string(), "1:5: error: Test error");
    }

    #[test]
    fn test_error_reporter() {
        let mut reporter = ErrorReporter::new();

        assert!(!reporter.has_errors());
        assert_eq!(reporter.error_count(), 0);

        reporter.error("Test error".to_string(), SourceLocation::new(1, 1));
        reporter.warning("Test warning".to_string(), SourceLocation::dummy());
        assert!(reporter.has_errors());
        assert_eq!(reporter.error_count(), 1);
        assert_eq!(reporter.warning_count(), 1);
        assert_eq!(reporter.errors().count(), 1);
    }

    #[test]
    fn test_diagnostic_with_notes() {
        let diag = Diagnostic::warning("Division by zero".to_string(), SourceLocation::new(2, 9))
            .with_note("left unfolded".to_string());

        assert_eq!(diag.notes.len(), 1);
        assert_eq!(diag.to_string(), "2:9: warning: Division by zero\n  note: left unfolded");
    }

    #[test]
    fn test_compiler_error_location_and_message() {
        let err = CompilerError::SemanticError {
            location: SourceLocation::new(4, 2),
            message: "undeclared 'y'".to_string(),
        };
        assert_eq!(err.location(), Some(SourceLocation::new(4, 2)));
        assert_eq!(err.message(), "undeclared 'y'");
        assert_eq!(err.to_string(), "Semantic error at 4:2: undeclared 'y'");
        assert_eq!(CompilerError::internal("no program").location(), None);
    }

    #[test]
    fn test_summary() {
        let mut reporter = ErrorReporter::new();
        assert_eq!(reporter.summary(), "No errors or warnings");

        reporter.error("Error 1".to_string(), SourceLocation::dummy());
        assert_eq!(reporter.summary(), "1 error");

        reporter.error("Error 2".to_string(), SourceLocation::dummy());
        assert_eq!(reporter.summary(), "2 errors");

        reporter.warning("Warning 1".to_string(), SourceLocation::dummy());
        assert_eq!(reporter.summary(), "2 errors and 1 warning");
    }
}
