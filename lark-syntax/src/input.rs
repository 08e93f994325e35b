//! Compilation input envelope
//!
//! Upstream phases serialize their results as one JSON document: the syntax
//! tree, the scope trace, and whatever diagnostics lexing, parsing, and
//! semantic analysis produced. The driver refuses to generate IR when any of
//! those diagnostics is an error.

use crate::ast::SyntaxTree;
use crate::scope::ScopeTrace;
use lark_common::{CompilerError, Diagnostic, SourceLocation};
use serde::{Deserialize, Serialize};

/// Phase that produced an upstream diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpstreamPhase {
    Lexical,
    Syntax,
    Semantic,
}

/// A diagnostic reported before the backend runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpstreamDiagnostic {
    pub phase: UpstreamPhase,
    pub message: String,
    #[serde(default)]
    pub location: SourceLocation,
    /// Warnings do not block compilation
    #[serde(default)]
    pub is_warning: bool,
}

impl UpstreamDiagnostic {
    pub fn error(phase: UpstreamPhase, message: &str, location: SourceLocation) -> Self {
        Self { phase, message: message.to_string(), location, is_warning: false }
    }

    /// Convert into the compiler's error type
    pub fn to_compiler_error(&self) -> CompilerError {
        let location = self.location;
        let message = self.message.clone();
        match self.phase {
            UpstreamPhase::Lexical => CompilerError::LexError { location, message },
            UpstreamPhase::Syntax => CompilerError::ParseError { location, message },
            UpstreamPhase::Semantic => CompilerError::SemanticError { location, message },
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        if self.is_warning {
            Diagnostic::warning(self.message.clone(), self.location)
        } else {
            Diagnostic::from(&self.to_compiler_error())
        }
    }
}

/// Everything the backend receives for one compilation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompilationInput {
    pub tree: SyntaxTree,
    #[serde(default)]
    pub scopes: ScopeTrace,
    #[serde(default)]
    pub diagnostics: Vec<UpstreamDiagnostic>,
}

impl CompilationInput {
    pub fn new(tree: SyntaxTree, scopes: ScopeTrace) -> Self {
        Self { tree, scopes, diagnostics: Vec::new() }
    }

    /// Decode the JSON document handed over by the upstream phases
    pub fn from_json(text: &str) -> Result<Self, CompilerError> {
        serde_json::from_str(text).map_err(|e| CompilerError::InputError {
            message: format!("malformed compilation input: {e}"),
        })
    }

    pub fn to_json(&self) -> Result<String, CompilerError> {
        serde_json::to_string_pretty(self).map_err(|e| CompilerError::InputError {
            message: format!("cannot encode compilation input: {e}"),
        })
    }

    /// Upstream errors (warnings excluded)
    pub fn upstream_errors(&self) -> impl Iterator<Item = &UpstreamDiagnostic> {
        self.diagnostics.iter().filter(|d| !d.is_warning)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Expression, Statement};
    use crate::scope::Symbol;
    use lark_common::DataType;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_input_survives_json_encoding() {
        let input = CompilationInput::new(
            SyntaxTree::new(vec![
                Statement::var("x", DataType::Int, Some(Expression::int(5))).at(1, 1),
                Statement::print(Expression::ident("x")).at(2, 1),
            ]),
            ScopeTrace::new(vec![Symbol::variable("x", DataType::Int)], vec![]),
        );

        let json = input.to_json().unwrap();
        let decoded = CompilationInput::from_json(&json).unwrap();
        assert_eq!(decoded, input);
    }

    #[test]
    fn test_malformed_json_is_an_input_error() {
        let err = CompilationInput::from_json("{ not json").unwrap_err();
        assert!(matches!(err, CompilerError::InputError { .. }));
    }

    #[test]
    fn test_upstream_errors_exclude_warnings() {
        let mut input = CompilationInput::default();
        input.diagnostics.push(UpstreamDiagnostic::error(
            UpstreamPhase::Syntax,
            "expected ';'",
            SourceLocation::new(3, 9),
        ));
        input.diagnostics.push(UpstreamDiagnostic {
            phase: UpstreamPhase::Semantic,
            message: "unused variable".to_string(),
            location: SourceLocation::new(1, 5),
            is_warning: true,
        });

        let errors: Vec<_> = input.upstream_errors().collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0].to_compiler_error().to_string(),
            "Parse error at 3:9: expected ';'"
        );
    }
}
