//! Syntax tree definitions
//!
//! The upstream parser builds this tree and semantic analysis has already
//! accepted it by the time the backend sees it. Node kinds are closed tagged
//! unions so that IR generation can dispatch with exhaustive matches.

pub mod ops;
pub mod expressions;
pub mod statements;

// Re-export commonly used types at module level
pub use ops::{BinaryOp, UnaryOp};
pub use expressions::{Expression, ExpressionKind};
pub use statements::{Parameter, Statement, StatementKind};

use serde::{Deserialize, Serialize};

/// Root of a compilation unit: top-level statements in source order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyntaxTree {
    pub statements: Vec<Statement>,
}

impl SyntaxTree {
    pub fn new(statements: Vec<Statement>) -> Self {
        Self { statements }
    }

    /// Top-level function declarations, in source order
    pub fn functions(&self) -> impl Iterator<Item = &Statement> {
        self.statements
            .iter()
            .filter(|s| matches!(s.kind, StatementKind::FunctionDecl { .. }))
    }

    /// Top-level statements that belong to the implicit entry function
    pub fn entry_statements(&self) -> impl Iterator<Item = &Statement> {
        self.statements
            .iter()
            .filter(|s| !matches!(s.kind, StatementKind::FunctionDecl { .. }))
    }
}
