//! Expression AST nodes
//!
//! This module defines expression nodes in the syntax tree.

use super::ops::{BinaryOp, UnaryOp};
use lark_common::{DataType, SourceLocation};
use serde::{Deserialize, Serialize};

/// Syntax tree expression node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expression {
    pub kind: ExpressionKind,
    #[serde(default)]
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExpressionKind {
    /// Integer literal
    IntLiteral(i64),

    /// Floating point literal
    FloatLiteral(f64),

    /// `true` / `false`
    BoolLiteral(bool),

    /// String literal (already unescaped)
    StringLiteral(String),

    /// Identifier reference
    Identifier(String),

    /// Binary operation
    Binary {
        op: BinaryOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },

    /// Unary operation
    Unary {
        op: UnaryOp,
        operand: Box<Expression>,
    },

    /// Function call
    Call {
        function: String,
        arguments: Vec<Expression>,
    },

    /// Array element read
    Index {
        array: String,
        index: Box<Expression>,
    },

    /// Explicit conversion
    Cast {
        target_type: DataType,
        operand: Box<Expression>,
    },
}

impl Expression {
    pub fn new(kind: ExpressionKind, location: SourceLocation) -> Self {
        Self { kind, location }
    }

    fn synthetic(kind: ExpressionKind) -> Self {
        Self::new(kind, SourceLocation::dummy())
    }

    pub fn int(value: i64) -> Self {
        Self::synthetic(ExpressionKind::IntLiteral(value))
    }

    pub fn float(value: f64) -> Self {
        Self::synthetic(ExpressionKind::FloatLiteral(value))
    }

    pub fn boolean(value: bool) -> Self {
        Self::synthetic(ExpressionKind::BoolLiteral(value))
    }

    pub fn string(value: &str) -> Self {
        Self::synthetic(ExpressionKind::StringLiteral(value.to_string()))
    }

    pub fn ident(name: &str) -> Self {
        Self::synthetic(ExpressionKind::Identifier(name.to_string()))
    }

    pub fn binary(op: BinaryOp, left: Expression, right: Expression) -> Self {
        Self::synthetic(ExpressionKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn unary(op: UnaryOp, operand: Expression) -> Self {
        Self::synthetic(ExpressionKind::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    pub fn call(function: &str, arguments: Vec<Expression>) -> Self {
        Self::synthetic(ExpressionKind::Call {
            function: function.to_string(),
            arguments,
        })
    }

    pub fn index(array: &str, index: Expression) -> Self {
        Self::synthetic(ExpressionKind::Index {
            array: array.to_string(),
            index: Box::new(index),
        })
    }

    pub fn cast(target_type: DataType, operand: Expression) -> Self {
        Self::synthetic(ExpressionKind::Cast {
            target_type,
            operand: Box::new(operand),
        })
    }

    /// Attach a source position (builder style)
    pub fn at(mut self, line: u32, column: u32) -> Self {
        self.location = SourceLocation::new(line, column);
        self
    }

    /// Ordered child expressions, in evaluation order
    pub fn children(&self) -> Vec<&Expression> {
        match &self.kind {
            ExpressionKind::IntLiteral(_)
            | ExpressionKind::FloatLiteral(_)
            | ExpressionKind::BoolLiteral(_)
            | ExpressionKind::StringLiteral(_)
            | ExpressionKind::Identifier(_) => Vec::new(),
            ExpressionKind::Binary { left, right, .. } => vec![left.as_ref(), right.as_ref()],
            ExpressionKind::Unary { operand, .. } => vec![operand.as_ref()],
            ExpressionKind::Call { arguments, .. } => arguments.iter().collect(),
            ExpressionKind::Index { index, .. } => vec![index.as_ref()],
            ExpressionKind::Cast { operand, .. } => vec![operand.as_ref()],
        }
    }

    /// Collect every identifier and array name this expression reads
    pub fn collect_names<'a>(&'a self, out: &mut Vec<&'a str>) {
        match &self.kind {
            ExpressionKind::Identifier(name) => out.push(name),
            ExpressionKind::Index { array, .. } => out.push(array),
            _ => {}
        }
        for child in self.children() {
            child.collect_names(out);
        }
    }
}
