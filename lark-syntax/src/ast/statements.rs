//! Statement AST nodes
//!
//! This module defines statement nodes and function declarations.

use super::expressions::Expression;
use lark_common::{DataType, SourceLocation};
use serde::{Deserialize, Serialize};

/// Syntax tree statement node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    pub kind: StatementKind,
    #[serde(default)]
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StatementKind {
    /// `let name: type = initializer;`
    VarDecl {
        name: String,
        data_type: DataType,
        initializer: Option<Expression>,
    },

    /// `let name: [type; size] = [elements];`
    ArrayDecl {
        name: String,
        element_type: DataType,
        size: usize,
        elements: Vec<Expression>,
    },

    /// `name = value;`
    Assign {
        name: String,
        value: Expression,
    },

    /// `array[index] = value;`
    IndexAssign {
        array: String,
        index: Expression,
        value: Expression,
    },

    /// If statement
    If {
        condition: Expression,
        then_branch: Vec<Statement>,
        else_branch: Option<Vec<Statement>>,
    },

    /// While loop
    While {
        condition: Expression,
        body: Vec<Statement>,
    },

    /// For loop
    For {
        init: Option<Box<Statement>>,
        condition: Option<Expression>,
        update: Option<Box<Statement>>,
        body: Vec<Statement>,
    },

    /// Nested block
    Block(Vec<Statement>),

    /// Function declaration (top level only)
    FunctionDecl {
        name: String,
        parameters: Vec<Parameter>,
        return_type: DataType,
        body: Vec<Statement>,
    },

    /// Return statement
    Return(Option<Expression>),

    /// `print(expr);`
    Print(Expression),

    /// `println(expr);`
    Println(Expression),

    /// Expression evaluated for its effect
    Expression(Expression),

    /// Break statement
    Break,

    /// Continue statement
    Continue,
}

/// Function parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub data_type: DataType,
}

impl Parameter {
    pub fn new(name: &str, data_type: DataType) -> Self {
        Self {
            name: name.to_string(),
            data_type,
        }
    }
}

impl Statement {
    pub fn new(kind: StatementKind, location: SourceLocation) -> Self {
        Self { kind, location }
    }

    fn synthetic(kind: StatementKind) -> Self {
        Self::new(kind, SourceLocation::dummy())
    }

    pub fn var(name: &str, data_type: DataType, initializer: Option<Expression>) -> Self {
        Self::synthetic(StatementKind::VarDecl {
            name: name.to_string(),
            data_type,
            initializer,
        })
    }

    pub fn array(name: &str, element_type: DataType, size: usize, elements: Vec<Expression>) -> Self {
        Self::synthetic(StatementKind::ArrayDecl {
            name: name.to_string(),
            element_type,
            size,
            elements,
        })
    }

    pub fn assign(name: &str, value: Expression) -> Self {
        Self::synthetic(StatementKind::Assign {
            name: name.to_string(),
            value,
        })
    }

    pub fn index_assign(array: &str, index: Expression, value: Expression) -> Self {
        Self::synthetic(StatementKind::IndexAssign {
            array: array.to_string(),
            index,
            value,
        })
    }

    pub fn if_else(
        condition: Expression,
        then_branch: Vec<Statement>,
        else_branch: Option<Vec<Statement>>,
    ) -> Self {
        Self::synthetic(StatementKind::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    pub fn while_loop(condition: Expression, body: Vec<Statement>) -> Self {
        Self::synthetic(StatementKind::While { condition, body })
    }

    pub fn for_loop(
        init: Option<Statement>,
        condition: Option<Expression>,
        update: Option<Statement>,
        body: Vec<Statement>,
    ) -> Self {
        Self::synthetic(StatementKind::For {
            init: init.map(Box::new),
            condition,
            update: update.map(Box::new),
            body,
        })
    }

    pub fn function(
        name: &str,
        parameters: Vec<Parameter>,
        return_type: DataType,
        body: Vec<Statement>,
    ) -> Self {
        Self::synthetic(StatementKind::FunctionDecl {
            name: name.to_string(),
            parameters,
            return_type,
            body,
        })
    }

    pub fn ret(value: Option<Expression>) -> Self {
        Self::synthetic(StatementKind::Return(value))
    }

    pub fn print(value: Expression) -> Self {
        Self::synthetic(StatementKind::Print(value))
    }

    pub fn println(value: Expression) -> Self {
        Self::synthetic(StatementKind::Println(value))
    }

    pub fn expr(value: Expression) -> Self {
        Self::synthetic(StatementKind::Expression(value))
    }

    /// Attach a source position (builder style)
    pub fn at(mut self, line: u32, column: u32) -> Self {
        self.location = SourceLocation::new(line, column);
        self
    }

    /// Collect every name this statement (and its children) reads or writes
    pub fn collect_names<'a>(&'a self, out: &mut Vec<&'a str>) {
        match &self.kind {
            StatementKind::VarDecl { initializer, .. } => {
                if let Some(init) = initializer {
                    init.collect_names(out);
                }
            }
            StatementKind::ArrayDecl { elements, .. } => {
                for element in elements {
                    element.collect_names(out);
                }
            }
            StatementKind::Assign { name, value } => {
                out.push(name);
                value.collect_names(out);
            }
            StatementKind::IndexAssign { array, index, value } => {
                out.push(array);
                index.collect_names(out);
                value.collect_names(out);
            }
            StatementKind::If { condition, then_branch, else_branch } => {
                condition.collect_names(out);
                collect_block_names(then_branch, out);
                if let Some(else_branch) = else_branch {
                    collect_block_names(else_branch, out);
                }
            }
            StatementKind::While { condition, body } => {
                condition.collect_names(out);
                collect_block_names(body, out);
            }
            StatementKind::For { init, condition, update, body } => {
                if let Some(init) = init {
                    init.collect_names(out);
                }
                if let Some(condition) = condition {
                    condition.collect_names(out);
                }
                if let Some(update) = update {
                    update.collect_names(out);
                }
                collect_block_names(body, out);
            }
            StatementKind::Block(body) | StatementKind::FunctionDecl { body, .. } => {
                collect_block_names(body, out);
            }
            StatementKind::Return(value) => {
                if let Some(value) = value {
                    value.collect_names(out);
                }
            }
            StatementKind::Print(value)
            | StatementKind::Println(value)
            | StatementKind::Expression(value) => value.collect_names(out),
            StatementKind::Break | StatementKind::Continue => {}
        }
    }
}

fn collect_block_names<'a>(body: &'a [Statement], out: &mut Vec<&'a str>) {
    for stmt in body {
        stmt.collect_names(out);
    }
}
