//! Lark Compiler - Syntax Input Model
//! 
//! The lexer, parser, and scope analysis live upstream of this backend. They
//! hand over a validated syntax tree together with the scope trace built
//! while checking it; this crate defines both, plus the JSON envelope that
//! carries them into the compiler driver.
//! 
//! - `ast`: statements and expressions as closed tagged unions
//! - `scope`: the nested per-scope symbol tables
//! - `input`: the `CompilationInput` envelope and upstream diagnostics

pub mod ast;
pub mod scope;
pub mod input;

pub use ast::{
    BinaryOp, Expression, ExpressionKind, Parameter, Statement, StatementKind, SyntaxTree, UnaryOp,
};
pub use input::{CompilationInput, UpstreamDiagnostic, UpstreamPhase};
pub use scope::{Scope, ScopeKind, ScopeTrace, Symbol, SymbolKind};
