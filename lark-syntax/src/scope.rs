//! Scope trace produced by semantic analysis
//!
//! The declaration/scope visitor upstream records one symbol table per
//! lexical scope, nested the same way the scopes nest in the source. IR
//! generation reads it to resolve names to storage and types; nothing here
//! re-checks the bindings.

use lark_common::DataType;
use serde::{Deserialize, Serialize};

/// Kind of lexical scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScopeKind {
    Global,
    Function,
    Block,
}

/// What a symbol names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SymbolKind {
    Variable,
    Parameter { position: usize },
    Array { element_count: usize },
    /// `data_type` of a function symbol is its return type
    Function { parameter_count: usize },
}

/// Symbol table entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    pub data_type: DataType,
    pub kind: SymbolKind,
    #[serde(default)]
    pub line: u32,
}

impl Symbol {
    pub fn variable(name: &str, data_type: DataType) -> Self {
        Self { name: name.to_string(), data_type, kind: SymbolKind::Variable, line: 0 }
    }

    pub fn parameter(name: &str, data_type: DataType, position: usize) -> Self {
        Self { name: name.to_string(), data_type, kind: SymbolKind::Parameter { position }, line: 0 }
    }

    pub fn array(name: &str, element_type: DataType, element_count: usize) -> Self {
        Self { name: name.to_string(), data_type: element_type, kind: SymbolKind::Array { element_count }, line: 0 }
    }

    pub fn function(name: &str, return_type: DataType, parameter_count: usize) -> Self {
        Self { name: name.to_string(), data_type: return_type, kind: SymbolKind::Function { parameter_count }, line: 0 }
    }

    pub fn is_storage(&self) -> bool {
        matches!(self.kind, SymbolKind::Variable | SymbolKind::Array { .. })
    }
}

/// One lexical scope with its symbols and nested scopes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scope {
    pub kind: ScopeKind,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub symbols: Vec<Symbol>,
    #[serde(default)]
    pub children: Vec<Scope>,
}

impl Scope {
    pub fn new(kind: ScopeKind, name: &str, symbols: Vec<Symbol>, children: Vec<Scope>) -> Self {
        Self { kind, name: name.to_string(), symbols, children }
    }

    /// Look up a symbol declared directly in this scope
    pub fn lookup_local(&self, name: &str) -> Option<&Symbol> {
        self.symbols.iter().find(|s| s.name == name)
    }

    /// Look up a symbol declared in this scope or any nested scope
    ///
    /// Outer declarations win over inner ones; within one level the first
    /// declaration wins.
    pub fn lookup_in_subtree(&self, name: &str) -> Option<&Symbol> {
        self.lookup_local(name)
            .or_else(|| self.children.iter().find_map(|child| child.lookup_in_subtree(name)))
    }

    /// Look up a symbol in this scope and its nested non-function scopes
    pub fn lookup_excluding_functions(&self, name: &str) -> Option<&Symbol> {
        self.lookup_local(name).or_else(|| {
            self.children
                .iter()
                .filter(|child| child.kind != ScopeKind::Function)
                .find_map(|child| child.lookup_excluding_functions(name))
        })
    }
}

/// The complete nested scope structure for one compilation unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeTrace {
    pub root: Scope,
}

impl Default for ScopeTrace {
    fn default() -> Self {
        Self::new(Vec::new(), Vec::new())
    }
}

impl ScopeTrace {
    /// Build a trace from the global scope's symbols and nested scopes
    pub fn new(symbols: Vec<Symbol>, children: Vec<Scope>) -> Self {
        Self { root: Scope::new(ScopeKind::Global, "global", symbols, children) }
    }

    pub fn global(&self) -> &Scope {
        &self.root
    }

    /// The scope opened by the declaration of function `name`
    pub fn function_scope(&self, name: &str) -> Option<&Scope> {
        self.root
            .children
            .iter()
            .find(|s| s.kind == ScopeKind::Function && s.name == name)
    }

    /// Resolve a name used in the top-level (entry) code
    pub fn resolve_entry(&self, name: &str) -> Option<&Symbol> {
        self.root.lookup_excluding_functions(name)
    }

    /// Resolve a name used inside function `function`
    ///
    /// Returns the symbol and whether it lives in the function's own scopes.
    pub fn resolve_in_function(&self, function: &str, name: &str) -> Option<(&Symbol, bool)> {
        if let Some(symbol) = self.function_scope(function).and_then(|s| s.lookup_in_subtree(name)) {
            return Some((symbol, true));
        }
        self.root.lookup_local(name).map(|symbol| (symbol, false))
    }

    /// Return type of a declared function
    pub fn function_return_type(&self, name: &str) -> Option<DataType> {
        self.root
            .lookup_local(name)
            .filter(|s| matches!(s.kind, SymbolKind::Function { .. }))
            .map(|s| s.data_type)
    }
}
