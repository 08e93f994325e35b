//! IR generation
//!
//! Lowers a validated syntax tree into an [`IrProgram`]. Top-level statements
//! form the implicit entry function `main`; each declared function becomes
//! its own [`IrFunction`]. The scope trace is consulted to resolve names but
//! bindings are never re-checked here.

mod context;
mod expressions;
mod statements;


pub use context::GenContext;

use crate::ir::{GlobalVar, Instruction, IrFunction, IrProgram, Opcode, Operand};
use lark_common::{CompilerError, DataType};
use lark_syntax::{Parameter, ScopeTrace, Statement, StatementKind, SymbolKind, SyntaxTree};
use log::{debug, info};
use std::collections::{HashMap, HashSet};

/// Name of the implicit entry function
pub const ENTRY_FUNCTION: &str = "main";

/// Options controlling IR generation
#[derive(Debug, Clone, Default)]
pub struct GeneratorOptions {
    /// Skip the implicit `Return #0` of `main` when its body already ends in
    /// an explicit return
    pub suppress_redundant_entry_return: bool,
}

/// How a source name is stored
#[derive(Debug, Clone, PartialEq)]
enum Binding {
    /// Function-local variable or parameter, used directly as an operand
    Direct(Operand),
    /// Program-level scalar accessed with `Load`/`Store`
    Global(Operand),
    /// Array of the given element type (local or program-level)
    Array { name: String, element_type: DataType },
}

/// Top-level storage declaration that may be promoted to a global
#[derive(Debug, Clone)]
struct TopLevelDecl {
    data_type: DataType,
    element_count: Option<usize>,
}

/// State of the function currently being lowered
struct FunctionState {
    function: IrFunction,
    /// `None` while lowering the entry function
    declared_name: Option<String>,
    bindings: HashMap<String, Binding>,
}

/// Lowers one compilation unit into IR
pub struct IrGenerator<'a> {
    scopes: &'a ScopeTrace,
    options: GeneratorOptions,
    ctx: GenContext,
    /// Return types of functions declared in the unit
    signatures: HashMap<String, DataType>,
    /// Globals in order of first reference from a declared function
    globals: Vec<GlobalVar>,
    current: Option<FunctionState>,
}

impl<'a> IrGenerator<'a> {
    pub fn new(scopes: &'a ScopeTrace, options: GeneratorOptions) -> Self {
        Self {
            scopes,
            options,
            ctx: GenContext::new(),
            signatures: HashMap::new(),
            globals: Vec::new(),
            current: None,
        }
    }

    pub fn context(&self) -> &GenContext {
        &self.ctx
    }

    /// Lower the whole tree into a program
    pub fn generate(&mut self, tree: &SyntaxTree) -> Result<IrProgram, CompilerError> {
        info!("Generating IR for {} top-level statements", tree.statements.len());

        self.signatures = tree
            .functions()
            .filter_map(|s| match &s.kind {
                StatementKind::FunctionDecl { name, return_type, .. } => Some((name.clone(), *return_type)),
                _ => None,
            })
            .collect();
        self.globals = self.promote_globals(tree);

        let mut program = IrProgram::new();
        for global in &self.globals {
            debug!("Promoting '{}' to a program global", global.name);
            program.add_global(global.clone());
        }

        let main = self.generate_entry(tree)?;
        program.add_function(main);

        for stmt in tree.functions() {
            if let StatementKind::FunctionDecl { name, parameters, return_type, body } = &stmt.kind {
                let function = self.generate_function(name, parameters, *return_type, body)?;
                program.add_function(function);
            }
        }

        program.strings = self.ctx.strings().clone();
        info!(
            "Generated {} functions, {} instructions, {} strings",
            program.functions.len(),
            program.instruction_count(),
            program.strings.len()
        );
        Ok(program)
    }

    fn generate_entry(&mut self, tree: &SyntaxTree) -> Result<IrFunction, CompilerError> {
        debug!("Lowering entry function '{}'", ENTRY_FUNCTION);
        self.begin_function(IrFunction::new(ENTRY_FUNCTION, Vec::new(), DataType::Int), None);
        self.emit(Instruction::new(Opcode::FuncEnter).with_label(ENTRY_FUNCTION));

        for stmt in tree.entry_statements() {
            self.lower_entry_statement(stmt)?;
        }

        let mut function = self.end_function()?;
        let ends_in_return = matches!(function.last_instruction(), Some(i) if i.opcode == Opcode::Return);
        if self.options.suppress_redundant_entry_return && ends_in_return {
            debug!("Suppressing redundant implicit return in '{}'", ENTRY_FUNCTION);
        } else {
            function.push(Instruction::ret(Some(Operand::int(0))));
        }
        Ok(function)
    }

    fn generate_function(
        &mut self,
        name: &str,
        parameters: &[Parameter],
        return_type: DataType,
        body: &[Statement],
    ) -> Result<IrFunction, CompilerError> {
        debug!("Lowering function '{}' ({} params)", name, parameters.len());

        let params: Vec<Operand> = parameters
            .iter()
            .map(|p| Operand::param(p.name.as_str(), p.data_type))
            .collect();
        let mut state_function = IrFunction::new(name, params.clone(), return_type);
        state_function.push(Instruction::new(Opcode::FuncEnter).with_label(name));
        self.begin_function(state_function, Some(name.to_string()));
        for (param, operand) in parameters.iter().zip(params) {
            self.bind(&param.name, Binding::Direct(operand));
        }

        for stmt in body {
            self.lower_statement(stmt)?;
        }

        let mut function = self.end_function()?;
        if !matches!(function.last_instruction(), Some(i) if i.opcode == Opcode::Return) {
            function.push(Instruction::new(Opcode::FuncExit).with_label(name));
        }
        Ok(function)
    }

    fn begin_function(&mut self, function: IrFunction, declared_name: Option<String>) {
        self.current = Some(FunctionState { function, declared_name, bindings: HashMap::new() });
    }

    fn end_function(&mut self) -> Result<IrFunction, CompilerError> {
        self.current
            .take()
            .map(|state| state.function)
            .ok_or_else(|| CompilerError::internal("no function is being generated"))
    }

    // ===== Emission helpers =====

    fn emit(&mut self, inst: Instruction) {
        if let Some(state) = self.current.as_mut() {
            state.function.push(inst);
        }
    }

    fn add_local(&mut self, local: Operand) {
        if let Some(state) = self.current.as_mut() {
            state.function.add_local(local);
        }
    }

    fn bind(&mut self, name: &str, binding: Binding) {
        if let Some(state) = self.current.as_mut() {
            state.bindings.insert(name.to_string(), binding);
        }
    }

    fn global_named(&self, name: &str) -> Option<&GlobalVar> {
        self.globals.iter().find(|g| g.name == name)
    }

    // ===== Name resolution =====

    /// Resolve a source name to its storage
    ///
    /// Declarations seen so far in the current function win, then promoted
    /// globals, then the scope trace. Anything else defaults to an `Int`
    /// variable.
    fn resolve(&self, name: &str) -> Binding {
        let Some(state) = self.current.as_ref() else {
            return Binding::Direct(Operand::var(name, DataType::Int));
        };
        if let Some(binding) = state.bindings.get(name) {
            return binding.clone();
        }
        if let Some(global) = self.global_named(name) {
            return global_binding(global);
        }

        let symbol = match &state.declared_name {
            None => self.scopes.resolve_entry(name),
            Some(function) => self.scopes.resolve_in_function(function, name).map(|(s, _)| s),
        };
        match symbol.map(|s| (s.kind, s.data_type)) {
            Some((SymbolKind::Parameter { .. }, ty)) => Binding::Direct(Operand::param(name, ty)),
            Some((SymbolKind::Array { .. }, ty)) => Binding::Array { name: name.to_string(), element_type: ty },
            Some((_, ty)) => Binding::Direct(Operand::var(name, ty)),
            None => {
                debug!("Unresolved name '{}' in '{}'; treating it as an int variable", name, state.function.name);
                Binding::Direct(Operand::var(name, DataType::Int))
            }
        }
    }

    /// Return type of a callee
    fn callee_return_type(&self, name: &str) -> DataType {
        self.signatures
            .get(name)
            .copied()
            .or_else(|| self.scopes.function_return_type(name))
            .unwrap_or_else(|| {
                debug!("Unknown callee '{}'; assuming an int result", name);
                DataType::Int
            })
    }

    /// Top-level variables that some declared function references
    ///
    /// A name is promoted when a function uses it without declaring it in its
    /// own scopes while the entry code declares it at top level.
    fn promote_globals(&self, tree: &SyntaxTree) -> Vec<GlobalVar> {
        let mut top_level: HashMap<&str, TopLevelDecl> = HashMap::new();
        for symbol in &self.scopes.global().symbols {
            match symbol.kind {
                SymbolKind::Variable => {
                    top_level.insert(&symbol.name, TopLevelDecl { data_type: symbol.data_type, element_count: None });
                }
                SymbolKind::Array { element_count } => {
                    top_level.insert(
                        &symbol.name,
                        TopLevelDecl { data_type: symbol.data_type, element_count: Some(element_count) },
                    );
                }
                SymbolKind::Parameter { .. } | SymbolKind::Function { .. } => {}
            }
        }
        for stmt in tree.entry_statements() {
            match &stmt.kind {
                StatementKind::VarDecl { name, data_type, .. } => {
                    top_level.insert(name, TopLevelDecl { data_type: *data_type, element_count: None });
                }
                StatementKind::ArrayDecl { name, element_type, size, .. } => {
                    top_level.insert(name, TopLevelDecl { data_type: *element_type, element_count: Some(*size) });
                }
                _ => {}
            }
        }

        let mut promoted: Vec<GlobalVar> = Vec::new();
        for stmt in tree.functions() {
            let StatementKind::FunctionDecl { name: function, parameters, body, .. } = &stmt.kind else {
                continue;
            };
            let mut own: HashSet<&str> = parameters.iter().map(|p| p.name.as_str()).collect();
            collect_declarations(body, &mut own);
            if let Some(scope) = self.scopes.function_scope(function) {
                collect_scope_symbols(scope, &mut own);
            }

            let mut used = Vec::new();
            stmt.collect_names(&mut used);
            for name in used {
                if own.contains(name) || promoted.iter().any(|g| g.name == name) {
                    continue;
                }
                if let Some(decl) = top_level.get(name) {
                    promoted.push(GlobalVar {
                        name: name.to_string(),
                        data_type: decl.data_type,
                        element_count: decl.element_count,
                    });
                }
            }
        }
        promoted
    }
}

fn global_binding(global: &GlobalVar) -> Binding {
    match global.element_count {
        Some(_) => Binding::Array { name: global.name.clone(), element_type: global.data_type },
        None => Binding::Global(Operand::global(global.name.as_str(), global.data_type)),
    }
}

/// Names declared anywhere inside a statement list
fn collect_declarations<'s>(body: &'s [Statement], out: &mut HashSet<&'s str>) {
    for stmt in body {
        match &stmt.kind {
            StatementKind::VarDecl { name, .. } | StatementKind::ArrayDecl { name, .. } => {
                out.insert(name);
            }
            StatementKind::If { then_branch, else_branch, .. } => {
                collect_declarations(then_branch, out);
                if let Some(else_branch) = else_branch {
                    collect_declarations(else_branch, out);
                }
            }
            StatementKind::While { body, .. } | StatementKind::Block(body) => collect_declarations(body, out),
            StatementKind::For { init, body, .. } => {
                if let Some(init) = init {
                    collect_declarations(std::slice::from_ref(init.as_ref()), out);
                }
                collect_declarations(body, out);
            }
            _ => {}
        }
    }
}

fn collect_scope_symbols<'s>(scope: &'s lark_syntax::Scope, out: &mut HashSet<&'s str>) {
    for symbol in &scope.symbols {
        out.insert(&symbol.name);
    }
    for child in &scope.children {
        collect_scope_symbols(child, out);
    }
}
