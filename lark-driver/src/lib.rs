//! Lark Compiler Driver
//!
//! Sequences the backend phases over one compilation input. Each phase is a
//! method on `Compiler` that moves it one step along
//! `Idle -> IrGenerated -> IrOptimized -> Arm64Generated -> Arm64Optimized -> Validated`.
//! The two optimization steps are optional. A failing phase, or a phase
//! called out of order, leaves the compiler in `Failed`.

pub mod stats;
pub mod validate;

pub use stats::{PhaseTiming, Statistics};
pub use validate::validate_assembly;

use lark_codegen::{Aapcs64, AsmProgram, CodeGenerator, PostOptimizer};
use lark_common::{CompilerError, Diagnostic, ErrorReporter};
use lark_ir::{GeneratorOptions, IrGenerator, IrProgram, Optimizer};
use lark_syntax::CompilationInput;
use log::{debug, error, info, warn};
use std::fmt;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompilerOptions {
    pub optimize_ir: bool,
    pub optimize_asm: bool,
    /// Skip the implicit `Return #0` when the entry code already returns
    pub suppress_redundant_return: bool,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self { optimize_ir: true, optimize_asm: true, suppress_redundant_return: false }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompilerState {
    Idle,
    IrGenerated,
    IrOptimized,
    Arm64Generated,
    Arm64Optimized,
    Validated,
    Failed,
}

impl fmt::Display for CompilerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CompilerState::Idle => "idle",
            CompilerState::IrGenerated => "IR generated",
            CompilerState::IrOptimized => "IR optimized",
            CompilerState::Arm64Generated => "ARM64 generated",
            CompilerState::Arm64Optimized => "ARM64 optimized",
            CompilerState::Validated => "validated",
            CompilerState::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// Everything one run of the pipeline produced
#[derive(Debug, Clone)]
pub struct CompilationResult {
    pub state: CompilerState,
    pub ir_text: Option<String>,
    pub assembly: Option<String>,
    pub statistics: Statistics,
    pub diagnostics: Vec<Diagnostic>,
}

impl CompilationResult {
    pub fn succeeded(&self) -> bool {
        self.state == CompilerState::Validated
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_error()).count()
    }

    /// The diagnostics gathered into a reporter for printing
    pub fn reporter(&self) -> ErrorReporter {
        let mut reporter = ErrorReporter::new();
        for diagnostic in &self.diagnostics {
            reporter.report(diagnostic.clone());
        }
        reporter
    }
}

pub struct Compiler {
    options: CompilerOptions,
    state: CompilerState,
    program: Option<IrProgram>,
    assembly: Option<AsmProgram>,
    reporter: ErrorReporter,
    stats: Statistics,
}

impl Compiler {
    pub fn new(options: CompilerOptions) -> Self {
        Self {
            options,
            state: CompilerState::Idle,
            program: None,
            assembly: None,
            reporter: ErrorReporter::new(),
            stats: Statistics::default(),
        }
    }

    /// Run every enabled phase over `input`
    pub fn compile(input: &CompilationInput, options: CompilerOptions) -> CompilationResult {
        let mut compiler = Compiler::new(options);
        if let Err(err) = compiler.run(input) {
            debug!("compilation stopped: {}", err);
        }
        compiler.into_result()
    }

    fn run(&mut self, input: &CompilationInput) -> Result<(), CompilerError> {
        self.generate_ir(input)?;
        if self.options.optimize_ir {
            self.optimize_ir()?;
        }
        self.generate_arm64()?;
        if self.options.optimize_asm {
            self.optimize_arm64()?;
        }
        self.validate()
    }

    pub fn state(&self) -> CompilerState {
        self.state
    }

    pub fn options(&self) -> CompilerOptions {
        self.options
    }

    pub fn program(&self) -> Option<&IrProgram> {
        self.program.as_ref()
    }

    pub fn assembly(&self) -> Option<&AsmProgram> {
        self.assembly.as_ref()
    }

    pub fn statistics(&self) -> &Statistics {
        &self.stats
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        self.reporter.diagnostics()
    }

    pub fn into_result(self) -> CompilationResult {
        CompilationResult {
            state: self.state,
            ir_text: self.program.as_ref().map(|p| p.to_string()),
            assembly: self.assembly.as_ref().map(|a| a.to_string()),
            statistics: self.stats,
            diagnostics: self.reporter.diagnostics().to_vec(),
        }
    }

    /// Lower the syntax tree, unless upstream phases already reported errors
    pub fn generate_ir(&mut self, input: &CompilationInput) -> Result<(), CompilerError> {
        self.enter("generate_ir", &[CompilerState::Idle])?;

        for warning in input.diagnostics.iter().filter(|d| d.is_warning) {
            self.reporter.report(warning.to_diagnostic());
        }

        let upstream: Vec<Diagnostic> = input.upstream_errors().map(|d| d.to_diagnostic()).collect();
        if !upstream.is_empty() {
            let count = upstream.len();
            for diagnostic in upstream {
                self.reporter.report(diagnostic);
            }
            return Err(self.fail(CompilerError::InputError {
                message: format!("{} upstream error(s)", count),
            }));
        }

        info!("Generating IR");
        let started = Instant::now();
        let options = GeneratorOptions {
            suppress_redundant_entry_return: self.options.suppress_redundant_return,
        };
        let mut generator = IrGenerator::new(&input.scopes, options);
        match generator.generate(&input.tree) {
            Ok(program) => {
                self.stats.record_phase("ir-generation", started);
                self.stats.functions = program.functions.len();
                self.stats.strings = program.strings.len();
                self.stats.temporaries_issued = generator.context().temps_issued();
                self.stats.labels_issued = generator.context().labels_issued();
                self.stats.ir_instructions_generated = program.instruction_count();
                self.stats.ir_instructions_optimized = program.instruction_count();
                self.program = Some(program);
                self.state = CompilerState::IrGenerated;
                Ok(())
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    pub fn optimize_ir(&mut self) -> Result<(), CompilerError> {
        self.enter("optimize_ir", &[CompilerState::IrGenerated])?;
        let Some(program) = self.program.as_mut() else {
            return Err(self.fail(CompilerError::internal("no IR program to optimize")));
        };

        info!("Optimizing IR");
        let started = Instant::now();
        let mut optimizer = Optimizer::new();
        let result = optimizer.optimize(program);
        for warning in optimizer.warnings() {
            warn!("{}", warning.message);
            self.reporter.report(warning.clone());
        }

        self.stats.record_phase("ir-optimization", started);
        self.stats.ir_instructions_optimized = result.instructions_after;
        self.stats.optimizer_iterations = result.iterations;
        self.stats.optimizer_converged = result.converged;
        self.stats.optimizer_pass_changes = result.pass_changes;
        self.state = CompilerState::IrOptimized;
        Ok(())
    }

    pub fn generate_arm64(&mut self) -> Result<(), CompilerError> {
        self.enter("generate_arm64", &[CompilerState::IrGenerated, CompilerState::IrOptimized])?;
        let Some(program) = self.program.as_mut() else {
            return Err(self.fail(CompilerError::internal("no IR program to generate code for")));
        };

        info!("Generating ARM64 assembly");
        let started = Instant::now();
        let mut codegen = CodeGenerator::new(Box::new(Aapcs64));
        let generated = codegen.generate(program);
        for diagnostic in codegen.diagnostics() {
            self.reporter.report(diagnostic.clone());
        }

        match generated {
            Ok(assembly) => {
                for function in &assembly.functions {
                    if let Some(ir_function) = program.function_mut(&function.name) {
                        ir_function.stack_frame_size = function.frame_size;
                    }
                }
                self.stats.record_phase("arm64-generation", started);
                self.stats.asm_instructions_generated = assembly.instruction_count();
                self.stats.asm_instructions_optimized = assembly.instruction_count();
                self.assembly = Some(assembly);
                self.state = CompilerState::Arm64Generated;
                Ok(())
            }
            Err(err) => Err(self.fail(err.into())),
        }
    }

    pub fn optimize_arm64(&mut self) -> Result<(), CompilerError> {
        self.enter("optimize_arm64", &[CompilerState::Arm64Generated])?;
        let Some(assembly) = self.assembly.as_mut() else {
            return Err(self.fail(CompilerError::internal("no assembly to optimize")));
        };

        info!("Running peephole optimizer");
        let started = Instant::now();
        let result = PostOptimizer::new().optimize(assembly);
        self.stats.record_phase("arm64-optimization", started);
        self.stats.asm_instructions_optimized = result.instructions_after;
        self.stats.peephole_rule_hits = result.rule_hits;
        self.state = CompilerState::Arm64Optimized;
        Ok(())
    }

    pub fn validate(&mut self) -> Result<(), CompilerError> {
        self.enter("validate", &[CompilerState::Arm64Generated, CompilerState::Arm64Optimized])?;
        let Some(assembly) = self.assembly.as_ref() else {
            return Err(self.fail(CompilerError::internal("no assembly to validate")));
        };

        let started = Instant::now();
        let problems = validate_assembly(assembly);
        self.stats.record_phase("validation", started);

        if problems.is_empty() {
            info!("Assembly validated");
            self.state = CompilerState::Validated;
            return Ok(());
        }

        let count = problems.len();
        for problem in problems {
            self.reporter.error(problem, Default::default());
        }
        Err(self.fail(CompilerError::internal(format!("assembly validation found {} problem(s)", count))))
    }

    /// Check that `phase` may run in the current state
    fn enter(&mut self, phase: &str, allowed: &[CompilerState]) -> Result<(), CompilerError> {
        if self.state == CompilerState::Failed {
            return Err(CompilerError::internal(format!("{} called after compilation failed", phase)));
        }
        if !allowed.contains(&self.state) {
            let message = format!("{} called in state '{}'", phase, self.state);
            return Err(self.fail(CompilerError::internal(message)));
        }
        debug!("{} starting in state '{}'", phase, self.state);
        Ok(())
    }

    fn fail(&mut self, err: CompilerError) -> CompilerError {
        error!("{}", err);
        self.reporter.compiler_error(&err);
        self.state = CompilerState::Failed;
        err
    }
}
