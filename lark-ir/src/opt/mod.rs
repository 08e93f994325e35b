//! IR optimizer
//!
//! A fixpoint pipeline of local rewrites. Each iteration runs every pass, in
//! a fixed order, over every function; iteration stops when a full sweep
//! changes nothing or after [`MAX_ITERATIONS`] sweeps. Passes can re-enable
//! each other (folding exposes constants, propagation exposes folds), so the
//! cap is what guarantees termination.

mod const_prop;
mod dce;
mod fold;
mod labels;
mod peephole;
mod redundant_load;


pub use const_prop::ConstantPropagation;
pub use dce::DeadCodeElimination;
pub use fold::ConstantFolding;
pub use labels::UnusedLabelRemoval;
pub use peephole::Peephole;
pub use redundant_load::RedundantLoadRemoval;

use crate::ir::{Instruction, IrFunction, IrProgram};
use lark_common::{Diagnostic, SourceLocation};
use log::{debug, info, trace};
use std::collections::HashSet;

/// Upper bound on full sweeps over the program
pub const MAX_ITERATIONS: usize = 10;

/// A single optimization pass over one function
pub trait Pass {
    fn name(&self) -> &'static str;

    /// Rewrite `function` in place; returns whether anything changed
    fn run(&mut self, function: &mut IrFunction, ctx: &mut OptContext) -> bool;
}

/// State shared by passes across iterations
#[derive(Debug, Default)]
pub struct OptContext {
    warnings: Vec<Diagnostic>,
    reported: HashSet<(String, String)>,
}

impl OptContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning about `inst`, once per instruction per function
    pub fn warn_once(&mut self, function: &str, inst: &Instruction, message: String) {
        let key = (function.to_string(), format!("{}@{}", inst, inst.source_line));
        if self.reported.insert(key) {
            debug!("Optimizer warning in '{}': {}", function, message);
            self.warnings
                .push(Diagnostic::warning(message, SourceLocation::new(inst.source_line, 0)));
        }
    }

    pub fn warnings(&self) -> &[Diagnostic] {
        &self.warnings
    }
}

/// What one optimizer run did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptimizerStats {
    pub iterations: usize,
    /// Whether the last sweep changed nothing
    pub converged: bool,
    /// Number of (iteration, function) runs in which each pass changed
    /// something, in pipeline order
    pub pass_changes: Vec<(String, usize)>,
    pub instructions_before: usize,
    pub instructions_after: usize,
}

impl OptimizerStats {
    pub fn changes_for(&self, pass: &str) -> usize {
        self.pass_changes
            .iter()
            .find(|(name, _)| name == pass)
            .map_or(0, |(_, count)| *count)
    }
}

/// The standard pass pipeline, in execution order
pub fn default_passes() -> Vec<Box<dyn Pass>> {
    vec![
        Box::new(ConstantPropagation),
        Box::new(ConstantFolding),
        Box::new(DeadCodeElimination),
        Box::new(RedundantLoadRemoval),
        Box::new(UnusedLabelRemoval),
        Box::new(Peephole),
    ]
}

pub struct Optimizer {
    passes: Vec<Box<dyn Pass>>,
    ctx: OptContext,
}

impl Default for Optimizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Optimizer {
    pub fn new() -> Self {
        Self::with_passes(default_passes())
    }

    pub fn with_passes(passes: Vec<Box<dyn Pass>>) -> Self {
        Self { passes, ctx: OptContext::new() }
    }

    /// Optimize every function of `program` in place
    pub fn optimize(&mut self, program: &mut IrProgram) -> OptimizerStats {
        let mut stats = OptimizerStats {
            instructions_before: program.instruction_count(),
            pass_changes: self.passes.iter().map(|p| (p.name().to_string(), 0)).collect(),
            ..OptimizerStats::default()
        };

        while stats.iterations < MAX_ITERATIONS {
            stats.iterations += 1;
            let mut changed = false;

            for function in &mut program.functions {
                for (index, pass) in self.passes.iter_mut().enumerate() {
                    if pass.run(function, &mut self.ctx) {
                        trace!("  {} changed '{}' (iteration {})", pass.name(), function.name, stats.iterations);
                        stats.pass_changes[index].1 += 1;
                        changed = true;
                    }
                }
            }

            if !changed {
                stats.converged = true;
                break;
            }
        }

        stats.instructions_after = program.instruction_count();
        if !stats.converged {
            debug!("Optimizer stopped at the iteration cap ({})", MAX_ITERATIONS);
        }
        info!(
            "IR optimization: {} -> {} instructions in {} iteration(s)",
            stats.instructions_before, stats.instructions_after, stats.iterations
        );
        stats
    }

    pub fn warnings(&self) -> &[Diagnostic] {
        self.ctx.warnings()
    }
}
