//! Compilation statistics

use serde::Serialize;
use std::time::Instant;

/// Wall-clock time spent in one phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseTiming {
    pub phase: String,
    pub micros: u64,
}

/// Counters gathered while compiling
///
/// Fields only ever grow or get filled in; a failed compilation keeps
/// whatever the completed phases recorded.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Statistics {
    pub phases: Vec<PhaseTiming>,
    pub functions: usize,
    pub strings: usize,
    pub temporaries_issued: u32,
    pub labels_issued: u32,
    pub ir_instructions_generated: usize,
    pub ir_instructions_optimized: usize,
    pub optimizer_iterations: usize,
    pub optimizer_converged: bool,
    pub optimizer_pass_changes: Vec<(String, usize)>,
    pub asm_instructions_generated: usize,
    pub asm_instructions_optimized: usize,
    pub peephole_rule_hits: Vec<(String, usize)>,
}

impl Statistics {
    pub(crate) fn record_phase(&mut self, phase: &str, started: Instant) {
        let micros = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        self.phases.push(PhaseTiming { phase: phase.to_string(), micros });
    }

    pub fn phase_micros(&self, phase: &str) -> Option<u64> {
        self.phases.iter().find(|p| p.phase == phase).map(|p| p.micros)
    }

    pub fn total_micros(&self) -> u64 {
        self.phases.iter().map(|p| p.micros).sum()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
