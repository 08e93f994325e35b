//! Dead code elimination
//!
//! Liveness here is deliberately coarse: a destination counts as used if any
//! instruction anywhere in the function reads it. That keeps loop-carried
//! values alive without a data-flow analysis.

use super::{OptContext, Pass};
use crate::ir::{IrFunction, Location};
use std::collections::HashSet;

pub struct DeadCodeElimination;

impl Pass for DeadCodeElimination {
    fn name(&self) -> &'static str {
        "dead-code-elimination"
    }

    fn run(&mut self, function: &mut IrFunction, _ctx: &mut OptContext) -> bool {
        let used: HashSet<Location> = function.instructions.iter().flat_map(|i| i.uses()).collect();
        let before = function.instructions.len();

        function.instructions.retain(|inst| {
            if inst.opcode.has_side_effect() || !inst.opcode.is_removable_when_unused() {
                return true;
            }
            match inst.defined() {
                Some(dest) => used.contains(&dest),
                None => true,
            }
        });

        function.instructions.len() != before
    }
}
