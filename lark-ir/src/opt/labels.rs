//! Unused label removal

use super::{OptContext, Pass};
use crate::ir::{IrFunction, Opcode};
use std::collections::HashSet;

pub struct UnusedLabelRemoval;

impl Pass for UnusedLabelRemoval {
    fn name(&self) -> &'static str {
        "unused-label-removal"
    }

    fn run(&mut self, function: &mut IrFunction, _ctx: &mut OptContext) -> bool {
        let targets: HashSet<String> = function
            .instructions
            .iter()
            .filter_map(|i| i.branch_target().map(str::to_string))
            .collect();
        let before = function.instructions.len();

        function.instructions.retain(|inst| {
            inst.opcode != Opcode::Label || inst.label.as_ref().is_some_and(|l| targets.contains(l))
        });

        function.instructions.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Instruction;
    use lark_common::DataType;

    #[test]
    fn test_only_unreferenced_labels_are_removed() {
        let mut f = IrFunction::new("main", vec![], DataType::Int);
        f.push(Instruction::label("L0"));
        f.push(Instruction::label("L1"));
        f.push(Instruction::jump("L1"));

        assert!(UnusedLabelRemoval.run(&mut f, &mut OptContext::new()));
        assert_eq!(f.instructions.len(), 2);
        assert_eq!(f.instructions[0].label.as_deref(), Some("L1"));
    }
}
