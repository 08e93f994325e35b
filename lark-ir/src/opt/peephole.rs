//! IR peephole rewrites over adjacent instructions

use super::{OptContext, Pass};
use crate::ir::{Instruction, IrFunction, Opcode};

pub struct Peephole;

fn is_self_move(inst: &Instruction) -> bool {
    inst.opcode == Opcode::Move
        && inst.defined().is_some()
        && inst.defined() == inst.src1.as_ref().and_then(|s| s.location())
}

/// `Jump L` directly followed by `L:`
fn removes_jump_to_next(instructions: &mut Vec<Instruction>) -> bool {
    let mut changed = false;
    let mut i = 0;
    while i + 1 < instructions.len() {
        let (jump, next) = (&instructions[i], &instructions[i + 1]);
        if jump.opcode == Opcode::Jump && next.opcode == Opcode::Label && jump.label == next.label {
            instructions.remove(i);
            changed = true;
        } else {
            i += 1;
        }
    }
    changed
}

/// `JumpIfFalse c, L1; Jump L2; L1:` becomes `JumpIfTrue c, L2; L1:`
/// (and the mirrored form)
fn inverts_branch_over_jump(instructions: &mut Vec<Instruction>) -> bool {
    let mut changed = false;
    let mut i = 0;
    while i + 2 < instructions.len() {
        let inverted = match instructions[i].opcode {
            Opcode::JumpIfFalse => Some(Opcode::JumpIfTrue),
            Opcode::JumpIfTrue => Some(Opcode::JumpIfFalse),
            _ => None,
        };
        let matches = inverted.is_some()
            && instructions[i + 1].opcode == Opcode::Jump
            && instructions[i + 2].opcode == Opcode::Label
            && instructions[i].label == instructions[i + 2].label;

        if let (true, Some(opcode)) = (matches, inverted) {
            let jump = instructions.remove(i + 1);
            instructions[i].opcode = opcode;
            instructions[i].label = jump.label;
            changed = true;
        }
        i += 1;
    }
    changed
}

impl Pass for Peephole {
    fn name(&self) -> &'static str {
        "peephole"
    }

    fn run(&mut self, function: &mut IrFunction, _ctx: &mut OptContext) -> bool {
        let before = function.instructions.len();
        function
            .instructions
            .retain(|inst| inst.opcode != Opcode::Nop && !is_self_move(inst));
        let mut changed = function.instructions.len() != before;

        changed |= removes_jump_to_next(&mut function.instructions);
        changed |= inverts_branch_over_jump(&mut function.instructions);
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Operand;
    use lark_common::DataType;
    use pretty_assertions::assert_eq;

    fn render(f: &IrFunction) -> Vec<String> {
        f.instructions.iter().map(|i| i.to_string()).collect()
    }

    #[test]
    fn test_self_moves_and_nops_are_removed() {
        let x = Operand::var("x", DataType::Int);
        let mut f = IrFunction::new("main", vec![], DataType::Int);
        f.push(Instruction::mov(x.clone(), x.clone()));
        f.push(Instruction::new(Opcode::Nop));
        f.push(Instruction::mov(Operand::temp("x", DataType::Int), x));

        assert!(Peephole.run(&mut f, &mut OptContext::new()));
        assert_eq!(render(&f), vec!["    x = Move x"]);
    }

    #[test]
    fn test_jump_to_next_label_is_removed() {
        let mut f = IrFunction::new("main", vec![], DataType::Int);
        f.push(Instruction::jump("L0"));
        f.push(Instruction::label("L0"));

        assert!(Peephole.run(&mut f, &mut OptContext::new()));
        assert_eq!(render(&f), vec!["L0:"]);
    }

    #[test]
    fn test_branch_over_jump_is_inverted() {
        let c = Operand::temp("t0", DataType::Bool);
        let mut f = IrFunction::new("main", vec![], DataType::Int);
        f.push(Instruction::jump_if(false, c, "L1"));
        f.push(Instruction::jump("L2"));
        f.push(Instruction::label("L1"));
        f.push(Instruction::print(false, Operand::int(1)));
        f.push(Instruction::label("L2"));

        assert!(Peephole.run(&mut f, &mut OptContext::new()));
        assert_eq!(
            render(&f),
            vec!["    JumpIfTrue t0, L2", "L1:", "    Print #1", "L2:"]
        );
    }
}
