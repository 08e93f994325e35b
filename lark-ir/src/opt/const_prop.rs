//! Local constant propagation
//!
//! Walks a function top to bottom tracking which locations hold a statically
//! known literal. Labels are join points, so the map is cleared at each one;
//! a call may write any global, so global entries are dropped at calls.
//! Known values are substituted only into pure value-producing instructions.

use super::{OptContext, Pass};
use crate::ir::{ImmValue, Instruction, IrFunction, Location, Opcode, Operand};
use std::collections::HashMap;

pub struct ConstantPropagation;

fn substitute(operand: &mut Operand, known: &HashMap<Location, ImmValue>) -> bool {
    let value = operand.location().and_then(|loc| known.get(&loc).copied());
    match value {
        Some(value) => {
            *operand = Operand::imm(value, operand.data_type);
            true
        }
        None => false,
    }
}

fn known_value(operand: Option<&Operand>, known: &HashMap<Location, ImmValue>) -> Option<ImmValue> {
    let operand = operand?;
    operand
        .immediate()
        .or_else(|| operand.location().and_then(|loc| known.get(&loc).copied()))
}

impl Pass for ConstantPropagation {
    fn name(&self) -> &'static str {
        "constant-propagation"
    }

    fn run(&mut self, function: &mut IrFunction, _ctx: &mut OptContext) -> bool {
        let mut known: HashMap<Location, ImmValue> = HashMap::new();
        let mut changed = false;

        for inst in &mut function.instructions {
            match inst.opcode {
                Opcode::Label => {
                    known.clear();
                    continue;
                }
                Opcode::Call => known.retain(|loc, _| !matches!(loc, Location::Global(_))),
                _ => {}
            }

            if inst.opcode.is_pure() {
                for src in inst.sources_mut() {
                    changed |= substitute(src, &known);
                }
            }

            if inst.opcode == Opcode::Load {
                if let (Some(value), Some(dest)) = (known_value(inst.src1.as_ref(), &known), inst.dest.clone()) {
                    let mut folded = Instruction::load_imm(dest, value).at_line(inst.source_line);
                    folded.comment = inst.comment.take();
                    *inst = folded;
                    changed = true;
                }
            }

            match inst.opcode {
                Opcode::Store => {
                    if let Some(loc) = inst.defined() {
                        match known_value(inst.src1.as_ref(), &known) {
                            Some(value) => known.insert(loc, value),
                            None => known.remove(&loc),
                        };
                    }
                }
                Opcode::LoadImm | Opcode::Move => {
                    if let Some(loc) = inst.defined() {
                        match inst.src1.as_ref().and_then(Operand::immediate) {
                            Some(value) => known.insert(loc, value),
                            None => known.remove(&loc),
                        };
                    }
                }
                _ => {
                    if let Some(loc) = inst.defined() {
                        known.remove(&loc);
                    }
                }
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lark_common::DataType;

    fn run(function: &mut IrFunction) -> bool {
        ConstantPropagation.run(function, &mut OptContext::new())
    }

    fn x() -> Operand {
        Operand::var("x", DataType::Int)
    }

    #[test]
    fn test_known_variable_substituted_into_arithmetic() {
        let t0 = Operand::temp("t0", DataType::Int);
        let mut f = IrFunction::new("main", vec![], DataType::Int);
        f.push(Instruction::store(x(), Operand::int(4)));
        f.push(Instruction::binary(Opcode::Mul, t0.clone(), x(), Operand::int(2)));
        f.push(Instruction::print(false, x()));

        assert!(run(&mut f));
        assert_eq!(f.instructions[1].to_string(), "    t0 = Mul #4, #2");
        // side-effecting instructions keep their operands
        assert_eq!(f.instructions[2].to_string(), "    Print x");
    }

    #[test]
    fn test_labels_clear_known_values() {
        let mut f = IrFunction::new("main", vec![], DataType::Int);
        f.push(Instruction::store(x(), Operand::int(1)));
        f.push(Instruction::label("L0"));
        f.push(Instruction::binary(Opcode::Add, Operand::temp("t0", DataType::Int), x(), Operand::int(1)));

        assert!(!run(&mut f));
        assert_eq!(f.instructions[2].to_string(), "    t0 = Add x, #1");
    }

    #[test]
    fn test_calls_forget_globals() {
        let g = Operand::global("g", DataType::Int);
        let mut f = IrFunction::new("main", vec![], DataType::Int);
        f.push(Instruction::store(g.clone(), Operand::int(9)));
        f.push(Instruction::load(Operand::temp("t0", DataType::Int), g.clone()));
        f.push(Instruction::call("touch", None));
        f.push(Instruction::load(Operand::temp("t1", DataType::Int), g));

        assert!(run(&mut f));
        assert_eq!(f.instructions[1].to_string(), "    t0 = LoadImm #9");
        assert_eq!(f.instructions[3].to_string(), "    t1 = Load @g");
    }

    #[test]
    fn test_unknown_store_invalidates() {
        let mut f = IrFunction::new("main", vec![], DataType::Int);
        f.push(Instruction::store(x(), Operand::int(1)));
        f.push(Instruction::store(x(), Operand::param("p", DataType::Int)));
        f.push(Instruction::binary(Opcode::Add, Operand::temp("t0", DataType::Int), x(), Operand::int(1)));

        assert!(!run(&mut f));
    }
}
