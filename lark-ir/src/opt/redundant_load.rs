//! Redundant load removal
//!
//! `Store loc, v` immediately followed by `t = Load loc` makes the load
//! pointless: `t` is dropped and later reads of it use `v` instead. Only
//! temporaries and literals are forwarded, since a variable could be
//! reassigned before `t` is read.

use super::{OptContext, Pass};
use crate::ir::{IrFunction, Opcode, OperandKind};

pub struct RedundantLoadRemoval;

impl Pass for RedundantLoadRemoval {
    fn name(&self) -> &'static str {
        "redundant-load-removal"
    }

    fn run(&mut self, function: &mut IrFunction, _ctx: &mut OptContext) -> bool {
        let instructions = &mut function.instructions;
        let mut changed = false;
        let mut i = 0;

        while i + 1 < instructions.len() {
            let (store, load) = (&instructions[i], &instructions[i + 1]);
            let same_location = store.opcode == Opcode::Store
                && load.opcode == Opcode::Load
                && store.defined().is_some()
                && store.defined() == load.src1.as_ref().and_then(|s| s.location());
            let forwardable = matches!(
                store.src1.as_ref().map(|v| &v.kind),
                Some(OperandKind::Temp(_)) | Some(OperandKind::Immediate(_))
            );

            if same_location && forwardable {
                if let (Some(value), Some(replaced)) = (store.src1.clone(), load.defined()) {
                    instructions.remove(i + 1);
                    for inst in instructions.iter_mut().skip(i + 1) {
                        for src in inst.sources_mut() {
                            src.rename(&replaced, &value);
                        }
                        if inst.opcode == Opcode::ArrayStore {
                            if let Some(element) = inst.dest.as_mut() {
                                element.rename(&replaced, &value);
                            }
                        }
                    }
                    changed = true;
                }
            }
            i += 1;
        }
        changed
    }
}
