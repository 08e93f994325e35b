//! AArch64 ABI Implementation
//!
//! Calling convention, stack frame layout, and function prologue/epilogue
//! generation. The code generator only talks to the `CallingConvention`
//! trait, so another ABI can be dropped in without touching it.

use crate::asm::{AsmInst, Reg};
use crate::imm::{arith_imm, fits_unscaled, materialize};
use crate::regalloc::{FrameLayout, Storage};

/// Procedure-call standard seen by the code generator
pub trait CallingConvention {
    fn name(&self) -> &'static str;

    /// Registers carrying the first arguments, by position
    fn argument_registers(&self) -> &[Reg];

    fn return_register(&self) -> Reg;

    /// Callee-saved registers the allocator may hand out
    fn allocatable_registers(&self) -> &[Reg];

    /// x29-relative offset of an incoming stack argument
    fn incoming_stack_offset(&self, position: usize) -> Option<i32>;

    /// sp-relative offset of an outgoing stack argument
    fn outgoing_stack_offset(&self, position: usize) -> Option<u32>;

    /// Bytes reserved below sp for a call with `arg_count` arguments
    fn outgoing_area_size(&self, arg_count: usize) -> u32;

    fn prologue(&self, layout: &FrameLayout) -> Vec<AsmInst>;

    fn epilogue(&self, layout: &FrameLayout) -> Vec<AsmInst>;
}

/// AAPCS64 (Procedure Call Standard for the Arm 64-bit Architecture)
///
/// Register Usage:
/// - x0-x7: arguments and results
/// - x9-x15: caller-saved scratch, used for instruction operands
/// - x16-x17: intra-procedure-call scratch, used for address formation
/// - x19-x28: callee-saved, the allocation pool
/// - x29, x30: frame pointer and link register
/// - d16-d18: float scratch
#[derive(Debug, Clone, Copy, Default)]
pub struct Aapcs64;

impl Aapcs64 {
    /// Registers used for passing parameters
    pub const PARAM_REGS: [Reg; 8] = [
        Reg::X(0),
        Reg::X(1),
        Reg::X(2),
        Reg::X(3),
        Reg::X(4),
        Reg::X(5),
        Reg::X(6),
        Reg::X(7),
    ];

    /// Registers that must be saved by callee
    pub const CALLEE_SAVED: [Reg; 10] = [
        Reg::X(19),
        Reg::X(20),
        Reg::X(21),
        Reg::X(22),
        Reg::X(23),
        Reg::X(24),
        Reg::X(25),
        Reg::X(26),
        Reg::X(27),
        Reg::X(28),
    ];

    /// Saved x29/x30 pair sits between x29 and the caller's outgoing area
    const FRAME_RECORD: i32 = 16;
}

impl CallingConvention for Aapcs64 {
    fn name(&self) -> &'static str {
        "aapcs64"
    }

    fn argument_registers(&self) -> &[Reg] {
        &Self::PARAM_REGS
    }

    fn return_register(&self) -> Reg {
        Reg::X(0)
    }

    fn allocatable_registers(&self) -> &[Reg] {
        &Self::CALLEE_SAVED
    }

    fn incoming_stack_offset(&self, position: usize) -> Option<i32> {
        let slot = position.checked_sub(Self::PARAM_REGS.len())?;
        Some(Self::FRAME_RECORD + 8 * slot as i32)
    }

    fn outgoing_stack_offset(&self, position: usize) -> Option<u32> {
        let slot = position.checked_sub(Self::PARAM_REGS.len())?;
        Some(8 * slot as u32)
    }

    fn outgoing_area_size(&self, arg_count: usize) -> u32 {
        let slots = arg_count.saturating_sub(Self::PARAM_REGS.len()) as u32;
        (8 * slots + 15) & !15
    }

    fn prologue(&self, layout: &FrameLayout) -> Vec<AsmInst> {
        let mut code = vec![
            AsmInst::StpPre(Reg::FP, Reg::LR, Reg::Sp, -Self::FRAME_RECORD),
            AsmInst::Mov(Reg::FP, Reg::Sp),
        ];

        adjust_sp(&mut code, layout.frame_size(), false);

        for (i, reg) in layout.used_callee_saved.iter().enumerate() {
            code.push(AsmInst::Str(*reg, Reg::Sp, layout.save_offset(i)));
        }

        for (arg, home) in &layout.param_moves {
            match home {
                Storage::Reg(r) => code.push(AsmInst::Mov(*r, *arg)),
                Storage::Frame(off) => code.extend(store_frame_slot(*arg, *off)),
                Storage::Array { .. } => {}
            }
        }
        code
    }

    fn epilogue(&self, layout: &FrameLayout) -> Vec<AsmInst> {
        let mut code = Vec::new();
        for (i, reg) in layout.used_callee_saved.iter().enumerate() {
            code.push(AsmInst::Ldr(*reg, Reg::Sp, layout.save_offset(i)));
        }
        code.push(AsmInst::Mov(Reg::Sp, Reg::FP));
        code.push(AsmInst::LdpPost(Reg::FP, Reg::LR, Reg::Sp, Self::FRAME_RECORD));
        code.push(AsmInst::Ret);
        code
    }
}

/// `sub sp, sp, #bytes` (or `add` when releasing), materializing large sizes
pub fn adjust_sp(code: &mut Vec<AsmInst>, bytes: u32, release: bool) {
    if bytes == 0 {
        return;
    }
    match arith_imm(bytes as i64) {
        Some((imm, lsl)) if release => code.push(AsmInst::AddImm(Reg::Sp, Reg::Sp, imm, lsl)),
        Some((imm, lsl)) => code.push(AsmInst::SubImm(Reg::Sp, Reg::Sp, imm, lsl)),
        None => {
            code.extend(materialize(Reg::IP0, bytes as u64));
            if release {
                code.push(AsmInst::Add(Reg::Sp, Reg::Sp, Reg::IP0));
            } else {
                code.push(AsmInst::Sub(Reg::Sp, Reg::Sp, Reg::IP0));
            }
        }
    }
}

/// Load the 8-byte slot at `[x29, #offset]`
pub fn load_frame_slot(rd: Reg, offset: i32) -> Vec<AsmInst> {
    if fits_unscaled(offset as i64) {
        return vec![AsmInst::Ldur(rd, Reg::FP, offset)];
    }
    let mut code = materialize(Reg::IP0, offset as i64 as u64);
    code.push(AsmInst::LdrReg(rd, Reg::FP, Reg::IP0, false));
    code
}

/// Store to the 8-byte slot at `[x29, #offset]`
pub fn store_frame_slot(rs: Reg, offset: i32) -> Vec<AsmInst> {
    if fits_unscaled(offset as i64) {
        return vec![AsmInst::Stur(rs, Reg::FP, offset)];
    }
    let mut code = materialize(Reg::IP0, offset as i64 as u64);
    code.push(AsmInst::StrReg(rs, Reg::FP, Reg::IP0, false));
    code
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn render(code: &[AsmInst]) -> Vec<String> {
        code.iter().map(|i| i.to_string()).collect()
    }

    fn layout(saved: &[Reg], spill_area: u32) -> FrameLayout {
        FrameLayout {
            used_callee_saved: saved.to_vec(),
            spill_area,
            ..FrameLayout::default()
        }
    }

    #[test]
    fn test_param_registers() {
        let cc = Aapcs64;
        assert_eq!(cc.argument_registers().len(), 8);
        assert_eq!(cc.argument_registers()[0], Reg::X(0));
        assert_eq!(cc.return_register(), Reg::X(0));
        assert_eq!(cc.incoming_stack_offset(7), None);
        assert_eq!(cc.incoming_stack_offset(8), Some(16));
        assert_eq!(cc.incoming_stack_offset(10), Some(32));
        assert_eq!(cc.outgoing_stack_offset(9), Some(8));
        assert_eq!(cc.outgoing_area_size(8), 0);
        assert_eq!(cc.outgoing_area_size(9), 16);
        assert_eq!(cc.outgoing_area_size(11), 32);
    }

    #[test]
    fn test_prologue_and_epilogue() {
        let frame = layout(&[Reg::X(19), Reg::X(20)], 8);
        let cc = Aapcs64;

        assert_eq!(
            render(&cc.prologue(&frame)),
            vec![
                "stp x29, x30, [sp, #-16]!",
                "mov x29, sp",
                "sub sp, sp, #32",
                "str x19, [sp]",
                "str x20, [sp, #8]",
            ]
        );
        assert_eq!(
            render(&cc.epilogue(&frame)),
            vec![
                "ldr x19, [sp]",
                "ldr x20, [sp, #8]",
                "mov sp, x29",
                "ldp x29, x30, [sp], #16",
                "ret",
            ]
        );
    }

    #[test]
    fn test_empty_frame_skips_reservation() {
        let code = Aapcs64.prologue(&layout(&[], 0));
        assert_eq!(code.len(), 2);
        assert!(matches!(code[0], AsmInst::StpPre(Reg::X(29), Reg::X(30), Reg::Sp, -16)));
    }

    #[test]
    fn test_parameter_homes_follow_saves() {
        let mut frame = layout(&[Reg::X(19)], 8);
        frame.param_moves = vec![(Reg::X(0), Storage::Reg(Reg::X(19))), (Reg::X(1), Storage::Frame(-8))];

        let code = render(&Aapcs64.prologue(&frame));
        assert_eq!(&code[3..], &["str x19, [sp]", "mov x19, x0", "stur x1, [x29, #-8]"]);
    }

    #[test]
    fn test_large_frame_is_materialized() {
        let code = Aapcs64.prologue(&layout(&[], 0x12345 * 8));
        assert!(matches!(code[2], AsmInst::Movz(Reg::X(16), _, _) | AsmInst::MovImm(Reg::X(16), _)));
        assert!(code.contains(&AsmInst::Sub(Reg::Sp, Reg::Sp, Reg::X(16))));
    }

    #[test]
    fn test_far_frame_slots_use_register_offsets() {
        assert_eq!(render(&load_frame_slot(Reg::X(9), -8)), vec!["ldur x9, [x29, #-8]"]);
        assert_eq!(
            render(&store_frame_slot(Reg::X(9), -4096)),
            vec!["mov x16, #-4096", "str x9, [x29, x16]"]
        );
    }
}
