//! Immediate encodability and materialization

use crate::asm::{AsmInst, Reg};

fn chunks(value: u64) -> [u16; 4] {
    [0, 16, 32, 48].map(|shift| (value >> shift) as u16)
}

/// `mov` accepts a value expressible by one `movz` or one `movn`
pub fn fits_mov(value: i64) -> bool {
    let bits = value as u64;
    let nonzero = chunks(bits).iter().filter(|&&c| c != 0).count();
    let non_ones = chunks(bits).iter().filter(|&&c| c != 0xffff).count();
    nonzero <= 1 || non_ones <= 1
}

/// Encoding for `add`/`sub`/`cmp`: unsigned 12 bits, optionally shifted by 12
pub fn arith_imm(value: i64) -> Option<(u16, bool)> {
    if (0..4096).contains(&value) {
        Some((value as u16, false))
    } else if value > 0 && value & 0xfff == 0 && (value >> 12) < 4096 {
        Some(((value >> 12) as u16, true))
    } else {
        None
    }
}

/// Offset range of the unscaled `ldur`/`stur` forms
pub fn fits_unscaled(offset: i64) -> bool {
    (-256..=255).contains(&offset)
}

/// Load an arbitrary 64-bit pattern into `rd`
pub fn materialize(rd: Reg, value: u64) -> Vec<AsmInst> {
    if fits_mov(value as i64) {
        return vec![AsmInst::MovImm(rd, value as i64)];
    }

    let parts = chunks(value);
    let zeros = parts.iter().filter(|&&c| c == 0).count();
    let ones = parts.iter().filter(|&&c| c == 0xffff).count();
    let mut out = Vec::new();

    if ones > zeros {
        // movn fills the untouched chunks with ones
        for (i, &chunk) in parts.iter().enumerate() {
            if chunk == 0xffff {
                continue;
            }
            let shift = (i * 16) as u8;
            if out.is_empty() {
                out.push(AsmInst::Movn(rd, !chunk, shift));
            } else {
                out.push(AsmInst::Movk(rd, chunk, shift));
            }
        }
    } else {
        for (i, &chunk) in parts.iter().enumerate() {
            if chunk == 0 {
                continue;
            }
            let shift = (i * 16) as u8;
            if out.is_empty() {
                out.push(AsmInst::Movz(rd, chunk, shift));
            } else {
                out.push(AsmInst::Movk(rd, chunk, shift));
            }
        }
    }
    out
}
