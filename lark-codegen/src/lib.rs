//! Lark Compiler - ARM64 Code Generation
//!
//! Turns an optimized `IrProgram` into GNU-as AArch64 assembly: register
//! allocation and frame layout, AAPCS64 prologues and epilogues, per-opcode
//! instruction selection, and a post-codegen peephole pass.

pub mod asm;
pub mod imm;
pub mod abi;
pub mod regalloc;
pub mod isel;
pub mod emit;
pub mod peephole;

pub use asm::{AsmInst, Cond, FReg, Reg};
pub use abi::{Aapcs64, CallingConvention};
pub use regalloc::{FrameLayout, RegisterAllocator, Storage};
pub use isel::{print_symbol, CodeGenerator, Translation};
pub use emit::{asm_label, emit_instructions, global_symbol, AsmFunction, AsmProgram, CodegenError, DataObject};
pub use peephole::{PeepholeRule, PeepholeStats, PostOptimizer};

use lark_ir::IrProgram;

/// Generate assembly for `program` with the AAPCS64 convention
pub fn generate_assembly(program: &IrProgram) -> Result<AsmProgram, CodegenError> {
    CodeGenerator::new(Box::new(Aapcs64)).generate(program)
}
