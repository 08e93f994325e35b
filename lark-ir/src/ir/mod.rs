//! Intermediate Representation (IR) for the Lark compiler
//!
//! A linear, typed three-address code. Each function is a flat list of
//! instructions with explicit labels and branches; there are no basic block
//! objects and no SSA form. Temporaries are unique per compilation but may be
//! assigned along several paths.

pub mod operand;
pub mod instruction;
pub mod function;
pub mod program;

pub use operand::{ImmValue, Location, Operand, OperandKind};
pub use instruction::{Instruction, Opcode};
pub use function::IrFunction;
pub use program::{GlobalVar, IrProgram, StringTable};

#[cfg(test)]
mod tests;
