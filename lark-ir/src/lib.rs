//! Lark intermediate representation
//!
//! Three stages live here: the IR data model with its text rendering, the
//! generator that lowers a validated syntax tree into it, and the fixpoint
//! optimizer that rewrites it in place before code generation.

pub mod ir;
pub mod gen;
pub mod opt;

pub use ir::{
    GlobalVar, ImmValue, Instruction, IrFunction, IrProgram, Location, Opcode, Operand,
    OperandKind, StringTable,
};
pub use gen::{GenContext, GeneratorOptions, IrGenerator};
pub use opt::{OptContext, Optimizer, OptimizerStats, Pass, MAX_ITERATIONS};
