//! IR Functions

use super::instruction::{Instruction, Opcode};
use super::operand::{Location, Operand};
use lark_common::DataType;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct IrFunction {
    pub name: String,
    /// Ordered parameters; position selects the argument register
    pub parameters: Vec<Operand>,
    pub return_type: DataType,
    /// Declared locals in declaration order (scalars and arrays)
    pub locals: Vec<Operand>,
    pub instructions: Vec<Instruction>,
    /// Filled in by the driver from the code generator's frame layout
    pub stack_frame_size: u32,
}

impl IrFunction {
    pub fn new(name: &str, parameters: Vec<Operand>, return_type: DataType) -> Self {
        Self {
            name: name.to_string(),
            parameters,
            return_type,
            locals: Vec::new(),
            instructions: Vec::new(),
            stack_frame_size: 0,
        }
    }

    /// Record a local, ignoring redeclarations of the same storage
    pub fn add_local(&mut self, local: Operand) {
        if !self.locals.iter().any(|l| l.location() == local.location()) {
            self.locals.push(local);
        }
    }

    pub fn push(&mut self, inst: Instruction) {
        self.instructions.push(inst);
    }

    pub fn instruction_count(&self) -> usize {
        self.instructions.len()
    }

    pub fn last_instruction(&self) -> Option<&Instruction> {
        self.instructions.last()
    }

    /// A leaf function makes no calls, runtime calls included
    pub fn is_leaf(&self) -> bool {
        !self
            .instructions
            .iter()
            .any(|i| matches!(i.opcode, Opcode::Call | Opcode::Print | Opcode::Println))
    }

    /// Position of a parameter in the signature
    pub fn parameter_position(&self, loc: &Location) -> Option<usize> {
        self.parameters.iter().position(|p| p.location().as_ref() == Some(loc))
    }
}

impl fmt::Display for IrFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: Vec<String> = self
            .parameters
            .iter()
            .map(|p| format!("{}: {}", p, p.data_type))
            .collect();
        writeln!(f, "function {}({}) -> {}", self.name, params.join(", "), self.return_type)?;

        let locals: Vec<String> = self
            .locals
            .iter()
            .map(|l| format!("{}: {}", l, l.data_type))
            .collect();
        if locals.is_empty() {
            writeln!(f, "  locals:")?;
        } else {
            writeln!(f, "  locals: {}", locals.join(", "))?;
        }

        for inst in &self.instructions {
            writeln!(f, "{}", inst)?;
        }
        Ok(())
    }
}
