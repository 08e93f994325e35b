//! IR Instructions
//!
//! Defines the closed opcode set and the three-address instruction record.
//! Which of `dest`, `src1`, `src2`, and `label` are meaningful depends on
//! the opcode; the constructors below are the canonical shapes.

use super::operand::{ImmValue, Location, Operand};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    // Loads and stores
    LoadImm,
    Load,
    Store,
    LoadAddr,
    Move,

    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Neg,

    // Logical
    And,
    Or,
    Not,

    // Comparisons (Bool result)
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,

    // Control flow
    Label,
    Jump,
    JumpIfTrue,
    JumpIfFalse,
    Call,
    Return,
    FuncEnter,
    FuncExit,

    // Stack and frame
    Arg,
    AllocArray,
    Push,
    Pop,

    // Conversions
    IntToFloat,
    FloatToInt,

    // Array element access
    ArrayLoad,
    ArrayStore,

    // Print primitives
    Print,
    Println,

    Nop,
}

impl Opcode {
    pub fn is_binary(&self) -> bool {
        matches!(
            self,
            Opcode::Add
                | Opcode::Sub
                | Opcode::Mul
                | Opcode::Div
                | Opcode::Mod
                | Opcode::And
                | Opcode::Or
                | Opcode::Eq
                | Opcode::Ne
                | Opcode::Lt
                | Opcode::Le
                | Opcode::Gt
                | Opcode::Ge
        )
    }

    pub fn is_comparison(&self) -> bool {
        matches!(self, Opcode::Eq | Opcode::Ne | Opcode::Lt | Opcode::Le | Opcode::Gt | Opcode::Ge)
    }

    pub fn is_branch(&self) -> bool {
        matches!(self, Opcode::Jump | Opcode::JumpIfTrue | Opcode::JumpIfFalse)
    }

    /// Value-producing opcodes whose result depends only on their sources
    pub fn is_pure(&self) -> bool {
        self.is_binary()
            || matches!(
                self,
                Opcode::Neg | Opcode::Not | Opcode::Move | Opcode::IntToFloat | Opcode::FloatToInt
            )
    }

    /// Opcodes dead code elimination must never remove
    pub fn has_side_effect(&self) -> bool {
        matches!(
            self,
            Opcode::Call
                | Opcode::Return
                | Opcode::Store
                | Opcode::ArrayStore
                | Opcode::Jump
                | Opcode::JumpIfTrue
                | Opcode::JumpIfFalse
                | Opcode::Label
                | Opcode::Print
                | Opcode::Println
        )
    }

    /// Whether an instruction with this opcode can be dropped once its
    /// destination is no longer read
    pub fn is_removable_when_unused(&self) -> bool {
        self.is_pure()
            || matches!(
                self,
                Opcode::LoadImm | Opcode::Load | Opcode::LoadAddr | Opcode::ArrayLoad | Opcode::AllocArray
            )
    }

    /// Whether `dest` names storage written (as opposed to an address)
    pub fn writes_dest(&self) -> bool {
        !matches!(self, Opcode::Store | Opcode::ArrayStore)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// One three-address IR instruction
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub opcode: Opcode,
    pub dest: Option<Operand>,
    pub src1: Option<Operand>,
    pub src2: Option<Operand>,
    pub label: Option<String>,
    pub comment: Option<String>,
    pub source_line: u32,
}

impl Instruction {
    pub fn new(opcode: Opcode) -> Self {
        Self {
            opcode,
            dest: None,
            src1: None,
            src2: None,
            label: None,
            comment: None,
            source_line: 0,
        }
    }

    pub fn with_dest(mut self, dest: Operand) -> Self {
        self.dest = Some(dest);
        self
    }

    pub fn with_src1(mut self, src: Operand) -> Self {
        self.src1 = Some(src);
        self
    }

    pub fn with_src2(mut self, src: Operand) -> Self {
        self.src2 = Some(src);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn at_line(mut self, line: u32) -> Self {
        self.source_line = line;
        self
    }

    // ===== Canonical shapes =====

    pub fn load_imm(dest: Operand, value: ImmValue) -> Self {
        let ty = dest.data_type;
        Self::new(Opcode::LoadImm).with_dest(dest).with_src1(Operand::imm(value, ty))
    }

    /// `dest = Load loc`
    pub fn load(dest: Operand, loc: Operand) -> Self {
        Self::new(Opcode::Load).with_dest(dest).with_src1(loc)
    }

    /// `Store loc, value`
    pub fn store(loc: Operand, value: Operand) -> Self {
        Self::new(Opcode::Store).with_dest(loc).with_src1(value)
    }

    pub fn load_addr(dest: Operand, target: Operand) -> Self {
        Self::new(Opcode::LoadAddr).with_dest(dest).with_src1(target)
    }

    pub fn mov(dest: Operand, src: Operand) -> Self {
        Self::new(Opcode::Move).with_dest(dest).with_src1(src)
    }

    pub fn binary(opcode: Opcode, dest: Operand, lhs: Operand, rhs: Operand) -> Self {
        Self::new(opcode).with_dest(dest).with_src1(lhs).with_src2(rhs)
    }

    pub fn unary(opcode: Opcode, dest: Operand, src: Operand) -> Self {
        Self::new(opcode).with_dest(dest).with_src1(src)
    }

    pub fn label(name: impl Into<String>) -> Self {
        Self::new(Opcode::Label).with_label(name)
    }

    pub fn jump(target: impl Into<String>) -> Self {
        Self::new(Opcode::Jump).with_label(target)
    }

    pub fn jump_if(when: bool, condition: Operand, target: impl Into<String>) -> Self {
        let opcode = if when { Opcode::JumpIfTrue } else { Opcode::JumpIfFalse };
        Self::new(opcode).with_src1(condition).with_label(target)
    }

    pub fn arg(value: Operand, position: usize) -> Self {
        Self::new(Opcode::Arg).with_src1(value).with_src2(Operand::int(position as i64))
    }

    pub fn call(callee: impl Into<String>, dest: Option<Operand>) -> Self {
        let inst = Self::new(Opcode::Call).with_label(callee);
        match dest {
            Some(dest) => inst.with_dest(dest),
            None => inst,
        }
    }

    pub fn ret(value: Option<Operand>) -> Self {
        let inst = Self::new(Opcode::Return);
        match value {
            Some(value) => inst.with_src1(value),
            None => inst,
        }
    }

    pub fn print(newline: bool, value: Operand) -> Self {
        let opcode = if newline { Opcode::Println } else { Opcode::Print };
        Self::new(opcode).with_src1(value)
    }

    /// `array = AllocArray #count`
    pub fn alloc_array(array: Operand, count: usize) -> Self {
        Self::new(Opcode::AllocArray).with_dest(array).with_src1(Operand::int(count as i64))
    }

    pub fn array_load(dest: Operand, element: Operand) -> Self {
        Self::new(Opcode::ArrayLoad).with_dest(dest).with_src1(element)
    }

    pub fn array_store(element: Operand, value: Operand) -> Self {
        Self::new(Opcode::ArrayStore).with_dest(element).with_src1(value)
    }

    // ===== Queries =====

    /// Location written by this instruction, if any
    pub fn defined(&self) -> Option<Location> {
        self.dest.as_ref().and_then(|d| d.location())
    }

    /// Every location this instruction reads
    pub fn uses(&self) -> Vec<Location> {
        let mut out = Vec::new();
        for src in [&self.src1, &self.src2].into_iter().flatten() {
            src.reads(&mut out);
        }
        if let Some(dest) = &self.dest {
            // An element store reads the index and keeps the array alive
            if self.opcode == Opcode::ArrayStore {
                dest.reads(&mut out);
            }
        }
        out
    }

    /// Branch target for jumps
    pub fn branch_target(&self) -> Option<&str> {
        if self.opcode.is_branch() {
            self.label.as_deref()
        } else {
            None
        }
    }

    pub fn sources_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
        [&mut self.src1, &mut self.src2].into_iter().flatten()
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.opcode == Opcode::Label {
            write!(f, "{}:", self.label.as_deref().unwrap_or("?"))?;
        } else {
            write!(f, "    ")?;
            let mut operands: Vec<String> = Vec::new();
            match (&self.dest, self.opcode.writes_dest()) {
                (Some(dest), true) => write!(f, "{} = {}", dest, self.opcode)?,
                (Some(dest), false) => {
                    write!(f, "{}", self.opcode)?;
                    operands.push(dest.to_string());
                }
                (None, _) => write!(f, "{}", self.opcode)?,
            }
            operands.extend([&self.src1, &self.src2].into_iter().flatten().map(|o| o.to_string()));
            operands.extend(self.label.iter().cloned());
            if !operands.is_empty() {
                write!(f, " {}", operands.join(", "))?;
            }
        }
        if let Some(comment) = &self.comment {
            write!(f, "  ; {}", comment)?;
        }
        Ok(())
    }
}
