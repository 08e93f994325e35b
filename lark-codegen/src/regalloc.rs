//! Register Allocation
//!
//! A single forward pass over one function, no liveness and no graph
//! coloring. Registers come from the callee-saved pool and are never
//! released within a function; names that find the pool empty are spilled
//! to 8-byte frame slots below x29 and reloaded at every use.

use crate::abi::CallingConvention;
use crate::asm::Reg;
use crate::emit::CodegenError;
use lark_ir::{Instruction, IrFunction, Location, Opcode, Operand, OperandKind};
use log::{debug, trace};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Where a value lives for the whole function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Storage {
    Reg(Reg),
    /// 8-byte slot at `[x29, #offset]`
    Frame(i32),
    /// Contiguous frame region; element `i` is at `[x29, #base + 8*i]`
    Array { base: i32, length: usize },
}

impl fmt::Display for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Storage::Reg(r) => write!(f, "{}", r),
            Storage::Frame(off) => write!(f, "[x29, #{}]", off),
            Storage::Array { base, length } => write!(f, "[x29, #{}] x {}", base, length),
        }
    }
}

/// Allocation result for one function
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameLayout {
    pub locations: BTreeMap<Location, Storage>,
    /// Pool registers handed out, in pool order; the prologue saves these
    pub used_callee_saved: Vec<Reg>,
    /// Bytes below x29 taken by spill slots and arrays
    pub spill_area: u32,
    pub is_leaf: bool,
    /// Argument register to home moves performed by the prologue
    pub param_moves: Vec<(Reg, Storage)>,
}

impl FrameLayout {
    pub fn storage(&self, loc: &Location) -> Option<Storage> {
        self.locations.get(loc).copied()
    }

    /// Bytes reserved below x29: spill area plus callee-saved slots, 16-aligned
    pub fn frame_size(&self) -> u32 {
        let raw = u64::from(self.spill_area) + 8 * self.used_callee_saved.len() as u64;
        u32::try_from((raw + 15) & !15).unwrap_or(u32::MAX & !15)
    }

    /// sp-relative offset of the save slot of a callee-saved register
    pub fn save_offset(&self, index: usize) -> u32 {
        8 * index as u32
    }
}

/// Count temporary occurrences, returning names in first-appearance order
fn temp_occurrences(instructions: &[Instruction]) -> Vec<(String, usize)> {
    let mut order: Vec<(String, usize)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    let mut visit = |op: &Operand| {
        let mut names = Vec::new();
        collect_temps(op, &mut names);
        for name in names {
            match index.get(&name) {
                Some(&i) => order[i].1 += 1,
                None => {
                    index.insert(name.clone(), order.len());
                    order.push((name, 1));
                }
            }
        }
    };

    for inst in instructions {
        for op in [&inst.dest, &inst.src1, &inst.src2].into_iter().flatten() {
            visit(op);
        }
    }
    order
}

fn collect_temps(op: &Operand, out: &mut Vec<String>) {
    match &op.kind {
        OperandKind::Temp(name) => out.push(name.clone()),
        OperandKind::ArrayAccess { index, .. } => collect_temps(index, out),
        _ => {}
    }
}

/// Single-pass allocator over the callee-saved pool
pub struct RegisterAllocator {
    free: Vec<Reg>,
    layout: FrameLayout,
    next_offset: u32,
    function: String,
}

impl RegisterAllocator {
    pub fn new(cc: &dyn CallingConvention) -> Self {
        Self {
            // reversed so pop() hands out x19 first
            free: cc.allocatable_registers().iter().rev().copied().collect(),
            layout: FrameLayout::default(),
            next_offset: 0,
            function: String::new(),
        }
    }

    /// Compute the frame layout for `function`
    ///
    /// Fails when spill slots and arrays need more frame than x29-relative
    /// addressing can reach.
    pub fn allocate(mut self, function: &IrFunction, cc: &dyn CallingConvention) -> Result<FrameLayout, CodegenError> {
        self.function = function.name.clone();
        self.layout.is_leaf = function.is_leaf();
        let arg_regs = cc.argument_registers();

        for (position, param) in function.parameters.iter().enumerate() {
            let Some(loc) = param.location() else { continue };
            if let Some(offset) = cc.incoming_stack_offset(position) {
                self.layout.locations.insert(loc, Storage::Frame(offset));
            } else if let (true, Some(&reg)) = (self.layout.is_leaf, arg_regs.get(position)) {
                self.layout.locations.insert(loc, Storage::Reg(reg));
            }
        }

        for (name, count) in temp_occurrences(&function.instructions) {
            if count > 2 && !self.free.is_empty() {
                let loc = Location::Temp(name);
                trace!("{} is hot ({} occurrences)", loc, count);
                self.assign(loc)?;
            }
        }

        for inst in &function.instructions {
            if inst.opcode == Opcode::AllocArray {
                self.reserve_array(inst)?;
            }
            for op in [&inst.dest, &inst.src1, &inst.src2].into_iter().flatten() {
                self.visit(op)?;
            }
        }

        for (position, param) in function.parameters.iter().enumerate() {
            let Some(&reg) = arg_regs.get(position) else { continue };
            if self.layout.is_leaf {
                continue;
            }
            if let Some(home) = param.location().and_then(|l| self.layout.storage(&l)) {
                self.layout.param_moves.push((reg, home));
            }
        }

        let pool = cc.allocatable_registers();
        let mut used: Vec<Reg> = self
            .layout
            .locations
            .values()
            .filter_map(|s| match s {
                Storage::Reg(r) if pool.contains(r) => Some(*r),
                _ => None,
            })
            .collect();
        used.sort();
        used.dedup();
        self.layout.used_callee_saved = used;
        self.layout.spill_area = self.next_offset;

        debug!(
            "Frame for '{}': {} register(s), {} byte(s) spilled, leaf={}",
            function.name,
            self.layout.used_callee_saved.len(),
            self.layout.spill_area,
            self.layout.is_leaf
        );
        Ok(self.layout)
    }

    fn visit(&mut self, op: &Operand) -> Result<(), CodegenError> {
        match &op.kind {
            OperandKind::ArrayAccess { index, .. } => self.visit(index),
            OperandKind::Temp(_) | OperandKind::Var(_) | OperandKind::Param(_) => match op.location() {
                Some(loc) if !self.layout.locations.contains_key(&loc) => self.assign(loc),
                _ => Ok(()),
            },
            _ => Ok(()),
        }
    }

    fn assign(&mut self, loc: Location) -> Result<(), CodegenError> {
        let storage = match self.free.pop() {
            Some(reg) => {
                debug!("Allocated {} -> {}", loc, reg);
                Storage::Reg(reg)
            }
            None => {
                let offset = self.grow(8)?;
                debug!("Spilled {} to [x29, #{}]", loc, offset);
                Storage::Frame(offset)
            }
        };
        self.layout.locations.insert(loc, storage);
        Ok(())
    }

    fn reserve_array(&mut self, inst: &Instruction) -> Result<(), CodegenError> {
        let Some(loc) = inst.defined() else { return Ok(()) };
        if self.layout.locations.contains_key(&loc) {
            return Ok(());
        }
        let length = inst.src1.as_ref().and_then(|c| c.immediate()).map_or(1, |v| v.as_int().max(1) as usize);
        let bytes = u64::try_from(length).ok().and_then(|n| n.checked_mul(8)).unwrap_or(u64::MAX);
        let base = self.grow(bytes)?;
        debug!("Array {} occupies {} slot(s) at [x29, #{}]", loc, length, base);
        self.layout.locations.insert(loc, Storage::Array { base, length });
        Ok(())
    }

    /// Extend the area below x29 by `bytes`, returning the new lowest offset
    fn grow(&mut self, bytes: u64) -> Result<i32, CodegenError> {
        let next = u64::from(self.next_offset).saturating_add(bytes);
        match (i32::try_from(next), u32::try_from(next)) {
            (Ok(offset), Ok(next)) => {
                self.next_offset = next;
                Ok(-offset)
            }
            _ => Err(CodegenError::FrameTooLarge { function: self.function.clone(), bytes: next }),
        }
    }
}
