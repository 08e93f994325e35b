//! Instruction selection
//!
//! One target sequence per IR opcode, driven by the frame layout and the
//! calling convention. Operands that live in a register are used in place;
//! everything else goes through the x9-x15 scratch pool, which is refilled
//! before every IR instruction. Spilled values are therefore reloaded at
//! each use and stored back at each definition.

use crate::abi::{adjust_sp, load_frame_slot, store_frame_slot, CallingConvention};
use crate::asm::{AsmInst, Cond, FReg, Reg};
use crate::emit::{asm_label, global_symbol, AsmFunction, AsmProgram, CodegenError, DataObject};
use crate::imm::{arith_imm, materialize};
use crate::regalloc::{FrameLayout, RegisterAllocator, Storage};
use lark_common::{DataType, Diagnostic, ErrorReporter, SourceLocation};
use lark_ir::{Instruction, IrFunction, IrProgram, Location, Opcode, Operand, OperandKind};
use log::{debug, info, warn};

/// Result of translating one IR instruction
#[derive(Debug, Clone, PartialEq)]
pub enum Translation {
    Translated(Vec<AsmInst>),
    TranslatedWithWarning(Vec<AsmInst>, String),
    /// No lowering exists; the text names what was skipped
    Placeholder(String),
}

const SCRATCH: [Reg; 7] = [
    Reg::X(9),
    Reg::X(10),
    Reg::X(11),
    Reg::X(12),
    Reg::X(13),
    Reg::X(14),
    Reg::X(15),
];

const F0: FReg = FReg(16);
const F1: FReg = FReg(17);
const F2: FReg = FReg(18);

/// Runtime routine printing a value of type `ty`
pub fn print_symbol(newline: bool, ty: DataType) -> String {
    let kind = match ty {
        DataType::Float => "float",
        DataType::Bool => "bool",
        DataType::Str => "str",
        DataType::Int | DataType::Void => "int",
    };
    let family = if newline { "println" } else { "print" };
    format!("lark_{}_{}", family, kind)
}

/// Resolved address of an array element
enum Element {
    /// `[x29, #offset]`
    Frame(i32),
    /// `[base, #offset]`
    Based(Reg, u32),
    /// `[base, index, lsl #3]`
    Indexed(Reg, Reg),
}

/// Translates whole programs
pub struct CodeGenerator {
    cc: Box<dyn CallingConvention>,
    reporter: ErrorReporter,
}

impl CodeGenerator {
    pub fn new(cc: Box<dyn CallingConvention>) -> Self {
        Self { cc, reporter: ErrorReporter::new() }
    }

    pub fn calling_convention(&self) -> &dyn CallingConvention {
        self.cc.as_ref()
    }

    /// Warnings recorded for degraded translations
    pub fn diagnostics(&self) -> &[Diagnostic] {
        self.reporter.diagnostics()
    }

    pub fn generate(&mut self, program: &IrProgram) -> Result<AsmProgram, CodegenError> {
        info!("Generating ARM64 for {} function(s) ({})", program.functions.len(), self.cc.name());

        let strings = program
            .strings
            .iter()
            .map(|(id, literal)| (asm_label(&format!(".str{}", id)), literal.to_string()))
            .collect();
        let data = program
            .globals
            .iter()
            .map(|g| DataObject { symbol: global_symbol(&g.name), bytes: 8 * g.slot_count() })
            .collect();

        let mut functions = Vec::new();
        for function in &program.functions {
            functions.push(self.generate_function(function, program)?);
        }

        Ok(AsmProgram { strings, data, functions })
    }

    pub fn generate_function(&mut self, function: &IrFunction, program: &IrProgram) -> Result<AsmFunction, CodegenError> {
        let cc = self.cc.as_ref();
        let layout = RegisterAllocator::new(cc).allocate(function, cc)?;
        let mut body = cc.prologue(&layout);

        let mut translator = FunctionTranslator {
            cc,
            function,
            program,
            layout: &layout,
            scratch: Vec::new(),
            pending_args: Vec::new(),
            current: String::new(),
        };

        for inst in &function.instructions {
            let location = SourceLocation::new(inst.source_line, 0);
            match translator.translate(inst)? {
                Translation::Translated(code) => body.extend(code),
                Translation::TranslatedWithWarning(code, message) => {
                    warn!("{}", message);
                    self.reporter.warning(message, location);
                    body.extend(code);
                }
                Translation::Placeholder(text) => {
                    let message = format!("no ARM64 lowering for '{}' in '{}'", text, function.name);
                    warn!("{}", message);
                    self.reporter.warning(message, location);
                    body.push(AsmInst::Placeholder(text));
                }
            }
        }

        // An explicit trailing return already carries its own epilogue
        let ends_in_exit = matches!(
            function.last_instruction().map(|i| i.opcode),
            Some(Opcode::Return | Opcode::FuncExit)
        );
        if !ends_in_exit {
            body.extend(cc.epilogue(&layout));
        }

        debug!("'{}': {} asm line(s), frame {} bytes", function.name, body.len(), layout.frame_size());
        Ok(AsmFunction {
            name: function.name.clone(),
            frame_size: layout.frame_size(),
            is_leaf: layout.is_leaf,
            body,
        })
    }
}

struct FunctionTranslator<'a> {
    cc: &'a dyn CallingConvention,
    function: &'a IrFunction,
    program: &'a IrProgram,
    layout: &'a FrameLayout,
    scratch: Vec<Reg>,
    /// `Arg` values waiting for the next `Call`
    pending_args: Vec<(usize, Operand)>,
    /// Text of the instruction being translated, for error messages
    current: String,
}

impl<'a> FunctionTranslator<'a> {
    fn translate(&mut self, inst: &Instruction) -> Result<Translation, CodegenError> {
        self.reset_scratch();
        self.current = inst.to_string().trim().to_string();
        let mut code = Vec::new();

        match inst.opcode {
            Opcode::FuncEnter | Opcode::AllocArray | Opcode::Nop => {}

            Opcode::LoadImm | Opcode::Load | Opcode::Move | Opcode::Store | Opcode::LoadAddr | Opcode::ArrayLoad => {
                let (dest, value) = (self.dest(inst)?, self.src1(inst)?);
                self.assign(dest, value, &mut code)?;
            }

            Opcode::ArrayStore => {
                let (dest, src) = (self.dest(inst)?, self.src1(inst)?);
                let value = self.read(src, &mut code)?;
                match self.element(dest, &mut code)? {
                    Element::Frame(off) => code.extend(store_frame_slot(value, off)),
                    Element::Based(base, off) => code.push(AsmInst::Str(value, base, off)),
                    Element::Indexed(base, idx) => code.push(AsmInst::StrReg(value, base, idx, true)),
                }
            }

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
            | Opcode::Ge => return self.binary(inst, code),

            Opcode::Neg => {
                let (dest, src) = (self.dest(inst)?, self.src1(inst)?);
                let a = self.read(src, &mut code)?;
                let d = self.dest_reg(dest)?;
                if src.data_type.is_float() {
                    code.push(AsmInst::FmovToFp(F0, a));
                    code.push(AsmInst::Fneg(F0, F0));
                    code.push(AsmInst::FmovFromFp(d, F0));
                } else {
                    code.push(AsmInst::Neg(d, a));
                }
                self.write_back(dest, d, &mut code)?;
            }

            Opcode::Not => {
                let dest = self.dest(inst)?;
                let a = self.read(self.src1(inst)?, &mut code)?;
                let d = self.dest_reg(dest)?;
                code.push(AsmInst::CmpImm(a, 0, false));
                code.push(AsmInst::Cset(d, Cond::Eq));
                self.write_back(dest, d, &mut code)?;
            }

            Opcode::IntToFloat => {
                let dest = self.dest(inst)?;
                let a = self.read(self.src1(inst)?, &mut code)?;
                let d = self.dest_reg(dest)?;
                code.push(AsmInst::Scvtf(F0, a));
                code.push(AsmInst::FmovFromFp(d, F0));
                self.write_back(dest, d, &mut code)?;
            }

            Opcode::FloatToInt => {
                let dest = self.dest(inst)?;
                let a = self.read(self.src1(inst)?, &mut code)?;
                let d = self.dest_reg(dest)?;
                code.push(AsmInst::FmovToFp(F0, a));
                code.push(AsmInst::Fcvtzs(d, F0));
                self.write_back(dest, d, &mut code)?;
            }

            Opcode::Label => code.push(AsmInst::Label(asm_label(self.label(inst)?))),
            Opcode::Jump => code.push(AsmInst::B(asm_label(self.label(inst)?))),
            Opcode::JumpIfTrue | Opcode::JumpIfFalse => {
                let target = asm_label(self.label(inst)?);
                let cond = self.read(self.src1(inst)?, &mut code)?;
                code.push(if inst.opcode == Opcode::JumpIfTrue {
                    AsmInst::Cbnz(cond, target)
                } else {
                    AsmInst::Cbz(cond, target)
                });
            }

            Opcode::Arg => {
                let position = inst
                    .src2
                    .as_ref()
                    .and_then(|p| p.immediate())
                    .map(|p| p.as_int().max(0) as usize)
                    .ok_or_else(|| self.malformed())?;
                let value = self.src1(inst)?.clone();
                self.pending_args.push((position, value));
            }

            Opcode::Call => self.call(inst, &mut code)?,

            Opcode::Return => {
                if let Some(value) = &inst.src1 {
                    let ret = self.cc.return_register();
                    self.read_into(value, ret, &mut code)?;
                }
                code.extend(self.cc.epilogue(self.layout));
            }

            Opcode::FuncExit => code.extend(self.cc.epilogue(self.layout)),

            Opcode::Print | Opcode::Println => {
                let value = self.src1(inst)?;
                let arg = self.cc.return_register();
                self.read_into(value, arg, &mut code)?;
                code.push(AsmInst::Bl(print_symbol(inst.opcode == Opcode::Println, value.data_type)));
            }

            Opcode::Push | Opcode::Pop => return Ok(Translation::Placeholder(self.current.clone())),
        }

        Ok(Translation::Translated(code))
    }

    fn binary(&mut self, inst: &Instruction, mut code: Vec<AsmInst>) -> Result<Translation, CodegenError> {
        let (dest, lhs, rhs) = (self.dest(inst)?, self.src1(inst)?, self.src2(inst)?);
        let float = lhs.data_type.is_float() || rhs.data_type.is_float();

        let a = self.read(lhs, &mut code)?;
        let d = self.dest_reg(dest)?;

        if float {
            let b = self.read(rhs, &mut code)?;
            code.push(AsmInst::FmovToFp(F0, a));
            code.push(AsmInst::FmovToFp(F1, b));
            match inst.opcode {
                Opcode::Add => code.push(AsmInst::Fadd(F0, F0, F1)),
                Opcode::Sub => code.push(AsmInst::Fsub(F0, F0, F1)),
                Opcode::Mul => code.push(AsmInst::Fmul(F0, F0, F1)),
                Opcode::Div => code.push(AsmInst::Fdiv(F0, F0, F1)),
                Opcode::Mod => {
                    // a - trunc(a / b) * b
                    code.push(AsmInst::Fdiv(F2, F0, F1));
                    code.push(AsmInst::Frintz(F2, F2));
                    code.push(AsmInst::Fmsub(F0, F2, F1, F0));
                }
                op if op.is_comparison() => {
                    code.push(AsmInst::Fcmp(F0, F1));
                    code.push(AsmInst::Cset(d, float_condition(op)));
                }
                // bitwise on the raw patterns
                op => code.push(int_logical(op, d, a, b)),
            }
            if matches!(inst.opcode, Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div | Opcode::Mod) {
                code.push(AsmInst::FmovFromFp(d, F0));
            }
        } else {
            let imm = rhs.immediate().and_then(|v| arith_imm(v.as_int()));
            match (inst.opcode, imm) {
                (Opcode::Add, Some((imm, lsl))) => code.push(AsmInst::AddImm(d, a, imm, lsl)),
                (Opcode::Sub, Some((imm, lsl))) => code.push(AsmInst::SubImm(d, a, imm, lsl)),
                (op, Some((imm, lsl))) if op.is_comparison() => {
                    code.push(AsmInst::CmpImm(a, imm, lsl));
                    code.push(AsmInst::Cset(d, int_condition(op)));
                }
                (op, _) => {
                    let b = self.read(rhs, &mut code)?;
                    match op {
                        Opcode::Add => code.push(AsmInst::Add(d, a, b)),
                        Opcode::Sub => code.push(AsmInst::Sub(d, a, b)),
                        Opcode::Mul => code.push(AsmInst::Mul(d, a, b)),
                        Opcode::Div => code.push(AsmInst::Sdiv(d, a, b)),
                        Opcode::Mod => {
                            let tmp = self.take_scratch()?;
                            code.push(AsmInst::Sdiv(tmp, a, b));
                            code.push(AsmInst::Mul(tmp, tmp, b));
                            code.push(AsmInst::Sub(d, a, tmp));
                            self.release(tmp);
                        }
                        op if op.is_comparison() => {
                            code.push(AsmInst::Cmp(a, b));
                            code.push(AsmInst::Cset(d, int_condition(op)));
                        }
                        op => code.push(int_logical(op, d, a, b)),
                    }
                }
            }
        }

        self.write_back(dest, d, &mut code)?;

        let divides_by_zero = matches!(inst.opcode, Opcode::Div | Opcode::Mod)
            && rhs.immediate().is_some_and(|v| v.is_zero());
        if divides_by_zero {
            let message = format!("division by literal zero in '{}': {}", self.function.name, self.current);
            return Ok(Translation::TranslatedWithWarning(code, message));
        }
        Ok(Translation::Translated(code))
    }

    fn call(&mut self, inst: &Instruction, code: &mut Vec<AsmInst>) -> Result<(), CodegenError> {
        let callee = self.label(inst)?.to_string();
        let mut args = std::mem::take(&mut self.pending_args);
        args.sort_by_key(|(position, _)| *position);

        let count = args.last().map_or(0, |(position, _)| position + 1);
        let area = self.cc.outgoing_area_size(count);
        adjust_sp(code, area, false);

        // Stack arguments first; register arguments are not touched by the
        // scratch traffic that stores need
        for (position, value) in &args {
            if let Some(offset) = self.cc.outgoing_stack_offset(*position) {
                self.reset_scratch();
                let r = self.read(value, code)?;
                code.push(AsmInst::Str(r, Reg::Sp, offset));
            }
        }
        for (position, value) in &args {
            if let Some(&reg) = self.cc.argument_registers().get(*position) {
                self.reset_scratch();
                self.read_into(value, reg, code)?;
            }
        }

        code.push(AsmInst::Bl(callee));
        adjust_sp(code, area, true);

        if let Some(dest) = &inst.dest {
            self.reset_scratch();
            let d = self.dest_reg(dest)?;
            let ret = self.cc.return_register();
            if d != ret {
                code.push(AsmInst::Mov(d, ret));
            }
            self.write_back(dest, d, code)?;
        }
        Ok(())
    }

    // ===== Operand access =====

    fn reset_scratch(&mut self) {
        self.scratch = SCRATCH.iter().rev().copied().collect();
    }

    fn take_scratch(&mut self) -> Result<Reg, CodegenError> {
        self.scratch.pop().ok_or_else(|| CodegenError::ScratchExhausted {
            function: self.function.name.clone(),
            instruction: self.current.clone(),
        })
    }

    fn release(&mut self, reg: Reg) {
        if SCRATCH.contains(&reg) && !self.scratch.contains(&reg) {
            self.scratch.push(reg);
        }
    }

    fn malformed(&self) -> CodegenError {
        CodegenError::MalformedInstruction {
            function: self.function.name.clone(),
            instruction: self.current.clone(),
        }
    }

    fn dest<'i>(&self, inst: &'i Instruction) -> Result<&'i Operand, CodegenError> {
        inst.dest.as_ref().ok_or_else(|| self.malformed())
    }

    fn src1<'i>(&self, inst: &'i Instruction) -> Result<&'i Operand, CodegenError> {
        inst.src1.as_ref().ok_or_else(|| self.malformed())
    }

    fn src2<'i>(&self, inst: &'i Instruction) -> Result<&'i Operand, CodegenError> {
        inst.src2.as_ref().ok_or_else(|| self.malformed())
    }

    fn label<'i>(&self, inst: &'i Instruction) -> Result<&'i str, CodegenError> {
        inst.label.as_deref().ok_or_else(|| self.malformed())
    }

    /// Frame storage of a temp, variable or parameter
    fn storage(&self, op: &Operand) -> Result<Storage, CodegenError> {
        op.location()
            .and_then(|loc| self.layout.storage(&loc))
            .ok_or_else(|| CodegenError::UnallocatedOperand {
                function: self.function.name.clone(),
                operand: op.to_string(),
            })
    }

    /// Register holding `op` for the rest of the function, if any
    fn home_register(&self, op: &Operand) -> Option<Reg> {
        match &op.kind {
            OperandKind::Temp(_) | OperandKind::Var(_) | OperandKind::Param(_) => match self.storage(op) {
                Ok(Storage::Reg(r)) => Some(r),
                _ => None,
            },
            _ => None,
        }
    }

    /// Register containing the value of `op`, loading it if needed
    fn read(&mut self, op: &Operand, code: &mut Vec<AsmInst>) -> Result<Reg, CodegenError> {
        if let Some(r) = self.home_register(op) {
            return Ok(r);
        }
        let r = self.take_scratch()?;
        self.read_into(op, r, code)?;
        Ok(r)
    }

    /// Place the value of `op` in `target`
    fn read_into(&mut self, op: &Operand, target: Reg, code: &mut Vec<AsmInst>) -> Result<(), CodegenError> {
        match &op.kind {
            OperandKind::Immediate(v) => {
                let bits = if op.data_type.is_float() { v.as_float().to_bits() } else { v.as_int() as u64 };
                code.extend(materialize(target, bits));
            }
            OperandKind::Label(name) => {
                let symbol = asm_label(name);
                code.push(AsmInst::Adrp(target, symbol.clone()));
                code.push(AsmInst::AddLo12(target, target, symbol));
            }
            OperandKind::Global(name) => {
                self.global_address(name, code);
                code.push(AsmInst::Ldr(target, Reg::IP0, 0));
            }
            OperandKind::ArrayAccess { .. } => match self.element(op, code)? {
                Element::Frame(off) => code.extend(load_frame_slot(target, off)),
                Element::Based(base, off) => code.push(AsmInst::Ldr(target, base, off)),
                Element::Indexed(base, idx) => code.push(AsmInst::LdrReg(target, base, idx, true)),
            },
            OperandKind::Temp(_) | OperandKind::Var(_) | OperandKind::Param(_) => match self.storage(op)? {
                Storage::Reg(r) => {
                    if r != target {
                        code.push(AsmInst::Mov(target, r));
                    }
                }
                Storage::Frame(off) => code.extend(load_frame_slot(target, off)),
                Storage::Array { base, .. } => frame_address(target, base, code),
            },
        }
        Ok(())
    }

    /// Register to compute a result for `dest` into
    fn dest_reg(&mut self, dest: &Operand) -> Result<Reg, CodegenError> {
        match self.home_register(dest) {
            Some(r) => Ok(r),
            None => self.take_scratch(),
        }
    }

    /// Store a computed result to `dest` unless it was computed in place
    fn write_back(&mut self, dest: &Operand, value: Reg, code: &mut Vec<AsmInst>) -> Result<(), CodegenError> {
        match &dest.kind {
            OperandKind::Global(name) => {
                self.global_address(name, code);
                code.push(AsmInst::Str(value, Reg::IP0, 0));
            }
            _ => match self.storage(dest)? {
                Storage::Reg(r) => {
                    if r != value {
                        code.push(AsmInst::Mov(r, value));
                    }
                }
                Storage::Frame(off) => code.extend(store_frame_slot(value, off)),
                Storage::Array { .. } => return Err(self.malformed()),
            },
        }
        Ok(())
    }

    /// `dest <- value` for the plain data-movement opcodes
    fn assign(&mut self, dest: &Operand, value: &Operand, code: &mut Vec<AsmInst>) -> Result<(), CodegenError> {
        match self.home_register(dest) {
            Some(r) => self.read_into(value, r, code),
            None => {
                let r = self.read(value, code)?;
                self.write_back(dest, r, code)
            }
        }
    }

    fn global_address(&self, name: &str, code: &mut Vec<AsmInst>) {
        let symbol = global_symbol(name);
        code.push(AsmInst::Adrp(Reg::IP0, symbol.clone()));
        code.push(AsmInst::AddLo12(Reg::IP0, Reg::IP0, symbol));
    }

    /// Address of `name[index]`: a frame array if the allocator placed one,
    /// otherwise a program global
    fn element(&mut self, op: &Operand, code: &mut Vec<AsmInst>) -> Result<Element, CodegenError> {
        let OperandKind::ArrayAccess { name, index } = &op.kind else {
            return Err(self.malformed());
        };
        let constant = index.immediate().map(|v| v.as_int());
        // the index may itself need x16, so read it before forming the base
        let index_reg = match constant {
            Some(_) => None,
            None => Some(self.read(index, code)?),
        };

        match self.layout.storage(&Location::Var(name.clone())) {
            Some(Storage::Array { base, .. }) => {
                let offset = constant
                    .and_then(|k| k.checked_mul(8))
                    .and_then(|bytes| bytes.checked_add(i64::from(base)))
                    .and_then(|off| i32::try_from(off).ok());
                let index_reg = match (offset, constant, index_reg) {
                    (Some(off), _, _) => return Ok(Element::Frame(off)),
                    (None, _, Some(idx)) => idx,
                    (None, Some(k), None) => {
                        let idx = self.take_scratch()?;
                        code.extend(materialize(idx, k as u64));
                        idx
                    }
                    (None, None, None) => return Err(self.malformed()),
                };
                frame_address(Reg::IP0, base, code);
                Ok(Element::Indexed(Reg::IP0, index_reg))
            }
            _ if self.program.global(name).is_some() => {
                self.global_address(name, code);
                match (constant, index_reg) {
                    (Some(k), _) if (0..=4095).contains(&k) => Ok(Element::Based(Reg::IP0, 8 * k as u32)),
                    (Some(k), _) => {
                        code.extend(materialize(Reg::IP1, k as u64));
                        Ok(Element::Indexed(Reg::IP0, Reg::IP1))
                    }
                    (None, Some(idx)) => Ok(Element::Indexed(Reg::IP0, idx)),
                    (None, None) => Err(self.malformed()),
                }
            }
            _ => Err(CodegenError::UnknownArray {
                function: self.function.name.clone(),
                name: name.clone(),
            }),
        }
    }
}

/// `rd = x29 + offset`
fn frame_address(rd: Reg, offset: i32, code: &mut Vec<AsmInst>) {
    let magnitude = (offset as i64).abs();
    match arith_imm(magnitude) {
        Some((imm, lsl)) if offset < 0 => code.push(AsmInst::SubImm(rd, Reg::FP, imm, lsl)),
        Some((imm, lsl)) => code.push(AsmInst::AddImm(rd, Reg::FP, imm, lsl)),
        None => {
            code.extend(materialize(Reg::IP1, magnitude as u64));
            if offset < 0 {
                code.push(AsmInst::Sub(rd, Reg::FP, Reg::IP1));
            } else {
                code.push(AsmInst::Add(rd, Reg::FP, Reg::IP1));
            }
        }
    }
}

fn int_condition(op: Opcode) -> Cond {
    match op {
        Opcode::Eq => Cond::Eq,
        Opcode::Ne => Cond::Ne,
        Opcode::Lt => Cond::Lt,
        Opcode::Le => Cond::Le,
        Opcode::Gt => Cond::Gt,
        _ => Cond::Ge,
    }
}

fn float_condition(op: Opcode) -> Cond {
    match op {
        Opcode::Lt => Cond::Mi,
        Opcode::Le => Cond::Ls,
        other => int_condition(other),
    }
}

fn int_logical(op: Opcode, d: Reg, a: Reg, b: Reg) -> AsmInst {
    match op {
        Opcode::Or => AsmInst::Orr(d, a, b),
        _ => AsmInst::And(d, a, b),
    }
}

#[cfg(test)]
mod tests;
