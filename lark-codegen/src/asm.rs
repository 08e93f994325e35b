//! AArch64 Assembly Instructions
//!
//! Typed representation of the instructions the code generator emits. The
//! `Display` impls are the only place that knows GNU-as syntax.

use std::fmt;

/// General-purpose register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Reg {
    /// x0 through x30
    X(u8),
    Sp,
    Xzr,
}

impl Reg {
    /// Frame pointer
    pub const FP: Reg = Reg::X(29);
    /// Link register
    pub const LR: Reg = Reg::X(30);
    /// Intra-procedure-call scratch registers, used for address formation
    pub const IP0: Reg = Reg::X(16);
    pub const IP1: Reg = Reg::X(17);
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reg::X(n) => write!(f, "x{}", n),
            Reg::Sp => write!(f, "sp"),
            Reg::Xzr => write!(f, "xzr"),
        }
    }
}

/// Double-precision floating-point register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FReg(pub u8);

impl fmt::Display for FReg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "d{}", self.0)
    }
}

/// Condition codes used by `cset`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cond {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// Negative; float less-than after `fcmp`
    Mi,
    /// Lower or same; float less-or-equal after `fcmp`
    Ls,
}

impl fmt::Display for Cond {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Cond::Eq => "eq",
            Cond::Ne => "ne",
            Cond::Lt => "lt",
            Cond::Le => "le",
            Cond::Gt => "gt",
            Cond::Ge => "ge",
            Cond::Mi => "mi",
            Cond::Ls => "ls",
        };
        write!(f, "{}", s)
    }
}

/// Assembly instruction
#[derive(Debug, Clone, PartialEq)]
pub enum AsmInst {
    // Data movement
    Mov(Reg, Reg),               // mov rd, rs
    MovImm(Reg, i64),            // mov rd, #imm (single movz/movn chunk)
    Movz(Reg, u16, u8),          // movz rd, #imm16, lsl #shift
    Movn(Reg, u16, u8),          // movn rd, #imm16, lsl #shift
    Movk(Reg, u16, u8),          // movk rd, #imm16, lsl #shift
    FmovToFp(FReg, Reg),         // fmov dd, xs
    FmovFromFp(Reg, FReg),       // fmov xd, ds

    // Integer arithmetic
    Add(Reg, Reg, Reg),          // add rd, rs, rt
    AddImm(Reg, Reg, u16, bool), // add rd, rs, #imm12 (lsl #12 when set)
    Sub(Reg, Reg, Reg),
    SubImm(Reg, Reg, u16, bool),
    Mul(Reg, Reg, Reg),
    Sdiv(Reg, Reg, Reg),
    Neg(Reg, Reg),
    And(Reg, Reg, Reg),
    Orr(Reg, Reg, Reg),

    // Floating point
    Fadd(FReg, FReg, FReg),
    Fsub(FReg, FReg, FReg),
    Fmul(FReg, FReg, FReg),
    Fdiv(FReg, FReg, FReg),
    Fneg(FReg, FReg),
    Frintz(FReg, FReg),
    Fmsub(FReg, FReg, FReg, FReg), // fmsub dd, dn, dm, da  (da - dn*dm)
    Scvtf(FReg, Reg),
    Fcvtzs(Reg, FReg),
    Fcmp(FReg, FReg),

    // Comparison
    Cmp(Reg, Reg),
    CmpImm(Reg, u16, bool),
    Cset(Reg, Cond),

    // Memory
    Ldur(Reg, Reg, i32),         // ldur rd, [base, #off]  (-256..=255)
    Stur(Reg, Reg, i32),
    Ldr(Reg, Reg, u32),          // ldr rd, [base, #off]   (scaled, unsigned)
    Str(Reg, Reg, u32),
    LdrReg(Reg, Reg, Reg, bool), // ldr rd, [base, ri] (lsl #3 when set)
    StrReg(Reg, Reg, Reg, bool),
    StpPre(Reg, Reg, Reg, i32),  // stp ra, rb, [base, #off]!
    LdpPost(Reg, Reg, Reg, i32), // ldp ra, rb, [base], #off
    Adrp(Reg, String),
    AddLo12(Reg, Reg, String),   // add rd, rs, :lo12:sym

    // Control flow
    B(String),
    Cbz(Reg, String),
    Cbnz(Reg, String),
    Bl(String),
    Ret,

    // Pseudo
    Label(String),
    Directive(String),
    Comment(String),
    Placeholder(String),
}

impl AsmInst {
    /// Materializes into a machine instruction (labels, directives and
    /// comments do not)
    pub fn is_instruction(&self) -> bool {
        !matches!(
            self,
            AsmInst::Label(_) | AsmInst::Directive(_) | AsmInst::Comment(_) | AsmInst::Placeholder(_)
        )
    }

    /// Branch target of `b`, `cbz` and `cbnz`
    pub fn branch_target(&self) -> Option<&str> {
        match self {
            AsmInst::B(target) | AsmInst::Cbz(_, target) | AsmInst::Cbnz(_, target) => Some(target),
            _ => None,
        }
    }

    /// Ends a straight-line run: labels, branches, calls and returns
    pub fn is_boundary(&self) -> bool {
        self.branch_target().is_some()
            || matches!(
                self,
                AsmInst::Label(_) | AsmInst::Bl(_) | AsmInst::Ret | AsmInst::Directive(_) | AsmInst::Placeholder(_)
            )
    }
}

fn shifted(f: &mut fmt::Formatter<'_>, imm: u16, shift: u8) -> fmt::Result {
    if shift == 0 {
        write!(f, "#{:#x}", imm)
    } else {
        write!(f, "#{:#x}, lsl #{}", imm, shift)
    }
}

fn imm12(f: &mut fmt::Formatter<'_>, imm: u16, lsl12: bool) -> fmt::Result {
    if lsl12 {
        write!(f, "#{}, lsl #12", imm)
    } else {
        write!(f, "#{}", imm)
    }
}

impl fmt::Display for AsmInst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Data movement
            AsmInst::Mov(rd, rs) => write!(f, "mov {}, {}", rd, rs),
            AsmInst::MovImm(rd, imm) => write!(f, "mov {}, #{}", rd, imm),
            AsmInst::Movz(rd, imm, shift) => {
                write!(f, "movz {}, ", rd)?;
                shifted(f, *imm, *shift)
            }
            AsmInst::Movn(rd, imm, shift) => {
                write!(f, "movn {}, ", rd)?;
                shifted(f, *imm, *shift)
            }
            AsmInst::Movk(rd, imm, shift) => {
                write!(f, "movk {}, ", rd)?;
                shifted(f, *imm, *shift)
            }
            AsmInst::FmovToFp(dd, xs) => write!(f, "fmov {}, {}", dd, xs),
            AsmInst::FmovFromFp(xd, ds) => write!(f, "fmov {}, {}", xd, ds),

            // Integer arithmetic
            AsmInst::Add(rd, rs, rt) => write!(f, "add {}, {}, {}", rd, rs, rt),
            AsmInst::AddImm(rd, rs, imm, lsl) => {
                write!(f, "add {}, {}, ", rd, rs)?;
                imm12(f, *imm, *lsl)
            }
            AsmInst::Sub(rd, rs, rt) => write!(f, "sub {}, {}, {}", rd, rs, rt),
            AsmInst::SubImm(rd, rs, imm, lsl) => {
                write!(f, "sub {}, {}, ", rd, rs)?;
                imm12(f, *imm, *lsl)
            }
            AsmInst::Mul(rd, rs, rt) => write!(f, "mul {}, {}, {}", rd, rs, rt),
            AsmInst::Sdiv(rd, rs, rt) => write!(f, "sdiv {}, {}, {}", rd, rs, rt),
            AsmInst::Neg(rd, rs) => write!(f, "neg {}, {}", rd, rs),
            AsmInst::And(rd, rs, rt) => write!(f, "and {}, {}, {}", rd, rs, rt),
            AsmInst::Orr(rd, rs, rt) => write!(f, "orr {}, {}, {}", rd, rs, rt),

            // Floating point
            AsmInst::Fadd(d, n, m) => write!(f, "fadd {}, {}, {}", d, n, m),
            AsmInst::Fsub(d, n, m) => write!(f, "fsub {}, {}, {}", d, n, m),
            AsmInst::Fmul(d, n, m) => write!(f, "fmul {}, {}, {}", d, n, m),
            AsmInst::Fdiv(d, n, m) => write!(f, "fdiv {}, {}, {}", d, n, m),
            AsmInst::Fneg(d, n) => write!(f, "fneg {}, {}", d, n),
            AsmInst::Frintz(d, n) => write!(f, "frintz {}, {}", d, n),
            AsmInst::Fmsub(d, n, m, a) => write!(f, "fmsub {}, {}, {}, {}", d, n, m, a),
            AsmInst::Scvtf(d, x) => write!(f, "scvtf {}, {}", d, x),
            AsmInst::Fcvtzs(x, d) => write!(f, "fcvtzs {}, {}", x, d),
            AsmInst::Fcmp(n, m) => write!(f, "fcmp {}, {}", n, m),

            // Comparison
            AsmInst::Cmp(rs, rt) => write!(f, "cmp {}, {}", rs, rt),
            AsmInst::CmpImm(rs, imm, lsl) => {
                write!(f, "cmp {}, ", rs)?;
                imm12(f, *imm, *lsl)
            }
            AsmInst::Cset(rd, cond) => write!(f, "cset {}, {}", rd, cond),

            // Memory
            AsmInst::Ldur(rd, base, off) => write!(f, "ldur {}, [{}, #{}]", rd, base, off),
            AsmInst::Stur(rs, base, off) => write!(f, "stur {}, [{}, #{}]", rs, base, off),
            AsmInst::Ldr(rd, base, 0) => write!(f, "ldr {}, [{}]", rd, base),
            AsmInst::Ldr(rd, base, off) => write!(f, "ldr {}, [{}, #{}]", rd, base, off),
            AsmInst::Str(rs, base, 0) => write!(f, "str {}, [{}]", rs, base),
            AsmInst::Str(rs, base, off) => write!(f, "str {}, [{}, #{}]", rs, base, off),
            AsmInst::LdrReg(rd, base, idx, true) => write!(f, "ldr {}, [{}, {}, lsl #3]", rd, base, idx),
            AsmInst::LdrReg(rd, base, idx, false) => write!(f, "ldr {}, [{}, {}]", rd, base, idx),
            AsmInst::StrReg(rs, base, idx, true) => write!(f, "str {}, [{}, {}, lsl #3]", rs, base, idx),
            AsmInst::StrReg(rs, base, idx, false) => write!(f, "str {}, [{}, {}]", rs, base, idx),
            AsmInst::StpPre(a, b, base, off) => write!(f, "stp {}, {}, [{}, #{}]!", a, b, base, off),
            AsmInst::LdpPost(a, b, base, off) => write!(f, "ldp {}, {}, [{}], #{}", a, b, base, off),
            AsmInst::Adrp(rd, sym) => write!(f, "adrp {}, {}", rd, sym),
            AsmInst::AddLo12(rd, rs, sym) => write!(f, "add {}, {}, :lo12:{}", rd, rs, sym),

            // Control flow
            AsmInst::B(label) => write!(f, "b {}", label),
            AsmInst::Cbz(rs, label) => write!(f, "cbz {}, {}", rs, label),
            AsmInst::Cbnz(rs, label) => write!(f, "cbnz {}, {}", rs, label),
            AsmInst::Bl(sym) => write!(f, "bl {}", sym),
            AsmInst::Ret => write!(f, "ret"),

            // Pseudo
            AsmInst::Label(label) => write!(f, "{}:", label),
            AsmInst::Directive(text) => write!(f, "{}", text),
            AsmInst::Comment(text) => write!(f, "// {}", text),
            AsmInst::Placeholder(text) => write!(f, "// unimplemented: {}", text),
        }
    }
}
