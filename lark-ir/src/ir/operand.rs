//! IR Operands
//!
//! An operand is a tagged kind plus the declared data type of the value it
//! denotes. Frame placement is not part of an operand; the register
//! allocator keeps that in its own location map.

use lark_common::DataType;
use std::fmt;

/// Literal carried by an immediate operand
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ImmValue {
    Int(i64),
    Float(f64),
}

impl ImmValue {
    pub fn as_int(&self) -> i64 {
        match *self {
            ImmValue::Int(v) => v,
            ImmValue::Float(f) => f as i64,
        }
    }

    pub fn as_float(&self) -> f64 {
        match *self {
            ImmValue::Int(v) => v as f64,
            ImmValue::Float(f) => f,
        }
    }

    pub fn is_zero(&self) -> bool {
        match *self {
            ImmValue::Int(v) => v == 0,
            ImmValue::Float(f) => f == 0.0,
        }
    }

    /// Raw 64-bit pattern as it sits in a general-purpose register
    pub fn to_bits(&self) -> u64 {
        match *self {
            ImmValue::Int(v) => v as u64,
            ImmValue::Float(f) => f.to_bits(),
        }
    }
}

impl fmt::Display for ImmValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImmValue::Int(v) => write!(f, "{}", v),
            ImmValue::Float(v) => write!(f, "{:?}", v),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OperandKind {
    /// Compiler-generated temporary (`t3`)
    Temp(String),
    /// Function-local variable
    Var(String),
    Immediate(ImmValue),
    /// Branch target, callee, or string constant (`L3`, `.str0`)
    Label(String),
    /// Incoming parameter (`%a`)
    Param(String),
    /// Program-level variable (`@g`)
    Global(String),
    /// Element of an array (`arr[t1]`)
    ArrayAccess { name: String, index: Box<Operand> },
}

/// Named storage an operand reads or writes
///
/// Two operands denote the same storage exactly when their locations are
/// equal; a variable and a temporary with the same spelling never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Location {
    Temp(String),
    Var(String),
    Param(String),
    Global(String),
}

impl Location {
    pub fn name(&self) -> &str {
        match self {
            Location::Temp(n) | Location::Var(n) | Location::Param(n) | Location::Global(n) => n,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Temp(n) | Location::Var(n) => write!(f, "{}", n),
            Location::Param(n) => write!(f, "%{}", n),
            Location::Global(n) => write!(f, "@{}", n),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Operand {
    pub kind: OperandKind,
    pub data_type: DataType,
}

impl Operand {
    pub fn new(kind: OperandKind, data_type: DataType) -> Self {
        Self { kind, data_type }
    }

    pub fn temp(name: impl Into<String>, data_type: DataType) -> Self {
        Self::new(OperandKind::Temp(name.into()), data_type)
    }

    pub fn var(name: impl Into<String>, data_type: DataType) -> Self {
        Self::new(OperandKind::Var(name.into()), data_type)
    }

    pub fn param(name: impl Into<String>, data_type: DataType) -> Self {
        Self::new(OperandKind::Param(name.into()), data_type)
    }

    pub fn global(name: impl Into<String>, data_type: DataType) -> Self {
        Self::new(OperandKind::Global(name.into()), data_type)
    }

    pub fn label(name: impl Into<String>) -> Self {
        Self::new(OperandKind::Label(name.into()), DataType::Void)
    }

    /// Reference to string constant `id` in the program's string table
    pub fn string_ref(id: u32) -> Self {
        Self::new(OperandKind::Label(format!(".str{}", id)), DataType::Str)
    }

    pub fn int(value: i64) -> Self {
        Self::new(OperandKind::Immediate(ImmValue::Int(value)), DataType::Int)
    }

    pub fn float(value: f64) -> Self {
        Self::new(OperandKind::Immediate(ImmValue::Float(value)), DataType::Float)
    }

    pub fn boolean(value: bool) -> Self {
        Self::new(OperandKind::Immediate(ImmValue::Int(value as i64)), DataType::Bool)
    }

    /// Immediate holding `value`, typed `data_type`
    pub fn imm(value: ImmValue, data_type: DataType) -> Self {
        Self::new(OperandKind::Immediate(value), data_type)
    }

    /// Zero of the given type (uninitialized declarations)
    pub fn zero(data_type: DataType) -> Self {
        match data_type {
            DataType::Float => Self::float(0.0),
            other => Self::imm(ImmValue::Int(0), other),
        }
    }

    pub fn array_access(name: impl Into<String>, index: Operand, element_type: DataType) -> Self {
        Self::new(
            OperandKind::ArrayAccess { name: name.into(), index: Box::new(index) },
            element_type,
        )
    }

    pub fn is_immediate(&self) -> bool {
        matches!(self.kind, OperandKind::Immediate(_))
    }

    pub fn is_temp(&self) -> bool {
        matches!(self.kind, OperandKind::Temp(_))
    }

    pub fn immediate(&self) -> Option<ImmValue> {
        match self.kind {
            OperandKind::Immediate(v) => Some(v),
            _ => None,
        }
    }

    pub fn label_name(&self) -> Option<&str> {
        match &self.kind {
            OperandKind::Label(name) => Some(name),
            _ => None,
        }
    }

    /// Storage this operand names directly (not through an array element)
    pub fn location(&self) -> Option<Location> {
        match &self.kind {
            OperandKind::Temp(n) => Some(Location::Temp(n.clone())),
            OperandKind::Var(n) => Some(Location::Var(n.clone())),
            OperandKind::Param(n) => Some(Location::Param(n.clone())),
            OperandKind::Global(n) => Some(Location::Global(n.clone())),
            OperandKind::Immediate(_) | OperandKind::Label(_) | OperandKind::ArrayAccess { .. } => None,
        }
    }

    /// Every location read when this operand is used as a value
    ///
    /// An array access reads its index and the array itself; the array is
    /// reported as the `Var` bound by `AllocArray`.
    pub fn reads(&self, out: &mut Vec<Location>) {
        match &self.kind {
            OperandKind::ArrayAccess { name, index } => {
                out.push(Location::Var(name.clone()));
                index.reads(out);
            }
            _ => out.extend(self.location()),
        }
    }

    /// Replace every occurrence of `from` (including inside an array index)
    pub fn rename(&mut self, from: &Location, to: &Operand) -> bool {
        if self.location().as_ref() == Some(from) {
            *self = to.clone();
            return true;
        }
        if let OperandKind::ArrayAccess { index, .. } = &mut self.kind {
            return index.rename(from, to);
        }
        false
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            OperandKind::Temp(n) | OperandKind::Var(n) | OperandKind::Label(n) => write!(f, "{}", n),
            OperandKind::Immediate(v) => write!(f, "#{}", v),
            OperandKind::Param(n) => write!(f, "%{}", n),
            OperandKind::Global(n) => write!(f, "@{}", n),
            OperandKind::ArrayAccess { name, index } => write!(f, "{}[{}]", name, index),
        }
    }
}
