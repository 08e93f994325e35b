//! Common types used throughout the compiler
//!
//! The source language has a handful of scalar types. Every scalar occupies a
//! single 64-bit slot on the target, which keeps frame layout and argument
//! passing uniform.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Size in bytes of one value slot (register width / stack cell)
pub const SLOT_SIZE: u32 = 8;

/// Scalar data types of the source language
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// 64-bit signed integer
    #[default]
    Int,
    /// IEEE-754 binary64
    Float,
    /// Boolean, materialized as 0 or 1
    Bool,
    /// Address of a NUL-terminated string constant
    Str,
    /// No value (function return type only)
    Void,
}

impl DataType {
    pub fn is_float(&self) -> bool {
        matches!(self, DataType::Float)
    }

    pub fn is_void(&self) -> bool {
        matches!(self, DataType::Void)
    }

    /// Result type of an arithmetic operation between two operands
    pub fn arithmetic_result(lhs: DataType, rhs: DataType) -> DataType {
        if lhs.is_float() || rhs.is_float() {
            DataType::Float
        } else {
            DataType::Int
        }
    }

    /// Size in bytes of a value of this type
    pub fn size_in_bytes(&self) -> u32 {
        match self {
            DataType::Void => 0,
            _ => SLOT_SIZE,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Int => write!(f, "int"),
            DataType::Float => write!(f, "float"),
            DataType::Bool => write!(f, "bool"),
            DataType::Str => write!(f, "str"),
            DataType::Void => write!(f, "void"),
        }
    }
}
