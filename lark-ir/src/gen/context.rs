//! Per-compilation generation state
//!
//! Counters for temporaries and labels, the string table, and the stack of
//! enclosing loops. One context lives for one compilation unit, so names
//! never repeat within it.

use crate::ir::{Operand, StringTable};
use lark_common::DataType;

/// Branch targets of an enclosing loop
#[derive(Debug, Clone, PartialEq)]
struct LoopLabels {
    continue_label: String,
    break_label: String,
}

#[derive(Debug, Default)]
pub struct GenContext {
    next_temp: u32,
    next_label: u32,
    strings: StringTable,
    loops: Vec<LoopLabels>,
}

impl GenContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh temporary `tN` of the given type
    pub fn new_temp(&mut self, data_type: DataType) -> Operand {
        let name = format!("t{}", self.next_temp);
        self.next_temp += 1;
        Operand::temp(name, data_type)
    }

    /// Fresh label `LN`
    pub fn new_label(&mut self) -> String {
        let name = format!("L{}", self.next_label);
        self.next_label += 1;
        name
    }

    pub fn intern_string(&mut self, literal: &str) -> u32 {
        self.strings.intern(literal)
    }

    pub fn strings(&self) -> &StringTable {
        &self.strings
    }

    pub fn enter_loop(&mut self, continue_label: &str, break_label: &str) {
        self.loops.push(LoopLabels {
            continue_label: continue_label.to_string(),
            break_label: break_label.to_string(),
        });
    }

    pub fn exit_loop(&mut self) {
        self.loops.pop();
    }

    pub fn break_target(&self) -> Option<&str> {
        self.loops.last().map(|l| l.break_label.as_str())
    }

    pub fn continue_target(&self) -> Option<&str> {
        self.loops.last().map(|l| l.continue_label.as_str())
    }

    pub fn temps_issued(&self) -> u32 {
        self.next_temp
    }

    pub fn labels_issued(&self) -> u32 {
        self.next_label
    }
}
