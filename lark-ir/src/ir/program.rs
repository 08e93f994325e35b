//! IR Program
//!
//! The unit handed from generation through optimization to code
//! generation: functions in emission order, program-level globals, and the
//! deduplicated string table.

use super::function::IrFunction;
use lark_common::DataType;
use std::collections::HashMap;
use std::fmt;

/// Program-level variable; `element_count` is set for arrays
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalVar {
    pub name: String,
    pub data_type: DataType,
    pub element_count: Option<usize>,
}

impl GlobalVar {
    pub fn scalar(name: &str, data_type: DataType) -> Self {
        Self { name: name.to_string(), data_type, element_count: None }
    }

    pub fn array(name: &str, element_type: DataType, element_count: usize) -> Self {
        Self { name: name.to_string(), data_type: element_type, element_count: Some(element_count) }
    }

    /// Storage size in 8-byte slots
    pub fn slot_count(&self) -> usize {
        self.element_count.unwrap_or(1)
    }
}

/// Interned string literals with dense ids assigned at first insertion
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StringTable {
    entries: Vec<String>,
    index: HashMap<String, u32>,
}

impl StringTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id of `literal`, allocating the next id on first sight
    pub fn intern(&mut self, literal: &str) -> u32 {
        if let Some(&id) = self.index.get(literal) {
            return id;
        }
        let id = self.entries.len() as u32;
        self.entries.push(literal.to_string());
        self.index.insert(literal.to_string(), id);
        id
    }

    pub fn get(&self, id: u32) -> Option<&str> {
        self.entries.get(id as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in id order
    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.entries.iter().enumerate().map(|(id, s)| (id as u32, s.as_str()))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IrProgram {
    pub functions: Vec<IrFunction>,
    pub globals: Vec<GlobalVar>,
    pub strings: StringTable,
}

impl IrProgram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_function(&mut self, function: IrFunction) {
        self.functions.push(function);
    }

    /// Add a global unless one with the same name already exists
    pub fn add_global(&mut self, global: GlobalVar) {
        if self.global(&global.name).is_none() {
            self.globals.push(global);
        }
    }

    pub fn intern_string(&mut self, literal: &str) -> u32 {
        self.strings.intern(literal)
    }

    pub fn function(&self, name: &str) -> Option<&IrFunction> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn function_mut(&mut self, name: &str) -> Option<&mut IrFunction> {
        self.functions.iter_mut().find(|f| f.name == name)
    }

    pub fn global(&self, name: &str) -> Option<&GlobalVar> {
        self.globals.iter().find(|g| g.name == name)
    }

    pub fn instruction_count(&self) -> usize {
        self.functions.iter().map(IrFunction::instruction_count).sum()
    }
}

impl fmt::Display for IrProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, function) in self.functions.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", function)?;
        }

        if !self.globals.is_empty() {
            writeln!(f)?;
            writeln!(f, "globals:")?;
            for global in &self.globals {
                match global.element_count {
                    Some(n) => writeln!(f, "  @{}: {}[{}]", global.name, global.data_type, n)?,
                    None => writeln!(f, "  @{}: {}", global.name, global.data_type)?,
                }
            }
        }

        if !self.strings.is_empty() {
            writeln!(f)?;
            writeln!(f, "strings:")?;
            for (id, literal) in self.strings.iter() {
                writeln!(f, "  .str{} = {:?}", id, literal)?;
            }
        }
        Ok(())
    }
}
