//! Assembly emission
//!
//! `AsmProgram` is the unit handed from instruction selection through the
//! post-codegen optimizer to the driver. Rendering lays out the sections in
//! a fixed order: architecture marker, read-only strings, writable globals,
//! then text.

use crate::asm::AsmInst;
use lark_common::{CompilerError, SourceLocation};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CodegenError {
    #[error("operand '{operand}' in '{function}' has no storage")]
    UnallocatedOperand { function: String, operand: String },

    #[error("malformed instruction in '{function}': {instruction}")]
    MalformedInstruction { function: String, instruction: String },

    #[error("'{name}' in '{function}' is not a known array")]
    UnknownArray { function: String, name: String },

    #[error("out of scratch registers translating '{instruction}' in '{function}'")]
    ScratchExhausted { function: String, instruction: String },

    #[error("frame of '{function}' needs {bytes} bytes, more than x29-relative addressing reaches")]
    FrameTooLarge { function: String, bytes: u64 },
}

impl From<CodegenError> for CompilerError {
    fn from(err: CodegenError) -> Self {
        CompilerError::codegen_error(err.to_string(), SourceLocation::dummy())
    }
}

/// Map an IR label to an assembler-local label
///
/// `.str0` becomes `.Lstr0`, `L3` becomes `.L3`.
pub fn asm_label(name: &str) -> String {
    match name.strip_prefix('.') {
        Some(rest) => format!(".L{}", rest),
        None => format!(".{}", name),
    }
}

/// Data symbol backing a program-level global
pub fn global_symbol(name: &str) -> String {
    format!("lark_global_{}", name)
}

/// One translated function
#[derive(Debug, Clone, PartialEq)]
pub struct AsmFunction {
    pub name: String,
    pub frame_size: u32,
    pub is_leaf: bool,
    /// Prologue, translated instructions and epilogue(s); no symbol label
    pub body: Vec<AsmInst>,
}

impl AsmFunction {
    pub fn instruction_count(&self) -> usize {
        self.body.iter().filter(|i| i.is_instruction()).count()
    }
}

/// Zero-initialized `.data` object
#[derive(Debug, Clone, PartialEq)]
pub struct DataObject {
    pub symbol: String,
    pub bytes: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AsmProgram {
    /// `(label, literal)` in string-table id order
    pub strings: Vec<(String, String)>,
    pub data: Vec<DataObject>,
    pub functions: Vec<AsmFunction>,
}

impl AsmProgram {
    pub fn function(&self, name: &str) -> Option<&AsmFunction> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// Machine instructions across all functions
    pub fn instruction_count(&self) -> usize {
        self.functions.iter().map(|f| f.instruction_count()).sum()
    }

    /// Full listing as a flat stream, sections and directives included
    pub fn lines(&self) -> Vec<AsmInst> {
        let mut out = vec![AsmInst::Directive(".arch armv8-a".to_string())];

        if !self.strings.is_empty() {
            out.push(AsmInst::Directive(".section .rodata".to_string()));
            for (label, literal) in &self.strings {
                out.push(AsmInst::Label(label.clone()));
                out.push(AsmInst::Directive(format!(".asciz \"{}\"", escape_asciz(literal))));
            }
        }

        if !self.data.is_empty() {
            out.push(AsmInst::Directive(".data".to_string()));
            out.push(AsmInst::Directive(".align 3".to_string()));
            for object in &self.data {
                out.push(AsmInst::Label(object.symbol.clone()));
                out.push(AsmInst::Directive(format!(".zero {}", object.bytes)));
            }
        }

        out.push(AsmInst::Directive(".text".to_string()));
        for function in &self.functions {
            out.push(AsmInst::Directive(".align 2".to_string()));
            out.push(AsmInst::Directive(format!(".global {}", function.name)));
            out.push(AsmInst::Directive(format!(".type {}, %function", function.name)));
            out.push(AsmInst::Label(function.name.clone()));
            out.push(AsmInst::Comment(format!(
                "frame: {} bytes{}",
                function.frame_size,
                if function.is_leaf { ", leaf" } else { "" }
            )));
            out.extend(function.body.iter().cloned());
            out.push(AsmInst::Directive(format!(".size {}, .-{}", function.name, function.name)));
        }
        out
    }
}

impl fmt::Display for AsmProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", emit_instructions(&self.lines()))
    }
}

/// Render instructions one per line; labels sit in column 0
pub fn emit_instructions(code: &[AsmInst]) -> String {
    let mut out = String::new();
    for inst in code {
        match inst {
            AsmInst::Label(_) => out.push_str(&format!("{}\n", inst)),
            _ => out.push_str(&format!("    {}\n", inst)),
        }
    }
    out
}

fn escape_asciz(literal: &str) -> String {
    let mut out = String::with_capacity(literal.len());
    for byte in literal.bytes() {
        match byte {
            b'"' => out.push_str("\\\""),
            b'\\' => out.push_str("\\\\"),
            b'\n' => out.push_str("\\n"),
            b'\t' => out.push_str("\\t"),
            0x20..=0x7e => out.push(byte as char),
            _ => out.push_str(&format!("\\{:03o}", byte)),
        }
    }
    out
}
