//! Structural checks on generated assembly

use lark_codegen::{AsmInst, AsmProgram};
use std::collections::BTreeSet;

/// Problems found in `program`; empty when it is well formed
pub fn validate_assembly(program: &AsmProgram) -> Vec<String> {
    let mut problems = Vec::new();
    let lines = program.lines();

    if program.functions.is_empty() || program.instruction_count() == 0 {
        problems.push("assembly contains no instructions".to_string());
    }

    let labels: BTreeSet<&str> = lines
        .iter()
        .filter_map(|inst| match inst {
            AsmInst::Label(name) => Some(name.as_str()),
            _ => None,
        })
        .collect();

    for function in &program.functions {
        if !labels.contains(function.name.as_str()) {
            problems.push(format!("function '{}' has no symbol label", function.name));
        }

        for target in function.body.iter().filter_map(AsmInst::branch_target) {
            if !labels.contains(target) {
                problems.push(format!("branch to undefined label '{}' in '{}'", target, function.name));
            }
        }

        match function.body.iter().rev().find(|inst| inst.is_instruction()) {
            Some(AsmInst::Ret) => {}
            _ => problems.push(format!("function '{}' does not end in ret", function.name)),
        }
    }

    problems
}

#[cfg(test)]
mod tests {
    use super::*;
    use lark_codegen::{AsmFunction, Reg};

    fn function(name: &str, body: Vec<AsmInst>) -> AsmFunction {
        AsmFunction { name: name.to_string(), frame_size: 0, is_leaf: true, body }
    }

    #[test]
    fn test_well_formed_program_passes() {
        let program = AsmProgram {
            functions: vec![function(
                "main",
                vec![
                    AsmInst::Label(".L0".into()),
                    AsmInst::Cbz(Reg::X(19), ".L0".into()),
                    AsmInst::MovImm(Reg::X(0), 0),
                    AsmInst::Ret,
                    AsmInst::Comment("end".into()),
                ],
            )],
            ..AsmProgram::default()
        };
        assert!(validate_assembly(&program).is_empty());
    }

    #[test]
    fn test_empty_program_fails() {
        let problems = validate_assembly(&AsmProgram::default());
        assert_eq!(problems, vec!["assembly contains no instructions".to_string()]);
    }

    #[test]
    fn test_undefined_branch_target_fails() {
        let program = AsmProgram {
            functions: vec![function("main", vec![AsmInst::B(".L7".into()), AsmInst::Ret])],
            ..AsmProgram::default()
        };
        assert_eq!(validate_assembly(&program), vec!["branch to undefined label '.L7' in 'main'".to_string()]);
    }

    #[test]
    fn test_missing_ret_fails() {
        let program = AsmProgram {
            functions: vec![function("main", vec![AsmInst::MovImm(Reg::X(0), 0)])],
            ..AsmProgram::default()
        };
        assert_eq!(validate_assembly(&program), vec!["function 'main' does not end in ret".to_string()]);
    }
}
