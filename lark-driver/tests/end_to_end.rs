use lark_common::{DataType, SourceLocation};
use lark_driver::{Compiler, CompilerOptions, CompilerState};
use lark_syntax::{
    BinaryOp, CompilationInput, Expression, Parameter, ScopeTrace, Statement, SyntaxTree, UpstreamDiagnostic,
    UpstreamPhase,
};
use pretty_assertions::assert_eq;

fn input(statements: Vec<Statement>) -> CompilationInput {
    CompilationInput::new(SyntaxTree::new(statements), ScopeTrace::default())
}

fn add(l: Expression, r: Expression) -> Expression {
    Expression::binary(BinaryOp::Add, l, r)
}

fn sum_program() -> CompilationInput {
    input(vec![
        Statement::var("x", DataType::Int, Some(add(Expression::int(2), Expression::int(3)))).at(1, 1),
        Statement::print(Expression::ident("x")).at(2, 1),
    ])
}

fn instructions(assembly: &str) -> Vec<&str> {
    assembly.lines().map(str::trim).collect()
}

#[test]
fn test_constant_sum_compiles_to_straight_line_code() {
    let result = Compiler::compile(&sum_program(), CompilerOptions::default());
    assert_eq!(result.state, CompilerState::Validated);
    assert!(result.succeeded());

    let expected_ir = "\
function main() -> int
  locals: x: int
    FuncEnter main
    t0 = LoadImm #5
    Store x, t0
    Print x
    Return #0
";
    assert_eq!(result.ir_text.as_deref(), Some(expected_ir));

    let assembly = result.assembly.unwrap();
    let lines = instructions(&assembly);
    assert!(lines.contains(&"mov x19, #5"));
    assert!(!lines.iter().any(|l| l.starts_with("b ") || l.starts_with("cbz") || l.starts_with("cbnz")));
    assert_eq!(lines.iter().filter(|l| **l == "bl lark_print_int").count(), 1);
    assert_eq!(lines.iter().filter(|l| **l == "ret").count(), 1);
}

#[test]
fn test_disabled_ir_optimization_keeps_the_add() {
    let options = CompilerOptions { optimize_ir: false, ..CompilerOptions::default() };
    let result = Compiler::compile(&sum_program(), options);

    assert!(result.succeeded());
    let ir = result.ir_text.unwrap();
    assert!(ir.contains("t0 = Add #2, #3"));
    assert!(!ir.contains("LoadImm"));
    assert_eq!(result.statistics.optimizer_iterations, 0);
    assert!(result.statistics.phase_micros("ir-optimization").is_none());
}

#[test]
fn test_functions_loops_and_strings() {
    let program = input(vec![
        Statement::function(
            "add",
            vec![Parameter::new("a", DataType::Int), Parameter::new("b", DataType::Int)],
            DataType::Int,
            vec![Statement::ret(Some(add(Expression::ident("a"), Expression::ident("b"))))],
        ),
        Statement::var("total", DataType::Int, Some(Expression::int(0))),
        Statement::var("i", DataType::Int, Some(Expression::int(0))),
        Statement::while_loop(
            Expression::binary(BinaryOp::Less, Expression::ident("i"), Expression::int(3)),
            vec![
                Statement::assign(
                    "total",
                    add(
                        Expression::ident("total"),
                        Expression::call("add", vec![Expression::ident("i"), Expression::int(1)]),
                    ),
                ),
                Statement::assign("i", add(Expression::ident("i"), Expression::int(1))),
            ],
        ),
        Statement::println(Expression::string("total:")),
        Statement::println(Expression::ident("total")),
    ]);

    let result = Compiler::compile(&program, CompilerOptions::default());
    assert_eq!(result.state, CompilerState::Validated, "{:?}", result.diagnostics);
    assert!(result.ir_text.unwrap().contains("Call add"));

    let assembly = result.assembly.unwrap();
    let lines = instructions(&assembly);
    assert!(lines.contains(&".global add"));
    assert!(lines.contains(&"bl add"));
    assert!(lines.contains(&"bl lark_println_str"));
    assert!(lines.contains(&"bl lark_println_int"));
    assert!(lines.contains(&".asciz \"total:\""));
    assert!(lines.iter().any(|l| l.starts_with("cbz") || l.starts_with("cbnz")));
}

#[test]
fn test_upstream_errors_stop_before_ir() {
    let mut program = sum_program();
    program.diagnostics.push(UpstreamDiagnostic::error(
        UpstreamPhase::Syntax,
        "expected ';'",
        SourceLocation::new(3, 7),
    ));

    let result = Compiler::compile(&program, CompilerOptions::default());
    assert_eq!(result.state, CompilerState::Failed);
    assert!(result.ir_text.is_none());
    assert!(result.assembly.is_none());
    assert_eq!(result.error_count(), 2);

    let rendered: Vec<String> = result.diagnostics.iter().map(|d| d.to_string()).collect();
    assert!(rendered[0].starts_with("3:7"));
    assert!(rendered[0].contains("expected ';'"));
    assert!(rendered[1].contains("1 upstream error(s)"));
}

#[test]
fn test_upstream_warnings_do_not_block() {
    let mut program = sum_program();
    program.diagnostics.push(UpstreamDiagnostic {
        phase: UpstreamPhase::Semantic,
        message: "unused variable 'y'".to_string(),
        location: SourceLocation::new(4, 1),
        is_warning: true,
    });

    let result = Compiler::compile(&program, CompilerOptions::default());
    assert!(result.succeeded());
    assert_eq!(result.error_count(), 0);
    assert_eq!(result.diagnostics.len(), 1);
}

#[test]
fn test_statistics_cover_every_phase() {
    let result = Compiler::compile(&sum_program(), CompilerOptions::default());
    let stats = &result.statistics;

    assert!(stats.optimizer_converged);
    assert!(stats.optimizer_iterations >= 1);
    assert_eq!(stats.ir_instructions_generated, 5);
    assert_eq!(stats.ir_instructions_optimized, 5);
    assert!(stats.asm_instructions_optimized <= stats.asm_instructions_generated);
    assert_eq!(stats.temporaries_issued, 1);
    assert_eq!(stats.phases.len(), 5);

    let json: serde_json::Value = serde_json::from_str(&stats.to_json().unwrap()).unwrap();
    assert_eq!(json["ir_instructions_generated"], 5);
    assert_eq!(json["phases"][0]["phase"], "ir-generation");
}

#[test]
fn test_json_input_round_trips_through_the_driver() {
    let text = sum_program().to_json().unwrap();
    let decoded = CompilationInput::from_json(&text).unwrap();
    let result = Compiler::compile(&decoded, CompilerOptions::default());
    assert!(result.succeeded());
}

#[test]
fn test_suppressed_entry_return_still_validates() {
    let program = input(vec![Statement::ret(Some(Expression::int(3)))]);
    let options = CompilerOptions { suppress_redundant_return: true, ..CompilerOptions::default() };
    let result = Compiler::compile(&program, options);

    assert!(result.succeeded());
    assert!(!result.ir_text.unwrap().contains("Return #0"));
}
