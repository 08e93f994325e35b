use super::*;
use crate::abi::Aapcs64;
use lark_common::Severity;
use lark_ir::{GlobalVar, ImmValue};
use pretty_assertions::assert_eq;

fn int(name: &str) -> Operand {
    Operand::temp(name, DataType::Int)
}

fn var(name: &str) -> Operand {
    Operand::var(name, DataType::Int)
}

fn main_with(body: Vec<Instruction>) -> IrFunction {
    let mut f = IrFunction::new("main", vec![], DataType::Int);
    f.push(Instruction::new(Opcode::FuncEnter).with_label("main"));
    for inst in body {
        f.push(inst);
    }
    f
}

fn compile_in(program: &IrProgram, function: &IrFunction) -> (Vec<String>, CodeGenerator) {
    let mut gen = CodeGenerator::new(Box::new(Aapcs64));
    let asm = gen.generate_function(function, program).unwrap();
    (asm.body.iter().map(|i| i.to_string()).collect(), gen)
}

fn compile(function: &IrFunction) -> (Vec<String>, CodeGenerator) {
    compile_in(&IrProgram::new(), function)
}

fn contains_run(lines: &[String], run: &[&str]) -> bool {
    lines.windows(run.len()).any(|w| w.iter().zip(run).all(|(a, b)| a == b))
}

#[test]
fn test_modulo_is_divide_multiply_subtract() {
    let f = main_with(vec![
        Instruction::binary(Opcode::Mod, int("t0"), Operand::int(7), Operand::int(3)),
        Instruction::print(false, int("t0")),
        Instruction::ret(Some(Operand::int(0))),
    ]);

    let (lines, _) = compile(&f);
    assert!(contains_run(
        &lines,
        &["mov x9, #7", "mov x10, #3", "sdiv x11, x9, x10", "mul x11, x11, x10", "sub x19, x9, x11"]
    ));
}

#[test]
fn test_call_sequence_in_non_leaf_function() {
    let a = Operand::param("a", DataType::Int);
    let b = Operand::param("b", DataType::Int);
    let mut f = IrFunction::new("f", vec![a.clone(), b], DataType::Int);
    f.push(Instruction::new(Opcode::FuncEnter).with_label("f"));
    f.push(Instruction::arg(a, 0));
    f.push(Instruction::arg(Operand::int(5), 1));
    f.push(Instruction::call("g", Some(int("t0"))));
    f.push(Instruction::ret(Some(int("t0"))));

    let (lines, _) = compile(&f);
    assert_eq!(
        lines,
        vec![
            "stp x29, x30, [sp, #-16]!",
            "mov x29, sp",
            "sub sp, sp, #16",
            "str x19, [sp]",
            "str x20, [sp, #8]",
            "mov x19, x0",
            "mov x0, x19",
            "mov x1, #5",
            "bl g",
            "mov x20, x0",
            "mov x0, x20",
            "ldr x19, [sp]",
            "ldr x20, [sp, #8]",
            "mov sp, x29",
            "ldp x29, x30, [sp], #16",
            "ret",
        ]
    );
}

#[test]
fn test_leaf_function_reads_arguments_in_place() {
    let a = Operand::param("a", DataType::Int);
    let b = Operand::param("b", DataType::Int);
    let mut f = IrFunction::new("add", vec![a.clone(), b.clone()], DataType::Int);
    f.push(Instruction::new(Opcode::FuncEnter).with_label("add"));
    f.push(Instruction::binary(Opcode::Add, int("t0"), a, b));
    f.push(Instruction::ret(Some(int("t0"))));

    let (lines, _) = compile(&f);
    assert!(lines.contains(&"add x19, x0, x1".to_string()));
    assert!(lines.contains(&"mov x0, x19".to_string()));
}

#[test]
fn test_ninth_argument_goes_on_the_stack() {
    let mut body: Vec<Instruction> = (0..9).map(|i| Instruction::arg(Operand::int(i as i64), i)).collect();
    body.push(Instruction::call("h", None));
    body.push(Instruction::ret(Some(Operand::int(0))));

    let (lines, _) = compile(&main_with(body));
    assert!(contains_run(&lines, &["sub sp, sp, #16", "mov x9, #8", "str x9, [sp]", "mov x0, #0"]));
    assert!(contains_run(&lines, &["mov x7, #7", "bl h", "add sp, sp, #16"]));
}

#[test]
fn test_epilogue_is_not_duplicated() {
    let mut void_fn = IrFunction::new("f", vec![], DataType::Void);
    void_fn.push(Instruction::new(Opcode::FuncEnter).with_label("f"));
    void_fn.push(Instruction::print(false, Operand::int(1)));
    void_fn.push(Instruction::new(Opcode::FuncExit).with_label("f"));

    let mut open_fn = IrFunction::new("g", vec![], DataType::Void);
    open_fn.push(Instruction::new(Opcode::FuncEnter).with_label("g"));
    open_fn.push(Instruction::print(false, Operand::int(1)));

    let twice = main_with(vec![
        Instruction::ret(Some(Operand::int(3))),
        Instruction::ret(Some(Operand::int(0))),
    ]);

    let rets = |f: &IrFunction| compile(f).0.iter().filter(|l| *l == "ret").count();
    assert_eq!(rets(&void_fn), 1);
    assert_eq!(rets(&open_fn), 1);
    assert_eq!(rets(&twice), 2);
    assert_eq!(compile(&open_fn).0.last().map(String::as_str), Some("ret"));
}

#[test]
fn test_large_immediates_are_materialized() {
    let f = main_with(vec![
        Instruction::load_imm(int("t0"), ImmValue::Int(0x1_2345_6789)),
        Instruction::binary(Opcode::Add, int("t1"), int("t0"), Operand::int(5000)),
        Instruction::binary(Opcode::Add, int("t2"), int("t1"), Operand::int(4096)),
        Instruction::print(false, int("t2")),
        Instruction::ret(Some(Operand::int(0))),
    ]);

    let (lines, _) = compile(&f);
    assert!(contains_run(
        &lines,
        &["movz x19, #0x6789", "movk x19, #0x2345, lsl #16", "movk x19, #0x1, lsl #32"]
    ));
    assert!(contains_run(&lines, &["mov x9, #5000", "add x20, x19, x9"]));
    assert!(lines.contains(&"add x21, x20, #1, lsl #12".to_string()));
}

#[test]
fn test_spilled_variable_is_reloaded_at_every_use() {
    let mut body: Vec<Instruction> = (0..11)
        .map(|i| Instruction::store(var(&format!("v{}", i)), Operand::int(i)))
        .collect();
    body.push(Instruction::print(false, var("v10")));
    body.push(Instruction::print(true, var("v10")));
    body.push(Instruction::ret(Some(Operand::int(0))));

    let (lines, _) = compile(&main_with(body));
    assert!(contains_run(&lines, &["mov x9, #10", "stur x9, [x29, #-8]"]));
    assert!(contains_run(&lines, &["ldur x0, [x29, #-8]", "bl lark_print_int"]));
    assert!(contains_run(&lines, &["ldur x0, [x29, #-8]", "bl lark_println_int"]));
}

#[test]
fn test_push_degrades_to_placeholder() {
    let f = main_with(vec![
        Instruction::new(Opcode::Push).with_src1(Operand::int(1)),
        Instruction::ret(Some(Operand::int(0))),
    ]);

    let (lines, gen) = compile(&f);
    assert!(lines.contains(&"// unimplemented: Push #1".to_string()));
    assert_eq!(lines.last().map(String::as_str), Some("ret"));
    assert_eq!(gen.diagnostics().len(), 1);
    assert_eq!(gen.diagnostics()[0].severity, Severity::Warning);
}

#[test]
fn test_division_by_literal_zero_is_flagged() {
    let f = main_with(vec![
        Instruction::binary(Opcode::Div, int("t0"), Operand::int(8), Operand::int(0)),
        Instruction::print(false, int("t0")),
        Instruction::ret(Some(Operand::int(0))),
    ]);

    let (lines, gen) = compile(&f);
    assert!(lines.contains(&"sdiv x19, x9, x10".to_string()));
    assert_eq!(gen.diagnostics().len(), 1);
    assert!(gen.diagnostics()[0].message.contains("division by literal zero"));
}

#[test]
fn test_float_comparison_uses_fcmp() {
    let f = main_with(vec![
        Instruction::binary(Opcode::Lt, Operand::temp("t0", DataType::Bool), Operand::float(1.5), Operand::float(2.5)),
        Instruction::print(false, Operand::temp("t0", DataType::Bool)),
        Instruction::ret(Some(Operand::int(0))),
    ]);

    let (lines, _) = compile(&f);
    assert!(contains_run(
        &lines,
        &["fmov d16, x9", "fmov d17, x10", "fcmp d16, d17", "cset x19, mi"]
    ));
    assert!(contains_run(&lines, &["mov x0, x19", "bl lark_print_bool"]));
}

#[test]
fn test_float_modulo_truncates() {
    let f = main_with(vec![
        Instruction::binary(Opcode::Mod, Operand::temp("t0", DataType::Float), Operand::float(7.5), Operand::float(2.0)),
        Instruction::print(false, Operand::temp("t0", DataType::Float)),
        Instruction::ret(Some(Operand::int(0))),
    ]);

    let (lines, _) = compile(&f);
    assert!(contains_run(
        &lines,
        &["fdiv d18, d16, d17", "frintz d18, d18", "fmsub d16, d18, d17, d16", "fmov x19, d16"]
    ));
    assert!(lines.contains(&"bl lark_print_float".to_string()));
}

#[test]
fn test_globals_are_addressed_through_x16() {
    let mut program = IrProgram::new();
    program.add_global(GlobalVar::scalar("g", DataType::Int));
    let g = Operand::global("g", DataType::Int);
    let f = main_with(vec![
        Instruction::store(g.clone(), Operand::int(7)),
        Instruction::load(int("t0"), g),
        Instruction::print(false, int("t0")),
        Instruction::ret(Some(Operand::int(0))),
    ]);

    let (lines, _) = compile_in(&program, &f);
    assert!(contains_run(
        &lines,
        &[
            "mov x9, #7",
            "adrp x16, lark_global_g",
            "add x16, x16, :lo12:lark_global_g",
            "str x9, [x16]",
            "adrp x16, lark_global_g",
            "add x16, x16, :lo12:lark_global_g",
            "ldr x19, [x16]",
        ]
    ));
}

#[test]
fn test_frame_array_element_access() {
    let f = main_with(vec![
        Instruction::alloc_array(var("a"), 4),
        Instruction::load_imm(int("t1"), ImmValue::Int(2)),
        Instruction::array_store(Operand::array_access("a", Operand::int(1), DataType::Int), Operand::int(9)),
        Instruction::array_load(int("t0"), Operand::array_access("a", int("t1"), DataType::Int)),
        Instruction::print(false, int("t0")),
        Instruction::ret(Some(Operand::int(0))),
    ]);

    let (lines, _) = compile(&f);
    assert!(contains_run(&lines, &["mov x9, #9", "stur x9, [x29, #-24]"]));
    assert!(contains_run(&lines, &["sub x16, x29, #32", "ldr x20, [x16, x19, lsl #3]"]));
    assert!(lines.contains(&"sub sp, sp, #48".to_string()));
}

#[test]
fn test_far_constant_index_goes_through_a_register() {
    let f = main_with(vec![
        Instruction::alloc_array(var("a"), 4),
        Instruction::array_load(int("t0"), Operand::array_access("a", Operand::int(1 << 32), DataType::Int)),
        Instruction::array_load(int("t1"), Operand::array_access("a", Operand::int(0), DataType::Int)),
        Instruction::array_load(int("t2"), Operand::array_access("a", Operand::int(1 << 29), DataType::Int)),
        Instruction::ret(Some(Operand::int(0))),
    ]);

    let (lines, _) = compile(&f);
    assert!(contains_run(
        &lines,
        &["mov x9, #4294967296", "sub x16, x29, #32", "ldr x19, [x16, x9, lsl #3]"]
    ));
    assert!(lines.contains(&"ldur x20, [x29, #-32]".to_string()));
    assert!(contains_run(
        &lines,
        &["mov x9, #536870912", "sub x16, x29, #32", "ldr x21, [x16, x9, lsl #3]"]
    ));
}

#[test]
fn test_oversized_array_is_reported() {
    let f = main_with(vec![Instruction::alloc_array(var("a"), 1 << 30), Instruction::ret(None)]);

    let mut gen = CodeGenerator::new(Box::new(Aapcs64));
    let err = gen.generate_function(&f, &IrProgram::new()).unwrap_err();
    assert!(matches!(err, CodegenError::FrameTooLarge { .. }));
}

#[test]
fn test_unary_and_conversion_sequences() {
    let f = main_with(vec![
        Instruction::unary(Opcode::Neg, int("t0"), Operand::int(5)),
        Instruction::unary(Opcode::Not, Operand::temp("t1", DataType::Bool), Operand::int(0)),
        Instruction::unary(Opcode::IntToFloat, Operand::temp("t2", DataType::Float), Operand::int(3)),
        Instruction::unary(Opcode::FloatToInt, int("t3"), Operand::float(2.5)),
        Instruction::unary(Opcode::Neg, Operand::temp("t4", DataType::Float), Operand::float(1.5)),
        Instruction::ret(Some(Operand::int(0))),
    ]);

    let (lines, _) = compile(&f);
    assert!(contains_run(&lines, &["mov x9, #5", "neg x19, x9"]));
    assert!(contains_run(&lines, &["mov x9, #0", "cmp x9, #0", "cset x20, eq"]));
    assert!(contains_run(&lines, &["mov x9, #3", "scvtf d16, x9", "fmov x21, d16"]));

    let two_and_a_half = format!("mov x9, #{}", 2.5f64.to_bits() as i64);
    assert!(contains_run(&lines, &[two_and_a_half.as_str(), "fmov d16, x9", "fcvtzs x22, d16"]));
    let one_and_a_half = format!("mov x9, #{}", 1.5f64.to_bits() as i64);
    assert!(contains_run(
        &lines,
        &[one_and_a_half.as_str(), "fmov d16, x9", "fneg d16, d16", "fmov x23, d16"]
    ));
}

#[test]
fn test_unknown_array_is_an_error() {
    let f = main_with(vec![Instruction::array_load(
        int("t0"),
        Operand::array_access("nowhere", Operand::int(0), DataType::Int),
    )]);

    let mut gen = CodeGenerator::new(Box::new(Aapcs64));
    let err = gen.generate_function(&f, &IrProgram::new()).unwrap_err();
    assert!(matches!(err, CodegenError::UnknownArray { .. }));
}

#[test]
fn test_program_sections() {
    let mut program = IrProgram::new();
    let id = program.intern_string("hi");
    program.add_global(GlobalVar::array("buf", DataType::Int, 3));
    program.add_function(main_with(vec![
        Instruction::load_addr(Operand::temp("t0", DataType::Str), Operand::string_ref(id)),
        Instruction::print(true, Operand::temp("t0", DataType::Str)),
        Instruction::ret(Some(Operand::int(0))),
    ]));

    let asm = CodeGenerator::new(Box::new(Aapcs64)).generate(&program).unwrap();
    assert_eq!(asm.strings, vec![(".Lstr0".to_string(), "hi".to_string())]);
    assert_eq!(asm.data, vec![DataObject { symbol: "lark_global_buf".to_string(), bytes: 24 }]);

    let text = asm.to_string();
    assert!(text.contains("    adrp x19, .Lstr0\n    add x19, x19, :lo12:.Lstr0\n"));
    assert!(text.contains("bl lark_println_str"));
}

#[test]
fn test_branches_use_local_labels() {
    let f = main_with(vec![
        Instruction::label("L0"),
        Instruction::jump_if(false, Operand::var("c", DataType::Bool), "L1"),
        Instruction::jump("L0"),
        Instruction::label("L1"),
        Instruction::ret(Some(Operand::int(0))),
    ]);

    let (lines, _) = compile(&f);
    assert!(contains_run(&lines, &[".L0:", "cbz x19, .L1", "b .L0", ".L1:"]));
}
