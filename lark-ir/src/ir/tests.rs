use super::*;
use lark_common::DataType;
use pretty_assertions::assert_eq;

fn sample_function() -> IrFunction {
    let a = Operand::param("a", DataType::Int);
    let b = Operand::param("b", DataType::Int);
    let s = Operand::var("s", DataType::Int);
    let t0 = Operand::temp("t0", DataType::Int);

    let mut f = IrFunction::new("add", vec![a.clone(), b.clone()], DataType::Int);
    f.add_local(s.clone());
    f.add_local(s.clone());
    f.push(Instruction::new(Opcode::FuncEnter).with_label("add"));
    f.push(Instruction::binary(Opcode::Add, t0.clone(), a, b));
    f.push(Instruction::store(s.clone(), t0.clone()));
    f.push(Instruction::jump_if(false, t0, "L0"));
    f.push(Instruction::ret(Some(s)));
    f.push(Instruction::label("L0"));
    f.push(Instruction::ret(Some(Operand::int(0))).with_comment("fallthrough"));
    f
}

#[test]
fn test_program_render_is_stable() {
    let mut program = IrProgram::new();
    program.add_function(sample_function());
    program.add_global(GlobalVar::scalar("g", DataType::Int));
    program.add_global(GlobalVar::array("arr", DataType::Float, 4));
    program.add_global(GlobalVar::scalar("g", DataType::Int));
    program.intern_string("hi\n");

    let expected = "\
function add(%a: int, %b: int) -> int
  locals: s: int
    FuncEnter add
    t0 = Add %a, %b
    Store s, t0
    JumpIfFalse t0, L0
    Return s
L0:
    Return #0  ; fallthrough

globals:
  @g: int
  @arr: float[4]

strings:
  .str0 = \"hi\\n\"
";
    assert_eq!(program.to_string(), expected);
    assert_eq!(program.to_string(), program.clone().to_string());
}

#[test]
fn test_operand_rendering() {
    let idx = Operand::temp("t1", DataType::Int);
    assert_eq!(Operand::array_access("arr", idx, DataType::Int).to_string(), "arr[t1]");
    assert_eq!(Operand::float(2.5).to_string(), "#2.5");
    assert_eq!(Operand::float(3.0).to_string(), "#3.0");
    assert_eq!(Operand::boolean(true).to_string(), "#1");
    assert_eq!(Operand::global("g", DataType::Int).to_string(), "@g");
    assert_eq!(Operand::string_ref(2).to_string(), ".str2");
}

#[test]
fn test_string_table_deduplicates() {
    let mut table = StringTable::new();
    let first = table.intern("hello");
    let again = table.intern("hello");
    let other = table.intern("world");

    assert_eq!(first, 0);
    assert_eq!(again, first);
    assert_eq!(other, 1);
    assert_eq!(table.len(), 2);
    assert_eq!(table.get(1), Some("world"));
    assert_eq!(table.iter().map(|(_, s)| s).collect::<Vec<_>>(), vec!["hello", "world"]);
}

#[test]
fn test_array_store_uses_index_and_array() {
    let idx = Operand::var("i", DataType::Int);
    let inst = Instruction::array_store(
        Operand::array_access("arr", idx, DataType::Int),
        Operand::temp("t4", DataType::Int),
    );

    assert_eq!(inst.defined(), None);
    assert_eq!(
        inst.uses(),
        vec![
            Location::Temp("t4".to_string()),
            Location::Var("arr".to_string()),
            Location::Var("i".to_string()),
        ]
    );
}

#[test]
fn test_temp_and_var_with_same_spelling_are_distinct() {
    let temp = Operand::temp("t0", DataType::Int);
    let var = Operand::var("t0", DataType::Int);
    assert_ne!(temp.location(), var.location());
}

#[test]
fn test_leaf_detection() {
    let mut f = sample_function();
    assert!(f.is_leaf());
    f.push(Instruction::print(false, Operand::int(1)));
    assert!(!f.is_leaf());
}
