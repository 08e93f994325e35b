//! Constant folding
//!
//! Integer arithmetic wraps like the target's 64-bit registers and division
//! truncates like `sdiv`. Float arithmetic is IEEE binary64. Division or
//! remainder by a literal zero is left in place and reported.

use super::{OptContext, Pass};
use crate::ir::{ImmValue, Instruction, IrFunction, Opcode};
use lark_common::DataType;

pub struct ConstantFolding;

fn fold_binary(opcode: Opcode, a: ImmValue, b: ImmValue) -> Option<ImmValue> {
    use ImmValue::{Float, Int};

    if matches!(a, Float(_)) || matches!(b, Float(_)) {
        let (x, y) = (a.as_float(), b.as_float());
        let value = match opcode {
            Opcode::Add => Float(x + y),
            Opcode::Sub => Float(x - y),
            Opcode::Mul => Float(x * y),
            Opcode::Div => Float(x / y),
            Opcode::Mod => Float(x % y),
            Opcode::Eq => Int((x == y) as i64),
            Opcode::Ne => Int((x != y) as i64),
            Opcode::Lt => Int((x < y) as i64),
            Opcode::Le => Int((x <= y) as i64),
            Opcode::Gt => Int((x > y) as i64),
            Opcode::Ge => Int((x >= y) as i64),
            _ => return None,
        };
        return Some(value);
    }

    let (x, y) = (a.as_int(), b.as_int());
    let value = match opcode {
        Opcode::Add => x.wrapping_add(y),
        Opcode::Sub => x.wrapping_sub(y),
        Opcode::Mul => x.wrapping_mul(y),
        Opcode::Div => x.wrapping_div(y),
        Opcode::Mod => x.wrapping_rem(y),
        Opcode::And => x & y,
        Opcode::Or => x | y,
        Opcode::Eq => (x == y) as i64,
        Opcode::Ne => (x != y) as i64,
        Opcode::Lt => (x < y) as i64,
        Opcode::Le => (x <= y) as i64,
        Opcode::Gt => (x > y) as i64,
        Opcode::Ge => (x >= y) as i64,
        _ => return None,
    };
    Some(Int(value))
}

fn fold_unary(opcode: Opcode, a: ImmValue) -> Option<ImmValue> {
    match opcode {
        Opcode::Move => Some(a),
        Opcode::IntToFloat => Some(ImmValue::Float(a.as_float())),
        Opcode::FloatToInt => Some(ImmValue::Int(a.as_float() as i64)),
        Opcode::Neg => Some(match a {
            ImmValue::Int(v) => ImmValue::Int(v.wrapping_neg()),
            ImmValue::Float(f) => ImmValue::Float(-f),
        }),
        Opcode::Not => Some(ImmValue::Int(a.is_zero() as i64)),
        _ => None,
    }
}

/// Represent `value` the way a destination of type `ty` holds it
fn fit(value: ImmValue, ty: DataType) -> ImmValue {
    match (value, ty) {
        (ImmValue::Int(v), DataType::Float) => ImmValue::Float(v as f64),
        (ImmValue::Float(f), ty) if !ty.is_float() => ImmValue::Int(f as i64),
        (value, _) => value,
    }
}

impl Pass for ConstantFolding {
    fn name(&self) -> &'static str {
        "constant-folding"
    }

    fn run(&mut self, function: &mut IrFunction, ctx: &mut OptContext) -> bool {
        let name = &function.name;
        let mut changed = false;

        for inst in function.instructions.iter_mut() {
            if !inst.opcode.is_pure() {
                continue;
            }
            let Some(a) = inst.src1.as_ref().and_then(|s| s.immediate()) else {
                continue;
            };

            let folded = if inst.opcode.is_binary() {
                let Some(b) = inst.src2.as_ref().and_then(|s| s.immediate()) else {
                    continue;
                };
                if matches!(inst.opcode, Opcode::Div | Opcode::Mod) && b.is_zero() {
                    let what = if inst.opcode == Opcode::Div { "division" } else { "remainder" };
                    ctx.warn_once(
                        name,
                        inst,
                        format!("{} by zero in '{}' is left unfolded", what, name),
                    );
                    continue;
                }
                fold_binary(inst.opcode, a, b)
            } else {
                fold_unary(inst.opcode, a)
            };

            if let (Some(value), Some(dest)) = (folded, inst.dest.clone()) {
                let value = fit(value, dest.data_type);
                let mut replacement = Instruction::load_imm(dest, value).at_line(inst.source_line);
                replacement.comment = inst.comment.take();
                *inst = replacement;
                changed = true;
            }
        }
        changed
    }
}
