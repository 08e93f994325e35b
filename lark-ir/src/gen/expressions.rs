//! Expression lowering
//!
//! Every expression lowers to an operand: literals become immediates, local
//! names are used directly, and every computed value lands in a fresh
//! temporary.

use super::{Binding, IrGenerator};
use crate::ir::{Instruction, Opcode, Operand};
use lark_common::{CompilerError, DataType};
use lark_syntax::{BinaryOp, Expression, ExpressionKind, UnaryOp};
use log::debug;

fn binary_opcode(op: BinaryOp) -> Opcode {
    match op {
        BinaryOp::Add => Opcode::Add,
        BinaryOp::Sub => Opcode::Sub,
        BinaryOp::Mul => Opcode::Mul,
        BinaryOp::Div => Opcode::Div,
        BinaryOp::Mod => Opcode::Mod,
        BinaryOp::LogicalAnd => Opcode::And,
        BinaryOp::LogicalOr => Opcode::Or,
        BinaryOp::Equal => Opcode::Eq,
        BinaryOp::NotEqual => Opcode::Ne,
        BinaryOp::Less => Opcode::Lt,
        BinaryOp::Greater => Opcode::Gt,
        BinaryOp::LessEqual => Opcode::Le,
        BinaryOp::GreaterEqual => Opcode::Ge,
    }
}

impl IrGenerator<'_> {
    pub(super) fn lower_expression(&mut self, expr: &Expression) -> Result<Operand, CompilerError> {
        let line = expr.location.line;
        match &expr.kind {
            ExpressionKind::IntLiteral(value) => Ok(Operand::int(*value)),
            ExpressionKind::FloatLiteral(value) => Ok(Operand::float(*value)),
            ExpressionKind::BoolLiteral(value) => Ok(Operand::boolean(*value)),

            ExpressionKind::StringLiteral(text) => {
                let id = self.ctx.intern_string(text);
                let dest = self.ctx.new_temp(DataType::Str);
                self.emit(Instruction::load_addr(dest.clone(), Operand::string_ref(id)).at_line(line));
                Ok(dest)
            }

            ExpressionKind::Identifier(name) => match self.resolve(name) {
                Binding::Direct(operand) => Ok(operand),
                Binding::Global(global) => {
                    let dest = self.ctx.new_temp(global.data_type);
                    self.emit(Instruction::load(dest.clone(), global).at_line(line));
                    Ok(dest)
                }
                Binding::Array { name, element_type } => {
                    debug!("Array '{}' used as a scalar value", name);
                    Ok(Operand::var(name, element_type))
                }
            },

            ExpressionKind::Binary { op, left, right } => {
                let lhs = self.lower_expression(left)?;
                let rhs = self.lower_expression(right)?;
                self.lower_binary(*op, lhs, rhs, line)
            }

            ExpressionKind::Unary { op, operand } => {
                let value = self.lower_expression(operand)?;
                let (opcode, result_type) = match op {
                    UnaryOp::Minus => (Opcode::Neg, value.data_type),
                    UnaryOp::LogicalNot => (Opcode::Not, DataType::Bool),
                };
                let dest = self.ctx.new_temp(result_type);
                self.emit(Instruction::unary(opcode, dest.clone(), value).at_line(line));
                Ok(dest)
            }

            ExpressionKind::Call { function, arguments } => {
                let mut values = Vec::with_capacity(arguments.len());
                for arg in arguments {
                    values.push(self.lower_expression(arg)?);
                }
                for (position, value) in values.into_iter().enumerate() {
                    self.emit(Instruction::arg(value, position).at_line(line));
                }

                let return_type = self.callee_return_type(function);
                if return_type.is_void() {
                    self.emit(Instruction::call(function.as_str(), None).at_line(line));
                    Ok(Operand::int(0))
                } else {
                    let dest = self.ctx.new_temp(return_type);
                    self.emit(Instruction::call(function.as_str(), Some(dest.clone())).at_line(line));
                    Ok(dest)
                }
            }

            ExpressionKind::Index { array, index } => {
                let index = self.lower_expression(index)?;
                let element_type = self.element_type(array);
                let dest = self.ctx.new_temp(element_type);
                let element = Operand::array_access(array.as_str(), index, element_type);
                self.emit(Instruction::array_load(dest.clone(), element).at_line(line));
                Ok(dest)
            }

            ExpressionKind::Cast { target_type, operand } => {
                let value = self.lower_expression(operand)?;
                let opcode = match (value.data_type.is_float(), target_type.is_float()) {
                    (false, true) => Opcode::IntToFloat,
                    (true, false) => Opcode::FloatToInt,
                    _ => Opcode::Move,
                };
                let dest = self.ctx.new_temp(*target_type);
                self.emit(Instruction::unary(opcode, dest.clone(), value).at_line(line));
                Ok(dest)
            }
        }
    }

    fn lower_binary(&mut self, op: BinaryOp, lhs: Operand, rhs: Operand, line: u32) -> Result<Operand, CompilerError> {
        let opcode = binary_opcode(op);

        let (lhs, rhs, result_type) = if op.is_logical() {
            (lhs, rhs, DataType::Bool)
        } else {
            let (lhs, rhs) = if lhs.data_type.is_float() != rhs.data_type.is_float() {
                (self.promote_to_float(lhs, line), self.promote_to_float(rhs, line))
            } else {
                (lhs, rhs)
            };
            let result_type = if op.is_comparison() {
                DataType::Bool
            } else {
                DataType::arithmetic_result(lhs.data_type, rhs.data_type)
            };
            (lhs, rhs, result_type)
        };

        let dest = self.ctx.new_temp(result_type);
        self.emit(Instruction::binary(opcode, dest.clone(), lhs, rhs).at_line(line));
        Ok(dest)
    }

    /// Insert an `IntToFloat` unless the operand already is a float
    fn promote_to_float(&mut self, value: Operand, line: u32) -> Operand {
        if value.data_type.is_float() {
            return value;
        }
        let dest = self.ctx.new_temp(DataType::Float);
        self.emit(Instruction::unary(Opcode::IntToFloat, dest.clone(), value).at_line(line));
        dest
    }

    /// Widen an integer value stored into float storage
    pub(super) fn coerce(&mut self, value: Operand, target: DataType, line: u32) -> Operand {
        if !target.is_float() || value.data_type.is_float() || value.data_type.is_void() {
            return value;
        }
        match value.immediate() {
            Some(imm) => Operand::float(imm.as_float()),
            None => self.promote_to_float(value, line),
        }
    }
}
