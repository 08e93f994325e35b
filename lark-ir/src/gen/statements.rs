//! Statement lowering

use super::{Binding, IrGenerator};
use crate::ir::{Instruction, Operand};
use lark_common::{CompilerError, DataType};
use lark_syntax::{Expression, Statement, StatementKind};
use log::debug;

impl IrGenerator<'_> {
    /// Lower a top-level statement of the entry function
    ///
    /// Declarations of promoted globals initialize program storage instead of
    /// binding a local.
    pub(super) fn lower_entry_statement(&mut self, stmt: &Statement) -> Result<(), CompilerError> {
        let line = stmt.location.line;
        match &stmt.kind {
            StatementKind::VarDecl { name, data_type, initializer } if self.global_named(name).is_some() => {
                let value = match initializer {
                    Some(init) => self.lower_expression(init)?,
                    None => Operand::zero(*data_type),
                };
                let value = self.coerce(value, *data_type, line);
                self.emit(Instruction::store(Operand::global(name.as_str(), *data_type), value).at_line(line));
                Ok(())
            }
            StatementKind::ArrayDecl { name, element_type, elements, .. } if self.global_named(name).is_some() => {
                self.store_elements(name, *element_type, elements, line)
            }
            _ => self.lower_statement(stmt),
        }
    }

    pub(super) fn lower_statement(&mut self, stmt: &Statement) -> Result<(), CompilerError> {
        let line = stmt.location.line;
        match &stmt.kind {
            StatementKind::VarDecl { name, data_type, initializer } => {
                let value = match initializer {
                    Some(init) => self.lower_expression(init)?,
                    None => Operand::zero(*data_type),
                };
                let var = Operand::var(name.as_str(), *data_type);
                self.add_local(var.clone());
                self.bind(name, Binding::Direct(var.clone()));
                let value = self.coerce(value, *data_type, line);
                self.emit(Instruction::store(var, value).at_line(line));
            }

            StatementKind::ArrayDecl { name, element_type, size, elements } => {
                let array = Operand::var(name.as_str(), *element_type);
                self.add_local(array.clone());
                self.bind(name, Binding::Array { name: name.clone(), element_type: *element_type });
                self.emit(Instruction::alloc_array(array, *size).at_line(line));
                self.store_elements(name, *element_type, elements, line)?;
            }

            StatementKind::Assign { name, value } => {
                let value = self.lower_expression(value)?;
                match self.resolve(name) {
                    Binding::Direct(target) | Binding::Global(target) => {
                        let value = self.coerce(value, target.data_type, line);
                        self.emit(Instruction::store(target, value).at_line(line));
                    }
                    Binding::Array { .. } => {
                        return Err(CompilerError::codegen_error(
                            format!("cannot assign to array '{}' as a whole", name),
                            stmt.location,
                        ));
                    }
                }
            }

            StatementKind::IndexAssign { array, index, value } => {
                let index = self.lower_expression(index)?;
                let value = self.lower_expression(value)?;
                let element_type = self.element_type(array);
                let value = self.coerce(value, element_type, line);
                let element = Operand::array_access(array.as_str(), index, element_type);
                self.emit(Instruction::array_store(element, value).at_line(line));
            }

            StatementKind::If { condition, then_branch, else_branch } => {
                self.lower_if(condition, then_branch, else_branch.as_deref(), line)?;
            }

            StatementKind::While { condition, body } => {
                self.lower_while(condition, body, line)?;
            }

            StatementKind::For { init, condition, update, body } => {
                self.lower_for(init.as_deref(), condition.as_ref(), update.as_deref(), body, line)?;
            }

            StatementKind::Block(body) => {
                for stmt in body {
                    self.lower_statement(stmt)?;
                }
            }

            StatementKind::FunctionDecl { name, .. } => {
                debug!("Ignoring nested declaration of function '{}'", name);
            }

            StatementKind::Return(value) => {
                let value = match value {
                    Some(expr) => {
                        let operand = self.lower_expression(expr)?;
                        let return_type = self.current_return_type();
                        Some(self.coerce(operand, return_type, line))
                    }
                    None => None,
                };
                self.emit(Instruction::ret(value).at_line(line));
            }

            StatementKind::Print(value) => {
                let value = self.lower_expression(value)?;
                self.emit(Instruction::print(false, value).at_line(line));
            }

            StatementKind::Println(value) => {
                let value = self.lower_expression(value)?;
                self.emit(Instruction::print(true, value).at_line(line));
            }

            StatementKind::Expression(expr) => {
                self.lower_expression(expr)?;
            }

            StatementKind::Break => {
                let target = self.ctx.break_target().map(str::to_string).ok_or_else(|| {
                    CompilerError::codegen_error("break outside of loop".to_string(), stmt.location)
                })?;
                self.emit(Instruction::jump(target).at_line(line));
            }

            StatementKind::Continue => {
                let target = self.ctx.continue_target().map(str::to_string).ok_or_else(|| {
                    CompilerError::codegen_error("continue outside of loop".to_string(), stmt.location)
                })?;
                self.emit(Instruction::jump(target).at_line(line));
            }
        }
        Ok(())
    }

    /// `ArrayStore name[#i], e_i` for each initializer element
    fn store_elements(
        &mut self,
        name: &str,
        element_type: DataType,
        elements: &[Expression],
        line: u32,
    ) -> Result<(), CompilerError> {
        for (i, element) in elements.iter().enumerate() {
            let value = self.lower_expression(element)?;
            let value = self.coerce(value, element_type, line);
            let slot = Operand::array_access(name, Operand::int(i as i64), element_type);
            self.emit(Instruction::array_store(slot, value).at_line(line));
        }
        Ok(())
    }

    fn lower_if(
        &mut self,
        condition: &Expression,
        then_branch: &[Statement],
        else_branch: Option<&[Statement]>,
        line: u32,
    ) -> Result<(), CompilerError> {
        let cond = self.lower_expression(condition)?;

        match else_branch {
            Some(else_branch) => {
                let else_label = self.ctx.new_label();
                let end_label = self.ctx.new_label();
                self.emit(Instruction::jump_if(false, cond, else_label.as_str()).at_line(line));
                for stmt in then_branch {
                    self.lower_statement(stmt)?;
                }
                self.emit(Instruction::jump(end_label.as_str()));
                self.emit(Instruction::label(else_label));
                for stmt in else_branch {
                    self.lower_statement(stmt)?;
                }
                self.emit(Instruction::label(end_label));
            }
            None => {
                let end_label = self.ctx.new_label();
                self.emit(Instruction::jump_if(false, cond, end_label.as_str()).at_line(line));
                for stmt in then_branch {
                    self.lower_statement(stmt)?;
                }
                self.emit(Instruction::label(end_label));
            }
        }
        Ok(())
    }

    fn lower_while(&mut self, condition: &Expression, body: &[Statement], line: u32) -> Result<(), CompilerError> {
        let start_label = self.ctx.new_label();
        let end_label = self.ctx.new_label();

        self.emit(Instruction::label(start_label.as_str()));
        let cond = self.lower_expression(condition)?;
        self.emit(Instruction::jump_if(false, cond, end_label.as_str()).at_line(line));

        self.ctx.enter_loop(&start_label, &end_label);
        let result = body.iter().try_for_each(|stmt| self.lower_statement(stmt));
        self.ctx.exit_loop();
        result?;

        self.emit(Instruction::jump(start_label));
        self.emit(Instruction::label(end_label));
        Ok(())
    }

    fn lower_for(
        &mut self,
        init: Option<&Statement>,
        condition: Option<&Expression>,
        update: Option<&Statement>,
        body: &[Statement],
        line: u32,
    ) -> Result<(), CompilerError> {
        if let Some(init) = init {
            self.lower_statement(init)?;
        }

        let start_label = self.ctx.new_label();
        let update_label = self.ctx.new_label();
        let end_label = self.ctx.new_label();

        self.emit(Instruction::label(start_label.as_str()));
        if let Some(condition) = condition {
            let cond = self.lower_expression(condition)?;
            self.emit(Instruction::jump_if(false, cond, end_label.as_str()).at_line(line));
        }

        self.ctx.enter_loop(&update_label, &end_label);
        let result = body.iter().try_for_each(|stmt| self.lower_statement(stmt));
        self.ctx.exit_loop();
        result?;

        self.emit(Instruction::label(update_label));
        if let Some(update) = update {
            self.lower_statement(update)?;
        }
        self.emit(Instruction::jump(start_label));
        self.emit(Instruction::label(end_label));
        Ok(())
    }

    fn current_return_type(&self) -> DataType {
        self.current.as_ref().map(|s| s.function.return_type).unwrap_or(DataType::Int)
    }

    /// Element type of an array name
    pub(super) fn element_type(&self, array: &str) -> DataType {
        match self.resolve(array) {
            Binding::Array { element_type, .. } => element_type,
            Binding::Direct(op) | Binding::Global(op) => {
                debug!("'{}' is indexed but not known as an array", array);
                op.data_type
            }
        }
    }
}
