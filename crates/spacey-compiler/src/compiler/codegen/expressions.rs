// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Expression lowering.
//!
//! Every expression leaves exactly one value on the stack. References
//! (assignment targets, call receivers) occupy two cells until consumed.

use std::rc::Rc;

use tracing::warn;

use super::Compiler;
use crate::ast::*;
use crate::compiler::bytecode::{
    Address, Instruction, NAME_ENSURE, OpCode, Operand, REGEXP_GLOBAL, REGEXP_IGNORE_CASE,
    REGEXP_MULTILINE, RuntimeErrorCode,
};
use crate::error::{Result, index_u32};

impl Compiler {
    /// Lowers an expression, leaving its value on the stack.
    pub(super) fn compile_expression(&mut self, expr: &Expression) -> Result<()> {
        match expr {
            Expression::Literal(lit) => self.compile_literal(lit),
            Expression::Identifier(id) => self.emit_ident(OpCode::Ident, &id.name),
            Expression::This => self.emit_op(OpCode::This),
            Expression::Array(array) => self.compile_array(array),
            Expression::Object(object) => self.compile_object(object),
            Expression::Function(func) => self.compile_function_expression(func),
            Expression::Unary(unary) => self.compile_unary(unary),
            Expression::Update(update) => self.compile_update(update),
            Expression::Binary(binary) => self.compile_binary(binary),
            Expression::Assignment(assign) => self.compile_assignment(assign),
            Expression::Conditional(cond) => self.compile_conditional(cond),
            Expression::Call(call) => self.compile_call(call, true),
            Expression::New(new_expr) => self.compile_new(new_expr),
            Expression::Member(member) => self.compile_member(member),
            Expression::Sequence(seq) => self.compile_sequence(seq),
        }
    }

    /// Lowers an expression whose value the caller will discard.
    ///
    /// Returns `true` if nothing was left on the stack, which only happens
    /// for calls.
    pub(super) fn compile_expression_noret(&mut self, expr: &Expression) -> Result<bool> {
        match expr {
            Expression::Call(call) => {
                self.compile_call(call, false)?;
                Ok(true)
            }
            _ => {
                self.compile_expression(expr)?;
                Ok(false)
            }
        }
    }

    // ========================================================================
    // Literals
    // ========================================================================

    fn compile_literal(&mut self, lit: &Literal) -> Result<()> {
        match lit {
            Literal::Boolean(value) => self.emit_int(OpCode::Bool, i32::from(*value)),
            Literal::Integer(value) => self.emit_int(OpCode::Int, *value),
            Literal::Number(value) => {
                let id = self.code.constants.add_double(*value)?;
                self.emit(Instruction::with_operand(OpCode::Double, Operand::Double(id)))?;
                Ok(())
            }
            Literal::String(value) => {
                let id = self.code.constants.add_string(value)?;
                self.emit(Instruction::with_operand(OpCode::Str, Operand::Str(id)))?;
                Ok(())
            }
            Literal::Null => self.emit_op(OpCode::Null),
            Literal::RegExp { pattern, flags } => {
                let id = self.code.constants.add_string(pattern)?;
                self.emit(Instruction::with_operands(
                    OpCode::RegExp,
                    Operand::Str(id),
                    Operand::Uint(regexp_flag_bits(flags)),
                ))?;
                Ok(())
            }
        }
    }

    fn compile_array(&mut self, array: &ArrayExpression) -> Result<()> {
        for element in &array.elements {
            match element {
                Some(expr) => self.compile_expression(expr)?,
                None => self.emit_op(OpCode::Undefined)?,
            }
        }
        self.emit_uint(OpCode::NewArray, index_u32(array.elements.len())?)
    }

    fn compile_object(&mut self, object: &ObjectExpression) -> Result<()> {
        self.emit_op(OpCode::NewObject)?;

        for property in &object.properties {
            let id = match &property.key {
                PropertyKey::Identifier(id) => self.code.constants.intern(&id.name)?,
                PropertyKey::String(name) => self.code.constants.intern(name)?,
                PropertyKey::Integer(value) => self.code.constants.intern(&value.to_string())?,
                PropertyKey::Number(value) => {
                    self.code.constants.intern(&number_to_string(*value))?
                }
            };
            self.compile_expression(&property.value)?;
            self.emit(Instruction::with_operand(OpCode::ObjProp, Operand::Ident(id)))?;
        }

        Ok(())
    }

    fn compile_function_expression(&mut self, func: &FunctionRef) -> Result<()> {
        // Named function expressions are bound in scope when the enclosing
        // function is entered
        match &func.id {
            Some(id) => self.emit_ident(OpCode::Ident, &id.name),
            None => {
                self.emit(Instruction::with_operand(
                    OpCode::Func,
                    Operand::Func(Rc::clone(func)),
                ))?;
                Ok(())
            }
        }
    }

    // ========================================================================
    // Operators
    // ========================================================================

    fn compile_unary(&mut self, unary: &UnaryExpression) -> Result<()> {
        let opcode = match unary.operator {
            UnaryOperator::Typeof => return self.compile_typeof(&unary.argument),
            UnaryOperator::Delete => return self.compile_delete(&unary.argument),
            UnaryOperator::Minus => OpCode::Minus,
            UnaryOperator::Plus => OpCode::ToNumber,
            UnaryOperator::LogicalNot => OpCode::Not,
            UnaryOperator::BitwiseNot => OpCode::BitNot,
            UnaryOperator::Void => OpCode::Void,
        };
        self.compile_expression(&unary.argument)?;
        self.emit_op(opcode)
    }

    fn compile_typeof(&mut self, argument: &Expression) -> Result<()> {
        match argument.as_reference() {
            Some(Reference::Identifier(id)) => self.emit_ident(OpCode::TypeOfIdent, &id.name),
            Some(reference) => {
                self.compile_reference(reference, 0)?;
                self.emit_op(OpCode::TypeOfRef)
            }
            None => {
                self.compile_expression(argument)?;
                self.emit_op(OpCode::TypeOf)
            }
        }
    }

    fn compile_delete(&mut self, argument: &Expression) -> Result<()> {
        match argument {
            Expression::Member(member) => {
                self.compile_expression(&member.object)?;
                match &member.property {
                    MemberProperty::Expression(key) => self.compile_expression(key)?,
                    MemberProperty::Identifier(name) => {
                        let id = self.code.constants.add_string(&name.name)?;
                        self.emit(Instruction::with_operand(OpCode::Str, Operand::Str(id)))?;
                    }
                }
                self.emit_op(OpCode::Delete)
            }
            Expression::Identifier(id) => self.emit_ident(OpCode::DeleteIdent, &id.name),
            _ => {
                self.compile_expression(argument)?;
                let message = self
                    .code
                    .constants
                    .add_string("Cannot delete this expression")?;
                self.emit(Instruction::with_operands(
                    OpCode::ThrowType,
                    Operand::Uint(RuntimeErrorCode::InvalidDelete as u32),
                    Operand::Str(message),
                ))?;
                Ok(())
            }
        }
    }

    fn compile_update(&mut self, update: &UpdateExpression) -> Result<()> {
        let opcode = if update.prefix {
            OpCode::PreInc
        } else {
            OpCode::PostInc
        };
        let delta = match update.operator {
            UpdateOperator::Increment => 1,
            UpdateOperator::Decrement => -1,
        };

        match update.argument.as_reference() {
            Some(reference) => {
                self.compile_reference(reference, NAME_ENSURE)?;
                self.emit_int(opcode, delta)
            }
            None => {
                self.compile_expression(&update.argument)?;
                self.emit_uint(OpCode::ThrowRef, RuntimeErrorCode::IllegalAssignment as u32)
            }
        }
    }

    fn compile_binary(&mut self, binary: &BinaryExpression) -> Result<()> {
        let Some(opcode) = binary_opcode(binary.operator) else {
            return self.compile_logical(binary);
        };
        self.compile_expression(&binary.left)?;
        self.compile_expression(&binary.right)?;
        self.emit_op(opcode)
    }

    /// `a && b` / `a || b`: the left value is kept if it decides the result.
    fn compile_logical(&mut self, binary: &BinaryExpression) -> Result<()> {
        let opcode = if binary.operator == BinaryOperator::LogicalAnd {
            OpCode::CndZ
        } else {
            OpCode::CndNz
        };
        self.compile_expression(&binary.left)?;
        let jump = self.emit_jump(opcode, Address::PENDING)?;
        self.compile_expression(&binary.right)?;
        self.patch_here(jump);
        Ok(())
    }

    fn compile_conditional(&mut self, cond: &ConditionalExpression) -> Result<()> {
        self.compile_expression(&cond.test)?;
        let jump_else = self.emit_jump(OpCode::CndZ, Address::PENDING)?;

        self.compile_expression(&cond.consequent)?;
        let jump_end = self.emit_jump(OpCode::Jmp, Address::PENDING)?;

        // The falsy test value is still on the stack here
        self.patch_here(jump_else);
        self.emit_op(OpCode::Pop)?;
        self.compile_expression(&cond.alternate)?;

        self.patch_here(jump_end);
        Ok(())
    }

    fn compile_assignment(&mut self, assign: &AssignmentExpression) -> Result<()> {
        let operator = assign.operator.binary().and_then(binary_opcode);

        let Some(reference) = assign.left.as_reference() else {
            self.compile_expression(&assign.left)?;
            self.compile_expression(&assign.right)?;
            if let Some(opcode) = operator {
                self.emit_op(opcode)?;
            }
            return self.emit_uint(OpCode::ThrowRef, RuntimeErrorCode::IllegalAssignment as u32);
        };

        self.compile_reference(reference, NAME_ENSURE)?;
        if operator.is_some() {
            self.emit_op(OpCode::RefValue)?;
        }
        self.compile_expression(&assign.right)?;
        if let Some(opcode) = operator {
            self.emit_op(opcode)?;
        }
        self.emit_op(OpCode::Assign)
    }

    fn compile_sequence(&mut self, seq: &SequenceExpression) -> Result<()> {
        let Some((last, init)) = seq.expressions.split_last() else {
            return self.emit_op(OpCode::Undefined);
        };
        for expr in init {
            self.compile_expression(expr)?;
            self.emit_op(OpCode::Pop)?;
        }
        self.compile_expression(last)
    }

    // ========================================================================
    // Members, references and calls
    // ========================================================================

    fn compile_member(&mut self, member: &MemberExpression) -> Result<()> {
        self.compile_expression(&member.object)?;
        match &member.property {
            MemberProperty::Identifier(name) => self.emit_ident(OpCode::Member, &name.name),
            MemberProperty::Expression(key) => {
                self.compile_expression(key)?;
                self.emit_op(OpCode::Index)
            }
        }
    }

    /// Pushes a two-cell reference to a storage location.
    pub(super) fn compile_reference(&mut self, reference: Reference<'_>, flags: u32) -> Result<()> {
        match reference {
            Reference::Identifier(id) => self.emit_ident_uint(OpCode::IdentRef, &id.name, flags),
            Reference::Member(member) => {
                self.compile_expression(&member.object)?;
                match &member.property {
                    MemberProperty::Identifier(name) => {
                        self.emit_ident_uint(OpCode::PropRef, &name.name, flags)
                    }
                    MemberProperty::Expression(key) => {
                        self.compile_expression(key)?;
                        self.emit_uint(OpCode::MemberRef, flags)
                    }
                }
            }
        }
    }

    fn compile_call(&mut self, call: &CallExpression, want_ret: bool) -> Result<()> {
        let opcode = match call.callee.as_reference() {
            Some(reference) => {
                self.compile_reference(reference, 0)?;
                OpCode::CallMember
            }
            None => {
                self.compile_expression(&call.callee)?;
                OpCode::Call
            }
        };

        for argument in &call.arguments {
            self.compile_expression(argument)?;
        }

        self.emit(Instruction::with_operands(
            opcode,
            Operand::Uint(index_u32(call.arguments.len())?),
            Operand::Int(i32::from(want_ret)),
        ))?;
        Ok(())
    }

    fn compile_new(&mut self, new_expr: &NewExpression) -> Result<()> {
        self.compile_expression(&new_expr.callee)?;
        for argument in &new_expr.arguments {
            self.compile_expression(argument)?;
        }
        self.emit_uint(OpCode::New, index_u32(new_expr.arguments.len())?)
    }
}

/// Opcode for a binary operator, `None` for the short-circuit ones.
fn binary_opcode(operator: BinaryOperator) -> Option<OpCode> {
    let opcode = match operator {
        BinaryOperator::Add => OpCode::Add,
        BinaryOperator::Subtract => OpCode::Sub,
        BinaryOperator::Multiply => OpCode::Mul,
        BinaryOperator::Divide => OpCode::Div,
        BinaryOperator::Modulo => OpCode::Mod,
        BinaryOperator::Equal => OpCode::Eq,
        BinaryOperator::NotEqual => OpCode::Ne,
        BinaryOperator::StrictEqual => OpCode::StrictEq,
        BinaryOperator::StrictNotEqual => OpCode::StrictNe,
        BinaryOperator::LessThan => OpCode::Lt,
        BinaryOperator::LessThanEqual => OpCode::Le,
        BinaryOperator::GreaterThan => OpCode::Gt,
        BinaryOperator::GreaterThanEqual => OpCode::Ge,
        BinaryOperator::BitwiseAnd => OpCode::BitAnd,
        BinaryOperator::BitwiseOr => OpCode::BitOr,
        BinaryOperator::BitwiseXor => OpCode::BitXor,
        BinaryOperator::LeftShift => OpCode::Shl,
        BinaryOperator::RightShift => OpCode::Shr,
        BinaryOperator::UnsignedRightShift => OpCode::Ushr,
        BinaryOperator::In => OpCode::In,
        BinaryOperator::Instanceof => OpCode::InstanceOf,
        BinaryOperator::LogicalAnd | BinaryOperator::LogicalOr => return None,
    };
    Some(opcode)
}

fn regexp_flag_bits(flags: &str) -> u32 {
    flags.chars().fold(0, |bits, flag| match flag {
        'i' => bits | REGEXP_IGNORE_CASE,
        'g' => bits | REGEXP_GLOBAL,
        'm' => bits | REGEXP_MULTILINE,
        other => {
            warn!(flag = %other, "ignoring unsupported regular expression flag");
            bits
        }
    })
}

/// Formats a number the way `ToString` does, for numeric property names.
pub(crate) fn number_to_string(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }

    let sign = if value < 0.0 { "-" } else { "" };
    // Shortest round-trip digits, e.g. "1.2345e3"
    let scientific = format!("{:e}", value.abs());
    let (mantissa, exponent) = scientific.split_once('e').unwrap_or((scientific.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();

    let k = digits.len() as i32;
    let n = exponent + 1;
    let body = if k <= n && n <= 21 {
        format!("{digits}{}", "0".repeat((n - k) as usize))
    } else if 0 < n && n <= 21 {
        let (int_part, frac_part) = digits.split_at(n as usize);
        format!("{int_part}.{frac_part}")
    } else if -6 < n && n <= 0 {
        format!("0.{}{digits}", "0".repeat(n.unsigned_abs() as usize))
    } else {
        let e = n - 1;
        let e_sign = if e < 0 { '-' } else { '+' };
        let (first, rest) = digits.split_at(1);
        if rest.is_empty() {
            format!("{first}e{e_sign}{}", e.unsigned_abs())
        } else {
            format!("{first}.{rest}e{e_sign}{}", e.unsigned_abs())
        }
    };

    format!("{sign}{body}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_to_string_integers() {
        assert_eq!(number_to_string(100.0), "100");
        assert_eq!(number_to_string(-7.0), "-7");
        assert_eq!(number_to_string(0.0), "0");
        assert_eq!(number_to_string(-0.0), "0");
    }

    #[test]
    fn test_number_to_string_fractions() {
        assert_eq!(number_to_string(1.5), "1.5");
        assert_eq!(number_to_string(123.456), "123.456");
        assert_eq!(number_to_string(0.000001), "0.000001");
        assert_eq!(number_to_string(-2.5), "-2.5");
    }

    #[test]
    fn test_number_to_string_exponents() {
        assert_eq!(number_to_string(1e21), "1e+21");
        assert_eq!(number_to_string(1.5e300), "1.5e+300");
        assert_eq!(number_to_string(1e-7), "1e-7");
        assert_eq!(number_to_string(1e20), "100000000000000000000");
    }

    #[test]
    fn test_number_to_string_specials() {
        assert_eq!(number_to_string(f64::NAN), "NaN");
        assert_eq!(number_to_string(f64::INFINITY), "Infinity");
        assert_eq!(number_to_string(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn test_regexp_flags() {
        assert_eq!(regexp_flag_bits(""), 0);
        assert_eq!(
            regexp_flag_bits("gim"),
            REGEXP_GLOBAL | REGEXP_IGNORE_CASE | REGEXP_MULTILINE
        );
        assert_eq!(regexp_flag_bits("gy"), REGEXP_GLOBAL);
    }
}
