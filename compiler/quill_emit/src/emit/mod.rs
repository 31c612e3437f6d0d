//! Expression emission.
//!
//! Every expression emits in one of two modes. In [`StackSemantics::Value`]
//! it leaves exactly one value on the stack; in [`StackSemantics::Effect`]
//! it leaves the stack as it found it. Nodes without a cheaper effect-only
//! form emit their value and pop it.

mod branch;
mod symbol;

use quill_diagnostic::placeholder_outside_partial_application;
use quill_ir::{Access, BinaryOp, CallKind, Constant, Instruction, LiteralType, Position};

use crate::ast::{Expr, ExprKind, StackSemantics, TypeExpr};
use crate::stmt::emit_block;
use crate::{ensure_sufficient_stack, partial, CompileContext, InternalError};

pub(crate) use symbol::emit_symbol;

impl Expr {
    /// Emit this expression.
    ///
    /// A node that can be partially applied and holds a placeholder lowers
    /// to a partial application instead; in effect mode it emits nothing.
    pub fn emit(
        &mut self,
        cx: &mut CompileContext<'_>,
        semantics: StackSemantics,
    ) -> Result<(), InternalError> {
        ensure_sufficient_stack(|| {
            if self.is_partially_applicable() && self.check_for_placeholders() {
                return match semantics {
                    StackSemantics::Value => partial::emit_partial_application(self, cx),
                    StackSemantics::Effect => Ok(()),
                };
            }
            match semantics {
                StackSemantics::Value => emit_value(self, cx),
                StackSemantics::Effect => emit_effect(self, cx),
            }
        })
    }

    /// Jump to `true_label` if this expression is truthy and to
    /// `false_label` otherwise. Control never falls through.
    pub fn emit_condition(
        &mut self,
        cx: &mut CompileContext<'_>,
        true_label: &str,
        false_label: &str,
    ) -> Result<(), InternalError> {
        let position = self.position.clone();
        branch::branch_if_false(self, cx, false_label)?;
        cx.target.emit_jump(&position, true_label);
        Ok(())
    }
}

pub(crate) use branch::{branch_if_false, branch_if_true};

fn emit_all(exprs: &mut [Expr], cx: &mut CompileContext<'_>, semantics: StackSemantics) -> Result<(), InternalError> {
    for expr in exprs {
        expr.emit(cx, semantics)?;
    }
    Ok(())
}

/// Finish a call-like instruction whose operands are already on the stack.
///
/// An assignment in value position keeps a copy of the assigned value
/// beneath the operands before the call consumes them.
pub(crate) fn finish_call(
    cx: &mut CompileContext<'_>,
    position: &Position,
    access: Access,
    operands: usize,
    semantics: StackSemantics,
    instruction: impl FnOnce(bool) -> Instruction,
) {
    match (access, semantics) {
        (Access::Set, StackSemantics::Value) => {
            cx.target.emit(position, Instruction::Duplicate(1));
            cx.target.emit(
                position,
                Instruction::Rotate {
                    rotations: 1,
                    values: operands + 1,
                },
            );
            cx.target.emit(position, instruction(true));
        }
        (_, StackSemantics::Value) => cx.target.emit(position, instruction(false)),
        (_, StackSemantics::Effect) => cx.target.emit(position, instruction(true)),
    }
}

fn emit_effect(expr: &mut Expr, cx: &mut CompileContext<'_>) -> Result<(), InternalError> {
    let position = expr.position.clone();
    match &mut expr.kind {
        ExprKind::Constant(_)
        | ExprKind::CreateClosure { .. }
        | ExprKind::Exception
        | ExprKind::Type(TypeExpr::Literal(_)) => Ok(()),
        ExprKind::Placeholder { .. } => {
            cx.report(placeholder_outside_partial_application(position));
            Ok(())
        }
        ExprKind::Identifier {
            name,
            access,
            arguments,
        } => {
            let symbol = cx.resolve_or_report(name, &position);
            emit_symbol(cx, &position, *access, &symbol, arguments, StackSemantics::Effect)
        }
        ExprKind::Symbol {
            access,
            symbol,
            arguments,
        } => emit_symbol(cx, &position, *access, symbol, arguments, StackSemantics::Effect),
        ExprKind::LogicalAnd(operands) | ExprKind::LogicalOr(operands) if operands.is_empty() => Ok(()),
        ExprKind::LogicalAnd(_) | ExprKind::LogicalOr(_) => {
            let end = cx.fresh_label("logic\\end");
            branch_if_false(expr, cx, &end)?;
            cx.target.emit_label(&position, &end);
            cx.target.free_label(&end);
            Ok(())
        }
        ExprKind::Conditional {
            condition,
            then,
            otherwise,
            negative,
        } => emit_conditional(cx, &position, condition, then, otherwise, *negative, StackSemantics::Effect),
        ExprKind::List(elements) => emit_all(elements, cx, StackSemantics::Effect),
        ExprKind::Hash(pairs) => {
            for (key, value) in pairs {
                key.emit(cx, StackSemantics::Effect)?;
                value.emit(cx, StackSemantics::Effect)?;
            }
            Ok(())
        }
        ExprKind::IndirectCall {
            subject,
            access,
            arguments,
        } => {
            subject.emit(cx, StackSemantics::Value)?;
            emit_all(arguments.as_mut_slice(), cx, StackSemantics::Value)?;
            let n = arguments.len();
            finish_call(cx, &position, *access, n + 1, StackSemantics::Effect, |just_effect| {
                Instruction::Call {
                    kind: CallKind::Indirect,
                    arguments: n,
                    just_effect,
                }
            });
            Ok(())
        }
        ExprKind::MemberCall {
            subject,
            member,
            access,
            arguments,
        } => {
            subject.emit(cx, StackSemantics::Value)?;
            emit_all(arguments.as_mut_slice(), cx, StackSemantics::Value)?;
            let n = arguments.len();
            let member = member.clone();
            let access = *access;
            finish_call(cx, &position, access, n + 1, StackSemantics::Effect, |just_effect| {
                Instruction::Member {
                    member,
                    access,
                    arguments: n,
                    just_effect,
                }
            });
            Ok(())
        }
        ExprKind::StaticCall {
            type_name,
            member,
            access,
            arguments,
        } => {
            emit_all(arguments.as_mut_slice(), cx, StackSemantics::Value)?;
            let n = arguments.len();
            let (type_name, member, access) = (type_name.clone(), member.clone(), *access);
            finish_call(cx, &position, access, n, StackSemantics::Effect, |just_effect| {
                Instruction::Static {
                    type_name,
                    member,
                    access,
                    arguments: n,
                    just_effect,
                }
            });
            Ok(())
        }
        ExprKind::Block(block) => emit_block(block, cx, StackSemantics::Effect),
        ExprKind::Throw(exception) => {
            exception.emit(cx, StackSemantics::Value)?;
            cx.target.emit(&position, Instruction::Throw);
            Ok(())
        }
        _ => {
            emit_value(expr, cx)?;
            cx.target.emit_pop(&position, 1);
            Ok(())
        }
    }
}

fn emit_value(expr: &mut Expr, cx: &mut CompileContext<'_>) -> Result<(), InternalError> {
    let position = expr.position.clone();
    match &mut expr.kind {
        ExprKind::Constant(value) => {
            cx.target.emit_constant(&position, value.clone());
        }
        ExprKind::Placeholder { .. } => {
            cx.report(placeholder_outside_partial_application(position.clone()));
            cx.target.emit_null(&position);
        }
        ExprKind::Identifier {
            name,
            access,
            arguments,
        } => {
            let symbol = cx.resolve_or_report(name, &position);
            emit_symbol(cx, &position, *access, &symbol, arguments, StackSemantics::Value)?;
        }
        ExprKind::Symbol {
            access,
            symbol,
            arguments,
        } => emit_symbol(cx, &position, *access, symbol, arguments, StackSemantics::Value)?,
        ExprKind::Binary { op, left, right } => {
            left.emit(cx, StackSemantics::Value)?;
            right.emit(cx, StackSemantics::Value)?;
            cx.target.emit(&position, Instruction::Binary(*op));
        }
        ExprKind::Unary { op, operand } => {
            operand.emit(cx, StackSemantics::Value)?;
            cx.target.emit(&position, Instruction::Unary(*op));
        }
        ExprKind::LogicalAnd(_) | ExprKind::LogicalOr(_) => {
            let false_label = cx.fresh_label("logic\\false");
            let end = cx.fresh_label("logic\\end");
            branch_if_false(expr, cx, &false_label)?;
            cx.target.emit_constant(&position, Constant::Bool(true));
            cx.target.emit_jump(&position, &end);
            cx.target.emit_label(&position, &false_label);
            cx.target.emit_constant(&position, Constant::Bool(false));
            cx.target.emit_label(&position, &end);
            cx.target.free_label(&false_label);
            cx.target.free_label(&end);
        }
        ExprKind::Coalescence(operands) => emit_coalescence(cx, &position, operands)?,
        ExprKind::Conditional {
            condition,
            then,
            otherwise,
            negative,
        } => emit_conditional(cx, &position, condition, then, otherwise, *negative, StackSemantics::Value)?,
        ExprKind::StringConcat(arguments) => emit_concat(cx, &position, arguments)?,
        ExprKind::Type(TypeExpr::Literal(ty)) => {
            cx.target.emit(
                &position,
                Instruction::NewType {
                    type_name: ty.to_string(),
                    arguments: 0,
                },
            );
        }
        ExprKind::Type(TypeExpr::Dynamic { name, arguments }) => {
            emit_all(arguments, cx, StackSemantics::Value)?;
            cx.target.emit(
                &position,
                Instruction::NewType {
                    type_name: name.clone(),
                    arguments: arguments.len(),
                },
            );
        }
        ExprKind::TypeCheck { subject, ty } => {
            subject.emit(cx, StackSemantics::Value)?;
            if let ExprKind::Type(TypeExpr::Literal(literal)) = &ty.kind {
                cx.target.emit(&position, Instruction::Check(literal.clone()));
            } else {
                ty.emit(cx, StackSemantics::Value)?;
                cx.target.emit(&position, Instruction::CheckDynamic);
            }
        }
        ExprKind::TypeCast { subject, ty } => {
            subject.emit(cx, StackSemantics::Value)?;
            if let ExprKind::Type(TypeExpr::Literal(literal)) = &ty.kind {
                cx.target.emit(&position, Instruction::Cast(literal.clone()));
            } else {
                ty.emit(cx, StackSemantics::Value)?;
                cx.target.emit(&position, Instruction::CastDynamic);
            }
        }
        ExprKind::List(elements) => {
            emit_all(elements, cx, StackSemantics::Value)?;
            cx.target
                .emit_command_call(&position, "list", elements.len(), false);
        }
        ExprKind::Hash(pairs) => {
            for (key, value) in pairs.iter_mut() {
                key.emit(cx, StackSemantics::Value)?;
                value.emit(cx, StackSemantics::Value)?;
                cx.target.emit_command_call(&position, "pair", 2, false);
            }
            cx.target.emit_command_call(&position, "hash", pairs.len(), false);
        }
        ExprKind::IndirectCall {
            subject,
            access,
            arguments,
        } => {
            subject.emit(cx, StackSemantics::Value)?;
            emit_all(arguments.as_mut_slice(), cx, StackSemantics::Value)?;
            let n = arguments.len();
            finish_call(cx, &position, *access, n + 1, StackSemantics::Value, |just_effect| {
                Instruction::Call {
                    kind: CallKind::Indirect,
                    arguments: n,
                    just_effect,
                }
            });
        }
        ExprKind::MemberCall {
            subject,
            member,
            access,
            arguments,
        } => {
            subject.emit(cx, StackSemantics::Value)?;
            emit_all(arguments.as_mut_slice(), cx, StackSemantics::Value)?;
            let n = arguments.len();
            let member = member.clone();
            let access = *access;
            finish_call(cx, &position, access, n + 1, StackSemantics::Value, |just_effect| {
                Instruction::Member {
                    member,
                    access,
                    arguments: n,
                    just_effect,
                }
            });
        }
        ExprKind::StaticCall {
            type_name,
            member,
            access,
            arguments,
        } => {
            emit_all(arguments.as_mut_slice(), cx, StackSemantics::Value)?;
            let n = arguments.len();
            let (type_name, member, access) = (type_name.clone(), member.clone(), *access);
            finish_call(cx, &position, access, n, StackSemantics::Value, |just_effect| {
                Instruction::Static {
                    type_name,
                    member,
                    access,
                    arguments: n,
                    just_effect,
                }
            });
        }
        ExprKind::ObjectCreation {
            type_name,
            arguments,
        } => {
            emit_all(arguments.as_mut_slice(), cx, StackSemantics::Value)?;
            cx.target.emit(
                &position,
                Instruction::NewObject {
                    type_name: type_name.clone(),
                    arguments: arguments.len(),
                },
            );
        }
        ExprKind::CreateClosure { id, module } => {
            cx.target.emit(
                &position,
                Instruction::NewClosure {
                    id: id.clone(),
                    module: module.clone(),
                },
            );
        }
        ExprKind::Block(block) => emit_block(block, cx, StackSemantics::Value)?,
        ExprKind::Throw(exception) => {
            exception.emit(cx, StackSemantics::Value)?;
            cx.target.emit(&position, Instruction::Throw);
            // Never reached. Value mode still accounts for one pushed value.
            cx.target.emit_null(&position);
        }
        ExprKind::Exception => cx.target.emit(&position, Instruction::Exception),
    }
    Ok(())
}

fn emit_coalescence(
    cx: &mut CompileContext<'_>,
    position: &Position,
    operands: &mut [Expr],
) -> Result<(), InternalError> {
    let Some((last, rest)) = operands.split_last_mut() else {
        cx.target.emit_null(position);
        return Ok(());
    };
    let end = cx.fresh_label("coalesce\\end");
    for operand in rest {
        operand.emit(cx, StackSemantics::Value)?;
        cx.target.emit(position, Instruction::Duplicate(1));
        cx.target.emit(position, Instruction::CheckNull);
        cx.target.emit_jump_if_false(position, &end);
        cx.target.emit_pop(position, 1);
    }
    last.emit(cx, StackSemantics::Value)?;
    cx.target.emit_label(position, &end);
    cx.target.free_label(&end);
    Ok(())
}

fn emit_conditional(
    cx: &mut CompileContext<'_>,
    position: &Position,
    condition: &mut Expr,
    then: &mut Expr,
    otherwise: &mut Expr,
    negative: bool,
    semantics: StackSemantics,
) -> Result<(), InternalError> {
    let else_label = cx.fresh_label("cond\\else");
    let end = cx.fresh_label("cond\\end");
    if negative {
        branch_if_true(condition, cx, &else_label)?;
    } else {
        branch_if_false(condition, cx, &else_label)?;
    }
    then.emit(cx, semantics)?;
    cx.target.emit_jump(position, &end);
    cx.target.emit_label(position, &else_label);
    otherwise.emit(cx, semantics)?;
    cx.target.emit_label(position, &end);
    cx.target.free_label(&else_label);
    cx.target.free_label(&end);
    Ok(())
}

/// Zero arguments give the empty string, one is converted, two use the
/// binary operator when it is known to concatenate, more call the n-ary
/// command.
fn emit_concat(
    cx: &mut CompileContext<'_>,
    position: &Position,
    arguments: &mut [Expr],
) -> Result<(), InternalError> {
    match arguments {
        [] => cx.target.emit_constant(position, Constant::string("")),
        [only] => {
            let is_string = matches!(only.as_constant(), Some(Constant::String(_)));
            only.emit(cx, StackSemantics::Value)?;
            if !is_string {
                cx.target.emit(position, Instruction::Cast(LiteralType::String));
            }
        }
        [left, right] if left.has_static_string_type() || right.has_static_string_type() => {
            left.emit(cx, StackSemantics::Value)?;
            right.emit(cx, StackSemantics::Value)?;
            cx.target.emit(position, Instruction::Binary(BinaryOp::Add));
        }
        _ => {
            emit_all(arguments, cx, StackSemantics::Value)?;
            cx.target
                .emit_command_call(position, "string_concat", arguments.len(), false);
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "tests use unwrap to panic on unexpected state"
)]
