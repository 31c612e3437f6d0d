//! Conditional jumps for lazy `and`/`or` chains.
//!
//! `branch_if_false(e, l)` jumps to `l` when `e` is falsy and falls
//! through otherwise; `branch_if_true` is the mirror image. A chain whose
//! short-circuit value is not the one being tested gets a fresh skip
//! label, bound right after its last operand.

use quill_ir::{Position, UnaryOp};

use crate::ast::{Expr, ExprKind, StackSemantics};
use crate::{CompileContext, InternalError};

pub(crate) fn branch_if_false(
    expr: &mut Expr,
    cx: &mut CompileContext<'_>,
    label: &str,
) -> Result<(), InternalError> {
    branch(expr, cx, label, false)
}

pub(crate) fn branch_if_true(
    expr: &mut Expr,
    cx: &mut CompileContext<'_>,
    label: &str,
) -> Result<(), InternalError> {
    branch(expr, cx, label, true)
}

/// Jump to `label` when `expr` is truthy (`when` = true) or falsy.
fn branch(
    expr: &mut Expr,
    cx: &mut CompileContext<'_>,
    label: &str,
    when: bool,
) -> Result<(), InternalError> {
    let position = expr.position.clone();
    match &mut expr.kind {
        ExprKind::LogicalAnd(operands) => branch_chain(operands, cx, &position, label, true, when),
        ExprKind::LogicalOr(operands) => branch_chain(operands, cx, &position, label, false, when),
        ExprKind::Unary {
            op: UnaryOp::Not,
            operand,
        } if !operand.is_placeholder() => branch(operand, cx, label, !when),
        ExprKind::Constant(value) if cx.values.truthiness(value).is_some() => {
            if cx.values.truthiness(value) == Some(when) {
                cx.target.emit_jump(&position, label);
            }
            Ok(())
        }
        _ => {
            expr.emit(cx, StackSemantics::Value)?;
            if when {
                cx.target.emit_jump_if_true(&position, label);
            } else {
                cx.target.emit_jump_if_false(&position, label);
            }
            Ok(())
        }
    }
}

/// Jump to `label` when the chain evaluates to `when`.
///
/// The short-circuit value of `and` is false and of `or` is true. When
/// `when` equals it, every operand can jump straight to `label`.
/// Otherwise every operand but the last jumps past the chain on the
/// short-circuit value and only the last one decides.
fn branch_chain(
    operands: &mut [Expr],
    cx: &mut CompileContext<'_>,
    position: &Position,
    label: &str,
    is_and: bool,
    when: bool,
) -> Result<(), InternalError> {
    let short_circuit = !is_and;
    let Some((last, rest)) = operands.split_last_mut() else {
        // `and` of nothing is true, `or` of nothing is false.
        if when == is_and {
            cx.target.emit_jump(position, label);
        }
        return Ok(());
    };

    if when == short_circuit {
        for operand in rest {
            branch(operand, cx, label, when)?;
        }
        return branch(last, cx, label, when);
    }

    let skip = cx.fresh_label(if is_and { "and\\skip" } else { "or\\skip" });
    for operand in rest {
        branch(operand, cx, &skip, short_circuit)?;
    }
    branch(last, cx, label, when)?;
    cx.target.emit_label(position, &skip);
    cx.target.free_label(&skip);
    Ok(())
}
