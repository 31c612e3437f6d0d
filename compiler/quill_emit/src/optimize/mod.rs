//! Tree rewriting before emission.
//!
//! [`Expr::try_optimize`] optimizes a node's children in place and may
//! return a replacement for the node itself. [`optimize_expr`] drives one
//! slot to a fixpoint, bounded by `max_optimization_passes`. Folding asks
//! the context's [`crate::ValueModel`]; when the model declines, the node
//! is left for runtime and nothing is reported.

use quill_ir::{BinaryOp, Constant, Position, UnaryOp};

use crate::ast::{Block, Expr, ExprKind, Stmt, StmtKind, TypeExpr};
use crate::{ensure_sufficient_stack, ArgumentsProxy, CompileContext, InternalError};

impl Expr {
    /// Optimize this node's children and return a replacement for the
    /// node, if one applies.
    pub fn try_optimize(
        &mut self,
        cx: &mut CompileContext<'_>,
    ) -> Result<Option<Expr>, InternalError> {
        let position = &self.position;
        let replacement = match &mut self.kind {
            ExprKind::Constant(_)
            | ExprKind::Placeholder { .. }
            | ExprKind::CreateClosure { .. }
            | ExprKind::Exception
            | ExprKind::Type(TypeExpr::Literal(_)) => None,

            ExprKind::Type(TypeExpr::Dynamic { arguments, .. }) => {
                optimize_all(arguments, cx)?;
                None
            }

            ExprKind::Identifier {
                name,
                access,
                arguments,
            } => {
                optimize_arguments(arguments, cx)?;
                let symbol = cx.resolve_or_report(name, position);
                tracing::trace!(name = %name, symbol = %symbol, "resolved identifier");
                Some(Expr::new(
                    position.clone(),
                    ExprKind::Symbol {
                        access: *access,
                        symbol,
                        arguments: std::mem::take(arguments),
                    },
                ))
            }

            ExprKind::Symbol { arguments, .. }
            | ExprKind::StaticCall { arguments, .. }
            | ExprKind::ObjectCreation { arguments, .. } => {
                optimize_arguments(arguments, cx)?;
                None
            }

            ExprKind::IndirectCall {
                subject, arguments, ..
            }
            | ExprKind::MemberCall {
                subject, arguments, ..
            } => {
                optimize_expr(subject, cx)?;
                optimize_arguments(arguments, cx)?;
                None
            }

            ExprKind::Binary { op, left, right } => {
                optimize_expr(left, cx)?;
                optimize_expr(right, cx)?;
                optimize_binary(*op, left, right, position, cx)
            }

            ExprKind::Unary { op, operand } => {
                optimize_expr(operand, cx)?;
                optimize_unary(*op, operand, position, cx)
            }

            ExprKind::LogicalAnd(operands) => optimize_chain(operands, true, position, cx)?,
            ExprKind::LogicalOr(operands) => optimize_chain(operands, false, position, cx)?,

            ExprKind::Coalescence(operands) => {
                optimize_all(operands, cx)?;
                operands.retain(|operand| !operand.is_null_constant());
                match operands.len() {
                    0 => Some(Expr::null(position.clone())),
                    1 => operands.pop(),
                    _ => None,
                }
            }

            ExprKind::Conditional {
                condition,
                then,
                otherwise,
                negative,
            } => {
                optimize_expr(condition, cx)?;
                optimize_expr(then, cx)?;
                optimize_expr(otherwise, cx)?;
                *negative ^= unwrap_not(condition);
                match condition.as_constant().and_then(|c| cx.values.truthiness(c)) {
                    Some(truth) if truth != *negative => Some(take(then)),
                    Some(_) => Some(take(otherwise)),
                    None => None,
                }
            }

            ExprKind::StringConcat(arguments) => {
                optimize_all(arguments, cx)?;
                simplify_concat(arguments, position, cx)
            }

            ExprKind::TypeCheck { subject, ty } => {
                optimize_expr(subject, cx)?;
                optimize_expr(ty, cx)?;
                match (subject.as_constant(), &ty.kind) {
                    (Some(value), ExprKind::Type(TypeExpr::Literal(ty))) => cx
                        .values
                        .is_instance(value, ty)
                        .map(|is| Expr::constant(position.clone(), is)),
                    _ => None,
                }
            }

            ExprKind::TypeCast { subject, ty } => {
                optimize_expr(subject, cx)?;
                optimize_expr(ty, cx)?;
                optimize_cast(subject, ty, position, cx)
            }

            ExprKind::List(elements) => {
                optimize_all(elements, cx)?;
                None
            }

            ExprKind::Hash(pairs) => {
                for (key, value) in pairs {
                    optimize_expr(key, cx)?;
                    optimize_expr(value, cx)?;
                }
                None
            }

            ExprKind::Block(block) => {
                optimize_block(block, cx)?;
                if block.statements.is_empty() && block.declarations.is_empty() {
                    block.expression.take().map(|expr| *expr)
                } else {
                    None
                }
            }

            ExprKind::Throw(exception) => {
                optimize_expr(exception, cx)?;
                None
            }
        };
        Ok(replacement)
    }
}

/// Optimize the expression in `slot` until no rule applies.
pub(crate) fn optimize_expr(slot: &mut Expr, cx: &mut CompileContext<'_>) -> Result<(), InternalError> {
    ensure_sufficient_stack(|| {
        for _ in 0..cx.options.max_optimization_passes.max(1) {
            match slot.try_optimize(cx)? {
                Some(replacement) => *slot = replacement,
                None => return Ok(()),
            }
        }
        tracing::trace!(position = %slot.position, "optimization pass limit reached");
        Ok(())
    })
}

fn optimize_all(exprs: &mut [Expr], cx: &mut CompileContext<'_>) -> Result<(), InternalError> {
    for expr in exprs {
        optimize_expr(expr, cx)?;
    }
    Ok(())
}

fn optimize_arguments(
    arguments: &mut ArgumentsProxy,
    cx: &mut CompileContext<'_>,
) -> Result<(), InternalError> {
    for argument in arguments {
        optimize_expr(argument, cx)?;
    }
    Ok(())
}

/// Optimize every statement of `block` with its declarations in scope.
pub(crate) fn optimize_block(block: &mut Block, cx: &mut CompileContext<'_>) -> Result<(), InternalError> {
    cx.push_scope(&block.declarations);
    for statement in &mut block.statements {
        optimize_stmt(statement, cx)?;
    }
    if let Some(expression) = &mut block.expression {
        optimize_expr(expression, cx)?;
    }
    cx.pop_scope()
}

fn optimize_optional(expr: &mut Option<Expr>, cx: &mut CompileContext<'_>) -> Result<(), InternalError> {
    match expr {
        Some(expr) => optimize_expr(expr, cx),
        None => Ok(()),
    }
}

pub(crate) fn optimize_stmt(stmt: &mut Stmt, cx: &mut CompileContext<'_>) -> Result<(), InternalError> {
    ensure_sufficient_stack(|| match &mut stmt.kind {
        StmtKind::Expr(expr) => optimize_expr(expr, cx),
        StmtKind::Block(block) => optimize_block(block, cx),
        StmtKind::Condition {
            condition,
            if_block,
            else_block,
            ..
        } => {
            optimize_expr(condition, cx)?;
            optimize_block(if_block, cx)?;
            optimize_block(else_block, cx)
        }
        StmtKind::While {
            condition, body, ..
        } => {
            optimize_expr(condition, cx)?;
            optimize_block(body, cx)
        }
        StmtKind::For {
            initialize,
            condition,
            next_iteration,
            body,
            ..
        } => {
            // Declarations of the initializer are visible to the whole loop.
            cx.push_scope(&initialize.declarations);
            for statement in &mut initialize.statements {
                optimize_stmt(statement, cx)?;
            }
            optimize_expr(condition, cx)?;
            optimize_block(next_iteration, cx)?;
            optimize_block(body, cx)?;
            cx.pop_scope()
        }
        StmtKind::Foreach {
            element,
            list,
            body,
        } => {
            optimize_optional(element, cx)?;
            optimize_optional(list, cx)?;
            optimize_block(body, cx)
        }
        StmtKind::Return { value, .. } => optimize_optional(value, cx),
        StmtKind::TryCatchFinally {
            try_block,
            catch_block,
            exception_var,
            finally_block,
        } => {
            optimize_block(try_block, cx)?;
            optimize_optional(exception_var, cx)?;
            optimize_block(catch_block, cx)?;
            optimize_block(finally_block, cx)
        }
        StmtKind::Using {
            target,
            resource,
            body,
        } => {
            optimize_optional(target, cx)?;
            optimize_optional(resource, cx)?;
            optimize_block(body, cx)
        }
        StmtKind::Goto(_) | StmtKind::Label(_) | StmtKind::Break | StmtKind::Continue => Ok(()),
    })
}

/// Move the expression out of `slot`, leaving null behind.
pub(crate) fn take(slot: &mut Expr) -> Expr {
    let position = slot.position.clone();
    std::mem::replace(slot, Expr::null(position))
}

/// Strip leading logical nots off `condition`, returning whether the
/// polarity flipped.
pub(crate) fn unwrap_not(condition: &mut Expr) -> bool {
    let mut flipped = false;
    loop {
        let inner = match &mut condition.kind {
            ExprKind::Unary {
                op: UnaryOp::Not,
                operand,
            } => take(operand),
            _ => return flipped,
        };
        *condition = inner;
        flipped = !flipped;
    }
}

fn is_int(expr: &Expr, n: i64) -> bool {
    matches!(expr.as_constant(), Some(Constant::Int(value)) if *value == n)
}

fn optimize_binary(
    op: BinaryOp,
    left: &mut Expr,
    right: &mut Expr,
    position: &Position,
    cx: &CompileContext<'_>,
) -> Option<Expr> {
    if let (Some(a), Some(b)) = (left.as_constant(), right.as_constant()) {
        if let Some(folded) = cx.values.binary(op, a, b) {
            tracing::trace!(%position, %folded, "folded binary operator");
            return Some(Expr::constant(position.clone(), folded));
        }
    }
    if left.is_placeholder() || right.is_placeholder() {
        return None;
    }
    if op == BinaryOp::Add && (left.has_static_string_type() || right.has_static_string_type()) {
        let mut arguments = vec![take(left), take(right)];
        return Some(
            simplify_concat(&mut arguments, position, cx)
                .unwrap_or_else(|| Expr::concat(position.clone(), arguments)),
        );
    }

    let left_constant = left.as_constant().is_some();
    let right_constant = right.as_constant().is_some();
    match op {
        BinaryOp::Add if is_int(right, 0) && !left_constant => Some(take(left)),
        BinaryOp::Add if is_int(left, 0) && !right_constant => Some(take(right)),
        BinaryOp::Mul if is_int(right, 1) && !left_constant => Some(take(left)),
        BinaryOp::Mul if is_int(left, 1) && !right_constant => Some(take(right)),
        BinaryOp::Div | BinaryOp::Pow if is_int(right, 1) && !left_constant => Some(take(left)),
        BinaryOp::Pow if is_int(left, 1) && !right_constant => {
            Some(Expr::constant(position.clone(), Constant::Int(1)))
        }
        _ => None,
    }
}

fn optimize_unary(
    op: UnaryOp,
    operand: &mut Expr,
    position: &Position,
    cx: &CompileContext<'_>,
) -> Option<Expr> {
    if let Some(value) = operand.as_constant() {
        if let Some(folded) = cx.values.unary(op, value) {
            tracing::trace!(%position, %folded, "folded unary operator");
            return Some(Expr::constant(position.clone(), folded));
        }
    }
    match &mut operand.kind {
        ExprKind::Unary {
            op: inner_op,
            operand: inner,
        } if *inner_op == op => Some(take(inner)),
        _ => None,
    }
}

fn optimize_cast(
    subject: &mut Expr,
    ty: &Expr,
    position: &Position,
    cx: &CompileContext<'_>,
) -> Option<Expr> {
    let ExprKind::Type(TypeExpr::Literal(target)) = &ty.kind else {
        return None;
    };
    if let Some(value) = subject.as_constant() {
        return cx
            .values
            .convert(value, target)
            .map(|converted| Expr::constant(position.clone(), converted));
    }
    let redundant = matches!(&subject.kind, ExprKind::TypeCast { ty: inner, .. } if inner.kind == ty.kind);
    redundant.then(|| take(subject))
}

/// Apply constant elimination to a short-circuit chain.
///
/// `and` stops early on false, `or` on true. An operand equal to that
/// value ends the chain; an operand equal to its negation is dropped.
fn optimize_chain(
    operands: &mut Vec<Expr>,
    is_and: bool,
    position: &Position,
    cx: &mut CompileContext<'_>,
) -> Result<Option<Expr>, InternalError> {
    optimize_all(operands, cx)?;
    let short_circuit = !is_and;
    let mut changed = false;

    let mut flat = Vec::with_capacity(operands.len());
    for operand in std::mem::take(operands) {
        match operand.kind {
            ExprKind::LogicalAnd(inner) if is_and => {
                changed = true;
                flat.extend(inner);
            }
            ExprKind::LogicalOr(inner) if !is_and => {
                changed = true;
                flat.extend(inner);
            }
            kind => flat.push(Expr::new(operand.position, kind)),
        }
    }

    let total = flat.len();
    let mut kept = Vec::with_capacity(total);
    for (i, operand) in flat.into_iter().enumerate() {
        match operand.as_constant().and_then(|c| cx.values.truthiness(c)) {
            Some(truth) if truth == short_circuit => {
                if kept.is_empty() {
                    return Ok(Some(Expr::constant(position.clone(), short_circuit)));
                }
                changed |= i + 1 < total;
                kept.push(operand);
                break;
            }
            Some(_) => changed = true,
            None => kept.push(operand),
        }
    }

    if kept.is_empty() {
        return Ok(Some(Expr::constant(position.clone(), !short_circuit)));
    }
    if changed {
        let kind = if is_and {
            ExprKind::LogicalAnd(kept)
        } else {
            ExprKind::LogicalOr(kept)
        };
        return Ok(Some(Expr::new(position.clone(), kind)));
    }
    *operands = kept;
    Ok(None)
}

/// Flatten nested concatenations, merge runs of constants and drop empty
/// strings. Returns a replacement when a single string constant remains.
fn simplify_concat(
    arguments: &mut Vec<Expr>,
    position: &Position,
    cx: &CompileContext<'_>,
) -> Option<Expr> {
    let mut flat = Vec::with_capacity(arguments.len());
    for argument in std::mem::take(arguments) {
        match argument.kind {
            ExprKind::StringConcat(inner) => flat.extend(inner),
            kind => flat.push(Expr::new(argument.position, kind)),
        }
    }

    let mut merged: Vec<Expr> = Vec::with_capacity(flat.len());
    let mut run: Option<(Position, String)> = None;
    for argument in flat {
        match argument.as_constant().and_then(|c| cx.values.stringify(c)) {
            Some(text) => {
                if let Some((_, buffer)) = &mut run {
                    buffer.push_str(&text);
                } else {
                    run = Some((argument.position.clone(), text));
                }
            }
            None => {
                flush_run(&mut run, &mut merged);
                merged.push(argument);
            }
        }
    }
    flush_run(&mut run, &mut merged);

    match merged.as_slice() {
        [] => Some(Expr::constant(position.clone(), "")),
        [only] if matches!(only.as_constant(), Some(Constant::String(_))) => merged.pop(),
        _ => {
            *arguments = merged;
            None
        }
    }
}

fn flush_run(run: &mut Option<(Position, String)>, merged: &mut Vec<Expr>) {
    if let Some((position, text)) = run.take() {
        if !text.is_empty() {
            merged.push(Expr::constant(position, Constant::String(text)));
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "tests use unwrap to panic on unexpected state"
)]
