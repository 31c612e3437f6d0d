//! Statement emission and control flow.
//!
//! Statements never leave anything on the stack. Loops push their
//! `continue`/`break` labels for the body; `break` and `continue` leave
//! protected regions opened since the loop started instead of jumping.
//! Every label this module allocates is freed once its last jump is out.

use quill_diagnostic::{invalid_assignment_target, Diagnostic, ErrorCode};
use quill_ir::{Access, EntityRef, Instruction, JumpTarget, Position, ReturnKind};

use crate::ast::{Block, Expr, ExprKind, ReturnVariant, StackSemantics, Stmt, StmtKind};
use crate::context::ProtectedKind;
use crate::emit::{branch_if_false, branch_if_true};
use crate::optimize::unwrap_not;
use crate::{ensure_sufficient_stack, CompileContext, ForeachHint, InternalError, TryRegion};

/// Emit `block` in its own scope. In value mode the trailing expression
/// is the block's value, or null without one.
pub(crate) fn emit_block(
    block: &mut Block,
    cx: &mut CompileContext<'_>,
    semantics: StackSemantics,
) -> Result<(), InternalError> {
    cx.push_scope(&block.declarations);
    cx.target.begin_block();
    for statement in &mut block.statements {
        statement.emit(cx)?;
    }
    match &mut block.expression {
        Some(expression) => expression.emit(cx, semantics)?,
        None if semantics == StackSemantics::Value => cx.target.emit_null(&block.position),
        None => {}
    }
    cx.target.end_block()?;
    cx.pop_scope()
}

impl Stmt {
    pub fn emit(&mut self, cx: &mut CompileContext<'_>) -> Result<(), InternalError> {
        let position = self.position.clone();
        ensure_sufficient_stack(|| match &mut self.kind {
            StmtKind::Expr(expr) => expr.emit(cx, StackSemantics::Effect),
            StmtKind::Block(block) => emit_block(block, cx, StackSemantics::Effect),
            StmtKind::Condition {
                condition,
                if_block,
                else_block,
                negative,
            } => emit_condition(cx, &position, condition, if_block, else_block, *negative),
            StmtKind::While {
                condition,
                body,
                is_precondition,
                positive,
            } => emit_loop(
                cx,
                &position,
                Loop {
                    condition,
                    body,
                    next_iteration: None,
                    is_precondition: *is_precondition,
                    positive: *positive,
                },
            ),
            StmtKind::For {
                initialize,
                condition,
                next_iteration,
                body,
                is_precondition,
                positive,
            } => {
                // The initializer's declarations stay visible to the whole loop.
                cx.push_scope(&initialize.declarations);
                cx.target.begin_block();
                for statement in &mut initialize.statements {
                    statement.emit(cx)?;
                }
                if let Some(expression) = &mut initialize.expression {
                    expression.emit(cx, StackSemantics::Effect)?;
                }
                emit_loop(
                    cx,
                    &position,
                    Loop {
                        condition,
                        body,
                        next_iteration: Some(next_iteration),
                        is_precondition: *is_precondition,
                        positive: *positive,
                    },
                )?;
                cx.target.end_block()?;
                cx.pop_scope()
            }
            StmtKind::Foreach {
                element,
                list,
                body,
            } => {
                let element = element.as_ref().ok_or_else(|| InternalError::Uninitialized {
                    what: "foreach element",
                    position: position.clone(),
                })?;
                let list = list.as_ref().ok_or_else(|| InternalError::Uninitialized {
                    what: "foreach list",
                    position: position.clone(),
                })?;
                emit_foreach(cx, &position, element, list, body)
            }
            StmtKind::Return { variant, value } => emit_return(cx, &position, *variant, value.as_mut()),
            StmtKind::TryCatchFinally {
                try_block,
                catch_block,
                exception_var,
                finally_block,
            } => emit_try(
                cx,
                &position,
                ProtectedKind::Try,
                try_block,
                catch_block,
                exception_var.as_ref(),
                finally_block,
            ),
            StmtKind::Using {
                target,
                resource,
                body,
            } => {
                let target = target.as_ref().ok_or_else(|| InternalError::Uninitialized {
                    what: "using target",
                    position: position.clone(),
                })?;
                let resource = resource.as_ref().ok_or_else(|| InternalError::Uninitialized {
                    what: "using resource",
                    position: position.clone(),
                })?;
                emit_using(cx, &position, target, resource, body)
            }
            StmtKind::Goto(JumpTarget::Label(label)) => {
                cx.target.emit_jump(&position, label);
                Ok(())
            }
            StmtKind::Goto(JumpTarget::Address(address)) => {
                cx.target
                    .emit(&position, Instruction::Jump(JumpTarget::Address(*address)));
                Ok(())
            }
            StmtKind::Label(label) => {
                cx.target.emit_label(&position, label);
                Ok(())
            }
            StmtKind::Break => emit_loop_exit(cx, &position, true),
            StmtKind::Continue => emit_loop_exit(cx, &position, false),
        })
    }
}

/// Jump to `label` when `condition` is truthy, or falsy if `when` is false.
fn branch_when(
    condition: &mut Expr,
    cx: &mut CompileContext<'_>,
    label: &str,
    when: bool,
) -> Result<(), InternalError> {
    if when {
        branch_if_true(condition, cx, label)
    } else {
        branch_if_false(condition, cx, label)
    }
}

/// The label `stmt` jumps to, if a plain conditional jump can replace it.
fn direct_jump_label(stmt: &Stmt, cx: &CompileContext<'_>) -> Option<String> {
    match &stmt.kind {
        StmtKind::Goto(JumpTarget::Label(label)) => Some(label.clone()),
        StmtKind::Break | StmtKind::Continue => {
            let innermost = cx.innermost_loop()?;
            if cx.protected_depth() > innermost.protected_depth {
                return None;
            }
            Some(if matches!(stmt.kind, StmtKind::Break) {
                innermost.break_label.clone()
            } else {
                innermost.continue_label.clone()
            })
        }
        _ => None,
    }
}

fn emit_condition(
    cx: &mut CompileContext<'_>,
    position: &Position,
    condition: &mut Expr,
    if_block: &mut Block,
    else_block: &mut Block,
    negative: bool,
) -> Result<(), InternalError> {
    let negative = negative ^ unwrap_not(condition);

    if let Some(truth) = condition.as_constant().and_then(|c| cx.values.truthiness(c)) {
        let live = if truth == negative { else_block } else { if_block };
        return emit_block(live, cx, StackSemantics::Effect);
    }
    if if_block.is_empty() && else_block.is_empty() {
        return condition.emit(cx, StackSemantics::Effect);
    }

    // Keep the non-empty arm in front.
    let (if_block, else_block, negative) = if if_block.is_empty() {
        (else_block, if_block, !negative)
    } else {
        (if_block, else_block, negative)
    };

    // `if c { goto l }` needs no label of its own.
    if let Some(label) = if_block.single_jump().and_then(|jump| direct_jump_label(jump, cx)) {
        branch_when(condition, cx, &label, !negative)?;
        return emit_block(else_block, cx, StackSemantics::Effect);
    }
    if let Some(label) = else_block.single_jump().and_then(|jump| direct_jump_label(jump, cx)) {
        branch_when(condition, cx, &label, negative)?;
        return emit_block(if_block, cx, StackSemantics::Effect);
    }

    let else_label = cx.fresh_label("if\\else");
    branch_when(condition, cx, &else_label, negative)?;
    emit_block(if_block, cx, StackSemantics::Effect)?;
    if else_block.is_empty() {
        cx.target.emit_label(position, &else_label);
    } else {
        let end = cx.fresh_label("if\\end");
        cx.target.emit_jump(position, &end);
        cx.target.emit_label(position, &else_label);
        emit_block(else_block, cx, StackSemantics::Effect)?;
        cx.target.emit_label(position, &end);
        cx.target.free_label(&end);
    }
    cx.target.free_label(&else_label);
    Ok(())
}

struct Loop<'b> {
    condition: &'b mut Expr,
    body: &'b mut Block,
    next_iteration: Option<&'b mut Block>,
    is_precondition: bool,
    positive: bool,
}

/// ```text
///     jump continue        ; precondition only
/// begin:
///     body
/// continue:
///     next iteration
///     jump.t begin         ; jump.f for a negative loop
/// break:
/// ```
fn emit_loop(cx: &mut CompileContext<'_>, position: &Position, shape: Loop<'_>) -> Result<(), InternalError> {
    let Loop {
        condition,
        body,
        next_iteration,
        is_precondition,
        positive,
    } = shape;
    let positive = positive ^ unwrap_not(condition);
    // Some(true): loops forever. Some(false): never repeats.
    let repeats = condition
        .as_constant()
        .and_then(|c| cx.values.truthiness(c))
        .map(|truth| truth == positive);

    if is_precondition && repeats == Some(false) {
        tracing::trace!(%position, "loop body is dead");
        return Ok(());
    }

    let begin = cx.fresh_label("loop\\begin");
    let continue_label = cx.fresh_label("loop\\continue");
    let break_label = cx.fresh_label("loop\\break");

    if is_precondition && repeats.is_none() {
        cx.target.emit_jump(position, &continue_label);
    }
    cx.target.emit_label(position, &begin);
    cx.push_loop(continue_label.clone(), break_label.clone());
    emit_block(body, cx, StackSemantics::Effect)?;
    cx.pop_loop()?;
    cx.target.emit_label(position, &continue_label);
    if let Some(next_iteration) = next_iteration {
        emit_block(next_iteration, cx, StackSemantics::Effect)?;
    }
    match repeats {
        Some(true) => cx.target.emit_jump(position, &begin),
        Some(false) => {}
        None => branch_when(condition, cx, &begin, positive)?,
    }
    cx.target.emit_label(position, &break_label);

    for label in [&begin, &continue_label, &break_label] {
        cx.target.free_label(label);
    }
    Ok(())
}

fn emit_loop_exit(cx: &mut CompileContext<'_>, position: &Position, is_break: bool) -> Result<(), InternalError> {
    let target = cx.innermost_loop().map(|innermost| {
        let label = if is_break {
            &innermost.break_label
        } else {
            &innermost.continue_label
        };
        (label.clone(), innermost.protected_depth)
    });
    let Some((label, loop_depth)) = target else {
        let keyword = if is_break { "break" } else { "continue" };
        cx.report(
            Diagnostic::error(ErrorCode::E4002)
                .with_message(format!("'{keyword}' outside of a loop"))
                .at(position.clone()),
        );
        return Ok(());
    };
    if cx.protected_depth() > loop_depth {
        cx.target.emit_leave(position, &label);
    } else {
        cx.target.emit_jump(position, &label);
    }
    Ok(())
}

/// Find the last read of `member` in `range`.
fn locate_member(
    cx: &CompileContext<'_>,
    range: std::ops::Range<usize>,
    member: &'static str,
    position: &Position,
) -> Result<usize, InternalError> {
    range
        .rev()
        .find(|address| {
            matches!(
                cx.target.instruction(*address),
                Some(Instruction::Member { member: m, access: Access::Get, .. }) if m == member
            )
        })
        .ok_or_else(|| InternalError::MissingHintAddress {
            call: member,
            position: position.clone(),
        })
}

fn enumerator_call(position: &Position, enumerator: &str, member: &str) -> Expr {
    let subject = Expr::call(position.clone(), EntityRef::local(enumerator), Vec::new());
    Expr::member_call(position.clone(), subject, member, Access::Get, Vec::new())
}

/// ```text
///     list; GetEnumerator; stloc e
///     try
///     jump continue
/// begin:
///     element = e.Current
///     body
/// continue:
///     e.MoveNext; jump.t begin
/// break:
///     leave end
/// finally:
///     e.Dispose
/// end:
/// ```
fn emit_foreach(
    cx: &mut CompileContext<'_>,
    position: &Position,
    element: &Expr,
    list: &Expr,
    body: &mut Block,
) -> Result<(), InternalError> {
    let enumerator = cx.allocate_temporary("foreach\\enumerator");

    let list_start = cx.target.next_address();
    Expr::member_call(position.clone(), list.clone(), "GetEnumerator", Access::Get, Vec::new())
        .emit(cx, StackSemantics::Value)?;
    let get_enumerator = locate_member(cx, list_start..cx.target.next_address(), "GetEnumerator", position)?;
    cx.target.emit_store_local(position, &enumerator);

    let begin = cx.fresh_label("foreach\\begin");
    let continue_label = cx.fresh_label("foreach\\continue");
    let break_label = cx.fresh_label("foreach\\break");
    let end = cx.fresh_label("foreach\\end");

    let begin_try = cx.target.next_address();
    cx.target.emit(position, Instruction::Try);
    cx.enter_protected(ProtectedKind::Foreach);
    cx.target.emit_jump(position, &continue_label);
    cx.target.emit_label(position, &begin);

    let current_start = cx.target.next_address();
    let current = enumerator_call(position, &enumerator, "Current");
    match element.assigning(current) {
        Some(mut assignment) => {
            assignment.emit(cx, StackSemantics::Effect)?;
        }
        None => cx.report(invalid_assignment_target(
            element.position.clone(),
            "the element of a foreach loop",
        )),
    }
    let current_end = cx.target.next_address();

    cx.push_loop(continue_label.clone(), break_label.clone());
    emit_block(body, cx, StackSemantics::Effect)?;
    cx.pop_loop()?;

    cx.target.emit_label(position, &continue_label);
    let move_next_start = cx.target.next_address();
    enumerator_call(position, &enumerator, "MoveNext").emit(cx, StackSemantics::Value)?;
    let move_next = locate_member(cx, move_next_start..cx.target.next_address(), "MoveNext", position)?;
    cx.target.emit_jump_if_true(position, &begin);
    cx.target.emit_label(position, &break_label);
    cx.target.emit_leave(position, &end);
    cx.leave_protected()?;

    let begin_finally = cx.target.next_address();
    cx.enter_protected(ProtectedKind::Finally);
    enumerator_call(position, &enumerator, "Dispose").emit(cx, StackSemantics::Effect)?;
    let dispose = locate_member(cx, begin_finally..cx.target.next_address(), "Dispose", position)?;
    cx.leave_protected()?;

    cx.target.emit_label(position, &end);
    let end_address = cx.target.next_address();
    cx.target.emit(position, Instruction::Nop);
    cx.target.register_try_region(TryRegion {
        begin_try,
        begin_finally: Some(begin_finally),
        begin_catch: None,
        end: end_address,
        uses_exception: false,
    });
    for label in [&begin, &continue_label, &break_label, &end] {
        cx.target.free_label(label);
    }

    if cx.options.record_hints {
        let current = if current_start < current_end {
            locate_member(cx, current_start..current_end, "Current", position)?
        } else {
            // The element could not be assigned; nothing reads Current.
            current_start
        };
        cx.record_hint(ForeachHint {
            enumerator,
            get_enumerator,
            move_next,
            current,
            dispose,
        });
    }
    Ok(())
}

fn emit_return(
    cx: &mut CompileContext<'_>,
    position: &Position,
    variant: ReturnVariant,
    value: Option<&mut Expr>,
) -> Result<(), InternalError> {
    match variant {
        ReturnVariant::Exit => match value {
            Some(value) => {
                value.emit(cx, StackSemantics::Value)?;
                cx.target.emit(position, Instruction::Return(ReturnKind::Value));
            }
            None => cx.target.emit(position, Instruction::Return(ReturnKind::Exit)),
        },
        ReturnVariant::Set | ReturnVariant::Continue => {
            if cx.protected_depth() > 0 {
                let what = if variant == ReturnVariant::Set { "Setting the result" } else { "Yielding" };
                cx.report(
                    Diagnostic::warning(ErrorCode::E4001)
                        .with_message(format!("{what} inside a protected block"))
                        .at(position.clone()),
                );
            }
            match value {
                Some(value) => value.emit(cx, StackSemantics::Value)?,
                None => cx.target.emit_null(position),
            }
            let kind = if variant == ReturnVariant::Set {
                ReturnKind::Set
            } else {
                ReturnKind::Continue
            };
            cx.target.emit(position, Instruction::Return(kind));
        }
        ReturnVariant::Break => {
            if let Some(value) = value {
                value.emit(cx, StackSemantics::Effect)?;
            }
            cx.target.emit(position, Instruction::Return(ReturnKind::Break));
        }
    }
    Ok(())
}

/// ```text
///     try
///     body
///     leave end
/// catch:
///     exception_var = exc   ; when bound
///     catch body
///     leave end
/// finally:
///     finally body
/// end:
/// ```
///
/// Without a catch the handler only rethrows, and is left out entirely
/// when a finally takes care of the exception.
fn emit_try(
    cx: &mut CompileContext<'_>,
    position: &Position,
    kind: ProtectedKind,
    try_block: &mut Block,
    catch_block: &mut Block,
    exception_var: Option<&Expr>,
    finally_block: &mut Block,
) -> Result<(), InternalError> {
    if try_block.is_empty() {
        return emit_block(finally_block, cx, StackSemantics::Effect);
    }

    let end = cx.fresh_label("try\\end");
    let begin_try = cx.target.next_address();
    cx.target.emit(position, Instruction::Try);
    cx.enter_protected(kind);
    emit_block(try_block, cx, StackSemantics::Effect)?;
    cx.target.emit_leave(position, &end);
    cx.leave_protected()?;

    let has_catch = !catch_block.is_empty() || exception_var.is_some();
    let begin_catch = if has_catch {
        let address = cx.target.next_address();
        cx.enter_protected(ProtectedKind::Catch);
        if let Some(variable) = exception_var {
            let exception = Expr::new(position.clone(), ExprKind::Exception);
            match variable.assigning(exception) {
                Some(mut assignment) => {
                    assignment.emit(cx, StackSemantics::Effect)?;
                }
                None => cx.report(invalid_assignment_target(
                    variable.position.clone(),
                    "the exception variable",
                )),
            }
        }
        emit_block(catch_block, cx, StackSemantics::Effect)?;
        cx.target.emit_leave(position, &end);
        cx.leave_protected()?;
        Some(address)
    } else if finally_block.is_empty() {
        let address = cx.target.next_address();
        cx.target.emit(position, Instruction::Rethrow);
        Some(address)
    } else {
        None
    };

    let begin_finally = if finally_block.is_empty() {
        None
    } else {
        let address = cx.target.next_address();
        cx.enter_protected(ProtectedKind::Finally);
        emit_block(finally_block, cx, StackSemantics::Effect)?;
        cx.leave_protected()?;
        if cx.target.next_address() == address {
            cx.target.emit(position, Instruction::Nop);
        }
        Some(address)
    };

    cx.target.emit_label(position, &end);
    let end_address = cx.target.next_address();
    cx.target.emit(position, Instruction::Nop);
    cx.target.free_label(&end);
    cx.target.register_try_region(TryRegion {
        begin_try,
        begin_finally,
        begin_catch,
        end: end_address,
        uses_exception: exception_var.is_some(),
    });
    Ok(())
}

/// `using target = resource { body }` assigns the resource through the
/// target's own node, then disposes it in a finally.
fn emit_using(
    cx: &mut CompileContext<'_>,
    position: &Position,
    target: &Expr,
    resource: &Expr,
    body: &mut Block,
) -> Result<(), InternalError> {
    let reader = match target.assigning(resource.clone()) {
        Some(mut assignment) => {
            assignment.emit(cx, StackSemantics::Effect)?;
            target.with_access(Access::Get)
        }
        None => None,
    };
    let Some(reader) = reader else {
        cx.report(invalid_assignment_target(
            target.position.clone(),
            "the target of a using statement",
        ));
        resource.clone().emit(cx, StackSemantics::Effect)?;
        return emit_block(body, cx, StackSemantics::Effect);
    };

    let dispose = Expr::member_call(position.clone(), reader, "Dispose", Access::Get, Vec::new());
    let mut finally_block = Block::new(position.clone());
    finally_block.push(Stmt::expr(dispose));
    emit_try(
        cx,
        position,
        ProtectedKind::Using,
        body,
        &mut Block::new(position.clone()),
        None,
        &mut finally_block,
    )
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "tests use unwrap to panic on unexpected state"
)]
mod tests;
