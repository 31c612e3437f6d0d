//! Tail-call rewriting.
//!
//! Runs once over a function body before emission. Only the last
//! statement of a block is in tail position, and through it the arms of
//! a trailing `if` and the statements of a trailing nested block.
//!
//! - A trailing bare call becomes `return call`.
//! - `return c ? a : b` becomes `if c { return a } else { return b }`.
//! - `return self(args)` becomes argument temporaries, parameter stores
//!   and a jump back to the function entry.

use quill_ir::{Access, EntityRef, JumpTarget, Position};
use quill_symbols::{Symbol, SymbolKind};

use crate::ast::{Block, Expr, ExprKind, ReturnVariant, Stmt, StmtKind};
use crate::{ensure_sufficient_stack, CompileContext};

/// Rewrite the tail positions of `block`, returning how many rewrites
/// were made. Self calls jump back to `entry`.
pub(crate) fn rewrite_tail_calls(block: &mut Block, cx: &mut CompileContext<'_>, entry: usize) -> usize {
    ensure_sufficient_stack(|| {
        let mut rewritten = 0;
        // A trailing call expression is in tail position as well.
        if block.expression.as_deref().is_some_and(|expr| called_entity(expr, cx).is_some()) {
            if let Some(expression) = block.expression.take() {
                rewritten += 1;
                let position = expression.position.clone();
                block.push(Stmt::new(
                    position,
                    StmtKind::Return {
                        variant: ReturnVariant::Exit,
                        value: Some(*expression),
                    },
                ));
            }
        }
        if block.expression.is_some() {
            return rewritten;
        }
        let Some(last) = block.statements.last_mut() else {
            return rewritten;
        };
        rewritten + rewrite_statement(last, cx, entry)
    })
}

fn rewrite_statement(stmt: &mut Stmt, cx: &mut CompileContext<'_>, entry: usize) -> usize {
    let position = stmt.position.clone();
    match &mut stmt.kind {
        StmtKind::Expr(expr) if called_entity(expr, cx).is_some() => {
            let value = std::mem::replace(expr, Expr::null(position.clone()));
            stmt.kind = StmtKind::Return {
                variant: ReturnVariant::Exit,
                value: Some(value),
            };
            1 + rewrite_statement(stmt, cx, entry)
        }
        StmtKind::Return {
            variant: ReturnVariant::Exit,
            value: Some(value),
        } => match &mut value.kind {
            ExprKind::Conditional {
                condition,
                then,
                otherwise,
                negative,
            } => {
                let condition = std::mem::replace(&mut **condition, Expr::null(position.clone()));
                let (mut then, mut otherwise) = (
                    std::mem::replace(&mut **then, Expr::null(position.clone())),
                    std::mem::replace(&mut **otherwise, Expr::null(position.clone())),
                );
                if *negative {
                    std::mem::swap(&mut then, &mut otherwise);
                }
                let mut if_block = Block::with_statements(
                    position.clone(),
                    vec![Stmt::ret(then.position.clone(), ReturnVariant::Exit, Some(then))],
                );
                let mut else_block = Block::with_statements(
                    position.clone(),
                    vec![Stmt::ret(otherwise.position.clone(), ReturnVariant::Exit, Some(otherwise))],
                );
                let rewritten = 1 + rewrite_tail_calls(&mut if_block, cx, entry)
                    + rewrite_tail_calls(&mut else_block, cx, entry);
                *stmt = Stmt::condition(position, condition, if_block, else_block);
                rewritten
            }
            _ => match self_call_arguments(value, cx) {
                Some(arguments) => {
                    *stmt = Stmt::block(self_jump(cx, &position, arguments, entry));
                    tracing::trace!(%position, function = %cx.function.id, "rewrote self-recursive return");
                    1
                }
                None => 0,
            },
        },
        StmtKind::Block(block) => rewrite_tail_calls(block, cx, entry),
        StmtKind::Condition {
            if_block,
            else_block,
            ..
        } => rewrite_tail_calls(if_block, cx, entry) + rewrite_tail_calls(else_block, cx, entry),
        _ => 0,
    }
}

/// The function or command `expr` calls, if it is a plain call.
fn called_entity(expr: &Expr, cx: &CompileContext<'_>) -> Option<EntityRef> {
    let symbol = match &expr.kind {
        ExprKind::Symbol {
            access: Access::Get,
            symbol,
            ..
        } => symbol.clone(),
        ExprKind::Identifier {
            name,
            access: Access::Get,
            ..
        } => cx.resolve(name)?,
        _ => return None,
    };
    if expr.check_for_placeholders() {
        return None;
    }
    callable_entity(&symbol)
}

fn callable_entity(symbol: &Symbol) -> Option<EntityRef> {
    let (_, core) = symbol.split_messages();
    let SymbolKind::Dereference(inner) = core.kind() else {
        return None;
    };
    let (_, inner) = inner.split_messages();
    match inner.kind() {
        SymbolKind::Reference(entity @ (EntityRef::Function { .. } | EntityRef::Command { .. })) => {
            Some(entity.clone())
        }
        _ => None,
    }
}

/// The arguments of a call to the function being compiled, when the call
/// can reuse the current frame.
fn self_call_arguments(value: &mut Expr, cx: &CompileContext<'_>) -> Option<Vec<Expr>> {
    let entity = called_entity(value, cx)?;
    let function = &cx.function;
    if !function.is_self(&entity) || function.uses_arguments {
        return None;
    }
    let arguments = match &mut value.kind {
        ExprKind::Symbol { arguments, .. } | ExprKind::Identifier { arguments, .. } => arguments,
        _ => return None,
    };
    if arguments.len() > function.parameters.len() || arguments.pending_len() > 0 {
        return None;
    }
    Some(std::mem::take(arguments).into_vec())
}

/// Evaluate every argument before any parameter is overwritten, then
/// restart the function.
fn self_jump(
    cx: &mut CompileContext<'_>,
    position: &Position,
    arguments: Vec<Expr>,
    entry: usize,
) -> Block {
    let mut block = Block::new(position.clone());
    let mut temporaries = Vec::with_capacity(arguments.len());
    for argument in arguments {
        let temporary = cx.allocate_temporary("tail\\arg");
        let argument_position = argument.position.clone();
        block.push(Stmt::expr(Expr::assign(
            argument_position,
            EntityRef::local(temporary.as_str()),
            argument,
        )));
        temporaries.push(temporary);
    }
    let parameters = cx.function.parameters.clone();
    for (i, parameter) in parameters.into_iter().enumerate() {
        let value = match temporaries.get(i) {
            Some(temporary) => Expr::call(position.clone(), EntityRef::local(temporary.as_str()), Vec::new()),
            None => Expr::null(position.clone()),
        };
        block.push(Stmt::expr(Expr::assign(position.clone(), EntityRef::local(parameter), value)));
    }
    block.push(Stmt::new(position.clone(), StmtKind::Goto(JumpTarget::Address(entry))));
    block
}
