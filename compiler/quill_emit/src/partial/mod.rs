//! Partial application.
//!
//! A node holding placeholders among its operands does not run; it builds
//! a callable that runs the node once the missing operands arrive. Every
//! partially applicable node kind lists its operands in call order (the
//! call target first, where there is one) and shares the lowering below:
//!
//! 1. Each placeholder gets a slot index. Explicit indices claim theirs,
//!    implicit ones take the lowest free slots left to right.
//! 2. A trailing run of placeholders that excess-argument application
//!    would fill in the same order anyway is dropped.
//! 3. The closed operands are emitted, followed by the slot mapping
//!    packed into integer constants, and a runtime constructor command
//!    assembles the callable.
//!
//! Mappings encode open slot `i` as `i + 1` and closed operand `j` as
//! `-(j + 1)`, one `i8` each, four to an `i32` lowest byte first.

use quill_diagnostic::{Diagnostic, ErrorCode};
use quill_ir::{Access, Constant, EntityRef, Position};
use quill_symbols::{Symbol, SymbolKind};
use rustc_hash::FxHashSet;
use smallvec::SmallVec;

use crate::ast::{Expr, ExprKind, StackSemantics};
use crate::{CompileContext, InternalError};

/// Highest index a placeholder may name explicitly.
pub const MAX_PLACEHOLDER_INDEX: u8 = 127;

/// One operand of a partially applied node.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum PartialArg {
    Closed,
    Placeholder(Option<u8>),
}

impl PartialArg {
    fn of(expr: &Expr) -> Self {
        match expr.kind {
            ExprKind::Placeholder { index } => PartialArg::Placeholder(index),
            _ => PartialArg::Closed,
        }
    }
}

/// Where an operand comes from when the partial application runs.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Slot {
    /// The `n`th closed operand, captured now.
    Closed(usize),
    /// The `n`th argument of the eventual call.
    Open(usize),
}

/// Assign slots to `args`.
///
/// Closed operands are numbered in order. Explicit placeholder indices
/// must be unique and at most [`MAX_PLACEHOLDER_INDEX`].
pub fn assign_indices(
    args: &[PartialArg],
    position: &Position,
) -> Result<SmallVec<[Slot; 8]>, Diagnostic> {
    let mut claimed = FxHashSet::default();
    for arg in args {
        if let PartialArg::Placeholder(Some(index)) = *arg {
            if index > MAX_PLACEHOLDER_INDEX {
                return Err(Diagnostic::error(ErrorCode::E3002)
                    .with_message(format!(
                        "Placeholder index {index} is out of range; the maximum is {MAX_PLACEHOLDER_INDEX}"
                    ))
                    .at(position.clone()));
            }
            if !claimed.insert(usize::from(index)) {
                return Err(Diagnostic::error(ErrorCode::E3001)
                    .with_message(format!("Placeholder index {index} is used more than once"))
                    .at(position.clone()));
            }
        }
    }

    let mut next_free = 0;
    let mut closed = 0;
    let mut slots = SmallVec::with_capacity(args.len());
    for arg in args {
        let slot = match *arg {
            PartialArg::Closed => {
                closed += 1;
                Slot::Closed(closed - 1)
            }
            PartialArg::Placeholder(Some(index)) => Slot::Open(usize::from(index)),
            PartialArg::Placeholder(None) => {
                while claimed.contains(&next_free) {
                    next_free += 1;
                }
                claimed.insert(next_free);
                Slot::Open(next_free)
            }
        };
        slots.push(slot);
    }
    Ok(slots)
}

/// Drop the trailing placeholders excess-argument application supplies.
///
/// Within the longest suffix of open slots ascending by one, the cut is
/// at the first slot whose index is one past every open index before it.
pub(crate) fn prune_trailing(slots: &mut SmallVec<[Slot; 8]>) {
    let mut start = slots.len();
    while start > 0 {
        let Slot::Open(index) = slots[start - 1] else {
            break;
        };
        match slots.get(start) {
            Some(Slot::Open(next)) if *next == index + 1 => start -= 1,
            None => start -= 1,
            _ => break,
        }
    }

    for cut in start..slots.len() {
        let expected = slots[..cut]
            .iter()
            .filter_map(|slot| match slot {
                Slot::Open(index) => Some(index + 1),
                Slot::Closed(_) => None,
            })
            .max()
            .unwrap_or(0);
        if slots[cut] == Slot::Open(expected) {
            slots.truncate(cut);
            return;
        }
    }
}

/// Pack `slots` into the constants the runtime constructor decodes: the
/// slot count, then the mappings four to an integer.
pub(crate) fn encode_mapping(slots: &[Slot], position: &Position) -> Result<Vec<Constant>, Diagnostic> {
    let mut bytes = Vec::with_capacity(slots.len());
    for slot in slots {
        let mapping = match *slot {
            Slot::Open(i) => i8::try_from(i + 1).ok(),
            Slot::Closed(j) => i16::try_from(j + 1)
                .ok()
                .and_then(|m| i8::try_from(-m).ok()),
        };
        let Some(mapping) = mapping else {
            return Err(Diagnostic::error(ErrorCode::E3003)
                .with_message("Too many arguments for a partial application")
                .at(position.clone()));
        };
        bytes.push(mapping.to_le_bytes()[0]);
    }

    let count = i64::try_from(bytes.len()).unwrap_or(i64::MAX);
    let mut constants = Vec::with_capacity(1 + bytes.len().div_ceil(4));
    constants.push(Constant::Int(count));
    for chunk in bytes.chunks(4) {
        let mut word = [0u8; 4];
        word[..chunk.len()].copy_from_slice(chunk);
        constants.push(Constant::Int(i64::from(i32::from_le_bytes(word))));
    }
    Ok(constants)
}

/// How one node kind lowers to a partial application.
struct Lowering {
    constructor: &'static str,
    /// Constants the constructor receives before the operands.
    prefix: Vec<Constant>,
    operands: Vec<Expr>,
    /// Operand 0 is a callable the remaining operands are applied to.
    calls_target: bool,
}

impl Lowering {
    fn call(target: Expr, arguments: &[Expr]) -> Self {
        let mut operands = Vec::with_capacity(arguments.len() + 1);
        operands.push(target);
        operands.extend_from_slice(arguments);
        Lowering {
            constructor: "pa.ind",
            prefix: Vec::new(),
            operands,
            calls_target: true,
        }
    }

    fn command(position: &Position, id: &str, arguments: &[Expr]) -> Self {
        let target = Expr::reference(position.clone(), EntityRef::command(id));
        Lowering::call(target, arguments)
    }

    fn of(expr: &Expr) -> Option<Self> {
        let position = &expr.position;
        let lowering = match &expr.kind {
            ExprKind::Binary { op, left, right } => Lowering::command(
                position,
                op.command_alias(),
                &[(**left).clone(), (**right).clone()],
            ),
            ExprKind::Unary { op, operand } => {
                Lowering::command(position, op.command_alias(), &[(**operand).clone()])
            }
            ExprKind::StringConcat(arguments) => Lowering::command(position, "string_concat", arguments),
            ExprKind::List(elements) => Lowering::command(position, "list", elements),
            ExprKind::Symbol {
                access: Access::Get,
                symbol,
                arguments,
            } => Lowering::call(call_target(position, symbol)?, arguments.as_slice()),
            ExprKind::IndirectCall {
                subject, arguments, ..
            } => Lowering::call((**subject).clone(), arguments.as_slice()),
            ExprKind::MemberCall {
                subject,
                member,
                access,
                arguments,
            } => {
                let mut operands = vec![(**subject).clone()];
                operands.extend_from_slice(arguments.as_slice());
                Lowering {
                    constructor: "pa.mem",
                    prefix: vec![Constant::string(member.as_str()), Constant::Bool(*access == Access::Set)],
                    operands,
                    calls_target: false,
                }
            }
            ExprKind::StaticCall {
                type_name,
                member,
                access,
                arguments,
            } => Lowering {
                constructor: "pa.static",
                prefix: vec![
                    Constant::string(type_name.as_str()),
                    Constant::string(member.as_str()),
                    Constant::Bool(*access == Access::Set),
                ],
                operands: arguments.as_slice().to_vec(),
                calls_target: false,
            },
            ExprKind::ObjectCreation {
                type_name,
                arguments,
            } => Lowering {
                constructor: "pa.new",
                prefix: vec![Constant::string(type_name.as_str())],
                operands: arguments.as_slice().to_vec(),
                calls_target: false,
            },
            ExprKind::TypeCheck { subject, ty } | ExprKind::TypeCast { subject, ty } => Lowering {
                constructor: if matches!(expr.kind, ExprKind::TypeCheck { .. }) {
                    "pa.check"
                } else {
                    "pa.cast"
                },
                prefix: Vec::new(),
                operands: vec![(**subject).clone(), (**ty).clone()],
                calls_target: false,
            },
            _ => return None,
        };
        Some(lowering)
    }
}

/// The value a callable symbol calls: a variable's content, a reference
/// to a function or command, or whatever an inner dereference yields.
fn call_target(position: &Position, symbol: &Symbol) -> Option<Expr> {
    let (_, core) = symbol.split_messages();
    let SymbolKind::Dereference(inner) = core.kind() else {
        return None;
    };
    let (_, inner) = inner.split_messages();
    let target = match inner.kind() {
        SymbolKind::Reference(EntityRef::Variable(_)) => core.clone(),
        SymbolKind::Reference(EntityRef::MacroCommand { .. }) => return None,
        SymbolKind::Reference(_) | SymbolKind::Dereference(_) => inner.clone(),
        _ => return None,
    };
    Some(Expr::symbol(position.clone(), Access::Get, target, Vec::new()))
}

/// Emit `expr`, which holds placeholders, as a partial application.
pub(crate) fn emit_partial_application(
    expr: &mut Expr,
    cx: &mut CompileContext<'_>,
) -> Result<(), InternalError> {
    let position = expr.position.clone();
    let Some(lowering) = Lowering::of(expr) else {
        cx.report(quill_diagnostic::placeholder_outside_partial_application(position.clone()));
        cx.target.emit_null(&position);
        return Ok(());
    };

    // Messages on the symbol are reported once the call is emitted.
    if let ExprKind::Symbol { symbol, .. } = &expr.kind {
        for diagnostic in symbol.split_messages().0 {
            cx.report(diagnostic.clone());
        }
    }

    let args: SmallVec<[PartialArg; 8]> = lowering.operands.iter().map(PartialArg::of).collect();
    let mut slots = match assign_indices(&args, &position) {
        Ok(slots) => slots,
        Err(diagnostic) => {
            cx.report(diagnostic);
            cx.target.emit_null(&position);
            return Ok(());
        }
    };
    prune_trailing(&mut slots);
    tracing::trace!(%position, constructor = lowering.constructor, slots = slots.len(), "lowering partial application");

    let Lowering {
        constructor,
        prefix,
        mut operands,
        calls_target,
    } = lowering;
    let closed_count = slots.iter().filter(|slot| matches!(slot, Slot::Closed(_))).count();

    if calls_target && slots.first() == Some(&Slot::Closed(0)) {
        let rest = &slots[1..];
        if rest.is_empty() {
            return operands[0].emit(cx, StackSemantics::Value);
        }
        let all_closed = |slots: &[Slot]| slots.iter().all(|slot| matches!(slot, Slot::Closed(_)));
        let fast_path = if all_closed(rest) {
            Some("pa.call")
        } else if rest[0] == Slot::Open(0) && rest.len() > 1 && all_closed(&rest[1..]) {
            Some("pa.flip.call")
        } else {
            None
        };
        if let Some(command) = fast_path {
            emit_closed(&mut operands, cx)?;
            cx.target.emit_command_call(&position, command, closed_count, false);
            return Ok(());
        }
    }

    let mapping = if slots.is_empty() {
        Vec::new()
    } else {
        match encode_mapping(&slots, &position) {
            Ok(mapping) => mapping,
            Err(diagnostic) => {
                cx.report(diagnostic);
                cx.target.emit_null(&position);
                return Ok(());
            }
        }
    };

    let count = prefix.len() + closed_count + mapping.len();
    for constant in prefix {
        cx.target.emit_constant(&position, constant);
    }
    emit_closed(&mut operands, cx)?;
    for constant in mapping {
        cx.target.emit_constant(&position, constant);
    }
    cx.target.emit_command_call(&position, constructor, count, false);
    Ok(())
}

fn emit_closed(operands: &mut [Expr], cx: &mut CompileContext<'_>) -> Result<(), InternalError> {
    for operand in operands.iter_mut().filter(|operand| !operand.is_placeholder()) {
        operand.emit(cx, StackSemantics::Value)?;
    }
    Ok(())
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "tests use unwrap to panic on unexpected state"
)]
mod tests;
