//! Access through a resolved symbol.
//!
//! The symbol decides what an access means: reading or writing a
//! variable, calling through a variable, calling a function or command,
//! pushing a reference, or handing the call site to the macro host.
//! Diagnostics attached to the symbol are reported on the way in.

use quill_diagnostic::{invalid_assignment_target, Diagnostic, ErrorCode};
use quill_ir::{Access, CallKind, EntityRef, Instruction, Position, VariableRef};
use quill_symbols::{Symbol, SymbolKind};

use super::finish_call;
use crate::ast::StackSemantics;
use crate::optimize::optimize_expr;
use crate::{ArgumentsProxy, CompileContext, InternalError, MacroHost, MacroInvocation, NoMacros};

fn report_messages(cx: &mut CompileContext<'_>, symbol: &Symbol) -> Symbol {
    let (messages, core) = symbol.split_messages();
    for diagnostic in messages {
        cx.report(diagnostic.clone());
    }
    core.clone()
}

fn emit_arguments(
    cx: &mut CompileContext<'_>,
    arguments: &mut ArgumentsProxy,
    semantics: StackSemantics,
) -> Result<(), InternalError> {
    for argument in arguments {
        argument.emit(cx, semantics)?;
    }
    Ok(())
}

/// Evaluate the arguments for their effect and produce null in value mode.
fn emit_nothing(
    cx: &mut CompileContext<'_>,
    position: &Position,
    arguments: &mut ArgumentsProxy,
    semantics: StackSemantics,
) -> Result<(), InternalError> {
    emit_arguments(cx, arguments, StackSemantics::Effect)?;
    if semantics == StackSemantics::Value {
        cx.target.emit_null(position);
    }
    Ok(())
}

pub(crate) fn emit_symbol(
    cx: &mut CompileContext<'_>,
    position: &Position,
    access: Access,
    symbol: &Symbol,
    arguments: &mut ArgumentsProxy,
    semantics: StackSemantics,
) -> Result<(), InternalError> {
    let symbol = report_messages(cx, symbol);
    match symbol.kind() {
        SymbolKind::Dereference(inner) => emit_dereference(cx, position, access, inner, arguments, semantics),
        SymbolKind::Reference(EntityRef::MacroCommand { id }) => {
            cx.report(
                Diagnostic::error(ErrorCode::E2005)
                    .with_message(format!("Cannot take a reference to macro command '{id}'"))
                    .at(position.clone()),
            );
            emit_nothing(cx, position, arguments, semantics)
        }
        SymbolKind::Reference(entity) => {
            if !arguments.is_empty() || access == Access::Set {
                cx.report(
                    Diagnostic::error(ErrorCode::E2006)
                        .with_message(format!("A reference to {entity} cannot be called or assigned"))
                        .at(position.clone()),
                );
                return emit_nothing(cx, position, arguments, semantics);
            }
            if semantics == StackSemantics::Value {
                cx.target
                    .emit(position, Instruction::LoadReference(entity.clone()));
            }
            Ok(())
        }
        SymbolKind::Nil => emit_nothing(cx, position, arguments, semantics),
        SymbolKind::Namespace { logical_name, .. } => {
            cx.report(
                Diagnostic::error(ErrorCode::E2003)
                    .with_message(format!("Namespace '{logical_name}' cannot be used as a value"))
                    .at(position.clone()),
            );
            emit_nothing(cx, position, arguments, semantics)
        }
        SymbolKind::Expand(inner) => {
            let target = report_messages(cx, inner);
            match target.kind() {
                SymbolKind::Reference(macro_ref) => {
                    expand_macro(cx, position, macro_ref, &[], access, arguments, semantics)
                }
                SymbolKind::MacroInstance {
                    macro_ref,
                    named_arguments,
                } => expand_macro(cx, position, macro_ref, named_arguments, access, arguments, semantics),
                _ => emit_symbol(cx, position, access, &target, arguments, semantics),
            }
        }
        SymbolKind::MacroInstance {
            macro_ref,
            named_arguments,
        } => expand_macro(cx, position, macro_ref, named_arguments, access, arguments, semantics),
        SymbolKind::Message { inner, .. } => emit_symbol(cx, position, access, inner, arguments, semantics),
    }
}

fn emit_dereference(
    cx: &mut CompileContext<'_>,
    position: &Position,
    access: Access,
    inner: &Symbol,
    arguments: &mut ArgumentsProxy,
    semantics: StackSemantics,
) -> Result<(), InternalError> {
    let inner = report_messages(cx, inner);
    match inner.kind() {
        SymbolKind::Reference(entity) => emit_entity(cx, position, access, entity, arguments, semantics),
        SymbolKind::Dereference(callee) => {
            let callee = report_messages(cx, callee);
            let kind = match callee.kind() {
                SymbolKind::Reference(EntityRef::Variable(VariableRef::Local { id })) => {
                    CallKind::IndirectLocal { id: id.clone() }
                }
                SymbolKind::Reference(EntityRef::Variable(VariableRef::Global { id, module })) => {
                    CallKind::IndirectGlobal {
                        id: id.clone(),
                        module: module.clone(),
                    }
                }
                _ => {
                    // Compute the callee first, then call whatever it yields.
                    emit_symbol(
                        cx,
                        position,
                        Access::Get,
                        &inner,
                        &mut ArgumentsProxy::default(),
                        StackSemantics::Value,
                    )?;
                    emit_arguments(cx, arguments, StackSemantics::Value)?;
                    let n = arguments.len();
                    finish_call(cx, position, access, n + 1, semantics, |just_effect| {
                        Instruction::Call {
                            kind: CallKind::Indirect,
                            arguments: n,
                            just_effect,
                        }
                    });
                    return Ok(());
                }
            };
            emit_arguments(cx, arguments, StackSemantics::Value)?;
            let n = arguments.len();
            finish_call(cx, position, access, n, semantics, |just_effect| Instruction::Call {
                kind,
                arguments: n,
                just_effect,
            });
            Ok(())
        }
        _ => emit_symbol(cx, position, access, &inner, arguments, semantics),
    }
}

fn emit_entity(
    cx: &mut CompileContext<'_>,
    position: &Position,
    access: Access,
    entity: &EntityRef,
    arguments: &mut ArgumentsProxy,
    semantics: StackSemantics,
) -> Result<(), InternalError> {
    match entity {
        EntityRef::Variable(variable) => emit_variable(cx, position, access, variable, arguments, semantics),
        EntityRef::Function { id, module } => {
            emit_arguments(cx, arguments, StackSemantics::Value)?;
            let n = arguments.len();
            let kind = CallKind::Function {
                id: id.clone(),
                module: module.clone(),
            };
            finish_call(cx, position, access, n, semantics, |just_effect| Instruction::Call {
                kind,
                arguments: n,
                just_effect,
            });
            Ok(())
        }
        EntityRef::Command { id } => {
            emit_arguments(cx, arguments, StackSemantics::Value)?;
            let n = arguments.len();
            let kind = CallKind::Command { id: id.clone() };
            finish_call(cx, position, access, n, semantics, |just_effect| Instruction::Call {
                kind,
                arguments: n,
                just_effect,
            });
            Ok(())
        }
        EntityRef::MacroCommand { .. } => {
            expand_macro(cx, position, entity, &[], access, arguments, semantics)
        }
    }
}

fn emit_variable(
    cx: &mut CompileContext<'_>,
    position: &Position,
    access: Access,
    variable: &VariableRef,
    arguments: &mut ArgumentsProxy,
    semantics: StackSemantics,
) -> Result<(), InternalError> {
    match access {
        Access::Get if arguments.is_empty() => {
            if semantics == StackSemantics::Value {
                match variable {
                    VariableRef::Local { id } => cx.target.emit_load_local(position, id),
                    VariableRef::Global { id, module } => cx.target.emit_load_global(position, id, module),
                }
            }
            Ok(())
        }
        Access::Get => {
            emit_arguments(cx, arguments, StackSemantics::Value)?;
            let n = arguments.len();
            let kind = match variable {
                VariableRef::Local { id } => CallKind::IndirectLocal { id: id.clone() },
                VariableRef::Global { id, module } => CallKind::IndirectGlobal {
                    id: id.clone(),
                    module: module.clone(),
                },
            };
            finish_call(cx, position, access, n, semantics, |just_effect| Instruction::Call {
                kind,
                arguments: n,
                just_effect,
            });
            Ok(())
        }
        Access::Set => {
            if arguments.len() != 1 {
                cx.report(invalid_assignment_target(
                    position.clone(),
                    &format!("variable '{}' with {} values", variable.id(), arguments.len()),
                ));
                return emit_nothing(cx, position, arguments, semantics);
            }
            let value = &mut arguments[0];
            value.emit(cx, StackSemantics::Value)?;
            if semantics == StackSemantics::Value {
                cx.target.emit(position, Instruction::Duplicate(1));
            }
            match variable {
                VariableRef::Local { id } => cx.target.emit_store_local(position, id),
                VariableRef::Global { id, module } => cx.target.emit_store_global(position, id, module),
            }
            Ok(())
        }
    }
}

fn expand_macro(
    cx: &mut CompileContext<'_>,
    position: &Position,
    macro_ref: &EntityRef,
    named_arguments: &[(String, Symbol)],
    access: Access,
    arguments: &mut ArgumentsProxy,
    semantics: StackSemantics,
) -> Result<(), InternalError> {
    cx.begin_expansion(arguments, macro_ref, position)?;
    let result = expand_and_emit(cx, position, macro_ref, named_arguments, access, arguments, semantics);
    cx.end_expansion();
    result
}

fn expand_and_emit(
    cx: &mut CompileContext<'_>,
    position: &Position,
    macro_ref: &EntityRef,
    named_arguments: &[(String, Symbol)],
    access: Access,
    arguments: &mut ArgumentsProxy,
    semantics: StackSemantics,
) -> Result<(), InternalError> {
    arguments.remember_position();
    let invocation = MacroInvocation {
        macro_ref,
        named_arguments,
        access,
        arguments: &mut *arguments,
        semantics,
        position,
    };
    let expansion = match cx.macro_host() {
        Some(host) => host.expand(invocation),
        None => NoMacros.expand(invocation),
    };
    arguments.release_right_append();
    tracing::debug!(
        macro_id = macro_ref.id(),
        %position,
        expanded = matches!(expansion, Ok(Some(_))),
        "expanded macro"
    );

    match expansion {
        Ok(Some(mut replacement)) => {
            if cx.options.optimize {
                optimize_expr(&mut replacement, cx)?;
            }
            replacement.emit(cx, semantics)
        }
        Ok(None) => {
            if semantics == StackSemantics::Value {
                cx.target.emit_null(position);
            }
            Ok(())
        }
        Err(message) => {
            cx.report(
                Diagnostic::error(ErrorCode::E4003)
                    .with_message(format!("Expansion of macro '{}' failed", macro_ref.id()))
                    .with_note(message)
                    .at(position.clone()),
            );
            if semantics == StackSemantics::Value {
                cx.target.emit_null(position);
            }
            Ok(())
        }
    }
}
