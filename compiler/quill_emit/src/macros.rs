//! The seam to the macro host.
//!
//! Expanding a macro means running user code at compile time. The compiler
//! does not know how; it hands the call site to a [`MacroHost`] and emits
//! whatever subtree comes back.

use quill_ir::{Access, EntityRef, Position};
use quill_symbols::Symbol;

use crate::{ArgumentsProxy, Expr, StackSemantics};

/// A macro call site handed to the host.
///
/// The host may rewrite `arguments` in place. Arguments it queues with
/// [`ArgumentsProxy::right_append`] are spliced in after it returns.
#[derive(Debug)]
pub struct MacroInvocation<'a> {
    pub macro_ref: &'a EntityRef,
    pub named_arguments: &'a [(String, Symbol)],
    pub access: Access,
    pub arguments: &'a mut ArgumentsProxy,
    pub semantics: StackSemantics,
    pub position: &'a Position,
}

/// Runs macros at compile time.
pub trait MacroHost {
    /// Expand a macro call.
    ///
    /// `Ok(None)` means the call site produces no code (null in value
    /// position). `Err` carries a message for the user.
    fn expand(&mut self, invocation: MacroInvocation<'_>) -> Result<Option<Expr>, String>;
}

/// A host that cannot expand anything.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoMacros;

impl MacroHost for NoMacros {
    fn expand(&mut self, invocation: MacroInvocation<'_>) -> Result<Option<Expr>, String> {
        Err(format!(
            "no macro host is available to expand `{}`",
            invocation.macro_ref.id()
        ))
    }
}
