//! The symbol sum type.

use std::fmt;
use std::rc::Rc;

use quill_diagnostic::Diagnostic;
use quill_ir::{EntityRef, Position};

use crate::SymbolStore;

/// What a name means at a particular source position.
///
/// Equality ignores positions: two symbols are equal when they have the
/// same variant and structurally equal payloads. Namespaces compare by
/// identity of their view.
#[derive(Clone, Debug)]
pub struct Symbol {
    kind: SymbolKind,
    position: Position,
}

#[derive(Clone, Debug)]
pub enum SymbolKind {
    /// Names an entity directly.
    Reference(EntityRef),
    /// Call or read through the wrapped symbol.
    Dereference(Box<Symbol>),
    /// The wrapped symbol is a macro to expand.
    Expand(Box<Symbol>),
    /// Explicitly no value. Distinct from "not found".
    Nil,
    /// A nested scope.
    Namespace {
        view: Rc<SymbolStore>,
        logical_name: String,
    },
    /// Any symbol carrying a diagnostic, reported when the symbol is used.
    Message {
        diagnostic: Diagnostic,
        inner: Box<Symbol>,
    },
    /// A macro with some named arguments already bound.
    MacroInstance {
        macro_ref: EntityRef,
        named_arguments: Vec<(String, Symbol)>,
    },
}

impl Symbol {
    pub fn new(kind: SymbolKind, position: Position) -> Self {
        Symbol { kind, position }
    }

    pub fn reference(entity: EntityRef, position: Position) -> Self {
        Symbol::new(SymbolKind::Reference(entity), position)
    }

    /// `Dereference(Reference(entity))`: read a variable or call a callable.
    pub fn call(entity: EntityRef, position: Position) -> Self {
        let reference = Symbol::reference(entity, position.clone());
        Symbol::dereference(reference, position)
    }

    pub fn dereference(inner: Symbol, position: Position) -> Self {
        Symbol::new(SymbolKind::Dereference(Box::new(inner)), position)
    }

    pub fn expand(inner: Symbol, position: Position) -> Self {
        Symbol::new(SymbolKind::Expand(Box::new(inner)), position)
    }

    pub fn nil(position: Position) -> Self {
        Symbol::new(SymbolKind::Nil, position)
    }

    pub fn namespace(
        view: Rc<SymbolStore>,
        logical_name: impl Into<String>,
        position: Position,
    ) -> Self {
        Symbol::new(
            SymbolKind::Namespace {
                view,
                logical_name: logical_name.into(),
            },
            position,
        )
    }

    /// Decorate `inner` with a diagnostic. The message symbol sits where
    /// the diagnostic points.
    pub fn message(diagnostic: Diagnostic, inner: Symbol) -> Self {
        let position = diagnostic.position.clone();
        Symbol::new(
            SymbolKind::Message {
                diagnostic,
                inner: Box::new(inner),
            },
            position,
        )
    }

    pub fn macro_instance(
        macro_ref: EntityRef,
        named_arguments: Vec<(String, Symbol)>,
        position: Position,
    ) -> Self {
        Symbol::new(
            SymbolKind::MacroInstance {
                macro_ref,
                named_arguments,
            },
            position,
        )
    }

    #[inline]
    pub fn kind(&self) -> &SymbolKind {
        &self.kind
    }

    #[inline]
    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn into_kind(self) -> SymbolKind {
        self.kind
    }

    /// Check if this symbol only decorates another one.
    pub fn is_wrapper(&self) -> bool {
        matches!(
            self.kind,
            SymbolKind::Dereference(_) | SymbolKind::Expand(_) | SymbolKind::Message { .. }
        )
    }

    /// The decorated symbol, for wrapper variants.
    pub fn inner(&self) -> Option<&Symbol> {
        match &self.kind {
            SymbolKind::Dereference(inner)
            | SymbolKind::Expand(inner)
            | SymbolKind::Message { inner, .. } => Some(inner),
            _ => None,
        }
    }

    /// Peel off any `Message` decorations, returning the diagnostics
    /// outermost first along with the undecorated symbol.
    pub fn split_messages(&self) -> (Vec<&Diagnostic>, &Symbol) {
        let mut messages = Vec::new();
        let mut current = self;
        while let SymbolKind::Message { diagnostic, inner } = &current.kind {
            messages.push(diagnostic);
            current = inner;
        }
        (messages, current)
    }

    /// Check if this symbol or anything it wraps carries an error.
    pub fn has_error(&self) -> bool {
        match &self.kind {
            SymbolKind::Message { diagnostic, inner } => diagnostic.is_error() || inner.has_error(),
            SymbolKind::Dereference(inner) | SymbolKind::Expand(inner) => inner.has_error(),
            _ => false,
        }
    }

    /// The entity this symbol ultimately references, through any wrappers.
    pub fn entity(&self) -> Option<&EntityRef> {
        match &self.kind {
            SymbolKind::Reference(entity) => Some(entity),
            SymbolKind::MacroInstance { macro_ref, .. } => Some(macro_ref),
            _ => self.inner().and_then(Symbol::entity),
        }
    }
}

impl PartialEq for SymbolKind {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (SymbolKind::Reference(a), SymbolKind::Reference(b)) => a == b,
            (SymbolKind::Dereference(a), SymbolKind::Dereference(b))
            | (SymbolKind::Expand(a), SymbolKind::Expand(b)) => a == b,
            (SymbolKind::Nil, SymbolKind::Nil) => true,
            (
                SymbolKind::Namespace {
                    view: a,
                    logical_name: an,
                },
                SymbolKind::Namespace {
                    view: b,
                    logical_name: bn,
                },
            ) => Rc::ptr_eq(a, b) && an == bn,
            (
                SymbolKind::Message {
                    diagnostic: ad,
                    inner: ai,
                },
                SymbolKind::Message {
                    diagnostic: bd,
                    inner: bi,
                },
            ) => ad.code == bd.code && ad.message == bd.message && ai == bi,
            (
                SymbolKind::MacroInstance {
                    macro_ref: am,
                    named_arguments: aa,
                },
                SymbolKind::MacroInstance {
                    macro_ref: bm,
                    named_arguments: ba,
                },
            ) => am == bm && aa == ba,
            _ => false,
        }
    }
}

impl Eq for SymbolKind {}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

impl Eq for Symbol {}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            SymbolKind::Reference(entity) => write!(f, "ref({entity})"),
            SymbolKind::Dereference(inner) => write!(f, "deref({inner})"),
            SymbolKind::Expand(inner) => write!(f, "expand({inner})"),
            SymbolKind::Nil => f.write_str("nil"),
            SymbolKind::Namespace { logical_name, .. } => write!(f, "namespace {logical_name}"),
            SymbolKind::Message { diagnostic, inner } => {
                write!(f, "message({}: {}, {inner})", diagnostic.code, diagnostic.message)
            }
            SymbolKind::MacroInstance {
                macro_ref,
                named_arguments,
            } => {
                write!(f, "macro({macro_ref}")?;
                for (name, value) in named_arguments {
                    write!(f, ", {name}: {value}")?;
                }
                f.write_str(")")
            }
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "tests use unwrap to panic on unexpected state"
)]
