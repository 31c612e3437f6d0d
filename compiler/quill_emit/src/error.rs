//! Compiler-internal errors.
//!
//! These are bugs in the compiler or its host, not in the program being
//! compiled. They abort the current unit. User mistakes go through the
//! diagnostic sink instead.

use quill_ir::Position;
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InternalError {
    #[error("macro `{macro_id}` at {position} is already being expanded")]
    ReentrantMacroExpansion { macro_id: String, position: Position },

    #[error("could not locate the `{call}` call site recorded for the foreach at {position}")]
    MissingHintAddress {
        call: &'static str,
        position: Position,
    },

    #[error("{what} at {position} was used before it was initialized")]
    Uninitialized {
        what: &'static str,
        position: Position,
    },

    #[error("unbalanced scope: {0}")]
    UnbalancedScope(String),

    #[error("label `{0}` is referenced but never bound")]
    UnboundLabel(String),
}
