//! Diagnostics for the Quill compiler back end.
//!
//! User-facing problems (an unresolved name, a misplaced placeholder, a
//! yield inside a `finally`) are reported as [`Diagnostic`]s through a
//! [`DiagnosticSink`] and never abort compilation. The caller decides what
//! to do with the collected diagnostics once a unit is done.
//!
//! # Error Guarantees
//!
//! [`ErrorGuaranteed`] is proof that at least one error reached a sink.
//!
//! ```text
//! let guarantee = queue.emit_error(diagnostic);
//! fn compile() -> Result<Code, ErrorGuaranteed> { ... }
//! ```

mod diagnostic;
mod error_code;
mod guarantee;
pub mod queue;
mod sink;

pub use diagnostic::{
    ambiguous_import, invalid_assignment_target, placeholder_outside_partial_application,
    symbol_not_found, Diagnostic, Severity,
};
pub use error_code::ErrorCode;
pub use guarantee::ErrorGuaranteed;
pub use queue::{DiagnosticConfig, DiagnosticQueue};
pub use sink::DiagnosticSink;
