//! The narrow interface compiler passes report through.

use crate::Diagnostic;

/// Receives diagnostics as they are produced.
///
/// Reporting is never fatal: after `report` returns, the pass carries on
/// with a best-effort result.
pub trait DiagnosticSink {
    /// Record a diagnostic.
    fn report(&mut self, diagnostic: Diagnostic);

    /// Number of errors (not warnings) recorded so far.
    fn error_count(&self) -> usize;
}

impl DiagnosticSink for Vec<Diagnostic> {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.push(diagnostic);
    }

    fn error_count(&self) -> usize {
        self.iter().filter(|d| d.is_error()).count()
    }
}
