//! Core diagnostic type and constructors for the common cases.

use std::fmt;

use quill_ir::Position;

use crate::ErrorCode;

/// Severity level for diagnostics.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Severity {
    Error,
    Warning,
    Note,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Note => write!(f, "note"),
        }
    }
}

/// A diagnostic anchored at a source position.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
#[must_use = "diagnostics should be reported or returned, not silently dropped"]
pub struct Diagnostic {
    /// Error code for searchability.
    pub code: ErrorCode,
    /// Severity level.
    pub severity: Severity,
    /// Main message.
    pub message: String,
    /// Where the problem is.
    pub position: Position,
    /// Additional notes providing context.
    pub notes: Vec<String>,
}

impl Diagnostic {
    fn new_with_severity(code: ErrorCode, severity: Severity) -> Self {
        Diagnostic {
            code,
            severity,
            message: String::new(),
            position: Position::synthetic(),
            notes: Vec::new(),
        }
    }

    /// Create a new error diagnostic.
    #[cold]
    pub fn error(code: ErrorCode) -> Self {
        Self::new_with_severity(code, Severity::Error)
    }

    /// Create a new warning diagnostic.
    #[cold]
    pub fn warning(code: ErrorCode) -> Self {
        Self::new_with_severity(code, Severity::Warning)
    }

    /// Set the main message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Anchor the diagnostic at a source position.
    pub fn at(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    /// Add a note providing additional context.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    #[inline]
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    #[inline]
    pub fn is_warning(&self) -> bool {
        self.severity == Severity::Warning
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}]: {} at {}",
            self.severity, self.code, self.message, self.position
        )?;
        for note in &self.notes {
            write!(f, "\n  = note: {note}")?;
        }
        Ok(())
    }
}

/// "Symbol 'name' not found".
#[cold]
pub fn symbol_not_found(position: Position, name: &str) -> Diagnostic {
    Diagnostic::error(ErrorCode::E2001)
        .with_message(format!("Symbol '{name}' not found"))
        .at(position)
}

/// A name imported from more than one origin with different meanings.
#[cold]
pub fn ambiguous_import(position: Position, name: &str, origins: &[&str]) -> Diagnostic {
    let diag = Diagnostic::error(ErrorCode::E2002)
        .with_message(format!("Symbol '{name}' is ambiguous"))
        .at(position);
    if origins.is_empty() {
        diag
    } else {
        diag.with_note(format!("imported from {}", origins.join(", ")))
    }
}

/// The symbol cannot be written to.
#[cold]
pub fn invalid_assignment_target(position: Position, what: &str) -> Diagnostic {
    Diagnostic::error(ErrorCode::E2004)
        .with_message(format!("Cannot assign to {what}"))
        .at(position)
}

/// A placeholder appeared where no partial application can be formed.
#[cold]
pub fn placeholder_outside_partial_application(position: Position) -> Diagnostic {
    Diagnostic::error(ErrorCode::E3004)
        .with_message("Placeholder is not part of a partial application")
        .at(position)
}
