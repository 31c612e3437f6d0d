//! Diagnostic queue for collecting, deduplicating, and sorting diagnostics.
//!
//! Features:
//! - Error limits to keep output manageable
//! - Deduplication of same-line errors with similar messages
//! - Position-sorted flushing
//! - `ErrorGuaranteed` proof that errors were emitted

use std::hash::{Hash, Hasher};

use crate::{Diagnostic, DiagnosticSink, ErrorGuaranteed};

/// Number of characters to use for message prefix deduplication.
const MESSAGE_PREFIX_LEN: usize = 30;

/// Hash the first N characters of a message for dedup comparison.
#[inline]
fn message_prefix_hash(msg: &str) -> u64 {
    let byte_end = msg
        .char_indices()
        .nth(MESSAGE_PREFIX_LEN)
        .map_or(msg.len(), |(idx, _)| idx);
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    msg[..byte_end].hash(&mut hasher);
    hasher.finish()
}

/// Configuration for diagnostic processing.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct DiagnosticConfig {
    /// Maximum number of errors before further errors are dropped (0 = unlimited).
    pub error_limit: usize,
    /// Deduplicate errors with same line and similar message.
    pub deduplicate: bool,
}

impl Default for DiagnosticConfig {
    fn default() -> Self {
        DiagnosticConfig {
            error_limit: 64,
            deduplicate: true,
        }
    }
}

impl DiagnosticConfig {
    /// Create a config with no limits (for testing).
    pub fn unlimited() -> Self {
        DiagnosticConfig {
            error_limit: 0,
            deduplicate: false,
        }
    }
}

/// Queue for collecting, deduplicating, and sorting diagnostics.
///
/// ```text
/// let mut queue = DiagnosticQueue::new();
/// queue.add(diagnostic);
/// let sorted = queue.flush();
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DiagnosticQueue {
    diagnostics: Vec<Diagnostic>,
    /// Count of errors (not warnings/notes).
    error_count: usize,
    /// Last (file, line, `message_prefix_hash`) for dedup.
    last_error: Option<(String, u32, u64)>,
    config: DiagnosticConfig,
}

impl Default for DiagnosticQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl DiagnosticQueue {
    /// Create a new diagnostic queue with default configuration.
    pub fn new() -> Self {
        Self::with_config(DiagnosticConfig::default())
    }

    /// Create a diagnostic queue with custom configuration.
    pub fn with_config(config: DiagnosticConfig) -> Self {
        DiagnosticQueue {
            diagnostics: Vec::new(),
            error_count: 0,
            last_error: None,
            config,
        }
    }

    /// Add a diagnostic to the queue.
    ///
    /// Returns `true` if the diagnostic was added, `false` if it was filtered.
    pub fn add(&mut self, diag: Diagnostic) -> bool {
        let is_error = diag.is_error();

        if is_error && self.limit_reached() {
            return false;
        }

        if is_error {
            let key = (
                diag.position.file().to_owned(),
                diag.position.line(),
                message_prefix_hash(&diag.message),
            );
            if self.config.deduplicate && self.last_error.as_ref() == Some(&key) {
                return false;
            }
            self.last_error = Some(key);
            self.error_count += 1;
        }

        self.diagnostics.push(diag);
        true
    }

    /// Check if the error limit has been reached.
    pub fn limit_reached(&self) -> bool {
        self.config.error_limit > 0 && self.error_count >= self.config.error_limit
    }

    /// Get the number of errors collected.
    pub fn error_count(&self) -> usize {
        self.error_count
    }

    /// Number of warnings collected.
    pub fn warning_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_warning()).count()
    }

    /// Emit an error diagnostic and get proof it was emitted.
    pub fn emit_error(&mut self, diag: Diagnostic) -> ErrorGuaranteed {
        self.add(diag);
        ErrorGuaranteed::new()
    }

    /// Returns `Some(ErrorGuaranteed)` if at least one error was emitted.
    pub fn has_errors(&self) -> Option<ErrorGuaranteed> {
        ErrorGuaranteed::from_error_count(self.error_count)
    }

    /// Sort diagnostics by position and return them, clearing the queue.
    ///
    /// The sort is stable, so diagnostics at the same position keep their
    /// reporting order.
    pub fn flush(&mut self) -> Vec<Diagnostic> {
        let already_sorted = self
            .diagnostics
            .windows(2)
            .all(|w| w[0].position <= w[1].position);

        if !already_sorted {
            self.diagnostics
                .sort_by(|a, b| a.position.cmp(&b.position));
        }

        self.error_count = 0;
        self.last_error = None;
        std::mem::take(&mut self.diagnostics)
    }

    /// Get diagnostics without clearing the queue.
    pub fn peek(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }
}

impl DiagnosticSink for DiagnosticQueue {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.add(diagnostic);
    }

    fn error_count(&self) -> usize {
        self.error_count
    }
}
