//! Source coordinates.
//!
//! A [`Position`] is created once by the parser and never mutated. Cloning
//! is cheap: the file name is reference counted.

use std::fmt;
use std::sync::Arc;

/// Immutable source coordinate: file, 1-based line, 1-based column.
#[derive(Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct Position {
    file: Arc<str>,
    line: u32,
    column: u32,
}

impl Position {
    /// Create a position.
    pub fn new(file: impl Into<Arc<str>>, line: u32, column: u32) -> Self {
        Position {
            file: file.into(),
            line,
            column,
        }
    }

    /// Position used for compiler-generated nodes that have no source.
    pub fn synthetic() -> Self {
        Position::new("<generated>", 0, 0)
    }

    #[inline]
    pub fn file(&self) -> &str {
        &self.file
    }

    #[inline]
    pub fn line(&self) -> u32 {
        self.line
    }

    #[inline]
    pub fn column(&self) -> u32 {
        self.column
    }

    /// Check if this position was produced by [`Position::synthetic`].
    pub fn is_synthetic(&self) -> bool {
        self.line == 0 && &*self.file == "<generated>"
    }
}

impl Default for Position {
    fn default() -> Self {
        Position::synthetic()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

impl fmt::Debug for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}
