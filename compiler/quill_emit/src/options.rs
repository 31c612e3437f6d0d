//! Compiler configuration.

/// Knobs for one compilation unit.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct CompilerOptions {
    /// Run tree optimization before emission.
    pub optimize: bool,
    /// Upper bound on rewrites of a single node before moving on.
    pub max_optimization_passes: usize,
    /// Rewrite tail calls and self-recursive returns.
    pub tail_calls: bool,
    /// Record call-site addresses for an acceleration layer.
    pub record_hints: bool,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        CompilerOptions {
            optimize: true,
            max_optimization_passes: 16,
            tail_calls: true,
            record_hints: true,
        }
    }
}

impl CompilerOptions {
    /// Emit the tree exactly as given.
    pub fn unoptimized() -> Self {
        CompilerOptions {
            optimize: false,
            tail_calls: false,
            ..Self::default()
        }
    }
}
