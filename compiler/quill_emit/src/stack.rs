//! Stack growth for deep recursion.
//!
//! Optimization and emission recurse once per tree level. Every recursive
//! entry point runs inside [`ensure_sufficient_stack`] so that deeply
//! nested expressions (long `+` chains, generated code) cannot overflow.
//!
//! - **Red zone**: 100KB. Below this we grow the stack.
//! - **Growth size**: 1MB per growth.

const RED_ZONE: usize = 100 * 1024;

const STACK_PER_RECURSION: usize = 1024 * 1024;

/// Ensure sufficient stack space is available before executing `f`.
#[inline]
#[cfg(not(target_arch = "wasm32"))]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

/// WASM manages its own stack.
#[inline]
#[cfg(target_arch = "wasm32")]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}
