//! The per-function compilation pipeline.

use quill_ir::{Instruction, ReturnKind};

use crate::ast::{Block, StackSemantics};
use crate::optimize::optimize_block;
use crate::stmt::emit_block;
use crate::tail_call::rewrite_tail_calls;
use crate::{CompileContext, InternalError};

/// Compile a function body into `cx.target`.
///
/// Optimizes the body, rewrites tail calls, and emits it for effect
/// followed by a closing return.
/// User errors are reported to the context's sink and leave best-effort
/// code behind; the result is the number of errors reported for this
/// function.
#[tracing::instrument(level = "debug", skip_all, fields(function = %cx.function.id))]
pub fn compile_function(body: &mut Block, cx: &mut CompileContext<'_>) -> Result<usize, InternalError> {
    let errors_before = cx.diagnostics.error_count();
    let entry = cx.target.next_address();

    if cx.options.optimize {
        optimize_block(body, cx)?;
        tracing::debug!("optimized function body");
    }
    if cx.options.tail_calls {
        let rewritten = rewrite_tail_calls(body, cx, entry);
        tracing::debug!(rewritten, "rewrote tail calls");
    }

    emit_block(body, cx, StackSemantics::Effect)?;
    // Labels bound at the end of the body still need an instruction.
    cx.target.emit(&body.position, Instruction::Return(ReturnKind::Exit));

    let errors = cx.diagnostics.error_count().saturating_sub(errors_before);
    tracing::debug!(
        instructions = cx.target.next_address() - entry,
        temporaries = cx.temporaries().len(),
        errors,
        "emitted function body"
    );
    Ok(errors)
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "tests use unwrap to panic on unexpected state"
)]
mod tests;
