//! The instruction sink code is emitted into.
//!
//! [`Emitter`] is the narrow interface the compiler writes through.
//! [`CodeBuffer`] is an in-memory implementation that records instructions,
//! binds labels and resolves jumps; hosts with their own bytecode container
//! implement [`Emitter`] directly.

mod buffer;

pub use buffer::CodeBuffer;

use quill_ir::{CallKind, Constant, Instruction, JumpTarget, ModuleName, Position};

use crate::InternalError;

/// Addresses of a protected region, recorded when a try block is emitted.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct TryRegion {
    pub begin_try: usize,
    /// Start of the finally code, if there is any.
    pub begin_finally: Option<usize>,
    /// Start of the handler. Absent when the region only has a finally.
    pub begin_catch: Option<usize>,
    /// First address after the region.
    pub end: usize,
    /// Whether the handler stores the exception somewhere.
    pub uses_exception: bool,
}

/// Receives instructions for one function.
///
/// Labels are strings unique within the function. A label may be rebound
/// after [`Emitter::free_label`] released it.
pub trait Emitter {
    fn emit(&mut self, position: &Position, instruction: Instruction);

    /// Bind `label` to the address of the next instruction.
    fn emit_label(&mut self, position: &Position, label: &str);

    /// Release `label` once every jump to it has been emitted.
    fn free_label(&mut self, label: &str);

    fn begin_block(&mut self);

    fn end_block(&mut self) -> Result<(), InternalError>;

    /// Address the next instruction will get.
    fn next_address(&self) -> usize;

    /// The instruction at `address`, if already emitted.
    fn instruction(&self, address: usize) -> Option<&Instruction>;

    fn register_try_region(&mut self, region: TryRegion);

    fn emit_jump(&mut self, position: &Position, label: &str) {
        self.emit(position, Instruction::Jump(JumpTarget::Label(label.to_owned())));
    }

    fn emit_jump_if_true(&mut self, position: &Position, label: &str) {
        self.emit(
            position,
            Instruction::JumpIfTrue(JumpTarget::Label(label.to_owned())),
        );
    }

    fn emit_jump_if_false(&mut self, position: &Position, label: &str) {
        self.emit(
            position,
            Instruction::JumpIfFalse(JumpTarget::Label(label.to_owned())),
        );
    }

    /// Jump out of a protected region.
    fn emit_leave(&mut self, position: &Position, label: &str) {
        self.emit(position, Instruction::Leave(JumpTarget::Label(label.to_owned())));
    }

    fn emit_constant(&mut self, position: &Position, constant: Constant) {
        self.emit(position, Instruction::Load(constant));
    }

    fn emit_null(&mut self, position: &Position) {
        self.emit_constant(position, Constant::Null);
    }

    fn emit_load_local(&mut self, position: &Position, id: &str) {
        self.emit(position, Instruction::LoadLocal(id.to_owned()));
    }

    fn emit_store_local(&mut self, position: &Position, id: &str) {
        self.emit(position, Instruction::StoreLocal(id.to_owned()));
    }

    fn emit_load_global(&mut self, position: &Position, id: &str, module: &ModuleName) {
        self.emit(
            position,
            Instruction::LoadGlobal {
                id: id.to_owned(),
                module: module.clone(),
            },
        );
    }

    fn emit_store_global(&mut self, position: &Position, id: &str, module: &ModuleName) {
        self.emit(
            position,
            Instruction::StoreGlobal {
                id: id.to_owned(),
                module: module.clone(),
            },
        );
    }

    fn emit_call(
        &mut self,
        position: &Position,
        kind: CallKind,
        arguments: usize,
        just_effect: bool,
    ) {
        self.emit(
            position,
            Instruction::Call {
                kind,
                arguments,
                just_effect,
            },
        );
    }

    fn emit_command_call(
        &mut self,
        position: &Position,
        id: &str,
        arguments: usize,
        just_effect: bool,
    ) {
        self.emit_call(
            position,
            CallKind::Command { id: id.to_owned() },
            arguments,
            just_effect,
        );
    }

    fn emit_pop(&mut self, position: &Position, count: usize) {
        if count > 0 {
            self.emit(position, Instruction::Pop(count));
        }
    }
}

/// Hands out labels unique within one compilation unit.
#[derive(Debug, Default)]
pub struct LabelGenerator {
    next: u32,
}

impl LabelGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh label such as `while\begin\3`.
    pub fn fresh(&mut self, prefix: &str) -> String {
        let n = self.next;
        self.next += 1;
        format!("{prefix}\\{n}")
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "tests use unwrap to panic on unexpected state"
)]
