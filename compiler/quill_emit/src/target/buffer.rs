use std::fmt;

use quill_ir::{Instruction, JumpTarget, Position};
use rustc_hash::FxHashMap;

use super::{Emitter, TryRegion};
use crate::InternalError;

/// In-memory emitter.
///
/// Jumps are recorded with symbolic targets. Freeing or rebinding a label
/// patches the jumps that refer to it, and [`CodeBuffer::resolve`] patches
/// whatever is left.
#[derive(Clone, Debug, Default)]
pub struct CodeBuffer {
    code: Vec<(Position, Instruction)>,
    labels: FxHashMap<String, usize>,
    depth: usize,
    try_regions: Vec<TryRegion>,
}

impl CodeBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// Every instruction with the position it was emitted for.
    pub fn code(&self) -> &[(Position, Instruction)] {
        &self.code
    }

    pub fn instructions(&self) -> impl Iterator<Item = &Instruction> {
        self.code.iter().map(|(_, instruction)| instruction)
    }

    /// Address a currently bound label points to.
    pub fn label_address(&self, label: &str) -> Option<usize> {
        self.labels.get(label).copied()
    }

    pub fn try_regions(&self) -> &[TryRegion] {
        &self.try_regions
    }

    /// Current block nesting depth.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Patch all label jumps into absolute addresses.
    pub fn resolve(&mut self) -> Result<(), InternalError> {
        let bound: Vec<(String, usize)> = self
            .labels
            .iter()
            .map(|(label, address)| (label.clone(), *address))
            .collect();
        for (label, address) in bound {
            self.patch(&label, address);
        }
        match self
            .code
            .iter()
            .find_map(|(_, instruction)| match instruction.jump_target() {
                Some(JumpTarget::Label(label)) => Some(label.clone()),
                _ => None,
            }) {
            Some(label) => Err(InternalError::UnboundLabel(label)),
            None => Ok(()),
        }
    }

    fn patch(&mut self, label: &str, address: usize) {
        for (_, instruction) in &mut self.code {
            if let Some(target) = instruction.jump_target_mut() {
                if matches!(target, JumpTarget::Label(l) if l == label) {
                    *target = JumpTarget::Address(address);
                }
            }
        }
    }
}

impl Emitter for CodeBuffer {
    fn emit(&mut self, position: &Position, instruction: Instruction) {
        self.code.push((position.clone(), instruction));
    }

    fn emit_label(&mut self, _position: &Position, label: &str) {
        let address = self.code.len();
        if let Some(previous) = self.labels.insert(label.to_owned(), address) {
            if previous != address {
                tracing::trace!(label, previous, address, "label rebound without free");
            }
            self.patch(label, previous);
        }
    }

    fn free_label(&mut self, label: &str) {
        if let Some(address) = self.labels.remove(label) {
            self.patch(label, address);
        }
    }

    fn begin_block(&mut self) {
        self.depth += 1;
    }

    fn end_block(&mut self) -> Result<(), InternalError> {
        self.depth = self.depth.checked_sub(1).ok_or_else(|| {
            InternalError::UnbalancedScope("block closed more often than opened".to_owned())
        })?;
        Ok(())
    }

    fn next_address(&self) -> usize {
        self.code.len()
    }

    fn instruction(&self, address: usize) -> Option<&Instruction> {
        self.code.get(address).map(|(_, instruction)| instruction)
    }

    fn register_try_region(&mut self, region: TryRegion) {
        self.try_regions.push(region);
    }
}

impl fmt::Display for CodeBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut labels: Vec<(&str, usize)> = self
            .labels
            .iter()
            .map(|(label, address)| (label.as_str(), *address))
            .collect();
        labels.sort_by(|a, b| a.1.cmp(&b.1).then(a.0.cmp(b.0)));
        let mut labels = labels.into_iter().peekable();

        for (address, (_, instruction)) in self.code.iter().enumerate() {
            while let Some((label, _)) = labels.next_if(|(_, at)| *at == address) {
                writeln!(f, "{label}:")?;
            }
            writeln!(f, "{address:>5}  {instruction}")?;
        }
        for (label, _) in labels {
            writeln!(f, "{label}:")?;
        }
        Ok(())
    }
}
