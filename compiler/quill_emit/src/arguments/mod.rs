//! Argument lists with deferred trailing insertion.
//!
//! While a macro rewrites a call it may want to add trailing arguments
//! without disturbing argument indices other code is still working with.
//! It remembers an insertion point, queues the extra arguments with
//! [`ArgumentsProxy::right_append`], and the compiler splices them in with
//! [`ArgumentsProxy::release_right_append`] once the macro is done.
//! Queued arguments are invisible to indexing and iteration until then.

use std::ops::{Index, IndexMut};

use crate::ast::Expr;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ArgumentsProxy {
    committed: Vec<Expr>,
    pending: Vec<Expr>,
    insertion_point: Option<usize>,
}

impl ArgumentsProxy {
    pub fn new(arguments: Vec<Expr>) -> Self {
        ArgumentsProxy {
            committed: arguments,
            pending: Vec::new(),
            insertion_point: None,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.committed.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.committed.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Expr> {
        self.committed.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Expr> {
        self.committed.get_mut(index)
    }

    pub fn last(&self) -> Option<&Expr> {
        self.committed.last()
    }

    pub fn push(&mut self, argument: Expr) {
        self.committed.push(argument);
    }

    pub fn insert(&mut self, index: usize, argument: Expr) {
        self.committed.insert(index, argument);
    }

    pub fn remove(&mut self, index: usize) -> Expr {
        self.committed.remove(index)
    }

    pub fn pop(&mut self) -> Option<Expr> {
        self.committed.pop()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Expr> {
        self.committed.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Expr> {
        self.committed.iter_mut()
    }

    pub fn as_slice(&self) -> &[Expr] {
        &self.committed
    }

    pub fn as_mut_slice(&mut self) -> &mut [Expr] {
        &mut self.committed
    }

    /// Snapshot the current length as the point where queued arguments go.
    pub fn remember_position(&mut self) {
        self.insertion_point = Some(self.committed.len());
    }

    /// Queue an argument for later insertion.
    pub fn right_append(&mut self, argument: Expr) {
        self.pending.push(argument);
    }

    /// Number of queued arguments.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Splice queued arguments at the remembered position, or at the end if
    /// none was remembered, and forget the position.
    pub fn release_right_append(&mut self) {
        let at = self
            .insertion_point
            .take()
            .unwrap_or(self.committed.len());
        self.commit_at(at);
    }

    /// Splice queued arguments at `index` (clamped to the length).
    pub fn commit_at(&mut self, index: usize) {
        let at = index.min(self.committed.len());
        let pending = std::mem::take(&mut self.pending);
        self.committed.splice(at..at, pending);
    }

    /// The committed arguments. Queued ones are dropped.
    pub fn into_vec(self) -> Vec<Expr> {
        self.committed
    }
}

impl Index<usize> for ArgumentsProxy {
    type Output = Expr;

    fn index(&self, index: usize) -> &Expr {
        &self.committed[index]
    }
}

impl IndexMut<usize> for ArgumentsProxy {
    fn index_mut(&mut self, index: usize) -> &mut Expr {
        &mut self.committed[index]
    }
}

impl<'a> IntoIterator for &'a ArgumentsProxy {
    type Item = &'a Expr;
    type IntoIter = std::slice::Iter<'a, Expr>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a> IntoIterator for &'a mut ArgumentsProxy {
    type Item = &'a mut Expr;
    type IntoIter = std::slice::IterMut<'a, Expr>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

impl FromIterator<Expr> for ArgumentsProxy {
    fn from_iter<I: IntoIterator<Item = Expr>>(iter: I) -> Self {
        ArgumentsProxy::new(iter.into_iter().collect())
    }
}

impl From<Vec<Expr>> for ArgumentsProxy {
    fn from(arguments: Vec<Expr>) -> Self {
        ArgumentsProxy::new(arguments)
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "tests use unwrap to panic on unexpected state"
)]
