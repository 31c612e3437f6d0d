//! Building a scope from import statements.
//!
//! Import statements that name the same source store are batched and merged
//! once. A wildcard import starts from the source's whole view; a selective
//! import only ever yields the names it renames explicitly.

use std::rc::Rc;

use quill_diagnostic::symbol_not_found;
use quill_ir::Position;
use rustc_hash::FxHashMap;

use crate::{Symbol, SymbolStore};

/// One element of an import statement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransferDirective {
    /// Import everything the source exposes.
    Wildcard,
    /// Import `original` under `new_name`.
    Rename {
        original: String,
        new_name: String,
        position: Position,
    },
    /// Leave `name` out of a wildcard import.
    Drop { name: String, position: Position },
}

impl TransferDirective {
    pub fn rename(original: impl Into<String>, new_name: impl Into<String>, position: Position) -> Self {
        TransferDirective::Rename {
            original: original.into(),
            new_name: new_name.into(),
            position,
        }
    }

    /// `Rename { x, x }`: import a single name unchanged.
    pub fn keep(name: impl Into<String>, position: Position) -> Self {
        let name = name.into();
        TransferDirective::rename(name.clone(), name, position)
    }

    pub fn drop(name: impl Into<String>, position: Position) -> Self {
        TransferDirective::Drop {
            name: name.into(),
            position,
        }
    }
}

/// An import statement: a source scope plus what to take from it.
#[derive(Clone, Debug)]
pub struct ImportSource {
    /// Name of the imported module or namespace, used in diagnostics.
    pub origin: String,
    pub position: Position,
    pub source: Rc<SymbolStore>,
    pub directives: Vec<TransferDirective>,
}

impl ImportSource {
    pub fn new(
        origin: impl Into<String>,
        source: Rc<SymbolStore>,
        directives: Vec<TransferDirective>,
        position: Position,
    ) -> Self {
        ImportSource {
            origin: origin.into(),
            position,
            source,
            directives,
        }
    }

    /// `import origin.*`
    pub fn wildcard(origin: impl Into<String>, source: Rc<SymbolStore>, position: Position) -> Self {
        ImportSource::new(origin, source, vec![TransferDirective::Wildcard], position)
    }
}

/// Collects import statements and materializes a [`SymbolStore`] once.
#[derive(Default)]
pub struct SymbolStoreBuilder {
    parent: Option<Rc<SymbolStore>>,
    imports: Vec<ImportSource>,
}

impl SymbolStoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_parent(mut self, parent: Rc<SymbolStore>) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn add_import(&mut self, import: ImportSource) -> &mut Self {
        self.imports.push(import);
        self
    }

    #[must_use]
    pub fn import(mut self, import: ImportSource) -> Self {
        self.imports.push(import);
        self
    }

    /// Merge all imports into a new store.
    #[tracing::instrument(level = "debug", skip_all, fields(imports = self.imports.len()))]
    pub fn build(self) -> SymbolStore {
        let mut store = SymbolStore::new();
        store.set_parent(self.parent);

        for batch in batch_by_source(self.imports) {
            let entries = merge_batch(&batch);
            tracing::debug!(
                origin = %batch.origin,
                entries = entries.len(),
                "merged import"
            );
            for (name, symbol) in entries {
                store.add_import(name, &batch.origin, symbol);
            }
        }
        store
    }
}

/// Combine import statements naming the same source, in first-seen order.
fn batch_by_source(imports: Vec<ImportSource>) -> Vec<ImportSource> {
    let mut batches: Vec<ImportSource> = Vec::new();
    for import in imports {
        match batches
            .iter_mut()
            .find(|b| Rc::ptr_eq(&b.source, &import.source))
        {
            Some(batch) => batch.directives.extend(import.directives),
            None => batches.push(import),
        }
    }
    batches
}

/// The entries one batch contributes, sorted by name.
fn merge_batch(batch: &ImportSource) -> Vec<(String, Symbol)> {
    let wildcard = batch
        .directives
        .iter()
        .any(|d| matches!(d, TransferDirective::Wildcard));

    let mut entries: FxHashMap<String, Symbol> = FxHashMap::default();
    if wildcard {
        let view: FxHashMap<String, Symbol> = batch.source.iter().collect();
        entries.clone_from(&view);

        for directive in &batch.directives {
            if let TransferDirective::Drop { name, .. } = directive {
                entries.remove(name);
            }
        }
        // Every original goes before any new name lands, so renames may
        // swap names.
        for directive in &batch.directives {
            if let TransferDirective::Rename { original, .. } = directive {
                entries.remove(original);
            }
        }
        for directive in &batch.directives {
            if let TransferDirective::Rename {
                original,
                new_name,
                position,
            } = directive
            {
                let symbol = match view.get(original) {
                    Some(symbol) => symbol.clone(),
                    None => not_found(original, position),
                };
                entries.insert(new_name.clone(), symbol);
            }
        }
    } else {
        for directive in &batch.directives {
            if let TransferDirective::Rename {
                original,
                new_name,
                position,
            } = directive
            {
                let symbol = batch
                    .source
                    .try_get(original)
                    .unwrap_or_else(|| not_found(original, position));
                entries.insert(new_name.clone(), symbol);
            }
        }
    }

    let mut entries: Vec<(String, Symbol)> = entries.into_iter().collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    entries
}

fn not_found(name: &str, position: &Position) -> Symbol {
    Symbol::message(
        symbol_not_found(position.clone(), name),
        Symbol::nil(position.clone()),
    )
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "tests use unwrap to panic on unexpected state"
)]
mod tests;
