//! Lexical scopes.
//!
//! Lookup order is local declarations, then the parent chain, then the
//! merged import view. Imports never collapse a collision between origins:
//! a name imported with two different meanings resolves to a symbol
//! carrying an ambiguity error.

use std::fmt;
use std::rc::Rc;

use quill_diagnostic::ambiguous_import;
use rustc_hash::FxHashMap;

use crate::Symbol;

/// A symbol together with the import it came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportedSymbol {
    pub origin: String,
    pub symbol: Symbol,
}

/// One scope in the scope chain.
#[derive(Clone, Default)]
pub struct SymbolStore {
    parent: Option<Rc<SymbolStore>>,
    locals: FxHashMap<String, Symbol>,
    /// Conflict union of all imports. More than one entry per name means
    /// the name is ambiguous.
    imports: FxHashMap<String, Vec<ImportedSymbol>>,
}

impl SymbolStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a scope nested in `parent`.
    pub fn with_parent(parent: Rc<SymbolStore>) -> Self {
        SymbolStore {
            parent: Some(parent),
            ..Self::default()
        }
    }

    pub fn parent(&self) -> Option<&Rc<SymbolStore>> {
        self.parent.as_ref()
    }

    /// Bind `id` in this scope, shadowing any outer or imported binding.
    pub fn declare(&mut self, id: impl Into<String>, symbol: Symbol) {
        self.locals.insert(id.into(), symbol);
    }

    /// Look `id` up: locals, then parents, then imports.
    pub fn try_get(&self, id: &str) -> Option<Symbol> {
        if let Some(symbol) = self.locals.get(id) {
            return Some(symbol.clone());
        }
        if let Some(symbol) = self.parent.as_ref().and_then(|p| p.try_get(id)) {
            return Some(symbol);
        }
        self.try_get_imported(id)
    }

    fn try_get_imported(&self, id: &str) -> Option<Symbol> {
        let candidates = self.imports.get(id)?;
        let (first, rest) = candidates.split_first()?;
        if rest.is_empty() {
            return Some(first.symbol.clone());
        }
        let origins: Vec<&str> = candidates.iter().map(|c| c.origin.as_str()).collect();
        let diagnostic = ambiguous_import(first.symbol.position().clone(), id, &origins);
        Some(Symbol::message(diagnostic, first.symbol.clone()))
    }

    /// Every import candidate recorded for `id`.
    pub fn import_candidates(&self, id: &str) -> &[ImportedSymbol] {
        self.imports.get(id).map_or(&[], Vec::as_slice)
    }

    pub fn is_declared_locally(&self, id: &str) -> bool {
        self.locals.contains_key(id)
    }

    /// Forget local declarations; parent and imports stay.
    pub fn clear_local_declarations(&mut self) {
        self.locals.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.locals.is_empty()
            && self.imports.is_empty()
            && self.parent.as_ref().map_or(true, |p| p.is_empty())
    }

    /// Every visible name with what `try_get` would return for it, sorted
    /// by name.
    pub fn iter(&self) -> std::vec::IntoIter<(String, Symbol)> {
        let mut names: Vec<String> = self.imports.keys().cloned().collect();
        names.extend(self.locals.keys().cloned());
        if let Some(parent) = &self.parent {
            names.extend(parent.iter().map(|(name, _)| name));
        }
        names.sort_unstable();
        names.dedup();

        let entries: Vec<(String, Symbol)> = names
            .into_iter()
            .filter_map(|name| self.try_get(&name).map(|symbol| (name, symbol)))
            .collect();
        entries.into_iter()
    }

    /// Add an imported entry to the conflict union. An entry equal to one
    /// already present is not a conflict and is skipped.
    pub(crate) fn add_import(&mut self, id: String, origin: &str, symbol: Symbol) {
        let candidates = self.imports.entry(id).or_default();
        if candidates.iter().any(|c| c.symbol == symbol) {
            return;
        }
        candidates.push(ImportedSymbol {
            origin: origin.to_owned(),
            symbol,
        });
    }

    pub(crate) fn set_parent(&mut self, parent: Option<Rc<SymbolStore>>) {
        self.parent = parent;
    }
}

impl fmt::Debug for SymbolStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut locals: Vec<&str> = self.locals.keys().map(String::as_str).collect();
        locals.sort_unstable();
        let mut imports: Vec<&str> = self.imports.keys().map(String::as_str).collect();
        imports.sort_unstable();
        f.debug_struct("SymbolStore")
            .field("locals", &locals)
            .field("imports", &imports)
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "tests use unwrap to panic on unexpected state"
)]
