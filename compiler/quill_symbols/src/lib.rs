//! Symbols and scopes.
//!
//! A [`Symbol`] says what a name means: a reference to an entity, a call
//! through one, a macro expansion target, a nested namespace, or any of
//! those decorated with a diagnostic. A [`SymbolStore`] is one lexical
//! scope; [`SymbolStoreBuilder`] assembles a store from import statements.

mod builder;
mod store;
mod symbol;

pub use builder::{ImportSource, SymbolStoreBuilder, TransferDirective};
pub use store::{ImportedSymbol, SymbolStore};
pub use symbol::{Symbol, SymbolKind};
