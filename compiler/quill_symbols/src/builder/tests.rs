use super::*;
use crate::SymbolKind;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use quill_diagnostic::ErrorCode;
use quill_ir::{EntityRef, ModuleName};

fn pos() -> Position {
    Position::new("imports.qll", 1, 1)
}

fn func(id: &str, module: &str) -> Symbol {
    Symbol::call(EntityRef::function(id, ModuleName::new(module)), pos())
}

fn module(name: &str, ids: &[&str]) -> Rc<SymbolStore> {
    let mut store = SymbolStore::new();
    for id in ids {
        store.declare(*id, func(id, name));
    }
    Rc::new(store)
}

fn not_found_name(symbol: &Symbol) -> Option<String> {
    match symbol.kind() {
        SymbolKind::Message { diagnostic, inner } if matches!(inner.kind(), SymbolKind::Nil) => {
            assert_eq!(diagnostic.code, ErrorCode::E2001);
            Some(diagnostic.message.clone())
        }
        _ => None,
    }
}

#[test]
fn wildcard_imports_everything() {
    let lib = module("lib", &["map", "filter"]);
    let store = SymbolStoreBuilder::new()
        .import(ImportSource::wildcard("lib", lib, pos()))
        .build();

    assert_eq!(store.try_get("map"), Some(func("map", "lib")));
    assert_eq!(store.try_get("filter"), Some(func("filter", "lib")));
    assert!(!store.is_declared_locally("map"));
}

#[test]
fn wildcard_with_drop_and_rename() {
    let lib = module("lib", &["map", "filter", "fold"]);
    let store = SymbolStoreBuilder::new()
        .import(ImportSource::new(
            "lib",
            lib,
            vec![
                TransferDirective::Wildcard,
                TransferDirective::drop("filter", pos()),
                TransferDirective::rename("fold", "reduce", pos()),
            ],
            pos(),
        ))
        .build();

    assert_eq!(store.try_get("map"), Some(func("map", "lib")));
    assert_eq!(store.try_get("filter"), None);
    assert_eq!(store.try_get("fold"), None, "rename replaces the original");
    assert_eq!(store.try_get("reduce"), Some(func("fold", "lib")));
}

#[test]
fn wildcard_rename_of_missing_name_is_an_error_symbol() {
    let lib = module("lib", &["map"]);
    let store = SymbolStoreBuilder::new()
        .import(ImportSource::new(
            "lib",
            lib,
            vec![
                TransferDirective::Wildcard,
                TransferDirective::rename("foo", "bar", pos()),
            ],
            pos(),
        ))
        .build();

    let bar = store.try_get("bar").unwrap();
    assert_eq!(not_found_name(&bar).as_deref(), Some("Symbol 'foo' not found"));
    assert_eq!(store.try_get("map"), Some(func("map", "lib")));
}

#[test]
fn selective_import_only_yields_renamed_names() {
    let lib = module("lib", &["map", "filter"]);
    let store = SymbolStoreBuilder::new()
        .import(ImportSource::new(
            "lib",
            lib,
            vec![
                TransferDirective::keep("map", pos()),
                TransferDirective::rename("missing", "other", pos()),
            ],
            pos(),
        ))
        .build();

    assert_eq!(store.try_get("map"), Some(func("map", "lib")));
    assert_eq!(store.try_get("filter"), None);
    let other = store.try_get("other").unwrap();
    assert_eq!(
        not_found_name(&other).as_deref(),
        Some("Symbol 'missing' not found")
    );
}

#[test]
fn statements_naming_one_source_are_batched() {
    let lib = module("lib", &["map", "filter"]);
    let store = SymbolStoreBuilder::new()
        .import(ImportSource::wildcard("lib", lib.clone(), pos()))
        .import(ImportSource::new(
            "lib",
            lib,
            vec![TransferDirective::drop("filter", pos())],
            pos(),
        ))
        .build();

    assert_eq!(store.try_get("filter"), None);
    assert_eq!(store.try_get("map"), Some(func("map", "lib")));
}

#[test]
fn distinct_sources_conflict() {
    let lists = module("lists", &["map"]);
    let hashes = module("hashes", &["map"]);
    let store = SymbolStoreBuilder::new()
        .import(ImportSource::wildcard("lists", lists, pos()))
        .import(ImportSource::wildcard("hashes", hashes, pos()))
        .build();

    let map = store.try_get("map").unwrap();
    match map.kind() {
        SymbolKind::Message { diagnostic, inner } => {
            assert_eq!(diagnostic.code, ErrorCode::E2002);
            assert_eq!(**inner, func("map", "lists"));
        }
        other => panic!("expected ambiguity, got {other:?}"),
    }
}

#[test]
fn parent_is_kept() {
    let mut outer = SymbolStore::new();
    outer.declare("x", func("x", "outer"));
    let store = SymbolStoreBuilder::new()
        .with_parent(Rc::new(outer))
        .build();
    assert_eq!(store.try_get("x"), Some(func("x", "outer")));
}

proptest! {
    #[test]
    fn same_name_from_distinct_origins_never_silently_resolves(
        name in "[a-z]{1,6}",
        left in "[a-z]{1,4}",
        right in "[a-z]{1,4}",
    ) {
        prop_assume!(left != right);
        let a = module(&left, &[name.as_str()]);
        let b = module(&right, &[name.as_str()]);
        let store = SymbolStoreBuilder::new()
            .import(ImportSource::wildcard(left.clone(), a, pos()))
            .import(ImportSource::wildcard(right.clone(), b, pos()))
            .build();

        let found = store.try_get(&name).unwrap();
        let (messages, _) = found.split_messages();
        prop_assert_eq!(messages.len(), 1);
        prop_assert_eq!(messages[0].code, ErrorCode::E2002);
    }
}

#[test]
fn wildcard_renames_can_swap_names() {
    let lib = module("lib", &["a", "b", "c"]);
    let store = SymbolStoreBuilder::new()
        .import(ImportSource::new(
            "lib",
            lib,
            vec![
                TransferDirective::Wildcard,
                TransferDirective::rename("a", "b", pos()),
                TransferDirective::rename("b", "a", pos()),
            ],
            pos(),
        ))
        .build();

    assert_eq!(store.try_get("a"), Some(func("b", "lib")));
    assert_eq!(store.try_get("b"), Some(func("a", "lib")));
    assert_eq!(store.try_get("c"), Some(func("c", "lib")));
}
