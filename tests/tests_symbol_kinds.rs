//! Wire symbol-kind mapping.

use std::sync::Arc;

use rstest::rstest;

use karat::model::symbol::{Symbol, SymbolKind, SymbolRef};
use karat::server::symbols::symbol_kind_number;

fn symbol(name: &str, kind: SymbolKind) -> Symbol {
    Symbol::new(Arc::from(name), kind, SymbolRef::ROOT)
}

#[rstest]
#[case(SymbolKind::Module, "M", 2)]
#[case(SymbolKind::Class, "C", 5)]
#[case(SymbolKind::Method, "initialize", 9)]
#[case(SymbolKind::Method, "foo", 6)]
#[case(SymbolKind::Field, "@x", 8)]
#[case(SymbolKind::StaticField, "@@x", 14)]
#[case(SymbolKind::MethodArgument, "arg", 13)]
#[case(SymbolKind::TypeMember, "T", 26)]
#[case(SymbolKind::TypeArgument, "U", 26)]
fn test_kind_mapping(#[case] kind: SymbolKind, #[case] name: &str, #[case] expected: u32) {
    assert_eq!(symbol_kind_number(&symbol(name, kind)), Some(expected));
}
