//! Symbol queries: `textDocument/documentSymbol` and
//! `workspace/symbol`, plus the wire symbol-kind mapping.

use std::io::{BufRead, Write};

use serde_json::{json, Value};

use crate::model::symbol::{Symbol, SymbolKind, SymbolRef};

use super::transport::ServerError;
use super::LspLoop;

/// LSP `SymbolKind` numbers. Constructors are methods named
/// `initialize`; anything unmapped is omitted from results.
pub fn symbol_kind_number(symbol: &Symbol) -> Option<u32> {
    match symbol.kind {
        SymbolKind::Module => Some(2),
        SymbolKind::Class => Some(5),
        SymbolKind::Method => {
            if symbol.name.as_ref() == "initialize" {
                Some(9)
            } else {
                Some(6)
            }
        }
        SymbolKind::Field => Some(8),
        SymbolKind::StaticField => Some(14),
        SymbolKind::MethodArgument => Some(13),
        SymbolKind::TypeMember | SymbolKind::TypeArgument => Some(26),
    }
}

impl<R: BufRead, W: Write> LspLoop<R, W> {
    /// SymbolInformation for one symbol, or `None` when it has no
    /// definition location or no mapped kind.
    pub(crate) fn symbol_information(&self, sym: SymbolRef) -> Option<Value> {
        let symbol = self.final_model().symbol(sym);
        if !symbol.definition_loc.file.exists() {
            return None;
        }
        let kind = symbol_kind_number(symbol)?;
        Some(json!({
            "name": symbol.name.as_ref(),
            "kind": kind,
            "location": self.loc_to_location(symbol.definition_loc),
            "containerName": self.final_model().full_name(symbol.owner),
        }))
    }

    pub(crate) fn handle_document_symbol(&mut self, msg: &Value) -> Result<(), ServerError> {
        let uri = msg
            .get("params")
            .and_then(|p| p.get("textDocument"))
            .and_then(|d| d.get("uri"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        let fref = self.uri_to_file_ref(uri);

        let mut result = Vec::new();
        if fref.exists() {
            for idx in 1..self.final_model().symbols_used() {
                let sym = SymbolRef(idx as u32);
                if self.final_model().symbol(sym).definition_loc.file == fref {
                    if let Some(info) = self.symbol_information(sym) {
                        result.push(info);
                    }
                }
            }
        }
        self.send_result(msg, Value::Array(result))
    }

    /// Exact-name match over all symbols.
    pub(crate) fn handle_workspace_symbol(&mut self, msg: &Value) -> Result<(), ServerError> {
        let query = msg
            .get("params")
            .and_then(|p| p.get("query"))
            .and_then(Value::as_str)
            .unwrap_or_default();

        let mut result = Vec::new();
        for idx in 1..self.final_model().symbols_used() {
            let sym = SymbolRef(idx as u32);
            if self.final_model().symbol(sym).name.as_ref() == query {
                if let Some(info) = self.symbol_information(sym) {
                    result.push(info);
                }
            }
        }
        self.send_result(msg, Value::Array(result))
    }
}
