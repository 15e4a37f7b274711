//! The method table: every wire method the loop recognizes.

/// JSON-RPC error codes the server emits.
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    ClientInitiated,
    ServerInitiated,
}

#[derive(Debug, Clone, Copy)]
pub struct LspMethod {
    pub name: &'static str,
    pub is_notification: bool,
    pub kind: MethodKind,
}

const fn m(name: &'static str, is_notification: bool, kind: MethodKind) -> LspMethod {
    LspMethod {
        name,
        is_notification,
        kind,
    }
}

use self::MethodKind::{ClientInitiated, ServerInitiated};

pub const ALL_METHODS: &[LspMethod] = &[
    m("$/cancelRequest", true, ClientInitiated),
    m("initialize", false, ClientInitiated),
    m("shutdown", false, ClientInitiated),
    m("initialized", true, ClientInitiated),
    m("exit", true, ClientInitiated),
    m("textDocument/didOpen", true, ClientInitiated),
    m("textDocument/didChange", true, ClientInitiated),
    m("workspace/didChangeWatchedFiles", true, ClientInitiated),
    m("textDocument/documentSymbol", false, ClientInitiated),
    m("workspace/symbol", false, ClientInitiated),
    m("textDocument/definition", false, ClientInitiated),
    m("textDocument/hover", false, ClientInitiated),
    m("textDocument/publishDiagnostics", true, ServerInitiated),
    m("readFile", false, ServerInitiated),
];

pub fn by_name(name: &str) -> Option<&'static LspMethod> {
    ALL_METHODS.iter().find(|m| m.name == name)
}
