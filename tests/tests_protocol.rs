//! End-to-end protocol sessions over in-memory transports.

#![allow(clippy::unwrap_used)]

use std::io::Cursor;

use serde_json::{json, Value};

use karat::config::Options;
use karat::server::transport::Connection;
use karat::server::LspLoop;

fn frame(value: &Value) -> String {
    let body = value.to_string();
    format!("Content-Length: {}\r\n\r\n{}", body.len(), body)
}

fn parse_frames(mut bytes: &[u8]) -> Vec<Value> {
    let mut frames = Vec::new();
    while !bytes.is_empty() {
        let text = std::str::from_utf8(bytes).unwrap();
        let Some(header_end) = text.find("\r\n\r\n") else {
            break;
        };
        let header = &text[..header_end];
        let len: usize = header
            .lines()
            .find_map(|l| l.strip_prefix("Content-Length: "))
            .unwrap()
            .parse()
            .unwrap();
        let body_start = header_end + 4;
        frames.push(serde_json::from_slice(&bytes[body_start..body_start + len]).unwrap());
        bytes = &bytes[body_start + len..];
    }
    frames
}

fn run_session_with(opts: Options, messages: &[Value]) -> Vec<Value> {
    let input: String = messages.iter().map(frame).collect();
    let conn = Connection::new(Cursor::new(input.into_bytes()), Vec::new());
    let mut lsp = LspLoop::new(opts, conn);
    lsp.run().expect("session failed");
    parse_frames(&lsp.into_writer())
}

fn run_session(messages: &[Value]) -> Vec<Value> {
    run_session_with(Options::default(), messages)
}

fn initialize_msgs() -> Vec<Value> {
    vec![
        json!({"jsonrpc": "2.0", "id": 1, "method": "initialize",
               "params": {"rootUri": "file:///r"}}),
        json!({"jsonrpc": "2.0", "method": "initialized", "params": {}}),
    ]
}

fn did_open(uri: &str, text: &str) -> Value {
    json!({"jsonrpc": "2.0", "method": "textDocument/didOpen",
           "params": {"textDocument": {"uri": uri, "text": text}}})
}

fn did_change(uri: &str, text: &str) -> Value {
    json!({"jsonrpc": "2.0", "method": "textDocument/didChange",
           "params": {"textDocument": {"uri": uri, "version": 2},
                      "contentChanges": [{"text": text}]}})
}

/// All publishDiagnostics params for one uri, in wire order.
fn publishes_for<'a>(frames: &'a [Value], uri: &str) -> Vec<&'a Value> {
    frames
        .iter()
        .filter(|f| f.get("method").and_then(Value::as_str) == Some("textDocument/publishDiagnostics"))
        .map(|f| f.get("params").unwrap())
        .filter(|p| p.get("uri").and_then(Value::as_str) == Some(uri))
        .collect()
}

fn reply_with_id<'a>(frames: &'a [Value], id: u64) -> &'a Value {
    frames
        .iter()
        .find(|f| f.get("id").and_then(Value::as_u64) == Some(id) && f.get("result").is_some())
        .unwrap_or_else(|| panic!("no reply with id {id}: {frames:?}"))
}

#[test]
fn test_initialize_capabilities() {
    let frames = run_session(&initialize_msgs());
    let caps = &reply_with_id(&frames, 1)["result"]["capabilities"];
    assert_eq!(caps["textDocumentSync"], 1);
    assert_eq!(caps["documentSymbolProvider"], true);
    assert_eq!(caps["workspaceSymbolProvider"], true);
    assert_eq!(caps["definitionProvider"], true);
    assert_eq!(caps["hoverProvider"], true);
}

#[test]
fn test_open_clean_file_publishes_empty_diagnostics() {
    // S1: open one file with no errors.
    let mut msgs = initialize_msgs();
    msgs.push(did_open("file:///r/a.rb", "class A; end"));
    let frames = run_session(&msgs);

    let pubs = publishes_for(&frames, "file:///r/a.rb");
    assert_eq!(pubs.len(), 1);
    assert_eq!(pubs[0]["diagnostics"], json!([]));
}

#[test]
fn test_change_introduces_then_fixes_error() {
    // S2: a type error appears, then goes away.
    let mut msgs = initialize_msgs();
    msgs.push(did_open("file:///r/a.rb", "class A; end"));
    msgs.push(did_change(
        "file:///r/a.rb",
        "class A; def foo; 1 + \"\"; end; end",
    ));
    msgs.push(did_change("file:///r/a.rb", "class A; end"));
    let frames = run_session(&msgs);

    let pubs = publishes_for(&frames, "file:///r/a.rb");
    assert_eq!(pubs.len(), 3);
    assert_eq!(pubs[0]["diagnostics"], json!([]));

    let diags = pubs[1]["diagnostics"].as_array().unwrap();
    assert_eq!(diags.len(), 1, "{diags:?}");
    let diag = &diags[0];
    assert!(diag["code"].is_number());
    // The range covers `1 + ""`: bytes 18..24 on line 0.
    assert_eq!(diag["range"]["start"]["line"], 0);
    assert_eq!(diag["range"]["start"]["character"], 18);
    assert_eq!(diag["range"]["end"]["character"], 24);

    assert_eq!(pubs[2]["diagnostics"], json!([]));
}

#[test]
fn test_whitespace_change_republishes_once() {
    // S3: a pure whitespace edit keeps the fingerprint and republishes
    // exactly once, still empty.
    let mut msgs = initialize_msgs();
    msgs.push(did_open("file:///r/a.rb", "class A; end"));
    msgs.push(did_change("file:///r/a.rb", "class A;  end"));
    let frames = run_session(&msgs);

    let pubs = publishes_for(&frames, "file:///r/a.rb");
    assert_eq!(pubs.len(), 2);
    assert_eq!(pubs[1]["diagnostics"], json!([]));
}

#[test]
fn test_structural_change_republishes_every_file() {
    // S4: adding a method forces the slow path; every open file
    // republishes, empty sets included.
    let mut msgs = initialize_msgs();
    msgs.push(did_open("file:///r/a.rb", "class A; end"));
    msgs.push(did_open("file:///r/b.rb", "A.new"));
    msgs.push(did_change("file:///r/a.rb", "class A; def foo; end; end"));
    let frames = run_session(&msgs);

    let a_pubs = publishes_for(&frames, "file:///r/a.rb");
    let b_pubs = publishes_for(&frames, "file:///r/b.rb");
    // a.rb: open, b.rb's slow path, change. b.rb: open, a.rb's change.
    assert_eq!(a_pubs.len(), 3);
    assert_eq!(b_pubs.len(), 2);
    assert_eq!(a_pubs[2]["diagnostics"], json!([]));
    assert_eq!(b_pubs[1]["diagnostics"], json!([]));
}

#[test]
fn test_definition_into_other_file() {
    // S5: definition of `foo` in b.rb lands on the `def foo` header in
    // a.rb.
    let mut msgs = initialize_msgs();
    msgs.push(did_open("file:///r/a.rb", "class A; def foo; end; end"));
    msgs.push(did_open("file:///r/b.rb", "A.new.foo"));
    msgs.push(json!({
        "jsonrpc": "2.0", "id": 2, "method": "textDocument/definition",
        "params": {"textDocument": {"uri": "file:///r/b.rb"},
                   "position": {"line": 0, "character": 6}}
    }));
    let frames = run_session(&msgs);

    let result = &reply_with_id(&frames, 2)["result"];
    let locations = result.as_array().unwrap();
    assert_eq!(locations.len(), 1, "{locations:?}");
    assert_eq!(locations[0]["uri"], "file:///r/a.rb");
    // `def foo` starts at byte 9 of `class A; def foo; end; end`.
    assert_eq!(locations[0]["range"]["start"]["line"], 0);
    assert_eq!(locations[0]["range"]["start"]["character"], 9);
    assert_eq!(locations[0]["range"]["end"]["character"], 16);
}

#[test]
fn test_hover_on_method_call() {
    // S6: hover renders the checker's view of the send.
    let mut msgs = initialize_msgs();
    msgs.push(did_open("file:///r/a.rb", "class A; def foo; end; end"));
    msgs.push(did_open("file:///r/b.rb", "A.new.foo"));
    msgs.push(json!({
        "jsonrpc": "2.0", "id": 2, "method": "textDocument/hover",
        "params": {"textDocument": {"uri": "file:///r/b.rb"},
                   "position": {"line": 0, "character": 6}}
    }));
    let frames = run_session(&msgs);

    let contents = &reply_with_id(&frames, 2)["result"]["contents"];
    assert_eq!(contents["kind"], "markdown");
    assert_eq!(contents["value"], "```NilClass foo()```");
}

#[test]
fn test_document_symbols() {
    let mut msgs = initialize_msgs();
    msgs.push(did_open(
        "file:///r/a.rb",
        "class A\n  def initialize\n  end\n  def foo\n  end\nend",
    ));
    msgs.push(json!({
        "jsonrpc": "2.0", "id": 2, "method": "textDocument/documentSymbol",
        "params": {"textDocument": {"uri": "file:///r/a.rb"}}
    }));
    let frames = run_session(&msgs);

    let result = reply_with_id(&frames, 2)["result"].as_array().unwrap().clone();
    let kind_of = |name: &str| -> u64 {
        result
            .iter()
            .find(|s| s["name"] == name)
            .unwrap_or_else(|| panic!("missing symbol {name}: {result:?}"))["kind"]
            .as_u64()
            .unwrap()
    };
    assert_eq!(kind_of("A"), 5);
    assert_eq!(kind_of("initialize"), 9);
    assert_eq!(kind_of("foo"), 6);
    let a = result.iter().find(|s| s["name"] == "A").unwrap();
    assert_eq!(a["location"]["uri"], "file:///r/a.rb");
}

#[test]
fn test_workspace_symbol_exact_match() {
    let mut msgs = initialize_msgs();
    msgs.push(did_open("file:///r/a.rb", "class Abc; end\nclass Abcd; end"));
    msgs.push(json!({
        "jsonrpc": "2.0", "id": 2, "method": "workspace/symbol",
        "params": {"query": "Abc"}
    }));
    let frames = run_session(&msgs);

    let result = reply_with_id(&frames, 2)["result"].as_array().unwrap().clone();
    assert_eq!(result.len(), 1, "{result:?}");
    assert_eq!(result[0]["name"], "Abc");
}

#[test]
fn test_shutdown_returns_null() {
    let mut msgs = initialize_msgs();
    msgs.push(json!({"jsonrpc": "2.0", "id": 2, "method": "shutdown"}));
    let frames = run_session(&msgs);
    assert_eq!(reply_with_id(&frames, 2)["result"], Value::Null);
}

#[test]
fn test_unknown_request_gets_method_not_found() {
    let mut msgs = initialize_msgs();
    msgs.push(json!({"jsonrpc": "2.0", "id": 2, "method": "textDocument/rename",
                     "params": {}}));
    let frames = run_session(&msgs);
    let error = frames
        .iter()
        .find(|f| f.get("error").is_some())
        .expect("expected an error reply");
    assert_eq!(error["error"]["code"], -32601);
}

#[test]
fn test_exit_ends_session() {
    let mut msgs = initialize_msgs();
    msgs.push(json!({"jsonrpc": "2.0", "method": "exit"}));
    // Anything after exit must not be processed.
    msgs.push(json!({"jsonrpc": "2.0", "id": 9, "method": "shutdown"}));
    let frames = run_session(&msgs);
    assert!(frames
        .iter()
        .all(|f| f.get("id").and_then(Value::as_u64) != Some(9)));
}

#[test]
fn test_hover_on_unknown_file_is_invalid_params() {
    let mut msgs = initialize_msgs();
    msgs.push(json!({
        "jsonrpc": "2.0", "id": 2, "method": "textDocument/hover",
        "params": {"textDocument": {"uri": "file:///r/nope.rb"},
                   "position": {"line": 0, "character": 0}}
    }));
    let frames = run_session(&msgs);
    let error = frames.iter().find(|f| f.get("error").is_some()).unwrap();
    assert_eq!(error["error"]["code"], -32602);
}

#[test]
fn test_configured_inputs_index_at_initialized() {
    // Files named on the command line are read from disk and checked
    // as soon as the client says `initialized`.
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("lib.rb"), "class Lib; def f; 1 + \"\"; end; end").unwrap();

    let opts = Options {
        root: Some(dir.path().to_path_buf()),
        inputs: vec!["lib.rb".into()],
        ..Options::default()
    };
    let frames = run_session_with(opts, &initialize_msgs());

    let pubs = publishes_for(&frames, "file:///r/lib.rb");
    assert_eq!(pubs.len(), 1, "{frames:?}");
    assert_eq!(pubs[0]["diagnostics"].as_array().unwrap().len(), 1);
}

#[test]
fn test_read_file_handshake_applies_updates() {
    // didChangeWatchedFiles triggers a server-initiated readFile; the
    // reply's contents flow through the normal update path.
    let mut msgs = initialize_msgs();
    msgs.push(did_open("file:///r/a.rb", "class A; end"));
    msgs.push(json!({
        "jsonrpc": "2.0", "method": "workspace/didChangeWatchedFiles",
        "params": {"changes": [{"uri": "file:///r/a.rb", "type": 2}]}
    }));
    msgs.push(json!({
        "jsonrpc": "2.0", "id": "karat-req-1",
        "result": [{"uri": "file:///r/a.rb", "content": "class A; def broken; 1 + \"\"; end; end"}]
    }));
    let frames = run_session(&msgs);

    // The server asked for the file contents...
    let read_file = frames
        .iter()
        .find(|f| f.get("method").and_then(Value::as_str) == Some("readFile"))
        .expect("expected a readFile request");
    assert_eq!(read_file["id"], "karat-req-1");

    // ...and the reply produced a fresh publication with the error.
    let pubs = publishes_for(&frames, "file:///r/a.rb");
    let last = pubs.last().unwrap();
    assert_eq!(last["diagnostics"].as_array().unwrap().len(), 1);
}
