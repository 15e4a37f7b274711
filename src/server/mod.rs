//! The server loop.
//!
//! Single-threaded and strictly sequential over wire events: one
//! message is fully processed, pipeline runs and publications
//! included, before the next is read. The only parallelism lives in
//! the worker pool used by fingerprinting and the parse stage of
//! indexing.

pub mod methods;
pub mod publish;
pub mod query;
pub mod symbols;
pub mod transport;
pub mod update;
pub mod uri;

use std::collections::HashMap;
use std::io::{BufRead, Write};
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::{json, Value};

use crate::config::Options;
use crate::errors::{Diagnostic, ErrorQueue};
use crate::model::file::{FileRef, SourceFile, SourceKind};
use crate::model::ProgramModel;
use crate::workers::WorkerPool;

use self::transport::{Connection, ServerError};

/// A server-initiated request we are waiting on a reply for.
enum PendingRequest {
    ReadWatchedFiles,
}

pub struct LspLoop<R, W> {
    opts: Options,
    conn: Connection<R, W>,
    errors: Arc<ErrorQueue>,
    /// Indexed-only snapshot; owns the canonical file table.
    initial: ProgramModel,
    /// Resolved + typechecked snapshot answering queries.
    final_model: ProgramModel,
    /// Structural fingerprint per file id; 0 = unknown.
    global_state_hashes: Vec<u32>,
    errors_accumulated: IndexMap<FileRef, Vec<Diagnostic>>,
    updated_errors: Vec<FileRef>,
    root_uri: String,
    awaiting_response: HashMap<String, PendingRequest>,
    request_counter: u64,
    workers: WorkerPool,
}

impl<R: BufRead, W: Write> LspLoop<R, W> {
    pub fn new(opts: Options, conn: Connection<R, W>) -> Self {
        let errors = Arc::new(ErrorQueue::new());
        let mut initial = ProgramModel::new(Arc::clone(&errors));
        initial.init_empty();
        let final_model = initial.deep_copy(true);
        let workers = WorkerPool::new(opts.threads);
        Self {
            opts,
            conn,
            errors,
            initial,
            final_model,
            global_state_hashes: Vec::new(),
            errors_accumulated: IndexMap::new(),
            updated_errors: Vec::new(),
            root_uri: String::new(),
            awaiting_response: HashMap::new(),
            request_counter: 0,
            workers,
        }
    }

    /// Run until `exit`, EOF or a parse error.
    pub fn run(&mut self) -> Result<(), ServerError> {
        loop {
            let Some(msg) = self.conn.read_message()? else {
                tracing::info!("eof");
                return Ok(());
            };

            if self.handle_replies(&msg)? {
                continue;
            }

            let Some(method_name) = msg.get("method").and_then(Value::as_str) else {
                tracing::debug!("message without method; ignoring");
                continue;
            };
            let method_name = method_name.to_string();

            match methods::by_name(&method_name) {
                Some(method) if method.is_notification => {
                    tracing::info!(method = %method_name, "processing notification");
                    match method_name.as_str() {
                        "initialized" => self.handle_initialized()?,
                        "exit" => return Ok(()),
                        "textDocument/didOpen" => self.handle_did_open(&msg)?,
                        "textDocument/didChange" => self.handle_did_change(&msg)?,
                        "workspace/didChangeWatchedFiles" => {
                            self.handle_did_change_watched_files(&msg)?
                        }
                        // Recognized; in-flight work is not interruptible.
                        "$/cancelRequest" => {}
                        _ => {}
                    }
                }
                Some(_) => {
                    tracing::info!(method = %method_name, "processing request");
                    match method_name.as_str() {
                        "initialize" => self.handle_initialize(&msg)?,
                        "shutdown" => self.send_result(&msg, Value::Null)?,
                        "textDocument/documentSymbol" => self.handle_document_symbol(&msg)?,
                        "workspace/symbol" => self.handle_workspace_symbol(&msg)?,
                        "textDocument/definition" => self.handle_definition(&msg)?,
                        "textDocument/hover" => self.handle_hover(&msg)?,
                        other => {
                            self.send_error(
                                &msg,
                                methods::METHOD_NOT_FOUND,
                                format!("Unknown method: {other}"),
                            )?;
                        }
                    }
                }
                None => {
                    if msg.get("id").is_some() {
                        self.send_error(
                            &msg,
                            methods::METHOD_NOT_FOUND,
                            format!("Unknown method: {method_name}"),
                        )?;
                    } else {
                        tracing::debug!(method = %method_name, "ignoring unknown notification");
                    }
                }
            }
        }
    }

    // ------------------------------------------------------------
    // Session lifecycle
    // ------------------------------------------------------------

    fn handle_initialize(&mut self, msg: &Value) -> Result<(), ServerError> {
        if let Some(root) = msg
            .get("params")
            .and_then(|p| p.get("rootUri"))
            .and_then(Value::as_str)
        {
            self.root_uri = root.to_string();
        }
        let result = json!({
            "capabilities": {
                "textDocumentSync": 1,
                "documentSymbolProvider": true,
                "workspaceSymbolProvider": true,
                "definitionProvider": true,
                "hoverProvider": true,
            }
        });
        self.send_result(msg, result)
    }

    fn handle_initialized(&mut self) -> Result<(), ServerError> {
        tracing::info!("indexing workspace");
        self.reindex_from_file_system();
        self.run_slow_path(Vec::new());
        self.push_errors()?;
        self.global_state_hashes = self.compute_state_hashes(&self.final_model.all_files());
        Ok(())
    }

    // ------------------------------------------------------------
    // Document sync
    // ------------------------------------------------------------

    fn handle_did_open(&mut self, msg: &Value) -> Result<(), ServerError> {
        let doc = msg.get("params").and_then(|p| p.get("textDocument"));
        let uri = doc.and_then(|d| d.get("uri")).and_then(Value::as_str);
        let content = doc.and_then(|d| d.get("text")).and_then(Value::as_str);
        if let (Some(uri), Some(content)) = (uri, content) {
            self.update_document(uri, content)?;
        }
        Ok(())
    }

    fn handle_did_change(&mut self, msg: &Value) -> Result<(), ServerError> {
        let params = msg.get("params");
        let uri = params
            .and_then(|p| p.get("textDocument"))
            .and_then(|d| d.get("uri"))
            .and_then(Value::as_str);
        // Full sync: the new content is contentChanges[0].text.
        let content = params
            .and_then(|p| p.get("contentChanges"))
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("text"))
            .and_then(Value::as_str);
        if let (Some(uri), Some(content)) = (uri, content) {
            self.update_document(uri, content)?;
        }
        Ok(())
    }

    fn update_document(&mut self, uri: &str, content: &str) -> Result<(), ServerError> {
        if !uri.starts_with(self.root_uri.as_str()) {
            tracing::debug!(%uri, "outside workspace root; ignoring");
            return Ok(());
        }
        let path = self.remote_name_to_local(uri);
        let file = Arc::new(SourceFile::new(path, content, SourceKind::Normal));
        self.try_fast_path(vec![Some(file)]);
        self.push_errors()
    }

    fn handle_did_change_watched_files(&mut self, msg: &Value) -> Result<(), ServerError> {
        // Ask the client for the new contents; the update happens when
        // the reply arrives.
        let params = msg.get("params").cloned().unwrap_or(Value::Null);
        self.send_request("readFile", params, PendingRequest::ReadWatchedFiles)
    }

    // ------------------------------------------------------------
    // Replies to server-initiated requests
    // ------------------------------------------------------------

    /// Returns true when the message was a reply, not a fresh event.
    fn handle_replies(&mut self, msg: &Value) -> Result<bool, ServerError> {
        if let Some(result) = msg.get("result") {
            if let Some(id) = msg.get("id").and_then(Value::as_str) {
                if let Some(pending) = self.awaiting_response.remove(id) {
                    match pending {
                        PendingRequest::ReadWatchedFiles => {
                            self.handle_read_file_reply(result)?;
                        }
                    }
                }
            }
            return Ok(true);
        }
        if msg.get("error").is_some() {
            if let Some(id) = msg.get("id").and_then(Value::as_str) {
                if self.awaiting_response.remove(id).is_some() {
                    tracing::warn!(%id, "server-initiated request failed");
                }
            }
            return Ok(true);
        }
        Ok(false)
    }

    fn handle_read_file_reply(&mut self, result: &Value) -> Result<(), ServerError> {
        #[derive(serde::Deserialize)]
        struct ReadFileEntry {
            uri: String,
            content: String,
        }

        let entries: Vec<ReadFileEntry> =
            serde_json::from_value(result.clone()).unwrap_or_default();
        let files: Vec<Option<Arc<SourceFile>>> = entries
            .into_iter()
            .filter(|e| e.uri.starts_with(self.root_uri.as_str()))
            .map(|e| {
                let path = self.remote_name_to_local(&e.uri);
                Some(Arc::new(SourceFile::new(path, e.content, SourceKind::Normal)))
            })
            .collect();
        self.try_fast_path(files);
        self.push_errors()
    }

    // ------------------------------------------------------------
    // Wire helpers
    // ------------------------------------------------------------

    fn send_raw(&mut self, value: Value) -> Result<(), ServerError> {
        self.conn.write_message(&value)
    }

    fn send_result(&mut self, request: &Value, result: Value) -> Result<(), ServerError> {
        let id = request.get("id").cloned().unwrap_or(Value::Null);
        self.send_raw(json!({"jsonrpc": "2.0", "id": id, "result": result}))
    }

    fn send_error(
        &mut self,
        request: &Value,
        code: i64,
        message: String,
    ) -> Result<(), ServerError> {
        let id = request.get("id").cloned().unwrap_or(Value::Null);
        self.send_raw(json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": {"code": code, "message": message},
        }))
    }

    fn send_notification(&mut self, method: &str, params: Value) -> Result<(), ServerError> {
        self.send_raw(json!({"jsonrpc": "2.0", "method": method, "params": params}))
    }

    fn send_request(
        &mut self,
        method: &str,
        params: Value,
        pending: PendingRequest,
    ) -> Result<(), ServerError> {
        self.request_counter += 1;
        let id = format!("karat-req-{}", self.request_counter);
        self.awaiting_response.insert(id.clone(), pending);
        self.send_raw(json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params}))
    }

    // ------------------------------------------------------------
    // Introspection (used by the request handlers and by tests)
    // ------------------------------------------------------------

    pub fn initial_model(&self) -> &ProgramModel {
        &self.initial
    }

    pub fn final_model(&self) -> &ProgramModel {
        &self.final_model
    }

    pub fn global_state_hashes(&self) -> &[u32] {
        &self.global_state_hashes
    }

    /// Currently accumulated (published or publishable) diagnostics for
    /// one file.
    pub fn diagnostics_for(&self, fref: FileRef) -> &[Diagnostic] {
        self.errors_accumulated
            .get(&fref)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn set_root_uri(&mut self, root_uri: impl Into<String>) {
        self.root_uri = root_uri.into();
    }

    /// Tear down the loop and hand back the transport writer so its
    /// output can be inspected.
    pub fn into_writer(self) -> W {
        self.conn.into_writer()
    }
}
