//! The query binder: definition and hover.
//!
//! A query installs a single-point location on both models, re-runs
//! the fast path over just the queried file (a content-identical
//! replace, so resolved state is reused), and harvests the responses
//! the typechecker emitted at that location. No separate "query mode"
//! exists in the pipeline.

use std::io::{BufRead, Write};
use std::sync::Arc;

use serde_json::{json, Value};

use crate::core::{Detail, Loc};
use crate::errors::QueryResponse;
use crate::model::file::FileRef;

use super::methods::INVALID_PARAMS;
use super::transport::ServerError;
use super::LspLoop;

impl<R: BufRead, W: Write> LspLoop<R, W> {
    /// Answer "what is at (line, column)?" with 0-based wire
    /// coordinates. Returns the first (innermost) response, if any.
    ///
    /// The accumulated diagnostic state is re-drained afterwards so a
    /// query leaves it observably unchanged.
    pub fn query(&mut self, fref: FileRef, line: u32, character: u32) -> Option<QueryResponse> {
        let detail = Detail::new(line + 1, character + 1);
        let offset = self.final_model.file(fref).detail_to_offset(detail);
        let loc = Loc::new(fref, offset, offset);

        self.initial.lsp_query_loc = Some(loc);
        self.final_model.lsp_query_loc = Some(loc);

        let current = Arc::clone(self.final_model.file(fref));
        self.try_fast_path(vec![Some(current)]);

        self.initial.lsp_query_loc = None;
        self.final_model.lsp_query_loc = None;

        let response = self.errors.drain_query_responses().into_iter().next();
        self.drain_errors_into_accumulated();
        response
    }

    fn position_params(msg: &Value) -> Option<(u32, u32)> {
        let position = msg.get("params")?.get("position")?;
        Some((
            position.get("line")?.as_u64()? as u32,
            position.get("character")?.as_u64()? as u32,
        ))
    }

    fn text_document_uri(msg: &Value) -> Option<&str> {
        msg.get("params")?
            .get("textDocument")?
            .get("uri")?
            .as_str()
    }

    pub(crate) fn handle_definition(&mut self, msg: &Value) -> Result<(), ServerError> {
        let mut result = Vec::new();

        let fref = Self::text_document_uri(msg)
            .map(|uri| self.uri_to_file_ref(uri))
            .unwrap_or(FileRef::NONE);
        if fref.exists() {
            if let Some((line, character)) = Self::position_params(msg) {
                if let Some(response) = self.query(fref, line, character) {
                    match &response {
                        QueryResponse::Ident { ret } => {
                            if let Some(&loc) = ret.origins.first() {
                                if loc.exists() {
                                    result.push(self.loc_to_location(loc));
                                }
                            }
                        }
                        _ => {
                            for component in response.components() {
                                if component.method.exists() {
                                    let loc =
                                        self.final_model.symbol(component.method).definition_loc;
                                    if loc.exists() {
                                        result.push(self.loc_to_location(loc));
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
        self.send_result(msg, Value::Array(result))
    }

    pub(crate) fn handle_hover(&mut self, msg: &Value) -> Result<(), ServerError> {
        let Some(uri) = Self::text_document_uri(msg).map(str::to_string) else {
            return self.send_error(msg, INVALID_PARAMS, "missing textDocument.uri".to_string());
        };
        let fref = self.uri_to_file_ref(&uri);
        if !fref.exists() {
            return self.send_error(
                msg,
                INVALID_PARAMS,
                format!("Did not find file at uri {uri} in textDocument/hover"),
            );
        }
        let Some((line, character)) = Self::position_params(msg) else {
            return self.send_error(msg, INVALID_PARAMS, "missing position".to_string());
        };

        let Some(response) = self.query(fref, line, character) else {
            return self.send_error(
                msg,
                INVALID_PARAMS,
                "Did not find symbol at hover location in textDocument/hover".to_string(),
            );
        };

        let value = match &response {
            QueryResponse::Send { components, ret } => {
                if components.is_empty() {
                    return self.send_error(
                        msg,
                        INVALID_PARAMS,
                        "Did not find any dispatchComponents for a send in textDocument/hover"
                            .to_string(),
                    );
                }
                let mut contents = String::new();
                for component in components {
                    if !component.method.exists() {
                        continue;
                    }
                    let method = self.final_model.symbol(component.method);
                    let args = method
                        .arguments
                        .iter()
                        .map(|&arg| {
                            let arg = self.final_model.symbol(arg);
                            format!("{}: {}", arg.name, arg.result_type.show(&self.final_model))
                        })
                        .collect::<Vec<_>>()
                        .join(", ");
                    if !contents.is_empty() {
                        contents.push(' ');
                    }
                    contents.push_str(&format!(
                        "```{} {}({})```",
                        ret.ty.show(&self.final_model),
                        method.name,
                        args
                    ));
                }
                contents
            }
            QueryResponse::Ident { ret }
            | QueryResponse::Constant { ret, .. }
            | QueryResponse::Literal { ret } => ret.ty.show(&self.final_model),
        };

        // Markdown, not plain text: clients render `<Class:Foo>` as a
        // literal inside the fence instead of inventing a link.
        let result = json!({
            "contents": {"kind": "markdown", "value": value}
        });
        self.send_result(msg, result)
    }
}
