//! The diagnostic publisher.
//!
//! Drains the error queue, drops silenced classes, accumulates
//! survivors per file, and emits one `publishDiagnostics` per touched
//! file carrying that file's *complete* current set (LSP replace
//! semantics).

use std::io::{BufRead, Write};

use serde_json::{json, Value};

use crate::errors::{codes, Diagnostic, ErrorClass};
use crate::model::file::{FileRef, SourceKind};

use super::transport::ServerError;
use super::LspLoop;

/// Classes dropped from the publication stream. These fire
/// legitimately under incremental re-indexing (the same definition is
/// entered again), so surfacing them would be noise.
pub fn silence_error(what: ErrorClass) -> bool {
    what == codes::namer::METHOD_REDEFINED
        || what == codes::namer::DUPLICATE_VARIABLE
        || what == codes::resolver::PARENT_REDEFINED
}

impl<R: BufRead, W: Write> LspLoop<R, W> {
    /// Move queued diagnostics into the per-file accumulator, dropping
    /// silenced classes and recording which files changed. Entries for
    /// tombstoned files are purged.
    pub(crate) fn drain_errors_into_accumulated(&mut self) {
        for diagnostic in self.errors.drain_errors() {
            if silence_error(diagnostic.what()) {
                continue;
            }
            tracing::debug!("{}", diagnostic.render(&self.initial));
            let file = diagnostic.loc().file;
            self.errors_accumulated
                .entry(file)
                .or_default()
                .push(diagnostic);
            if !self.updated_errors.contains(&file) {
                self.updated_errors.push(file);
            }
        }

        let initial = &self.initial;
        self.errors_accumulated
            .retain(|fref, _| initial.file(*fref).kind() != SourceKind::TombStone);
    }

    /// Every live file republishes after a full invalidation, so a fix
    /// that leaves a file clean still clears its stale squiggles.
    pub(crate) fn invalidate_all_errors(&mut self) {
        self.errors_accumulated.clear();
        self.updated_errors.clear();
        for id in 1..self.initial.files_used() {
            let fref = FileRef(id as u32);
            if self.initial.file(fref).kind() != SourceKind::TombStone {
                self.updated_errors.push(fref);
            }
        }
    }

    pub(crate) fn invalidate_errors_for(&mut self, frefs: &[FileRef]) {
        for fref in frefs {
            self.errors_accumulated.shift_remove(fref);
            if !self.updated_errors.contains(fref) {
                self.updated_errors.push(*fref);
            }
        }
    }

    /// Drain and publish. One message per touched file, each carrying
    /// the full current set for that file.
    pub fn push_errors(&mut self) -> Result<(), ServerError> {
        self.drain_errors_into_accumulated();

        let updated = std::mem::take(&mut self.updated_errors);
        let mut publications = Vec::with_capacity(updated.len());
        for file in updated {
            if !file.exists() {
                continue;
            }
            let source = self.initial.file(file);
            if source.kind() == SourceKind::TombStone {
                continue;
            }
            let uri = if source.kind() == SourceKind::Payload {
                source.path().to_string()
            } else {
                self.local_name_to_remote(source.path())
            };
            let diagnostics: Vec<Value> = self
                .errors_accumulated
                .get(&file)
                .map(|list| list.iter().map(|e| self.diagnostic_to_json(e)).collect())
                .unwrap_or_default();
            publications.push(json!({"uri": uri, "diagnostics": diagnostics}));
        }

        for params in publications {
            self.send_notification("textDocument/publishDiagnostics", params)?;
        }
        Ok(())
    }

    fn diagnostic_to_json(&self, diagnostic: &Diagnostic) -> Value {
        let mut value = json!({
            "range": self.loc_to_range(diagnostic.loc()),
            "code": diagnostic.what().code,
            "message": diagnostic.basic().message,
        });
        if let Diagnostic::Complex(_, sections) = diagnostic {
            let mut related = Vec::new();
            for section in sections {
                for line in &section.messages {
                    // A line with no message of its own stands under
                    // the section header.
                    let message = if line.message.is_empty() {
                        section.header.clone()
                    } else {
                        line.message.clone()
                    };
                    related.push(json!({
                        "location": self.loc_to_location(line.loc),
                        "message": message,
                    }));
                }
            }
            value["relatedInformation"] = Value::Array(related);
        }
        value
    }
}
