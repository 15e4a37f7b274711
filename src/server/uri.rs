//! URI ↔ path and location ↔ wire-range conversion.
//!
//! Local paths are workspace-relative: the URI minus `<rootUri>/`.
//! Payload files publish under their raw path and render locations
//! with a `#L<line>` anchor.

use std::io::{BufRead, Write};

use serde_json::{json, Value};

use crate::core::Loc;
use crate::model::file::{FileRef, SourceKind};

use super::LspLoop;

impl<R: BufRead, W: Write> LspLoop<R, W> {
    pub(crate) fn remote_name_to_local(&self, uri: &str) -> String {
        debug_assert!(uri.starts_with(self.root_uri.as_str()));
        uri.get(self.root_uri.len() + 1..)
            .unwrap_or_default()
            .to_string()
    }

    pub(crate) fn local_name_to_remote(&self, path: &str) -> String {
        format!("{}/{}", self.root_uri, path)
    }

    /// Files outside the root resolve to `FileRef::NONE`.
    pub(crate) fn uri_to_file_ref(&self, uri: &str) -> FileRef {
        if !uri.starts_with(self.root_uri.as_str()) {
            return FileRef::NONE;
        }
        let needle = self.remote_name_to_local(uri);
        self.initial.find_file_by_path(&needle)
    }

    pub(crate) fn file_ref_to_uri(&self, fref: FileRef) -> String {
        let file = self.final_model.file(fref);
        if file.kind() == SourceKind::Payload {
            file.path().to_string()
        } else {
            self.local_name_to_remote(file.path())
        }
    }

    /// Wire ranges are 0-based; internal positions are 1-based.
    pub(crate) fn loc_to_range(&self, loc: Loc) -> Value {
        let file = self.final_model.file(loc.file);
        let (begin, end) = loc.position(file);
        json!({
            "start": {"line": begin.line - 1, "character": begin.column - 1},
            "end": {"line": end.line - 1, "character": end.column - 1},
        })
    }

    pub(crate) fn loc_to_location(&self, loc: Loc) -> Value {
        let file = self.final_model.file(loc.file);
        let uri = if file.kind() == SourceKind::Payload {
            // A github-style line anchor; clients that append their own
            // position fragment still land on the right line.
            let (begin, _) = loc.position(file);
            format!("{}#L{}", file.path(), begin.line)
        } else {
            self.file_ref_to_uri(loc.file)
        };
        json!({"uri": uri, "range": self.loc_to_range(loc)})
    }
}
