//! Source files and the lightweight handles into the file table.

use std::sync::Arc;

use crate::core::Detail;

/// How a file entered the model.
///
/// `Payload` files are built-in stubs shipped with the server; their
/// locations render with a `#L<line>` anchor instead of a workspace
/// URI. A `TombStone` entry keeps its id reserved but is inert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Normal,
    Payload,
    TombStone,
}

/// Index into the model's file table. Id 0 is the reserved sentinel;
/// real files start at 1 and ids are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FileRef(pub u32);

impl FileRef {
    pub const NONE: FileRef = FileRef(0);

    pub fn id(self) -> usize {
        self.0 as usize
    }

    pub fn exists(self) -> bool {
        self.0 != 0
    }
}

/// An immutable source file snapshot.
///
/// Content never changes once installed; editing a file installs a new
/// snapshot under the same `FileRef`. The line index is built eagerly
/// so offset ↔ position conversion is a binary search.
#[derive(Debug)]
pub struct SourceFile {
    path: String,
    content: Arc<str>,
    kind: SourceKind,
    line_starts: Vec<u32>,
}

impl SourceFile {
    pub fn new(path: impl Into<String>, content: impl Into<Arc<str>>, kind: SourceKind) -> Self {
        let content = content.into();
        let mut line_starts = vec![0u32];
        for (i, b) in content.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i as u32 + 1);
            }
        }
        Self {
            path: path.into(),
            content,
            kind,
            line_starts,
        }
    }

    /// The inert placeholder occupying id 0 of every file table.
    pub(crate) fn sentinel() -> Self {
        Self::new("", "", SourceKind::TombStone)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn content(&self) -> &Arc<str> {
        &self.content
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Convert a byte offset to a 1-based (line, column) pair.
    /// Offsets past the end clamp to the last position.
    pub fn offset_to_detail(&self, offset: u32) -> Detail {
        let offset = offset.min(self.content.len() as u32);
        let line_idx = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        Detail::new(line_idx as u32 + 1, offset - self.line_starts[line_idx] + 1)
    }

    /// Convert a 1-based (line, column) pair back to a byte offset.
    /// Positions past the end of a line or file clamp.
    pub fn detail_to_offset(&self, detail: Detail) -> u32 {
        if detail.line == 0 {
            return 0;
        }
        let line_idx = (detail.line as usize - 1).min(self.line_starts.len() - 1);
        let line_start = self.line_starts[line_idx];
        let line_end = self
            .line_starts
            .get(line_idx + 1)
            .copied()
            .unwrap_or(self.content.len() as u32);
        (line_start + detail.column.saturating_sub(1)).min(line_end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_ref_sentinel() {
        assert!(!FileRef::NONE.exists());
        assert!(FileRef(1).exists());
        assert_eq!(FileRef::default(), FileRef::NONE);
    }

    #[test]
    fn test_offset_to_detail() {
        let f = SourceFile::new("a.rb", "class A\n  def foo\nend\n", SourceKind::Normal);
        assert_eq!(f.offset_to_detail(0), Detail::new(1, 1));
        assert_eq!(f.offset_to_detail(6), Detail::new(1, 7));
        assert_eq!(f.offset_to_detail(8), Detail::new(2, 1));
        assert_eq!(f.offset_to_detail(10), Detail::new(2, 3));
    }

    #[test]
    fn test_detail_to_offset_roundtrip() {
        let f = SourceFile::new("a.rb", "class A\n  def foo\nend\n", SourceKind::Normal);
        for offset in [0u32, 3, 7, 8, 12, 18, 21] {
            let detail = f.offset_to_detail(offset);
            assert_eq!(f.detail_to_offset(detail), offset);
        }
    }

    #[test]
    fn test_detail_to_offset_clamps() {
        let f = SourceFile::new("a.rb", "ab\ncd", SourceKind::Normal);
        // Column past the end of line 1 clamps to the line break.
        assert_eq!(f.detail_to_offset(Detail::new(1, 99)), 3);
        // Line past the end clamps into the last line.
        assert_eq!(f.detail_to_offset(Detail::new(9, 1)), 3);
    }

    #[test]
    fn test_empty_content() {
        let f = SourceFile::new("a.rb", "", SourceKind::Normal);
        assert_eq!(f.offset_to_detail(0), Detail::new(1, 1));
        assert_eq!(f.detail_to_offset(Detail::new(1, 1)), 0);
    }
}
