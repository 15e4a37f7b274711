//! Diagnostics produced by the pipeline passes.
//!
//! A diagnostic is either basic (location, class, message) or complex
//! (basic plus sections of related locations). Both flow through the
//! [`queue::ErrorQueue`] to the server loop, which filters, accumulates
//! and publishes them per file.

pub mod codes;
pub mod query;
pub mod queue;

pub use self::query::{DispatchComponent, QueryResponse, TypeAndOrigins};
pub use self::queue::ErrorQueue;

use crate::core::Loc;
use crate::model::ProgramModel;

/// Identifies one class of error across the pipeline. The numeric code
/// is what clients see in the diagnostic's `code` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorClass {
    pub code: u16,
}

impl ErrorClass {
    pub const fn new(code: u16) -> Self {
        Self { code }
    }
}

/// Location, class and formatted message.
#[derive(Debug, Clone)]
pub struct BasicError {
    pub loc: Loc,
    pub what: ErrorClass,
    pub message: String,
}

/// One related location inside an [`ErrorSection`].
#[derive(Debug, Clone)]
pub struct ErrorLine {
    pub loc: Loc,
    pub message: String,
}

/// A titled group of related locations attached to a complex error.
#[derive(Debug, Clone)]
pub struct ErrorSection {
    pub header: String,
    pub messages: Vec<ErrorLine>,
}

#[derive(Debug, Clone)]
pub enum Diagnostic {
    Basic(BasicError),
    Complex(BasicError, Vec<ErrorSection>),
}

impl Diagnostic {
    pub fn basic(&self) -> &BasicError {
        match self {
            Diagnostic::Basic(e) | Diagnostic::Complex(e, _) => e,
        }
    }

    pub fn sections(&self) -> &[ErrorSection] {
        match self {
            Diagnostic::Basic(_) => &[],
            Diagnostic::Complex(_, sections) => sections,
        }
    }

    pub fn loc(&self) -> Loc {
        self.basic().loc
    }

    pub fn what(&self) -> ErrorClass {
        self.basic().what
    }

    /// Render for logs: `path:line[-line] message [code]`, sections
    /// indented underneath.
    pub fn render(&self, pm: &ProgramModel) -> String {
        let mut buf = format!(
            "{} {} [{}]",
            file_pos_to_string(pm, self.loc()),
            self.basic().message,
            self.what().code
        );
        for section in self.sections() {
            if !section.header.is_empty() {
                buf.push_str("\n  ");
                buf.push_str(&section.header);
            }
            for line in &section.messages {
                buf.push_str("\n  ");
                buf.push_str(&file_pos_to_string(pm, line.loc));
                buf.push(' ');
                buf.push_str(&line.message);
            }
        }
        buf
    }
}

fn file_pos_to_string(pm: &ProgramModel, loc: Loc) -> String {
    if loc.is_none() {
        return "???:".to_string();
    }
    let file = pm.file(loc.file);
    let (begin, end) = loc.position(file);
    if end.line != begin.line {
        format!("{}:{}-{}", file.path(), begin.line, end.line)
    } else {
        format!("{}:{}", file.path(), begin.line)
    }
}
