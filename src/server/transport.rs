//! Stdio framing: `Content-Length: <n>\r\n\r\n` + `<n>` bytes of JSON.
//!
//! Reading tolerates both `\n` and `\r\n` header terminators. EOF on a
//! header-less line ends the session cleanly; a JSON parse error ends
//! it with an error.

use std::io::{BufRead, Write};

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// The server's half of the wire. Generic so tests can drive the loop
/// over in-memory buffers.
pub struct Connection<R, W> {
    reader: R,
    writer: W,
}

impl<R: BufRead, W: Write> Connection<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    pub fn into_writer(self) -> W {
        self.writer
    }

    /// Read one framed message. `Ok(None)` means the session is over
    /// (EOF before a complete header block).
    pub fn read_message(&mut self) -> Result<Option<Value>, ServerError> {
        let mut length: i64 = -1;
        loop {
            let Some(line) = self.read_header_line()? else {
                return Ok(None);
            };
            tracing::trace!(raw = %line, "read");
            if line.is_empty() {
                break;
            }
            if let Some(rest) = line.strip_prefix("Content-Length:") {
                if let Ok(n) = rest.trim().parse::<i64>() {
                    length = n;
                }
            }
        }
        if length < 0 {
            return Ok(None);
        }

        let mut body = vec![0u8; length as usize];
        self.reader.read_exact(&mut body)?;
        let value: Value = serde_json::from_slice(&body)?;
        tracing::debug!(body = %String::from_utf8_lossy(&body), "read message");
        Ok(Some(value))
    }

    /// One header line without its terminator; `None` at EOF, including
    /// a final line with no line ending.
    fn read_header_line(&mut self) -> Result<Option<String>, ServerError> {
        let mut buf = Vec::new();
        let n = self.reader.read_until(b'\n', &mut buf)?;
        if n == 0 || buf.last() != Some(&b'\n') {
            return Ok(None);
        }
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
        Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
    }

    /// Framed write; one flush per message so a publication is atomic
    /// from the client's standpoint.
    pub fn write_message(&mut self, value: &Value) -> Result<(), ServerError> {
        let body = serde_json::to_string(value)?;
        tracing::debug!(%body, "write message");
        write!(self.writer, "Content-Length: {}\r\n\r\n{}", body.len(), body)?;
        self.writer.flush()?;
        Ok(())
    }
}
