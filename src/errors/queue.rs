//! The concurrent queue threading pipeline output back to the loop.
//!
//! Multi-producer (pipeline passes, possibly on worker threads),
//! single consumer (the server loop). Diagnostics and query responses
//! are two logically independent streams sharing one buffer so that
//! push order within a file is preserved; each drain removes only its
//! own stream and is atomic with respect to concurrent pushes.

use std::sync::Mutex;

use super::{Diagnostic, QueryResponse};

#[derive(Debug)]
enum Item {
    Diagnostic(Diagnostic),
    QueryResponse(QueryResponse),
}

#[derive(Debug, Default)]
pub struct ErrorQueue {
    items: Mutex<Vec<Item>>,
}

impl ErrorQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Non-blocking, thread-safe.
    pub fn push_diagnostic(&self, diagnostic: Diagnostic) {
        self.items
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(Item::Diagnostic(diagnostic));
    }

    /// Non-blocking, thread-safe.
    pub fn push_query_response(&self, response: QueryResponse) {
        self.items
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(Item::QueryResponse(response));
    }

    /// Take ownership of all queued diagnostics, preserving push order.
    /// Query responses stay queued.
    pub fn drain_errors(&self) -> Vec<Diagnostic> {
        let mut items = self.items.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut drained = Vec::new();
        let mut kept = Vec::with_capacity(items.len());
        for item in items.drain(..) {
            match item {
                Item::Diagnostic(d) => drained.push(d),
                other => kept.push(other),
            }
        }
        *items = kept;
        drained
    }

    /// Take ownership of all queued query responses, preserving push
    /// order. Diagnostics stay queued.
    pub fn drain_query_responses(&self) -> Vec<QueryResponse> {
        let mut items = self.items.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut drained = Vec::new();
        let mut kept = Vec::with_capacity(items.len());
        for item in items.drain(..) {
            match item {
                Item::QueryResponse(r) => drained.push(r),
                other => kept.push(other),
            }
        }
        *items = kept;
        drained
    }

    /// Discard everything. Scratch models use this so a pass executed
    /// purely for fingerprinting leaves no trace.
    pub fn drain_all(&self) {
        self.items.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clear();
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().unwrap_or_else(std::sync::PoisonError::into_inner).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Loc;
    use crate::errors::{codes, BasicError, TypeAndOrigins};
    use crate::model::symbol::Type;

    fn diag(message: &str) -> Diagnostic {
        Diagnostic::Basic(BasicError {
            loc: Loc::NONE,
            what: codes::infer::UNKNOWN_METHOD,
            message: message.to_string(),
        })
    }

    fn response() -> QueryResponse {
        QueryResponse::Literal {
            ret: TypeAndOrigins {
                ty: Type::Nil,
                origins: vec![],
            },
        }
    }

    #[test]
    fn test_streams_are_independent() {
        let q = ErrorQueue::new();
        q.push_diagnostic(diag("a"));
        q.push_query_response(response());
        q.push_diagnostic(diag("b"));

        let responses = q.drain_query_responses();
        assert_eq!(responses.len(), 1);

        let errors = q.drain_errors();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].basic().message, "a");
        assert_eq!(errors[1].basic().message, "b");
        assert!(q.is_empty());
    }

    #[test]
    fn test_drain_preserves_push_order() {
        let q = ErrorQueue::new();
        for i in 0..5 {
            q.push_diagnostic(diag(&i.to_string()));
        }
        let drained = q.drain_errors();
        let messages: Vec<_> = drained.iter().map(|d| d.basic().message.clone()).collect();
        assert_eq!(messages, vec!["0", "1", "2", "3", "4"]);
    }

    #[test]
    fn test_drain_all_discards() {
        let q = ErrorQueue::new();
        q.push_diagnostic(diag("a"));
        q.push_query_response(response());
        q.drain_all();
        assert!(q.is_empty());
    }

    #[test]
    fn test_concurrent_pushes() {
        use std::sync::Arc;
        let q = Arc::new(ErrorQueue::new());
        let mut handles = Vec::new();
        for _ in 0..4 {
            let q = Arc::clone(&q);
            handles.push(std::thread::spawn(move || {
                for _ in 0..100 {
                    q.push_diagnostic(diag("x"));
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(q.drain_errors().len(), 400);
    }
}
