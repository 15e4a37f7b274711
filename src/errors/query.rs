//! Query responses: what the typechecker observed at a designated
//! source location.
//!
//! When the model carries a query location, the checker emits one
//! response per expression whose range contains it, innermost first.
//! The server loop consumes the first (most specific) one.

use crate::core::Loc;
use crate::model::symbol::{SymbolRef, Type};

/// A type together with the locations it came from.
#[derive(Debug, Clone)]
pub struct TypeAndOrigins {
    pub ty: Type,
    pub origins: Vec<Loc>,
}

/// One dispatch target of a send: the receiver type it was found on
/// and the method symbol that would run.
#[derive(Debug, Clone)]
pub struct DispatchComponent {
    pub receiver: Type,
    pub method: SymbolRef,
}

#[derive(Debug, Clone)]
pub enum QueryResponse {
    Send {
        components: Vec<DispatchComponent>,
        ret: TypeAndOrigins,
    },
    Ident {
        ret: TypeAndOrigins,
    },
    Constant {
        components: Vec<DispatchComponent>,
        ret: TypeAndOrigins,
    },
    Literal {
        ret: TypeAndOrigins,
    },
}

impl QueryResponse {
    pub fn ret(&self) -> &TypeAndOrigins {
        match self {
            QueryResponse::Send { ret, .. }
            | QueryResponse::Ident { ret }
            | QueryResponse::Constant { ret, .. }
            | QueryResponse::Literal { ret } => ret,
        }
    }

    pub fn components(&self) -> &[DispatchComponent] {
        match self {
            QueryResponse::Send { components, .. }
            | QueryResponse::Constant { components, .. } => components,
            QueryResponse::Ident { .. } | QueryResponse::Literal { .. } => &[],
        }
    }
}
