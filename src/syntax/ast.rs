//! The owned AST.
//!
//! One [`IndexedTree`] per file, owned by the program model's tree
//! vector. Trees deep-copy via `Clone`: the fast and slow paths clone
//! a tree before the resolver and typechecker mutate it. The namer
//! fills the `symbol` slots, the resolver fills `resolved` slots.

use crate::core::Loc;
use crate::model::file::FileRef;
use crate::model::symbol::SymbolRef;

/// The parsed-and-named tree for one file.
#[derive(Debug, Clone)]
pub struct IndexedTree {
    pub fref: FileRef,
    pub defs: Vec<Expr>,
}

/// A declared method argument.
#[derive(Debug, Clone)]
pub struct Arg {
    pub name: String,
    pub loc: Loc,
    pub symbol: SymbolRef,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    Int(i64),
    Float(f64),
    Str(String),
    True,
    False,
    Nil,
}

#[derive(Debug, Clone)]
pub enum Expr {
    ClassDef {
        name: String,
        /// Header span: `class` keyword through name and superclass.
        decl_loc: Loc,
        name_loc: Loc,
        superclass: Option<Box<Expr>>,
        body: Vec<Expr>,
        loc: Loc,
        symbol: SymbolRef,
    },
    ModuleDef {
        name: String,
        decl_loc: Loc,
        name_loc: Loc,
        body: Vec<Expr>,
        loc: Loc,
        symbol: SymbolRef,
    },
    MethodDef {
        name: String,
        /// Header span: `def` keyword through name and parameter list.
        decl_loc: Loc,
        name_loc: Loc,
        args: Vec<Arg>,
        body: Vec<Expr>,
        loc: Loc,
        symbol: SymbolRef,
    },
    Send {
        /// Receiver; `None` means an implicit send to `self`.
        recv: Option<Box<Expr>>,
        method: String,
        method_loc: Loc,
        args: Vec<Expr>,
        loc: Loc,
    },
    ConstRef {
        name: String,
        loc: Loc,
        resolved: SymbolRef,
    },
    Local {
        name: String,
        loc: Loc,
    },
    IvarRef {
        name: String,
        loc: Loc,
    },
    CvarRef {
        name: String,
        loc: Loc,
    },
    SelfRef {
        loc: Loc,
    },
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
        loc: Loc,
    },
    Literal {
        value: LiteralValue,
        loc: Loc,
    },
}

impl Expr {
    pub fn loc(&self) -> Loc {
        match self {
            Expr::ClassDef { loc, .. }
            | Expr::ModuleDef { loc, .. }
            | Expr::MethodDef { loc, .. }
            | Expr::Send { loc, .. }
            | Expr::ConstRef { loc, .. }
            | Expr::Local { loc, .. }
            | Expr::IvarRef { loc, .. }
            | Expr::CvarRef { loc, .. }
            | Expr::SelfRef { loc }
            | Expr::Assign { loc, .. }
            | Expr::Literal { loc, .. } => *loc,
        }
    }
}
