//! Surface syntax of the dialect: lexer, AST and parser.

pub mod ast;
pub mod lexer;
pub mod parser;

pub use self::ast::{Expr, IndexedTree};
pub use self::parser::{parse, Parse, SyntaxError};
