//! Recursive descent parser.
//!
//! Produces an owned [`IndexedTree`] body plus a list of syntax
//! errors. Recovery is per statement: on an unexpected token the
//! parser records an error and skips to the next terminator.

use crate::core::Loc;
use crate::model::file::FileRef;

use super::ast::{Arg, Expr, LiteralValue};
use super::lexer::{tokenize, Token, TokenKind};

#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxError {
    pub message: String,
    pub loc: Loc,
}

/// Parse result: top-level statements and any errors.
#[derive(Debug, Clone)]
pub struct Parse {
    pub defs: Vec<Expr>,
    pub errors: Vec<SyntaxError>,
}

impl Parse {
    pub fn ok(&self) -> bool {
        self.errors.is_empty()
    }
}

pub fn parse(content: &str, fref: FileRef) -> Parse {
    let tokens = tokenize(content);
    let mut parser = Parser {
        tokens,
        pos: 0,
        fref,
        errors: Vec::new(),
        end_offset: content.len() as u32,
    };
    let defs = parser.parse_stmts(false);
    Parse {
        defs,
        errors: parser.errors,
    }
}

struct Parser<'a> {
    tokens: Vec<Token<'a>>,
    pos: usize,
    fref: FileRef,
    errors: Vec<SyntaxError>,
    end_offset: u32,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<Token<'a>> {
        self.tokens.get(self.pos).copied()
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.peek().map(|t| t.kind) == Some(kind)
    }

    fn at_eof(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn bump(&mut self) -> Option<Token<'a>> {
        let tok = self.peek();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, kind: TokenKind) -> Option<Token<'a>> {
        if self.at(kind) {
            self.bump()
        } else {
            None
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Option<Token<'a>> {
        if let Some(tok) = self.eat(kind) {
            return Some(tok);
        }
        let loc = self.here();
        self.error(format!("expected {what}"), loc);
        None
    }

    fn error(&mut self, message: String, loc: Loc) {
        self.errors.push(SyntaxError { message, loc });
    }

    fn tok_loc(&self, tok: Token<'a>) -> Loc {
        Loc::new(self.fref, tok.begin, tok.end)
    }

    /// Location of the current token, or a zero-width range at EOF.
    fn here(&self) -> Loc {
        match self.peek() {
            Some(tok) => self.tok_loc(tok),
            None => Loc::new(self.fref, self.end_offset, self.end_offset),
        }
    }

    fn skip_terminators(&mut self) {
        while self.at(TokenKind::Newline) || self.at(TokenKind::Semi) {
            self.bump();
        }
    }

    fn skip_to_terminator(&mut self) {
        while let Some(tok) = self.peek() {
            match tok.kind {
                TokenKind::Newline | TokenKind::Semi | TokenKind::EndKw => break,
                _ => {
                    self.bump();
                }
            }
        }
    }

    /// Statements up to `end` (when `in_body`) or EOF.
    fn parse_stmts(&mut self, in_body: bool) -> Vec<Expr> {
        let mut stmts = Vec::new();
        loop {
            self.skip_terminators();
            if self.at_eof() || (in_body && self.at(TokenKind::EndKw)) {
                break;
            }
            let before = self.pos;
            if let Some(stmt) = self.parse_stmt() {
                stmts.push(stmt);
            }
            if self.pos == before {
                // Ensure progress even on a token no rule wants.
                self.bump();
            }
        }
        stmts
    }

    fn parse_stmt(&mut self) -> Option<Expr> {
        match self.peek()?.kind {
            TokenKind::ClassKw => self.parse_class(),
            TokenKind::ModuleKw => self.parse_module(),
            TokenKind::DefKw => self.parse_method(),
            _ => {
                let expr = self.parse_expr();
                if expr.is_none() {
                    self.skip_to_terminator();
                }
                expr
            }
        }
    }

    /// Body statements plus the closing `end` location.
    fn parse_body_until_end(&mut self, opener: Loc) -> (Vec<Expr>, Loc) {
        let body = self.parse_stmts(true);
        match self.eat(TokenKind::EndKw) {
            Some(end_tok) => (body, self.tok_loc(end_tok)),
            None => {
                self.error("expected `end`".to_string(), opener);
                (body, self.here())
            }
        }
    }

    fn parse_class(&mut self) -> Option<Expr> {
        let class_tok = self.bump()?;
        let name_tok = self.expect(TokenKind::Constant, "a class name")?;
        let name_loc = self.tok_loc(name_tok);
        let mut decl_loc = self.tok_loc(class_tok).join(name_loc);

        let superclass = if self.eat(TokenKind::Lt).is_some() {
            let sup_tok = self.expect(TokenKind::Constant, "a superclass name")?;
            let sup_loc = self.tok_loc(sup_tok);
            decl_loc = decl_loc.join(sup_loc);
            Some(Box::new(Expr::ConstRef {
                name: sup_tok.text.to_string(),
                loc: sup_loc,
                resolved: Default::default(),
            }))
        } else {
            None
        };

        let (body, end_loc) = self.parse_body_until_end(decl_loc);
        Some(Expr::ClassDef {
            name: name_tok.text.to_string(),
            decl_loc,
            name_loc,
            superclass,
            body,
            loc: decl_loc.join(end_loc),
            symbol: Default::default(),
        })
    }

    fn parse_module(&mut self) -> Option<Expr> {
        let module_tok = self.bump()?;
        let name_tok = self.expect(TokenKind::Constant, "a module name")?;
        let name_loc = self.tok_loc(name_tok);
        let decl_loc = self.tok_loc(module_tok).join(name_loc);

        let (body, end_loc) = self.parse_body_until_end(decl_loc);
        Some(Expr::ModuleDef {
            name: name_tok.text.to_string(),
            decl_loc,
            name_loc,
            body,
            loc: decl_loc.join(end_loc),
            symbol: Default::default(),
        })
    }

    fn parse_method(&mut self) -> Option<Expr> {
        let def_tok = self.bump()?;
        let name_tok = self.expect(TokenKind::Ident, "a method name")?;
        let name_loc = self.tok_loc(name_tok);
        let mut decl_loc = self.tok_loc(def_tok).join(name_loc);

        let mut args = Vec::new();
        if self.eat(TokenKind::LParen).is_some() {
            loop {
                if self.at(TokenKind::RParen) {
                    break;
                }
                let Some(arg_tok) = self.expect(TokenKind::Ident, "an argument name") else {
                    self.skip_to_terminator();
                    break;
                };
                args.push(Arg {
                    name: arg_tok.text.to_string(),
                    loc: self.tok_loc(arg_tok),
                    symbol: Default::default(),
                });
                if self.eat(TokenKind::Comma).is_none() {
                    break;
                }
            }
            if let Some(close) = self.expect(TokenKind::RParen, "`)`") {
                decl_loc = decl_loc.join(self.tok_loc(close));
            }
        }

        let (body, end_loc) = self.parse_body_until_end(decl_loc);
        Some(Expr::MethodDef {
            name: name_tok.text.to_string(),
            decl_loc,
            name_loc,
            args,
            body,
            loc: decl_loc.join(end_loc),
            symbol: Default::default(),
        })
    }

    // ------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------

    fn parse_expr(&mut self) -> Option<Expr> {
        self.parse_assign()
    }

    fn parse_assign(&mut self) -> Option<Expr> {
        let lhs = self.parse_equality()?;
        if self.eat(TokenKind::Eq).is_none() {
            return Some(lhs);
        }
        let value = self.parse_assign()?;
        match lhs {
            Expr::Local { .. } | Expr::IvarRef { .. } | Expr::CvarRef { .. } => {
                let loc = lhs.loc().join(value.loc());
                Some(Expr::Assign {
                    target: Box::new(lhs),
                    value: Box::new(value),
                    loc,
                })
            }
            other => {
                self.error("invalid assignment target".to_string(), other.loc());
                Some(other)
            }
        }
    }

    fn parse_equality(&mut self) -> Option<Expr> {
        self.parse_binary(&[TokenKind::EqEq, TokenKind::NotEq], Self::parse_comparison)
    }

    fn parse_comparison(&mut self) -> Option<Expr> {
        self.parse_binary(
            &[
                TokenKind::Lt,
                TokenKind::Gt,
                TokenKind::LtEq,
                TokenKind::GtEq,
            ],
            Self::parse_or_xor,
        )
    }

    fn parse_or_xor(&mut self) -> Option<Expr> {
        self.parse_binary(&[TokenKind::Pipe, TokenKind::Caret], Self::parse_and)
    }

    fn parse_and(&mut self) -> Option<Expr> {
        self.parse_binary(&[TokenKind::Amp], Self::parse_additive)
    }

    fn parse_additive(&mut self) -> Option<Expr> {
        self.parse_binary(&[TokenKind::Plus, TokenKind::Minus], Self::parse_term)
    }

    fn parse_term(&mut self) -> Option<Expr> {
        self.parse_binary(&[TokenKind::Star, TokenKind::Slash], Self::parse_postfix)
    }

    /// Left-associative binary operators desugared to sends.
    fn parse_binary(
        &mut self,
        ops: &[TokenKind],
        next: fn(&mut Self) -> Option<Expr>,
    ) -> Option<Expr> {
        let mut lhs = next(self)?;
        while let Some(tok) = self.peek() {
            if !ops.contains(&tok.kind) {
                break;
            }
            self.bump();
            let rhs = next(self)?;
            let loc = lhs.loc().join(rhs.loc());
            lhs = Expr::Send {
                recv: Some(Box::new(lhs)),
                method: tok.text.to_string(),
                method_loc: self.tok_loc(tok),
                args: vec![rhs],
                loc,
            };
        }
        Some(lhs)
    }

    fn parse_postfix(&mut self) -> Option<Expr> {
        let mut expr = self.parse_primary()?;
        while self.eat(TokenKind::Dot).is_some() {
            let name_tok = self.expect(TokenKind::Ident, "a method name after `.`")?;
            let method_loc = self.tok_loc(name_tok);
            let (args, args_end) = if self.at(TokenKind::LParen) {
                self.parse_call_args()?
            } else {
                (Vec::new(), method_loc)
            };
            let loc = expr.loc().join(args_end);
            expr = Expr::Send {
                recv: Some(Box::new(expr)),
                method: name_tok.text.to_string(),
                method_loc,
                args,
                loc,
            };
        }
        Some(expr)
    }

    fn parse_call_args(&mut self) -> Option<(Vec<Expr>, Loc)> {
        let open = self.bump()?;
        let mut args = Vec::new();
        let mut close_loc = self.tok_loc(open);
        loop {
            if let Some(close) = self.eat(TokenKind::RParen) {
                close_loc = self.tok_loc(close);
                break;
            }
            args.push(self.parse_expr()?);
            if self.eat(TokenKind::Comma).is_none() {
                let close = self.expect(TokenKind::RParen, "`)`")?;
                close_loc = self.tok_loc(close);
                break;
            }
        }
        Some((args, close_loc))
    }

    fn parse_primary(&mut self) -> Option<Expr> {
        let tok = self.peek()?;
        let loc = self.tok_loc(tok);
        match tok.kind {
            TokenKind::Integer => {
                self.bump();
                let digits: String = tok.text.chars().filter(|c| *c != '_').collect();
                let value = match digits.parse::<i64>() {
                    Ok(v) => v,
                    Err(_) => {
                        self.error("integer literal out of range".to_string(), loc);
                        0
                    }
                };
                Some(Expr::Literal {
                    value: LiteralValue::Int(value),
                    loc,
                })
            }
            TokenKind::Float => {
                self.bump();
                let digits: String = tok.text.chars().filter(|c| *c != '_').collect();
                let value = digits.parse::<f64>().unwrap_or(0.0);
                Some(Expr::Literal {
                    value: LiteralValue::Float(value),
                    loc,
                })
            }
            TokenKind::Str => {
                self.bump();
                let inner = &tok.text[1..tok.text.len() - 1];
                Some(Expr::Literal {
                    value: LiteralValue::Str(inner.to_string()),
                    loc,
                })
            }
            TokenKind::TrueKw => {
                self.bump();
                Some(Expr::Literal {
                    value: LiteralValue::True,
                    loc,
                })
            }
            TokenKind::FalseKw => {
                self.bump();
                Some(Expr::Literal {
                    value: LiteralValue::False,
                    loc,
                })
            }
            TokenKind::NilKw => {
                self.bump();
                Some(Expr::Literal {
                    value: LiteralValue::Nil,
                    loc,
                })
            }
            TokenKind::SelfKw => {
                self.bump();
                Some(Expr::SelfRef { loc })
            }
            TokenKind::Constant => {
                self.bump();
                Some(Expr::ConstRef {
                    name: tok.text.to_string(),
                    loc,
                    resolved: Default::default(),
                })
            }
            TokenKind::Ident => {
                self.bump();
                if self.at(TokenKind::LParen) {
                    let (args, args_end) = self.parse_call_args()?;
                    Some(Expr::Send {
                        recv: None,
                        method: tok.text.to_string(),
                        method_loc: loc,
                        args,
                        loc: loc.join(args_end),
                    })
                } else {
                    Some(Expr::Local {
                        name: tok.text.to_string(),
                        loc,
                    })
                }
            }
            TokenKind::Ivar => {
                self.bump();
                Some(Expr::IvarRef {
                    name: tok.text.to_string(),
                    loc,
                })
            }
            TokenKind::Cvar => {
                self.bump();
                Some(Expr::CvarRef {
                    name: tok.text.to_string(),
                    loc,
                })
            }
            TokenKind::LParen => {
                self.bump();
                let expr = self.parse_expr()?;
                self.expect(TokenKind::RParen, "`)`")?;
                Some(expr)
            }
            _ => {
                self.error(format!("unexpected `{}`", tok.text), loc);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_one(input: &str) -> Parse {
        parse(input, FileRef(1))
    }

    #[test]
    fn test_empty_class() {
        let result = parse_one("class A; end");
        assert!(result.ok(), "{:?}", result.errors);
        assert_eq!(result.defs.len(), 1);
        match &result.defs[0] {
            Expr::ClassDef {
                name, superclass, ..
            } => {
                assert_eq!(name, "A");
                assert!(superclass.is_none());
            }
            other => panic!("expected class, got {other:?}"),
        }
    }

    #[test]
    fn test_class_with_superclass() {
        let result = parse_one("class B < A\nend");
        assert!(result.ok());
        match &result.defs[0] {
            Expr::ClassDef { superclass, .. } => match superclass.as_deref() {
                Some(Expr::ConstRef { name, .. }) => assert_eq!(name, "A"),
                other => panic!("expected const superclass, got {other:?}"),
            },
            other => panic!("expected class, got {other:?}"),
        }
    }

    #[test]
    fn test_method_with_args() {
        let result = parse_one("class A\n  def add(x, y)\n    x + y\n  end\nend");
        assert!(result.ok(), "{:?}", result.errors);
        let Expr::ClassDef { body, .. } = &result.defs[0] else {
            panic!("expected class");
        };
        let Expr::MethodDef { name, args, body, .. } = &body[0] else {
            panic!("expected method");
        };
        assert_eq!(name, "add");
        assert_eq!(args.len(), 2);
        assert_eq!(body.len(), 1);
        match &body[0] {
            Expr::Send { method, args, .. } => {
                assert_eq!(method, "+");
                assert_eq!(args.len(), 1);
            }
            other => panic!("expected send, got {other:?}"),
        }
    }

    #[test]
    fn test_binary_send_spans_operands() {
        let result = parse_one("1 + \"\"");
        assert!(result.ok());
        let loc = result.defs[0].loc();
        assert_eq!(loc.begin, 0);
        assert_eq!(loc.end, 6);
    }

    #[test]
    fn test_method_chain() {
        let result = parse_one("A.new.foo");
        assert!(result.ok());
        let Expr::Send { method, recv, .. } = &result.defs[0] else {
            panic!("expected send");
        };
        assert_eq!(method, "foo");
        let Some(Expr::Send { method, recv, .. }) = recv.as_deref() else {
            panic!("expected inner send");
        };
        assert_eq!(method, "new");
        assert!(matches!(recv.as_deref(), Some(Expr::ConstRef { .. })));
    }

    #[test]
    fn test_assignment() {
        let result = parse_one("x = 1\n@y = x");
        assert!(result.ok());
        assert_eq!(result.defs.len(), 2);
        assert!(matches!(&result.defs[0], Expr::Assign { .. }));
        let Expr::Assign { target, .. } = &result.defs[1] else {
            panic!("expected assign");
        };
        assert!(matches!(target.as_ref(), Expr::IvarRef { .. }));
    }

    #[test]
    fn test_invalid_assignment_target() {
        let result = parse_one("1 = 2");
        assert!(!result.ok());
    }

    #[test]
    fn test_missing_end_recovers() {
        let result = parse_one("class A\n  def foo\nend");
        assert!(!result.ok());
        assert_eq!(result.defs.len(), 1);
    }

    #[test]
    fn test_precedence() {
        let result = parse_one("1 + 2 * 3");
        assert!(result.ok());
        let Expr::Send { method, args, .. } = &result.defs[0] else {
            panic!("expected send");
        };
        assert_eq!(method, "+");
        let Expr::Send { method, .. } = &args[0] else {
            panic!("expected nested send");
        };
        assert_eq!(method, "*");
    }

    #[test]
    fn test_boolean_operator_precedence() {
        // `&` binds tighter than `|`, and both sit below arithmetic.
        let result = parse_one("true | false & nil");
        assert!(result.ok());
        let Expr::Send { method, args, .. } = &result.defs[0] else {
            panic!("expected send");
        };
        assert_eq!(method, "|");
        let Expr::Send { method, .. } = &args[0] else {
            panic!("expected nested send");
        };
        assert_eq!(method, "&");
    }

    #[test]
    fn test_implicit_self_call() {
        let result = parse_one("foo(1, 2)");
        assert!(result.ok());
        let Expr::Send { recv, args, .. } = &result.defs[0] else {
            panic!("expected send");
        };
        assert!(recv.is_none());
        assert_eq!(args.len(), 2);
    }
}
