//! Logos-based lexer for the dialect.
//!
//! Newlines are tokens (they terminate statements); other whitespace
//! and comments are skipped. Anything unmatched becomes a single
//! `Error` token so the parser can recover at the next terminator.

use logos::Logos;

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r]+")]
#[logos(skip r"#[^\n]*")]
pub enum TokenKind {
    #[token("class")]
    ClassKw,
    #[token("module")]
    ModuleKw,
    #[token("def")]
    DefKw,
    #[token("end")]
    EndKw,
    #[token("self")]
    SelfKw,
    #[token("nil")]
    NilKw,
    #[token("true")]
    TrueKw,
    #[token("false")]
    FalseKw,

    #[regex(r"[a-z_][A-Za-z0-9_]*[?!]?")]
    Ident,
    #[regex(r"[A-Z][A-Za-z0-9_]*")]
    Constant,
    #[regex(r"@[A-Za-z_][A-Za-z0-9_]*")]
    Ivar,
    #[regex(r"@@[A-Za-z_][A-Za-z0-9_]*")]
    Cvar,

    #[regex(r"[0-9][0-9_]*\.[0-9][0-9_]*")]
    Float,
    #[regex(r"[0-9][0-9_]*")]
    Integer,
    #[regex(r#""[^"\n]*""#)]
    #[regex(r"'[^'\n]*'")]
    Str,

    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("&")]
    Amp,
    #[token("|")]
    Pipe,
    #[token("^")]
    Caret,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<=")]
    LtEq,
    #[token(">=")]
    GtEq,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("=")]
    Eq,
    #[token(".")]
    Dot,
    #[token(",")]
    Comma,
    #[token(";")]
    Semi,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("\n")]
    Newline,

    #[regex(r".", priority = 0)]
    Error,
}

/// A token with its kind, text and byte range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub begin: u32,
    pub end: u32,
}

/// Tokenize an entire string into a Vec.
pub fn tokenize(input: &str) -> Vec<Token<'_>> {
    let mut lexer = TokenKind::lexer(input);
    let mut tokens = Vec::new();
    while let Some(result) = lexer.next() {
        let span = lexer.span();
        tokens.push(Token {
            kind: result.unwrap_or(TokenKind::Error),
            text: lexer.slice(),
            begin: span.start as u32,
            end: span.end as u32,
        });
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_keywords_and_idents() {
        assert_eq!(
            kinds("class A; end"),
            vec![
                TokenKind::ClassKw,
                TokenKind::Constant,
                TokenKind::Semi,
                TokenKind::EndKw
            ]
        );
        // A keyword prefix stays an identifier.
        assert_eq!(kinds("classes"), vec![TokenKind::Ident]);
    }

    #[test]
    fn test_operators_longest_match() {
        assert_eq!(
            kinds("a == b"),
            vec![TokenKind::Ident, TokenKind::EqEq, TokenKind::Ident]
        );
        assert_eq!(
            kinds("a = b"),
            vec![TokenKind::Ident, TokenKind::Eq, TokenKind::Ident]
        );
        assert_eq!(kinds("<="), vec![TokenKind::LtEq]);
    }

    #[test]
    fn test_variables() {
        assert_eq!(kinds("@x"), vec![TokenKind::Ivar]);
        assert_eq!(kinds("@@x"), vec![TokenKind::Cvar]);
    }

    #[test]
    fn test_boolean_operators() {
        assert_eq!(
            kinds("a & b | c ^ d"),
            vec![
                TokenKind::Ident,
                TokenKind::Amp,
                TokenKind::Ident,
                TokenKind::Pipe,
                TokenKind::Ident,
                TokenKind::Caret,
                TokenKind::Ident
            ]
        );
    }

    #[test]
    fn test_literals() {
        assert_eq!(kinds("42"), vec![TokenKind::Integer]);
        assert_eq!(kinds("4.2"), vec![TokenKind::Float]);
        assert_eq!(kinds("\"hi\""), vec![TokenKind::Str]);
        assert_eq!(kinds("'hi'"), vec![TokenKind::Str]);
    }

    #[test]
    fn test_comments_skipped() {
        assert_eq!(
            kinds("a # trailing\nb"),
            vec![TokenKind::Ident, TokenKind::Newline, TokenKind::Ident]
        );
    }

    #[test]
    fn test_spans() {
        let tokens = tokenize("1 + 2");
        assert_eq!(tokens[1].begin, 2);
        assert_eq!(tokens[1].end, 3);
        assert_eq!(tokens[2].text, "2");
    }

    #[test]
    fn test_unknown_char_is_error_token() {
        assert_eq!(kinds("§"), vec![TokenKind::Error]);
    }
}
