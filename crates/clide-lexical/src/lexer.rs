//! Token-level lexer for C and C++.
//!
//! The lexer never fails: unrecognized input comes back as
//! [`TokenKind::Error`] so that half-typed buffers still index.

use logos::Logos;
use text_size::{TextRange, TextSize};

fn lex_block_comment(lex: &mut logos::Lexer<TokenKind>) -> bool {
    if let Some(end) = lex.remainder().find("*/") {
        lex.bump(end + 2);
        true
    } else {
        lex.bump(lex.remainder().len());
        false
    }
}

/// C and C++ token kinds.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TokenKind {
    /// Spaces, tabs and line breaks.
    #[regex(r"[ \t\r\n\f\v]+")]
    Whitespace,

    /// `// ...` up to the end of the line.
    #[regex(r"//[^\r\n]*", allow_greedy = true)]
    LineComment,

    /// `/* ... */`
    #[token("/*", lex_block_comment)]
    BlockComment,

    /// Preprocessor directive name, e.g. `#include` or `# define`.
    #[regex(r"#[ \t]*[A-Za-z_]+")]
    Directive,

    /// `#` or `##` outside a directive name.
    #[token("#")]
    #[token("##")]
    Hash,

    #[regex(r#""([^"\\\r\n]|\\.)*""#)]
    StringLiteral,

    #[regex(r"'([^'\\\r\n]|\\.)*'")]
    CharLiteral,

    #[regex(r"[0-9][0-9A-Za-z_.]*")]
    Number,

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Ident,

    #[token("::")]
    ColonColon,
    #[token("->")]
    Arrow,
    #[token(".")]
    Dot,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(";")]
    Semicolon,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("*")]
    Star,
    #[token("&")]
    Amp,
    #[token("&&")]
    AmpAmp,
    #[token("=")]
    Eq,
    #[token("~")]
    Tilde,

    /// Any other operator.
    #[token("+")]
    #[token("-")]
    #[token("/")]
    #[token("%")]
    #[token("^")]
    #[token("|")]
    #[token("!")]
    #[token("?")]
    #[token("==")]
    #[token("!=")]
    #[token("<=")]
    #[token(">=")]
    #[token("||")]
    #[token("<<")]
    #[token(">>")]
    #[token("++")]
    #[token("--")]
    #[token("+=")]
    #[token("-=")]
    #[token("*=")]
    #[token("/=")]
    #[token("%=")]
    #[token("&=")]
    #[token("|=")]
    #[token("^=")]
    #[token("<<=")]
    #[token(">>=")]
    #[token("->*")]
    #[token(".*")]
    #[token("...")]
    Operator,

    #[default]
    Error,
}

impl TokenKind {
    /// Returns `true` for whitespace and comments.
    #[must_use]
    pub fn is_trivia(self) -> bool {
        matches!(
            self,
            Self::Whitespace | Self::LineComment | Self::BlockComment
        )
    }
}

/// A token produced by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte range in the source text.
    pub range: TextRange,
}

impl Token {
    #[must_use]
    pub fn new(kind: TokenKind, range: TextRange) -> Self {
        Self { kind, range }
    }

    /// Returns the token's text in `source`.
    #[must_use]
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.range]
    }
}

/// Iterator over the tokens of a C or C++ source text.
pub struct Lexer<'src> {
    inner: logos::Lexer<'src, TokenKind>,
}

impl<'src> Lexer<'src> {
    #[must_use]
    pub fn new(source: &'src str) -> Self {
        Self {
            inner: TokenKind::lexer(source),
        }
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Self::Item> {
        let kind = self.inner.next()?.unwrap_or(TokenKind::Error);
        let span = self.inner.span();
        let range = TextRange::new(
            TextSize::from(span.start as u32),
            TextSize::from(span.end as u32),
        );
        Some(Token::new(kind, range))
    }
}

/// Lex the entire source and return all tokens.
#[must_use]
pub fn lex(source: &str) -> Vec<Token> {
    Lexer::new(source).collect()
}

/// A non-trivia token with its text and whether a line break precedes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignificantToken<'src> {
    pub kind: TokenKind,
    pub text: &'src str,
    pub range: TextRange,
    /// True for the first token on a line (including the first token).
    pub starts_line: bool,
}

/// Lex `source`, dropping trivia but remembering where lines start.
///
/// Line comments and block comments spanning lines count as line breaks, so
/// the end of a preprocessor directive is always detectable.
#[must_use]
pub fn significant_tokens(source: &str) -> Vec<SignificantToken<'_>> {
    let mut tokens = Vec::new();
    let mut starts_line = true;
    for token in Lexer::new(source) {
        let text = token.text(source);
        if token.kind.is_trivia() {
            if token.kind == TokenKind::LineComment || text.contains('\n') {
                starts_line = true;
            }
            continue;
        }
        tokens.push(SignificantToken {
            kind: token.kind,
            text,
            range: token.range,
            starts_line,
        });
        starts_line = false;
    }
    tokens
}
