use crate::span::Location;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sign {
    None,
    Plus,
    Minus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Base {
    Decimal,
    Hex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralKind {
    Normal,
    Nan,
    NanPayload,
    Inf,
}

/// How a numeric token was spelled, so the parser can apply the right
/// conversion later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiteralInfo {
    pub sign: Sign,
    pub base: Base,
    pub has_underscores: bool,
    pub kind: LiteralKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Lpar,
    Rpar,
    /// Keyword or mnemonic: starts with a lowercase letter.
    Word,
    /// Unsigned integer literal.
    Nat,
    /// Signed integer literal.
    Int,
    Float,
    String,
    /// `$`-prefixed identifier.
    Id,
    /// A well-formed word that fits no other class.
    Reserved,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub loc: Location,
    /// Raw source text of the token.
    pub text: String,
    pub literal: Option<LiteralInfo>,
    /// Unescaped bytes of a string literal.
    pub string: Option<Vec<u8>>,
}

impl Token {
    pub fn new(kind: TokenKind, loc: Location, text: impl Into<String>) -> Self {
        Token { kind, loc, text: text.into(), literal: None, string: None }
    }

    pub fn eof(loc: Location) -> Self {
        Token::new(TokenKind::Eof, loc, "")
    }

    pub fn is_word(&self, word: &str) -> bool {
        self.kind == TokenKind::Word && self.text == word
    }
}
