//! Restartable byte-driven tokenizer with two-token lookahead.
//! Whitespace and comments never reach the parser.

use std::collections::VecDeque;

use crate::errors::Errors;
use crate::span::Location;
use crate::text::token::{Base, LiteralInfo, LiteralKind, Sign, Token, TokenKind};

const LOOKAHEAD: usize = 2;

pub struct Lexer<'a> {
    source: &'a str,
    pos: usize,
    lookahead: VecDeque<Token>,
}

fn is_idchar(byte: u8) -> bool {
    matches!(byte,
        b'0'..=b'9' | b'A'..=b'Z' | b'a'..=b'z'
        | b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'.'
        | b'/' | b':' | b'<' | b'=' | b'>' | b'?' | b'@' | b'\\' | b'^' | b'_'
        | b'`' | b'|' | b'~')
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Lexer { source, pos: 0, lookahead: VecDeque::with_capacity(LOOKAHEAD) }
    }

    pub fn source(&self) -> &'a str {
        self.source
    }

    /// Peek `n` tokens ahead without consuming; `n` < 2.
    pub fn peek(&mut self, errors: &mut dyn Errors, n: usize) -> &Token {
        debug_assert!(n < LOOKAHEAD);
        while self.lookahead.len() <= n {
            let token = self.next_token(errors);
            self.lookahead.push_back(token);
        }
        &self.lookahead[n]
    }

    /// Consume and return the head token.
    pub fn read(&mut self, errors: &mut dyn Errors) -> Token {
        match self.lookahead.pop_front() {
            Some(token) => token,
            None => self.next_token(errors),
        }
    }

    fn bytes(&self) -> &'a [u8] {
        self.source.as_bytes()
    }

    fn peek_byte(&self, offset: usize) -> Option<u8> {
        self.bytes().get(self.pos + offset).copied()
    }

    fn loc_from(&self, start: usize) -> Location {
        Location::new(start, self.pos)
    }

    fn skip_space(&mut self, errors: &mut dyn Errors) {
        loop {
            match self.peek_byte(0) {
                Some(b' ' | b'\t' | b'\r' | b'\n') => self.pos += 1,
                Some(b';') if self.peek_byte(1) == Some(b';') => {
                    while let Some(byte) = self.peek_byte(0) {
                        self.pos += 1;
                        if byte == b'\n' {
                            break;
                        }
                    }
                }
                Some(b'(') if self.peek_byte(1) == Some(b';') => {
                    self.skip_block_comment(errors);
                }
                _ => return,
            }
        }
    }

    fn skip_block_comment(&mut self, errors: &mut dyn Errors) {
        let start = self.pos;
        self.pos += 2;
        let mut depth = 1usize;
        while depth > 0 {
            match (self.peek_byte(0), self.peek_byte(1)) {
                (Some(b'('), Some(b';')) => {
                    depth += 1;
                    self.pos += 2;
                }
                (Some(b';'), Some(b')')) => {
                    depth -= 1;
                    self.pos += 2;
                }
                (Some(_), _) => self.pos += 1,
                (None, _) => {
                    errors.on_error(
                        Location::new(start, self.pos),
                        "unterminated block comment".to_string(),
                    );
                    return;
                }
            }
        }
    }

    fn next_token(&mut self, errors: &mut dyn Errors) -> Token {
        self.skip_space(errors);
        let start = self.pos;
        let Some(byte) = self.peek_byte(0) else {
            return Token::eof(Location::at(self.pos));
        };
        match byte {
            b'(' => {
                self.pos += 1;
                Token::new(TokenKind::Lpar, self.loc_from(start), "(")
            }
            b')' => {
                self.pos += 1;
                Token::new(TokenKind::Rpar, self.loc_from(start), ")")
            }
            b'"' => self.lex_string(errors),
            _ if is_idchar(byte) => self.lex_word(errors),
            _ => {
                // Skip the whole character so the slice below stays on
                // a UTF-8 boundary.
                let len = self.source[self.pos..]
                    .chars()
                    .next()
                    .map(char::len_utf8)
                    .unwrap_or(1);
                self.pos += len;
                errors.on_error(
                    self.loc_from(start),
                    format!("unexpected character: {:#04x}", byte),
                );
                Token::new(TokenKind::Reserved, self.loc_from(start), &self.source[start..self.pos])
            }
        }
    }

    fn lex_word(&mut self, errors: &mut dyn Errors) -> Token {
        let start = self.pos;
        while let Some(byte) = self.peek_byte(0) {
            if !is_idchar(byte) {
                break;
            }
            self.pos += 1;
        }
        let text = &self.source[start..self.pos];
        let loc = self.loc_from(start);
        if let Some(rest) = text.strip_prefix('$') {
            if rest.is_empty() {
                errors.on_error(loc, "empty identifier".to_string());
                return Token::new(TokenKind::Reserved, loc, text);
            }
            return Token::new(TokenKind::Id, loc, text);
        }
        if let Some((kind, literal)) = classify_number(text) {
            let mut token = Token::new(kind, loc, text);
            token.literal = Some(literal);
            return token;
        }
        if text.as_bytes()[0].is_ascii_lowercase() {
            Token::new(TokenKind::Word, loc, text)
        } else {
            Token::new(TokenKind::Reserved, loc, text)
        }
    }

    fn lex_string(&mut self, errors: &mut dyn Errors) -> Token {
        let start = self.pos;
        self.pos += 1;
        let mut bytes: Vec<u8> = Vec::new();
        let mut ok = true;
        loop {
            let Some(byte) = self.peek_byte(0) else {
                errors.on_error(self.loc_from(start), "unterminated string".to_string());
                ok = false;
                break;
            };
            match byte {
                b'"' => {
                    self.pos += 1;
                    break;
                }
                b'\n' => {
                    errors.on_error(self.loc_from(start), "newline in string".to_string());
                    ok = false;
                    break;
                }
                b'\\' => {
                    self.pos += 1;
                    if !self.lex_escape(errors, start, &mut bytes) {
                        ok = false;
                    }
                }
                _ => {
                    bytes.push(byte);
                    self.pos += 1;
                }
            }
        }
        let loc = self.loc_from(start);
        let mut token = Token::new(TokenKind::String, loc, &self.source[start..self.pos]);
        if ok {
            token.string = Some(bytes);
        }
        token
    }

    fn lex_escape(&mut self, errors: &mut dyn Errors, start: usize, out: &mut Vec<u8>) -> bool {
        let Some(byte) = self.peek_byte(0) else {
            errors.on_error(self.loc_from(start), "unterminated string".to_string());
            return false;
        };
        self.pos += 1;
        match byte {
            b't' => out.push(b'\t'),
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b'"' => out.push(b'"'),
            b'\'' => out.push(b'\''),
            b'\\' => out.push(b'\\'),
            b'u' => {
                if self.peek_byte(0) != Some(b'{') {
                    errors.on_error(self.loc_from(start), "invalid \\u escape".to_string());
                    return false;
                }
                self.pos += 1;
                let digits_start = self.pos;
                while matches!(self.peek_byte(0), Some(b) if b.is_ascii_hexdigit() || b == b'_') {
                    self.pos += 1;
                }
                let digits: String = self.source[digits_start..self.pos]
                    .chars()
                    .filter(|c| *c != '_')
                    .collect();
                if self.peek_byte(0) != Some(b'}') || digits.is_empty() {
                    errors.on_error(self.loc_from(start), "invalid \\u escape".to_string());
                    return false;
                }
                self.pos += 1;
                match u32::from_str_radix(&digits, 16).ok().and_then(char::from_u32) {
                    Some(c) => {
                        let mut buf = [0u8; 4];
                        out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                    }
                    None => {
                        errors.on_error(
                            self.loc_from(start),
                            "invalid unicode scalar value".to_string(),
                        );
                        return false;
                    }
                }
            }
            _ if byte.is_ascii_hexdigit() => {
                let Some(low) = self.peek_byte(0).filter(u8::is_ascii_hexdigit) else {
                    errors.on_error(self.loc_from(start), "invalid hex escape".to_string());
                    return false;
                };
                self.pos += 1;
                let hex = [byte, low];
                let text = std::str::from_utf8(&hex).unwrap_or("0");
                match u8::from_str_radix(text, 16) {
                    Ok(value) => out.push(value),
                    Err(_) => return false,
                }
            }
            _ => {
                errors.on_error(
                    self.loc_from(start),
                    format!("invalid escape: \\{}", byte as char),
                );
                return false;
            }
        }
        true
    }
}

/// Classify a word as a numeric literal. Returns `None` for keywords
/// and malformed numbers.
fn classify_number(text: &str) -> Option<(TokenKind, LiteralInfo)> {
    let (sign, body) = match text.as_bytes().first()? {
        b'+' => (Sign::Plus, &text[1..]),
        b'-' => (Sign::Minus, &text[1..]),
        _ => (Sign::None, text),
    };
    if body.is_empty() {
        return None;
    }

    let info = |base, kind, underscores| LiteralInfo {
        sign,
        base,
        has_underscores: underscores,
        kind,
    };

    if body == "inf" {
        return Some((TokenKind::Float, info(Base::Decimal, LiteralKind::Inf, false)));
    }
    if body == "nan" {
        return Some((TokenKind::Float, info(Base::Decimal, LiteralKind::Nan, false)));
    }
    if let Some(payload) = body.strip_prefix("nan:0x") {
        if !payload.is_empty()
            && payload.bytes().all(|b| b.is_ascii_hexdigit() || b == b'_')
        {
            return Some((
                TokenKind::Float,
                info(Base::Hex, LiteralKind::NanPayload, payload.contains('_')),
            ));
        }
        return None;
    }

    let (base, digits) = match body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
        Some(rest) => (Base::Hex, rest),
        None => (Base::Decimal, body),
    };
    if digits.is_empty() {
        return None;
    }
    let is_digit = |b: u8| match base {
        Base::Hex => b.is_ascii_hexdigit(),
        Base::Decimal => b.is_ascii_digit(),
    };
    if !is_digit(digits.as_bytes()[0]) {
        return None;
    }

    let mut is_float = false;
    let mut underscores = false;
    let mut bytes = digits.bytes().peekable();
    while let Some(b) = bytes.next() {
        match b {
            b'_' => underscores = true,
            b'.' => is_float = true,
            b'e' | b'E' if base == Base::Decimal => {
                is_float = true;
                // Optional exponent sign.
                if matches!(bytes.peek(), Some(b'+' | b'-')) {
                    bytes.next();
                }
            }
            b'p' | b'P' if base == Base::Hex => {
                is_float = true;
                if matches!(bytes.peek(), Some(b'+' | b'-')) {
                    bytes.next();
                }
                // Exponent digits are decimal even in hex floats.
                for rest in bytes.by_ref() {
                    if rest == b'_' {
                        underscores = true;
                    } else if !rest.is_ascii_digit() {
                        return None;
                    }
                }
            }
            _ if is_digit(b) => {}
            b'+' | b'-' if base == Base::Decimal => {
                // Only valid directly after 'e', handled above.
                return None;
            }
            _ => return None,
        }
    }

    let kind = if is_float { TokenKind::Float } else if sign == Sign::None {
        TokenKind::Nat
    } else {
        TokenKind::Int
    };
    let lit_kind = LiteralKind::Normal;
    Some((kind, info(base, lit_kind, underscores)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorList;

    fn tokens(source: &str) -> Vec<(TokenKind, String)> {
        let mut errors = ErrorList::new();
        let mut lexer = Lexer::new(source);
        let mut out = Vec::new();
        loop {
            let token = lexer.read(&mut errors);
            if token.kind == TokenKind::Eof {
                break;
            }
            out.push((token.kind, token.text));
        }
        assert!(errors.is_empty(), "{:?}", errors.messages());
        out
    }

    #[test]
    fn basic_module() {
        let toks = tokens("(module (func $f (result i32) i32.const 42))");
        let kinds: Vec<TokenKind> = toks.iter().map(|(k, _)| *k).collect();
        use TokenKind::*;
        assert_eq!(
            kinds,
            vec![Lpar, Word, Lpar, Word, Id, Lpar, Word, Word, Rpar, Word, Nat, Rpar, Rpar]
        );
    }

    #[test]
    fn comments_are_invisible() {
        let toks = tokens(";; line\n(1 (; nested (; deeper ;) still ;) 2)");
        let texts: Vec<&str> = toks.iter().map(|(_, t)| t.as_str()).collect();
        assert_eq!(texts, vec!["(", "1", "2", ")"]);
    }

    #[test]
    fn lookahead_two() {
        let mut errors = ErrorList::new();
        let mut lexer = Lexer::new("a b c");
        assert_eq!(lexer.peek(&mut errors, 0).text, "a");
        assert_eq!(lexer.peek(&mut errors, 1).text, "b");
        assert_eq!(lexer.read(&mut errors).text, "a");
        assert_eq!(lexer.peek(&mut errors, 1).text, "c");
        assert_eq!(lexer.read(&mut errors).text, "b");
        assert_eq!(lexer.read(&mut errors).text, "c");
        assert_eq!(lexer.read(&mut errors).kind, TokenKind::Eof);
    }

    #[test]
    fn numeric_literals() {
        let mut errors = ErrorList::new();
        let mut lexer = Lexer::new("42 -7 0x2A 1_000 3.5 -0x1.8p2 nan nan:0x7f inf -inf");
        let expect = [
            (TokenKind::Nat, Base::Decimal, LiteralKind::Normal, false, Sign::None),
            (TokenKind::Int, Base::Decimal, LiteralKind::Normal, false, Sign::Minus),
            (TokenKind::Nat, Base::Hex, LiteralKind::Normal, false, Sign::None),
            (TokenKind::Nat, Base::Decimal, LiteralKind::Normal, true, Sign::None),
            (TokenKind::Float, Base::Decimal, LiteralKind::Normal, false, Sign::None),
            (TokenKind::Float, Base::Hex, LiteralKind::Normal, false, Sign::Minus),
            (TokenKind::Float, Base::Decimal, LiteralKind::Nan, false, Sign::None),
            (TokenKind::Float, Base::Hex, LiteralKind::NanPayload, false, Sign::None),
            (TokenKind::Float, Base::Decimal, LiteralKind::Inf, false, Sign::None),
            (TokenKind::Float, Base::Decimal, LiteralKind::Inf, false, Sign::Minus),
        ];
        for (kind, base, lit, underscores, sign) in expect {
            let token = lexer.read(&mut errors);
            assert_eq!(token.kind, kind, "{}", token.text);
            let info = token.literal.expect("literal info");
            assert_eq!(info.base, base, "{}", token.text);
            assert_eq!(info.kind, lit, "{}", token.text);
            assert_eq!(info.has_underscores, underscores, "{}", token.text);
            assert_eq!(info.sign, sign, "{}", token.text);
        }
        assert!(errors.is_empty());
    }

    #[test]
    fn string_escapes() {
        let mut errors = ErrorList::new();
        let mut lexer = Lexer::new(r#""a\tb" "\41" "\u{263a}""#);
        assert_eq!(lexer.read(&mut errors).string, Some(b"a\tb".to_vec()));
        assert_eq!(lexer.read(&mut errors).string, Some(b"A".to_vec()));
        assert_eq!(
            lexer.read(&mut errors).string,
            Some("\u{263a}".as_bytes().to_vec())
        );
        assert!(errors.is_empty());
    }

    #[test]
    fn unterminated_block_comment_is_an_error() {
        let mut errors = ErrorList::new();
        let mut lexer = Lexer::new("(; no close");
        let token = lexer.read(&mut errors);
        assert_eq!(token.kind, TokenKind::Eof);
        assert_eq!(errors.messages(), vec!["unterminated block comment"]);
    }
}
