//! Grammar tokenizer. Produces tokens on demand; the embedded
//! code-snippet scanner understands enough of the target language
//! (string/char literals, raw strings, `#include`, comments) to find the
//! matching `}` without being fooled by braces inside them.

use crate::error::{ErrorAccumulator, FatalError};
use crate::span::Span;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TokenKind {
    EndOfFile,
    Semicolon,
    Colon,
    ColonColon,
    QMark,
    Plus,
    EMark,
    Star,
    FSlash,
    Equal,
    LParen,
    RParen,
    Amp,
    String,
    Identifier,
    EofKeyword,
    TypedefKeyword,
    CodeKeyword,
    CharacterClass,
    CodeSnippet,
}

#[derive(Clone, Debug)]
pub struct Token {
    pub span: Span,
    pub kind: TokenKind,
    /// Identifier text, literal body (escapes still raw), or processed
    /// snippet code.
    pub text: String,
    /// Output offsets at which `$$` markers were removed. Only code
    /// snippets carry these.
    pub substitutions: Vec<u32>,
}

impl Token {
    fn simple(span: Span, kind: TokenKind) -> Token {
        Token {
            span,
            kind,
            text: String::new(),
            substitutions: Vec::new(),
        }
    }
}

pub struct Tokenizer<'a> {
    src: &'a [u8],
    pos: u32,
}

fn is_identifier_start(b: u8) -> bool {
    b.is_ascii_alphabetic()
}

fn is_identifier_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

impl<'a> Tokenizer<'a> {
    pub fn new(contents: &'a str) -> Tokenizer<'a> {
        assert!(contents.len() <= u32::MAX as usize);
        Tokenizer {
            src: contents.as_bytes(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos as usize).copied()
    }

    fn peek_at(&self, ahead: u32) -> Option<u8> {
        self.src.get((self.pos + ahead) as usize).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        Some(byte)
    }

    fn consume(&mut self, byte: u8) -> bool {
        if self.peek() == Some(byte) {
            self.pos += 1;
            return true;
        }
        false
    }

    fn span_from(&self, start: u32) -> Span {
        Span::new(start, self.pos)
    }

    /// Skips whitespace and comments. Returns the location of a lone
    /// `/`, which is a token of its own.
    fn skip_trivia(&mut self, err: &ErrorAccumulator) -> Result<Option<u32>, FatalError> {
        loop {
            match self.peek() {
                Some(b' ' | b'\t' | b'\r' | b'\n') => {
                    self.bump();
                }
                Some(b'/') => {
                    let slash = self.pos;
                    self.bump();
                    if self.consume(b'/') {
                        while !matches!(self.peek(), None | Some(b'\r' | b'\n')) {
                            self.bump();
                        }
                    } else if self.consume(b'*') {
                        loop {
                            match self.bump() {
                                Some(b'*') if self.consume(b'/') => break,
                                Some(_) => {}
                                None => {
                                    return Err(
                                        err.fatal(Span::at(slash), "missing closing */")
                                    )
                                }
                            }
                        }
                    } else {
                        return Ok(Some(slash));
                    }
                }
                _ => return Ok(None),
            }
        }
    }

    pub fn parse_token(&mut self, err: &ErrorAccumulator) -> Result<Token, FatalError> {
        if let Some(slash) = self.skip_trivia(err)? {
            return Ok(Token::simple(Span::new(slash, slash + 1), TokenKind::FSlash));
        }
        let start = self.pos;
        let Some(byte) = self.peek() else {
            return Ok(Token::simple(Span::at(start), TokenKind::EndOfFile));
        };
        if is_identifier_start(byte) {
            while self.peek().is_some_and(is_identifier_continue) {
                self.bump();
            }
            let span = self.span_from(start);
            let text = &self.src[start as usize..self.pos as usize];
            let kind = match text {
                b"EOF" => TokenKind::EofKeyword,
                b"typedef" => TokenKind::TypedefKeyword,
                b"code" => TokenKind::CodeKeyword,
                _ => TokenKind::Identifier,
            };
            return Ok(Token {
                span,
                kind,
                text: std::str::from_utf8(text).unwrap().to_owned(),
                substitutions: Vec::new(),
            });
        }
        self.bump();
        let kind = match byte {
            b'"' => return self.single_line_literal(start, b'"', "missing closing \"", err),
            b'[' => return self.single_line_literal(start, b']', "missing closing ]", err),
            b'{' => return self.code_snippet(start, err),
            b';' => TokenKind::Semicolon,
            b':' => {
                if self.consume(b':') {
                    TokenKind::ColonColon
                } else {
                    TokenKind::Colon
                }
            }
            b'?' => TokenKind::QMark,
            b'+' => TokenKind::Plus,
            b'!' => TokenKind::EMark,
            b'*' => TokenKind::Star,
            b'=' => TokenKind::Equal,
            b'(' => TokenKind::LParen,
            b')' => TokenKind::RParen,
            b'&' => TokenKind::Amp,
            _ => return Err(err.fatal(Span::at(start), "invalid character")),
        };
        Ok(Token::simple(self.span_from(start), kind))
    }

    /// Strings and character classes: single line, `\` keeps the next
    /// byte raw (decoding happens later).
    fn single_line_literal(
        &mut self,
        start: u32,
        close: u8,
        missing: &'static str,
        err: &ErrorAccumulator,
    ) -> Result<Token, FatalError> {
        let body_start = self.pos;
        loop {
            match self.peek() {
                None | Some(b'\r' | b'\n') => return Err(err.fatal(Span::at(start), missing)),
                Some(b'\\') => {
                    self.bump();
                    match self.peek() {
                        None | Some(b'\r' | b'\n') => {
                            return Err(err.fatal(Span::at(start), missing))
                        }
                        Some(_) => {
                            self.bump();
                        }
                    }
                }
                Some(byte) => {
                    self.bump();
                    if byte == close {
                        break;
                    }
                }
            }
        }
        let body = &self.src[body_start as usize..(self.pos - 1) as usize];
        Ok(Token {
            span: self.span_from(start),
            kind: if close == b'"' {
                TokenKind::String
            } else {
                TokenKind::CharacterClass
            },
            text: std::str::from_utf8(body).unwrap().to_owned(),
            substitutions: Vec::new(),
        })
    }

    fn code_snippet(&mut self, start: u32, err: &ErrorAccumulator) -> Result<Token, FatalError> {
        let mut out: Vec<u8> = Vec::new();
        let mut substitutions = Vec::new();
        let mut depth = 1u32;
        // Tracks "nothing but horizontal whitespace since the line
        // began", which is where `#include` may appear.
        let mut at_line_start = false;
        loop {
            let Some(byte) = self.peek() else {
                return Err(err.fatal(Span::at(start), "missing closing }"));
            };
            match byte {
                b'{' => {
                    depth += 1;
                    self.bump();
                    out.push(b'{');
                    at_line_start = false;
                }
                b'}' => {
                    self.bump();
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                    out.push(b'}');
                    at_line_start = false;
                }
                b'"' | b'\'' => {
                    self.copy_target_literal(byte, &mut out, err)?;
                    at_line_start = false;
                }
                b'R' if self.peek_at(1) == Some(b'"')
                    && !out.last().copied().is_some_and(is_identifier_continue) =>
                {
                    self.copy_raw_string(&mut out, err)?;
                    at_line_start = false;
                }
                b'#' if at_line_start => {
                    self.copy_include(&mut out, err)?;
                    at_line_start = false;
                }
                b'/' if self.peek_at(1) == Some(b'/') => {
                    while !matches!(self.peek(), None | Some(b'\r' | b'\n')) {
                        out.push(self.bump().unwrap());
                    }
                }
                b'/' if self.peek_at(1) == Some(b'*') => {
                    let comment_start = self.pos;
                    self.bump();
                    self.bump();
                    out.extend_from_slice(b"/*");
                    loop {
                        match self.peek() {
                            None => {
                                return Err(
                                    err.fatal(Span::at(comment_start), "missing closing */")
                                )
                            }
                            Some(b'*') if self.peek_at(1) == Some(b'/') => {
                                self.bump();
                                self.bump();
                                out.extend_from_slice(b"*/");
                                break;
                            }
                            Some(b'\r') => {
                                self.bump();
                                self.consume(b'\n');
                                out.push(b'\n');
                            }
                            Some(other) => {
                                self.bump();
                                out.push(other);
                            }
                        }
                    }
                    at_line_start = false;
                }
                b'$' => {
                    let dollar = self.pos;
                    self.bump();
                    if self.consume(b'$') {
                        substitutions.push(out.len() as u32);
                    } else {
                        err.warning(Span::at(dollar), "invalid substitution");
                        out.push(b'$');
                    }
                    at_line_start = false;
                }
                b'\r' => {
                    self.bump();
                    self.consume(b'\n');
                    out.push(b'\n');
                    at_line_start = true;
                }
                b'\n' => {
                    self.bump();
                    out.push(b'\n');
                    at_line_start = true;
                }
                b' ' | b'\t' => {
                    self.bump();
                    out.push(byte);
                }
                other => {
                    self.bump();
                    out.push(other);
                    at_line_start = false;
                }
            }
        }
        Ok(Token {
            span: self.span_from(start),
            kind: TokenKind::CodeSnippet,
            text: String::from_utf8(out).unwrap(),
            substitutions,
        })
    }

    /// Copies a target-language `"..."` or `'...'` literal opaquely,
    /// honoring `\` escapes. These may not span lines.
    fn copy_target_literal(
        &mut self,
        delimiter: u8,
        out: &mut Vec<u8>,
        err: &ErrorAccumulator,
    ) -> Result<(), FatalError> {
        let literal_start = self.pos;
        let missing: &'static str = if delimiter == b'"' {
            "missing closing \""
        } else {
            "missing closing '"
        };
        self.bump();
        out.push(delimiter);
        loop {
            match self.peek() {
                None | Some(b'\r' | b'\n') => {
                    return Err(err.fatal(Span::at(literal_start), missing))
                }
                Some(b'\\') => {
                    out.push(self.bump().unwrap());
                    match self.peek() {
                        None | Some(b'\r' | b'\n') => {
                            return Err(err.fatal(Span::at(literal_start), missing))
                        }
                        Some(escaped) => {
                            self.bump();
                            out.push(escaped);
                        }
                    }
                }
                Some(byte) => {
                    self.bump();
                    out.push(byte);
                    if byte == delimiter {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Copies `R"sep(...)sep"` whole, matching the closing delimiter
    /// literally. The separator may not contain `( ) "`, space, tab, or
    /// `\`.
    fn copy_raw_string(
        &mut self,
        out: &mut Vec<u8>,
        err: &ErrorAccumulator,
    ) -> Result<(), FatalError> {
        let literal_start = self.pos;
        self.bump();
        self.bump();
        out.extend_from_slice(b"R\"");
        let mut sep: Vec<u8> = Vec::new();
        loop {
            match self.peek() {
                Some(b'(') => {
                    self.bump();
                    break;
                }
                Some(b')' | b'"' | b' ' | b'\t' | b'\\') | None | Some(b'\r' | b'\n') => {
                    return Err(
                        err.fatal(Span::at(literal_start), "invalid raw string delimiter")
                    );
                }
                Some(byte) => {
                    self.bump();
                    sep.push(byte);
                }
            }
        }
        out.extend_from_slice(&sep);
        out.push(b'(');
        loop {
            match self.peek() {
                None => {
                    let closing = format!(
                        "missing closing ){}\"",
                        std::str::from_utf8(&sep).unwrap()
                    );
                    return Err(err.fatal(Span::at(literal_start), closing));
                }
                Some(b')') if self.matches_raw_close(&sep) => {
                    self.pos += 2 + sep.len() as u32;
                    out.push(b')');
                    out.extend_from_slice(&sep);
                    out.push(b'"');
                    return Ok(());
                }
                Some(b'\r') => {
                    self.bump();
                    self.consume(b'\n');
                    out.push(b'\n');
                }
                Some(byte) => {
                    self.bump();
                    out.push(byte);
                }
            }
        }
    }

    fn matches_raw_close(&self, sep: &[u8]) -> bool {
        let rest = &self.src[self.pos as usize + 1..];
        rest.starts_with(sep) && rest.get(sep.len()) == Some(&b'"')
    }

    /// Copies a `#include <...>` or `#include "..."` line opaquely so
    /// the delimited name never reaches the literal scanners.
    fn copy_include(&mut self, out: &mut Vec<u8>, err: &ErrorAccumulator) -> Result<(), FatalError> {
        self.bump();
        out.push(b'#');
        while let Some(byte @ (b' ' | b'\t')) = self.peek() {
            self.bump();
            out.push(byte);
        }
        if !self.src[self.pos as usize..].starts_with(b"include") {
            return Ok(());
        }
        self.pos += b"include".len() as u32;
        out.extend_from_slice(b"include");
        while let Some(byte @ (b' ' | b'\t')) = self.peek() {
            self.bump();
            out.push(byte);
        }
        let (close, missing): (u8, &'static str) = match self.peek() {
            Some(b'<') => (b'>', "missing closing >"),
            Some(b'"') => (b'"', "missing closing \""),
            _ => return Ok(()),
        };
        let name_start = self.pos;
        out.push(self.bump().unwrap());
        loop {
            match self.peek() {
                None | Some(b'\r' | b'\n') => {
                    return Err(err.fatal(Span::at(name_start), missing))
                }
                Some(byte) => {
                    self.bump();
                    out.push(byte);
                    if byte == close {
                        return Ok(());
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(src: &str) -> Vec<Token> {
        let err = ErrorAccumulator::new();
        let mut tokenizer = Tokenizer::new(src);
        let mut tokens = Vec::new();
        loop {
            let token = tokenizer.parse_token(&err).expect("unexpected fatal error");
            let done = token.kind == TokenKind::EndOfFile;
            tokens.push(token);
            if done {
                break;
            }
        }
        assert!(!err.has_errors(), "unexpected errors for {src:?}");
        tokens
    }

    fn kinds(src: &str) -> Vec<TokenKind> {
        lex(src).into_iter().map(|t| t.kind).collect()
    }

    fn lex_fatal(src: &str) -> String {
        let err = ErrorAccumulator::new();
        let mut tokenizer = Tokenizer::new(src);
        loop {
            match tokenizer.parse_token(&err) {
                Ok(token) => assert_ne!(
                    token.kind,
                    TokenKind::EndOfFile,
                    "expected a fatal error for {src:?}"
                ),
                Err(_) => break,
            }
        }
        err.take().pop().unwrap().message
    }

    #[test]
    fn punctuation_and_keywords() {
        use TokenKind::*;
        assert_eq!(
            kinds("rule : char = a / b* c+ d? !e &f (g) :: EOF typedef code ;"),
            vec![
                Identifier, Colon, Identifier, Equal, Identifier, FSlash, Identifier, Star,
                Identifier, Plus, Identifier, QMark, EMark, Identifier, Amp, Identifier, LParen,
                Identifier, RParen, ColonColon, EofKeyword, TypedefKeyword, CodeKeyword,
                Semicolon, EndOfFile
            ]
        );
    }

    #[test]
    fn comments_are_skipped() {
        use TokenKind::*;
        assert_eq!(
            kinds("a // to end of line\nb /* multi\nline */ c"),
            vec![Identifier, Identifier, Identifier, EndOfFile]
        );
    }

    #[test]
    fn unterminated_block_comment_is_fatal() {
        assert_eq!(lex_fatal("a /* no close"), "missing closing */");
    }

    #[test]
    fn slash_token_vs_comment() {
        use TokenKind::*;
        assert_eq!(kinds("a / b"), vec![Identifier, FSlash, Identifier, EndOfFile]);
    }

    #[test]
    fn string_keeps_raw_escapes() {
        let tokens = lex(r#"x = "a\"b\\";"#);
        let string = &tokens[2];
        assert_eq!(string.kind, TokenKind::String);
        assert_eq!(string.text, r#"a\"b\\"#);
    }

    #[test]
    fn unterminated_string_is_fatal() {
        assert_eq!(lex_fatal("x = \"abc\ny"), "missing closing \"");
        assert_eq!(lex_fatal("x = \"abc"), "missing closing \"");
    }

    #[test]
    fn character_class_token() {
        let tokens = lex(r"x = [^0-9\]];");
        let class = &tokens[2];
        assert_eq!(class.kind, TokenKind::CharacterClass);
        assert_eq!(class.text, r"^0-9\]");
    }

    #[test]
    fn unterminated_class_is_fatal() {
        assert_eq!(lex_fatal("x = [0-9"), "missing closing ]");
    }

    #[test]
    fn snippet_balances_braces() {
        let tokens = lex("{ if(a) { b(); } }");
        assert_eq!(tokens[0].kind, TokenKind::CodeSnippet);
        assert_eq!(tokens[0].text, " if(a) { b(); } ");
    }

    #[test]
    fn snippet_skips_braces_in_literals() {
        let tokens = lex(r#"{ const char *s = "}{"; char c = '{'; }"#);
        assert_eq!(tokens[0].text, r#" const char *s = "}{"; char c = '{'; "#);
    }

    #[test]
    fn snippet_raw_string() {
        let tokens = lex(r#"{ auto s = R"x(} " still inside)x"; }"#);
        assert_eq!(tokens[0].text, r#" auto s = R"x(} " still inside)x"; "#);
    }

    #[test]
    fn snippet_unterminated_raw_string_is_fatal() {
        assert_eq!(lex_fatal(r#"{ auto s = R"x(oops)y"; }"#), "missing closing )x\"");
    }

    #[test]
    fn snippet_include_is_opaque() {
        let tokens = lex("{\n#include <map>\n#include \"a\\b.h\"\n}");
        assert_eq!(tokens[0].text, "\n#include <map>\n#include \"a\\b.h\"\n");
    }

    #[test]
    fn snippet_substitutions_recorded_and_removed() {
        let tokens = lex("{ $$ = 1; }");
        assert_eq!(tokens[0].text, "  = 1; ");
        assert_eq!(tokens[0].substitutions, vec![1]);
    }

    #[test]
    fn snippet_lone_dollar_is_diagnosed_and_kept() {
        let err = ErrorAccumulator::new();
        let mut tokenizer = Tokenizer::new("{ $x }");
        let token = tokenizer.parse_token(&err).unwrap();
        assert_eq!(token.text, " $x ");
        assert!(token.substitutions.is_empty());
        assert!(err.any_reported());
        assert!(!err.has_errors());
    }

    #[test]
    fn snippet_normalizes_line_endings() {
        let tokens = lex("{a\r\nb\rc}");
        assert_eq!(tokens[0].text, "a\nb\nc");
    }

    #[test]
    fn snippet_comments_opaque() {
        let tokens = lex("{ // a } not closing\n /* } */ }");
        assert_eq!(tokens[0].text, " // a } not closing\n /* } */ ");
    }

    #[test]
    fn snippet_unterminated_is_fatal() {
        assert_eq!(lex_fatal("{ a"), "missing closing }");
    }

    #[test]
    fn token_spans() {
        let tokens = lex("ab  cd");
        assert_eq!(tokens[0].span, Span::new(0, 2));
        assert_eq!(tokens[1].span, Span::new(4, 6));
    }
}
