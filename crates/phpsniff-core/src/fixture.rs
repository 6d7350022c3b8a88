//! Small PHP lexer for tests and fixtures
//!
//! Covers the subset of PHP the bundled rules care about: tags, whitespace,
//! comments, variables, identifiers and keywords, numbers, quoted strings
//! and operators. Heredocs, interpolation and casts are not recognized;
//! anything unknown becomes [`TokenKind::Other`].

use crate::runner::{TokenizeError, Tokenizer};
use crate::token::{TokenKind, TokenStream};

/// Tokenizer backed by [`Lexer`]
#[derive(Debug, Clone, Copy, Default)]
pub struct FixtureTokenizer;

impl Tokenizer for FixtureTokenizer {
    fn tokenize(&self, source: &str) -> Result<TokenStream, TokenizeError> {
        let lexemes = Lexer::new(source).tokenize()?;
        Ok(TokenStream::from_lexemes(lexemes))
    }
}

/// Operators, longest first
const OPERATORS: &[(&str, TokenKind)] = &[
    ("??=", TokenKind::CoalesceEqual),
    ("<<=", TokenKind::Other),
    (">>=", TokenKind::Other),
    ("**=", TokenKind::Other),
    ("===", TokenKind::Other),
    ("!==", TokenKind::Other),
    ("<=>", TokenKind::Other),
    ("...", TokenKind::Other),
    ("?->", TokenKind::Other),
    (".=", TokenKind::ConcatEqual),
    ("+=", TokenKind::PlusEqual),
    ("-=", TokenKind::MinusEqual),
    ("*=", TokenKind::MulEqual),
    ("/=", TokenKind::DivEqual),
    ("%=", TokenKind::Other),
    ("&=", TokenKind::Other),
    ("|=", TokenKind::Other),
    ("^=", TokenKind::Other),
    ("=>", TokenKind::DoubleArrow),
    ("->", TokenKind::Other),
    ("::", TokenKind::Other),
    ("==", TokenKind::Other),
    ("!=", TokenKind::Other),
    ("<>", TokenKind::Other),
    ("<=", TokenKind::Other),
    (">=", TokenKind::Other),
    ("&&", TokenKind::Other),
    ("||", TokenKind::Other),
    ("??", TokenKind::Other),
    ("++", TokenKind::Other),
    ("--", TokenKind::Other),
    ("<<", TokenKind::Other),
    (">>", TokenKind::Other),
    ("**", TokenKind::Other),
    ("=", TokenKind::Equal),
    (".", TokenKind::StringConcat),
    (";", TokenKind::Semicolon),
    (",", TokenKind::Comma),
    (":", TokenKind::Colon),
    ("&", TokenKind::Ampersand),
    ("\\", TokenKind::NsSeparator),
    ("(", TokenKind::OpenParenthesis),
    (")", TokenKind::CloseParenthesis),
    ("[", TokenKind::OpenSquareBracket),
    ("]", TokenKind::CloseSquareBracket),
    ("{", TokenKind::OpenCurlyBracket),
    ("}", TokenKind::CloseCurlyBracket),
];

pub struct Lexer<'a> {
    input: &'a str,
    position: usize,
    line: usize,
    in_php: bool,
    lexemes: Vec<(TokenKind, String)>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            position: 0,
            line: 1,
            in_php: false,
            lexemes: Vec::new(),
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<(TokenKind, String)>, TokenizeError> {
        while self.position < self.input.len() {
            if self.in_php {
                self.next_php_token()?;
            } else {
                self.read_inline_html();
            }
        }
        Ok(self.lexemes)
    }

    fn rest(&self) -> &'a str {
        &self.input[self.position..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn emit(&mut self, kind: TokenKind, len: usize) {
        let text = &self.input[self.position..self.position + len];
        self.line += text.matches('\n').count();
        self.position += len;
        self.lexemes.push((kind, text.to_string()));
    }

    fn read_inline_html(&mut self) {
        let rest = self.rest();
        let Some(tag) = rest.find("<?") else {
            self.emit(TokenKind::InlineHtml, rest.len());
            return;
        };
        if tag > 0 {
            self.emit(TokenKind::InlineHtml, tag);
            return;
        }

        self.in_php = true;
        let rest = self.rest();
        if rest.starts_with("<?=") {
            self.emit(TokenKind::OpenTag, 3);
        } else if rest.len() >= 5 && rest[..5].eq_ignore_ascii_case("<?php") {
            // The open tag carries one whitespace character (or a CRLF)
            let trailing = match &rest[5..] {
                r if r.starts_with("\r\n") => 2,
                r if r.starts_with([' ', '\t', '\n', '\r']) => 1,
                _ => 0,
            };
            self.emit(TokenKind::OpenTag, 5 + trailing);
        } else {
            self.emit(TokenKind::OpenTag, 2);
        }
    }

    fn next_php_token(&mut self) -> Result<(), TokenizeError> {
        let rest = self.rest();
        let Some(ch) = self.peek() else {
            return Ok(());
        };

        if rest.starts_with("?>") {
            let trailing = match &rest[2..] {
                r if r.starts_with("\r\n") => 2,
                r if r.starts_with('\n') => 1,
                _ => 0,
            };
            self.emit(TokenKind::CloseTag, 2 + trailing);
            self.in_php = false;
            return Ok(());
        }

        if ch.is_whitespace() {
            self.read_whitespace();
            return Ok(());
        }

        if rest.starts_with("/*") {
            let Some(end) = rest[2..].find("*/") else {
                return Err(TokenizeError::UnterminatedComment { line: self.line });
            };
            let kind = if rest.starts_with("/**") && end > 0 {
                TokenKind::DocComment
            } else {
                TokenKind::Comment
            };
            self.emit(kind, end + 4);
            return Ok(());
        }

        if rest.starts_with("//") || ch == '#' {
            let end = rest.find(['\n', '\r']).unwrap_or(rest.len());
            self.emit(TokenKind::Comment, end);
            return Ok(());
        }

        if ch == '\'' || ch == '"' {
            let len = self.quoted_len(ch)?;
            self.emit(TokenKind::ConstantEncapsedString, len);
            return Ok(());
        }

        if ch == '$' && rest[1..].starts_with(is_identifier_start) {
            let len = 1 + identifier_len(&rest[1..]);
            self.emit(TokenKind::Variable, len);
            return Ok(());
        }

        let fraction = ch == '.' && rest[1..].starts_with(|c: char| c.is_ascii_digit());
        if ch.is_ascii_digit() || fraction {
            let (kind, len) = number(rest);
            self.emit(kind, len);
            return Ok(());
        }

        if is_identifier_start(ch) {
            let len = identifier_len(rest);
            let kind = self.word_kind(&rest[..len], &rest[len..]);
            self.emit(kind, len);
            return Ok(());
        }

        let (kind, len) = OPERATORS
            .iter()
            .find(|(op, _)| rest.starts_with(*op))
            .map(|(op, kind)| (*kind, op.len()))
            .unwrap_or((TokenKind::Other, ch.len_utf8()));
        self.emit(kind, len);
        Ok(())
    }

    /// Whitespace runs end after each newline
    fn read_whitespace(&mut self) {
        let rest = self.rest();
        let mut len = 0;
        for c in rest.chars() {
            if !c.is_whitespace() {
                break;
            }
            len += c.len_utf8();
            if c == '\n' {
                break;
            }
        }
        self.emit(TokenKind::Whitespace, len);
    }

    fn quoted_len(&self, quote: char) -> Result<usize, TokenizeError> {
        let mut escaped = false;
        for (i, c) in self.rest().char_indices().skip(1) {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                c if c == quote => return Ok(i + 1),
                _ => {}
            }
        }
        Err(TokenizeError::UnterminatedString { line: self.line })
    }

    fn word_kind(&self, word: &str, after: &str) -> TokenKind {
        // Member names after `->` and `::` are never keywords
        let member = self
            .lexemes
            .iter()
            .rev()
            .find(|(kind, _)| !kind.is_empty())
            .is_some_and(|(_, text)| text == "->" || text == "::" || text == "?->");
        if member {
            return TokenKind::String;
        }

        let opens_parameters = after
            .trim_start()
            .trim_start_matches('&')
            .trim_start()
            .starts_with('(');
        match TokenKind::from_keyword(word) {
            Some(TokenKind::Function) if opens_parameters => TokenKind::Closure,
            Some(kind) => kind,
            None => TokenKind::String,
        }
    }
}

fn is_identifier_start(c: char) -> bool {
    c == '_' || c.is_alphabetic()
}

fn identifier_len(s: &str) -> usize {
    s.char_indices()
        .find(|(_, c)| !(*c == '_' || c.is_alphanumeric()))
        .map_or(s.len(), |(i, _)| i)
}

fn number(s: &str) -> (TokenKind, usize) {
    let digits = |from: usize| {
        s[from..]
            .find(|c: char| !(c.is_ascii_digit() || c == '_'))
            .map_or(s.len(), |i| from + i)
    };

    let int_end = digits(0);
    let has_fraction = s[int_end..].starts_with('.')
        && s[int_end + 1..].starts_with(|c: char| c.is_ascii_digit());
    if has_fraction {
        (TokenKind::DNumber, digits(int_end + 1))
    } else {
        (TokenKind::LNumber, int_end)
    }
}
