//! Tokens and the token stream a rule inspects
//!
//! The stream is produced by an external tokenizer. A tokenizer can either
//! hand over fully annotated [`Token`]s ([`TokenStream::from_tokens`]) or
//! just split the text into `(kind, text)` pairs and let
//! [`TokenStream::from_lexemes`] compute positions and bracket structure.

use std::ops::Index;

use serde::{Deserialize, Serialize};

use crate::error::{ContractError, ContractResult};

/// PHP token types known to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TokenKind {
    InlineHtml,
    OpenTag,
    CloseTag,
    Whitespace,
    Comment,
    DocComment,
    Variable,
    /// Bare identifier (function, class or constant name)
    String,
    ConstantEncapsedString,
    LNumber,
    DNumber,
    StringConcat,
    Equal,
    ConcatEqual,
    PlusEqual,
    MinusEqual,
    MulEqual,
    DivEqual,
    CoalesceEqual,
    DoubleArrow,
    Semicolon,
    Comma,
    Colon,
    Ampersand,
    NsSeparator,
    OpenParenthesis,
    CloseParenthesis,
    OpenSquareBracket,
    CloseSquareBracket,
    OpenCurlyBracket,
    CloseCurlyBracket,
    Abstract,
    As,
    Catch,
    Class,
    Closure,
    Echo,
    Else,
    Elseif,
    Extends,
    Final,
    For,
    Foreach,
    Function,
    If,
    Implements,
    Interface,
    Namespace,
    New,
    Private,
    Protected,
    Public,
    Return,
    Static,
    Switch,
    Throw,
    Trait,
    Use,
    While,
    Yield,
    /// Anything the engine has no use for (other operators, casts, ...)
    Other,
}

impl TokenKind {
    /// Whitespace and comments
    pub fn is_empty(self) -> bool {
        matches!(
            self,
            TokenKind::Whitespace | TokenKind::Comment | TokenKind::DocComment
        )
    }

    /// `=` and the compound assignment operators
    pub fn is_assignment(self) -> bool {
        matches!(
            self,
            TokenKind::Equal
                | TokenKind::ConcatEqual
                | TokenKind::PlusEqual
                | TokenKind::MinusEqual
                | TokenKind::MulEqual
                | TokenKind::DivEqual
                | TokenKind::CoalesceEqual
        )
    }

    pub fn is_opener(self) -> bool {
        matches!(
            self,
            TokenKind::OpenParenthesis | TokenKind::OpenSquareBracket | TokenKind::OpenCurlyBracket
        )
    }

    pub fn is_closer(self) -> bool {
        self.opener().is_some()
    }

    /// The opening bracket matching a closing one
    pub fn opener(self) -> Option<TokenKind> {
        match self {
            TokenKind::CloseParenthesis => Some(TokenKind::OpenParenthesis),
            TokenKind::CloseSquareBracket => Some(TokenKind::OpenSquareBracket),
            TokenKind::CloseCurlyBracket => Some(TokenKind::OpenCurlyBracket),
            _ => None,
        }
    }

    /// Keywords whose parenthesis group belongs to them
    pub fn owns_parenthesis(self) -> bool {
        matches!(
            self,
            TokenKind::For
                | TokenKind::Foreach
                | TokenKind::If
                | TokenKind::Elseif
                | TokenKind::While
                | TokenKind::Switch
                | TokenKind::Catch
                | TokenKind::Closure
                | TokenKind::Function
        )
    }

    /// Map a keyword (case-insensitive) to its token kind
    pub fn from_keyword(word: &str) -> Option<TokenKind> {
        let kind = match word.to_ascii_lowercase().as_str() {
            "abstract" => TokenKind::Abstract,
            "as" => TokenKind::As,
            "catch" => TokenKind::Catch,
            "class" => TokenKind::Class,
            "echo" => TokenKind::Echo,
            "else" => TokenKind::Else,
            "elseif" => TokenKind::Elseif,
            "extends" => TokenKind::Extends,
            "final" => TokenKind::Final,
            "for" => TokenKind::For,
            "foreach" => TokenKind::Foreach,
            "function" => TokenKind::Function,
            "if" => TokenKind::If,
            "implements" => TokenKind::Implements,
            "interface" => TokenKind::Interface,
            "namespace" => TokenKind::Namespace,
            "new" => TokenKind::New,
            "private" => TokenKind::Private,
            "protected" => TokenKind::Protected,
            "public" => TokenKind::Public,
            "return" => TokenKind::Return,
            "static" => TokenKind::Static,
            "switch" => TokenKind::Switch,
            "throw" => TokenKind::Throw,
            "trait" => TokenKind::Trait,
            "use" => TokenKind::Use,
            "while" => TokenKind::While,
            "yield" => TokenKind::Yield,
            _ => return None,
        };
        Some(kind)
    }
}

/// A single token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    /// Literal source text
    pub content: String,
    /// 1-based line of the first character
    pub line: usize,
    /// 1-based column of the first character
    pub column: usize,
    /// Index of the matching bracket, for bracket tokens
    #[serde(default)]
    pub bracket_match: Option<usize>,
    /// Openers of the parentheses enclosing this token, outermost first
    #[serde(default)]
    pub nested_parens: Vec<usize>,
    /// Keyword owning this parenthesis (`for`, `if`, `function`, ...)
    #[serde(default)]
    pub paren_owner: Option<usize>,
}

impl Token {
    pub fn new(kind: TokenKind, content: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            kind,
            content: content.into(),
            line,
            column,
            bracket_match: None,
            nested_parens: Vec::new(),
            paren_owner: None,
        }
    }

    /// Length of the token text in characters
    pub fn length(&self) -> usize {
        self.content.chars().count()
    }

    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }
}

/// Ordered tokens of one file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenStream {
    tokens: Vec<Token>,
}

impl TokenStream {
    /// Build a stream from `(kind, text)` pairs, computing positions and
    /// bracket structure
    pub fn from_lexemes<I, S>(lexemes: I) -> Self
    where
        I: IntoIterator<Item = (TokenKind, S)>,
        S: Into<String>,
    {
        let mut tokens = Vec::new();
        let mut line = 1;
        let mut column = 1;

        for (kind, content) in lexemes {
            let token = Token::new(kind, content, line, column);
            for ch in token.content.chars() {
                if ch == '\n' {
                    line += 1;
                    column = 1;
                } else {
                    column += 1;
                }
            }
            tokens.push(token);
        }

        annotate(&mut tokens);
        Self { tokens }
    }

    /// Accept fully annotated tokens, checking that positions are 1-based
    /// and never go backwards, and that every structural index stays inside
    /// the stream
    pub fn from_tokens(tokens: Vec<Token>) -> ContractResult<Self> {
        for pos in 0..tokens.len() {
            check_token(&tokens, pos)?;
        }
        for (pos, pair) in tokens.windows(2).enumerate() {
            let (prev, current) = (&pair[0], &pair[1]);
            if (current.line, current.column) < (prev.line, prev.column) {
                return Err(ContractError::UnorderedStream {
                    pos: pos + 1,
                    line: current.line,
                    column: current.column,
                });
            }
        }
        Ok(Self { tokens })
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn get(&self, pos: usize) -> Option<&Token> {
        self.tokens.get(pos)
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Token> {
        self.tokens.iter()
    }

    /// The source text the stream was built from
    pub fn content(&self) -> String {
        self.tokens.iter().map(|t| t.content.as_str()).collect()
    }

    /// Line ending used by the file (`\r\n` if any token carries one)
    pub fn eol_char(&self) -> &'static str {
        if self.tokens.iter().any(|t| t.content.contains("\r\n")) {
            "\r\n"
        } else {
            "\n"
        }
    }
}

impl Index<usize> for TokenStream {
    type Output = Token;

    fn index(&self, pos: usize) -> &Token {
        &self.tokens[pos]
    }
}

/// Fill in bracket pairs, enclosing parentheses and parenthesis owners
fn annotate(tokens: &mut [Token]) {
    let mut stack: Vec<usize> = Vec::new();
    for i in 0..tokens.len() {
        let kind = tokens[i].kind;
        if kind.is_opener() {
            stack.push(i);
        } else if let Some(opener) = kind.opener() {
            // Unbalanced closers are left without a match
            if let Some(&top) = stack.last() {
                if tokens[top].kind == opener {
                    stack.pop();
                    tokens[top].bracket_match = Some(i);
                    tokens[i].bracket_match = Some(top);
                }
            }
        }
    }

    let mut parens: Vec<usize> = Vec::new();
    for i in 0..tokens.len() {
        let matched = tokens[i].bracket_match.is_some();
        if tokens[i].kind == TokenKind::CloseParenthesis && matched {
            parens.pop();
        }
        tokens[i].nested_parens = parens.clone();
        if tokens[i].kind == TokenKind::OpenParenthesis && matched {
            parens.push(i);
        }
    }

    for i in 0..tokens.len() {
        if tokens[i].kind != TokenKind::OpenParenthesis {
            continue;
        }
        let Some(closer) = tokens[i].bracket_match else {
            continue;
        };
        if let Some(owner) = parenthesis_owner(tokens, i) {
            tokens[i].paren_owner = Some(owner);
            tokens[closer].paren_owner = Some(owner);
        }
    }
}

fn parenthesis_owner(tokens: &[Token], opener: usize) -> Option<usize> {
    let before = previous_significant(tokens, opener)?;
    if tokens[before].kind.owns_parenthesis() {
        return Some(before);
    }

    // function name(...)
    if tokens[before].kind == TokenKind::String {
        let keyword = previous_significant(tokens, before)?;
        if tokens[keyword].kind == TokenKind::Function {
            return Some(keyword);
        }
    }

    None
}

fn previous_significant(tokens: &[Token], pos: usize) -> Option<usize> {
    (0..pos)
        .rev()
        .find(|&i| !tokens[i].kind.is_empty() && tokens[i].kind != TokenKind::Ampersand)
}

fn check_token(tokens: &[Token], pos: usize) -> ContractResult<()> {
    let malformed = |reason: &'static str| -> ContractResult<()> {
        Err(ContractError::MalformedToken { pos, reason })
    };
    let token = &tokens[pos];

    if token.line == 0 {
        return malformed("line is 0");
    }
    if token.column == 0 {
        return malformed("column is 0");
    }

    if let Some(other) = token.bracket_match {
        let Some(partner) = tokens.get(other) else {
            return malformed("bracket match past the end of the stream");
        };
        if partner.bracket_match != Some(pos) {
            return malformed("bracket match is not symmetric");
        }
        let forward = token.kind.is_opener() && other > pos;
        let backward = token.kind.is_closer() && other < pos;
        if !forward && !backward {
            return malformed("bracket match on the wrong side");
        }
    }

    if token.nested_parens.iter().any(|&opener| opener >= pos) {
        return malformed("enclosing parenthesis does not precede the token");
    }
    if token.paren_owner.is_some_and(|owner| owner >= tokens.len()) {
        return malformed("parenthesis owner past the end of the stream");
    }

    Ok(())
}
