//! Per-file rule context
//!
//! A [`RuleContext`] owns the token stream of one file for one pass, along
//! with the reporter, the fixer and the class-hierarchy cache. Rules only
//! see the file through it.

use crate::error::{ContractError, ContractResult};
use crate::fixer::Fixer;
use crate::hierarchy::{ClassHierarchyCache, NoTypeRegistry, TestFramework, TypeRegistry};
use crate::report::{MetricValue, Reporter, Severity, Violation};
use crate::token::{Token, TokenKind, TokenStream};

static NO_REGISTRY: NoTypeRegistry = NoTypeRegistry;

/// Whether fixable violations should produce edits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Check,
    Fix,
}

/// Method visibility
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Public,
    Protected,
    Private,
}

/// Modifiers of a function or closure declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodProperties {
    pub scope: Scope,
    /// Whether the scope was written out (methods default to public)
    pub scope_specified: bool,
    pub is_abstract: bool,
    pub is_final: bool,
    pub is_static: bool,
    pub is_closure: bool,
}

pub struct RuleContext<'a> {
    stream: TokenStream,
    reporter: Reporter,
    fixer: Fixer,
    mode: Mode,
    active_rule: &'static str,
    pub(crate) hierarchy: ClassHierarchyCache,
    pub(crate) registry: &'a dyn TypeRegistry,
    pub(crate) test_framework: TestFramework,
}

impl<'a> RuleContext<'a> {
    pub fn new(stream: TokenStream) -> Self {
        let fixer = Fixer::new(&stream);
        Self {
            stream,
            reporter: Reporter::new(),
            fixer,
            mode: Mode::Check,
            active_rule: "",
            hierarchy: ClassHierarchyCache::default(),
            registry: &NO_REGISTRY,
            test_framework: TestFramework::default(),
        }
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_type_registry(mut self, registry: &'a dyn TypeRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_test_framework(mut self, framework: TestFramework) -> Self {
        self.test_framework = framework;
        self
    }

    pub fn stream(&self) -> &TokenStream {
        &self.stream
    }

    pub fn tokens(&self) -> &[Token] {
        self.stream.tokens()
    }

    pub fn len(&self) -> usize {
        self.stream.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stream.is_empty()
    }

    pub fn token(&self, pos: usize) -> ContractResult<&Token> {
        self.stream.get(pos).ok_or(ContractError::PositionOutOfRange {
            pos,
            len: self.stream.len(),
        })
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn fixer(&mut self) -> &mut Fixer {
        &mut self.fixer
    }

    pub fn fixes(&self) -> &Fixer {
        &self.fixer
    }

    pub fn reporter(&self) -> &Reporter {
        &self.reporter
    }

    pub fn into_reporter(self) -> Reporter {
        self.reporter
    }

    pub(crate) fn set_active_rule(&mut self, code: &'static str) {
        self.active_rule = code;
    }

    // ==================== Reporting ====================

    pub fn add_error(
        &mut self,
        pos: usize,
        code: &str,
        message: impl Into<String>,
    ) -> ContractResult<()> {
        self.report(pos, Severity::Error, code, message.into(), false)
    }

    pub fn add_warning(
        &mut self,
        pos: usize,
        code: &str,
        message: impl Into<String>,
    ) -> ContractResult<()> {
        self.report(pos, Severity::Warning, code, message.into(), false)
    }

    /// Report a fixable error; returns true when the rule should queue its fix
    pub fn add_fixable_error(
        &mut self,
        pos: usize,
        code: &str,
        message: impl Into<String>,
    ) -> ContractResult<bool> {
        self.report(pos, Severity::Error, code, message.into(), true)?;
        Ok(self.mode == Mode::Fix)
    }

    /// Report a fixable warning; returns true when the rule should queue its fix
    pub fn add_fixable_warning(
        &mut self,
        pos: usize,
        code: &str,
        message: impl Into<String>,
    ) -> ContractResult<bool> {
        self.report(pos, Severity::Warning, code, message.into(), true)?;
        Ok(self.mode == Mode::Fix)
    }

    pub fn record_metric(&mut self, pos: usize, name: &str, value: impl Into<MetricValue>) {
        self.reporter.record_metric(pos, name, value.into());
    }

    fn report(
        &mut self,
        pos: usize,
        severity: Severity,
        code: &str,
        message: String,
        fixable: bool,
    ) -> ContractResult<()> {
        let (line, column) = {
            let token = self.token(pos)?;
            (token.line, token.column)
        };
        // Internal codes are already fully qualified
        let code = if code.starts_with("Internal.") || self.active_rule.is_empty() {
            code.to_string()
        } else {
            format!("{}.{}", self.active_rule, code)
        };
        self.reporter.push(Violation {
            position: pos,
            line,
            column,
            severity,
            code,
            message,
            fixable,
        });
        Ok(())
    }

    // ==================== Navigation ====================

    /// First token at or after `from` (and before `to`) whose kind is in
    /// `types`, or not in `types` when `exclude` is set
    pub fn find_next(
        &self,
        types: &[TokenKind],
        from: usize,
        to: Option<usize>,
        exclude: bool,
    ) -> ContractResult<Option<usize>> {
        let len = self.stream.len();
        let end = to.unwrap_or(len);
        if from > len || end > len || end < from {
            return Err(ContractError::InvalidBounds {
                from,
                to: end,
                direction: "forward",
            });
        }

        let tokens = self.stream.tokens();
        Ok((from..end).find(|&i| types.contains(&tokens[i].kind) != exclude))
    }

    /// First token at or before `from` (and after `to`) whose kind is in
    /// `types`, or not in `types` when `exclude` is set
    pub fn find_previous(
        &self,
        types: &[TokenKind],
        from: usize,
        to: Option<usize>,
        exclude: bool,
    ) -> ContractResult<Option<usize>> {
        let len = self.stream.len();
        if from >= len {
            return Err(ContractError::PositionOutOfRange { pos: from, len });
        }
        let start = match to {
            Some(to) if to > from => {
                return Err(ContractError::InvalidBounds {
                    from,
                    to,
                    direction: "backward",
                })
            }
            Some(to) => to + 1,
            None => 0,
        };

        let tokens = self.stream.tokens();
        Ok((start..=from)
            .rev()
            .find(|&i| types.contains(&tokens[i].kind) != exclude))
    }

    /// First token of the statement containing `pos`
    pub fn find_start_of_statement(&self, pos: usize) -> ContractResult<usize> {
        let tokens = self.stream.tokens();
        self.token(pos)?;

        let mut last_not_empty = pos;
        let mut i = pos;
        loop {
            if ends_statement(tokens[i].kind) {
                break;
            }
            if tokens[i].kind.is_closer() {
                if let Some(opener) = tokens[i].bracket_match {
                    i = opener;
                }
            }
            if !tokens[i].kind.is_empty() {
                last_not_empty = i;
            }
            if i == 0 {
                break;
            }
            i -= 1;
        }

        Ok(last_not_empty)
    }

    // ==================== Declarations ====================

    /// Name declared by a `function`, `class`, `interface` or `trait` token;
    /// `None` for closures and anonymous classes
    pub fn declaration_name(&self, pos: usize) -> ContractResult<Option<String>> {
        let token = self.token(pos)?;
        match token.kind {
            TokenKind::Closure => return Ok(None),
            TokenKind::Function | TokenKind::Class | TokenKind::Interface | TokenKind::Trait => {}
            found => {
                return Err(ContractError::UnexpectedToken {
                    pos,
                    found,
                    expected: "function, class, interface or trait",
                })
            }
        }

        let skip = [
            TokenKind::Whitespace,
            TokenKind::Comment,
            TokenKind::DocComment,
            TokenKind::Ampersand,
        ];
        let name = self
            .find_next(&skip, pos + 1, None, true)?
            .map(|i| &self.stream[i])
            .filter(|t| t.kind == TokenKind::String)
            .map(|t| t.content.clone());
        Ok(name)
    }

    /// Visibility and modifiers written before a function or closure token
    pub fn method_properties(&self, pos: usize) -> ContractResult<MethodProperties> {
        let token = self.token(pos)?;
        if !matches!(token.kind, TokenKind::Function | TokenKind::Closure) {
            return Err(ContractError::UnexpectedToken {
                pos,
                found: token.kind,
                expected: "function or closure",
            });
        }

        let mut props = MethodProperties {
            scope: Scope::Public,
            scope_specified: false,
            is_abstract: false,
            is_final: false,
            is_static: false,
            is_closure: token.kind == TokenKind::Closure,
        };

        for t in self.stream.tokens()[..pos].iter().rev() {
            match t.kind {
                TokenKind::Public => set_scope(&mut props, Scope::Public),
                TokenKind::Protected => set_scope(&mut props, Scope::Protected),
                TokenKind::Private => set_scope(&mut props, Scope::Private),
                TokenKind::Abstract => props.is_abstract = true,
                TokenKind::Final => props.is_final = true,
                TokenKind::Static => props.is_static = true,
                kind if kind.is_empty() => {}
                _ => break,
            }
        }

        Ok(props)
    }
}

fn set_scope(props: &mut MethodProperties, scope: Scope) {
    props.scope = scope;
    props.scope_specified = true;
}

fn ends_statement(kind: TokenKind) -> bool {
    kind.is_opener()
        || matches!(
            kind,
            TokenKind::Semicolon
                | TokenKind::OpenTag
                | TokenKind::CloseTag
                | TokenKind::Colon
                | TokenKind::Comma
                | TokenKind::DoubleArrow
        )
}
