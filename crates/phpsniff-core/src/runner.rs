//! Fix loop for a single file
//!
//! Fixing runs the dispatcher in fix mode, takes the proposed content, and
//! tokenizes it again until no rule changes anything or the loop cap is
//! reached. A final check pass over the result produces the report.

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::context::{Mode, RuleContext};
use crate::dispatcher::RuleDispatcher;
use crate::error::ContractError;
use crate::hierarchy::{NoTypeRegistry, TestFramework, TypeRegistry};
use crate::report::{MetricSummary, Severity, Violation};
use crate::token::TokenStream;

/// Default cap on fix passes per file
pub const DEFAULT_MAX_LOOPS: usize = 50;

/// Turns PHP source into a token stream
pub trait Tokenizer {
    fn tokenize(&self, source: &str) -> Result<TokenStream, TokenizeError>;
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenizeError {
    #[error("Unterminated string starting on line {line}")]
    UnterminatedString { line: usize },

    #[error("Unterminated comment starting on line {line}")]
    UnterminatedComment { line: usize },

    #[error("Tokenizer failed: {0}")]
    Failed(String),
}

#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Tokenize(#[from] TokenizeError),

    #[error("Rule contract violated: {0}")]
    Contract(#[from] ContractError),
}

/// Overall outcome for a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Clean,
    WarningsOnly,
    /// Every error can be fixed automatically
    Fixable,
    NeedsManualFix,
}

impl FileStatus {
    pub fn classify(violations: &[Violation]) -> Self {
        let mut errors = violations.iter().filter(|v| v.severity == Severity::Error).peekable();
        if violations.is_empty() {
            FileStatus::Clean
        } else if errors.peek().is_none() {
            FileStatus::WarningsOnly
        } else if errors.all(|v| v.fixable) {
            FileStatus::Fixable
        } else {
            FileStatus::NeedsManualFix
        }
    }

    pub fn is_failure(self) -> bool {
        matches!(self, FileStatus::Fixable | FileStatus::NeedsManualFix)
    }
}

/// Result of checking (and possibly fixing) one file
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    /// Violations left after fixing
    pub violations: Vec<Violation>,
    pub metrics: MetricSummary,
    /// New content, when fixing changed the file
    pub fixed_content: Option<String>,
    /// Fix passes run
    pub loops: usize,
    /// False when the loop cap was hit with fixes still being applied
    pub converged: bool,
    pub status: FileStatus,
}

/// Drives the dispatcher over one file
pub struct FixRunner<'a> {
    dispatcher: &'a RuleDispatcher,
    tokenizer: &'a dyn Tokenizer,
    registry: &'a dyn TypeRegistry,
    framework: TestFramework,
    fix: bool,
    max_loops: usize,
}

impl<'a> FixRunner<'a> {
    pub fn new(dispatcher: &'a RuleDispatcher, tokenizer: &'a dyn Tokenizer) -> Self {
        Self {
            dispatcher,
            tokenizer,
            registry: &NoTypeRegistry,
            framework: TestFramework::default(),
            fix: false,
            max_loops: DEFAULT_MAX_LOOPS,
        }
    }

    pub fn with_fix(mut self, fix: bool) -> Self {
        self.fix = fix;
        self
    }

    pub fn with_max_loops(mut self, max_loops: usize) -> Self {
        self.max_loops = max_loops.max(1);
        self
    }

    pub fn with_type_registry(mut self, registry: &'a dyn TypeRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_test_framework(mut self, framework: TestFramework) -> Self {
        self.framework = framework;
        self
    }

    fn context(&self, stream: TokenStream, mode: Mode) -> RuleContext<'a> {
        RuleContext::new(stream)
            .with_mode(mode)
            .with_type_registry(self.registry)
            .with_test_framework(self.framework.clone())
    }

    /// Check `source`, fixing it first when enabled
    pub fn run(&self, source: &str) -> Result<FileReport, RunError> {
        let mut content = source.to_string();
        let mut loops = 0;
        let mut converged = true;

        if self.fix {
            converged = false;
            while loops < self.max_loops {
                loops += 1;
                let mut ctx = self.context(self.tokenizer.tokenize(&content)?, Mode::Fix);
                self.dispatcher.run(&mut ctx)?;

                let fixes = ctx.fixes();
                let proposed = fixes.proposed_content();
                debug!(
                    pass = loops,
                    applied = fixes.fix_count(),
                    deferred = fixes.deferred_count(),
                    "fix pass complete"
                );

                if fixes.fix_count() == 0 || proposed == content {
                    converged = true;
                    break;
                }
                content = proposed;
            }

            if !converged {
                warn!(max_loops = self.max_loops, "fixes did not settle within the loop limit");
            }
        }

        let mut ctx = self.context(self.tokenizer.tokenize(&content)?, Mode::Check);
        self.dispatcher.run(&mut ctx)?;

        let metrics = ctx.reporter().metric_summary();
        let violations = ctx.into_reporter().into_violations();
        let status = FileStatus::classify(&violations);

        Ok(FileReport {
            violations,
            metrics,
            fixed_content: (content != source).then_some(content),
            loops,
            converged,
            status,
        })
    }
}
