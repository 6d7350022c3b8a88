//! Rule trait and dispatcher

use std::collections::HashMap;

use tracing::debug;

use crate::context::RuleContext;
use crate::error::{ContractError, ContractResult};
use crate::token::TokenKind;

/// A style rule driven by token type
pub trait Rule: Send + Sync {
    /// Rule code used to scope violation codes (e.g. "Strings.ConcatenationSpacing")
    fn code(&self) -> &'static str;

    /// A short description of what this rule checks
    fn description(&self) -> &'static str;

    /// Token types the rule wants to see; must not be empty
    fn register(&self) -> &'static [TokenKind];

    /// Inspect the token at `pos`
    ///
    /// Returning `Ok(Some(resume))` skips this rule until the dispatcher
    /// reaches `resume`.
    fn process(&self, ctx: &mut RuleContext<'_>, pos: usize) -> ContractResult<Option<usize>>;
}

/// Counters for one dispatch pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub invocations: usize,
    /// Matches suppressed by a resume point
    pub skipped: usize,
}

/// Runs registered rules over a token stream
#[derive(Default)]
pub struct RuleDispatcher {
    rules: Vec<Box<dyn Rule>>,
    /// token type -> rule indices, in registration order
    listeners: HashMap<TokenKind, Vec<usize>>,
}

impl RuleDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a rule
    pub fn register(&mut self, rule: Box<dyn Rule>) -> ContractResult<()> {
        let interest = rule.register();
        if interest.is_empty() {
            return Err(ContractError::EmptyInterest { rule: rule.code() });
        }

        let index = self.rules.len();
        for &kind in interest {
            let listeners = self.listeners.entry(kind).or_default();
            if !listeners.contains(&index) {
                listeners.push(index);
            }
        }
        self.rules.push(rule);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Get all rule codes
    pub fn all_codes(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.code()).collect()
    }

    /// Get all rules with their descriptions
    pub fn list_rules(&self) -> Vec<(&'static str, &'static str)> {
        self.rules
            .iter()
            .map(|r| (r.code(), r.description()))
            .collect()
    }

    /// Walk the stream once, calling every interested rule at each token
    ///
    /// Rules at the same position run in registration order. The first
    /// error aborts the pass.
    pub fn run(&self, ctx: &mut RuleContext<'_>) -> ContractResult<DispatchStats> {
        let mut resume_at = vec![0usize; self.rules.len()];
        let mut stats = DispatchStats::default();

        for pos in 0..ctx.len() {
            let kind = ctx.tokens()[pos].kind;
            let Some(listeners) = self.listeners.get(&kind) else {
                continue;
            };

            for &index in listeners {
                if pos < resume_at[index] {
                    stats.skipped += 1;
                    continue;
                }

                let rule = &self.rules[index];
                ctx.set_active_rule(rule.code());
                let result = rule.process(ctx, pos);
                ctx.set_active_rule("");
                stats.invocations += 1;

                if let Some(resume) = result? {
                    resume_at[index] = resume;
                }

                if ctx.fixes().is_changeset_open() {
                    ctx.fixer().rollback_changeset();
                    return Err(ContractError::ChangesetLeftOpen { rule: rule.code() });
                }
            }
        }

        debug!(
            rules = self.rules.len(),
            invocations = stats.invocations,
            skipped = stats.skipped,
            fixes = ctx.fixes().fix_count(),
            "dispatch complete"
        );

        Ok(stats)
    }
}
