//! One statement per line

use phpsniff_core::{ContractResult, Rule, RuleContext, TokenKind};

pub const CODE: &str = "Formatting.DisallowMultipleStatements";

const METRIC: &str = "Multiple statements on same line";

/// Flags a statement that ends on the same line as the previous one
///
/// `for (...;...;...)` headers are exempt, and so is a statement whose
/// preceding `;` is directly followed by `}`.
pub struct DisallowMultipleStatementsRule;

impl Rule for DisallowMultipleStatementsRule {
    fn code(&self) -> &'static str {
        CODE
    }

    fn description(&self) -> &'static str {
        "Each statement on a line by itself"
    }

    fn register(&self) -> &'static [TokenKind] {
        &[TokenKind::Semicolon]
    }

    fn process(&self, ctx: &mut RuleContext<'_>, pos: usize) -> ContractResult<Option<usize>> {
        let boundaries = [TokenKind::Semicolon, TokenKind::OpenTag];
        let prev = match pos.checked_sub(1) {
            Some(start) => ctx.find_previous(&boundaries, start, None, false)?,
            None => None,
        };
        let Some(prev) = prev.filter(|&p| !ctx.tokens()[p].is(TokenKind::OpenTag)) else {
            ctx.record_metric(pos, METRIC, "no");
            return Ok(None);
        };

        if in_for_header(ctx, pos) {
            return Ok(None);
        }

        let tokens = ctx.tokens();
        let same_line = tokens[prev].line == tokens[pos].line;
        let after_prev = &tokens[prev + 1];
        if !same_line || after_prev.is(TokenKind::CloseCurlyBracket) {
            ctx.record_metric(pos, METRIC, "no");
            return Ok(None);
        }
        let collapse = after_prev.is(TokenKind::Whitespace);

        ctx.record_metric(pos, METRIC, "yes");
        let message = "Each PHP statement must be on a line by itself";
        if ctx.add_fixable_error(pos, "SameLine", message)? {
            let eol = ctx.stream().eol_char();
            ctx.fixer().begin_changeset()?;
            ctx.fixer().insert_after(prev, eol)?;
            if collapse {
                ctx.fixer().replace(prev + 1, "")?;
            }
            ctx.fixer().end_changeset()?;
        }

        Ok(None)
    }
}

/// Whether `pos` sits inside parentheses owned by `for`
fn in_for_header(ctx: &RuleContext<'_>, pos: usize) -> bool {
    let tokens = ctx.tokens();
    tokens[pos].nested_parens.iter().any(|&opener| {
        // Parentheses without an owner (a closure inside a call) are skipped
        tokens[opener]
            .paren_owner
            .is_some_and(|owner| tokens[owner].is(TokenKind::For))
    })
}
