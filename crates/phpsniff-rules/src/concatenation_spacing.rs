//! Spacing and alignment around the string concatenation operator
//!
//! On a single line `.` takes exactly one space on each side. When a
//! concatenation continues on the next line, the leading `.` lines up with
//! the assignment operator, the previous line's leading `.`, or the start of
//! the statement.

use phpsniff_core::{ContractResult, MetricValue, Rule, RuleContext, TokenKind};

pub const CODE: &str = "Strings.ConcatenationSpacing";

const METRIC_BEFORE: &str = "Spacing before string concat";
const METRIC_AFTER: &str = "Spacing after string concat";
const METRIC_MULTI_LINE: &str = "Multi-line string concat";

/// Whitespace on one side of an operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Spacing {
    /// The neighbouring operand is on another line
    Newline,
    Spaces(usize),
}

impl From<Spacing> for MetricValue {
    fn from(spacing: Spacing) -> Self {
        match spacing {
            Spacing::Newline => MetricValue::from("newline"),
            Spacing::Spaces(n) => MetricValue::from(n),
        }
    }
}

pub struct ConcatenationSpacingRule;

impl Rule for ConcatenationSpacingRule {
    fn code(&self) -> &'static str {
        CODE
    }

    fn description(&self) -> &'static str {
        "Single space around `.`, multi-line concatenations aligned"
    }

    fn register(&self) -> &'static [TokenKind] {
        &[TokenKind::StringConcat]
    }

    fn process(&self, ctx: &mut RuleContext<'_>, pos: usize) -> ContractResult<Option<usize>> {
        let before = spacing_before(ctx, pos)?;
        let after = spacing_after(ctx, pos)?;

        ctx.record_metric(pos, METRIC_BEFORE, before);
        ctx.record_metric(pos, METRIC_AFTER, after);
        let multi_line = before == Spacing::Newline || after == Spacing::Newline;
        ctx.record_metric(pos, METRIC_MULTI_LINE, if multi_line { "yes" } else { "no" });

        if before == Spacing::Spaces(1) && after == Spacing::Spaces(1) {
            return Ok(None);
        }

        if before == Spacing::Newline {
            check_alignment(ctx, pos)?;
        } else {
            check_padding(ctx, pos)?;
        }

        Ok(None)
    }
}

fn spacing_before(ctx: &RuleContext<'_>, pos: usize) -> ContractResult<Spacing> {
    let prev = match pos.checked_sub(1) {
        Some(start) => ctx.find_previous(&[TokenKind::Whitespace], start, None, true)?,
        None => None,
    };
    side_spacing(ctx, pos, prev, pos.checked_sub(1))
}

fn spacing_after(ctx: &RuleContext<'_>, pos: usize) -> ContractResult<Spacing> {
    let next = ctx.find_next(&[TokenKind::Whitespace], pos + 1, None, true)?;
    side_spacing(ctx, pos, next, Some(pos + 1).filter(|&i| i < ctx.len()))
}

/// `operand` is the nearest non-whitespace token on that side, `adjacent`
/// the token directly next to the operator
fn side_spacing(
    ctx: &RuleContext<'_>,
    pos: usize,
    operand: Option<usize>,
    adjacent: Option<usize>,
) -> ContractResult<Spacing> {
    let line = ctx.token(pos)?.line;
    let Some(operand) = operand else {
        return Ok(Spacing::Newline);
    };
    if ctx.token(operand)?.line != line {
        return Ok(Spacing::Newline);
    }

    Ok(match adjacent.map(|i| &ctx.tokens()[i]) {
        Some(token) if token.is(TokenKind::Whitespace) => Spacing::Spaces(token.length()),
        _ => Spacing::Spaces(0),
    })
}

fn check_alignment(ctx: &mut RuleContext<'_>, pos: usize) -> ContractResult<()> {
    let found = ctx.token(pos)?.column.saturating_sub(1);
    let expected = find_expected(ctx, pos)?;
    if found == expected {
        return Ok(());
    }

    let message = format!(
        "Concat operator not aligned correctly; expected {} space(s) but found {}.",
        expected, found
    );
    if !ctx.add_fixable_error(pos, "NotAligned", message)? {
        return Ok(());
    }

    if expected > found {
        ctx.fixer().begin_changeset()?;
        ctx.fixer().insert_before(pos, " ".repeat(expected - found))?;
        ctx.fixer().end_changeset()?;
        return Ok(());
    }

    // Too far right: trim the indentation in front of the operator
    let Some(indent) = pos
        .checked_sub(1)
        .filter(|&i| ctx.tokens()[i].is(TokenKind::Whitespace))
    else {
        return Ok(());
    };
    let current = &ctx.tokens()[indent];
    let keep = current.length().saturating_sub(found - expected);
    let shortened: String = current.content.chars().take(keep).collect();

    ctx.fixer().begin_changeset()?;
    ctx.fixer().replace(indent, shortened)?;
    ctx.fixer().end_changeset()?;
    Ok(())
}

fn check_padding(ctx: &mut RuleContext<'_>, pos: usize) -> ContractResult<()> {
    let message = "Concat operator must be surrounded by a single space";
    if !ctx.add_fixable_error(pos, "PaddingFound", message)? {
        return Ok(());
    }

    let is_whitespace = |ctx: &RuleContext<'_>, i: usize| {
        ctx.tokens()
            .get(i)
            .is_some_and(|t| t.is(TokenKind::Whitespace))
    };
    let before_ws = pos.checked_sub(1).filter(|&i| is_whitespace(ctx, i));
    let after_ws = Some(pos + 1).filter(|&i| is_whitespace(ctx, i));

    ctx.fixer().begin_changeset()?;
    match (before_ws, pos.checked_sub(1)) {
        (Some(ws), _) => ctx.fixer().replace(ws, " ")?,
        (None, Some(prev)) => ctx.fixer().insert_after(prev, " ")?,
        (None, None) => ctx.fixer().insert_before(pos, " ")?,
    }
    match after_ws {
        Some(ws) => ctx.fixer().replace(ws, " ")?,
        None => ctx.fixer().insert_after(pos, " ")?,
    }
    ctx.fixer().end_changeset()?;
    Ok(())
}

/// Number of spaces expected before a `.` that starts a line
fn find_expected(ctx: &RuleContext<'_>, pos: usize) -> ContractResult<usize> {
    let mut current = pos;

    while let Some(start) = current.checked_sub(1) {
        let skip = [TokenKind::Whitespace, TokenKind::ConstantEncapsedString];
        let Some(operator) = ctx.find_previous(&skip, start, None, true)? else {
            break;
        };
        let token = &ctx.tokens()[operator];

        if token.kind.is_assignment() {
            return Ok(token.column.saturating_sub(1));
        }
        if token.kind != TokenKind::StringConcat {
            break;
        }

        // A leading `.` on the previous line is the alignment anchor
        let before = match operator.checked_sub(1) {
            Some(i) => ctx.find_previous(&[TokenKind::Whitespace], i, None, true)?,
            None => None,
        };
        match before {
            Some(b) if ctx.tokens()[b].line == token.line => current = operator,
            _ => return Ok(token.column.saturating_sub(1)),
        }
    }

    let start = &ctx.tokens()[ctx.find_start_of_statement(pos)?];
    Ok(if start.is(TokenKind::Return) {
        start.column + 4
    } else {
        start.column + 3
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use phpsniff_core::fixture::FixtureTokenizer;
    use phpsniff_core::{FixRunner, Mode, RuleDispatcher, TokenStream, Violation};
    use pretty_assertions::assert_eq;

    fn dispatcher() -> RuleDispatcher {
        let mut dispatcher = RuleDispatcher::new();
        dispatcher.register(Box::new(ConcatenationSpacingRule)).unwrap();
        dispatcher
    }

    fn check(source: &str) -> Vec<Violation> {
        FixRunner::new(&dispatcher(), &FixtureTokenizer)
            .run(source)
            .unwrap()
            .violations
    }

    fn fix(source: &str) -> String {
        let report = FixRunner::new(&dispatcher(), &FixtureTokenizer)
            .with_fix(true)
            .run(source)
            .unwrap();
        assert!(report.violations.is_empty(), "{:?}", report.violations);
        report.fixed_content.unwrap_or_else(|| source.to_string())
    }

    fn codes(violations: &[Violation]) -> Vec<&str> {
        violations.iter().map(|v| v.code.as_str()).collect()
    }

    #[test]
    fn test_shrink_keeps_newline_of_combined_whitespace() {
        // Tokenizers that keep the newline and the indentation in one token
        let stream = TokenStream::from_lexemes([
            (TokenKind::OpenTag, "<?php\n"),
            (TokenKind::Variable, "$x"),
            (TokenKind::Whitespace, " "),
            (TokenKind::Equal, "="),
            (TokenKind::Whitespace, " "),
            (TokenKind::ConstantEncapsedString, "'a'"),
            (TokenKind::Whitespace, "\n      "),
            (TokenKind::StringConcat, "."),
            (TokenKind::Whitespace, " "),
            (TokenKind::ConstantEncapsedString, "'b'"),
            (TokenKind::Semicolon, ";"),
        ]);
        let mut ctx = RuleContext::new(stream).with_mode(Mode::Fix);
        dispatcher().run(&mut ctx).unwrap();

        assert_eq!(ctx.fixes().fix_count(), 1);
        assert_eq!(ctx.fixes().proposed_content(), "<?php\n$x = 'a'\n   . 'b';");
        assert_eq!(
            ctx.reporter().violations()[0].message,
            "Concat operator not aligned correctly; expected 3 space(s) but found 6."
        );
    }

    #[test]
    fn test_single_space_is_compliant() {
        assert!(check("<?php\n$x = 'a' . 'b' . $c;\n").is_empty());
    }

    #[test]
    fn test_padding_found() {
        let violations = check("<?php\n$x = 'a'    .    'b';\n");
        assert_eq!(codes(&violations), vec!["Strings.ConcatenationSpacing.PaddingFound"]);
        assert_eq!(violations[0].message, "Concat operator must be surrounded by a single space");
        assert!(violations[0].fixable);
        assert_eq!(fix("<?php\n$x = 'a'    .    'b';\n"), "<?php\n$x = 'a' . 'b';\n");
    }

    #[test]
    fn test_missing_spaces_are_added() {
        assert_eq!(fix("<?php\n$x = 'a'.$b.'c';\n"), "<?php\n$x = 'a' . $b . 'c';\n");
    }

    #[test]
    fn test_aligned_under_assignment() {
        assert!(check("<?php\n$x = 'a'\n   . 'b'\n   . 'c';\n").is_empty());
    }

    #[test]
    fn test_aligned_under_compound_assignment() {
        assert!(check("<?php\n$sql .= 'a'\n     . 'b';\n").is_empty());
    }

    #[test]
    fn test_not_aligned_message_and_fix() {
        let source = "<?php\n$x = 'a'\n       . 'b';\n";
        let violations = check(source);
        assert_eq!(codes(&violations), vec!["Strings.ConcatenationSpacing.NotAligned"]);
        assert_eq!(
            violations[0].message,
            "Concat operator not aligned correctly; expected 3 space(s) but found 7."
        );
        assert_eq!(fix(source), "<?php\n$x = 'a'\n   . 'b';\n");
    }

    #[test]
    fn test_not_aligned_indent_added() {
        assert_eq!(fix("<?php\n$x = 'a'\n. 'b';\n"), "<?php\n$x = 'a'\n   . 'b';\n");
    }

    #[test]
    fn test_aligned_under_previous_line_operator() {
        let source = "<?php\nfoo($a\n    . 'b'\n    . 'c');\n";
        let violations = check(source);
        // The first `.` falls back to the statement start (`$a`, +3); the
        // second lines up with the first
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].line, 3);
        assert_eq!(
            violations[0].message,
            "Concat operator not aligned correctly; expected 8 space(s) but found 4."
        );
    }

    #[test]
    fn test_return_statement_alignment() {
        assert!(check("<?php\nreturn 'a'\n     . 'b';\n").is_empty());

        let violations = check("<?php\nreturn 'a'\n    . 'b';\n");
        assert_eq!(
            violations[0].message,
            "Concat operator not aligned correctly; expected 5 space(s) but found 4."
        );
    }

    #[test]
    fn test_other_statements_use_three() {
        assert!(check("<?php\necho 'a'\n    . 'b';\n").is_empty());
        assert!(check("<?php\nthrow 'a'\n    . 'b';\n").is_empty());
    }

    #[test]
    fn test_trailing_operator_is_padding() {
        let source = "<?php\n$x = 'a' .\n    'b';\n";
        assert_eq!(codes(&check(source)), vec!["Strings.ConcatenationSpacing.PaddingFound"]);
        assert_eq!(fix(source), "<?php\n$x = 'a' . 'b';\n");
    }

    #[test]
    fn test_metrics() {
        let report = FixRunner::new(&dispatcher(), &FixtureTokenizer)
            .run("<?php\n$x = 'a'  . 'b'\n   . 'c';\n")
            .unwrap();

        let before = &report.metrics[METRIC_BEFORE];
        assert_eq!(before[&MetricValue::from(2)], 1);
        assert_eq!(before[&MetricValue::from("newline")], 1);

        let multi = &report.metrics[METRIC_MULTI_LINE];
        assert_eq!(multi[&MetricValue::from("yes")], 1);
        assert_eq!(multi[&MetricValue::from("no")], 1);
    }

    #[test]
    fn test_fix_settles_in_one_pass() {
        let report = FixRunner::new(&dispatcher(), &FixtureTokenizer)
            .with_fix(true)
            .run("<?php\n$x = 'a'\n     . 'b';\n$y = 'c'  .'d';\n")
            .unwrap();

        assert_eq!(report.loops, 2);
        assert_eq!(
            report.fixed_content.as_deref(),
            Some("<?php\n$x = 'a'\n   . 'b';\n$y = 'c' . 'd';\n")
        );
    }
}
