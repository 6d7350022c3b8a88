//! Built-in rules and dispatcher construction

use phpsniff_core::{ContractResult, Rule, RuleDispatcher};
use tracing::{debug, warn};

use crate::concatenation_spacing::ConcatenationSpacingRule;
use crate::config::SniffConfig;
use crate::disallow_multiple_statements::DisallowMultipleStatementsRule;

/// Every rule shipped with this crate, in dispatch order
pub fn builtin_rules() -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(ConcatenationSpacingRule),
        Box::new(DisallowMultipleStatementsRule),
    ]
}

/// Get all built-in rules with their descriptions
pub fn list_rules() -> Vec<(&'static str, &'static str)> {
    builtin_rules()
        .iter()
        .map(|r| (r.code(), r.description()))
        .collect()
}

/// Register the built-in rules the configuration does not disable
pub fn build_dispatcher(config: &SniffConfig) -> ContractResult<RuleDispatcher> {
    let rules = builtin_rules();

    for disabled in &config.rules.disabled {
        if !rules.iter().any(|r| r.code() == disabled.as_str()) {
            warn!(rule = %disabled, "disabled rule is not a known rule code");
        }
    }

    let mut dispatcher = RuleDispatcher::new();
    for rule in rules {
        if config.is_disabled(rule.code()) {
            debug!(rule = rule.code(), "rule disabled by configuration");
            continue;
        }
        dispatcher.register(rule)?;
    }

    Ok(dispatcher)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_rules_registered_by_default() {
        let dispatcher = build_dispatcher(&SniffConfig::default()).unwrap();
        assert_eq!(
            dispatcher.all_codes(),
            vec!["Strings.ConcatenationSpacing", "Formatting.DisallowMultipleStatements"]
        );
        assert_eq!(dispatcher.list_rules(), list_rules());
    }

    #[test]
    fn test_disabled_rules_are_skipped() {
        let mut config = SniffConfig::default();
        config.rules.disabled = vec![
            "Strings.ConcatenationSpacing".to_string(),
            "Unknown.Rule".to_string(),
        ];

        let dispatcher = build_dispatcher(&config).unwrap();
        assert_eq!(dispatcher.all_codes(), vec!["Formatting.DisallowMultipleStatements"]);
    }
}
