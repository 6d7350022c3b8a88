//! Configuration file support for phpsniff
//!
//! Loads `.phpsniff.toml` from a directory or its parents.

use anyhow::{Context, Result};
use phpsniff_core::{FixRunner, TestFramework, DEFAULT_MAX_LOOPS};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::allowed_types::AllowedTypes;

pub const CONFIG_FILE: &str = ".phpsniff.toml";

/// Configuration file structure
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SniffConfig {
    pub rules: RulesConfig,
    pub fixer: FixerConfig,
    pub testing: TestingConfig,
    pub docblock: DocblockConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Rule codes that are not registered
    pub disabled: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct FixerConfig {
    pub enabled: bool,
    /// Cap on fix passes per file
    pub max_loops: usize,
}

impl Default for FixerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_loops: DEFAULT_MAX_LOOPS,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TestingConfig {
    /// Fully qualified base classes of test cases; PHPUnit when empty
    pub base_classes: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DocblockConfig {
    /// Added to the built-in allow-list; replaces `int` and `bool` when set
    pub extra_allowed_types: Vec<String>,
}

impl Default for DocblockConfig {
    fn default() -> Self {
        Self {
            extra_allowed_types: vec!["int".to_string(), "bool".to_string()],
        }
    }
}

impl SniffConfig {
    /// Load config from `.phpsniff.toml` searching from current directory upward
    pub fn load() -> Result<Option<(SniffConfig, PathBuf)>> {
        Self::load_from(std::env::current_dir()?)
    }

    /// Load config searching from the given directory upward
    pub fn load_from(start_dir: PathBuf) -> Result<Option<(SniffConfig, PathBuf)>> {
        let mut current = Some(start_dir.as_path());

        while let Some(dir) = current {
            let config_path = dir.join(CONFIG_FILE);
            if config_path.exists() {
                let config = Self::load_path(&config_path)?;
                return Ok(Some((config, config_path)));
            }
            current = dir.parent();
        }

        Ok(None)
    }

    /// Load config from a specific path
    pub fn load_path(path: &Path) -> Result<SniffConfig> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: SniffConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(config)
    }

    pub fn is_disabled(&self, code: &str) -> bool {
        self.rules.disabled.iter().any(|d| d == code)
    }

    pub fn test_framework(&self) -> TestFramework {
        if self.testing.base_classes.is_empty() {
            TestFramework::default()
        } else {
            TestFramework::new(&self.testing.base_classes)
        }
    }

    pub fn allowed_types(&self) -> AllowedTypes {
        AllowedTypes::defaults().with_extra(&self.docblock.extra_allowed_types)
    }

    /// Apply the fixer and testing settings to a runner
    pub fn configure<'a>(&self, runner: FixRunner<'a>) -> FixRunner<'a> {
        runner
            .with_fix(self.fixer.enabled)
            .with_max_loops(self.fixer.max_loops)
            .with_test_framework(self.test_framework())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_config(dir: &Path, content: &str) {
        fs::write(dir.join(CONFIG_FILE), content).unwrap();
    }

    #[test]
    fn test_load_full_config() {
        let temp = TempDir::new().unwrap();
        create_config(
            temp.path(),
            r#"
[rules]
disabled = ["Strings.ConcatenationSpacing"]

[fixer]
enabled = false
max_loops = 5

[testing]
base_classes = ["Codeception\\Test\\Unit"]

[docblock]
extra_allowed_types = ["int", "bool"]
"#,
        );

        let (config, path) = SniffConfig::load_from(temp.path().to_path_buf())
            .unwrap()
            .unwrap();

        assert_eq!(path, temp.path().join(CONFIG_FILE));
        assert!(config.is_disabled("Strings.ConcatenationSpacing"));
        assert!(!config.is_disabled("Formatting.DisallowMultipleStatements"));
        assert!(!config.fixer.enabled);
        assert_eq!(config.fixer.max_loops, 5);
        assert!(config.test_framework().is_base_class("Codeception\\Test\\Unit"));
        assert!(!config.test_framework().is_base_class("PHPUnit\\Framework\\TestCase"));
        assert!(config.allowed_types().contains("int"));
    }

    #[test]
    fn test_load_empty_config() {
        let temp = TempDir::new().unwrap();
        create_config(temp.path(), "");

        let (config, _) = SniffConfig::load_from(temp.path().to_path_buf())
            .unwrap()
            .unwrap();

        assert!(config.rules.disabled.is_empty());
        assert!(config.fixer.enabled);
        assert_eq!(config.fixer.max_loops, DEFAULT_MAX_LOOPS);
        assert_eq!(config.test_framework(), TestFramework::default());
        assert_eq!(
            config.allowed_types(),
            AllowedTypes::defaults().with_extra(["int", "bool"])
        );
    }

    #[test]
    fn test_default_allows_int_and_bool() {
        let types = SniffConfig::default().allowed_types();
        assert!(types.contains("int"));
        assert!(types.contains("bool"));
        assert!(types.accepts("int|bool[]"));
    }

    #[test]
    fn test_explicit_extra_types_replace_the_default_extras() {
        let temp = TempDir::new().unwrap();
        create_config(temp.path(), "[docblock]\nextra_allowed_types = [\"Money\"]\n");

        let (config, _) = SniffConfig::load_from(temp.path().to_path_buf())
            .unwrap()
            .unwrap();
        let types = config.allowed_types();
        assert!(types.contains("Money"));
        assert!(!types.contains("int"));
    }

    #[test]
    fn test_load_from_parent_directory() {
        let temp = TempDir::new().unwrap();
        create_config(temp.path(), "[fixer]\nmax_loops = 9\n");
        let nested = temp.path().join("src").join("Tests");
        fs::create_dir_all(&nested).unwrap();

        let (config, path) = SniffConfig::load_from(nested).unwrap().unwrap();
        assert_eq!(path, temp.path().join(CONFIG_FILE));
        assert_eq!(config.fixer.max_loops, 9);
    }

    #[test]
    fn test_no_config_found() {
        let temp = TempDir::new().unwrap();
        let result = SniffConfig::load_path(&temp.path().join(CONFIG_FILE));
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_error_names_the_file() {
        let temp = TempDir::new().unwrap();
        create_config(temp.path(), "[fixer]\nmax_loops = \"many\"\n");

        let err = SniffConfig::load_from(temp.path().to_path_buf()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }
}
