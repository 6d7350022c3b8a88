//! phpsniff-rules: PHP style rules built on phpsniff-core
//!
//! - `ConcatenationSpacingRule`: single space around `.`, aligned multi-line concatenation
//! - `DisallowMultipleStatementsRule`: one statement per line
//! - `SniffConfig`: `.phpsniff.toml` loading
//! - `AllowedTypes`: docblock type allow-list

pub mod allowed_types;
pub mod concatenation_spacing;
pub mod config;
pub mod disallow_multiple_statements;
pub mod registry;

pub use allowed_types::{AllowedTypes, DEFAULT_ALLOWED_TYPES};
pub use concatenation_spacing::ConcatenationSpacingRule;
pub use config::SniffConfig;
pub use disallow_multiple_statements::DisallowMultipleStatementsRule;
pub use registry::{build_dispatcher, builtin_rules, list_rules};
