//! phpsniff-core: Token-stream rule engine for PHP style rules
//!
//! This crate provides:
//! - `TokenStream`: Tokens of one file with bracket and parenthesis structure
//! - `RuleContext`: Navigation, reporting and declaration helpers for one pass
//! - `Fixer`: Transactional token edits grouped into changesets
//! - `RuleDispatcher`: Runs registered `Rule`s over the stream with resume points
//! - `TypeRegistry`: Pluggable class lookup behind test-class detection
//! - `FixRunner`: Re-tokenize-and-rerun loop producing a `FileReport`

pub mod context;
pub mod dispatcher;
mod error;
pub mod fixer;
pub mod hierarchy;
pub mod report;
pub mod runner;
pub mod token;

#[cfg(any(test, feature = "test-support"))]
pub mod fixture;

pub use context::{MethodProperties, Mode, RuleContext, Scope};
pub use dispatcher::{DispatchStats, Rule, RuleDispatcher};
pub use error::{ContractError, ContractResult};
pub use fixer::{ChangesetOutcome, Edit, EditOp, Fixer};
pub use hierarchy::{NoTypeRegistry, StaticTypeRegistry, TestFramework, TypeRegistry};
pub use report::{MetricSummary, MetricValue, Reporter, Severity, Violation};
pub use runner::{
    FileReport, FileStatus, FixRunner, RunError, TokenizeError, Tokenizer, DEFAULT_MAX_LOOPS,
};
pub use token::{Token, TokenKind, TokenStream};
