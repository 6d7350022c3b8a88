//! Contract errors raised by the engine
//!
//! Every variant here means a rule (or the caller driving the engine) broke
//! the engine's contract. They are not style violations and are never
//! reported to the user as such: the pass for the current file is aborted
//! and the error propagates to whoever invoked the dispatcher.

use thiserror::Error;

use crate::token::TokenKind;

/// Fatal contract violations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContractError {
    #[error("A changeset is already open; changesets do not nest")]
    ChangesetAlreadyOpen,

    #[error("No changeset is open; tokens may only be changed inside a changeset")]
    NoOpenChangeset,

    #[error("Token position {pos} out of range for stream of {len} tokens")]
    PositionOutOfRange { pos: usize, len: usize },

    #[error("Invalid search bounds {from}..{to} ({direction})")]
    InvalidBounds {
        from: usize,
        to: usize,
        direction: &'static str,
    },

    #[error("Token at {pos} is {found:?}, expected {expected}")]
    UnexpectedToken {
        pos: usize,
        found: TokenKind,
        expected: &'static str,
    },

    #[error("Rule {rule} registered an empty set of token types")]
    EmptyInterest { rule: &'static str },

    #[error("Rule {rule} returned with a changeset still open")]
    ChangesetLeftOpen { rule: &'static str },

    #[error("Token {pos} at {line}:{column} precedes the token before it")]
    UnorderedStream {
        pos: usize,
        line: usize,
        column: usize,
    },

    #[error("Token {pos} is malformed: {reason}")]
    MalformedToken { pos: usize, reason: &'static str },
}

pub type ContractResult<T> = Result<T, ContractError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_position() {
        let err = ContractError::PositionOutOfRange { pos: 12, len: 4 };
        assert_eq!(
            err.to_string(),
            "Token position 12 out of range for stream of 4 tokens"
        );

        let err = ContractError::InvalidBounds {
            from: 3,
            to: 7,
            direction: "backward",
        };
        assert!(err.to_string().contains("3..7"));
    }
}
