//! Transactional token-buffer editing
//!
//! A rule never changes tokens directly. It opens a changeset, queues edits
//! against token positions, and closes the changeset; the edits are applied
//! together or not at all. Positions always refer to the stream the pass
//! started from, so queued edits never shift each other.

use std::collections::BTreeSet;

use tracing::debug;

use crate::error::{ContractError, ContractResult};
use crate::token::TokenStream;

/// Kind of change queued against a token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOp {
    InsertBefore,
    InsertAfter,
    Replace,
}

/// Represents a single queued edit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    /// Token position the edit applies to
    pub position: usize,
    pub op: EditOp,
    /// Text to insert, or the replacement text
    pub content: String,
}

/// Result of closing a changeset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangesetOutcome {
    /// The edits were applied and changed this many tokens
    Applied { tokens: usize },
    /// Every edit left its token as it was
    Unchanged,
    /// A token was already changed earlier in this pass; nothing was
    /// applied and the next pass will see the rule fire again
    Deferred { conflict_at: usize },
}

#[derive(Debug, Default)]
struct Changeset {
    edits: Vec<Edit>,
}

/// Token buffer for one file pass
#[derive(Debug)]
pub struct Fixer {
    contents: Vec<String>,
    /// Tokens changed by an applied changeset during this pass
    changed: Vec<bool>,
    open: Option<Changeset>,
    applied: usize,
    deferred: usize,
}

impl Fixer {
    pub fn new(stream: &TokenStream) -> Self {
        let contents: Vec<String> = stream.iter().map(|t| t.content.clone()).collect();
        let changed = vec![false; contents.len()];
        Self {
            contents,
            changed,
            open: None,
            applied: 0,
            deferred: 0,
        }
    }

    /// Open a changeset. Changesets do not nest.
    pub fn begin_changeset(&mut self) -> ContractResult<()> {
        if self.open.is_some() {
            return Err(ContractError::ChangesetAlreadyOpen);
        }
        self.open = Some(Changeset::default());
        Ok(())
    }

    pub fn is_changeset_open(&self) -> bool {
        self.open.is_some()
    }

    pub fn insert_before(
        &mut self,
        position: usize,
        content: impl Into<String>,
    ) -> ContractResult<()> {
        self.queue(position, EditOp::InsertBefore, content.into())
    }

    pub fn insert_after(
        &mut self,
        position: usize,
        content: impl Into<String>,
    ) -> ContractResult<()> {
        self.queue(position, EditOp::InsertAfter, content.into())
    }

    /// Replace a token's text; the last replacement queued for a position wins
    pub fn replace(&mut self, position: usize, content: impl Into<String>) -> ContractResult<()> {
        self.queue(position, EditOp::Replace, content.into())
    }

    fn queue(&mut self, position: usize, op: EditOp, content: String) -> ContractResult<()> {
        let len = self.contents.len();
        let changeset = self.open.as_mut().ok_or(ContractError::NoOpenChangeset)?;
        if position >= len {
            return Err(ContractError::PositionOutOfRange { pos: position, len });
        }
        changeset.edits.push(Edit {
            position,
            op,
            content,
        });
        Ok(())
    }

    /// Close the open changeset and apply its edits
    ///
    /// Each touched token becomes `inserts before + (last replacement or
    /// current text) + inserts after`, insertions in queue order. The buffer
    /// cannot change while a changeset is open, so the current text is the
    /// snapshot taken when the changeset began.
    pub fn end_changeset(&mut self) -> ContractResult<ChangesetOutcome> {
        let changeset = self.open.take().ok_or(ContractError::NoOpenChangeset)?;
        let touched: BTreeSet<usize> = changeset.edits.iter().map(|e| e.position).collect();

        if let Some(&conflict_at) = touched.iter().find(|&&pos| self.changed[pos]) {
            self.deferred += 1;
            debug!(conflict_at, "changeset deferred, token already changed in this pass");
            return Ok(ChangesetOutcome::Deferred { conflict_at });
        }

        let mut updates = Vec::new();
        for &pos in &touched {
            let composed = compose(&self.contents[pos], &changeset.edits, pos);
            if composed != self.contents[pos] {
                updates.push((pos, composed));
            }
        }

        if updates.is_empty() {
            return Ok(ChangesetOutcome::Unchanged);
        }

        let tokens = updates.len();
        for (pos, composed) in updates {
            self.contents[pos] = composed;
            self.changed[pos] = true;
        }
        self.applied += 1;
        debug!(tokens, edits = changeset.edits.len(), "changeset applied");

        Ok(ChangesetOutcome::Applied { tokens })
    }

    /// Discard the open changeset, returning how many edits were dropped
    pub fn rollback_changeset(&mut self) -> usize {
        self.open.take().map_or(0, |c| c.edits.len())
    }

    /// Current text of a token
    pub fn token_content(&self, position: usize) -> ContractResult<&str> {
        self.contents
            .get(position)
            .map(String::as_str)
            .ok_or(ContractError::PositionOutOfRange {
                pos: position,
                len: self.contents.len(),
            })
    }

    /// The whole buffer with every applied changeset
    pub fn proposed_content(&self) -> String {
        self.contents.concat()
    }

    /// Number of changesets that changed the buffer in this pass
    pub fn fix_count(&self) -> usize {
        self.applied
    }

    /// Number of changesets postponed because of a conflict
    pub fn deferred_count(&self) -> usize {
        self.deferred
    }
}

fn compose(current: &str, edits: &[Edit], position: usize) -> String {
    let mut before = String::new();
    let mut after = String::new();
    let mut replacement: Option<&str> = None;

    for edit in edits.iter().filter(|e| e.position == position) {
        match edit.op {
            EditOp::InsertBefore => before.push_str(&edit.content),
            EditOp::InsertAfter => after.push_str(&edit.content),
            EditOp::Replace => replacement = Some(&edit.content),
        }
    }

    format!("{}{}{}", before, replacement.unwrap_or(current), after)
}
