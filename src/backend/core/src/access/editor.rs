//! Bulk matrix editing: a baseline snapshot, a separate working copy, and a
//! diff-then-commit protocol that writes only the cells that changed.
//!
//! Concurrent editors are last-writer-wins; the baseline is not re-validated
//! against the store before commit.

use async_trait::async_trait;
use std::collections::BTreeSet;
use tracing::{debug, info};

use super::level::AccessLevel;
use super::matrix::MatrixSnapshot;
use super::models::{RoleId, RuleChange};
use crate::error::Result;

/// Destination for an atomic batch of rule changes.
#[async_trait]
pub trait RuleBatchWriter: Send + Sync {
    /// Write every change or none of them. Later entries for the same cell win.
    async fn write_batch(&self, changes: &[RuleChange]) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Working copy equals the baseline; nothing was sent.
    NoChanges,
    Committed { changes: usize },
}

/// Cells that differ between two snapshots, ordered by page then role.
///
/// A cell missing on either side counts as `none`.
pub fn diff_snapshots(baseline: &MatrixSnapshot, working: &MatrixSnapshot) -> Vec<RuleChange> {
    let pages: BTreeSet<&String> = baseline.keys().chain(working.keys()).collect();
    let mut changes = Vec::new();

    for page in pages {
        let before = baseline.get(page);
        let after = working.get(page);
        let roles: BTreeSet<RoleId> = before
            .into_iter()
            .flat_map(|m| m.keys())
            .chain(after.into_iter().flat_map(|m| m.keys()))
            .copied()
            .collect();

        for role_id in roles {
            let old = before.and_then(|m| m.get(&role_id)).copied().unwrap_or_default();
            let new = after.and_then(|m| m.get(&role_id)).copied().unwrap_or_default();
            if old != new {
                changes.push(RuleChange::new(page.clone(), role_id, new));
            }
        }
    }

    changes
}

/// Editable copy of the page-access matrix.
#[derive(Debug, Clone, Default)]
pub struct MatrixEditor {
    baseline: MatrixSnapshot,
    working: MatrixSnapshot,
}

impl MatrixEditor {
    pub fn new(baseline: MatrixSnapshot) -> Self {
        Self {
            working: baseline.clone(),
            baseline,
        }
    }

    pub fn baseline(&self) -> &MatrixSnapshot {
        &self.baseline
    }

    pub fn working(&self) -> &MatrixSnapshot {
        &self.working
    }

    /// Working level for a cell.
    pub fn level(&self, page_url: &str, role_id: RoleId) -> AccessLevel {
        self.working
            .get(page_url)
            .and_then(|roles| roles.get(&role_id))
            .copied()
            .unwrap_or_default()
    }

    pub fn set(&mut self, page_url: impl Into<String>, role_id: RoleId, level: AccessLevel) {
        self.working
            .entry(page_url.into())
            .or_default()
            .insert(role_id, level);
    }

    /// Like [`set`](Self::set) but for an untyped level. Unknown tokens are rejected.
    pub fn set_str(&mut self, page_url: impl Into<String>, role_id: RoleId, level: &str) -> Result<()> {
        let level: AccessLevel = level.parse()?;
        self.set(page_url, role_id, level);
        Ok(())
    }

    /// Discard every unsaved edit. Does not touch the store.
    pub fn revert(&mut self) {
        self.working = self.baseline.clone();
    }

    pub fn diff(&self) -> Vec<RuleChange> {
        diff_snapshots(&self.baseline, &self.working)
    }

    pub fn has_unsaved_changes(&self) -> bool {
        !self.diff().is_empty()
    }

    /// Send the diff as one batch.
    ///
    /// On success the working copy becomes the new baseline. On failure the
    /// editor is left exactly as it was so the same edits can be retried.
    pub async fn commit<W>(&mut self, writer: &W) -> Result<CommitOutcome>
    where
        W: RuleBatchWriter + ?Sized,
    {
        let changes = self.diff();
        if changes.is_empty() {
            debug!("Matrix commit skipped: no changes");
            return Ok(CommitOutcome::NoChanges);
        }

        writer.write_batch(&changes).await?;

        self.baseline = self.working.clone();
        info!(changes = changes.len(), "Matrix changes committed");
        Ok(CommitOutcome::Committed {
            changes: changes.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AccessError, ErrorCode};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingWriter {
        batches: Mutex<Vec<Vec<RuleChange>>>,
        fail: bool,
    }

    #[async_trait]
    impl RuleBatchWriter for RecordingWriter {
        async fn write_batch(&self, changes: &[RuleChange]) -> Result<()> {
            if self.fail {
                return Err(AccessError::new(ErrorCode::DatabaseTransactionFailed, "boom"));
            }
            self.batches.lock().push(changes.to_vec());
            Ok(())
        }
    }

    fn baseline() -> MatrixSnapshot {
        let mut snapshot = MatrixSnapshot::new();
        snapshot
            .entry("/dashboard".into())
            .or_default()
            .insert(RoleId(2), AccessLevel::Read);
        snapshot
            .entry("/inventory".into())
            .or_default()
            .insert(RoleId(5), AccessLevel::Create);
        snapshot
    }

    #[test]
    fn test_missing_equals_none_in_diff() {
        let mut editor = MatrixEditor::new(baseline());
        editor.set("/accounting", RoleId(2), AccessLevel::None);
        assert!(editor.diff().is_empty());
        assert!(!editor.has_unsaved_changes());
    }

    #[test]
    fn test_diff_covers_union_of_cells() {
        let mut editor = MatrixEditor::new(baseline());
        editor.set("/accounting", RoleId(3), AccessLevel::Edit);
        editor.set("/dashboard", RoleId(2), AccessLevel::Edit);
        editor.working.remove("/inventory");

        let diff = editor.diff();
        assert_eq!(
            diff,
            vec![
                RuleChange::new("/accounting", RoleId(3), AccessLevel::Edit),
                RuleChange::new("/dashboard", RoleId(2), AccessLevel::Edit),
                RuleChange::new("/inventory", RoleId(5), AccessLevel::None),
            ]
        );
    }

    #[test]
    fn test_set_then_reset_is_clean() {
        let mut editor = MatrixEditor::new(baseline());
        editor.set("/dashboard", RoleId(2), AccessLevel::Create);
        assert!(editor.has_unsaved_changes());
        editor.set("/dashboard", RoleId(2), AccessLevel::Read);
        assert!(!editor.has_unsaved_changes());
    }

    #[test]
    fn test_revert_restores_baseline() {
        let mut editor = MatrixEditor::new(baseline());
        editor.set("/dashboard", RoleId(2), AccessLevel::Create);
        editor.revert();
        assert_eq!(editor.working(), editor.baseline());
        assert_eq!(editor.level("/dashboard", RoleId(2)), AccessLevel::Read);
    }

    #[test]
    fn test_set_str_rejects_unknown_level() {
        let mut editor = MatrixEditor::new(baseline());
        assert!(editor.set_str("/dashboard", RoleId(2), "view").is_err());
        assert!(!editor.has_unsaved_changes());
    }

    #[tokio::test]
    async fn test_empty_diff_sends_nothing() {
        let writer = RecordingWriter::default();
        let mut editor = MatrixEditor::new(baseline());

        let outcome = editor.commit(&writer).await.unwrap();
        assert_eq!(outcome, CommitOutcome::NoChanges);
        assert!(writer.batches.lock().is_empty());
    }

    #[tokio::test]
    async fn test_commit_moves_baseline() {
        let writer = RecordingWriter::default();
        let mut editor = MatrixEditor::new(baseline());
        editor.set("/accounting", RoleId(2), AccessLevel::Read);

        let outcome = editor.commit(&writer).await.unwrap();
        assert_eq!(outcome, CommitOutcome::Committed { changes: 1 });
        assert_eq!(writer.batches.lock().len(), 1);
        assert!(!editor.has_unsaved_changes());
        assert_eq!(editor.baseline()["/accounting"][&RoleId(2)], AccessLevel::Read);
    }

    #[tokio::test]
    async fn test_failed_commit_keeps_unsaved_state() {
        let writer = RecordingWriter {
            fail: true,
            ..Default::default()
        };
        let mut editor = MatrixEditor::new(baseline());
        editor.set("/accounting", RoleId(2), AccessLevel::Read);

        assert!(editor.commit(&writer).await.is_err());
        assert!(editor.has_unsaved_changes());
        assert_eq!(editor.level("/accounting", RoleId(2)), AccessLevel::Read);
        assert!(editor.baseline().get("/accounting").is_none());
    }
}
