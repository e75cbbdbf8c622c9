//! Drift detection across the three stores.
//!
//! The checker is read-only: it never mutates the filesystem, the record
//! store, or git, and it does not take the session lock. Repair is a human
//! decision; the report tells them where to look.

use crate::error::Result;
use crate::git::{FileStatus, GitRepo};
use crate::paths;
use crate::store::EntityStore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// A file under the managed tree with no document record, whether or
    /// not git tracks it yet.
    UnregisteredFile,
    /// A document record whose file is gone from the working tree.
    OrphanedRecord,
    /// A registered document with uncommitted local edits.
    ModifiedDocument,
    /// A feature or story record pointing at a path that does not exist.
    MissingEntityPath,
}

impl IssueKind {
    pub fn severity(self) -> IssueSeverity {
        match self {
            IssueKind::UnregisteredFile | IssueKind::ModifiedDocument => IssueSeverity::Warning,
            IssueKind::OrphanedRecord | IssueKind::MissingEntityPath => IssueSeverity::Error,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsistencyIssue {
    pub kind: IssueKind,
    pub severity: IssueSeverity,
    /// Repo-relative path the issue concerns.
    pub path: String,
    pub detail: String,
}

impl ConsistencyIssue {
    fn new(kind: IssueKind, path: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.severity(),
            path: path.into(),
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsistencyReport {
    pub issues: Vec<ConsistencyIssue>,
}

impl ConsistencyReport {
    pub fn is_consistent(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.issues
            .iter()
            .any(|i| i.severity == IssueSeverity::Error)
    }
}

// ---------------------------------------------------------------------------
// ConsistencyChecker
// ---------------------------------------------------------------------------

pub struct ConsistencyChecker<'a> {
    root: &'a Path,
    git: &'a GitRepo,
    store: &'a EntityStore,
}

impl<'a> ConsistencyChecker<'a> {
    pub fn new(root: &'a Path, git: &'a GitRepo, store: &'a EntityStore) -> Self {
        Self { root, git, store }
    }

    /// Compare git's view of the managed tree, the record store, and the
    /// working tree; collect every mismatch.
    pub fn run(&self) -> Result<ConsistencyReport> {
        self.run_for(None)
    }

    /// Like [`run`](Self::run), restricted to one feature's subtree.
    pub fn run_for(&self, feature: Option<&str>) -> Result<ConsistencyReport> {
        let mut report = ConsistencyReport::default();
        self.check_documents(feature, &mut report)?;
        self.check_entity_paths(feature, &mut report)?;
        Ok(report)
    }

    fn check_documents(&self, feature: Option<&str>, report: &mut ConsistencyReport) -> Result<()> {
        let registered: BTreeSet<String> = self
            .store
            .list_documents(feature)?
            .iter()
            .map(|d| d.path.clone())
            .collect();

        let prefix = match feature {
            Some(name) => paths::feature_rel_path(name),
            None => paths::FEATURES_DIR.to_string(),
        };

        // Every file under the managed tree, committed or not. Placeholder
        // files exist only so git tracks empty directories; they are never
        // registered.
        let mut on_disk = BTreeSet::new();
        on_disk.extend(self.git.ls_files(&prefix)?);
        on_disk.extend(self.git.untracked_files(&prefix)?);
        for path in on_disk {
            if path.ends_with(".gitkeep") || registered.contains(&path) {
                continue;
            }
            report.issues.push(ConsistencyIssue::new(
                IssueKind::UnregisteredFile,
                path,
                "file under the managed tree has no document record",
            ));
        }

        for doc in self.store.list_documents(feature)? {
            match self.git.file_status(&doc.path)? {
                FileStatus::Deleted => {
                    report.issues.push(ConsistencyIssue::new(
                        IssueKind::OrphanedRecord,
                        doc.path,
                        "document record points at a deleted file",
                    ));
                }
                FileStatus::Modified | FileStatus::Staged => {
                    report.issues.push(ConsistencyIssue::new(
                        IssueKind::ModifiedDocument,
                        doc.path,
                        "document has uncommitted local edits",
                    ));
                }
                FileStatus::Untracked => {
                    report.issues.push(ConsistencyIssue::new(
                        IssueKind::ModifiedDocument,
                        doc.path,
                        "document exists but was never committed",
                    ));
                }
                FileStatus::Clean => {}
            }
        }
        Ok(())
    }

    fn check_entity_paths(
        &self,
        only_feature: Option<&str>,
        report: &mut ConsistencyReport,
    ) -> Result<()> {
        for feature in self.store.list_features(None)? {
            if let Some(name) = only_feature {
                if feature.name != name {
                    continue;
                }
            }
            if !self.root.join(&feature.path).is_dir() {
                report.issues.push(ConsistencyIssue::new(
                    IssueKind::MissingEntityPath,
                    feature.path.clone(),
                    format!("feature '{}' has no directory on disk", feature.name),
                ));
            }
            for story in self.store.list_stories(&feature.name, None)? {
                if !self.root.join(&story.file_path).is_file() {
                    report.issues.push(ConsistencyIssue::new(
                        IssueKind::MissingEntityPath,
                        story.file_path.clone(),
                        format!(
                            "story {}/{} has no file on disk",
                            feature.name,
                            story.story_id()
                        ),
                    ));
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
