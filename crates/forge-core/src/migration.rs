//! Multi-step structural migrations on a dedicated branch.
//!
//! A migration runs its steps on `migration/<name>`, each step committing
//! independently through the atomic operation manager. On success the
//! branch is merged back with an explicit merge commit; on any step
//! failure the branch is abandoned and deleted, and the record store is
//! restored from a snapshot taken before the first step, leaving the
//! original branch byte-identical to its pre-migration state.

use crate::atomic::StateManager;
use crate::error::{ForgeError, Result};
use crate::git::GitRepo;
use crate::paths;
use crate::store::EntityStore;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// MigrationStep
// ---------------------------------------------------------------------------

/// One unit of a migration. Steps mutate state exclusively through the
/// [`StateManager`] they are handed, so each step is individually atomic;
/// the coordinator makes the whole sequence all-or-nothing.
pub trait MigrationStep {
    fn id(&self) -> &str;
    fn run(&self, manager: &StateManager) -> Result<()>;
}

// ---------------------------------------------------------------------------
// MigrationReport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationReport {
    pub name: String,
    pub branch: String,
    pub original_branch: String,
    pub completed_steps: Vec<String>,
    /// Short SHA of the merge commit on the original branch.
    pub merge_sha: String,
}

// ---------------------------------------------------------------------------
// MigrationCoordinator
// ---------------------------------------------------------------------------

pub struct MigrationCoordinator {
    name: String,
}

impl MigrationCoordinator {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn branch_name(&self) -> String {
        format!("migration/{}", self.name)
    }

    /// Run `steps` in order on a dedicated branch rooted at `root`.
    ///
    /// The coordinator opens its own manager for the steps; the caller
    /// must not hold one open on the same workspace, as concurrent writers
    /// are outside the locking model of individual operations.
    pub fn run(&self, root: &Path, steps: &[Box<dyn MigrationStep>]) -> Result<MigrationReport> {
        paths::validate_name(&self.name)?;

        let git = GitRepo::open(root)?;
        if !git.is_clean()? {
            return Err(ForgeError::Validation("working tree not clean".to_string()));
        }

        let branch = self.branch_name();
        if git.branch_exists(&branch)? {
            return Err(ForgeError::DuplicateEntity {
                kind: "migration branch",
                id: branch,
            });
        }
        let original_branch = git.current_branch()?;

        // Snapshot the record store; git cannot restore it for us since
        // the metadata directory is ignored.
        let db_path = paths::db_path(root);
        let backup_path = db_path.with_extension("db.bak");
        {
            let store = EntityStore::open(&db_path)?;
            store.checkpoint_wal()?;
        }
        std::fs::copy(&db_path, &backup_path)?;

        git.create_branch(&branch, true)?;
        tracing::info!(branch = %branch, steps = steps.len(), "migration started");

        let mut completed = Vec::new();
        let run_result = (|| -> Result<()> {
            let manager = StateManager::open(root)?;
            for step in steps {
                step.run(&manager)?;
                tracing::info!(step = step.id(), "migration step completed");
                completed.push(step.id().to_string());
            }
            Ok(())
        })();

        match run_result {
            Ok(()) => {
                git.checkout(&original_branch)?;
                git.merge(
                    &branch,
                    true,
                    Some(&format!("chore(forge): merge migration/{}", self.name)),
                )?;
                git.delete_branch(&branch, false)?;
                let _ = std::fs::remove_file(&backup_path);

                let merge_sha = git.head_sha(true)?;
                tracing::info!(branch = %branch, merge_sha = %merge_sha, "migration merged");
                Ok(MigrationReport {
                    name: self.name.clone(),
                    branch,
                    original_branch,
                    completed_steps: completed,
                    merge_sha,
                })
            }
            Err(cause) => {
                tracing::warn!(branch = %branch, cause = %cause, "migration failed; abandoning branch");
                self.abandon(&git, &original_branch, &branch, &db_path, &backup_path)
                    .map_err(|rollback_cause| ForgeError::CriticalInconsistency {
                        operation: format!("migration/{}", self.name),
                        cause: cause.to_string(),
                        rollback_cause: rollback_cause.to_string(),
                    })?;
                Err(ForgeError::OperationFailed {
                    operation: format!("migration/{}", self.name),
                    cause: cause.to_string(),
                })
            }
        }
    }

    fn abandon(
        &self,
        git: &GitRepo,
        original_branch: &str,
        branch: &str,
        db_path: &Path,
        backup_path: &Path,
    ) -> Result<()> {
        // A failed step has already rolled itself back, but its branch may
        // carry commits from earlier successful steps.
        git.reset_hard("HEAD")?;
        git.checkout(original_branch)?;
        git.delete_branch(branch, true)?;

        std::fs::copy(backup_path, db_path)?;
        // Leftover WAL/SHM files belong to the abandoned database state.
        let _ = std::fs::remove_file(db_path.with_extension("db-wal"));
        let _ = std::fs::remove_file(db_path.with_extension("db-shm"));
        std::fs::remove_file(backup_path)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atomic::init_workspace;
    use crate::types::{ScaleLevel, Scope};
    use std::process::Command;
    use tempfile::TempDir;

    fn git_available() -> bool {
        Command::new("git").arg("--version").output().is_ok()
    }

    fn run_git(root: &Path, args: &[&str]) {
        let status = Command::new("git")
            .arg("-C")
            .arg(root)
            .args(args)
            .status()
            .expect("run git");
        assert!(status.success(), "git command failed: {args:?}");
    }

    fn setup() -> TempDir {
        let dir = TempDir::new().unwrap();
        run_git(dir.path(), &["init", "-q", "-b", "main"]);
        run_git(dir.path(), &["config", "user.email", "test@example.com"]);
        run_git(dir.path(), &["config", "user.name", "Test"]);
        init_workspace(dir.path(), "demo").unwrap();
        dir
    }

    struct CreateFeature(&'static str);

    impl MigrationStep for CreateFeature {
        fn id(&self) -> &str {
            self.0
        }
        fn run(&self, manager: &StateManager) -> Result<()> {
            manager
                .create_feature(self.0, Scope::Feature, ScaleLevel::Sketch, "migrated", None)
                .map(|_| ())
        }
    }

    struct FailingStep;

    impl MigrationStep for FailingStep {
        fn id(&self) -> &str {
            "failing-step"
        }
        fn run(&self, _manager: &StateManager) -> Result<()> {
            Err(ForgeError::Validation("injected failure".to_string()))
        }
    }

    #[test]
    fn successful_migration_merges_with_merge_commit() {
        if !git_available() {
            return;
        }
        let dir = setup();
        let steps: Vec<Box<dyn MigrationStep>> =
            vec![Box::new(CreateFeature("alpha")), Box::new(CreateFeature("beta"))];

        let report = MigrationCoordinator::new("split-features")
            .run(dir.path(), &steps)
            .unwrap();
        assert_eq!(report.completed_steps, vec!["alpha", "beta"]);
        assert_eq!(report.original_branch, "main");

        let git = GitRepo::open(dir.path()).unwrap();
        assert_eq!(git.current_branch().unwrap(), "main");
        assert!(git.is_clean().unwrap());
        assert!(!git.branch_exists("migration/split-features").unwrap());

        let head = git.commit_info("HEAD").unwrap();
        assert_eq!(head.message, "chore(forge): merge migration/split-features");
        assert!(dir.path().join("docs/features/alpha/README.md").exists());
        assert!(dir.path().join("docs/features/beta/README.md").exists());

        let manager = StateManager::open(dir.path()).unwrap();
        assert!(manager.store().get_feature("alpha").unwrap().is_some());
        assert!(manager.store().get_feature("beta").unwrap().is_some());
    }

    #[test]
    fn failed_migration_leaves_original_branch_untouched() {
        if !git_available() {
            return;
        }
        let dir = setup();
        let git = GitRepo::open(dir.path()).unwrap();
        let head_before = git.head_sha(false).unwrap();

        let steps: Vec<Box<dyn MigrationStep>> =
            vec![Box::new(CreateFeature("alpha")), Box::new(FailingStep)];
        let err = MigrationCoordinator::new("doomed")
            .run(dir.path(), &steps)
            .unwrap_err();
        assert!(matches!(err, ForgeError::OperationFailed { .. }));

        // Branch gone, history unchanged, no stray files.
        assert_eq!(git.current_branch().unwrap(), "main");
        assert_eq!(git.head_sha(false).unwrap(), head_before);
        assert!(!git.branch_exists("migration/doomed").unwrap());
        assert!(git.is_clean().unwrap());
        assert!(!dir.path().join("docs/features/alpha").exists());

        // Record store restored from the pre-migration snapshot.
        let manager = StateManager::open(dir.path()).unwrap();
        assert!(manager.store().get_feature("alpha").unwrap().is_none());
    }

    #[test]
    fn dirty_tree_blocks_migration() {
        if !git_available() {
            return;
        }
        let dir = setup();
        std::fs::write(dir.path().join("scratch.txt"), "wip\n").unwrap();

        let steps: Vec<Box<dyn MigrationStep>> = vec![Box::new(CreateFeature("alpha"))];
        let err = MigrationCoordinator::new("blocked")
            .run(dir.path(), &steps)
            .unwrap_err();
        assert!(matches!(&err, ForgeError::Validation(msg) if msg == "working tree not clean"));
    }

    #[test]
    fn existing_migration_branch_is_rejected() {
        if !git_available() {
            return;
        }
        let dir = setup();
        let git = GitRepo::open(dir.path()).unwrap();
        git.create_branch("migration/taken", false).unwrap();

        let steps: Vec<Box<dyn MigrationStep>> = vec![Box::new(CreateFeature("alpha"))];
        let err = MigrationCoordinator::new("taken")
            .run(dir.path(), &steps)
            .unwrap_err();
        assert!(matches!(err, ForgeError::DuplicateEntity { .. }));
    }
}
