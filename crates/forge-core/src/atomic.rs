//! The atomic operation manager.
//!
//! Every mutation spans three stores: the filesystem (generated files),
//! the relational record store, and git history. [`StateManager`] applies
//! each mutation as a single all-or-nothing unit:
//!
//! 1. pre-flight checks (fail fast, zero side effects)
//! 2. checkpoint (current HEAD)
//! 3. file step
//! 4. record step
//! 5. commit step
//!
//! Any failure during steps 3-5 drives a rollback: created files removed,
//! inserted records deleted, HEAD hard-reset to the checkpoint. A rollback
//! that itself fails halts further automatic operations on this manager.
//!
//! Mutations are serialized by the session lock; this module is the only
//! place rollback logic lives.

use crate::config::Config;
use crate::error::{ForgeError, Result};
use crate::events::{Event, EventSink, LogSink, Notification, Severity};
use crate::git::GitRepo;
use crate::lock::SessionLock;
use crate::paths;
use crate::store::{DocumentRecord, EntityStore, Epic, Feature, Story};
use crate::structure::{
    epic_commit_message, feature_commit_message, story_commit_message,
    story_status_commit_message, BuildOutput, StructureBuilder,
};
use crate::template::{BuiltinTemplates, TemplateRenderer};
use crate::types::{ScaleLevel, Scope, StoryStatus};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

const STATUS_START: &str = "<!-- status -->";
const STATUS_END: &str = "<!-- /status -->";

// ---------------------------------------------------------------------------
// Workspace initialization
// ---------------------------------------------------------------------------

/// Create the `.forge/` metadata directory, record store, config, and
/// `docs/features/` tree, and commit the scaffold. Idempotent.
pub fn init_workspace(root: &Path, project: &str) -> Result<()> {
    let git = GitRepo::open(root)?;

    // The record store and lock must never dirty the working tree.
    let mut wrote = crate::io::ensure_gitignore_entry(root, ".forge/")?;

    EntityStore::open(&paths::db_path(root))?;
    if !paths::config_path(root).exists() {
        Config::new(project).save(root)?;
    }

    let keep_rel = format!("{}/.gitkeep", paths::FEATURES_DIR);
    wrote |= crate::io::write_if_missing(&root.join(&keep_rel), b"")?;

    if wrote {
        git.stage(&[".gitignore", keep_rel.as_str()])?;
        git.commit("chore(forge): initialize workspace")?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Rollback bookkeeping
// ---------------------------------------------------------------------------

/// Record-store undo actions, applied in reverse insertion order.
enum Undo {
    RemoveFeature(String),
    RemoveEpic(String, u32),
    RemoveStory(String, u32, u32),
    RemoveDocument(String),
    RestoreStoryStatus {
        feature: String,
        epic_number: u32,
        story_number: u32,
        status: StoryStatus,
    },
    RestoreDocumentSha {
        path: String,
        sha: Option<String>,
    },
}

/// Everything a mid-operation failure needs undone, accumulated as the
/// operation makes progress.
#[derive(Default)]
struct OpTrace {
    /// Repo-relative files created by this operation.
    files: Vec<String>,
    /// Repo-relative directories created by this operation, deepest first.
    dirs: Vec<String>,
    undos: Vec<Undo>,
}

impl OpTrace {
    fn absorb_build(&mut self, out: &BuildOutput) {
        self.files.extend(out.created_files.iter().cloned());
        self.dirs.extend(out.created_dirs.iter().cloned());
    }
}

// ---------------------------------------------------------------------------
// StateManager
// ---------------------------------------------------------------------------

pub struct StateManager {
    root: PathBuf,
    git: GitRepo,
    store: EntityStore,
    templates: Box<dyn TemplateRenderer>,
    events: Box<dyn EventSink>,
    lock: SessionLock,
    default_owner: String,
    halted: AtomicBool,
}

impl StateManager {
    /// Open an initialized workspace with the default template set and
    /// log-based event sink.
    pub fn open(root: &Path) -> Result<Self> {
        Self::open_with(root, Box::new(BuiltinTemplates), Box::new(LogSink))
    }

    /// Open with caller-supplied collaborators (template service, event
    /// sink).
    pub fn open_with(
        root: &Path,
        templates: Box<dyn TemplateRenderer>,
        events: Box<dyn EventSink>,
    ) -> Result<Self> {
        let cfg = Config::load(root)?;
        let git = GitRepo::open(root)?;
        let store = EntityStore::open(&paths::db_path(root))?;
        let lock = SessionLock::new(
            root,
            Duration::from_millis(cfg.lock.timeout_ms),
            Duration::from_millis(cfg.lock.stale_after_ms),
        );
        Ok(Self {
            root: root.to_path_buf(),
            git,
            store,
            templates,
            events,
            lock,
            default_owner: cfg.default_owner,
            halted: AtomicBool::new(false),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn git(&self) -> &GitRepo {
        &self.git
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    /// True once a failed rollback has halted automatic mutation.
    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    /// Operator override after manual repair.
    pub fn clear_halt(&self) {
        self.halted.store(false, Ordering::SeqCst);
    }

    // -----------------------------------------------------------------------
    // Public operations
    // -----------------------------------------------------------------------

    pub fn create_feature(
        &self,
        name: &str,
        scope: Scope,
        scale_level: ScaleLevel,
        description: &str,
        owner: Option<&str>,
    ) -> Result<Feature> {
        let _guard = self.lock.acquire()?;
        self.ensure_not_halted()?;

        // Pre-flight: zero side effects on failure.
        self.ensure_clean_tree()?;
        paths::validate_name(name)?;
        if self.store.get_feature(name)?.is_some() {
            return Err(ForgeError::DuplicateEntity {
                kind: "feature",
                id: name.to_string(),
            });
        }
        let feature_dir = paths::feature_dir(&self.root, name);
        if feature_dir.exists() {
            return Err(ForgeError::Validation(format!(
                "path already exists: {}",
                feature_dir.display()
            )));
        }

        let checkpoint = self.git.head_sha(true)?;
        let owner = owner.unwrap_or(&self.default_owner);

        let mut trace = OpTrace::default();
        let result = self.create_feature_inner(
            name,
            scope,
            scale_level,
            description,
            owner,
            &mut trace,
        );

        match result {
            Ok((feature, sha)) => {
                self.notify_created("feature", &feature.name, &feature.path, &sha);
                Ok(feature)
            }
            Err(cause) => Err(self.rollback("create_feature", name, &checkpoint, trace, cause)),
        }
    }

    fn create_feature_inner(
        &self,
        name: &str,
        scope: Scope,
        scale_level: ScaleLevel,
        description: &str,
        owner: &str,
        trace: &mut OpTrace,
    ) -> Result<(Feature, String)> {
        // File step.
        let builder = StructureBuilder::new(&self.root, &self.git, self.templates.as_ref());
        let out = builder.build_feature_layout(name, scope, scale_level, description, false)?;
        trace.absorb_build(&out);

        // Record step.
        let feature = Feature::new(name, scope, scale_level, description, owner);
        self.store.create_feature(&feature)?;
        trace.undos.push(Undo::RemoveFeature(name.to_string()));

        let registered_at = Utc::now();
        for doc in &out.documents {
            self.store.register_document(&DocumentRecord {
                path: doc.path.clone(),
                doc_type: doc.doc_type,
                feature: doc.feature.clone(),
                scale_level: doc.scale_level,
                epic_number: doc.epic_number,
                registered_at,
                last_commit_sha: None,
            })?;
            trace.undos.push(Undo::RemoveDocument(doc.path.clone()));
        }

        // Commit step.
        self.git.stage_all()?;
        let sha = self
            .git
            .commit(&feature_commit_message(name, scope, scale_level, description))?;
        for doc in &out.documents {
            self.store.set_document_commit(&doc.path, &sha)?;
        }

        Ok((feature, sha))
    }

    pub fn create_epic(
        &self,
        feature_name: &str,
        title: &str,
        points: u32,
        epic_number: Option<u32>,
    ) -> Result<Epic> {
        let _guard = self.lock.acquire()?;
        self.ensure_not_halted()?;

        self.ensure_clean_tree()?;
        let feature = self
            .store
            .get_feature(feature_name)?
            .ok_or_else(|| ForgeError::NotFound {
                kind: "feature",
                id: feature_name.to_string(),
            })?;
        let number = match epic_number {
            Some(n) => n,
            None => self.store.max_epic_number(feature_name)? + 1,
        };
        if self.store.get_epic(feature_name, number)?.is_some() {
            return Err(ForgeError::DuplicateEntity {
                kind: "epic",
                id: format!("{feature_name}/{number}"),
            });
        }
        let epic_path = paths::epic_file(&self.root, feature_name, number);
        if epic_path.exists() {
            return Err(ForgeError::Validation(format!(
                "path already exists: {}",
                epic_path.display()
            )));
        }

        let checkpoint = self.git.head_sha(true)?;
        let mut trace = OpTrace::default();
        let result =
            self.create_epic_inner(&feature, number, title, points, &mut trace);

        match result {
            Ok((epic, sha)) => {
                let id = format!("{feature_name}/{number}");
                self.notify_created("epic", &id, &paths::epic_rel_path(feature_name, number), &sha);
                Ok(epic)
            }
            Err(cause) => Err(self.rollback(
                "create_epic",
                &format!("{feature_name}/{number}"),
                &checkpoint,
                trace,
                cause,
            )),
        }
    }

    fn create_epic_inner(
        &self,
        feature: &Feature,
        number: u32,
        title: &str,
        points: u32,
        trace: &mut OpTrace,
    ) -> Result<(Epic, String)> {
        let builder = StructureBuilder::new(&self.root, &self.git, self.templates.as_ref());
        let out = builder.build_epic_layout(
            &feature.name,
            number,
            title,
            points,
            feature.scale_level,
            false,
        )?;
        trace.absorb_build(&out);

        let epic = Epic {
            feature: feature.name.clone(),
            epic_number: number,
            title: title.to_string(),
            status: StoryStatus::Todo,
            points,
        };
        self.store.create_epic(&epic)?;
        trace
            .undos
            .push(Undo::RemoveEpic(feature.name.clone(), number));

        let registered_at = Utc::now();
        for doc in &out.documents {
            self.store.register_document(&DocumentRecord {
                path: doc.path.clone(),
                doc_type: doc.doc_type,
                feature: doc.feature.clone(),
                scale_level: doc.scale_level,
                epic_number: doc.epic_number,
                registered_at,
                last_commit_sha: None,
            })?;
            trace.undos.push(Undo::RemoveDocument(doc.path.clone()));
        }

        self.git.stage_all()?;
        let sha = self
            .git
            .commit(&epic_commit_message(&feature.name, number, title))?;
        for doc in &out.documents {
            self.store.set_document_commit(&doc.path, &sha)?;
        }

        Ok((epic, sha))
    }

    pub fn create_story(
        &self,
        feature_name: &str,
        epic_number: u32,
        title: &str,
        points: u32,
    ) -> Result<Story> {
        let _guard = self.lock.acquire()?;
        self.ensure_not_halted()?;

        self.ensure_clean_tree()?;
        let feature = self
            .store
            .get_feature(feature_name)?
            .ok_or_else(|| ForgeError::NotFound {
                kind: "feature",
                id: feature_name.to_string(),
            })?;
        if self.store.get_epic(feature_name, epic_number)?.is_none() {
            return Err(ForgeError::NotFound {
                kind: "epic",
                id: format!("{feature_name}/{epic_number}"),
            });
        }
        let number = self.store.max_story_number(feature_name, epic_number)? + 1;
        let story_path = paths::story_file(&self.root, feature_name, epic_number, number);
        if story_path.exists() {
            return Err(ForgeError::Validation(format!(
                "path already exists: {}",
                story_path.display()
            )));
        }

        let checkpoint = self.git.head_sha(true)?;
        let mut trace = OpTrace::default();
        let result =
            self.create_story_inner(&feature, epic_number, number, title, points, &mut trace);

        match result {
            Ok((story, sha)) => {
                let id = format!("{feature_name}/{epic_number}.{number}");
                self.notify_created("story", &id, &story.file_path, &sha);
                Ok(story)
            }
            Err(cause) => Err(self.rollback(
                "create_story",
                &format!("{feature_name}/{epic_number}.{number}"),
                &checkpoint,
                trace,
                cause,
            )),
        }
    }

    fn create_story_inner(
        &self,
        feature: &Feature,
        epic_number: u32,
        story_number: u32,
        title: &str,
        points: u32,
        trace: &mut OpTrace,
    ) -> Result<(Story, String)> {
        let builder = StructureBuilder::new(&self.root, &self.git, self.templates.as_ref());
        let out = builder.build_story_layout(
            &feature.name,
            epic_number,
            story_number,
            title,
            points,
            feature.scale_level,
            false,
        )?;
        trace.absorb_build(&out);

        let story = Story {
            feature: feature.name.clone(),
            epic_number,
            story_number,
            status: StoryStatus::Todo,
            points,
            file_path: paths::story_rel_path(&feature.name, epic_number, story_number),
        };
        self.store.create_story(&story)?;
        trace.undos.push(Undo::RemoveStory(
            feature.name.clone(),
            epic_number,
            story_number,
        ));

        let registered_at = Utc::now();
        for doc in &out.documents {
            self.store.register_document(&DocumentRecord {
                path: doc.path.clone(),
                doc_type: doc.doc_type,
                feature: doc.feature.clone(),
                scale_level: doc.scale_level,
                epic_number: doc.epic_number,
                registered_at,
                last_commit_sha: None,
            })?;
            trace.undos.push(Undo::RemoveDocument(doc.path.clone()));
        }

        self.git.stage_all()?;
        let sha = self.git.commit(&story_commit_message(
            &feature.name,
            epic_number,
            story_number,
            title,
        ))?;
        for doc in &out.documents {
            self.store.set_document_commit(&doc.path, &sha)?;
        }

        Ok((story, sha))
    }

    /// Transition a story to a new status, editing the story file and the
    /// record in one atomic unit.
    pub fn set_story_status(
        &self,
        feature_name: &str,
        epic_number: u32,
        story_number: u32,
        status: StoryStatus,
    ) -> Result<Story> {
        let _guard = self.lock.acquire()?;
        self.ensure_not_halted()?;

        self.ensure_clean_tree()?;
        let story = self
            .store
            .get_story(feature_name, epic_number, story_number)?
            .ok_or_else(|| ForgeError::NotFound {
                kind: "story",
                id: format!("{feature_name}/{epic_number}.{story_number}"),
            })?;
        if story.status == status {
            return Err(ForgeError::Validation(format!(
                "story {} already has status {status}",
                story.story_id()
            )));
        }

        let checkpoint = self.git.head_sha(true)?;
        let mut trace = OpTrace::default();
        let result = self.set_story_status_inner(&story, status, &mut trace);

        match result {
            Ok(updated) => {
                self.events.emit(Notification {
                    severity: Severity::Info,
                    event: Event::CommitCreated {
                        sha: updated.1,
                        message: story_status_commit_message(
                            feature_name,
                            epic_number,
                            story_number,
                            status.as_str(),
                        ),
                    },
                });
                Ok(updated.0)
            }
            Err(cause) => Err(self.rollback(
                "set_story_status",
                &format!("{feature_name}/{epic_number}.{story_number}"),
                &checkpoint,
                trace,
                cause,
            )),
        }
    }

    fn set_story_status_inner(
        &self,
        story: &Story,
        status: StoryStatus,
        trace: &mut OpTrace,
    ) -> Result<(Story, String)> {
        // File step: rewrite the status marker in place.
        let abs = self.root.join(&story.file_path);
        let changed =
            crate::io::replace_between_markers(&abs, STATUS_START, STATUS_END, status.as_str())?;
        if !changed {
            return Err(ForgeError::Validation(format!(
                "story file has no status markers: {}",
                story.file_path
            )));
        }

        // Record step.
        self.store.update_story_status(
            &story.feature,
            story.epic_number,
            story.story_number,
            status,
        )?;
        trace.undos.push(Undo::RestoreStoryStatus {
            feature: story.feature.clone(),
            epic_number: story.epic_number,
            story_number: story.story_number,
            status: story.status,
        });

        // Commit step.
        self.git.stage_all()?;
        let sha = self.git.commit(&story_status_commit_message(
            &story.feature,
            story.epic_number,
            story.story_number,
            status.as_str(),
        ))?;

        if let Some(doc) = self.store.get_document(&story.file_path)? {
            trace.undos.push(Undo::RestoreDocumentSha {
                path: doc.path.clone(),
                sha: doc.last_commit_sha.clone(),
            });
            self.store.set_document_commit(&doc.path, &sha)?;
        }

        let mut updated = story.clone();
        updated.status = status;
        Ok((updated, sha))
    }

    // -----------------------------------------------------------------------
    // Pre-flight helpers
    // -----------------------------------------------------------------------

    fn ensure_not_halted(&self) -> Result<()> {
        if self.is_halted() {
            return Err(ForgeError::Halted);
        }
        Ok(())
    }

    fn ensure_clean_tree(&self) -> Result<()> {
        if !self.git.is_clean()? {
            return Err(ForgeError::Validation("working tree not clean".to_string()));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Rollback
    // -----------------------------------------------------------------------

    /// Undo a partially applied operation. On success the returned error is
    /// `OperationFailed` (state restored, safe to retry); if the rollback
    /// itself fails the manager halts and returns `CriticalInconsistency`.
    fn rollback(
        &self,
        operation: &str,
        entity_id: &str,
        checkpoint: &str,
        trace: OpTrace,
        cause: ForgeError,
    ) -> ForgeError {
        tracing::warn!(
            operation,
            entity_id,
            checkpoint,
            cause = %cause,
            "operation failed; rolling back"
        );

        match self.rollback_inner(checkpoint, trace) {
            Ok(()) => {
                self.events.emit(Notification {
                    severity: Severity::Warning,
                    event: Event::EntityDeleted {
                        kind: operation.to_string(),
                        id: entity_id.to_string(),
                        reason: format!("rolled back: {cause}"),
                    },
                });
                ForgeError::OperationFailed {
                    operation: operation.to_string(),
                    cause: cause.to_string(),
                }
            }
            Err(rollback_cause) => {
                self.halted.store(true, Ordering::SeqCst);
                let err = ForgeError::CriticalInconsistency {
                    operation: operation.to_string(),
                    cause: cause.to_string(),
                    rollback_cause: rollback_cause.to_string(),
                };
                tracing::error!(operation, entity_id, error = %err, "rollback failed; halting");
                self.events.emit(Notification {
                    severity: Severity::Critical,
                    event: Event::EntityDeleted {
                        kind: operation.to_string(),
                        id: entity_id.to_string(),
                        reason: err.to_string(),
                    },
                });
                err
            }
        }
    }

    fn rollback_inner(&self, checkpoint: &str, trace: OpTrace) -> Result<()> {
        // Remove files created by this operation; a hard reset alone would
        // leave never-committed files behind as untracked debris.
        for rel in &trace.files {
            match std::fs::remove_file(self.root.join(rel)) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        for rel in &trace.dirs {
            match std::fs::remove_dir_all(self.root.join(rel)) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        for undo in trace.undos.into_iter().rev() {
            let result = match undo {
                Undo::RemoveFeature(name) => self.store.delete_feature(&name),
                Undo::RemoveEpic(feature, n) => self.store.delete_epic(&feature, n),
                Undo::RemoveStory(feature, e, s) => self.store.delete_story(&feature, e, s),
                Undo::RemoveDocument(path) => self.store.delete_document(&path),
                Undo::RestoreStoryStatus {
                    feature,
                    epic_number,
                    story_number,
                    status,
                } => self
                    .store
                    .update_story_status(&feature, epic_number, story_number, status),
                Undo::RestoreDocumentSha { path, sha } => match sha {
                    Some(sha) => self.store.set_document_commit(&path, &sha),
                    // No way to null the column through the public API is
                    // needed; re-registration only happens on create paths.
                    None => Ok(()),
                },
            };
            match result {
                Ok(()) => {}
                // Already absent is the desired end state.
                Err(ForgeError::NotFound { .. }) => {}
                Err(e) => return Err(e),
            }
        }

        self.git.reset_hard(checkpoint)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    fn notify_created(&self, kind: &str, id: &str, path: &str, sha: &str) {
        self.events.emit(Notification {
            severity: Severity::Info,
            event: Event::EntityCreated {
                kind: kind.to_string(),
                id: id.to_string(),
                path: path.to_string(),
            },
        });
        let message = self
            .git
            .commit_info(sha)
            .map(|info| info.message)
            .unwrap_or_default();
        self.events.emit(Notification {
            severity: Severity::Info,
            event: Event::CommitCreated {
                sha: sha.to_string(),
                message,
            },
        });
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
