//! Builds the on-disk folder/file layout for features, epics, and stories
//! from the scale-level template set.
//!
//! The builder only touches the filesystem (and, when `auto_commit` is
//! set, git). It never writes to the entity store: document registrations
//! are queued on the returned [`BuildOutput`] for the caller to apply.

use crate::error::{ForgeError, Result};
use crate::git::GitRepo;
use crate::io;
use crate::paths;
use crate::template::{TemplateId, TemplateRenderer};
use crate::types::{DocType, ScaleLevel, Scope};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// A document registration queued by the builder, to be inserted into the
/// entity store by whoever owns the transaction.
#[derive(Debug, Clone)]
pub struct PendingDocument {
    /// Repo-relative path.
    pub path: String,
    pub doc_type: DocType,
    pub feature: String,
    pub scale_level: ScaleLevel,
    pub epic_number: Option<u32>,
}

#[derive(Debug)]
pub struct BuildOutput {
    /// Absolute path of the unit's top-level directory.
    pub root_path: PathBuf,
    /// Repo-relative paths of every file written, `.gitkeep` included.
    pub created_files: Vec<String>,
    /// Repo-relative paths of directories this build newly created,
    /// deepest first (safe removal order for rollback).
    pub created_dirs: Vec<String>,
    pub documents: Vec<PendingDocument>,
    /// Short SHA of the commit, when `auto_commit` was requested.
    pub commit_sha: Option<String>,
}

// ---------------------------------------------------------------------------
// Commit messages
// ---------------------------------------------------------------------------

/// Conventional-commit message for a feature scaffold. Always machine
/// generated; the body carries the structured scope/scale/description block.
pub fn feature_commit_message(
    name: &str,
    scope: Scope,
    scale_level: ScaleLevel,
    description: &str,
) -> String {
    format!(
        "feat({name}): create feature scaffold\n\n\
         Scope: {scope}\nScale-Level: {scale_level}\nDescription: {description}\n"
    )
}

pub fn epic_commit_message(feature: &str, epic_number: u32, title: &str) -> String {
    format!("feat({feature}): add epic {epic_number}\n\nTitle: {title}\n")
}

pub fn story_commit_message(
    feature: &str,
    epic_number: u32,
    story_number: u32,
    title: &str,
) -> String {
    format!("feat({feature}): add story {epic_number}.{story_number}\n\nTitle: {title}\n")
}

pub fn story_status_commit_message(
    feature: &str,
    epic_number: u32,
    story_number: u32,
    status: &str,
) -> String {
    format!("chore({feature}): story {epic_number}.{story_number} status -> {status}\n")
}

// ---------------------------------------------------------------------------
// StructureBuilder
// ---------------------------------------------------------------------------

pub struct StructureBuilder<'a> {
    root: &'a Path,
    git: &'a GitRepo,
    templates: &'a dyn TemplateRenderer,
}

impl<'a> StructureBuilder<'a> {
    pub fn new(root: &'a Path, git: &'a GitRepo, templates: &'a dyn TemplateRenderer) -> Self {
        Self {
            root,
            git,
            templates,
        }
    }

    /// Create the folder/file set for a feature at the given scale level.
    ///
    /// The file set is monotonic: level N always produces a superset of
    /// level N-1. Fails if the feature directory already exists.
    pub fn build_feature_layout(
        &self,
        name: &str,
        scope: Scope,
        scale_level: ScaleLevel,
        description: &str,
        auto_commit: bool,
    ) -> Result<BuildOutput> {
        let feature_dir = paths::feature_dir(self.root, name);
        if feature_dir.exists() {
            return Err(ForgeError::Validation(format!(
                "path already exists: {}",
                feature_dir.display()
            )));
        }

        let level_str = scale_level.to_string();
        let vars: Vec<(&str, &str)> = vec![
            ("feature", name),
            ("scope", scope.as_str()),
            ("scale_level", &level_str),
            ("description", description),
        ];

        let mut out = BuildOutput {
            root_path: feature_dir.clone(),
            created_files: Vec::new(),
            created_dirs: Vec::new(),
            documents: Vec::new(),
            commit_sha: None,
        };

        io::ensure_dir(&feature_dir)?;
        out.created_dirs.push(paths::feature_rel_path(name));

        for (filename, template, doc_type) in documents_for(scale_level) {
            let text = self.templates.render(template, &vars)?;
            let rel = format!("{}/{filename}", paths::feature_rel_path(name));
            io::atomic_write(&self.root.join(&rel), text.as_bytes())?;
            out.created_files.push(rel.clone());
            out.documents.push(PendingDocument {
                path: rel,
                doc_type,
                feature: name.to_string(),
                scale_level,
                epic_number: None,
            });
        }

        for subdir in subdirs_for(scale_level) {
            let rel_dir = format!("{}/{subdir}", paths::feature_rel_path(name));
            io::ensure_dir(&self.root.join(&rel_dir))?;
            // Git cannot track empty directories; keep a placeholder file.
            let keep = format!("{rel_dir}/.gitkeep");
            io::atomic_write(&self.root.join(&keep), b"")?;
            out.created_files.push(keep);
            out.created_dirs.insert(0, rel_dir);
        }

        if auto_commit {
            self.git.stage(&[&paths::feature_rel_path(name)])?;
            let message = feature_commit_message(name, scope, scale_level, description);
            out.commit_sha = Some(self.git.commit(&message)?);
        }

        Ok(out)
    }

    /// Create the markdown file for an epic under `epics/`.
    ///
    /// Creates the `epics/` directory if the feature's scale level did not
    /// include it. Fails if the epic file already exists.
    pub fn build_epic_layout(
        &self,
        feature: &str,
        epic_number: u32,
        title: &str,
        points: u32,
        scale_level: ScaleLevel,
        auto_commit: bool,
    ) -> Result<BuildOutput> {
        let epic_path = paths::epic_file(self.root, feature, epic_number);
        if epic_path.exists() {
            return Err(ForgeError::Validation(format!(
                "path already exists: {}",
                epic_path.display()
            )));
        }

        let mut out = BuildOutput {
            root_path: epic_path.clone(),
            created_files: Vec::new(),
            created_dirs: Vec::new(),
            documents: Vec::new(),
            commit_sha: None,
        };

        let epics_dir = format!("{}/{}", paths::feature_rel_path(feature), paths::EPICS_SUBDIR);
        if !self.root.join(&epics_dir).exists() {
            io::ensure_dir(&self.root.join(&epics_dir))?;
            out.created_dirs.push(epics_dir);
        }

        let number_str = epic_number.to_string();
        let points_str = points.to_string();
        let text = self.templates.render(
            TemplateId::Epic,
            &[
                ("epic_number", &number_str),
                ("title", title),
                ("feature", feature),
                ("points", &points_str),
            ],
        )?;
        let rel = paths::epic_rel_path(feature, epic_number);
        io::atomic_write(&epic_path, text.as_bytes())?;
        out.created_files.push(rel.clone());
        out.documents.push(PendingDocument {
            path: rel.clone(),
            doc_type: DocType::Epic,
            feature: feature.to_string(),
            scale_level,
            epic_number: Some(epic_number),
        });

        if auto_commit {
            self.git.stage(&[rel.as_str()])?;
            out.commit_sha = Some(
                self.git
                    .commit(&epic_commit_message(feature, epic_number, title))?,
            );
        }

        Ok(out)
    }

    /// Create the markdown file for a story under `stories/`.
    pub fn build_story_layout(
        &self,
        feature: &str,
        epic_number: u32,
        story_number: u32,
        title: &str,
        points: u32,
        scale_level: ScaleLevel,
        auto_commit: bool,
    ) -> Result<BuildOutput> {
        let story_path = paths::story_file(self.root, feature, epic_number, story_number);
        if story_path.exists() {
            return Err(ForgeError::Validation(format!(
                "path already exists: {}",
                story_path.display()
            )));
        }

        let mut out = BuildOutput {
            root_path: story_path.clone(),
            created_files: Vec::new(),
            created_dirs: Vec::new(),
            documents: Vec::new(),
            commit_sha: None,
        };

        let stories_dir = format!(
            "{}/{}",
            paths::feature_rel_path(feature),
            paths::STORIES_SUBDIR
        );
        if !self.root.join(&stories_dir).exists() {
            io::ensure_dir(&self.root.join(&stories_dir))?;
            out.created_dirs.push(stories_dir);
        }

        let story_id = format!("{epic_number}.{story_number}");
        let epic_str = epic_number.to_string();
        let points_str = points.to_string();
        let text = self.templates.render(
            TemplateId::Story,
            &[
                ("story_id", &story_id),
                ("title", title),
                ("feature", feature),
                ("epic_number", &epic_str),
                ("points", &points_str),
            ],
        )?;
        let rel = paths::story_rel_path(feature, epic_number, story_number);
        io::atomic_write(&story_path, text.as_bytes())?;
        out.created_files.push(rel.clone());
        out.documents.push(PendingDocument {
            path: rel.clone(),
            doc_type: DocType::Story,
            feature: feature.to_string(),
            scale_level,
            epic_number: Some(epic_number),
        });

        if auto_commit {
            self.git.stage(&[rel.as_str()])?;
            out.commit_sha = Some(self.git.commit(&story_commit_message(
                feature,
                epic_number,
                story_number,
                title,
            ))?);
        }

        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Scale-level template sets (cumulative)
// ---------------------------------------------------------------------------

fn documents_for(level: ScaleLevel) -> Vec<(&'static str, TemplateId, DocType)> {
    let mut docs = vec![("README.md", TemplateId::Readme, DocType::Readme)];
    if level >= ScaleLevel::Minimal {
        docs.push(("PRD.md", TemplateId::Prd, DocType::Prd));
    }
    if level >= ScaleLevel::Standard {
        docs.push((
            "ARCHITECTURE.md",
            TemplateId::Architecture,
            DocType::Architecture,
        ));
        docs.push(("CHANGELOG.md", TemplateId::Changelog, DocType::Changelog));
    }
    if level >= ScaleLevel::Full {
        docs.push((
            "MIGRATION_GUIDE.md",
            TemplateId::MigrationGuide,
            DocType::MigrationGuide,
        ));
    }
    docs
}

fn subdirs_for(level: ScaleLevel) -> Vec<&'static str> {
    let mut dirs = Vec::new();
    if level >= ScaleLevel::Standard {
        dirs.extend([
            paths::EPICS_SUBDIR,
            paths::STORIES_SUBDIR,
            paths::QA_SUBDIR,
        ]);
    }
    if level >= ScaleLevel::Extended {
        dirs.push(paths::RETROSPECTIVES_SUBDIR);
    }
    if level >= ScaleLevel::Full {
        dirs.push(paths::CEREMONIES_SUBDIR);
    }
    dirs
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
