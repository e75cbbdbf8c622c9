use crate::error::{ForgeError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const FORGE_DIR: &str = ".forge";
pub const DB_FILE: &str = ".forge/state.db";
pub const CONFIG_FILE: &str = ".forge/config.yaml";
pub const LOCK_FILE: &str = ".forge/session.lock";

pub const FEATURES_DIR: &str = "docs/features";

pub const EPICS_SUBDIR: &str = "epics";
pub const STORIES_SUBDIR: &str = "stories";
pub const QA_SUBDIR: &str = "QA";
pub const RETROSPECTIVES_SUBDIR: &str = "retrospectives";
pub const CEREMONIES_SUBDIR: &str = "ceremonies";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn forge_dir(root: &Path) -> PathBuf {
    root.join(FORGE_DIR)
}

pub fn db_path(root: &Path) -> PathBuf {
    root.join(DB_FILE)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn lock_path(root: &Path) -> PathBuf {
    root.join(LOCK_FILE)
}

pub fn features_dir(root: &Path) -> PathBuf {
    root.join(FEATURES_DIR)
}

pub fn feature_dir(root: &Path, name: &str) -> PathBuf {
    features_dir(root).join(name)
}

/// Repo-relative feature path, as stored on the Feature record and used in
/// document registrations.
pub fn feature_rel_path(name: &str) -> String {
    format!("{FEATURES_DIR}/{name}")
}

pub fn epic_file(root: &Path, feature: &str, epic_number: u32) -> PathBuf {
    feature_dir(root, feature)
        .join(EPICS_SUBDIR)
        .join(format!("epic-{epic_number:03}.md"))
}

pub fn epic_rel_path(feature: &str, epic_number: u32) -> String {
    format!("{FEATURES_DIR}/{feature}/{EPICS_SUBDIR}/epic-{epic_number:03}.md")
}

pub fn story_file(root: &Path, feature: &str, epic_number: u32, story_number: u32) -> PathBuf {
    feature_dir(root, feature)
        .join(STORIES_SUBDIR)
        .join(format!("story-{epic_number}.{story_number}.md"))
}

pub fn story_rel_path(feature: &str, epic_number: u32, story_number: u32) -> String {
    format!("{FEATURES_DIR}/{feature}/{STORIES_SUBDIR}/story-{epic_number}.{story_number}.md")
}

// ---------------------------------------------------------------------------
// Name validation
// ---------------------------------------------------------------------------

static NAME_RE: OnceLock<Regex> = OnceLock::new();

fn name_re() -> &'static Regex {
    NAME_RE.get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9\-]*[a-z0-9]$|^[a-z0-9]$").unwrap())
}

/// Feature names are kebab-case and globally unique. Double hyphens are
/// rejected so names map cleanly onto single filesystem path segments.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > 64 || name.contains("--") || !name_re().is_match(name) {
        return Err(ForgeError::InvalidName(name.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_names() {
        for name in ["user-auth", "a", "payments-v2", "x1"] {
            validate_name(name).unwrap_or_else(|_| panic!("expected valid: {name}"));
        }
    }

    #[test]
    fn invalid_names() {
        for name in [
            "",
            "-leading-dash",
            "trailing-dash-",
            "has spaces",
            "UpperCase",
            "under_score",
            "double--dash",
        ] {
            assert!(validate_name(name).is_err(), "expected invalid: {name}");
        }
    }

    #[test]
    fn name_length_limit() {
        let long = "a".repeat(65);
        assert!(validate_name(&long).is_err());
        let ok = "a".repeat(64);
        validate_name(&ok).unwrap();
    }

    #[test]
    fn path_helpers() {
        let root = Path::new("/tmp/proj");
        assert_eq!(db_path(root), PathBuf::from("/tmp/proj/.forge/state.db"));
        assert_eq!(
            feature_dir(root, "user-auth"),
            PathBuf::from("/tmp/proj/docs/features/user-auth")
        );
        assert_eq!(
            epic_file(root, "user-auth", 1),
            PathBuf::from("/tmp/proj/docs/features/user-auth/epics/epic-001.md")
        );
        assert_eq!(
            story_rel_path("user-auth", 1, 2),
            "docs/features/user-auth/stories/story-1.2.md"
        );
    }
}
