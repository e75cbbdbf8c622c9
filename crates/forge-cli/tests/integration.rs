use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn git_available() -> bool {
    std::process::Command::new("git")
        .arg("--version")
        .output()
        .is_ok()
}

fn git(dir: &TempDir, args: &[&str]) {
    let status = std::process::Command::new("git")
        .arg("-C")
        .arg(dir.path())
        .args(args)
        .status()
        .expect("run git");
    assert!(status.success(), "git command failed: {args:?}");
}

fn forge(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("forge").unwrap();
    cmd.current_dir(dir.path()).env("FORGE_ROOT", dir.path());
    cmd
}

fn init_workspace(dir: &TempDir) {
    git(dir, &["init", "-q", "-b", "main"]);
    git(dir, &["config", "user.email", "test@example.com"]);
    git(dir, &["config", "user.name", "Test"]);
    forge(dir)
        .args(["init", "--project", "demo"])
        .assert()
        .success();
}

// ---------------------------------------------------------------------------
// forge init
// ---------------------------------------------------------------------------

#[test]
fn init_creates_metadata_and_commits() {
    if !git_available() {
        return;
    }
    let dir = TempDir::new().unwrap();
    init_workspace(&dir);

    assert!(dir.path().join(".forge/state.db").exists());
    assert!(dir.path().join(".forge/config.yaml").exists());
    assert!(dir.path().join("docs/features/.gitkeep").exists());

    let ignored = std::fs::read_to_string(dir.path().join(".gitignore")).unwrap();
    assert!(ignored.contains(".forge/"));
}

#[test]
fn init_is_idempotent() {
    if !git_available() {
        return;
    }
    let dir = TempDir::new().unwrap();
    init_workspace(&dir);
    forge(&dir)
        .args(["init", "--project", "demo"])
        .assert()
        .success();
}

#[test]
fn init_outside_git_repo_fails() {
    if !git_available() {
        return;
    }
    let dir = TempDir::new().unwrap();
    forge(&dir)
        .args(["init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error:"));
}

// ---------------------------------------------------------------------------
// forge feature
// ---------------------------------------------------------------------------

#[test]
fn feature_create_list_show() {
    if !git_available() {
        return;
    }
    let dir = TempDir::new().unwrap();
    init_workspace(&dir);

    forge(&dir)
        .args([
            "feature",
            "create",
            "user-auth",
            "--scale-level",
            "2",
            "--description",
            "OAuth support",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created feature: user-auth"));

    assert!(dir.path().join("docs/features/user-auth/PRD.md").exists());
    assert!(dir
        .path()
        .join("docs/features/user-auth/ARCHITECTURE.md")
        .exists());

    forge(&dir)
        .args(["feature", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("user-auth"));

    forge(&dir)
        .args(["feature", "show", "user-auth"])
        .assert()
        .success()
        .stdout(predicate::str::contains("OAuth support"));
}

#[test]
fn feature_create_rejects_bad_name() {
    if !git_available() {
        return;
    }
    let dir = TempDir::new().unwrap();
    init_workspace(&dir);

    forge(&dir)
        .args(["feature", "create", "Bad_Name"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid name"));
}

#[test]
fn duplicate_feature_fails() {
    if !git_available() {
        return;
    }
    let dir = TempDir::new().unwrap();
    init_workspace(&dir);

    forge(&dir)
        .args(["feature", "create", "dup", "--scale-level", "0"])
        .assert()
        .success();
    forge(&dir)
        .args(["feature", "create", "dup", "--scale-level", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn feature_json_output() {
    if !git_available() {
        return;
    }
    let dir = TempDir::new().unwrap();
    init_workspace(&dir);

    let output = forge(&dir)
        .args(["--json", "feature", "create", "payments", "--scale-level", "1"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["name"], "payments");
    assert_eq!(value["scale_level"], 1);
    assert_eq!(value["status"], "active");
}

// ---------------------------------------------------------------------------
// forge epic / story
// ---------------------------------------------------------------------------

#[test]
fn epic_and_story_lifecycle() {
    if !git_available() {
        return;
    }
    let dir = TempDir::new().unwrap();
    init_workspace(&dir);

    forge(&dir)
        .args(["feature", "create", "user-auth"])
        .assert()
        .success();
    forge(&dir)
        .args(["epic", "create", "user-auth", "Login flows", "--points", "8"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created epic 001"));
    forge(&dir)
        .args(["story", "create", "user-auth", "1", "Login form", "--points", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created story 1.1"));

    forge(&dir)
        .args(["story", "status", "user-auth", "1.1", "in_progress"])
        .assert()
        .success()
        .stdout(predicate::str::contains("now in_progress"));

    let story = std::fs::read_to_string(
        dir.path()
            .join("docs/features/user-auth/stories/story-1.1.md"),
    )
    .unwrap();
    assert!(story.contains("<!-- status -->in_progress<!-- /status -->"));

    forge(&dir)
        .args(["story", "list", "user-auth"])
        .assert()
        .success()
        .stdout(predicate::str::contains("in_progress"));
}

#[test]
fn story_under_missing_epic_fails() {
    if !git_available() {
        return;
    }
    let dir = TempDir::new().unwrap();
    init_workspace(&dir);

    forge(&dir)
        .args(["feature", "create", "user-auth"])
        .assert()
        .success();
    forge(&dir)
        .args(["story", "create", "user-auth", "9", "Orphan"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

// ---------------------------------------------------------------------------
// forge validate
// ---------------------------------------------------------------------------

#[test]
fn validate_passes_on_clean_workspace() {
    if !git_available() {
        return;
    }
    let dir = TempDir::new().unwrap();
    init_workspace(&dir);

    forge(&dir)
        .args(["feature", "create", "user-auth"])
        .assert()
        .success();
    forge(&dir)
        .args(["validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("OK"));
}

#[test]
fn validate_fails_when_document_deleted() {
    if !git_available() {
        return;
    }
    let dir = TempDir::new().unwrap();
    init_workspace(&dir);

    forge(&dir)
        .args(["feature", "create", "user-auth", "--scale-level", "1"])
        .assert()
        .success();
    std::fs::remove_file(dir.path().join("docs/features/user-auth/PRD.md")).unwrap();

    forge(&dir)
        .args(["validate"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("PRD.md"));
}

// ---------------------------------------------------------------------------
// forge migrate / history
// ---------------------------------------------------------------------------

#[test]
fn migrate_status_reports_schema_version() {
    if !git_available() {
        return;
    }
    let dir = TempDir::new().unwrap();
    init_workspace(&dir);

    forge(&dir)
        .args(["migrate", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Schema version: 1"));
    forge(&dir)
        .args(["migrate", "run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("up to date"));
}

#[test]
fn history_shows_feature_commits() {
    if !git_available() {
        return;
    }
    let dir = TempDir::new().unwrap();
    init_workspace(&dir);

    forge(&dir)
        .args(["feature", "create", "user-auth"])
        .assert()
        .success();

    forge(&dir)
        .args(["history", "user-auth"])
        .assert()
        .success()
        .stdout(predicate::str::contains("feat(user-auth)"));
}

// ---------------------------------------------------------------------------
// Dirty-tree guard
// ---------------------------------------------------------------------------

#[test]
fn mutations_refuse_dirty_tree() {
    if !git_available() {
        return;
    }
    let dir = TempDir::new().unwrap();
    init_workspace(&dir);
    std::fs::write(dir.path().join("scratch.txt"), "wip\n").unwrap();

    forge(&dir)
        .args(["feature", "create", "user-auth"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("working tree not clean"));

    assert!(!dir.path().join("docs/features/user-auth").exists());
}
