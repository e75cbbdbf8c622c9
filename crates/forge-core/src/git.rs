//! Thin, synchronous wrapper over the `git` binary.
//!
//! Every method is a blocking subprocess call that either completes or
//! returns a typed [`ForgeError::VersionControl`]. No retries happen here;
//! retry policy belongs to callers. This module has no knowledge of
//! features, epics, or any other entity.

use crate::error::{ForgeError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Command;

// Field separator for single-line commit formats. Never appears in commit
// metadata produced by this system.
const SEP: char = '\x1f';

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitInfo {
    pub sha: String,
    pub full_sha: String,
    pub message: String,
    pub author: String,
    pub email: String,
    pub date: DateTime<Utc>,
    pub files_changed: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Clean,
    Modified,
    Staged,
    Untracked,
    Deleted,
}

// ---------------------------------------------------------------------------
// GitRepo
// ---------------------------------------------------------------------------

/// Handle to a git working tree rooted at `root`.
pub struct GitRepo {
    root: PathBuf,
}

impl GitRepo {
    /// Open the repository at `root`, verifying the git binary is on PATH
    /// and `root` is inside a working tree.
    pub fn open(root: &Path) -> Result<Self> {
        which::which("git").map_err(|_| ForgeError::GitNotFound)?;
        let repo = Self {
            root: root.to_path_buf(),
        };
        repo.run(&["rev-parse", "--show-toplevel"])?;
        Ok(repo)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn run(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .arg("-C")
            .arg(&self.root)
            .args(args)
            .output()
            .map_err(|e| ForgeError::VersionControl {
                command: args.join(" "),
                stderr: format!("failed to spawn git: {e}"),
            })?;

        if !output.status.success() {
            return Err(ForgeError::VersionControl {
                command: args.join(" "),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
    }

    // -----------------------------------------------------------------------
    // Transaction primitives
    // -----------------------------------------------------------------------

    /// True when there are no staged, unstaged, or untracked changes.
    pub fn is_clean(&self) -> Result<bool> {
        let out = self.run(&["status", "--porcelain"])?;
        Ok(out.is_empty())
    }

    /// Stage everything, including deletions and untracked files.
    pub fn stage_all(&self) -> Result<()> {
        self.run(&["add", "-A"])?;
        Ok(())
    }

    /// Stage specific paths only.
    pub fn stage(&self, paths: &[&str]) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }
        let mut args = vec!["add", "--"];
        args.extend_from_slice(paths);
        self.run(&args)?;
        Ok(())
    }

    /// Commit staged changes and return the short SHA of the new commit.
    pub fn commit(&self, message: &str) -> Result<String> {
        self.run(&["commit", "-m", message])?;
        self.head_sha(true)
    }

    /// DESTRUCTIVE: discard all uncommitted changes and move HEAD to
    /// `target`. The caller is responsible for passing a valid target;
    /// this is always logged before execution.
    pub fn reset_hard(&self, target: &str) -> Result<()> {
        tracing::warn!(target_sha = target, "executing destructive hard reset");
        self.run(&["reset", "--hard", target])?;
        Ok(())
    }

    pub fn head_sha(&self, short: bool) -> Result<String> {
        if short {
            self.run(&["rev-parse", "--short", "HEAD"])
        } else {
            self.run(&["rev-parse", "HEAD"])
        }
    }

    // -----------------------------------------------------------------------
    // Branch operations
    // -----------------------------------------------------------------------

    pub fn current_branch(&self) -> Result<String> {
        self.run(&["rev-parse", "--abbrev-ref", "HEAD"])
    }

    pub fn create_branch(&self, name: &str, checkout: bool) -> Result<()> {
        if checkout {
            self.run(&["checkout", "-b", name])?;
        } else {
            self.run(&["branch", name])?;
        }
        Ok(())
    }

    pub fn checkout(&self, name: &str) -> Result<()> {
        self.run(&["checkout", name])?;
        Ok(())
    }

    pub fn branch_exists(&self, name: &str) -> Result<bool> {
        Ok(self
            .run(&["rev-parse", "--verify", "--quiet", &format!("refs/heads/{name}")])
            .is_ok())
    }

    pub fn delete_branch(&self, name: &str, force: bool) -> Result<()> {
        let flag = if force { "-D" } else { "-d" };
        self.run(&["branch", flag, name])?;
        Ok(())
    }

    pub fn merge(&self, branch: &str, no_fast_forward: bool, message: Option<&str>) -> Result<()> {
        let mut args = vec!["merge"];
        if no_fast_forward {
            args.push("--no-ff");
        }
        if let Some(msg) = message {
            args.push("-m");
            args.push(msg);
        }
        args.push(branch);
        self.run(&args)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // History and file queries
    // -----------------------------------------------------------------------

    /// Repo-relative paths of all tracked files under `prefix`.
    pub fn ls_files(&self, prefix: &str) -> Result<Vec<String>> {
        let out = self.run(&["ls-files", "--", prefix])?;
        Ok(out.lines().map(str::to_string).collect())
    }

    /// Repo-relative paths of untracked (and not ignored) files under
    /// `prefix`.
    pub fn untracked_files(&self, prefix: &str) -> Result<Vec<String>> {
        let out = self.run(&["status", "--porcelain", "--untracked-files=all", "--", prefix])?;
        Ok(out
            .lines()
            .filter_map(|line| line.strip_prefix("?? "))
            .map(str::to_string)
            .collect())
    }

    pub fn is_file_tracked(&self, path: &str) -> Result<bool> {
        let out = self.run(&["ls-files", "--", path])?;
        Ok(!out.is_empty())
    }

    /// Working-tree status of one path, from `git status --porcelain`.
    pub fn file_status(&self, path: &str) -> Result<FileStatus> {
        let out = self.run(&["status", "--porcelain", "--", path])?;

        if let Some(line) = out.lines().next() {
            let mut chars = line.chars();
            let index = chars.next().unwrap_or(' ');
            let worktree = chars.next().unwrap_or(' ');
            return Ok(match (index, worktree) {
                ('?', '?') => FileStatus::Untracked,
                (_, 'D') | ('D', _) => FileStatus::Deleted,
                (' ', 'M') => FileStatus::Modified,
                _ => FileStatus::Staged,
            });
        }

        // No status output: either clean and tracked, or gone entirely.
        if self.is_file_tracked(path)? {
            Ok(FileStatus::Clean)
        } else if self.root.join(path).exists() {
            // Present on disk but invisible to status: ignored file.
            Ok(FileStatus::Untracked)
        } else {
            Ok(FileStatus::Deleted)
        }
    }

    /// Most recent commit touching `path`, or `None` if the file has no
    /// committed history.
    pub fn last_commit_for_file(&self, path: &str) -> Result<Option<CommitInfo>> {
        let out = self.run(&["log", "-1", "--format=%H", "--", path])?;
        if out.is_empty() {
            return Ok(None);
        }
        Ok(Some(self.commit_info(&out)?))
    }

    pub fn commit_info(&self, sha: &str) -> Result<CommitInfo> {
        let format = format!("%h{SEP}%H{SEP}%s{SEP}%an{SEP}%ae{SEP}%aI");
        let line = self.run(&["show", "--no-patch", &format!("--format={format}"), sha])?;
        let mut info = parse_commit_line(&line)?;

        let files = self.run(&["diff-tree", "--no-commit-id", "--name-only", "-r", sha])?;
        info.files_changed = files.lines().map(str::to_string).collect();
        Ok(info)
    }

    /// The `limit` most recent commits, newest first, optionally restricted
    /// to those touching `file_path`.
    pub fn recent_commits(&self, file_path: Option<&str>, limit: usize) -> Result<Vec<CommitInfo>> {
        let count = limit.to_string();
        let mut args = vec!["log", "--format=%H", "-n", &count];
        if let Some(path) = file_path {
            args.push("--");
            args.push(path);
        }
        let out = self.run(&args)?;

        let mut commits = Vec::new();
        for sha in out.lines().filter(|l| !l.is_empty()) {
            commits.push(self.commit_info(sha)?);
        }
        Ok(commits)
    }

    /// Commits in `since..until`, newest first, optionally restricted to
    /// those touching `file_path`.
    pub fn commits_since(
        &self,
        since: &str,
        until: &str,
        file_path: Option<&str>,
    ) -> Result<Vec<CommitInfo>> {
        let range = format!("{since}..{until}");
        let mut args = vec!["log", "--format=%H", &range];
        if let Some(path) = file_path {
            args.push("--");
            args.push(path);
        }
        let out = self.run(&args)?;

        let mut commits = Vec::new();
        for sha in out.lines().filter(|l| !l.is_empty()) {
            commits.push(self.commit_info(sha)?);
        }
        Ok(commits)
    }
}

fn parse_commit_line(line: &str) -> Result<CommitInfo> {
    let parts: Vec<&str> = line.splitn(6, SEP).collect();
    if parts.len() != 6 {
        return Err(ForgeError::VersionControl {
            command: "show".into(),
            stderr: format!("unparseable commit format: {line}"),
        });
    }
    let date = DateTime::parse_from_rfc3339(parts[5])
        .map_err(|e| ForgeError::VersionControl {
            command: "show".into(),
            stderr: format!("unparseable commit date '{}': {e}", parts[5]),
        })?
        .with_timezone(&Utc);

    Ok(CommitInfo {
        sha: parts[0].to_string(),
        full_sha: parts[1].to_string(),
        message: parts[2].to_string(),
        author: parts[3].to_string(),
        email: parts[4].to_string(),
        date,
        files_changed: Vec::new(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
