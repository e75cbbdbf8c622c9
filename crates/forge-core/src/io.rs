use crate::error::Result;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Atomically write `data` to `path` using a tempfile in the same directory.
/// Prevents partial writes from corrupting generated documents.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Create a directory and all parents, idempotent.
pub fn ensure_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path)?;
    Ok(())
}

/// Write a file only if it does not already exist. Returns true if written.
pub fn write_if_missing(path: &Path, data: &[u8]) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    atomic_write(path, data)?;
    Ok(true)
}

/// Replace content between `start_marker` and `end_marker` (exclusive) in a
/// file, keeping the markers. Returns `true` if both markers were found and
/// the file was updated, `false` if the markers were not found.
pub fn replace_between_markers(
    path: &Path,
    start_marker: &str,
    end_marker: &str,
    replacement: &str,
) -> Result<bool> {
    if !path.exists() {
        return Ok(false);
    }
    let content = std::fs::read_to_string(path)?;
    let Some(start_pos) = content.find(start_marker) else {
        return Ok(false);
    };
    let inner_start = start_pos + start_marker.len();
    let Some(end_offset) = content[inner_start..].find(end_marker) else {
        return Ok(false);
    };
    let inner_end = inner_start + end_offset;

    let mut updated = String::with_capacity(content.len());
    updated.push_str(&content[..inner_start]);
    updated.push_str(replacement);
    updated.push_str(&content[inner_end..]);

    atomic_write(path, updated.as_bytes())?;
    Ok(true)
}

/// Add `entry` to `root/.gitignore` if it isn't already present.
///
/// Checks for an exact line match and appends with a trailing newline.
/// Returns true if the file was modified.
pub fn ensure_gitignore_entry(root: &Path, entry: &str) -> Result<bool> {
    let path = root.join(".gitignore");
    let existing = if path.exists() {
        std::fs::read_to_string(&path)?
    } else {
        String::new()
    };

    if existing.lines().any(|line| line.trim() == entry) {
        return Ok(false);
    }

    let mut updated = existing;
    if !updated.is_empty() && !updated.ends_with('\n') {
        updated.push('\n');
    }
    updated.push_str(entry);
    updated.push('\n');
    atomic_write(&path, updated.as_bytes())?;
    Ok(true)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn atomic_write_creates_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a/b/c.txt");
        atomic_write(&path, b"hello").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello");
    }

    #[test]
    fn write_if_missing_does_not_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("file.txt");
        assert!(write_if_missing(&path, b"first").unwrap());
        assert!(!write_if_missing(&path, b"second").unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "first");
    }

    #[test]
    fn replace_between_markers_keeps_markers() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("story.md");
        atomic_write(&path, b"Status: <!-- status -->todo<!-- /status -->\n").unwrap();

        let changed =
            replace_between_markers(&path, "<!-- status -->", "<!-- /status -->", "done").unwrap();
        assert!(changed);
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "Status: <!-- status -->done<!-- /status -->\n"
        );
    }

    #[test]
    fn replace_between_markers_missing_marker() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("plain.md");
        atomic_write(&path, b"no markers here\n").unwrap();
        let changed = replace_between_markers(&path, "<!-- a -->", "<!-- b -->", "x").unwrap();
        assert!(!changed);
    }

    #[test]
    fn gitignore_entry_added_once() {
        let dir = TempDir::new().unwrap();
        assert!(ensure_gitignore_entry(dir.path(), ".forge/").unwrap());
        assert!(!ensure_gitignore_entry(dir.path(), ".forge/").unwrap());
        let content = std::fs::read_to_string(dir.path().join(".gitignore")).unwrap();
        assert_eq!(content.matches(".forge/").count(), 1);
    }

    #[test]
    fn gitignore_preserves_existing_entries() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(".gitignore"), "target/").unwrap();
        ensure_gitignore_entry(dir.path(), ".forge/").unwrap();
        let content = std::fs::read_to_string(dir.path().join(".gitignore")).unwrap();
        assert!(content.contains("target/"));
        assert!(content.contains(".forge/"));
    }
}
