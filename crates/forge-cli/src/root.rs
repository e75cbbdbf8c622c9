use std::path::{Path, PathBuf};

/// Resolve the workspace root.
///
/// An explicit path (`--root` flag or `FORGE_ROOT`) always wins. Otherwise
/// walk up from the current directory to the nearest `.forge/` marker, then
/// to the nearest `.git/`, and finally settle for the current directory so
/// `forge init` still has somewhere to run.
pub fn resolve_root(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    find_up(&cwd, ".forge")
        .or_else(|| find_up(&cwd, ".git"))
        .unwrap_or(cwd)
}

/// Nearest ancestor of `start` (inclusive) containing a `marker` directory.
fn find_up(start: &Path, marker: &str) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(marker).is_dir())
        .map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn explicit_root_wins() {
        let dir = TempDir::new().unwrap();
        assert_eq!(resolve_root(Some(dir.path())), dir.path());
    }

    #[test]
    fn walks_up_to_the_nearest_marker() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join(".forge")).unwrap();
        let nested = dir.path().join("a/b");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(find_up(&nested, ".forge"), Some(dir.path().to_path_buf()));
        assert_eq!(find_up(&nested, ".hg"), None);
    }
}
