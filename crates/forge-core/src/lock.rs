//! Mutual exclusion for mutating callers.
//!
//! The lock is a marker file under `.forge/` recording the holder's
//! identity and acquisition time, durable across process restarts. A
//! crashed holder is detected by age and forcibly reclaimed after the
//! stale timeout. Read-only callers never take the lock.

use crate::error::{ForgeError, Result};
use crate::paths;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

// ---------------------------------------------------------------------------
// Lock file contents
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LockInfo {
    owner: String,
    pid: u32,
    acquired_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// SessionLock
// ---------------------------------------------------------------------------

pub struct SessionLock {
    root: PathBuf,
    timeout: Duration,
    stale_after: Duration,
}

impl SessionLock {
    pub fn new(root: &Path, timeout: Duration, stale_after: Duration) -> Self {
        Self {
            root: root.to_path_buf(),
            timeout,
            stale_after,
        }
    }

    /// Block until the lock is free or `timeout` elapses.
    ///
    /// The returned guard releases the lock on drop. A holder whose
    /// acquisition time is older than `stale_after` is treated as crashed
    /// and its lock file is reclaimed.
    pub fn acquire(&self) -> Result<LockGuard> {
        let path = paths::lock_path(&self.root);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let owner = uuid::Uuid::new_v4().to_string();
        let started = Instant::now();

        loop {
            match try_create(&path, &owner) {
                Ok(()) => {
                    return Ok(LockGuard {
                        path,
                        owner,
                        released: false,
                    });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if self.reclaim_if_stale(&path)? {
                        continue;
                    }
                }
                Err(e) => return Err(e.into()),
            }

            if started.elapsed() >= self.timeout {
                return Err(ForgeError::LockTimeout {
                    waited_ms: started.elapsed().as_millis() as u64,
                });
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    /// Remove the lock file if its holder looks crashed. Returns true if
    /// reclaimed.
    fn reclaim_if_stale(&self, path: &Path) -> Result<bool> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            // Holder released between our create attempt and this read.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(true),
            Err(e) => return Err(e.into()),
        };

        let info: LockInfo = match serde_json::from_str(&content) {
            Ok(info) => info,
            Err(_) => {
                // Unparseable lock file: treat as crashed holder.
                tracing::warn!(path = %path.display(), "reclaiming corrupt session lock");
                let _ = std::fs::remove_file(path);
                return Ok(true);
            }
        };

        let age = Utc::now().signed_duration_since(info.acquired_at);
        if age.to_std().unwrap_or_default() >= self.stale_after {
            tracing::warn!(
                owner = %info.owner,
                pid = info.pid,
                age_secs = age.num_seconds(),
                "reclaiming stale session lock"
            );
            let _ = std::fs::remove_file(path);
            return Ok(true);
        }
        Ok(false)
    }
}

fn try_create(path: &Path, owner: &str) -> std::io::Result<()> {
    use std::io::Write;
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)?;
    let info = LockInfo {
        owner: owner.to_string(),
        pid: std::process::id(),
        acquired_at: Utc::now(),
    };
    file.write_all(serde_json::to_string(&info).unwrap_or_default().as_bytes())?;
    file.sync_all()
}

// ---------------------------------------------------------------------------
// LockGuard
// ---------------------------------------------------------------------------

/// RAII handle; dropping it releases the lock.
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
    owner: String,
    released: bool,
}

impl LockGuard {
    /// Explicit release; equivalent to dropping the guard.
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        // Only remove the file if we still own it; a reclaimer may have
        // replaced it while we were (wrongly) presumed dead.
        let still_ours = std::fs::read_to_string(&self.path)
            .ok()
            .and_then(|c| serde_json::from_str::<LockInfo>(&c).ok())
            .map(|info| info.owner == self.owner)
            .unwrap_or(false);
        if still_ours {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.release_inner();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn lock(root: &Path, timeout_ms: u64, stale_ms: u64) -> SessionLock {
        SessionLock::new(
            root,
            Duration::from_millis(timeout_ms),
            Duration::from_millis(stale_ms),
        )
    }

    #[test]
    fn acquire_and_release() {
        let dir = TempDir::new().unwrap();
        let lock = lock(dir.path(), 100, 60_000);

        let guard = lock.acquire().unwrap();
        assert!(paths::lock_path(dir.path()).exists());
        drop(guard);
        assert!(!paths::lock_path(dir.path()).exists());
    }

    #[test]
    fn second_acquire_times_out_while_held() {
        let dir = TempDir::new().unwrap();
        let lock_a = lock(dir.path(), 100, 60_000);
        let lock_b = lock(dir.path(), 150, 60_000);

        let _guard = lock_a.acquire().unwrap();
        let err = lock_b.acquire().unwrap_err();
        assert!(matches!(err, ForgeError::LockTimeout { .. }));
    }

    #[test]
    fn stale_lock_is_reclaimed() {
        let dir = TempDir::new().unwrap();
        // Stale threshold of zero: any existing holder is presumed crashed.
        let lock_a = lock(dir.path(), 100, 60_000);
        let lock_b = lock(dir.path(), 500, 0);

        let guard_a = lock_a.acquire().unwrap();
        let guard_b = lock_b.acquire().unwrap();
        assert!(paths::lock_path(dir.path()).exists());

        // The original holder must not remove the reclaimer's lock file.
        drop(guard_a);
        assert!(paths::lock_path(dir.path()).exists());
        drop(guard_b);
        assert!(!paths::lock_path(dir.path()).exists());
    }

    #[test]
    fn corrupt_lock_file_is_reclaimed() {
        let dir = TempDir::new().unwrap();
        let path = paths::lock_path(dir.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "not json").unwrap();

        let lock = lock(dir.path(), 200, 60_000);
        let guard = lock.acquire().unwrap();
        drop(guard);
    }

    #[test]
    fn contended_threads_serialize() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().to_path_buf();
        let counter = std::sync::Arc::new(std::sync::atomic::AtomicU32::new(0));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let root = root.clone();
                let counter = counter.clone();
                std::thread::spawn(move || {
                    let lock = SessionLock::new(
                        &root,
                        Duration::from_secs(5),
                        Duration::from_secs(60),
                    );
                    let _guard = lock.acquire().unwrap();
                    // While held, nobody else may be in the critical section.
                    let inside = counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                    assert_eq!(inside, 0, "lock did not serialize callers");
                    std::thread::sleep(Duration::from_millis(20));
                    counter.fetch_sub(1, std::sync::atomic::Ordering::SeqCst);
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
    }
}
