//! Temporary working directories for publish calls
//!
//! Names come from a process-wide generator: a random 63-bit seed drawn
//! once, advanced by an atomic counter. Two allocations in the same process
//! never collide; collisions across processes are as unlikely as two random
//! 63-bit seeds landing within a few allocations of each other.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{CoreError, Result};

static SEED: OnceLock<u64> = OnceLock::new();
static COUNTER: AtomicU64 = AtomicU64::new(0);

const NAME_MASK: u64 = i64::MAX as u64;

/// Next process-unique directory name, a non-negative decimal integer
pub fn next_name() -> String {
    let seed = *SEED.get_or_init(rand::random::<u64>);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    (seed.wrapping_add(n) & NAME_MASK).to_string()
}

/// Hands out workspace paths under a base working directory
#[derive(Debug, Clone)]
pub struct WorkspaceAllocator {
    base_dir: PathBuf,
}

impl WorkspaceAllocator {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// A fresh path under the base directory. The directory is not created.
    pub fn allocate(&self) -> PathBuf {
        self.base_dir.join(next_name())
    }
}

/// A staged workspace directory, removed when dropped
///
/// Removal failures are logged and never surface to the caller.
#[derive(Debug)]
pub struct StagedWorkspace {
    path: PathBuf,
}

impl StagedWorkspace {
    /// Allocate and create a workspace directory
    pub fn create(allocator: &WorkspaceAllocator) -> Result<Self> {
        let path = allocator.allocate();
        std::fs::create_dir_all(&path).map_err(|e| CoreError::StagingCopyFailed {
            from: String::new(),
            to: path.display().to_string(),
            message: format!("cannot create workspace: {e}"),
        })?;
        tracing::debug!(dir = %path.display(), "workspace created");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copy a reference chart into the workspace
    pub fn stage_from(&self, reference: &Path) -> Result<()> {
        copy_dir(reference, &self.path)
    }
}

impl Drop for StagedWorkspace {
    fn drop(&mut self) {
        remove_dir_logged(&self.path);
    }
}

/// Best-effort recursive removal; a missing directory is not an error
pub fn remove_dir_logged(path: &Path) {
    match std::fs::remove_dir_all(path) {
        Ok(()) => tracing::debug!(dir = %path.display(), "directory removed"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(dir = %path.display(), error = %e, "error in deleting dir"),
    }
}

/// Copy the contents of `src` into `dest`, merging with what is already
/// there. Existing files are overwritten, extra files in `dest` are kept.
pub fn copy_dir(src: &Path, dest: &Path) -> Result<()> {
    let copy_err = |message: String| CoreError::StagingCopyFailed {
        from: src.display().to_string(),
        to: dest.display().to_string(),
        message,
    };

    if !src.is_dir() {
        return Err(copy_err("source is not a directory".to_string()));
    }

    std::fs::create_dir_all(dest).map_err(|e| copy_err(e.to_string()))?;

    for entry in walkdir::WalkDir::new(src).min_depth(1).follow_links(true) {
        let entry = entry.map_err(|e| copy_err(e.to_string()))?;
        let rel = entry.path().strip_prefix(src).unwrap_or(entry.path());
        let target = dest.join(rel);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target).map_err(|e| copy_err(e.to_string()))?;
        } else {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent).map_err(|e| copy_err(e.to_string()))?;
            }
            std::fs::copy(entry.path(), &target).map_err(|e| copy_err(e.to_string()))?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::TempDir;

    #[test]
    fn test_names_are_decimal_and_unique() {
        let names: HashSet<String> = (0..1000).map(|_| next_name()).collect();
        assert_eq!(names.len(), 1000);
        for name in &names {
            let n: i64 = name.parse().unwrap();
            assert!(n >= 0);
        }
    }

    #[test]
    fn test_names_unique_across_threads() {
        let handles: Vec<_> = (0..8)
            .map(|_| std::thread::spawn(|| (0..200).map(|_| next_name()).collect::<Vec<_>>()))
            .collect();

        let mut all = HashSet::new();
        for handle in handles {
            for name in handle.join().unwrap() {
                assert!(all.insert(name));
            }
        }
        assert_eq!(all.len(), 1600);
    }

    #[test]
    fn test_allocate_does_not_create() {
        let temp = TempDir::new().unwrap();
        let allocator = WorkspaceAllocator::new(temp.path());

        let path = allocator.allocate();
        assert_eq!(path.parent().unwrap(), temp.path());
        assert!(!path.exists());
    }

    #[test]
    fn test_staged_workspace_removed_on_drop() {
        let temp = TempDir::new().unwrap();
        let allocator = WorkspaceAllocator::new(temp.path());

        let path = {
            let ws = StagedWorkspace::create(&allocator).unwrap();
            std::fs::write(ws.path().join("file"), "x").unwrap();
            assert!(ws.path().is_dir());
            ws.path().to_path_buf()
        };

        assert!(!path.exists());
    }

    #[test]
    fn test_staged_workspace_removed_on_unwind() {
        let temp = TempDir::new().unwrap();
        let allocator = WorkspaceAllocator::new(temp.path());
        let seen = std::sync::Mutex::new(None);

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let ws = StagedWorkspace::create(&allocator).unwrap();
            *seen.lock().unwrap() = Some(ws.path().to_path_buf());
            panic!("abort publish");
        }));

        assert!(result.is_err());
        let path = seen.lock().unwrap().clone().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_copy_dir_merges() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        let dest = temp.path().join("dest");
        std::fs::create_dir_all(src.join("templates")).unwrap();
        std::fs::write(src.join("Chart.yaml"), "name: new\n").unwrap();
        std::fs::write(src.join("templates").join("svc.yaml"), "kind: Service\n").unwrap();

        std::fs::create_dir_all(&dest).unwrap();
        std::fs::write(dest.join("Chart.yaml"), "name: old\n").unwrap();
        std::fs::write(dest.join("keep.txt"), "keep").unwrap();

        copy_dir(&src, &dest).unwrap();

        assert_eq!(std::fs::read_to_string(dest.join("Chart.yaml")).unwrap(), "name: new\n");
        assert!(dest.join("templates").join("svc.yaml").exists());
        assert!(dest.join("keep.txt").exists());
    }

    #[test]
    fn test_copy_dir_missing_source() {
        let temp = TempDir::new().unwrap();
        let err = copy_dir(&temp.path().join("nope"), &temp.path().join("dest")).unwrap_err();
        assert!(matches!(err, CoreError::StagingCopyFailed { .. }));
    }
}
