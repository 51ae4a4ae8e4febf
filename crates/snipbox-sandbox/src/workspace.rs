//! Private workspace for one worker.
//!
//! The workspace is a temporary directory owned by the worker for its whole
//! lifetime and removed when the worker is destroyed. It is the only place
//! the worker may write to:
//!
//! ```text
//! <root>/
//!   driver.*   runtime driver written by the adapter (read-only for the worker)
//!   work/      current directory of the worker
//!   tmp/       TMPDIR
//!   home/      HOME
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Writable subdirectories created in every workspace.
pub const WRITABLE_DIRS: [&str; 3] = ["work", "tmp", "home"];

/// Temporary workspace for a sandboxed worker.
#[derive(Debug)]
pub struct Workspace {
    root: PathBuf,
    _tempdir: TempDir,
}

impl Workspace {
    pub fn new() -> io::Result<Self> {
        Self::with_prefix("snipbox-")
    }

    pub fn with_prefix(prefix: &str) -> io::Result<Self> {
        let tempdir = TempDir::with_prefix(prefix)?;
        let workspace = Self {
            root: tempdir.path().to_path_buf(),
            _tempdir: tempdir,
        };
        for dir in WRITABLE_DIRS {
            workspace.create_dir(dir)?;
        }
        Ok(workspace)
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute paths of the directories the worker may write to.
    pub fn writable_dirs(&self) -> impl Iterator<Item = PathBuf> + '_ {
        WRITABLE_DIRS.iter().map(|dir| self.root.join(dir))
    }

    pub fn write_file(&self, path: &str, content: &[u8], executable: bool) -> io::Result<PathBuf> {
        use std::os::unix::fs::PermissionsExt;

        let full = self.root.join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&full, content)?;

        if executable {
            fs::set_permissions(&full, fs::Permissions::from_mode(0o755))?;
        }

        Ok(full)
    }

    pub fn create_dir(&self, path: &str) -> io::Result<PathBuf> {
        let full = self.root.join(path);
        fs::create_dir_all(&full)?;
        Ok(full)
    }
}
