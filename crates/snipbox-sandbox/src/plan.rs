//! Worker launch plan.
//!
//! A `Plan` describes everything needed to start a long-lived interpreter
//! worker inside the sandbox: the command, environment, files written into the
//! workspace, the paths the worker may read, and resource limits.
//!
//! ## Example
//!
//! ```ignore
//! use snipbox_sandbox::{Plan, PathAccess};
//!
//! let plan = Plan::new(["/usr/bin/python3", "-I", "driver.py"])
//!     .env("LANG", "C.UTF-8")
//!     .file("driver.py", DRIVER)
//!     .path(PathAccess::ro("/usr/lib/python3.12"))
//!     .memory_limit(512 * 1024 * 1024);
//! ```
//!
//! ## Defaults
//!
//! | Field | Default |
//! |-------|---------|
//! | `memory_limit` | none |
//! | `max_processes` | none |
//! | `max_file_size` | 16 MiB |
//! | `max_open_files` | 256 |
//! | `network` | false (blocked) |
//! | `cwd` | `work` |

use std::collections::HashMap;
use std::path::PathBuf;

use crate::sysinfo::SYSTEM_PATHS;

/// Filesystem access granted to the worker for one host path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathAccess {
    pub path: PathBuf,
    /// If false, the path is read-only (default).
    pub writable: bool,
    /// If true, executables can be run from this path.
    pub executable: bool,
}

impl PathAccess {
    /// Read-only access with execute permission.
    pub fn ro(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writable: false,
            executable: true,
        }
    }

    /// Read-only access without execute permission.
    pub fn ro_noexec(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writable: false,
            executable: false,
        }
    }

    /// Read-write access.
    pub fn rw(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writable: true,
            executable: true,
        }
    }
}

/// File to write to the workspace before the worker starts.
#[derive(Debug, Clone)]
pub struct UserFile {
    pub path: String,
    pub content: Vec<u8>,
    pub executable: bool,
}

impl UserFile {
    pub fn new(path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            executable: false,
        }
    }

    pub fn executable(mut self) -> Self {
        self.executable = true;
        self
    }
}

/// Complete worker launch plan.
#[derive(Debug, Clone)]
pub struct Plan {
    /// `cmd[0]` must be an absolute path; binary resolution is the caller's job.
    pub cmd: Vec<String>,
    pub env: HashMap<String, String>,
    /// Working directory relative to the workspace root.
    pub cwd: String,
    pub paths: Vec<PathAccess>,
    pub user_files: Vec<UserFile>,
    pub memory_limit: Option<u64>,
    pub max_processes: Option<u64>,
    pub max_file_size: u64,
    pub max_open_files: u64,
    pub network_blocked: bool,
}

impl Default for Plan {
    fn default() -> Self {
        Self {
            cmd: Vec::new(),
            env: default_env(),
            cwd: "work".into(),
            paths: Vec::new(),
            user_files: Vec::new(),
            memory_limit: None,
            max_processes: None,
            max_file_size: 16 * 1024 * 1024,
            max_open_files: 256,
            network_blocked: true,
        }
    }
}

impl Plan {
    pub fn new(cmd: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            cmd: cmd.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn cwd(mut self, cwd: impl Into<String>) -> Self {
        self.cwd = cwd.into();
        self
    }

    pub fn path(mut self, access: PathAccess) -> Self {
        self.paths.push(access);
        self
    }

    /// Add multiple path rules from an iterator.
    pub fn paths(mut self, paths: impl IntoIterator<Item = PathAccess>) -> Self {
        self.paths.extend(paths);
        self
    }

    pub fn file(mut self, path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.user_files.push(UserFile::new(path, content));
        self
    }

    /// Add an executable file to the workspace.
    pub fn executable(mut self, path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.user_files.push(UserFile::new(path, content).executable());
        self
    }

    pub fn memory_limit(mut self, limit: impl Into<Option<u64>>) -> Self {
        self.memory_limit = limit.into();
        self
    }

    pub fn max_processes(mut self, max: impl Into<Option<u64>>) -> Self {
        self.max_processes = max.into();
        self
    }

    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }

    pub fn max_open_files(mut self, max: u64) -> Self {
        self.max_open_files = max;
        self
    }

    /// Enable or disable network access.
    ///
    /// `network(true)` enables network, `network(false)` blocks it (default).
    pub fn network(mut self, enabled: bool) -> Self {
        self.network_blocked = !enabled;
        self
    }
}

fn default_env() -> HashMap<String, String> {
    HashMap::from([
        ("PATH".into(), SYSTEM_PATHS.default_path.clone()),
        ("USER".into(), "sandbox".into()),
        ("LANG".into(), "C.UTF-8".into()),
        ("LC_ALL".into(), "C.UTF-8".into()),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_new() {
        let plan = Plan::new(["/usr/bin/python3", "driver.py"]);
        assert_eq!(plan.cmd, vec!["/usr/bin/python3", "driver.py"]);
        assert!(plan.network_blocked);
        assert_eq!(plan.cwd, "work");
        assert!(plan.env.contains_key("PATH"));
    }

    #[test]
    fn plan_builder() {
        let plan = Plan::new(["/usr/bin/node", "driver.js"])
            .env("NODE_OPTIONS", "")
            .file("driver.js", b"console.log(1)".to_vec())
            .path(PathAccess::ro("/opt/node"))
            .memory_limit(128 * 1024 * 1024)
            .max_processes(32);

        assert_eq!(plan.env.get("NODE_OPTIONS"), Some(&String::new()));
        assert_eq!(plan.user_files.len(), 1);
        assert_eq!(plan.paths, vec![PathAccess::ro("/opt/node")]);
        assert_eq!(plan.memory_limit, Some(128 * 1024 * 1024));
        assert_eq!(plan.max_processes, Some(32));
    }

    #[test]
    fn plan_network_methods() {
        let plan = Plan::new(["/bin/true"]).network(true);
        assert!(!plan.network_blocked);

        let plan = Plan::new(["/bin/true"]).network(false);
        assert!(plan.network_blocked);
    }

    #[test]
    fn path_access_constructors() {
        assert!(!PathAccess::ro("/usr").writable);
        assert!(!PathAccess::ro_noexec("/usr").executable);
        assert!(PathAccess::rw("/tmp/x").writable);
    }
}
