//! Probe trait and RuntimeInfo types.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::ProbeError;

/// What a worker needs from the host to run an interpreter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeInfo {
    /// Binary found by discovery; may be a launcher shim.
    pub binary: PathBuf,
    /// Interpreter the worker actually runs, as reported by the interpreter
    /// itself. Equals `binary` unless the probe says otherwise.
    pub executable: PathBuf,
    pub version: Option<String>,
    /// Paths granted read-only (with execute) inside the sandbox.
    pub readonly_paths: Vec<PathBuf>,
    pub env: HashMap<String, String>,
}

impl RuntimeInfo {
    pub fn new(binary: PathBuf) -> Self {
        Self {
            executable: binary.clone(),
            binary,
            version: None,
            readonly_paths: Vec::new(),
            env: HashMap::new(),
        }
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Launch `path` instead of the discovered binary.
    pub fn executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.executable = path.into();
        self
    }

    /// Add a read-only path; paths already covered by another entry are skipped.
    pub fn readonly_path(mut self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if !self.readonly_paths.iter().any(|p| path.starts_with(p)) {
            self.readonly_paths.retain(|p| !p.starts_with(&path));
            self.readonly_paths.push(path);
        }
        self
    }

    pub fn readonly_paths(self, paths: impl IntoIterator<Item = PathBuf>) -> Self {
        paths.into_iter().fold(self, Self::readonly_path)
    }

    pub fn env_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

/// Detects an interpreter and determines what the sandbox must expose to it.
pub trait Probe: Send + Sync {
    fn name(&self) -> &str;

    /// Find the interpreter binary: override → env vars → PATH → common locations.
    fn detect(&self) -> Option<PathBuf>;

    /// Ask the interpreter where it lives.
    fn probe(&self, binary: &Path) -> Result<RuntimeInfo, ProbeError>;

    /// Human-readable list of the places [`detect`](Self::detect) looks.
    fn searched(&self) -> String;

    fn locate(&self) -> Result<PathBuf, ProbeError> {
        self.detect().ok_or_else(|| ProbeError::NotFound {
            runtime: self.name().to_string(),
            searched: self.searched(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readonly_paths_are_deduplicated() {
        let info = RuntimeInfo::new("/usr/bin/python3".into())
            .readonly_path("/usr/lib/python3.12")
            .readonly_path("/usr")
            .readonly_path("/usr/lib/python3.12/site-packages")
            .readonly_path("/opt/extra");

        assert_eq!(
            info.readonly_paths,
            vec![PathBuf::from("/usr"), PathBuf::from("/opt/extra")]
        );
    }

    #[test]
    fn executable_defaults_to_binary() {
        let info = RuntimeInfo::new("/root/.pyenv/shims/python3".into());
        assert_eq!(info.executable, info.binary);

        let info = info.executable("/root/.pyenv/versions/3.12.4/bin/python3.12");
        assert_eq!(info.binary, PathBuf::from("/root/.pyenv/shims/python3"));
        assert_eq!(
            info.executable,
            PathBuf::from("/root/.pyenv/versions/3.12.4/bin/python3.12")
        );
    }

    #[test]
    fn locate_reports_not_found() {
        struct Missing;
        impl Probe for Missing {
            fn name(&self) -> &str {
                "missing"
            }
            fn detect(&self) -> Option<PathBuf> {
                None
            }
            fn probe(&self, _: &Path) -> Result<RuntimeInfo, ProbeError> {
                unreachable!()
            }
            fn searched(&self) -> String {
                "    PATH: missing".into()
            }
        }

        let err = Missing.locate().unwrap_err();
        assert!(matches!(err, ProbeError::NotFound { .. }));
        assert!(err.to_string().contains("PATH: missing"));
    }
}
