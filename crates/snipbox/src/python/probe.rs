//! Python interpreter discovery.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Deserialize;

use crate::config::PYTHON_ENV;
use crate::detect::{executable, prefix_dir, resolve_binary, resolve_env_binary, resolve_env_prefix};
use crate::error::ProbeError;
use crate::probe::{Probe, RuntimeInfo};

const ENV_PREFIXES: [&str; 2] = ["VIRTUAL_ENV", "CONDA_PREFIX"];

const FALLBACKS: [&str; 3] = [
    "/usr/bin/python3",
    "/usr/local/bin/python3",
    "/opt/python/bin/python3",
];

const PROBE_SCRIPT: &str = r#"
import json, site, sys, sysconfig

paths = {name: sysconfig.get_path(name) for name in ("stdlib", "platstdlib", "purelib", "platlib")}
try:
    site_packages = site.getsitepackages()
except Exception:
    site_packages = []

print(json.dumps({
    "version": sys.version.split()[0],
    "executable": sys.executable,
    "prefix": sys.prefix,
    "base_prefix": sys.base_prefix,
    "exec_prefix": sys.exec_prefix,
    "base_exec_prefix": sys.base_exec_prefix,
    "paths": [p for p in paths.values() if p],
    "site_packages": site_packages,
}))
"#;

#[derive(Debug, Deserialize)]
struct PythonInfo {
    version: String,
    /// Empty when the interpreter cannot tell.
    #[serde(default)]
    executable: String,
    prefix: PathBuf,
    base_prefix: PathBuf,
    exec_prefix: PathBuf,
    base_exec_prefix: PathBuf,
    #[serde(default)]
    paths: Vec<PathBuf>,
    #[serde(default)]
    site_packages: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct PythonProbe {
    /// Explicit interpreter; skips discovery when set.
    pub binary: Option<PathBuf>,
    /// Preferred version (e.g. `"3.12"`), tried as `python3.12` first.
    pub version: Option<String>,
}

impl PythonProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: Some(binary.into()),
            version: None,
        }
    }

    pub fn with_version(version: impl Into<String>) -> Self {
        Self {
            binary: None,
            version: Some(version.into()),
        }
    }

    fn names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(3);
        if let Some(ver) = &self.version {
            names.push(format!("python{ver}"));
        }
        names.extend(["python3".to_string(), "python".to_string()]);
        names
    }
}

impl Probe for PythonProbe {
    fn name(&self) -> &str {
        "python"
    }

    fn detect(&self) -> Option<PathBuf> {
        if let Some(binary) = &self.binary {
            return executable(binary);
        }

        resolve_env_binary(PYTHON_ENV)
            .or_else(|| {
                ENV_PREFIXES
                    .iter()
                    .find_map(|var| resolve_env_prefix(var, "python3"))
            })
            .or_else(|| {
                let names = self.names();
                let names: Vec<&str> = names.iter().map(String::as_str).collect();
                resolve_binary(&names, &FALLBACKS)
            })
    }

    fn searched(&self) -> String {
        if let Some(binary) = &self.binary {
            return format!("    {} (configured)", binary.display());
        }
        let names = self.names();
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        let mut vars = vec![PYTHON_ENV];
        vars.extend(ENV_PREFIXES);
        crate::detect::searched(&vars, &names, &FALLBACKS)
    }

    fn probe(&self, binary: &Path) -> Result<RuntimeInfo, ProbeError> {
        let output = Command::new(binary)
            .args(["-I", "-c", PROBE_SCRIPT])
            .env_clear()
            .output()
            .map_err(|e| ProbeError::ProbeScriptFailed(format!("failed to run Python: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProbeError::ProbeScriptFailed(format!(
                "Python probe script failed: {stderr}"
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let info: PythonInfo = serde_json::from_str(stdout.trim()).map_err(|e| {
            ProbeError::ParseError(format!("failed to parse Python probe output: {e}\n{stdout}"))
        })?;

        // Launchers such as pyenv shims re-exec the real interpreter from
        // places the sandbox never exposes, so the worker runs it directly.
        let interpreter = Some(PathBuf::from(&info.executable))
            .filter(|p| p.is_absolute())
            .and_then(|p| executable(&p))
            .unwrap_or_else(|| binary.to_path_buf());

        let mut paths = BTreeSet::new();
        paths.extend(prefix_dir(&interpreter));
        // A venv interpreter is usually a symlink into the base install.
        if let Ok(real) = interpreter.canonicalize() {
            paths.extend(prefix_dir(&real));
        }
        paths.extend([
            info.prefix,
            info.base_prefix,
            info.exec_prefix,
            info.base_exec_prefix,
        ]);
        paths.extend(info.paths);
        paths.extend(info.site_packages);

        Ok(RuntimeInfo::new(binary.to_path_buf())
            .executable(interpreter)
            .version(info.version)
            .readonly_paths(paths.into_iter().filter(|p| p.exists())))
    }
}
