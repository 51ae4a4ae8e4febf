//! Python runtime.
//!
//! The worker runs `python3 -I -B driver.py`. Each execution gets a fresh
//! globals dict and is compiled with the filename `<input>`, so tracebacks
//! and error positions refer to the user's code only.
//!
//! ## Example
//!
//! ```ignore
//! use snipbox::python::PythonExecutor;
//! use snipbox::{CodeExecutor, SandboxConfig};
//!
//! let python = PythonExecutor::from_config(&SandboxConfig::default());
//! python.initialize().await?;
//! let result = python.execute("print(6 * 7)", None).await?;
//! assert_eq!(result.stdout, "42\n");
//! ```

mod probe;

pub use probe::PythonProbe;

use snipbox_sandbox::{PathAccess, Plan};

use crate::config::{RuntimeConfig, SandboxConfig};
use crate::error::{Error, Result};
use crate::probe::Probe;
use crate::probe_cache::PROBE_CACHE;
use crate::worker::{ProcessExecutor, Runtime};

pub const LANGUAGE: &str = "python";
pub const ALIASES: &[&str] = &["py", "python3"];
pub const EXTENSIONS: &[&str] = &["py"];

/// `RLIMIT_DATA` when the config sets none.
pub const DEFAULT_MEMORY_LIMIT: u64 = 512 * 1024 * 1024;

const DRIVER: &str = include_str!("driver.py");
const DRIVER_FILE: &str = "driver.py";

pub type PythonExecutor = ProcessExecutor<PythonRuntime>;

impl PythonExecutor {
    pub fn from_config(config: &SandboxConfig) -> Self {
        ProcessExecutor::new(
            PythonRuntime::new(config.python.clone()),
            config.defaults,
            config.init_timeout(),
        )
    }
}

#[derive(Debug, Clone)]
pub struct PythonRuntime {
    config: RuntimeConfig,
    probe: PythonProbe,
}

impl PythonRuntime {
    pub fn new(config: RuntimeConfig) -> Self {
        let probe = PythonProbe {
            binary: config.binary.clone(),
            version: None,
        };
        Self { config, probe }
    }
}

impl Runtime for PythonRuntime {
    fn language(&self) -> &'static str {
        LANGUAGE
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        EXTENSIONS
    }

    fn plan(&self) -> Result<Plan> {
        let binary = self.probe.locate().map_err(|e| Error::init(LANGUAGE, e))?;
        let info = PROBE_CACHE
            .get_or_probe(&self.probe, &binary)
            .map_err(|e| Error::init(LANGUAGE, e))?;

        let interpreter = info.executable.to_string_lossy().into_owned();
        let driver = format!("../{DRIVER_FILE}");
        let plan = Plan::new([interpreter.as_str(), "-I", "-B", driver.as_str()])
            .file(DRIVER_FILE, DRIVER)
            .paths(info.readonly_paths.iter().map(PathAccess::ro))
            .paths(self.config.extra_readonly_paths.iter().map(PathAccess::ro_noexec))
            .memory_limit(self.config.memory_limit.unwrap_or(DEFAULT_MEMORY_LIMIT))
            .max_processes(self.config.max_processes)
            .network(self.config.network);

        Ok(info.env.into_iter().fold(plan, |plan, (k, v)| plan.env(k, v)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_identity() {
        let runtime = PythonRuntime::new(RuntimeConfig::default());
        assert_eq!(runtime.language(), "python");
        assert_eq!(runtime.file_extensions(), &["py"]);
    }

    #[test]
    fn plan_fails_for_missing_binary() {
        let runtime = PythonRuntime::new(RuntimeConfig {
            binary: Some("/nonexistent/python3".into()),
            ..Default::default()
        });
        let err = runtime.plan().unwrap_err();
        assert!(matches!(err, Error::Initialization { .. }));
    }

    #[test]
    fn plan_for_installed_python() {
        let runtime = PythonRuntime::new(RuntimeConfig {
            extra_readonly_paths: vec!["/opt/data".into()],
            ..Default::default()
        });
        let Some(binary) = PythonProbe::new().detect() else {
            eprintln!("Skipping: python not installed");
            return;
        };
        let plan = runtime.plan().unwrap();
        let info = PROBE_CACHE.get_or_probe(&PythonProbe::new(), &binary).unwrap();

        assert_eq!(plan.cmd[0], info.executable.to_string_lossy());
        assert_eq!(&plan.cmd[1..], &["-I", "-B", "../driver.py"]);
        assert_eq!(plan.user_files[0].path, "driver.py");
        assert_eq!(plan.memory_limit, Some(DEFAULT_MEMORY_LIMIT));
        assert!(plan.network_blocked);
        assert!(plan.paths.contains(&PathAccess::ro_noexec("/opt/data")));
    }

    #[test]
    fn driver_is_embedded() {
        assert!(DRIVER.contains("\"ready\""));
        assert!(DRIVER.contains("<input>"));
    }
}
