//! JavaScript runtime (Node.js).
//!
//! The worker runs `node --max-old-space-size=<MiB> driver.js`. Each
//! execution gets a fresh `vm` context exposing only `console`; a returned
//! thenable is awaited before the execution completes.
//!
//! The memory limit is applied as the V8 heap size rather than
//! `RLIMIT_DATA`, because V8 reserves far more address space than it uses.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Deserialize;
use snipbox_sandbox::{PathAccess, Plan};

use crate::config::{NODE_ENV, RuntimeConfig, SandboxConfig};
use crate::detect::{executable, prefix_dir, resolve_binary, resolve_env_binary};
use crate::error::{Error, ProbeError, Result};
use crate::probe::{Probe, RuntimeInfo};
use crate::probe_cache::PROBE_CACHE;
use crate::worker::{ProcessExecutor, Runtime};

pub const LANGUAGE: &str = "javascript";
pub const ALIASES: &[&str] = &["js", "node", "nodejs"];
pub const EXTENSIONS: &[&str] = &["js", "mjs", "cjs"];

/// V8 old-space size when the config sets no memory limit.
pub const DEFAULT_HEAP_LIMIT: u64 = 256 * 1024 * 1024;
const MIN_HEAP_MIB: u64 = 16;

const OPENSSL_CONFIG_FLAG: &str = "--openssl-config=/dev/null";

const DRIVER: &str = include_str!("driver.js");
const DRIVER_FILE: &str = "driver.js";

const NAMES: [&str; 2] = ["node", "nodejs"];
const FALLBACKS: [&str; 2] = ["/usr/bin/node", "/usr/local/bin/node"];

pub type JavaScriptExecutor = ProcessExecutor<JavaScriptRuntime>;

impl JavaScriptExecutor {
    pub fn from_config(config: &SandboxConfig) -> Self {
        ProcessExecutor::new(
            JavaScriptRuntime::new(config.javascript.clone()),
            config.defaults,
            config.init_timeout(),
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct NodeProbe {
    /// Explicit binary; skips discovery when set.
    pub binary: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NodeInfo {
    version: String,
    exec_path: PathBuf,
}

impl Probe for NodeProbe {
    fn name(&self) -> &str {
        "node"
    }

    fn detect(&self) -> Option<PathBuf> {
        match &self.binary {
            Some(binary) => executable(binary),
            None => resolve_env_binary(NODE_ENV).or_else(|| resolve_binary(&NAMES, &FALLBACKS)),
        }
    }

    fn searched(&self) -> String {
        match &self.binary {
            Some(binary) => format!("    {} (configured)", binary.display()),
            None => crate::detect::searched(&[NODE_ENV], &NAMES, &FALLBACKS),
        }
    }

    fn probe(&self, binary: &Path) -> Result<RuntimeInfo, ProbeError> {
        let output = Command::new(binary)
            .args([
                "-e",
                "console.log(JSON.stringify({version: process.version, execPath: process.execPath}))",
            ])
            .env_clear()
            .output()
            .map_err(|e| ProbeError::ProbeScriptFailed(format!("failed to run node: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProbeError::ProbeScriptFailed(format!(
                "node probe failed: {stderr}"
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let info: NodeInfo = serde_json::from_str(stdout.trim()).map_err(|e| {
            ProbeError::ParseError(format!("failed to parse node probe output: {e}\n{stdout}"))
        })?;

        // Version managers put a launcher on PATH; run the real binary.
        let interpreter = executable(&info.exec_path).unwrap_or_else(|| binary.to_path_buf());

        let mut paths = BTreeSet::new();
        paths.extend(prefix_dir(&interpreter));

        Ok(RuntimeInfo::new(binary.to_path_buf())
            .executable(interpreter)
            .version(info.version)
            .readonly_paths(paths.into_iter().filter(|p| p.exists())))
    }
}

#[derive(Debug, Clone)]
pub struct JavaScriptRuntime {
    config: RuntimeConfig,
    probe: NodeProbe,
}

impl JavaScriptRuntime {
    pub fn new(config: RuntimeConfig) -> Self {
        let probe = NodeProbe {
            binary: config.binary.clone(),
        };
        Self { config, probe }
    }

    fn heap_mib(&self) -> u64 {
        let bytes = self.config.memory_limit.unwrap_or(DEFAULT_HEAP_LIMIT);
        (bytes / (1024 * 1024)).max(MIN_HEAP_MIB)
    }
}

impl Runtime for JavaScriptRuntime {
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
        let heap = format!("--max-old-space-size={}", self.heap_mib());
        let driver = format!("../{DRIVER_FILE}");

        // Node reads the system OpenSSL config at startup, which the sandbox
        // does not expose.
        Ok(Plan::new([
            interpreter.as_str(),
            OPENSSL_CONFIG_FLAG,
            heap.as_str(),
            driver.as_str(),
        ])
            .file(DRIVER_FILE, DRIVER)
            .paths(info.readonly_paths.iter().map(PathAccess::ro))
            .paths(self.config.extra_readonly_paths.iter().map(PathAccess::ro_noexec))
            .max_processes(self.config.max_processes)
            .network(self.config.network))
    }
}
