//! snipbox: run untrusted Python and JavaScript snippets.
//!
//! Each language is served by one long-lived interpreter worker started in an
//! isolated process (see [`snipbox_sandbox`]). Executions share the worker
//! but not their globals, so startup cost is paid once while every snippet
//! still sees a clean namespace.
//!
//! ## Features
//!
//! - **Per-execution timeouts** - A hung snippet is killed and the worker is
//!   replaced in the background
//! - **Bounded output** - stdout and stderr are capped by lines and bytes
//! - **Structured errors** - Exception type, message, line and column
//! - **Lazy runtimes** - A language's worker starts on first use
//!
//! ## Quick Start
//!
//! ```ignore
//! use snipbox::{ExecutionOptions, Sandbox};
//!
//! let sandbox = Sandbox::global();
//!
//! let result = sandbox.execute("python", "print('Hello')", None).await?;
//! assert_eq!(result.stdout, "Hello\n");
//!
//! let options = ExecutionOptions::default().with_timeout_ms(200);
//! let result = sandbox.execute("js", "while (true) {}", Some(options)).await?;
//! assert!(result.timed_out);
//! ```
//!
//! ## Configuration
//!
//! [`Sandbox::global`] reads an optional TOML file named by `SNIPBOX_CONFIG`.
//! Build a [`SandboxConfig`] and an [`ExecutorRegistry`] directly for anything
//! else.

pub mod capture;
pub mod config;
pub mod detect;
pub mod error;
pub mod executor;
pub mod javascript;
pub mod options;
pub mod probe;
pub mod probe_cache;
pub mod protocol;
pub mod python;
pub mod registry;
pub mod result;
pub mod sandbox;
pub mod timeout;
pub mod worker;

pub use capture::{CaptureSnapshot, OutputCapture, Stream};
pub use config::{RuntimeConfig, SandboxConfig};
pub use error::{Error, ProbeError, Result};
pub use executor::{AdapterState, CodeExecutor};
pub use javascript::{JavaScriptExecutor, NodeProbe};
pub use options::{DEFAULT_EXECUTION_OPTIONS, ExecutionOptions};
pub use probe::{Probe, RuntimeInfo};
pub use probe_cache::{PROBE_CACHE, ProbeCache};
pub use python::{PythonExecutor, PythonProbe};
pub use registry::{ExecutorHandle, ExecutorRegistry, LanguageSpec, RegistryBuilder};
pub use result::{ErrorInfo, ExecutionResult};
pub use sandbox::Sandbox;
pub use timeout::{Deadline, Raced, race_against_deadline};
pub use worker::{ProcessExecutor, Runtime};
