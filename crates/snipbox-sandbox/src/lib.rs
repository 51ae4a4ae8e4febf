//! snipbox-sandbox: isolated worker processes
//!
//! This crate starts long-lived interpreter workers on Linux with layered
//! isolation:
//!
//! - **Landlock** - Filesystem access control, plus TCP bind/connect denial
//!   on ABI 4+ kernels
//! - **Rlimits** - Resource limits (memory, open files, file size, processes)
//! - **Private workspace** - A temporary directory that is the only writable
//!   location and is removed with the worker
//! - **Cleared environment** - The worker never sees host environment variables
//! - **Process group** - Killing a worker also kills everything it spawned
//!
//! Landlock is applied best effort, so workers still start on kernels that
//! lack it.
//!
//! ## Quick Start
//!
//! ```ignore
//! use snipbox_sandbox::{IsolatedProcess, Plan};
//!
//! let plan = Plan::new(["/usr/bin/python3", "-I", "../driver.py"]);
//! let mut worker = IsolatedProcess::spawn(plan)?;
//! let stdin = worker.take_stdin();
//! ```

pub mod isolation;
pub mod plan;
pub mod process;
pub mod sysinfo;
pub mod validate;
pub mod workspace;

pub use isolation::{Lockdown, LockdownError};
pub use plan::{PathAccess, Plan, UserFile};
pub use process::{IsolatedProcess, KillHandle, SandboxError};
pub use sysinfo::{SYSTEM_PATHS, SystemPaths, SystemType};
pub use validate::ValidationError;
pub use workspace::Workspace;
