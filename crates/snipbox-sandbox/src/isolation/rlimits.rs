//! Resource limits for sandboxed workers.
//!
//! Sets kernel-enforced resource limits to prevent denial-of-service.
//!
//! ## Limits Applied
//!
//! | Limit | Purpose | Default |
//! |-------|---------|---------|
//! | `RLIMIT_DATA` | Memory usage | none (per runtime config) |
//! | `RLIMIT_FSIZE` | Written file size | 16 MiB |
//! | `RLIMIT_NOFILE` | Open file descriptors | 256 |
//! | `RLIMIT_NPROC` | Max processes | none (per runtime config) |
//! | `RLIMIT_CORE` | Core dump size | 0 (disabled) |
//!
//! There is no `RLIMIT_CPU`: a worker lives across many executions, and the
//! wall-clock deadline is enforced by the host.
//!
//! ## Note on `RLIMIT_AS`
//!
//! We intentionally do NOT set `RLIMIT_AS` (virtual address space).
//! Runtimes like V8 pre-allocate large virtual address ranges but only
//! commit small portions. `RLIMIT_DATA` limits actual memory and is more
//! appropriate.

use rustix::io::Errno;
use rustix::process::{Resource, Rlimit, getrlimit, setrlimit};

use crate::plan::Plan;

/// Limits resolved from a plan, computed before fork so that applying them
/// in the child allocates nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub data: Option<u64>,
    pub file_size: u64,
    pub open_files: u64,
    pub processes: Option<u64>,
}

impl Limits {
    pub fn from_plan(plan: &Plan) -> Self {
        Self {
            data: plan.memory_limit,
            file_size: plan.max_file_size,
            open_files: plan.max_open_files,
            processes: plan.max_processes,
        }
    }
}

/// Apply resource limits to the calling process.
///
/// Async-signal-safe: only issues `prlimit64` syscalls.
pub fn apply_rlimits(limits: &Limits) -> Result<(), Errno> {
    if let Some(data) = limits.data {
        set_rlimit(Resource::Data, data)?;
    }
    set_rlimit(Resource::Fsize, limits.file_size)?;
    set_rlimit(Resource::Nofile, limits.open_files)?;
    if let Some(processes) = limits.processes {
        set_rlimit(Resource::Nproc, processes)?;
    }
    set_rlimit(Resource::Core, 0)?;
    Ok(())
}

/// Limits above the inherited hard limit are clamped rather than refused.
#[inline]
fn set_rlimit(resource: Resource, limit: u64) -> Result<(), Errno> {
    let limit = getrlimit(resource).maximum.map_or(limit, |max| limit.min(max));
    setrlimit(
        resource,
        Rlimit {
            current: Some(limit),
            maximum: Some(limit),
        },
    )
}
