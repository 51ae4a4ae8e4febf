//! Security lockdown for sandboxed workers.
//!
//! Lockdown is split in two halves because everything that allocates or opens
//! files must happen in the parent, before fork:
//!
//! 1. [`Lockdown::prepare`] (parent) resolves resource limits and builds the
//!    Landlock ruleset, opening one `O_PATH` descriptor per allowed path.
//! 2. [`Lockdown::apply`] (child, between fork and exec) sets the
//!    parent-death signal, applies rlimits, sets `NO_NEW_PRIVS` and restricts
//!    the process with the prepared ruleset.
//!
//! After lockdown, the worker cannot:
//! - Write anywhere except its workspace (and `/dev/null`)
//! - Read outside system directories, runtime paths and its workspace
//! - Bind or connect TCP sockets when network is blocked (Landlock ABI 4+)
//! - Exceed resource limits
//! - Gain new privileges
//!
//! Landlock is applied best effort: on kernels without Landlock the worker
//! still runs with rlimits, a cleared environment and a private workspace.

use std::io;

use thiserror::Error;

use super::rlimits::{Limits, apply_rlimits};
use crate::plan::Plan;
use crate::workspace::Workspace;

/// Error during security lockdown.
#[derive(Debug, Error)]
pub enum LockdownError {
    #[cfg(target_os = "linux")]
    #[error("landlock: {0}")]
    Landlock(#[from] landlock::RulesetError),

    #[error("rlimit: {0}")]
    Rlimit(rustix::io::Errno),

    #[error("parent death signal: {0}")]
    DeathSignal(rustix::io::Errno),

    #[error("lockdown already applied")]
    AlreadyApplied,
}

/// Conversion used inside `pre_exec`, so it never allocates.
impl From<LockdownError> for io::Error {
    fn from(e: LockdownError) -> Self {
        match e {
            LockdownError::Rlimit(errno) | LockdownError::DeathSignal(errno) => errno.into(),
            #[cfg(target_os = "linux")]
            LockdownError::Landlock(_) => io::ErrorKind::PermissionDenied.into(),
            LockdownError::AlreadyApplied => io::ErrorKind::Other.into(),
        }
    }
}

/// Prepared restrictions for one worker.
pub struct Lockdown {
    limits: Limits,
    #[cfg(target_os = "linux")]
    ruleset: Option<landlock::RulesetCreated>,
    applied: bool,
}

impl std::fmt::Debug for Lockdown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lockdown")
            .field("limits", &self.limits)
            .field("applied", &self.applied)
            .finish_non_exhaustive()
    }
}

impl Lockdown {
    /// Build the restrictions for `plan` running in `workspace`. Parent side.
    pub fn prepare(plan: &Plan, workspace: &Workspace) -> Result<Self, LockdownError> {
        Ok(Self {
            limits: Limits::from_plan(plan),
            #[cfg(target_os = "linux")]
            ruleset: Some(landlock_rules::build(plan, workspace)?),
            applied: false,
        })
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Restrict the calling process. Child side, between fork and exec.
    ///
    /// Must not allocate: it runs in a forked copy of a multi-threaded host.
    pub fn apply(&mut self) -> Result<(), LockdownError> {
        if self.applied {
            return Err(LockdownError::AlreadyApplied);
        }
        self.applied = true;

        #[cfg(target_os = "linux")]
        rustix::process::set_parent_process_death_signal(Some(rustix::process::Signal::KILL))
            .map_err(LockdownError::DeathSignal)?;

        apply_rlimits(&self.limits).map_err(LockdownError::Rlimit)?;

        #[cfg(target_os = "linux")]
        if let Some(ruleset) = self.ruleset.take() {
            ruleset.restrict_self()?;
        }

        Ok(())
    }
}

#[cfg(target_os = "linux")]
mod landlock_rules {
    use std::path::Path;

    use landlock::{
        ABI, Access, AccessFs, AccessNet, BitFlags, PathBeneath, PathFd, Ruleset, RulesetAttr,
        RulesetCreated, RulesetCreatedAttr, RulesetError,
    };

    use crate::plan::Plan;
    use crate::sysinfo::SYSTEM_PATHS;
    use crate::workspace::Workspace;

    const ABI_VERSION: ABI = ABI::V4;

    pub(super) fn build(plan: &Plan, workspace: &Workspace) -> Result<RulesetCreated, RulesetError> {
        let abi = ABI_VERSION;
        let all = AccessFs::from_all(abi);
        let read = AccessFs::from_read(abi);
        let read_noexec = read & !AccessFs::Execute;
        let file_only = AccessFs::from_file(abi);

        let mut ruleset = Ruleset::default().handle_access(all)?;
        if plan.network_blocked {
            // Handled but never allowed: every TCP bind/connect is denied.
            ruleset = ruleset.handle_access(AccessNet::from_all(abi))?;
        }
        let mut created = ruleset.create()?;

        let sys = &*SYSTEM_PATHS;
        for dir in &sys.readonly_dirs {
            created = allow(created, dir, read, file_only)?;
        }
        for file in &sys.readonly_files {
            created = allow(created, file, read, file_only)?;
        }
        for device in &sys.writable_devices {
            created = allow(created, device, file_only, file_only)?;
        }

        // The workspace root holds the driver; only the subdirectories are writable.
        created = allow(created, workspace.root(), read, file_only)?;
        for dir in workspace.writable_dirs() {
            created = allow(created, &dir, all, file_only)?;
        }

        for access in &plan.paths {
            let rights = match (access.writable, access.executable) {
                (true, _) => all,
                (false, true) => read,
                (false, false) => read_noexec,
            };
            created = allow(created, &access.path, rights, file_only)?;
        }

        Ok(created)
    }

    /// Add one rule; missing paths are skipped, files only get file rights.
    fn allow(
        created: RulesetCreated,
        path: &Path,
        rights: BitFlags<AccessFs>,
        file_only: BitFlags<AccessFs>,
    ) -> Result<RulesetCreated, RulesetError> {
        let fd = match PathFd::new(path) {
            Ok(fd) => fd,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "skipping landlock rule");
                return Ok(created);
            }
        };
        let rights = if path.is_dir() { rights } else { rights & file_only };
        created.add_rule(PathBeneath::new(fd, rights))
    }
}
