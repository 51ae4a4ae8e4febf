//! Spawning isolated worker processes.
//!
//! An [`IsolatedProcess`] is a long-lived child started from a [`Plan`]:
//!
//! 1. The plan is validated and a private [`Workspace`] is created.
//! 2. Plan files (runtime drivers) are written to the workspace root.
//! 3. The [`Lockdown`] is prepared in the parent and applied in `pre_exec`.
//! 4. The child starts in its own process group with a cleared environment
//!    and piped stdio.
//!
//! Killing goes through a [`KillHandle`], which signals the whole process
//! group so that grandchildren spawned by user code die with the worker.

use std::io;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rustix::process::{Pid, Signal, kill_process_group};
use thiserror::Error;
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};

use crate::isolation::{Lockdown, LockdownError};
use crate::plan::Plan;
use crate::validate::{ValidationError, validate_plan};
use crate::workspace::Workspace;

/// Error while starting a sandboxed worker.
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("validation: {0}")]
    Validation(#[from] ValidationError),

    #[error("workspace: {0}")]
    Workspace(io::Error),

    #[error("lockdown: {0}")]
    Lockdown(#[from] LockdownError),

    #[error("spawn {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: io::Error,
    },

    #[error("io: {0}")]
    Io(#[from] io::Error),
}

/// Sends `SIGKILL` to a worker's process group.
///
/// Cheap to clone and callable from synchronous code, including `Drop`.
#[derive(Debug, Clone)]
pub struct KillHandle {
    pgid: Option<Pid>,
    reaped: Arc<AtomicBool>,
}

impl KillHandle {
    /// Kill the worker and everything it spawned. Idempotent.
    pub fn kill(&self) {
        if self.reaped.load(Ordering::Acquire) {
            return;
        }
        if let Some(pgid) = self.pgid {
            // ESRCH just means the group is already gone.
            kill_process_group(pgid, Signal::KILL).ok();
        }
    }

    pub fn is_reaped(&self) -> bool {
        self.reaped.load(Ordering::Acquire)
    }
}

/// A running sandboxed worker.
#[derive(Debug)]
pub struct IsolatedProcess {
    child: Child,
    kill: KillHandle,
    workspace: Workspace,
}

impl IsolatedProcess {
    /// Start a worker from `plan`. Must be called inside a tokio runtime.
    pub fn spawn(plan: Plan) -> Result<Self, SandboxError> {
        validate_plan(&plan)?;

        let workspace = Workspace::new().map_err(SandboxError::Workspace)?;
        for file in &plan.user_files {
            workspace
                .write_file(&file.path, &file.content, file.executable)
                .map_err(SandboxError::Workspace)?;
        }

        let mut lockdown = Lockdown::prepare(&plan, &workspace)?;

        let mut cmd = Command::new(&plan.cmd[0]);
        cmd.args(&plan.cmd[1..])
            .env_clear()
            .envs(&plan.env)
            .env("HOME", workspace.root().join("home"))
            .env("TMPDIR", workspace.root().join("tmp"))
            .current_dir(workspace.root().join(&plan.cwd))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .kill_on_drop(true);

        // SAFETY: `Lockdown::apply` only issues syscalls on data prepared
        // before fork and does not allocate.
        unsafe {
            cmd.pre_exec(move || lockdown.apply().map_err(io::Error::from));
        }

        let child = cmd.spawn().map_err(|source| SandboxError::Spawn {
            binary: plan.cmd[0].clone(),
            source,
        })?;

        let pgid = child.id().and_then(|id| Pid::from_raw(id as i32));
        tracing::debug!(
            binary = %plan.cmd[0],
            pid = ?child.id(),
            workspace = %workspace.root().display(),
            "spawned sandboxed worker"
        );

        Ok(Self {
            child,
            kill: KillHandle {
                pgid,
                reaped: Arc::new(AtomicBool::new(false)),
            },
            workspace,
        })
    }

    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    pub fn kill_handle(&self) -> KillHandle {
        self.kill.clone()
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn take_stdin(&mut self) -> Option<ChildStdin> {
        self.child.stdin.take()
    }

    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.child.stderr.take()
    }

    /// Wait for the worker to exit.
    pub async fn wait(&mut self) -> io::Result<ExitStatus> {
        let status = self.child.wait().await;
        self.kill.reaped.store(true, Ordering::Release);
        status
    }

    /// Check whether the worker has exited without blocking.
    pub fn try_wait(&mut self) -> io::Result<Option<ExitStatus>> {
        let status = self.child.try_wait()?;
        if status.is_some() {
            self.kill.reaped.store(true, Ordering::Release);
        }
        Ok(status)
    }

    /// Kill the worker's process group and reap it.
    pub async fn kill(&mut self) -> io::Result<ExitStatus> {
        self.kill.kill();
        self.wait().await
    }
}

impl Drop for IsolatedProcess {
    fn drop(&mut self) {
        self.kill.kill();
    }
}
