//! The uniform executor contract and its lifecycle.
//!
//! ```text
//!                 initialize()                 execute()
//! Uninitialized ─────────────▶ Initializing ──▶ Ready ◀──────▶ Executing
//!       ▲                          │              │                │
//!       └──── failure ─────────────┘              └── terminate() ─┘
//!                                                  (via Terminated)
//! ```

use std::fmt;

use async_trait::async_trait;

use crate::error::Result;
use crate::options::ExecutionOptions;
use crate::result::ExecutionResult;

/// Lifecycle state of one executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdapterState {
    Uninitialized,
    Initializing,
    Ready,
    Executing,
    Terminated,
}

impl fmt::Display for AdapterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AdapterState::Uninitialized => "uninitialized",
            AdapterState::Initializing => "initializing",
            AdapterState::Ready => "ready",
            AdapterState::Executing => "executing",
            AdapterState::Terminated => "terminated",
        })
    }
}

/// Runs code for one language inside an isolated context.
///
/// Errors raised by the executed code are not `Err`: they are reported in
/// [`ExecutionResult::error`]. `Err` is reserved for lifecycle problems
/// (`NotInitialized`, `Busy`, `Initialization`, `InvalidOptions`).
#[async_trait]
pub trait CodeExecutor: Send + Sync {
    /// Stable identifier, e.g. `"python"`.
    fn language(&self) -> &str;

    /// Extensions without the leading dot.
    fn file_extensions(&self) -> &[&str];

    fn state(&self) -> AdapterState;

    fn is_ready(&self) -> bool {
        self.state() == AdapterState::Ready
    }

    fn is_loading(&self) -> bool {
        self.state() == AdapterState::Initializing
    }

    /// Bring the executor to `Ready`.
    ///
    /// A no-op when already ready. A caller arriving while another
    /// initialization is in flight waits for it and shares its outcome.
    /// On failure the executor returns to `Uninitialized`.
    async fn initialize(&self) -> Result<()>;

    /// Run `code`. `None` options take the executor's defaults.
    ///
    /// Requires `Ready`. After a timeout or a worker exit the result comes
    /// back as soon as the old worker is gone and the replacement starts in
    /// the background, so until it is up the state reads `Uninitialized` or
    /// `Initializing` and `execute` fails with `NotInitialized`. Calling
    /// `initialize()` first waits for the replacement; `Sandbox::execute`
    /// does that on every call.
    async fn execute(&self, code: &str, options: Option<ExecutionOptions>) -> Result<ExecutionResult>;

    /// Stop any in-flight work and release the isolated context.
    ///
    /// Never fails and may be called in any state.
    fn terminate(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_display() {
        assert_eq!(AdapterState::Uninitialized.to_string(), "uninitialized");
        assert_eq!(AdapterState::Executing.to_string(), "executing");
    }
}
