//! Isolation mechanisms for sandboxed workers.
//!
//! - **lockdown** - Landlock filesystem/network rules and parent-death signal
//! - **rlimits** - Kernel resource limits

mod lockdown;
mod rlimits;

pub use lockdown::{Lockdown, LockdownError};
pub use rlimits::{Limits, apply_rlimits};
