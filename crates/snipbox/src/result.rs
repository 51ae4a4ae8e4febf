//! Execution results.
//!
//! Contains the result of one execution: captured output, error, and timing.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::capture::CaptureSnapshot;
use crate::options::duration_ms;

/// Error reported by executed code, or synthesized by the sandbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub message: String,
    /// Runtime error class (`ZeroDivisionError`, `ReferenceError`, ...).
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// 1-indexed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    /// 1-indexed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
}

impl ErrorInfo {
    pub const TIMEOUT: &'static str = "Timeout";
    pub const TERMINATED: &'static str = "Terminated";
    pub const WORKER_EXITED: &'static str = "WorkerExited";

    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            message: if message.is_empty() {
                "unknown error".to_string()
            } else {
                message
            },
            kind: None,
            line: None,
            column: None,
        }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        let kind = kind.into();
        self.kind = (!kind.is_empty()).then_some(kind);
        self
    }

    /// Attach a source position; non-positive values are dropped.
    pub fn at(mut self, line: Option<i64>, column: Option<i64>) -> Self {
        self.line = line.and_then(positive);
        self.column = column.and_then(positive);
        self
    }

    pub fn timeout(timeout: Duration) -> Self {
        Self::new(format!("execution timeout after {} ms", timeout.as_millis()))
            .with_kind(Self::TIMEOUT)
    }

    pub fn terminated() -> Self {
        Self::new("execution terminated").with_kind(Self::TERMINATED)
    }

    pub fn worker_exited(detail: impl std::fmt::Display) -> Self {
        Self::new(format!("runtime worker exited unexpectedly: {detail}"))
            .with_kind(Self::WORKER_EXITED)
    }

    pub fn is_kind(&self, kind: &str) -> bool {
        self.kind.as_deref() == Some(kind)
    }
}

fn positive(n: i64) -> Option<u32> {
    u32::try_from(n).ok().filter(|&n| n > 0)
}

/// Outcome of one execution.
///
/// `error` is present exactly when `success` is false, and `timed_out`
/// implies `!success`. The constructors are the only way these are built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
    #[serde(with = "duration_ms")]
    pub execution_time: Duration,
    pub timed_out: bool,
    /// Either stream hit its line or byte cap.
    #[serde(default)]
    pub truncated: bool,
}

impl ExecutionResult {
    /// Successful execution with no output, for empty code.
    pub fn empty() -> Self {
        Self::completed(CaptureSnapshot::default(), None)
    }

    /// Execution that ran to completion, with or without a runtime error.
    pub fn completed(output: CaptureSnapshot, error: Option<ErrorInfo>) -> Self {
        Self {
            success: error.is_none(),
            stdout: output.stdout,
            stderr: output.stderr,
            error,
            execution_time: Duration::ZERO,
            timed_out: false,
            truncated: output.truncated,
        }
    }

    /// Execution that ended in error.
    pub fn failed(output: CaptureSnapshot, error: ErrorInfo) -> Self {
        Self::completed(output, Some(error))
    }

    /// Execution cut off at its deadline.
    pub fn timed_out(output: CaptureSnapshot, timeout: Duration) -> Self {
        Self {
            timed_out: true,
            ..Self::failed(output, ErrorInfo::timeout(timeout))
        }
    }

    pub fn with_execution_time(mut self, elapsed: Duration) -> Self {
        self.execution_time = elapsed;
        self
    }

    pub fn execution_time_ms(&self) -> u64 {
        self.execution_time.as_millis().try_into().unwrap_or(u64::MAX)
    }
}
