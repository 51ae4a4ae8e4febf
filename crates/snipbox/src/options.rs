//! Per-execution options.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Options recognized by every executor.
///
/// Deserializes from camelCase (`timeout` in milliseconds, `maxOutputLines`,
/// `maxOutputBytes`); missing fields take the defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExecutionOptions {
    /// Wall-clock deadline for one execution.
    #[serde(with = "duration_ms")]
    pub timeout: Duration,
    /// Lines kept per stream before truncation.
    pub max_output_lines: usize,
    /// Bytes kept per stream before truncation.
    pub max_output_bytes: usize,
}

/// Defaults applied when a caller leaves options unspecified.
pub const DEFAULT_EXECUTION_OPTIONS: ExecutionOptions = ExecutionOptions {
    timeout: Duration::from_millis(5000),
    max_output_lines: 1000,
    max_output_bytes: 1024 * 1024,
};

impl Default for ExecutionOptions {
    fn default() -> Self {
        DEFAULT_EXECUTION_OPTIONS
    }
}

impl ExecutionOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_timeout_ms(self, ms: u64) -> Self {
        self.with_timeout(Duration::from_millis(ms))
    }

    pub fn with_max_output_lines(mut self, lines: usize) -> Self {
        self.max_output_lines = lines;
        self
    }

    pub fn with_max_output_bytes(mut self, bytes: usize) -> Self {
        self.max_output_bytes = bytes;
        self
    }

    /// Reject zero limits.
    pub fn validate(&self) -> Result<()> {
        if self.timeout.is_zero() {
            return Err(Error::InvalidOptions("timeout must be positive".into()));
        }
        if self.max_output_lines == 0 {
            return Err(Error::InvalidOptions("maxOutputLines must be positive".into()));
        }
        if self.max_output_bytes == 0 {
            return Err(Error::InvalidOptions("maxOutputBytes must be positive".into()));
        }
        Ok(())
    }
}

/// `Duration` as integer milliseconds.
pub(crate) mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis().try_into().unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let opts = ExecutionOptions::default();
        assert_eq!(opts.timeout, Duration::from_millis(5000));
        assert_eq!(opts.max_output_lines, 1000);
        assert_eq!(opts, DEFAULT_EXECUTION_OPTIONS);
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn deserialize_partial_camel_case() {
        let opts: ExecutionOptions = serde_json::from_str(r#"{"timeout": 200}"#).unwrap();
        assert_eq!(opts.timeout, Duration::from_millis(200));
        assert_eq!(opts.max_output_lines, 1000);

        let opts: ExecutionOptions = serde_json::from_str(r#"{"maxOutputLines": 3}"#).unwrap();
        assert_eq!(opts.timeout, Duration::from_millis(5000));
        assert_eq!(opts.max_output_lines, 3);
    }

    #[test]
    fn serialize_timeout_as_millis() {
        let json = serde_json::to_value(ExecutionOptions::default().with_timeout_ms(250)).unwrap();
        assert_eq!(json["timeout"], 250);
        assert_eq!(json["maxOutputLines"], 1000);
    }

    #[test]
    fn zero_values_rejected() {
        let opts = ExecutionOptions::default().with_timeout(Duration::ZERO);
        assert!(matches!(opts.validate(), Err(Error::InvalidOptions(_))));

        let opts = ExecutionOptions::default().with_max_output_lines(0);
        assert!(matches!(opts.validate(), Err(Error::InvalidOptions(_))));

        let opts = ExecutionOptions::default().with_max_output_bytes(0);
        assert!(matches!(opts.validate(), Err(Error::InvalidOptions(_))));
    }
}
