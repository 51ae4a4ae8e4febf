//! Plan validation.
//!
//! Rejects plans that would fail in confusing ways after fork, or that would
//! let a workspace file escape the workspace:
//!
//! - **Empty commands** - would cause exec to fail
//! - **Relative binaries** - the worker has a cleared `PATH` lookup context
//! - **Null bytes** - could cause string truncation attacks
//! - **Path traversal** - `../` could escape the workspace
//! - **Absolute paths** - workspace files must stay inside the workspace

use std::path::Path;

use thiserror::Error;

use crate::plan::Plan;

/// Validation error for sandbox inputs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("command cannot be empty")]
    EmptyCommand,

    #[error("argument {0} is empty")]
    EmptyArgument(usize),

    #[error("binary must be an absolute path: {0}")]
    RelativeBinary(String),

    #[error("null byte in input")]
    NullByte,

    #[error("invalid environment variable name: {0:?}")]
    InvalidEnvKey(String),

    #[error("path traversal not allowed")]
    PathTraversal,

    #[error("absolute path not allowed")]
    AbsolutePath,

    #[error("path cannot be empty")]
    EmptyPath,
}

/// Validate a whole plan before spawning.
pub fn validate_plan(plan: &Plan) -> Result<(), ValidationError> {
    let cmd: Vec<&str> = plan.cmd.iter().map(String::as_str).collect();
    validate_cmd(&cmd)?;
    if !cmd[0].starts_with('/') {
        return Err(ValidationError::RelativeBinary(cmd[0].to_string()));
    }
    for (key, value) in &plan.env {
        validate_env(key, value)?;
    }
    validate_path(&plan.cwd)?;
    for file in &plan.user_files {
        validate_path(&file.path)?;
    }
    Ok(())
}

/// Validate command and arguments.
pub fn validate_cmd(cmd: &[&str]) -> Result<(), ValidationError> {
    if cmd.is_empty() {
        return Err(ValidationError::EmptyCommand);
    }
    for (i, arg) in cmd.iter().enumerate() {
        if arg.is_empty() {
            return Err(ValidationError::EmptyArgument(i));
        }
        if arg.contains('\0') {
            return Err(ValidationError::NullByte);
        }
    }
    Ok(())
}

/// Validate one environment entry.
pub fn validate_env(key: &str, value: &str) -> Result<(), ValidationError> {
    if key.is_empty() || key.contains('=') {
        return Err(ValidationError::InvalidEnvKey(key.to_string()));
    }
    if key.contains('\0') || value.contains('\0') {
        return Err(ValidationError::NullByte);
    }
    Ok(())
}

/// Validate a relative path (no `..`, no absolute).
pub fn validate_path(path: &str) -> Result<(), ValidationError> {
    if path.is_empty() {
        return Err(ValidationError::EmptyPath);
    }
    if path.contains('\0') {
        return Err(ValidationError::NullByte);
    }
    if path.starts_with('/') {
        return Err(ValidationError::AbsolutePath);
    }
    if has_traversal(path) {
        return Err(ValidationError::PathTraversal);
    }
    Ok(())
}

fn has_traversal(path: &str) -> bool {
    Path::new(path)
        .components()
        .any(|c| matches!(c, std::path::Component::ParentDir))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cmd_valid() {
        assert!(validate_cmd(&["/usr/bin/python3", "driver.py"]).is_ok());
    }

    #[test]
    fn cmd_empty() {
        assert_eq!(validate_cmd(&[]), Err(ValidationError::EmptyCommand));
    }

    #[test]
    fn cmd_null_byte() {
        assert_eq!(
            validate_cmd(&["/bin/echo", "a\0b"]),
            Err(ValidationError::NullByte)
        );
    }

    #[test]
    fn plan_relative_binary() {
        let plan = Plan::new(["python3", "driver.py"]);
        assert_eq!(
            validate_plan(&plan),
            Err(ValidationError::RelativeBinary("python3".into()))
        );
    }

    #[test]
    fn plan_bad_env_key() {
        let plan = Plan::new(["/bin/true"]).env("A=B", "x");
        assert_eq!(
            validate_plan(&plan),
            Err(ValidationError::InvalidEnvKey("A=B".into()))
        );
    }

    #[test]
    fn plan_file_traversal() {
        let plan = Plan::new(["/bin/true"]).file("../escape.py", b"".to_vec());
        assert_eq!(validate_plan(&plan), Err(ValidationError::PathTraversal));
    }

    #[test]
    fn path_traversal() {
        assert_eq!(
            validate_path("../etc/passwd"),
            Err(ValidationError::PathTraversal)
        );
    }

    #[test]
    fn path_absolute() {
        assert_eq!(
            validate_path("/etc/passwd"),
            Err(ValidationError::AbsolutePath)
        );
    }
}
