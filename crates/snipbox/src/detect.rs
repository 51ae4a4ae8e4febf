//! Interpreter discovery helpers.
//!
//! Probes chain these in order: explicit override, environment variable,
//! `PATH` lookup, then fixed fallback locations.

use std::path::{Path, PathBuf};

/// An existing executable file at `path`, if any.
pub fn executable(path: &Path) -> Option<PathBuf> {
    (path.is_file() && is_executable(path)).then(|| path.to_path_buf())
}

/// First of `names` found on `PATH`, else the first existing `fallbacks` entry.
pub fn resolve_binary(names: &[&str], fallbacks: &[&str]) -> Option<PathBuf> {
    names
        .iter()
        .find_map(|name| which::which(name).ok())
        .or_else(|| fallbacks.iter().find_map(|f| executable(Path::new(f))))
}

/// Binary named by an environment variable holding a file path.
pub fn resolve_env_binary(env_var: &str) -> Option<PathBuf> {
    let value = std::env::var_os(env_var)?;
    executable(Path::new(&value))
}

/// Binary inside an environment prefix such as `$VIRTUAL_ENV`.
///
/// Looks for `<prefix>/bin/<name>`, then `<prefix>/<name>`.
pub fn resolve_env_prefix(env_var: &str, name: &str) -> Option<PathBuf> {
    let prefix = PathBuf::from(std::env::var_os(env_var)?);
    if !prefix.is_dir() {
        return None;
    }
    executable(&prefix.join("bin").join(name)).or_else(|| executable(&prefix.join(name)))
}

/// For `/usr/bin/python3`, returns `/usr`. Never returns `/`: for
/// `/bin/python3` it returns `/bin`.
pub fn prefix_dir(binary: &Path) -> Option<PathBuf> {
    let bin_dir = binary.parent()?;
    match bin_dir.parent() {
        Some(prefix) if bin_dir.ends_with("bin") && prefix.parent().is_some() => {
            Some(prefix.to_path_buf())
        }
        _ => Some(bin_dir.to_path_buf()),
    }
}

/// Describe what a discovery chain searched, for `ProbeError::NotFound`.
pub fn searched(env_vars: &[&str], names: &[&str], fallbacks: &[&str]) -> String {
    let mut lines: Vec<String> = env_vars.iter().map(|v| format!("    ${v}")).collect();
    lines.extend(names.iter().map(|n| format!("    PATH: {n}")));
    lines.extend(fallbacks.iter().map(|f| format!("    {f}")));
    lines.join("\n")
}

fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.metadata()
        .map(|m| m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}
