//! System information and path detection.
//!
//! Detects the system type (NixOS, Guix, traditional FHS) and provides the
//! read-only paths every worker needs plus a sensible default `PATH`.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

pub static SYSTEM_PATHS: LazyLock<SystemPaths> = LazyLock::new(SystemPaths::detect);

/// System type detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemType {
    /// NixOS - binaries in /nix/store, no standard FHS paths
    NixOS,
    /// Guix - similar to NixOS, binaries in /gnu/store
    Guix,
    /// Standard FHS Linux (Debian, Ubuntu, Fedora, Arch, etc.)
    Fhs,
}

impl SystemType {
    /// Detect the current system type.
    pub fn detect() -> Self {
        if Path::new("/etc/NIXOS").exists() {
            return SystemType::NixOS;
        }
        if store_owns_sh("/nix/store") {
            return SystemType::NixOS;
        }
        if store_owns_sh("/gnu/store") {
            return SystemType::Guix;
        }
        SystemType::Fhs
    }

    pub fn is_nix_like(self) -> bool {
        matches!(self, SystemType::NixOS | SystemType::Guix)
    }
}

/// A store-based distro either has no `/bin/sh` or links it into the store.
fn store_owns_sh(store: &str) -> bool {
    if !Path::new(store).exists() {
        return false;
    }
    match std::fs::read_link("/bin/sh") {
        Ok(target) => target.to_string_lossy().contains(store),
        Err(_) => !Path::new("/bin/sh").exists(),
    }
}

/// Paths that exist on the current system and are granted to every worker.
#[derive(Debug, Clone)]
pub struct SystemPaths {
    pub system_type: SystemType,
    /// Directories readable (and executable) by every worker.
    pub readonly_dirs: Vec<PathBuf>,
    /// Individual files readable by every worker.
    pub readonly_files: Vec<PathBuf>,
    /// Device files the worker may also write (`/dev/null`).
    pub writable_devices: Vec<PathBuf>,
    /// Default PATH environment variable
    pub default_path: String,
}

impl SystemPaths {
    /// Detect system paths.
    pub fn detect() -> Self {
        let system_type = SystemType::detect();

        // /etc is NOT granted as a whole to prevent information leakage;
        // only the files the dynamic loader and libc need are readable.
        let (dirs, default_path): (&[&str], &str) = match system_type {
            SystemType::NixOS => (
                &["/nix/store", "/run/current-system/sw"],
                "/run/current-system/sw/bin:/nix/var/nix/profiles/default/bin",
            ),
            SystemType::Guix => (&["/gnu/store"], "/run/current-system/profile/bin"),
            SystemType::Fhs => (
                &["/usr", "/bin", "/lib", "/lib64", "/sbin"],
                "/usr/local/bin:/usr/bin:/bin",
            ),
        };

        let mut readonly_dirs = existing(dirs);
        readonly_dirs.extend(existing(&["/proc", "/dev"]));

        Self {
            system_type,
            readonly_dirs,
            readonly_files: existing(&["/etc/ld.so.cache", "/etc/localtime"]),
            writable_devices: existing(&["/dev/null"]),
            default_path: default_path.to_string(),
        }
    }
}

fn existing(paths: &[&str]) -> Vec<PathBuf> {
    paths
        .iter()
        .map(Path::new)
        .filter(|p| p.exists())
        .map(Path::to_path_buf)
        .collect()
}
