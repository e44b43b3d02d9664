//! Path utilities for rendezvous sockets.

use std::path::{Path, PathBuf};

/// Prefix shared by every rendezvous socket file.
pub const SOCKET_PREFIX: &str = "forkpool";

/// Get the default directory for rendezvous sockets.
///
/// Prefers the per-user runtime directory (`$XDG_RUNTIME_DIR` on Linux) and
/// falls back to the system temp directory where none exists (macOS, containers).
pub fn default_socket_dir() -> PathBuf {
    dirs::runtime_dir().unwrap_or_else(std::env::temp_dir)
}

/// Derive the rendezvous socket path for one unit of a run.
///
/// The coordinator pid is part of the name so concurrent runs sharing a
/// directory never collide.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use forkpool::paths::socket_path;
///
/// let path = socket_path(Path::new("/run/user/1000"), 4242, 3);
/// assert_eq!(path, Path::new("/run/user/1000/forkpool-4242-3.sock"));
/// ```
pub fn socket_path(dir: &Path, coordinator_pid: u32, unit: usize) -> PathBuf {
    dir.join(format!("{SOCKET_PREFIX}-{coordinator_pid}-{unit}.sock"))
}

/// Expands a leading `~` in a path to the user's home directory.
///
/// Handles `--socket-dir=~/sockets`, where the shell does not expand the tilde.
pub fn expand_tilde<P: AsRef<Path>>(path: P) -> PathBuf {
    let path = path.as_ref();
    if let Ok(stripped) = path.strip_prefix("~")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(stripped);
    }
    path.to_path_buf()
}
