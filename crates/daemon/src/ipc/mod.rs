//! Unix Domain Socket IPC module for CLI-daemon communication.
//!
//! This module provides the local channel between the `filehub` CLI and a
//! running daemon.
//!
//! ## Overview
//!
//! The IPC system uses a JSON newline-delimited protocol for simplicity and
//! debugging convenience. Each line is one [`protocol::Envelope`]; the daemon
//! answers every request with exactly one envelope carrying the same
//! sequence number.
//!
//! ## Socket Path
//!
//! The socket path follows the XDG Base Directory Specification:
//! - Primary: `$XDG_RUNTIME_DIR/filehub/daemon.sock`
//! - Fallback: `/tmp/filehub-$UID/daemon.sock`
//!
//! ## Example
//!
//! ### Server (Daemon) Side
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use filehub::ipc::{get_socket_path, IpcServer};
//! use filehub::namespace::{Namespace, Root};
//! use filehub::MessageRouter;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let root = Root::open("/srv/uploads", true)?;
//!     let router = MessageRouter::new(Arc::new(Namespace::new(root)));
//!
//!     let server = IpcServer::bind(&get_socket_path()).await?;
//!     server.serve(router, async {
//!         tokio::signal::ctrl_c().await.ok();
//!     }).await?;
//!     Ok(())
//! }
//! ```
//!
//! ### Client (CLI) Side
//!
//! ```rust,no_run
//! use filehub::ipc::{get_socket_path, IpcClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = IpcClient::connect(&get_socket_path()).await?;
//!
//!     for entry in client.list("").await?.entries {
//!         println!("{}", entry.name);
//!     }
//!
//!     Ok(())
//! }
//! ```

mod client;
mod server;

pub use client::IpcClient;
pub use server::{IpcConnection, IpcError, IpcServer};

use std::path::PathBuf;

/// Get the default socket path for IPC communication.
///
/// ## Path Resolution
///
/// 1. If `$XDG_RUNTIME_DIR` is set: `$XDG_RUNTIME_DIR/filehub/daemon.sock`
/// 2. Otherwise: `/tmp/filehub-$UID/daemon.sock`
#[cfg(unix)]
pub fn get_socket_path() -> PathBuf {
    use std::os::unix::fs::MetadataExt;

    match std::env::var("XDG_RUNTIME_DIR") {
        Ok(runtime_dir) if !runtime_dir.is_empty() => {
            PathBuf::from(runtime_dir).join("filehub").join("daemon.sock")
        }
        _ => {
            // Get UID by checking metadata of a file we own
            let uid = std::fs::metadata("/proc/self")
                .map(|m| m.uid())
                .unwrap_or(0);

            PathBuf::from(format!("/tmp/filehub-{}", uid)).join("daemon.sock")
        }
    }
}

/// Non-Unix platforms are not supported for Unix Domain Sockets.
#[cfg(not(unix))]
pub fn get_socket_path() -> PathBuf {
    PathBuf::from("/tmp/filehub-unsupported/daemon.sock")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    struct EnvGuard {
        original: Option<String>,
    }

    impl EnvGuard {
        fn new() -> Self {
            Self {
                original: std::env::var("XDG_RUNTIME_DIR").ok(),
            }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            // SAFETY: env-mutating tests are serialized
            unsafe {
                match &self.original {
                    Some(val) => std::env::set_var("XDG_RUNTIME_DIR", val),
                    None => std::env::remove_var("XDG_RUNTIME_DIR"),
                }
            }
        }
    }

    #[test]
    #[serial]
    fn test_get_socket_path_with_xdg_runtime_dir() {
        let _guard = EnvGuard::new();
        // SAFETY: env-mutating tests are serialized
        unsafe {
            std::env::set_var("XDG_RUNTIME_DIR", "/run/user/1000");
        }
        let path = get_socket_path();
        assert_eq!(path, PathBuf::from("/run/user/1000/filehub/daemon.sock"));
    }

    #[test]
    #[serial]
    fn test_get_socket_path_without_xdg_runtime_dir() {
        let _guard = EnvGuard::new();
        // SAFETY: env-mutating tests are serialized
        unsafe {
            std::env::remove_var("XDG_RUNTIME_DIR");
        }
        let path = get_socket_path();
        assert!(path.to_str().unwrap().starts_with("/tmp/filehub-"));
        assert!(path.to_str().unwrap().ends_with("/daemon.sock"));
    }

    #[test]
    #[serial]
    fn test_socket_path_is_absolute() {
        let path = get_socket_path();
        assert!(path.is_absolute());
        assert!(path.extension().map(|e| e == "sock").unwrap_or(false));
    }
}
