//! # FileHub Daemon Library
//!
//! This crate provides a sandboxed file namespace: every client path is
//! resolved against a single root directory, and nothing outside that root
//! can be listed, read, or modified.
//!
//! ## Overview
//!
//! - **Path Resolution**: client paths are normalized lexically and refused
//!   (never clamped) if they leave the root
//! - **Listing**: directories first, then files, in a stable name order
//! - **Mutations**: create directories and text files, delete, rename,
//!   move with parent auto-creation, and clear the whole root
//! - **Local Transport**: a Unix socket speaking newline-delimited JSON
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   JSON lines   ┌────────────┐   ┌───────────────────────┐
//! │  IpcClient   │ ─────────────► │ IpcServer  │ ─►│    MessageRouter      │
//! └──────────────┘                └────────────┘   └──────────┬────────────┘
//!                                                             │
//!                        ┌──────────────┬─────────────────────┼──────────┐
//!                        ▼              ▼                     ▼          ▼
//!                 ┌────────────┐ ┌─────────────┐ ┌─────────────────┐ ┌───────┐
//!                 │ resolver   │ │ EntryLister │ │ MutationService │ │ guard │
//!                 └────────────┘ └─────────────┘ └─────────────────┘ └───────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use filehub::namespace::{Namespace, Root};
//! use filehub::protocol::messages::ListRequest;
//! use filehub::protocol::Message;
//! use filehub::MessageRouter;
//!
//! let root = Root::open("/srv/uploads", true)?;
//! let router = MessageRouter::new(Arc::new(Namespace::new(root)));
//!
//! let response = router.respond(Message::List(ListRequest { path: "docs".into() }));
//! println!("{:?}", response);
//! # Ok::<(), filehub::namespace::FsError>(())
//! ```
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading and defaults
//! - [`namespace`]: Path resolution, containment, listing, and mutations
//! - [`router`]: Request dispatch
//! - [`ipc`]: Unix socket server and client

pub mod config;
pub mod ipc;
pub mod namespace;
pub mod router;

// Re-export protocol for convenience
pub use protocol;

// Re-export config types for convenience
pub use config::Config;

// Re-export namespace types for convenience
pub use namespace::{
    ConflictPolicy, DirectoryEntry, EntryLister, FsError, MutationService, Namespace,
    ResolvedPath, Root,
};

// Re-export router types for convenience
pub use router::{MessageRouter, RouterError, RouterResult};

// Re-export IPC types for convenience
pub use ipc::{IpcClient, IpcError, IpcServer};
