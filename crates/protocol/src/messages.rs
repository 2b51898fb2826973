//! Protocol message definitions for FileHub.
//!
//! This module defines every request and response exchanged between the
//! daemon and its clients. Messages are serialized as JSON; field names use
//! camelCase because the browser-side file explorer consumes them directly.

use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, Result};

/// Current protocol version.
pub const PROTOCOL_VERSION: u8 = 1;

/// Envelope wrapper for all protocol messages.
///
/// The sequence number is chosen by the client and echoed back on the
/// response so a client can match replies to requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Protocol version for compatibility checking.
    pub version: u8,
    /// Sequence number for request/response matching.
    pub sequence: u64,
    /// The actual message payload.
    pub payload: Message,
}

impl Envelope {
    /// Create a new envelope with the current protocol version.
    pub fn new(sequence: u64, payload: Message) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            sequence,
            payload,
        }
    }

    /// Build the response envelope for this request, echoing its sequence.
    pub fn reply(&self, payload: Message) -> Self {
        Self::new(self.sequence, payload)
    }

    /// Reject envelopes produced by an incompatible peer.
    pub fn check_version(&self) -> Result<()> {
        if self.version != PROTOCOL_VERSION {
            return Err(ProtocolError::UnsupportedVersion {
                expected: PROTOCOL_VERSION,
                got: self.version,
            });
        }
        Ok(())
    }

    /// Serialize to a JSON string (without trailing newline).
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(ProtocolError::from)
    }

    /// Deserialize from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(ProtocolError::from)
    }
}

/// Top-level message enum containing all message types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Message {
    // Requests
    /// List the children of a directory.
    List(ListRequest),
    /// Create a new directory.
    CreateDirectory(CreateDirectory),
    /// Create (or overwrite) a text file.
    CreateTextFile(CreateTextFile),
    /// Read a text file.
    ReadTextFile(ReadTextFile),
    /// Delete a file or directory tree.
    Delete(Delete),
    /// Rename an entry within its directory.
    Rename(Rename),
    /// Move an entry to another location.
    Move(Move),
    /// Remove every child of the root.
    ClearAll,
    /// Liveness probe.
    Ping(Ping),

    // Responses
    /// Directory listing.
    ListResponse(ListResponse),
    /// Successful mutation.
    Done(MutationResult),
    /// Contents of a text file.
    TextContent(TextContent),
    /// Outcome of a clear-all.
    Cleared(ClearReport),
    /// Response to a ping.
    Pong(Pong),
    /// Error response.
    Error(ErrorMessage),
}

impl Message {
    /// Whether this message is something a client sends.
    pub fn is_request(&self) -> bool {
        matches!(
            self,
            Message::List(_)
                | Message::CreateDirectory(_)
                | Message::CreateTextFile(_)
                | Message::ReadTextFile(_)
                | Message::Delete(_)
                | Message::Rename(_)
                | Message::Move(_)
                | Message::ClearAll
                | Message::Ping(_)
        )
    }
}

// ============================================================================
// Requests
// ============================================================================

/// Request to list a directory. An empty path denotes the root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRequest {
    /// Client-relative directory path.
    #[serde(default)]
    pub path: String,
}

/// Request to create a directory named `name` under `path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDirectory {
    /// Client-relative parent path.
    #[serde(default)]
    pub path: String,
    /// Name of the new directory.
    pub name: String,
}

/// Request to write a text file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTextFile {
    /// Client-relative parent path.
    #[serde(default)]
    pub path: String,
    /// File name; the text suffix is appended when missing.
    pub filename: String,
    /// File contents.
    #[serde(default)]
    pub content: String,
    /// Whether an existing file may be replaced. `None` uses the server default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overwrite: Option<bool>,
}

/// Request to read a text file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadTextFile {
    /// Client-relative file path.
    pub path: String,
}

/// Request to delete `name` under `path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Delete {
    /// Client-relative parent path.
    #[serde(default)]
    pub path: String,
    /// Name of the entry to delete.
    pub name: String,
}

/// Request to rename an entry inside the directory `path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rename {
    /// Client-relative directory containing the entry.
    #[serde(default)]
    pub path: String,
    /// Current name.
    pub old_name: String,
    /// New name.
    pub new_name: String,
}

/// Request to move an entry; missing parents of the target are created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Move {
    /// Client-relative source path.
    pub source_path: String,
    /// Client-relative target path (including the entry name).
    pub target_path: String,
}

/// Ping for liveness checks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ping {
    /// Timestamp when ping was sent (for latency calculation).
    pub timestamp: u64,
}

// ============================================================================
// Responses
// ============================================================================

/// Response with directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse {
    /// Normalized path that was listed ("" for the root).
    pub path: String,
    /// Entries in presentation order: directories first, then files.
    pub entries: Vec<Entry>,
}

/// A single file or directory entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    /// Entry name (not full path).
    pub name: String,
    /// Whether the entry is a directory.
    pub is_directory: bool,
    /// Size in bytes (0 for directories).
    pub size: u64,
    /// Last modified timestamp (Unix epoch seconds).
    pub modified: u64,
}

/// Result of a successful mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationResult {
    /// Human-readable confirmation.
    pub message: String,
    /// Normalized path of the entry that was created, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_path: Option<String>,
}

impl MutationResult {
    /// A confirmation without a created path.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            created_path: None,
        }
    }

    /// A confirmation naming the created path.
    pub fn created(message: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            created_path: Some(path.into()),
        }
    }
}

/// Contents of a text file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextContent {
    /// Normalized path that was read.
    pub path: String,
    /// UTF-8 file contents.
    pub content: String,
}

/// Per-child outcome of clearing the root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearReport {
    /// Names of children that were removed.
    pub removed: Vec<String>,
    /// Children that could not be removed.
    pub failed: Vec<ClearFailure>,
}

impl ClearReport {
    /// Whether every child was removed.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// A child of the root that clear-all failed to remove.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearFailure {
    /// Child name.
    pub name: String,
    /// Error description.
    pub message: String,
}

/// Pong response to ping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pong {
    /// Original timestamp from ping.
    pub timestamp: u64,
}

/// Error message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    /// Error code for programmatic handling.
    pub code: ErrorCode,
    /// Human-readable error message.
    pub message: String,
    /// Optional context (e.g., the client path involved).
    pub context: Option<String>,
    /// Whether retrying the request may succeed.
    pub recoverable: bool,
}

/// Error codes for file management failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    /// A path escapes the root, or the root itself was targeted.
    Forbidden,
    /// The target does not exist.
    NotFound,
    /// The destination already exists.
    AlreadyExists,
    /// A directory was expected.
    NotADirectory,
    /// A file was expected.
    IsADirectory,
    /// Invalid request or parameters.
    InvalidRequest,
    /// The underlying storage reported an error.
    StorageFailure,
    /// Peer speaks another protocol version.
    UnsupportedVersion,
    /// Server-side error.
    InternalError,
}
