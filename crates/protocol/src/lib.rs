//! # FileHub Protocol Library
//!
//! This crate provides the wire types shared by the FileHub daemon and its
//! clients.
//!
//! ## Overview
//!
//! - **Message Definitions**: requests for every namespace operation
//!   (list, create, read, delete, rename, move, clear-all) and their responses
//! - **Line Codec**: newline-delimited JSON with a size cap
//! - **Error Codes**: a stable taxonomy clients can branch on
//!
//! ## Example Usage
//!
//! ```rust
//! use protocol::{decode_line, encode_line, Envelope, Message};
//! use protocol::messages::ListRequest;
//!
//! let request = Envelope::new(1, Message::List(ListRequest { path: "docs".into() }));
//! let line = encode_line(&request).unwrap();
//! assert_eq!(decode_line(&line).unwrap(), request);
//! ```
//!
//! ## Modules
//!
//! - [`messages`]: Protocol message definitions
//! - [`framing`]: Line codec
//! - [`error`]: Error types

pub mod error;
pub mod framing;
pub mod messages;

pub use error::{ProtocolError, Result};
pub use framing::{decode_line, encode_line, MAX_LINE_SIZE};
pub use messages::{Envelope, ErrorCode, ErrorMessage, Message, PROTOCOL_VERSION};
