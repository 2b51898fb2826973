//! Message router for dispatching requests to the namespace.
//!
//! This module provides the `MessageRouter` struct that receives protocol
//! messages, resolves the client-supplied paths, and calls the matching
//! namespace operation. Routing is synchronous; the transport runs it on the
//! blocking pool.

use std::sync::Arc;

use protocol::messages::{
    CreateDirectory, CreateTextFile, Delete, ErrorCode, ErrorMessage, ListRequest, ListResponse,
    Message, Move, Ping, Pong, ReadTextFile, Rename, TextContent,
};
use tracing::{debug, error};

use crate::namespace::{validate_name, ConflictPolicy, FsError, Namespace};

/// Result type for router operations.
pub type RouterResult = Result<Message, RouterError>;

/// Errors that can occur during message routing.
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    /// Namespace operation failed.
    #[error(transparent)]
    Fs(#[from] FsError),

    /// The message is not a request this router handles.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RouterError {
    /// Convert the error to a protocol ErrorMessage.
    pub fn to_error_message(&self, context: Option<String>) -> ErrorMessage {
        let (code, recoverable) = match self {
            RouterError::Fs(e) => (e.code(), e.is_recoverable()),
            RouterError::InvalidRequest(_) => (ErrorCode::InvalidRequest, false),
            RouterError::Internal(_) => (ErrorCode::InternalError, true),
        };

        ErrorMessage {
            code,
            message: self.to_string(),
            context,
            recoverable,
        }
    }
}

/// Message router that dispatches requests to the namespace services.
#[derive(Debug, Clone)]
pub struct MessageRouter {
    namespace: Arc<Namespace>,
}

impl MessageRouter {
    /// Create a new message router over `namespace`.
    pub fn new(namespace: Arc<Namespace>) -> Self {
        Self { namespace }
    }

    /// The namespace requests are routed to.
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Route a request and return its response.
    pub fn route(&self, message: Message) -> RouterResult {
        debug!(?message, "Routing message");

        if !message.is_request() {
            return Err(RouterError::InvalidRequest(
                "response message received as request".to_string(),
            ));
        }

        match message {
            Message::List(req) => self.handle_list(req),
            Message::CreateDirectory(req) => self.handle_create_directory(req),
            Message::CreateTextFile(req) => self.handle_create_text_file(req),
            Message::ReadTextFile(req) => self.handle_read_text_file(req),
            Message::Delete(req) => self.handle_delete(req),
            Message::Rename(req) => self.handle_rename(req),
            Message::Move(req) => self.handle_move(req),
            Message::ClearAll => self.handle_clear_all(),
            Message::Ping(ping) => self.handle_ping(ping),
            other => Err(RouterError::Internal(format!(
                "no handler for {}",
                operation_name(&other)
            ))),
        }
    }

    /// Route a request, turning any failure into a `Message::Error`.
    pub fn respond(&self, message: Message) -> Message {
        let context = operation_name(&message);

        match self.route(message) {
            Ok(response) => response,
            Err(e) => {
                match &e {
                    RouterError::Fs(FsError::Storage { .. }) | RouterError::Internal(_) => {
                        error!(operation = context, error = %e, "Request failed");
                    }
                    _ => debug!(operation = context, error = %e, "Request rejected"),
                }
                Message::Error(e.to_error_message(Some(context.to_string())))
            }
        }
    }

    // =========================================================================
    // Read Handlers
    // =========================================================================

    fn handle_list(&self, req: ListRequest) -> RouterResult {
        let directory = self.namespace.root().resolve(&req.path)?;
        let entries = self.namespace.lister().list(&directory)?;

        Ok(Message::ListResponse(ListResponse {
            path: directory.relative().to_string(),
            entries: entries.iter().map(|e| e.to_protocol()).collect(),
        }))
    }

    fn handle_read_text_file(&self, req: ReadTextFile) -> RouterResult {
        let path = self.namespace.root().resolve(&req.path)?;
        let content = self.namespace.mutations().read_text_file(&path)?;

        Ok(Message::TextContent(TextContent {
            path: path.relative().to_string(),
            content,
        }))
    }

    // =========================================================================
    // Mutation Handlers
    // =========================================================================

    fn handle_create_directory(&self, req: CreateDirectory) -> RouterResult {
        let path = self.namespace.root().resolve_child(&req.path, &req.name)?;
        let result = self.namespace.mutations().create_directory(&path)?;
        Ok(Message::Done(result))
    }

    fn handle_create_text_file(&self, req: CreateTextFile) -> RouterResult {
        let path = self
            .namespace
            .root()
            .resolve_child(&req.path, &req.filename)?;
        let conflict =
            ConflictPolicy::from_overwrite_flag(req.overwrite, self.namespace.text_file_conflict());

        let result = self
            .namespace
            .mutations()
            .create_text_file(&path, &req.content, conflict)?;
        Ok(Message::Done(result))
    }

    fn handle_delete(&self, req: Delete) -> RouterResult {
        let path = self.namespace.root().resolve_child(&req.path, &req.name)?;
        let result = self.namespace.mutations().delete_entry(&path)?;
        Ok(Message::Done(result))
    }

    fn handle_rename(&self, req: Rename) -> RouterResult {
        let old_name = validate_name(&req.old_name)?;
        let new_name = validate_name(&req.new_name)?;

        let root = self.namespace.root();
        let from = root.resolve_child(&req.path, old_name)?;
        let to = root.resolve_child(&req.path, new_name)?;

        let result = self.namespace.mutations().rename_entry(&from, &to)?;
        Ok(Message::Done(result))
    }

    fn handle_move(&self, req: Move) -> RouterResult {
        let root = self.namespace.root();
        let source = root.resolve(&req.source_path)?;
        let target = root.resolve(&req.target_path)?;

        let result = self.namespace.mutations().move_entry(&source, &target)?;
        Ok(Message::Done(result))
    }

    fn handle_clear_all(&self) -> RouterResult {
        let report = self.namespace.mutations().clear_all()?;
        Ok(Message::Cleared(report))
    }

    // =========================================================================
    // Control Handlers
    // =========================================================================

    fn handle_ping(&self, ping: Ping) -> RouterResult {
        debug!(timestamp = ping.timestamp, "Received ping");

        Ok(Message::Pong(Pong {
            timestamp: ping.timestamp,
        }))
    }
}

/// Short operation name used as error context.
fn operation_name(message: &Message) -> &'static str {
    match message {
        Message::List(_) => "list",
        Message::CreateDirectory(_) => "create_directory",
        Message::CreateTextFile(_) => "create_text_file",
        Message::ReadTextFile(_) => "read_text_file",
        Message::Delete(_) => "delete",
        Message::Rename(_) => "rename",
        Message::Move(_) => "move",
        Message::ClearAll => "clear_all",
        Message::Ping(_) => "ping",
        _ => "response",
    }
}
