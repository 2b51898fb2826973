//! IPC Server for handling client connections via Unix Domain Sockets.
//!
//! The server listens on a Unix socket and accepts connections from CLI
//! clients. Each connection is served on its own task; the namespace work for
//! every request runs on the blocking pool.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};

use protocol::messages::{ErrorCode, ErrorMessage};
use protocol::{decode_line, encode_line, Envelope, Message, ProtocolError, MAX_LINE_SIZE};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, info, warn};

use crate::router::{MessageRouter, RouterError};

/// A server that listens for IPC connections on a Unix Domain Socket.
pub struct IpcServer {
    listener: UnixListener,
    path: PathBuf,
}

impl IpcServer {
    /// Bind the server to the specified socket path.
    ///
    /// This will create the socket file and any necessary parent directories.
    /// If a socket file already exists at the path, it will be removed first.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The parent directories cannot be created
    /// - The existing socket cannot be removed
    /// - The socket cannot be bound
    pub async fn bind(path: &Path) -> Result<Self, io::Error> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        if path.exists() {
            std::fs::remove_file(path)?;
        }

        let listener = UnixListener::bind(path)?;

        Ok(Self {
            listener,
            path: path.to_path_buf(),
        })
    }

    /// Path of the bound socket.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Accept a new incoming connection.
    ///
    /// This method blocks until a client connects.
    pub async fn accept(&self) -> Result<IpcConnection, io::Error> {
        let (stream, _addr) = self.listener.accept().await?;
        Ok(IpcConnection::new(stream))
    }

    /// Accept and serve connections until `shutdown` resolves.
    ///
    /// The socket file is removed on return.
    pub async fn serve<F>(self, router: MessageRouter, shutdown: F) -> Result<(), IpcError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!(socket = %self.path.display(), "Listening for clients");

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, no longer accepting clients");
                    break;
                }
                accepted = self.accept() => {
                    match accepted {
                        Ok(conn) => {
                            let router = router.clone();
                            tokio::spawn(async move {
                                if let Err(e) = conn.run(router).await {
                                    debug!(error = %e, "Client connection ended with error");
                                }
                            });
                        }
                        Err(e) => warn!(error = %e, "Failed to accept client connection"),
                    }
                }
            }
        }

        if let Err(e) = std::fs::remove_file(&self.path) {
            debug!(socket = %self.path.display(), error = %e, "Failed to remove socket file");
        }
        Ok(())
    }
}

/// A connection to an IPC client.
///
/// This struct wraps a Unix stream and provides methods for reading
/// requests and sending responses as newline-delimited JSON envelopes.
pub struct IpcConnection {
    reader: BufReader<tokio::io::ReadHalf<UnixStream>>,
    writer: tokio::io::WriteHalf<UnixStream>,
}

impl IpcConnection {
    fn new(stream: UnixStream) -> Self {
        let (read_half, write_half) = tokio::io::split(stream);
        Self {
            reader: BufReader::new(read_half),
            writer: write_half,
        }
    }

    /// Read the next request envelope from the client.
    ///
    /// Returns `None` if the client has disconnected. A line that cannot be
    /// decoded yields [`IpcError::Protocol`]; the line has been consumed, so
    /// the connection remains usable unless the line was too large.
    pub async fn read_envelope(&mut self) -> Result<Option<Envelope>, IpcError> {
        loop {
            let line = match read_line(&mut self.reader).await? {
                Some(line) => line,
                None => return Ok(None),
            };
            if line.iter().all(|b| b.is_ascii_whitespace()) {
                continue;
            }
            return Ok(Some(decode_line(&line)?));
        }
    }

    /// Send an envelope to the client.
    pub async fn send_envelope(&mut self, envelope: &Envelope) -> Result<(), IpcError> {
        let bytes = encode_line(envelope)?;
        self.write_line(&bytes).await
    }

    /// Send a response, replacing it with an error reply when it cannot be
    /// encoded. The client always gets an answer for its sequence number.
    async fn send_response(&mut self, sequence: u64, response: Message) -> Result<(), IpcError> {
        let bytes = match encode_line(&Envelope::new(sequence, response)) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(sequence, error = %e, "Response could not be encoded");
                let reply = ErrorMessage {
                    code: ErrorCode::StorageFailure,
                    message: format!("response could not be sent: {}", e),
                    context: None,
                    recoverable: false,
                };
                encode_line(&Envelope::new(sequence, Message::Error(reply)))?
            }
        };
        self.write_line(&bytes).await
    }

    async fn write_line(&mut self, bytes: &[u8]) -> Result<(), IpcError> {
        self.writer.write_all(bytes).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Serve requests on this connection until the client disconnects.
    pub async fn run(mut self, router: MessageRouter) -> Result<(), IpcError> {
        loop {
            let envelope = match self.read_envelope().await {
                Ok(Some(envelope)) => envelope,
                Ok(None) => {
                    debug!("Client disconnected");
                    return Ok(());
                }
                Err(IpcError::Protocol(e)) => {
                    warn!(error = %e, "Rejected malformed request");
                    let reply = Envelope::new(0, Message::Error(protocol_error_message(&e)));
                    self.send_envelope(&reply).await?;
                    if matches!(e, ProtocolError::LineTooLarge { .. }) {
                        // The rest of the oversized line is still unread.
                        return Err(IpcError::Protocol(e));
                    }
                    continue;
                }
                Err(e) => return Err(e),
            };

            let sequence = envelope.sequence;
            let response = match envelope.check_version() {
                Ok(()) => {
                    let router = router.clone();
                    let payload = envelope.payload;
                    tokio::task::spawn_blocking(move || router.respond(payload))
                        .await
                        .unwrap_or_else(|e| {
                            Message::Error(
                                RouterError::Internal(e.to_string()).to_error_message(None),
                            )
                        })
                }
                Err(e) => {
                    warn!(error = %e, "Rejected request from incompatible client");
                    Message::Error(protocol_error_message(&e))
                }
            };

            self.send_response(sequence, response).await?;
        }
    }
}

/// Read one `\n`-terminated line, refusing lines over [`MAX_LINE_SIZE`].
pub(crate) async fn read_line<R>(reader: &mut R) -> Result<Option<Vec<u8>>, IpcError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    let bytes_read = reader
        .take(MAX_LINE_SIZE as u64 + 1)
        .read_until(b'\n', &mut line)
        .await?;

    if bytes_read == 0 {
        return Ok(None);
    }
    if line.len() > MAX_LINE_SIZE {
        return Err(IpcError::Protocol(ProtocolError::LineTooLarge {
            size: line.len(),
            max: MAX_LINE_SIZE,
        }));
    }
    Ok(Some(line))
}

fn protocol_error_message(err: &ProtocolError) -> ErrorMessage {
    let code = match err {
        ProtocolError::UnsupportedVersion { .. } => ErrorCode::UnsupportedVersion,
        _ => ErrorCode::InvalidRequest,
    };

    ErrorMessage {
        code,
        message: err.to_string(),
        context: None,
        recoverable: false,
    }
}

/// Errors that can occur during IPC communication.
#[derive(Debug, thiserror::Error)]
pub enum IpcError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A line could not be encoded or decoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The daemon answered with an error.
    #[error("{}", .0.message)]
    Remote(ErrorMessage),

    /// The daemon answered with something other than what was asked for.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl IpcError {
    /// The remote error code, if the daemon reported one.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            IpcError::Remote(err) => Some(err.code),
            _ => None,
        }
    }
}
