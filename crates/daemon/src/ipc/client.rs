//! IPC Client for communicating with the daemon via Unix Domain Sockets.
//!
//! The client connects to the daemon's Unix socket and sends requests,
//! receiving responses in a request-response pattern. Each request carries a
//! fresh sequence number that the daemon echoes back.

use std::io;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use protocol::messages::{
    ClearReport, CreateDirectory, CreateTextFile, Delete, ListRequest, ListResponse, Move,
    MutationResult, Ping, ReadTextFile, Rename, TextContent,
};
use protocol::{decode_line, encode_line, Envelope, Message};
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

use super::server::{read_line, IpcError};

/// Default timeout for client operations in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// A client for communicating with the daemon via IPC.
pub struct IpcClient {
    reader: BufReader<tokio::io::ReadHalf<UnixStream>>,
    writer: tokio::io::WriteHalf<UnixStream>,
    timeout: Duration,
    next_sequence: u64,
}

impl IpcClient {
    /// Connect to the daemon at the specified socket path.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    /// This typically indicates that the daemon is not running.
    pub async fn connect(path: &Path) -> Result<Self, IpcError> {
        let stream = UnixStream::connect(path).await?;
        Ok(Self::from_stream(
            stream,
            Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        ))
    }

    /// Connect to the daemon with a custom timeout.
    ///
    /// The timeout applies to the connection attempt and to every request.
    pub async fn connect_with_timeout(path: &Path, timeout: Duration) -> Result<Self, IpcError> {
        let stream = tokio::time::timeout(timeout, UnixStream::connect(path))
            .await
            .map_err(|_| {
                IpcError::Io(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "connection timed out",
                ))
            })??;

        Ok(Self::from_stream(stream, timeout))
    }

    fn from_stream(stream: UnixStream, timeout: Duration) -> Self {
        let (read_half, write_half) = tokio::io::split(stream);
        Self {
            reader: BufReader::new(read_half),
            writer: write_half,
            timeout,
            next_sequence: 1,
        }
    }

    /// Set the timeout for operations.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Send a request and wait for its response.
    ///
    /// An error response from the daemon is returned as [`IpcError::Remote`].
    pub async fn call(&mut self, payload: Message) -> Result<Message, IpcError> {
        let sequence = self.next_sequence;
        self.next_sequence += 1;

        let response = tokio::time::timeout(
            self.timeout,
            self.send_internal(Envelope::new(sequence, payload)),
        )
        .await
        .map_err(|_| {
            IpcError::Io(io::Error::new(
                io::ErrorKind::TimedOut,
                "operation timed out",
            ))
        })??;

        response.check_version()?;
        if response.sequence != sequence {
            return Err(IpcError::UnexpectedResponse(format!(
                "sequence {} does not match request {}",
                response.sequence, sequence
            )));
        }

        match response.payload {
            Message::Error(err) => Err(IpcError::Remote(err)),
            payload => Ok(payload),
        }
    }

    async fn send_internal(&mut self, request: Envelope) -> Result<Envelope, IpcError> {
        let bytes = encode_line(&request)?;
        self.writer.write_all(&bytes).await?;
        self.writer.flush().await?;

        let line = read_line(&mut self.reader).await?.ok_or_else(|| {
            IpcError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "daemon closed connection",
            ))
        })?;

        Ok(decode_line(&line)?)
    }

    /// Send a ping request to check if the daemon is responsive.
    ///
    /// Returns `true` if the daemon answers with a matching Pong.
    pub async fn ping(&mut self) -> Result<bool, IpcError> {
        let timestamp = current_timestamp_ms();
        let response = self.call(Message::Ping(Ping { timestamp })).await?;
        Ok(matches!(response, Message::Pong(pong) if pong.timestamp == timestamp))
    }

    /// List a directory.
    pub async fn list(&mut self, path: &str) -> Result<ListResponse, IpcError> {
        let request = Message::List(ListRequest {
            path: path.to_string(),
        });
        match self.call(request).await? {
            Message::ListResponse(listing) => Ok(listing),
            other => Err(unexpected(&other)),
        }
    }

    /// Create directory `name` inside `path`.
    pub async fn create_directory(
        &mut self,
        path: &str,
        name: &str,
    ) -> Result<MutationResult, IpcError> {
        self.mutate(Message::CreateDirectory(CreateDirectory {
            path: path.to_string(),
            name: name.to_string(),
        }))
        .await
    }

    /// Write a text file. `overwrite` of `None` defers to the daemon's policy.
    pub async fn create_text_file(
        &mut self,
        path: &str,
        filename: &str,
        content: &str,
        overwrite: Option<bool>,
    ) -> Result<MutationResult, IpcError> {
        self.mutate(Message::CreateTextFile(CreateTextFile {
            path: path.to_string(),
            filename: filename.to_string(),
            content: content.to_string(),
            overwrite,
        }))
        .await
    }

    /// Read a text file.
    pub async fn read_text_file(&mut self, path: &str) -> Result<TextContent, IpcError> {
        let request = Message::ReadTextFile(ReadTextFile {
            path: path.to_string(),
        });
        match self.call(request).await? {
            Message::TextContent(text) => Ok(text),
            other => Err(unexpected(&other)),
        }
    }

    /// Delete `name` inside `path`.
    pub async fn delete(&mut self, path: &str, name: &str) -> Result<MutationResult, IpcError> {
        self.mutate(Message::Delete(Delete {
            path: path.to_string(),
            name: name.to_string(),
        }))
        .await
    }

    /// Rename `old_name` to `new_name` inside `path`.
    pub async fn rename(
        &mut self,
        path: &str,
        old_name: &str,
        new_name: &str,
    ) -> Result<MutationResult, IpcError> {
        self.mutate(Message::Rename(Rename {
            path: path.to_string(),
            old_name: old_name.to_string(),
            new_name: new_name.to_string(),
        }))
        .await
    }

    /// Move `source` to `target`, creating the target's parents.
    pub async fn move_entry(
        &mut self,
        source: &str,
        target: &str,
    ) -> Result<MutationResult, IpcError> {
        self.mutate(Message::Move(Move {
            source_path: source.to_string(),
            target_path: target.to_string(),
        }))
        .await
    }

    /// Remove everything under the root.
    pub async fn clear_all(&mut self) -> Result<ClearReport, IpcError> {
        match self.call(Message::ClearAll).await? {
            Message::Cleared(report) => Ok(report),
            other => Err(unexpected(&other)),
        }
    }

    async fn mutate(&mut self, request: Message) -> Result<MutationResult, IpcError> {
        match self.call(request).await? {
            Message::Done(result) => Ok(result),
            other => Err(unexpected(&other)),
        }
    }
}

fn unexpected(message: &Message) -> IpcError {
    IpcError::UnexpectedResponse(format!("{:?}", message))
}

fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipc::server::IpcServer;
    use protocol::messages::{ErrorCode, ErrorMessage, Pong};
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_client_connect_fails_when_daemon_not_running() {
        let temp_dir = tempdir().unwrap();
        let socket_path = temp_dir.path().join("nonexistent.sock");

        let result = IpcClient::connect(&socket_path).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_client_ping() {
        let temp_dir = tempdir().unwrap();
        let socket_path = temp_dir.path().join("test.sock");

        let server = IpcServer::bind(&socket_path).await.unwrap();

        let server_handle = tokio::spawn(async move {
            let mut conn = server.accept().await.unwrap();
            let request = conn.read_envelope().await.unwrap().unwrap();
            let timestamp = match &request.payload {
                Message::Ping(ping) => ping.timestamp,
                other => panic!("Expected Ping, got {:?}", other),
            };
            conn.send_envelope(&request.reply(Message::Pong(Pong { timestamp })))
                .await
                .unwrap();
        });

        tokio::time::sleep(Duration::from_millis(10)).await;

        let mut client = IpcClient::connect(&socket_path).await.unwrap();
        assert!(client.ping().await.unwrap());

        server_handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_client_sequence_increments() {
        let temp_dir = tempdir().unwrap();
        let socket_path = temp_dir.path().join("test.sock");

        let server = IpcServer::bind(&socket_path).await.unwrap();

        let server_handle = tokio::spawn(async move {
            let mut conn = server.accept().await.unwrap();
            let mut sequences = Vec::new();
            for _ in 0..2 {
                let request = conn.read_envelope().await.unwrap().unwrap();
                sequences.push(request.sequence);
                conn.send_envelope(&request.reply(Message::Pong(Pong { timestamp: 0 })))
                    .await
                    .unwrap();
            }
            sequences
        });

        tokio::time::sleep(Duration::from_millis(10)).await;

        let mut client = IpcClient::connect(&socket_path).await.unwrap();
        client.call(Message::Ping(Ping { timestamp: 0 })).await.unwrap();
        client.call(Message::Ping(Ping { timestamp: 0 })).await.unwrap();

        assert_eq!(server_handle.await.unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_client_remote_error() {
        let temp_dir = tempdir().unwrap();
        let socket_path = temp_dir.path().join("test.sock");

        let server = IpcServer::bind(&socket_path).await.unwrap();

        let server_handle = tokio::spawn(async move {
            let mut conn = server.accept().await.unwrap();
            let request = conn.read_envelope().await.unwrap().unwrap();
            conn.send_envelope(&request.reply(Message::Error(ErrorMessage {
                code: ErrorCode::Forbidden,
                message: "forbidden: ../x".to_string(),
                context: Some("list".to_string()),
                recoverable: false,
            })))
            .await
            .unwrap();
        });

        tokio::time::sleep(Duration::from_millis(10)).await;

        let mut client = IpcClient::connect(&socket_path).await.unwrap();
        let err = client.list("../x").await.unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::Forbidden));
        assert_eq!(err.to_string(), "forbidden: ../x");

        server_handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_client_rejects_mismatched_sequence() {
        let temp_dir = tempdir().unwrap();
        let socket_path = temp_dir.path().join("test.sock");

        let server = IpcServer::bind(&socket_path).await.unwrap();

        let server_handle = tokio::spawn(async move {
            let mut conn = server.accept().await.unwrap();
            let request = conn.read_envelope().await.unwrap().unwrap();
            conn.send_envelope(&Envelope::new(
                request.sequence + 100,
                Message::Pong(Pong { timestamp: 0 }),
            ))
            .await
            .unwrap();
        });

        tokio::time::sleep(Duration::from_millis(10)).await;

        let mut client = IpcClient::connect(&socket_path).await.unwrap();
        let result = client.call(Message::Ping(Ping { timestamp: 0 })).await;
        assert!(matches!(result, Err(IpcError::UnexpectedResponse(_))));

        server_handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_client_unexpected_payload() {
        let temp_dir = tempdir().unwrap();
        let socket_path = temp_dir.path().join("test.sock");

        let server = IpcServer::bind(&socket_path).await.unwrap();

        let server_handle = tokio::spawn(async move {
            let mut conn = server.accept().await.unwrap();
            let request = conn.read_envelope().await.unwrap().unwrap();
            conn.send_envelope(&request.reply(Message::Pong(Pong { timestamp: 0 })))
                .await
                .unwrap();
        });

        tokio::time::sleep(Duration::from_millis(10)).await;

        let mut client = IpcClient::connect(&socket_path).await.unwrap();
        let result = client.clear_all().await;
        assert!(matches!(result, Err(IpcError::UnexpectedResponse(_))));

        server_handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_client_timeout() {
        let temp_dir = tempdir().unwrap();
        let socket_path = temp_dir.path().join("test.sock");

        let server = IpcServer::bind(&socket_path).await.unwrap();

        // Server that never responds
        let _server_handle = tokio::spawn(async move {
            let _conn = server.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(10)).await;
        });

        tokio::time::sleep(Duration::from_millis(10)).await;

        let mut client =
            IpcClient::connect_with_timeout(&socket_path, Duration::from_millis(100))
                .await
                .unwrap();

        let result = client.ping().await;
        assert!(result.is_err());
    }
}
