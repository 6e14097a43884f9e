//! IPC Server - Unix socket server for cache clients
//!
//! Accepts connections, reads newline-delimited JSON commands and answers
//! them from the caching filesystem.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::RwLock;
use tracing::{debug, error, info};

use crate::fs::{FileSystem, FsResult};
use crate::ipc::protocol::{parse_command, serialize_response, Command, Response, PROTOCOL_VERSION};
use crate::trigger::Reloader;

/// IPC Server that listens for commands from cache clients
pub struct IpcServer<F> {
    /// Cache plus the reload logic for `dropCache`
    reloader: Arc<Reloader<F>>,
    /// Where the socket is created
    socket_path: PathBuf,
    /// Socket listener
    listener: Option<UnixListener>,
    /// Active connections counter
    connection_count: Arc<RwLock<u32>>,
}

impl<F: FileSystem + 'static> IpcServer<F> {
    /// Create a new IPC server
    pub fn new(reloader: Arc<Reloader<F>>, socket_path: PathBuf) -> Self {
        Self {
            reloader,
            socket_path,
            listener: None,
            connection_count: Arc::new(RwLock::new(0)),
        }
    }

    /// Start the IPC server
    pub async fn start(&mut self) -> Result<()> {
        // Clean up any existing socket file
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path)
                .context("Failed to remove existing socket file")?;
        }

        // Create the socket listener
        let listener = UnixListener::bind(&self.socket_path).context("Failed to bind Unix socket")?;

        info!(socket_path = %self.socket_path.display(), "IPC server started");

        self.listener = Some(listener);
        Ok(())
    }

    /// Run the server loop, accepting connections
    pub async fn run(&self) -> Result<()> {
        let listener = self.listener.as_ref().context("Server not started")?;

        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let reloader = Arc::clone(&self.reloader);
                    let connection_count = Arc::clone(&self.connection_count);

                    // Spawn a new task to handle this connection
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, reloader, connection_count).await {
                            error!(error = %e, "Connection handler error");
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    /// Stop the IPC server and clean up
    pub async fn stop(&self) -> Result<()> {
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path).context("Failed to remove socket file")?;
        }
        info!("IPC server stopped");
        Ok(())
    }

    /// Get the number of active connections
    pub async fn connection_count(&self) -> u32 {
        *self.connection_count.read().await
    }
}

/// Handle a single client connection
async fn handle_connection<F: FileSystem + 'static>(
    stream: UnixStream,
    reloader: Arc<Reloader<F>>,
    connection_count: Arc<RwLock<u32>>,
) -> Result<()> {
    // Increment connection count
    {
        let mut count = connection_count.write().await;
        *count += 1;
        debug!(count = *count, "New connection");
    }

    let (reader, mut writer) = stream.into_split();
    let mut buf_reader = BufReader::new(reader);
    let mut line = String::new();

    // Read commands line by line (newline-delimited JSON)
    loop {
        line.clear();
        match buf_reader.read_line(&mut line).await {
            Ok(0) => {
                debug!("Connection closed by client");
                break;
            }
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }

                debug!(command = %trimmed, "Received command");

                let response = match parse_command(trimmed.as_bytes()) {
                    Ok(command) => process_command(command, &reloader, &connection_count).await,
                    Err(e) => {
                        error!(error = %e, command = %trimmed, "Failed to parse command");
                        Response::Error {
                            error: format!("Invalid command: {}", e),
                        }
                    }
                };

                match serialize_response(&response) {
                    Ok(json) => {
                        if let Err(e) = writer.write_all(&json).await {
                            error!(error = %e, "Failed to write response");
                            break;
                        }
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to serialize response");
                    }
                }
            }
            Err(e) => {
                error!(error = %e, "Failed to read from socket");
                break;
            }
        }
    }

    // Decrement connection count
    {
        let mut count = connection_count.write().await;
        *count = count.saturating_sub(1);
        debug!(count = *count, "Connection ended");
    }

    Ok(())
}

/// Run a filesystem call on the blocking pool, flattening both failure kinds
/// into the message sent back to the client
async fn blocking<T, C>(call: C) -> Result<T, String>
where
    T: Send + 'static,
    C: FnOnce() -> FsResult<T> + Send + 'static,
{
    match tokio::task::spawn_blocking(call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(e.to_string()),
        Err(e) => Err(format!("Filesystem task failed: {}", e)),
    }
}

fn display_paths(paths: Vec<PathBuf>) -> Vec<String> {
    paths
        .into_iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect()
}

/// Process a command and return a response
async fn process_command<F: FileSystem + 'static>(
    command: Command,
    reloader: &Arc<Reloader<F>>,
    connection_count: &RwLock<u32>,
) -> Response {
    match command {
        Command::ReadFile { path } => {
            debug!(path = %path, "Processing readFile command");

            let fs = Arc::clone(reloader.fs());
            let target = path.clone();
            match blocking(move || fs.read_file(Path::new(&target))).await {
                Ok(bytes) => Response::content(path, &bytes),
                Err(error) => Response::Error { error },
            }
        }

        Command::Glob { pattern } => {
            debug!(pattern = %pattern, "Processing glob command");

            let fs = Arc::clone(reloader.fs());
            let target = pattern.clone();
            match blocking(move || fs.glob(&target)).await {
                Ok(matches) => Response::Matches {
                    pattern,
                    matches: display_paths(matches),
                },
                Err(error) => Response::Error { error },
            }
        }

        Command::RecursiveGlob { pattern } => {
            debug!(pattern = %pattern, "Processing recursiveGlob command");

            let fs = Arc::clone(reloader.fs());
            let target = pattern.clone();
            match blocking(move || fs.recursive_glob(&target)).await {
                Ok(matches) => Response::Matches {
                    pattern,
                    matches: display_paths(matches),
                },
                Err(error) => Response::Error { error },
            }
        }

        Command::DropCache => {
            info!("Processing dropCache command");

            reloader.reload_async("ipc").await;
            Response::Success {
                message: Some("Caches dropped".to_string()),
            }
        }

        Command::GetStatus => {
            debug!("Processing getStatus command");

            Response::Status {
                version: PROTOCOL_VERSION,
                healthy: true,
                connections: *connection_count.read().await,
                stats: reloader.fs().stats(),
            }
        }
    }
}
