//! IPC protocol definitions
//!
//! Newline-delimited JSON exchanged with clients over the daemon's Unix
//! domain socket.

use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::cache::CacheStats;

/// Protocol version for future compatibility
pub const PROTOCOL_VERSION: u32 = 1;

/// Commands sent by clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Command {
    /// Read a whole file through the cache
    ReadFile { path: String },
    /// Expand a glob through the cache
    Glob { pattern: String },
    /// Expand a glob with `**` support (never cached)
    RecursiveGlob { pattern: String },
    /// Drop all cached reads and globs
    DropCache,
    /// Get daemon status and cache counters
    GetStatus,
}

/// Responses sent back to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Response {
    /// Success response
    #[serde(rename_all = "camelCase")]
    Success {
        /// Optional success message
        message: Option<String>,
    },
    /// Error response
    #[serde(rename_all = "camelCase")]
    Error {
        /// Error message
        error: String,
    },
    /// File content
    #[serde(rename_all = "camelCase")]
    Content {
        path: String,
        /// Standard base64 of the raw bytes
        content_base64: String,
    },
    /// Glob matches in the order the filesystem returned them
    #[serde(rename_all = "camelCase")]
    Matches { pattern: String, matches: Vec<String> },
    /// Status response with daemon state
    #[serde(rename_all = "camelCase")]
    Status {
        /// Protocol version
        version: u32,
        /// Whether daemon is healthy
        healthy: bool,
        /// Open client connections, including the one asking
        connections: u32,
        stats: CacheStats,
    },
}

impl Response {
    /// Build a `Content` response from raw bytes
    pub fn content(path: impl Into<String>, bytes: &[u8]) -> Self {
        Response::Content {
            path: path.into(),
            content_base64: base64::engine::general_purpose::STANDARD.encode(bytes),
        }
    }
}

/// Parse a JSON command from bytes
pub fn parse_command(data: &[u8]) -> Result<Command, serde_json::Error> {
    serde_json::from_slice(data)
}

/// Serialize a response to JSON bytes
pub fn serialize_response(response: &Response) -> Result<Vec<u8>, serde_json::Error> {
    let mut json = serde_json::to_vec(response)?;
    json.push(b'\n'); // Add newline delimiter
    Ok(json)
}
