// ABOUTME: SSH-specific error types.
// ABOUTME: Covers connection, credential, authentication, and channel failures.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("connection to {host}:{port} timed out after {timeout:?}")]
    ConnectTimeout {
        host: String,
        port: u16,
        timeout: Duration,
    },

    #[error("no usable credential: {0}")]
    MissingCredential(String),

    #[error("authentication failed for {user}@{host} using {method}")]
    AuthenticationFailed {
        user: String,
        host: String,
        method: &'static str,
    },

    #[error("failed to load key from {path}: {reason}")]
    KeyLoadFailed { path: PathBuf, reason: String },

    #[error("failed to decode private key: {0}")]
    KeyDecodeFailed(String),

    #[error("command execution failed: {0}")]
    CommandFailed(String),

    #[error("command timed out after {0:?}")]
    CommandTimeout(Duration),

    #[error("channel closed unexpectedly without exit status")]
    ChannelClosed,

    #[error("upload to {path} failed: {reason}")]
    UploadFailed { path: String, reason: String },

    #[error("session already closed")]
    Closed,

    #[error("SSH protocol error: {0}")]
    Protocol(#[from] russh::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
