// ABOUTME: Capability traits the pipelines run against: one connected remote and a way to open one.
// ABOUTME: `Session`/`SshConnector` implement them over russh; tests substitute scripted fakes.

use super::client::{CommandOutput, Session, SessionConfig};
use super::error::{Error, Result};
use crate::config::{ServerConfig, Timeouts};
use crate::logs::LogSink;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// One authenticated connection to a single host.
///
/// A nonzero exit code is data, never an `Err`: callers decide whether a
/// failing command matters. `Err` is reserved for transport failures.
#[async_trait]
pub trait Remote: Send + Sync {
    /// Run a command to completion, buffering its output.
    async fn exec(&self, command: &str) -> Result<CommandOutput>;

    /// Run a command, pushing output into `sink` as it arrives. Returns the exit code.
    async fn exec_stream(&self, command: &str, sink: &LogSink) -> Result<u32>;

    /// Write bytes to a file on the remote host.
    async fn put_buffer(&self, data: &[u8], remote_path: &str) -> Result<()>;

    /// Copy a local file to the remote host.
    async fn upload_file(&self, local_path: &Path, remote_path: &str) -> Result<()> {
        let data = tokio::fs::read(local_path).await?;
        self.put_buffer(&data, remote_path).await
    }

    /// Release the connection. Safe to call more than once.
    async fn end(&self) -> Result<()>;
}

/// Opens `Remote`s for a server.
#[async_trait]
pub trait Connector: Send + Sync {
    type Remote: Remote + 'static;

    async fn connect(&self, server: &ServerConfig) -> Result<Self::Remote>;
}

#[async_trait]
impl Remote for Session {
    async fn exec(&self, command: &str) -> Result<CommandOutput> {
        Session::exec(self, command).await
    }

    async fn exec_stream(&self, command: &str, sink: &LogSink) -> Result<u32> {
        Session::exec_stream(self, command, sink).await
    }

    async fn put_buffer(&self, data: &[u8], remote_path: &str) -> Result<()> {
        Session::put_buffer(self, data, remote_path).await
    }

    async fn end(&self) -> Result<()> {
        Session::end(self).await
    }
}

/// Connector that opens real SSH sessions.
#[derive(Debug, Clone, Default)]
pub struct SshConnector {
    timeouts: Timeouts,
    known_hosts_path: Option<PathBuf>,
}

impl SshConnector {
    pub fn new(timeouts: Timeouts) -> Self {
        Self {
            timeouts,
            known_hosts_path: None,
        }
    }

    pub fn known_hosts_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.known_hosts_path = Some(path.into());
        self
    }

    /// Build the session config for a server, resolving its credential.
    pub fn session_config(&self, server: &ServerConfig) -> Result<SessionConfig> {
        let credential = server
            .credential()
            .map_err(|e| Error::MissingCredential(e.to_string()))?;

        let mut config = SessionConfig::new(&server.host, &server.username, credential)
            .port(server.port)
            .trust_on_first_use(server.trust_first_connection)
            .connect_timeout(self.timeouts.connect)
            .command_timeout(self.timeouts.command);
        if let Some(path) = &self.known_hosts_path {
            config = config.known_hosts_path(path);
        }
        Ok(config)
    }
}

#[async_trait]
impl Connector for SshConnector {
    type Remote = Session;

    async fn connect(&self, server: &ServerConfig) -> Result<Session> {
        Session::connect(self.session_config(server)?).await
    }
}
