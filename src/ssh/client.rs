// ABOUTME: SSH session management using russh.
// ABOUTME: Handles connection, credential authentication, buffered/streamed execution, and uploads.

use super::credential::Credential;
use super::error::{Error, Result};
use crate::logs::{LogSink, Utf8Decoder};
use crate::shell;
use russh::client::{self, Config, Handle, Msg};
use russh::keys::known_hosts::{
    check_known_hosts, check_known_hosts_path, learn_known_hosts, learn_known_hosts_path,
};
use russh::keys::{PrivateKeyWithHashAlg, decode_secret_key, load_secret_key, ssh_key};
use russh::{Channel, ChannelMsg, Disconnect, Sig};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Configuration for establishing an SSH session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Remote host to connect to.
    pub host: String,
    /// SSH port (default: 22).
    pub port: u16,
    /// Username for authentication.
    pub user: String,
    pub credential: Credential,
    /// Whether to accept unknown hosts (Trust On First Use).
    /// If false, connection to unknown hosts will fail.
    pub trust_on_first_use: bool,
    /// Optional path to known_hosts file.
    /// If None, uses the default ~/.ssh/known_hosts.
    pub known_hosts_path: Option<PathBuf>,
    /// Limit on TCP connect plus key exchange.
    pub connect_timeout: Duration,
    /// Limit on buffered command execution. Streamed commands are not bounded.
    pub command_timeout: Duration,
}

impl SessionConfig {
    pub fn new(host: impl Into<String>, user: impl Into<String>, credential: Credential) -> Self {
        Self {
            host: host.into(),
            port: 22,
            user: user.into(),
            credential,
            trust_on_first_use: false,
            known_hosts_path: None,
            connect_timeout: Duration::from_secs(30),
            command_timeout: Duration::from_secs(300),
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn trust_on_first_use(mut self, tofu: bool) -> Self {
        self.trust_on_first_use = tofu;
        self
    }

    pub fn known_hosts_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.known_hosts_path = Some(path.into());
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }
}

/// Output from a remote command execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code of the command.
    pub exit_code: u32,
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// SSH client handler for russh.
pub(crate) struct SshHandler {
    host: String,
    port: u16,
    trust_on_first_use: bool,
    known_hosts_path: Option<PathBuf>,
}

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &ssh_key::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        let check_result = match &self.known_hosts_path {
            Some(path) => check_known_hosts_path(&self.host, self.port, server_public_key, path),
            None => check_known_hosts(&self.host, self.port, server_public_key),
        };

        match check_result {
            Ok(true) => Ok(true),
            Ok(false) if self.trust_on_first_use => {
                tracing::warn!(
                    "Trust-On-First-Use: accepting unknown host key for {}:{}",
                    self.host,
                    self.port
                );
                let learn_result = match &self.known_hosts_path {
                    Some(path) => {
                        learn_known_hosts_path(&self.host, self.port, server_public_key, path)
                    }
                    None => learn_known_hosts(&self.host, self.port, server_public_key),
                };
                if let Err(e) = learn_result {
                    tracing::warn!("Failed to save host key to known_hosts: {}", e);
                }
                Ok(true)
            }
            Ok(false) => Ok(false),
            Err(russh::keys::Error::KeyChanged { line }) => {
                tracing::error!(
                    "Host key for {}:{} does not match known_hosts line {}",
                    self.host,
                    self.port,
                    line
                );
                Ok(false)
            }
            // Unreadable known_hosts behaves like an unknown host.
            Err(_) => Ok(self.trust_on_first_use),
        }
    }
}

/// An established SSH session.
///
/// Commands run one channel each, so a session can be shared by reference
/// between the sequential steps of one pipeline.
pub struct Session {
    config: SessionConfig,
    handle: Handle<SshHandler>,
    closed: AtomicBool,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("handle", &"<russh::Handle>")
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

impl Session {
    /// Connect to the remote host and authenticate with the configured credential.
    pub async fn connect(config: SessionConfig) -> Result<Self> {
        // Resolve key material before touching the network so a bad key fails fast.
        let auth = ResolvedAuth::load(&config.credential)?;

        let russh_config = Config {
            inactivity_timeout: None,
            keepalive_interval: Some(Duration::from_secs(15)),
            ..Default::default()
        };

        let handler = SshHandler {
            host: config.host.clone(),
            port: config.port,
            trust_on_first_use: config.trust_on_first_use,
            known_hosts_path: config.known_hosts_path.clone(),
        };

        let connecting = client::connect(
            Arc::new(russh_config),
            (config.host.as_str(), config.port),
            handler,
        );

        let mut handle = match tokio::time::timeout(config.connect_timeout, connecting).await {
            Ok(Ok(handle)) => handle,
            Ok(Err(e)) => {
                let reason = if e.to_string().contains("Connection refused") {
                    format!("connection refused to {}:{}", config.host, config.port)
                } else {
                    e.to_string()
                };
                return Err(Error::Connection(reason));
            }
            Err(_) => {
                return Err(Error::ConnectTimeout {
                    host: config.host.clone(),
                    port: config.port,
                    timeout: config.connect_timeout,
                });
            }
        };

        if !auth.authenticate(&mut handle, &config.user).await? {
            return Err(Error::AuthenticationFailed {
                user: config.user.clone(),
                host: config.host.clone(),
                method: config.credential.method(),
            });
        }

        tracing::debug!(
            host = %config.host,
            port = config.port,
            method = config.credential.method(),
            "SSH session established"
        );

        Ok(Self {
            config,
            handle,
            closed: AtomicBool::new(false),
        })
    }

    /// Execute a command on the remote host, buffering all output.
    pub async fn exec(&self, command: &str) -> Result<CommandOutput> {
        self.exec_with_timeout(command, self.config.command_timeout)
            .await
    }

    /// Execute a command with a custom timeout.
    pub async fn exec_with_timeout(
        &self,
        command: &str,
        timeout: Duration,
    ) -> Result<CommandOutput> {
        match tokio::time::timeout(timeout, self.exec_inner(command)).await {
            Ok(result) => result,
            Err(_) => Err(Error::CommandTimeout(timeout)),
        }
    }

    async fn exec_inner(&self, command: &str) -> Result<CommandOutput> {
        let mut reader = ExecReader::new(self.open_exec(command).await?);
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();

        while let Some(event) = reader.next().await {
            match event {
                ExecEvent::Stdout(data) => stdout.extend_from_slice(&data),
                ExecEvent::Stderr(data) => stderr.extend_from_slice(&data),
            }
        }

        Ok(CommandOutput {
            exit_code: reader.exit_code()?,
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        })
    }

    /// Execute a command, forwarding output chunks to `sink` as they arrive.
    ///
    /// Returns the exit code; a nonzero code is not an error here.
    pub async fn exec_stream(&self, command: &str, sink: &LogSink) -> Result<u32> {
        let mut reader = ExecReader::new(self.open_exec(command).await?);
        let mut out = Utf8Decoder::default();
        let mut err = Utf8Decoder::default();

        while let Some(event) = reader.next().await {
            match event {
                ExecEvent::Stdout(data) => sink.stdout(out.push(&data)).await,
                ExecEvent::Stderr(data) => sink.stderr(err.push(&data)).await,
            }
        }
        sink.stdout(out.finish()).await;
        sink.stderr(err.finish()).await;

        reader.exit_code()
    }

    /// Write `data` to `remote_path` by piping it into `cat` on the remote side.
    pub async fn put_buffer(&self, data: &[u8], remote_path: &str) -> Result<()> {
        let command = format!("cat > {}", shell::quote(remote_path));
        let channel = self.open_exec(&command).await?;

        channel
            .data(data)
            .await
            .map_err(|e| Error::UploadFailed {
                path: remote_path.to_string(),
                reason: e.to_string(),
            })?;
        channel.eof().await?;

        let mut reader = ExecReader::new(channel);
        let mut stderr = Vec::new();
        while let Some(event) = reader.next().await {
            if let ExecEvent::Stderr(data) = event {
                stderr.extend_from_slice(&data);
            }
        }

        match reader.exit_code()? {
            0 => Ok(()),
            code => Err(Error::UploadFailed {
                path: remote_path.to_string(),
                reason: format!(
                    "exit code {}: {}",
                    code,
                    String::from_utf8_lossy(&stderr).trim()
                ),
            }),
        }
    }

    async fn open_exec(&self, command: &str) -> Result<Channel<Msg>> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::Closed);
        }

        let channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| Error::CommandFailed(format!("failed to open channel: {}", e)))?;

        channel
            .exec(true, command)
            .await
            .map_err(|e| Error::CommandFailed(format!("failed to exec command: {}", e)))?;

        Ok(channel)
    }

    /// Close the session. Calling this more than once is a no-op.
    pub async fn end(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
            .map_err(Error::Protocol)
    }
}

/// Key or password material loaded from a `Credential`.
enum ResolvedAuth {
    Key(Arc<ssh_key::PrivateKey>),
    Password(String),
}

impl ResolvedAuth {
    fn load(credential: &Credential) -> Result<Self> {
        match credential {
            Credential::PrivateKey {
                material,
                passphrase,
            } => {
                let key = decode_secret_key(material, passphrase.as_deref())
                    .map_err(|e| Error::KeyDecodeFailed(e.to_string()))?;
                Ok(Self::Key(Arc::new(key)))
            }
            Credential::KeyFile { path, passphrase } => {
                let key = load_secret_key(path, passphrase.as_deref()).map_err(|e| {
                    Error::KeyLoadFailed {
                        path: path.clone(),
                        reason: e.to_string(),
                    }
                })?;
                Ok(Self::Key(Arc::new(key)))
            }
            Credential::Password(password) if password.is_empty() => Err(
                Error::MissingCredential("password is empty".to_string()),
            ),
            Credential::Password(password) => Ok(Self::Password(password.clone())),
        }
    }

    async fn authenticate(self, handle: &mut Handle<SshHandler>, user: &str) -> Result<bool> {
        match self {
            ResolvedAuth::Key(key) => {
                let hash_alg = handle
                    .best_supported_rsa_hash()
                    .await
                    .map_err(Error::Protocol)?
                    .flatten();

                let result = handle
                    .authenticate_publickey(user, PrivateKeyWithHashAlg::new(key, hash_alg))
                    .await
                    .map_err(Error::Protocol)?;
                Ok(result.success())
            }
            ResolvedAuth::Password(password) => {
                let result = handle
                    .authenticate_password(user, password)
                    .await
                    .map_err(Error::Protocol)?;
                Ok(result.success())
            }
        }
    }
}

enum ExecEvent {
    Stdout(Vec<u8>),
    Stderr(Vec<u8>),
}

/// Drains one exec channel, yielding output until the remote process has
/// both exited and closed its output.
struct ExecReader {
    channel: Channel<Msg>,
    state: ExitState,
}

impl ExecReader {
    fn new(channel: Channel<Msg>) -> Self {
        Self {
            channel,
            state: ExitState::default(),
        }
    }

    async fn next(&mut self) -> Option<ExecEvent> {
        while !self.state.done {
            match self.channel.wait().await {
                Some(msg) => {
                    if let Some(event) = self.state.observe(msg) {
                        return Some(event);
                    }
                }
                None => self.state.done = true,
            }
        }
        None
    }

    fn exit_code(&self) -> Result<u32> {
        self.state.exit_code()
    }
}

/// Channel messages folded into output events and an exit code.
#[derive(Debug, Default)]
struct ExitState {
    exit_status: Option<u32>,
    eof: bool,
    done: bool,
}

impl ExitState {
    fn observe(&mut self, msg: ChannelMsg) -> Option<ExecEvent> {
        match msg {
            ChannelMsg::Data { data } => return Some(ExecEvent::Stdout(data.to_vec())),
            ChannelMsg::ExtendedData { data, ext } if ext == 1 => {
                return Some(ExecEvent::Stderr(data.to_vec()));
            }
            ChannelMsg::ExitStatus { exit_status } => {
                self.exit_status = Some(exit_status);
                self.done = self.eof;
            }
            ChannelMsg::ExitSignal { signal_name, .. } => {
                tracing::debug!("remote command killed by signal {:?}", signal_name);
                self.exit_status = Some(signal_exit_code(&signal_name));
                self.done = self.eof;
            }
            ChannelMsg::Eof => {
                self.eof = true;
                self.done = self.exit_status.is_some();
            }
            ChannelMsg::Close => self.done = true,
            _ => {}
        }
        None
    }

    /// A channel that closed without an exit status or signal was cut off
    /// (network drop, session closed underneath us), which is a transport failure.
    fn exit_code(&self) -> Result<u32> {
        self.exit_status.ok_or(Error::ChannelClosed)
    }
}

/// Shell convention for a process killed by a signal: 128 + signal number.
fn signal_exit_code(signal: &Sig) -> u32 {
    let number = match signal {
        Sig::HUP => 1,
        Sig::INT => 2,
        Sig::QUIT => 3,
        Sig::ILL => 4,
        Sig::ABRT => 6,
        Sig::FPE => 8,
        Sig::KILL => 9,
        Sig::USR1 => 10,
        Sig::SEGV => 11,
        Sig::PIPE => 13,
        Sig::ALRM => 14,
        Sig::TERM => 15,
        Sig::Custom(_) => return 255,
    };
    128 + number
}
