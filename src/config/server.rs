// ABOUTME: Remote target description: address, user, and one credential form.
// ABOUTME: Deserialize-only so secret material is never written back out.

use super::Secret;
use crate::error::{Error, Result};
use crate::ssh::Credential;
use crate::types::ServerId;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Clone, Deserialize)]
pub struct ServerConfig {
    /// Stable identifier for the operation guard. Defaults to `user@host:port`.
    #[serde(default)]
    pub id: Option<String>,

    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(alias = "user")]
    pub username: String,

    #[serde(default)]
    pub password: Option<Secret>,

    /// Raw private key material.
    #[serde(default)]
    pub private_key: Option<Secret>,

    #[serde(default)]
    pub private_key_path: Option<PathBuf>,

    /// Passphrase for either key form.
    #[serde(default)]
    pub passphrase: Option<Secret>,

    #[serde(default = "default_trust_first_connection")]
    pub trust_first_connection: bool,
}

fn default_port() -> u16 {
    22
}

fn default_trust_first_connection() -> bool {
    true
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, username: impl Into<String>) -> Self {
        ServerConfig {
            id: None,
            host: host.into(),
            port: default_port(),
            username: username.into(),
            password: None,
            private_key: None,
            private_key_path: None,
            passphrase: None,
            trust_first_connection: default_trust_first_connection(),
        }
    }

    pub fn id(&self) -> ServerId {
        match &self.id {
            Some(id) => ServerId::new(id.clone()),
            None => ServerId::new(format!("{}@{}:{}", self.username, self.host, self.port)),
        }
    }

    /// Pick the credential to authenticate with.
    ///
    /// Precedence is raw key, then key file, then password. The first form
    /// that is configured is the one used: if it cannot be resolved this
    /// fails rather than trying the next form.
    pub fn credential(&self) -> Result<Credential> {
        let passphrase = self
            .passphrase
            .as_ref()
            .map(|p| p.resolve("passphrase"))
            .transpose()?;

        if let Some(key) = &self.private_key {
            return Ok(Credential::PrivateKey {
                material: key.resolve("private_key")?,
                passphrase,
            });
        }

        if let Some(path) = &self.private_key_path {
            return Ok(Credential::KeyFile {
                path: expand_home(path),
                passphrase,
            });
        }

        if let Some(password) = &self.password {
            return Ok(Credential::Password(password.resolve("password")?));
        }

        Err(Error::InvalidConfig(format!(
            "server {} has no password, private_key, or private_key_path",
            self.host
        )))
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::InvalidConfig("server host cannot be empty".to_string()));
        }
        if self.username.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "server username cannot be empty".to_string(),
            ));
        }
        if self.private_key.is_none() && self.private_key_path.is_none() && self.password.is_none()
        {
            return Err(Error::InvalidConfig(format!(
                "server {} needs one of password, private_key, or private_key_path",
                self.host
            )));
        }
        Ok(())
    }
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("id", &self.id)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field("private_key_path", &self.private_key_path)
            .field("trust_first_connection", &self.trust_first_connection)
            .finish()
    }
}

fn expand_home(path: &std::path::Path) -> PathBuf {
    match (path.strip_prefix("~"), std::env::var_os("HOME")) {
        (Ok(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => path.to_path_buf(),
    }
}
