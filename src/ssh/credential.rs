// ABOUTME: Resolved SSH credential material.
// ABOUTME: Exactly one form is used per connection; Debug output never shows secrets.

use std::path::PathBuf;

/// The credential a session authenticates with.
///
/// Built from a `ServerConfig` with the precedence raw key > key file >
/// password. There is no fallback between forms once one is chosen.
#[derive(Clone)]
pub enum Credential {
    /// Private key material (OpenSSH or PEM text).
    PrivateKey {
        material: String,
        passphrase: Option<String>,
    },
    /// Path to a private key file on the local machine.
    KeyFile {
        path: PathBuf,
        passphrase: Option<String>,
    },
    Password(String),
}

impl Credential {
    /// Short name used in logs and error messages.
    pub fn method(&self) -> &'static str {
        match self {
            Credential::PrivateKey { .. } => "private key",
            Credential::KeyFile { .. } => "key file",
            Credential::Password(_) => "password",
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::PrivateKey { .. } => f.write_str("PrivateKey(<redacted>)"),
            Credential::KeyFile { path, .. } => {
                f.debug_struct("KeyFile").field("path", path).finish()
            }
            Credential::Password(_) => f.write_str("Password(<redacted>)"),
        }
    }
}
