// ABOUTME: Remote session module: authenticated command execution and file transfer over SSH.
// ABOUTME: Pipelines talk to the `Remote` and `Connector` traits; `Session` is the russh implementation.

mod client;
mod credential;
mod error;
mod remote;

pub use client::{CommandOutput, Session, SessionConfig};
pub use credential::Credential;
pub use error::{Error, Result};
pub use remote::{Connector, Remote, SshConnector};
