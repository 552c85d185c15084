// ABOUTME: Library root for hoist: the remote deployment and provisioning engine.
// ABOUTME: The CLI binary is in main.rs; everything it drives is exposed here for embedding and tests.

pub mod config;
pub mod deploy;
pub mod diagnostics;
pub mod error;
pub mod guard;
pub mod hooks;
pub mod logs;
pub mod output;
pub mod provision;
pub mod pulse;
pub mod shell;
pub mod ssh;
pub mod step;
pub mod types;
