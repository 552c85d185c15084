// ABOUTME: Connection and command time limits.
// ABOUTME: Parsed from humantime strings such as "30s" or "20m".

use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Timeouts {
    /// TCP connect plus SSH handshake.
    #[serde(default = "default_connect", with = "humantime_serde")]
    pub connect: Duration,

    /// Buffered commands (existence checks, OS detection, metric sampling).
    #[serde(default = "default_command", with = "humantime_serde")]
    pub command: Duration,
}

fn default_connect() -> Duration {
    Duration::from_secs(30)
}

fn default_command() -> Duration {
    Duration::from_secs(30 * 60)
}

impl Default for Timeouts {
    fn default() -> Self {
        Timeouts {
            connect: default_connect(),
            command: default_command(),
        }
    }
}
