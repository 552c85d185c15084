// ABOUTME: One-shot host metrics: CPU, memory, root disk usage and uptime from a single remote command.
// ABOUTME: Opens and closes its own connection per call; malformed output is an error, never zeroed metrics.

use crate::config::ServerConfig;
use crate::ssh::{self, Connector, Remote};
use serde::{Deserialize, Serialize};

/// POSIX shell script printing one JSON line. CPU usage is the busy share
/// between two /proc/stat samples taken one second apart; memory uses
/// MemAvailable; disk is the use% `df` reports for `/`.
pub const PULSE_COMMAND: &str = r#"a=$(head -n1 /proc/stat); sleep 1; b=$(head -n1 /proc/stat)
cpu=$(printf '%s\n%s\n' "$a" "$b" | awk '{idle=$5+$6; tot=0; for(k=2;k<=NF;k++) tot+=$k; if(NR==1){i1=idle;t1=tot}else{i2=idle;t2=tot}} END{d=t2-t1; if(d>0) printf "%.1f", (1-(i2-i1)/d)*100; else print 0}')
mem=$(awk '/^MemTotal:/{t=$2} /^MemAvailable:/{a=$2} END{if(t>0) printf "%.1f", (t-a)*100/t; else print 0}' /proc/meminfo)
disk=$(df -P / | awk 'NR==2{gsub("%","",$5); print $5}')
up=$(awk '{printf "%d", $1}' /proc/uptime)
printf '{"cpu": %s, "memory": %s, "disk": %s, "uptime": %s}\n' "$cpu" "$mem" "$disk" "$up""#;

/// Point-in-time utilisation of one host. Percentages are 0 to 100.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PulseMetrics {
    pub cpu: f64,
    pub memory: f64,
    pub disk: f64,
    /// Seconds since boot.
    pub uptime: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum PulseError {
    #[error("connection failed: {0}")]
    Connection(#[source] ssh::Error),

    #[error("metrics command exited with code {exit_code}: {stderr}")]
    CommandFailed { exit_code: u32, stderr: String },

    #[error("could not parse metrics from {output:?}: {reason}")]
    Parse { output: String, reason: String },

    #[error("remote command failed: {0}")]
    Remote(#[from] ssh::Error),
}

/// Parse the metrics line. Login banners or motd noise may precede it, so
/// only the last non-empty line is considered.
pub fn parse_pulse(stdout: &str) -> Result<PulseMetrics, PulseError> {
    let line = stdout
        .lines()
        .map(str::trim)
        .rfind(|l| !l.is_empty())
        .ok_or_else(|| PulseError::Parse {
            output: String::new(),
            reason: "no output".to_string(),
        })?;

    serde_json::from_str(line).map_err(|e| PulseError::Parse {
        output: line.to_string(),
        reason: e.to_string(),
    })
}

/// Samples metrics over a fresh connection each call.
pub struct PulseCollector<C> {
    connector: C,
}

impl<C: Connector> PulseCollector<C> {
    pub fn new(connector: C) -> Self {
        Self { connector }
    }

    pub async fn collect(&self, server: &ServerConfig) -> Result<PulseMetrics, PulseError> {
        let remote = self
            .connector
            .connect(server)
            .await
            .map_err(PulseError::Connection)?;

        let sampled = sample(&remote).await;
        if let Err(e) = remote.end().await {
            tracing::warn!(host = %server.host, "failed to close SSH session: {}", e);
        }
        let metrics = sampled?;
        tracing::debug!(host = %server.host, ?metrics, "pulse collected");
        Ok(metrics)
    }
}

async fn sample<R: Remote + ?Sized>(remote: &R) -> Result<PulseMetrics, PulseError> {
    let output = remote.exec(PULSE_COMMAND).await?;
    if !output.success() {
        return Err(PulseError::CommandFailed {
            exit_code: output.exit_code,
            stderr: output.stderr.trim().to_string(),
        });
    }
    parse_pulse(&output.stdout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_metrics_line() {
        let line = "{\"cpu\": 12.5, \"memory\": 40, \"disk\": 55, \"uptime\": 120}\n";
        let metrics = parse_pulse(line).unwrap();
        assert_eq!(
            metrics,
            PulseMetrics {
                cpu: 12.5,
                memory: 40.0,
                disk: 55.0,
                uptime: 120
            }
        );
    }

    #[test]
    fn ignores_banner_before_metrics() {
        let out = "Welcome to Ubuntu\n\n{\"cpu\": 1.0, \"memory\": 2.0, \"disk\": 3, \"uptime\": 4}\n\n";
        assert_eq!(parse_pulse(out).unwrap().uptime, 4);
    }

    #[test]
    fn malformed_output_is_an_error() {
        assert!(matches!(
            parse_pulse("cpu=12 mem=40"),
            Err(PulseError::Parse { .. })
        ));
        assert!(matches!(parse_pulse("   \n"), Err(PulseError::Parse { .. })));
        // A field the script failed to fill leaves invalid JSON behind.
        assert!(parse_pulse("{\"cpu\": 3.0, \"memory\": 4.0, \"disk\": , \"uptime\": 5}").is_err());
    }
}
