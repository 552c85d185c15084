// ABOUTME: Remote host detection for provisioning: OS family from /etc/os-release and privilege from `id -u`.
// ABOUTME: Unknown distributions map to `OsFamily::Unsupported` so setup can stop before installing anything.

use super::ProvisionError;
use crate::ssh::Remote;
use std::fmt;

pub const OS_RELEASE_PATH: &str = "/etc/os-release";

/// Package-management family of the remote distribution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OsFamily {
    /// apt: Debian, Ubuntu and derivatives.
    Debian,
    /// dnf/yum: RHEL, CentOS, Fedora, Rocky, Alma, Amazon Linux.
    RedHat,
    /// apk + OpenRC.
    Alpine,
    /// Anything else; carries the os-release `ID`.
    Unsupported(String),
}

impl OsFamily {
    pub fn is_supported(&self) -> bool {
        !matches!(self, OsFamily::Unsupported(_))
    }

    fn from_token(token: &str) -> Option<Self> {
        match token {
            "debian" | "ubuntu" | "raspbian" | "linuxmint" | "pop" => Some(OsFamily::Debian),
            "rhel" | "centos" | "fedora" | "rocky" | "almalinux" | "amzn" | "ol" => {
                Some(OsFamily::RedHat)
            }
            "alpine" => Some(OsFamily::Alpine),
            _ => None,
        }
    }
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OsFamily::Debian => write!(f, "debian"),
            OsFamily::RedHat => write!(f, "redhat"),
            OsFamily::Alpine => write!(f, "alpine"),
            OsFamily::Unsupported(id) => write!(f, "unsupported ({id})"),
        }
    }
}

/// Whether commands need elevating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Privilege {
    Root,
    /// Non-root user; commands go through non-interactive sudo.
    Sudo,
}

impl Privilege {
    pub fn from_uid(uid: &str) -> Self {
        if uid.trim() == "0" {
            Privilege::Root
        } else {
            Privilege::Sudo
        }
    }

    /// Prefix prepended to privileged commands. `-n` makes sudo fail
    /// instead of waiting for a password nobody can type.
    pub fn prefix(self) -> &'static str {
        match self {
            Privilege::Root => "",
            Privilege::Sudo => "sudo -n ",
        }
    }
}

/// The fields of /etc/os-release that setup cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OsRelease {
    pub id: String,
    pub id_like: Vec<String>,
    pub pretty_name: Option<String>,
}

impl OsRelease {
    pub fn parse(content: &str) -> Self {
        let mut release = OsRelease::default();
        for line in content.lines() {
            let Some((key, value)) = line.trim().split_once('=') else {
                continue;
            };
            let value = unquote(value);
            match key {
                "ID" => release.id = value.to_ascii_lowercase(),
                "ID_LIKE" => {
                    release.id_like = value
                        .split_whitespace()
                        .map(str::to_ascii_lowercase)
                        .collect();
                }
                "PRETTY_NAME" if !value.is_empty() => release.pretty_name = Some(value.to_string()),
                _ => {}
            }
        }
        release
    }

    /// `ID` decides first; `ID_LIKE` covers derivatives we do not list by name.
    pub fn family(&self) -> OsFamily {
        OsFamily::from_token(&self.id)
            .or_else(|| self.id_like.iter().find_map(|t| OsFamily::from_token(t)))
            .unwrap_or_else(|| {
                let id = if self.id.is_empty() { "unknown" } else { &self.id };
                OsFamily::Unsupported(id.to_string())
            })
    }

    /// Human-readable name for results and logs.
    pub fn display_name(&self) -> String {
        match &self.pretty_name {
            Some(name) => name.clone(),
            None if self.id.is_empty() => "unknown".to_string(),
            None => self.id.clone(),
        }
    }
}

fn unquote(value: &str) -> &str {
    let value = value.trim();
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
        .unwrap_or(value)
}

/// What detection learned about a host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostInfo {
    pub os: OsRelease,
    pub family: OsFamily,
    pub privilege: Privilege,
}

/// Read the OS identification file and the current uid.
pub async fn detect_host<R: Remote + ?Sized>(remote: &R) -> Result<HostInfo, ProvisionError> {
    let os_release = remote.exec(&format!("cat {}", OS_RELEASE_PATH)).await?;
    if !os_release.success() {
        return Err(ProvisionError::Detection(format!(
            "cannot read {}: {}",
            OS_RELEASE_PATH,
            os_release.stderr.trim()
        )));
    }
    let os = OsRelease::parse(&os_release.stdout);

    let uid = remote.exec("id -u").await?;
    if !uid.success() || uid.stdout.trim().is_empty() {
        return Err(ProvisionError::Detection(format!(
            "cannot determine current user: {}",
            uid.stderr.trim()
        )));
    }

    let info = HostInfo {
        family: os.family(),
        privilege: Privilege::from_uid(&uid.stdout),
        os,
    };
    tracing::debug!(
        os = %info.os.id,
        family = %info.family,
        privilege = ?info.privilege,
        "host detected"
    );
    Ok(info)
}
