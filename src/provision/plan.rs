// ABOUTME: Per-OS-family provisioning commands: container engine, git, and the firewall baseline.
// ABOUTME: Every step here is best-effort; package managers often exit nonzero for "already installed".

use super::detection::{OsFamily, Privilege};
use crate::shell::quote;
use crate::step::Step;

const DOCKER_INSTALL_SCRIPT: &str = "https://get.docker.com";

/// Ordered install commands for a supported family. Empty for an
/// unsupported one; callers must reject those before asking.
pub fn install_steps(family: &OsFamily, privilege: Privilege, user: &str) -> Vec<Step> {
    let p = privilege.prefix();
    let mut steps = match family {
        OsFamily::Debian => vec![
            Step::best_effort("Updating package index", format!("{p}apt-get update -y")),
            Step::best_effort(
                "Installing git and curl",
                format!(
                    "{p}env DEBIAN_FRONTEND=noninteractive apt-get install -y git curl ca-certificates"
                ),
            ),
            docker_script(privilege),
            Step::best_effort("Enabling Docker", format!("{p}systemctl enable --now docker")),
        ],
        OsFamily::RedHat => vec![
            Step::best_effort(
                "Installing git and curl",
                format!("{p}dnf install -y git curl || {p}yum install -y git curl"),
            ),
            docker_script(privilege),
            Step::best_effort("Enabling Docker", format!("{p}systemctl enable --now docker")),
        ],
        OsFamily::Alpine => vec![
            Step::best_effort("Updating package index", format!("{p}apk update")),
            Step::best_effort(
                "Installing git, curl and Docker",
                format!("{p}apk add git curl docker docker-cli-compose"),
            ),
            Step::best_effort(
                "Enabling Docker",
                format!("{p}rc-update add docker default && {p}service docker start"),
            ),
        ],
        OsFamily::Unsupported(_) => return Vec::new(),
    };

    if privilege == Privilege::Sudo {
        let command = match family {
            OsFamily::Alpine => format!("{p}addgroup {} docker", quote(user)),
            _ => format!("{p}usermod -aG docker {}", quote(user)),
        };
        steps.push(Step::best_effort(
            format!("Adding {user} to the docker group"),
            command,
        ));
    }
    steps
}

/// get.docker.com detects the distribution itself. Skipped when docker is
/// already on PATH so reruns do not reinstall.
fn docker_script(privilege: Privilege) -> Step {
    let shell = match privilege {
        Privilege::Root => "sh".to_string(),
        Privilege::Sudo => format!("{}sh", privilege.prefix()),
    };
    Step::best_effort(
        "Installing Docker",
        format!(
            "command -v docker >/dev/null 2>&1 || curl -fsSL {DOCKER_INSTALL_SCRIPT} | {shell}"
        ),
    )
}

/// Firewall baseline: allow SSH, HTTP and HTTPS inbound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirewallPlan {
    pub tool: &'static str,
    /// Installs the tool.
    pub setup: Vec<Step>,
    /// Exits zero when the tool is usable; the rules are skipped otherwise.
    pub probe: String,
    pub rules: Vec<Step>,
}

/// `None` for families without a firewall tool we manage.
pub fn firewall_plan(
    family: &OsFamily,
    privilege: Privilege,
    ssh_port: u16,
) -> Option<FirewallPlan> {
    let p = privilege.prefix();
    match family {
        OsFamily::Debian => Some(FirewallPlan {
            tool: "ufw",
            setup: vec![Step::best_effort(
                "Installing ufw",
                format!("{p}env DEBIAN_FRONTEND=noninteractive apt-get install -y ufw"),
            )],
            probe: "command -v ufw >/dev/null 2>&1 || test -x /usr/sbin/ufw".to_string(),
            rules: vec![
                Step::best_effort("Allowing SSH", format!("{p}ufw allow {ssh_port}/tcp")),
                Step::best_effort("Allowing HTTP", format!("{p}ufw allow 80/tcp")),
                Step::best_effort("Allowing HTTPS", format!("{p}ufw allow 443/tcp")),
                Step::best_effort("Enabling firewall", format!("{p}ufw --force enable")),
            ],
        }),
        OsFamily::RedHat => Some(FirewallPlan {
            tool: "firewalld",
            setup: vec![
                Step::best_effort(
                    "Installing firewalld",
                    format!("{p}dnf install -y firewalld || {p}yum install -y firewalld"),
                ),
                Step::best_effort(
                    "Starting firewalld",
                    format!("{p}systemctl enable --now firewalld"),
                ),
            ],
            probe: "command -v firewall-cmd >/dev/null 2>&1 || test -x /usr/bin/firewall-cmd"
                .to_string(),
            rules: vec![
                Step::best_effort(
                    "Allowing SSH",
                    format!("{p}firewall-cmd --permanent --add-port={ssh_port}/tcp"),
                ),
                Step::best_effort(
                    "Allowing HTTP",
                    format!("{p}firewall-cmd --permanent --add-service=http"),
                ),
                Step::best_effort(
                    "Allowing HTTPS",
                    format!("{p}firewall-cmd --permanent --add-service=https"),
                ),
                Step::best_effort("Reloading firewall", format!("{p}firewall-cmd --reload")),
            ],
        }),
        OsFamily::Alpine | OsFamily::Unsupported(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_steps_are_all_best_effort() {
        for family in [OsFamily::Debian, OsFamily::RedHat, OsFamily::Alpine] {
            let steps = install_steps(&family, Privilege::Sudo, "deploy");
            assert!(!steps.is_empty());
            assert!(steps.iter().all(|s| !s.mandatory), "{family}");
        }
    }

    #[test]
    fn sudo_prefix_and_group_membership_for_non_root() {
        let steps = install_steps(&OsFamily::Debian, Privilege::Sudo, "deploy");
        assert_eq!(steps[0].command, "sudo -n apt-get update -y");
        assert!(steps[2].command.ends_with("| sudo -n sh"));
        assert_eq!(
            steps.last().map(|s| s.command.as_str()),
            Some("sudo -n usermod -aG docker deploy")
        );
    }

    #[test]
    fn root_needs_no_prefix_or_group() {
        let steps = install_steps(&OsFamily::RedHat, Privilege::Root, "root");
        assert!(steps.iter().all(|s| !s.command.contains("sudo")));
        assert!(steps.iter().all(|s| !s.command.contains("usermod")));
    }

    #[test]
    fn unsupported_family_has_no_steps() {
        let family = OsFamily::Unsupported("arch".to_string());
        assert!(install_steps(&family, Privilege::Root, "root").is_empty());
        assert!(firewall_plan(&family, Privilege::Root, 22).is_none());
    }

    #[test]
    fn firewall_opens_configured_ssh_port() {
        let plan = firewall_plan(&OsFamily::Debian, Privilege::Root, 2222).unwrap();
        assert_eq!(plan.tool, "ufw");
        let commands: Vec<_> = plan.rules.iter().map(|s| s.command.as_str()).collect();
        assert_eq!(
            commands,
            [
                "ufw allow 2222/tcp",
                "ufw allow 80/tcp",
                "ufw allow 443/tcp",
                "ufw --force enable"
            ]
        );
        assert!(firewall_plan(&OsFamily::Alpine, Privilege::Root, 22).is_none());
    }
}
