// ABOUTME: Config scaffolding for new projects.
// ABOUTME: Writes a commented hoist.yml template.

use std::path::Path;

use crate::error::{Error, Result};
use crate::types::ProjectName;

use super::CONFIG_FILENAME;

pub fn init_config(
    dir: &Path,
    project: Option<&str>,
    host: Option<&str>,
    force: bool,
) -> Result<()> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    let name = ProjectName::new(project.unwrap_or("my-app"))
        .map_err(|e| Error::InvalidConfig(e.to_string()))?;
    let host = host.unwrap_or("server.example.com");

    std::fs::write(&config_path, template_yaml(&name, host))?;
    Ok(())
}

fn template_yaml(name: &ProjectName, host: &str) -> String {
    format!(
        r#"server:
  host: {host}
  port: 22
  username: deploy
  # Exactly one credential form is used, in this order of precedence:
  #   private_key (raw key text), private_key_path, password.
  # Secrets may reference the environment instead of being written here.
  private_key_path: ~/.ssh/id_ed25519
  # password: {{ env: HOIST_SSH_PASSWORD }}
  # SSH host key verification: accept and remember unknown hosts on first connect
  # trust_first_connection: true

project:
  name: {name}
  repo_url: git@github.com:example/{name}.git
  branch: main
  deploy_path: /var/www/{name}
  # build_command: npm run build
  # start_command: pm2 startOrReload ecosystem.config.js
  # strategy: supervisor   # supervisor | compose | image

# timeouts:
#   connect: 30s
#   command: 30m
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn template_parses() {
        let name = ProjectName::new("shop").unwrap();
        let config = Config::from_yaml(&template_yaml(&name, "10.0.0.5")).unwrap();
        let project = config.project().unwrap();
        assert_eq!(project.name.as_str(), "shop");
        assert_eq!(project.deploy_path, "/var/www/shop");
        assert_eq!(config.server.host, "10.0.0.5");
    }
}
