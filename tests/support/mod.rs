// ABOUTME: Test support utilities.
// ABOUTME: Provides the scripted in-memory remote and shared config builders.

use hoist::config::{ProjectConfig, Secret, ServerConfig};
use hoist::types::ProjectName;
use std::sync::Once;

// Each test binary only uses some of these helpers, so allow dead_code.
#[allow(dead_code)]
pub mod fake_remote;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env()
            .add_directive("hoist=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

#[allow(dead_code)]
pub fn server() -> ServerConfig {
    let mut server = ServerConfig::new("app.example.com", "deploy");
    server.password = Some(Secret::Literal("hunter2".to_string()));
    server
}

/// Project "a" on branch main with build.sh and run.sh.
#[allow(dead_code)]
pub fn project() -> ProjectConfig {
    let mut project = ProjectConfig::new(
        ProjectName::new("a").unwrap(),
        "https://git.example.com/acme/a.git",
        "/srv/a",
    );
    project.build_command = Some("./build.sh".to_string());
    project.start_command = Some("./run.sh".to_string());
    project
}
