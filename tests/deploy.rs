// ABOUTME: Integration tests for the release deployer against the scripted remote.
// ABOUTME: Covers atomic cutover, failure isolation, log streaming, bundles, and release inventory.

mod support;

use hoist::config::DeployStrategy;
use hoist::deploy::{ReleaseDeployer, ReleaseLayout};
use hoist::guard::OperationGuard;
use hoist::logs::{DEFAULT_CAPACITY, LogSink};
use hoist::types::ReleaseId;
use support::fake_remote::{COMMIT, FakeConnector};
use support::{project, server};

fn deployer(connector: &FakeConnector) -> ReleaseDeployer<FakeConnector> {
    ReleaseDeployer::new(connector.clone(), OperationGuard::new())
}

#[tokio::test]
async fn successful_deploy_then_failed_build_keeps_current() {
    support::init_tracing();
    let connector = FakeConnector::new();
    let deployer = deployer(&connector);

    let first = deployer
        .deploy(&server(), &project(), &LogSink::new())
        .await;
    assert!(first.success, "first deploy failed: {:?}", first.error);
    let first_id = first.release_id.clone().expect("release id");
    assert_eq!(first_id.as_str().len(), 14);
    assert_eq!(first.commit_hash.as_deref(), Some(COMMIT));
    assert_eq!(
        connector.current("/srv/a"),
        Some(format!("releases/{first_id}"))
    );
    assert!(
        connector
            .commands()
            .iter()
            .any(|c| c.contains("git clone --depth 1 --single-branch --branch main")),
    );

    connector.fail_on("build.sh", 1);
    let second = deployer
        .deploy(&server(), &project(), &LogSink::new())
        .await;

    assert!(!second.success);
    let error = second.error.as_deref().unwrap_or_default();
    assert!(error.contains("Building"), "unexpected error: {error}");
    assert!(error.contains("exit code 1"), "unexpected error: {error}");
    let second_id = second.release_id.expect("failed deploy still has an id");
    assert!(second_id > first_id);
    assert_eq!(
        connector.current("/srv/a"),
        Some(format!("releases/{first_id}"))
    );
    // The failed release directory stays behind.
    assert_eq!(
        connector.release_dirs("/srv/a"),
        vec![first_id.to_string(), second_id.to_string()]
    );
}

#[tokio::test]
async fn protocol_runs_steps_in_order() {
    let connector = FakeConnector::new();
    let result = deployer(&connector)
        .deploy(&server(), &project(), &LogSink::new())
        .await;
    assert!(result.success);
    let id = result.release_id.unwrap();

    let commands = connector.commands();
    let release = format!("/srv/a/releases/{id}");
    let position = |needle: &str| {
        commands
            .iter()
            .position(|c| c.contains(needle))
            .unwrap_or_else(|| panic!("no command containing {needle:?} in {commands:#?}"))
    };

    let mkdir = position(&format!("mkdir -p {release}"));
    let clone = position("git clone");
    let install = position("npm install --production");
    let build = position("./build.sh");
    let activate = position("mv -Tf");
    let restart = position("./run.sh");
    assert!(mkdir < clone && clone < install && install < build);
    assert!(build < activate && activate < restart);
    assert_eq!(connector.state().ends, 1);
}

#[tokio::test]
async fn fetch_failure_never_touches_current() {
    let connector = FakeConnector::new();
    connector.fail_on("git clone", 128);

    let result = deployer(&connector)
        .deploy(&server(), &project(), &LogSink::new())
        .await;

    assert!(!result.success);
    assert!(result.error.unwrap().contains("Cloning repository"));
    assert_eq!(connector.current("/srv/a"), None);
    assert!(!connector.commands().iter().any(|c| c.contains("ln -sfn")));
    assert_eq!(connector.state().ends, 1, "session closed after failure");
}

#[tokio::test]
async fn install_failure_never_touches_current() {
    let connector = FakeConnector::new();
    let deployer = deployer(&connector);
    let first = deployer.deploy(&server(), &project(), &LogSink::new()).await;
    let first_id = first.release_id.unwrap();

    connector.fail_on("npm install --production", 1);
    let result = deployer.deploy(&server(), &project(), &LogSink::new()).await;

    assert!(!result.success);
    assert!(result.error.unwrap().contains("Installing dependencies"));
    assert_eq!(
        connector.current("/srv/a"),
        Some(format!("releases/{first_id}"))
    );
    let second_release = format!("/srv/a/releases/{}", result.release_id.unwrap());
    assert!(
        !connector
            .commands()
            .iter()
            .any(|c| c.contains(&second_release) && c.contains("./build.sh"))
    );
}

#[tokio::test]
async fn restart_failure_after_cutover_is_reported_but_current_has_moved() {
    let connector = FakeConnector::new();
    connector.fail_on("./run.sh", 1);

    let result = deployer(&connector)
        .deploy(&server(), &project(), &LogSink::new())
        .await;

    assert!(!result.success);
    assert!(result.error.unwrap().contains("Restarting application"));
    let id = result.release_id.expect("release id");
    assert_eq!(connector.current("/srv/a"), Some(format!("releases/{id}")));
    assert_eq!(result.commit_hash, None);
}

#[tokio::test]
async fn transport_loss_mid_deploy_fails_and_still_closes() {
    let connector = FakeConnector::new();
    connector.state().transport_error_on = Some("build.sh".to_string());

    let result = deployer(&connector)
        .deploy(&server(), &project(), &LogSink::new())
        .await;

    assert!(!result.success);
    assert!(result.release_id.is_some());
    assert_eq!(connector.current("/srv/a"), None);
    assert!(!connector.commands().iter().any(|c| c.contains("mv -Tf")));
    assert_eq!(connector.state().ends, 1);
}

#[tokio::test]
async fn image_is_built_before_cutover_and_run_by_release_tag() {
    let connector = FakeConnector::new();
    let mut project = project();
    project.strategy = DeployStrategy::Image;
    project.start_command = None;

    let result = deployer(&connector)
        .deploy(&server(), &project, &LogSink::new())
        .await;
    assert!(result.success, "{:?}", result.error);
    let id = result.release_id.unwrap();

    let commands = connector.commands();
    let position = |needle: &str| commands.iter().position(|c| c.contains(needle));
    assert_eq!(position("npm install"), None);
    let build = position(&format!("docker build -t hoist/a:{id} .")).expect("image build");
    let activate = position("mv -Tf").expect("cutover");
    let run = position(&format!("--restart unless-stopped hoist/a:{id}")).expect("container");
    assert!(commands[build].starts_with(&format!("cd /srv/a/releases/{id} && ")));
    assert!(build < activate && activate < run);
}

#[tokio::test]
async fn failed_image_build_keeps_current() {
    let connector = FakeConnector::new();
    let deployer = deployer(&connector);
    let mut project = project();
    project.strategy = DeployStrategy::Image;
    project.start_command = None;

    let first = deployer.deploy(&server(), &project, &LogSink::new()).await;
    assert!(first.success);
    let first_id = first.release_id.unwrap();

    connector.fail_on("docker build", 1);
    let second = deployer.deploy(&server(), &project, &LogSink::new()).await;

    assert!(!second.success);
    assert!(second.error.unwrap().contains("Building image"));
    assert_eq!(
        connector.current("/srv/a"),
        Some(format!("releases/{first_id}"))
    );
    let second_tag = format!("hoist/a:{}", second.release_id.unwrap());
    assert!(
        !connector
            .commands()
            .iter()
            .any(|c| c.contains("docker run") && c.contains(&second_tag))
    );
}

#[tokio::test]
async fn compose_builds_in_the_release_and_starts_without_building() {
    let connector = FakeConnector::new();
    let mut project = project();
    project.strategy = DeployStrategy::Compose;
    project.start_command = None;

    let result = deployer(&connector)
        .deploy(&server(), &project, &LogSink::new())
        .await;
    assert!(result.success, "{:?}", result.error);
    let id = result.release_id.unwrap();

    let commands = connector.commands();
    let build = commands
        .iter()
        .position(|c| c == &format!("cd /srv/a/releases/{id} && docker compose -p a build"))
        .expect("compose build");
    let up = commands
        .iter()
        .position(|c| c.ends_with("docker compose -p a up -d --no-build --remove-orphans"))
        .expect("compose up");
    let activate = commands.iter().position(|c| c.contains("mv -Tf")).unwrap();
    assert!(build < activate && activate < up);
}

#[tokio::test]
async fn connection_failure_issues_no_commands() {
    let connector = FakeConnector::new();
    connector.state().refuse_connect = true;

    let result = deployer(&connector)
        .deploy(&server(), &project(), &LogSink::new())
        .await;

    assert!(!result.success);
    assert!(result.error.unwrap().contains("connection failed"));
    assert!(connector.commands().is_empty());
}

#[tokio::test]
async fn invalid_project_fails_before_connecting() {
    let connector = FakeConnector::new();
    let mut project = project();
    project.deploy_path = "relative/path".to_string();

    let result = deployer(&connector)
        .deploy(&server(), &project, &LogSink::new())
        .await;

    assert!(!result.success);
    assert_eq!(connector.connects(), 0);
}

#[tokio::test]
async fn logs_stream_progress_and_remote_output() {
    let connector = FakeConnector::new();
    let sink = LogSink::new();
    let subscription = sink.subscribe(DEFAULT_CAPACITY);

    let result = deployer(&connector).deploy(&server(), &project(), &sink).await;
    assert!(result.success);
    drop(sink);

    let text = subscription.collect_text().await;
    assert!(text.contains("==> Creating release directory"));
    assert!(text.contains("==> Cloning repository"));
    assert!(text.contains("Cloning...")); // remote stdout
    assert!(text.contains("==> Restarting application"));
    // Commands are not echoed; repository URLs may carry tokens.
    assert!(!text.contains("https://git.example.com"));
}

#[tokio::test]
async fn release_ids_increase_across_quick_deploys() {
    let connector = FakeConnector::new();
    let deployer = deployer(&connector);
    let mut previous: Option<ReleaseId> = None;
    for _ in 0..3 {
        let id = deployer
            .deploy(&server(), &project(), &LogSink::new())
            .await
            .release_id
            .unwrap();
        if let Some(prev) = &previous {
            assert!(&id > prev);
        }
        previous = Some(id);
    }
}

#[tokio::test]
async fn close_failure_is_a_warning() {
    let connector = FakeConnector::new();
    connector.state().fail_end = true;

    let result = deployer(&connector)
        .deploy(&server(), &project(), &LogSink::new())
        .await;

    assert!(result.success);
    assert_eq!(result.warnings.len(), 1);
    assert!(result.warnings[0].contains("failed to close SSH session"));
}

#[tokio::test]
async fn staged_bundle_is_extracted_instead_of_cloned() {
    let connector = FakeConnector::new();
    let deployer = deployer(&connector);
    let bundle = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(bundle.path(), b"not really gzip").unwrap();

    let mut project = project();
    let staged = deployer
        .stage_bundle(&server(), &project, bundle.path(), &LogSink::new())
        .await
        .unwrap();
    assert!(staged.starts_with("/srv/a/.bundles/"));
    assert!(staged.ends_with(".tar.gz"));
    assert_eq!(
        connector.state().uploads.get(&staged).map(Vec::as_slice),
        Some(&b"not really gzip"[..])
    );

    project.local_bundle_path = Some(staged.clone());
    let result = deployer.deploy(&server(), &project, &LogSink::new()).await;
    assert!(result.success);
    let commands = connector.commands();
    assert!(commands.iter().any(|c| c.starts_with(&format!("tar -xzf {staged} -C "))));
    assert!(!commands.iter().any(|c| c.contains("git clone")));
}

#[tokio::test]
async fn inventory_lists_releases_and_current() {
    let connector = FakeConnector::new();
    let deployer = deployer(&connector);

    let empty = deployer.inventory(&server(), &project()).await.unwrap();
    assert!(empty.releases.is_empty());
    assert_eq!(empty.current, None);

    let first = deployer.deploy(&server(), &project(), &LogSink::new()).await;
    let second = deployer.deploy(&server(), &project(), &LogSink::new()).await;

    let inventory = deployer.inventory(&server(), &project()).await.unwrap();
    assert_eq!(
        inventory.releases,
        vec![first.release_id.unwrap(), second.release_id.clone().unwrap()]
    );
    assert_eq!(inventory.current, second.release_id);
}

#[test]
fn layout_matches_remote_contract() {
    let layout = ReleaseLayout::for_project(&project());
    assert_eq!(layout.releases_dir(), "/srv/a/releases");
    assert_eq!(layout.current_link(), "/srv/a/current");
}
