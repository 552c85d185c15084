// ABOUTME: Integration tests for the step runner's mandatory/best-effort enforcement.
// ABOUTME: Runs step lists against the scripted remote and inspects outcomes and warnings.

mod support;

use hoist::diagnostics::{Diagnostics, WarningKind};
use hoist::logs::{DEFAULT_CAPACITY, LogSink};
use hoist::ssh::Connector;
use hoist::step::{Step, StepError, StepOutcome, StepRunner};
use support::fake_remote::FakeConnector;
use support::server;

#[tokio::test]
async fn mandatory_failure_stops_the_sequence() {
    let connector = FakeConnector::new();
    connector.fail_on("second", 2);
    let remote = connector.connect(&server()).await.unwrap();
    let sink = LogSink::new();
    let runner = StepRunner::new(&remote, &sink);
    let mut diag = Diagnostics::default();

    let steps = [
        Step::mandatory("one", "echo first"),
        Step::mandatory("two", "echo second"),
        Step::mandatory("three", "echo third"),
    ];
    let err = runner.run_all(&steps, &mut diag).await.unwrap_err();

    assert!(matches!(err, StepError::Failed { exit_code: 2, .. }));
    assert_eq!(err.step(), "two");
    assert_eq!(connector.commands(), ["echo first", "echo second"]);
    assert!(!diag.has_warnings());
}

#[tokio::test]
async fn best_effort_failure_becomes_a_warning() {
    let connector = FakeConnector::new();
    connector.fail_on("ufw", 1);
    let remote = connector.connect(&server()).await.unwrap();
    let sink = LogSink::new();
    let subscription = sink.subscribe(DEFAULT_CAPACITY);
    let mut diag = Diagnostics::default();

    {
        let runner = StepRunner::new(&remote, &sink);
        let outcome = runner
            .run(&Step::best_effort("Enabling firewall", "ufw --force enable"), &mut diag)
            .await
            .unwrap();
        assert_eq!(outcome, StepOutcome::Tolerated { exit_code: 1 });
        assert_eq!(
            runner.run(&Step::mandatory("After", "true"), &mut diag).await.unwrap(),
            StepOutcome::Succeeded
        );
    }

    assert_eq!(diag.warnings().len(), 1);
    assert_eq!(diag.warnings()[0].kind, WarningKind::StepTolerated);

    drop(sink);
    let text = subscription.collect_text().await;
    assert!(text.contains("==> Enabling firewall"));
    assert!(text.contains("-- Enabling firewall exited 1, continuing"));
    assert!(text.contains("simulated failure of ufw")); // remote stderr
}

#[tokio::test]
async fn transport_errors_abort_even_best_effort_steps() {
    let connector = FakeConnector::new();
    connector.state().transport_error_on = Some("flaky".to_string());
    let remote = connector.connect(&server()).await.unwrap();
    let sink = LogSink::new();
    let mut diag = Diagnostics::default();

    let err = StepRunner::new(&remote, &sink)
        .run(&Step::best_effort("Flaky", "flaky command"), &mut diag)
        .await
        .unwrap_err();

    assert!(matches!(err, StepError::Transport { .. }));
    assert!(!diag.has_warnings());
}
