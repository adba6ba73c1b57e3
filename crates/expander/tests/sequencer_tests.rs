//! Phase sequencer behaviour against a scripted gateway.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{four_node_manifest, token, Call, InstantClock, Poll, ScriptedGateway};
use expander::{
    FailureKind, GatewayStatus, OrchestrationResult, Phase, PhaseReport, PhaseSequencer,
    SequencerConfig,
};
use tokio_util::sync::CancellationToken;

async fn run(gateway: &Arc<ScriptedGateway>, clock: &Arc<InstantClock>) -> OrchestrationResult {
    PhaseSequencer::new(gateway.clone())
        .with_clock(clock.clone())
        .run_installation(&four_node_manifest(), &token(), &CancellationToken::new())
        .await
}

fn running(polls: usize) -> Vec<Poll> {
    vec![Poll::Status("running"); polls]
}

#[tokio::test]
async fn test_happy_path_completes_all_phases() {
    let gateway = Arc::new(ScriptedGateway::new());
    let clock = Arc::new(InstantClock::default());

    let result = run(&gateway, &clock).await;

    assert!(result.is_success(), "unexpected outcome: {:?}", result.outcome);
    assert_eq!(
        result.installed_clients(),
        Some(&["10.0.0.21".to_string(), "10.0.0.22".to_string()][..])
    );
    assert_eq!(gateway.count(|c| matches!(c, Call::Begin(_))), 1);
    assert_eq!(gateway.polls(), 4);
    assert_eq!(gateway.advances(), 3);
    assert_eq!(gateway.retries(), 0);
    assert_eq!(result.stats.polls, 4);
    assert_eq!(result.stats.advances, 3);
    assert_eq!(result.stats.retries, 0);
    assert_eq!(clock.total_slept(), Duration::from_secs(4 * 60));
    assert!(result.cleanup_error.is_none());
}

#[tokio::test]
async fn test_begin_installation_before_first_poll() {
    let gateway = Arc::new(ScriptedGateway::new());
    let clock = Arc::new(InstantClock::default());

    run(&gateway, &clock).await;

    let calls = gateway.calls();
    assert_eq!(calls[0], Call::Begin("manifest-1".to_string()));
    assert_eq!(calls[1], Call::Check(Phase::Query));
    assert_eq!(calls[2], Call::Advance(Phase::Query));
    assert!(!calls.contains(&Call::Advance(Phase::Configure)));
}

#[tokio::test]
async fn test_five_running_polls_stall_the_phase() {
    let gateway = Arc::new(ScriptedGateway::new().script(Phase::Upload, &running(5)));
    let clock = Arc::new(InstantClock::default());

    let result = run(&gateway, &clock).await;

    assert_eq!(result.failure_kind(), Some(FailureKind::StallTimeout));
    assert_eq!(
        result.failure_message(),
        Some("upload phase made no progress after 5 polls (300s): upload reported running")
    );
    assert_eq!(gateway.count(|c| *c == Call::Advance(Phase::Upload)), 0);
    assert_eq!(gateway.advances(), 1);
    assert_eq!(gateway.polls(), 6);
    assert_eq!(gateway.retries(), 0);
}

#[tokio::test]
async fn test_stall_without_gateway_message() {
    let polls = vec![Poll::Report(PhaseReport::new("queued")); 5];
    let gateway = Arc::new(ScriptedGateway::new().script(Phase::Query, &polls));
    let clock = Arc::new(InstantClock::default());

    let result = run(&gateway, &clock).await;

    assert_eq!(
        result.failure_message(),
        Some("query phase made no progress after 5 polls (300s)")
    );
}

#[tokio::test]
async fn test_stall_bound_is_per_phase() {
    let gateway = Arc::new(
        ScriptedGateway::new()
            .script(Phase::Install, &running(4))
            .script(Phase::Configure, &running(4)),
    );
    let clock = Arc::new(InstantClock::default());

    let result = run(&gateway, &clock).await;

    assert!(result.is_success());
    assert_eq!(gateway.polls(), 12);
    assert_eq!(clock.total_slept(), Duration::from_secs(12 * 60));
}

#[tokio::test]
async fn test_single_retry_recovers() {
    let gateway = Arc::new(
        ScriptedGateway::new()
            .script(Phase::Install, &[Poll::Status("error"), Poll::Status("completed")]),
    );
    let clock = Arc::new(InstantClock::default());

    let result = run(&gateway, &clock).await;

    assert!(result.is_success());
    assert_eq!(gateway.retries(), 1);
    assert_eq!(gateway.count(|c| *c == Call::Retry(Phase::Install)), 1);
    assert_eq!(result.stats.retries, 1);
    assert_eq!(gateway.advances(), 3);
}

#[tokio::test]
async fn test_running_after_retry_fails_without_second_retry() {
    let gateway = Arc::new(
        ScriptedGateway::new()
            .script(Phase::Query, &[Poll::Status("error"), Poll::Status("running")]),
    );
    let clock = Arc::new(InstantClock::default());

    let result = run(&gateway, &clock).await;

    assert_eq!(result.failure_kind(), Some(FailureKind::StallTimeout));
    assert_eq!(
        result.failure_message(),
        Some("query phase still running after retry: query reported running")
    );
    assert_eq!(gateway.retries(), 1);
    assert_eq!(gateway.polls(), 2);
    assert_eq!(gateway.advances(), 0);
}

#[tokio::test]
async fn test_error_after_retry_carries_gateway_message() {
    let gateway = Arc::new(
        ScriptedGateway::new()
            .script(Phase::Query, &[Poll::Status("error"), Poll::Status("failed")]),
    );
    let clock = Arc::new(InstantClock::default());

    let result = run(&gateway, &clock).await;

    assert_eq!(result.failure_kind(), Some(FailureKind::StallTimeout));
    assert_eq!(result.failure_message(), Some("query reported failed"));
    assert_eq!(gateway.retries(), 1);
}

#[tokio::test]
async fn test_unreachable_poll_is_retried_like_an_error() {
    let gateway = Arc::new(
        ScriptedGateway::new()
            .script(Phase::Configure, &[Poll::Unreachable, Poll::Status("success")]),
    );
    let clock = Arc::new(InstantClock::default());

    let result = run(&gateway, &clock).await;

    assert!(result.is_success());
    assert_eq!(gateway.count(|c| *c == Call::Retry(Phase::Configure)), 1);
}

#[tokio::test]
async fn test_phase_history_never_regresses() {
    let gateway = Arc::new(
        ScriptedGateway::new()
            .script(
                Phase::Upload,
                &[
                    Poll::Status("running"),
                    Poll::Status("running"),
                    Poll::Status("error"),
                    Poll::Status("completed"),
                ],
            )
            .script(Phase::Install, &[Poll::Status("in_progress")]),
    );
    let clock = Arc::new(InstantClock::default());

    let result = run(&gateway, &clock).await;

    assert!(result.is_success());
    let history = &result.stats.phase_history;
    assert!(history.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(
        history,
        &vec![
            Phase::Query,
            Phase::Upload,
            Phase::Upload,
            Phase::Upload,
            Phase::Upload,
            Phase::Install,
            Phase::Install,
            Phase::Configure,
        ]
    );
}

#[tokio::test]
async fn test_refused_advance_fails_the_run() {
    let refused = GatewayStatus::refused(409, "phase locked");
    let gateway = Arc::new(ScriptedGateway::new().refuse_advance(Phase::Install, refused));
    let clock = Arc::new(InstantClock::default());

    let result = run(&gateway, &clock).await;

    assert_eq!(result.failure_kind(), Some(FailureKind::AdvanceFailed));
    assert_eq!(result.failure_message(), Some("phase locked (code 409)"));
    assert!(!gateway.calls().contains(&Call::Check(Phase::Configure)));
    assert_eq!(gateway.resets(), 1);
}

#[tokio::test]
async fn test_rejected_begin_never_polls() {
    let refused = GatewayStatus::refused(403, "license exhausted").with_error_code("E2001");
    let gateway = Arc::new(ScriptedGateway::new().refuse_begin(refused));
    let clock = Arc::new(InstantClock::default());

    let result = run(&gateway, &clock).await;

    assert_eq!(result.failure_kind(), Some(FailureKind::BeginRejected));
    assert_eq!(
        result.failure_message(),
        Some("license exhausted (code 403, error E2001)")
    );
    assert_eq!(gateway.polls(), 0);
    assert_eq!(clock.sleeps(), 0);
    assert_eq!(gateway.resets(), 1);
}

#[tokio::test]
async fn test_every_exit_resets_the_queue_once() {
    let scenarios = vec![
        ScriptedGateway::new(),
        ScriptedGateway::new().script(Phase::Query, &running(5)),
        ScriptedGateway::new().refuse_begin(GatewayStatus::refused(500, "down")),
    ];

    for gateway in scenarios {
        let gateway = Arc::new(gateway);
        let clock = Arc::new(InstantClock::default());
        run(&gateway, &clock).await;

        let calls = gateway.calls();
        let tail = &calls[calls.len() - 3..];
        assert_eq!(tail, &[Call::Abort, Call::ClearQueue, Call::MoveToIdle]);
        assert_eq!(gateway.resets(), 1);
    }
}

#[tokio::test]
async fn test_cleanup_failure_keeps_outcome() {
    let locked = GatewayStatus::refused(500, "queue locked");
    let gateway = Arc::new(ScriptedGateway::new().clear_queue_answers(&[locked]));
    let clock = Arc::new(InstantClock::default());

    let result = run(&gateway, &clock).await;

    assert!(result.is_success());
    let cleanup = result.cleanup_error.expect("cleanup error recorded");
    assert!(cleanup.contains("clear queue"), "{cleanup}");
    assert!(cleanup.contains("queue locked"), "{cleanup}");
    assert_eq!(gateway.resets(), 0);
}

#[tokio::test]
async fn test_cancelled_token_never_begins_installation() {
    let gateway = Arc::new(ScriptedGateway::new());
    let clock = Arc::new(InstantClock::default());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = PhaseSequencer::new(gateway.clone())
        .with_clock(clock.clone())
        .run_installation(&four_node_manifest(), &token(), &cancel)
        .await;

    assert_eq!(result.failure_kind(), Some(FailureKind::Cancelled));
    assert_eq!(gateway.count(|c| matches!(c, Call::Begin(_))), 0);
    assert_eq!(gateway.polls(), 0);
    assert_eq!(clock.sleeps(), 0);
    assert_eq!(
        gateway.calls(),
        vec![Call::Abort, Call::ClearQueue, Call::MoveToIdle]
    );
}

#[tokio::test]
async fn test_cancellation_interrupts_the_wait() {
    let cancel = CancellationToken::new();
    let gateway = Arc::new(
        ScriptedGateway::new()
            .script(Phase::Query, &running(4))
            .cancel_at_poll(2, cancel.clone()),
    );
    let clock = Arc::new(InstantClock::default());

    let result = PhaseSequencer::new(gateway.clone())
        .with_clock(clock.clone())
        .run_installation(&four_node_manifest(), &token(), &cancel)
        .await;

    assert_eq!(result.failure_kind(), Some(FailureKind::Cancelled));
    assert_eq!(gateway.polls(), 2);
    assert_eq!(gateway.resets(), 1);
}

#[tokio::test]
async fn test_custom_settings() {
    let gateway = Arc::new(ScriptedGateway::new().script(Phase::Query, &running(2)));
    let clock = Arc::new(InstantClock::default());
    let settings = SequencerConfig {
        poll_interval_secs: 5,
        max_stalls: 2,
    };

    let result = PhaseSequencer::new(gateway.clone())
        .with_clock(clock.clone())
        .with_settings(&settings)
        .run_installation(&four_node_manifest(), &token(), &CancellationToken::new())
        .await;

    assert_eq!(result.failure_kind(), Some(FailureKind::StallTimeout));
    assert_eq!(gateway.polls(), 2);
    assert_eq!(clock.total_slept(), Duration::from_secs(10));
}

#[tokio::test]
async fn test_huge_poll_interval_does_not_overflow() {
    let gateway = Arc::new(ScriptedGateway::new().script(Phase::Query, &running(2)));
    let clock = Arc::new(InstantClock::default());
    let settings = SequencerConfig {
        poll_interval_secs: u64::MAX,
        max_stalls: 2,
    };

    let result = PhaseSequencer::new(gateway.clone())
        .with_clock(clock.clone())
        .with_settings(&settings)
        .run_installation(&four_node_manifest(), &token(), &CancellationToken::new())
        .await;

    assert_eq!(result.failure_kind(), Some(FailureKind::StallTimeout));
    let message = result.failure_message().unwrap_or_default();
    assert!(message.contains(&format!("({}s)", u64::MAX)), "{message}");
}

#[tokio::test]
async fn test_default_poll_interval() {
    let gateway = Arc::new(ScriptedGateway::new());
    let sequencer = PhaseSequencer::new(gateway);
    assert_eq!(sequencer.poll_interval(), Duration::from_secs(60));
}
