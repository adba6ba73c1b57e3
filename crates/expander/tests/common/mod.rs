//! Shared test doubles: a scripted in-memory gateway and an instant clock.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use expander::{
    BeginInstallation, Clock, ClusterCredentials, ClusterRole, CredentialCheck, Gateway,
    GatewayError, GatewayStatus, Manifest, ManifestBuilder, ManifestToken, NodeRecord, Phase,
    PhaseReport,
};

/// Gateway operation recorded by [`ScriptedGateway`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Abort,
    ClearQueue,
    MoveToIdle,
    SubmitManifest(usize),
    ValidateCredentials(Vec<String>),
    Begin(String),
    Check(Phase),
    Advance(Phase),
    Retry(Phase),
}

/// One scripted poll answer.
#[derive(Debug, Clone)]
pub enum Poll {
    Status(&'static str),
    Report(PhaseReport),
    Unreachable,
}

/// In-memory gateway answering from per-phase scripts.
///
/// Unscripted polls report `completed`; unscripted operations return 200.
pub struct ScriptedGateway {
    polls: Mutex<HashMap<Phase, VecDeque<Poll>>>,
    advance: Mutex<HashMap<Phase, GatewayStatus>>,
    begin: Mutex<GatewayStatus>,
    credentials: Mutex<GatewayStatus>,
    manifest: Mutex<Option<String>>,
    clear_queue: Mutex<VecDeque<GatewayStatus>>,
    installed: Vec<String>,
    cancel_at_poll: Mutex<Option<(u32, CancellationToken)>>,
    cancel_on_submit: Mutex<Option<CancellationToken>>,
    calls: Mutex<Vec<Call>>,
}

impl Default for ScriptedGateway {
    fn default() -> Self {
        Self {
            polls: Mutex::new(HashMap::new()),
            advance: Mutex::new(HashMap::new()),
            begin: Mutex::new(GatewayStatus::ok("started")),
            credentials: Mutex::new(GatewayStatus::ok("credentials valid")),
            manifest: Mutex::new(Some("manifest-1".to_string())),
            clear_queue: Mutex::new(VecDeque::new()),
            installed: vec!["10.0.0.21".to_string(), "10.0.0.22".to_string()],
            cancel_at_poll: Mutex::new(None),
            cancel_on_submit: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue poll answers for a phase.
    pub fn script(self, phase: Phase, polls: &[Poll]) -> Self {
        self.polls
            .lock()
            .unwrap()
            .entry(phase)
            .or_default()
            .extend(polls.iter().cloned());
        self
    }

    pub fn refuse_advance(self, phase: Phase, status: GatewayStatus) -> Self {
        self.advance.lock().unwrap().insert(phase, status);
        self
    }

    pub fn refuse_begin(self, status: GatewayStatus) -> Self {
        *self.begin.lock().unwrap() = status;
        self
    }

    pub fn refuse_credentials(self, status: GatewayStatus) -> Self {
        *self.credentials.lock().unwrap() = status;
        self
    }

    pub fn refuse_manifest(self) -> Self {
        *self.manifest.lock().unwrap() = None;
        self
    }

    /// Answer the next clear-queue calls with these statuses.
    pub fn clear_queue_answers(self, answers: &[GatewayStatus]) -> Self {
        self.clear_queue
            .lock()
            .unwrap()
            .extend(answers.iter().cloned());
        self
    }

    /// Cancel `token` while answering the `n`th poll.
    pub fn cancel_at_poll(self, n: u32, token: CancellationToken) -> Self {
        *self.cancel_at_poll.lock().unwrap() = Some((n, token));
        self
    }

    /// Cancel `token` while the manifest is being submitted.
    pub fn cancel_on_submit(self, token: CancellationToken) -> Self {
        *self.cancel_on_submit.lock().unwrap() = Some(token);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    pub fn polls(&self) -> usize {
        self.count(|c| matches!(c, Call::Check(_)))
    }

    pub fn advances(&self) -> usize {
        self.count(|c| matches!(c, Call::Advance(_)))
    }

    pub fn retries(&self) -> usize {
        self.count(|c| matches!(c, Call::Retry(_)))
    }

    pub fn resets(&self) -> usize {
        self.count(|c| matches!(c, Call::MoveToIdle))
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Gateway for ScriptedGateway {
    async fn abort_operation(&self) -> Result<GatewayStatus, GatewayError> {
        self.record(Call::Abort);
        Ok(GatewayStatus::ok("nothing to abort"))
    }

    async fn clear_queue(&self) -> Result<GatewayStatus, GatewayError> {
        self.record(Call::ClearQueue);
        let scripted = self.clear_queue.lock().unwrap().pop_front();
        Ok(scripted.unwrap_or_else(|| GatewayStatus::ok("queue empty")))
    }

    async fn move_to_idle(&self) -> Result<GatewayStatus, GatewayError> {
        self.record(Call::MoveToIdle);
        Ok(GatewayStatus::ok("idle"))
    }

    async fn validate_credentials(
        &self,
        check: &CredentialCheck,
    ) -> Result<GatewayStatus, GatewayError> {
        self.record(Call::ValidateCredentials(check.management_ips.clone()));
        Ok(self.credentials.lock().unwrap().clone())
    }

    async fn begin_installation(
        &self,
        req: &BeginInstallation,
    ) -> Result<GatewayStatus, GatewayError> {
        self.record(Call::Begin(req.manifest.as_str().to_string()));
        Ok(self.begin.lock().unwrap().clone())
    }

    async fn check_phase(&self, phase: Phase) -> Result<PhaseReport, GatewayError> {
        self.record(Call::Check(phase));

        let polls = u32::try_from(self.polls()).unwrap();
        if let Some((n, token)) = self.cancel_at_poll.lock().unwrap().as_ref() {
            if polls >= *n {
                token.cancel();
            }
        }

        let next = self
            .polls
            .lock()
            .unwrap()
            .get_mut(&phase)
            .and_then(VecDeque::pop_front);

        match next {
            Some(Poll::Status(status)) => {
                Ok(PhaseReport::new(status).with_message(format!("{phase} reported {status}")))
            }
            Some(Poll::Report(report)) => Ok(report),
            Some(Poll::Unreachable) => Err(GatewayError::Api {
                status: 503,
                message: "gateway busy".to_string(),
            }),
            None if phase == Phase::Configure => {
                Ok(PhaseReport::new("completed").with_installed(self.installed.clone()))
            }
            None => Ok(PhaseReport::new("completed")),
        }
    }

    async fn advance_phase(&self, phase: Phase) -> Result<GatewayStatus, GatewayError> {
        self.record(Call::Advance(phase));
        let refused = self.advance.lock().unwrap().get(&phase).cloned();
        Ok(refused.unwrap_or_else(|| GatewayStatus::ok("advanced")))
    }

    async fn retry_phase(&self, phase: Phase) -> Result<GatewayStatus, GatewayError> {
        self.record(Call::Retry(phase));
        Ok(GatewayStatus::ok("retrying"))
    }
}

#[async_trait]
impl ManifestBuilder for ScriptedGateway {
    async fn build_and_submit(&self, nodes: &[NodeRecord]) -> Result<ManifestToken, GatewayError> {
        self.record(Call::SubmitManifest(nodes.len()));
        if let Some(token) = self.cancel_on_submit.lock().unwrap().as_ref() {
            token.cancel();
        }
        match self.manifest.lock().unwrap().clone() {
            Some(token) => Ok(ManifestToken(token)),
            None => Err(GatewayError::Api {
                status: 400,
                message: "row 3: unknown operating system".to_string(),
            }),
        }
    }
}

/// Clock that returns immediately and records requested sleeps.
#[derive(Default)]
pub struct InstantClock {
    sleeps: Mutex<Vec<Duration>>,
}

impl InstantClock {
    pub fn total_slept(&self) -> Duration {
        self.sleeps.lock().unwrap().iter().sum()
    }

    pub fn sleeps(&self) -> usize {
        self.sleeps.lock().unwrap().len()
    }
}

#[async_trait]
impl Clock for InstantClock {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
        tokio::task::yield_now().await;
    }
}

/// Four-node expansion: primary and standby management, tie-breaker and one
/// storage client.
pub fn four_node_manifest() -> Manifest {
    Manifest::new(
        vec![
            NodeRecord::new("10.0.0.11", "node-pw", "euleros").with_role(ClusterRole::Management),
            NodeRecord::new("10.0.0.12", "node-pw", "euleros").with_role(ClusterRole::Standby),
            NodeRecord::new("10.0.0.13", "node-pw", "euleros").with_role(ClusterRole::TieBreaker),
            NodeRecord::new("10.0.0.21", "node-pw", "centos")
                .as_storage_client("client-a")
                .with_profile("high_throughput"),
        ],
        ClusterCredentials::new("admin-pw", "agent-pw", "10.0.0.10"),
    )
}

pub fn token() -> ManifestToken {
    ManifestToken("manifest-1".to_string())
}
