//! Release pipeline sequencer.
//!
//! Drives the stages of one release run in a fixed order: registry login,
//! test gate, emulation bootstrap, tag resolution, build-and-publish. Every
//! transition is strictly forward; the first failing stage moves the run to
//! the terminal `Failed` state, nothing after the failure point runs, and
//! nothing that already ran is undone. A successful login simply expires
//! with the runner.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use slipway_core::event::Event;
use slipway_core::image::{BuildRequest, BuildResult, ImageRef, Platform};
use slipway_core::stage::{Credentials, EmulationBootstrap, ImageBuilder, RegistryAuth, TestGate};
use slipway_core::tag::{Namespace, resolve_tag};
use slipway_core::{Error, RunId};
use tracing::{error, info};

/// Position of a run in the release state machine. Transitions only move
/// forward; `Failed` is terminal and reachable from every non-terminal
/// state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Start,
    Authenticated,
    Tested,
    EmulationReady,
    Tagged,
    Published,
    Done,
    Failed,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Done | RunState::Failed)
    }
}

/// The stage a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    Login,
    TestGate,
    Emulation,
    TagResolution,
    BuildPublish,
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StageKind::Login => "registry login",
            StageKind::TestGate => "test gate",
            StageKind::Emulation => "emulation bootstrap",
            StageKind::TagResolution => "tag resolution",
            StageKind::BuildPublish => "build and publish",
        };
        f.write_str(name)
    }
}

/// How a run ended.
#[derive(Debug)]
pub enum RunOutcome {
    /// The build step completed; the result says whether it was pushed.
    Completed(BuildResult),
    /// The event did not qualify for publishing; nothing ran.
    Skipped,
    /// A stage failed and every later stage was withheld.
    Failed { stage: StageKind, error: Error },
}

/// Record of one release run.
#[derive(Debug)]
pub struct RunReport {
    pub run_id: RunId,
    pub state: RunState,
    pub outcome: RunOutcome,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        !matches!(self.outcome, RunOutcome::Failed { .. })
    }
}

/// Everything one run consumes. Built once from the event and the release
/// configuration; credentials travel separately and are never stored here.
#[derive(Debug, Clone)]
pub struct RunSpec {
    pub event: Event,
    pub registry: String,
    pub primary_branch: String,
    pub image_name: String,
    pub dockerfile: PathBuf,
    pub context: PathBuf,
    pub platforms: Vec<Platform>,
    pub push: bool,
}

/// Sequences the stages of a release run.
pub struct ReleasePipeline<A, T, E, B> {
    run_id: RunId,
    auth: A,
    gate: T,
    emulation: E,
    builder: B,
}

impl<A, T, E, B> ReleasePipeline<A, T, E, B>
where
    A: RegistryAuth,
    T: TestGate,
    E: EmulationBootstrap,
    B: ImageBuilder,
{
    pub fn new(run_id: RunId, auth: A, gate: T, emulation: E, builder: B) -> Self {
        Self {
            run_id,
            auth,
            gate,
            emulation,
            builder,
        }
    }

    /// Run the pipeline to completion. Infallible at the signature level:
    /// every failure mode is captured in the report.
    pub async fn run(&self, spec: &RunSpec, credentials: Credentials) -> RunReport {
        let started_at = Utc::now();
        info!(run_id = %self.run_id, event = ?spec.event, "Starting release run");

        if !spec.event.qualifies(&spec.primary_branch) {
            info!(
                reference = %spec.event.reference,
                "Event does not qualify for publishing, skipping run"
            );
            return RunReport {
                run_id: self.run_id,
                state: RunState::Start,
                outcome: RunOutcome::Skipped,
                started_at,
                finished_at: Utc::now(),
            };
        }

        let mut state = RunState::Start;

        let session = match self.auth.login(&spec.registry, &credentials).await {
            Ok(session) => session,
            Err(e) => return self.fail(started_at, state, StageKind::Login, e),
        };
        state = RunState::Authenticated;
        info!(registry = %session.registry, state = ?state, "Stage complete");

        if let Err(e) = self.gate.run().await {
            return self.fail(started_at, state, StageKind::TestGate, e);
        }
        state = RunState::Tested;
        info!(state = ?state, "Stage complete");

        if let Err(e) = self.emulation.install(&spec.platforms).await {
            return self.fail(started_at, state, StageKind::Emulation, e);
        }
        state = RunState::EmulationReady;
        info!(state = ?state, "Stage complete");

        let image = match self.resolve_image(spec, &session.principal) {
            Ok(image) => image,
            Err(e) => return self.fail(started_at, state, StageKind::TagResolution, e),
        };
        state = RunState::Tagged;
        info!(image = %image, state = ?state, "Stage complete");

        let request = BuildRequest {
            dockerfile: spec.dockerfile.clone(),
            context: spec.context.clone(),
            platforms: spec.platforms.clone(),
            image,
            push: spec.push,
        };

        let result = match self.builder.build_and_publish(request).await {
            Ok(result) => result,
            Err(e) => return self.fail(started_at, state, StageKind::BuildPublish, e),
        };
        state = RunState::Published;
        info!(image = %result.image, state = ?state, "Stage complete");

        RunReport {
            run_id: self.run_id,
            state: RunState::Done,
            outcome: RunOutcome::Completed(result),
            started_at,
            finished_at: Utc::now(),
        }
    }

    fn resolve_image(&self, spec: &RunSpec, principal: &str) -> slipway_core::Result<ImageRef> {
        let tag = resolve_tag(&spec.event.reference, &spec.primary_branch)?;
        let namespace = Namespace::from_principal(principal)?;
        ImageRef::new(namespace, spec.image_name.clone(), tag)
    }

    fn fail(
        &self,
        started_at: DateTime<Utc>,
        reached: RunState,
        stage: StageKind,
        e: Error,
    ) -> RunReport {
        error!(
            run_id = %self.run_id,
            reached = ?reached,
            stage = %stage,
            error = %e,
            "Release run failed"
        );
        RunReport {
            run_id: self.run_id,
            state: RunState::Failed,
            outcome: RunOutcome::Failed { stage, error: e },
            started_at,
            finished_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slipway_core::event::EventKind;
    use slipway_core::stage::RegistrySession;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    type CallLog = Arc<Mutex<Vec<&'static str>>>;

    struct MockAuth {
        ok: bool,
        calls: CallLog,
    }

    #[async_trait::async_trait]
    impl RegistryAuth for MockAuth {
        async fn login(
            &self,
            registry: &str,
            credentials: &Credentials,
        ) -> slipway_core::Result<RegistrySession> {
            self.calls.lock().unwrap().push("login");
            if self.ok {
                Ok(RegistrySession {
                    registry: registry.to_string(),
                    principal: credentials.principal.clone(),
                })
            } else {
                Err(Error::AuthFailed("secret rejected".to_string()))
            }
        }
    }

    struct MockGate {
        ok: bool,
        calls: CallLog,
    }

    #[async_trait::async_trait]
    impl TestGate for MockGate {
        async fn run(&self) -> slipway_core::Result<()> {
            self.calls.lock().unwrap().push("test");
            if self.ok {
                Ok(())
            } else {
                Err(Error::TestsFailed { exit_code: Some(1) })
            }
        }
    }

    struct MockEmulation {
        ok: bool,
        calls: CallLog,
    }

    #[async_trait::async_trait]
    impl EmulationBootstrap for MockEmulation {
        async fn install(&self, _platforms: &[Platform]) -> slipway_core::Result<()> {
            self.calls.lock().unwrap().push("emulation");
            if self.ok {
                Ok(())
            } else {
                Err(Error::EmulationFailed("capability denied".to_string()))
            }
        }
    }

    struct MockBuilder {
        ok: bool,
        calls: CallLog,
        captured: Arc<Mutex<Option<BuildRequest>>>,
    }

    #[async_trait::async_trait]
    impl ImageBuilder for MockBuilder {
        async fn build_and_publish(
            &self,
            request: BuildRequest,
        ) -> slipway_core::Result<BuildResult> {
            self.calls.lock().unwrap().push("build");
            if !self.ok {
                return Err(Error::BuildFailed("transfer failed".to_string()));
            }
            let result = BuildResult {
                image: request.image.clone(),
                platforms: request.platforms.clone(),
                pushed: request.push,
                digest: Some("sha256:deadbeef".to_string()),
                duration: Duration::from_secs(1),
            };
            *self.captured.lock().unwrap() = Some(request);
            Ok(result)
        }
    }

    struct Harness {
        pipeline: ReleasePipeline<MockAuth, MockGate, MockEmulation, MockBuilder>,
        calls: CallLog,
        captured: Arc<Mutex<Option<BuildRequest>>>,
    }

    fn harness(auth_ok: bool, gate_ok: bool, emulation_ok: bool, build_ok: bool) -> Harness {
        let calls: CallLog = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::new(Mutex::new(None));
        let pipeline = ReleasePipeline::new(
            RunId::new(),
            MockAuth {
                ok: auth_ok,
                calls: calls.clone(),
            },
            MockGate {
                ok: gate_ok,
                calls: calls.clone(),
            },
            MockEmulation {
                ok: emulation_ok,
                calls: calls.clone(),
            },
            MockBuilder {
                ok: build_ok,
                calls: calls.clone(),
                captured: captured.clone(),
            },
        );
        Harness {
            pipeline,
            calls,
            captured,
        }
    }

    fn spec(event: Event) -> RunSpec {
        RunSpec {
            event,
            registry: "docker.io".to_string(),
            primary_branch: "refs/heads/master".to_string(),
            image_name: "vuegraf".to_string(),
            dockerfile: PathBuf::from("Dockerfile"),
            context: PathBuf::from("."),
            platforms: vec![
                Platform::new("linux/amd64").unwrap(),
                Platform::new("linux/arm64").unwrap(),
            ],
            push: true,
        }
    }

    fn credentials() -> Credentials {
        Credentials::new("Acme", "hunter2")
    }

    #[tokio::test]
    async fn test_release_publishes_version_tag() {
        let h = harness(true, true, true, true);
        let spec = spec(Event::new(EventKind::Release, "refs/tags/v2.0.0"));

        let report = h.pipeline.run(&spec, credentials()).await;

        assert_eq!(report.state, RunState::Done);
        assert!(report.succeeded());
        let request = h.captured.lock().unwrap().take().unwrap();
        assert_eq!(request.image.to_string(), "acme/vuegraf:v2.0.0");
        assert_eq!(request.platforms.len(), 2);
        assert!(request.push);
        assert_eq!(
            *h.calls.lock().unwrap(),
            vec!["login", "test", "emulation", "build"]
        );
    }

    #[tokio::test]
    async fn test_primary_branch_push_publishes_latest() {
        let h = harness(true, true, true, true);
        let spec = spec(Event::new(EventKind::Push, "refs/heads/master"));

        let report = h.pipeline.run(&spec, credentials()).await;

        assert!(report.succeeded());
        let request = h.captured.lock().unwrap().take().unwrap();
        assert_eq!(request.image.to_string(), "acme/vuegraf:latest");
    }

    #[tokio::test]
    async fn test_feature_branch_push_is_skipped() {
        let h = harness(true, true, true, true);
        let spec = spec(Event::new(EventKind::Push, "refs/heads/feature/tags"));

        let report = h.pipeline.run(&spec, credentials()).await;

        assert!(matches!(report.outcome, RunOutcome::Skipped));
        assert_eq!(report.state, RunState::Start);
        assert!(h.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_auth_failure_stops_everything_else() {
        let h = harness(false, true, true, true);
        let spec = spec(Event::new(EventKind::Release, "refs/tags/v2.0.0"));

        let report = h.pipeline.run(&spec, credentials()).await;

        assert_eq!(report.state, RunState::Failed);
        match report.outcome {
            RunOutcome::Failed { stage, .. } => assert_eq!(stage, StageKind::Login),
            other => panic!("Expected failure, got {:?}", other),
        }
        assert_eq!(*h.calls.lock().unwrap(), vec!["login"]);
    }

    #[tokio::test]
    async fn test_test_failure_withholds_emulation_and_build() {
        let h = harness(true, false, true, true);
        let spec = spec(Event::new(EventKind::Release, "refs/tags/v2.0.0"));

        let report = h.pipeline.run(&spec, credentials()).await;

        assert_eq!(report.state, RunState::Failed);
        match report.outcome {
            RunOutcome::Failed { stage, .. } => assert_eq!(stage, StageKind::TestGate),
            other => panic!("Expected failure, got {:?}", other),
        }
        assert_eq!(*h.calls.lock().unwrap(), vec!["login", "test"]);
    }

    #[tokio::test]
    async fn test_emulation_failure_withholds_build() {
        let h = harness(true, true, false, true);
        let spec = spec(Event::new(EventKind::Release, "refs/tags/v2.0.0"));

        let report = h.pipeline.run(&spec, credentials()).await;

        assert_eq!(report.state, RunState::Failed);
        match report.outcome {
            RunOutcome::Failed { stage, .. } => assert_eq!(stage, StageKind::Emulation),
            other => panic!("Expected failure, got {:?}", other),
        }
        assert_eq!(*h.calls.lock().unwrap(), vec!["login", "test", "emulation"]);
        assert!(h.captured.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_tag_defect_withholds_build() {
        let h = harness(true, true, true, true);
        let spec = spec(Event::new(EventKind::Release, "refs/tags/"));

        let report = h.pipeline.run(&spec, credentials()).await;

        assert_eq!(report.state, RunState::Failed);
        match report.outcome {
            RunOutcome::Failed { stage, .. } => assert_eq!(stage, StageKind::TagResolution),
            other => panic!("Expected failure, got {:?}", other),
        }
        assert_eq!(*h.calls.lock().unwrap(), vec!["login", "test", "emulation"]);
    }

    #[tokio::test]
    async fn test_build_failure_is_reported() {
        let h = harness(true, true, true, false);
        let spec = spec(Event::new(EventKind::Release, "refs/tags/v2.0.0"));

        let report = h.pipeline.run(&spec, credentials()).await;

        assert_eq!(report.state, RunState::Failed);
        match report.outcome {
            RunOutcome::Failed { stage, .. } => assert_eq!(stage, StageKind::BuildPublish),
            other => panic!("Expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_no_push_requests_unpushed_build() {
        let h = harness(true, true, true, true);
        let mut spec = spec(Event::new(EventKind::Push, "refs/heads/master"));
        spec.push = false;

        let report = h.pipeline.run(&spec, credentials()).await;

        assert!(report.succeeded());
        let request = h.captured.lock().unwrap().take().unwrap();
        assert!(!request.push);
    }

    #[test]
    fn test_terminal_states() {
        assert!(RunState::Done.is_terminal());
        assert!(RunState::Failed.is_terminal());
        assert!(!RunState::Start.is_terminal());
        assert!(!RunState::Tagged.is_terminal());
    }
}
