use std::collections::BTreeMap;
use std::time::Duration;

use error_stack::Report;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::k8s::annotations;
use crate::k8s::DeploymentApi;
use crate::k8s::DeploymentDescriptor;
use crate::k8s::KubernetesError;

/// Bounds for the readiness poll that stands in for "operation acknowledged"
/// vs "operation visible on subsequent read".
#[derive(Debug, Clone)]
pub struct PollSettings {
    pub attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            attempts: 10,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum Step {
    #[display("create")]
    Create,
    #[display("wait-created")]
    WaitCreated,
    #[display("read-before")]
    ReadBefore,
    #[display("annotate")]
    Annotate,
    #[display("wait-annotated")]
    WaitAnnotated,
    #[display("read-after")]
    ReadAfter,
}

#[derive(Debug)]
pub enum StepOutcome {
    Succeeded,
    Failed(Report<KubernetesError>),
    /// An earlier failure made this step pointless to attempt.
    Skipped,
}

/// Per-step results of one pipeline run. The caller decides on overall
/// success; no failure is masked by a later step succeeding.
#[derive(Debug, Default)]
pub struct RunReport {
    outcomes: Vec<(Step, StepOutcome)>,
}

impl RunReport {
    fn record(&mut self, step: Step, outcome: StepOutcome) {
        match &outcome {
            StepOutcome::Succeeded => info!(step = %step, "step completed"),
            StepOutcome::Failed(e) => error!(step = %step, "step failed: {e:?}"),
            StepOutcome::Skipped => warn!(step = %step, "step skipped after earlier failure"),
        }
        self.outcomes.push((step, outcome));
    }

    pub fn outcomes(&self) -> &[(Step, StepOutcome)] {
        &self.outcomes
    }

    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| matches!(outcome, StepOutcome::Failed(_)))
            .count()
    }

    pub fn succeeded(&self) -> bool {
        self.failed() == 0
    }
}

/// Runs the create → wait → read → annotate → wait → read sequence against
/// one namespace-scoped deployment API. Strictly sequential; the only shared
/// state is the remote one, arbitrated by the API server itself.
pub struct Annotator<A: DeploymentApi> {
    api: A,
    poll: PollSettings,
    /// Treat a create hitting an existing deployment as success instead of a
    /// conflict failure. Either way the sequence continues against the
    /// existing resource.
    exists_ok: bool,
}

impl<A: DeploymentApi> Annotator<A> {
    pub fn new(api: A, poll: PollSettings, exists_ok: bool) -> Self {
        Self {
            api,
            poll,
            exists_ok,
        }
    }

    pub async fn run(
        &self,
        descriptor: &DeploymentDescriptor,
        new_annotations: &BTreeMap<String, String>,
    ) -> RunReport {
        let mut report = RunReport::default();
        let namespace = self.api.namespace();
        let name = descriptor.name.as_str();

        let mut proceed = match self.api.create(descriptor).await {
            Ok(()) => {
                info!(name, namespace, "deployment created");
                report.record(Step::Create, StepOutcome::Succeeded);
                true
            }
            Err(e) if e.current_context().is_conflict() => {
                // The deployment exists, so the remaining steps are still
                // meaningful; annotation merging is idempotent.
                if self.exists_ok {
                    warn!(name, namespace, "deployment already exists, continuing");
                    report.record(Step::Create, StepOutcome::Succeeded);
                } else {
                    report.record(Step::Create, StepOutcome::Failed(e));
                }
                true
            }
            Err(e) => {
                report.record(Step::Create, StepOutcome::Failed(e));
                false
            }
        };

        proceed = self
            .run_wait_step(Step::WaitCreated, name, proceed, &mut report)
            .await;
        proceed = self
            .run_read_step(Step::ReadBefore, name, proceed, &mut report)
            .await;

        if proceed {
            match self.annotate(name, new_annotations).await {
                Ok(()) => {
                    info!(name, namespace, "annotations patched");
                    report.record(Step::Annotate, StepOutcome::Succeeded);
                }
                Err(e) => {
                    report.record(Step::Annotate, StepOutcome::Failed(e));
                    proceed = false;
                }
            }
        } else {
            report.record(Step::Annotate, StepOutcome::Skipped);
        }

        proceed = self
            .run_wait_step(Step::WaitAnnotated, name, proceed, &mut report)
            .await;
        self.run_read_step(Step::ReadAfter, name, proceed, &mut report)
            .await;

        report
    }

    /// Fetch the current annotation snapshot, merge the new set over it and
    /// submit the delta as a merge-patch.
    async fn annotate(
        &self,
        name: &str,
        new_annotations: &BTreeMap<String, String>,
    ) -> Result<(), Report<KubernetesError>> {
        let state = self.api.get(name).await?;
        let merged = annotations::merge(&state.annotations, new_annotations);
        self.api.patch_annotations(name, &merged).await
    }

    async fn run_wait_step(
        &self,
        step: Step,
        name: &str,
        proceed: bool,
        report: &mut RunReport,
    ) -> bool {
        if !proceed {
            report.record(step, StepOutcome::Skipped);
            return false;
        }
        match self.wait_for_ready(name).await {
            Ok(()) => {
                report.record(step, StepOutcome::Succeeded);
                true
            }
            Err(e) => {
                report.record(step, StepOutcome::Failed(e));
                false
            }
        }
    }

    async fn run_read_step(
        &self,
        step: Step,
        name: &str,
        proceed: bool,
        report: &mut RunReport,
    ) -> bool {
        if !proceed {
            report.record(step, StepOutcome::Skipped);
            return false;
        }
        match self.api.get(name).await {
            Ok(state) => {
                info!(
                    name,
                    namespace = self.api.namespace(),
                    step = %step,
                    annotations = ?state.annotations,
                    "deployment annotations"
                );
                report.record(step, StepOutcome::Succeeded);
                true
            }
            Err(e) => {
                report.record(step, StepOutcome::Failed(e));
                false
            }
        }
    }

    /// Poll the readiness predicate with bounded attempts and capped
    /// exponential backoff instead of a fixed-duration pause. A NotFound
    /// inside the window is retried, since the preceding write may not be
    /// visible on read yet.
    async fn wait_for_ready(&self, name: &str) -> Result<(), Report<KubernetesError>> {
        let mut backoff = self.poll.initial_backoff;
        for attempt in 1..=self.poll.attempts {
            match self.api.is_ready(name).await {
                Ok(true) => {
                    info!(name, attempt, "deployment ready");
                    return Ok(());
                }
                Ok(false) => {}
                Err(e) if e.current_context().is_not_found() => {}
                Err(e) => return Err(e),
            }

            if attempt < self.poll.attempts {
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(self.poll.max_backoff);
            }
        }

        Err(Report::new(KubernetesError::ReadyTimeout {
            name: name.to_string(),
            namespace: self.api.namespace().to_string(),
        }))
    }
}
