//! Integration tests for the teardown sequencer.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pplink_core::{
    ConfirmationGate, ConfirmationRequest, CoreError, CoreResult, ForceGate, PromptGate,
    ScriptedGate, StepOutcome, TeardownSequencer, TeardownStep,
};

/// Context that records which steps actually ran.
#[derive(Debug, Default)]
struct Trace {
    ran: Vec<String>,
}

struct FakeStep {
    name: String,
    result: StepOutcome,
    confirm: bool,
    fatal: bool,
    delay: Option<Duration>,
}

impl FakeStep {
    fn ok(name: &str) -> Self {
        Self {
            name: name.to_string(),
            result: StepOutcome::success("done"),
            confirm: true,
            fatal: false,
            delay: None,
        }
    }

    fn failing(name: &str) -> Self {
        Self {
            result: StepOutcome::failed("HTTP 500"),
            ..Self::ok(name)
        }
    }

    fn fatal(mut self) -> Self {
        self.fatal = true;
        self
    }

    fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn arc(self) -> Arc<dyn TeardownStep<Trace>> {
        Arc::new(self)
    }
}

#[async_trait]
impl TeardownStep<Trace> for FakeStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "fake step"
    }

    fn affected_resources(&self, _ctx: &Trace) -> Vec<String> {
        vec![format!("resource of {}", self.name)]
    }

    fn confirm_required(&self) -> bool {
        self.confirm
    }

    fn fatal_if_failed(&self) -> bool {
        self.fatal
    }

    async fn execute(&self, ctx: &mut Trace) -> StepOutcome {
        ctx.ran.push(self.name.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.result.clone()
    }
}

/// Gate that fails the test if it is ever asked.
struct PanicGate;

impl ConfirmationGate for PanicGate {
    fn confirm(&self, request: &ConfirmationRequest) -> CoreResult<bool> {
        panic!("gate consulted for {}", request.step);
    }
}

fn names(records: Vec<&pplink_core::StepRecord>) -> Vec<String> {
    records.into_iter().map(|r| r.step.clone()).collect()
}

#[tokio::test]
async fn test_non_fatal_failure_continues() {
    let sequencer = TeardownSequencer::new("cleanup", Arc::new(ForceGate))
        .step(FakeStep::ok("a").arc())
        .step(FakeStep::failing("b").arc())
        .step(FakeStep::ok("c").arc());

    let mut trace = Trace::default();
    let report = sequencer.run(&mut trace).await;

    assert_eq!(trace.ran, vec!["a", "b", "c"]);
    assert_eq!(names(report.successes()), vec!["a", "c"]);
    assert_eq!(names(report.errors()), vec!["b"]);
    assert!(report.halted_at.is_none());
    assert!(!report.is_clean());
    assert!(report.into_result().is_ok());
}

#[tokio::test]
async fn test_fatal_failure_stops_run() {
    let sequencer = TeardownSequencer::new("cleanup", Arc::new(ForceGate))
        .step(FakeStep::failing("a").fatal().arc())
        .step(FakeStep::ok("b").arc());

    let mut trace = Trace::default();
    let report = sequencer.run(&mut trace).await;

    assert_eq!(trace.ran, vec!["a"]);
    assert_eq!(report.records.len(), 1);
    assert_eq!(report.halted_at.as_deref(), Some("a"));
    assert!(matches!(
        report.into_result(),
        Err(CoreError::FatalStep { step, .. }) if step == "a"
    ));
}

#[tokio::test]
async fn test_each_step_recorded_once_in_order() {
    let gate = Arc::new(ScriptedGate::new(true).then_answer(true).then_answer(false));
    let sequencer = TeardownSequencer::new("cleanup", gate.clone())
        .step(FakeStep::ok("a").arc())
        .step(FakeStep::ok("b").arc())
        .step(FakeStep::failing("c").arc());

    let mut trace = Trace::default();
    let report = sequencer.run(&mut trace).await;

    let order: Vec<&str> = report.records.iter().map(|r| r.step.as_str()).collect();
    assert_eq!(order, vec!["a", "b", "c"]);
    assert!(report.record("b").unwrap().outcome.is_skipped());
    assert_eq!(trace.ran, vec!["a", "c"]);
    assert_eq!(gate.asked().len(), 3);
    assert_eq!(gate.asked()[0].resources, vec!["resource of a".to_string()]);
}

#[tokio::test]
async fn test_force_gate_never_reads_input() {
    let sequencer = TeardownSequencer::new("cleanup", Arc::new(ForceGate))
        .step(FakeStep::ok("a").arc())
        .step(FakeStep::ok("b").arc());

    let mut trace = Trace::default();
    let report = sequencer.run(&mut trace).await;

    assert_eq!(report.successes().len(), 2);
}

#[tokio::test]
async fn test_steps_without_confirmation_skip_the_gate() {
    let mut step = FakeStep::ok("reset-config");
    step.confirm = false;
    let sequencer = TeardownSequencer::new("cleanup", Arc::new(PanicGate)).step(step.arc());

    let mut trace = Trace::default();
    let report = sequencer.run(&mut trace).await;

    assert_eq!(report.successes().len(), 1);
}

#[tokio::test]
async fn test_prompt_no_records_skipped() {
    let gate = PromptGate::new(Cursor::new(b"n\ny\n".to_vec()), Vec::new());
    let sequencer = TeardownSequencer::new("cleanup", Arc::new(gate))
        .step(FakeStep::ok("a").arc())
        .step(FakeStep::ok("b").arc());

    let mut trace = Trace::default();
    let report = sequencer.run(&mut trace).await;

    assert_eq!(names(report.skipped()), vec!["a"]);
    assert_eq!(names(report.successes()), vec!["b"]);
    assert_eq!(trace.ran, vec!["b"]);
}

#[tokio::test]
async fn test_gate_error_is_recorded_as_failure() {
    let gate = Arc::new(ScriptedGate::new(true).then_fail("terminal closed"));
    let sequencer = TeardownSequencer::new("cleanup", gate)
        .step(FakeStep::ok("a").arc())
        .step(FakeStep::ok("b").arc());

    let mut trace = Trace::default();
    let report = sequencer.run(&mut trace).await;

    assert_eq!(names(report.errors()), vec!["a"]);
    assert_eq!(names(report.successes()), vec!["b"]);
    assert_eq!(trace.ran, vec!["b"]);
}

#[tokio::test(start_paused = true)]
async fn test_interrupt_returns_partial_report() {
    let sequencer = TeardownSequencer::new("cleanup", Arc::new(ForceGate))
        .step(FakeStep::ok("a").arc())
        .step(FakeStep::ok("b").slow(Duration::from_secs(600)).arc())
        .step(FakeStep::ok("c").arc());

    let mut trace = Trace::default();
    let shutdown = tokio::time::sleep(Duration::from_secs(30));
    let report = sequencer.run_until(&mut trace, shutdown).await;

    assert!(report.interrupted);
    assert_eq!(names(report.successes()), vec!["a"]);
    match &report.record("b").unwrap().outcome {
        StepOutcome::Failed { error } => assert_eq!(error, "interrupted"),
        other => panic!("unexpected outcome {:?}", other),
    }
    assert!(report.record("c").is_none());
    assert_eq!(trace.ran, vec!["a", "b"]);
}

#[tokio::test]
async fn test_interrupt_before_start_runs_nothing() {
    let sequencer = TeardownSequencer::new("cleanup", Arc::new(ForceGate)).step(FakeStep::ok("a").arc());

    let mut trace = Trace::default();
    let report = sequencer.run_until(&mut trace, std::future::ready(())).await;

    assert!(report.interrupted);
    assert!(report.records.is_empty());
    assert!(trace.ran.is_empty());
}
