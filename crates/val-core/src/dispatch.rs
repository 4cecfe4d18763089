//! Test lifecycle dispatcher.
//!
//! A test moves `Registered -> EntryRunning -> PayloadRunning -> ExitRunning
//! -> Complete`. A failing entry skips the payload but still runs exit. A
//! payload that deliberately raised a fault stops the lifecycle in
//! `AwaitingExternalReset`; on hardware control never comes back in that
//! boot, so exit does not run.

use crate::{
    Checkpoint, EntryHook, ExitHook, PayloadExit, PayloadHook, RegisteredTest, ScratchRegion,
    TestContext, TestId, TestResult, Val,
};

/// Lifecycle states of one test execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    /// Descriptor registered, not yet started.
    Registered,
    /// Entry hook running.
    EntryRunning,
    /// Payload running.
    PayloadRunning,
    /// Exit hook running.
    ExitRunning,
    /// All hooks finished; the verdict is final.
    Complete,
    /// Payload raised a fault on purpose; only a reset continues the test.
    AwaitingExternalReset,
}

impl LifecycleState {
    /// Returns `true` for states no hook runs after.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::AwaitingExternalReset)
    }
}

/// Ordered record of the states one execution went through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleTrace {
    test: TestId,
    states: Vec<LifecycleState>,
}

impl LifecycleTrace {
    /// Starts a trace in [`LifecycleState::Registered`].
    #[must_use]
    pub fn new(test: TestId) -> Self {
        Self {
            test,
            states: vec![LifecycleState::Registered],
        }
    }

    /// Records a transition.
    pub fn enter(&mut self, state: LifecycleState) {
        log::debug!(target: "val", "{}: {:?} -> {state:?}", self.test, self.current());
        self.states.push(state);
    }

    /// Most recent state.
    #[must_use]
    pub fn current(&self) -> LifecycleState {
        self.states
            .last()
            .copied()
            .unwrap_or(LifecycleState::Registered)
    }

    /// All states in order.
    #[must_use]
    pub fn states(&self) -> &[LifecycleState] {
        &self.states
    }
}

/// Outcome of dispatching one test in one boot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestReport {
    /// Test identity.
    pub id: TestId,
    /// Display title.
    pub title: &'static str,
    /// Requirement reference tag.
    pub ref_tag: &'static str,
    /// Verdict held by the engine when the lifecycle stopped.
    pub result: TestResult,
    /// Last checkpoint reached.
    pub last_checkpoint: Checkpoint,
    /// States the execution went through.
    pub trace: LifecycleTrace,
}

impl TestReport {
    /// State the lifecycle stopped in.
    #[must_use]
    pub fn final_state(&self) -> LifecycleState {
        self.trace.current()
    }

    /// Returns `true` when the test is waiting for a device reset.
    #[must_use]
    pub fn awaiting_reset(&self) -> bool {
        self.final_state() == LifecycleState::AwaitingExternalReset
    }
}

/// Runs one registered test against `val`.
pub fn dispatch(
    test: &dyn RegisteredTest,
    val: &mut dyn Val,
    scratch: ScratchRegion,
) -> TestReport {
    let id = test.id();
    log::info!(target: "val", "{id}: {} [{}]", test.title(), test.ref_tag());

    let mut trace = LifecycleTrace::new(id);
    let mut ctx = TestContext::new(val, id, scratch);
    test.run(&mut ctx, &mut trace);
    let engine = ctx.into_engine();

    TestReport {
        id,
        title: test.title(),
        ref_tag: test.ref_tag(),
        result: engine.result(),
        last_checkpoint: engine.last_checkpoint(),
        trace,
    }
}

/// Drives the three hooks of one descriptor.
pub(crate) fn run_hooks<S>(
    ctx: &mut TestContext<'_>,
    trace: &mut LifecycleTrace,
    mut state: S,
    entry: EntryHook<S>,
    payload: PayloadHook<S>,
    exit: ExitHook<S>,
) {
    trace.enter(LifecycleState::EntryRunning);
    let entered = entry(ctx, &mut state).is_ok() && !ctx.result().is_fail();

    if entered {
        trace.enter(LifecycleState::PayloadRunning);
        if let Ok(PayloadExit::AwaitingExternalReset) = payload(ctx, &mut state) {
            trace.enter(LifecycleState::AwaitingExternalReset);
            return;
        }
    } else {
        log::debug!(target: "val", "{}: entry failed, payload skipped", ctx.test());
    }

    trace.enter(LifecycleState::ExitRunning);
    if let Err(abort) = exit(ctx, &mut state) {
        log::debug!(
            target: "val",
            "{}: exit stopped at checkpoint {}",
            ctx.test(),
            abort.checkpoint()
        );
    }
    trace.enter(LifecycleState::Complete);
}
