//! Per-execution view a test's hooks receive.

use std::fmt;

use crate::{
    Abort, CheckpointEngine, Checkpoint, PrintLevel, ScratchRegion, Status, Terminal, TestId,
    TestResult, Val, ValError, ValResult,
};

/// Capability interface plus checkpoint engine for one test execution.
///
/// Entry, payload and exit of the same execution share one context, so
/// checkpoint numbers keep increasing across the three hooks.
pub struct TestContext<'a> {
    val: &'a mut dyn Val,
    engine: CheckpointEngine,
    scratch: ScratchRegion,
}

impl fmt::Debug for TestContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestContext")
            .field("engine", &self.engine)
            .field("scratch", &self.scratch)
            .finish_non_exhaustive()
    }
}

impl<'a> TestContext<'a> {
    /// Creates the context for one execution of `test`.
    pub fn new(val: &'a mut dyn Val, test: TestId, scratch: ScratchRegion) -> Self {
        Self {
            val,
            engine: CheckpointEngine::new(test),
            scratch,
        }
    }

    /// Test being executed.
    #[must_use]
    pub const fn test(&self) -> TestId {
        self.engine.test()
    }

    /// Scratch window zeroed by [`TestContext::initialize`].
    #[must_use]
    pub const fn scratch(&self) -> ScratchRegion {
        self.scratch
    }

    /// Direct access to the capability interface.
    ///
    /// Statuses obtained this way must still be routed through a check.
    pub fn val(&mut self) -> &mut dyn Val {
        &mut *self.val
    }

    /// Invokes a capability and checks its status at the next checkpoint.
    ///
    /// # Errors
    ///
    /// Returns [`Abort`] when the capability fails.
    #[track_caller]
    pub fn call<T>(&mut self, op: impl FnOnce(&mut dyn Val) -> ValResult<T>) -> Result<T, Abort> {
        let result = op(&mut *self.val);
        self.engine.check(result)
    }

    /// Checks a status obtained elsewhere.
    ///
    /// # Errors
    ///
    /// Returns [`Abort`] when `result` is an error.
    #[track_caller]
    pub fn check<T>(&mut self, result: ValResult<T>) -> Result<T, Abort> {
        self.engine.check(result)
    }

    /// Records `status` and returns `true` when the test must stop.
    #[track_caller]
    pub fn report(&mut self, status: Status) -> bool {
        self.engine.report(status)
    }

    /// Expects an operation to have been refused.
    ///
    /// Returns the refusal status on success.
    ///
    /// # Errors
    ///
    /// Returns [`Abort`] with [`ValError::Invalid`] latched when the
    /// operation succeeded.
    #[track_caller]
    pub fn check_rejected(&mut self, status: Status) -> Result<ValError, Abort> {
        match status {
            Ok(()) => Err(self.engine.fail(ValError::Invalid)),
            Err(refusal) => {
                self.engine.report(Ok(()));
                Ok(refusal)
            }
        }
    }

    /// Expects an operation that tests a security property to succeed.
    ///
    /// Unlike [`TestContext::check`], a failure is recorded as
    /// [`ValError::Invalid`] rather than the raw status.
    ///
    /// # Errors
    ///
    /// Returns [`Abort`] when the operation was refused.
    #[track_caller]
    pub fn check_accepted(&mut self, status: Status) -> Result<(), Abort> {
        let status = status.map_err(|_| ValError::Invalid);
        self.engine.check(status)
    }

    /// Latches an explicit failure.
    #[track_caller]
    pub fn fail(&mut self, status: ValError) -> Abort {
        self.engine.fail(status)
    }

    /// Emits a diagnostic line through the target.
    pub fn print(&mut self, level: PrintLevel, args: fmt::Arguments<'_>) {
        self.val.print(level, args);
    }

    /// Sets PASS.
    ///
    /// # Errors
    ///
    /// Returns [`Abort`] when a failure is already latched.
    pub fn pass(&mut self) -> Result<(), Abort> {
        self.engine.set_result(Terminal::Pass(0))?;
        Ok(())
    }

    /// Sets SKIP with a reason code.
    ///
    /// # Errors
    ///
    /// Returns [`Abort`] when a failure is already latched.
    pub fn skip(&mut self, reason: u32) -> Result<(), Abort> {
        self.engine.set_result(Terminal::Skip(reason))?;
        Ok(())
    }

    /// Zeroes the scratch window at the next checkpoint.
    ///
    /// # Errors
    ///
    /// Returns [`Abort`] when the target refuses.
    #[track_caller]
    pub fn initialize(&mut self) -> Result<(), Abort> {
        let scratch = self.scratch;
        let status = self.val.test_initialize(scratch);
        self.engine.check(status)
    }

    /// Current verdict.
    #[must_use]
    pub const fn result(&self) -> TestResult {
        self.engine.result()
    }

    /// Last checkpoint reached.
    #[must_use]
    pub const fn last_checkpoint(&self) -> Checkpoint {
        self.engine.last_checkpoint()
    }

    /// Consumes the context, returning the engine's final state.
    #[must_use]
    pub fn into_engine(self) -> CheckpointEngine {
        self.engine
    }
}
