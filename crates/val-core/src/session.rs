//! Multi-test session whose progress survives device resets.
//!
//! Before each test the session persists the one-based index of the test
//! about to run, and after each verdict it persists the running tallies.
//! When a test stops in `AwaitingExternalReset` the boot ends; the next boot
//! resumes at the same test with the persisted tallies.
//!
//! A test that leaves the device halted without asking for a reset also ends
//! the boot. The next boot finds the test still marked active but no
//! cold-boot request in the boot tag, counts it as FAIL and moves on.

use std::fmt;
use std::panic::Location;

use thiserror::Error;

use crate::{
    dispatch, BootIntent, NvField, NvramWindow, ScratchRegion, TestRegistry, TestReport,
    TestResult, Val, ValError,
};

/// Reasons a session cannot run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SessionError {
    /// No NVRAM region can hold the session record.
    #[error("no usable NVRAM region for session state: {0}")]
    NoRecord(ValError),
    /// A record word could not be read or written.
    #[error("session record field {field:?} inaccessible: {source}")]
    Record {
        /// Word slot.
        field: NvField,
        /// Target status.
        source: ValError,
    },
    /// The registry is larger than a record word can index.
    #[error("registry too large for the session record")]
    TooManyTests,
}

/// Verdict counts; PASS, FAIL, SKIP and PENDING are never merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Tally {
    /// Tests that passed.
    pub passed: u32,
    /// Tests that failed.
    pub failed: u32,
    /// Tests that were skipped.
    pub skipped: u32,
    /// Tests that finished without a verdict.
    pub pending: u32,
}

impl Tally {
    /// Counts one verdict.
    pub fn record(&mut self, result: &TestResult) {
        let slot = match result {
            TestResult::Pass(_) => &mut self.passed,
            TestResult::Fail { .. } => &mut self.failed,
            TestResult::Skip(_) => &mut self.skipped,
            TestResult::Pending => &mut self.pending,
        };
        *slot = slot.saturating_add(1);
    }

    /// Number of verdicts counted.
    #[must_use]
    pub const fn total(&self) -> u32 {
        self.passed
            .saturating_add(self.failed)
            .saturating_add(self.skipped)
            .saturating_add(self.pending)
    }

    /// Returns `true` when no test failed or ended without a verdict.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.failed == 0 && self.pending == 0
    }

    const fn fields(&self) -> [(NvField, u32); 4] {
        [
            (NvField::Passed, self.passed),
            (NvField::Failed, self.failed),
            (NvField::Skipped, self.skipped),
            (NvField::Pending, self.pending),
        ]
    }
}

impl fmt::Display for Tally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} passed, {} failed, {} skipped, {} pending",
            self.passed, self.failed, self.skipped, self.pending
        )
    }
}

/// What one boot of a session did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootOutcome {
    /// Reports of the tests dispatched in this boot.
    pub reports: Vec<TestReport>,
    /// Tallies across all boots of the session so far.
    pub tally: Tally,
    /// Index the boot resumed at, when it continued an earlier boot.
    pub resumed_at: Option<usize>,
    /// The boot ended with the device needing a reset, either requested by a
    /// test or forced by a fault.
    pub awaiting_reset: bool,
    /// An unrequested fault halted the device; the last report is its FAIL.
    pub halted: bool,
}

impl BootOutcome {
    /// Returns `true` once every registered test has a final verdict.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        !self.awaiting_reset
    }
}

/// Runs a registry across as many boots as its tests need.
#[derive(Debug, Clone, Copy)]
pub struct Session<'r> {
    registry: &'r TestRegistry,
    scratch: ScratchRegion,
}

impl<'r> Session<'r> {
    /// Creates a session over `registry`.
    #[must_use]
    pub const fn new(registry: &'r TestRegistry, scratch: ScratchRegion) -> Self {
        Self { registry, scratch }
    }

    /// Runs the tests of one boot.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] when the session record is unusable.
    pub fn run_boot(&self, val: &mut dyn Val) -> Result<BootOutcome, SessionError> {
        let window = NvramWindow::locate(&*val).map_err(SessionError::NoRecord)?;
        let active = read(&window, val, NvField::ActiveTest)?;

        let resumed_at = usize::try_from(active)
            .ok()
            .filter(|index| (1..=self.registry.len()).contains(index))
            .map(|index| index - 1);
        let (start, mut tally) = match resumed_at {
            Some(index) => {
                let mut tally = load_tally(&window, val)?;
                if BootIntent::resumes(read(&window, val, NvField::Boot)?) {
                    log::info!(target: "val", "session resumed at test {} ({tally})", index + 1);
                    (index, tally)
                } else {
                    log::warn!(
                        target: "val",
                        "test {} was cut short by an unrequested reset, counted as FAIL",
                        index + 1
                    );
                    tally.failed = tally.failed.saturating_add(1);
                    store_tally(&window, val, &tally)?;
                    (index + 1, tally)
                }
            }
            None => {
                let tally = Tally::default();
                store_tally(&window, val, &tally)?;
                (0, tally)
            }
        };

        let mut reports = Vec::new();
        for index in start..self.registry.len() {
            let Some(test) = self.registry.get(index) else {
                break;
            };
            let marker = u32::try_from(index + 1).map_err(|_| SessionError::TooManyTests)?;
            write(&window, val, NvField::ActiveTest, marker)?;

            let mut report = dispatch(test, val, self.scratch);
            if report.awaiting_reset() {
                log::info!(target: "val", "{}: boot ends awaiting reset", report.id);
                reports.push(report);
                return Ok(BootOutcome {
                    reports,
                    tally,
                    resumed_at,
                    awaiting_reset: true,
                    halted: false,
                });
            }
            if val.halted() {
                log::warn!(target: "val", "{}: device halted by an unrequested fault", report.id);
                if !report.result.is_fail() {
                    report.result = TestResult::Fail {
                        checkpoint: report.last_checkpoint,
                        status: ValError::Faulted,
                        location: Location::caller(),
                    };
                }
                reports.push(report);
                return Ok(BootOutcome {
                    reports,
                    tally,
                    resumed_at,
                    awaiting_reset: true,
                    halted: true,
                });
            }

            log::info!(target: "val", "{}: {}", report.id, report.result);
            tally.record(&report.result);
            store_tally(&window, val, &tally)?;
            reports.push(report);
        }

        write(&window, val, NvField::ActiveTest, 0)?;
        log::info!(target: "val", "session complete: {tally}");
        Ok(BootOutcome {
            reports,
            tally,
            resumed_at,
            awaiting_reset: false,
            halted: false,
        })
    }
}

fn read(window: &NvramWindow, val: &mut dyn Val, field: NvField) -> Result<u32, SessionError> {
    window
        .read(val, field)
        .map_err(|source| SessionError::Record { field, source })
}

fn write(
    window: &NvramWindow,
    val: &mut dyn Val,
    field: NvField,
    value: u32,
) -> Result<(), SessionError> {
    window
        .write(val, field, value)
        .map_err(|source| SessionError::Record { field, source })
}

fn load_tally(window: &NvramWindow, val: &mut dyn Val) -> Result<Tally, SessionError> {
    Ok(Tally {
        passed: read(window, val, NvField::Passed)?,
        failed: read(window, val, NvField::Failed)?,
        skipped: read(window, val, NvField::Skipped)?,
        pending: read(window, val, NvField::Pending)?,
    })
}

fn store_tally(
    window: &NvramWindow,
    val: &mut dyn Val,
    tally: &Tally,
) -> Result<(), SessionError> {
    for (field, value) in tally.fields() {
        write(window, val, field, value)?;
    }
    Ok(())
}
