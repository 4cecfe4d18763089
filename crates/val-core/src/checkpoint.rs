//! Checkpoint/result engine.
//!
//! Every status a test observes is routed through [`CheckpointEngine`], which
//! numbers the observation and latches the first failure. Checkpoints are
//! assigned automatically in call order for one test execution, so a failure
//! is pinpointed by its number and by the source location that reported it.

use std::fmt;
use std::panic::Location;

use thiserror::Error;

use crate::{Status, TestId, ValError, ValResult};

/// Sequence number of an observed status within one test execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Checkpoint(u32);

impl Checkpoint {
    /// No checkpoint reached yet.
    pub const NONE: Self = Self(0);

    /// Wraps a raw checkpoint number.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw checkpoint number.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Following checkpoint, or `None` once numbering is exhausted.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self.0.checked_add(1) {
            Some(raw) => Some(Self(raw)),
            None => None,
        }
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Verdict of one test execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestResult {
    /// No verdict recorded.
    Pending,
    /// Test passed with the given code.
    Pass(u32),
    /// Test failed at a checkpoint.
    Fail {
        /// Checkpoint that observed the failure.
        checkpoint: Checkpoint,
        /// Failure status.
        status: ValError,
        /// Source location that reported the failure.
        location: &'static Location<'static>,
    },
    /// Test skipped with a reason code.
    Skip(u32),
}

impl TestResult {
    /// Returns `true` for [`TestResult::Pass`].
    #[must_use]
    pub const fn is_pass(&self) -> bool {
        matches!(self, Self::Pass(_))
    }

    /// Returns `true` for [`TestResult::Fail`].
    #[must_use]
    pub const fn is_fail(&self) -> bool {
        matches!(self, Self::Fail { .. })
    }

    /// Returns `true` for [`TestResult::Skip`].
    #[must_use]
    pub const fn is_skip(&self) -> bool {
        matches!(self, Self::Skip(_))
    }

    /// Returns `true` for [`TestResult::Pending`].
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

impl fmt::Display for TestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("PENDING"),
            Self::Pass(code) => write!(f, "PASS ({code:#x})"),
            Self::Fail {
                checkpoint,
                status,
                location,
            } => write!(
                f,
                "FAIL (checkpoint {checkpoint}, status {:#x}: {status}, at {location})",
                status.as_u32()
            ),
            Self::Skip(reason) => write!(f, "SKIP (reason {reason})"),
        }
    }
}

/// Terminal verdicts a test may set explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Terminal {
    /// Pass with a code.
    Pass(u32),
    /// Skip with a reason code.
    Skip(u32),
}

impl From<Terminal> for TestResult {
    fn from(terminal: Terminal) -> Self {
        match terminal {
            Terminal::Pass(code) => Self::Pass(code),
            Terminal::Skip(reason) => Self::Skip(reason),
        }
    }
}

/// A terminal verdict was set after a failure had been latched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{test}: {attempted:?} rejected, failure already latched at checkpoint {checkpoint}")]
pub struct ProtocolViolation {
    /// Test that attempted the overwrite.
    pub test: TestId,
    /// Checkpoint of the latched failure.
    pub checkpoint: Checkpoint,
    /// Verdict that was rejected.
    pub attempted: Terminal,
}

/// Marker returned when a test must stop after a failed checkpoint.
///
/// The failure itself is already latched in the engine; the marker only
/// carries the checkpoint so callers can bail out with `?`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("test aborted at checkpoint {checkpoint}")]
#[must_use]
pub struct Abort {
    checkpoint: Checkpoint,
}

impl Abort {
    /// Checkpoint that caused the abort.
    #[must_use]
    pub const fn checkpoint(&self) -> Checkpoint {
        self.checkpoint
    }
}

impl From<ProtocolViolation> for Abort {
    fn from(violation: ProtocolViolation) -> Self {
        Self {
            checkpoint: violation.checkpoint,
        }
    }
}

/// Tracks the last checkpoint and the latched verdict of one test.
#[derive(Debug, Clone)]
pub struct CheckpointEngine {
    test: TestId,
    last: Checkpoint,
    result: TestResult,
}

impl CheckpointEngine {
    /// Creates an engine for one execution of `test`.
    #[must_use]
    pub const fn new(test: TestId) -> Self {
        Self {
            test,
            last: Checkpoint::NONE,
            result: TestResult::Pending,
        }
    }

    /// Records `status` at the next checkpoint.
    ///
    /// Returns `true` when the caller must stop: the status was a failure and
    /// the verdict is now FAIL. A failure never replaces an earlier one.
    #[track_caller]
    pub fn report(&mut self, status: Status) -> bool {
        let Ok(checkpoint) = self.advance() else {
            return true;
        };
        match status {
            Ok(()) => {
                log::trace!(target: "val", "{}: checkpoint {checkpoint} ok", self.test);
                false
            }
            Err(status) => {
                self.latch(checkpoint, status, Location::caller());
                true
            }
        }
    }

    /// Records the status of `result` and hands back its value.
    ///
    /// # Errors
    ///
    /// Returns [`Abort`] when `result` is an error; the failure is latched.
    #[track_caller]
    pub fn check<T>(&mut self, result: ValResult<T>) -> Result<T, Abort> {
        let checkpoint = self.advance()?;
        match result {
            Ok(value) => {
                log::trace!(target: "val", "{}: checkpoint {checkpoint} ok", self.test);
                Ok(value)
            }
            Err(status) => {
                self.latch(checkpoint, status, Location::caller());
                Err(Abort { checkpoint })
            }
        }
    }

    /// Records an explicit failure at the next checkpoint.
    #[track_caller]
    pub fn fail(&mut self, status: ValError) -> Abort {
        let checkpoint = match self.advance() {
            Ok(checkpoint) => checkpoint,
            Err(abort) => return abort,
        };
        self.latch(checkpoint, status, Location::caller());
        Abort { checkpoint }
    }

    /// Sets a terminal PASS or SKIP verdict.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolViolation`] when a failure is already latched; the
    /// failure is kept.
    pub fn set_result(&mut self, terminal: Terminal) -> Result<(), ProtocolViolation> {
        if let TestResult::Fail { checkpoint, .. } = self.result {
            let violation = ProtocolViolation {
                test: self.test,
                checkpoint,
                attempted: terminal,
            };
            log::warn!(target: "val", "{violation}");
            return Err(violation);
        }
        self.result = terminal.into();
        log::info!(target: "val", "{}: result set to {}", self.test, self.result);
        Ok(())
    }

    /// Current verdict.
    #[must_use]
    pub const fn result(&self) -> TestResult {
        self.result
    }

    /// Last checkpoint reached.
    #[must_use]
    pub const fn last_checkpoint(&self) -> Checkpoint {
        self.last
    }

    /// Test this engine belongs to.
    #[must_use]
    pub const fn test(&self) -> TestId {
        self.test
    }

    /// Claims the next checkpoint number.
    ///
    /// Past the last number every observation fails at that number with
    /// [`ValError::IncorrectValue`]; no id is handed out twice.
    #[track_caller]
    fn advance(&mut self) -> Result<Checkpoint, Abort> {
        if let Some(next) = self.last.next() {
            self.last = next;
            return Ok(next);
        }
        log::error!(target: "val", "{}: checkpoint numbering exhausted", self.test);
        let checkpoint = self.last;
        self.latch(checkpoint, ValError::IncorrectValue, Location::caller());
        Err(Abort { checkpoint })
    }

    fn latch(&mut self, checkpoint: Checkpoint, status: ValError, location: &'static Location<'static>) {
        log::error!(
            target: "val",
            "{}: checkpoint {checkpoint} failed with status {:#x} ({status}) at {location}",
            self.test,
            status.as_u32()
        );
        if !self.result.is_fail() {
            self.result = TestResult::Fail {
                checkpoint,
                status,
                location,
            };
        }
    }
}
