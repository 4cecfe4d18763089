//! Multi-boot runner over the simulated target.
//!
//! A session may span several boots: whenever a boot ends with the device
//! needing a reset, the runner resets the target and boots again until the
//! session completes or the boot limit is reached.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use val_core::{
    ConfigError, Session, SessionError, SimTarget, Tally, TargetConfig, TestRegistry, TestReport,
    TestResult,
};

/// Reasons a run cannot be carried out.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// A boot limit of zero was requested.
    #[error("boot limit must be at least 1")]
    ZeroBootLimit,
    /// The session record on the target is unusable.
    #[error(transparent)]
    Session(#[from] SessionError),
    /// The target description is inconsistent.
    #[error("invalid target description: {0}")]
    InvalidTarget(#[from] ConfigError),
    /// The target description file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    ReadTarget {
        /// File that was read.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },
    /// The target description file is not valid JSON for a target.
    #[error("failed to parse {}: {source}", path.display())]
    ParseTarget {
        /// File that was parsed.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },
}

/// Outcome of a run across one or more boots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Boots performed.
    pub boots: u32,
    /// Reports of every dispatch, in order, across all boots.
    pub reports: Vec<TestReport>,
    /// Verdict counts; a test still waiting for a reset counts as pending,
    /// one that halted the device as failed.
    pub tally: Tally,
    /// The session finished before the boot limit.
    pub complete: bool,
}

impl RunSummary {
    /// Returns `true` when every test ended in PASS or SKIP.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.complete && self.tally.is_clean()
    }

    /// Final verdict per test, skipping dispatches a later boot resumed.
    pub fn verdicts(&self) -> impl Iterator<Item = &TestReport> {
        self.reports
            .iter()
            .enumerate()
            .filter(|(index, report)| {
                !report.awaiting_reset()
                    || self.reports.get(index + 1).map(|next| next.id) != Some(report.id)
            })
            .map(|(_, report)| report)
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} over {} boot(s)", self.tally, self.boots)?;
        if !self.complete {
            write!(f, ", boot limit reached")?;
        }
        Ok(())
    }
}

/// Runs `registry` on `target`, resetting it between boots.
///
/// # Errors
///
/// Returns [`RunnerError::ZeroBootLimit`] for `max_boots == 0` and
/// [`RunnerError::Session`] when the target's session record is unusable.
pub fn run_to_completion(
    registry: &TestRegistry,
    target: &mut SimTarget,
    config: &TargetConfig,
    max_boots: u32,
) -> Result<RunSummary, RunnerError> {
    if max_boots == 0 {
        return Err(RunnerError::ZeroBootLimit);
    }

    let session = Session::new(registry, config.scratch);
    let mut reports = Vec::new();
    let mut boots = 0;
    loop {
        if boots > 0 {
            target.reset();
        }
        boots += 1;
        log::info!(target: "val", "boot {boots}");

        let outcome = session.run_boot(target)?;
        let unfinished = outcome
            .reports
            .last()
            .filter(|_| outcome.halted)
            .map_or(TestResult::Pending, |report| report.result);
        reports.extend(outcome.reports);
        let mut tally = outcome.tally;

        if !outcome.awaiting_reset {
            return Ok(RunSummary {
                boots,
                reports,
                tally,
                complete: true,
            });
        }
        if boots >= max_boots {
            log::warn!(target: "val", "boot limit {max_boots} reached with the device awaiting reset");
            tally.record(&unfinished);
            return Ok(RunSummary {
                boots,
                reports,
                tally,
                complete: false,
            });
        }
    }
}

/// Reads and validates a JSON target description.
///
/// # Errors
///
/// Returns [`RunnerError`] when the file cannot be read or parsed, or the
/// description is inconsistent.
pub fn load_target(path: &Path) -> Result<TargetConfig, RunnerError> {
    let text = fs::read_to_string(path).map_err(|source| RunnerError::ReadTarget {
        path: path.to_path_buf(),
        source,
    })?;
    let config: TargetConfig =
        serde_json::from_str(&text).map_err(|source| RunnerError::ParseTarget {
            path: path.to_path_buf(),
            source,
        })?;
    config.validate()?;
    Ok(config)
}
