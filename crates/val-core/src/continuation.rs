//! Cross-reset continuation state machine.
//!
//! A test that must prove a property by provoking a fault persists a
//! boot-intent tag before doing so. On the next boot the tag tells it whether
//! it is running for the first time or resuming after the reset it caused.
//!
//! The first-pass branch is a typestate chain: [`ContinuationRecord::arm`]
//! writes the tag, [`Armed::suspend_faults`] saves and then clears the fault
//! enable bits, and only [`FaultsSuspended::provoke`] may run the provoking
//! operation. The resumed branch restores the saved fault control through
//! [`PendingResume::restore`].

use crate::{
    Abort, NvField, NvramWindow, PayloadExit, PayloadResult, Status, TestContext, Val, ValError,
    FAULT_CONTROL_REGISTER,
};

/// Persisted boot-intent tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u32)]
pub enum BootIntent {
    /// No continuation pending.
    Normal = 0,
    /// A continuation finished; later resets are unrelated.
    BootUnknown = 1,
    /// The next boot resumes a test that provoked a reset.
    ColdBootRequested = 2,
}

impl BootIntent {
    /// Raw persisted word.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self as u32
    }

    /// Decodes a persisted word; erased or unknown words yield `None`.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::Normal),
            1 => Some(Self::BootUnknown),
            2 => Some(Self::ColdBootRequested),
            _ => None,
        }
    }

    /// Returns `true` only for [`BootIntent::ColdBootRequested`].
    ///
    /// Every other tag, including an unreadable one, means first pass.
    #[must_use]
    pub const fn resumes(raw: u32) -> bool {
        matches!(Self::from_raw(raw), Some(Self::ColdBootRequested))
    }
}

/// Which branch a continuation-aware test takes on this boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumePoint {
    /// No continuation pending; run the first-pass branch.
    FirstPass(ContinuationRecord),
    /// A provoked reset happened; run the post-reset branch.
    Resumed(PendingResume),
}

/// The continuation record before the test decided on a branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContinuationRecord {
    window: NvramWindow,
}

impl ContinuationRecord {
    /// Discovers the NVRAM region holding the record.
    ///
    /// # Errors
    ///
    /// Returns [`Abort`] when no usable NVRAM region is declared.
    #[track_caller]
    pub fn locate(ctx: &mut TestContext<'_>) -> Result<Self, Abort> {
        let window = ctx.call(|val| NvramWindow::locate(val))?;
        Ok(Self { window })
    }

    /// Reads the boot-intent tag and selects the branch.
    ///
    /// # Errors
    ///
    /// Returns [`Abort`] when the tag cannot be read.
    #[track_caller]
    pub fn resume_point(self, ctx: &mut TestContext<'_>) -> Result<ResumePoint, Abort> {
        let window = self.window;
        let raw = ctx.call(|val| window.read(val, NvField::Boot))?;
        if BootIntent::resumes(raw) {
            log::info!(target: "val", "{}: resuming after provoked reset", ctx.test());
            Ok(ResumePoint::Resumed(PendingResume { window }))
        } else {
            if BootIntent::from_raw(raw).is_none() {
                log::debug!(target: "val", "{}: boot tag {raw:#x} treated as first pass", ctx.test());
            }
            Ok(ResumePoint::FirstPass(self))
        }
    }

    /// NVRAM window holding the record.
    #[must_use]
    pub const fn window(&self) -> NvramWindow {
        self.window
    }

    /// Marks the next boot as a resumption.
    ///
    /// # Errors
    ///
    /// Returns [`Abort`] when the tag cannot be written.
    #[track_caller]
    pub fn arm(self, ctx: &mut TestContext<'_>) -> Result<Armed, Abort> {
        let window = self.window;
        ctx.call(|val| window.write(val, NvField::Boot, BootIntent::ColdBootRequested.as_u32()))?;
        Ok(Armed { window })
    }
}

/// Tag written; fault control untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct Armed {
    window: NvramWindow,
}

impl Armed {
    /// Saves the fault-control register, then clears `mask` in it.
    ///
    /// # Errors
    ///
    /// Returns [`Abort`] when the register or the record cannot be accessed.
    #[track_caller]
    pub fn suspend_faults(
        self,
        ctx: &mut TestContext<'_>,
        mask: u32,
    ) -> Result<FaultsSuspended, Abort> {
        let window = self.window;
        let saved = ctx.call(|val| val.mem_reg_read(FAULT_CONTROL_REGISTER))?;
        ctx.call(|val| window.write(val, NvField::FaultControl, saved))?;
        ctx.call(|val| val.mem_reg_write(FAULT_CONTROL_REGISTER, saved & !mask))?;
        log::debug!(
            target: "val",
            "{}: fault control {saved:#010x} saved, now {:#010x}",
            ctx.test(),
            saved & !mask
        );
        Ok(FaultsSuspended { window, saved })
    }

    /// Clears the tag without provoking anything.
    ///
    /// # Errors
    ///
    /// Returns [`Abort`] when the tag cannot be written.
    #[track_caller]
    pub fn disarm(self, ctx: &mut TestContext<'_>) -> Result<(), Abort> {
        let window = self.window;
        ctx.call(|val| window.write(val, NvField::Boot, BootIntent::BootUnknown.as_u32()))
    }
}

/// Tag written and faults suspended; ready to provoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct FaultsSuspended {
    window: NvramWindow,
    saved: u32,
}

impl FaultsSuspended {
    /// Fault-control value saved before suspension.
    #[must_use]
    pub const fn saved_fault_control(&self) -> u32 {
        self.saved
    }

    /// Runs the provoking operation.
    ///
    /// When the operation faults the payload must hand control to the reset
    /// path, so this returns [`PayloadExit::AwaitingExternalReset`]. When it
    /// returns instead, the provoked fault never happened: the record is
    /// rolled back and the test fails with [`ValError::Invalid`].
    ///
    /// # Errors
    ///
    /// Returns [`Abort`] when the operation did not fault.
    #[track_caller]
    pub fn provoke(
        self,
        ctx: &mut TestContext<'_>,
        op: impl FnOnce(&mut dyn Val) -> Status,
    ) -> PayloadResult {
        let outcome = op(ctx.val());
        if outcome == Err(ValError::Faulted) {
            log::info!(target: "val", "{}: fault provoked, awaiting reset", ctx.test());
            return Ok(PayloadExit::AwaitingExternalReset);
        }

        log::error!(
            target: "val",
            "{}: provoking operation returned {outcome:?} instead of faulting",
            ctx.test()
        );
        let Self { window, saved } = self;
        ctx.call(|val| window.write(val, NvField::Boot, BootIntent::BootUnknown.as_u32()))?;
        ctx.call(|val| val.mem_reg_write(FAULT_CONTROL_REGISTER, saved))?;
        Err(ctx.fail(ValError::Invalid))
    }
}

/// Post-reset branch before fault control is restored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct PendingResume {
    window: NvramWindow,
}

impl PendingResume {
    /// Clears the tag and restores the saved fault control.
    ///
    /// Returns the restored value.
    ///
    /// # Errors
    ///
    /// Returns [`Abort`] when the record or the register cannot be accessed.
    #[track_caller]
    pub fn restore(self, ctx: &mut TestContext<'_>) -> Result<u32, Abort> {
        let window = self.window;
        ctx.call(|val| window.write(val, NvField::Boot, BootIntent::BootUnknown.as_u32()))?;
        let saved = ctx.call(|val| window.read(val, NvField::FaultControl))?;
        ctx.call(|val| val.mem_reg_write(FAULT_CONTROL_REGISTER, saved))?;
        Ok(saved)
    }
}
