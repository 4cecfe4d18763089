//! Word layout of the persisted continuation record.
//!
//! The record lives at the start of NVRAM instance 0 as consecutive 32-bit
//! little-endian words. No checksum or version tag is stored.

use crate::{ConfigId, Descriptor, MemoryType, ResourceClass, Status, Val, ValError, ValResult};

/// Bytes per persisted word.
pub const NV_WORD_BYTES: u32 = 4;

/// Bytes occupied by the whole record.
pub const NV_RECORD_BYTES: u32 = NvField::COUNT * NV_WORD_BYTES;

/// Word slots of the continuation record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum NvField {
    /// Boot-intent tag.
    Boot = 0,
    /// Fault-control word saved before faults were suspended.
    FaultControl = 1,
    /// One-based index of the test a session was running, zero when idle.
    ActiveTest = 2,
    /// Session pass tally.
    Passed = 3,
    /// Session fail tally.
    Failed = 4,
    /// Session skip tally.
    Skipped = 5,
    /// Session tally of tests that ended without a verdict.
    Pending = 6,
}

impl NvField {
    /// Number of word slots.
    pub const COUNT: u32 = 7;

    /// Byte offset of the slot within the record.
    #[must_use]
    pub const fn offset(self) -> u32 {
        self as u32 * NV_WORD_BYTES
    }
}

/// Handle on the NVRAM region holding the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NvramWindow {
    base: u32,
}

impl NvramWindow {
    /// Wraps an NVRAM region starting at `base`.
    #[must_use]
    pub const fn new(base: u32) -> Self {
        Self { base }
    }

    /// Discovers NVRAM instance 0.
    ///
    /// # Errors
    ///
    /// Returns [`ValError::NotFound`] when the target declares no NVRAM and
    /// [`ValError::IncorrectValue`] when the region cannot hold the record.
    pub fn locate(val: &dyn Val) -> ValResult<Self> {
        let id = ConfigId::new(ResourceClass::Memory(MemoryType::Nvram), 0);
        let Descriptor::Memory(region) = val.target_get_config(id)? else {
            return Err(ValError::Invalid);
        };
        if region.len() < NV_RECORD_BYTES {
            return Err(ValError::IncorrectValue);
        }
        Ok(Self::new(region.start))
    }

    /// Base address of the region.
    #[must_use]
    pub const fn base(&self) -> u32 {
        self.base
    }

    /// Reads one slot.
    ///
    /// # Errors
    ///
    /// Propagates the target's NVRAM read status.
    pub fn read(&self, val: &mut dyn Val, field: NvField) -> ValResult<u32> {
        let mut word = [0_u8; NV_WORD_BYTES as usize];
        val.nvram_read(self.base, field.offset(), &mut word)?;
        Ok(u32::from_le_bytes(word))
    }

    /// Writes one slot.
    ///
    /// # Errors
    ///
    /// Propagates the target's NVRAM write status.
    pub fn write(&self, val: &mut dyn Val, field: NvField, value: u32) -> Status {
        val.nvram_write(self.base, field.offset(), &value.to_le_bytes())
    }
}
