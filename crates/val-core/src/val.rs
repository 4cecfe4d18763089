//! Capability interface a test payload invokes on the target.
//!
//! Every call is a synchronous request that completes before it returns. A
//! real target forwards these to its drivers; [`crate::SimTarget`] implements
//! them in memory.

use std::fmt;

use crate::{
    ConfigId, CryptoBase, Descriptor, Exception, FwVersionClass, HandlerPolicy, KeyDescriptor,
    KeyType, ScratchRegion, Status, ValResult, World,
};

/// Severity of a diagnostic print.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum PrintLevel {
    /// Security-property violation or harness failure.
    Error,
    /// Unexpected but tolerated condition.
    Warn,
    /// Progress messages.
    Info,
    /// Verbose detail for failure analysis.
    Debug,
}

impl From<PrintLevel> for log::Level {
    fn from(level: PrintLevel) -> Self {
        match level {
            PrintLevel::Error => Self::Error,
            PrintLevel::Warn => Self::Warn,
            PrintLevel::Info => Self::Info,
            PrintLevel::Debug => Self::Debug,
        }
    }
}

/// Validation abstraction layer: the hardware capabilities tests rely on.
pub trait Val {
    /// Fetches the descriptor for `id` from the target catalogue.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ValError::NotFound`] when the target declares no such
    /// resource instance.
    fn target_get_config(&self, id: ConfigId) -> ValResult<Descriptor>;

    /// Zeroes the per-test scratch window.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ValError::InvalidArgs`] when the window is not backed
    /// by target memory.
    fn test_initialize(&mut self, scratch: ScratchRegion) -> Status;

    /// Fills `len` bytes at `start` with the 32-bit `pattern`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ValError::InvalidArgs`] for a range outside target
    /// memory.
    fn memory_fill(&mut self, start: u32, len: u32, pattern: u32) -> Status;

    /// Reads `buf.len()` bytes at `offset` within the NVRAM region at `base`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ValError::InvalidArgs`] when `base` is not an NVRAM
    /// region or the access runs past its end.
    fn nvram_read(&mut self, base: u32, offset: u32, buf: &mut [u8]) -> Status;

    /// Writes `data` at `offset` within the NVRAM region at `base`.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Val::nvram_read`].
    fn nvram_write(&mut self, base: u32, offset: u32, data: &[u8]) -> Status;

    /// Reads a memory-mapped register.
    ///
    /// # Errors
    ///
    /// Returns a target-specific status when the register cannot be read.
    fn mem_reg_read(&mut self, addr: u32) -> ValResult<u32>;

    /// Writes a memory-mapped register.
    ///
    /// # Errors
    ///
    /// Returns a target-specific status when the register cannot be written.
    fn mem_reg_write(&mut self, addr: u32, value: u32) -> Status;

    /// Selects the crypto/fuse register window used by later fuse accesses.
    ///
    /// # Errors
    ///
    /// Returns a target-specific status when the window is unavailable.
    fn crypto_set_base_addr(&mut self, base: CryptoBase) -> Status;

    /// Looks up a key resource.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ValError::NotFound`] when the key is not declared.
    fn crypto_get_key_info(&self, key: KeyType, instance: u32) -> ValResult<KeyDescriptor>;

    /// Reads `buf.len()` fuse words starting at `addr` on behalf of `world`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ValError::Faulted`] when the access raised a fault
    /// that no handler recovered, or a target-specific status otherwise.
    fn fuse_read(&mut self, world: World, addr: u32, buf: &mut [u32]) -> Status;

    /// Programs fuse words starting at `addr`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ValError::Error`] when the fuses are locked.
    fn fuse_write(&mut self, addr: u32, data: &[u32]) -> Status;

    /// Reads a firmware version counter. Pure observation.
    fn firmware_version_read(&mut self, instance: u32, class: FwVersionClass) -> u32;

    /// Updates a firmware version counter on behalf of `world`.
    ///
    /// # Errors
    ///
    /// Fails for rollbacks, values above the counter maximum, and callers
    /// without the privilege the counter class requires.
    fn firmware_version_update(
        &mut self,
        world: World,
        instance: u32,
        class: FwVersionClass,
        value: u32,
    ) -> Status;

    /// Installs a handler policy for `exception`.
    ///
    /// # Errors
    ///
    /// Returns a target-specific status when the vector cannot be changed.
    fn interrupt_install_handler(&mut self, exception: Exception, policy: HandlerPolicy)
        -> Status;

    /// Restores the default handler for `exception`.
    ///
    /// # Errors
    ///
    /// Returns a target-specific status when the vector cannot be changed.
    fn interrupt_restore_handler(&mut self, exception: Exception) -> Status;

    /// Emits a diagnostic line. Fire-and-forget.
    fn print(&mut self, level: PrintLevel, args: fmt::Arguments<'_>) {
        log::log!(target: "val", level.into(), "{args}");
    }

    /// Returns `true` when an unrecovered fault stopped the device.
    ///
    /// Nothing but a reset runs on a halted device. A target whose faults
    /// never return to the caller keeps the default.
    fn halted(&self) -> bool {
        false
    }
}
