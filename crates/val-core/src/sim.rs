//! In-memory reference target implementing [`Val`].
//!
//! The simulation keeps the state a real device would: memory regions,
//! NVRAM, a register file, fuses, version counters and installed fault
//! handlers. Security violations are resolved the way the fault-control
//! register says: the raised exception escalates to HardFault when its
//! enable bit is clear, and an exception without a recovering handler
//! latches a fault that only [`SimTarget::reset`] clears.

use std::collections::{BTreeMap, HashMap};

use crate::{
    ConfigError, ConfigId, CryptoBase, Descriptor, DescriptorStore, Exception, FwVersionClass,
    HandlerPolicy, KeyDescriptor, KeyType, MemoryType, ScratchRegion, Status, TargetConfig, Val,
    ValError, ValResult, VersionCounter, World, FAULT_CONTROL_REGISTER,
};

const ERASED_NVRAM: u8 = 0xFF;

#[derive(Debug, Clone)]
struct Region {
    kind: MemoryType,
    start: u32,
    end: u32,
    bytes: Option<Box<[u8]>>,
}

impl Region {
    const fn erased_byte(&self) -> u8 {
        match self.kind {
            MemoryType::Nvram | MemoryType::Flash => ERASED_NVRAM,
            MemoryType::Rom | MemoryType::Sram => 0,
        }
    }

    const fn contains(&self, start: u32, len: u32) -> bool {
        match start.checked_add(len) {
            Some(end) => start >= self.start && end <= self.end,
            None => false,
        }
    }

    fn read(&self, offset: usize, buf: &mut [u8]) {
        match &self.bytes {
            Some(bytes) => buf.copy_from_slice(&bytes[offset..offset + buf.len()]),
            None => buf.fill(self.erased_byte()),
        }
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        let fill = self.erased_byte();
        let len = (self.end - self.start) as usize;
        self.bytes
            .get_or_insert_with(|| vec![fill; len].into_boxed_slice())
    }
}

#[derive(Debug, Clone, Copy)]
struct KeyGuard {
    start: u32,
    end: u32,
    locked: bool,
    trusted_only: bool,
}

impl KeyGuard {
    const fn overlaps(&self, start: u32, end: u32) -> bool {
        self.start < end && start < self.end
    }
}

/// Simulated target device.
#[derive(Debug, Clone)]
pub struct SimTarget {
    store: DescriptorStore,
    regions: Vec<Region>,
    registers: BTreeMap<u32, u32>,
    handlers: HashMap<Exception, HandlerPolicy>,
    fuses: BTreeMap<u32, u32>,
    key_guards: Vec<KeyGuard>,
    counters: Vec<(FwVersionClass, VersionCounter)>,
    crypto_base: Option<CryptoBase>,
    latched_fault: Option<Exception>,
    fuse_reads: usize,
}

impl SimTarget {
    /// Powers on a target described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the description is inconsistent.
    pub fn new(config: &TargetConfig) -> Result<Self, ConfigError> {
        let store = DescriptorStore::from_config(config)?;

        let regions = config
            .memory
            .iter()
            .map(|region| Region {
                kind: region.kind,
                start: region.start,
                end: region.end,
                bytes: None,
            })
            .collect();

        let mut fuses = BTreeMap::new();
        let mut key_guards = Vec::with_capacity(config.keys.len());
        for key in &config.keys {
            let mut addr = key.addr;
            for word in &key.material {
                fuses.insert(addr, *word);
                addr = addr.saturating_add(1);
            }
            key_guards.push(KeyGuard {
                start: key.addr,
                end: addr,
                locked: key.state.contains(crate::FuseState::LOCKED),
                trusted_only: key.trusted_only,
            });
        }

        let counters = config
            .version_counters
            .iter()
            .map(|counter| (counter.class, VersionCounter::new(counter.initial, counter.max)))
            .collect();

        let mut registers = BTreeMap::new();
        registers.insert(FAULT_CONTROL_REGISTER, config.boot_fault_control);

        Ok(Self {
            store,
            regions,
            registers,
            handlers: HashMap::new(),
            fuses,
            key_guards,
            counters,
            crypto_base: None,
            latched_fault: None,
            fuse_reads: 0,
        })
    }

    /// Performs a device reset.
    ///
    /// Registers (including fault control) read as zero afterwards, handlers
    /// and the crypto window are forgotten, and a latched fault is cleared.
    /// Memory, NVRAM, fuses and version counters keep their contents.
    pub fn reset(&mut self) {
        if let Some(fault) = self.latched_fault.take() {
            log::info!(target: "sim", "reset clears latched {fault:?}");
        } else {
            log::info!(target: "sim", "reset");
        }
        self.registers.clear();
        self.handlers.clear();
        self.crypto_base = None;
    }

    /// Returns `true` while a fault is latched and the device needs a reset.
    #[must_use]
    pub const fn reset_pending(&self) -> bool {
        self.latched_fault.is_some()
    }

    /// Fault latched since the last reset.
    #[must_use]
    pub const fn latched_fault(&self) -> Option<Exception> {
        self.latched_fault
    }

    /// Number of fuse read requests served since power-on.
    #[must_use]
    pub const fn fuse_reads(&self) -> usize {
        self.fuse_reads
    }

    /// Current value of a register; unwritten registers read as zero.
    #[must_use]
    pub fn register(&self, addr: u32) -> u32 {
        self.registers.get(&addr).copied().unwrap_or(0)
    }

    /// Reads a little-endian word from any declared memory region.
    #[must_use]
    pub fn read_word(&self, addr: u32) -> Option<u32> {
        let region = self.regions.iter().find(|region| region.contains(addr, 4))?;
        let mut word = [0_u8; 4];
        region.read((addr - region.start) as usize, &mut word);
        Some(u32::from_le_bytes(word))
    }

    /// Current value of a version counter.
    #[must_use]
    pub fn counter_value(&self, instance: u32) -> Option<u32> {
        self.counter(instance).map(|(_, counter)| counter.read())
    }

    /// Descriptor catalogue of this target.
    #[must_use]
    pub const fn store(&self) -> &DescriptorStore {
        &self.store
    }

    fn counter(&self, instance: u32) -> Option<&(FwVersionClass, VersionCounter)> {
        self.counters.get(usize::try_from(instance).ok()?)
    }

    const fn running(&self) -> Status {
        match self.latched_fault {
            Some(_) => Err(ValError::Faulted),
            None => Ok(()),
        }
    }

    fn region_mut(&mut self, start: u32, len: u32) -> ValResult<&mut Region> {
        self.regions
            .iter_mut()
            .find(|region| region.contains(start, len))
            .ok_or(ValError::InvalidArgs)
    }

    fn nvram_region(
        &mut self,
        base: u32,
        offset: u32,
        len: usize,
    ) -> ValResult<(&mut Region, usize)> {
        let len = u32::try_from(len).map_err(|_| ValError::InvalidArgs)?;
        let addr = base.checked_add(offset).ok_or(ValError::InvalidArgs)?;
        let region = self
            .regions
            .iter_mut()
            .find(|region| region.kind == MemoryType::Nvram && region.start == base)
            .ok_or(ValError::InvalidArgs)?;
        if !region.contains(addr, len) {
            return Err(ValError::InvalidArgs);
        }
        Ok((region, offset as usize))
    }

    /// Resolves a security violation raised as `exception`.
    ///
    /// Returns `Ok` when an installed handler recovered from it.
    fn raise(&mut self, exception: Exception) -> Status {
        let taken = exception.escalate(self.register(FAULT_CONTROL_REGISTER));
        let policy = self.handlers.get(&taken).copied().unwrap_or_default();
        match policy {
            HandlerPolicy::Recover => {
                log::debug!(target: "sim", "{exception:?} taken as {taken:?}, recovered");
                Ok(())
            }
            HandlerPolicy::Escalate => {
                log::warn!(target: "sim", "{exception:?} taken as {taken:?}, device halted");
                self.latched_fault = Some(taken);
                Err(ValError::Faulted)
            }
        }
    }

    fn fill(&mut self, start: u32, len: u32, pattern: u32) -> Status {
        if len == 0 {
            return Ok(());
        }
        let region = self.region_mut(start, len)?;
        let offset = (start - region.start) as usize;
        let pattern = pattern.to_le_bytes();
        let bytes = region.bytes_mut();
        for (index, byte) in bytes[offset..offset + len as usize].iter_mut().enumerate() {
            *byte = pattern[index % pattern.len()];
        }
        Ok(())
    }
}

impl Val for SimTarget {
    fn target_get_config(&self, id: ConfigId) -> ValResult<Descriptor> {
        self.store.get(id)
    }

    fn test_initialize(&mut self, scratch: ScratchRegion) -> Status {
        self.running()?;
        self.fill(scratch.start, scratch.len(), 0)
    }

    fn memory_fill(&mut self, start: u32, len: u32, pattern: u32) -> Status {
        self.running()?;
        self.fill(start, len, pattern)
    }

    fn nvram_read(&mut self, base: u32, offset: u32, buf: &mut [u8]) -> Status {
        self.running()?;
        let (region, offset) = self.nvram_region(base, offset, buf.len())?;
        region.read(offset, buf);
        Ok(())
    }

    fn nvram_write(&mut self, base: u32, offset: u32, data: &[u8]) -> Status {
        self.running()?;
        let (region, offset) = self.nvram_region(base, offset, data.len())?;
        region.bytes_mut()[offset..offset + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn mem_reg_read(&mut self, addr: u32) -> ValResult<u32> {
        self.running()?;
        Ok(self.register(addr))
    }

    fn mem_reg_write(&mut self, addr: u32, value: u32) -> Status {
        self.running()?;
        self.registers.insert(addr, value);
        Ok(())
    }

    fn crypto_set_base_addr(&mut self, base: CryptoBase) -> Status {
        self.running()?;
        self.crypto_base = Some(base);
        Ok(())
    }

    fn crypto_get_key_info(&self, key: KeyType, instance: u32) -> ValResult<KeyDescriptor> {
        self.store.key(key, instance)
    }

    fn fuse_read(&mut self, world: World, addr: u32, buf: &mut [u32]) -> Status {
        self.running()?;
        if self.crypto_base.is_none() {
            return Err(ValError::Error);
        }
        self.fuse_reads += 1;

        let len = u32::try_from(buf.len()).map_err(|_| ValError::InvalidArgs)?;
        let end = addr.checked_add(len).ok_or(ValError::InvalidArgs)?;
        let guarded = self
            .key_guards
            .iter()
            .any(|guard| guard.trusted_only && guard.overlaps(addr, end));
        if world == World::NonSecure && guarded {
            self.raise(Exception::SecureFault)?;
            buf.fill(0);
            return Ok(());
        }

        let mut word_addr = addr;
        for word in buf.iter_mut() {
            *word = self.fuses.get(&word_addr).copied().unwrap_or(0);
            word_addr += 1;
        }
        Ok(())
    }

    fn fuse_write(&mut self, addr: u32, data: &[u32]) -> Status {
        self.running()?;
        if self.crypto_base.is_none() {
            return Err(ValError::Error);
        }
        let len = u32::try_from(data.len()).map_err(|_| ValError::InvalidArgs)?;
        let end = addr.checked_add(len).ok_or(ValError::InvalidArgs)?;
        if self
            .key_guards
            .iter()
            .any(|guard| guard.locked && guard.overlaps(addr, end))
        {
            return Err(ValError::Error);
        }
        let mut word_addr = addr;
        for word in data {
            self.fuses.insert(word_addr, *word);
            word_addr += 1;
        }
        Ok(())
    }

    fn firmware_version_read(&mut self, instance: u32, class: FwVersionClass) -> u32 {
        match self.counter(instance) {
            Some((declared, counter)) if *declared == class => counter.read(),
            _ => 0,
        }
    }

    fn firmware_version_update(
        &mut self,
        world: World,
        instance: u32,
        class: FwVersionClass,
        value: u32,
    ) -> Status {
        self.running()?;
        let declared = match self.counter(instance) {
            Some((declared, _)) => *declared,
            None => return Err(ValError::NotFound),
        };
        if declared != class {
            return Err(ValError::InvalidArgs);
        }
        if world == World::NonSecure && class == FwVersionClass::Trusted {
            self.raise(Exception::SecureFault)?;
            return Err(ValError::Error);
        }

        let index = usize::try_from(instance).map_err(|_| ValError::NotFound)?;
        let (_, counter) = self.counters.get_mut(index).ok_or(ValError::NotFound)?;
        counter.update(value)
    }

    fn interrupt_install_handler(
        &mut self,
        exception: Exception,
        policy: HandlerPolicy,
    ) -> Status {
        self.running()?;
        self.handlers.insert(exception, policy);
        Ok(())
    }

    fn interrupt_restore_handler(&mut self, exception: Exception) -> Status {
        self.running()?;
        self.handlers.remove(&exception);
        Ok(())
    }

    fn halted(&self) -> bool {
        self.reset_pending()
    }
}

#[cfg(test)]
mod tests {
    use super::SimTarget;
    use crate::{
        CryptoBase, Exception, FwVersionClass, HandlerPolicy, KeyType, ScratchRegion,
        TargetConfig, Val, ValError, World, FAULT_CONTROL_REGISTER, FAULT_ENABLE_MASK,
    };

    fn target() -> SimTarget {
        SimTarget::new(&TargetConfig::default()).expect("reference target")
    }

    #[test]
    fn fill_lays_the_pattern_little_endian() {
        let mut target = target();
        target
            .memory_fill(0x2000_4000, 0x1000, 0xC0DE_CAFE)
            .expect("fill");
        assert_eq!(target.read_word(0x2000_4000), Some(0xC0DE_CAFE));
        assert_eq!(target.read_word(0x2000_4FFC), Some(0xC0DE_CAFE));
        assert_eq!(target.read_word(0x2000_3FFC), Some(0));
        assert_eq!(
            target.memory_fill(0x2000_4FFC, 8, 0),
            Err(ValError::InvalidArgs)
        );
    }

    #[test]
    fn scratch_initialization_zeroes_the_window() {
        let mut target = target();
        target
            .memory_fill(0x3000_0000, 0x10, u32::MAX)
            .expect("dirty");
        target
            .test_initialize(ScratchRegion {
                start: 0x3000_0000,
                end: 0x3000_0400,
            })
            .expect("init");
        assert_eq!(target.read_word(0x3000_0000), Some(0));
    }

    #[test]
    fn nvram_requires_the_region_base() {
        let mut target = target();
        let mut buf = [0_u8; 4];
        assert_eq!(
            target.nvram_read(0x5000_0004, 0, &mut buf),
            Err(ValError::InvalidArgs)
        );
        assert_eq!(
            target.nvram_read(0x5000_0000, 0xFE, &mut buf),
            Err(ValError::InvalidArgs)
        );
        target.nvram_read(0x5000_0000, 0, &mut buf).expect("read");
        assert_eq!(buf, [0xFF; 4]);
    }

    #[test]
    fn fuse_access_needs_a_crypto_window() {
        let mut target = target();
        let mut key = [0_u32; 8];
        assert_eq!(
            target.fuse_read(World::Secure, 0x10, &mut key),
            Err(ValError::Error)
        );
        target
            .crypto_set_base_addr(CryptoBase::SecureProgrammable)
            .expect("window");
        target
            .fuse_read(World::Secure, 0x10, &mut key)
            .expect("secure read");
        assert_eq!(key[0], 0x9E37_79B9);
        assert_eq!(target.fuse_reads(), 1);
        assert_eq!(target.crypto_get_key_info(KeyType::Huk, 0).map(|k| k.size), Ok(8));
    }

    #[test]
    fn non_secure_key_read_recovers_with_zeroes_under_a_handler() {
        let mut target = target();
        target
            .crypto_set_base_addr(CryptoBase::SecureProgrammable)
            .expect("window");
        target
            .interrupt_install_handler(Exception::SecureFault, HandlerPolicy::Recover)
            .expect("handler");
        let mut key = [u32::MAX; 8];
        target
            .fuse_read(World::NonSecure, 0x10, &mut key)
            .expect("recovered");
        assert_eq!(key, [0; 8]);
        assert!(!target.reset_pending());
    }

    #[test]
    fn unhandled_violation_latches_until_reset() {
        let mut target = target();
        target
            .mem_reg_write(FAULT_CONTROL_REGISTER, 0)
            .expect("faults off");
        assert_eq!(
            target.firmware_version_update(World::NonSecure, 1, FwVersionClass::Trusted, 5),
            Err(ValError::Faulted)
        );
        assert_eq!(target.latched_fault(), Some(Exception::HardFault));
        assert!(Val::halted(&target));
        assert_eq!(target.mem_reg_read(0x4000_0000), Err(ValError::Faulted));
        assert_eq!(target.counter_value(1), Some(0));

        target.reset();
        assert!(!target.reset_pending());
        assert!(!Val::halted(&target));
        assert_eq!(target.register(FAULT_CONTROL_REGISTER), 0);
    }

    #[test]
    fn escalation_follows_fault_control() {
        let mut target = target();
        target
            .interrupt_install_handler(Exception::SecureFault, HandlerPolicy::Recover)
            .expect("handler");
        assert_eq!(
            target.firmware_version_update(World::NonSecure, 1, FwVersionClass::Trusted, 5),
            Err(ValError::Error)
        );
        assert!(!target.reset_pending());

        target
            .mem_reg_write(
                FAULT_CONTROL_REGISTER,
                target.register(FAULT_CONTROL_REGISTER) & !FAULT_ENABLE_MASK,
            )
            .expect("faults off");
        assert_eq!(
            target.firmware_version_update(World::NonSecure, 1, FwVersionClass::Trusted, 5),
            Err(ValError::Faulted)
        );
        assert_eq!(target.latched_fault(), Some(Exception::HardFault));
    }

    #[test]
    fn counters_enforce_the_contract_and_survive_reset() {
        let mut target = target();
        assert_eq!(target.firmware_version_read(0, FwVersionClass::NonTrusted), 3);
        target
            .firmware_version_update(World::Secure, 0, FwVersionClass::NonTrusted, 4)
            .expect("increment");
        assert_eq!(
            target.firmware_version_update(World::Secure, 0, FwVersionClass::NonTrusted, 3),
            Err(ValError::Invalid)
        );
        assert_eq!(
            target.firmware_version_update(World::Secure, 0, FwVersionClass::Trusted, 5),
            Err(ValError::InvalidArgs)
        );
        assert_eq!(
            target.firmware_version_update(World::Secure, 2, FwVersionClass::Trusted, 5),
            Err(ValError::NotFound)
        );
        target.reset();
        assert_eq!(target.counter_value(0), Some(4));
    }

    #[test]
    fn locked_fuses_refuse_programming() {
        let mut config = TargetConfig::default();
        config.keys[0].state |= crate::FuseState::LOCKED;
        let mut target = SimTarget::new(&config).expect("target");
        target
            .crypto_set_base_addr(CryptoBase::SecureProgrammable)
            .expect("window");
        assert_eq!(target.fuse_write(0x12, &[1]), Err(ValError::Error));
        target.fuse_write(0x40, &[1, 2]).expect("unused fuses");
    }
}
