//! Target description consumed by the descriptor store and simulated target.

use thiserror::Error;

use crate::nvram::NV_RECORD_BYTES;
use crate::{FuseState, FwVersionClass, KeyType, MemAttribute, MemoryType, ScratchRegion};

/// Fault-control value left by the boot firmware: all configurable faults on.
pub const DEFAULT_BOOT_FAULT_CONTROL: u32 = crate::FAULT_ENABLE_MASK;

/// One memory region of a target.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct MemoryRegionConfig {
    /// Region type; instances are numbered per type in declaration order.
    pub kind: MemoryType,
    /// Inclusive start address.
    pub start: u32,
    /// Exclusive end address.
    pub end: u32,
    /// Security attribute.
    pub attribute: MemAttribute,
}

/// One firmware version counter of a target.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct CounterConfig {
    /// Counter class.
    pub class: FwVersionClass,
    /// Highest value the counter may hold.
    pub max: u32,
    /// Value at power-on.
    pub initial: u32,
}

/// One fuse-backed key of a target.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct KeyConfig {
    /// Key kind; instances are numbered per kind in declaration order.
    pub key: KeyType,
    /// Fuse word address of the first key word.
    pub addr: u32,
    /// Key material, one entry per fuse word.
    pub material: Vec<u32>,
    /// Fuse lifecycle state.
    pub state: FuseState,
    /// Non-secure reads violate security attribution when set.
    pub trusted_only: bool,
}

/// Complete description of a target.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TargetConfig {
    /// Memory regions.
    pub memory: Vec<MemoryRegionConfig>,
    /// Firmware version counters.
    pub version_counters: Vec<CounterConfig>,
    /// Fuse-backed keys.
    pub keys: Vec<KeyConfig>,
    /// Fault-control register value at power-on.
    pub boot_fault_control: u32,
    /// Per-test uninitialized-data window.
    pub scratch: ScratchRegion,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            memory: vec![
                MemoryRegionConfig {
                    kind: MemoryType::Sram,
                    start: 0x3000_0000,
                    end: 0x3000_4000,
                    attribute: MemAttribute::Secure,
                },
                MemoryRegionConfig {
                    kind: MemoryType::Sram,
                    start: 0x2000_0000,
                    end: 0x2000_4000,
                    attribute: MemAttribute::NonSecure,
                },
                MemoryRegionConfig {
                    kind: MemoryType::Sram,
                    start: 0x2000_4000,
                    end: 0x2000_5000,
                    attribute: MemAttribute::Unused,
                },
                MemoryRegionConfig {
                    kind: MemoryType::Sram,
                    start: 0x3000_4000,
                    end: 0x3000_5000,
                    attribute: MemAttribute::NonSecureCallable,
                },
                MemoryRegionConfig {
                    kind: MemoryType::Nvram,
                    start: 0x5000_0000,
                    end: 0x5000_0100,
                    attribute: MemAttribute::Secure,
                },
            ],
            version_counters: vec![
                CounterConfig {
                    class: FwVersionClass::NonTrusted,
                    max: 255,
                    initial: 3,
                },
                CounterConfig {
                    class: FwVersionClass::Trusted,
                    max: 63,
                    initial: 0,
                },
            ],
            keys: vec![KeyConfig {
                key: KeyType::Huk,
                addr: 0x10,
                material: vec![
                    0x9E37_79B9,
                    0x7F4A_7C15,
                    0xF39C_C060,
                    0x5CED_C834,
                    0x1082_276B,
                    0xF3A2_7251,
                    0xF86C_6A11,
                    0xD0C1_8E95,
                ],
                state: FuseState::OPEN
                    | FuseState::LOCKABLE
                    | FuseState::CONFIDENTIAL
                    | FuseState::BULK,
                trusted_only: true,
            }],
            boot_fault_control: DEFAULT_BOOT_FAULT_CONTROL,
            scratch: ScratchRegion {
                start: 0x3000_0000,
                end: 0x3000_0400,
            },
        }
    }
}

/// Reasons a target description is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A region has `start >= end`.
    #[error("memory region {start:#010x}..{end:#010x} is empty or inverted")]
    EmptyRegion {
        /// Declared start.
        start: u32,
        /// Declared end.
        end: u32,
    },
    /// Two regions share addresses.
    #[error("memory regions starting at {first:#010x} and {second:#010x} overlap")]
    OverlappingRegions {
        /// Start of the earlier-declared region.
        first: u32,
        /// Start of the later-declared region.
        second: u32,
    },
    /// More instances than a 16-bit instance field can address.
    #[error("too many instances declared for one resource type")]
    TooManyInstances,
    /// A counter starts above its maximum.
    #[error("version counter {index} starts at {initial}, above its max {max}")]
    InitialAboveMax {
        /// Declaration index.
        index: usize,
        /// Declared initial value.
        initial: u32,
        /// Declared maximum.
        max: u32,
    },
    /// A key has no material.
    #[error("key {key:?} has no material")]
    EmptyKey {
        /// Key kind.
        key: KeyType,
    },
    /// Two keys share fuse words.
    #[error("keys at fuse addresses {first:#x} and {second:#x} overlap")]
    OverlappingKeys {
        /// Address of the earlier-declared key.
        first: u32,
        /// Address of the later-declared key.
        second: u32,
    },
    /// No NVRAM region is declared.
    #[error("target declares no NVRAM region for the continuation record")]
    MissingNvram,
    /// NVRAM instance 0 cannot hold the continuation record.
    #[error(
        "NVRAM instance 0 at {start:#010x} holds {len} bytes, the continuation record needs {}",
        NV_RECORD_BYTES
    )]
    NvramTooSmall {
        /// Start of the first declared NVRAM region.
        start: u32,
        /// Its length in bytes.
        len: u32,
    },
    /// The scratch window is empty or not inside a declared region.
    #[error("scratch window {start:#010x}..{end:#010x} is not inside a memory region")]
    ScratchOutsideMemory {
        /// Declared start.
        start: u32,
        /// Declared end.
        end: u32,
    },
}

impl TargetConfig {
    /// Checks the description for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for region in &self.memory {
            if region.start >= region.end {
                return Err(ConfigError::EmptyRegion {
                    start: region.start,
                    end: region.end,
                });
            }
        }

        for (index, first) in self.memory.iter().enumerate() {
            for second in &self.memory[index + 1..] {
                if first.start < second.end && second.start < first.end {
                    return Err(ConfigError::OverlappingRegions {
                        first: first.start,
                        second: second.start,
                    });
                }
            }
        }

        let largest_kind = [
            MemoryType::Rom,
            MemoryType::Sram,
            MemoryType::Nvram,
            MemoryType::Flash,
        ]
        .iter()
        .map(|kind| self.memory.iter().filter(|r| r.kind == *kind).count())
        .max()
        .unwrap_or(0);
        if largest_kind > usize::from(u16::MAX) || self.version_counters.len() > usize::from(u16::MAX)
        {
            return Err(ConfigError::TooManyInstances);
        }

        for (index, counter) in self.version_counters.iter().enumerate() {
            if counter.initial > counter.max {
                return Err(ConfigError::InitialAboveMax {
                    index,
                    initial: counter.initial,
                    max: counter.max,
                });
            }
        }

        self.validate_keys()?;

        let nvram = self
            .memory
            .iter()
            .find(|region| region.kind == MemoryType::Nvram)
            .ok_or(ConfigError::MissingNvram)?;
        let len = nvram.end - nvram.start;
        if len < NV_RECORD_BYTES {
            return Err(ConfigError::NvramTooSmall {
                start: nvram.start,
                len,
            });
        }

        let scratch = self.scratch;
        let scratch_inside = !scratch.is_empty()
            && self
                .memory
                .iter()
                .any(|region| scratch.start >= region.start && scratch.end <= region.end);
        if !scratch_inside {
            return Err(ConfigError::ScratchOutsideMemory {
                start: scratch.start,
                end: scratch.end,
            });
        }

        Ok(())
    }

    fn validate_keys(&self) -> Result<(), ConfigError> {
        for key in &self.keys {
            if key.material.is_empty() {
                return Err(ConfigError::EmptyKey { key: key.key });
            }
        }

        let span = |key: &KeyConfig| {
            let len = u32::try_from(key.material.len()).unwrap_or(u32::MAX);
            (key.addr, key.addr.saturating_add(len))
        };
        for (index, first) in self.keys.iter().enumerate() {
            let (a_start, a_end) = span(first);
            for second in &self.keys[index + 1..] {
                let (b_start, b_end) = span(second);
                if a_start < b_end && b_start < a_end {
                    return Err(ConfigError::OverlappingKeys {
                        first: first.addr,
                        second: second.addr,
                    });
                }
            }
        }
        Ok(())
    }
}
