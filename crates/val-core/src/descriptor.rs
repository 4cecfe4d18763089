//! Resource descriptor model and packed configuration identifiers.

use bitflags::bitflags;

/// Top-level resource group in a configuration identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum Group {
    /// Memory regions.
    Memory = 0x01,
    /// Miscellaneous resources such as version counters.
    Miscellaneous = 0x02,
}

/// Memory resource types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum MemoryType {
    /// On-chip ROM.
    Rom = 0x01,
    /// On-chip SRAM.
    Sram = 0x02,
    /// Non-volatile storage used for cross-reset state.
    Nvram = 0x03,
    /// Flash.
    Flash = 0x04,
}

/// Miscellaneous resource types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum MiscType {
    /// On-chip anti-rollback firmware version counter.
    VersionCounter = 0x01,
}

/// A (group, type) pair; the unit over which instances are enumerated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceClass {
    /// A memory region type.
    Memory(MemoryType),
    /// A miscellaneous resource type.
    Misc(MiscType),
}

impl ResourceClass {
    /// Firmware version counters.
    pub const VERSION_COUNTER: Self = Self::Misc(MiscType::VersionCounter);

    /// Returns the resource group.
    #[must_use]
    pub const fn group(self) -> Group {
        match self {
            Self::Memory(_) => Group::Memory,
            Self::Misc(_) => Group::Miscellaneous,
        }
    }

    /// Returns the type code within the group.
    #[must_use]
    pub const fn type_code(self) -> u8 {
        match self {
            Self::Memory(kind) => kind as u8,
            Self::Misc(kind) => kind as u8,
        }
    }
}

/// Group/type/instance key addressing one resource descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConfigId {
    /// Resource group and type.
    pub class: ResourceClass,
    /// Zero-based instance within the class.
    pub instance: u16,
}

impl ConfigId {
    /// Creates a configuration identifier.
    #[must_use]
    pub const fn new(class: ResourceClass, instance: u16) -> Self {
        Self { class, instance }
    }

    /// Packs the identifier as `group << 24 | type << 16 | instance`.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        ((self.class.group() as u32) << 24)
            | ((self.class.type_code() as u32) << 16)
            | self.instance as u32
    }
}

/// Header shared by every descriptor kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConfigHeader {
    /// Key of this descriptor.
    pub id: ConfigId,
    /// Total number of instances declared for this descriptor's class.
    pub instance_count: u32,
}

/// Security attribute of a memory region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum MemAttribute {
    /// Secure-only.
    Secure,
    /// Non-secure.
    NonSecure,
    /// Non-secure callable veneer region.
    NonSecureCallable,
    /// Attribution decided at run time.
    Configurable,
    /// Not used by firmware; free for tests.
    Unused,
}

/// A contiguous memory region `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoryDescriptor {
    /// Descriptor header.
    pub header: ConfigHeader,
    /// Inclusive start address.
    pub start: u32,
    /// Exclusive end address.
    pub end: u32,
    /// Security attribute.
    pub attribute: MemAttribute,
}

impl MemoryDescriptor {
    /// Size of the region in bytes.
    #[must_use]
    pub const fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    /// Returns `true` for a zero-length region.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` when `[start, start + len)` lies inside this region.
    #[must_use]
    pub const fn contains_range(&self, start: u32, len: u32) -> bool {
        match start.checked_add(len) {
            Some(end) => start >= self.start && end <= self.end,
            None => false,
        }
    }

    /// Returns `true` when the two regions share at least one byte.
    #[must_use]
    pub const fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Anti-rollback counter class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum FwVersionClass {
    /// Counter guarding trusted firmware.
    Trusted,
    /// Counter guarding non-trusted firmware.
    NonTrusted,
}

/// Descriptor of a miscellaneous resource (firmware version counter).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MiscDescriptor {
    /// Descriptor header.
    pub header: ConfigHeader,
    /// Counter class.
    pub fw_ver_type: FwVersionClass,
    /// Highest value the counter may hold.
    pub fw_ver_cnt_max: u32,
}

/// A descriptor fetched from the resource store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Descriptor {
    /// Memory region.
    Memory(MemoryDescriptor),
    /// Miscellaneous resource.
    Misc(MiscDescriptor),
}

impl Descriptor {
    /// Returns the common header.
    #[must_use]
    pub const fn header(&self) -> ConfigHeader {
        match self {
            Self::Memory(desc) => desc.header,
            Self::Misc(desc) => desc.header,
        }
    }
}

/// Typed view over [`Descriptor`] used by discovery helpers.
pub trait ResourceDescriptor: Sized + Copy {
    /// Narrows a fetched descriptor to this kind.
    fn from_descriptor(descriptor: Descriptor) -> Option<Self>;
    /// Returns the common header.
    fn header(&self) -> ConfigHeader;
}

impl ResourceDescriptor for Descriptor {
    fn from_descriptor(descriptor: Descriptor) -> Option<Self> {
        Some(descriptor)
    }

    fn header(&self) -> ConfigHeader {
        Self::header(self)
    }
}

impl ResourceDescriptor for MemoryDescriptor {
    fn from_descriptor(descriptor: Descriptor) -> Option<Self> {
        match descriptor {
            Descriptor::Memory(desc) => Some(desc),
            Descriptor::Misc(_) => None,
        }
    }

    fn header(&self) -> ConfigHeader {
        self.header
    }
}

impl ResourceDescriptor for MiscDescriptor {
    fn from_descriptor(descriptor: Descriptor) -> Option<Self> {
        match descriptor {
            Descriptor::Misc(desc) => Some(desc),
            Descriptor::Memory(_) => None,
        }
    }

    fn header(&self) -> ConfigHeader {
        self.header
    }
}

/// Key resources a target may expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum KeyType {
    /// Hardware unique key.
    Huk,
}

bitflags! {
    /// Fuse lifecycle state of a key resource.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
    pub struct FuseState: u32 {
        /// Fuses are provisioned and readable by trusted code.
        const OPEN = 1 << 0;
        /// Fuses are locked against further programming.
        const LOCKED = 1 << 1;
        /// Fuses can be locked.
        const LOCKABLE = 1 << 2;
        /// Fuse contents are confidential.
        const CONFIDENTIAL = 1 << 3;
        /// Fuses belong to the bulk array.
        const BULK = 1 << 4;
    }
}

/// Location and state of a key held in fuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyDescriptor {
    /// Key kind.
    pub key: KeyType,
    /// Instance of this key kind.
    pub instance: u32,
    /// Fuse word address of the first key word.
    pub addr: u32,
    /// Key size in 32-bit words.
    pub size: u32,
    /// Fuse lifecycle state.
    pub state: FuseState,
}

/// Per-test uninitialized-data window zeroed by test initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct ScratchRegion {
    /// Inclusive start address.
    pub start: u32,
    /// Exclusive end address.
    pub end: u32,
}

impl ScratchRegion {
    /// Size of the window in bytes.
    #[must_use]
    pub const fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    /// Returns `true` for an empty window.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
