//! Anti-rollback version counter contract.

use crate::{FwVersionClass, MiscDescriptor, Status, ValError};

impl FwVersionClass {
    /// Lowest `max` a counter of this class may declare.
    ///
    /// Trusted counters must represent at least 0..=63, non-trusted ones at
    /// least 0..=255.
    #[must_use]
    pub const fn min_max(self) -> u32 {
        match self {
            Self::Trusted => 63,
            Self::NonTrusted => 255,
        }
    }
}

impl MiscDescriptor {
    /// Checks the declared maximum against the class floor.
    ///
    /// # Errors
    ///
    /// Returns [`ValError::IncorrectValue`] when `fw_ver_cnt_max` is below
    /// [`FwVersionClass::min_max`].
    pub const fn check_floor(&self) -> Status {
        if self.fw_ver_cnt_max < self.fw_ver_type.min_max() {
            Err(ValError::IncorrectValue)
        } else {
            Ok(())
        }
    }
}

/// Monotonic counter bounded by `max`.
///
/// Values never decrease and never exceed `max`; an update to exactly `max`
/// freezes the counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct VersionCounter {
    value: u32,
    max: u32,
}

impl VersionCounter {
    /// Creates a counter holding `value`, clamped to `max`.
    #[must_use]
    pub const fn new(value: u32, max: u32) -> Self {
        let value = if value > max { max } else { value };
        Self { value, max }
    }

    /// Current value.
    #[must_use]
    pub const fn read(&self) -> u32 {
        self.value
    }

    /// Declared maximum.
    #[must_use]
    pub const fn max(&self) -> u32 {
        self.max
    }

    /// Returns `true` once the counter has reached its maximum.
    #[must_use]
    pub const fn is_frozen(&self) -> bool {
        self.value == self.max
    }

    /// Moves the counter to `value`.
    ///
    /// # Errors
    ///
    /// Returns [`ValError::Invalid`] for a rollback (`value < current`) and
    /// [`ValError::IncorrectValue`] for a value above `max`. The counter is
    /// unchanged on error.
    #[allow(clippy::missing_const_for_fn)]
    pub fn update(&mut self, value: u32) -> Status {
        if value < self.value {
            return Err(ValError::Invalid);
        }
        if value > self.max {
            return Err(ValError::IncorrectValue);
        }
        self.value = value;
        Ok(())
    }
}
