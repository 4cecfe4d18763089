use thiserror::Error;

/// Failure side of the VAL status taxonomy.
///
/// Success is the `Ok` side of [`Status`]; every other status code is one of
/// these variants. The numeric codes are stable and match the values a target
/// reports through its firmware interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u32)]
pub enum ValError {
    /// A security property was violated, e.g. a secret was readable.
    #[error("security property violated")]
    Error = 0x01,
    /// Requested resource or instance does not exist on this target.
    #[error("resource not found")]
    NotFound = 0x02,
    /// An operation that should have failed succeeded, or vice versa.
    #[error("operation outcome contradicts the expected behavior")]
    Invalid = 0x03,
    /// A configuration value violates a stated minimum or maximum.
    #[error("configuration value out of permitted range")]
    IncorrectValue = 0x04,
    /// Arguments do not describe a valid address, range or instance.
    #[error("invalid arguments")]
    InvalidArgs = 0x05,
    /// The call raised a fault that escalated and now needs a device reset.
    #[error("fault raised, device awaiting reset")]
    Faulted = 0x06,
}

/// Raw status result for VAL operations without a payload.
pub type Status = Result<(), ValError>;

/// Result type for VAL operations that produce a value.
pub type ValResult<T> = Result<T, ValError>;

impl ValError {
    /// Converts the status to its stable raw code.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self as u32
    }

    /// Converts a stable raw code back into a failure status.
    ///
    /// Returns `None` for the success code `0` and unknown codes.
    #[must_use]
    pub const fn from_u32(code: u32) -> Option<Self> {
        match code {
            0x01 => Some(Self::Error),
            0x02 => Some(Self::NotFound),
            0x03 => Some(Self::Invalid),
            0x04 => Some(Self::IncorrectValue),
            0x05 => Some(Self::InvalidArgs),
            0x06 => Some(Self::Faulted),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ValError;

    #[test]
    fn stable_codes_are_bijective_for_defined_values() {
        for code in 0x01u32..=0x06 {
            let err = ValError::from_u32(code).expect("defined status code");
            assert_eq!(err.as_u32(), code);
        }
    }

    #[test]
    fn success_and_unknown_codes_are_not_failures() {
        assert!(ValError::from_u32(0).is_none());
        assert!(ValError::from_u32(0xFF).is_none());
    }
}
