//! Fault-control vocabulary shared by tests and targets.
//!
//! Only the capability surface is modeled here: which exceptions exist, how
//! their enable bits sit in the fault-control register, and what a test may
//! ask a handler to do. Vector tables and stacking are left to the target.

/// Address of the System Handler Control and State Register.
pub const FAULT_CONTROL_REGISTER: u32 = 0xE000_ED24;

/// Enable bits for MemManage, BusFault, UsageFault and SecureFault.
pub const FAULT_ENABLE_MASK: u32 = 0x000F_0000;

/// Configurable and fixed exceptions a test may hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum Exception {
    /// Escalation target for disabled or failing configurable faults.
    HardFault = 3,
    /// Memory protection violation.
    MemManage = 4,
    /// Bus error on instruction or data access.
    BusFault = 5,
    /// Undefined instruction or illegal state.
    UsageFault = 6,
    /// Security attribution violation.
    SecureFault = 7,
}

impl Exception {
    /// Returns the architectural exception number.
    #[must_use]
    pub const fn number(self) -> u8 {
        self as u8
    }

    /// Converts an architectural exception number back into an exception.
    #[must_use]
    pub const fn from_number(number: u8) -> Option<Self> {
        match number {
            3 => Some(Self::HardFault),
            4 => Some(Self::MemManage),
            5 => Some(Self::BusFault),
            6 => Some(Self::UsageFault),
            7 => Some(Self::SecureFault),
            _ => None,
        }
    }

    /// Returns the fault-control enable bit, if this exception can be disabled.
    #[must_use]
    pub const fn enable_bit(self) -> Option<u32> {
        match self {
            Self::HardFault => None,
            Self::MemManage => Some(1 << 16),
            Self::BusFault => Some(1 << 17),
            Self::UsageFault => Some(1 << 18),
            Self::SecureFault => Some(1 << 19),
        }
    }

    /// Resolves the exception actually taken under `fault_control`.
    ///
    /// A configurable fault whose enable bit is clear escalates to HardFault.
    #[must_use]
    pub const fn escalate(self, fault_control: u32) -> Self {
        match self.enable_bit() {
            Some(bit) if fault_control & bit != 0 => self,
            _ => Self::HardFault,
        }
    }
}

/// Behavior a test requests from an exception handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum HandlerPolicy {
    /// Default handler: the fault is fatal until the device resets.
    #[default]
    Escalate,
    /// Test handler: skip the faulting access and resume.
    Recover,
}

/// Security state of the caller issuing a VAL request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum World {
    /// Trusted, privileged path through the secure VAL entry points.
    #[default]
    Secure,
    /// De-privileged path called directly from non-secure code.
    NonSecure,
}

/// Crypto/fuse register window selected before fuse or key access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum CryptoBase {
    /// Secure programmable window.
    SecureProgrammable,
    /// Non-secure programmable window.
    NonSecureProgrammable,
}

#[cfg(test)]
mod tests {
    use super::{Exception, FAULT_ENABLE_MASK};

    #[test]
    fn exception_numbers_roundtrip() {
        for number in 3u8..=7 {
            let exception = Exception::from_number(number).expect("defined exception");
            assert_eq!(exception.number(), number);
        }
        assert!(Exception::from_number(2).is_none());
        assert!(Exception::from_number(8).is_none());
    }

    #[test]
    fn enable_bits_cover_exactly_the_fault_enable_mask() {
        let mask = [
            Exception::MemManage,
            Exception::BusFault,
            Exception::UsageFault,
            Exception::SecureFault,
        ]
        .iter()
        .filter_map(|exception| exception.enable_bit())
        .fold(0, |acc, bit| acc | bit);
        assert_eq!(mask, FAULT_ENABLE_MASK);
        assert!(Exception::HardFault.enable_bit().is_none());
    }

    #[test]
    fn disabled_faults_escalate_to_hardfault() {
        assert_eq!(
            Exception::SecureFault.escalate(FAULT_ENABLE_MASK),
            Exception::SecureFault
        );
        assert_eq!(Exception::SecureFault.escalate(0), Exception::HardFault);
        assert_eq!(
            Exception::BusFault.escalate(FAULT_ENABLE_MASK & !(1 << 17)),
            Exception::HardFault
        );
        assert_eq!(Exception::HardFault.escalate(0), Exception::HardFault);
    }
}
