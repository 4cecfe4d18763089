//! TBSA-v8M conformance test pool.
//!
//! Every test is a [`val_core::TestDescriptor`] built by its module's
//! `descriptor()` function. [`registry`] collects them in dispatch order and
//! [`runner`] drives the registry across as many simulated boots as the
//! tests need.

use thiserror::Error;
use val_core::{DescriptorError, RegistryError, TestRegistry};

use env_logger as _;

/// Base infrastructure tests.
pub mod base;
/// Key and fuse tests.
pub mod crypto;
/// Multi-boot runner and target loading.
pub mod runner;
/// Anti-rollback version counter tests.
pub mod version_counters;

pub use runner::{load_target, run_to_completion, RunSummary, RunnerError};

/// Reasons the pool cannot be assembled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PoolError {
    /// A test module built an incomplete descriptor.
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
    /// Two test modules claim the same identity.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Builds the registry of every test in the pool.
///
/// # Errors
///
/// Returns [`PoolError`] when a descriptor is incomplete or an identity is
/// registered twice.
pub fn registry() -> Result<TestRegistry, PoolError> {
    Ok(TestRegistry::builder()
        .register(base::b007::descriptor()?)
        .register(crypto::c003::descriptor()?)
        .register(version_counters::v001::descriptor()?)
        .build()?)
}

#[cfg(test)]
mod tests {
    use val_core::{Category, TestId};

    use super::registry;

    #[test]
    fn pool_registers_each_test_once_in_dispatch_order() {
        let registry = registry().expect("pool registry");
        let ids: Vec<String> = registry.iter().map(|test| test.id().to_string()).collect();
        assert_eq!(ids, ["b007", "c003", "v001"]);
        assert!(registry
            .find(TestId::new(Category::Crypto, 3))
            .is_some_and(|test| test.ref_tag() == "R220/R240_TBSA_KEY"));
    }
}
