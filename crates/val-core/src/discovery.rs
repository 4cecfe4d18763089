//! Index-based resource discovery.
//!
//! Targets declare an arbitrary number of instances per resource class. A
//! test walks instances `0, 1, 2, ...` and stops once a descriptor matches or
//! the instance count reported by the most recently fetched descriptor is
//! reached. The bound is taken from each fetch, never cached up front.

use std::marker::PhantomData;

use crate::{
    ConfigId, MemoryDescriptor, MemoryType, MiscDescriptor, ResourceClass, ResourceDescriptor,
    Val, ValError, ValResult,
};

/// Walks the instances of one resource class.
#[derive(Debug, Clone, Copy)]
pub struct InstanceCursor<D> {
    class: ResourceClass,
    next: u16,
    bound: Option<u32>,
    done: bool,
    kind: PhantomData<D>,
}

impl<D: ResourceDescriptor> InstanceCursor<D> {
    /// Starts before instance 0 of `class`.
    #[must_use]
    pub const fn new(class: ResourceClass) -> Self {
        Self {
            class,
            next: 0,
            bound: None,
            done: false,
            kind: PhantomData,
        }
    }

    /// Fetches the next instance.
    ///
    /// Returns `None` once the last fetched descriptor's instance count has
    /// been reached. Instance 0 is always fetched, so a class the target does
    /// not declare yields one `Err(NotFound)`. A descriptor of the wrong kind
    /// yields `Err(Invalid)`. The cursor stops after any error.
    pub fn advance(&mut self, val: &dyn Val) -> Option<ValResult<(u16, D)>> {
        if self.done || self.is_last() {
            return None;
        }
        let instance = self.next;
        let fetched = val
            .target_get_config(ConfigId::new(self.class, instance))
            .and_then(|descriptor| D::from_descriptor(descriptor).ok_or(ValError::Invalid));
        match fetched {
            Ok(descriptor) => {
                self.bound = Some(descriptor.header().instance_count);
                match instance.checked_add(1) {
                    Some(next) => self.next = next,
                    None => self.done = true,
                }
                Some(Ok((instance, descriptor)))
            }
            Err(status) => {
                self.done = true;
                Some(Err(status))
            }
        }
    }

    /// Returns `true` when the instance just fetched was the last one.
    #[must_use]
    pub fn is_last(&self) -> bool {
        self.bound.is_some_and(|bound| u32::from(self.next) >= bound)
    }

    /// Number of instances fetched so far.
    #[must_use]
    pub const fn fetched(&self) -> u16 {
        self.next
    }
}

/// Outcome of a predicate scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discovery<D> {
    /// A descriptor satisfied the predicate.
    Found {
        /// Instance number.
        instance: u16,
        /// Matching descriptor.
        descriptor: D,
    },
    /// Every declared instance was inspected without a match.
    Exhausted {
        /// Number of instances inspected.
        scanned: u16,
    },
}

impl<D> Discovery<D> {
    /// Matching descriptor, if any.
    #[must_use]
    pub fn found(self) -> Option<D> {
        match self {
            Self::Found { descriptor, .. } => Some(descriptor),
            Self::Exhausted { .. } => None,
        }
    }
}

/// Scans `class` for the first descriptor satisfying `predicate`.
///
/// # Errors
///
/// Returns [`ValError::NotFound`] when the target declares no instance of
/// `class` at all, or any other status a fetch fails with. Running out of
/// instances without a match is [`Discovery::Exhausted`], not an error.
pub fn scan<D: ResourceDescriptor>(
    val: &dyn Val,
    class: ResourceClass,
    mut predicate: impl FnMut(&D) -> bool,
) -> ValResult<Discovery<D>> {
    let mut cursor = InstanceCursor::<D>::new(class);
    while let Some(fetched) = cursor.advance(val) {
        let (instance, descriptor) = fetched?;
        if predicate(&descriptor) {
            return Ok(Discovery::Found {
                instance,
                descriptor,
            });
        }
    }
    Ok(Discovery::Exhausted {
        scanned: cursor.fetched(),
    })
}

/// Fetches one memory region by type and instance.
///
/// # Errors
///
/// Returns [`ValError::NotFound`] for an undeclared instance.
pub fn memory(val: &dyn Val, kind: MemoryType, instance: u16) -> ValResult<MemoryDescriptor> {
    fetch(val, ResourceClass::Memory(kind), instance)
}

/// Fetches one version counter descriptor.
///
/// # Errors
///
/// Returns [`ValError::NotFound`] for an undeclared instance.
pub fn counter(val: &dyn Val, instance: u16) -> ValResult<MiscDescriptor> {
    fetch(val, ResourceClass::VERSION_COUNTER, instance)
}

fn fetch<D: ResourceDescriptor>(
    val: &dyn Val,
    class: ResourceClass,
    instance: u16,
) -> ValResult<D> {
    let descriptor = val.target_get_config(ConfigId::new(class, instance))?;
    D::from_descriptor(descriptor).ok_or(ValError::Invalid)
}
