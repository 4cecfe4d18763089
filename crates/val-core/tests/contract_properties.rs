//! Property coverage for the counter, discovery and checkpoint contracts.

use proptest::prelude::*;
use rstest::rstest;
use val_core::{
    Category, Checkpoint, CheckpointEngine, ConfigId, Descriptor, FwVersionClass, MemAttribute,
    MemoryDescriptor, MemoryRegionConfig, MemoryType, ResourceClass, ScratchRegion, SimTarget,
    TargetConfig, Terminal, TestId, TestResult, Val, ValError, VersionCounter,
};

#[cfg(feature = "serde")]
use serde as _;
use bitflags as _;
use log as _;
use thiserror as _;

fn sram_target(lengths: &[u32]) -> TargetConfig {
    let mut memory: Vec<MemoryRegionConfig> = lengths
        .iter()
        .enumerate()
        .map(|(index, len)| {
            let start = 0x2000_0000 + u32::try_from(index).expect("small index") * 0x1_0000;
            MemoryRegionConfig {
                kind: MemoryType::Sram,
                start,
                end: start + len,
                attribute: if index % 2 == 0 {
                    MemAttribute::Secure
                } else {
                    MemAttribute::Unused
                },
            }
        })
        .collect();
    memory.push(MemoryRegionConfig {
        kind: MemoryType::Nvram,
        start: 0x5000_0000,
        end: 0x5000_0100,
        attribute: MemAttribute::Secure,
    });
    TargetConfig {
        memory,
        scratch: ScratchRegion {
            start: 0x2000_0000,
            end: 0x2000_0004,
        },
        ..TargetConfig::default()
    }
}

proptest! {
    #[test]
    fn update_succeeds_iff_between_current_and_max(
        initial in 0_u32..300,
        max in 63_u32..300,
        value in 0_u32..400,
    ) {
        let mut counter = VersionCounter::new(initial, max);
        let current = counter.read();
        let accepted = counter.update(value).is_ok();
        prop_assert_eq!(accepted, current <= value && value <= max);
        prop_assert_eq!(counter.read(), if accepted { value } else { current });
    }

    #[test]
    fn no_update_sequence_lowers_the_counter(
        max in 63_u32..300,
        attempts in proptest::collection::vec(0_u32..400, 1..40),
    ) {
        let mut counter = VersionCounter::new(0, max);
        let mut highest = 0;
        for value in attempts {
            if counter.update(value).is_ok() {
                highest = value;
            }
            prop_assert!(counter.read() >= highest);
            prop_assert!(counter.read() <= max);
        }
    }

    #[test]
    fn frozen_counter_rejects_everything_above_max(max in 63_u32..300, above in 1_u32..1000) {
        let mut counter = VersionCounter::new(0, max);
        prop_assert!(counter.update(max).is_ok());
        prop_assert_eq!(counter.update(max.saturating_add(above)), Err(ValError::IncorrectValue));
        prop_assert_eq!(counter.read(), max);
        prop_assert!(counter.is_frozen());
    }

    #[test]
    fn declared_instances_are_distinct_and_bounded(
        lengths in proptest::collection::vec(4_u32..0x1000, 1..8),
    ) {
        let target = SimTarget::new(&sram_target(&lengths)).expect("valid target");
        let class = ResourceClass::Memory(MemoryType::Sram);
        let count = u16::try_from(lengths.len()).expect("small count");

        let mut seen: Vec<MemoryDescriptor> = Vec::new();
        for instance in 0..count {
            let Ok(Descriptor::Memory(region)) = target.target_get_config(ConfigId::new(class, instance)) else {
                return Err(TestCaseError::fail(format!("instance {instance} missing")));
            };
            prop_assert_eq!(region.header.instance_count, u32::from(count));
            prop_assert!(seen.iter().all(|prior| !prior.overlaps(&region)));
            seen.push(region);
        }
        prop_assert_eq!(
            target.target_get_config(ConfigId::new(class, count)),
            Err(ValError::NotFound)
        );
    }

    #[test]
    fn engine_keeps_the_first_failure(
        statuses in proptest::collection::vec(prop_oneof![
            Just(Ok(())),
            Just(Err(ValError::NotFound)),
            Just(Err(ValError::Invalid)),
        ], 1..30),
    ) {
        let mut engine = CheckpointEngine::new(TestId::new(Category::Base, 1));
        for status in &statuses {
            let _ = engine.report(*status);
        }
        let first_failure = statuses.iter().position(Result::is_err);
        match (first_failure, engine.result()) {
            (None, TestResult::Pending) => {}
            (Some(index), TestResult::Fail { checkpoint, status, .. }) => {
                let expected = u32::try_from(index + 1).expect("small index");
                prop_assert_eq!(checkpoint, Checkpoint::new(expected));
                prop_assert_eq!(Err(status), statuses[index]);
                prop_assert!(engine.set_result(Terminal::Pass(0)).is_err());
            }
            (expected, actual) => {
                return Err(TestCaseError::fail(format!("{expected:?} vs {actual:?}")));
            }
        }
    }
}

#[rstest]
#[case(FwVersionClass::Trusted, 63)]
#[case(FwVersionClass::NonTrusted, 255)]
fn reference_scenario_freezes_each_class_at_its_floor(
    #[case] class: FwVersionClass,
    #[case] max: u32,
) {
    assert_eq!(class.min_max(), max);
    let mut counter = VersionCounter::new(0, max);
    counter.update(1).expect("increment");
    assert_eq!(counter.update(0), Err(ValError::Invalid));
    counter.update(max).expect("set to max");
    assert_eq!(counter.update(max + 1), Err(ValError::IncorrectValue));
    assert_eq!(counter.read(), max);
}
