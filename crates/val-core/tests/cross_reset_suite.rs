//! Session and continuation behavior across simulated device resets.

use val_core::{
    Category, ContinuationRecord, FwVersionClass, HookResult, LifecycleState, PayloadExit,
    PayloadResult, ResumePoint, Session, SimTarget, TargetConfig, TestContext, TestDescriptor,
    TestId, TestRegistry, TestResult, ValError, World, FAULT_CONTROL_REGISTER, FAULT_ENABLE_MASK,
};

#[cfg(feature = "serde")]
use serde as _;
use bitflags as _;
use log as _;
use proptest as _;
use rstest as _;
use thiserror as _;

const TRUSTED_COUNTER: u32 = 1;

#[derive(Default)]
struct ProbeState {
    resumed: bool,
}

fn provoking_payload(ctx: &mut TestContext<'_>, state: &mut ProbeState) -> PayloadResult {
    let record = ContinuationRecord::locate(ctx)?;
    match record.resume_point(ctx)? {
        ResumePoint::FirstPass(record) => {
            let suspended = record.arm(ctx)?.suspend_faults(ctx, FAULT_ENABLE_MASK)?;
            suspended.provoke(ctx, |val| {
                val.firmware_version_update(
                    World::NonSecure,
                    TRUSTED_COUNTER,
                    FwVersionClass::Trusted,
                    9,
                )
            })
        }
        ResumePoint::Resumed(pending) => {
            state.resumed = true;
            pending.restore(ctx)?;
            let value = ctx
                .val()
                .firmware_version_read(TRUSTED_COUNTER, FwVersionClass::Trusted);
            if value != 0 {
                return Err(ctx.fail(ValError::Invalid));
            }
            Ok(PayloadExit::Returned)
        }
    }
}

fn resumed_only_exit(ctx: &mut TestContext<'_>, state: &mut ProbeState) -> HookResult {
    if state.resumed {
        Ok(())
    } else {
        Err(ctx.fail(ValError::Error))
    }
}

#[allow(clippy::unnecessary_wraps)]
fn trivial_payload(_ctx: &mut TestContext<'_>, _state: &mut ()) -> PayloadResult {
    Ok(PayloadExit::Returned)
}

fn registry() -> TestRegistry {
    TestRegistry::builder()
        .register(
            TestDescriptor::<()>::builder(TestId::new(Category::Base, 1))
                .title("before")
                .ref_tag("R000")
                .payload(trivial_payload)
                .build()
                .expect("descriptor"),
        )
        .register(
            TestDescriptor::<ProbeState>::builder(TestId::new(Category::VersionCounters, 90))
                .title("provoking member")
                .ref_tag("R000")
                .payload(provoking_payload)
                .exit(resumed_only_exit)
                .build()
                .expect("descriptor"),
        )
        .register(
            TestDescriptor::<()>::builder(TestId::new(Category::Base, 2))
                .title("after")
                .ref_tag("R000")
                .payload(trivial_payload)
                .build()
                .expect("descriptor"),
        )
        .build()
        .expect("registry")
}

#[test]
fn provoked_reset_splits_the_session_over_two_boots() {
    let registry = registry();
    let config = TargetConfig::default();
    let mut target = SimTarget::new(&config).expect("reference target");
    let session = Session::new(&registry, config.scratch);

    let first = session.run_boot(&mut target).expect("first boot");
    assert!(!first.is_complete());
    assert_eq!(first.reports.len(), 2);
    assert_eq!(first.reports[1].final_state(), LifecycleState::AwaitingExternalReset);
    assert_eq!(first.tally.passed, 1);
    assert!(target.reset_pending());
    assert_eq!(target.register(FAULT_CONTROL_REGISTER), 0);

    target.reset();
    let second = session.run_boot(&mut target).expect("second boot");
    assert!(second.is_complete());
    assert_eq!(second.resumed_at, Some(1));
    assert_eq!(second.reports.len(), 2);
    assert_eq!(second.reports[0].result, TestResult::Pass(0));
    assert_eq!(second.tally.passed, 3);
    assert!(second.tally.is_clean());
    assert_eq!(target.register(FAULT_CONTROL_REGISTER), FAULT_ENABLE_MASK);
    assert_eq!(target.counter_value(TRUSTED_COUNTER), Some(0));
}

#[test]
fn later_unrelated_reset_starts_a_fresh_session() {
    let registry = registry();
    let config = TargetConfig::default();
    let mut target = SimTarget::new(&config).expect("reference target");
    let session = Session::new(&registry, config.scratch);

    session.run_boot(&mut target).expect("first boot");
    target.reset();
    session.run_boot(&mut target).expect("second boot");

    // A later unrelated reset finds the tag cleared and the session idle.
    target.reset();
    let third = session.run_boot(&mut target).expect("third boot");
    assert_eq!(third.resumed_at, None);
    assert_eq!(third.reports.len(), 2);
    assert!(!third.is_complete());
    assert_eq!(third.reports[1].final_state(), LifecycleState::AwaitingExternalReset);
}
