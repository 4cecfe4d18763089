//! `v001`: firmware version counters are monotonic, bounded and persistent.
//!
//! First boot: every declared counter is checked against its class floor,
//! incremented, refused a rollback, driven to its maximum and refused one
//! step beyond it. A non-secure update of the last trusted counter is then
//! provoked with configurable faults suspended, which halts the device.
//!
//! Second boot: fault control is restored from the continuation record and
//! every counter must still read its maximum.

use val_core::{
    Abort, Category, ContinuationRecord, CryptoBase, DescriptorError, Exception, FwVersionClass,
    HookResult, InstanceCursor, MiscDescriptor, PayloadExit, PayloadResult, PendingResume,
    PrintLevel, ResourceClass, ResumePoint, TestContext, TestDescriptor, TestId, ValError, World,
    FAULT_ENABLE_MASK,
};

/// Identity of this test.
pub const ID: TestId = TestId::new(Category::VersionCounters, 1);

/// Builds the descriptor.
///
/// # Errors
///
/// Returns [`DescriptorError`] when a required field is missing.
pub fn descriptor() -> Result<TestDescriptor<()>, DescriptorError> {
    TestDescriptor::<()>::builder(ID)
        .title("Check version counter functionality")
        .ref_tag("R010/R020/R030/R040/R050/R060_TBSA_COUNT")
        .payload(payload)
        .exit(exit)
        .build()
}

fn payload(ctx: &mut TestContext<'_>, _state: &mut ()) -> PayloadResult {
    ctx.call(|val| val.crypto_set_base_addr(CryptoBase::SecureProgrammable))?;
    let record = ContinuationRecord::locate(ctx)?;
    match record.resume_point(ctx)? {
        ResumePoint::FirstPass(record) => first_boot(ctx, record),
        ResumePoint::Resumed(pending) => after_reset(ctx, pending),
    }
}

fn first_boot(ctx: &mut TestContext<'_>, record: ContinuationRecord) -> PayloadResult {
    let mut cursor = InstanceCursor::<MiscDescriptor>::new(ResourceClass::VERSION_COUNTER);
    let mut last_trusted = None;
    while let Some(fetched) = cursor.advance(ctx.val()) {
        let (instance, counter) = ctx.check(fetched)?;
        exercise(ctx, instance, &counter)?;
        if counter.fw_ver_type == FwVersionClass::Trusted {
            last_trusted = Some((instance, counter));
        }
    }

    let Some((instance, counter)) = last_trusted else {
        log::info!(target: "val", "{ID}: no trusted counter, reset phase skipped");
        return Ok(PayloadExit::Returned);
    };

    let suspended = record.arm(ctx)?.suspend_faults(ctx, FAULT_ENABLE_MASK)?;
    ctx.call(|val| val.crypto_set_base_addr(CryptoBase::SecureProgrammable))?;
    suspended.provoke(ctx, |val| {
        val.firmware_version_update(
            World::NonSecure,
            u32::from(instance),
            counter.fw_ver_type,
            counter.fw_ver_cnt_max,
        )
    })
}

/// Runs the anti-rollback sequence on one counter from the secure world.
fn exercise(
    ctx: &mut TestContext<'_>,
    instance: u16,
    counter: &MiscDescriptor,
) -> Result<(), Abort> {
    let class = counter.fw_ver_type;
    let max = counter.fw_ver_cnt_max;
    let instance = u32::from(instance);

    let floor = counter.check_floor();
    if floor.is_err() {
        ctx.print(
            PrintLevel::Debug,
            format_args!("{class:?} firmware version counter max should be >= {}", class.min_max()),
        );
    }
    ctx.check(floor)?;

    let current = ctx.val().firmware_version_read(instance, class);
    let next = current.saturating_add(1);
    ctx.call(|val| val.firmware_version_update(World::Secure, instance, class, next))?;

    let rollback = ctx
        .val()
        .firmware_version_update(World::Secure, instance, class, current);
    ctx.check_rejected(rollback)?;

    let to_max = ctx
        .val()
        .firmware_version_update(World::Secure, instance, class, max);
    ctx.check_accepted(to_max)?;

    if let Some(beyond) = max.checked_add(1) {
        let overflow = ctx
            .val()
            .firmware_version_update(World::Secure, instance, class, beyond);
        ctx.check_rejected(overflow)?;
    }

    if ctx.val().firmware_version_read(instance, class) != max {
        return Err(ctx.fail(ValError::Invalid));
    }
    Ok(())
}

fn after_reset(ctx: &mut TestContext<'_>, pending: PendingResume) -> PayloadResult {
    pending.restore(ctx)?;

    let mut cursor = InstanceCursor::<MiscDescriptor>::new(ResourceClass::VERSION_COUNTER);
    while let Some(fetched) = cursor.advance(ctx.val()) {
        let (instance, counter) = ctx.check(fetched)?;
        let value = ctx
            .val()
            .firmware_version_read(u32::from(instance), counter.fw_ver_type);
        if value != counter.fw_ver_cnt_max {
            log::error!(
                target: "val",
                "{ID}: counter {instance} reads {value} after reset, expected {}",
                counter.fw_ver_cnt_max
            );
            return Err(ctx.fail(ValError::Invalid));
        }
    }
    Ok(PayloadExit::Returned)
}

fn exit(ctx: &mut TestContext<'_>, _state: &mut ()) -> HookResult {
    ctx.call(|val| val.interrupt_restore_handler(Exception::HardFault))
}
