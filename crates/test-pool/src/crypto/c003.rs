//! `c003`: the hardware unique key must be readable only by trusted code.
//!
//! The key is read once through the secure path and once through the
//! non-secure path. A recovering SecureFault handler is installed for the
//! duration of the test so the non-secure read returns instead of halting
//! the device. Any key word visible to the non-secure read is a violation.
//!
//! The recovered read leaves its buffer zeroed, so an all-zero non-secure
//! read counts as blocked and key words that are genuinely zero are not
//! compared against it. A key made only of zero words cannot be told apart
//! from a blocked read; that case passes with a warning.

use val_core::{
    Category, CryptoBase, DescriptorError, Exception, FuseState, HandlerPolicy, HookResult,
    KeyType, PayloadExit, PayloadResult, PrintLevel, TestContext, TestDescriptor, TestId,
    ValError, World,
};

/// Identity of this test.
pub const ID: TestId = TestId::new(Category::Crypto, 3);

/// SKIP reason when the key fuses are not open.
pub const SKIP_HUK_NOT_OPEN: u32 = 1;

/// Builds the descriptor.
///
/// # Errors
///
/// Returns [`DescriptorError`] when a required field is missing.
pub fn descriptor() -> Result<TestDescriptor<()>, DescriptorError> {
    TestDescriptor::<()>::builder(ID)
        .title("HUK should be in Confidential-Lockable-Bulk fuses, accessible only to TW")
        .ref_tag("R220/R240_TBSA_KEY")
        .entry(entry)
        .payload(payload)
        .exit(exit)
        .build()
}

fn entry(ctx: &mut TestContext<'_>, _state: &mut ()) -> HookResult {
    ctx.initialize()?;
    ctx.call(|val| {
        val.interrupt_install_handler(Exception::SecureFault, HandlerPolicy::Recover)
    })?;
    ctx.pass()
}

fn payload(ctx: &mut TestContext<'_>, _state: &mut ()) -> PayloadResult {
    ctx.call(|val| val.crypto_set_base_addr(CryptoBase::SecureProgrammable))?;
    let huk = ctx.call(|val| val.crypto_get_key_info(KeyType::Huk, 0))?;

    if !huk.state.contains(FuseState::OPEN) {
        ctx.print(PrintLevel::Info, format_args!("HUK is not open"));
        ctx.skip(SKIP_HUK_NOT_OPEN)?;
        return Ok(PayloadExit::Returned);
    }

    let Ok(words) = usize::try_from(huk.size) else {
        return Err(ctx.fail(ValError::InvalidArgs));
    };
    let mut trusted = vec![0_u32; words];
    let mut untrusted = vec![0_u32; words];

    ctx.call(|val| val.fuse_read(World::Secure, huk.addr, &mut trusted))?;
    ctx.call(|val| val.crypto_set_base_addr(CryptoBase::SecureProgrammable))?;
    ctx.call(|val| val.fuse_read(World::NonSecure, huk.addr, &mut untrusted))?;

    if untrusted.iter().all(|word| *word == 0) {
        if trusted.iter().all(|word| *word == 0) {
            ctx.print(
                PrintLevel::Warn,
                format_args!("HUK reads as zero, non-secure exposure cannot be ruled out"),
            );
        }
        return Ok(PayloadExit::Returned);
    }
    if trusted.iter().zip(&untrusted).any(|(a, b)| a == b) {
        ctx.print(
            PrintLevel::Error,
            format_args!("HUK was accessible by non-Trusted code"),
        );
        return Err(ctx.fail(ValError::Error));
    }
    Ok(PayloadExit::Returned)
}

fn exit(ctx: &mut TestContext<'_>, _state: &mut ()) -> HookResult {
    ctx.call(|val| val.interrupt_restore_handler(Exception::SecureFault))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use val_core::{
        dispatch, Checkpoint, FuseState, LifecycleState, SimTarget, TargetConfig, TestResult,
        ValError,
    };

    use super::{descriptor, SKIP_HUK_NOT_OPEN};

    fn run(config: &TargetConfig) -> (val_core::TestReport, SimTarget) {
        let mut target = SimTarget::new(config).expect("valid target");
        let report = dispatch(&descriptor().expect("descriptor"), &mut target, config.scratch);
        (report, target)
    }

    #[test]
    fn trusted_only_key_passes_and_leaves_the_device_running() {
        let (report, target) = run(&TargetConfig::default());
        assert_eq!(report.result, TestResult::Pass(0));
        assert_eq!(report.final_state(), LifecycleState::Complete);
        // The exit hook's handler restore is the last checkpoint.
        assert_eq!(report.last_checkpoint, Checkpoint::new(8));
        assert_eq!(target.fuse_reads(), 2);
        assert!(!target.reset_pending());
    }

    #[test]
    fn key_readable_from_non_secure_fails_at_the_comparison() {
        let mut config = TargetConfig::default();
        config.keys[0].trusted_only = false;
        let (report, _) = run(&config);

        let TestResult::Fail {
            checkpoint, status, ..
        } = report.result
        else {
            panic!("expected failure, got {}", report.result);
        };
        assert_eq!(checkpoint, Checkpoint::new(8));
        assert_eq!(status, ValError::Error);
        assert_eq!(report.final_state(), LifecycleState::Complete);
    }

    #[test]
    fn zero_key_words_do_not_match_a_blocked_read() {
        let mut config = TargetConfig::default();
        config.keys[0].material[0] = 0;
        config.keys[0].material[5] = 0;
        let (report, target) = run(&config);
        assert_eq!(report.result, TestResult::Pass(0));
        assert_eq!(target.fuse_reads(), 2);
    }

    #[test]
    fn exposed_key_with_zero_words_still_fails() {
        let mut config = TargetConfig::default();
        config.keys[0].material[0] = 0;
        config.keys[0].trusted_only = false;
        let (report, _) = run(&config);
        assert!(matches!(
            report.result,
            TestResult::Fail {
                status: ValError::Error,
                ..
            }
        ));
    }

    #[rstest]
    #[case(FuseState::LOCKABLE | FuseState::CONFIDENTIAL | FuseState::BULK)]
    #[case(FuseState::LOCKED)]
    #[case(FuseState::empty())]
    fn key_not_open_is_skipped_without_reading_fuses(#[case] state: FuseState) {
        let mut config = TargetConfig::default();
        config.keys[0].state = state;
        let (report, target) = run(&config);
        assert_eq!(report.result, TestResult::Skip(SKIP_HUK_NOT_OPEN));
        assert_eq!(target.fuse_reads(), 0);
    }

    #[test]
    fn missing_key_fails_not_found() {
        let mut config = TargetConfig::default();
        config.keys.clear();
        let (report, _) = run(&config);
        assert!(matches!(
            report.result,
            TestResult::Fail {
                status: ValError::NotFound,
                ..
            }
        ));
    }
}
