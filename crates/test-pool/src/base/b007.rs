//! `b007`: locate an SRAM block no firmware uses and fill it.
//!
//! SRAM instances are scanned in order until one is attributed
//! [`MemAttribute::Unused`]; that block is filled with [`PATTERN`]. A target
//! without such a block fails with `NOT_FOUND`.

use val_core::discovery::{self, Discovery};
use val_core::{
    Category, DescriptorError, HookResult, MemAttribute, MemoryDescriptor, MemoryType,
    PayloadExit, PayloadResult, ResourceClass, TestContext, TestDescriptor, TestId, ValError,
};

/// Identity of this test.
pub const ID: TestId = TestId::new(Category::Base, 7);

/// Word written across the free block.
pub const PATTERN: u32 = 0xC0DE_CAFE;

/// Builds the descriptor.
///
/// # Errors
///
/// Returns [`DescriptorError`] when a required field is missing.
pub fn descriptor() -> Result<TestDescriptor<()>, DescriptorError> {
    TestDescriptor::<()>::builder(ID)
        .title("Check only all Secure or all Non-secure transactions to any one region")
        .ref_tag("R050_TBSA_INFRA")
        .entry(entry)
        .payload(payload)
        .build()
}

fn entry(ctx: &mut TestContext<'_>, _state: &mut ()) -> HookResult {
    ctx.pass()
}

fn payload(ctx: &mut TestContext<'_>, _state: &mut ()) -> PayloadResult {
    let class = ResourceClass::Memory(MemoryType::Sram);
    let scanned = ctx.call(|val| {
        discovery::scan::<MemoryDescriptor>(&*val, class, |region| {
            region.attribute == MemAttribute::Unused
        })
    })?;

    match scanned {
        Discovery::Found {
            instance,
            descriptor: region,
        } => {
            log::debug!(
                target: "val",
                "{ID}: SRAM instance {instance} (config {:#010x}) unused at {:#010x}..{:#010x}",
                region.header.id.as_u32(),
                region.start,
                region.end
            );
            ctx.call(|val| val.memory_fill(region.start, region.len(), PATTERN))?;
            Ok(PayloadExit::Returned)
        }
        Discovery::Exhausted { scanned } => {
            log::debug!(target: "val", "{ID}: none of {scanned} SRAM instances is unused");
            Err(ctx.fail(ValError::NotFound))
        }
    }
}
