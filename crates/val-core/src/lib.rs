//! Validation abstraction layer for TBSA-v8M conformance tests.
//!
//! Tests are written against the [`Val`] capability interface and report
//! every observed status through a [`TestContext`]. The dispatcher runs each
//! registered test through its entry, payload and exit hooks; tests that must
//! provoke a reset carry their progress across it in the NVRAM continuation
//! record. [`SimTarget`] is an in-memory target implementing [`Val`].

/// Status taxonomy and stable status codes.
pub mod status;
pub use status::{Status, ValError, ValResult};

/// Fault-control vocabulary.
pub mod fault;
pub use fault::{
    CryptoBase, Exception, HandlerPolicy, World, FAULT_CONTROL_REGISTER, FAULT_ENABLE_MASK,
};

/// Resource descriptor model.
pub mod descriptor;
pub use descriptor::{
    ConfigHeader, ConfigId, Descriptor, FuseState, FwVersionClass, Group, KeyDescriptor, KeyType,
    MemAttribute, MemoryDescriptor, MemoryType, MiscDescriptor, MiscType, ResourceClass,
    ResourceDescriptor, ScratchRegion,
};

/// Anti-rollback version counter contract.
pub mod counter;
pub use counter::VersionCounter;

/// Target description.
pub mod config;
pub use config::{
    ConfigError, CounterConfig, KeyConfig, MemoryRegionConfig, TargetConfig,
    DEFAULT_BOOT_FAULT_CONTROL,
};

/// Descriptor catalogue.
pub mod store;
pub use store::DescriptorStore;

/// Capability interface.
pub mod val;
pub use val::{PrintLevel, Val};

/// Persisted continuation record layout.
pub mod nvram;
pub use nvram::{NvField, NvramWindow, NV_RECORD_BYTES, NV_WORD_BYTES};

/// Checkpoint/result engine.
pub mod checkpoint;
pub use checkpoint::{Abort, Checkpoint, CheckpointEngine, ProtocolViolation, Terminal, TestResult};

/// Per-execution test context.
pub mod context;
pub use context::TestContext;

/// Index-based resource discovery.
pub mod discovery;
pub use discovery::{Discovery, InstanceCursor};

/// Cross-reset continuation state machine.
pub mod continuation;
pub use continuation::{
    Armed, BootIntent, ContinuationRecord, FaultsSuspended, PendingResume, ResumePoint,
};

/// Test descriptors and registry.
pub mod registry;
pub use registry::{
    default_entry, default_exit, Category, DescriptorError, EntryHook, ExitHook, HookResult,
    PayloadExit, PayloadHook, PayloadResult, RegisteredTest, RegistryError, TestDescriptor,
    TestDescriptorBuilder, TestId, TestRegistry, TestRegistryBuilder,
};

/// Test lifecycle dispatcher.
pub mod dispatch;
pub use dispatch::{dispatch, LifecycleState, LifecycleTrace, TestReport};

/// Multi-boot session runner.
pub mod session;
pub use session::{BootOutcome, Session, SessionError, Tally};

/// Simulated reference target.
pub mod sim;
pub use sim::SimTarget;

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
