//! Test identities, descriptors and the explicit test registry.
//!
//! Each test module builds one [`TestDescriptor`] with
//! [`TestDescriptor::builder`]. The pool collects them into a
//! [`TestRegistry`] once at startup; the dispatcher only borrows them.

use std::fmt;

use thiserror::Error;

use crate::dispatch::LifecycleTrace;
use crate::{Abort, TestContext};

/// Test category; the first half of a test identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Category {
    /// Base infrastructure and memory isolation.
    Base = 0,
    /// Keys and crypto.
    Crypto = 1,
    /// Anti-rollback version counters.
    VersionCounters = 2,
}

impl Category {
    /// Letter prefix used in test names.
    #[must_use]
    pub const fn prefix(self) -> char {
        match self {
            Self::Base => 'b',
            Self::Crypto => 'c',
            Self::VersionCounters => 'v',
        }
    }
}

/// Two-part test identity, displayed as e.g. `b007`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TestId {
    /// Category.
    pub category: Category,
    /// Number within the category.
    pub number: u16,
}

impl TestId {
    /// Creates a test identity.
    #[must_use]
    pub const fn new(category: Category, number: u16) -> Self {
        Self { category, number }
    }
}

impl fmt::Display for TestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:03}", self.category.prefix(), self.number)
    }
}

/// Outcome of an entry or exit hook.
pub type HookResult = Result<(), Abort>;

/// How a payload handed control back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadExit {
    /// The payload returned normally.
    Returned,
    /// The payload deliberately raised a fault; only a reset continues it.
    AwaitingExternalReset,
}

/// Outcome of a payload.
pub type PayloadResult = Result<PayloadExit, Abort>;

/// Entry hook signature.
pub type EntryHook<S> = fn(&mut TestContext<'_>, &mut S) -> HookResult;
/// Payload signature.
pub type PayloadHook<S> = fn(&mut TestContext<'_>, &mut S) -> PayloadResult;
/// Exit hook signature.
pub type ExitHook<S> = fn(&mut TestContext<'_>, &mut S) -> HookResult;

/// Zeroes the scratch window and optimistically sets PASS.
///
/// # Errors
///
/// Returns [`Abort`] when the scratch window cannot be zeroed.
pub fn default_entry<S>(ctx: &mut TestContext<'_>, _state: &mut S) -> HookResult {
    ctx.initialize()?;
    ctx.pass()
}

/// Exit hook with nothing to restore.
///
/// # Errors
///
/// Never fails.
#[allow(clippy::missing_const_for_fn, clippy::unnecessary_wraps)]
pub fn default_exit<S>(_ctx: &mut TestContext<'_>, _state: &mut S) -> HookResult {
    Ok(())
}

/// Immutable description of one test.
///
/// `S` is the test-local state created fresh for every execution and passed
/// to all three hooks.
pub struct TestDescriptor<S> {
    id: TestId,
    title: &'static str,
    ref_tag: &'static str,
    entry: EntryHook<S>,
    payload: PayloadHook<S>,
    exit: ExitHook<S>,
}

impl<S> fmt::Debug for TestDescriptor<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestDescriptor")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("ref_tag", &self.ref_tag)
            .finish_non_exhaustive()
    }
}

impl<S: Default> TestDescriptor<S> {
    /// Starts building the descriptor of `id`.
    #[must_use]
    pub const fn builder(id: TestId) -> TestDescriptorBuilder<S> {
        TestDescriptorBuilder {
            id,
            title: None,
            ref_tag: None,
            entry: None,
            payload: None,
            exit: None,
        }
    }
}

impl<S> TestDescriptor<S> {
    /// Test identity.
    #[must_use]
    pub const fn id(&self) -> TestId {
        self.id
    }

    /// Display title.
    #[must_use]
    pub const fn title(&self) -> &'static str {
        self.title
    }

    /// Requirement reference tag.
    #[must_use]
    pub const fn ref_tag(&self) -> &'static str {
        self.ref_tag
    }
}

/// Reasons a descriptor cannot be built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DescriptorError {
    /// No title was given.
    #[error("{0}: missing title")]
    MissingTitle(TestId),
    /// No requirement reference was given.
    #[error("{0}: missing requirement reference")]
    MissingRefTag(TestId),
    /// No payload was given.
    #[error("{0}: missing payload")]
    MissingPayload(TestId),
}

/// Builder for [`TestDescriptor`].
#[must_use]
pub struct TestDescriptorBuilder<S> {
    id: TestId,
    title: Option<&'static str>,
    ref_tag: Option<&'static str>,
    entry: Option<EntryHook<S>>,
    payload: Option<PayloadHook<S>>,
    exit: Option<ExitHook<S>>,
}

impl<S> fmt::Debug for TestDescriptorBuilder<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestDescriptorBuilder")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("ref_tag", &self.ref_tag)
            .finish_non_exhaustive()
    }
}

impl<S: Default> TestDescriptorBuilder<S> {
    /// Sets the display title.
    pub const fn title(mut self, title: &'static str) -> Self {
        self.title = Some(title);
        self
    }

    /// Sets the requirement reference tag.
    pub const fn ref_tag(mut self, ref_tag: &'static str) -> Self {
        self.ref_tag = Some(ref_tag);
        self
    }

    /// Replaces [`default_entry`].
    pub const fn entry(mut self, entry: EntryHook<S>) -> Self {
        self.entry = Some(entry);
        self
    }

    /// Sets the payload.
    pub const fn payload(mut self, payload: PayloadHook<S>) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Replaces [`default_exit`].
    pub const fn exit(mut self, exit: ExitHook<S>) -> Self {
        self.exit = Some(exit);
        self
    }

    /// Finishes the descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError`] when the title, reference tag or payload
    /// is missing.
    pub fn build(self) -> Result<TestDescriptor<S>, DescriptorError> {
        let id = self.id;
        Ok(TestDescriptor {
            id,
            title: self.title.ok_or(DescriptorError::MissingTitle(id))?,
            ref_tag: self.ref_tag.ok_or(DescriptorError::MissingRefTag(id))?,
            entry: self.entry.unwrap_or(default_entry::<S>),
            payload: self.payload.ok_or(DescriptorError::MissingPayload(id))?,
            exit: self.exit.unwrap_or(default_exit::<S>),
        })
    }
}

/// Object-safe view of a descriptor, independent of its state type.
pub trait RegisteredTest {
    /// Test identity.
    fn id(&self) -> TestId;
    /// Display title.
    fn title(&self) -> &'static str;
    /// Requirement reference tag.
    fn ref_tag(&self) -> &'static str;
    /// Runs the hooks against `ctx`, recording each lifecycle transition.
    fn run(&self, ctx: &mut TestContext<'_>, trace: &mut LifecycleTrace);
}

impl<S: Default> RegisteredTest for TestDescriptor<S> {
    fn id(&self) -> TestId {
        self.id
    }

    fn title(&self) -> &'static str {
        self.title
    }

    fn ref_tag(&self) -> &'static str {
        self.ref_tag
    }

    fn run(&self, ctx: &mut TestContext<'_>, trace: &mut LifecycleTrace) {
        crate::dispatch::run_hooks(
            ctx,
            trace,
            S::default(),
            self.entry,
            self.payload,
            self.exit,
        );
    }
}

/// Reasons a registry cannot be built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Two descriptors share an identity.
    #[error("test {0} registered twice")]
    DuplicateId(TestId),
}

/// Ordered, immutable set of registered tests.
#[derive(Default)]
pub struct TestRegistry {
    tests: Vec<Box<dyn RegisteredTest>>,
}

impl fmt::Debug for TestRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.tests.iter().map(|test| test.id()))
            .finish()
    }
}

impl TestRegistry {
    /// Starts an empty registry.
    #[must_use]
    pub fn builder() -> TestRegistryBuilder {
        TestRegistryBuilder::default()
    }

    /// Tests in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn RegisteredTest> {
        self.tests.iter().map(|test| &**test)
    }

    /// Test at `index` in registration order.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&dyn RegisteredTest> {
        self.tests.get(index).map(|test| &**test)
    }

    /// Looks a test up by identity.
    #[must_use]
    pub fn find(&self, id: TestId) -> Option<&dyn RegisteredTest> {
        self.iter().find(|test| test.id() == id)
    }

    /// Number of registered tests.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tests.len()
    }

    /// Returns `true` when no test is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }
}

/// Builder for [`TestRegistry`].
#[derive(Default)]
#[must_use]
pub struct TestRegistryBuilder {
    tests: Vec<Box<dyn RegisteredTest>>,
}

impl fmt::Debug for TestRegistryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.tests.iter().map(|test| test.id()))
            .finish()
    }
}

impl TestRegistryBuilder {
    /// Appends a test.
    pub fn register(mut self, test: impl RegisteredTest + 'static) -> Self {
        self.tests.push(Box::new(test));
        self
    }

    /// Finishes the registry.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateId`] when two tests share an id.
    pub fn build(self) -> Result<TestRegistry, RegistryError> {
        for (index, test) in self.tests.iter().enumerate() {
            if self.tests[..index].iter().any(|prior| prior.id() == test.id()) {
                return Err(RegistryError::DuplicateId(test.id()));
            }
        }
        Ok(TestRegistry { tests: self.tests })
    }
}

#[cfg(test)]
mod tests {
    use super::{
        Category, DescriptorError, PayloadExit, PayloadResult, RegistryError, TestDescriptor,
        TestId, TestRegistry,
    };
    use crate::TestContext;

    #[allow(clippy::unnecessary_wraps)]
    fn noop(_ctx: &mut TestContext<'_>, _state: &mut ()) -> PayloadResult {
        Ok(PayloadExit::Returned)
    }

    #[test]
    fn ids_render_with_category_prefix() {
        assert_eq!(TestId::new(Category::VersionCounters, 1).to_string(), "v001");
        assert_eq!(TestId::new(Category::Crypto, 3).to_string(), "c003");
        assert_eq!(TestId::new(Category::Base, 12).to_string(), "b012");
    }

    #[test]
    fn builder_requires_title_tag_and_payload() {
        let id = TestId::new(Category::Base, 1);
        assert_eq!(
            TestDescriptor::<()>::builder(id).payload(noop).build().map(|_| ()),
            Err(DescriptorError::MissingTitle(id))
        );
        assert_eq!(
            TestDescriptor::<()>::builder(id)
                .title("t")
                .payload(noop)
                .build()
                .map(|_| ()),
            Err(DescriptorError::MissingRefTag(id))
        );
        assert_eq!(
            TestDescriptor::<()>::builder(id)
                .title("t")
                .ref_tag("R000")
                .build()
                .map(|_| ()),
            Err(DescriptorError::MissingPayload(id))
        );
    }

    #[test]
    fn registry_keeps_order_and_rejects_duplicates() {
        let build = |category, number| {
            TestDescriptor::<()>::builder(TestId::new(category, number))
                .title("t")
                .ref_tag("R000")
                .payload(noop)
                .build()
                .expect("complete descriptor")
        };

        let registry = TestRegistry::builder()
            .register(build(Category::Crypto, 3))
            .register(build(Category::Base, 7))
            .build()
            .expect("distinct ids");
        let order: Vec<String> = registry.iter().map(|test| test.id().to_string()).collect();
        assert_eq!(order, ["c003", "b007"]);
        assert_eq!(registry.len(), 2);
        assert!(registry.find(TestId::new(Category::Base, 7)).is_some());

        let duplicate = TestRegistry::builder()
            .register(build(Category::Base, 7))
            .register(build(Category::Base, 7))
            .build();
        assert!(matches!(
            duplicate,
            Err(RegistryError::DuplicateId(id)) if id == TestId::new(Category::Base, 7)
        ));
    }
}
