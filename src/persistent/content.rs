//! Lineage storage: the modification counter, the versioned container, and the
//! shared handle that views hold onto.
//!
//! One [`VersionedContent`] backs every view of an unforked lineage. Views never
//! own it; they hold a reference-counted handle ([`Lineage`]) and read through a
//! `RwLock`. The only writer path is [`Lineage::commit`], which decides under the
//! write lock whether the calling view may mutate in place or must first
//! reassemble a private copy.

use parking_lot::RwLock;

use super::ReferenceCounter;
use super::slot::Step;

// =============================================================================
// ModificationCount
// =============================================================================

/// The highest step ever committed in a lineage.
///
/// The counter only moves forward, and only through [`VersionedContent::mutate`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ModificationCount {
    value: Step,
}

impl ModificationCount {
    /// Creates a counter starting at `value`.
    #[inline]
    #[must_use]
    pub const fn new(value: Step) -> Self {
        Self { value }
    }

    /// Returns the current maximum step.
    #[inline]
    #[must_use]
    pub const fn value(self) -> Step {
        self.value
    }

    const fn advance(&mut self) {
        self.value += 1;
    }
}

// =============================================================================
// VersionedContent
// =============================================================================

/// A container of versioned slots paired with its lineage's modification counter.
///
/// # Examples
///
/// ```rust
/// use palimpsest::persistent::VersionedContent;
///
/// let mut content = VersionedContent::new(Vec::new(), 0);
/// content.mutate(|values, step| values.push(step));
/// content.mutate(|values, step| values.push(step));
///
/// assert_eq!(content.container(), &vec![1, 2]);
/// assert_eq!(content.max_modification().value(), 2);
/// ```
#[derive(Debug)]
pub struct VersionedContent<C> {
    container: C,
    max_modification: ModificationCount,
}

impl<C> VersionedContent<C> {
    /// Wraps `container` as a lineage whose latest step is `step`.
    #[must_use]
    pub const fn new(container: C, step: Step) -> Self {
        Self {
            container,
            max_modification: ModificationCount::new(step),
        }
    }

    /// Returns the raw container.
    #[inline]
    #[must_use]
    pub const fn container(&self) -> &C {
        &self.container
    }

    /// Returns the lineage's modification counter.
    #[inline]
    #[must_use]
    pub const fn max_modification(&self) -> ModificationCount {
        self.max_modification
    }

    /// Applies `update` to the container at the next step, then advances the counter.
    ///
    /// `update` receives the step it must record its writes at, which is always
    /// the current maximum plus one.
    pub fn mutate<R>(&mut self, update: impl FnOnce(&mut C, Step) -> R) -> R {
        let step = self.max_modification.value() + 1;
        let result = update(&mut self.container, step);
        self.max_modification.advance();
        tracing::trace!(step, "committed step");
        result
    }
}

// =============================================================================
// Reassembly
// =============================================================================

/// Containers that can produce a private, compacted copy of their history.
pub(crate) trait Reassemble: Sized {
    /// Returns a new container whose visible state at `step` matches `self`'s,
    /// carrying no history recorded after `step`.
    fn reassemble(&self, step: Step) -> Self;

    /// Number of slots currently held, tombstoned or not.
    fn slot_count(&self) -> usize;
}

// =============================================================================
// Lineage
// =============================================================================

/// A non-owning shared handle to one lineage's [`VersionedContent`].
pub(crate) struct Lineage<C> {
    content: ReferenceCounter<RwLock<VersionedContent<C>>>,
}

impl<C> Clone for Lineage<C> {
    fn clone(&self) -> Self {
        Self {
            content: ReferenceCounter::clone(&self.content),
        }
    }
}

impl<C> Lineage<C> {
    /// Starts a new lineage over `container` with `step` as its latest step.
    pub(crate) fn new(container: C, step: Step) -> Self {
        Self::from_content(VersionedContent::new(container, step))
    }

    fn from_content(content: VersionedContent<C>) -> Self {
        Self {
            content: ReferenceCounter::new(RwLock::new(content)),
        }
    }

    /// Runs `reader` against the content under the read lock.
    pub(crate) fn read<R>(&self, reader: impl FnOnce(&C) -> R) -> R {
        reader(self.content.read().container())
    }

    /// Returns the lineage's latest committed step.
    pub(crate) fn max_step(&self) -> Step {
        self.content.read().max_modification().value()
    }

    /// Returns `true` if both handles point at the same content.
    pub(crate) fn ptr_eq(&self, other: &Self) -> bool {
        ReferenceCounter::ptr_eq(&self.content, &other.content)
    }
}

impl<C: Reassemble> Lineage<C> {
    /// Commits `update` on behalf of a view at `own_step`.
    ///
    /// When `own_step` is still the lineage's latest step the shared content is
    /// mutated in place and the same handle is returned. Otherwise the history up
    /// to `own_step` is reassembled into a private lineage, `update` is applied
    /// there, and the new handle is returned. In both cases the write lands at
    /// `own_step + 1`.
    pub(crate) fn commit(&self, own_step: Step, update: impl FnOnce(&mut C, Step)) -> Self {
        let mut content = self.content.write();
        let max_step = content.max_modification().value();
        debug_assert!(own_step <= max_step, "view is ahead of its lineage");

        if max_step == own_step {
            content.mutate(update);
            return self.clone();
        }

        let container = content.container().reassemble(own_step);
        drop(content);
        tracing::debug!(
            own_step,
            max_step,
            slots = container.slot_count(),
            "reassembling diverged lineage"
        );

        let mut forked = VersionedContent::new(container, own_step);
        forked.mutate(update);
        Self::from_content(forked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[derive(Debug, Clone, PartialEq)]
    struct Log(Vec<Step>);

    impl Reassemble for Log {
        fn reassemble(&self, step: Step) -> Self {
            Self(self.0.iter().copied().filter(|entry| *entry <= step).collect())
        }

        fn slot_count(&self) -> usize {
            self.0.len()
        }
    }

    #[rstest]
    fn test_modification_count_starts_at_given_value() {
        assert_eq!(ModificationCount::new(7).value(), 7);
        assert_eq!(ModificationCount::default().value(), 0);
    }

    #[rstest]
    fn test_mutate_passes_next_step_and_advances() {
        let mut content = VersionedContent::new(Log(Vec::new()), 3);
        let seen = content.mutate(|log, step| {
            log.0.push(step);
            step
        });
        assert_eq!(seen, 4);
        assert_eq!(content.max_modification().value(), 4);
    }

    #[rstest]
    fn test_commit_at_latest_step_mutates_in_place() {
        let lineage = Lineage::new(Log(Vec::new()), 0);
        let next = lineage.commit(0, |log, step| log.0.push(step));
        assert!(next.ptr_eq(&lineage));
        assert_eq!(lineage.max_step(), 1);
        assert_eq!(lineage.read(Clone::clone), Log(vec![1]));
    }

    #[rstest]
    fn test_commit_behind_latest_step_forks() {
        let lineage = Lineage::new(Log(Vec::new()), 0);
        lineage.commit(0, |log, step| log.0.push(step));
        lineage.commit(1, |log, step| log.0.push(step));

        let forked = lineage.commit(1, |log, step| log.0.push(step * 10));

        assert!(!forked.ptr_eq(&lineage));
        assert_eq!(forked.max_step(), 2);
        assert_eq!(forked.read(Clone::clone), Log(vec![1, 20]));
        assert_eq!(lineage.read(Clone::clone), Log(vec![1, 2]));
        assert_eq!(lineage.max_step(), 2);
    }

    #[rstest]
    fn test_fork_under_trace_subscriber() {
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::new("palimpsest=trace"))
            .with_test_writer()
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let lineage = Lineage::new(Log(vec![1, 2, 3]), 3);
            let forked = lineage.commit(1, |log, step| log.0.push(step));
            assert_eq!(forked.read(Clone::clone), Log(vec![1, 2]));
        });
    }
}
