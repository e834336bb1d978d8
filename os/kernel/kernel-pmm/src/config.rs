//! Allocator tuning knobs and fixed constants.

use kernel_memory_addresses::{PageSize, Size4K};

/// Bytes per managed page.
#[allow(clippy::cast_possible_truncation)]
pub const PAGE_SIZE: usize = Size4K::SIZE as usize;

/// Written over a page when it is handed out, so reads of memory the new
/// owner never initialized stand out.
pub const ALLOC_JUNK: u8 = 0x05;

/// Written over a page when its last owner lets go, so dangling accesses
/// after free stand out.
pub const FREE_JUNK: u8 = 0x01;

const _: () = assert!(ALLOC_JUNK != FREE_JUNK);

/// How much the allocator trusts callers about page ownership.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub enum OwnershipChecks {
    /// Reject [`release`](crate::FrameAllocator::release) of a free page with
    /// [`DoubleFree`](crate::FrameAllocError::DoubleFree) and
    /// [`accumulate`](crate::FrameAllocator::accumulate) on a free page with
    /// [`NotOwned`](crate::FrameAllocError::NotOwned), leaving all state untouched.
    #[default]
    Strict,
    /// Ownership is the caller's responsibility.
    ///
    /// Releasing a page that is already free decrements its count below zero
    /// and pushes it onto the free list a second time; sharing a free page
    /// bumps its count. Either way the same page can later be handed out
    /// twice. Only a warning is logged.
    Unchecked,
}

/// Runtime configuration of a [`FrameAllocator`](crate::FrameAllocator).
///
/// ```rust
/// use kernel_pmm::{FrameAllocConfig, OwnershipChecks};
///
/// let config = FrameAllocConfig::new().with_junk_fill(false);
/// assert!(!config.junk_fill());
/// assert_eq!(config.ownership(), OwnershipChecks::Strict);
/// ```
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct FrameAllocConfig {
    junk_fill: bool,
    ownership: OwnershipChecks,
}

impl FrameAllocConfig {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            junk_fill: true,
            ownership: OwnershipChecks::Strict,
        }
    }

    /// Fill pages with [`ALLOC_JUNK`] / [`FREE_JUNK`] on allocation and release.
    #[must_use]
    pub const fn with_junk_fill(mut self, junk_fill: bool) -> Self {
        self.junk_fill = junk_fill;
        self
    }

    /// Skip ownership checks on release and accumulate (see [`OwnershipChecks::Unchecked`]).
    ///
    /// # Safety
    /// The caller promises never to release or accumulate a page that is not
    /// currently allocated. Breaking that promise puts a page on the free list
    /// twice, after which the allocator follows links stored in memory that a
    /// new owner may already have overwritten.
    #[must_use]
    pub const unsafe fn trusting_callers(mut self) -> Self {
        self.ownership = OwnershipChecks::Unchecked;
        self
    }

    #[must_use]
    pub const fn junk_fill(&self) -> bool {
        self.junk_fill
    }

    #[must_use]
    pub const fn ownership(&self) -> OwnershipChecks {
        self.ownership
    }
}

impl Default for FrameAllocConfig {
    fn default() -> Self {
        Self::new()
    }
}
