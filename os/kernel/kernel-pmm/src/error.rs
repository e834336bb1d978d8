use kernel_memory_addresses::PhysicalAddress;

/// Errors reported by the [`FrameAllocator`](crate::FrameAllocator).
///
/// Running out of pages is not an error: [`allocate`](crate::FrameAllocator::allocate)
/// returns `None` for that. Everything here means the caller broke the
/// allocator's contract; see [`FrameAllocError::is_fatal`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameAllocError {
    #[error("invalid physical range [{start}, {end})")]
    InvalidRange {
        start: PhysicalAddress,
        end: PhysicalAddress,
    },
    #[error("physical range of {pages} pages does not fit the reference count table")]
    RangeTooLarge { pages: u64 },
    #[error("misaligned page address {0}")]
    Misaligned(PhysicalAddress),
    #[error("page {addr} below managed range starting at {start}")]
    BelowRange {
        addr: PhysicalAddress,
        start: PhysicalAddress,
    },
    #[error("page {addr} at or above managed range ending at {end}")]
    AboveRange {
        addr: PhysicalAddress,
        end: PhysicalAddress,
    },
    #[error("double free of page {0}")]
    DoubleFree(PhysicalAddress),
    #[error("page {0} is not owned")]
    NotOwned(PhysicalAddress),
}

impl FrameAllocError {
    /// Whether the error reflects a structurally invalid page address.
    ///
    /// A kernel must not continue past a fatal error: the address did not come
    /// from this allocator, so some other subsystem is corrupt.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Misaligned(_) | Self::BelowRange { .. } | Self::AboveRange { .. }
        )
    }
}
