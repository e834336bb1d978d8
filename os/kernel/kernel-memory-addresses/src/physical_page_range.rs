use crate::{PageSize, PhysicalAddress, PhysicalPage};
use core::fmt;
use core::iter::FusedIterator;

/// A half-open range `[start, end)` of whole physical pages of size `S`.
///
/// Both bounds are page aligned. The range answers the questions a page
/// allocator keeps asking: is this address one of mine, and which slot of my
/// per-page bookkeeping does it map to?
///
/// ### Examples
/// ```rust
/// # use kernel_memory_addresses::*;
/// // Unaligned bounds are rounded inward: the start up, the end down.
/// let range = PhysicalPageRange::<Size4K>::within(
///     PhysicalAddress::new(0x1010),
///     PhysicalAddress::new(0x5800),
/// )
/// .unwrap();
/// assert_eq!(range.start().as_u64(), 0x2000);
/// assert_eq!(range.end().as_u64(), 0x5000);
/// assert_eq!(range.len(), 3);
/// assert_eq!(range.iter().count(), 3);
/// ```
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct PhysicalPageRange<S: PageSize> {
    start: PhysicalPage<S>,
    /// Exclusive; always `>= start`.
    end: PhysicalPage<S>,
}

impl<S: PageSize> PhysicalPageRange<S> {
    /// Range spanning the pages from `start` (inclusive) to `end` (exclusive).
    ///
    /// Returns `None` if `end` lies below `start`.
    #[inline]
    #[must_use]
    pub fn new(start: PhysicalPage<S>, end: PhysicalPage<S>) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    /// The largest page range that fits entirely inside the byte range `[start, end)`.
    ///
    /// `start` is rounded up and `end` rounded down to page boundaries; a byte
    /// range shorter than one page yields an empty range. Returns `None` if
    /// `end < start` or rounding `start` up overflows the address space.
    #[must_use]
    pub fn within(start: PhysicalAddress, end: PhysicalAddress) -> Option<Self> {
        if end < start {
            return None;
        }

        let first = start.align_up::<S>()?.page::<S>();
        let last = end.page::<S>();
        if last < first {
            // less than one whole page in between
            return Some(Self {
                start: first,
                end: first,
            });
        }

        Some(Self {
            start: first,
            end: last,
        })
    }

    #[inline]
    #[must_use]
    pub const fn start(&self) -> PhysicalAddress {
        self.start.base()
    }

    #[inline]
    #[must_use]
    pub const fn end(&self) -> PhysicalAddress {
        self.end.base()
    }

    /// Number of pages in the range.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> u64 {
        match self.end.pages_from(self.start) {
            Some(n) => n,
            None => 0,
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `addr` lies inside `[start, end)`, aligned or not.
    #[inline]
    #[must_use]
    pub fn contains(&self, addr: PhysicalAddress) -> bool {
        self.start() <= addr && addr < self.end()
    }

    /// Zero-based slot of `page` within the range, or `None` if it lies outside.
    #[inline]
    #[must_use]
    pub fn index_of(&self, page: PhysicalPage<S>) -> Option<u64> {
        if page < self.start || page >= self.end {
            return None;
        }
        page.pages_from(self.start)
    }

    /// Iterate the pages in ascending address order.
    #[inline]
    #[must_use]
    pub const fn iter(&self) -> PhysicalPageIter<S> {
        PhysicalPageIter {
            next: self.start,
            end: self.end,
        }
    }
}

impl<S: PageSize> IntoIterator for PhysicalPageRange<S> {
    type Item = PhysicalPage<S>;
    type IntoIter = PhysicalPageIter<S>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<S: PageSize> IntoIterator for &PhysicalPageRange<S> {
    type Item = PhysicalPage<S>;
    type IntoIter = PhysicalPageIter<S>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<S: PageSize> fmt::Display for PhysicalPageRange<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start(), self.end())
    }
}

impl<S: PageSize> fmt::Debug for PhysicalPageRange<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PhysicalPageRange<{}>({:?}..{:?}, {} pages)",
            S::as_str(),
            self.start(),
            self.end(),
            self.len()
        )
    }
}

/// Ascending iterator over the pages of a [`PhysicalPageRange`].
#[derive(Clone)]
pub struct PhysicalPageIter<S: PageSize> {
    next: PhysicalPage<S>,
    end: PhysicalPage<S>,
}

impl<S: PageSize> Iterator for PhysicalPageIter<S> {
    type Item = PhysicalPage<S>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }
        let page = self.next;
        // `next < end` so stepping by one page cannot overflow
        self.next = page.checked_add_pages(1).unwrap_or(self.end);
        Some(page)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.end.pages_from(self.next).unwrap_or(0);
        usize::try_from(remaining).map_or((usize::MAX, None), |n| (n, Some(n)))
    }
}

impl<S: PageSize> FusedIterator for PhysicalPageIter<S> {}
