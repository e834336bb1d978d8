use crate::{PageSize, PhysicalAddress};
use core::fmt;
use core::marker::PhantomData;

/// Physical memory page base for size `S`.
///
/// A `PhysicalPage<S>` represents the **page-aligned base** of a physical page
/// of size `S` (`S::SIZE` bytes). It is how the frame allocator names the
/// pages it hands out: a page has no identity beyond this base address.
///
/// ### Invariants
/// - The low `S::SHIFT` bits of the base are always zero (page aligned).
///
/// ### Examples
/// ```rust
/// # use kernel_memory_addresses::*;
/// let pa = PhysicalAddress::new(0x0000_0008_1234_5678);
/// let pp = pa.page::<Size4K>();
/// assert_eq!(pp.base().as_u64(), 0x0000_0008_1234_5000);
///
/// // Only aligned addresses convert without rounding.
/// assert!(PhysicalPage::<Size4K>::from_aligned(pa).is_none());
/// assert_eq!(PhysicalPage::<Size4K>::from_aligned(pp.base()), Some(pp));
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PhysicalPage<S: PageSize> {
    value: u64,
    _phantom: PhantomData<S>,
}

impl<S: PageSize> PhysicalPage<S> {
    /// Page that contains `addr` (aligns down).
    #[inline]
    #[must_use]
    pub const fn containing(addr: PhysicalAddress) -> Self {
        Self {
            value: addr.as_u64() & !S::MASK,
            _phantom: PhantomData,
        }
    }

    /// The page whose base is exactly `addr`, or `None` if `addr` is not aligned to `S`.
    #[inline]
    #[must_use]
    pub const fn from_aligned(addr: PhysicalAddress) -> Option<Self> {
        if addr.is_aligned::<S>() {
            Some(Self::containing(addr))
        } else {
            None
        }
    }

    #[inline]
    #[must_use]
    pub const fn base(self) -> PhysicalAddress {
        PhysicalAddress::new(self.value)
    }

    /// The page `count` pages above this one, or `None` on address overflow.
    #[inline]
    #[must_use]
    pub const fn checked_add_pages(self, count: u64) -> Option<Self> {
        let Some(bytes) = count.checked_mul(S::SIZE) else {
            return None;
        };
        match self.value.checked_add(bytes) {
            Some(value) => Some(Self {
                value,
                _phantom: PhantomData,
            }),
            None => None,
        }
    }

    /// Number of whole pages from `origin` up to `self`, or `None` if `self` lies below it.
    #[inline]
    #[must_use]
    pub const fn pages_from(self, origin: Self) -> Option<u64> {
        match self.value.checked_sub(origin.value) {
            Some(bytes) => Some(bytes >> S::SHIFT),
            None => None,
        }
    }
}

impl<S> fmt::Display for PhysicalPage<S>
where
    S: PageSize,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016X}/{}", self.value, S::as_str())
    }
}

impl<S: PageSize> fmt::Debug for PhysicalPage<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PhysicalPage<{}>({:#018X})", S::as_str(), self.value)
    }
}
