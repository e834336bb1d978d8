//! # Physical Memory Address Types
//!
//! Strongly typed wrappers for raw physical addresses, page bases and page
//! ranges used by the physical frame allocator.
//!
//! ## Overview
//!
//! | Type | Generic | Description |
//! |----------|----------|-------------|
//! | [`PhysicalAddress`] | – | A raw 64-bit physical address, possibly unaligned. |
//! | [`PhysicalPage<S>`] | [`S: PageSize`](PageSize) | A page-aligned base address of a page of size `S`. |
//! | [`PhysicalPageRange<S>`] | [`S: PageSize`](PageSize) | A half-open run of whole pages with slot indexing. |
//!
//! Addresses and pages stay separate types at the API boundary:
//! callers returning memory hand back a [`PhysicalAddress`], which may be
//! garbage, and the allocator turns it into a [`PhysicalPage`] only after it
//! checked alignment and bounds.
//!
//! ## Page Sizes
//!
//! [`Size4K`] is the only supported granularity. The [`PageSize`] trait
//! defines the constants [`SIZE`](PageSize::SIZE), [`SHIFT`](PageSize::SHIFT)
//! and [`MASK`](PageSize::MASK) used throughout the helpers.
//!
//! ## Typical Usage
//!
//! ```rust
//! # use kernel_memory_addresses::*;
//! let range = PhysicalPageRange::<Size4K>::within(
//!     PhysicalAddress::new(0x8000_0000),
//!     PhysicalAddress::new(0x8000_4000),
//! )
//! .unwrap();
//!
//! let pa = PhysicalAddress::new(0x8000_2000);
//! let page = PhysicalPage::<Size4K>::from_aligned(pa).unwrap();
//! assert_eq!(range.index_of(page), Some(2));
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(clippy::inline_always)]

mod page_size;
mod physical_address;
mod physical_page;
mod physical_page_range;

pub use page_size::{PageSize, Size4K};
pub use physical_address::PhysicalAddress;
pub use physical_page::PhysicalPage;
pub use physical_page_range::{PhysicalPageIter, PhysicalPageRange};

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: u64 = 0x8000_0000;

    fn page(addr: u64) -> PhysicalPage<Size4K> {
        PhysicalPage::from_aligned(PhysicalAddress::new(addr)).unwrap()
    }

    #[test]
    fn alignment_checks() {
        assert!(PhysicalAddress::new(BASE).is_aligned::<Size4K>());
        assert!(!PhysicalAddress::new(BASE + 8).is_aligned::<Size4K>());
        assert_eq!(PhysicalAddress::new(BASE + 0x123).page_offset::<Size4K>(), 0x123);
    }

    #[test]
    fn align_up_saturates_to_none() {
        assert_eq!(
            PhysicalAddress::new(BASE + 1).align_up::<Size4K>(),
            Some(PhysicalAddress::new(BASE + 0x1000))
        );
        assert_eq!(
            PhysicalAddress::new(BASE).align_up::<Size4K>(),
            Some(PhysicalAddress::new(BASE))
        );
        assert_eq!(PhysicalAddress::new(u64::MAX).align_up::<Size4K>(), None);
    }

    #[test]
    fn containing_page_rounds_down() {
        let p = PhysicalAddress::new(BASE + 0xFFF).page::<Size4K>();
        assert_eq!(p.base().as_u64(), BASE);
    }

    #[test]
    fn page_arithmetic() {
        let p = page(BASE);
        let q = p.checked_add_pages(3).unwrap();
        assert_eq!(q.base().as_u64(), BASE + 3 * Size4K::SIZE);
        assert_eq!(q.pages_from(p), Some(3));
        assert_eq!(p.pages_from(q), None);
        assert_eq!(page(u64::MAX & !0xFFF).checked_add_pages(1), None);
    }

    #[test]
    fn range_rounds_inward() {
        let r = PhysicalPageRange::<Size4K>::within(
            PhysicalAddress::new(BASE + 1),
            PhysicalAddress::new(BASE + 0x3FFF),
        )
        .unwrap();
        assert_eq!(r.start().as_u64(), BASE + 0x1000);
        assert_eq!(r.end().as_u64(), BASE + 0x3000);
        assert_eq!(r.len(), 2);
    }

    #[test]
    fn sub_page_range_is_empty() {
        let r = PhysicalPageRange::<Size4K>::within(
            PhysicalAddress::new(BASE + 0x10),
            PhysicalAddress::new(BASE + 0x20),
        )
        .unwrap();
        assert!(r.is_empty());
        assert_eq!(r.iter().next(), None);
    }

    #[test]
    fn inverted_range_is_rejected() {
        assert!(
            PhysicalPageRange::<Size4K>::within(
                PhysicalAddress::new(BASE + 0x2000),
                PhysicalAddress::new(BASE),
            )
            .is_none()
        );
        assert!(PhysicalPageRange::new(page(BASE + 0x1000), page(BASE)).is_none());
    }

    #[test]
    fn index_of_and_contains() {
        let r = PhysicalPageRange::new(page(BASE), page(BASE + 0x4000)).unwrap();
        assert_eq!(r.index_of(page(BASE)), Some(0));
        assert_eq!(r.index_of(page(BASE + 0x3000)), Some(3));
        assert_eq!(r.index_of(page(BASE + 0x4000)), None);
        assert_eq!(r.index_of(page(BASE - 0x1000)), None);

        assert!(r.contains(PhysicalAddress::new(BASE + 0x3FFF)));
        assert!(!r.contains(PhysicalAddress::new(BASE + 0x4000)));
        assert!(!r.contains(PhysicalAddress::new(BASE - 1)));
    }

    #[test]
    fn iteration_is_ascending_and_exact() {
        let r = PhysicalPageRange::new(page(BASE), page(BASE + 0x3000)).unwrap();
        let mut it = r.iter();
        assert_eq!(it.size_hint(), (3, Some(3)));
        assert_eq!(it.next(), Some(page(BASE)));
        assert_eq!(it.next(), Some(page(BASE + 0x1000)));
        assert_eq!(it.next(), Some(page(BASE + 0x2000)));
        assert_eq!(it.next(), None);
        assert_eq!(it.next(), None);
    }

    #[test]
    fn display_formats() {
        let r = PhysicalPageRange::new(page(BASE), page(BASE + 0x1000)).unwrap();
        assert_eq!(
            r.to_string(),
            "[0x0000000080000000, 0x0000000080001000)"
        );
        assert_eq!(page(BASE).to_string(), "0x0000000080000000/4K");
    }
}
