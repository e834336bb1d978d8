//! # Physical memory access for the frame allocator
//!
//! The allocator hands out *physical* pages but also has to write into them:
//! junk fills on allocation and release, and the free-list link stored in
//! every free page. Code can only dereference virtual addresses, so every such
//! write goes through a [`PhysMapper`].
//!
//! - In the kernel, physical memory is reachable through a higher-half direct
//!   map (HHDM): page `pa` is visible at `HHDM_BASE + pa`.
//! - During early boot and in host tests, memory is identity mapped.
//!
//! [`HhdmPhysMapper`] covers both: the identity map is an HHDM at offset zero.

use crate::config::PAGE_SIZE;
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size4K};

/// Converts physical addresses to usable references in the current address space.
///
/// # Safety
/// Implementations must return a pointer through which the physical memory at
/// `pa` is readable and writable for as long as the allocator lives.
pub unsafe trait PhysMapper {
    /// Convert a *physical* address to a usable mutable reference.
    ///
    /// # Safety
    /// - `pa` must be mapped as writable and suitably aligned for `T`.
    /// - The caller must have exclusive access to the bytes of `T` at `pa`
    ///   for the lifetime `'a` (no aliasing references).
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T;

    /// View a whole page as bytes.
    ///
    /// # Safety
    /// Same contract as [`phys_to_mut`](Self::phys_to_mut), for all of `page`.
    #[inline]
    unsafe fn page_bytes<'a>(&self, page: PhysicalPage<Size4K>) -> &'a mut [u8; PAGE_SIZE] {
        unsafe { self.phys_to_mut(page.base()) }
    }
}

/// [`PhysMapper`] for memory that is direct-mapped at a fixed offset.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct HhdmPhysMapper {
    base: u64,
}

impl HhdmPhysMapper {
    /// A direct map placing physical address `pa` at virtual address `base + pa`.
    ///
    /// # Safety
    /// Every physical page later handed to the allocator must be mapped
    /// writable at that location.
    #[must_use]
    pub const unsafe fn new(base: u64) -> Self {
        Self { base }
    }

    /// Physical addresses are virtual addresses.
    ///
    /// # Safety
    /// Every physical page later handed to the allocator must be identity mapped
    /// and writable (e.g. host memory whose address was taken with
    /// [`PhysicalAddress::from_ptr`]).
    #[must_use]
    pub const unsafe fn identity() -> Self {
        unsafe { Self::new(0) }
    }

    #[must_use]
    pub const fn base(&self) -> u64 {
        self.base
    }
}

unsafe impl PhysMapper for HhdmPhysMapper {
    #[allow(clippy::cast_possible_truncation)]
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        let va = self.base.wrapping_add(pa.as_u64()) as usize;
        let ptr = core::ptr::with_exposed_provenance_mut::<T>(va);
        // SAFETY: Caller must ensure the physical address is valid and mapped via HHDM.
        unsafe { &mut *ptr }
    }
}
