//! # Kernel Physical Memory Manager
//!
//! This crate owns the kernel's supply of physical memory: a fixed range of
//! 4 KiB pages that it hands out one at a time, takes back, and shares between
//! several owners through per-page reference counts.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │         Page-table / fork code (not in here)        │
//! │    • decides when to share a page or copy it        │
//! └─────────────────┬───────────────────────────────────┘
//!                   │ FrameAlloc: alloc_4k / free_4k / share_4k
//! ┌─────────────────▼───────────────────────────────────┐
//! │              FrameAllocator                         │
//! │    • kmem_pgref: owner count per page               │
//! │    • kmem: intrusive LIFO list of free pages        │
//! └─────────────────┬───────────────────────────────────┘
//!                   │ PhysMapper
//! ┌─────────────────▼───────────────────────────────────┐
//! │       Physical memory (HHDM or identity mapped)     │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Core Components
//!
//! ### Frame Allocator ([`FrameAllocator`])
//!
//! * [`initialize`](FrameAllocator::initialize) takes over a physical range
//!   and frees every page in it.
//! * [`allocate`](FrameAllocator::allocate) pops a free page and gives it one owner.
//! * [`accumulate`](FrameAllocator::accumulate) adds an owner to an allocated page.
//! * [`release`](FrameAllocator::release) drops an owner; the last one puts the
//!   page back on the free list.
//!
//! Fresh pages are filled with [`ALLOC_JUNK`], freed pages with [`FREE_JUNK`],
//! so stale reads show up as recognizable garbage.
//!
//! ### Errors ([`FrameAllocError`])
//!
//! Running dry is not an error: `allocate` returns `None` and the caller fails
//! whatever it was doing. Passing an address that cannot be a page of the
//! allocator is; [`FrameAllocError::is_fatal`] tells the two kinds of misuse
//! apart. The kernel-facing [`FrameAlloc`] implementation panics on them.
//!
//! ### Configuration ([`FrameAllocConfig`])
//!
//! Junk filling can be switched off, and ownership checks that catch double
//! frees can be relaxed (unsafely) to the classic trust-the-caller behavior.
//!
//! ## Usage Patterns
//!
//! ```rust,no_run
//! use kernel_memory_addresses::PhysicalAddress;
//! use kernel_pmm::{FrameAlloc, FrameAllocConfig, FrameAllocator, HhdmPhysMapper};
//!
//! const HHDM_BASE: u64 = 0xffff_8880_0000_0000;
//!
//! let mapper = unsafe { HhdmPhysMapper::new(HHDM_BASE) };
//! let pmm = FrameAllocator::initialize(
//!     mapper,
//!     PhysicalAddress::new(0x0020_0000),
//!     PhysicalAddress::new(0x0800_0000),
//!     FrameAllocConfig::new(),
//! )
//! .expect("physical memory range");
//!
//! let page = pmm.alloc_4k().expect("out of memory");
//! pmm.share_4k(page.base()); // e.g. mapped copy-on-write into a child
//! pmm.free_4k(page.base());
//! pmm.free_4k(page.base());
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

extern crate alloc;

pub mod config;
mod error;
mod frame_alloc;
mod free_list;
pub mod phys_mapper;
mod ref_count;

#[cfg(test)]
mod testing;

pub use config::{ALLOC_JUNK, FREE_JUNK, FrameAllocConfig, OwnershipChecks, PAGE_SIZE};
pub use error::FrameAllocError;
pub use frame_alloc::{FrameAllocator, FrameStats};
pub use phys_mapper::{HhdmPhysMapper, PhysMapper};

use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size4K};

/// Page allocation as seen by page-table and process code.
///
/// Unlike [`FrameAllocator`]'s own methods, misuse is not reported back:
/// an address that is not an allocated page of this allocator is a kernel
/// bug, and implementations halt on it.
pub trait FrameAlloc {
    /// Allocate one 4 KiB physical page with a single owner.
    fn alloc_4k(&self) -> Option<PhysicalPage<Size4K>>;

    /// Drop one owner of the page at `pa`.
    ///
    /// # Panics
    /// If `pa` is not an allocated page of this allocator.
    fn free_4k(&self, pa: PhysicalAddress);

    /// Add one owner to the allocated page at `pa`.
    ///
    /// # Panics
    /// If `pa` is not an allocated page of this allocator.
    fn share_4k(&self, pa: PhysicalAddress);
}

impl<M: PhysMapper> FrameAlloc for FrameAllocator<M> {
    fn alloc_4k(&self) -> Option<PhysicalPage<Size4K>> {
        self.allocate()
    }

    fn free_4k(&self, pa: PhysicalAddress) {
        if let Err(e) = self.release(pa) {
            panic!("kfree: {e}");
        }
    }

    fn share_4k(&self, pa: PhysicalAddress) {
        if let Err(e) = self.accumulate(pa) {
            panic!("pgref: {e}");
        }
    }
}
