//! # Reference-counted physical frame allocator
//!
//! Hands out 4 KiB physical pages from a fixed range and counts how many
//! owners each page has, so that pages shared between address spaces (e.g.
//! copy-on-write after fork) go back to the pool only when the last owner
//! releases them.
//!
//! ## State
//!
//! ```text
//!             allocate()              accumulate()
//!   Free ───────────────▶ Owned(1) ───────────────▶ Owned(k+1)
//!    ▲                      │   ▲                      │
//!    └──────────────────────┘   └──────────────────────┘
//!         release(), k = 1            release(), k > 1
//! ```
//!
//! A free page sits on an intrusive LIFO list and has a count of zero (or
//! less, see [`OwnershipChecks::Unchecked`]); an owned page has a positive
//! count and is not on the list.
//!
//! ## Locking
//!
//! Two spin locks: `kmem_pgref` guards the count table, `kmem` the free list.
//! Whenever both are held, `kmem_pgref` is taken first and `kmem` is released
//! before it. `allocate()` drops `kmem` before touching the counts, so the two
//! are never taken in the opposite order.

use crate::config::{ALLOC_JUNK, FREE_JUNK, FrameAllocConfig, OwnershipChecks};
use crate::error::FrameAllocError;
use crate::free_list::FreePageList;
use crate::phys_mapper::PhysMapper;
use crate::ref_count::RefCountTable;
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, PhysicalPageRange, Size4K};
use kernel_sync::SpinLock;
use log::{debug, error, info, trace, warn};

/// Snapshot of the allocator's page accounting.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct FrameStats {
    /// Pages in the managed range.
    pub total: usize,
    /// Pages on the free list.
    pub free: usize,
    /// Pages handed out and not yet returned.
    pub in_use: usize,
}

/// Physical page allocator with per-page reference counts.
///
/// Constructing the allocator with [`FrameAllocator::initialize`] is the one
/// and only initialization; share it between cores by reference (a static
/// once-cell, an `Arc`, ...). All operations take `&self`.
///
/// ```rust
/// use kernel_memory_addresses::PhysicalAddress;
/// use kernel_pmm::{FrameAllocConfig, FrameAllocator, HhdmPhysMapper};
/// use std::alloc::{Layout, alloc, dealloc};
///
/// let layout = Layout::from_size_align(2 * 4096, 4096).unwrap();
/// let mem = unsafe { alloc(layout) };
/// let start = PhysicalAddress::from_ptr(mem);
///
/// let mapper = unsafe { HhdmPhysMapper::identity() };
/// let pmm = FrameAllocator::initialize(mapper, start, start + 2 * 4096, FrameAllocConfig::new())
///     .unwrap();
///
/// let page = pmm.allocate().unwrap();
/// pmm.accumulate(page.base()).unwrap(); // a second owner
/// pmm.release(page.base()).unwrap();
/// assert_eq!(pmm.free_pages(), 1);
/// pmm.release(page.base()).unwrap();
/// assert_eq!(pmm.free_pages(), 2);
///
/// drop(pmm);
/// unsafe { dealloc(mem, layout) };
/// ```
pub struct FrameAllocator<M: PhysMapper> {
    mapper: M,
    range: PhysicalPageRange<Size4K>,
    pages: usize,
    config: FrameAllocConfig,
    /// Owner counts; taken before `free` whenever both are needed.
    refs: SpinLock<RefCountTable>,
    free: SpinLock<FreePageList>,
}

impl<M: PhysMapper> FrameAllocator<M> {
    /// Take over every whole page inside `[start, end)` and put it on the free list.
    ///
    /// `start` is rounded up and `end` rounded down to page boundaries. Every
    /// page is seeded with a single owner and released through the same path
    /// as [`release`](Self::release), so the free list comes out in LIFO
    /// order: the highest page is handed out first.
    ///
    /// # Errors
    /// - [`FrameAllocError::InvalidRange`] if `end < start` or rounding `start`
    ///   up overflows.
    /// - [`FrameAllocError::RangeTooLarge`] if the page count does not fit a `usize`.
    pub fn initialize(
        mapper: M,
        start: PhysicalAddress,
        end: PhysicalAddress,
        config: FrameAllocConfig,
    ) -> Result<Self, FrameAllocError> {
        let range = PhysicalPageRange::<Size4K>::within(start, end)
            .ok_or(FrameAllocError::InvalidRange { start, end })?;
        let pages = usize::try_from(range.len())
            .map_err(|_| FrameAllocError::RangeTooLarge { pages: range.len() })?;

        if range.start() != start || range.end() != end {
            debug!("Physical range [{start}, {end}) trimmed to page boundaries {range}");
        }

        let allocator = Self {
            mapper,
            range,
            pages,
            config,
            refs: SpinLock::new("kmem_pgref", RefCountTable::new(pages, 1)),
            free: SpinLock::new("kmem", FreePageList::new()),
        };

        for (index, page) in range.iter().enumerate() {
            allocator.release_slot(page, index)?;
        }

        info!(
            "Physical frame allocator managing {pages} pages in {range} ({:?})",
            config.ownership()
        );
        Ok(allocator)
    }

    /// Hand out a free page with a single owner, or `None` if the pool is exhausted.
    ///
    /// With junk fill enabled the page comes back filled with [`ALLOC_JUNK`].
    ///
    /// # Panics
    /// If the link stored in the popped page does not name a page of the
    /// managed range. That happens when a page was written to while on the
    /// free list, e.g. after an undetected double free with
    /// [`OwnershipChecks::Unchecked`].
    #[must_use]
    pub fn allocate(&self) -> Option<PhysicalPage<Size4K>> {
        let popped = {
            let mut free = self.free.lock();
            // SAFETY: every page on the list is a page of `self.range`, pushed
            // through `self.mapper`.
            unsafe { free.pop(&self.mapper, &self.range) }
        };

        let Some(page) = popped else {
            debug!("Out of physical memory, all {} pages in use", self.pages);
            return None;
        };

        let Some(index) = self.slot_of(page) else {
            unreachable!("free list yielded page {page} outside {}", self.range);
        };

        if self.config.junk_fill() {
            // SAFETY: popping the page made us its only owner.
            let bytes = unsafe { self.mapper.page_bytes(page) };
            bytes.fill(ALLOC_JUNK);
        }

        self.refs.lock().reset_to_one(index);
        trace!("Allocated page {page}");
        Some(page)
    }

    /// Drop one owner of the page at `addr`; the last owner returns it to the free list.
    ///
    /// # Errors
    /// - [`FrameAllocError::Misaligned`], [`FrameAllocError::BelowRange`] or
    ///   [`FrameAllocError::AboveRange`] if `addr` cannot be a page of this
    ///   allocator. These are [fatal](FrameAllocError::is_fatal): the kernel
    ///   must halt rather than continue.
    /// - [`FrameAllocError::DoubleFree`] if the page is already free and
    ///   ownership checks are [strict](OwnershipChecks::Strict).
    pub fn release(&self, addr: PhysicalAddress) -> Result<(), FrameAllocError> {
        let (page, index) = self.validate(addr).inspect_err(|e| error!("kfree: {e}"))?;
        self.release_slot(page, index)
    }

    /// Register one more owner of the already allocated page at `addr`.
    ///
    /// No memory is allocated; the page simply needs one more
    /// [`release`](Self::release) before it is freed.
    ///
    /// # Errors
    /// - [`FrameAllocError::Misaligned`], [`FrameAllocError::BelowRange`] or
    ///   [`FrameAllocError::AboveRange`] if `addr` cannot be a page of this allocator.
    /// - [`FrameAllocError::NotOwned`] if the page is free and ownership checks
    ///   are [strict](OwnershipChecks::Strict).
    ///
    /// # Panics
    /// If the page already has `i32::MAX` owners.
    pub fn accumulate(&self, addr: PhysicalAddress) -> Result<(), FrameAllocError> {
        let (page, index) = self.validate(addr).inspect_err(|e| error!("pgref: {e}"))?;

        let mut refs = self.refs.lock();
        if self.config.ownership() == OwnershipChecks::Strict && refs.get(index) <= 0 {
            drop(refs);
            error!("pgref: page {page} is not allocated");
            return Err(FrameAllocError::NotOwned(addr));
        }

        let owners = refs.increment(index);
        drop(refs);

        trace!("Shared page {page}, now {owners} owners");
        Ok(())
    }

    /// Number of pages currently on the free list.
    #[must_use]
    pub fn free_pages(&self) -> usize {
        self.free.lock().len()
    }

    /// Number of pages in the managed range.
    #[must_use]
    pub const fn total_pages(&self) -> usize {
        self.pages
    }

    #[must_use]
    pub fn stats(&self) -> FrameStats {
        let free = self.free_pages();
        FrameStats {
            total: self.pages,
            free,
            in_use: self.pages.saturating_sub(free),
        }
    }

    /// The managed range, after rounding to page boundaries.
    #[must_use]
    pub const fn range(&self) -> PhysicalPageRange<Size4K> {
        self.range
    }

    #[must_use]
    pub const fn config(&self) -> FrameAllocConfig {
        self.config
    }

    fn slot_of(&self, page: PhysicalPage<Size4K>) -> Option<usize> {
        self.range
            .index_of(page)
            .and_then(|index| usize::try_from(index).ok())
    }

    /// Check that `addr` names a page of this allocator and find its count slot.
    fn validate(
        &self,
        addr: PhysicalAddress,
    ) -> Result<(PhysicalPage<Size4K>, usize), FrameAllocError> {
        let page =
            PhysicalPage::<Size4K>::from_aligned(addr).ok_or(FrameAllocError::Misaligned(addr))?;

        if addr < self.range.start() {
            return Err(FrameAllocError::BelowRange {
                addr,
                start: self.range.start(),
            });
        }

        let index = self
            .slot_of(page)
            .ok_or_else(|| FrameAllocError::AboveRange {
                addr,
                end: self.range.end(),
            })?;
        Ok((page, index))
    }

    fn release_slot(&self, page: PhysicalPage<Size4K>, index: usize) -> Result<(), FrameAllocError> {
        let mut refs = self.refs.lock();

        if self.config.ownership() == OwnershipChecks::Strict && refs.get(index) <= 0 {
            drop(refs);
            error!("kfree: double free of page {page}");
            return Err(FrameAllocError::DoubleFree(page.base()));
        }

        let owners = refs.decrement(index);
        if owners > 0 {
            drop(refs);
            trace!("Released page {page}, {owners} owners left");
            return Ok(());
        }

        if owners < 0 {
            warn!("kfree: page {page} released while free (count {owners})");
        }

        if self.config.junk_fill() {
            // SAFETY: the last owner just let go and the page is not on the list yet.
            let bytes = unsafe { self.mapper.page_bytes(page) };
            bytes.fill(FREE_JUNK);
        }

        {
            let mut free = self.free.lock();
            // SAFETY: as above; ownership passes to the list.
            unsafe { free.push(&self.mapper, page) };
        }

        drop(refs);
        trace!("Freed page {page}");
        Ok(())
    }

    /// Owner count of the page at `addr`, bypassing validation.
    #[cfg(test)]
    pub(crate) fn ref_count(&self, addr: PhysicalAddress) -> i32 {
        let page = PhysicalPage::<Size4K>::containing(addr);
        let index = self.slot_of(page).unwrap();
        self.refs.lock().get(index)
    }
}
