//! Host memory standing in for physical pages.

use crate::{FrameAllocConfig, FrameAllocator, HhdmPhysMapper, PAGE_SIZE};
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size4K};
use std::alloc::{Layout, alloc_zeroed, dealloc};
use std::ptr::NonNull;

/// Page-aligned, identity-mapped heap block of `pages` pages.
pub(crate) struct Arena {
    ptr: NonNull<u8>,
    layout: Layout,
}

impl Arena {
    pub(crate) fn new(pages: usize) -> Self {
        assert!(pages > 0);
        let layout = Layout::from_size_align(pages * PAGE_SIZE, PAGE_SIZE).unwrap();
        let ptr = NonNull::new(unsafe { alloc_zeroed(layout) }).expect("host allocation");
        Self { ptr, layout }
    }

    pub(crate) fn mapper() -> HhdmPhysMapper {
        unsafe { HhdmPhysMapper::identity() }
    }

    pub(crate) fn start(&self) -> PhysicalAddress {
        PhysicalAddress::from_nonnull(self.ptr)
    }

    pub(crate) fn page(&self, index: usize) -> PhysicalPage<Size4K> {
        assert!(index * PAGE_SIZE < self.layout.size());
        PhysicalPage::from_aligned(self.start() + (index * PAGE_SIZE) as u64).unwrap()
    }

    pub(crate) fn bytes(&self, index: usize) -> &[u8] {
        assert!(index * PAGE_SIZE < self.layout.size());
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr().add(index * PAGE_SIZE), PAGE_SIZE) }
    }

    pub(crate) fn allocator(&self, config: FrameAllocConfig) -> FrameAllocator<HhdmPhysMapper> {
        let end = self.start() + self.layout.size() as u64;
        FrameAllocator::initialize(Self::mapper(), self.start(), end, config).unwrap()
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        unsafe { dealloc(self.ptr.as_ptr(), self.layout) }
    }
}
