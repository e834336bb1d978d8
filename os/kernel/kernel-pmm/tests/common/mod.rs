#![allow(dead_code)]

use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size4K};
use kernel_pmm::{FrameAllocConfig, FrameAllocator, HhdmPhysMapper, PAGE_SIZE};
use std::alloc::{Layout, alloc_zeroed, dealloc};
use std::ptr::NonNull;

/// Page-aligned host memory posing as a physical range, identity mapped.
pub struct Arena {
    ptr: NonNull<u8>,
    layout: Layout,
}

// Safety: the arena is plain memory; synchronization is the allocator's job.
unsafe impl Send for Arena {}
unsafe impl Sync for Arena {}

impl Arena {
    pub fn new(pages: usize) -> Self {
        assert!(pages > 0);
        let layout = Layout::from_size_align(pages * PAGE_SIZE, PAGE_SIZE).unwrap();
        let ptr = NonNull::new(unsafe { alloc_zeroed(layout) }).expect("host allocation");
        Self { ptr, layout }
    }

    pub fn pages(&self) -> usize {
        self.layout.size() / PAGE_SIZE
    }

    pub fn start(&self) -> PhysicalAddress {
        PhysicalAddress::from_nonnull(self.ptr)
    }

    pub fn end(&self) -> PhysicalAddress {
        self.start() + self.layout.size() as u64
    }

    pub fn page(&self, index: usize) -> PhysicalPage<Size4K> {
        assert!(index < self.pages());
        PhysicalPage::from_aligned(self.start() + (index * PAGE_SIZE) as u64).unwrap()
    }

    /// Current contents of `page`. Only call while no other thread writes it.
    pub fn bytes_of(&self, page: PhysicalPage<Size4K>) -> Vec<u8> {
        let offset = page
            .base()
            .offset_from(self.start())
            .expect("page below arena");
        let offset = usize::try_from(offset).unwrap();
        assert!(offset < self.layout.size());
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr().add(offset), PAGE_SIZE) }.to_vec()
    }

    /// Scribble over `page` the way an owner would.
    pub fn write(&self, page: PhysicalPage<Size4K>, byte: u8) {
        let offset = usize::try_from(page.base().offset_from(self.start()).unwrap()).unwrap();
        unsafe { std::ptr::write_bytes(self.ptr.as_ptr().add(offset), byte, PAGE_SIZE) };
    }

    pub fn allocator(&self) -> FrameAllocator<HhdmPhysMapper> {
        self.allocator_with(FrameAllocConfig::new())
    }

    pub fn allocator_with(&self, config: FrameAllocConfig) -> FrameAllocator<HhdmPhysMapper> {
        let mapper = unsafe { HhdmPhysMapper::identity() };
        FrameAllocator::initialize(mapper, self.start(), self.end(), config).unwrap()
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        unsafe { dealloc(self.ptr.as_ptr(), self.layout) }
    }
}
