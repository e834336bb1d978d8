use crate::phys_mapper::PhysMapper;
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, PhysicalPageRange, Size4K};

/// Link value marking the end of the list. Never page aligned, so never a page.
const NIL: u64 = u64::MAX;

/// Header stored at the beginning of every **free** page.
///
/// ```text
/// +---------------------+------------------------------+
/// | FreePage (header)   |   FREE_JUNK / stale bytes    |
/// +---------------------+------------------------------+
/// ^ page base           ^ page base + 8
/// ```
///
/// `next` holds the physical base address of the next free page, or [`NIL`].
/// The header is overwritten as soon as the page is handed out.
#[repr(C)]
struct FreePage {
    next: u64,
}

/// Intrusive LIFO stack of free 4 KiB pages.
///
/// The list itself only remembers the head; every other link lives inside the
/// free pages, reached through a [`PhysMapper`].
///
/// # Invariants
/// - Every page on the list is mapped by the mapper passed to
///   [`push`](Self::push) and [`pop`](Self::pop), and nothing outside the list
///   reads or writes it.
/// - `len` is the number of pushes minus the number of pops.
pub(crate) struct FreePageList {
    head: Option<PhysicalPage<Size4K>>,
    len: usize,
}

impl FreePageList {
    pub(crate) const fn new() -> Self {
        Self { head: None, len: 0 }
    }

    pub(crate) const fn len(&self) -> usize {
        self.len
    }

    /// Push `page` onto the head of the list.
    ///
    /// # Safety
    /// - `page` must be mapped writable by `mapper`.
    /// - The caller must own `page` exclusively and give up all access to it.
    pub(crate) unsafe fn push<M: PhysMapper>(&mut self, mapper: &M, page: PhysicalPage<Size4K>) {
        let node: &mut FreePage = unsafe { mapper.phys_to_mut(page.base()) };
        node.next = self.head.map_or(NIL, |next| next.base().as_u64());
        self.head = Some(page);
        self.len += 1;
    }

    /// Pop the most recently pushed page, transferring its ownership to the caller.
    ///
    /// The link read from the page becomes the new head only if it names a
    /// page of `range`, so a clobbered link is caught before it is followed.
    ///
    /// # Safety
    /// `mapper` must be the mapper used to push the pages on this list, and
    /// every pushed page must lie in `range`.
    ///
    /// # Panics
    /// If the popped page links to something that is not a page of `range`.
    pub(crate) unsafe fn pop<M: PhysMapper>(
        &mut self,
        mapper: &M,
        range: &PhysicalPageRange<Size4K>,
    ) -> Option<PhysicalPage<Size4K>> {
        let page = self.head?;
        let node: &mut FreePage = unsafe { mapper.phys_to_mut(page.base()) };
        self.head = match node.next {
            NIL => None,
            next => match PhysicalPage::from_aligned(PhysicalAddress::new(next)) {
                Some(next) if range.index_of(next).is_some() => Some(next),
                _ => panic!("kalloc: free list corrupted, page {page} links to {next:#x}"),
            },
        };
        // A page pushed twice (undetected double free) can outlive its count.
        self.len = self.len.saturating_sub(1);
        Some(page)
    }
}
