/* The VGA text buffer lives at physical address 0xb8000. With paging active we cannot touch physical memory
directly, so the bootloader (feature `map_physical_memory`) maps the complete physical memory at a fixed
virtual offset and hands us that offset in the BootInfo. Every physical address P is then reachable at
virtual address offset + P, including the VGA buffer.

Creating mappings is the bootloader's job. This module only locates the buffer inside the existing mapping
and wraps it in a MemoryRegion handle, which is the only thing the framebuffer gets to see. */

use core::marker::PhantomData;
use core::mem;

use log::{debug, warn};
use x86_64::structures::paging::{OffsetPageTable, PageTable, Translate};
use x86_64::{PhysAddr, VirtAddr};

use crate::vga_buffer::{ScreenChar, BUFFER_HEIGHT, BUFFER_WIDTH};

/// Physical address of the VGA text-mode buffer.
pub const VGA_TEXT_BUFFER_PHYS: u64 = 0xb8000;

/// Size of the 80x25 text grid in bytes.
pub const VGA_TEXT_BUFFER_SIZE: usize = BUFFER_WIDTH * BUFFER_HEIGHT * mem::size_of::<ScreenChar>();

/// A range of writable memory, described by start address and length in bytes.
///
/// The handle is not `Copy` or `Clone`: whoever consumes it has exclusive use of the memory for `'a`.
#[derive(Debug)]
pub struct MemoryRegion<'a> {
    start: VirtAddr,
    len: usize,
    _memory: PhantomData<&'a mut [u8]>,
}

impl<'a> MemoryRegion<'a> {
    /// Wraps `len` bytes starting at `start`.
    ///
    /// This function is unsafe because the caller must guarantee that the range is mapped and
    /// writable for the whole lifetime `'a`, is 2-byte aligned, and that nothing else holds a
    /// reference into it while the handle (or whatever consumed it) is alive.
    pub unsafe fn new(start: VirtAddr, len: usize) -> MemoryRegion<'a> {
        MemoryRegion {
            start,
            len,
            _memory: PhantomData,
        }
    }

    /// A region over ordinary memory, borrowed for as long as the region lives.
    pub fn from_cells(cells: &'a mut [u16]) -> MemoryRegion<'a> {
        MemoryRegion {
            start: VirtAddr::from_ptr(cells.as_mut_ptr() as *const u16),
            len: cells.len() * mem::size_of::<u16>(),
            _memory: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub(crate) fn start(&self) -> VirtAddr {
        self.start
    }
}

/// Initialize a new OffsetPageTable.
///
/// This function is unsafe because the caller must guarantee that the
/// complete physical memory is mapped to virtual memory at the passed
/// `physical_memory_offset`. Also, this function must be only called once
/// to avoid aliasing `&mut` references (which is undefined behavior).
pub unsafe fn init(physical_memory_offset: VirtAddr) -> OffsetPageTable<'static> {
    let level_4_table = active_level_4_table(physical_memory_offset);
    OffsetPageTable::new(level_4_table, physical_memory_offset)
}

/// Returns a mutable reference to the active level 4 table.
unsafe fn active_level_4_table(physical_memory_offset: VirtAddr) -> &'static mut PageTable {
    use x86_64::registers::control::Cr3;

    let (level_4_table_frame, _) = Cr3::read();

    let phys = level_4_table_frame.start_address();
    let virt = physical_memory_offset + phys.as_u64();
    let page_table_ptr: *mut PageTable = virt.as_mut_ptr();

    &mut *page_table_ptr // unsafe
}

/// Locates the VGA text buffer inside the physical memory mapping.
///
/// Returns `None` when the page tables do not translate the expected virtual address back to
/// `0xb8000`.
///
/// This function is unsafe because the caller must guarantee that the complete physical memory
/// is mapped at `physical_memory_offset` and that it is called only once, since the returned
/// region claims exclusive use of the buffer for the rest of the program.
pub unsafe fn vga_text_region(
    mapper: &OffsetPageTable,
    physical_memory_offset: VirtAddr,
) -> Option<MemoryRegion<'static>> {
    let phys = PhysAddr::new(VGA_TEXT_BUFFER_PHYS);
    let virt = physical_memory_offset + phys.as_u64();

    match mapper.translate_addr(virt) {
        Some(translated) if translated == phys => {
            debug!("vga text buffer {:?} is mapped at {:?}", phys, virt);
            Some(MemoryRegion::new(virt, VGA_TEXT_BUFFER_SIZE))
        }
        translated => {
            warn!("vga text buffer {:?} not mapped at {:?} (got {:?})", phys, virt, translated);
            None
        }
    }
}

#[test_case]
fn test_region_from_cells() {
    let mut cells = [0u16; 10];
    let region = MemoryRegion::from_cells(&mut cells);
    assert_eq!(region.len(), 20);
    assert!(!region.is_empty());

    let mut nothing: [u16; 0] = [];
    assert!(MemoryRegion::from_cells(&mut nothing).is_empty());
}

#[test_case]
fn test_vga_text_buffer_size() {
    assert_eq!(VGA_TEXT_BUFFER_SIZE, 4000);
}
