#![no_std]

#![cfg_attr(test, no_main)]
#![feature(custom_test_frameworks)]
#![test_runner(crate::test_runner)]
#![reexport_test_harness_main = "test_main"]

use core::panic::PanicInfo;
use core::sync::atomic::{AtomicBool, Ordering};

use bootloader::BootInfo;
use log::LevelFilter;
use x86_64::instructions::hlt;
use x86_64::VirtAddr;

pub mod vga_buffer;
pub mod serial;
pub mod memory;

use vga_buffer::{Framebuffer, BUFFER_HEIGHT, BUFFER_WIDTH};

/// Level the serial logger starts with.
pub const LOG_LEVEL: LevelFilter = LevelFilter::Debug;

/* Test framework: every test reports its name and result over the serial port. */
pub trait Testable {
    fn run(&self) -> ();
}

impl<T> Testable for T
where
    T: Fn(),
{
    fn run(&self) {
        serial_print!("{}...\t", core::any::type_name::<T>());
        self();
        serial_println!("[ok]");
    }
}

pub fn test_runner(tests: &[&dyn Testable]) {
    serial_println!("Running {} tests", tests.len());
    for test in tests {
        test.run();
    }
    exit_qemu(QemuExitCode::Success);
}

pub fn test_panic_handler(info: &PanicInfo) -> ! {
    serial_println!("[failed]\n");
    serial_println!("Error: {}\n", info);
    exit_qemu(QemuExitCode::Failed);
    hlt_loop();
}

#[cfg(test)]
use bootloader::entry_point;

#[cfg(test)]
entry_point!(test_kernel_main);

/// Entry point for `cargo test`
#[cfg(test)]
fn test_kernel_main(_boot_info: &'static BootInfo) -> ! {
    serial::init_logger(LOG_LEVEL);
    test_main();
    hlt_loop();
}

#[cfg(test)]
#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    test_panic_handler(info)
}

/* Writing a value to the isa-debug-exit device (port 0xf4, see the test-args in Cargo.toml) makes QEMU exit
with status (value << 1) | 1. Both codes stay clear of QEMU's own exit codes; test-success-exit-code = 33
maps Success back to 0 for cargo test. */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum QemuExitCode {
    Success = 0x10, // 16 in binary
    Failed = 0x11, // 17 in binary
}

pub fn exit_qemu(exit_code: QemuExitCode) {
    use x86_64::instructions::port::Port;

    unsafe {
        let mut port = Port::new(0xf4);
        port.write(exit_code as u32);
    }
}

/* Set by the first call to init. The page table view and the VGA region it hands out are exclusive,
so a second call must never reach them. */
static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Brings up logging and returns the framebuffer over the VGA text buffer.
///
/// The caller owns the returned framebuffer for the rest of the program.
///
/// # Panics
///
/// Panics when called a second time, or if the bootloader did not map the VGA text buffer.
pub fn init(boot_info: &'static BootInfo) -> Framebuffer<'static> {
    if INITIALIZED.swap(true, Ordering::AcqRel) {
        panic!("hello_vga::init called twice");
    }
    serial::init_logger(LOG_LEVEL);

    let physical_memory_offset = VirtAddr::new(boot_info.physical_memory_offset);
    let mapper = unsafe { memory::init(physical_memory_offset) };
    let region = unsafe { memory::vga_text_region(&mapper, physical_memory_offset) }
        .expect("vga text buffer is not mapped");

    Framebuffer::from_region(region, BUFFER_WIDTH, BUFFER_HEIGHT)
        .expect("vga text region cannot hold the grid")
}

pub fn hlt_loop() -> ! {
    // hlt: Halt the CPU until the next interrupt arrives and allow the CPU to enter a sleep state.
    loop {
        hlt();
    }
}
