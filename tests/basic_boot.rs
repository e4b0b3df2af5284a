#![no_std]
#![no_main]
#![feature(custom_test_frameworks)]
#![test_runner(hello_vga::test_runner)]
#![reexport_test_harness_main = "test_main"]

use core::panic::PanicInfo;
use hello_vga::memory::MemoryRegion;
use hello_vga::serial_println;
use hello_vga::vga_buffer::{Color, ColorCode, Framebuffer, ScreenChar};

/* All integration tests are their own executables and completely separate from our main.rs.
This means that each test needs to define its own entry point function. */
#[no_mangle]
pub extern "C" fn _start() -> ! {
    hello_vga::serial::init_logger(hello_vga::LOG_LEVEL);
    test_main();

    loop {}
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    hello_vga::test_panic_handler(info)
}

/* Make sure serial output and logging work after a basic boot so later tests can depend on them. */
#[test_case]
fn test_serial_println() {
    serial_println!("test_serial_println output");
    log::info!("test_serial_println log record");
}

/* Nothing in the framebuffer depends on the bootloader, so a tiny grid over a stack array works
before any paging setup. */
#[test_case]
fn test_small_grid_over_stack_memory() {
    let mut backing = [0u16; 4 * 3];
    let fill = ColorCode::new(Color::Black, Color::Black);
    let color_code = ColorCode::new(Color::Black, Color::Green);
    {
        let mut framebuffer = Framebuffer::from_region(MemoryRegion::from_cells(&mut backing), 4, 3)
            .expect("region too small");
        assert_eq!(framebuffer.width(), 4);
        assert_eq!(framebuffer.height(), 3);

        framebuffer.clear(fill);
        framebuffer.write_string(2, 0, "boot", color_code).expect("exact fit rejected");
        assert!(framebuffer.write_string(2, 1, "boot", color_code).is_err());
        assert_eq!(
            framebuffer.get_cell(2, 3),
            Ok(ScreenChar::new(b't', color_code))
        );
    }
    assert_eq!(&backing[8..], &[0x2062, 0x206f, 0x206f, 0x2074]);
    assert!(backing[..8].iter().all(|&cell| cell == 0x0020));
}
