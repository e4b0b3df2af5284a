#![no_std]
#![no_main]

use bootloader::{entry_point, BootInfo};
use core::panic::PanicInfo;
use hello_vga::vga_buffer::{Color, ColorCode, ScreenChar, BLANK, BUFFER_HEIGHT, BUFFER_WIDTH};
use hello_vga::{exit_qemu, serial_print, serial_println, QemuExitCode};

/* This test needs the BootInfo to find the real VGA text buffer, so it boots through the bootloader's entry
point and runs as a single test without the test harness. */
entry_point!(main);

fn main(boot_info: &'static BootInfo) -> ! {
    let mut framebuffer = hello_vga::init(boot_info);
    serial_print!("hello_world::hello_world_on_vga...\t");

    let greeting = "hello world!";
    let fill = ColorCode::new(Color::Black, Color::Black);
    let color_code = ColorCode::new(Color::Black, Color::Green);
    assert_eq!(color_code.as_byte(), 0x20);

    framebuffer.clear(fill);
    framebuffer
        .write_string(0, 0, greeting, color_code)
        .expect("greeting does not fit on one row");

    for (col, byte) in greeting.bytes().enumerate() {
        let cell = framebuffer.get_cell(0, col).expect("cell out of bounds");
        assert_eq!(cell.packed(), 0x2000 | byte as u16);
    }
    assert_eq!(framebuffer.get_cell(0, 0).map(ScreenChar::packed), Ok(0x2068));
    for row in 0..BUFFER_HEIGHT {
        let first_blank = if row == 0 { greeting.len() } else { 0 };
        for col in first_blank..BUFFER_WIDTH {
            assert_eq!(framebuffer.get_cell(row, col), Ok(ScreenChar::new(BLANK, fill)));
        }
    }

    serial_println!("[ok]");
    exit_qemu(QemuExitCode::Success);
    hello_vga::hlt_loop();
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    hello_vga::test_panic_handler(info)
}
