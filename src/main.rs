/* Remove dependence on standard lib so we can build a freestanding Rust binary that
runs on bare metal. */
#![no_std]
/* Override default entry point for program since we don't have access to the Rust runtime. */
#![no_main]

use core::panic::PanicInfo;

use bootloader::{entry_point, BootInfo};
use hello_vga::vga_buffer::{Color, ColorCode};
use log::{error, info};

/* entry_point! checks the signature of kernel_main and exports it as the _start symbol the bootloader jumps to. */
entry_point!(kernel_main);

fn kernel_main(boot_info: &'static BootInfo) -> ! {
    let mut framebuffer = hello_vga::init(boot_info);

    framebuffer.clear(ColorCode::new(Color::Black, Color::Black));

    let greeting = "hello world!";
    // black text; green background
    let color_code = ColorCode::new(Color::Black, Color::Green);
    match framebuffer.write_string(0, 0, greeting, color_code) {
        Ok(()) => info!("wrote {:?}", greeting),
        Err(err) => error!("could not write {:?}: {}", greeting, err),
    }

    hello_vga::hlt_loop();
}

// This function is called on panic - we don't want to use the standard lib one..
#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    error!("{}", info);
    hello_vga::hlt_loop();
}
