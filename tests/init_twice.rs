#![no_std]
#![no_main]

use bootloader::{entry_point, BootInfo};
use core::panic::PanicInfo;
use hello_vga::{exit_qemu, serial_print, serial_println, QemuExitCode};

/* A second init would hand out a second framebuffer over the same VGA memory, so it has to panic.
Success is reported from the panic handler. */
entry_point!(main);

fn main(boot_info: &'static BootInfo) -> ! {
    let _framebuffer = hello_vga::init(boot_info);
    serial_print!("init_twice::second_init_panics...\t");

    let _second = hello_vga::init(boot_info);

    serial_println!("[test did not panic]");
    exit_qemu(QemuExitCode::Failed);
    hello_vga::hlt_loop();
}

#[panic_handler]
fn panic(_info: &PanicInfo) -> ! {
    serial_println!("[ok]");
    exit_qemu(QemuExitCode::Success);
    hello_vga::hlt_loop();
}
