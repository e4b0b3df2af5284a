use lazy_static::lazy_static;
use log::{LevelFilter, Log, Metadata, Record};
use spin::Mutex;
use uart_16550::SerialPort;

/* The serial port is our only channel back to the host: QEMU redirects COM1 to its stdout (see the
test-args in Cargo.toml). Test results and log records both go through it. */

/* lazy_static makes sure the port is initialized exactly once, on first use. */
lazy_static! {
    pub static ref SERIAL1: Mutex<SerialPort> = {
        /* Pass the address of the first IO port of the UART. */
        let mut serial_port = unsafe { SerialPort::new(0x3F8) };
        serial_port.init();
        Mutex::new(serial_port)
    };
}

#[doc(hidden)]
pub fn _print(args: ::core::fmt::Arguments) {
    use core::fmt::Write;
    use x86_64::instructions::interrupts;

    interrupts::without_interrupts(|| {
        SERIAL1.lock().write_fmt(args).expect("Printing to serial failed");
    });
}

/// Prints to the host through the serial interface.
#[macro_export]
macro_rules! serial_print {
    ($($arg:tt)*) => {
        $crate::serial::_print(format_args!($($arg)*));
    };
}

/// Prints to the host through the serial interface, appending a newline.
#[macro_export]
macro_rules! serial_println {
    () => ($crate::serial_print!("\n"));
    ($fmt:expr) => ($crate::serial_print!(concat!($fmt, "\n")));
    ($fmt:expr, $($arg:tt)*) => ($crate::serial_print!(
        concat!($fmt, "\n"), $($arg)*));
}

/// Backend for the `log` facade that writes one line per record to COM1.
pub struct SerialLogger;

static LOGGER: SerialLogger = SerialLogger;

impl Log for SerialLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            _print(format_args!(
                "{:5} {:>12}~{:04} - {}\n",
                record.level(),
                record
                    .module_path()
                    .unwrap_or("?")
                    .trim_start_matches("hello_vga::"),
                record.line().unwrap_or(0),
                record.args(),
            ));
        }
    }

    fn flush(&self) {}
}

/// Routes `log` records to the serial port, filtered at `level`.
///
/// Only the first call installs the logger; later calls just adjust the level.
pub fn init_logger(level: LevelFilter) {
    let installed = log::set_logger(&LOGGER).is_ok();
    log::set_max_level(level);
    if installed {
        log::trace!("serial logger installed at {}", level);
    }
}
