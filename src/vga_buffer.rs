use core::fmt;
use core::mem;
use core::slice;

use log::debug;
use volatile::Volatile;

use crate::memory::MemoryRegion;

#[allow(dead_code)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)] // This makes sure each enum variant is stored as a u8. 4 bits would be enough but Rust doesn't have a u4 type.
pub enum Color {
    Black = 0,
    Blue = 1,
    Green = 2,
    Cyan = 3,
    Red = 4,
    Magenta = 5,
    Brown = 6,
    LightGray = 7,
    DarkGray = 8,
    LightBlue = 9,
    LightGreen = 10,
    LightCyan = 11,
    LightRed = 12,
    Pink = 13,
    Yellow = 14,
    White = 15,
}

impl Color {
    /// Maps the low four bits of `index` to a color.
    pub fn from_index(index: u8) -> Color {
        match index & 0x0f {
            0 => Color::Black,
            1 => Color::Blue,
            2 => Color::Green,
            3 => Color::Cyan,
            4 => Color::Red,
            5 => Color::Magenta,
            6 => Color::Brown,
            7 => Color::LightGray,
            8 => Color::DarkGray,
            9 => Color::LightBlue,
            10 => Color::LightGreen,
            11 => Color::LightCyan,
            12 => Color::LightRed,
            13 => Color::Pink,
            14 => Color::Yellow,
            _ => Color::White,
        }
    }
}

/* The attribute byte of a cell: bits 0-3 hold the foreground color, bits 4-6 the background color
and bit 7 is the blink flag. Only the eight dark colors fit in the background field. */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)] // use this attribute to ensure that ColorCode has the same representation as the contained u8.
pub struct ColorCode(u8);

impl ColorCode {
    pub const fn new(foreground: Color, background: Color) -> ColorCode {
        ColorCode(((background as u8) & 0x07) << 4 | (foreground as u8))
    }

    pub const fn from_byte(byte: u8) -> ColorCode {
        ColorCode(byte)
    }

    pub const fn as_byte(self) -> u8 {
        self.0
    }

    pub const fn with_blink(self) -> ColorCode {
        ColorCode(self.0 | 0x80)
    }

    pub fn foreground(self) -> Color {
        Color::from_index(self.0 & 0x0f)
    }

    pub fn background(self) -> Color {
        Color::from_index((self.0 >> 4) & 0x07)
    }

    pub const fn blink(self) -> bool {
        self.0 & 0x80 != 0
    }
}

/* One character cell. The C layout puts the character in the low byte and the attribute in the high
byte, which on little-endian x86 reads back as the 16-bit value `attribute << 8 | character`. */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)] // need this since default ordering of fields in structs is undefined; this guarantees a C-style layout
pub struct ScreenChar {
    pub ascii_character: u8,
    pub color_code: ColorCode,
}

impl ScreenChar {
    pub const fn new(ascii_character: u8, color_code: ColorCode) -> ScreenChar {
        ScreenChar {
            ascii_character,
            color_code,
        }
    }

    /// The cell as the hardware sees it, `attribute << 8 | character`.
    pub const fn packed(self) -> u16 {
        (self.color_code.0 as u16) << 8 | self.ascii_character as u16
    }

    pub const fn from_packed(value: u16) -> ScreenChar {
        ScreenChar {
            ascii_character: value as u8,
            color_code: ColorCode((value >> 8) as u8),
        }
    }
}

pub const BUFFER_HEIGHT: usize = 25;
pub const BUFFER_WIDTH: usize = 80;

/// Character written into every cell by [`Framebuffer::clear`].
pub const BLANK: u8 = b' ';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramebufferError {
    /// A write of `len` cells starting at (`row`, `col`) does not fit the grid.
    OutOfBounds {
        row: usize,
        col: usize,
        len: usize,
        width: usize,
        height: usize,
    },
    /// The memory region handed to the constructor cannot hold the grid.
    RegionTooSmall { required: usize, available: usize },
}

impl fmt::Display for FramebufferError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            FramebufferError::OutOfBounds {
                row,
                col,
                len,
                width,
                height,
            } => write!(
                f,
                "{} cell(s) at row {}, column {} do not fit a {}x{} grid",
                len, row, col, width, height
            ),
            FramebufferError::RegionTooSmall {
                required,
                available,
            } => write!(
                f,
                "region holds {} bytes but the grid needs {}",
                available, required
            ),
        }
    }
}

/// A typed view of a text-mode grid over memory somebody else owns.
///
/// Every access goes through [`Volatile`] so the compiler never elides writes the display
/// hardware is waiting for. The framebuffer never hands out the address it was built on.
pub struct Framebuffer<'a> {
    width: usize,
    height: usize,
    cells: &'a mut [Volatile<ScreenChar>],
}

impl<'a> Framebuffer<'a> {
    /// Builds a `width` x `height` grid over `region`.
    ///
    /// The region handle is trusted to describe mapped, writable memory; only its length is
    /// checked. Nothing is written, so the grid reads back whatever the memory already holds.
    pub fn from_region(
        region: MemoryRegion<'a>,
        width: usize,
        height: usize,
    ) -> Result<Framebuffer<'a>, FramebufferError> {
        let cell_count = width.checked_mul(height);
        let required = cell_count
            .and_then(|count| count.checked_mul(mem::size_of::<ScreenChar>()))
            .unwrap_or(usize::MAX);
        if region.len() < required {
            return Err(FramebufferError::RegionTooSmall {
                required,
                available: region.len(),
            });
        }

        // The length check above means the multiplication did not overflow.
        let cell_count = required / mem::size_of::<ScreenChar>();
        let cells = unsafe {
            // MemoryRegion guarantees `region.len()` bytes of exclusive, writable memory for 'a.
            // Volatile<ScreenChar> has the size and alignment of a pair of bytes.
            slice::from_raw_parts_mut(
                region.start().as_mut_ptr::<Volatile<ScreenChar>>(),
                cell_count,
            )
        };
        debug!(
            "framebuffer: {}x{} grid over a {} byte region",
            width,
            height,
            region.len()
        );

        Ok(Framebuffer {
            width,
            height,
            cells,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Blanks the whole grid with spaces drawn in `fill`.
    pub fn clear(&mut self, fill: ColorCode) {
        let blank = ScreenChar::new(BLANK, fill);
        for cell in self.cells.iter_mut() {
            cell.write(blank);
        }
    }

    /// Writes the bytes of `text` into consecutive cells starting at (`row`, `col`).
    ///
    /// Fails with [`FramebufferError::OutOfBounds`] when `row >= height` or when the text runs
    /// past the end of the row. Nothing is written on failure.
    pub fn write_string(
        &mut self,
        row: usize,
        col: usize,
        text: &str,
        color_code: ColorCode,
    ) -> Result<(), FramebufferError> {
        let start = self.index(row, col, text.len())?;
        let cells = &mut self.cells[start..start + text.len()];
        for (cell, byte) in cells.iter_mut().zip(text.bytes()) {
            cell.write(ScreenChar::new(byte, color_code));
        }
        Ok(())
    }

    /// Writes the bytes of `text` linearly from cell `row * width + col` without any checks.
    ///
    /// A text longer than the rest of the row continues on the next row, since the cells are
    /// contiguous; nothing stops it at the end of the grid.
    ///
    /// # Safety
    ///
    /// `row * width + col + text.len()` must not exceed `width * height`. Anything past the grid
    /// is memory this framebuffer does not own.
    pub unsafe fn write_string_unchecked(
        &mut self,
        row: usize,
        col: usize,
        text: &str,
        color_code: ColorCode,
    ) {
        let start = row * self.width + col;
        let base = self.cells.as_mut_ptr();
        for (offset, byte) in text.bytes().enumerate() {
            (*base.add(start + offset)).write(ScreenChar::new(byte, color_code));
        }
    }

    pub fn set_cell(
        &mut self,
        row: usize,
        col: usize,
        character: u8,
        color_code: ColorCode,
    ) -> Result<(), FramebufferError> {
        let index = self.index(row, col, 1)?;
        self.cells[index].write(ScreenChar::new(character, color_code));
        Ok(())
    }

    pub fn get_cell(&self, row: usize, col: usize) -> Result<ScreenChar, FramebufferError> {
        let index = self.index(row, col, 1)?;
        Ok(self.cells[index].read())
    }

    /// Index of (`row`, `col`) if `len` cells starting there stay inside that row.
    fn index(&self, row: usize, col: usize, len: usize) -> Result<usize, FramebufferError> {
        let fits = row < self.height
            && col
                .checked_add(len)
                .map_or(false, |end| end <= self.width);
        if !fits {
            return Err(FramebufferError::OutOfBounds {
                row,
                col,
                len,
                width: self.width,
                height: self.height,
            });
        }
        Ok(row * self.width + col)
    }
}

#[cfg(test)]
const CELL_COUNT: usize = BUFFER_WIDTH * BUFFER_HEIGHT;

#[cfg(test)]
fn grid_over(backing: &mut [u16]) -> Framebuffer<'_> {
    Framebuffer::from_region(MemoryRegion::from_cells(backing), BUFFER_WIDTH, BUFFER_HEIGHT)
        .expect("backing too small for the grid")
}

#[test_case]
fn test_color_code_layout() {
    let code = ColorCode::new(Color::Black, Color::Green);
    assert_eq!(code.as_byte(), 0x20);
    assert_eq!(code.foreground(), Color::Black);
    assert_eq!(code.background(), Color::Green);
    assert!(!code.blink());

    let code = ColorCode::new(Color::Yellow, Color::Blue).with_blink();
    assert_eq!(code.as_byte(), 0x9e);
    assert_eq!(code.foreground(), Color::Yellow);
    assert_eq!(code.background(), Color::Blue);
    assert!(code.blink());
}

#[test_case]
fn test_screen_char_packing() {
    let cell = ScreenChar::new(b'h', ColorCode::from_byte(0x20));
    assert_eq!(cell.packed(), 0x2068);
    assert_eq!(ScreenChar::from_packed(0x2068), cell);
}

#[test_case]
fn test_set_get_round_trip() {
    let mut backing = [0u16; CELL_COUNT];
    let mut framebuffer = grid_over(&mut backing);
    for row in 0..BUFFER_HEIGHT {
        for col in 0..BUFFER_WIDTH {
            let character = (row * BUFFER_WIDTH + col) as u8;
            let color_code = ColorCode::from_byte((row as u8) << 4 | (col % 16) as u8);
            framebuffer.set_cell(row, col, character, color_code).unwrap();
            assert_eq!(
                framebuffer.get_cell(row, col),
                Ok(ScreenChar::new(character, color_code))
            );
        }
    }
}

#[test_case]
fn test_clear_fills_every_cell() {
    let mut backing = [0xffffu16; CELL_COUNT];
    let fill = ColorCode::new(Color::LightGray, Color::Blue);
    let mut framebuffer = grid_over(&mut backing);
    framebuffer.clear(fill);
    for row in 0..BUFFER_HEIGHT {
        for col in 0..BUFFER_WIDTH {
            assert_eq!(framebuffer.get_cell(row, col), Ok(ScreenChar::new(BLANK, fill)));
        }
    }
}

#[test_case]
fn test_clear_is_idempotent() {
    let fill = ColorCode::new(Color::White, Color::Red);
    let mut once = [0x1234u16; CELL_COUNT];
    let mut twice = [0x1234u16; CELL_COUNT];
    grid_over(&mut once).clear(fill);
    {
        let mut framebuffer = grid_over(&mut twice);
        framebuffer.clear(fill);
        framebuffer.clear(fill);
    }
    assert!(once.iter().eq(twice.iter()));
}

#[test_case]
fn test_hello_world_cells() {
    let text = "hello world!";
    let mut backing = [0u16; CELL_COUNT];
    {
        let mut framebuffer = grid_over(&mut backing);
        framebuffer.clear(ColorCode::new(Color::Black, Color::Black));
        framebuffer
            .write_string(0, 0, text, ColorCode::new(Color::Black, Color::Green))
            .unwrap();
    }
    assert_eq!(backing[0], 0x2068);
    assert_eq!(backing[1], 0x2065);
    for (i, byte) in text.bytes().enumerate() {
        assert_eq!(backing[i], 0x2000 | byte as u16);
    }
    for cell in &backing[text.len()..] {
        assert_eq!(*cell, 0x0020);
    }
}

#[test_case]
fn test_out_of_bounds_accessors() {
    let mut backing = [0u16; CELL_COUNT];
    let mut framebuffer = grid_over(&mut backing);
    let color_code = ColorCode::new(Color::White, Color::Black);

    assert!(matches!(
        framebuffer.get_cell(BUFFER_HEIGHT, 0),
        Err(FramebufferError::OutOfBounds { .. })
    ));
    assert!(matches!(
        framebuffer.get_cell(0, BUFFER_WIDTH),
        Err(FramebufferError::OutOfBounds { .. })
    ));
    assert!(matches!(
        framebuffer.set_cell(BUFFER_HEIGHT, 0, b'x', color_code),
        Err(FramebufferError::OutOfBounds { .. })
    ));
    assert_eq!(
        framebuffer.set_cell(0, BUFFER_WIDTH, b'x', color_code),
        Err(FramebufferError::OutOfBounds {
            row: 0,
            col: BUFFER_WIDTH,
            len: 1,
            width: BUFFER_WIDTH,
            height: BUFFER_HEIGHT,
        })
    );
    assert!(framebuffer
        .set_cell(BUFFER_HEIGHT - 1, BUFFER_WIDTH - 1, b'x', color_code)
        .is_ok());
}

#[test_case]
fn test_write_string_bounds() {
    let mut backing = [0u16; CELL_COUNT];
    let mut framebuffer = grid_over(&mut backing);
    let color_code = ColorCode::new(Color::White, Color::Black);

    assert!(framebuffer.write_string(0, BUFFER_WIDTH - 4, "fits", color_code).is_ok());
    assert_eq!(
        framebuffer.write_string(1, BUFFER_WIDTH - 4, "spill", color_code),
        Err(FramebufferError::OutOfBounds {
            row: 1,
            col: BUFFER_WIDTH - 4,
            len: 5,
            width: BUFFER_WIDTH,
            height: BUFFER_HEIGHT,
        })
    );
    assert!(matches!(
        framebuffer.write_string(BUFFER_HEIGHT, 0, "x", color_code),
        Err(FramebufferError::OutOfBounds { .. })
    ));
    assert_eq!(
        framebuffer.write_string(0, BUFFER_WIDTH, "x", color_code),
        Err(FramebufferError::OutOfBounds {
            row: 0,
            col: BUFFER_WIDTH,
            len: 1,
            width: BUFFER_WIDTH,
            height: BUFFER_HEIGHT,
        })
    );
    // an empty string fits even at the end of the row
    assert!(framebuffer.write_string(0, BUFFER_WIDTH, "", color_code).is_ok());
    assert!(matches!(
        framebuffer.write_string(0, usize::MAX, "x", color_code),
        Err(FramebufferError::OutOfBounds { .. })
    ));
}

#[test_case]
fn test_rejected_write_leaves_cells_untouched() {
    let fill = ColorCode::new(Color::Black, Color::Cyan);
    let mut backing = [0u16; CELL_COUNT];
    let mut framebuffer = grid_over(&mut backing);
    framebuffer.clear(fill);
    let long = "this line is far too long to start this close to the right edge of the screen";
    assert!(framebuffer.write_string(2, 10, long, fill).is_err());
    for col in 0..BUFFER_WIDTH {
        assert_eq!(framebuffer.get_cell(2, col), Ok(ScreenChar::new(BLANK, fill)));
    }
}

#[test_case]
fn test_view_does_not_initialize() {
    let mut backing = [0xa55au16; CELL_COUNT];
    let framebuffer = grid_over(&mut backing);
    for row in 0..BUFFER_HEIGHT {
        for col in 0..BUFFER_WIDTH {
            assert_eq!(
                framebuffer.get_cell(row, col),
                Ok(ScreenChar::from_packed(0xa55a))
            );
        }
    }
}

#[test_case]
fn test_region_too_small() {
    let mut backing = [0u16; CELL_COUNT - 1];
    let result = Framebuffer::from_region(
        MemoryRegion::from_cells(&mut backing),
        BUFFER_WIDTH,
        BUFFER_HEIGHT,
    );
    assert!(matches!(
        result,
        Err(FramebufferError::RegionTooSmall {
            required: 4000,
            available: 3998,
        })
    ));
}

#[test_case]
fn test_unchecked_write_is_linear() {
    let color_code = ColorCode::new(Color::Black, Color::Green);
    let mut checked = [0u16; CELL_COUNT];
    let mut unchecked = [0u16; CELL_COUNT];
    grid_over(&mut checked)
        .write_string(3, 7, "hello world!", color_code)
        .unwrap();
    unsafe {
        grid_over(&mut unchecked).write_string_unchecked(3, 7, "hello world!", color_code);
    }
    assert!(checked.iter().eq(unchecked.iter()));

    // past the end of row 0 the bytes land at the start of row 1
    let mut backing = [0u16; CELL_COUNT];
    unsafe {
        grid_over(&mut backing).write_string_unchecked(0, BUFFER_WIDTH - 2, "wrap", color_code);
    }
    assert_eq!(backing[BUFFER_WIDTH - 2], 0x2000 | b'w' as u16);
    assert_eq!(backing[BUFFER_WIDTH - 1], 0x2000 | b'r' as u16);
    assert_eq!(backing[BUFFER_WIDTH], 0x2000 | b'a' as u16);
    assert_eq!(backing[BUFFER_WIDTH + 1], 0x2000 | b'p' as u16);
}

#[test_case]
fn test_clear_stays_inside_grid() {
    let mut backing = [0xbeefu16; CELL_COUNT + 8];
    {
        let mut framebuffer = grid_over(&mut backing);
        framebuffer.clear(ColorCode::new(Color::Black, Color::Black));
        assert!(framebuffer
            .write_string(BUFFER_HEIGHT - 1, BUFFER_WIDTH - 2, "tail", ColorCode::from_byte(0x20))
            .is_err());
    }
    assert!(backing[..CELL_COUNT].iter().all(|&cell| cell == 0x0020));
    assert!(backing[CELL_COUNT..].iter().all(|&cell| cell == 0xbeef));
}
