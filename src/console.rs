//! Console output for the Ember kernel
//!
//! Provides basic text output for boot progress and fatal diagnostics.
//! On the real machine this writes VGA text memory directly; the test build
//! captures output in a buffer instead.

use core::fmt::{self, Write};
use spin::Mutex;

// VGA text-mode buffer
const VGA_MEMORY: usize = 0xB8000;
const VGA_WIDTH: usize = 80;
const VGA_HEIGHT: usize = 25;
const VGA_COLOR_WHITE: u8 = 15;

fn vga_entry(c: u8, color: u8) -> u16 {
    c as u16 | (color as u16) << 8
}

/// Console writer interface
pub struct Console {
    row: usize,
    column: usize,
    color: u8,
    #[cfg(test)]
    buffer: heapless::String<1024>,
}

impl Console {
    /// Create a new console instance
    pub const fn new() -> Self {
        Console {
            row: 0,
            column: 0,
            color: VGA_COLOR_WHITE,
            #[cfg(test)]
            buffer: heapless::String::new(),
        }
    }

    /// Write a byte to the console
    pub fn write_byte(&mut self, byte: u8) {
        #[cfg(test)]
        {
            if byte.is_ascii() {
                let _ = self.buffer.push(byte as char);
            }
        }

        #[cfg(not(test))]
        match byte {
            b'\n' => {
                self.column = 0;
                self.row += 1;
                if self.row == VGA_HEIGHT {
                    self.row = 0;
                }
            }
            b'\x08' => {
                if self.column > 0 {
                    self.column -= 1;
                    self.put_at(b' ', self.column, self.row);
                }
            }
            _ => {
                self.put_at(byte, self.column, self.row);
                self.column += 1;
                if self.column == VGA_WIDTH {
                    self.column = 0;
                    self.row += 1;
                    if self.row == VGA_HEIGHT {
                        self.row = 0;
                    }
                }
            }
        }
    }

    #[cfg(not(test))]
    fn put_at(&mut self, byte: u8, x: usize, y: usize) {
        let index = y * VGA_WIDTH + x;
        #[cfg(target_arch = "x86")]
        unsafe {
            let vga = VGA_MEMORY as *mut u16;
            vga.add(index).write_volatile(vga_entry(byte, self.color));
        }
        #[cfg(not(target_arch = "x86"))]
        let _ = (index, byte);
    }

    /// Write a string to the console
    pub fn write_str(&mut self, s: &str) {
        for byte in s.bytes() {
            self.write_byte(byte);
        }
    }

    /// Clear the console
    pub fn clear(&mut self) {
        self.row = 0;
        self.column = 0;
        self.color = VGA_COLOR_WHITE;

        #[cfg(test)]
        self.buffer.clear();

        #[cfg(all(target_arch = "x86", not(test)))]
        unsafe {
            let vga = VGA_MEMORY as *mut u16;
            for index in 0..VGA_WIDTH * VGA_HEIGHT {
                vga.add(index).write_volatile(vga_entry(b' ', self.color));
            }
        }
    }
}

impl fmt::Write for Console {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.write_str(s);
        Ok(())
    }
}

/// Global console instance
static CONSOLE: Mutex<Console> = Mutex::new(Console::new());

/// Initialize the console subsystem
pub fn init() {
    CONSOLE.lock().clear();
}

/// Print formatted text to console
pub fn print(args: fmt::Arguments) {
    let _ = CONSOLE.lock().write_fmt(args);
}

/// Print macro for kernel use
#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => {
        $crate::console::print(format_args!($($arg)*));
    };
}

/// Print with newline macro
#[macro_export]
macro_rules! println {
    () => {
        $crate::print!("\n");
    };
    ($($arg:tt)*) => {
        $crate::console::print(format_args!("{}\n", format_args!($($arg)*)))
    };
}
