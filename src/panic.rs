//! Kernel panic path
//!
//! Fatal conditions (boot-time misconfiguration, violated invariants) end up
//! here: report a diagnostic through the console, then halt the processor.
//! Nothing is unwound and nothing recovers.

use core::panic::PanicInfo;

pub fn kernel_panic(info: &PanicInfo) -> ! {
    crate::println!("\n!!! KERNEL PANIC !!!");

    if let Some(location) = info.location() {
        crate::println!("Location: {}:{}", location.file(), location.line());
    }

    crate::println!("Message: {}", info.message());

    crate::println!("System halted.");

    crate::arch::halt();
}
