//! Ember kernel binary entry point

#![cfg_attr(target_arch = "x86", no_std)]
#![cfg_attr(target_arch = "x86", no_main)]

extern crate alloc;

#[cfg(target_arch = "x86")]
mod boot {
    use core::panic::PanicInfo;

    use ember::arch::x86::{gdt, tss::TaskStateSegment};
    use ember::fs::MemoryFs;
    use ember::kern::syscall::SyscallArgs;
    use ember::kern::{kernel, BootAllocator};
    use ember::types::KERNEL_DATA_SELECTOR;
    use ember::{arch, console, print, println};

    // Physical memory layout fixed by the boot loader hand-off.
    const KERNEL_STACK_TOP: u32 = 0x0060_0000;
    const BLOCK_HEAP_START: usize = 0x0100_0000;
    const BLOCK_HEAP_END: usize = 0x0740_0000;
    const BOOT_HEAP_START: usize = 0x0800_0000;
    const BOOT_HEAP_END: usize = 0x0C00_0000;

    /// Backing store for `Box`/`Vec` in the kernel image.
    #[global_allocator]
    static BOOT_ALLOCATOR: BootAllocator = BootAllocator::empty();

    static TSS: TaskStateSegment = TaskStateSegment::new(KERNEL_STACK_TOP, KERNEL_DATA_SELECTOR);

    #[panic_handler]
    fn panic(info: &PanicInfo) -> ! {
        ember::panic::kernel_panic(info)
    }

    #[no_mangle]
    pub extern "C" fn _start() -> ! {
        kernel_main()
    }

    /// Debug syscall: report the marshalled argument words.
    fn sys_debug(args: &SyscallArgs) -> usize {
        println!(
            "[SYS] debug({}, {}, {}, {}, {})",
            args.get(0),
            args.get(1),
            args.get(2),
            args.get(3),
            args.get(4)
        );
        args.get(0) as usize
    }

    fn kernel_main() -> ! {
        console::init();
        println!("\n=== {} {} ===", ember::NAME, ember::VERSION);
        println!("");

        print!("[INIT] Boot allocator... ");
        BOOT_ALLOCATOR.init(BOOT_HEAP_START, BOOT_HEAP_END);
        println!("OK");

        // Descriptor tables and the TSS must go in before any trap can
        // arrive; a nested trap here would run on half-built state.
        print!("[INIT] Descriptor tables... ");
        arch::with_interrupts_disabled(|| {
            let tss_base = &TSS as *const TaskStateSegment as u32;
            let tss_limit = core::mem::size_of::<TaskStateSegment>() as u32 - 1;
            gdt::install(tss_base, tss_limit);
        });
        println!("OK");

        print!("[INIT] Kernel context... ");
        ember::kern::context::init(BLOCK_HEAP_START, BLOCK_HEAP_END);
        println!("OK");

        print!("[INIT] Address translation... ");
        kernel().lock().vm.enable_address_translation();
        println!("OK");

        print!("[INIT] Syscall table... ");
        kernel().lock().syscalls.register(0, sys_debug);
        println!("OK");

        // Bring up the first user program through the file-I/O boundary.
        print!("[INIT] First process... ");
        let mut fio = MemoryFs::new();
        fio.add_file("0:/boot.bin", BOOT_PROGRAM)
            .expect("embedded boot program too large");
        match kernel().lock().load_process("0:/boot.bin", &mut fio) {
            Ok(slot) => println!("OK (slot {})", slot.0),
            Err(err) => println!("FAILED ({})", err.as_errno()),
        }

        arch::enable_interrupts();

        println!("{} initialized, waiting for traps", ember::NAME);
        arch::halt();
    }

    /// Placeholder first program until the disk driver hands over real
    /// binaries: a tight `int 0x80` / `jmp` loop.
    const BOOT_PROGRAM: &[u8] = &[0xCD, 0x80, 0xEB, 0xFC];
}

#[cfg(not(target_arch = "x86"))]
fn main() {
    // The kernel image only means something on a 32-bit x86 target; the
    // host build exists so the test suite links.
}
