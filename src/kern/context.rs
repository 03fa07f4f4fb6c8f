//! The kernel context
//!
//! One explicitly constructed object owns every process-wide structure:
//! the block heap, the paging state, the task registry, the process table
//! and the syscall table. The boot path builds exactly one and publishes
//! it through a `spin::Once`; tests build their own over private regions.

use core::ptr::NonNull;

use spin::{Mutex, Once};

use crate::fs::{FileIo, OpenMode};
use crate::kern::heap::Heap;
use crate::kern::process::{Process, ProcessTable};
use crate::kern::syscall::{SyscallArgs, SyscallTable};
use crate::kern::task::TaskRegistry;
use crate::arch::InterruptFrame;
use crate::types::{
    page_align_up, KernError, KernResult, ProcessId, PROGRAM_STACK_VADDR_BOTTOM, PROGRAM_VADDR,
    USER_STACK_SIZE,
};
use crate::vm::{EntryFlags, TaskSpaceGuard, Vm};

/// Process-wide kernel state. Initialized once at boot, mutated through
/// the kernel's lifetime, never torn down.
pub struct Kernel {
    pub heap: Heap,
    pub vm: Vm,
    pub tasks: TaskRegistry,
    pub processes: ProcessTable,
    pub syscalls: SyscallTable,
}

impl Kernel {
    /// Build the kernel context with a heap over `[heap_start, heap_end)`.
    pub fn new(heap_start: usize, heap_end: usize) -> KernResult<Self> {
        Ok(Self {
            heap: Heap::new(heap_start, heap_end)?,
            vm: Vm::new(EntryFlags::PRESENT | EntryFlags::WRITABLE | EntryFlags::USER),
            tasks: TaskRegistry::new(),
            processes: ProcessTable::new(),
            syscalls: SyscallTable::new(),
        })
    }

    /// Load the binary at `path` into the first free process slot.
    pub fn load_process(&mut self, path: &str, fio: &mut dyn FileIo) -> KernResult<ProcessId> {
        let slot = self.processes.find_free_slot()?;
        self.load_process_into_slot(path, slot, fio)
    }

    /// Load the binary at `path` into `slot`.
    ///
    /// On any failure everything already built is released again before
    /// the error returns: no partially constructed process is ever
    /// published into the table.
    pub fn load_process_into_slot(
        &mut self,
        path: &str,
        slot: ProcessId,
        fio: &mut dyn FileIo,
    ) -> KernResult<ProcessId> {
        if self.processes.get(slot).is_some() {
            return Err(KernError::SlotTaken);
        }

        let (image, image_size) = self.load_image(path, fio)?;

        let stack = match self.heap.alloc_zeroed(USER_STACK_SIZE) {
            Ok(ptr) => ptr,
            Err(err) => {
                self.heap.free(image);
                return Err(err);
            }
        };

        let task = self.tasks.create(slot);

        let image_addr = image.as_ptr() as usize;
        let stack_addr = stack.as_ptr() as usize;
        let user_flags = EntryFlags::PRESENT | EntryFlags::USER | EntryFlags::WRITABLE;

        let mapped = self
            .tasks
            .get_mut(task)
            .ok_or(KernError::InvalidArgument)
            .and_then(|t| {
                // Program region: virtual load address onto the image pages,
                // end rounded up to the next page boundary.
                t.space.map_range(
                    PROGRAM_VADDR,
                    image_addr,
                    page_align_up(image_addr + image_size),
                    user_flags,
                )?;
                // Stack region: grows down from the fixed top.
                t.space.map_range(
                    PROGRAM_STACK_VADDR_BOTTOM,
                    stack_addr,
                    stack_addr + USER_STACK_SIZE,
                    user_flags,
                )
            })
            .and_then(|()| Process::new(path, task, image_addr, image_size, stack_addr));

        let process = match mapped {
            Ok(process) => process,
            Err(err) => {
                self.tasks.release(task);
                self.heap.free(stack);
                self.heap.free(image);
                return Err(err);
            }
        };

        self.processes.insert(slot, process)?;
        Ok(slot)
    }

    /// Open, stat and fully read the binary into one heap allocation.
    fn load_image(&mut self, path: &str, fio: &mut dyn FileIo) -> KernResult<(NonNull<u8>, usize)> {
        let handle = fio.open(path, OpenMode::Read)?;

        let result = (|| {
            let stat = fio.stat(handle)?;
            if stat.size == 0 {
                return Err(KernError::Io);
            }

            let image = self.heap.alloc_zeroed(stat.size)?;
            let buffer =
                unsafe { core::slice::from_raw_parts_mut(image.as_ptr(), stat.size) };
            match fio.read(handle, buffer) {
                Ok(count) if count == stat.size => Ok((image, stat.size)),
                Ok(_) => {
                    self.heap.free(image);
                    Err(KernError::Io)
                }
                Err(err) => {
                    self.heap.free(image);
                    Err(err)
                }
            }
        })();

        let _ = fio.close(handle);
        result
    }

    /// Tear a process down: its tracked allocations, stack, image and task.
    pub fn remove_process(&mut self, id: ProcessId) -> KernResult<()> {
        let process = self.processes.take(id).ok_or(KernError::InvalidArgument)?;

        for &allocation in process.allocations() {
            if let Some(ptr) = NonNull::new(allocation as *mut u8) {
                self.heap.free(ptr);
            }
        }
        if let Some(stack) = NonNull::new(process.stack as *mut u8) {
            self.heap.free(stack);
        }
        if let Some(image) = NonNull::new(process.image as *mut u8) {
            self.heap.free(image);
        }

        self.tasks.release(process.task);
        Ok(())
    }

    /// Handle a syscall trap.
    ///
    /// The sequence is fixed: enter the kernel address space, save the
    /// trapping task's registers, pull the argument words out of the
    /// task's stack under a scoped switch into its space, run the handler
    /// back in the kernel space, then reload the current task's space for
    /// the return to user mode. Recoverable argument errors come back as
    /// errno values; a trap with no task ever created is a violated boot
    /// invariant and halts.
    pub fn dispatch_syscall(&mut self, number: usize, frame: &InterruptFrame) -> usize {
        self.vm.switch_to_kernel();

        let current = match self.tasks.current() {
            Some(id) => id,
            None => panic!("syscall trap with no task"),
        };
        self.tasks.save_state(current, frame);

        let args = {
            let task = self.tasks.get(current).expect("current task unlinked");
            let _guard = TaskSpaceGuard::enter(&mut self.vm, &task.space);
            SyscallArgs::load(frame, &task.space)
        };

        let result = match args {
            Ok(args) => self.syscalls.invoke(number, &args),
            Err(err) => err.as_errno() as usize,
        };

        let task = self.tasks.get(current).expect("current task unlinked");
        self.vm.switch_to(&task.space);
        result
    }
}

// ============================================================================
// Boot-time singleton
// ============================================================================

static KERNEL: Once<Mutex<Kernel>> = Once::new();

/// Construct and publish the kernel context. A malformed heap region here
/// is a boot-time misconfiguration and halts.
pub fn init(heap_start: usize, heap_end: usize) {
    KERNEL.call_once(|| {
        let kernel = Kernel::new(heap_start, heap_end).expect("kernel heap region misconfigured");
        Mutex::new(kernel)
    });
}

/// The published kernel context. Panics before `init`.
pub fn kernel() -> &'static Mutex<Kernel> {
    KERNEL.get().expect("kernel not initialized")
}
