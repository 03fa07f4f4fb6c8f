//! Virtual memory subsystem
//!
//! `paging` holds the address-space structures; this module owns the
//! kernel's distinguished address space and the "which directory is live"
//! cursor, and wraps the hardware switch calls.

pub mod paging;

pub use paging::{AddressSpace, EntryFlags, PageEntry};

use crate::arch;

/// Kernel-wide paging state: the kernel's own space (never released) and
/// the currently loaded directory root.
pub struct Vm {
    kernel_space: AddressSpace,
    current_root: usize,
    translation_enabled: bool,
}

impl Vm {
    /// Build the kernel address space with `kernel_flags` and record it as
    /// current. Translation stays off until `enable_address_translation`.
    pub fn new(kernel_flags: EntryFlags) -> Self {
        let kernel_space = AddressSpace::new(kernel_flags);
        let current_root = kernel_space.directory_base();
        Self {
            kernel_space,
            current_root,
            translation_enabled: false,
        }
    }

    pub fn kernel_space(&self) -> &AddressSpace {
        &self.kernel_space
    }

    /// Root of the directory the CPU is (logically) running under.
    pub fn current_root(&self) -> usize {
        self.current_root
    }

    pub fn is_kernel_active(&self) -> bool {
        self.current_root == self.kernel_space.directory_base()
    }

    /// Load `space` as the active address space.
    pub fn switch_to(&mut self, space: &AddressSpace) {
        let root = space.directory_base();
        arch::load_page_directory(root);
        self.current_root = root;
    }

    /// Return to the kernel's own address space.
    pub fn switch_to_kernel(&mut self) {
        let root = self.kernel_space.directory_base();
        arch::load_page_directory(root);
        self.current_root = root;
    }

    /// One-time boot action: load the kernel directory and turn paging on.
    pub fn enable_address_translation(&mut self) {
        if self.translation_enabled {
            return;
        }
        self.switch_to_kernel();
        arch::enable_address_translation();
        self.translation_enabled = true;
    }
}

/// Scoped switch into a task's address space.
///
/// Construction loads the task directory; dropping the guard restores the
/// kernel directory, so an early return mid-read cannot leave the wrong
/// space active.
pub struct TaskSpaceGuard<'a> {
    vm: &'a mut Vm,
}

impl<'a> TaskSpaceGuard<'a> {
    pub fn enter(vm: &'a mut Vm, space: &AddressSpace) -> Self {
        vm.switch_to(space);
        Self { vm }
    }
}

impl Drop for TaskSpaceGuard<'_> {
    fn drop(&mut self) {
        self.vm.switch_to_kernel();
    }
}
