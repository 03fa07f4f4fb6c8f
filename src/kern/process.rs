//! Process records
//!
//! A process owns the record of one loaded program: the path it came from,
//! its task, the kernel-memory buffer holding the binary image, the user
//! stack buffer, and every heap allocation made on its behalf so teardown
//! can release them in bulk. At most one process occupies a table slot.

use crate::types::{
    KernError, KernResult, ProcessId, TaskId, MAX_PATH, MAX_PROCESSES, MAX_PROCESS_ALLOCATIONS,
};

/// The owning record for one loaded program.
pub struct Process {
    path: heapless::String<MAX_PATH>,
    /// Main task of the process.
    pub task: TaskId,
    /// Kernel-memory buffer holding the loaded binary image.
    pub image: usize,
    pub image_size: usize,
    /// Kernel-memory buffer backing the user stack.
    pub stack: usize,
    /// Heap allocations made on the process's behalf, released at teardown.
    allocations: heapless::Vec<usize, MAX_PROCESS_ALLOCATIONS>,
}

impl Process {
    pub fn new(
        path: &str,
        task: TaskId,
        image: usize,
        image_size: usize,
        stack: usize,
    ) -> KernResult<Self> {
        let mut bounded = heapless::String::new();
        bounded
            .push_str(path)
            .map_err(|_| KernError::InvalidArgument)?;

        Ok(Self {
            path: bounded,
            task,
            image,
            image_size,
            stack,
            allocations: heapless::Vec::new(),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Record a heap allocation owned by this process.
    pub fn track_allocation(&mut self, ptr: usize) -> KernResult<()> {
        self.allocations
            .push(ptr)
            .map_err(|_| KernError::OutOfResources)
    }

    /// Forget one tracked allocation (the caller frees it).
    pub fn untrack_allocation(&mut self, ptr: usize) -> bool {
        match self.allocations.iter().position(|&p| p == ptr) {
            Some(index) => {
                self.allocations.swap_remove(index);
                true
            }
            None => false,
        }
    }

    pub fn allocations(&self) -> &[usize] {
        &self.allocations
    }
}

/// Bounded table of process slots.
pub struct ProcessTable {
    slots: [Option<Process>; MAX_PROCESSES],
}

impl ProcessTable {
    pub const fn new() -> Self {
        Self {
            slots: [const { None }; MAX_PROCESSES],
        }
    }

    /// First vacant slot, or out-of-resources when the table is full.
    pub fn find_free_slot(&self) -> KernResult<ProcessId> {
        self.slots
            .iter()
            .position(Option::is_none)
            .map(ProcessId)
            .ok_or(KernError::OutOfResources)
    }

    pub fn get(&self, id: ProcessId) -> Option<&Process> {
        self.slots.get(id.0).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: ProcessId) -> Option<&mut Process> {
        self.slots.get_mut(id.0).and_then(Option::as_mut)
    }

    /// Publish a fully built process into `slot`.
    pub fn insert(&mut self, slot: ProcessId, process: Process) -> KernResult<()> {
        let entry = self
            .slots
            .get_mut(slot.0)
            .ok_or(KernError::InvalidArgument)?;
        if entry.is_some() {
            return Err(KernError::SlotTaken);
        }
        *entry = Some(process);
        Ok(())
    }

    /// Remove and return the process in `slot`.
    pub fn take(&mut self, slot: ProcessId) -> Option<Process> {
        self.slots.get_mut(slot.0).and_then(Option::take)
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
