//! Task registry
//!
//! A task is one schedulable execution context: an owned address space plus
//! a saved register snapshot. Live tasks form a doubly linked list held in
//! an arena of slots, with `next`/`prev`/`current` stored as indices so a
//! release can never leave a dangling pointer behind.
//!
//! Rotation order is list order: `next_after` walks forward and wraps from
//! the tail to the head. Nothing rotates preemptively; rotation happens
//! only when a caller asks for the next task or releases the current one.

use alloc::vec::Vec;

use crate::arch::InterruptFrame;
use crate::types::{
    ProcessId, TaskId, PROGRAM_STACK_VADDR_TOP, PROGRAM_VADDR, USER_CODE_SELECTOR,
    USER_DATA_SELECTOR,
};
use crate::vm::{AddressSpace, EntryFlags};

/// Saved CPU state of a task while it is not running. Field order matches
/// the hardware restore path.
#[derive(Debug, Clone, Copy, Default)]
#[repr(C)]
pub struct Registers {
    pub edi: u32,
    pub esi: u32,
    pub ebp: u32,
    pub ebx: u32,
    pub edx: u32,
    pub ecx: u32,
    pub eax: u32,
    pub ip: u32,
    pub cs: u32,
    pub flags: u32,
    pub esp: u32,
    pub ss: u32,
}

/// One execution context.
pub struct Task {
    /// The task's own 4 GiB address space.
    pub space: AddressSpace,
    /// Register snapshot captured at the last trap.
    pub registers: Registers,
    /// Owning process.
    pub process: ProcessId,
    next: Option<TaskId>,
    prev: Option<TaskId>,
}

/// Arena-backed doubly linked task list with a floating current cursor.
pub struct TaskRegistry {
    slots: Vec<Option<Task>>,
    head: Option<TaskId>,
    tail: Option<TaskId>,
    current: Option<TaskId>,
}

impl TaskRegistry {
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            head: None,
            tail: None,
            current: None,
        }
    }

    /// Create a task for `process` and append it at the tail. The first
    /// task ever linked also becomes current.
    pub fn create(&mut self, process: ProcessId) -> TaskId {
        let space =
            AddressSpace::new(EntryFlags::PRESENT | EntryFlags::WRITABLE | EntryFlags::USER);

        let registers = Registers {
            ip: PROGRAM_VADDR as u32,
            cs: USER_CODE_SELECTOR as u32,
            ss: USER_DATA_SELECTOR as u32,
            esp: PROGRAM_STACK_VADDR_TOP as u32,
            ..Registers::default()
        };

        let task = Task {
            space,
            registers,
            process,
            next: None,
            prev: self.tail,
        };

        let id = match self.slots.iter().position(Option::is_none) {
            Some(vacant) => {
                self.slots[vacant] = Some(task);
                TaskId(vacant)
            }
            None => {
                self.slots.push(Some(task));
                TaskId(self.slots.len() - 1)
            }
        };

        match self.tail {
            Some(tail) => {
                self.task_mut(tail).next = Some(id);
                self.tail = Some(id);
            }
            None => {
                self.head = Some(id);
                self.tail = Some(id);
                self.current = Some(id);
            }
        }

        id
    }

    /// Release a task: drop its address space and unlink it, fixing up
    /// head, tail and current. If the removed task was current, current
    /// advances to the next task in list order, wrapping to the head, or
    /// to none when the list empties.
    pub fn release(&mut self, id: TaskId) {
        let (prev, next) = match self.get(id) {
            Some(task) => (task.prev, task.next),
            None => return,
        };

        if let Some(prev) = prev {
            self.task_mut(prev).next = next;
        }
        if let Some(next) = next {
            self.task_mut(next).prev = prev;
        }
        if self.head == Some(id) {
            self.head = next;
        }
        if self.tail == Some(id) {
            self.tail = prev;
        }
        if self.current == Some(id) {
            self.current = next.or(self.head);
        }

        // Dropping the slot releases the address space with it.
        self.slots[id.0] = None;
    }

    /// The current task, or none before any task exists.
    pub fn current(&self) -> Option<TaskId> {
        self.current
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.slots.get(id.0).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: TaskId) -> Option<&mut Task> {
        self.slots.get_mut(id.0).and_then(Option::as_mut)
    }

    fn task_mut(&mut self, id: TaskId) -> &mut Task {
        self.get_mut(id).expect("task list links a vacant slot")
    }

    /// The task following `id` in list order, wrapping from the tail to
    /// the head. Defines the round-robin rotation order.
    pub fn next_after(&self, id: TaskId) -> Option<TaskId> {
        let task = self.get(id)?;
        task.next.or(self.head)
    }

    /// Number of live tasks.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Copy the trap frame into the task's register snapshot.
    pub fn save_state(&mut self, id: TaskId, frame: &InterruptFrame) {
        let task = self.task_mut(id);
        task.registers = Registers {
            edi: frame.edi,
            esi: frame.esi,
            ebp: frame.ebp,
            ebx: frame.ebx,
            edx: frame.edx,
            ecx: frame.ecx,
            eax: frame.eax,
            ip: frame.ip,
            cs: frame.cs,
            flags: frame.flags,
            esp: frame.esp,
            ss: frame.ss,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn registry_with(count: usize) -> (TaskRegistry, Vec<TaskId>) {
        let mut registry = TaskRegistry::new();
        let ids = (0..count).map(|i| registry.create(ProcessId(i))).collect();
        (registry, ids)
    }

    /// Walk `next_after` from `start` once around the list.
    fn rotation(registry: &TaskRegistry, start: TaskId) -> Vec<TaskId> {
        let mut order = vec![start];
        let mut at = start;
        for _ in 1..registry.len() {
            at = registry.next_after(at).unwrap();
            order.push(at);
        }
        order
    }

    #[test]
    fn test_first_task_becomes_current() {
        let mut registry = TaskRegistry::new();
        assert_eq!(registry.current(), None);

        let first = registry.create(ProcessId(0));
        assert_eq!(registry.current(), Some(first));

        let _second = registry.create(ProcessId(1));
        assert_eq!(registry.current(), Some(first));
    }

    #[test]
    fn test_new_task_register_snapshot() {
        let (registry, ids) = registry_with(1);
        let regs = &registry.get(ids[0]).unwrap().registers;

        assert_eq!(regs.ip, PROGRAM_VADDR as u32);
        assert_eq!(regs.esp, PROGRAM_STACK_VADDR_TOP as u32);
        assert_eq!(regs.cs, USER_CODE_SELECTOR as u32);
        assert_eq!(regs.ss, USER_DATA_SELECTOR as u32);
        assert_eq!(regs.eax, 0);
    }

    #[test]
    fn test_rotation_wraps_at_tail() {
        let (registry, ids) = registry_with(3);

        assert_eq!(registry.next_after(ids[0]), Some(ids[1]));
        assert_eq!(registry.next_after(ids[1]), Some(ids[2]));
        assert_eq!(registry.next_after(ids[2]), Some(ids[0]));
    }

    #[test]
    fn test_single_task_rotates_to_itself() {
        let (registry, ids) = registry_with(1);
        assert_eq!(registry.next_after(ids[0]), Some(ids[0]));
    }

    #[test]
    fn test_release_middle_keeps_list_consistent() {
        let (mut registry, ids) = registry_with(4);
        registry.release(ids[1]);

        assert_eq!(registry.len(), 3);
        assert_eq!(rotation(&registry, ids[0]), vec![ids[0], ids[2], ids[3]]);
        // full cycle returns to the start
        assert_eq!(registry.next_after(ids[3]), Some(ids[0]));
    }

    #[test]
    fn test_release_in_arbitrary_order() {
        let (mut registry, ids) = registry_with(5);

        registry.release(ids[3]);
        registry.release(ids[0]);
        registry.release(ids[4]);

        assert_eq!(registry.len(), 2);
        assert_eq!(rotation(&registry, ids[1]), vec![ids[1], ids[2]]);
        assert_eq!(registry.next_after(ids[2]), Some(ids[1]));
    }

    #[test]
    fn test_release_current_advances() {
        let (mut registry, ids) = registry_with(3);
        assert_eq!(registry.current(), Some(ids[0]));

        registry.release(ids[0]);
        assert_eq!(registry.current(), Some(ids[1]));
    }

    #[test]
    fn test_release_current_tail_wraps_to_head() {
        let (mut registry, ids) = registry_with(3);
        registry.release(ids[0]);
        registry.release(ids[1]);
        assert_eq!(registry.current(), Some(ids[2]));

        let fresh = registry.create(ProcessId(9));
        // current stays on the tail task; releasing it wraps to the head
        registry.release(ids[2]);
        assert_eq!(registry.current(), Some(registry.head.unwrap()));
        assert_eq!(registry.current(), Some(fresh));
    }

    #[test]
    fn test_release_last_task_clears_current() {
        let (mut registry, ids) = registry_with(1);
        registry.release(ids[0]);

        assert_eq!(registry.current(), None);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_slot_reuse_after_release() {
        let (mut registry, ids) = registry_with(2);
        registry.release(ids[0]);

        let reused = registry.create(ProcessId(7));
        assert_eq!(reused, ids[0]);
        assert_eq!(rotation(&registry, ids[1]), vec![ids[1], reused]);
    }

    #[test]
    fn test_save_state_copies_frame() {
        let (mut registry, ids) = registry_with(1);
        let frame = InterruptFrame {
            eax: 11,
            ebx: 22,
            ip: 0x40_1000,
            esp: 0x3F_E000,
            ..InterruptFrame::default()
        };

        registry.save_state(ids[0], &frame);
        let regs = &registry.get(ids[0]).unwrap().registers;
        assert_eq!(regs.eax, 11);
        assert_eq!(regs.ebx, 22);
        assert_eq!(regs.ip, 0x40_1000);
        assert_eq!(regs.esp, 0x3F_E000);
    }
}
