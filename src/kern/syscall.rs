//! Syscall dispatch
//!
//! A bounded table maps syscall numbers to handler functions. Handlers are
//! registered once at boot from static kernel code, so a duplicate or
//! out-of-range registration is a misconfiguration and halts the kernel.
//! At dispatch time an unknown number is untrusted input and simply yields
//! the no-result value.
//!
//! Arguments travel on the trapping task's user stack: five 32-bit words
//! at the stack pointer recorded in the trap frame. That memory is only
//! mapped under the task's own address space, so the words are pulled out
//! inside a scoped switch into the task space.

use crate::arch::InterruptFrame;
use crate::types::{KernResult, MAX_SYSCALLS, SYSCALL_ARG_COUNT};
use crate::vm::AddressSpace;

/// Value dispatch returns when no handler is registered for a number.
pub const NO_RESULT: usize = 0;

/// A registered syscall handler.
pub type SyscallHandler = fn(&SyscallArgs) -> usize;

/// The five words marshalled off the trapping task's stack.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyscallArgs {
    words: [u32; SYSCALL_ARG_COUNT],
}

impl SyscallArgs {
    /// Read the argument words at the frame's user stack pointer through
    /// the task's address space. The caller must already have switched
    /// into that space.
    pub fn load(frame: &InterruptFrame, space: &AddressSpace) -> KernResult<Self> {
        let stack = frame.esp as usize;
        let mut words = [0u32; SYSCALL_ARG_COUNT];
        for (index, word) in words.iter_mut().enumerate() {
            *word = space.read_u32(stack + index * 4)?;
        }
        Ok(Self { words })
    }

    #[cfg(test)]
    pub fn from_words(words: [u32; SYSCALL_ARG_COUNT]) -> Self {
        Self { words }
    }

    /// Argument `n`, or zero when out of range.
    pub fn get(&self, n: usize) -> u32 {
        self.words.get(n).copied().unwrap_or(0)
    }
}

/// Bounded syscall-number-to-handler table.
pub struct SyscallTable {
    handlers: [Option<SyscallHandler>; MAX_SYSCALLS],
}

impl SyscallTable {
    pub const fn new() -> Self {
        Self {
            handlers: [None; MAX_SYSCALLS],
        }
    }

    /// Register `handler` for `number`.
    ///
    /// Both an out-of-range number and a second registration come only
    /// from static kernel misconfiguration, never from untrusted input,
    /// so they are fatal.
    pub fn register(&mut self, number: usize, handler: SyscallHandler) {
        if number >= MAX_SYSCALLS {
            panic!("syscall number {} out of range", number);
        }
        if self.handlers[number].is_some() {
            panic!("syscall {} registered twice", number);
        }
        self.handlers[number] = Some(handler);
    }

    /// Run the handler for `number`, or return `NO_RESULT` if none is
    /// registered (or the number is out of range).
    pub fn invoke(&self, number: usize, args: &SyscallArgs) -> usize {
        match self.handlers.get(number).copied().flatten() {
            Some(handler) => handler(args),
            None => NO_RESULT,
        }
    }
}
