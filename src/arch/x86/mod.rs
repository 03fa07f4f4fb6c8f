//! 32-bit x86 protected-mode structures
//!
//! Hardware-dictated layouts: segment descriptors, the task state segment,
//! and the trap frame pushed on entry to the kernel. These are bit-exact;
//! the trap-return path depends on them.

pub mod frame;
pub mod gdt;
pub mod tss;
