//! x86_64 context switching
//!
//! Inline naked assembly; stable since Rust 1.88.

use std::arch::naked_asm;

/// Callee-saved register set per the System V AMD64 ABI, plus the
/// stack pointer and resume address. Field order is load-bearing: the
/// assembly below addresses fields by fixed offset.
#[repr(C)]
pub struct SavedRegs {
    pub rsp: u64, // 0x00
    pub rip: u64, // 0x08
    pub rbx: u64, // 0x10
    pub rbp: u64, // 0x18
    pub r12: u64, // 0x20
    pub r13: u64, // 0x28
    pub r14: u64, // 0x30
    pub r15: u64, // 0x38
}

impl SavedRegs {
    pub const fn zeroed() -> Self {
        Self {
            rsp: 0,
            rip: 0,
            rbx: 0,
            rbp: 0,
            r12: 0,
            r13: 0,
            r14: 0,
            r15: 0,
        }
    }
}

/// Seed a fresh fiber context.
///
/// When first switched to, execution begins at the entry trampoline
/// with `entry_fn`/`entry_arg` staged in r12/r13.
///
/// # Safety
///
/// `regs` must point to valid `SavedRegs` memory and `stack_top` must
/// be the high end of a mapped stack.
#[inline]
pub unsafe fn init_context(
    regs: *mut SavedRegs,
    stack_top: *mut u8,
    entry_fn: usize,
    entry_arg: usize,
) {
    // The trampoline starts on a 16-byte boundary; its `call` then
    // leaves the entry function with the rsp alignment the ABI expects.
    let sp = stack_top as usize & !0xF;

    let regs = unsafe { &mut *regs };
    regs.rsp = sp as u64;
    regs.rip = fiber_trampoline as usize as u64;
    regs.rbx = 0;
    regs.rbp = 0;
    regs.r12 = entry_fn as u64;
    regs.r13 = entry_arg as u64;
    regs.r14 = 0;
    regs.r15 = 0;
}

/// First code a fresh fiber executes: calls entry_fn(entry_arg).
///
/// The entry function terminates the fiber by switching away and never
/// returns; the trap instruction backstops that contract.
#[unsafe(naked)]
unsafe extern "C" fn fiber_trampoline() {
    naked_asm!(
        "mov rdi, r13",
        "call r12",
        "ud2",
    );
}

/// Switch execution contexts.
///
/// Saves the callee-saved set to `old`, restores it from `new` and
/// jumps to the saved resume address. Returns (to the label below)
/// when some later switch restores `old`.
///
/// # Safety
///
/// Both pointers must reference valid `SavedRegs`; `new` must hold a
/// context seeded by [`init_context`] or saved by a prior switch, and
/// must not equal `old`.
#[unsafe(naked)]
pub unsafe extern "C" fn switch(_old: *mut SavedRegs, _new: *const SavedRegs) {
    naked_asm!(
        // Save callee-saved registers into old (RDI)
        "mov [rdi + 0x00], rsp",
        "lea rax, [rip + 2f]",
        "mov [rdi + 0x08], rax",
        "mov [rdi + 0x10], rbx",
        "mov [rdi + 0x18], rbp",
        "mov [rdi + 0x20], r12",
        "mov [rdi + 0x28], r13",
        "mov [rdi + 0x30], r14",
        "mov [rdi + 0x38], r15",
        // Restore from new (RSI)
        "mov rsp, [rsi + 0x00]",
        "mov rax, [rsi + 0x08]",
        "mov rbx, [rsi + 0x10]",
        "mov rbp, [rsi + 0x18]",
        "mov r12, [rsi + 0x20]",
        "mov r13, [rsi + 0x28]",
        "mov r14, [rsi + 0x30]",
        "mov r15, [rsi + 0x38]",
        "jmp rax",
        // Resume point for the saved context
        "2:",
        "ret",
    );
}
