//! # Cortex-M Port Layer
//!
//! Hardware-specific code for Armv7-M (Cortex-M3/M4, Thumb-2) processors:
//! context switching via PendSV, SysTick timer programming, and exception
//! priority setup.
//!
//! ## Context Switch Mechanism
//!
//! Tasks execute in Thread mode on the process stack (PSP); exceptions and
//! the pre-scheduler world run on the main stack (MSP). On any exception
//! entry the hardware stacks r0-r3, r12, lr, pc and xPSR onto the process
//! stack, so by the time PendSV runs, the outgoing task's frame is already
//! in place regardless of whether the switch was requested by the tick
//! interrupt or by a blocking API call. PendSV saves the remaining r4-r11
//! itself, which completes the 16-word context frame the stack initializer
//! also builds for fresh tasks.
//!
//! ## Exception Priorities
//!
//! - SysTick: highest (reset value 0), so the time base never slips
//! - PendSV: 0xFF (lowest), so the register swap can never preempt another
//!   handler and runs only once every other exception has drained
//!
//! A tick that fires between pending a switch and PendSV running simply
//! overwrites the scheduler's decision; PendSV reads it once, and a
//! re-pend while PendSV is active tail-chains a corrective switch.

use core::arch::naked_asm;
use core::ptr;
use core::sync::atomic::{AtomicPtr, Ordering};

use cortex_m::peripheral::syst::SystClkSource;
use cortex_m::peripheral::SYST;

use crate::config::{SYSTEM_CLOCK_HZ, TICK_PERIOD_US};
use crate::kernel;
use crate::scheduler::SwitchOrigin;
use crate::task::TaskControlBlock;

// ---------------------------------------------------------------------------
// System control block registers
// ---------------------------------------------------------------------------

/// Interrupt Control and State Register.
const ICSR: *mut u32 = 0xE000_ED04 as *mut u32;
const ICSR_PENDSVSET: u32 = 1 << 28;
const ICSR_PENDSVCLR: u32 = 1 << 27;

/// System Handler Priority Register 3: PendSV priority in bits [23:16],
/// SysTick priority in bits [31:24].
const SHPR3: *mut u32 = 0xE000_ED20 as *mut u32;

/// EXC_RETURN value: return to Thread mode, resume on the process stack.
const EXC_RETURN_THREAD_PSP: u32 = 0xFFFF_FFFD;

// ---------------------------------------------------------------------------
// Tick timer
// ---------------------------------------------------------------------------

const fn tick_reload_value() -> u32 {
    (SYSTEM_CLOCK_HZ / 1_000_000) * TICK_PERIOD_US - 1
}

/// Program SysTick to interrupt every `TICK_PERIOD_US` and start it.
/// Enabling the interrupt arms the scheduler: the first tick performs the
/// first dispatch.
pub fn configure_tick_timer(syst: &mut SYST) {
    syst.set_reload(tick_reload_value());
    syst.clear_current();
    syst.set_clock_source(SystClkSource::Core);
    syst.enable_counter();
    syst.enable_interrupt();
}

/// Re-arm the reload and current-value registers with the configured
/// period. Called from the tick handler, keeping the programmed period
/// authoritative every tick.
pub(crate) fn reload_tick_timer() {
    unsafe {
        let syst = &*SYST::PTR;
        syst.rvr.write(tick_reload_value());
        syst.cvr.write(0);
    }
}

// ---------------------------------------------------------------------------
// Exception priorities
// ---------------------------------------------------------------------------

/// Pin PendSV to the lowest exception priority and SysTick to the highest,
/// so the tick can preempt anything but the register swap preempts
/// nothing.
pub fn set_exception_priorities() {
    unsafe {
        let value = ptr::read_volatile(SHPR3);
        let value = (value & 0x0000_FFFF) | (0xFF << 16);
        ptr::write_volatile(SHPR3, value);
    }
}

// ---------------------------------------------------------------------------
// Context switch request
// ---------------------------------------------------------------------------

/// Pend the context-switch exception.
///
/// From the tick interrupt this is all that is needed: PendSV tail-chains
/// as soon as the interrupt returns. A task-context caller additionally
/// needs the barriers so the switch is architecturally guaranteed to be
/// taken before the caller's next instruction once interrupts allow.
pub(crate) fn request_context_switch(origin: SwitchOrigin) {
    unsafe {
        ptr::write_volatile(ICSR, ICSR_PENDSVSET);
    }
    if origin == SwitchOrigin::FromTask {
        cortex_m::asm::dsb();
        cortex_m::asm::isb();
    }
}

fn clear_context_switch() {
    unsafe {
        ptr::write_volatile(ICSR, ICSR_PENDSVCLR);
    }
}

// ---------------------------------------------------------------------------
// PendSV handler (context switch)
// ---------------------------------------------------------------------------

/// The TCB whose `stack_pointer` the save phase stores through: always the
/// task whose context is resident on the CPU. Null until the first switch,
/// which is how the save phase knows there is no previous task to save.
static CURRENT_TCB: AtomicPtr<TaskControlBlock> = AtomicPtr::new(ptr::null_mut());

/// PendSV exception handler: the tail of every context switch.
///
/// ## Sequence
/// 1. Skip the save if no task has ever run (`CURRENT_TCB` is null)
/// 2. Otherwise push r4-r11 below the hardware-stacked frame on the PSP
///    and store the resulting pointer into the outgoing TCB (offset 0)
/// 3. Call into Rust to commit the switch and fetch the incoming SP
/// 4. Pop r4-r11 from the incoming stack, load PSP, exception-return;
///    hardware pops the remaining frame and resumes the task at its saved
///    program counter (its entry point, on a first run)
///
/// Only r0-r3 and r12 are touched before the save; everything else is
/// task state that must reach the stack intact.
#[unsafe(naked)]
#[no_mangle]
unsafe extern "C" fn PendSV() {
    naked_asm!(
        "ldr r1, ={current_tcb}",
        "ldr r2, [r1]",
        "cmp r2, #0",
        "beq 1f",
        "mrs r0, psp",
        "stmdb r0!, {{r4-r11}}",
        "str r0, [r2]",
        "1:",
        "bl {switch_context}",
        "ldmia r0!, {{r4-r11}}",
        "msr psp, r0",
        "ldr r0, ={exc_return}",
        "bx r0",
        current_tcb = sym CURRENT_TCB,
        switch_context = sym pendsv_switch_context,
        exc_return = const EXC_RETURN_THREAD_PSP,
    );
}

/// Rust half of the PendSV tail: commit the scheduler's latest decision
/// and hand the incoming stack pointer back to the assembly above (in r0).
///
/// Runs with the tick masked; the commit is a multi-word transaction and a
/// mid-flight tick would otherwise observe a half-switched table.
extern "C" fn pendsv_switch_context() -> *mut u32 {
    clear_context_switch();
    cortex_m::interrupt::free(|_cs| {
        let sched = unsafe { &mut *kernel::scheduler_handle() };
        let incoming = sched.switch_to_next();
        CURRENT_TCB.store(incoming, Ordering::Relaxed);
        unsafe { (*incoming).stack_pointer }
    })
}

// ---------------------------------------------------------------------------
// SysTick handler
// ---------------------------------------------------------------------------

/// Tick interrupt: advance the time base, wake expired waiters, re-arm the
/// timer, and let the dispatcher decide whether the tick changes what
/// should run. Runs at the highest exception priority, so it owns the
/// task table for the duration.
#[no_mangle]
extern "C" fn SysTick() {
    let sched = unsafe { &mut *kernel::scheduler_handle() };
    sched.tick();
    reload_tick_timer();
    if let Some(origin) = sched.dispatch(SwitchOrigin::FromIsr) {
        request_context_switch(origin);
    }
}
