//! # Kernel
//!
//! The public API and the scheduler singleton. Application code creates
//! its tasks, optionally registers a heartbeat hook, and hands control to
//! `start_scheduler`; from then on the system runs out of the tick
//! interrupt and the blocking calls below.
//!
//! ## Startup Sequence
//!
//! ```text
//! reset handler (cortex-m-rt)
//!   └─► main()
//!         ├─► kernel::create_task()    ← register tasks (×N)
//!         ├─► kernel::set_tick_hook()  ← optional heartbeat observer
//!         └─► kernel::start_scheduler()← no return
//!               ├─► create the idle task in the reserved slot
//!               ├─► pin PendSV to the lowest exception priority
//!               ├─► program and enable SysTick
//!               └─► wait; the first tick dispatches the first task
//! ```

use core::cell::UnsafeCell;

use crate::arch::cortex_m4 as arch;
use crate::error::KernelError;
use crate::scheduler::Scheduler;
use crate::sync;
use crate::task::{AutoStart, TaskEntry, TaskHandle};

// ---------------------------------------------------------------------------
// Global scheduler instance
// ---------------------------------------------------------------------------

/// Shared-mutable cell for the scheduler singleton.
///
/// SAFETY: single core. Task-context access is serialized by critical
/// sections; interrupt-context access (SysTick, PendSV) is serialized by
/// exception priority, and the PendSV commit masks the tick.
struct SchedulerCell(UnsafeCell<Scheduler>);

unsafe impl Sync for SchedulerCell {}

/// The one scheduler. Task context reaches it through the API functions
/// below; the tick interrupt and the PendSV tail reach it through
/// `scheduler_handle`.
static SCHEDULER: SchedulerCell = SchedulerCell(UnsafeCell::new(Scheduler::new()));

/// Raw handle for the interrupt-side accessors in the arch port.
pub(crate) fn scheduler_handle() -> *mut Scheduler {
    SCHEDULER.0.get()
}

// ---------------------------------------------------------------------------
// Kernel API
// ---------------------------------------------------------------------------

/// Create a new task.
///
/// Must be called before `start_scheduler`; the table is frozen once the
/// scheduler runs. Higher `priority` values win the CPU; use 1 or above,
/// since the idle task holds 0. Returns the task's stable handle, or
/// `CapacityExceeded` when `MAX_TASKS` application tasks already exist
/// (the idle task lives in a reserved slot and never eats into that
/// capacity).
pub fn create_task(
    entry: TaskEntry,
    priority: u8,
    autostart: AutoStart,
) -> Result<TaskHandle, KernelError> {
    sync::critical_section(|_cs| unsafe {
        (*scheduler_handle()).create_task(entry, priority, autostart)
    })
}

/// Register a heartbeat observer called once per tick, before the wait
/// queue is processed. Must be called before `start_scheduler`.
///
/// The hook runs inside the tick interrupt while the kernel holds the
/// task table; keep it short and do not call kernel APIs from it.
pub fn set_tick_hook(hook: fn()) {
    sync::critical_section(|_cs| unsafe { (*scheduler_handle()).set_tick_hook(hook) })
}

/// Start the scheduler. **Does not return.**
///
/// Creates the idle task (lowest priority, always runnable), arranges the
/// exception priorities so the tick outranks the context switcher, and
/// enables the tick timer. This function then parks on the main stack;
/// the first tick performs the first dispatch and the CPU never comes
/// back here. Call exactly once, from `main`, after all tasks exist.
pub fn start_scheduler(mut peripherals: cortex_m::Peripherals) -> ! {
    sync::critical_section(|_cs| unsafe {
        let sched = &mut *scheduler_handle();
        sched.prepare_start();
        sched.create_idle_task(idle_task);
    });

    arch::set_exception_priorities();
    arch::configure_tick_timer(&mut peripherals.SYST);

    loop {
        cortex_m::asm::wfi();
    }
}

/// Current value of the global tick counter.
///
/// A single aligned word load: safe against the tick interrupt without
/// masking, from task or interrupt context alike.
pub fn get_clock() -> u32 {
    unsafe { (*scheduler_handle()).clock() }
}

/// Block the calling task for `ticks` scheduler ticks.
///
/// The task becomes `Waiting` and is promoted back to `Ready` by the
/// tick that brings its countdown to zero, eligible to run on that very
/// tick. `delay(0)` merely yields. Only valid from a running task.
pub fn delay(ticks: u32) {
    let request =
        sync::critical_section(|_cs| unsafe { (*scheduler_handle()).delay_current(ticks) });
    if let Some(origin) = request {
        arch::request_context_switch(origin);
    }
}

/// Suspend the calling task until another task activates it. Only valid
/// from a running task.
pub fn suspend_task() {
    let request = sync::critical_section(|_cs| unsafe { (*scheduler_handle()).suspend_current() });
    if let Some(origin) = request {
        arch::request_context_switch(origin);
    }
}

/// Make the task named by `handle` eligible to run.
///
/// Safe to call on a task that is already `Ready` (state is untouched) or
/// `Running` (never demoted); either way the dispatcher re-evaluates.
/// An out-of-range handle is reported and otherwise ignored.
pub fn activate_task(handle: TaskHandle) -> Result<(), KernelError> {
    let request = sync::critical_section(|_cs| unsafe { (*scheduler_handle()).activate(handle) })?;
    if let Some(origin) = request {
        arch::request_context_switch(origin);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Idle task
// ---------------------------------------------------------------------------

/// Lowest-priority fallback that keeps the dispatcher's selection total.
/// It never delays, never suspends, never exits; it just naps until the
/// next interrupt.
extern "C" fn idle_task() -> ! {
    loop {
        cortex_m::asm::wfi();
    }
}
