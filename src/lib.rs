//! # minOS
//!
//! A minimal fixed-priority preemptive RTOS kernel for single-core ARM
//! Cortex-M microcontrollers.
//!
//! ## Overview
//!
//! minOS schedules a small, statically-sized set of tasks by strict
//! priority. A periodic SysTick interrupt drives the time base; the PendSV
//! exception, pinned to the lowest priority, performs the actual context
//! switches. Tasks block by delaying for a number of ticks or by suspending
//! themselves; an always-runnable idle task guarantees the dispatcher never
//! comes up empty.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                  Application Tasks                    │
//! ├──────────────────────────────────────────────────────┤
//! │               Kernel API (kernel.rs)                  │
//! │  create_task() · start_scheduler() · delay()          │
//! │  suspend_task() · activate_task() · get_clock()       │
//! ├───────────────────────────┬──────────────────────────┤
//! │  Scheduler (scheduler.rs) │  Sync Primitives          │
//! │  ─ dispatch()             │  (sync.rs)                │
//! │  ─ tick() / wait queue    │  ─ critical_section       │
//! │  ─ stack initializer      │                           │
//! ├───────────────────────────┴──────────────────────────┤
//! │            Task Model (task.rs)                       │
//! │    TCB · TaskState · AutoStart · TaskStack            │
//! ├──────────────────────────────────────────────────────┤
//! │         Arch Port (arch/cortex_m4.rs)                 │
//! │    PendSV · SysTick · Context Switch · Tick Timer     │
//! ├──────────────────────────────────────────────────────┤
//! │        ARM Cortex-M Hardware (Thumb-2)                │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! ## Context-Switch Protocol
//!
//! Every scheduling decision, whether taken inside the tick interrupt or
//! inside a blocking API call, converges on the dispatcher. When the
//! dispatcher picks a task other than the one whose context is on the CPU,
//! it pends PendSV and returns. PendSV runs once every higher-priority
//! exception has drained, saves the outgoing task's r4-r11 below the
//! hardware-stacked exception frame, commits the switch, and exception
//! returns onto the incoming task's process stack. A freshly created task
//! carries a synthetic frame built by the stack initializer, so its first
//! activation is indistinguishable from a resume.
//!
//! ## Memory Model
//!
//! - **No heap**: all state is statically allocated
//! - **No `alloc`**: pure `core` only
//! - **Fixed-size task table**: `[TaskControlBlock; MAX_TASKS + 1]`, the
//!   extra slot reserved for the idle task
//! - **Per-task stack**: `[u32; STACK_WORDS]` inline in the TCB
//! - **Critical sections**: `cortex_m::interrupt::free()` for shared state

#![cfg_attr(not(test), no_std)]

pub mod arch;
pub mod config;
pub mod error;
#[cfg(all(target_arch = "arm", target_os = "none"))]
pub mod kernel;
pub mod scheduler;
#[cfg(all(target_arch = "arm", target_os = "none"))]
pub mod sync;
pub mod task;
