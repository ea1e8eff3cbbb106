//! # Task Model
//!
//! Defines the task control block and its supporting types. Each task owns
//! a private stack and is described by exactly one TCB in the scheduler's
//! fixed-size table; TCBs are created during the pre-scheduler phase and
//! never destroyed.

use crate::config::STACK_WORDS;

// ---------------------------------------------------------------------------
// Task state machine
// ---------------------------------------------------------------------------

/// Execution state of a task.
///
/// ```text
///   ┌─────────┐      dispatch       ┌─────────┐
///   │  Ready  │ ──────────────────► │ Running │
///   └─────────┘ ◄────────────────── └─────────┘
///        ▲          preemption        │     │
///        │                            │     │
///        │ local_tick hits 0  delay() │     │ suspend_task()
///   ┌─────────┐ ◄─────────────────────┘     ▼
///   │ Waiting │                       ┌───────────┐
///   └─────────┘    activate_task() ── │ Suspended │
///                                     └───────────┘
/// ```
///
/// Once the scheduler has started, exactly one task is `Running` at any
/// time; before that, none is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Eligible to run, waiting for the dispatcher to select it.
    Ready,
    /// Currently executing on the CPU.
    Running,
    /// Sleeping until its local tick counter reaches zero.
    Waiting,
    /// Inert until explicitly activated.
    Suspended,
}

/// Whether a freshly created task enters the runnable set immediately or
/// sits suspended until someone activates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoStart {
    /// Task is `Ready` as soon as it is created.
    Auto,
    /// Task is created `Suspended` and needs `activate_task` to run.
    Suspended,
}

/// The function signature for task entry points: no arguments, never
/// returns. `extern "C"` because the address is planted in a synthetic
/// exception frame and entered by hardware.
pub type TaskEntry = extern "C" fn() -> !;

/// Stable index of a task in the scheduler's table, returned by
/// `create_task` and accepted by `activate_task`.
pub type TaskHandle = usize;

// ---------------------------------------------------------------------------
// Per-task stack
// ---------------------------------------------------------------------------

/// A task's private stack.
///
/// Aligned to 8 bytes as required by the AAPCS; `STACK_WORDS` must be even
/// so the top keeps that alignment (checked below).
#[repr(C, align(8))]
pub struct TaskStack([u32; STACK_WORDS]);

const _: () = assert!(STACK_WORDS % 2 == 0, "stack top must stay 8-byte aligned");

impl TaskStack {
    pub const fn new() -> Self {
        Self([0; STACK_WORDS])
    }

    /// One past the highest word of the stack. This is a full-descending
    /// stack, so the top address itself is never written, only the words
    /// below it.
    pub fn top(&mut self) -> *mut u32 {
        unsafe { self.0.as_mut_ptr().add(STACK_WORDS) }
    }

    /// Lowest word of the stack.
    pub fn base(&self) -> *const u32 {
        self.0.as_ptr()
    }

    /// Whether `sp` points into this stack. Used to check that a saved
    /// stack pointer never escapes the owning task's memory.
    pub fn contains(&self, sp: *const u32) -> bool {
        let base = self.0.as_ptr();
        let top = unsafe { base.add(STACK_WORDS) };
        sp >= base && sp < top
    }
}

// ---------------------------------------------------------------------------
// Task Control Block
// ---------------------------------------------------------------------------

/// Task Control Block, the record describing one task.
///
/// ## Memory Layout
///
/// `#[repr(C)]` with `stack_pointer` as the first field: the PendSV save
/// phase stores the outgoing process stack pointer through a raw TCB
/// pointer at offset 0, without involving the compiler. The assertion
/// below keeps that contract honest.
#[repr(C)]
pub struct TaskControlBlock {
    /// Saved process stack pointer. Points into `self.stack`; meaningful
    /// only while the task is not running.
    pub(crate) stack_pointer: *mut u32,

    /// Static priority. Higher numeric value wins; the idle task holds 0.
    pub(crate) priority: u8,

    /// Current execution state.
    pub(crate) state: TaskState,

    /// Entry point of the task body. `None` only in never-created slots.
    pub(crate) entry: Option<TaskEntry>,

    /// Remaining ticks while `Waiting`; stale in any other state.
    pub(crate) local_tick: u32,

    /// Private stack memory, exclusively owned by this TCB.
    pub(crate) stack: TaskStack,
}

const _: () = assert!(
    core::mem::offset_of!(TaskControlBlock, stack_pointer) == 0,
    "PendSV stores the saved SP through the TCB base address"
);

impl TaskControlBlock {
    /// An unoccupied table slot. Used to initialize the static task table.
    pub const EMPTY: TaskControlBlock = TaskControlBlock {
        stack_pointer: core::ptr::null_mut(),
        priority: 0,
        state: TaskState::Suspended,
        entry: None,
        local_tick: 0,
        stack: TaskStack::new(),
    };

    /// Populate this slot for a new task. The synthetic stack frame is
    /// built separately by the scheduler's stack initializer.
    pub(crate) fn init(&mut self, entry: TaskEntry, priority: u8, autostart: AutoStart) {
        self.priority = priority;
        self.state = match autostart {
            AutoStart::Auto => TaskState::Ready,
            AutoStart::Suspended => TaskState::Suspended,
        };
        self.entry = Some(entry);
        self.local_tick = 0;
    }

    /// Whether the dispatcher may select this task.
    #[inline]
    pub(crate) fn is_runnable(&self) -> bool {
        matches!(self.state, TaskState::Ready | TaskState::Running)
    }

    /// Current execution state.
    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Static priority.
    pub fn priority(&self) -> u8 {
        self.priority
    }

    /// Entry point of the task body, `None` for a never-created slot.
    pub fn entry(&self) -> Option<TaskEntry> {
        self.entry
    }

    /// Saved process stack pointer; meaningful only while the task is not
    /// running. Always points into the task's own stack.
    pub fn saved_stack_pointer(&self) -> *mut u32 {
        self.stack_pointer
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
