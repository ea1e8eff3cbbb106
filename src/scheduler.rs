//! # Scheduler
//!
//! The task table and everything that decides what runs next: the priority
//! dispatcher, the tick-driven wait queue, the stack initializer that makes
//! a brand-new task look preempted, and the commit step executed by the
//! PendSV tail.
//!
//! ## Scheduling Algorithm
//!
//! At every SysTick interrupt:
//! 1. Advance the global tick and run the registered tick hook
//! 2. Decrement the local tick of every `Waiting` task; promote the ones
//!    that reach zero to `Ready`
//! 3. Select the highest-priority runnable task, lowest index winning ties
//! 4. If the selection differs from the last decision, record it in `next`
//!    and pend a context switch
//!
//! Blocking API calls (`delay`, `suspend_task`, `activate_task`) change one
//! task's state and then run steps 3 and 4 themselves, so both paths
//! converge on the same dispatcher.
//!
//! ## Decision vs. Residency
//!
//! `next` holds the most recent dispatcher decision; `current` holds the
//! task whose context actually sits on the CPU. The two differ only in the
//! window between pending a switch and the PendSV tail committing it. The
//! dispatcher compares against `next`, so a tick that fires inside that
//! window simply overwrites the decision and the tail picks up the newest
//! one. `switch_to_next` is the only place residency changes.

use crate::config::MAX_TASKS;
use crate::error::KernelError;
use crate::task::{AutoStart, TaskControlBlock, TaskEntry, TaskHandle, TaskState};

// ---------------------------------------------------------------------------
// Context frame layout
// ---------------------------------------------------------------------------

/// Words the hardware stacks on exception entry: r0-r3, r12, lr, pc, xPSR.
pub const HW_FRAME_WORDS: usize = 8;
/// Words the PendSV tail saves below the hardware frame: r4-r11.
pub const SW_FRAME_WORDS: usize = 8;
/// Full context frame occupied by a suspended task on its own stack.
pub const CONTEXT_FRAME_WORDS: usize = HW_FRAME_WORDS + SW_FRAME_WORDS;

/// Initial program-status word: Thumb bit set, everything else clear.
const XPSR_THUMB: u32 = 0x0100_0000;

// Slot indices within the context frame, relative to the saved SP.
const FRAME_LR_SLOT: usize = 13;
const FRAME_PC_SLOT: usize = 14;
const FRAME_XPSR_SLOT: usize = 15;

/// Sentinel index meaning "no task": the value of `current` between
/// `start_scheduler` and the first context switch.
pub(crate) const NO_TASK: usize = usize::MAX;

/// Where a scheduling decision was taken. Both origins pend the same
/// context switch; a task-context caller additionally needs barriers so
/// the switch is taken before its next instruction, which is why the tag
/// travels with the switch request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchOrigin {
    /// Decision taken inside the tick interrupt.
    FromIsr,
    /// Decision taken inside a blocking API call in task context.
    FromTask,
}

// ---------------------------------------------------------------------------
// Scheduler struct
// ---------------------------------------------------------------------------

/// The task table and scheduling state. Lives as a single static instance
/// owned by the kernel; everything here is reached through the kernel API,
/// the tick interrupt, or the PendSV tail.
pub struct Scheduler {
    /// Fixed-size table. The slot past `MAX_TASKS` is reserved for idle.
    tasks: [TaskControlBlock; MAX_TASKS + 1],

    /// Count of created tasks, idle included once the scheduler starts.
    /// Monotonic during the create phase, frozen afterwards.
    n_tasks: usize,

    /// Task whose context is resident on the CPU, or `NO_TASK` before the
    /// first switch. Updated only by `switch_to_next`.
    current: usize,

    /// Most recent dispatcher decision.
    next: usize,

    /// Monotonic tick counter, one increment per tick interrupt. Wraps
    /// after ~49.7 days at a 1 ms tick.
    global_tick: u32,

    /// Optional heartbeat observer, called once per tick.
    tick_hook: Option<fn()>,
}

impl Scheduler {
    pub const fn new() -> Self {
        Self {
            tasks: [TaskControlBlock::EMPTY; MAX_TASKS + 1],
            n_tasks: 0,
            current: NO_TASK,
            next: NO_TASK,
            global_tick: 0,
            tick_hook: None,
        }
    }

    // -----------------------------------------------------------------------
    // Create phase
    // -----------------------------------------------------------------------

    /// Register a new application task.
    ///
    /// Fails with `CapacityExceeded` once `MAX_TASKS` application tasks
    /// exist; the reserved idle slot is never handed out here. Returns the
    /// task's stable table index. Only valid before the scheduler starts.
    pub fn create_task(
        &mut self,
        entry: TaskEntry,
        priority: u8,
        autostart: AutoStart,
    ) -> Result<TaskHandle, KernelError> {
        if self.n_tasks >= MAX_TASKS {
            return Err(KernelError::CapacityExceeded);
        }
        let handle = self.n_tasks;
        self.tasks[handle].init(entry, priority, autostart);
        init_task_stack(&mut self.tasks[handle], entry);
        self.n_tasks += 1;
        Ok(handle)
    }

    /// Put the idle task into the reserved slot.
    ///
    /// Called once by `start_scheduler`, after all application tasks
    /// exist, so idle ends up at the highest index and loses every
    /// priority tie.
    pub fn create_idle_task(&mut self, entry: TaskEntry) -> TaskHandle {
        debug_assert!(self.n_tasks <= MAX_TASKS);
        let handle = self.n_tasks;
        self.tasks[handle].init(entry, 0, AutoStart::Auto);
        init_task_stack(&mut self.tasks[handle], entry);
        self.n_tasks += 1;
        handle
    }

    /// Reset the clock and the residency bookkeeping for scheduler start.
    /// Created tasks and the registered tick hook survive.
    pub fn prepare_start(&mut self) {
        self.global_tick = 0;
        self.current = NO_TASK;
        self.next = NO_TASK;
    }

    /// Register the heartbeat observer invoked on every tick.
    pub fn set_tick_hook(&mut self, hook: fn()) {
        self.tick_hook = Some(hook);
    }

    // -----------------------------------------------------------------------
    // Time base
    // -----------------------------------------------------------------------

    /// One scheduler tick: advance the clock, refresh the heartbeat
    /// observer, wake expired waiters. The caller (the tick interrupt)
    /// runs the dispatcher afterwards, so a task waking on tick T can be
    /// selected during T.
    pub fn tick(&mut self) {
        self.global_tick = self.global_tick.wrapping_add(1);
        if let Some(hook) = self.tick_hook {
            hook();
        }
        self.wake_waiting_tasks();
    }

    /// Current value of the global clock.
    pub fn clock(&self) -> u32 {
        self.global_tick
    }

    /// Decrement the local tick of every `Waiting` task; the ones that hit
    /// zero become `Ready`. Tasks in any other state keep their residual
    /// local tick untouched, so a suspended waiter is not woken by expiry.
    fn wake_waiting_tasks(&mut self) {
        for tcb in self.tasks[..self.n_tasks].iter_mut() {
            if tcb.state() == TaskState::Waiting {
                tcb.local_tick -= 1;
                if tcb.local_tick == 0 {
                    tcb.state = TaskState::Ready;
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Dispatcher
    // -----------------------------------------------------------------------

    /// Pick the next task to run and record the decision.
    ///
    /// Returns `Some(origin)` when the choice differs from the last
    /// decision, in which case the caller must forward the tag to
    /// `arch::request_context_switch`; `None` means nothing to do. Only
    /// meaningful once the idle task exists.
    #[must_use]
    pub fn dispatch(&mut self, origin: SwitchOrigin) -> Option<SwitchOrigin> {
        let chosen = self.select_next_task();
        if chosen == self.next {
            return None;
        }
        self.next = chosen;
        Some(origin)
    }

    /// Highest-priority runnable task; strict greater-than keeps the scan
    /// stable, so the lowest index wins ties. Idle sits in the last
    /// created slot and is always runnable, so the scan cannot come up
    /// empty.
    fn select_next_task(&self) -> usize {
        debug_assert!(self.n_tasks > 0);
        let mut best = self.n_tasks - 1;
        let mut best_priority = -1i32;
        for (index, tcb) in self.tasks[..self.n_tasks].iter().enumerate() {
            if tcb.is_runnable() && i32::from(tcb.priority()) > best_priority {
                best_priority = i32::from(tcb.priority());
                best = index;
            }
        }
        best
    }

    // -----------------------------------------------------------------------
    // Blocking state changes (called from the running task)
    // -----------------------------------------------------------------------

    /// Put the running task to sleep for `ticks` ticks.
    ///
    /// `ticks == 0` is a plain yield: the caller stays runnable and the
    /// dispatcher merely re-evaluates, so the wait queue never sees a zero
    /// counter it would decrement past zero.
    #[must_use]
    pub fn delay_current(&mut self, ticks: u32) -> Option<SwitchOrigin> {
        if ticks > 0 {
            let tcb = &mut self.tasks[self.current];
            tcb.local_tick = ticks;
            tcb.state = TaskState::Waiting;
        }
        self.dispatch(SwitchOrigin::FromTask)
    }

    /// Suspend the running task until someone activates it.
    #[must_use]
    pub fn suspend_current(&mut self) -> Option<SwitchOrigin> {
        self.tasks[self.current].state = TaskState::Suspended;
        self.dispatch(SwitchOrigin::FromTask)
    }

    /// Make the given task eligible to run.
    ///
    /// Out-of-range handles leave all task state untouched. A `Running`
    /// task is not demoted; activating a `Ready` task is a no-op apart
    /// from the re-dispatch.
    pub fn activate(&mut self, handle: TaskHandle) -> Result<Option<SwitchOrigin>, KernelError> {
        if handle >= self.n_tasks {
            return Err(KernelError::InvalidHandle);
        }
        if self.tasks[handle].state() != TaskState::Running {
            self.tasks[handle].state = TaskState::Ready;
        }
        Ok(self.dispatch(SwitchOrigin::FromTask))
    }

    // -----------------------------------------------------------------------
    // Switch commit (PendSV tail)
    // -----------------------------------------------------------------------

    /// Commit the most recent dispatcher decision.
    ///
    /// Demotes the outgoing task to `Ready` unless it already blocked
    /// itself, makes `next` resident, and returns the incoming TCB so the
    /// save phase of the following switch can store through it. On the
    /// very first switch there is no outgoing task to demote; the arch
    /// layer likewise skips the save because it holds no TCB yet.
    ///
    /// Must run with the tick masked: this is a multi-word transaction
    /// over `current` and two task states.
    pub fn switch_to_next(&mut self) -> *mut TaskControlBlock {
        if self.current != NO_TASK {
            let outgoing = &mut self.tasks[self.current];
            if outgoing.state() == TaskState::Running {
                outgoing.state = TaskState::Ready;
            }
        }
        self.current = self.next;
        let incoming = &mut self.tasks[self.current];
        incoming.state = TaskState::Running;
        incoming as *mut TaskControlBlock
    }

    /// The task resident on the CPU, if any. Mostly useful to observers
    /// and tests; task code already knows it is the one running.
    pub fn current_task(&self) -> Option<TaskHandle> {
        if self.current == NO_TASK {
            None
        } else {
            Some(self.current)
        }
    }

    /// Read-only view of a task's control block.
    pub fn task(&self, handle: TaskHandle) -> Option<&TaskControlBlock> {
        self.tasks[..self.n_tasks].get(handle)
    }
}

// ---------------------------------------------------------------------------
// Stack initializer
// ---------------------------------------------------------------------------

/// Build the synthetic context frame that makes a fresh task resume like a
/// preempted one.
///
/// The restore path pops r4-r11 and then exception-returns, popping the
/// 8-word hardware frame, so the initializer lays down all 16 words at the
/// top of the task's stack:
///
/// ```text
/// [high addresses]
///   xPSR  (Thumb bit set)
///   PC    (task entry point)
///   LR    (return trap; unreachable, entries never return)
///   R12, R3, R2, R1, R0   (zeroed)
///   R11 .. R4             (zeroed)   <- stack_pointer after init
/// [low addresses]
/// ```
fn init_task_stack(tcb: &mut TaskControlBlock, entry: TaskEntry) {
    let frame = unsafe { tcb.stack.top().sub(CONTEXT_FRAME_WORDS) };
    unsafe {
        for slot in 0..CONTEXT_FRAME_WORDS {
            frame.add(slot).write(0);
        }
        frame.add(FRAME_LR_SLOT).write(task_return_trap as usize as u32);
        frame.add(FRAME_PC_SLOT).write(entry as usize as u32);
        frame.add(FRAME_XPSR_SLOT).write(XPSR_THUMB);
    }
    tcb.stack_pointer = frame;
}

/// Landing pad planted in the LR slot of every synthetic frame. Task
/// entries are `-> !`, so the only way here is a corrupted stack; park
/// instead of wandering off into undefined memory.
extern "C" fn task_return_trap() -> ! {
    loop {
        core::hint::spin_loop();
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::STACK_WORDS;

    extern "C" fn body_a() -> ! {
        loop {
            core::hint::spin_loop();
        }
    }
    extern "C" fn body_b() -> ! {
        loop {
            core::hint::spin_loop();
        }
    }
    extern "C" fn idle_body() -> ! {
        loop {
            core::hint::spin_loop();
        }
    }

    /// Finish the create phase the way `start_scheduler` does.
    fn boot(sched: &mut Scheduler) -> TaskHandle {
        sched.prepare_start();
        sched.create_idle_task(idle_body)
    }

    /// One tick interrupt: time base, dispatch, and (if requested) the
    /// PendSV tail commit.
    fn tick_once(sched: &mut Scheduler) {
        sched.tick();
        if sched.dispatch(SwitchOrigin::FromIsr).is_some() {
            sched.switch_to_next();
        }
    }

    /// `delay()` as the running task experiences it: the blocking call
    /// plus the switch it pended.
    fn do_delay(sched: &mut Scheduler, ticks: u32) {
        let request = sched.delay_current(ticks);
        if let Some(origin) = request {
            assert_eq!(origin, SwitchOrigin::FromTask);
            sched.switch_to_next();
        }
    }

    fn do_suspend(sched: &mut Scheduler) {
        let request = sched.suspend_current();
        if let Some(origin) = request {
            assert_eq!(origin, SwitchOrigin::FromTask);
            sched.switch_to_next();
        }
    }

    fn do_activate(sched: &mut Scheduler, handle: TaskHandle) {
        let request = sched.activate(handle).unwrap();
        if request.is_some() {
            sched.switch_to_next();
        }
    }

    fn state_of(sched: &Scheduler, handle: TaskHandle) -> TaskState {
        sched.task(handle).unwrap().state()
    }

    fn running_count(sched: &Scheduler) -> usize {
        sched.tasks[..sched.n_tasks]
            .iter()
            .filter(|t| t.state() == TaskState::Running)
            .count()
    }

    // -- create phase -------------------------------------------------------

    #[test]
    fn handles_are_sequential_until_capacity() {
        let mut sched = Scheduler::new();
        for expected in 0..MAX_TASKS {
            assert_eq!(sched.create_task(body_a, 1, AutoStart::Auto), Ok(expected));
        }
        assert_eq!(
            sched.create_task(body_a, 1, AutoStart::Auto),
            Err(KernelError::CapacityExceeded)
        );
    }

    #[test]
    fn idle_fits_in_the_reserved_slot_at_full_capacity() {
        let mut sched = Scheduler::new();
        for _ in 0..MAX_TASKS {
            sched.create_task(body_a, 1, AutoStart::Auto).unwrap();
        }
        let idle = boot(&mut sched);
        assert_eq!(idle, MAX_TASKS);
        assert_eq!(sched.n_tasks, MAX_TASKS + 1);
        assert_eq!(sched.task(idle).unwrap().priority(), 0);
        assert_eq!(state_of(&sched, idle), TaskState::Ready);
    }

    #[test]
    fn initial_frame_resumes_at_the_entry_point() {
        let mut sched = Scheduler::new();
        let handle = sched.create_task(body_a, 2, AutoStart::Auto).unwrap();
        let tcb = sched.task(handle).unwrap();
        let frame = tcb.saved_stack_pointer();
        assert!(tcb.stack.contains(frame));
        unsafe {
            assert_eq!(frame.add(FRAME_XPSR_SLOT).read(), XPSR_THUMB);
            assert_eq!(frame.add(FRAME_PC_SLOT).read(), body_a as usize as u32);
        }
        // the frame sits at the very top of the stack
        let top = unsafe { tcb.stack.base().add(STACK_WORDS) };
        let words_used = unsafe { top.offset_from(frame) };
        assert_eq!(words_used as usize, CONTEXT_FRAME_WORDS);
    }

    #[test]
    fn saved_sp_stays_inside_the_owning_stack() {
        let mut sched = Scheduler::new();
        let a = sched.create_task(body_a, 2, AutoStart::Auto).unwrap();
        let b = sched.create_task(body_b, 1, AutoStart::Auto).unwrap();
        boot(&mut sched);
        tick_once(&mut sched);
        for handle in [a, b] {
            let tcb = sched.task(handle).unwrap();
            assert!(tcb.stack.contains(tcb.saved_stack_pointer()));
            // a saved SP always leaves room for at least one full frame
            let top = unsafe { tcb.stack.base().add(STACK_WORDS) };
            let headroom = unsafe { top.offset_from(tcb.saved_stack_pointer()) } as usize;
            assert!(headroom >= CONTEXT_FRAME_WORDS);
            assert!(headroom <= STACK_WORDS);
        }
    }

    // -- dispatcher ---------------------------------------------------------

    #[test]
    fn first_switch_has_no_previous_task() {
        let mut sched = Scheduler::new();
        let low = sched.create_task(body_a, 2, AutoStart::Auto).unwrap();
        let high = sched.create_task(body_b, 3, AutoStart::Auto).unwrap();
        let mid = sched.create_task(body_a, 1, AutoStart::Auto).unwrap();
        boot(&mut sched);
        assert_eq!(sched.current_task(), None);

        tick_once(&mut sched);
        assert_eq!(sched.current_task(), Some(high));
        assert_eq!(state_of(&sched, high), TaskState::Running);
        // the losers were not demoted, suspended, or otherwise touched
        assert_eq!(state_of(&sched, low), TaskState::Ready);
        assert_eq!(state_of(&sched, mid), TaskState::Ready);
        assert_eq!(running_count(&sched), 1);
    }

    #[test]
    fn highest_priority_runnable_task_wins() {
        let mut sched = Scheduler::new();
        sched.create_task(body_a, 1, AutoStart::Auto).unwrap();
        let high = sched.create_task(body_b, 7, AutoStart::Auto).unwrap();
        sched.create_task(body_a, 4, AutoStart::Auto).unwrap();
        boot(&mut sched);
        tick_once(&mut sched);
        assert_eq!(sched.current_task(), Some(high));
    }

    #[test]
    fn equal_priority_breaks_ties_by_lowest_index() {
        let mut sched = Scheduler::new();
        let first = sched.create_task(body_a, 5, AutoStart::Auto).unwrap();
        let second = sched.create_task(body_b, 5, AutoStart::Auto).unwrap();
        boot(&mut sched);
        tick_once(&mut sched);
        assert_eq!(sched.current_task(), Some(first));

        // the higher index runs only once the lower one leaves the set
        do_suspend(&mut sched);
        assert_eq!(sched.current_task(), Some(second));

        // and is preempted again as soon as the lower index returns
        do_activate(&mut sched, first);
        assert_eq!(sched.current_task(), Some(first));
        assert_eq!(state_of(&sched, second), TaskState::Ready);
    }

    #[test]
    fn redundant_dispatch_requests_nothing() {
        let mut sched = Scheduler::new();
        sched.create_task(body_a, 2, AutoStart::Auto).unwrap();
        boot(&mut sched);
        tick_once(&mut sched);
        assert!(sched.dispatch(SwitchOrigin::FromIsr).is_none());
    }

    // -- wait queue ---------------------------------------------------------

    #[test]
    fn delay_wakes_after_exactly_k_ticks() {
        let mut sched = Scheduler::new();
        let task = sched.create_task(body_a, 2, AutoStart::Auto).unwrap();
        let idle = boot(&mut sched);
        tick_once(&mut sched);
        assert_eq!(sched.current_task(), Some(task));

        let t0 = sched.clock();
        do_delay(&mut sched, 5);
        assert_eq!(state_of(&sched, task), TaskState::Waiting);
        assert_eq!(sched.current_task(), Some(idle));

        for _ in 0..4 {
            tick_once(&mut sched);
            assert_eq!(state_of(&sched, task), TaskState::Waiting);
            assert_eq!(sched.current_task(), Some(idle));
        }
        tick_once(&mut sched);
        // woken and dispatched on the same tick, exactly t0 + 5
        assert_eq!(sched.current_task(), Some(task));
        assert_eq!(sched.clock(), t0 + 5);
    }

    #[test]
    fn waking_task_preempts_on_its_wake_tick() {
        let mut sched = Scheduler::new();
        let low = sched.create_task(body_a, 1, AutoStart::Auto).unwrap();
        let high = sched.create_task(body_b, 6, AutoStart::Auto).unwrap();
        boot(&mut sched);
        tick_once(&mut sched);
        assert_eq!(sched.current_task(), Some(high));

        do_delay(&mut sched, 3);
        assert_eq!(sched.current_task(), Some(low));

        tick_once(&mut sched);
        assert_eq!(sched.current_task(), Some(low));
        tick_once(&mut sched);
        assert_eq!(sched.current_task(), Some(low));
        tick_once(&mut sched);
        assert_eq!(sched.current_task(), Some(high));
        assert_eq!(state_of(&sched, low), TaskState::Ready);
    }

    #[test]
    fn global_tick_advances_by_one_per_tick() {
        let mut sched = Scheduler::new();
        sched.create_task(body_a, 2, AutoStart::Auto).unwrap();
        boot(&mut sched);
        for expected in 1..=50u32 {
            tick_once(&mut sched);
            assert_eq!(sched.clock(), expected);
        }
    }

    #[test]
    fn delay_zero_is_a_yield() {
        let mut sched = Scheduler::new();
        let task = sched.create_task(body_a, 2, AutoStart::Auto).unwrap();
        boot(&mut sched);
        tick_once(&mut sched);

        let request = sched.delay_current(0);
        // already the best choice: no switch, never enters Waiting
        assert!(request.is_none());
        assert_eq!(state_of(&sched, task), TaskState::Running);
        assert_eq!(sched.current_task(), Some(task));
    }

    #[test]
    fn suspended_waiter_keeps_its_residual_ticks() {
        let mut sched = Scheduler::new();
        let task = sched.create_task(body_a, 2, AutoStart::Auto).unwrap();
        boot(&mut sched);
        tick_once(&mut sched);
        do_delay(&mut sched, 5);
        tick_once(&mut sched);
        assert_eq!(sched.task(task).unwrap().local_tick, 4);

        // state is the governing predicate: a suspended task is off the
        // wait queue even mid-countdown
        sched.tasks[task].state = TaskState::Suspended;
        for _ in 0..10 {
            tick_once(&mut sched);
        }
        assert_eq!(state_of(&sched, task), TaskState::Suspended);
        assert_eq!(sched.task(task).unwrap().local_tick, 4);

        do_activate(&mut sched, task);
        assert_eq!(sched.current_task(), Some(task));
    }

    // -- suspend / activate -------------------------------------------------

    #[test]
    fn suspend_falls_back_to_idle() {
        let mut sched = Scheduler::new();
        let task = sched.create_task(body_a, 3, AutoStart::Auto).unwrap();
        let idle = boot(&mut sched);
        tick_once(&mut sched);

        do_suspend(&mut sched);
        assert_eq!(state_of(&sched, task), TaskState::Suspended);
        assert_eq!(sched.current_task(), Some(idle));
        assert_eq!(state_of(&sched, idle), TaskState::Running);

        // the clock keeps running while idle carries the system
        let before = sched.clock();
        tick_once(&mut sched);
        tick_once(&mut sched);
        assert_eq!(sched.clock(), before + 2);
        assert_eq!(sched.current_task(), Some(idle));

        // reactivation takes effect on the next dispatch
        do_activate(&mut sched, task);
        assert_eq!(sched.current_task(), Some(task));
    }

    #[test]
    fn activate_on_ready_task_changes_nothing() {
        let mut sched = Scheduler::new();
        let high = sched.create_task(body_a, 5, AutoStart::Auto).unwrap();
        let low = sched.create_task(body_b, 1, AutoStart::Auto).unwrap();
        boot(&mut sched);
        tick_once(&mut sched);
        assert_eq!(sched.current_task(), Some(high));

        // re-dispatch happens but is a no-op while priorities are unchanged
        let request = sched.activate(low).unwrap();
        assert!(request.is_none());
        assert_eq!(state_of(&sched, low), TaskState::Ready);
        assert_eq!(sched.current_task(), Some(high));
    }

    #[test]
    fn activate_does_not_demote_the_running_task() {
        let mut sched = Scheduler::new();
        let task = sched.create_task(body_a, 3, AutoStart::Auto).unwrap();
        boot(&mut sched);
        tick_once(&mut sched);

        let request = sched.activate(task).unwrap();
        assert!(request.is_none());
        assert_eq!(state_of(&sched, task), TaskState::Running);
        assert_eq!(running_count(&sched), 1);
    }

    #[test]
    fn activate_rejects_unknown_handles_untouched() {
        let mut sched = Scheduler::new();
        let task = sched.create_task(body_a, 3, AutoStart::Auto).unwrap();
        boot(&mut sched);
        tick_once(&mut sched);

        assert_eq!(
            sched.activate(MAX_TASKS + 5),
            Err(KernelError::InvalidHandle)
        );
        assert_eq!(sched.current_task(), Some(task));
        assert_eq!(running_count(&sched), 1);
    }

    #[test]
    fn autostart_suspended_task_stays_off_until_activated() {
        let mut sched = Scheduler::new();
        let worker = sched.create_task(body_a, 9, AutoStart::Suspended).unwrap();
        let driver = sched.create_task(body_b, 2, AutoStart::Auto).unwrap();
        boot(&mut sched);
        tick_once(&mut sched);
        // the suspended task outranks everyone but is not schedulable
        assert_eq!(sched.current_task(), Some(driver));

        do_activate(&mut sched, worker);
        assert_eq!(sched.current_task(), Some(worker));
        assert_eq!(state_of(&sched, driver), TaskState::Ready);
    }

    // -- invariants across longer sequences ---------------------------------

    #[test]
    fn exactly_one_task_runs_after_any_sequence() {
        let mut sched = Scheduler::new();
        let a = sched.create_task(body_a, 2, AutoStart::Auto).unwrap();
        let b = sched.create_task(body_b, 3, AutoStart::Auto).unwrap();
        sched.create_task(body_a, 1, AutoStart::Suspended).unwrap();
        boot(&mut sched);
        tick_once(&mut sched);
        assert_eq!(running_count(&sched), 1);

        do_delay(&mut sched, 2);
        assert_eq!(running_count(&sched), 1);
        tick_once(&mut sched);
        assert_eq!(running_count(&sched), 1);
        tick_once(&mut sched);
        assert_eq!(sched.current_task(), Some(b));
        assert_eq!(running_count(&sched), 1);

        do_suspend(&mut sched);
        assert_eq!(sched.current_task(), Some(a));
        assert_eq!(running_count(&sched), 1);
        do_activate(&mut sched, b);
        assert_eq!(sched.current_task(), Some(b));
        assert_eq!(running_count(&sched), 1);
    }

    #[test]
    fn idle_never_shadows_a_runnable_task() {
        let mut sched = Scheduler::new();
        let a = sched.create_task(body_a, 2, AutoStart::Auto).unwrap();
        let b = sched.create_task(body_b, 3, AutoStart::Auto).unwrap();
        let idle = boot(&mut sched);

        // B alternates delay(10)/run, A spins; idle must never run
        tick_once(&mut sched);
        assert_eq!(sched.current_task(), Some(b));
        for _ in 0..10 {
            do_delay(&mut sched, 10);
            assert_eq!(sched.current_task(), Some(a));
            for _ in 0..9 {
                tick_once(&mut sched);
                assert_ne!(sched.current_task(), Some(idle));
                assert_eq!(sched.current_task(), Some(a));
            }
            tick_once(&mut sched);
            assert_eq!(sched.current_task(), Some(b));
        }
    }

    #[test]
    fn tick_hook_runs_once_per_tick() {
        use std::sync::atomic::{AtomicU32, Ordering};
        static HOOK_CALLS: AtomicU32 = AtomicU32::new(0);
        fn hook() {
            HOOK_CALLS.fetch_add(1, Ordering::Relaxed);
        }

        let mut sched = Scheduler::new();
        sched.create_task(body_a, 2, AutoStart::Auto).unwrap();
        sched.set_tick_hook(hook);
        boot(&mut sched);
        for _ in 0..7 {
            tick_once(&mut sched);
        }
        assert_eq!(HOOK_CALLS.load(Ordering::Relaxed), 7);
        assert_eq!(sched.clock(), 7);
    }
}
