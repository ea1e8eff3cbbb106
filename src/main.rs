//! # Demo Firmware
//!
//! Exercises the kernel with three tasks of distinct temperament plus the
//! heartbeat observer:
//!
//! | Task | Priority | Start | Behavior |
//! |------|----------|-------|----------|
//! | `sensor_task`  | 3 | auto      | samples every 10 ticks, wakes the logger |
//! | `control_task` | 2 | auto      | crunches continuously, never blocks |
//! | `logger_task`  | 4 | suspended | drains the sample counter, suspends again |
//!
//! The control task only makes progress while the sensor task sleeps and
//! the logger is suspended; the logger, despite being created suspended,
//! preempts everything the moment the sensor activates it. The tick hook
//! divides the tick down to the heartbeat period and toggles an is-alive
//! flag that board code would route to a LED.

#![cfg_attr(all(target_arch = "arm", target_os = "none"), no_std)]
#![cfg_attr(all(target_arch = "arm", target_os = "none"), no_main)]

#[cfg(all(target_arch = "arm", target_os = "none"))]
mod firmware {
    use core::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

    use cortex_m_rt::entry;
    use panic_halt as _;

    use minos::config::{HEARTBEAT_PERIOD_US, TICK_PERIOD_US};
    use minos::kernel;
    use minos::task::AutoStart;

    /// Samples taken by the sensor task.
    static SENSOR_SAMPLES: AtomicU32 = AtomicU32::new(0);
    /// Samples the logger has drained so far.
    static SAMPLES_LOGGED: AtomicU32 = AtomicU32::new(0);
    /// Iterations of the control loop; grows only while nothing above
    /// priority 2 is runnable.
    static CONTROL_STEPS: AtomicU32 = AtomicU32::new(0);
    /// Handle of the logger task, published by `main` before the
    /// scheduler starts.
    static LOGGER_HANDLE: AtomicUsize = AtomicUsize::new(usize::MAX);
    /// Is-alive flag; board code would mirror this onto a GPIO pin.
    static HEARTBEAT_LEVEL: AtomicBool = AtomicBool::new(false);
    /// Ticks since the last heartbeat edge.
    static HEARTBEAT_COUNT: AtomicU32 = AtomicU32::new(0);

    /// How many samples pile up before the sensor wakes the logger.
    const SAMPLES_PER_LOG: u32 = 8;

    /// Ticks between heartbeat edges.
    const HEARTBEAT_TICKS: u32 = HEARTBEAT_PERIOD_US / TICK_PERIOD_US;

    /// Priority 3, auto-start. Takes one "sample" every 10 ticks and
    /// activates the logger once enough have accumulated. Spends almost
    /// all of its life in the wait queue.
    extern "C" fn sensor_task() -> ! {
        loop {
            kernel::delay(10);
            let taken = SENSOR_SAMPLES.fetch_add(1, Ordering::Relaxed) + 1;
            if taken % SAMPLES_PER_LOG == 0 {
                kernel::activate_task(LOGGER_HANDLE.load(Ordering::Relaxed)).ok();
            }
        }
    }

    /// Priority 2, auto-start. A best-effort number cruncher that never
    /// blocks; it soaks up whatever CPU the sleepers leave behind and is
    /// preempted by every sensor wake-up and logger activation.
    extern "C" fn control_task() -> ! {
        loop {
            CONTROL_STEPS.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Priority 4, created suspended. Runs only when the sensor activates
    /// it: drains the sample counter, then suspends itself until the next
    /// batch. Highest priority, so a batch is logged the moment it is
    /// ready.
    extern "C" fn logger_task() -> ! {
        loop {
            let pending = SENSOR_SAMPLES.load(Ordering::Relaxed);
            SAMPLES_LOGGED.store(pending, Ordering::Relaxed);
            kernel::suspend_task();
        }
    }

    /// Tick hook: passive observer dividing the tick down to the
    /// heartbeat period. Runs in the tick interrupt, so it only counts
    /// and toggles; no kernel calls.
    fn heartbeat() {
        let elapsed = HEARTBEAT_COUNT.fetch_add(1, Ordering::Relaxed) + 1;
        if elapsed >= HEARTBEAT_TICKS {
            HEARTBEAT_COUNT.store(0, Ordering::Relaxed);
            let level = HEARTBEAT_LEVEL.load(Ordering::Relaxed);
            HEARTBEAT_LEVEL.store(!level, Ordering::Relaxed);
        }
    }

    #[entry]
    fn main() -> ! {
        let peripherals = cortex_m::Peripherals::take().unwrap();

        kernel::set_tick_hook(heartbeat);

        kernel::create_task(sensor_task, 3, AutoStart::Auto).expect("failed to create sensor_task");
        kernel::create_task(control_task, 2, AutoStart::Auto)
            .expect("failed to create control_task");
        let logger = kernel::create_task(logger_task, 4, AutoStart::Suspended)
            .expect("failed to create logger_task");
        LOGGER_HANDLE.store(logger, Ordering::Relaxed);

        kernel::start_scheduler(peripherals)
    }
}

#[cfg(not(all(target_arch = "arm", target_os = "none")))]
fn main() {}
