//! # Kernel Configuration
//!
//! Compile-time constants governing the scheduler and system behavior.
//! All limits are fixed at compile time, no dynamic allocation.

/// Maximum number of application tasks. The task table holds one extra
/// slot beyond this, reserved for the idle task, so idle never counts
/// against application capacity.
pub const MAX_TASKS: usize = 8;

/// Per-task stack size in 32-bit words. Must be even so every stack top
/// lands on an 8-byte boundary (AAPCS), and must leave room for the
/// 16-word context frame plus the deepest call chain of the task body.
pub const STACK_WORDS: usize = 256;

/// Scheduler tick period in microseconds. Each tick advances the global
/// clock by one, so this is also the resolution of `delay()`.
pub const TICK_PERIOD_US: u32 = 1_000;

/// Core clock frequency in Hz, used to derive the SysTick reload value
/// (default for STM32F4 running from the 16 MHz HSI).
pub const SYSTEM_CLOCK_HZ: u32 = 16_000_000;

/// Period of the optional is-alive heartbeat observer in microseconds.
/// The kernel only calls the registered tick hook; dividing the tick down
/// to this period is the observer's job.
pub const HEARTBEAT_PERIOD_US: u32 = 1_000_000;
