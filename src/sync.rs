//! # Synchronization Primitives
//!
//! Interrupt-safe critical section for the single-core Cortex-M target.
//! Every API call that mutates the shared task table runs inside one of
//! these, so the tick interrupt can never observe a half-finished
//! transaction.

use cortex_m::interrupt;

/// Execute a closure with interrupts disabled.
///
/// Keep the enclosed work short: a pending tick is delayed until the
/// closure returns, and so is any context switch it pended.
#[inline]
pub fn critical_section<F, R>(f: F) -> R
where
    F: FnOnce(&interrupt::CriticalSection) -> R,
{
    interrupt::free(f)
}
