//! # Architecture Abstraction Layer
//!
//! The boundary between the portable scheduler and the hardware: stack
//! pointer save/restore, the pended context-switch exception, and the tick
//! timer. Currently implements the Cortex-M3/M4 (Armv7-M) port; extensible
//! to other architectures by adding sibling modules.

#[cfg(all(target_arch = "arm", target_os = "none"))]
pub mod cortex_m4;
