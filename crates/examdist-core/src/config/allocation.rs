//! Allocation gate and random source configuration.

use serde::{Deserialize, Serialize};

/// Scope of the allocation critical section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GateScope {
    /// One critical section for every exam in the process.
    #[default]
    Global,
    /// One critical section per exam, created on first use.
    PerExam,
}

/// Allocation engine and gate configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AllocationConfig {
    /// Critical section scope.
    #[serde(default)]
    pub gate: GateScope,
    /// Maximum time to wait for the gate, in milliseconds.
    ///
    /// Unset means wait indefinitely.
    #[serde(default)]
    pub acquire_timeout_ms: Option<u64>,
    /// Fixed seed for the allocation random source.
    ///
    /// Unset means seed from the operating system.
    #[serde(default)]
    pub rng_seed: Option<u64>,
}
