//! Shared primitive types used across the entire simulation.

/// Master seed for a generation or analysis run.
pub type Seed = u64;

/// Stable 1-based identifier of an individual in a cohort.
/// Assigned at creation, never reused within a table.
pub type PersonId = u32;
