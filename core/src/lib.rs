//! outreach-core: deterministic simulation of a randomized
//! public-health outreach experiment.
//!
//! Two components carry the weight:
//!   - the cohort generator (`cohort`, `config`, `funnel`): a seeded
//!     causal data-generating process with confounding, a gated
//!     behavioral funnel, and heterogeneous treatment effects;
//!   - the permutation engine (`permutation`): a randomization test of
//!     the relative lift of variant B over variant A.
//!
//! `balance` turns the randomization invariant into a checked property,
//! and `rng` owns every bit of randomness — nothing in this crate may
//! touch a platform RNG.

pub mod balance;
pub mod cohort;
pub mod config;
pub mod error;
pub mod funnel;
pub mod permutation;
pub mod rng;
pub mod types;
