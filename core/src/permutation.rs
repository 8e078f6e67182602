//! Permutation-test engine.
//!
//! Estimates the null distribution of the relative-lift statistic by
//! re-shuffling the treatment labels (a full permutation of the label
//! vector, preserving group sizes — not a bootstrap), recomputing the
//! statistic per relabeling, and reporting the tail fraction.
//!
//! p-value policy (explicit, see DESIGN.md): Laplace-smoothed,
//! p = (1 + #extreme) / (n_permutations + 1). The reported p-value is
//! therefore never exactly zero.

use crate::cohort::{columns, CohortTable, Variant};
use crate::error::{SimError, SimResult};
use crate::rng::{RngBank, StreamSlot};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// The alternative hypothesis for the tail computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Alternative {
    TwoSided,
    Greater,
    Less,
}

impl FromStr for Alternative {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "two-sided" | "two_sided" => Ok(Self::TwoSided),
            "greater" => Ok(Self::Greater),
            "less" => Ok(Self::Less),
            other => Err(SimError::Configuration(format!(
                "unknown alternative '{other}' (expected two-sided, greater, or less)"
            ))),
        }
    }
}

/// Everything a reporting consumer needs from one test run.
#[derive(Debug, Clone, Serialize)]
pub struct TestResult {
    pub outcome_column: String,
    pub alternative: Alternative,
    pub n_permutations: usize,
    /// Relative lift of B over A on the observed labels.
    pub observed_lift: f64,
    /// Laplace-smoothed tail fraction.
    pub p_value: f64,
    pub n_a: usize,
    pub n_b: usize,
    pub rate_a: f64,
    pub rate_b: f64,
    /// The full null distribution, length exactly `n_permutations`.
    pub null_distribution: Vec<f64>,
}

/// Run a randomization test of `outcome_column` against the treatment
/// labels in `treatment_column`.
///
/// Deterministic: identical (table, n_permutations, seed, alternative)
/// produce a bit-identical result. The shuffle RNG is a single stream
/// derived from `seed`; a draw-count audit at the end catches any code
/// path that consumes or reseeds the stream mid-run.
pub fn run_test(
    table: &CohortTable,
    treatment_column: &str,
    outcome_column: &str,
    n_permutations: usize,
    seed: u64,
    alternative: Alternative,
) -> SimResult<TestResult> {
    if treatment_column != columns::MESSAGE_VARIANT {
        return Err(SimError::UnknownColumn {
            name: treatment_column.to_string(),
        });
    }
    if n_permutations == 0 {
        return Err(SimError::Configuration(
            "n_permutations must be > 0".into(),
        ));
    }

    let outcomes = table.bool_column(outcome_column)?;
    let labels = table.variant_labels();
    let n = labels.len();

    let n_b = labels.iter().filter(|v| **v == Variant::B).count();
    let n_a = n - n_b;
    if n_a == 0 || n_b == 0 {
        return Err(SimError::DegenerateInput(format!(
            "both groups must be non-empty (nA={n_a}, nB={n_b})"
        )));
    }

    let total_hits = outcomes.iter().filter(|o| **o).count();
    if total_hits == 0 || total_hits == n {
        return Err(SimError::DegenerateInput(format!(
            "outcome '{outcome_column}' is single-class ({total_hits}/{n} positive)"
        )));
    }

    let hits_b = labels
        .iter()
        .zip(&outcomes)
        .filter(|(v, o)| **v == Variant::B && **o)
        .count();
    let hits_a = total_hits - hits_b;
    if hits_a == 0 {
        return Err(SimError::DegenerateInput(
            "control rate is exactly zero; relative lift is undefined".into(),
        ));
    }

    let rate_a = hits_a as f64 / n_a as f64;
    let rate_b = hits_b as f64 / n_b as f64;
    let observed_lift = (rate_b - rate_a) / rate_a;

    // Null construction: Fisher-Yates relabelings, O(n) each,
    // O(n + n_permutations) memory total.
    let bank = RngBank::new(seed);
    let mut rng = bank.for_stream(StreamSlot::Shuffle);
    let mut shuffled = labels;
    let mut null_distribution = Vec::with_capacity(n_permutations);
    for _ in 0..n_permutations {
        rng.shuffle(&mut shuffled);
        null_distribution.push(lift_of(&shuffled, &outcomes, n_a, n_b, total_hits));
    }

    let expected_draws = n_permutations as u64 * (n as u64 - 1);
    if rng.draws() != expected_draws {
        return Err(SimError::ReproducibilityViolation {
            expected: expected_draws,
            observed: rng.draws(),
        });
    }

    let extreme = null_distribution
        .iter()
        .filter(|t| match alternative {
            Alternative::TwoSided => t.abs() >= observed_lift.abs(),
            Alternative::Greater => **t >= observed_lift,
            Alternative::Less => **t <= observed_lift,
        })
        .count();
    let p_value = (1 + extreme) as f64 / (n_permutations + 1) as f64;

    log::debug!(
        "permutation test: outcome={outcome_column} lift={observed_lift:.4} p={p_value:.5} \
         (nA={n_a} pA={rate_a:.4}, nB={n_b} pB={rate_b:.4}, {n_permutations} permutations)"
    );

    Ok(TestResult {
        outcome_column: outcome_column.to_string(),
        alternative,
        n_permutations,
        observed_lift,
        p_value,
        n_a,
        n_b,
        rate_a,
        rate_b,
        null_distribution,
    })
}

/// Relative lift for one (re)labeling. Group sizes and the pooled hit
/// count are invariant under relabeling, so only the B-side hits need
/// recounting. A relabeling that strands every hit in B has a zero
/// control rate; the statistic maps to +infinity (maximally extreme)
/// rather than NaN.
fn lift_of(labels: &[Variant], outcomes: &[bool], n_a: usize, n_b: usize, total_hits: usize) -> f64 {
    let hits_b = labels
        .iter()
        .zip(outcomes)
        .filter(|(v, o)| **v == Variant::B && **o)
        .count();
    let hits_a = total_hits - hits_b;
    if hits_a == 0 {
        return f64::INFINITY;
    }
    let rate_a = hits_a as f64 / n_a as f64;
    let rate_b = hits_b as f64 / n_b as f64;
    (rate_b - rate_a) / rate_a
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alternative_parses_from_cli_spellings() {
        assert_eq!("two-sided".parse::<Alternative>().unwrap(), Alternative::TwoSided);
        assert_eq!("two_sided".parse::<Alternative>().unwrap(), Alternative::TwoSided);
        assert_eq!("greater".parse::<Alternative>().unwrap(), Alternative::Greater);
        assert_eq!("less".parse::<Alternative>().unwrap(), Alternative::Less);
        assert!("both".parse::<Alternative>().is_err());
    }

    #[test]
    fn lift_of_guards_zero_control_rate() {
        let labels = vec![Variant::B, Variant::B, Variant::A];
        let outcomes = vec![true, true, false];
        assert_eq!(lift_of(&labels, &outcomes, 1, 2, 2), f64::INFINITY);
    }
}
