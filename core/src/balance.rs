//! Randomization balance checks.
//!
//! The causal claim downstream rests on `message_variant` being
//! independent of every covariate. Assignment draws from its own RNG
//! stream, which makes that true by construction — this module makes
//! it a *checked* invariant by computing chi-square independence
//! statistics of variant against region and against risk quartile.

use crate::cohort::{CohortTable, Region, Variant};
use crate::error::{SimError, SimResult};
use serde::Serialize;

/// Chi-square critical value at p = 0.001 for 3 degrees of freedom.
/// Both checks below are 2 x 4 tables, so df = 3.
pub const CHI2_DF3_P001: f64 = 16.266;

#[derive(Debug, Clone, Serialize)]
pub struct ChiSquare {
    pub statistic: f64,
    pub dof: usize,
}

impl ChiSquare {
    pub fn passes(&self, critical: f64) -> bool {
        self.statistic < critical
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BalanceReport {
    pub by_region: ChiSquare,
    pub by_risk_quartile: ChiSquare,
}

impl BalanceReport {
    /// True when neither covariate shows an association with the
    /// variant beyond the fixed critical value.
    pub fn passes(&self) -> bool {
        self.by_region.passes(CHI2_DF3_P001) && self.by_risk_quartile.passes(CHI2_DF3_P001)
    }
}

/// Compute the balance report for a generated table.
pub fn balance_report(table: &CohortTable) -> SimResult<BalanceReport> {
    if table.is_empty() {
        return Err(SimError::DegenerateInput("empty table has no balance".into()));
    }

    let region_of = |row: &crate::cohort::Individual| {
        Region::ALL
            .iter()
            .position(|r| *r == row.profile.region)
            .expect("region is a closed enum")
    };
    let by_region = chi_square(table, 4, region_of);

    // Sample risk quartiles, then bucket each row by them.
    let mut risks: Vec<f64> = table.rows().iter().map(|r| r.profile.risk_score).collect();
    risks.sort_by(f64::total_cmp);
    let q = |f: f64| risks[((risks.len() - 1) as f64 * f) as usize];
    let (q1, q2, q3) = (q(0.25), q(0.50), q(0.75));
    let by_risk_quartile = chi_square(table, 4, move |row| {
        let r = row.profile.risk_score;
        if r <= q1 {
            0
        } else if r <= q2 {
            1
        } else if r <= q3 {
            2
        } else {
            3
        }
    });

    Ok(BalanceReport {
        by_region,
        by_risk_quartile,
    })
}

/// Pearson chi-square statistic for the 2 x k table of variant vs a
/// bucketing of the rows. Cells with zero expected count contribute
/// nothing (their column is empty).
fn chi_square(
    table: &CohortTable,
    k: usize,
    bucket_of: impl Fn(&crate::cohort::Individual) -> usize,
) -> ChiSquare {
    let n = table.len() as f64;
    let mut observed = vec![[0usize; 2]; k];
    for row in table.rows() {
        let bucket = bucket_of(row);
        let g = (row.message_variant == Variant::B) as usize;
        observed[bucket][g] += 1;
    }

    let total_b: usize = observed.iter().map(|c| c[1]).sum();
    let total_a = table.len() - total_b;
    let group_totals = [total_a as f64, total_b as f64];

    let mut statistic = 0.0;
    for cell in &observed {
        let column_total = (cell[0] + cell[1]) as f64;
        if column_total == 0.0 {
            continue;
        }
        for (g, group_total) in group_totals.iter().enumerate() {
            let expected = group_total * column_total / n;
            if expected > 0.0 {
                let diff = cell[g] as f64 - expected;
                statistic += diff * diff / expected;
            }
        }
    }

    ChiSquare { statistic, dof: k - 1 }
}
