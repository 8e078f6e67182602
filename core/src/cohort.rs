//! Synthetic cohort generation.
//!
//! `generate` produces the full table in one pass, in strict causal
//! order per individual: covariates, then engagement history, then the
//! randomized assignment, then the behavioral funnel. The table is a
//! value — generated once per run, immutable afterwards, read-only for
//! every downstream consumer.
//!
//! RULE: the treatment assignment draws from its own RNG stream
//! (`StreamSlot::Assignment`), so it cannot correlate with any
//! covariate by construction. `balance.rs` verifies the same property
//! empirically instead of assuming it.

use crate::{
    config::CohortConfig,
    error::{SimError, SimResult},
    funnel,
    rng::{RngBank, StreamRng, StreamSlot},
    types::{PersonId, Seed},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sex {
    F,
    M,
}

impl Sex {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::F => "F",
            Self::M => "M",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Region {
    #[serde(rename = "ATL-Core")]
    AtlCore,
    #[serde(rename = "ATL-Metro")]
    AtlMetro,
    #[serde(rename = "North-GA")]
    NorthGa,
    #[serde(rename = "South-GA")]
    SouthGa,
}

impl Region {
    pub const ALL: [Region; 4] = [Self::AtlCore, Self::AtlMetro, Self::NorthGa, Self::SouthGa];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AtlCore => "ATL-Core",
            Self::AtlMetro => "ATL-Metro",
            Self::NorthGa => "North-GA",
            Self::SouthGa => "South-GA",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Channel {
    #[serde(rename = "SMS")]
    Sms,
    #[serde(rename = "Email")]
    Email,
    #[serde(rename = "IVR")]
    Ivr,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sms => "SMS",
            Self::Email => "Email",
            Self::Ivr => "IVR",
        }
    }
}

/// The randomized message variant. A is control, B is treatment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Variant {
    A,
    B,
}

impl Variant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
        }
    }
}

/// Everything known about an individual before the message goes out.
/// This is the legal feature surface for pre-treatment modeling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub age: u32,
    pub sex: Sex,
    pub region: Region,
    pub risk_score: f64,
    pub barriers_index: f64,
    pub channel: Channel,
    pub weekday: u32,
    pub send_hour: u32,
    pub prior_cdc_interactions_90d: u32,
    pub prior_appointments_1y: u32,
    pub missed_appointments_1y: u32,
}

/// One row of the cohort table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Individual {
    pub person_id: PersonId,
    #[serde(flatten)]
    pub profile: Profile,
    pub message_variant: Variant,
    pub opened: bool,
    pub clicked: bool,
    pub scheduled_7d: bool,
    pub completed_30d: bool,
}

/// Stable column names. Downstream modeling and reporting key on these
/// by name; never rename them.
pub mod columns {
    pub const PERSON_ID: &str = "person_id";
    pub const AGE: &str = "age";
    pub const SEX: &str = "sex";
    pub const REGION: &str = "region";
    pub const RISK_SCORE: &str = "risk_score";
    pub const BARRIERS_INDEX: &str = "barriers_index";
    pub const CHANNEL: &str = "channel";
    pub const WEEKDAY: &str = "weekday";
    pub const SEND_HOUR: &str = "send_hour";
    pub const PRIOR_CDC_INTERACTIONS_90D: &str = "prior_cdc_interactions_90d";
    pub const PRIOR_APPOINTMENTS_1Y: &str = "prior_appointments_1y";
    pub const MISSED_APPOINTMENTS_1Y: &str = "missed_appointments_1y";
    pub const MESSAGE_VARIANT: &str = "message_variant";
    pub const OPENED: &str = "opened";
    pub const CLICKED: &str = "clicked";
    pub const SCHEDULED_7D: &str = "scheduled_7d";
    pub const COMPLETED_30D: &str = "completed_30d";

    /// Columns observable before message delivery. The predictive
    /// modeling collaborator may only consume these (plus the variant)
    /// when predicting funnel outcomes — anything else is label leakage.
    pub const PRE_DELIVERY: &[&str] = &[
        PERSON_ID,
        AGE,
        SEX,
        REGION,
        RISK_SCORE,
        BARRIERS_INDEX,
        CHANNEL,
        WEEKDAY,
        SEND_HOUR,
        PRIOR_CDC_INTERACTIONS_90D,
        PRIOR_APPOINTMENTS_1Y,
        MISSED_APPOINTMENTS_1Y,
        MESSAGE_VARIANT,
    ];

    /// Columns that only exist after delivery. Outcomes, never features.
    pub const POST_DELIVERY: &[&str] = &[OPENED, CLICKED, SCHEDULED_7D, COMPLETED_30D];

    pub fn is_pre_delivery(name: &str) -> bool {
        PRE_DELIVERY.contains(&name)
    }

    /// Full schema, CSV header order.
    pub fn all() -> Vec<&'static str> {
        let mut names = PRE_DELIVERY.to_vec();
        names.extend_from_slice(POST_DELIVERY);
        names
    }
}

/// The immutable cohort table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CohortTable {
    rows: Vec<Individual>,
}

impl CohortTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Individual] {
        &self.rows
    }

    /// Build a table directly from rows. Intended for tests and for
    /// re-ordering scenarios; `generate` is the production entry point.
    pub fn from_rows(rows: Vec<Individual>) -> Self {
        Self { rows }
    }

    /// The treatment-label column.
    pub fn variant_labels(&self) -> Vec<crate::cohort::Variant> {
        self.rows.iter().map(|r| r.message_variant).collect()
    }

    /// A boolean outcome column, by stable name.
    pub fn bool_column(&self, name: &str) -> SimResult<Vec<bool>> {
        let extract: fn(&Individual) -> bool = match name {
            columns::OPENED => |r| r.opened,
            columns::CLICKED => |r| r.clicked,
            columns::SCHEDULED_7D => |r| r.scheduled_7d,
            columns::COMPLETED_30D => |r| r.completed_30d,
            _ => {
                return Err(SimError::UnknownColumn { name: name.to_string() });
            }
        };
        Ok(self.rows.iter().map(extract).collect())
    }

    /// Outcome rate split by variant: (n_a, n_b, rate_a, rate_b).
    pub fn rates_by_variant(&self, outcome: &str) -> SimResult<(usize, usize, f64, f64)> {
        let outcomes = self.bool_column(outcome)?;
        let mut n = [0usize; 2];
        let mut hits = [0usize; 2];
        for (row, hit) in self.rows.iter().zip(&outcomes) {
            let g = (row.message_variant == Variant::B) as usize;
            n[g] += 1;
            hits[g] += *hit as usize;
        }
        let rate = |g: usize| {
            if n[g] == 0 { f64::NAN } else { hits[g] as f64 / n[g] as f64 }
        };
        Ok((n[0], n[1], rate(0), rate(1)))
    }
}

/// Generate a cohort of exactly `n` individuals.
///
/// Deterministic: identical (n, seed, config) yields a bit-identical
/// table. Validation runs first and fails fast; no partial table is
/// ever returned.
pub fn generate(n: usize, seed: Seed, config: &CohortConfig) -> SimResult<CohortTable> {
    if n == 0 {
        return Err(SimError::Configuration("cohort size must be > 0".into()));
    }
    config.validate()?;

    let bank = RngBank::new(seed);
    let mut demo_rng = bank.for_stream(StreamSlot::Demographics);
    let mut engagement_rng = bank.for_stream(StreamSlot::Engagement);
    let mut assignment_rng = bank.for_stream(StreamSlot::Assignment);
    let mut funnel_rng = bank.for_stream(StreamSlot::Funnel);

    let mut rows = Vec::with_capacity(n);
    for i in 0..n {
        let profile = draw_profile(&mut demo_rng, &mut engagement_rng, config);

        // Assignment stream: independent of everything drawn above.
        let message_variant = if assignment_rng.chance(config.treatment.treatment_rate) {
            Variant::B
        } else {
            Variant::A
        };

        let outcome = funnel::run_funnel(&mut funnel_rng, &profile, message_variant, config);

        rows.push(Individual {
            person_id: (i + 1) as PersonId,
            profile,
            message_variant,
            opened: outcome.opened,
            clicked: outcome.clicked,
            scheduled_7d: outcome.scheduled_7d,
            completed_30d: outcome.completed_30d,
        });
    }

    let table = CohortTable { rows };
    let (n_a, n_b, rate_a, rate_b) = table.rates_by_variant(columns::SCHEDULED_7D)?;
    log::info!(
        "cohort: generated {n} individuals (seed={seed}), scheduled_7d A={rate_a:.4} (n={n_a}) B={rate_b:.4} (n={n_b})"
    );
    Ok(table)
}

fn draw_profile(
    demo_rng: &mut StreamRng,
    engagement_rng: &mut StreamRng,
    config: &CohortConfig,
) -> Profile {
    let age_span = u64::from(config.age.max - config.age.min) + 1;
    let age = config.age.min + demo_rng.next_u64_below(age_span) as u32;
    let sex = *pick_weighted(demo_rng, &config.sex_weights);
    let region = *pick_weighted(demo_rng, &config.region_weights);

    let risk_score = clip(
        config.risk.intercept
            + config.risk.age_slope * f64::from(age - config.age.min)
            + demo_rng.normal() * config.risk.noise_sd,
        0.0,
        1.0,
    );

    let b = &config.barriers;
    let mut barriers_index = demo_rng.normal() * b.noise_sd;
    if region == Region::SouthGa {
        barriers_index += b.south_ga_shift;
    }
    if region == Region::NorthGa {
        barriers_index += b.north_ga_shift;
    }
    if age > b.elderly_age {
        barriers_index += b.elderly_shift;
    }
    let barriers_index = clip(barriers_index, -3.0, 3.0);

    let channel = *pick_weighted(demo_rng, &config.channel_weights);
    let send_hour = 8 + demo_rng.next_u64_below(13) as u32;
    let weekday = demo_rng.next_u64_below(7) as u32;

    // Engagement history, conditioned on risk.
    let e = &config.engagement;
    let interactions_rate = clip(
        e.interactions_base_rate + e.interactions_risk_slope * risk_score,
        e.interactions_rate_min,
        e.interactions_rate_max,
    );
    let prior_cdc_interactions_90d = engagement_rng.poisson(interactions_rate);

    let appointments_rate = clip(
        e.appointments_base_rate + e.appointments_risk_slope * risk_score,
        e.appointments_rate_min,
        e.appointments_rate_max,
    );
    let prior_appointments_1y = engagement_rng.poisson(appointments_rate);

    let miss_prob = clip(
        e.miss_base_prob + e.miss_risk_slope * (1.0 - risk_score),
        e.miss_prob_min,
        e.miss_prob_max,
    );
    let missed_appointments_1y = engagement_rng.binomial(prior_appointments_1y + 1, miss_prob);

    Profile {
        age,
        sex,
        region,
        risk_score,
        barriers_index,
        channel,
        weekday,
        send_hour,
        prior_cdc_interactions_90d,
        prior_appointments_1y,
        missed_appointments_1y,
    }
}

fn pick_weighted<'a, T>(rng: &mut StreamRng, items: &'a [(T, f64)]) -> &'a T {
    let total: f64 = items.iter().map(|(_, w)| w).sum();
    let roll = rng.next_f64() * total;
    let mut cumulative = 0.0;
    for (item, weight) in items {
        cumulative += weight;
        if roll < cumulative {
            return item;
        }
    }
    &items.last().expect("validated non-empty weights").0
}

fn clip(x: f64, lo: f64, hi: f64) -> f64 {
    x.max(lo).min(hi)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_exactly_n_rows_with_stable_ids() {
        let table = generate(250, 11, &CohortConfig::default()).unwrap();
        assert_eq!(table.len(), 250);
        assert_eq!(table.rows()[0].person_id, 1);
        assert_eq!(table.rows()[249].person_id, 250);
    }

    #[test]
    fn zero_population_is_rejected() {
        let err = generate(0, 1, &CohortConfig::default()).unwrap_err();
        assert!(matches!(err, SimError::Configuration(_)));
    }

    #[test]
    fn attributes_stay_in_documented_bounds() {
        let table = generate(3_000, 17, &CohortConfig::default()).unwrap();
        for row in table.rows() {
            let p = &row.profile;
            assert!((18..=85).contains(&p.age), "age out of range: {}", p.age);
            assert!((0.0..=1.0).contains(&p.risk_score));
            assert!((-3.0..=3.0).contains(&p.barriers_index));
            assert!((8..=20).contains(&p.send_hour));
            assert!(p.weekday < 7);
        }
    }

    #[test]
    fn unknown_column_is_reported_by_name() {
        let table = generate(10, 3, &CohortConfig::default()).unwrap();
        let err = table.bool_column("conversion").unwrap_err();
        match err {
            SimError::UnknownColumn { name } => assert_eq!(name, "conversion"),
            other => panic!("expected UnknownColumn, got {other:?}"),
        }
    }

    #[test]
    fn schema_separates_pre_and_post_delivery_columns() {
        assert!(columns::is_pre_delivery(columns::RISK_SCORE));
        assert!(columns::is_pre_delivery(columns::MESSAGE_VARIANT));
        assert!(!columns::is_pre_delivery(columns::OPENED));
        assert!(!columns::is_pre_delivery(columns::SCHEDULED_7D));
        assert_eq!(columns::all().len(), 17);
    }
}
