//! Generation configuration.
//!
//! Every distribution parameter of the cohort generator lives here so a
//! run is fully described by (n, seed, config). Validation is eager and
//! rejecting: a parameter outside its legal range fails the run with
//! `SimError::Configuration` before a single individual is drawn —
//! nothing is silently clamped. The funnel stages use a logistic link,
//! so stage probabilities cannot leave [0, 1] by construction; the only
//! clipping in the model is the documented attribute clipping of
//! `risk_score` to [0, 1] and `barriers_index` to [-3, 3].

use crate::cohort::{Channel, Region, Sex};
use crate::error::{SimError, SimResult};
use serde::{Deserialize, Serialize};

/// Inclusive age range for the cohort.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgeRange {
    pub min: u32,
    pub max: u32,
}

/// risk_score = clip(intercept + age_slope * (age - age_min) + N(0, noise_sd), 0, 1).
/// Captures comorbidity / vulnerability, correlated with age.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskModel {
    pub intercept: f64,
    pub age_slope: f64,
    pub noise_sd: f64,
}

/// barriers_index = clip(N(0, noise_sd) + region and age shifts, -3, 3).
/// Access friction: transport, time, tech. Drawn conditionally on
/// region, which is what makes region a confounder worth balancing on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BarriersModel {
    pub noise_sd: f64,
    pub south_ga_shift: f64,
    pub north_ga_shift: f64,
    pub elderly_shift: f64,
    pub elderly_age: u32,
}

/// Engagement-history counts, conditioned on risk so that history is
/// correlated with (not independent of) the risk attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngagementModel {
    pub interactions_base_rate: f64,
    pub interactions_risk_slope: f64,
    pub interactions_rate_min: f64,
    pub interactions_rate_max: f64,
    pub appointments_base_rate: f64,
    pub appointments_risk_slope: f64,
    pub appointments_rate_min: f64,
    pub appointments_rate_max: f64,
    pub miss_base_prob: f64,
    pub miss_risk_slope: f64,
    pub miss_prob_min: f64,
    pub miss_prob_max: f64,
}

/// Log-odds terms for the message-open stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenStageConfig {
    pub intercept: f64,
    pub sms_bonus: f64,
    pub email_bonus: f64,
    pub barriers_weight: f64,
    pub interactions_weight: f64,
    pub evening_hour: u32,
    pub evening_bonus: f64,
    pub weekend_bonus: f64,
    pub variant_b_bonus: f64,
}

/// Log-odds terms for the click stage. Only ever evaluated for
/// individuals who opened; the intercept is already conditional.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClickStageConfig {
    pub intercept: f64,
    pub sms_bonus: f64,
    pub barriers_weight: f64,
    pub appointments_weight: f64,
    pub variant_b_bonus: f64,
}

/// Log-odds terms for the schedule-within-7-days stage, the primary
/// outcome. Evaluated for every individual: scheduling does not
/// require a click (phone/IVR follow-up can convert non-clickers);
/// `opened`/`clicked` enter as score terms instead of hard gates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleStageConfig {
    pub intercept: f64,
    pub risk_weight: f64,
    pub barriers_weight: f64,
    pub appointments_weight: f64,
    pub missed_penalty: f64,
    pub opened_weight: f64,
    pub clicked_weight: f64,
    pub sms_bonus: f64,
}

/// Log-odds terms for the complete-within-30-days stage. Hard-gated on
/// `scheduled_7d`: completion without a scheduled appointment is not a
/// reachable state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteStageConfig {
    pub intercept: f64,
    pub risk_weight: f64,
    pub barriers_weight: f64,
    pub missed_penalty: f64,
    pub appointments_weight: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunnelConfig {
    pub open: OpenStageConfig,
    pub click: ClickStageConfig,
    pub schedule: ScheduleStageConfig,
    pub complete: CompleteStageConfig,
}

/// A covariate bucket that scales the treatment response. This is what
/// makes uplift ranking meaningful downstream: the effect of variant B
/// is deliberately not constant across the cohort.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "bucket", rename_all = "snake_case")]
pub enum CovariateBucket {
    BarriersAbove { threshold: f64 },
    AgeAtLeast { years: u32 },
    RiskAtLeast { score: f64 },
}

impl CovariateBucket {
    pub fn applies(&self, age: u32, risk_score: f64, barriers_index: f64) -> bool {
        match self {
            Self::BarriersAbove { threshold } => barriers_index > *threshold,
            Self::AgeAtLeast { years } => age >= *years,
            Self::RiskAtLeast { score } => risk_score >= *score,
        }
    }
}

/// One named heterogeneous-effect rule: extra scheduling log-odds for
/// variant B inside a covariate bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeterogeneityRule {
    pub name: String,
    #[serde(flatten)]
    pub bucket: CovariateBucket,
    pub log_odds_boost: f64,
}

/// The causal treatment effect injected at the scheduling stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreatmentConfig {
    /// Fraction of the cohort assigned variant B.
    pub treatment_rate: f64,
    /// Scheduling log-odds uplift for every variant-B individual.
    pub scheduling_log_odds: f64,
    /// Additional uplift for matching covariate buckets.
    pub heterogeneity: Vec<HeterogeneityRule>,
}

/// Full generating-process configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CohortConfig {
    pub age: AgeRange,
    pub sex_weights: Vec<(Sex, f64)>,
    pub region_weights: Vec<(Region, f64)>,
    pub channel_weights: Vec<(Channel, f64)>,
    pub risk: RiskModel,
    pub barriers: BarriersModel,
    pub engagement: EngagementModel,
    pub funnel: FunnelConfig,
    pub treatment: TreatmentConfig,
}

impl Default for CohortConfig {
    /// Calibrated baseline: at n = 20,000 this yields a variant-A
    /// scheduling rate near 0.26 and a relative lift near +16.7%.
    fn default() -> Self {
        Self {
            age: AgeRange { min: 18, max: 85 },
            sex_weights: vec![(Sex::F, 0.52), (Sex::M, 0.48)],
            region_weights: vec![
                (Region::AtlCore, 0.35),
                (Region::AtlMetro, 0.35),
                (Region::NorthGa, 0.15),
                (Region::SouthGa, 0.15),
            ],
            channel_weights: vec![
                (Channel::Sms, 0.65),
                (Channel::Email, 0.25),
                (Channel::Ivr, 0.10),
            ],
            risk: RiskModel {
                intercept: 0.15,
                age_slope: 0.007,
                noise_sd: 0.12,
            },
            barriers: BarriersModel {
                noise_sd: 1.0,
                south_ga_shift: 0.80,
                north_ga_shift: 0.25,
                elderly_shift: 0.15,
                elderly_age: 70,
            },
            engagement: EngagementModel {
                interactions_base_rate: 0.6,
                interactions_risk_slope: 2.0,
                interactions_rate_min: 0.2,
                interactions_rate_max: 4.0,
                appointments_base_rate: 0.3,
                appointments_risk_slope: 1.3,
                appointments_rate_min: 0.1,
                appointments_rate_max: 3.0,
                miss_base_prob: 0.08,
                miss_risk_slope: 0.18,
                miss_prob_min: 0.05,
                miss_prob_max: 0.35,
            },
            funnel: FunnelConfig {
                open: OpenStageConfig {
                    intercept: -0.40,
                    sms_bonus: 0.25,
                    email_bonus: 0.10,
                    barriers_weight: -0.22,
                    interactions_weight: 0.08,
                    evening_hour: 17,
                    evening_bonus: 0.10,
                    weekend_bonus: 0.08,
                    variant_b_bonus: 0.10,
                },
                click: ClickStageConfig {
                    intercept: -0.75,
                    sms_bonus: 0.18,
                    barriers_weight: -0.20,
                    appointments_weight: 0.10,
                    variant_b_bonus: 0.15,
                },
                schedule: ScheduleStageConfig {
                    intercept: -1.92,
                    risk_weight: 0.95,
                    barriers_weight: -0.55,
                    appointments_weight: 0.25,
                    missed_penalty: -0.35,
                    opened_weight: 0.55,
                    clicked_weight: 0.75,
                    sms_bonus: 0.12,
                },
                complete: CompleteStageConfig {
                    intercept: 0.50,
                    risk_weight: 0.35,
                    barriers_weight: -0.45,
                    missed_penalty: -0.25,
                    appointments_weight: 0.10,
                },
            },
            treatment: TreatmentConfig {
                treatment_rate: 0.5,
                scheduling_log_odds: 0.16,
                heterogeneity: vec![
                    HeterogeneityRule {
                        name: "high_barriers".into(),
                        bucket: CovariateBucket::BarriersAbove { threshold: 1.0 },
                        log_odds_boost: 0.10,
                    },
                    HeterogeneityRule {
                        name: "age_60_plus".into(),
                        bucket: CovariateBucket::AgeAtLeast { years: 60 },
                        log_odds_boost: 0.08,
                    },
                    HeterogeneityRule {
                        name: "high_risk".into(),
                        bucket: CovariateBucket::RiskAtLeast { score: 0.6 },
                        log_odds_boost: 0.10,
                    },
                ],
            },
        }
    }
}

impl CohortConfig {
    /// Load from a JSON file. Missing fields fall back to the
    /// calibrated defaults, so partial override files are fine.
    pub fn load(path: &str) -> SimResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SimError::Configuration(format!("cannot read {path}: {e}")))?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// The default process with every variant-B term zeroed: A and B
    /// share identical generating probabilities. Used for null
    /// calibration checks — under this config any detected "effect"
    /// is a false positive.
    pub fn zero_effect() -> Self {
        let mut config = Self::default();
        config.funnel.open.variant_b_bonus = 0.0;
        config.funnel.click.variant_b_bonus = 0.0;
        config.treatment.scheduling_log_odds = 0.0;
        config.treatment.heterogeneity.clear();
        config
    }

    /// Eager validation. Rejects rather than clamps.
    pub fn validate(&self) -> SimResult<()> {
        validate_weights("sex_weights", self.sex_weights.iter().map(|(_, w)| *w))?;
        validate_weights("region_weights", self.region_weights.iter().map(|(_, w)| *w))?;
        validate_weights("channel_weights", self.channel_weights.iter().map(|(_, w)| *w))?;

        if self.age.min > self.age.max {
            return Err(SimError::Configuration(format!(
                "age range inverted: min {} > max {}",
                self.age.min, self.age.max
            )));
        }

        let rate = self.treatment.treatment_rate;
        if !(rate > 0.0 && rate < 1.0) {
            return Err(SimError::Configuration(format!(
                "treatment_rate must be strictly between 0 and 1, got {rate}"
            )));
        }

        for (name, sd) in [
            ("risk.noise_sd", self.risk.noise_sd),
            ("barriers.noise_sd", self.barriers.noise_sd),
        ] {
            if !(sd >= 0.0) {
                return Err(SimError::Configuration(format!(
                    "{name} must be non-negative, got {sd}"
                )));
            }
        }

        let e = &self.engagement;
        for (name, lo, hi) in [
            ("interactions rate", e.interactions_rate_min, e.interactions_rate_max),
            ("appointments rate", e.appointments_rate_min, e.appointments_rate_max),
        ] {
            if !(lo > 0.0) || lo > hi {
                return Err(SimError::Configuration(format!(
                    "{name} bounds invalid: [{lo}, {hi}]"
                )));
            }
        }
        for (name, p) in [
            ("miss_base_prob", e.miss_base_prob),
            ("miss_prob_min", e.miss_prob_min),
            ("miss_prob_max", e.miss_prob_max),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(SimError::Configuration(format!(
                    "{name} must be a probability in [0, 1], got {p}"
                )));
            }
        }
        if e.miss_prob_min > e.miss_prob_max {
            return Err(SimError::Configuration(format!(
                "miss probability bounds inverted: [{}, {}]",
                e.miss_prob_min, e.miss_prob_max
            )));
        }

        Ok(())
    }
}

fn validate_weights(name: &str, weights: impl Iterator<Item = f64>) -> SimResult<()> {
    let mut total = 0.0;
    for w in weights {
        if !(w >= 0.0) {
            return Err(SimError::Configuration(format!(
                "{name} contains a negative or non-finite weight: {w}"
            )));
        }
        total += w;
    }
    if !(total > 0.0) {
        return Err(SimError::Configuration(format!(
            "{name} must sum to a positive total, got {total}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        CohortConfig::default().validate().expect("default config must be valid");
    }

    #[test]
    fn zero_total_weight_is_rejected() {
        let mut config = CohortConfig::default();
        for (_, w) in &mut config.region_weights {
            *w = 0.0;
        }
        let err = config.validate().unwrap_err();
        assert!(matches!(err, SimError::Configuration(_)), "got {err:?}");
    }

    #[test]
    fn out_of_range_miss_probability_is_rejected() {
        let mut config = CohortConfig::default();
        config.engagement.miss_prob_max = 1.4;
        assert!(config.validate().is_err());
    }

    #[test]
    fn degenerate_treatment_rate_is_rejected() {
        for rate in [0.0, 1.0, -0.2, 1.7] {
            let mut config = CohortConfig::default();
            config.treatment.treatment_rate = rate;
            assert!(config.validate().is_err(), "rate {rate} should be rejected");
        }
    }

    #[test]
    fn malformed_config_file_reports_serialization_error() {
        let path = std::env::temp_dir().join("outreach_malformed_config.json");
        std::fs::write(&path, "{ \"age\": ").unwrap();
        let err = CohortConfig::load(path.to_str().unwrap()).unwrap_err();
        assert!(matches!(err, SimError::Serialization(_)), "got {err:?}");
    }

    #[test]
    fn unreadable_config_path_is_a_configuration_error() {
        let err = CohortConfig::load("/no/such/dir/outreach.json").unwrap_err();
        assert!(matches!(err, SimError::Configuration(_)));
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = CohortConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: CohortConfig = serde_json::from_str(&json).unwrap();
        back.validate().unwrap();
        assert_eq!(back.treatment.heterogeneity.len(), 3);
    }
}
