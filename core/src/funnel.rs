//! The behavioral funnel: open → click → schedule → complete.
//!
//! Each stage is a named, pure rule from (profile, variant, upstream
//! outcomes, config) to a probability, evaluated in the fixed causal
//! order of `FunnelStage::ORDER`. Keeping the rules as standalone
//! functions keeps the causal structure auditable and lets each stage
//! be tested in isolation.
//!
//! Gating policy (explicit, see DESIGN.md):
//!   - `clicked` is hard-gated on `opened`.
//!   - `scheduled_7d` is drawn for everyone: phone/IVR follow-up can
//!     convert people who never clicked. `opened`/`clicked` contribute
//!     score terms instead.
//!   - `completed_30d` is hard-gated on `scheduled_7d`.

use crate::{
    cohort::{Channel, Profile, Variant},
    config::{
        ClickStageConfig, CohortConfig, CompleteStageConfig, OpenStageConfig,
        ScheduleStageConfig, TreatmentConfig,
    },
    rng::StreamRng,
};

/// The funnel stages, in causal order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunnelStage {
    Opened,
    Clicked,
    Scheduled7d,
    Completed30d,
}

impl FunnelStage {
    pub const ORDER: [FunnelStage; 4] = [
        Self::Opened,
        Self::Clicked,
        Self::Scheduled7d,
        Self::Completed30d,
    ];

    pub fn column(&self) -> &'static str {
        match self {
            Self::Opened => crate::cohort::columns::OPENED,
            Self::Clicked => crate::cohort::columns::CLICKED,
            Self::Scheduled7d => crate::cohort::columns::SCHEDULED_7D,
            Self::Completed30d => crate::cohort::columns::COMPLETED_30D,
        }
    }
}

/// Drawn funnel outcomes for one individual.
#[derive(Debug, Clone, Copy)]
pub struct FunnelOutcome {
    pub opened: bool,
    pub clicked: bool,
    pub scheduled_7d: bool,
    pub completed_30d: bool,
}

pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Stage 1: probability the message is opened at all.
pub fn open_probability(p: &Profile, variant: Variant, cfg: &OpenStageConfig) -> f64 {
    let mut score = cfg.intercept;
    score += match p.channel {
        Channel::Sms => cfg.sms_bonus,
        Channel::Email => cfg.email_bonus,
        Channel::Ivr => 0.0,
    };
    score += cfg.barriers_weight * p.barriers_index;
    score += cfg.interactions_weight * f64::from(p.prior_cdc_interactions_90d).ln_1p();
    if p.send_hour >= cfg.evening_hour {
        score += cfg.evening_bonus;
    }
    if p.weekday >= 5 {
        score += cfg.weekend_bonus;
    }
    if variant == Variant::B {
        score += cfg.variant_b_bonus;
    }
    sigmoid(score)
}

/// Stage 2: click-through, conditional on having opened.
pub fn click_probability(p: &Profile, variant: Variant, cfg: &ClickStageConfig) -> f64 {
    let mut score = cfg.intercept;
    if p.channel == Channel::Sms {
        score += cfg.sms_bonus;
    }
    score += cfg.barriers_weight * p.barriers_index;
    score += cfg.appointments_weight * f64::from(p.prior_appointments_1y).ln_1p();
    if variant == Variant::B {
        score += cfg.variant_b_bonus;
    }
    sigmoid(score)
}

/// Stage 3: scheduling within 7 days — the primary outcome. This is
/// the stage where the causal treatment effect is injected, scaled by
/// the matching heterogeneity buckets.
pub fn schedule_probability(
    p: &Profile,
    variant: Variant,
    opened: bool,
    clicked: bool,
    cfg: &ScheduleStageConfig,
    treatment: &TreatmentConfig,
) -> f64 {
    let mut score = cfg.intercept;
    score += cfg.risk_weight * p.risk_score;
    score += cfg.barriers_weight * p.barriers_index;
    score += cfg.appointments_weight * f64::from(p.prior_appointments_1y).ln_1p();
    if p.missed_appointments_1y > 0 {
        score += cfg.missed_penalty;
    }
    if opened {
        score += cfg.opened_weight;
    }
    if clicked {
        score += cfg.clicked_weight;
    }
    if p.channel == Channel::Sms {
        score += cfg.sms_bonus;
    }
    if variant == Variant::B {
        score += treatment_log_odds(p, treatment);
    }
    sigmoid(score)
}

/// Total scheduling log-odds uplift for a variant-B individual:
/// base effect plus every matching heterogeneity bucket.
pub fn treatment_log_odds(p: &Profile, treatment: &TreatmentConfig) -> f64 {
    let mut uplift = treatment.scheduling_log_odds;
    for rule in &treatment.heterogeneity {
        if rule.bucket.applies(p.age, p.risk_score, p.barriers_index) {
            uplift += rule.log_odds_boost;
        }
    }
    uplift
}

/// Stage 4: completion within 30 days, conditional on scheduling.
/// Adherence driven: barriers and a history of missed appointments
/// pull it down.
pub fn complete_probability(p: &Profile, cfg: &CompleteStageConfig) -> f64 {
    let mut score = cfg.intercept;
    score += cfg.risk_weight * p.risk_score;
    score += cfg.barriers_weight * p.barriers_index;
    if p.missed_appointments_1y > 0 {
        score += cfg.missed_penalty;
    }
    score += cfg.appointments_weight * f64::from(p.prior_appointments_1y).ln_1p();
    sigmoid(score)
}

/// Walk the funnel for one individual, drawing each stage in causal
/// order from the funnel stream. Gated stages consume no draw when
/// their gate is closed, so the stream position stays a pure function
/// of the upstream outcomes.
pub fn run_funnel(
    rng: &mut StreamRng,
    p: &Profile,
    variant: Variant,
    config: &CohortConfig,
) -> FunnelOutcome {
    let f = &config.funnel;

    let opened = rng.chance(open_probability(p, variant, &f.open));
    let clicked = opened && rng.chance(click_probability(p, variant, &f.click));
    let scheduled_7d = rng.chance(schedule_probability(
        p,
        variant,
        opened,
        clicked,
        &f.schedule,
        &config.treatment,
    ));
    let completed_30d = scheduled_7d && rng.chance(complete_probability(p, &f.complete));

    FunnelOutcome {
        opened,
        clicked,
        scheduled_7d,
        completed_30d,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cohort::{Region, Sex};
    use crate::config::CohortConfig;

    fn profile() -> Profile {
        Profile {
            age: 45,
            sex: Sex::F,
            region: Region::AtlCore,
            risk_score: 0.4,
            barriers_index: 0.0,
            channel: Channel::Sms,
            weekday: 2,
            send_hour: 10,
            prior_cdc_interactions_90d: 1,
            prior_appointments_1y: 1,
            missed_appointments_1y: 0,
        }
    }

    #[test]
    fn stage_order_is_causal() {
        assert_eq!(FunnelStage::ORDER[0], FunnelStage::Opened);
        assert_eq!(FunnelStage::ORDER[3], FunnelStage::Completed30d);
    }

    #[test]
    fn variant_b_raises_every_treated_stage() {
        let config = CohortConfig::default();
        let p = profile();
        assert!(
            open_probability(&p, Variant::B, &config.funnel.open)
                > open_probability(&p, Variant::A, &config.funnel.open)
        );
        assert!(
            click_probability(&p, Variant::B, &config.funnel.click)
                > click_probability(&p, Variant::A, &config.funnel.click)
        );
        assert!(
            schedule_probability(&p, Variant::B, true, true, &config.funnel.schedule, &config.treatment)
                > schedule_probability(&p, Variant::A, true, true, &config.funnel.schedule, &config.treatment)
        );
    }

    #[test]
    fn heterogeneity_buckets_stack() {
        let config = CohortConfig::default();
        let mut p = profile();
        let base = treatment_log_odds(&p, &config.treatment);
        assert!((base - 0.16).abs() < 1e-12, "no bucket should match: {base}");

        p.barriers_index = 1.5;
        p.age = 64;
        p.risk_score = 0.7;
        let all = treatment_log_odds(&p, &config.treatment);
        assert!((all - (0.16 + 0.10 + 0.08 + 0.10)).abs() < 1e-12, "all buckets: {all}");
    }

    #[test]
    fn barriers_depress_scheduling() {
        let config = CohortConfig::default();
        let low = profile();
        let mut high = profile();
        high.barriers_index = 2.5;
        let p_low =
            schedule_probability(&low, Variant::A, false, false, &config.funnel.schedule, &config.treatment);
        let p_high =
            schedule_probability(&high, Variant::A, false, false, &config.funnel.schedule, &config.treatment);
        assert!(p_low > p_high, "barriers must reduce scheduling: {p_low} vs {p_high}");
    }

    #[test]
    fn probabilities_stay_in_unit_interval_at_extremes() {
        let config = CohortConfig::default();
        let mut p = profile();
        p.barriers_index = -3.0;
        p.risk_score = 1.0;
        p.prior_cdc_interactions_90d = 40;
        p.prior_appointments_1y = 30;
        for prob in [
            open_probability(&p, Variant::B, &config.funnel.open),
            click_probability(&p, Variant::B, &config.funnel.click),
            schedule_probability(&p, Variant::B, true, true, &config.funnel.schedule, &config.treatment),
            complete_probability(&p, &config.funnel.complete),
        ] {
            assert!((0.0..=1.0).contains(&prob), "out of range: {prob}");
        }
    }
}
