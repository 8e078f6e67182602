//! Cohort generation tests: funnel monotonicity and the documented
//! correlations of the data-generating process.

use outreach_core::{cohort, config::CohortConfig, funnel::FunnelStage};
use outreach_core::cohort::{Channel, Region};

#[test]
fn funnel_gates_hold_for_every_row() {
    // The hard gates: clicking requires an open, completion requires a
    // scheduled appointment. Expressed through the stage registry so
    // each gate is checked against its stage's stable column.
    let gates = [
        (FunnelStage::Opened, FunnelStage::Clicked),
        (FunnelStage::Scheduled7d, FunnelStage::Completed30d),
    ];
    let position = |stage: FunnelStage| {
        FunnelStage::ORDER
            .iter()
            .position(|s| *s == stage)
            .expect("stage is in ORDER")
    };

    for seed in [1, 2, 3] {
        let table = cohort::generate(20_000, seed, &CohortConfig::default()).unwrap();
        for (gate, stage) in gates {
            assert!(position(gate) < position(stage), "gate must precede its stage");
            let gate_column = table.bool_column(gate.column()).unwrap();
            let stage_column = table.bool_column(stage.column()).unwrap();
            for (i, (g, s)) in gate_column.iter().zip(&stage_column).enumerate() {
                assert!(
                    *g || !*s,
                    "person {} reached {} without {} (seed {seed})",
                    i + 1,
                    stage.column(),
                    gate.column()
                );
            }
        }
    }
}

#[test]
fn risk_rises_with_age() {
    let table = cohort::generate(20_000, 3, &CohortConfig::default()).unwrap();
    let mean_risk = |pred: &dyn Fn(u32) -> bool| {
        let picked: Vec<f64> = table
            .rows()
            .iter()
            .filter(|r| pred(r.profile.age))
            .map(|r| r.profile.risk_score)
            .collect();
        picked.iter().sum::<f64>() / picked.len() as f64
    };
    let old = mean_risk(&|age| age >= 60);
    let young = mean_risk(&|age| age < 40);
    assert!(
        old > young + 0.1,
        "risk should climb with age: 60+ mean {old:.3} vs under-40 mean {young:.3}"
    );
}

#[test]
fn barriers_are_higher_in_south_ga() {
    let table = cohort::generate(20_000, 3, &CohortConfig::default()).unwrap();
    let mean_barriers = |region: Region| {
        let picked: Vec<f64> = table
            .rows()
            .iter()
            .filter(|r| r.profile.region == region)
            .map(|r| r.profile.barriers_index)
            .collect();
        picked.iter().sum::<f64>() / picked.len() as f64
    };
    let south = mean_barriers(Region::SouthGa);
    let core = mean_barriers(Region::AtlCore);
    assert!(
        south > core + 0.4,
        "South-GA barriers should sit well above ATL-Core: {south:.3} vs {core:.3}"
    );
}

#[test]
fn engagement_history_tracks_risk() {
    // History counts are drawn conditionally on risk, not independently.
    let table = cohort::generate(20_000, 5, &CohortConfig::default()).unwrap();
    let mean_interactions = |pred: &dyn Fn(f64) -> bool| {
        let picked: Vec<f64> = table
            .rows()
            .iter()
            .filter(|r| pred(r.profile.risk_score))
            .map(|r| f64::from(r.profile.prior_cdc_interactions_90d))
            .collect();
        picked.iter().sum::<f64>() / picked.len() as f64
    };
    let high = mean_interactions(&|risk| risk >= 0.6);
    let low = mean_interactions(&|risk| risk < 0.3);
    assert!(
        high > low + 0.3,
        "high-risk individuals should have more prior interactions: {high:.2} vs {low:.2}"
    );
}

#[test]
fn sms_opens_more_than_ivr() {
    let table = cohort::generate(20_000, 5, &CohortConfig::default()).unwrap();
    let open_rate = |channel: Channel| {
        let picked: Vec<bool> = table
            .rows()
            .iter()
            .filter(|r| r.profile.channel == channel)
            .map(|r| r.opened)
            .collect();
        picked.iter().filter(|o| **o).count() as f64 / picked.len() as f64
    };
    let sms = open_rate(Channel::Sms);
    let ivr = open_rate(Channel::Ivr);
    assert!(
        sms > ivr,
        "SMS open rate ({sms:.3}) should beat IVR ({ivr:.3})"
    );
}
