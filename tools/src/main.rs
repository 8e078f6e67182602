//! outreach-runner: headless runner for the outreach experiment sim.
//!
//! Usage:
//!   outreach-runner --n 20000 --seed 42 --permutations 10000 \
//!       --outcome scheduled_7d --alternative greater \
//!       [--config cohort.json] [--csv cohort.csv] [--report report.json]
//!
//! Generates the cohort, logs randomization balance, runs the
//! permutation test, and writes the artifacts. Exits nonzero before
//! writing anything if generation or the test fails — no partial
//! statistical output.

use anyhow::Result;
use outreach_core::{
    balance,
    cohort::{self, columns, CohortTable},
    config::CohortConfig,
    permutation::{self, Alternative, TestResult},
};
use std::env;
use std::io::Write;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let n = parse_arg(&args, "--n", 20_000usize);
    let seed = parse_arg(&args, "--seed", 42u64);
    let permutations = parse_arg(&args, "--permutations", 10_000usize);
    let outcome = string_arg(&args, "--outcome").unwrap_or_else(|| columns::SCHEDULED_7D.into());
    let alternative: Alternative = string_arg(&args, "--alternative")
        .unwrap_or_else(|| "greater".into())
        .parse()?;
    let csv_path = string_arg(&args, "--csv");
    let report_path = string_arg(&args, "--report");

    let config = match string_arg(&args, "--config") {
        Some(path) => CohortConfig::load(&path)?,
        None => CohortConfig::default(),
    };

    println!("outreach-sim — runner");
    println!("  n:            {n}");
    println!("  seed:         {seed}");
    println!("  permutations: {permutations}");
    println!("  outcome:      {outcome}");
    println!();

    let table = cohort::generate(n, seed, &config)?;

    let report = balance::balance_report(&table)?;
    log::info!(
        "balance: region chi2={:.3} (df={}), risk-quartile chi2={:.3} (df={}), passes={}",
        report.by_region.statistic,
        report.by_region.dof,
        report.by_risk_quartile.statistic,
        report.by_risk_quartile.dof,
        report.passes()
    );
    if !report.passes() {
        log::warn!("randomization balance check failed — inspect the seed and config");
    }

    let result = permutation::run_test(
        &table,
        columns::MESSAGE_VARIANT,
        &outcome,
        permutations,
        seed,
        alternative,
    )?;

    print_summary(&result);

    if let Some(path) = csv_path {
        write_csv(&table, &path)?;
        println!("cohort written: {path}");
    }
    if let Some(path) = report_path {
        write_report(&result, &path)?;
        println!("report written: {path}");
    }

    Ok(())
}

fn print_summary(result: &TestResult) {
    println!("── permutation test ─────────────────────────");
    println!("  outcome:       {}", result.outcome_column);
    println!("  nA / nB:       {} / {}", result.n_a, result.n_b);
    println!("  rate A:        {:.4}", result.rate_a);
    println!("  rate B:        {:.4}", result.rate_b);
    println!("  observed lift: {:+.2}%", result.observed_lift * 100.0);
    println!("  p-value:       {:.5}  ({} permutations)", result.p_value, result.n_permutations);
}

/// Write the cohort as CSV with the stable schema header.
fn write_csv(table: &CohortTable, path: &str) -> Result<()> {
    let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
    writeln!(file, "{}", columns::all().join(","))?;
    for row in table.rows() {
        let p = &row.profile;
        writeln!(
            file,
            "{},{},{},{},{:.3},{:.3},{},{},{},{},{},{},{},{},{},{},{}",
            row.person_id,
            p.age,
            p.sex.as_str(),
            p.region.as_str(),
            p.risk_score,
            p.barriers_index,
            p.channel.as_str(),
            p.weekday,
            p.send_hour,
            p.prior_cdc_interactions_90d,
            p.prior_appointments_1y,
            p.missed_appointments_1y,
            row.message_variant.as_str(),
            u8::from(row.opened),
            u8::from(row.clicked),
            u8::from(row.scheduled_7d),
            u8::from(row.completed_30d),
        )?;
    }
    Ok(())
}

#[derive(serde::Serialize)]
struct RunReport<'a> {
    generated_at: String,
    runner_version: &'static str,
    #[serde(flatten)]
    result: &'a TestResult,
}

fn write_report(result: &TestResult, path: &str) -> Result<()> {
    let report = RunReport {
        generated_at: chrono::Utc::now().to_rfc3339(),
        runner_version: env!("CARGO_PKG_VERSION"),
        result,
    };
    std::fs::write(path, serde_json::to_string_pretty(&report)?)?;
    Ok(())
}

fn parse_arg<T: std::str::FromStr>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}

fn string_arg(args: &[String], flag: &str) -> Option<String> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].clone())
}
