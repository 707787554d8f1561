//! Campaign runner: executes many seeds and reports the first failing one
//! for replay.

use std::ops::Range;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::oracle::OracleResult;
use crate::{SimulationConfig, SimulationResult, Simulator};

/// Seeds to run and the simulation parameters shared by all of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignConfig {
    pub seed_range: Range<u64>,
    /// Template for each run; its `seed` is replaced per run.
    pub simulation: SimulationConfig,
}

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            seed_range: 0..100,
            simulation: SimulationConfig::default(),
        }
    }
}

impl CampaignConfig {
    #[must_use]
    pub fn sim_config_for_seed(&self, seed: u64) -> SimulationConfig {
        SimulationConfig {
            seed,
            ..self.simulation.clone()
        }
    }

    /// # Errors
    ///
    /// Returns an error if the seed range is empty or the simulation
    /// template is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.seed_range.is_empty() {
            bail!("seed_range must not be empty");
        }
        self.simulation.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedFailure {
    pub seed: u64,
    pub violations: Vec<String>,
}

/// Aggregate report produced by a campaign run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignReport {
    pub seeds_run: usize,
    pub seeds_passed: usize,
    /// First seed that failed, for replay.
    pub first_failure: Option<u64>,
    pub failures: Vec<SeedFailure>,
    /// Seeds that resolved a conflict while frames were being dropped.
    pub interesting_states_reached: usize,
    /// Conflicts resolved across all seeds.
    pub conflicts_resolved: usize,
    /// Of those, resolutions decided by the version vector tie-break.
    pub tie_breaks: usize,
}

impl CampaignReport {
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failures.is_empty()
    }
}

/// A single seed's run together with its oracle verdict.
#[derive(Debug, Clone)]
pub struct DetailedTrace {
    pub result: SimulationResult,
    pub oracle: OracleResult,
}

/// Run every seed in the campaign.
///
/// # Errors
///
/// Returns an error if config validation fails or a simulation encounters
/// an internal error.
pub fn run_campaign(config: &CampaignConfig) -> Result<CampaignReport> {
    config.validate()?;

    let mut report = CampaignReport {
        seeds_run: 0,
        seeds_passed: 0,
        first_failure: None,
        failures: Vec::new(),
        interesting_states_reached: 0,
        conflicts_resolved: 0,
        tie_breaks: 0,
    };

    for seed in config.seed_range.clone() {
        let trace = run_seed(seed, config)?;
        report.seeds_run += 1;
        report.conflicts_resolved += trace.result.stats.resolved;
        report.tie_breaks += trace.result.stats.tie_breaks;
        report.interesting_states_reached += usize::from(trace.result.interesting_state_reached);

        if trace.oracle.passed {
            report.seeds_passed += 1;
        } else {
            warn!(seed, violations = trace.oracle.violations.len(), "seed failed");
            report.first_failure.get_or_insert(seed);
            report.failures.push(SeedFailure {
                seed,
                violations: trace
                    .oracle
                    .violations
                    .iter()
                    .map(ToString::to_string)
                    .collect(),
            });
        }
    }

    info!(
        seeds = report.seeds_run,
        passed = report.seeds_passed,
        "campaign finished"
    );
    Ok(report)
}

/// Replay a single seed with its full trace.
///
/// # Errors
///
/// Returns an error when config validation or the simulation fails.
pub fn replay_seed(seed: u64, config: &CampaignConfig) -> Result<DetailedTrace> {
    config.validate()?;
    run_seed(seed, config)
}

fn run_seed(seed: u64, config: &CampaignConfig) -> Result<DetailedTrace> {
    let mut simulator = Simulator::new(config.sim_config_for_seed(seed))?;
    let result = simulator.run()?;
    let oracle = result.check();
    Ok(DetailedTrace { result, oracle })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ClockConfig;
    use crate::network::FaultConfig;

    fn small(seeds: Range<u64>) -> CampaignConfig {
        CampaignConfig {
            seed_range: seeds,
            simulation: SimulationConfig {
                replica_count: 3,
                rounds: 12,
                ..SimulationConfig::default()
            },
        }
    }

    #[test]
    fn default_config_is_valid() {
        assert!(CampaignConfig::default().validate().is_ok());
    }

    #[test]
    fn empty_seed_range_rejected() {
        assert!(small(5..5).validate().is_err());
        assert!(run_campaign(&small(5..5)).is_err());
    }

    #[test]
    fn sim_config_for_seed_uses_seed() {
        let config = small(0..1);
        let sim = config.sim_config_for_seed(42);
        assert_eq!(sim.seed, 42);
        assert_eq!(sim.replica_count, 3);
    }

    #[test]
    fn faulty_campaign_passes() {
        let report = run_campaign(&small(0..10)).expect("campaign should not error");
        assert_eq!(report.seeds_run, 10);
        assert!(report.all_passed(), "failures: {:?}", report.failures);
        assert!(report.first_failure.is_none());
    }

    #[test]
    fn heavy_faults_reach_interesting_states() {
        let mut config = small(0..20);
        config.simulation.replica_count = 4;
        config.simulation.rounds = 16;
        config.simulation.edit_percent = 60;
        config.simulation.fault = FaultConfig {
            max_delay_rounds: 3,
            drop_rate_percent: 25,
            duplicate_rate_percent: 15,
            reorder_rate_percent: 20,
            partition_rate_percent: 15,
        };
        let report = run_campaign(&config).expect("campaign should not error");
        assert!(report.all_passed(), "failures: {:?}", report.failures);
        assert!(report.conflicts_resolved > 0);
        assert!(report.interesting_states_reached > 0);
    }

    #[test]
    fn shared_stamps_drive_vector_tie_breaks() {
        let mut config = small(0..20);
        config.simulation.replica_count = 4;
        config.simulation.path_count = 2;
        config.simulation.edit_percent = 70;
        config.simulation.clock = ClockConfig {
            max_abs_skew_rounds: 0,
            shared_stamps: true,
            ..ClockConfig::default()
        };
        let report = run_campaign(&config).expect("campaign should not error");
        assert!(report.all_passed(), "failures: {:?}", report.failures);
        assert!(report.tie_breaks > 0);
        assert!(report.tie_breaks <= report.conflicts_resolved);
    }

    #[test]
    fn unique_stamps_never_need_tie_breaks() {
        let report = run_campaign(&small(0..10)).expect("campaign should not error");
        assert_eq!(report.tie_breaks, 0);
    }

    #[test]
    fn replay_is_deterministic() {
        let config = small(0..1);
        let first = replay_seed(7, &config).expect("replay 1");
        let second = replay_seed(7, &config).expect("replay 2");
        assert_eq!(first.result, second.result);
        assert!(first.oracle.passed, "{:?}", first.oracle.violations);
    }

    #[test]
    fn report_serializes_to_json() {
        let report = CampaignReport {
            seeds_run: 10,
            seeds_passed: 9,
            first_failure: Some(7),
            failures: vec![SeedFailure {
                seed: 7,
                violations: vec!["Divergence: \"a\"".into()],
            }],
            interesting_states_reached: 5,
            conflicts_resolved: 12,
            tie_breaks: 3,
        };
        let json = serde_json::to_string(&report).expect("serialize");
        assert!(json.contains("\"seeds_run\":10"));
        assert!(json.contains("\"first_failure\":7"));
    }
}
