use serde::{Deserialize, Serialize};

use crate::rng::DeterministicRng;

/// Configuration for per-replica simulated clocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// Base timestamp, seconds since the Unix epoch.
    pub base_secs: i64,
    /// Maximum absolute skew, in whole rounds, assigned per replica.
    pub max_abs_skew_rounds: i64,
    /// Give every replica the same reading within a round, so concurrent
    /// edits can carry equal modification times.
    pub shared_stamps: bool,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            base_secs: 1_700_000_000,
            max_abs_skew_rounds: 3,
            shared_stamps: false,
        }
    }
}

/// Wall clock of one replica.
///
/// A round lasts `tick` seconds where `tick` equals the replica count, and
/// replica `i` always reads `i` seconds past a tick boundary. Two replicas
/// therefore never stamp the same time, and one replica never stamps the
/// same time in two different rounds, while skew still lets a replica run
/// ahead of or behind its peers.
///
/// With [`ClockConfig::shared_stamps`] a round lasts one second and every
/// replica reads the tick boundary, so replicas whose skewed rounds line up
/// stamp identical times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaClock {
    base_secs: i64,
    tick_secs: i64,
    offset_secs: i64,
    skew_rounds: i64,
}

impl ReplicaClock {
    /// Assign a clock to replica `index` of `replica_count`.
    #[must_use]
    pub fn assign(
        config: ClockConfig,
        index: usize,
        replica_count: usize,
        rng: &mut DeterministicRng,
    ) -> Self {
        let span = u64::try_from(config.max_abs_skew_rounds.max(0))
            .unwrap_or(0)
            .saturating_mul(2)
            .saturating_add(1);
        let skew_rounds =
            i64::try_from(rng.below(span)).unwrap_or(0) - config.max_abs_skew_rounds.max(0);

        if config.shared_stamps {
            return Self {
                base_secs: config.base_secs,
                tick_secs: 1,
                offset_secs: 0,
                skew_rounds,
            };
        }

        Self {
            base_secs: config.base_secs,
            tick_secs: i64::try_from(replica_count).unwrap_or(i64::MAX),
            offset_secs: i64::try_from(index).unwrap_or(0),
            skew_rounds,
        }
    }

    #[must_use]
    pub const fn skew_rounds(&self) -> i64 {
        self.skew_rounds
    }

    /// Wall time, in seconds, at simulation round `round`.
    #[must_use]
    pub fn now_secs(&self, round: u64) -> i64 {
        let round = i64::try_from(round).unwrap_or(i64::MAX);
        let ticks = round.saturating_add(self.skew_rounds);
        self.base_secs
            .saturating_add(ticks.saturating_mul(self.tick_secs))
            .saturating_add(self.offset_secs)
    }
}
