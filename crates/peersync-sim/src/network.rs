use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::replica::ReplicaId;
use crate::rng::DeterministicRng;

/// Fault injection for simulated frame delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaultConfig {
    /// Maximum delivery delay in rounds.
    pub max_delay_rounds: u8,
    /// Percentage of frames dropped.
    pub drop_rate_percent: u8,
    /// Percentage of frames delivered twice.
    pub duplicate_rate_percent: u8,
    /// Percentage chance of reversing a round's ready frames.
    pub reorder_rate_percent: u8,
    /// Percentage chance per round to toggle a replica's partition.
    pub partition_rate_percent: u8,
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self {
            max_delay_rounds: 2,
            drop_rate_percent: 5,
            duplicate_rate_percent: 3,
            reorder_rate_percent: 5,
            partition_rate_percent: 2,
        }
    }
}

impl FaultConfig {
    /// A network that delivers everything, in order, in the same round.
    #[must_use]
    pub const fn reliable() -> Self {
        Self {
            max_delay_rounds: 0,
            drop_rate_percent: 0,
            duplicate_rate_percent: 0,
            reorder_rate_percent: 0,
            partition_rate_percent: 0,
        }
    }
}

/// An encoded message (header + body) in flight between two replicas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub from: ReplicaId,
    pub to: ReplicaId,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Pending {
    deliver_at_round: u64,
    frame: Frame,
}

/// What happened to a frame handed to [`SimulatedNetwork::send`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Dropped,
    Queued { delay_rounds: u8, duplicated: bool },
}

/// Deterministic fault-injecting network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedNetwork {
    pending: Vec<Pending>,
    partitioned: BTreeSet<ReplicaId>,
    fault: FaultConfig,
}

impl SimulatedNetwork {
    #[must_use]
    pub const fn new(fault: FaultConfig) -> Self {
        Self {
            pending: Vec::new(),
            partitioned: BTreeSet::new(),
            fault,
        }
    }

    /// Replace the fault model, e.g. to heal the network for anti-entropy.
    pub fn set_fault(&mut self, fault: FaultConfig) {
        self.fault = fault;
    }

    pub fn set_partitioned(&mut self, replica: ReplicaId, isolated: bool) {
        if isolated {
            self.partitioned.insert(replica);
        } else {
            self.partitioned.remove(&replica);
        }
    }

    #[must_use]
    pub fn is_partitioned(&self, replica: ReplicaId) -> bool {
        self.partitioned.contains(&replica)
    }

    /// Reconnect every replica.
    pub fn heal(&mut self) {
        self.partitioned.clear();
    }

    /// Randomly isolate or reconnect one of `replica_count` replicas.
    ///
    /// Returns the toggled replica and its new state.
    pub fn maybe_toggle_partition(
        &mut self,
        replica_count: usize,
        rng: &mut DeterministicRng,
    ) -> Option<(ReplicaId, bool)> {
        if replica_count == 0 || !rng.chance(self.fault.partition_rate_percent) {
            return None;
        }
        let replica = rng.index(replica_count);
        let isolate = !self.is_partitioned(replica);
        self.set_partitioned(replica, isolate);
        Some((replica, isolate))
    }

    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Queue a frame, subject to partitions and fault injection.
    pub fn send(&mut self, frame: Frame, round: u64, rng: &mut DeterministicRng) -> SendOutcome {
        if self.is_partitioned(frame.from) || self.is_partitioned(frame.to) {
            return SendOutcome::Dropped;
        }
        if rng.chance(self.fault.drop_rate_percent) {
            return SendOutcome::Dropped;
        }

        let delay = rng.below(u64::from(self.fault.max_delay_rounds) + 1);
        let delay_rounds = u8::try_from(delay).unwrap_or(self.fault.max_delay_rounds);
        let deliver_at_round = round.saturating_add(u64::from(delay_rounds));

        let duplicated = rng.chance(self.fault.duplicate_rate_percent);
        if duplicated {
            self.pending.push(Pending {
                deliver_at_round,
                frame: frame.clone(),
            });
        }
        self.pending.push(Pending {
            deliver_at_round,
            frame,
        });

        SendOutcome::Queued {
            delay_rounds,
            duplicated,
        }
    }

    /// Take every frame due at or before `round`.
    pub fn deliver_ready(&mut self, round: u64, rng: &mut DeterministicRng) -> Vec<Frame> {
        let (ready, future): (Vec<Pending>, Vec<Pending>) = self
            .pending
            .drain(..)
            .partition(|p| p.deliver_at_round <= round);
        self.pending = future;

        let mut frames: Vec<Frame> = ready.into_iter().map(|p| p.frame).collect();
        if frames.len() > 1 && rng.chance(self.fault.reorder_rate_percent) {
            frames.reverse();
        }
        frames
    }
}
