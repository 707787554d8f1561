//! peersync-sim library.
//!
//! Deterministic multi-replica simulation of index exchange and conflict
//! resolution. Replicas edit a shared set of paths over a faulty network,
//! exchanging header-framed index messages; once editing stops the network
//! heals and full-index anti-entropy runs until nothing changes. The
//! [`oracle`] then checks that every replica converged.
//!
//! # Conventions
//!
//! - **Errors**: Use `anyhow::Result` for return types.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod campaign;
pub mod clock;
pub mod network;
pub mod oracle;
pub mod replica;
pub mod rng;
pub mod wire;

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use anyhow::{Context, Result, bail};
use peersync_core::config::ProtocolConfig;
use peersync_core::{FileInfo, FileMeta, MessageType, ShortId, Vector};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::clock::{ClockConfig, ReplicaClock};
use crate::network::{FaultConfig, Frame, SendOutcome, SimulatedNetwork};
use crate::oracle::{ConvergenceOracle, OracleResult};
use crate::replica::{Applied, Replica, ReplicaId};
use crate::rng::DeterministicRng;

// ── Configuration ─────────────────────────────────────────────────────────────

/// Parameters of one simulation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub seed: u64,
    pub replica_count: usize,
    /// Rounds of editing under faults, before anti-entropy.
    pub rounds: u64,
    /// Number of distinct paths replicas edit.
    pub path_count: usize,
    /// Chance per round that a replica edits one path.
    pub edit_percent: u8,
    /// Anti-entropy budget; `None` derives one from the replica count.
    pub max_sync_rounds: Option<u64>,
    pub fault: FaultConfig,
    pub clock: ClockConfig,
    pub protocol: ProtocolConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            replica_count: 4,
            rounds: 24,
            path_count: 4,
            edit_percent: 40,
            max_sync_rounds: None,
            fault: FaultConfig::default(),
            clock: ClockConfig::default(),
            protocol: ProtocolConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// Load a config from a TOML file. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// # Errors
    ///
    /// Returns an error if any parameter is out of range.
    pub fn validate(&self) -> Result<()> {
        if self.replica_count < 2 {
            bail!("replica_count must be >= 2");
        }
        if self.path_count == 0 {
            bail!("path_count must be > 0");
        }
        if self.edit_percent > 100 {
            bail!("edit_percent must be <= 100");
        }
        Ok(())
    }

    /// Anti-entropy round budget.
    #[must_use]
    pub fn sync_budget(&self) -> u64 {
        self.max_sync_rounds.unwrap_or_else(|| {
            u64::try_from(self.replica_count)
                .unwrap_or(u64::MAX)
                .saturating_mul(4)
                .saturating_add(8)
        })
    }
}

// ── Results ───────────────────────────────────────────────────────────────────

/// What happened at one point of the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraceEventKind {
    Partition {
        replica: ReplicaId,
        isolated: bool,
    },
    Edit {
        replica: ReplicaId,
        path: String,
        deleted: bool,
    },
    Send {
        from: ReplicaId,
        to: ReplicaId,
        kind: MessageType,
        records: usize,
        delivered: bool,
    },
    Apply {
        replica: ReplicaId,
        path: String,
        applied: Applied,
    },
    SyncRound {
        changes: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEvent {
    pub round: u64,
    pub kind: TraceEventKind,
}

/// Counters accumulated over a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationStats {
    pub edits: usize,
    pub deletes: usize,
    pub frames_sent: usize,
    pub frames_dropped: usize,
    pub frames_duplicated: usize,
    pub frames_compressed: usize,
    pub partitions: usize,
    pub adopted: usize,
    pub ignored: usize,
    pub merged: usize,
    pub resolved: usize,
    /// Resolutions decided by the version vector tie-break.
    pub tie_breaks: usize,
}

impl SimulationStats {
    fn count(&mut self, applied: Applied) {
        match applied {
            Applied::Adopted => self.adopted += 1,
            Applied::Ignored => self.ignored += 1,
            Applied::Merged => self.merged += 1,
            Applied::Resolved { tie_break, .. } => {
                self.resolved += 1;
                self.tie_breaks += usize::from(tie_break);
            }
        }
    }
}

/// Final state of one replica.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaSnapshot {
    pub index: ReplicaId,
    pub id: ShortId,
    pub files: Vec<FileInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub seed: u64,
    pub sync_rounds: u64,
    /// True once an anti-entropy round changed nothing.
    pub quiescent: bool,
    pub stats: SimulationStats,
    pub replicas: Vec<ReplicaSnapshot>,
    /// Every version created per path, by edits, merges and resolutions.
    pub produced: BTreeMap<String, Vec<Vector>>,
    pub trace: Vec<TraceEvent>,
    /// A conflict was resolved while the network was dropping frames.
    pub interesting_state_reached: bool,
}

impl SimulationResult {
    /// Run the convergence oracle over the final state.
    #[must_use]
    pub fn check(&self) -> OracleResult {
        let files: Vec<Vec<FileInfo>> = self.replicas.iter().map(|r| r.files.clone()).collect();
        ConvergenceOracle::check_all(self.quiescent, self.sync_rounds, &files, &self.produced)
    }
}

// ── Simulator ─────────────────────────────────────────────────────────────────

pub struct Simulator {
    config: SimulationConfig,
    rng: DeterministicRng,
    network: SimulatedNetwork,
    replicas: Vec<Replica>,
    paths: Vec<String>,
    stats: SimulationStats,
    produced: BTreeMap<String, Vec<Vector>>,
    trace: Vec<TraceEvent>,
    resolved_under_faults: bool,
}

impl Simulator {
    /// # Errors
    ///
    /// Returns an error if `config` fails validation.
    pub fn new(config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        let mut rng = DeterministicRng::new(config.seed);

        let mut seen = BTreeSet::new();
        let mut replicas = Vec::with_capacity(config.replica_count);
        for index in 0..config.replica_count {
            let id = loop {
                let mut device_id = [0u8; 32];
                for chunk in device_id.chunks_mut(8) {
                    chunk.copy_from_slice(&rng.next_u64().to_be_bytes());
                }
                let id = ShortId::from_device_id(&device_id);
                if seen.insert(id) {
                    break id;
                }
            };
            let clock = ReplicaClock::assign(config.clock, index, config.replica_count, &mut rng);
            debug!(replica = index, %id, skew = clock.skew_rounds(), "replica created");
            replicas.push(Replica::new(index, id, clock));
        }

        let paths = (0..config.path_count)
            .map(|n| format!("shared/file-{n}.txt"))
            .collect();

        Ok(Self {
            network: SimulatedNetwork::new(config.fault),
            config,
            rng,
            replicas,
            paths,
            stats: SimulationStats::default(),
            produced: BTreeMap::new(),
            trace: Vec::new(),
            resolved_under_faults: false,
        })
    }

    /// Run the editing rounds, then anti-entropy until quiescent.
    ///
    /// # Errors
    ///
    /// Returns an error if a frame fails to encode or decode.
    pub fn run(&mut self) -> Result<SimulationResult> {
        info!(
            seed = self.config.seed,
            replicas = self.config.replica_count,
            rounds = self.config.rounds,
            "simulation started"
        );

        for round in 0..self.config.rounds {
            self.fault_round(round)?;
        }

        self.network.heal();
        self.network.set_fault(FaultConfig::reliable());
        let drain_round = self.config.rounds;
        let in_flight = self.network.deliver_ready(u64::MAX, &mut self.rng);
        self.apply_frames(drain_round, in_flight)?;

        let (sync_rounds, quiescent) = self.anti_entropy(drain_round)?;
        if quiescent {
            info!(seed = self.config.seed, sync_rounds, "replicas quiescent");
        } else {
            warn!(seed = self.config.seed, sync_rounds, "anti-entropy budget exhausted");
        }

        Ok(SimulationResult {
            seed: self.config.seed,
            sync_rounds,
            quiescent,
            stats: self.stats,
            replicas: self
                .replicas
                .iter()
                .map(|r| ReplicaSnapshot {
                    index: r.index(),
                    id: r.id(),
                    files: r.full_index(),
                })
                .collect(),
            produced: self.produced.clone(),
            trace: self.trace.clone(),
            interesting_state_reached: self.resolved_under_faults,
        })
    }

    fn fault_round(&mut self, round: u64) -> Result<()> {
        if let Some((replica, isolated)) = self
            .network
            .maybe_toggle_partition(self.replicas.len(), &mut self.rng)
        {
            self.stats.partitions += usize::from(isolated);
            self.record(round, TraceEventKind::Partition { replica, isolated });
        }

        for index in 0..self.replicas.len() {
            if !self.rng.chance(self.config.edit_percent) {
                continue;
            }
            let path = self.paths[self.rng.index(self.paths.len())].clone();
            let edited = self.replicas[index].edit(&path, round, &mut self.rng);
            let deleted = edited.is_deleted();
            let version = edited.version.copy();

            self.stats.edits += 1;
            self.stats.deletes += usize::from(deleted);
            self.produced.entry(path.clone()).or_default().push(version);
            self.record(
                round,
                TraceEventKind::Edit {
                    replica: index,
                    path,
                    deleted,
                },
            );
        }

        for index in 0..self.replicas.len() {
            let records = self.replicas[index].take_dirty();
            if !records.is_empty() {
                self.broadcast(round, index, MessageType::IndexUpdate, &records)?;
            }
        }

        let ready = self.network.deliver_ready(round, &mut self.rng);
        self.apply_frames(round, ready)?;
        Ok(())
    }

    /// Exchange full indexes all-to-all until a round changes nothing.
    fn anti_entropy(&mut self, start_round: u64) -> Result<(u64, bool)> {
        let budget = self.config.sync_budget();
        for sync_round in 1..=budget {
            let round = start_round.saturating_add(sync_round);
            for index in 0..self.replicas.len() {
                let records = self.replicas[index].full_index();
                let _ = self.replicas[index].take_dirty();
                self.broadcast(round, index, MessageType::Index, &records)?;
            }
            let frames = self.network.deliver_ready(round, &mut self.rng);
            let changes = self.apply_frames(round, frames)?;
            self.record(round, TraceEventKind::SyncRound { changes });
            if changes == 0 {
                return Ok((sync_round, true));
            }
        }
        Ok((budget, false))
    }

    fn broadcast(
        &mut self,
        round: u64,
        from: ReplicaId,
        kind: MessageType,
        records: &[FileInfo],
    ) -> Result<()> {
        for to in 0..self.replicas.len() {
            if to == from {
                continue;
            }
            let ids = self.replicas[from].connection(to);
            let (header, bytes) = wire::encode_index(ids, &self.config.protocol, kind, records)?;
            self.stats.frames_compressed += usize::from(header.compression);

            let outcome = self
                .network
                .send(Frame { from, to, bytes }, round, &mut self.rng);
            self.stats.frames_sent += 1;
            let delivered = match outcome {
                SendOutcome::Dropped => {
                    self.stats.frames_dropped += 1;
                    false
                }
                SendOutcome::Queued { duplicated, .. } => {
                    self.stats.frames_duplicated += usize::from(duplicated);
                    true
                }
            };
            self.record(
                round,
                TraceEventKind::Send {
                    from,
                    to,
                    kind,
                    records: records.len(),
                    delivered,
                },
            );
        }
        Ok(())
    }

    /// Decode and apply delivered frames; returns how many records changed.
    fn apply_frames(&mut self, round: u64, frames: Vec<Frame>) -> Result<usize> {
        let mut changes = 0;
        for frame in frames {
            let message = wire::decode_index(&frame.bytes).with_context(|| {
                format!("decode frame from replica {} to {}", frame.from, frame.to)
            })?;
            for remote in message.records {
                let path = remote.name.clone();
                let applied = self.replicas[frame.to].receive(remote);
                self.stats.count(applied);
                if applied.changed() {
                    changes += 1;
                }
                if applied.produced_version() {
                    if let Some(local) = self.replicas[frame.to].record(&path) {
                        self.produced
                            .entry(path.clone())
                            .or_default()
                            .push(local.version.copy());
                    }
                }
                if matches!(applied, Applied::Resolved { .. }) && self.stats.frames_dropped > 0 {
                    self.resolved_under_faults = true;
                }
                self.record(
                    round,
                    TraceEventKind::Apply {
                        replica: frame.to,
                        path,
                        applied,
                    },
                );
            }
        }
        Ok(changes)
    }

    fn record(&mut self, round: u64, kind: TraceEventKind) {
        self.trace.push(TraceEvent { round, kind });
    }
}
