use std::collections::{BTreeMap, BTreeSet};

use peersync_core::{FileInfo, Vector};
use serde::{Deserialize, Serialize};

use crate::replica::ReplicaId;

// ── Core result types ─────────────────────────────────────────────────────────

/// Outcome of the post-simulation invariant checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleResult {
    /// `true` iff no violations were found.
    pub passed: bool,
    pub violations: Vec<InvariantViolation>,
}

impl OracleResult {
    fn from_violations(violations: Vec<InvariantViolation>) -> Self {
        Self {
            passed: violations.is_empty(),
            violations,
        }
    }
}

/// Diagnostic for a single failed invariant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvariantViolation {
    /// Anti-entropy still changed state when its round budget ran out.
    NotQuiescent { sync_rounds: u64 },

    /// A path is known to one replica but not another.
    MissingPath {
        path: String,
        present_on: ReplicaId,
        missing_on: ReplicaId,
    },

    /// Two replicas hold different content or versions for a path.
    Divergence {
        path: String,
        replica_a: ReplicaId,
        replica_b: ReplicaId,
        version_a: String,
        version_b: String,
    },

    /// A final version fails to dominate a version produced during the run.
    LostUpdate {
        path: String,
        replica: ReplicaId,
        final_version: String,
        produced_version: String,
    },

    /// Stored counters are not strictly ascending by device id.
    UnsortedVector { path: String, replica: ReplicaId },
}

impl std::fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotQuiescent { sync_rounds } => {
                write!(f, "NotQuiescent: state still changing after {sync_rounds} sync rounds")
            }
            Self::MissingPath {
                path,
                present_on,
                missing_on,
            } => write!(
                f,
                "MissingPath: {path:?} present on replica {present_on}, missing on {missing_on}"
            ),
            Self::Divergence {
                path,
                replica_a,
                replica_b,
                version_a,
                version_b,
            } => write!(
                f,
                "Divergence: {path:?} differs between replicas {replica_a} ({version_a}) \
                 and {replica_b} ({version_b})"
            ),
            Self::LostUpdate {
                path,
                replica,
                final_version,
                produced_version,
            } => write!(
                f,
                "LostUpdate: {path:?} on replica {replica} ends at {final_version}, \
                 which does not dominate {produced_version}"
            ),
            Self::UnsortedVector { path, replica } => {
                write!(f, "UnsortedVector: {path:?} on replica {replica}")
            }
        }
    }
}

// ── Oracle ────────────────────────────────────────────────────────────────────

/// Invariant checks over the final replica states.
///
/// # Invariants checked
///
/// 1. **Quiescence**: anti-entropy stopped changing state.
/// 2. **Convergence**: every replica holds the same paths, and for each path
///    the same content under an equal version.
/// 3. **No lost updates**: each final version dominates every version any
///    replica produced for that path during the run.
/// 4. **Canonical vectors**: counters are strictly ascending by device id.
pub struct ConvergenceOracle;

impl ConvergenceOracle {
    /// Run every check.
    ///
    /// `replicas[i]` holds replica `i`'s final records; `produced` maps each
    /// path to the versions created for it.
    #[must_use]
    pub fn check_all(
        quiescent: bool,
        sync_rounds: u64,
        replicas: &[Vec<FileInfo>],
        produced: &BTreeMap<String, Vec<Vector>>,
    ) -> OracleResult {
        let mut violations = Vec::new();
        if !quiescent {
            violations.push(InvariantViolation::NotQuiescent { sync_rounds });
        }
        let indexed: Vec<BTreeMap<&str, &FileInfo>> = replicas
            .iter()
            .map(|files| files.iter().map(|f| (f.name.as_str(), f)).collect())
            .collect();

        violations.extend(Self::check_convergence(&indexed));
        violations.extend(Self::check_dominance(&indexed, produced));
        violations.extend(Self::check_canonical(&indexed));
        OracleResult::from_violations(violations)
    }

    fn check_convergence(indexed: &[BTreeMap<&str, &FileInfo>]) -> Vec<InvariantViolation> {
        let mut violations = Vec::new();
        let Some((reference, rest)) = indexed.split_first() else {
            return violations;
        };

        let all_paths: BTreeSet<&str> = indexed.iter().flat_map(|m| m.keys().copied()).collect();
        for path in all_paths {
            let Some(expected) = reference.get(path) else {
                let present_on = indexed.iter().position(|m| m.contains_key(path)).unwrap_or(0);
                violations.push(InvariantViolation::MissingPath {
                    path: path.to_string(),
                    present_on,
                    missing_on: 0,
                });
                continue;
            };
            for (offset, other) in rest.iter().enumerate() {
                let replica = offset + 1;
                match other.get(path) {
                    None => violations.push(InvariantViolation::MissingPath {
                        path: path.to_string(),
                        present_on: 0,
                        missing_on: replica,
                    }),
                    Some(actual)
                        if !actual.same_content(expected) || actual.version != expected.version =>
                    {
                        violations.push(InvariantViolation::Divergence {
                            path: path.to_string(),
                            replica_a: 0,
                            replica_b: replica,
                            version_a: expected.version.to_string(),
                            version_b: actual.version.to_string(),
                        });
                    }
                    Some(_) => {}
                }
            }
        }
        violations
    }

    fn check_dominance(
        indexed: &[BTreeMap<&str, &FileInfo>],
        produced: &BTreeMap<String, Vec<Vector>>,
    ) -> Vec<InvariantViolation> {
        let mut violations = Vec::new();
        for (replica, files) in indexed.iter().enumerate() {
            for (path, versions) in produced {
                let Some(file) = files.get(path.as_str()) else {
                    continue;
                };
                if let Some(lost) = versions.iter().find(|v| !file.version.greater_equal(v)) {
                    violations.push(InvariantViolation::LostUpdate {
                        path: path.clone(),
                        replica,
                        final_version: file.version.to_string(),
                        produced_version: lost.to_string(),
                    });
                }
            }
        }
        violations
    }

    fn check_canonical(indexed: &[BTreeMap<&str, &FileInfo>]) -> Vec<InvariantViolation> {
        let mut violations = Vec::new();
        for (replica, files) in indexed.iter().enumerate() {
            for (path, file) in files {
                let sorted = file
                    .version
                    .counters()
                    .windows(2)
                    .all(|pair| pair[0].id < pair[1].id);
                if !sorted {
                    violations.push(InvariantViolation::UnsortedVector {
                        path: (*path).to_string(),
                        replica,
                    });
                }
            }
        }
        violations
    }
}
