//! A simulated sync participant holding one record per path.

use std::collections::{BTreeMap, BTreeSet};

use peersync_core::block::empty_block_hash;
use peersync_core::file::FLAG_DELETED;
use peersync_core::version::Ordering;
use peersync_core::{
    BLOCK_SIZE, BlockInfo, FileInfo, FileMeta, MessageIds, ShortId, Winner, resolve_conflict,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::clock::ReplicaClock;
use crate::rng::DeterministicRng;

/// Index of a replica within a simulation.
pub type ReplicaId = usize;

const LIVE_PERMISSIONS: u32 = 0o644;
const DELETE_PERCENT: u8 = 20;
const SPARSE_BLOCK_PERCENT: u8 = 15;
const MAX_BLOCKS: u64 = 3;

/// How an incoming record changed (or did not change) the local one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Applied {
    /// The remote record was new or causally newer and replaced ours.
    Adopted,
    /// The remote record was already known or causally older.
    Ignored,
    /// Concurrent versions of identical content; versions were merged.
    Merged,
    /// Concurrent versions of different content; the policy picked a side.
    /// `tie_break` is set when neither deletion nor modification time
    /// decided and the version vectors did.
    Resolved { remote_won: bool, tie_break: bool },
}

impl Applied {
    #[must_use]
    pub const fn changed(self) -> bool {
        !matches!(self, Self::Ignored)
    }

    /// True if applying produced a version nobody had before.
    #[must_use]
    pub const fn produced_version(self) -> bool {
        matches!(self, Self::Merged | Self::Resolved { .. })
    }
}

/// One replica's view of the shared folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replica {
    index: ReplicaId,
    id: ShortId,
    clock: ReplicaClock,
    files: BTreeMap<String, FileInfo>,
    dirty: BTreeSet<String>,
    outgoing: BTreeMap<ReplicaId, MessageIds>,
}

impl Replica {
    #[must_use]
    pub const fn new(index: ReplicaId, id: ShortId, clock: ReplicaClock) -> Self {
        Self {
            index,
            id,
            clock,
            files: BTreeMap::new(),
            dirty: BTreeSet::new(),
            outgoing: BTreeMap::new(),
        }
    }

    #[must_use]
    pub const fn index(&self) -> ReplicaId {
        self.index
    }

    #[must_use]
    pub const fn id(&self) -> ShortId {
        self.id
    }

    #[must_use]
    pub fn record(&self, path: &str) -> Option<&FileInfo> {
        self.files.get(path)
    }

    pub fn records(&self) -> impl Iterator<Item = &FileInfo> {
        self.files.values()
    }

    /// Message id allocator for the connection to `peer`.
    pub fn connection(&mut self, peer: ReplicaId) -> &mut MessageIds {
        self.outgoing.entry(peer).or_default()
    }

    /// Records changed locally since the last call, for an index update.
    pub fn take_dirty(&mut self) -> Vec<FileInfo> {
        let dirty = std::mem::take(&mut self.dirty);
        dirty
            .iter()
            .filter_map(|path| self.files.get(path).cloned())
            .collect()
    }

    /// Every record, for a full index exchange.
    #[must_use]
    pub fn full_index(&self) -> Vec<FileInfo> {
        self.files.values().cloned().collect()
    }

    /// Make a local change to `path` at simulation round `round`.
    ///
    /// Live files are sometimes deleted; everything else is rewritten with
    /// fresh blocks. The new version succeeds the current local one.
    pub fn edit(&mut self, path: &str, round: u64, rng: &mut DeterministicRng) -> &FileInfo {
        let previous = self.files.get(path);
        let version = previous
            .map_or_else(Default::default, |f| f.version.copy())
            .update(self.id);
        let delete = previous.is_some_and(|f| !f.is_deleted()) && rng.chance(DELETE_PERCENT);

        let mut file = FileInfo::new(path);
        file.modified = self.clock.now_secs(round);
        file.version = version;
        if delete {
            file.flags = FLAG_DELETED;
        } else {
            file.flags = LIVE_PERMISSIONS;
            file.blocks = self.fresh_blocks(round, rng);
            file.length = file.blocks.iter().map(|b| i64::from(b.size)).sum();
        }

        debug!(
            replica = self.index,
            path,
            deleted = delete,
            version = %file.version,
            "local edit"
        );
        self.dirty.insert(path.to_string());
        self.files.insert(path.to_string(), file);
        &self.files[path]
    }

    fn fresh_blocks(&self, round: u64, rng: &mut DeterministicRng) -> Vec<BlockInfo> {
        let count = 1 + rng.below(MAX_BLOCKS);
        (0..count)
            .map(|i| {
                let offset = i64::try_from(i).unwrap_or(0) * i64::from(BLOCK_SIZE);
                if rng.chance(SPARSE_BLOCK_PERCENT) {
                    return BlockInfo::new(offset, BLOCK_SIZE, empty_block_hash().to_vec());
                }
                let mut data = Vec::with_capacity(24);
                data.extend_from_slice(&self.id.as_u64().to_be_bytes());
                data.extend_from_slice(&round.to_be_bytes());
                data.extend_from_slice(&rng.next_u64().to_be_bytes());
                BlockInfo::for_data(offset, &data)
            })
            .collect()
    }

    /// Apply a record received from a peer.
    pub fn receive(&mut self, remote: FileInfo) -> Applied {
        let Some(local) = self.files.get_mut(&remote.name) else {
            self.files.insert(remote.name.clone(), remote);
            return Applied::Adopted;
        };

        let ordering = remote.version.compare(&local.version);
        let applied = match ordering {
            Ordering::Lesser => Applied::Ignored,
            Ordering::Equal if local.same_content(&remote) => Applied::Ignored,
            Ordering::Greater => {
                *local = remote;
                Applied::Adopted
            }
            _ if local.same_content(&remote) => {
                local.version.merge_in_place(&remote.version);
                Applied::Merged
            }
            _ => {
                let tie_break = local.modified == remote.modified
                    && local.is_deleted() == remote.is_deleted();
                let winner = resolve_conflict(&*local, &remote);
                let version = local.version.copy().merge(&remote.version).update(self.id);
                if winner == Winner::Right {
                    *local = remote;
                }
                local.version = version;
                Applied::Resolved {
                    remote_won: winner == Winner::Right,
                    tie_break,
                }
            }
        };

        if applied.produced_version() {
            self.dirty.insert(local.name.clone());
        }
        trace!(
            replica = self.index,
            path = %local.name,
            ?ordering,
            ?applied,
            "applied remote record"
        );
        applied
    }
}
