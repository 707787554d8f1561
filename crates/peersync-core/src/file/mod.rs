//! File metadata records and the conflict-resolution policy.
//!
//! Two record shapes exist: [`FileInfo`] carries the block list, while
//! [`FileInfoTruncated`] is the summary form used where blocks are not
//! needed. Both implement [`FileMeta`], which holds every predicate and the
//! [`FileMeta::wins_conflict`] policy, so the two shapes can be compared with
//! each other.

mod conflict;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::block::BlockInfo;
use crate::version::Vector;

pub use conflict::{Winner, resolve_conflict};

/// Low bits of the flag word carry Unix permission bits.
pub const PERMISSION_MASK: u32 = 0o7777;
pub const FLAG_DELETED: u32 = 1 << 12;
pub const FLAG_INVALID: u32 = 1 << 13;
pub const FLAG_DIRECTORY: u32 = 1 << 14;
pub const FLAG_NO_PERM_BITS: u32 = 1 << 15;
pub const FLAG_SYMLINK: u32 = 1 << 16;
pub const FLAG_SYMLINK_MISSING_TARGET: u32 = 1 << 17;
/// Every bit the protocol currently assigns a meaning to.
pub const FLAGS_ALL: u32 = (1 << 18) - 1;

/// Length reported for directories and deleted entries.
pub const SENTINEL_LENGTH: i64 = 128;

// ---------------------------------------------------------------------------
// FileMeta
// ---------------------------------------------------------------------------

/// Capabilities shared by every file record shape.
pub trait FileMeta {
    fn name(&self) -> &str;
    fn flags(&self) -> u32;
    /// Modification time, seconds since the Unix epoch.
    fn modified(&self) -> i64;
    fn version(&self) -> &Vector;
    /// The stored length, before the directory/deleted override.
    fn raw_length(&self) -> i64;

    fn is_deleted(&self) -> bool {
        self.flags() & FLAG_DELETED != 0
    }

    fn is_invalid(&self) -> bool {
        self.flags() & FLAG_INVALID != 0
    }

    fn is_directory(&self) -> bool {
        self.flags() & FLAG_DIRECTORY != 0
    }

    fn is_symlink(&self) -> bool {
        self.flags() & FLAG_SYMLINK != 0
    }

    fn has_permission_bits(&self) -> bool {
        self.flags() & FLAG_NO_PERM_BITS == 0
    }

    /// Unix permission bits, or `None` when the record carries none.
    fn permissions(&self) -> Option<u32> {
        self.has_permission_bits()
            .then(|| self.flags() & PERMISSION_MASK)
    }

    /// Length used for size accounting.
    ///
    /// Directories and tombstones have no byte content and report
    /// [`SENTINEL_LENGTH`] regardless of the stored value.
    fn file_length(&self) -> i64 {
        if self.is_directory() || self.is_deleted() {
            SENTINEL_LENGTH
        } else {
            self.raw_length()
        }
    }

    fn file_name(&self) -> &str {
        self.name()
    }

    /// True if `self` should survive when it conflicts with `other`.
    ///
    /// 1. A modification beats a deletion.
    /// 2. Otherwise the later modification time wins.
    /// 3. On equal times, `self` wins only if its version compares
    ///    [`ConcurrentGreater`](crate::version::Ordering::ConcurrentGreater)
    ///    against `other`'s.
    ///
    /// Every replica evaluates this identically, and for records with equal
    /// times and concurrent versions exactly one side wins.
    fn wins_conflict(&self, other: &impl FileMeta) -> bool
    where
        Self: Sized,
    {
        conflict::wins(self, other)
    }
}

// ---------------------------------------------------------------------------
// FileInfo
// ---------------------------------------------------------------------------

/// Full file record, including the block list.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FileInfo {
    pub name: String,
    pub flags: u32,
    pub modified: i64,
    pub version: Vector,
    pub length: i64,
    pub blocks: Vec<BlockInfo>,
}

impl FileInfo {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Drop the block list, keeping every other field.
    #[must_use]
    pub fn truncate(&self) -> FileInfoTruncated {
        FileInfoTruncated {
            name: self.name.clone(),
            flags: self.flags,
            modified: self.modified,
            version: self.version.copy(),
            length: self.length,
        }
    }

    /// True if both records describe the same content: flags, time, length,
    /// and blocks. The version is not considered.
    #[must_use]
    pub fn same_content(&self, other: &Self) -> bool {
        self.name == other.name
            && self.flags == other.flags
            && self.modified == other.modified
            && self.length == other.length
            && self.blocks == other.blocks
    }
}

impl FileMeta for FileInfo {
    fn name(&self) -> &str {
        &self.name
    }

    fn flags(&self) -> u32 {
        self.flags
    }

    fn modified(&self) -> i64 {
        self.modified
    }

    fn version(&self) -> &Vector {
        &self.version
    }

    fn raw_length(&self) -> i64 {
        self.length
    }
}

impl fmt::Display for FileInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "File{{Name:{:?}, Flags:0o{:o}, Modified:{}, Version:{}, Length:{}, Blocks:[",
            self.name, self.flags, self.modified, self.version, self.length
        )?;
        for (i, block) in self.blocks.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{block}")?;
        }
        f.write_str("]}")
    }
}

// ---------------------------------------------------------------------------
// FileInfoTruncated
// ---------------------------------------------------------------------------

/// Summary file record without the block list.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FileInfoTruncated {
    pub name: String,
    pub flags: u32,
    pub modified: i64,
    pub version: Vector,
    pub length: i64,
}

impl FileMeta for FileInfoTruncated {
    fn name(&self) -> &str {
        &self.name
    }

    fn flags(&self) -> u32 {
        self.flags
    }

    fn modified(&self) -> i64 {
        self.modified
    }

    fn version(&self) -> &Vector {
        &self.version
    }

    fn raw_length(&self) -> i64 {
        self.length
    }
}

impl fmt::Display for FileInfoTruncated {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "File{{Name:{:?}, Flags:0o{:o}, Modified:{}, Version:{}, Length:{}}}",
            self.name, self.flags, self.modified, self.version, self.length
        )
    }
}
