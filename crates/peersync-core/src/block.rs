//! Content-addressed block descriptors.

use std::fmt;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Size of a full block, in bytes.
pub const BLOCK_SIZE: u32 = 128 << 10;

/// SHA-256 of a full block of zeroes. Computed on first use.
static EMPTY_BLOCK_HASH: LazyLock<[u8; 32]> = LazyLock::new(|| {
    let zeroes = vec![0u8; BLOCK_SIZE as usize];
    Sha256::digest(&zeroes).into()
});

/// The digest a sparse-file hole of [`BLOCK_SIZE`] bytes hashes to.
#[must_use]
pub fn empty_block_hash() -> &'static [u8; 32] {
    &EMPTY_BLOCK_HASH
}

/// One chunk of a file: where it sits, how long it is, and what it hashes to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockInfo {
    /// Byte offset of the block within the file.
    pub offset: i64,
    /// Length of the block in bytes.
    pub size: u32,
    /// SHA-256 of the block contents.
    pub hash: Vec<u8>,
}

impl BlockInfo {
    #[must_use]
    pub const fn new(offset: i64, size: u32, hash: Vec<u8>) -> Self {
        Self { offset, size, hash }
    }

    /// Describe `data` as the block starting at `offset`.
    ///
    /// `data` is expected to be at most [`BLOCK_SIZE`] bytes; longer input
    /// saturates the recorded size.
    #[must_use]
    pub fn for_data(offset: i64, data: &[u8]) -> Self {
        let size = u32::try_from(data.len()).unwrap_or(u32::MAX);
        Self {
            offset,
            size,
            hash: Sha256::digest(data).to_vec(),
        }
    }

    /// True if the block is a full block of zeroes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.size == BLOCK_SIZE && self.hash.as_slice() == empty_block_hash().as_slice()
    }
}

impl fmt::Display for BlockInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Block{{{}/{}/", self.offset, self.size)?;
        for byte in &self.hash {
            write!(f, "{byte:02x}")?;
        }
        f.write_str("}")
    }
}
