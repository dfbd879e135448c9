//! Merkle root construction
//!
//! Each level is derived from the previous one and then dropped: adjacent
//! ids are paired left to right, an odd trailing id is paired with itself,
//! and every pair becomes SHA256d(left ‖ right). A level of one id is the
//! root.

use crate::hashing::{double_hash_parts, ByteOrder};
use crate::types::Hash;

/// Fold one level into the next
pub fn next_level(level: &[Hash]) -> Vec<Hash> {
    level
        .chunks(2)
        .map(|pair| {
            let left = &pair[0];
            let right = pair.get(1).unwrap_or(left);
            double_hash_parts(&[left, right])
        })
        .collect()
}

/// Merkle root and the number of hashing rounds it took
///
/// `ids` are read in `order`; the returned root is in internal order.
/// Returns `None` for an empty input.
pub fn merkle_root_with_rounds(ids: &[Hash], order: ByteOrder) -> Option<(Hash, u32)> {
    if ids.is_empty() {
        return None;
    }

    let mut level: Vec<Hash> = ids.iter().map(|id| order.to_internal(id)).collect();
    let mut rounds = 0;
    while level.len() > 1 {
        level = next_level(&level);
        rounds += 1;
    }
    Some((level[0], rounds))
}

/// Merkle root in internal order, or `None` for an empty input
///
/// # Examples
///
/// ```
/// use consensus_miner::hashing::ByteOrder;
/// use consensus_miner::merkle::merkle_root;
///
/// assert_eq!(merkle_root(&[], ByteOrder::Internal), None);
/// assert_eq!(merkle_root(&[[7u8; 32]], ByteOrder::Internal), Some([7u8; 32]));
/// ```
pub fn merkle_root(ids: &[Hash], order: ByteOrder) -> Option<Hash> {
    merkle_root_with_rounds(ids, order).map(|(root, _)| root)
}
