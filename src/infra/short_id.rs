//! # Short Identifiers / 短标识符
//!
//! A short id is a fixed-length display identifier derived from the full name
//! of a unit of work. The same name always yields the same id, across runs and
//! machines. Collisions are possible and are not resolved.
//!
//! 短标识符是从工作单元全名派生出的定长显示标识符。相同的名称总是产生相同的标识符，
//! 跨运行和跨机器均如此。可能发生冲突，且不会被处理。

use sha2::{Digest, Sha256};

use crate::core::models::NestedUnitOfWork;

/// Length of every short id.
pub const SHORT_ID_LEN: usize = 6;

/// Lowercase Crockford base-32.
const ALPHABET: &[u8; 32] = b"0123456789abcdefghjkmnpqrstvwxyz";

/// The default short id of a unit of work.
pub fn short_id(unit: &NestedUnitOfWork) -> String {
    short_id_for(&unit.full_name())
}

/// The short id of a full name.
pub fn short_id_for(full_name: &str) -> String {
    let digest = Sha256::digest(full_name.as_bytes());
    let bits = digest
        .iter()
        .take(8)
        .fold(0u64, |acc, byte| (acc << 8) | u64::from(*byte));

    (0..SHORT_ID_LEN)
        .map(|i| {
            let index = (bits >> (59 - 5 * i)) & 0x1f;
            char::from(ALPHABET[index as usize])
        })
        .collect()
}
