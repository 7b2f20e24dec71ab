//! 种子几何与主哈希。
//!
//! 种子窗口共 `SEED_SPAN` 个碱基：前 `HASH_BASES` 个连续碱基构成
//! 主哈希（2 bit/碱基，桶数 `4^HASH_BASES`），其余为鉴别位
//! （discriminator），索引内每个桶按鉴别位处的参考碱基排序，
//! 比对时用二分逐位收窄。鉴别位之间留有空位，周期性的错配
//! 可以落在未比较的位置上。

use crate::util::dna::base_code;

/// 种子窗口长度，同时是可比对 read 的最短长度。
pub const SEED_SPAN: usize = 26;

/// 主哈希覆盖的前缀碱基数。
pub const HASH_BASES: usize = 10;

/// 每个种子实际比较的位置数（主哈希 + 鉴别位）。
pub const SEED_COMPARE_LEN: usize = 18;

/// 种子窗口内参与比较的偏移：前 `HASH_BASES` 个为主哈希位置，
/// 其余为二分收窄用的鉴别位置。
pub const SEED_POSITIONS: [usize; SEED_COMPARE_LEN] =
    [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 12, 13, 16, 17, 20, 21, 24, 25];

/// 桶表大小：4^HASH_BASES。
pub const BUCKET_COUNT: usize = 1 << (2 * HASH_BASES);

/// read 上尝试的种子偏移个数。该范围是索引密度与假阳性之间的
/// 权衡，必须与建库端一致，否则会漏掉建库端保证可达的命中。
pub const SEED_OFFSETS: usize = 7;

/// 计算序列前 `HASH_BASES` 个碱基的主哈希。
/// 调用方保证 `seq.len() >= HASH_BASES`；N 按 T 编码参与哈希。
#[inline]
pub fn seed_hash(seq: &[u8]) -> u32 {
    let mut h = 0u32;
    for &b in &seq[..HASH_BASES] {
        h = (h << 2) | base_code(b) as u32;
    }
    h
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geometry_is_consistent() {
        assert_eq!(SEED_POSITIONS.len(), SEED_COMPARE_LEN);
        // 主哈希位置是连续前缀
        for (i, &p) in SEED_POSITIONS[..HASH_BASES].iter().enumerate() {
            assert_eq!(p, i);
        }
        // 偏移严格递增且都落在窗口内
        for w in SEED_POSITIONS.windows(2) {
            assert!(w[0] < w[1]);
        }
        assert!(SEED_POSITIONS[SEED_COMPARE_LEN - 1] < SEED_SPAN);
        assert_eq!(BUCKET_COUNT, 1 << 20);
    }

    #[test]
    fn hash_of_all_a_is_zero() {
        let seq = vec![b'A'; SEED_SPAN];
        assert_eq!(seed_hash(&seq), 0);
    }

    #[test]
    fn hash_packs_two_bits_per_base() {
        // ACGTACGTAC -> 00 01 10 11 00 01 10 11 00 01
        let seq = b"ACGTACGTAC";
        let expected = 0b00_01_10_11_00_01_10_11_00_01u32;
        assert_eq!(seed_hash(seq), expected);
    }

    #[test]
    fn n_hashes_as_t() {
        let with_n = b"ACGNACGTAC";
        let with_t = b"ACGTACGTAC";
        assert_eq!(seed_hash(with_n), seed_hash(with_t));
    }

    #[test]
    fn hash_ignores_bases_past_prefix() {
        let a = b"ACGTACGTACAAAAAA";
        let b = b"ACGTACGTACTTTTTT";
        assert_eq!(seed_hash(a), seed_hash(b));
    }
}
