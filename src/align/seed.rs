//! 桶收窄：在主哈希命中的桶内，沿鉴别位逐位二分，
//! 把候选区间收窄到种子完全一致的子区间。
//!
//! 桶内位置按鉴别位处的参考碱基排序（建库时保证），因此每个
//! 鉴别位各做一次 lower bound / upper bound 即可；区间在相邻
//! 鉴别位之间逐步收紧。区间端点处可能残留少量碱基不一致的
//! 假阳性，由后续的全长校验兜底。

use crate::index::db::PositionIndex;
use crate::index::genome::GenomeImage;
use crate::index::hash::{HASH_BASES, SEED_COMPARE_LEN, SEED_POSITIONS};

/// 位置数组第 `j` 项在鉴别偏移 `off` 处的镜像碱基。
#[inline]
fn base_at(image: &GenomeImage, positions: &PositionIndex, j: u32, off: usize) -> u8 {
    let cid = positions.chrom_ids[j as usize];
    let pos = positions.chrom_offsets[j as usize] as usize;
    image.chrom(cid)[pos + off]
}

/// `[low, high]`（闭区间）内第一个鉴别碱基 >= `base` 的下标。
fn lower_bound(
    image: &GenomeImage,
    positions: &PositionIndex,
    mut low: u32,
    mut high: u32,
    off: usize,
    base: u8,
) -> u32 {
    while low < high {
        let mid = low + (high - low) / 2;
        if base_at(image, positions, mid, off) >= base {
            high = mid;
        } else {
            low = mid + 1;
        }
    }
    low
}

/// `[low, high]`（闭区间）内最后一个鉴别碱基 <= `base` 的下标。
fn upper_bound(
    image: &GenomeImage,
    positions: &PositionIndex,
    mut low: u32,
    mut high: u32,
    off: usize,
    base: u8,
) -> u32 {
    while low < high {
        let mid = low + (high - low + 1) / 2;
        if base_at(image, positions, mid, off) <= base {
            low = mid;
        } else {
            high = mid - 1;
        }
    }
    low
}

/// 在桶 `[start, end)` 内收窄出与 `seed`（转换后 read 的后缀，
/// 长度 >= SEED_SPAN）一致的闭区间。空桶或收窄至空时返回 None。
pub fn refine_region(
    seed: &[u8],
    image: &GenomeImage,
    positions: &PositionIndex,
    bucket: (u32, u32),
) -> Option<(u32, u32)> {
    let (start, end) = bucket;
    if start >= end {
        return None;
    }

    let mut low = start;
    let mut high = end - 1;
    for p in HASH_BASES..SEED_COMPARE_LEN {
        let off = SEED_POSITIONS[p];
        let base = seed[off];
        low = lower_bound(image, positions, low, high, off, base);
        high = upper_bound(image, positions, low, high, off, base);
        if low > high {
            return None;
        }
    }
    Some((low, high))
}
