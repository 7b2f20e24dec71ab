//! 全长校验与单端比对。
//!
//! 对每个种子偏移取 read 后缀做哈希 + 桶收窄，再把每个候选位置
//! 换算回比对起点，在对应镜像上逐碱基数错配；一旦超过当前最优
//! 立即中止（错配剪枝）。best-match 记录当前最优位置、错配数与
//! 并列次数，`times` 统计的是并列在最优错配数上的不同落点个数，
//! 同一落点经不同种子偏移或另一份镜像重复发现不会重复计数。

use std::collections::HashSet;

use crate::align::seed::refine_region;
use crate::align::MapOpt;
use crate::index::db::DbIndex;
use crate::index::hash::{seed_hash, SEED_OFFSETS, SEED_SPAN};
use crate::util::dna::{normalize_seq, revcomp, Conversion, Strand};

/// 一条 read 的最优比对记录。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BestMatch {
    pub chrom_id: u32,
    pub chrom_pos: u32,
    pub strand: Strand,
    pub mismatch: u32,
    pub times: u32,
}

impl BestMatch {
    /// 初始记录：错配数取 `max_mismatches + 1`，任何合法候选都能改进它。
    pub fn unmapped(max_mismatches: u32) -> Self {
        Self {
            chrom_id: 0,
            chrom_pos: 0,
            strand: Strand::Forward,
            mismatch: max_mismatches + 1,
            times: 0,
        }
    }

    pub fn classify(&self, max_mismatches: u32) -> MapClass {
        if self.times == 0 || self.mismatch > max_mismatches {
            MapClass::Unmapped
        } else if self.times == 1 {
            MapClass::Unique
        } else {
            MapClass::Ambiguous
        }
    }
}

/// 一条 read（或一对 read）的归类结果。不是错误，而是正常输出通道。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapClass {
    Unique,
    Ambiguous,
    Unmapped,
}

/// 有界 Hamming 距离：返回错配数，一旦超过 `bound` 提前返回
/// （返回值可能为 `bound + 1`，表示已中止）。
/// 调用方保证 `start + read.len() <= refseq.len()`。
#[inline]
pub(crate) fn hamming_bounded(read: &[u8], refseq: &[u8], start: usize, bound: u32) -> u32 {
    let mut count = 0u32;
    for (p, &rb) in read.iter().enumerate() {
        if refseq[start + p] != rb {
            count += 1;
            if count > bound {
                break;
            }
        }
    }
    count
}

/// 单端比对的可变状态：最优记录 + 并列落点集合。
struct SingleState {
    best: BestMatch,
    tied: HashSet<(u32, u32, Strand)>,
}

impl SingleState {
    fn new(max_mismatches: u32) -> Self {
        Self { best: BestMatch::unmapped(max_mismatches), tied: HashSet::new() }
    }

    fn update(&mut self, chrom_id: u32, chrom_pos: u32, strand: Strand, count: u32) {
        if count < self.best.mismatch {
            self.best = BestMatch { chrom_id, chrom_pos, strand, mismatch: count, times: 1 };
            self.tied.clear();
            self.tied.insert((chrom_id, chrom_pos, strand));
        } else if count == self.best.mismatch && self.tied.insert((chrom_id, chrom_pos, strand)) {
            // 新的并列落点：代表更新为最近一次发现的位置
            self.best.chrom_id = chrom_id;
            self.best.chrom_pos = chrom_pos;
            self.best.strand = strand;
            self.best.times += 1;
        }
    }
}

/// 在一份镜像上用给定的转换后 read 扫一遍所有种子偏移。
fn scan_image(
    index: &DbIndex,
    conversion: Conversion,
    read: &[u8],
    strand: Strand,
    opt: &MapOpt,
    state: &mut SingleState,
) {
    let (image, positions) = index.image(conversion);
    let read_len = read.len();

    for seed_i in 0..SEED_OFFSETS {
        // 后缀太短放不下整个种子窗口时跳过该偏移
        if seed_i + SEED_SPAN > read_len {
            break;
        }
        let suffix = &read[seed_i..];
        let bucket = positions.bucket(seed_hash(suffix));
        let Some((low, high)) = refine_region(suffix, image, positions, bucket) else {
            continue;
        };
        // 低复杂度种子的桶收窄后仍然过大时放弃，限制最坏情况开销
        if (high - low + 1) as usize > opt.bucket_cap {
            continue;
        }

        for j in low..=high {
            let chrom_id = positions.chrom_ids[j as usize];
            let pos = positions.chrom_offsets[j as usize];
            if pos < seed_i as u32 {
                continue;
            }
            let start = pos - seed_i as u32;
            let chrom = image.chrom(chrom_id);
            if start as u64 + read_len as u64 >= chrom.len() as u64 {
                continue;
            }

            let bound = state.best.mismatch;
            let count = hamming_bounded(read, chrom, start as usize, bound);
            if count > bound {
                continue;
            }
            state.update(chrom_id, start, strand, count);
        }
    }
}

/// 单端比对：C→T 镜像上正反两链，`--ag-wild` 时再加 G→A 镜像上的
/// 正反两链。read 在此处规范化，长度不足 SEED_SPAN 直接判未比对。
pub fn map_read(index: &DbIndex, seq: &[u8], opt: &MapOpt) -> BestMatch {
    let norm = normalize_seq(seq);
    if norm.len() < SEED_SPAN {
        return BestMatch::unmapped(opt.max_mismatches);
    }
    let rc = revcomp(&norm);

    let mut state = SingleState::new(opt.max_mismatches);
    let mut passes: Vec<(Conversion, Vec<u8>, Strand)> = vec![
        (Conversion::CtoT, Conversion::CtoT.convert(&norm), Strand::Forward),
        (Conversion::CtoT, Conversion::CtoT.convert(&rc), Strand::Reverse),
    ];
    if opt.ag_wildcard {
        passes.push((Conversion::GtoA, Conversion::GtoA.convert(&norm), Strand::Forward));
        passes.push((Conversion::GtoA, Conversion::GtoA.convert(&rc), Strand::Reverse));
    }
    for (conversion, converted, strand) in &passes {
        scan_image(index, *conversion, converted, *strand, opt, &mut state);
    }
    state.best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::db::DbIndex;

    fn make_index(seq: &[u8]) -> DbIndex {
        DbIndex::build(vec![("chr1".to_string(), seq.to_vec())]).unwrap()
    }

    fn opt_with(max_mismatches: u32) -> MapOpt {
        MapOpt { max_mismatches, ..MapOpt::default() }
    }

    // 50bp 的周期模式，首尾碱基均非 A：在 A 填充中恰好出现一次时，
    // 0 错配下的唯一性可以严格论证
    fn pattern() -> Vec<u8> {
        b"ACGGT".repeat(10)
    }

    fn pad(n: usize) -> Vec<u8> {
        vec![b'A'; n]
    }

    fn plant(pieces: &[&[u8]]) -> Vec<u8> {
        pieces.concat()
    }

    #[test]
    fn unique_forward_exact_match() {
        let read = pattern();
        let reference = plant(&[&pad(30), &read, &pad(30)]);
        let idx = make_index(&reference);

        let best = map_read(&idx, &read, &opt_with(0));
        assert_eq!(best.classify(0), MapClass::Unique);
        assert_eq!(best.chrom_pos, 30);
        assert_eq!(best.strand, Strand::Forward);
        assert_eq!(best.mismatch, 0);
        assert_eq!(best.times, 1);
    }

    #[test]
    fn unique_reverse_strand() {
        let planted = pattern();
        let reference = plant(&[&pad(30), &planted, &pad(30)]);
        let idx = make_index(&reference);

        let read = revcomp(&planted);
        let best = map_read(&idx, &read, &opt_with(0));
        assert_eq!(best.classify(0), MapClass::Unique);
        assert_eq!(best.chrom_pos, 30);
        assert_eq!(best.strand, Strand::Reverse);
    }

    #[test]
    fn twice_planted_read_is_ambiguous() {
        let read = pattern();
        let reference = plant(&[&pad(30), &read, &pad(20), &read, &pad(30)]);
        let idx = make_index(&reference);

        let best = map_read(&idx, &read, &opt_with(0));
        assert_eq!(best.classify(0), MapClass::Ambiguous);
        // 同一落点经多个种子偏移重复发现不重复计数
        assert_eq!(best.times, 2);
    }

    #[test]
    fn bisulfite_converted_read_maps_exactly() {
        // 参考含 C；测序时未甲基化的 C 读作 T
        let planted = pattern(); // ACGGT...
        let reference = plant(&[&pad(30), &planted, &pad(30)]);
        let idx = make_index(&reference);

        let sequenced = Conversion::CtoT.convert(&planted); // ATGGT...
        let best = map_read(&idx, &sequenced, &opt_with(0));
        assert_eq!(best.classify(0), MapClass::Unique);
        assert_eq!(best.chrom_pos, 30);
        assert_eq!(best.mismatch, 0);
    }

    #[test]
    fn reference_c_to_t_swap_does_not_add_mismatch() {
        // 把参考里的 C 换成 T 后，同一条 read 的错配数不增加
        let planted = pattern();
        let swapped: Vec<u8> =
            planted.iter().map(|&b| if b == b'C' { b'T' } else { b }).collect();
        let reference = plant(&[&pad(30), &swapped, &pad(30)]);
        let idx = make_index(&reference);

        let best = map_read(&idx, &planted, &opt_with(0));
        assert_eq!(best.classify(0), MapClass::Unique);
        assert_eq!(best.mismatch, 0);
    }

    #[test]
    fn n_bases_count_as_t() {
        let mut read = pattern();
        // 模式中 14、19、24 处本来就是 T，置 N 后仍然精确匹配
        read[14] = b'N';
        read[19] = b'N';
        read[24] = b'N';
        let reference = plant(&[&pad(30), &pattern(), &pad(30)]);
        let idx = make_index(&reference);

        let best = map_read(&idx, &read, &opt_with(0));
        assert_eq!(best.classify(0), MapClass::Unique);
        assert_eq!(best.mismatch, 0);
    }

    #[test]
    fn mismatches_within_bound_are_tolerated() {
        // 两个替换都放在种子偏移 0 不比较的位置（14 与 38），
        // 保证种子仍可命中；其他落点至少 4 个错配
        let mut read = pattern();
        read[14] = b'A'; // T -> A
        read[38] = b'A'; // G -> A
        let reference = plant(&[&pad(30), &pattern(), &pad(30)]);
        let idx = make_index(&reference);

        let best = map_read(&idx, &read, &opt_with(2));
        assert_eq!(best.classify(2), MapClass::Unique);
        assert_eq!(best.chrom_pos, 30);
        assert_eq!(best.mismatch, 2);

        // 相同输入在 0 错配约束下必须落空
        let strict = map_read(&idx, &read, &opt_with(0));
        assert_eq!(strict.classify(0), MapClass::Unmapped);
    }

    #[test]
    fn short_read_is_unmapped() {
        let reference = plant(&[&pad(30), &pattern(), &pad(30)]);
        let idx = make_index(&reference);
        let best = map_read(&idx, &pattern()[..SEED_SPAN - 1], &opt_with(6));
        assert_eq!(best.classify(6), MapClass::Unmapped);
        assert_eq!(best.times, 0);
    }

    #[test]
    fn read_of_exactly_seed_span_maps() {
        // 26bp read：只有种子偏移 0 可用，其余偏移后缀太短被安全跳过
        let mut read = pattern()[..SEED_SPAN - 1].to_vec();
        read.push(b'T');
        let reference = plant(&[&pad(30), &read, &pad(30)]);
        let idx = make_index(&reference);

        let best = map_read(&idx, &read, &opt_with(0));
        assert_eq!(best.classify(0), MapClass::Unique);
        assert_eq!(best.chrom_pos, 30);
    }

    #[test]
    fn wildcard_pass_does_not_inflate_times() {
        // 同一落点同时被 C→T 与 G→A 两份镜像发现，times 仍为 1
        let read = pattern();
        let reference = plant(&[&pad(30), &read, &pad(30)]);
        let idx = make_index(&reference);

        let opt = MapOpt { max_mismatches: 0, ag_wildcard: true, ..MapOpt::default() };
        let best = map_read(&idx, &read, &opt);
        assert_eq!(best.classify(0), MapClass::Unique);
        assert_eq!(best.times, 1);
    }

    #[test]
    fn oversized_refined_region_is_skipped() {
        let read = pattern();
        let reference = plant(&[&pad(30), &read, &pad(20), &read, &pad(30)]);
        let idx = make_index(&reference);

        // 两个完全相同的落点共享收窄区间，容量上限 1 使其被放弃
        let opt = MapOpt { max_mismatches: 0, bucket_cap: 1, ..MapOpt::default() };
        let best = map_read(&idx, &read, &opt);
        assert_eq!(best.classify(0), MapClass::Unmapped);
    }

    #[test]
    fn hamming_bounded_aborts_past_bound() {
        let read = b"TTTT";
        let refseq = b"AAAA";
        assert_eq!(hamming_bounded(read, refseq, 0, 4), 4);
        assert_eq!(hamming_bounded(read, refseq, 0, 1), 2); // bound + 1 表示中止
        assert_eq!(hamming_bounded(b"AAAA", refseq, 0, 0), 0);
    }
}
