//! 双端比对：每个 mate 保留 top-k 候选，再按染色体与片段长度
//! 约束做笛卡尔配对，取错配数之和最小的组合。
//!
//! 方向性 BS-seq 文库里 mate 1 固定走 C→T 约定，mate 2 固定走
//! G→A 约定（相对镜像），双端模式没有 wildcard 开关。单个 mate
//! 的多义（times > 1）不妨碍配对唯一：片段长度约束常常只留下
//! 一种组合。

use crate::align::single::{hamming_bounded, MapClass};
use crate::align::seed::refine_region;
use crate::align::MapOpt;
use crate::index::db::DbIndex;
use crate::index::hash::{seed_hash, SEED_OFFSETS, SEED_SPAN};
use crate::util::dna::{normalize_seq, revcomp, Conversion, Strand};

/// 单个 mate 的一个候选落点。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairCand {
    pub chrom_id: u32,
    pub chrom_pos: u32,
    pub strand: Strand,
    pub mismatch: u32,
}

#[inline]
fn cand_key(c: &PairCand) -> (u32, u32, u32, u8) {
    (c.mismatch, c.chrom_id, c.chrom_pos, matches!(c.strand, Strand::Reverse) as u8)
}

/// 按 (错配数, 染色体, 位置, 链) 排序的有界候选列表。
///
/// 同一落点重复发现只保留一份；第 k 名之外与第 k 名错配数并列的
/// 候选被丢弃时置 `truncated`，避免配对阶段的多义被无声低估。
#[derive(Debug)]
pub struct TopKList {
    k: usize,
    items: Vec<PairCand>,
    truncated: bool,
}

impl TopKList {
    pub fn new(k: usize) -> Self {
        Self { k, items: Vec::with_capacity(k.min(64) + 1), truncated: false }
    }

    pub fn insert(&mut self, cand: PairCand) {
        match self.items.binary_search_by_key(&cand_key(&cand), cand_key) {
            Ok(_) => return, // 同一落点已收录
            Err(pos) => self.items.insert(pos, cand),
        }
        if self.items.len() > self.k {
            let dropped = self.items.pop();
            if let (Some(dropped), Some(kept)) = (dropped, self.items.last()) {
                if dropped.mismatch == kept.mismatch {
                    self.truncated = true;
                }
            }
        }
    }

    /// 列表填满后用于校验剪枝的界：第 k 名的错配数。
    pub fn prune_bound(&self, max_mismatches: u32) -> u32 {
        if self.items.len() == self.k {
            self.items[self.items.len() - 1].mismatch
        } else {
            max_mismatches
        }
    }

    pub fn items(&self) -> &[PairCand] {
        &self.items
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// 在一份镜像上收集一条 read 的 top-k 候选（正反两链）。
pub fn collect_candidates(
    index: &DbIndex,
    seq: &[u8],
    conversion: Conversion,
    opt: &MapOpt,
) -> TopKList {
    let mut list = TopKList::new(opt.top_k);
    let norm = normalize_seq(seq);
    if norm.len() < SEED_SPAN {
        return list;
    }
    let rc = revcomp(&norm);
    for (converted, strand) in [
        (conversion.convert(&norm), Strand::Forward),
        (conversion.convert(&rc), Strand::Reverse),
    ] {
        scan_topk(index, conversion, &converted, strand, opt, &mut list);
    }
    list
}

fn scan_topk(
    index: &DbIndex,
    conversion: Conversion,
    read: &[u8],
    strand: Strand,
    opt: &MapOpt,
    list: &mut TopKList,
) {
    let (image, positions) = index.image(conversion);
    let read_len = read.len();

    for seed_i in 0..SEED_OFFSETS {
        if seed_i + SEED_SPAN > read_len {
            break;
        }
        let suffix = &read[seed_i..];
        let bucket = positions.bucket(seed_hash(suffix));
        let Some((low, high)) = refine_region(suffix, image, positions, bucket) else {
            continue;
        };
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

            let bound = list.prune_bound(opt.max_mismatches);
            let count = hamming_bounded(read, chrom, start as usize, bound);
            if count > bound || count > opt.max_mismatches {
                continue;
            }
            list.insert(PairCand { chrom_id, chrom_pos: start, strand, mismatch: count });
        }
    }
}

/// 一对 mate 的最优配对记录。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BestPair {
    pub chrom_id: u32,
    pub pos1: u32,
    pub strand1: Strand,
    pub mismatch1: u32,
    pub pos2: u32,
    pub strand2: Strand,
    pub mismatch2: u32,
    pub frag_len: u32,
    pub times: u32,
    /// 任一 mate 的候选列表发生过截断时为真，配对多义可能被低估。
    pub truncated: bool,
}

impl BestPair {
    pub fn classify(&self) -> MapClass {
        match self.times {
            0 => MapClass::Unmapped,
            1 => MapClass::Unique,
            _ => MapClass::Ambiguous,
        }
    }
}

/// 枚举两张候选列表的同染色体组合，片段长度（两端最外侧端点的
/// 距离）不超过 `frag_range` 者参与评分；错配数之和最小者胜出，
/// `times` 统计并列在最小值上的不同组合数。
pub fn resolve_pair(
    list1: &TopKList,
    list2: &TopKList,
    len1: u32,
    len2: u32,
    opt: &MapOpt,
) -> BestPair {
    let mut best = BestPair {
        chrom_id: 0,
        pos1: 0,
        strand1: Strand::Forward,
        mismatch1: 0,
        pos2: 0,
        strand2: Strand::Forward,
        mismatch2: 0,
        frag_len: 0,
        times: 0,
        truncated: list1.is_truncated() || list2.is_truncated(),
    };
    let mut best_sum = u32::MAX;

    for a in list1.items() {
        for b in list2.items() {
            if a.chrom_id != b.chrom_id {
                continue;
            }
            let start = a.chrom_pos.min(b.chrom_pos);
            let end = (a.chrom_pos + len1).max(b.chrom_pos + len2);
            let frag = end - start;
            if frag > opt.frag_range {
                continue;
            }

            let sum = a.mismatch + b.mismatch;
            if sum < best_sum {
                best_sum = sum;
                best.chrom_id = a.chrom_id;
                best.pos1 = a.chrom_pos;
                best.strand1 = a.strand;
                best.mismatch1 = a.mismatch;
                best.pos2 = b.chrom_pos;
                best.strand2 = b.strand;
                best.mismatch2 = b.mismatch;
                best.frag_len = frag;
                best.times = 1;
            } else if sum == best_sum {
                // 候选列表内部无重复，组合必然互不相同
                best.times += 1;
            }
        }
    }
    best
}

/// 双端比对入口：mate 1 对 C→T 镜像，mate 2 对 G→A 镜像。
pub fn map_pair(index: &DbIndex, seq1: &[u8], seq2: &[u8], opt: &MapOpt) -> BestPair {
    let list1 = collect_candidates(index, seq1, Conversion::CtoT, opt);
    let list2 = collect_candidates(index, seq2, Conversion::GtoA, opt);
    resolve_pair(&list1, &list2, seq1.len() as u32, seq2.len() as u32, opt)
}
