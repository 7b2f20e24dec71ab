//! 位置索引与 `.dbindex` 磁盘格式。
//!
//! 每份基因组镜像对应一张位置索引：
//! - 桶表 `bucket_starts`：`4^HASH_BASES + 1` 项，第 `h` 个桶覆盖全局
//!   位置数组的 `[bucket_starts[h], bucket_starts[h+1])` 区间；
//! - 位置数组按列存放（chrom_id 列 + chrom_offset 列），桶内按鉴别位
//!   处的参考碱基排序，碱基完全相同时按 (chrom_id, offset) 定序，
//!   保证桶内顺序确定。
//!
//! 只收录种子窗口完整落在染色体内的位置，因此比对端访问
//! `offset + SEED_POSITIONS[p]` 不需要边界检查。

use std::cmp::Ordering;

use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};

use crate::index::genome::{ChromInfo, GenomeImage};
use crate::index::hash::{
    seed_hash, BUCKET_COUNT, HASH_BASES, SEED_COMPARE_LEN, SEED_POSITIONS, SEED_SPAN,
};
use crate::util::dna::{normalize_seq, Conversion};

const DB_MAGIC: u64 = 0x5741_4C54_5F44_4258; // "WALT_DBX"
const DB_VERSION: u32 = 1;

/// 索引头中记录的种子几何，加载时与编译期常量核对。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedParams {
    pub span: u32,
    pub hash_bases: u32,
    pub compare_len: u32,
    pub positions: Vec<u32>,
}

impl SeedParams {
    pub fn current() -> Self {
        Self {
            span: SEED_SPAN as u32,
            hash_bases: HASH_BASES as u32,
            compare_len: SEED_COMPARE_LEN as u32,
            positions: SEED_POSITIONS.iter().map(|&p| p as u32).collect(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexMeta {
    pub reference_file: Option<String>,
    pub build_args: Option<String>,
    pub build_timestamp: Option<String>,
}

/// 一份镜像的位置索引（CSR 桶表 + SoA 位置列）。
#[derive(Debug, Serialize, Deserialize)]
pub struct PositionIndex {
    pub bucket_starts: Vec<u32>,
    pub chrom_ids: Vec<u32>,
    pub chrom_offsets: Vec<u32>,
}

impl PositionIndex {
    /// 返回哈希值对应桶的全局区间 `[start, end)`。
    #[inline]
    pub fn bucket(&self, hash: u32) -> (u32, u32) {
        let h = hash as usize;
        (self.bucket_starts[h], self.bucket_starts[h + 1])
    }

    pub fn len(&self) -> usize {
        self.chrom_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chrom_ids.is_empty()
    }

    /// 对一份镜像建索引：计数、前缀和、回填，再按鉴别位排序每个桶。
    pub fn build(image: &GenomeImage) -> Result<Self> {
        let mut starts = vec![0u32; BUCKET_COUNT + 1];
        let mut total: u64 = 0;
        for seq in &image.chroms {
            if seq.len() < SEED_SPAN {
                continue;
            }
            for p in 0..=(seq.len() - SEED_SPAN) {
                starts[seed_hash(&seq[p..]) as usize + 1] += 1;
                total += 1;
            }
        }
        if total > u32::MAX as u64 {
            bail!("reference too large: {} seed positions exceed u32 range", total);
        }
        for h in 1..starts.len() {
            starts[h] += starts[h - 1];
        }

        let mut entries: Vec<(u32, u32)> = vec![(0, 0); total as usize];
        let mut cursor = starts.clone();
        for (cid, seq) in image.chroms.iter().enumerate() {
            if seq.len() < SEED_SPAN {
                continue;
            }
            for p in 0..=(seq.len() - SEED_SPAN) {
                let h = seed_hash(&seq[p..]) as usize;
                entries[cursor[h] as usize] = (cid as u32, p as u32);
                cursor[h] += 1;
            }
        }

        for h in 0..BUCKET_COUNT {
            let s = starts[h] as usize;
            let e = starts[h + 1] as usize;
            if e - s > 1 {
                entries[s..e].sort_unstable_by(|a, b| cmp_discriminators(image, *a, *b));
            }
        }

        let mut chrom_ids = Vec::with_capacity(entries.len());
        let mut chrom_offsets = Vec::with_capacity(entries.len());
        for (cid, off) in entries {
            chrom_ids.push(cid);
            chrom_offsets.push(off);
        }
        Ok(Self { bucket_starts: starts, chrom_ids, chrom_offsets })
    }
}

/// 桶内排序比较器：依次比较各鉴别位处的镜像碱基，
/// 全部相同再按 (chrom_id, offset) 定序。
fn cmp_discriminators(image: &GenomeImage, a: (u32, u32), b: (u32, u32)) -> Ordering {
    let sa = image.chrom(a.0);
    let sb = image.chrom(b.0);
    for p in HASH_BASES..SEED_COMPARE_LEN {
        let off = SEED_POSITIONS[p];
        let ca = sa[a.1 as usize + off];
        let cb = sb[b.1 as usize + off];
        match ca.cmp(&cb) {
            Ordering::Equal => {}
            other => return other,
        }
    }
    (a.0, a.1).cmp(&(b.0, b.1))
}

/// 完整的 `.dbindex` 内容：两份镜像与两张位置索引。
#[derive(Debug, Serialize, Deserialize)]
pub struct DbIndex {
    pub magic: u64,
    pub version: u32,
    pub seed: SeedParams,
    pub chroms: Vec<ChromInfo>,
    pub ct_image: GenomeImage,
    pub ga_image: GenomeImage,
    pub ct_positions: PositionIndex,
    pub ga_positions: PositionIndex,
    pub meta: IndexMeta,
}

impl DbIndex {
    /// 从 (名称, 原始序列) 列表建库。序列在此处规范化为 ACGTN。
    pub fn build(records: Vec<(String, Vec<u8>)>) -> Result<Self> {
        if records.is_empty() {
            bail!("reference contains no sequences");
        }
        let mut chroms = Vec::with_capacity(records.len());
        let mut normalized = Vec::with_capacity(records.len());
        for (name, seq) in records {
            if seq.len() > u32::MAX as usize {
                bail!("chromosome '{}' longer than u32 range", name);
            }
            chroms.push(ChromInfo { name, length: seq.len() as u32 });
            normalized.push(normalize_seq(&seq));
        }
        if chroms.iter().all(|c| c.length == 0) {
            bail!("reference contains only empty sequences");
        }

        let ct_image = GenomeImage::build(Conversion::CtoT, &normalized);
        let ga_image = GenomeImage::build(Conversion::GtoA, &normalized);
        let ct_positions = PositionIndex::build(&ct_image)?;
        let ga_positions = PositionIndex::build(&ga_image)?;

        Ok(Self {
            magic: DB_MAGIC,
            version: DB_VERSION,
            seed: SeedParams::current(),
            chroms,
            ct_image,
            ga_image,
            ct_positions,
            ga_positions,
            meta: IndexMeta::default(),
        })
    }

    pub fn set_meta(&mut self, meta: IndexMeta) {
        self.meta = meta;
    }

    /// 按转换方向取镜像与对应的位置索引。
    #[inline]
    pub fn image(&self, conversion: Conversion) -> (&GenomeImage, &PositionIndex) {
        match conversion {
            Conversion::CtoT => (&self.ct_image, &self.ct_positions),
            Conversion::GtoA => (&self.ga_image, &self.ga_positions),
        }
    }

    #[inline]
    pub fn chrom_len(&self, chrom_id: u32) -> u32 {
        self.chroms[chrom_id as usize].length
    }

    pub fn total_genome_len(&self) -> u64 {
        self.chroms.iter().map(|c| c.length as u64).sum()
    }

    pub fn save_to_file(&self, path: &str) -> Result<()> {
        let mut f = std::fs::File::create(path)
            .map_err(|e| anyhow!("cannot create index file '{}': {}", path, e))?;
        bincode::serialize_into(&mut f, self)
            .map_err(|e| anyhow!("cannot write index to '{}': {}", path, e))?;
        Ok(())
    }

    pub fn load_from_file(path: &str) -> Result<Self> {
        let f = std::fs::File::open(path)
            .map_err(|e| anyhow!("cannot open index file '{}': {}", path, e))?;
        let idx: Self = bincode::deserialize_from(std::io::BufReader::new(f))
            .map_err(|e| anyhow!("cannot read index file '{}': {}", path, e))?;
        if idx.magic != DB_MAGIC {
            return Err(anyhow!(
                "invalid index file: bad magic number (expected 0x{:016X}, got 0x{:016X})",
                DB_MAGIC,
                idx.magic
            ));
        }
        if idx.version != DB_VERSION {
            return Err(anyhow!(
                "unsupported index version: expected {}, got {}",
                DB_VERSION,
                idx.version
            ));
        }
        if idx.seed != SeedParams::current() {
            return Err(anyhow!(
                "index seed geometry does not match this build (index span {}, expected {})",
                idx.seed.span,
                SEED_SPAN
            ));
        }
        Ok(idx)
    }
}
