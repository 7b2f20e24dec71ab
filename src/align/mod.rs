//! 批处理比对管线。
//!
//! 输入按批读取（每批最多 `n_reads_to_process` 条，上限五百万），
//! 可选地裁剪接头序列，随后交给 rayon 线程池并行比对；
//! `par_iter().map().collect()` 保证结果向量与输入同序，主线程
//! 按原始顺序写出。基因组镜像与位置索引在整个过程中只读共享，
//! 工作线程之间没有任何可变共享状态。

pub mod paired;
pub mod seed;
pub mod single;

use anyhow::{anyhow, bail, Result};
use rayon::prelude::*;
use std::fs::File;
use std::io::BufReader;

use crate::index::db::DbIndex;
use crate::io::fastq::FastqReader;
use crate::io::output::OutputSink;

pub use paired::{map_pair, BestPair, TopKList};
pub use single::{map_read, BestMatch, MapClass};

/// 每批 read 数量的硬上限。
pub const MAX_READS_PER_BATCH: usize = 5_000_000;

/// 接头裁剪要求的最短重叠碱基数。
const MIN_ADAPTOR_OVERLAP: usize = 8;

/// 比对参数。字段含义见各解析器；默认值与命令行默认一致。
#[derive(Debug, Clone)]
pub struct MapOpt {
    pub max_mismatches: u32,
    pub n_reads_to_process: usize,
    pub bucket_cap: usize,
    pub top_k: usize,
    pub frag_range: u32,
    pub threads: usize,
    pub ag_wildcard: bool,
    pub adaptor: Option<Vec<u8>>,
    pub report_ambiguous: bool,
    pub report_unmapped: bool,
}

impl Default for MapOpt {
    fn default() -> Self {
        Self {
            max_mismatches: 6,
            n_reads_to_process: 1_000_000,
            bucket_cap: 5000,
            top_k: 50,
            frag_range: 1000,
            threads: 1,
            ag_wildcard: false,
            adaptor: None,
            report_ambiguous: false,
            report_unmapped: false,
        }
    }
}

/// 单个输入文件的比对统计。
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MapStats {
    pub total: u64,
    pub unique: u64,
    pub ambiguous: u64,
    pub unmapped: u64,
}

impl MapStats {
    fn record(&mut self, class: MapClass) {
        self.total += 1;
        match class {
            MapClass::Unique => self.unique += 1,
            MapClass::Ambiguous => self.ambiguous += 1,
            MapClass::Unmapped => self.unmapped += 1,
        }
    }
}

/// 从 read 尾部裁掉接头：取最左的起点，使余下后缀与接头前缀的
/// 重叠不少于 `MIN_ADAPTOR_OVERLAP` 且错配率不超过 1/8。
/// 质量串同步截断。接头序列应为大写。
pub fn clip_adaptor(seq: &mut Vec<u8>, qual: &mut Vec<u8>, adaptor: &[u8]) {
    if adaptor.len() < MIN_ADAPTOR_OVERLAP || seq.len() < MIN_ADAPTOR_OVERLAP {
        return;
    }
    let limit = seq.len() - MIN_ADAPTOR_OVERLAP;
    for i in 0..=limit {
        let olen = adaptor.len().min(seq.len() - i);
        let mut mismatches = 0usize;
        for j in 0..olen {
            if seq[i + j].to_ascii_uppercase() != adaptor[j] {
                mismatches += 1;
            }
        }
        if mismatches * 8 <= olen {
            seq.truncate(i);
            qual.truncate(i);
            return;
        }
    }
}

fn build_pool(threads: usize) -> Result<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| anyhow!("cannot build thread pool with {} threads: {}", threads, e))
}

fn batch_size(opt: &MapOpt) -> usize {
    opt.n_reads_to_process.clamp(1, MAX_READS_PER_BATCH)
}

/// 单端管线：FASTQ → 批 → 并行比对 → 按输入顺序写出。
pub fn process_single_end(
    index: &DbIndex,
    reads_path: &str,
    out_path: &str,
    opt: &MapOpt,
) -> Result<MapStats> {
    let file = File::open(reads_path)
        .map_err(|e| anyhow!("cannot open reads file '{}': {}", reads_path, e))?;
    let mut reader = FastqReader::new(BufReader::new(file));
    let mut sink =
        OutputSink::create(out_path, &index.chroms, opt.report_ambiguous, opt.report_unmapped)?;
    let pool = build_pool(opt.threads)?;
    let n = batch_size(opt);

    let mut stats = MapStats::default();
    loop {
        let mut batch = reader.read_batch(n)?;
        if batch.is_empty() {
            break;
        }
        if let Some(adaptor) = &opt.adaptor {
            for rec in &mut batch {
                clip_adaptor(&mut rec.seq, &mut rec.qual, adaptor);
            }
        }

        let results: Vec<BestMatch> =
            pool.install(|| batch.par_iter().map(|rec| map_read(index, &rec.seq, opt)).collect());

        for (rec, best) in batch.iter().zip(results.iter()) {
            let class = best.classify(opt.max_mismatches);
            stats.record(class);
            sink.write_single(rec, best, class)?;
        }
        log::info!("{}: processed {} reads", reads_path, stats.total);
    }
    sink.finish()?;

    log::info!(
        "{}: {} unique, {} ambiguous, {} unmapped of {} reads",
        reads_path,
        stats.unique,
        stats.ambiguous,
        stats.unmapped,
        stats.total
    );
    Ok(stats)
}

/// 双端管线：两个 FASTQ 并行读批，批内配对比对。
/// 两个文件的记录数必须一致。
pub fn process_paired_end(
    index: &DbIndex,
    reads1_path: &str,
    reads2_path: &str,
    out_path: &str,
    opt: &MapOpt,
) -> Result<MapStats> {
    let f1 = File::open(reads1_path)
        .map_err(|e| anyhow!("cannot open reads file '{}': {}", reads1_path, e))?;
    let f2 = File::open(reads2_path)
        .map_err(|e| anyhow!("cannot open reads file '{}': {}", reads2_path, e))?;
    let mut reader1 = FastqReader::new(BufReader::new(f1));
    let mut reader2 = FastqReader::new(BufReader::new(f2));
    let mut sink =
        OutputSink::create(out_path, &index.chroms, opt.report_ambiguous, opt.report_unmapped)?;
    let pool = build_pool(opt.threads)?;
    let n = batch_size(opt);

    let mut stats = MapStats::default();
    loop {
        let mut batch1 = reader1.read_batch(n)?;
        let mut batch2 = reader2.read_batch(n)?;
        if batch1.len() != batch2.len() {
            bail!(
                "mate files '{}' and '{}' contain different numbers of records",
                reads1_path,
                reads2_path
            );
        }
        if batch1.is_empty() {
            break;
        }
        if let Some(adaptor) = &opt.adaptor {
            for rec in batch1.iter_mut().chain(batch2.iter_mut()) {
                clip_adaptor(&mut rec.seq, &mut rec.qual, adaptor);
            }
        }

        let results: Vec<BestPair> = pool.install(|| {
            batch1
                .par_iter()
                .zip(batch2.par_iter())
                .map(|(r1, r2)| map_pair(index, &r1.seq, &r2.seq, opt))
                .collect()
        });

        for ((rec1, rec2), pair) in batch1.iter().zip(batch2.iter()).zip(results.iter()) {
            let class = pair.classify();
            stats.record(class);
            if pair.truncated {
                log::debug!("pair '{}': top-k candidate list truncated", rec1.name);
            }
            sink.write_pair(rec1, rec2, pair, class)?;
        }
        log::info!("{}: processed {} read pairs", reads1_path, stats.total);
    }
    sink.finish()?;

    log::info!(
        "{} + {}: {} unique, {} ambiguous, {} unmapped of {} pairs",
        reads1_path,
        reads2_path,
        stats.unique,
        stats.ambiguous,
        stats.unmapped,
        stats.total
    );
    Ok(stats)
}
