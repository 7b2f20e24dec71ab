//! 比对结果输出：SAM（默认）与 MR（`.mr` 后缀）两种格式，
//! 以及可选的多义 / 未比对旁路输出。
//!
//! 多义 read 写入 `<output>_amb`（记录一个代表落点），未比对
//! read 以 FASTQ 原样写入 `<output>_unmapped`；两者都需要显式
//! 开启。输出不含时间戳，同一输入两次运行产生逐字节相同的文件。

use anyhow::{anyhow, Result};
use std::fs::File;
use std::io::{BufWriter, Write};

use crate::align::paired::BestPair;
use crate::align::single::{BestMatch, MapClass};
use crate::index::genome::ChromInfo;
use crate::io::fastq::FastqRecord;
use crate::util::dna::{revcomp, Strand};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Sam,
    Mr,
}

/// 输出格式由用户给定的输出路径后缀决定。
pub fn detect_format(path: &str) -> OutputFormat {
    if path.ends_with(".mr") {
        OutputFormat::Mr
    } else {
        OutputFormat::Sam
    }
}

/// 唯一比对记录的 MAPQ；多义代表写 0。
const UNIQUE_MAPQ: u32 = 50;

pub struct OutputSink {
    format: OutputFormat,
    chroms: Vec<ChromInfo>,
    out: BufWriter<File>,
    amb: Option<BufWriter<File>>,
    unmapped: Option<BufWriter<File>>,
}

impl OutputSink {
    pub fn create(
        path: &str,
        chroms: &[ChromInfo],
        with_ambiguous: bool,
        with_unmapped: bool,
    ) -> Result<Self> {
        let format = detect_format(path);
        let mut out = BufWriter::new(
            File::create(path).map_err(|e| anyhow!("cannot create output '{}': {}", path, e))?,
        );
        if format == OutputFormat::Sam {
            write_sam_header(&mut out, chroms)?;
        }

        let amb = if with_ambiguous {
            let amb_path = format!("{}_amb", path);
            let mut w = BufWriter::new(
                File::create(&amb_path)
                    .map_err(|e| anyhow!("cannot create output '{}': {}", amb_path, e))?,
            );
            if format == OutputFormat::Sam {
                write_sam_header(&mut w, chroms)?;
            }
            Some(w)
        } else {
            None
        };

        let unmapped = if with_unmapped {
            let un_path = format!("{}_unmapped", path);
            let w = BufWriter::new(
                File::create(&un_path)
                    .map_err(|e| anyhow!("cannot create output '{}': {}", un_path, e))?,
            );
            Some(w)
        } else {
            None
        };

        Ok(Self { format, chroms: chroms.to_vec(), out, amb, unmapped })
    }

    pub fn write_single(
        &mut self,
        rec: &FastqRecord,
        best: &BestMatch,
        class: MapClass,
    ) -> Result<()> {
        match class {
            MapClass::Unique => {
                write_single_record(&mut self.out, self.format, &self.chroms, rec, best, UNIQUE_MAPQ)
            }
            MapClass::Ambiguous => match &mut self.amb {
                Some(w) => write_single_record(w, self.format, &self.chroms, rec, best, 0),
                None => Ok(()),
            },
            MapClass::Unmapped => match &mut self.unmapped {
                Some(w) => write_fastq(w, rec),
                None => Ok(()),
            },
        }
    }

    pub fn write_pair(
        &mut self,
        rec1: &FastqRecord,
        rec2: &FastqRecord,
        pair: &BestPair,
        class: MapClass,
    ) -> Result<()> {
        match class {
            MapClass::Unique => {
                write_pair_records(&mut self.out, self.format, &self.chroms, rec1, rec2, pair, UNIQUE_MAPQ)
            }
            MapClass::Ambiguous => match &mut self.amb {
                Some(w) => write_pair_records(w, self.format, &self.chroms, rec1, rec2, pair, 0),
                None => Ok(()),
            },
            MapClass::Unmapped => match &mut self.unmapped {
                Some(w) => {
                    write_fastq(w, rec1)?;
                    write_fastq(w, rec2)
                }
                None => Ok(()),
            },
        }
    }

    pub fn finish(&mut self) -> Result<()> {
        self.out.flush()?;
        if let Some(w) = &mut self.amb {
            w.flush()?;
        }
        if let Some(w) = &mut self.unmapped {
            w.flush()?;
        }
        Ok(())
    }
}

fn write_sam_header(w: &mut impl Write, chroms: &[ChromInfo]) -> Result<()> {
    writeln!(w, "@HD\tVN:1.6\tSO:unsorted")?;
    for c in chroms {
        writeln!(w, "@SQ\tSN:{}\tLN:{}", c.name, c.length)?;
    }
    writeln!(w, "@PG\tID:walt-rust\tPN:walt-rust\tVN:{}", env!("CARGO_PKG_VERSION"))?;
    Ok(())
}

/// SAM 约定：反向链记录的 SEQ/QUAL 按正链方向书写。
fn oriented(rec: &FastqRecord, strand: Strand) -> (Vec<u8>, Vec<u8>) {
    match strand {
        Strand::Forward => (rec.seq.clone(), rec.qual.clone()),
        Strand::Reverse => {
            let seq = revcomp(&rec.seq);
            let qual: Vec<u8> = rec.qual.iter().rev().copied().collect();
            (seq, qual)
        }
    }
}

fn write_single_record(
    w: &mut impl Write,
    format: OutputFormat,
    chroms: &[ChromInfo],
    rec: &FastqRecord,
    best: &BestMatch,
    mapq: u32,
) -> Result<()> {
    let chrom = &chroms[best.chrom_id as usize].name;
    match format {
        OutputFormat::Sam => {
            let flag = if best.strand == Strand::Reverse { 0x10 } else { 0 };
            let (seq, qual) = oriented(rec, best.strand);
            writeln!(
                w,
                "{}\t{}\t{}\t{}\t{}\t{}M\t*\t0\t0\t{}\t{}\tNM:i:{}",
                rec.name,
                flag,
                chrom,
                best.chrom_pos + 1,
                mapq,
                rec.seq.len(),
                String::from_utf8_lossy(&seq),
                String::from_utf8_lossy(&qual),
                best.mismatch,
            )?;
        }
        OutputFormat::Mr => {
            writeln!(
                w,
                "{}\t{}\t{}\t{}\t{}\t{}\t{}",
                chrom,
                best.chrom_pos,
                best.chrom_pos as u64 + rec.seq.len() as u64,
                rec.name,
                best.mismatch,
                best.strand.symbol(),
                String::from_utf8_lossy(&rec.seq),
            )?;
        }
    }
    Ok(())
}

fn write_pair_records(
    w: &mut impl Write,
    format: OutputFormat,
    chroms: &[ChromInfo],
    rec1: &FastqRecord,
    rec2: &FastqRecord,
    pair: &BestPair,
    mapq: u32,
) -> Result<()> {
    let chrom = &chroms[pair.chrom_id as usize].name;
    match format {
        OutputFormat::Sam => {
            let mut flag1 = 0x1 | 0x2 | 0x40;
            let mut flag2 = 0x1 | 0x2 | 0x80;
            if pair.strand1 == Strand::Reverse {
                flag1 |= 0x10;
                flag2 |= 0x20;
            }
            if pair.strand2 == Strand::Reverse {
                flag2 |= 0x10;
                flag1 |= 0x20;
            }
            let tlen = pair.frag_len as i64;
            let (tlen1, tlen2) =
                if pair.pos1 <= pair.pos2 { (tlen, -tlen) } else { (-tlen, tlen) };

            let (seq1, qual1) = oriented(rec1, pair.strand1);
            writeln!(
                w,
                "{}\t{}\t{}\t{}\t{}\t{}M\t=\t{}\t{}\t{}\t{}\tNM:i:{}",
                rec1.name,
                flag1,
                chrom,
                pair.pos1 + 1,
                mapq,
                rec1.seq.len(),
                pair.pos2 + 1,
                tlen1,
                String::from_utf8_lossy(&seq1),
                String::from_utf8_lossy(&qual1),
                pair.mismatch1,
            )?;
            let (seq2, qual2) = oriented(rec2, pair.strand2);
            writeln!(
                w,
                "{}\t{}\t{}\t{}\t{}\t{}M\t=\t{}\t{}\t{}\t{}\tNM:i:{}",
                rec2.name,
                flag2,
                chrom,
                pair.pos2 + 1,
                mapq,
                rec2.seq.len(),
                pair.pos1 + 1,
                tlen2,
                String::from_utf8_lossy(&seq2),
                String::from_utf8_lossy(&qual2),
                pair.mismatch2,
            )?;
        }
        OutputFormat::Mr => {
            for (rec, pos, strand, mismatch, mate) in [
                (rec1, pair.pos1, pair.strand1, pair.mismatch1, "/1"),
                (rec2, pair.pos2, pair.strand2, pair.mismatch2, "/2"),
            ] {
                writeln!(
                    w,
                    "{}\t{}\t{}\t{}{}\t{}\t{}\t{}",
                    chrom,
                    pos,
                    pos as u64 + rec.seq.len() as u64,
                    rec.name,
                    mate,
                    mismatch,
                    strand.symbol(),
                    String::from_utf8_lossy(&rec.seq),
                )?;
            }
        }
    }
    Ok(())
}

fn write_fastq(w: &mut impl Write, rec: &FastqRecord) -> Result<()> {
    writeln!(
        w,
        "@{}\n{}\n+\n{}",
        rec.name,
        String::from_utf8_lossy(&rec.seq),
        String::from_utf8_lossy(&rec.qual),
    )?;
    Ok(())
}
