use anyhow::{anyhow, bail, Result};
use clap::{ArgAction, Parser, Subcommand};

mod align;
mod index;
mod io;
mod util;

use crate::align::{MapOpt, MAX_READS_PER_BATCH};
use crate::index::db::{DbIndex, IndexMeta};

#[derive(Parser, Debug)]
#[command(
    name = "walt-rust",
    author,
    version,
    about = "map Illumina BS-seq reads",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Increase log verbosity (-v for debug)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build a '.dbindex' file from a reference FASTA
    Index {
        /// Reference FASTA file
        reference: String,
        /// Output index path (the suffix should be '.dbindex')
        #[arg(short, long)]
        output: String,
    },
    /// Map single-end or paired-end BS-seq reads
    Map {
        /// Index file created by the index command (the suffix should be '.dbindex')
        #[arg(short = 'i', long)]
        index: String,
        /// Comma-separated read files for single-end mapping ('.fastq' or '.fq')
        #[arg(short = 'r', long)]
        reads: Option<String>,
        /// Comma-separated read files for mate 1 ('.fastq' or '.fq')
        #[arg(short = '1', long = "reads1")]
        reads1: Option<String>,
        /// Comma-separated read files for mate 2 ('.fastq' or '.fq')
        #[arg(short = '2', long = "reads2")]
        reads2: Option<String>,
        /// Output file name (a '.mr' suffix selects MR format)
        #[arg(short = 'o', long)]
        output: String,
        /// Maximum allowed mismatches
        #[arg(short = 'm', long = "mismatch", default_value_t = 6)]
        mismatch: u32,
        /// Number of reads to map in one loop
        #[arg(short = 'N', long = "number", default_value_t = 1_000_000)]
        number: usize,
        /// Maximum candidates for a seed
        #[arg(short = 'b', long = "bucket", default_value_t = 5000)]
        bucket: usize,
        /// Maximum allowed mappings per mate (paired-end)
        #[arg(short = 'k', long = "topk", default_value_t = 50)]
        topk: usize,
        /// Maximum fragment length (paired-end)
        #[arg(short = 'L', long = "fraglen", default_value_t = 1000)]
        fraglen: u32,
        /// Number of threads for mapping
        #[arg(short = 't', long = "thread", default_value_t = 1)]
        thread: usize,
        /// Map using A/G bisulfite wildcards (single-end)
        #[arg(short = 'A', long = "ag-wild")]
        ag_wild: bool,
        /// Clip the given adaptor sequence
        #[arg(short = 'C', long = "clip")]
        clip: Option<String>,
        /// Write ambiguously mapped reads to '<output>_amb'
        #[arg(short = 'a', long = "ambiguous")]
        ambiguous: bool,
        /// Write unmapped reads to '<output>_unmapped'
        #[arg(short = 'u', long = "unmapped")]
        unmapped: bool,
    },
}

/// Initializes the logger with verbosity given in `log_max_level`.
fn init_log(log_max_level: usize) {
    stderrlog::new()
        .module(module_path!())
        .quiet(false)
        .verbosity(log_max_level)
        .timestamp(stderrlog::Timestamp::Off)
        .init()
        .ok();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_log(2 + cli.verbose as usize);

    match cli.command {
        Commands::Index { reference, output } => run_index(&reference, &output),
        Commands::Map {
            index,
            reads,
            reads1,
            reads2,
            output,
            mismatch,
            number,
            bucket,
            topk,
            fraglen,
            thread,
            ag_wild,
            clip,
            ambiguous,
            unmapped,
        } => {
            let mut opt = MapOpt {
                max_mismatches: mismatch,
                n_reads_to_process: number,
                bucket_cap: bucket,
                top_k: topk,
                frag_range: fraglen,
                threads: thread,
                ag_wildcard: ag_wild,
                adaptor: clip.map(|s| s.to_ascii_uppercase().into_bytes()),
                report_ambiguous: ambiguous,
                report_unmapped: unmapped,
            };
            if opt.n_reads_to_process > MAX_READS_PER_BATCH {
                log::warn!(
                    "-N {} exceeds the {} cap, clamping",
                    opt.n_reads_to_process,
                    MAX_READS_PER_BATCH
                );
                opt.n_reads_to_process = MAX_READS_PER_BATCH;
            }
            run_map(&index, reads.as_deref(), reads1.as_deref(), reads2.as_deref(), &output, opt)
        }
    }
}

fn run_index(reference: &str, output: &str) -> Result<()> {
    if !io::is_valid_index_path(output) {
        bail!("the suffix of the index file should be '.dbindex'");
    }

    let fh = std::fs::File::open(reference)
        .map_err(|e| anyhow!("cannot open reference FASTA '{}': {}", reference, e))?;
    let mut reader = io::fasta::FastaReader::new(std::io::BufReader::new(fh));
    let records = reader.read_all()?;

    let n_seqs = records.len();
    let total_len: u64 = records.iter().map(|(_, s)| s.len() as u64).sum();
    log::info!("{}: {} sequences, {} bases", reference, n_seqs, total_len);

    let mut db = DbIndex::build(records)?;
    db.set_meta(IndexMeta {
        reference_file: Some(reference.to_string()),
        build_args: Some(std::env::args().collect::<Vec<_>>().join(" ")),
        build_timestamp: Some(chrono::Utc::now().to_rfc3339()),
    });
    db.save_to_file(output)?;
    log::info!("index saved: {}", output);
    Ok(())
}

/// Reads input for one mapping run: a list of single-end files, or two
/// parallel lists of mate files.
enum ReadsInput {
    Single(Vec<String>),
    Paired(Vec<String>, Vec<String>),
}

fn parse_reads_input(
    reads: Option<&str>,
    reads1: Option<&str>,
    reads2: Option<&str>,
) -> Result<ReadsInput> {
    match (reads, reads1, reads2) {
        (Some(r), None, None) => {
            let files = io::split_file_list(r);
            if files.is_empty() {
                bail!("no read files given");
            }
            Ok(ReadsInput::Single(files))
        }
        (None, Some(r1), Some(r2)) => {
            let files1 = io::split_file_list(r1);
            let files2 = io::split_file_list(r2);
            if files1.is_empty() || files2.is_empty() {
                bail!("no read files given");
            }
            if files1.len() != files2.len() {
                bail!(
                    "for paired-end mapping, mate 1 and mate 2 should have the same \
                     number of files, and the paired files should be in the same order"
                );
            }
            Ok(ReadsInput::Paired(files1, files2))
        }
        _ => bail!(
            "please use the -r option to set single-end reads, \
             or the -1 and -2 options to set paired-end reads"
        ),
    }
}

fn check_reads_suffixes(files: &[String]) -> Result<()> {
    for f in files {
        if !io::is_valid_reads_path(f) {
            bail!("the suffix of the reads file should be '.fastq' or '.fq': {}", f);
        }
    }
    Ok(())
}

/// 多输入时每个输入各取一个输出名：单端加 `_s<i>`，双端加 `_p<i>`。
fn per_input_outputs(output: &str, n: usize, paired: bool) -> Vec<String> {
    if n == 1 {
        vec![output.to_string()]
    } else {
        let tag = if paired { "p" } else { "s" };
        (0..n).map(|i| format!("{}_{}{}", output, tag, i)).collect()
    }
}

fn run_map(
    index_path: &str,
    reads: Option<&str>,
    reads1: Option<&str>,
    reads2: Option<&str>,
    output: &str,
    opt: MapOpt,
) -> Result<()> {
    if !io::is_valid_index_path(index_path) {
        bail!("the suffix of the index file should be '.dbindex'");
    }
    let input = parse_reads_input(reads, reads1, reads2)?;

    log::info!("maximum number of mismatches: {}", opt.max_mismatches);
    log::info!("number of threads for mapping: {}", opt.threads);

    match input {
        ReadsInput::Single(files) => {
            check_reads_suffixes(&files)?;
            let db = load_index(index_path)?;
            let outputs = per_input_outputs(output, files.len(), false);
            for (reads_file, out_file) in files.iter().zip(outputs.iter()) {
                align::process_single_end(&db, reads_file, out_file, &opt)?;
            }
        }
        ReadsInput::Paired(files1, files2) => {
            check_reads_suffixes(&files1)?;
            check_reads_suffixes(&files2)?;
            if opt.top_k < 2 {
                bail!("-k option should be at least 2 for paired-end reads");
            }
            if opt.top_k > 300 {
                bail!("-k option should be less than 300 for paired-end reads");
            }
            let db = load_index(index_path)?;
            let outputs = per_input_outputs(output, files1.len(), true);
            for ((f1, f2), out_file) in files1.iter().zip(files2.iter()).zip(outputs.iter()) {
                align::process_paired_end(&db, f1, f2, out_file, &opt)?;
            }
        }
    }
    Ok(())
}

fn load_index(index_path: &str) -> Result<DbIndex> {
    let db = DbIndex::load_from_file(index_path)?;
    log::info!(
        "{}: {} chromosomes, {} bases",
        index_path,
        db.chroms.len(),
        db.total_genome_len()
    );
    Ok(db)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_input_modes() {
        assert!(matches!(
            parse_reads_input(Some("a.fq"), None, None),
            Ok(ReadsInput::Single(_))
        ));
        assert!(matches!(
            parse_reads_input(None, Some("a.fq"), Some("b.fq")),
            Ok(ReadsInput::Paired(_, _))
        ));
        // 互斥组合与缺失组合都报配置错误
        assert!(parse_reads_input(Some("a.fq"), Some("b.fq"), Some("c.fq")).is_err());
        assert!(parse_reads_input(None, Some("a.fq"), None).is_err());
        assert!(parse_reads_input(None, None, None).is_err());
    }

    #[test]
    fn paired_file_counts_must_match() {
        assert!(parse_reads_input(None, Some("a.fq,b.fq"), Some("c.fq")).is_err());
        assert!(matches!(
            parse_reads_input(None, Some("a.fq,b.fq"), Some("c.fq,d.fq")),
            Ok(ReadsInput::Paired(_, _))
        ));
    }

    #[test]
    fn output_naming_for_multiple_inputs() {
        assert_eq!(per_input_outputs("out.sam", 1, false), vec!["out.sam"]);
        assert_eq!(
            per_input_outputs("out.sam", 2, false),
            vec!["out.sam_s0", "out.sam_s1"]
        );
        assert_eq!(
            per_input_outputs("out.mr", 2, true),
            vec!["out.mr_p0", "out.mr_p1"]
        );
    }

    #[test]
    fn reads_suffix_validation() {
        assert!(check_reads_suffixes(&["a.fastq".to_string(), "b.fq".to_string()]).is_ok());
        assert!(check_reads_suffixes(&["a.txt".to_string()]).is_err());
    }
}
