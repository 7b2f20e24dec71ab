//! # walt-rust
//!
//! 受 [WALT](https://github.com/smithlabcode/walt) 启发的 Rust 版
//! 亚硫酸氢盐测序（BS-seq）读段比对器。
//!
//! BS-seq 中未甲基化的 C 被读作 T，因此比对必须容忍 read 相对参考
//! 的 C→T（或互补链约定下的 G→A）替换。本 crate 的做法是把 read 与
//! 参考都做同一种亚硫酸氢盐转换后，在转换后的镜像上做种子-校验式
//! 的 Hamming 距离比对：
//!
//! - **索引构建**：对 C→T / G→A 两份基因组镜像各建一张位置索引
//!   （主哈希桶表 + 按鉴别位排序的位置数组）
//! - **种子查找**：read 后缀的 2-bit 前缀哈希定位桶，鉴别位上的
//!   二分搜索逐位收窄候选区间
//! - **校验**：错配剪枝的全长 Hamming 距离，维护最优记录与并列数
//! - **解析**：单端（正反两链，可选 A/G wildcard）与双端
//!   （top-k 候选 × 片段长度约束）两种策略
//!
//! ## 快速示例
//!
//! ```rust,no_run
//! use walt_rust::align::{map_read, MapClass, MapOpt};
//! use walt_rust::index::db::DbIndex;
//!
//! // 从 (名称, 序列) 构建索引（命令行走 `walt-rust index`）
//! let records = vec![("chr1".to_string(), b"ACGTACGTACGTACGTACGTACGTACGTACGT".to_vec())];
//! let index = DbIndex::build(records).unwrap();
//!
//! // 比对一条 read
//! let opt = MapOpt::default();
//! let best = map_read(&index, b"ACGTACGTACGTACGTACGTACGTACGT", &opt);
//! match best.classify(opt.max_mismatches) {
//!     MapClass::Unique => println!("chr{} pos {}", best.chrom_id, best.chrom_pos),
//!     MapClass::Ambiguous => println!("{} tied placements", best.times),
//!     MapClass::Unmapped => println!("unmapped"),
//! }
//! ```
//!
//! ## 模块说明
//!
//! - [`io`] — FASTA / FASTQ 解析与 SAM / MR 输出
//! - [`index`] — 种子几何、基因组镜像与 `.dbindex` 位置索引
//! - [`align`] — 种子收窄、校验、单端 / 双端解析与批处理管线
//! - [`util`] — 碱基编码、反向互补与亚硫酸氢盐转换

pub mod align;
pub mod index;
pub mod io;
pub mod util;
