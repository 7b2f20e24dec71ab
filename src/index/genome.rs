//! 参考基因组的两份转换镜像。
//!
//! 建库时从 FASTA 读出的每条染色体规范化为 {A,C,G,T,N}，随后生成
//! 两份镜像：C→T 镜像（所有 C 改写为 T）与 G→A 镜像（所有 G 改写
//! 为 A）。两份镜像共享染色体名称与长度，坐标一一对应。

use serde::{Deserialize, Serialize};

use crate::util::dna::Conversion;

/// 染色体元信息。序列本体存放在 [`GenomeImage`] 中。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChromInfo {
    pub name: String,
    pub length: u32,
}

/// 一份转换后的基因组镜像：按染色体存放的 ASCII 序列。
#[derive(Debug, Serialize, Deserialize)]
pub struct GenomeImage {
    pub conversion: Conversion,
    pub chroms: Vec<Vec<u8>>,
}

impl GenomeImage {
    /// 从规范化后的原始序列生成镜像。
    pub fn build(conversion: Conversion, normalized: &[Vec<u8>]) -> Self {
        let chroms = normalized.iter().map(|s| conversion.convert(s)).collect();
        Self { conversion, chroms }
    }

    #[inline]
    pub fn chrom(&self, chrom_id: u32) -> &[u8] {
        &self.chroms[chrom_id as usize]
    }

    pub fn total_len(&self) -> u64 {
        self.chroms.iter().map(|c| c.len() as u64).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_converts_every_chromosome() {
        let raw = vec![b"ACGTN".to_vec(), b"CCGG".to_vec()];
        let ct = GenomeImage::build(Conversion::CtoT, &raw);
        assert_eq!(ct.chrom(0), b"ATGTT");
        assert_eq!(ct.chrom(1), b"TTGG");

        let ga = GenomeImage::build(Conversion::GtoA, &raw);
        assert_eq!(ga.chrom(0), b"ACATA");
        assert_eq!(ga.chrom(1), b"CCAA");
    }

    #[test]
    fn images_share_lengths() {
        let raw = vec![b"ACGTACGT".to_vec()];
        let ct = GenomeImage::build(Conversion::CtoT, &raw);
        let ga = GenomeImage::build(Conversion::GtoA, &raw);
        assert_eq!(ct.total_len(), ga.total_len());
        assert_eq!(ct.total_len(), 8);
    }
}
