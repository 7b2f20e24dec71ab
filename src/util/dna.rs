//! DNA 碱基编码与亚硫酸氢盐（bisulfite）转换工具。

use serde::{Deserialize, Serialize};

/// 2-bit 碱基编码：A=0, C=1, G=2, T=3。
/// N 编码为 T(3)，保证含 N 的位置最多贡献一个错配，
/// 且不会成为"万能匹配"。
#[inline]
pub fn base_code(b: u8) -> u8 {
    match b {
        b'A' => 0,
        b'C' => 1,
        b'G' => 2,
        b'T' => 3,
        _ => 3, // N 以及其他字符按 T 处理
    }
}

/// 将输入序列规范化为 {A,C,G,T,N}：小写转大写，U 转 T，
/// 其余 IUPAC 模糊碱基（R、Y 等）一律归为 N。
pub fn normalize_seq(seq: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(seq.len());
    for &b in seq {
        let up = b.to_ascii_uppercase();
        let nb = match up {
            b'A' | b'C' | b'G' | b'T' | b'N' => up,
            b'U' => b'T',
            _ => b'N',
        };
        out.push(nb);
    }
    out
}

#[inline]
pub fn complement(base: u8) -> u8 {
    match base.to_ascii_uppercase() {
        b'A' => b'T',
        b'C' => b'G',
        b'G' => b'C',
        b'T' | b'U' => b'A',
        _ => b'N',
    }
}

pub fn revcomp(seq: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(seq.len());
    for &b in seq.iter().rev() {
        out.push(complement(b));
    }
    out
}

/// 两种对称的亚硫酸氢盐转换。
///
/// 正向约定（C→T）：未甲基化的 C 在测序中读作 T，因此把 read 和
/// 参考序列里的 C 全部改写为 T 之后再比较；反向约定（G→A）对应
/// 互补链，把 G 全部改写为 A。N 分别归入 T / A。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Conversion {
    CtoT,
    GtoA,
}

impl Conversion {
    #[inline]
    pub fn apply(self, base: u8) -> u8 {
        match self {
            Conversion::CtoT => match base {
                b'C' | b'N' => b'T',
                other => other,
            },
            Conversion::GtoA => match base {
                b'G' | b'N' => b'A',
                other => other,
            },
        }
    }

    /// 对整条序列做转换，输入应已经过 [`normalize_seq`]。
    pub fn convert(self, seq: &[u8]) -> Vec<u8> {
        seq.iter().map(|&b| self.apply(b)).collect()
    }
}

/// 链方向。反向链表示 read 的反向互补与参考正链比对。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strand {
    Forward,
    Reverse,
}

impl Strand {
    #[inline]
    pub fn symbol(self) -> char {
        match self {
            Strand::Forward => '+',
            Strand::Reverse => '-',
        }
    }
}
