pub mod fasta;
pub mod fastq;
pub mod output;

/// 文件名后缀校验：`ext` 不带点，比较最后一个 '.' 之后的部分。
pub fn has_extension(path: &str, ext: &str) -> bool {
    match path.rfind('.') {
        Some(i) => &path[i + 1..] == ext,
        None => false,
    }
}

pub fn is_valid_index_path(path: &str) -> bool {
    has_extension(path, "dbindex")
}

pub fn is_valid_reads_path(path: &str) -> bool {
    has_extension(path, "fastq") || has_extension(path, "fq")
}

/// 逗号分隔的文件列表，忽略空项。
pub fn split_file_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_checks() {
        assert!(is_valid_index_path("hg19.dbindex"));
        assert!(!is_valid_index_path("hg19.index"));
        assert!(!is_valid_index_path("dbindex"));
        assert!(is_valid_reads_path("a.fastq"));
        assert!(is_valid_reads_path("a.fq"));
        assert!(!is_valid_reads_path("a.fa"));
    }

    #[test]
    fn file_list_splitting() {
        assert_eq!(split_file_list("a.fq,b.fq"), vec!["a.fq", "b.fq"]);
        assert_eq!(split_file_list("a.fq"), vec!["a.fq"]);
        assert_eq!(split_file_list("a.fq, b.fq ,"), vec!["a.fq", "b.fq"]);
        assert!(split_file_list("").is_empty());
    }
}
