use anyhow::{anyhow, Result};
use std::io::BufRead;

#[derive(Debug, Clone)]
pub struct FastqRecord {
    pub name: String,
    pub seq: Vec<u8>,
    pub qual: Vec<u8>,
}

pub struct FastqReader<R: BufRead> {
    reader: R,
    buf: String,
    done: bool,
}

impl<R: BufRead> FastqReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, buf: String::new(), done: false }
    }

    pub fn next_record(&mut self) -> Result<Option<FastqRecord>> {
        if self.done {
            return Ok(None);
        }

        // header line starting with '@'
        self.buf.clear();
        if self.reader.read_line(&mut self.buf)? == 0 {
            self.done = true;
            return Ok(None);
        }
        if !self.buf.starts_with('@') {
            return Err(anyhow!("FASTQ header not starting with '@'"));
        }
        let name = self.buf[1..]
            .trim_end()
            .split_whitespace()
            .next()
            .unwrap_or("")
            .to_string();

        // sequence line
        self.buf.clear();
        if self.reader.read_line(&mut self.buf)? == 0 {
            return Err(anyhow!("truncated FASTQ record '{}': missing sequence", name));
        }
        let seq = self.buf.trim_end().as_bytes().to_vec();

        // '+' separator
        self.buf.clear();
        if self.reader.read_line(&mut self.buf)? == 0 || !self.buf.starts_with('+') {
            return Err(anyhow!("truncated FASTQ record '{}': missing '+' line", name));
        }

        // quality line
        self.buf.clear();
        if self.reader.read_line(&mut self.buf)? == 0 {
            return Err(anyhow!("truncated FASTQ record '{}': missing quality", name));
        }
        let qual = self.buf.trim_end().as_bytes().to_vec();

        if qual.len() != seq.len() {
            return Err(anyhow!(
                "FASTQ record '{}': sequence and quality lengths differ ({} vs {})",
                name,
                seq.len(),
                qual.len()
            ));
        }

        Ok(Some(FastqRecord { name, seq, qual }))
    }

    /// 读取一批记录，最多 `n` 条；文件结束时返回的批可以不满。
    pub fn read_batch(&mut self, n: usize) -> Result<Vec<FastqRecord>> {
        let mut batch = Vec::new();
        while batch.len() < n {
            match self.next_record()? {
                Some(rec) => batch.push(rec),
                None => break,
            }
        }
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const DATA: &[u8] = b"@r1 desc\nACGT\n+\nIIII\n@r2\nTTTT\n+r2\nJJJJ\n";

    #[test]
    fn parse_records() {
        let mut r = FastqReader::new(Cursor::new(DATA));
        let r1 = r.next_record().unwrap().unwrap();
        assert_eq!(r1.name, "r1");
        assert_eq!(r1.seq, b"ACGT");
        assert_eq!(r1.qual, b"IIII");
        let r2 = r.next_record().unwrap().unwrap();
        assert_eq!(r2.name, "r2");
        assert!(r.next_record().unwrap().is_none());
    }

    #[test]
    fn batch_reading_respects_limit() {
        let mut r = FastqReader::new(Cursor::new(DATA));
        let b1 = r.read_batch(1).unwrap();
        assert_eq!(b1.len(), 1);
        let b2 = r.read_batch(10).unwrap();
        assert_eq!(b2.len(), 1);
        assert!(r.read_batch(10).unwrap().is_empty());
    }

    #[test]
    fn truncated_record_is_an_error() {
        let mut r = FastqReader::new(Cursor::new(&b"@r1\nACGT\n"[..]));
        assert!(r.next_record().is_err());
    }

    #[test]
    fn bad_header_is_an_error() {
        let mut r = FastqReader::new(Cursor::new(&b"r1\nACGT\n+\nIIII\n"[..]));
        assert!(r.next_record().is_err());
    }

    #[test]
    fn qual_length_mismatch_is_an_error() {
        let mut r = FastqReader::new(Cursor::new(&b"@r1\nACGT\n+\nII\n"[..]));
        assert!(r.next_record().is_err());
    }
}
