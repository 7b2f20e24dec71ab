use anyhow::{anyhow, Result};
use std::io::BufRead;

#[derive(Debug, Clone)]
pub struct FastaRecord {
    pub name: String,
    pub seq: Vec<u8>,
}

/// Streaming FASTA reader. Sequence lines are uppercased and stripped of
/// whitespace; base normalization happens later, at index build time.
pub struct FastaReader<R: BufRead> {
    reader: R,
    buf: String,
    done: bool,
    pending_header: Option<String>,
}

impl<R: BufRead> FastaReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, buf: String::new(), done: false, pending_header: None }
    }

    pub fn next_record(&mut self) -> Result<Option<FastaRecord>> {
        if self.done {
            return Ok(None);
        }

        let header = match self.pending_header.take() {
            Some(h) => h,
            None => loop {
                self.buf.clear();
                if self.reader.read_line(&mut self.buf)? == 0 {
                    self.done = true;
                    return Ok(None);
                }
                if self.buf.starts_with('>') {
                    break self.buf[1..].trim().to_string();
                }
            },
        };

        // chromosome name is the first whitespace-delimited token
        let name = header.split_whitespace().next().unwrap_or("").to_string();
        if name.is_empty() {
            return Err(anyhow!("FASTA record with empty name"));
        }

        let mut seq: Vec<u8> = Vec::new();
        loop {
            self.buf.clear();
            if self.reader.read_line(&mut self.buf)? == 0 {
                self.done = true;
                break;
            }
            if self.buf.starts_with('>') {
                self.pending_header = Some(self.buf[1..].trim().to_string());
                break;
            }
            for &b in self.buf.as_bytes() {
                if !b.is_ascii_whitespace() {
                    seq.push(b.to_ascii_uppercase());
                }
            }
        }

        Ok(Some(FastaRecord { name, seq }))
    }

    /// Drain the remaining records into (name, sequence) pairs.
    pub fn read_all(&mut self) -> Result<Vec<(String, Vec<u8>)>> {
        let mut out = Vec::new();
        while let Some(rec) = self.next_record()? {
            out.push((rec.name, rec.seq));
        }
        Ok(out)
    }
}
