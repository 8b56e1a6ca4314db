use std::{
    fs::File,
    io::{BufRead, BufReader},
};

use crate::{Error, Result};

/// One input line: its tokens, and the gold-standard tags when read from reference data.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Sequence {
    pub tokens: Vec<String>,
    pub labels: Vec<String>,
}

impl Sequence {
    pub fn push(&mut self, token: &str, label: &str) {
        self.tokens.push(token.to_string());
        self.labels.push(label.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_labeled(&self) -> bool {
        !self.labels.is_empty()
    }
}

/// Input lines in order. A blank line yields an empty sequence so that line numbers and
/// output order stay aligned with the source.
#[derive(Debug, Default, Clone)]
pub struct Dataset {
    pub seqs: Vec<Sequence>,
}

impl Dataset {
    /// Reads raw text, one whitespace-separated observation per line.
    pub fn read<R: BufRead>(reader: R) -> Result<Self> {
        let mut seqs = Vec::new();
        for line in reader.lines() {
            let line = line?;
            seqs.push(Sequence {
                tokens: line.split_whitespace().map(str::to_string).collect(),
                labels: Vec::new(),
            });
        }
        Ok(Self { seqs })
    }

    /// Reads gold-standard text where every token is written as `token/tag`. The tag is
    /// whatever follows the last `/`, so tokens may contain slashes themselves.
    pub fn read_labeled<R: BufRead>(reader: R) -> Result<Self> {
        let mut seqs = Vec::new();
        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            let mut seq = Sequence::default();
            for pair in line.split_whitespace() {
                match pair.rsplit_once('/') {
                    Some((token, label)) if !label.is_empty() => seq.push(token, label),
                    _ => {
                        return Err(Error::InvalidReference {
                            line: i + 1,
                            reason: format!("expected token/tag, found {pair:?}"),
                        })
                    }
                }
            }
            seqs.push(seq);
        }
        Ok(Self { seqs })
    }

    pub fn len(&self) -> usize {
        self.seqs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seqs.is_empty()
    }

    pub fn max_seq_length(&self) -> usize {
        self.seqs.iter().map(|x| x.len()).max().unwrap_or_default()
    }

    pub fn total_items(&self) -> usize {
        self.seqs.iter().map(|x| x.len()).sum()
    }
}

impl TryFrom<File> for Dataset {
    type Error = Error;

    fn try_from(f: File) -> Result<Self> {
        Self::read(BufReader::new(f))
    }
}
