use std::{
    collections::{BTreeMap, HashMap},
    fs::File,
    io::{self, BufRead, BufReader, BufWriter, Write},
    path::Path,
};

use crate::{
    hmm::{smoothing::Smoothing, tagger::Tagger},
    quark::{Quark, StringTable},
    Error, Result,
};

type Table = HashMap<String, f64>;
type NestedTable = HashMap<String, HashMap<String, f64>>;

/// Number of lines a model file is made of.
const MODEL_LINES: usize = 5;

/// Pretrained first-order HMM. All probabilities are natural-log values.
///
/// The model is immutable once built; any number of [`Tagger`]s (on any number of threads)
/// can read it at the same time.
#[derive(Debug, Clone, PartialEq)]
pub struct HmmModel {
    vocab_size: usize,
    labels: Quark,
    /// [L] vector, every state has an entry.
    initial: Vec<f64>,
    /// [L] rows keyed by the destination state id.
    transition: Vec<HashMap<usize, f64>>,
    /// [L] rows keyed by token.
    emission: Vec<HashMap<String, f64>>,
}

impl HmmModel {
    /// Builds a model from the five supplier tables.
    ///
    /// `states` fixes the state order, which decides every tie during decoding. The initial
    /// table must cover every state, and the transition and emission tables must have a row
    /// for every state. Entries naming a tag outside `states` are dropped.
    pub fn new(
        vocab_size: usize,
        states: Vec<String>,
        initial: Table,
        transition: NestedTable,
        emission: NestedTable,
    ) -> Result<Self> {
        if vocab_size == 0 {
            return Err(Error::InvalidModel(
                "vocabulary size must be positive".into(),
            ));
        }
        if states.is_empty() {
            return Err(Error::InvalidModel("empty state set".into()));
        }
        let labels = Quark::try_new(states)
            .map_err(|s| Error::InvalidModel(format!("duplicate state {s:?}")))?;

        let initial_probs = labels
            .iter()
            .map(|s| {
                initial.get(s).copied().ok_or_else(|| {
                    Error::InvalidModel(format!("initial table has no entry for state {s:?}"))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        warn_unknown_keys("initial", initial.keys(), &labels);

        let mut transition_rows = Vec::with_capacity(labels.len());
        for prev in labels.iter() {
            let row = transition.get(prev).ok_or_else(|| {
                Error::InvalidModel(format!("transition table has no row for state {prev:?}"))
            })?;
            let mut dense = HashMap::with_capacity(row.len());
            let mut unknown = 0;
            for (dst, &p) in row {
                match labels.to_id(dst) {
                    Some(j) => {
                        dense.insert(j, p);
                    }
                    None => unknown += 1,
                }
            }
            if unknown > 0 {
                log::warn!("transition row {prev:?}: ignoring {unknown} unknown destination states");
            }
            transition_rows.push(dense);
        }
        warn_unknown_keys("transition", transition.keys(), &labels);

        warn_unknown_keys("emission", emission.keys(), &labels);
        let mut emission = emission;
        let mut emission_rows = Vec::with_capacity(labels.len());
        for s in labels.iter() {
            let row = emission.remove(s).ok_or_else(|| {
                Error::InvalidModel(format!("emission table has no row for state {s:?}"))
            })?;
            emission_rows.push(row);
        }

        let this = Self {
            vocab_size,
            labels,
            initial: initial_probs,
            transition: transition_rows,
            emission: emission_rows,
        };
        log::info!(
            "model loaded (vocab: {}, states: {}, transitions: {}, emissions: {})",
            this.vocab_size,
            this.num_labels(),
            this.transition.iter().map(HashMap::len).sum::<usize>(),
            this.emission.iter().map(HashMap::len).sum::<usize>()
        );
        Ok(this)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let f = File::open(path)?;
        Self::from_reader(BufReader::new(f))
    }

    /// Reads the five-line model format: vocabulary size, state list, then the initial,
    /// transition and emission tables as JSON objects.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut lines = Vec::with_capacity(MODEL_LINES);
        for line in reader.lines() {
            let line = line?;
            if lines.len() < MODEL_LINES {
                lines.push(line);
            } else if !line.trim().is_empty() {
                log::warn!("ignoring trailing model line: {line}");
            }
        }
        if lines.len() < MODEL_LINES {
            return Err(Error::InvalidModel(format!(
                "expected {MODEL_LINES} lines, found {}",
                lines.len()
            )));
        }

        let vocab_size = lines[0].trim().parse::<usize>().map_err(|e| {
            Error::InvalidModel(format!("line 1: bad vocabulary size {:?}: {e}", lines[0].trim()))
        })?;
        let states = parse_label_list(&lines[1]).ok_or_else(|| {
            Error::InvalidModel(format!("line 2: bad state list {:?}", lines[1].trim()))
        })?;
        let initial: Table = parse_table(&lines[2], 3)?;
        let transition: NestedTable = parse_table(&lines[3], 4)?;
        let emission: NestedTable = parse_table(&lines[4], 5)?;
        Self::new(vocab_size, states, initial, transition, emission)
    }

    /// Writes the model in the format read by [`HmmModel::from_reader`]. Keys are sorted, so
    /// the output is stable across runs.
    pub fn write<W: Write>(&self, mut w: W) -> io::Result<()> {
        let label = |i: usize| self.labels.to_str(i).unwrap_or_default();

        writeln!(w, "{}", self.vocab_size)?;
        serde_json::to_writer(&mut w, self.labels.as_slice())?;
        writeln!(w)?;

        let initial: BTreeMap<&str, f64> = self
            .initial
            .iter()
            .enumerate()
            .map(|(i, &p)| (label(i), p))
            .collect();
        serde_json::to_writer(&mut w, &initial)?;
        writeln!(w)?;

        let transition: BTreeMap<&str, BTreeMap<&str, f64>> = self
            .transition
            .iter()
            .enumerate()
            .map(|(i, row)| (label(i), row.iter().map(|(&j, &p)| (label(j), p)).collect()))
            .collect();
        serde_json::to_writer(&mut w, &transition)?;
        writeln!(w)?;

        let emission: BTreeMap<&str, BTreeMap<&str, f64>> = self
            .emission
            .iter()
            .enumerate()
            .map(|(i, row)| (label(i), row.iter().map(|(k, &p)| (k.as_str(), p)).collect()))
            .collect();
        serde_json::to_writer(&mut w, &emission)?;
        writeln!(w)?;
        w.flush()
    }

    pub fn dump<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let f = File::create(path)?;
        self.write(BufWriter::new(f))?;
        Ok(())
    }

    pub fn tagger(&self) -> Tagger<'_> {
        Tagger::new(self)
    }

    pub fn smoothing(&self) -> Smoothing {
        Smoothing::new(self.vocab_size, self.num_labels())
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    pub fn num_labels(&self) -> usize {
        self.labels.len()
    }

    pub fn labels(&self) -> &Quark {
        &self.labels
    }

    #[inline]
    pub fn initial(&self, state: usize) -> f64 {
        self.initial[state]
    }

    #[inline]
    pub fn transition(&self, prev: usize, state: usize) -> Option<f64> {
        self.transition[prev].get(&state).copied()
    }

    #[inline]
    pub fn emission(&self, state: usize, token: &str) -> Option<f64> {
        self.emission[state].get(token).copied()
    }
}

fn warn_unknown_keys<'a>(table: &str, keys: impl Iterator<Item = &'a String>, labels: &Quark) {
    for k in keys.filter(|k| labels.to_id(k).is_none()) {
        log::warn!("{table} table: ignoring unknown state {k:?}");
    }
}

fn parse_table<T: serde::de::DeserializeOwned>(line: &str, lineno: usize) -> Result<T> {
    serde_json::from_str(line).map_err(|source| Error::InvalidTable {
        line: lineno,
        source,
    })
}

/// Parses a list of labels written either as a JSON array or as a Python list literal, where
/// strings may be single- or double-quoted (`['NN', "''", ',']`).
fn parse_label_list(s: &str) -> Option<Vec<String>> {
    if let Ok(v) = serde_json::from_str::<Vec<String>>(s) {
        return Some(v);
    }
    let inner = s.trim().strip_prefix('[')?.strip_suffix(']')?;
    let mut chars = inner.chars().peekable();
    let mut labels = Vec::new();
    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        let quote = match chars.next() {
            None => break,
            Some(q @ ('\'' | '"')) => q,
            Some(_) => return None,
        };
        let mut label = String::new();
        loop {
            match chars.next()? {
                '\\' => label.push(match chars.next()? {
                    'n' => '\n',
                    't' => '\t',
                    c => c,
                }),
                c if c == quote => break,
                c => label.push(c),
            }
        }
        labels.push(label);
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        match chars.next() {
            None => break,
            Some(',') => continue,
            Some(_) => return None,
        }
    }
    Some(labels)
}
