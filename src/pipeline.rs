//! Line-oriented tagging: decode every sequence of a [`Dataset`] and write `token/tag` lines
//! in input order.

use std::{
    io::{self, BufRead, Write},
    ops::Range,
    thread,
};

use crate::{dataset::Dataset, hmm::tagger::Tagger, Result};

/// Number of lines handed to a worker at a time.
const CHUNK_SIZE: usize = 64;

/// Tags every sequence of `ds`, returning the tag sequences in input order.
///
/// With `jobs > 1` the lines are decoded by that many scoped worker threads sharing
/// `tagger`. The result does not depend on `jobs`: when several lines fail, the error of
/// the first one in input order is returned.
pub fn tag_dataset<'a>(tagger: &Tagger<'a>, ds: &Dataset, jobs: usize) -> Result<Vec<Vec<&'a str>>> {
    let mut tags = Vec::with_capacity(ds.len());
    if jobs <= 1 || ds.len() <= CHUNK_SIZE {
        for (i, seq) in ds.seqs.iter().enumerate() {
            tags.push(report(i, tagger.tag(&seq.tokens))?);
        }
    } else {
        for (i, r) in tag_parallel(tagger, ds, jobs).into_iter().enumerate() {
            tags.push(report(i, r)?);
        }
    }
    Ok(tags)
}

fn report<T>(i: usize, r: Result<T>) -> Result<T> {
    r.map_err(|e| {
        log::error!("line {}: {e}", i + 1);
        e
    })
}

fn tag_parallel<'a>(tagger: &Tagger<'a>, ds: &Dataset, jobs: usize) -> Vec<Result<Vec<&'a str>>> {
    let (task_tx, task_rx) = crossbeam_channel::unbounded::<Range<usize>>();
    let (result_tx, result_rx) = crossbeam_channel::unbounded();
    for start in (0..ds.len()).step_by(CHUNK_SIZE) {
        let end = std::cmp::min(start + CHUNK_SIZE, ds.len());
        if task_tx.send(start..end).is_err() {
            break;
        }
    }
    drop(task_tx);
    log::debug!("tagging {} lines on {jobs} threads", ds.len());

    let mut chunks = thread::scope(|s| {
        for _ in 0..jobs {
            let task_rx = task_rx.clone();
            let result_tx = result_tx.clone();
            s.spawn(move || {
                for range in task_rx {
                    let start = range.start;
                    let tags: Vec<_> = ds.seqs[range]
                        .iter()
                        .map(|seq| tagger.tag(&seq.tokens))
                        .collect();
                    if result_tx.send((start, tags)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(result_tx);
        result_rx.iter().collect::<Vec<_>>()
    });

    chunks.sort_unstable_by_key(|(start, _)| *start);
    chunks.into_iter().flat_map(|(_, tags)| tags).collect()
}

/// Formats one tagged line as `token1/tag1 token2/tag2 ...`.
pub fn format_tagged<S: AsRef<str>, T: AsRef<str>>(tokens: &[S], tags: &[T]) -> String {
    let mut line = String::new();
    for (i, (token, tag)) in tokens.iter().zip(tags).enumerate() {
        if i > 0 {
            line.push(' ');
        }
        line.push_str(token.as_ref());
        line.push('/');
        line.push_str(tag.as_ref());
    }
    line
}

pub fn write_tagged<W: Write, T: AsRef<str>>(mut w: W, ds: &Dataset, tags: &[Vec<T>]) -> io::Result<()> {
    for (seq, tags) in ds.seqs.iter().zip(tags) {
        writeln!(w, "{}", format_tagged(&seq.tokens, tags))?;
    }
    w.flush()
}

/// Reads observations from `reader`, tags them and writes one line per input line to
/// `writer`. Returns the number of lines written.
pub fn tag_lines<R: BufRead, W: Write>(tagger: &Tagger<'_>, reader: R, writer: W, jobs: usize) -> Result<usize> {
    let ds = Dataset::read(reader)?;
    let tags = tag_dataset(tagger, &ds, jobs)?;
    write_tagged(writer, &ds, &tags)?;
    Ok(tags.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Error, HmmModel};

    const MODEL: &str = r#"10
["N", "V"]
{"N": -0.5108256237659907, "V": -0.916290731874155}
{"N": {"V": -0.35667494393873245, "N": -1.2039728043259361}, "V": {"N": -0.10536051565782628, "V": -2.3025850929940455}}
{"N": {"dog": -0.6931471805599453}, "V": {"run": -0.5108256237659907}}
"#;

    #[test]
    fn format_line() {
        assert_eq!(format_tagged(&["dog", "run"], &["N", "V"]), "dog/N run/V");
        assert_eq!(format_tagged(&["dog"], &["N"]), "dog/N");
    }

    #[test]
    fn tag_text() {
        let model = HmmModel::from_reader(MODEL.as_bytes()).unwrap();
        let mut out = Vec::new();
        let n = tag_lines(&model.tagger(), "dog run\nrun\n  dog   dog \n".as_bytes(), &mut out, 1).unwrap();
        assert_eq!(n, 3);
        assert_eq!(String::from_utf8(out).unwrap(), "dog/N run/V\nrun/V\ndog/N dog/N\n");
    }

    #[test]
    fn parallel_keeps_order() {
        let model = HmmModel::from_reader(MODEL.as_bytes()).unwrap();
        let tagger = model.tagger();
        let text: String = (0..1000)
            .map(|i| match i % 3 {
                0 => "dog run\n".to_string(),
                1 => "run dog run\n".to_string(),
                _ => format!("w{i} dog\n"),
            })
            .collect();
        let ds = Dataset::read(text.as_bytes()).unwrap();
        let serial = tag_dataset(&tagger, &ds, 1).unwrap();
        for jobs in [2, 3, 8] {
            assert_eq!(tag_dataset(&tagger, &ds, jobs).unwrap(), serial, "jobs = {jobs}");
        }
        assert_eq!(serial.len(), 1000);
        assert_eq!(serial[0], ["N", "V"]);
    }

    #[test]
    fn blank_line_fails() {
        let model = HmmModel::from_reader(MODEL.as_bytes()).unwrap();
        let tagger = model.tagger();
        let mut text = "dog run\n".repeat(200);
        text.push('\n');
        let ds = Dataset::read(text.as_bytes()).unwrap();
        for jobs in [1, 4] {
            assert!(matches!(
                tag_dataset(&tagger, &ds, jobs),
                Err(Error::EmptyObservation)
            ));
        }
    }
}
