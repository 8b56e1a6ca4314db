use crate::{
    hmm::{
        model::HmmModel,
        smoothing::{LogProb, Smoothing},
        trellis::Trellis,
    },
    quark::{Quark, StringTable},
    Error, Result,
};

/// Best label sequence for one observation.
#[derive(Debug, Clone, PartialEq)]
pub struct Path<'a> {
    /// Label ids, in state declaration order.
    pub labels: Vec<usize>,
    pub tags: Vec<&'a str>,
    /// Log-probability of the whole path.
    pub score: f64,
}

/// Viterbi decoder over a borrowed [`HmmModel`].
///
/// Transition scores do not depend on the input, so they are computed once here with
/// smoothing already applied. A tagger is `Sync` and can be shared by worker threads.
#[derive(Debug, Clone)]
pub struct Tagger<'a> {
    model: &'a HmmModel,
    smoothing: Smoothing,
    /// [L][L] matrix, element [i][j] is the log-probability of moving from #i to #j.
    trans: Vec<f64>,
}

impl<'a> Tagger<'a> {
    #[allow(non_snake_case)]
    pub fn new(model: &'a HmmModel) -> Self {
        let L = model.num_labels();
        let smoothing = model.smoothing();
        let mut trans = vec![0.0; L * L];
        for i in 0..L {
            for j in 0..L {
                trans[L * i + j] = smoothing.transition(model.transition(i, j)).value();
            }
        }
        Self {
            model,
            smoothing,
            trans,
        }
    }

    pub fn smoothing(&self) -> Smoothing {
        self.smoothing
    }

    pub fn labels(&self) -> &'a Quark {
        self.model.labels()
    }

    #[inline]
    pub fn emission(&self, state: usize, token: &str) -> LogProb {
        self.smoothing.emission(self.model.emission(state, token))
    }

    #[inline]
    pub fn transition(&self, prev: usize, state: usize) -> LogProb {
        self.smoothing.transition(self.model.transition(prev, state))
    }

    /// Builds the complete lattice for `observation`.
    #[allow(non_snake_case)]
    pub fn lattice<S: AsRef<str>>(&self, observation: &[S]) -> Result<Trellis> {
        if observation.is_empty() {
            return Err(Error::EmptyObservation);
        }
        let T = observation.len();
        let L = self.model.num_labels();
        let mut trellis = Trellis::new(T, L);

        for (t, token) in observation.iter().enumerate() {
            let token = token.as_ref();
            for l in 0..L {
                trellis.state[L * t + l] = self.emission(l, token).value();
            }
        }
        for l in 0..L {
            trellis.state[l] += self.model.initial(l);
        }

        trellis.forward(&self.trans);
        Ok(trellis)
    }

    pub fn viterbi<S: AsRef<str>>(&self, observation: &[S]) -> Result<Path<'a>> {
        let (labels, score) = self.lattice(observation)?.backtrack();
        let tags = labels.iter().map(|&l| self.tag_name(l)).collect();
        log::debug!("decoded {} items, score: {score}", labels.len());
        Ok(Path {
            labels,
            tags,
            score,
        })
    }

    /// Returns the most probable tag for every token of `observation`.
    pub fn tag<S: AsRef<str>>(&self, observation: &[S]) -> Result<Vec<&'a str>> {
        Ok(self.viterbi(observation)?.tags)
    }

    /// Log-probability of labelling `observation` with `tags`, smoothed the same way as
    /// decoding.
    #[allow(non_snake_case)]
    pub fn score<S: AsRef<str>, U: AsRef<str>>(&self, observation: &[S], tags: &[U]) -> Result<f64> {
        if observation.len() != tags.len() {
            return Err(Error::LengthMismatch(observation.len(), tags.len()));
        }
        if observation.is_empty() {
            return Err(Error::EmptyObservation);
        }
        let L = self.model.num_labels();
        let labels = self.labels();
        let ids = tags
            .iter()
            .map(|s| {
                labels
                    .to_id(s.as_ref())
                    .ok_or_else(|| Error::UnknownTag(s.as_ref().to_string()))
            })
            .collect::<Result<Vec<_>>>()?;

        /* Stay at (0, ids[0]). */
        let mut i = ids[0];
        let mut r = self.model.initial(i) + self.emission(i, observation[0].as_ref()).value();

        /* Loop over the rest of items. */
        for (t, &j) in ids.iter().enumerate().skip(1) {
            r += self.trans[L * i + j];
            r += self.emission(j, observation[t].as_ref()).value();
            i = j;
        }
        Ok(r)
    }

    fn tag_name(&self, l: usize) -> &'a str {
        self.labels().to_str(l).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn table(entries: &[(&str, f64)]) -> HashMap<String, f64> {
        entries.iter().map(|&(k, p)| (k.to_string(), p.ln())).collect()
    }

    fn nested(rows: &[(&str, &[(&str, f64)])]) -> HashMap<String, HashMap<String, f64>> {
        rows.iter().map(|&(k, row)| (k.to_string(), table(row))).collect()
    }

    fn dog_run() -> HmmModel {
        HmmModel::new(
            10,
            vec!["N".into(), "V".into()],
            table(&[("N", 0.6), ("V", 0.4)]),
            nested(&[
                ("N", &[("V", 0.7), ("N", 0.3)][..]),
                ("V", &[("N", 0.9), ("V", 0.1)][..]),
            ]),
            nested(&[("N", &[("dog", 0.5)][..]), ("V", &[("run", 0.6)][..])]),
        )
        .unwrap()
    }

    /// Deterministic model with every table partially filled.
    fn scrambled(num_labels: usize, words: &[&str]) -> HmmModel {
        let mut seed = 0x2545f4914f6cdd1du64;
        let mut next = move || {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            (seed % 1000 + 1) as f64 / 1001.0
        };
        let states: Vec<String> = (0..num_labels).map(|i| format!("T{i}")).collect();
        let mut initial = HashMap::new();
        let mut transition = HashMap::new();
        let mut emission = HashMap::new();
        for (i, s) in states.iter().enumerate() {
            initial.insert(s.clone(), next().ln());
            let row: HashMap<String, f64> = states
                .iter()
                .enumerate()
                .filter(|(j, _)| (i + j) % 3 != 0)
                .map(|(_, d)| (d.clone(), next().ln()))
                .collect();
            transition.insert(s.clone(), row);
            let row: HashMap<String, f64> = words
                .iter()
                .enumerate()
                .filter(|(w, _)| (i + w) % 2 == 0)
                .map(|(_, w)| (w.to_string(), next().ln()))
                .collect();
            emission.insert(s.clone(), row);
        }
        HmmModel::new(words.len() + 1, states, initial, transition, emission).unwrap()
    }

    #[test]
    fn dog_runs() {
        let model = dog_run();
        let tagger = model.tagger();
        assert_eq!(tagger.tag(&["dog", "run"]).unwrap(), ["N", "V"]);
    }

    #[test]
    fn lattice_size() {
        let model = scrambled(4, &["a", "b", "c"]);
        let tagger = model.tagger();
        for n in 1..6 {
            let obs = vec!["a"; n];
            let trellis = tagger.lattice(&obs).unwrap();
            assert_eq!(trellis.len(), n * 4);
            assert_eq!(tagger.tag(&obs).unwrap().len(), n);
        }
    }

    #[test]
    fn empty_observation() {
        let model = dog_run();
        let empty: [&str; 0] = [];
        assert!(matches!(
            model.tagger().tag(&empty),
            Err(Error::EmptyObservation)
        ));
    }

    #[test]
    fn single_token_argmax() {
        let model = scrambled(5, &["a", "b", "c", "d"]);
        let tagger = model.tagger();
        for token in ["a", "b", "c", "d", "unseen"] {
            let best = (0..5)
                .map(|s| model.initial(s) + tagger.emission(s, token).value())
                .enumerate()
                .fold((0, f64::NEG_INFINITY), |acc, (s, p)| if p > acc.1 { (s, p) } else { acc });
            let path = tagger.viterbi(&[token]).unwrap();
            assert_eq!(path.labels, [best.0], "token {token}");
            assert_eq!(path.score, best.1);
        }
    }

    #[test]
    fn unknown_token_is_smoothed() {
        let model = dog_run();
        let tagger = model.tagger();
        let lp = tagger.emission(0, "cat");
        assert!(lp.is_smoothed());
        assert_eq!(lp.value(), tagger.smoothing().unknown_word);
        // Unseen word at t = 1 falls back to the transition preference N -> V.
        assert_eq!(tagger.tag(&["dog", "cat"]).unwrap(), ["N", "V"]);
    }

    #[test]
    fn tie_picks_first_state() {
        let same = &[("x", 0.5)][..];
        let model = HmmModel::new(
            4,
            vec!["B".into(), "A".into()],
            table(&[("A", 0.5), ("B", 0.5)]),
            nested(&[
                ("A", &[("A", 0.5), ("B", 0.5)][..]),
                ("B", &[("A", 0.5), ("B", 0.5)][..]),
            ]),
            nested(&[("A", same), ("B", same)]),
        )
        .unwrap();
        assert_eq!(model.tagger().tag(&["x", "x", "y"]).unwrap(), ["B", "B", "B"]);
    }

    #[test]
    fn decoded_path_is_optimal() {
        let words = ["a", "b", "c", "d"];
        let model = scrambled(3, &words);
        let tagger = model.tagger();
        let obs = ["a", "c", "zzz", "b", "d"];
        let path = tagger.viterbi(&obs).unwrap();
        let best = tagger.score(&obs, &path.tags).unwrap();
        assert!((best - path.score).abs() < 1e-9);

        let labels: Vec<&str> = model.labels().iter().collect();
        let n = obs.len();
        for code in 0..3usize.pow(n as u32) {
            let tags: Vec<&str> = (0..n).map(|t| labels[code / 3usize.pow(t as u32) % 3]).collect();
            let s = tagger.score(&obs, &tags).unwrap();
            assert!(s <= best + 1e-9, "{tags:?} scores {s} > {best}");
        }
    }

    #[test]
    fn score_errors() {
        let model = dog_run();
        let tagger = model.tagger();
        assert!(matches!(
            tagger.score(&["dog"], &["N", "V"]),
            Err(Error::LengthMismatch(1, 2))
        ));
        assert!(matches!(
            tagger.score(&["dog"], &["X"]),
            Err(Error::UnknownTag(t)) if t == "X"
        ));
    }

    #[test]
    fn deterministic() {
        let model = scrambled(6, &["a", "b", "c"]);
        let obs = ["c", "a", "b", "b", "q", "a"];
        let first = model.tagger().viterbi(&obs).unwrap();
        for _ in 0..10 {
            assert_eq!(model.tagger().viterbi(&obs).unwrap(), first);
        }
    }
}
