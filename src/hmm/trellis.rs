/// Viterbi lattice for one observation sequence.
///
/// Every matrix is stored row-major as `[T][L]`, so cell `(t, l)` lives at `L * t + l`.
#[derive(Debug, Default, Clone)]
pub struct Trellis {
    /** The total number of distinct labels (L). */
    num_labels: usize,

    /** The number of items (T) in the observation. */
    num_items: usize,

    /**
     * State scores.
     *  This is a [T][L] matrix whose element [t][l] is the emission log-probability of
     *  item #t under label #l. Row 0 also carries the initial log-probability of #l.
     */
    pub(crate) state: Vec<f64>,

    /**
     * Path scores.
     *  This is a [T][L] matrix whose element [t][l] is the best cumulative log-probability
     *  of any path arriving at (t, l).
     */
    score: Vec<f64>,

    /**
     * Backward edges.
     *  This is a [T][L] matrix whose element [t][j] is the label #i at t-1 that yields the
     *  maximum score to arrive at (t, j). Row 0 is unused.
     */
    backward_edge: Vec<usize>,
}

impl Trellis {
    #[allow(non_snake_case)]
    pub(crate) fn new(T: usize, L: usize) -> Self {
        Self {
            num_labels: L,
            num_items: T,
            state: vec![0.0; T * L],
            score: vec![0.0; T * L],
            backward_edge: vec![0; T * L],
        }
    }

    pub fn num_items(&self) -> usize {
        self.num_items
    }

    pub fn num_labels(&self) -> usize {
        self.num_labels
    }

    /// Number of cells, `T * L`.
    pub fn len(&self) -> usize {
        self.score.len()
    }

    pub fn is_empty(&self) -> bool {
        self.score.is_empty()
    }

    #[inline]
    pub fn score(&self, t: usize, l: usize) -> f64 {
        self.score[self.num_labels * t + l]
    }

    /// Predecessor of `(t, l)` on its best path; `None` on the first item.
    #[inline]
    pub fn backpointer(&self, t: usize, l: usize) -> Option<usize> {
        (t > 0).then(|| self.backward_edge[self.num_labels * t + l])
    }

    /// Fills path scores and backward edges from the state scores and an `[L][L]` matrix
    /// of transition log-probabilities.
    ///
    /// Predecessors are scanned in label order and replaced only by a strictly greater
    /// score, so exact ties resolve to the lowest label id.
    #[allow(non_snake_case)]
    pub(crate) fn forward(&mut self, trans: &[f64]) {
        let T = self.num_items;
        let L = self.num_labels;
        debug_assert_eq!(trans.len(), L * L);

        /* Compute the scores at (0, *). */
        self.score[..L].copy_from_slice(&self.state[..L]);

        /* Compute the scores at (t, *). */
        for t in 1..T {
            let prev = L * (t - 1);
            for j in 0..L {
                /* Transit from (t-1, i) to (t, j), keeping the first maximum. */
                let mut argmax_score = 0;
                let mut max_score = self.score[prev] + trans[j];
                for i in 1..L {
                    let score = self.score[prev + i] + trans[L * i + j];
                    if score > max_score {
                        max_score = score;
                        argmax_score = i;
                    }
                }
                /* Backward link (#t, #j) -> (#t-1, #i). */
                self.backward_edge[L * t + j] = argmax_score;
                /* Add the state score on (t, j). */
                self.score[L * t + j] = max_score + self.state[L * t + j];
            }
        }
    }

    /// Returns the best label sequence and its log-probability.
    #[allow(non_snake_case)]
    pub fn backtrack(&self) -> (Vec<usize>, f64) {
        let T = self.num_items;
        let L = self.num_labels;
        debug_assert!(T > 0 && L > 0, "backtracking an empty trellis");

        /* Find the node (#T-1, #i) with the maximum score. */
        let last = L * (T - 1);
        let mut labels = vec![0; T];
        let mut max_score = self.score[last];
        for i in 1..L {
            if self.score[last + i] > max_score {
                max_score = self.score[last + i];
                labels[T - 1] = i;
            }
        }

        /* Tag labels by tracing the backward links. */
        for t in (0..T - 1).rev() {
            let i = labels[t + 1];
            labels[t] = self.backward_edge[L * (t + 1) + i];
        }
        (labels, max_score)
    }
}
