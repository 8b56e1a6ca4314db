/// Scale applied to the uniform distribution when a lookup misses.
pub const SMOOTHING_FACTOR: f64 = 0.01;

/// Result of a table lookup: the stored log-probability or the smoothed fallback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogProb {
    Observed(f64),
    Smoothed(f64),
}

impl LogProb {
    #[inline]
    pub fn value(self) -> f64 {
        match self {
            Self::Observed(x) | Self::Smoothed(x) => x,
        }
    }

    #[inline]
    pub fn is_smoothed(self) -> bool {
        matches!(self, Self::Smoothed(_))
    }
}

/// Fallback log-probabilities for unseen emissions and transitions.
///
/// Both values depend only on the model dimensions, so they are fixed for every decode
/// against the same model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Smoothing {
    pub unknown_word: f64,
    pub unknown_transition: f64,
}

impl Smoothing {
    pub fn new(vocab_size: usize, num_states: usize) -> Self {
        Self::with_factor(vocab_size, num_states, SMOOTHING_FACTOR)
    }

    pub fn with_factor(vocab_size: usize, num_states: usize, k: f64) -> Self {
        Self {
            unknown_word: (1.0 / vocab_size as f64 * k).ln(),
            unknown_transition: (1.0 / num_states as f64 * k).ln(),
        }
    }

    #[inline]
    pub fn emission(&self, found: Option<f64>) -> LogProb {
        found.map_or(LogProb::Smoothed(self.unknown_word), LogProb::Observed)
    }

    #[inline]
    pub fn transition(&self, found: Option<f64>) -> LogProb {
        found.map_or(LogProb::Smoothed(self.unknown_transition), LogProb::Observed)
    }
}
