//! Part-of-speech style sequence tagging with a pretrained Hidden Markov Model.
//!
//! A model is read once into an immutable [`HmmModel`]; a [`Tagger`] borrows it and decodes
//! one whitespace-tokenized line at a time with exact Viterbi search.
//!
//! ```no_run
//! use hmmtag::HmmModel;
//!
//! let model = HmmModel::from_path("model.hmm")?;
//! let tagger = model.tagger();
//! let tags = tagger.tag(&["the", "dog", "runs"])?;
//! # Ok::<(), hmmtag::Error>(())
//! ```

pub mod hmm;
pub mod pipeline;
mod dataset;
mod evaluation;
mod quark;

pub use dataset::{Dataset, Sequence};
pub use evaluation::{Estimation, Evaluation};
pub use hmm::model::HmmModel;
pub use hmm::smoothing::{LogProb, Smoothing};
pub use hmm::tagger::{Path, Tagger};
pub use hmm::trellis::Trellis;
pub use quark::{Quark, StringTable};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid model: {0}")]
    InvalidModel(String),
    #[error("invalid model table on line {line}: {source}")]
    InvalidTable {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid reference on line {line}: {reason}")]
    InvalidReference { line: usize, reason: String },
    #[error("cannot decode an empty observation")]
    EmptyObservation,
    #[error("unknown tag: {0}")]
    UnknownTag(String),
    #[error("observation and tag sequence lengths differ ({0} != {1})")]
    LengthMismatch(usize, usize),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
