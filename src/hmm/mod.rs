pub mod model;
pub mod smoothing;
pub mod tagger;
pub mod trellis;
