use std::collections::HashMap;

/// Bidirectional mapping between labels and their position in declaration order.
pub trait StringTable {
    fn to_str(&self, id: usize) -> Option<&str>;
    fn to_id(&self, s: &str) -> Option<usize>;
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Ordered, duplicate-free label set. The id of a label is its declaration index, which is
/// also the tie-break order used by the decoder.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Quark {
    v: Vec<String>,
    m: HashMap<String, usize>,
}

impl Quark {
    /// Builds the set, returning the first repeated label on failure.
    pub fn try_new(labels: Vec<String>) -> Result<Self, String> {
        let mut m = HashMap::with_capacity(labels.len());
        for (i, s) in labels.iter().enumerate() {
            if m.insert(s.clone(), i).is_some() {
                return Err(s.clone());
            }
        }
        Ok(Self { v: labels, m })
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.v.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.v
    }
}

impl StringTable for Quark {
    fn to_str(&self, id: usize) -> Option<&str> {
        self.v.get(id).map(|x| x.as_str())
    }

    fn to_id(&self, s: &str) -> Option<usize> {
        self.m.get(s).copied()
    }

    fn len(&self) -> usize {
        self.v.len()
    }
}
