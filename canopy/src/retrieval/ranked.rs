/// A scored candidate held during one retrieval call.
#[derive(Debug, Clone, PartialEq)]
pub struct Scored<T> {
    pub score: f64,
    pub payload: T,
}

/// Bounded list of scored entries kept in descending score order.
///
/// Insertion is a linear scan: a new entry lands strictly after every
/// existing entry with a greater-or-equal score, so equal scores keep their
/// insertion order. Traversal determinism depends on exactly this
/// tie-break; a heap would not preserve it. The bound is small (tens of
/// entries), so the scan is cheap.
#[derive(Debug, Clone)]
pub struct RankedList<T> {
    entries: Vec<Scored<T>>,
    bound: Option<usize>,
}

impl<T> RankedList<T> {
    pub fn unbounded() -> Self {
        Self {
            entries: Vec::new(),
            bound: None,
        }
    }

    pub fn bounded(bound: usize) -> Self {
        Self {
            entries: Vec::new(),
            bound: Some(bound),
        }
    }

    pub fn insert(&mut self, score: f64, payload: T) {
        let position = self
            .entries
            .iter()
            .position(|entry| entry.score < score)
            .unwrap_or(self.entries.len());
        self.entries.insert(position, Scored { score, payload });
        if let Some(bound) = self.bound {
            self.entries.truncate(bound);
        }
    }

    /// Drop the lowest-scored entries until at most `len` remain.
    pub fn truncate(&mut self, len: usize) {
        self.entries.truncate(len);
    }

    /// Remove and return the highest-scored entry.
    pub fn pop_front(&mut self) -> Option<Scored<T>> {
        if self.entries.is_empty() {
            None
        } else {
            Some(self.entries.remove(0))
        }
    }

    pub fn front_score(&self) -> Option<f64> {
        self.entries.first().map(|entry| entry.score)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Scored<T>> {
        self.entries.iter()
    }

    pub fn into_payloads(self) -> Vec<T> {
        self.entries.into_iter().map(|entry| entry.payload).collect()
    }
}
