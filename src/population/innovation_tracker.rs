use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Default)]
struct Ledger {
    next_value: usize,
    records: HashMap<(usize, usize), usize>,
}

/// Run-wide ledger of structural innovations.
///
/// Maps a `(source, target)` node pair to the innovation number first handed out for it, so two
/// genomes that independently grow the same edge carry the same gene. The tracker is a cheap
/// handle: clones share one ledger, and lookup-or-allocate happens under a single lock so
/// genomes can be mutated from several threads at once.
#[derive(Clone, Debug, Default)]
pub struct InnovationTracker {
    ledger: Arc<Mutex<Ledger>>,
}

impl InnovationTracker {
    pub fn new() -> InnovationTracker {
        InnovationTracker::default()
    }

    /// Returns the innovation number for an edge, allocating the next one if the edge has never
    /// been seen in this run.
    pub fn innovation_for(&self, source: usize, target: usize) -> usize {
        let mut ledger = self.ledger.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(innov) = ledger.records.get(&(source, target)) {
            return *innov;
        }

        let innov = ledger.next_value;
        ledger.next_value += 1;
        ledger.records.insert((source, target), innov);
        innov
    }

    /// The innovation number of an edge if it has been recorded.
    pub fn lookup(&self, source: usize, target: usize) -> Option<usize> {
        let ledger = self.ledger.lock().unwrap_or_else(PoisonError::into_inner);
        ledger.records.get(&(source, target)).copied()
    }

    /// The number the next new edge will receive.
    pub fn next_value(&self) -> usize {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner).next_value
    }

    /// Number of distinct edges recorded.
    pub fn len(&self) -> usize {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner).records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
