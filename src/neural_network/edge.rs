use serde::{Deserialize, Serialize};

/// Nominal bound on connection weights.
pub const WEIGHT_BOUND: f64 = 1.0;

/// A connection gene: a directed, weighted edge between two node ids tagged
/// with its innovation number.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Edge {
    pub innov: usize,
    pub source: usize,
    pub target: usize,
    pub weight: f64,
    pub enabled: bool,
}

impl Edge {
    pub fn new(innov: usize, source: usize, target: usize, weight: f64) -> Edge {
        Edge {
            innov,
            source,
            target,
            weight,
            enabled: true,
        }
    }

    pub fn disable(&mut self) {
        self.enabled = false;
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    /// Shift the weight by `delta`, clamped to the nominal bound.
    pub fn perturb(&mut self, delta: f64) {
        self.weight = (self.weight + delta).clamp(-WEIGHT_BOUND, WEIGHT_BOUND);
    }

    pub fn endpoints(&self) -> (usize, usize) {
        (self.source, self.target)
    }
}
