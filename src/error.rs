use std::io;

use thiserror::Error;

/// Everything that can go wrong inside the engine.
///
/// Structural problems (`CycleDetected`, `InvalidInputArity`) are caller or
/// programmer errors and are returned immediately. `DegenerateFitness` is
/// produced by quota allocation and recovered from inside the population.
#[derive(Debug, Error)]
pub enum NeatError {
    /// Topological sorting could not order every node of a genome.
    #[error("genome contains a cycle, topological sort left edges unprocessed")]
    CycleDetected,

    #[error("expected {expected} inputs, got {found}")]
    InvalidInputArity { expected: usize, found: usize },

    /// A species operation needed at least one member.
    #[error("species has no members")]
    InsufficientMembers,

    /// Total fitness was zero (or not finite) or every quota rounded to zero.
    #[error("population fitness is degenerate, quotas cannot be proportional")]
    DegenerateFitness,

    #[error("expected {expected} fitness values, got {found}")]
    FitnessArity { expected: usize, found: usize },

    #[error("invalid genome: {0}")]
    InvalidGenome(String),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yml::Error),
}

pub type Result<T> = std::result::Result<T, NeatError>;
