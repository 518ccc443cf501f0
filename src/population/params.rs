use serde::{Deserialize, Serialize};

use crate::neural_network::node::Activation;

/// Rates and settings for mutating a single genome.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenomeParams {
    pub new_node_rate: f64,
    pub new_connection_rate: f64,
    pub weight_mutate_rate: f64,    // chance each gene's weight is touched at all
    pub weight_randomize_rate: f64, // chance a touched weight is replaced rather than nudged
    pub weight_perturb_power: f64,  // nudges are uniform in +/- this
    pub hidden_activation: Activation,
    pub output_activation: Activation,
}

impl Default for GenomeParams {
    fn default() -> GenomeParams {
        GenomeParams {
            new_node_rate: 0.03,
            new_connection_rate: 0.05,
            weight_mutate_rate: 0.8,
            weight_randomize_rate: 0.1,
            weight_perturb_power: 0.2,
            hidden_activation: Activation::SteepenedSigmoid,
            output_activation: Activation::SteepenedSigmoid,
        }
    }
}

/// Coefficients of the compatibility distance and the speciation threshold.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompatibilityParams {
    pub excess_coefficient: f64,
    pub disjoint_coefficient: f64,
    pub weight_coefficient: f64,
    pub threshold: f64,
    /// Genomes smaller than this are not normalized by gene count.
    pub normalize_threshold: usize,
}

impl Default for CompatibilityParams {
    fn default() -> CompatibilityParams {
        CompatibilityParams {
            excess_coefficient: 1.0,
            disjoint_coefficient: 1.0,
            weight_coefficient: 0.4,
            threshold: 3.0,
            normalize_threshold: 20,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeciesParams {
    /// Species larger than this keep an elite and are culled to their better half.
    pub min_size: usize,
    pub elitism: bool,
    /// Chance an inherited gene is disabled when either parent had it disabled.
    pub disable_rate: f64,
    /// Share of each quota filled with mutated clones instead of crossover children.
    pub clone_fraction: f64,
}

impl Default for SpeciesParams {
    fn default() -> SpeciesParams {
        SpeciesParams {
            min_size: 5,
            elitism: true,
            disable_rate: 0.75,
            clone_fraction: 0.25,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulationParams {
    pub generations_before_extinct: usize,
}

impl Default for PopulationParams {
    fn default() -> PopulationParams {
        PopulationParams {
            generations_before_extinct: 15,
        }
    }
}

/// Everything needed to set up a run, usually read from a YAML file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NeatParams {
    pub num_individuals: usize,
    pub num_inputs: usize,
    pub num_outputs: usize,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub population: PopulationParams,
    #[serde(default)]
    pub species: SpeciesParams,
    #[serde(default)]
    pub genome: GenomeParams,
    #[serde(default)]
    pub compatibility: CompatibilityParams,
}

impl NeatParams {
    /// Default settings for the given problem shape.
    pub fn new(num_inputs: usize, num_outputs: usize, num_individuals: usize) -> NeatParams {
        NeatParams {
            num_individuals,
            num_inputs,
            num_outputs,
            seed: None,
            population: PopulationParams::default(),
            species: SpeciesParams::default(),
            genome: GenomeParams::default(),
            compatibility: CompatibilityParams::default(),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> NeatParams {
        self.seed = Some(seed);
        self
    }
}
