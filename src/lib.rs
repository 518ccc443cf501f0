//! its NEAT, baby
//!
//! NeuroEvolution of Augmenting Topologies: a population of small feed-forward networks that
//! grow structure through mutation, line up their genes by innovation number for crossover and
//! compete within species.

/// Errors shared by the whole crate
pub mod error;

/// This module contains all of the neural network stuff
pub mod neural_network;

/// This module contains all of the evolutionary stuff
pub mod population;

pub mod concurrency;

pub use error::{NeatError, Result};
pub use neural_network::NeuralNetwork;
pub use population::genome::Genome;
pub use population::innovation_tracker::InnovationTracker;
pub use population::params::{CompatibilityParams, GenomeParams, NeatParams, PopulationParams, SpeciesParams};
pub use population::species::{Species, SpeciesSummary};
pub use population::{GenerationPhase, Population};

use std::fs::{self, File};
use std::io::{prelude::*, BufWriter};
use std::path::Path;

use log::debug;

/// Runs a population against a fitness function that scores one genome at a time.
pub struct Neat {
    population: Population,
    fitness_function: fn(&Genome) -> f64,
}

impl Neat {
    pub fn new(params: NeatParams, fitness: fn(&Genome) -> f64) -> Neat {
        Neat {
            population: Population::with_params(params),
            fitness_function: fitness,
        }
    }

    pub fn from_parameters<P: AsRef<Path>>(parameter_path: P, fitness: fn(&Genome) -> f64) -> Result<Neat> {
        let neat_parameters = Self::read_parameter_file(parameter_path)?;
        Ok(Neat::new(neat_parameters, fitness))
    }

    /// Scores every member in parallel and advances one generation, `num_generations` times.
    pub fn evolve(&mut self, num_generations: usize) -> Result<()> {
        for _ in 0..num_generations {
            let fitness_values = self.fitness_values();
            self.population.advance_generation(&fitness_values)?;
        }
        Ok(())
    }

    /// Fitness of every current member, in member order.
    pub fn fitness_values(&self) -> Vec<f64> {
        let fitness = self.fitness_function;
        let members = self.population.members();
        concurrency::par_map(&members, concurrency::NUM_THREADS, |genome| fitness(*genome))
    }

    pub fn write_fitness_values<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let fitness_values = self.fitness_values();

        let buffer = File::create(path)?;
        let mut writer = BufWriter::new(buffer);
        for value in fitness_values {
            writeln!(&mut writer, "{}", value)?;
        }
        writer.flush()?;

        Ok(())
    }

    /// The current member scoring highest on the fitness function, with that score recorded.
    pub fn get_champion(&self) -> Option<Genome> {
        let fitness_values = self.fitness_values();
        let (best_i, best_fitness) = fitness_values
            .iter()
            .copied()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))?;

        let mut champion = self.population.members().get(best_i).map(|g| (*g).clone())?;
        champion.set_fitness(best_fitness);
        Some(champion)
    }

    pub fn number_of_genomes(&self) -> usize {
        self.population.num_members()
    }

    pub fn population(&self) -> &Population {
        &self.population
    }

    fn read_parameter_file<P: AsRef<Path>>(path: P) -> Result<NeatParams> {
        let yaml_string = fs::read_to_string(&path)?;
        debug!("read parameters from {}", path.as_ref().display());
        Self::parse_parameter_yaml(&yaml_string)
    }

    pub fn parse_parameter_yaml(fstring: &str) -> Result<NeatParams> {
        let params: NeatParams = serde_yml::from_str(fstring)?;
        Ok(params)
    }
}
