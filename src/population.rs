//! Generational management of a set of genomes: speciation, extinction, quotas and repopulation.

pub mod genome;
pub mod innovation_tracker;
pub mod mutation;
pub mod params;
pub mod recombination;
pub mod species;

use log::{debug, info, warn};
use rand::prelude::*;
use rand::rngs::StdRng;

use crate::concurrency;
use crate::error::{NeatError, Result};
use crate::population::genome::Genome;
use crate::population::innovation_tracker::InnovationTracker;
use crate::population::params::NeatParams;
use crate::population::species::{Species, SpeciesSummary};

/// Where a population is in its generation transition. Between calls to
/// [`Population::advance_generation`] it is always `Flattened`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GenerationPhase {
    Evaluated,
    Speciating,
    Pruning,
    QuotaAllocating,
    Repopulating,
    Flattened,
}

/// The object a host drives: it owns every species, and through them every genome, plus the
/// innovation tracker shared by all of them for the whole run.
#[derive(Debug)]
pub struct Population {
    params: NeatParams,
    species: Vec<Species>,
    generation: usize,
    next_species_id: usize,
    tracker: InnovationTracker,
    rng: StdRng,
    phase: GenerationPhase,
}

impl Population {
    /// Generation zero with default settings: `population_size` minimal genomes in one species.
    pub fn new(num_inputs: usize, num_outputs: usize, population_size: usize) -> Population {
        Population::with_params(NeatParams::new(num_inputs, num_outputs, population_size))
    }

    pub fn with_params(params: NeatParams) -> Population {
        let mut rng = match params.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let tracker = InnovationTracker::new();

        let genomes: Vec<Genome> = (0..params.num_individuals)
            .map(|_| Genome::new_minimal(params.num_inputs, params.num_outputs, &tracker, &params.genome, &mut rng))
            .collect();
        let mut genomes = genomes.into_iter();

        let mut species = Vec::new();
        if let Some(founder) = genomes.next() {
            let mut first = Species::new(0, founder);
            genomes.for_each(|genome| first.add_member(genome));
            species.push(first);
        }

        Population {
            params,
            species,
            generation: 0,
            next_species_id: 1,
            tracker,
            rng,
            phase: GenerationPhase::Flattened,
        }
    }

    pub fn generation(&self) -> usize {
        self.generation
    }

    pub fn params(&self) -> &NeatParams {
        &self.params
    }

    pub fn phase(&self) -> GenerationPhase {
        self.phase
    }

    pub fn tracker(&self) -> &InnovationTracker {
        &self.tracker
    }

    pub fn species(&self) -> &[Species] {
        &self.species
    }

    /// Every genome, species by species. Fitness values passed to `advance_generation` follow
    /// this order.
    pub fn members(&self) -> Vec<&Genome> {
        self.species.iter().flat_map(|s| s.members()).collect()
    }

    pub fn num_members(&self) -> usize {
        self.species.iter().map(|s| s.len()).sum()
    }

    pub fn species_summaries(&self) -> Vec<SpeciesSummary> {
        self.species.iter().map(|s| s.summary()).collect()
    }

    /// Fittest genome of the last evaluated generation.
    pub fn champion(&self) -> Option<&Genome> {
        self.species
            .iter()
            .filter_map(|s| s.champion())
            .max_by(|a, b| a.fitness().total_cmp(&b.fitness()))
    }

    /// Outputs of every member for one input vector, in member order.
    pub fn evaluate_all(&self, inputs: &[f64]) -> Result<Vec<Vec<f64>>> {
        self.species
            .iter()
            .flat_map(|s| s.members())
            .map(|genome| genome.evaluate(inputs))
            .collect()
    }

    pub fn evaluate_all_argmax(&self, inputs: &[f64]) -> Result<Vec<usize>> {
        self.species
            .iter()
            .flat_map(|s| s.members())
            .map(|genome| genome.evaluate_argmax(inputs))
            .collect()
    }

    /// Same as `evaluate_all`, spread over `num_threads` scoped threads.
    pub fn evaluate_all_parallel(&self, inputs: &[f64], num_threads: usize) -> Result<Vec<Vec<f64>>> {
        let members = self.members();
        concurrency::par_map(&members, num_threads, |genome| genome.evaluate(inputs))
            .into_iter()
            .collect()
    }

    /// Assigns fitness to the current members (in `members()` order) and builds the next
    /// generation.
    pub fn advance_generation(&mut self, fitness_values: &[f64]) -> Result<()> {
        let expected = self.num_members();
        if fitness_values.len() != expected {
            return Err(NeatError::FitnessArity {
                expected,
                found: fitness_values.len(),
            });
        }

        let members = self.species.iter_mut().flat_map(|s| s.members_mut().iter_mut());
        for (genome, fitness) in members.zip(fitness_values) {
            genome.set_fitness(*fitness);
        }
        self.phase = GenerationPhase::Evaluated;
        debug!("generation {} evaluated, {} species", self.generation, self.species.len());

        self.phase = GenerationPhase::Speciating;
        self.speciate()?;

        self.phase = GenerationPhase::Pruning;
        self.prune();

        self.phase = GenerationPhase::QuotaAllocating;
        let averages: Vec<f64> = self.species.iter().map(|s| s.average_fitness()).collect();
        let quotas = match allocate_quotas(&averages, self.params.num_individuals) {
            Ok(quotas) => quotas,
            Err(e) => {
                warn!("{}, splitting the next generation evenly", e);
                even_split(self.species.len(), self.params.num_individuals)
            }
        };
        debug!("quotas: {:?}", quotas);

        self.phase = GenerationPhase::Repopulating;
        for (species, quota) in self.species.iter_mut().zip(quotas) {
            species.repopulate(quota, &self.params.species, &self.params.genome, &self.tracker, &mut self.rng)?;
        }
        self.species.retain(|s| !s.is_empty());

        self.phase = GenerationPhase::Flattened;
        self.generation += 1;

        info!(
            "generation {}: {} species, {} members, best fitness {:.4}",
            self.generation,
            self.species.len(),
            self.num_members(),
            self.champion().map_or(0.0, |c| c.fitness())
        );

        Ok(())
    }

    // every species keeps one random member as representative, everyone else is placed in the
    // first compatible species or founds a new one
    fn speciate(&mut self) -> Result<()> {
        let mut unassigned = Vec::with_capacity(self.num_members());
        for species in &mut self.species {
            unassigned.extend(species.prepare_for_speciation(&mut self.rng)?);
        }

        for genome in unassigned {
            let compatibility = &self.params.compatibility;
            match self.species.iter_mut().find(|s| s.is_compatible(&genome, compatibility)) {
                Some(species) => species.add_member(genome),
                None => {
                    debug!("new species {}", self.next_species_id);
                    self.species.push(Species::new(self.next_species_id, genome));
                    self.next_species_id += 1;
                }
            }
        }

        Ok(())
    }

    // empty and stagnant species are dropped, though never every last one
    fn prune(&mut self) {
        self.species.retain(|s| !s.is_empty());

        let limit = self.params.population.generations_before_extinct;
        let mut stagnant = Vec::new();
        for mut species in std::mem::take(&mut self.species) {
            if species.update_stagnation() >= limit {
                stagnant.push(species);
            } else {
                self.species.push(species);
            }
        }

        for species in &stagnant {
            debug!(
                "species {} went extinct after {} generations without improvement",
                species.id(),
                species.generations_since_improvement()
            );
        }

        if self.species.is_empty() {
            if let Some(mut best) = stagnant
                .into_iter()
                .max_by(|a, b| a.average_fitness().total_cmp(&b.average_fitness()))
            {
                warn!("every species stagnated, keeping species {}", best.id());
                best.reset_stagnation();
                self.species.push(best);
            }
        }
    }
}

/// Offspring count per species, proportional to average fitness:
/// `round(average / total * population_size)`. Negative averages count as zero, both for their
/// own quota and in the total.
///
/// Fails with `DegenerateFitness` when the total is not positive or every quota rounds to zero.
pub fn allocate_quotas(averages: &[f64], population_size: usize) -> Result<Vec<usize>> {
    let shares: Vec<f64> = averages.iter().map(|avg| avg.max(0.0)).collect();
    let total: f64 = shares.iter().sum();
    if !(total.is_finite() && total > 0.0) {
        return Err(NeatError::DegenerateFitness);
    }

    let quotas: Vec<usize> = shares
        .iter()
        .map(|share| (share / total * population_size as f64).round() as usize)
        .collect();

    if population_size > 0 && quotas.iter().all(|q| *q == 0) {
        return Err(NeatError::DegenerateFitness);
    }

    Ok(quotas)
}

/// `population_size` split as evenly as possible, the remainder going to the first species.
pub fn even_split(num_species: usize, population_size: usize) -> Vec<usize> {
    if num_species == 0 {
        return Vec::new();
    }
    let mut quotas = vec![population_size / num_species; num_species];
    quotas[0] += population_size % num_species;
    quotas
}
