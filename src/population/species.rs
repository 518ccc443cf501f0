use log::trace;
use rand::prelude::*;

use crate::error::{NeatError, Result};
use crate::population::genome::Genome;
use crate::population::innovation_tracker::InnovationTracker;
use crate::population::params::{CompatibilityParams, GenomeParams, SpeciesParams};
use crate::population::recombination::{compatibility_distance, crossover};

/// Read-only snapshot of a species for monitoring.
#[derive(Clone, Debug, PartialEq)]
pub struct SpeciesSummary {
    pub id: usize,
    pub size: usize,
    pub average_fitness: f64,
    pub best_fitness: f64,
    pub generations_since_improvement: usize,
}

/// A cluster of structurally similar genomes. Members compete with each other rather than with
/// the whole population, and the species as a whole is scored by its average fitness.
#[derive(Clone, Debug)]
pub struct Species {
    id: usize,
    members: Vec<Genome>,
    representative: Genome,
    champion: Option<Genome>,
    best_fitness: f64,
    generations_since_improvement: usize,
}

impl Species {
    /// A new species modeled after `representative`, which is also its first member.
    pub fn new(id: usize, representative: Genome) -> Species {
        Species {
            id,
            members: vec![representative.clone()],
            champion: Some(representative.clone()),
            representative,
            best_fitness: f64::NEG_INFINITY,
            generations_since_improvement: 0,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn members(&self) -> &[Genome] {
        &self.members
    }

    pub fn members_mut(&mut self) -> &mut [Genome] {
        &mut self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn representative(&self) -> &Genome {
        &self.representative
    }

    /// Best member of the last evaluated generation.
    pub fn champion(&self) -> Option<&Genome> {
        self.champion.as_ref()
    }

    pub fn best_fitness(&self) -> f64 {
        self.best_fitness
    }

    pub fn generations_since_improvement(&self) -> usize {
        self.generations_since_improvement
    }

    pub fn add_member(&mut self, genome: Genome) {
        self.members.push(genome);
    }

    /// Picks a random member as the new representative, keeps it as the only member and hands
    /// back everyone else so they can be placed again.
    pub fn prepare_for_speciation<R: Rng>(&mut self, rng: &mut R) -> Result<Vec<Genome>> {
        if self.members.is_empty() {
            return Err(NeatError::InsufficientMembers);
        }

        self.set_champion();

        let rep_i = rng.gen_range(0..self.members.len());
        let representative = self.members.swap_remove(rep_i);
        let left_over = std::mem::replace(&mut self.members, vec![representative.clone()]);
        self.representative = representative;

        Ok(left_over)
    }

    /// Whether `genome` is close enough to the representative to join.
    pub fn is_compatible(&self, genome: &Genome, params: &CompatibilityParams) -> bool {
        compatibility_distance(genome, &self.representative, params) < params.threshold
    }

    /// Mean member fitness, 0 for an empty species.
    pub fn average_fitness(&self) -> f64 {
        if self.members.is_empty() {
            return 0.0;
        }
        self.members.iter().map(|m| m.fitness()).sum::<f64>() / self.members.len() as f64
    }

    /// Compares the current average to the best one seen, returning the updated stagnation count.
    ///
    /// The record starts at negative infinity, so the first evaluated average always counts as an
    /// improvement, even for tasks scored entirely below zero. Ties are not improvements.
    pub fn update_stagnation(&mut self) -> usize {
        let current = self.average_fitness();
        if current > self.best_fitness {
            self.best_fitness = current;
            self.generations_since_improvement = 0;
        } else {
            self.generations_since_improvement += 1;
        }
        self.generations_since_improvement
    }

    pub fn reset_stagnation(&mut self) {
        self.generations_since_improvement = 0;
    }

    /// Members sorted by decreasing fitness.
    pub fn sort_members(&mut self) {
        self.members.sort_by(|a, b| b.fitness().total_cmp(&a.fitness()));
    }

    pub fn set_champion(&mut self) {
        self.sort_members();
        self.champion = self.members.first().cloned();
    }

    /// Drops the worse half of the members once the species is larger than `min_size`. Small
    /// species are never culled.
    pub fn cull(&mut self, min_size: usize) {
        self.sort_members();
        if self.members.len() > min_size {
            let keep = self.members.len().div_ceil(2);
            self.members.truncate(keep);
        }
    }

    /// Replaces the members with `quota` offspring of the current ones.
    ///
    /// A species larger than `min_size` keeps its best member unchanged and is culled to its
    /// better half first. Up to `clone_fraction` of the quota is then filled with mutated copies
    /// of random survivors, and the rest with mutated children of two random survivors, a
    /// survivor possibly mating with itself.
    pub fn repopulate<R: Rng>(
        &mut self,
        quota: usize,
        params: &SpeciesParams,
        genome_params: &GenomeParams,
        tracker: &InnovationTracker,
        rng: &mut R,
    ) -> Result<()> {
        if self.members.is_empty() {
            return Err(NeatError::InsufficientMembers);
        }

        self.set_champion();
        let keeps_elite = params.elitism && self.members.len() > params.min_size;
        self.cull(params.min_size);

        let mut offspring = Vec::with_capacity(quota);

        if keeps_elite && quota > 0 {
            offspring.extend(self.champion.clone());
        }

        let num_clones = (quota as f64 * params.clone_fraction).ceil() as usize;
        while offspring.len() < num_clones.min(quota) {
            let mut child = self.random_member(rng)?.clone();
            child.set_fitness(0.0);
            child.mutate(genome_params, tracker, rng)?;
            offspring.push(child);
        }

        while offspring.len() < quota {
            let p0 = self.random_member(rng)?;
            let p1 = self.random_member(rng)?;
            let mut child = crossover(p0, p1, params.disable_rate, rng);
            child.mutate(genome_params, tracker, rng)?;
            offspring.push(child);
        }

        trace!("species {} repopulated with {} members", self.id, offspring.len());
        self.members = offspring;
        Ok(())
    }

    fn random_member<R: Rng>(&self, rng: &mut R) -> Result<&Genome> {
        self.members.choose(rng).ok_or(NeatError::InsufficientMembers)
    }

    pub fn summary(&self) -> SpeciesSummary {
        SpeciesSummary {
            id: self.id,
            size: self.members.len(),
            average_fitness: self.average_fitness(),
            best_fitness: self.best_fitness,
            generations_since_improvement: self.generations_since_improvement,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rstest::{fixture, rstest};

    #[fixture]
    fn rng() -> StdRng {
        StdRng::seed_from_u64(5)
    }

    #[fixture]
    fn tracker() -> InnovationTracker {
        InnovationTracker::new()
    }

    // members with fitness 0, 1, ..., n - 1
    fn ranked_species(n: usize, tracker: &InnovationTracker, rng: &mut StdRng) -> Species {
        let params = GenomeParams::default();
        let mut founder = Genome::new_minimal(2, 1, tracker, &params, rng);
        founder.set_fitness(0.0);
        let mut species = Species::new(0, founder);
        for i in 1..n {
            let mut member = Genome::new_minimal(2, 1, tracker, &params, rng);
            member.set_fitness(i as f64);
            species.add_member(member);
        }
        species
    }

    #[rstest]
    fn test_new_species(tracker: InnovationTracker, mut rng: StdRng) {
        let rep = Genome::new_minimal(2, 1, &tracker, &GenomeParams::default(), &mut rng);
        let species = Species::new(3, rep.clone());
        assert_eq!(species.id(), 3);
        assert_eq!(species.members(), &[rep.clone()]);
        assert_eq!(species.representative(), &rep);
        assert_eq!(species.champion(), Some(&rep));
    }

    #[rstest]
    fn test_prepare_for_speciation(tracker: InnovationTracker, mut rng: StdRng) {
        let mut species = ranked_species(6, &tracker, &mut rng);
        let left_over = species.prepare_for_speciation(&mut rng).unwrap();

        assert_eq!(left_over.len(), 5);
        assert_eq!(species.len(), 1);
        assert_eq!(&species.members()[0], species.representative());
        assert_eq!(species.champion().unwrap().fitness(), 5.0);
    }

    #[rstest]
    fn test_empty_species_is_an_error(tracker: InnovationTracker, mut rng: StdRng) {
        let mut species = ranked_species(1, &tracker, &mut rng);
        species.members.clear();
        assert!(matches!(species.prepare_for_speciation(&mut rng), Err(NeatError::InsufficientMembers)));
        assert!(matches!(
            species.repopulate(4, &SpeciesParams::default(), &GenomeParams::default(), &tracker, &mut rng),
            Err(NeatError::InsufficientMembers)
        ));
    }

    #[rstest]
    fn test_is_compatible(tracker: InnovationTracker, mut rng: StdRng) {
        let species = ranked_species(1, &tracker, &mut rng);
        let near = Genome::new_minimal(2, 1, &tracker, &GenomeParams::default(), &mut rng);

        let mut far = near.clone();
        for _ in 0..4 {
            far.mutate_add_node(&GenomeParams::default(), &tracker, &mut rng);
        }

        let params = CompatibilityParams::default();
        assert!(species.is_compatible(&near, &params));
        assert!(!species.is_compatible(&far, &params));
    }

    #[rstest]
    #[case(4, 4)]
    #[case(5, 5)]
    #[case(6, 3)]
    #[case(11, 6)]
    fn test_cull(tracker: InnovationTracker, mut rng: StdRng, #[case] size: usize, #[case] survivors: usize) {
        let mut species = ranked_species(size, &tracker, &mut rng);
        species.cull(5);
        assert_eq!(species.len(), survivors);
        // the best are the ones left
        assert_eq!(species.members()[0].fitness(), (size - 1) as f64);
        assert_eq!(species.members().last().unwrap().fitness(), (size - survivors) as f64);
    }

    #[rstest]
    fn test_stagnation(tracker: InnovationTracker, mut rng: StdRng) {
        let mut species = ranked_species(3, &tracker, &mut rng);
        assert_eq!(species.average_fitness(), 1.0);

        assert_eq!(species.update_stagnation(), 0);
        assert_eq!(species.best_fitness(), 1.0);
        assert_eq!(species.update_stagnation(), 1);
        assert_eq!(species.update_stagnation(), 2);

        species.members_mut()[0].set_fitness(3.0);
        assert_eq!(species.update_stagnation(), 0);
        assert_eq!(species.best_fitness(), 2.0);
    }

    #[rstest]
    fn test_first_average_sets_record(tracker: InnovationTracker, mut rng: StdRng) {
        let mut species = ranked_species(1, &tracker, &mut rng);
        assert_eq!(species.best_fitness(), f64::NEG_INFINITY);

        assert_eq!(species.update_stagnation(), 0);
        assert_eq!(species.best_fitness(), 0.0);
        assert_eq!(species.update_stagnation(), 1);
    }

    #[rstest]
    fn test_negative_fitness_can_improve(tracker: InnovationTracker, mut rng: StdRng) {
        let mut species = ranked_species(3, &tracker, &mut rng);
        let set_all = |species: &mut Species, fitness: f64| {
            species.members_mut().iter_mut().for_each(|m| m.set_fitness(fitness));
        };

        set_all(&mut species, -5.0);
        assert_eq!(species.update_stagnation(), 0);
        assert_eq!(species.update_stagnation(), 1);

        set_all(&mut species, -2.0);
        assert_eq!(species.update_stagnation(), 0);
        assert_eq!(species.best_fitness(), -2.0);

        set_all(&mut species, -3.0);
        assert_eq!(species.update_stagnation(), 1);
        assert_eq!(species.best_fitness(), -2.0);
    }

    #[rstest]
    #[case(10, 20)]
    #[case(3, 7)]
    #[case(8, 1)]
    fn test_repopulate_fills_quota(
        tracker: InnovationTracker,
        mut rng: StdRng,
        #[case] size: usize,
        #[case] quota: usize,
    ) {
        let mut species = ranked_species(size, &tracker, &mut rng);
        species
            .repopulate(quota, &SpeciesParams::default(), &GenomeParams::default(), &tracker, &mut rng)
            .unwrap();
        assert_eq!(species.len(), quota);
        assert_eq!(species.champion().unwrap().fitness(), (size - 1) as f64);
    }

    #[rstest]
    fn test_elite_survives_unchanged(tracker: InnovationTracker, mut rng: StdRng) {
        let mut species = ranked_species(10, &tracker, &mut rng);
        let best = species.members()[9].clone();

        species
            .repopulate(12, &SpeciesParams::default(), &GenomeParams::default(), &tracker, &mut rng)
            .unwrap();
        assert_eq!(species.members()[0], best);
        // everyone else is a fresh child
        assert!(species.members()[1..].iter().all(|m| m.fitness() == 0.0));
    }

    #[rstest]
    fn test_small_species_keeps_no_elite(tracker: InnovationTracker, mut rng: StdRng) {
        let mut species = ranked_species(5, &tracker, &mut rng);
        species
            .repopulate(5, &SpeciesParams::default(), &GenomeParams::default(), &tracker, &mut rng)
            .unwrap();
        assert!(species.members().iter().all(|m| m.fitness() == 0.0));
    }

    #[rstest]
    fn test_zero_quota_empties_species(tracker: InnovationTracker, mut rng: StdRng) {
        let mut species = ranked_species(10, &tracker, &mut rng);
        species
            .repopulate(0, &SpeciesParams::default(), &GenomeParams::default(), &tracker, &mut rng)
            .unwrap();
        assert!(species.is_empty());
    }

    #[rstest]
    fn test_summary(tracker: InnovationTracker, mut rng: StdRng) {
        let mut species = ranked_species(4, &tracker, &mut rng);
        species.update_stagnation();
        let summary = species.summary();
        assert_eq!(summary.size, 4);
        assert_eq!(summary.average_fitness, 1.5);
        assert_eq!(summary.best_fitness, 1.5);
        assert_eq!(summary.generations_since_improvement, 0);
    }
}
