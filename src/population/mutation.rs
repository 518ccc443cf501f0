use log::trace;
use rand::prelude::*;
use rand_distr::Uniform;

use crate::error::Result;
use crate::neural_network::edge::{Edge, WEIGHT_BOUND};
use crate::neural_network::node::{Node, NodeKind};
use crate::population::genome::Genome;
use crate::population::innovation_tracker::InnovationTracker;
use crate::population::params::GenomeParams;

impl Genome {
    /// The full mutation step applied to every child: weights first, then possibly a new node and
    /// possibly a new connection, each at its configured rate.
    pub fn mutate<R: Rng>(&mut self, params: &GenomeParams, tracker: &InnovationTracker, rng: &mut R) -> Result<()> {
        self.mutate_weights(
            params.weight_mutate_rate,
            params.weight_randomize_rate,
            params.weight_perturb_power,
            rng,
        );

        if rng.gen::<f64>() < params.new_node_rate {
            self.mutate_add_node(params, tracker, rng);
        }

        if rng.gen::<f64>() < params.new_connection_rate {
            self.mutate_add_connection(tracker, rng)?;
        }

        Ok(())
    }

    /// Each gene's weight is touched with probability `mutate_rate`; a touched weight is replaced
    /// by a fresh uniform value with probability `randomize_rate`, otherwise nudged by at most
    /// `perturb_power` and clamped.
    pub fn mutate_weights<R: Rng>(&mut self, mutate_rate: f64, randomize_rate: f64, perturb_power: f64, rng: &mut R) {
        let fresh = Uniform::new_inclusive(-WEIGHT_BOUND, WEIGHT_BOUND);
        let power = perturb_power.abs();
        let nudge = Uniform::new_inclusive(-power, power);

        for gene in self.connections_mut() {
            if rng.gen::<f64>() < mutate_rate {
                if rng.gen::<f64>() < randomize_rate {
                    gene.weight = fresh.sample(rng);
                } else {
                    gene.perturb(nudge.sample(rng));
                }
            }
        }
    }

    /// Every pair of nodes that may receive a new gene, oriented along the current topological
    /// order so that adding any of them keeps the genome acyclic.
    pub fn unconnected_pairs(&self) -> Result<Vec<(usize, usize)>> {
        let order = self.topological_order()?;
        let kind = |id: &usize| self.node(*id).map(|node| node.kind);

        let mut pairs = Vec::new();
        for (i, source) in order.iter().enumerate() {
            for target in &order[i + 1..] {
                let (Some(source_kind), Some(target_kind)) = (kind(source), kind(target)) else {
                    continue;
                };

                let forbidden = matches!(
                    (source_kind, target_kind),
                    (NodeKind::Input, NodeKind::Input)
                        | (NodeKind::Output, NodeKind::Output)
                        | (NodeKind::Input, NodeKind::Bias)
                        | (NodeKind::Bias, NodeKind::Input)
                );

                if forbidden || target_kind.is_source() || self.are_connected(*source, *target) {
                    continue;
                }

                pairs.push((*source, *target));
            }
        }

        Ok(pairs)
    }

    /// Adds a gene between a random unconnected pair. Returns the innovation number of the new
    /// gene, or `None` when the genome is already saturated.
    pub fn mutate_add_connection<R: Rng>(&mut self, tracker: &InnovationTracker, rng: &mut R) -> Result<Option<usize>> {
        let pairs = self.unconnected_pairs()?;
        let Some((source, target)) = pairs.choose(rng).copied() else {
            return Ok(None);
        };

        let innov = tracker.innovation_for(source, target);
        let weight = rng.gen_range(-WEIGHT_BOUND..=WEIGHT_BOUND);
        self.insert_connection(Edge::new(innov, source, target, weight));
        trace!("new connection {} -> {} (innovation {})", source, target, innov);

        Ok(Some(innov))
    }

    /// Splits a random enabled gene with a new hidden node. The old gene is disabled but kept;
    /// the incoming half inherits its weight and the outgoing half gets 1.0, so the new path
    /// initially carries the old signal through the node's activation. Returns the new node id,
    /// or `None` when there is no enabled gene to split.
    pub fn mutate_add_node<R: Rng>(
        &mut self,
        params: &GenomeParams,
        tracker: &InnovationTracker,
        rng: &mut R,
    ) -> Option<usize> {
        let enabled: Vec<usize> = self.connections().filter(|gene| gene.enabled).map(|gene| gene.innov).collect();
        let split = *enabled.choose(rng)?;

        let old = self.connection_mut(split)?;
        old.disable();
        let (source, target, weight) = (old.source, old.target, old.weight);

        let new_id = self.allocate_node_id();
        self.insert_node(Node::new(new_id, NodeKind::Hidden, params.hidden_activation));

        let innov_in = tracker.innovation_for(source, new_id);
        let innov_out = tracker.innovation_for(new_id, target);
        self.insert_connection(Edge::new(innov_in, source, new_id, weight));
        self.insert_connection(Edge::new(innov_out, new_id, target, 1.0));
        trace!("split {} -> {} with node {} (innovations {}, {})", source, target, new_id, innov_in, innov_out);

        Some(new_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::neural_network::node::Activation;
    use rand::rngs::StdRng;
    use rstest::*;

    #[fixture]
    fn rng() -> StdRng {
        StdRng::seed_from_u64(1234)
    }

    #[fixture]
    fn tracker() -> InnovationTracker {
        InnovationTracker::new()
    }

    #[fixture]
    fn two_by_two(tracker: InnovationTracker, mut rng: StdRng) -> Genome {
        Genome::new_minimal(2, 2, &tracker, &GenomeParams::default(), &mut rng)
    }

    fn phi(x: f64) -> f64 {
        1. / (1. + (-4.9 * x).exp())
    }

    #[rstest]
    fn test_insert_node(mut two_by_two: Genome, tracker: InnovationTracker, mut rng: StdRng) {
        let nodes_before = two_by_two.num_nodes();
        let genes_before = two_by_two.num_connections();

        let new_id = two_by_two.mutate_add_node(&GenomeParams::default(), &tracker, &mut rng).unwrap();

        assert_eq!(new_id, 5);
        assert_eq!(two_by_two.num_nodes(), nodes_before + 1);
        assert_eq!(two_by_two.num_connections(), genes_before + 2);
        assert_eq!(two_by_two.node(new_id).unwrap().kind, NodeKind::Hidden);

        // exactly one gene was disabled and it is the one that was split
        let disabled: Vec<&Edge> = two_by_two.connections().filter(|e| !e.enabled).collect();
        assert_eq!(disabled.len(), 1);
        let (source, target) = disabled[0].endpoints();
        let inbound = two_by_two.connection_between(source, new_id).unwrap();
        let outbound = two_by_two.connection_between(new_id, target).unwrap();
        assert_eq!(inbound.weight, disabled[0].weight);
        assert_eq!(outbound.weight, 1.0);
    }

    #[rstest]
    fn test_split_composition(tracker: InnovationTracker, mut rng: StdRng) {
        let mut genome = Genome::new_minimal(2, 2, &tracker, &GenomeParams::default(), &mut rng);

        // leave a single enabled gene so the split is forced onto 0 -> 2
        let others: Vec<usize> = genome.connections().filter(|e| e.endpoints() != (0, 2)).map(|e| e.innov).collect();
        for innov in &others {
            genome.connection_mut(*innov).unwrap().disable();
        }
        let new_id = genome.mutate_add_node(&GenomeParams::default(), &tracker, &mut rng).unwrap();
        for innov in &others {
            genome.connection_mut(*innov).unwrap().enable();
        }

        let w = [0.6, -0.3, 0.8, 0.2, -0.5, 0.4, -0.7];
        genome.connection_between_mut(0, new_id).unwrap().weight = w[0];
        genome.connection_between_mut(new_id, 2).unwrap().weight = w[1];
        genome.connection_between_mut(0, 3).unwrap().weight = w[2];
        genome.connection_between_mut(1, 2).unwrap().weight = w[3];
        genome.connection_between_mut(1, 3).unwrap().weight = w[4];
        genome.connection_between_mut(4, 2).unwrap().weight = w[5];
        genome.connection_between_mut(4, 3).unwrap().weight = w[6];

        let (i0, i1) = (0.35, 0.9);
        let outputs = genome.evaluate(&[i0, i1]).unwrap();

        // the disabled 0 -> 2 gene contributes nothing
        let expected_2 = phi(w[1] * phi(w[0] * i0) + w[3] * i1 + w[5]);
        let expected_3 = phi(w[2] * i0 + w[4] * i1 + w[6]);
        assert!((outputs[0] - expected_2).abs() < 1e-12);
        assert!((outputs[1] - expected_3).abs() < 1e-12);
    }

    #[rstest]
    fn test_no_enabled_genes_no_split(mut two_by_two: Genome, tracker: InnovationTracker, mut rng: StdRng) {
        for edge in two_by_two.connections_mut() {
            edge.disable();
        }
        assert_eq!(two_by_two.mutate_add_node(&GenomeParams::default(), &tracker, &mut rng), None);
    }

    #[rstest]
    fn test_minimal_genome_is_saturated(two_by_two: Genome) {
        assert!(two_by_two.unconnected_pairs().unwrap().is_empty());
    }

    #[rstest]
    fn test_unconnected_pairs_follow_order(mut two_by_two: Genome, tracker: InnovationTracker, mut rng: StdRng) {
        let new_id = two_by_two.mutate_add_node(&GenomeParams::default(), &tracker, &mut rng).unwrap();
        let order = two_by_two.topological_order().unwrap();
        let position = |id: usize| order.iter().position(|x| *x == id).unwrap();

        let pairs = two_by_two.unconnected_pairs().unwrap();
        assert!(!pairs.is_empty());
        for (source, target) in &pairs {
            assert!(position(*source) < position(*target));
            assert!(!two_by_two.node(*target).unwrap().kind.is_source());
            assert!(!two_by_two.are_connected(*source, *target));
        }
        // the new node can still reach the output it does not feed yet
        assert!(pairs.iter().any(|(s, t)| *s == new_id || *t == new_id));
    }

    #[rstest]
    fn test_add_connection(mut two_by_two: Genome, tracker: InnovationTracker, mut rng: StdRng) {
        two_by_two.mutate_add_node(&GenomeParams::default(), &tracker, &mut rng).unwrap();
        let before = two_by_two.num_connections();

        let innov = two_by_two.mutate_add_connection(&tracker, &mut rng).unwrap().unwrap();

        assert_eq!(two_by_two.num_connections(), before + 1);
        let gene = two_by_two.connection(innov).unwrap();
        assert!(gene.enabled);
        assert!(gene.weight.abs() <= WEIGHT_BOUND);
        assert_eq!(tracker.lookup(gene.source, gene.target), Some(innov));
        assert!(two_by_two.topological_order().is_ok());
    }

    #[rstest]
    fn test_saturated_add_connection_is_noop(mut two_by_two: Genome, tracker: InnovationTracker, mut rng: StdRng) {
        let before = two_by_two.clone();
        assert_eq!(two_by_two.mutate_add_connection(&tracker, &mut rng).unwrap(), None);
        assert_eq!(two_by_two, before);
    }

    #[rstest]
    fn test_same_structure_same_innovation(tracker: InnovationTracker, mut rng: StdRng) {
        let params = GenomeParams::default();
        let mut a = Genome::new_minimal(2, 1, &tracker, &params, &mut rng);
        let mut b = Genome::new_minimal(2, 1, &tracker, &params, &mut rng);

        // both split their only 0 -> 2 gene, then wire input 1 into the new node
        for genome in [&mut a, &mut b] {
            let keep = genome.connection_between(0, 2).unwrap().innov;
            let others: Vec<usize> = genome.connections().map(|e| e.innov).filter(|i| *i != keep).collect();
            others.iter().for_each(|i| genome.connection_mut(*i).unwrap().disable());
            let new_id = genome.mutate_add_node(&params, &tracker, &mut rng).unwrap();
            others.iter().for_each(|i| genome.connection_mut(*i).unwrap().enable());
            assert_eq!(new_id, 4);
        }

        assert_eq!(a.connection_between(0, 4).unwrap().innov, b.connection_between(0, 4).unwrap().innov);
        assert_eq!(a.connection_between(4, 2).unwrap().innov, b.connection_between(4, 2).unwrap().innov);

        // keep adding connections until both have grown 1 -> 4
        while a.connection_between(1, 4).is_none() {
            a.mutate_add_connection(&tracker, &mut rng).unwrap();
        }
        while b.connection_between(1, 4).is_none() {
            b.mutate_add_connection(&tracker, &mut rng).unwrap();
        }
        assert_eq!(a.connection_between(1, 4).unwrap().innov, b.connection_between(1, 4).unwrap().innov);
    }

    #[rstest]
    #[case(0.0, 0.0)]
    #[case(1.0, 0.0)]
    #[case(1.0, 1.0)]
    fn test_mutate_weights(
        mut two_by_two: Genome,
        mut rng: StdRng,
        #[case] mutate_rate: f64,
        #[case] randomize_rate: f64,
    ) {
        let before: Vec<f64> = two_by_two.connections().map(|e| e.weight).collect();
        two_by_two.mutate_weights(mutate_rate, randomize_rate, 0.2, &mut rng);
        let after: Vec<f64> = two_by_two.connections().map(|e| e.weight).collect();

        for (old, new) in before.iter().zip(&after) {
            assert!(new.abs() <= WEIGHT_BOUND);
            if mutate_rate == 0.0 {
                assert_eq!(old, new);
            } else if randomize_rate == 0.0 {
                assert!((old - new).abs() <= 0.2 + 1e-12);
            }
        }
    }

    #[rstest]
    fn test_hidden_activation_from_params(mut two_by_two: Genome, tracker: InnovationTracker, mut rng: StdRng) {
        let params = GenomeParams {
            hidden_activation: Activation::Relu,
            ..GenomeParams::default()
        };
        let new_id = two_by_two.mutate_add_node(&params, &tracker, &mut rng).unwrap();
        assert_eq!(two_by_two.node(new_id).unwrap().activation, Activation::Relu);
    }

    #[rstest]
    fn test_mutate_keeps_genome_acyclic(mut two_by_two: Genome, tracker: InnovationTracker, mut rng: StdRng) {
        let params = GenomeParams {
            new_node_rate: 0.5,
            new_connection_rate: 0.8,
            ..GenomeParams::default()
        };
        for _ in 0..200 {
            two_by_two.mutate(&params, &tracker, &mut rng).unwrap();
        }
        assert!(two_by_two.num_nodes() > 5);
        assert!(two_by_two.evaluate(&[0.5, -0.5]).is_ok());
    }
}
