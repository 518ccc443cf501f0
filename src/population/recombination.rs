use log::trace;
use rand::prelude::*;

use crate::neural_network::edge::Edge;
use crate::neural_network::node::{Activation, Node, NodeKind};
use crate::population::genome::Genome;
use crate::population::params::CompatibilityParams;

/// Which of the two aligned genomes a gene came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Parent {
    First,
    Second,
}

/// One innovation number present in at least one of two aligned genomes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Locus<'a> {
    /// Both genomes carry the gene.
    Matching(&'a Edge, &'a Edge),
    /// Only one genome carries it, inside the other's innovation range.
    Disjoint(Parent, &'a Edge),
    /// Only one genome carries it, beyond the other's largest innovation number.
    Excess(Parent, &'a Edge),
}

/// This struct handles all of the logic associated with comparing genomes gene for gene. That
/// need arises in two places: measuring the similarity of genomes when assigning species, and
/// building a child from two parents.
///
/// Loci are held in ascending innovation order, so walking them is the same merge scan the
/// counts were taken from.
#[derive(Clone, Debug)]
pub struct Alignment<'a> {
    loci: Vec<Locus<'a>>,
    num_matching: usize,
    num_disjoint: usize,
    num_excess: usize,
    weight_difference: f64, // sum of |w0 - w1| over matching genes
}

impl<'a> Alignment<'a> {
    pub fn from_parents(p0: &'a Genome, p1: &'a Genome) -> Alignment<'a> {
        let max0 = p0.max_innovation();
        let max1 = p1.max_innovation();

        // a gene the other genome lacks is excess past the other's last innovation
        let unique = |parent: Parent, edge: &'a Edge| {
            let other_max = match parent {
                Parent::First => max1,
                Parent::Second => max0,
            };
            match other_max {
                Some(max) if edge.innov <= max => Locus::Disjoint(parent, edge),
                _ => Locus::Excess(parent, edge),
            }
        };

        let mut genes0 = p0.connections().peekable();
        let mut genes1 = p1.connections().peekable();
        let mut loci = Vec::with_capacity(p0.num_connections().max(p1.num_connections()));

        loop {
            let locus = match (genes0.peek().copied(), genes1.peek().copied()) {
                (Some(a), Some(b)) if a.innov == b.innov => {
                    let locus = Locus::Matching(a, b);
                    genes0.next();
                    genes1.next();
                    locus
                }
                (Some(a), Some(b)) if a.innov < b.innov => {
                    let locus = unique(Parent::First, a);
                    genes0.next();
                    locus
                }
                (_, Some(b)) => {
                    let locus = unique(Parent::Second, b);
                    genes1.next();
                    locus
                }
                (Some(a), None) => {
                    let locus = unique(Parent::First, a);
                    genes0.next();
                    locus
                }
                (None, None) => break,
            };
            loci.push(locus);
        }

        let mut alignment = Alignment {
            loci,
            num_matching: 0,
            num_disjoint: 0,
            num_excess: 0,
            weight_difference: 0.0,
        };

        for locus in &alignment.loci {
            match locus {
                Locus::Matching(a, b) => {
                    alignment.num_matching += 1;
                    alignment.weight_difference += (a.weight - b.weight).abs();
                }
                Locus::Disjoint(..) => alignment.num_disjoint += 1,
                Locus::Excess(..) => alignment.num_excess += 1,
            }
        }

        alignment
    }

    pub fn loci(&self) -> &[Locus<'a>] {
        &self.loci
    }

    pub fn num_matching(&self) -> usize {
        self.num_matching
    }

    pub fn num_disjoint(&self) -> usize {
        self.num_disjoint
    }

    pub fn num_excess(&self) -> usize {
        self.num_excess
    }

    /// Mean absolute weight difference over matching genes, 0 when nothing matches.
    pub fn mean_weight_difference(&self) -> f64 {
        if self.num_matching == 0 {
            return 0.0;
        }
        self.weight_difference / self.num_matching as f64
    }
}

/// `c1*E/N + c2*D/N + c3*W`, where `N` is the larger gene count and `W` the mean weight
/// difference of matching genes. `N` is taken as 1 while both genomes are smaller than
/// `normalize_threshold`. Symmetric in its arguments.
pub fn compatibility_distance(p0: &Genome, p1: &Genome, params: &CompatibilityParams) -> f64 {
    let alignment = Alignment::from_parents(p0, p1);

    let larger = p0.num_connections().max(p1.num_connections());
    let n = match larger < params.normalize_threshold {
        true => 1.0,
        false => larger.max(1) as f64,
    };

    params.excess_coefficient * alignment.num_excess() as f64 / n
        + params.disjoint_coefficient * alignment.num_disjoint() as f64 / n
        + params.weight_coefficient * alignment.mean_weight_difference()
}

/// Builds a child from two parents.
///
/// Matching genes are copied from a random parent, and come out disabled with probability
/// `disable_rate` whenever either parent had them disabled. Disjoint and excess genes come from
/// the fitter parent only, or from either with even odds when fitness is tied. Genes that would
/// close a cycle or duplicate an edge already inherited are dropped, which can only happen when
/// genes of both parents are mixed.
pub fn crossover<R: Rng>(p0: &Genome, p1: &Genome, disable_rate: f64, rng: &mut R) -> Genome {
    let fitter = if p0.fitness() > p1.fitness() {
        Some(Parent::First)
    } else if p1.fitness() > p0.fitness() {
        Some(Parent::Second)
    } else {
        None
    };
    let donor_genome = |parent: Parent| match parent {
        Parent::First => p0,
        Parent::Second => p1,
    };

    // fixed nodes keep the activations of the leading parent
    let lead = donor_genome(fitter.unwrap_or(Parent::First));
    let mut child = Genome::skeleton(p0.num_inputs(), p0.num_outputs(), Activation::default());
    for node in lead.nodes().filter(|node| node.kind != NodeKind::Hidden) {
        child.insert_node(node.clone());
    }

    let mut graph = child.graph();
    let alignment = Alignment::from_parents(p0, p1);

    for locus in alignment.loci() {
        let (donor, gene) = match *locus {
            Locus::Matching(a, b) => {
                let (donor, picked) = if rng.gen::<bool>() { (Parent::First, a) } else { (Parent::Second, b) };
                let mut gene = picked.clone();
                if !a.enabled || !b.enabled {
                    gene.enabled = rng.gen::<f64>() >= disable_rate;
                }
                (donor, gene)
            }
            Locus::Disjoint(parent, edge) | Locus::Excess(parent, edge) => {
                let inherit = match fitter {
                    Some(better) => better == parent,
                    None => rng.gen::<bool>(),
                };
                if !inherit {
                    continue;
                }
                (parent, edge.clone())
            }
        };

        let (source, target) = gene.endpoints();
        if child.are_connected(source, target) || graph.would_create_cycle(source, target) {
            trace!("dropped gene {} ({} -> {}) while crossing", gene.innov, source, target);
            continue;
        }

        for id in [source, target] {
            if child.node(id).is_none() {
                child.insert_node(inherited_node(donor_genome(donor), id));
            }
        }
        graph.add_edge(source, target);
        child.insert_connection(gene);
    }

    child
}

// node as carried by the donor, with its role rebuilt from the id layout
fn inherited_node(donor: &Genome, id: usize) -> Node {
    let kind = NodeKind::from_id(id, donor.num_inputs(), donor.num_outputs());
    let activation = donor.node(id).map(|node| node.activation).unwrap_or_default();
    Node::new(id, kind, activation)
}
