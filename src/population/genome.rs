use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::Path;

use rand::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{NeatError, Result};
use crate::neural_network::edge::{Edge, WEIGHT_BOUND};
use crate::neural_network::graph::Graph;
use crate::neural_network::node::{Activation, Node, NodeKind};
use crate::neural_network::{argmax, NeuralNetwork};
use crate::population::innovation_tracker::InnovationTracker;
use crate::population::params::GenomeParams;

/// An individual: nodes, connection genes and the counter for the next hidden node id.
///
/// Nodes are indexed by id and genes by innovation number, with a second index from
/// `(source, target)` to innovation so structural queries never scan. Node ids follow a fixed
/// layout: inputs first, then outputs, then the bias, then hidden nodes in creation order.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(into = "GenomeRecord", try_from = "GenomeRecord")]
pub struct Genome {
    num_inputs: usize,
    num_outputs: usize,
    nodes: BTreeMap<usize, Node>,
    connections: BTreeMap<usize, Edge>,
    links: HashMap<(usize, usize), usize>,
    next_node_id: usize,
    fitness: f64,
}

impl Genome {
    /// Genome that translates to a dense two-layer network: every input and the bias connected
    /// to every output with uniform random weights.
    pub fn new_minimal<R: Rng>(
        num_inputs: usize,
        num_outputs: usize,
        tracker: &InnovationTracker,
        params: &GenomeParams,
        rng: &mut R,
    ) -> Genome {
        let mut genome = Genome::skeleton(num_inputs, num_outputs, params.output_activation);

        let sources = (0..num_inputs).chain(std::iter::once(genome.bias_id()));
        for source in sources {
            for target in genome.output_ids().collect::<Vec<_>>() {
                let innov = tracker.innovation_for(source, target);
                let weight = rng.gen_range(-WEIGHT_BOUND..=WEIGHT_BOUND);
                genome.insert_connection(Edge::new(innov, source, target, weight));
            }
        }

        genome
    }

    /// Builds a genome from raw genes, checking every structural invariant.
    pub fn from_genes(num_inputs: usize, num_outputs: usize, nodes: Vec<Node>, edges: Vec<Edge>) -> Result<Genome> {
        let mut genome = Genome {
            num_inputs,
            num_outputs,
            nodes: BTreeMap::new(),
            connections: BTreeMap::new(),
            links: HashMap::new(),
            next_node_id: 0,
            fitness: 0.0,
        };

        for node in nodes {
            let expected = NodeKind::from_id(node.id, num_inputs, num_outputs);
            if node.kind != expected {
                return Err(NeatError::InvalidGenome(format!(
                    "node {} is {:?} but its id marks it as {:?}",
                    node.id, node.kind, expected
                )));
            }
            if genome.nodes.contains_key(&node.id) {
                return Err(NeatError::InvalidGenome(format!("duplicate node {}", node.id)));
            }
            genome.insert_node(node);
        }

        for id in 0..=genome.bias_id() {
            if !genome.nodes.contains_key(&id) {
                return Err(NeatError::InvalidGenome(format!("missing fixed node {}", id)));
            }
        }

        for edge in edges {
            let (source, target) = edge.endpoints();
            if !genome.nodes.contains_key(&source) || !genome.nodes.contains_key(&target) {
                return Err(NeatError::InvalidGenome(format!("gene {} references an unknown node", edge.innov)));
            }
            if genome.nodes[&target].kind.is_source() {
                return Err(NeatError::InvalidGenome(format!("gene {} feeds an input or the bias", edge.innov)));
            }
            if !genome.insert_connection(edge) {
                return Err(NeatError::InvalidGenome(format!(
                    "duplicate gene between {} and {}",
                    source, target
                )));
            }
        }

        genome.topological_order()?;
        Ok(genome)
    }

    /// Only the fixed input, output and bias nodes, no genes.
    pub(crate) fn skeleton(num_inputs: usize, num_outputs: usize, output_activation: Activation) -> Genome {
        let mut genome = Genome {
            num_inputs,
            num_outputs,
            nodes: BTreeMap::new(),
            connections: BTreeMap::new(),
            links: HashMap::new(),
            next_node_id: 0,
            fitness: 0.0,
        };

        for id in 0..=num_inputs + num_outputs {
            let kind = NodeKind::from_id(id, num_inputs, num_outputs);
            let activation = match kind {
                NodeKind::Output => output_activation,
                _ => Activation::Identity,
            };
            genome.insert_node(Node::new(id, kind, activation));
        }

        genome
    }

    /// Adds a node, keeping the id counter above every id in use.
    pub(crate) fn insert_node(&mut self, node: Node) {
        self.next_node_id = self.next_node_id.max(node.id + 1);
        self.nodes.insert(node.id, node);
    }

    /// Adds a gene unless its edge or innovation number is already present.
    pub(crate) fn insert_connection(&mut self, edge: Edge) -> bool {
        if self.links.contains_key(&edge.endpoints()) || self.connections.contains_key(&edge.innov) {
            return false;
        }
        self.links.insert(edge.endpoints(), edge.innov);
        self.connections.insert(edge.innov, edge);
        true
    }

    /// Hands out the id for a new hidden node.
    pub(crate) fn allocate_node_id(&mut self) -> usize {
        let id = self.next_node_id;
        self.next_node_id += 1;
        id
    }

    pub fn num_inputs(&self) -> usize {
        self.num_inputs
    }

    pub fn num_outputs(&self) -> usize {
        self.num_outputs
    }

    pub fn bias_id(&self) -> usize {
        self.num_inputs + self.num_outputs
    }

    pub fn next_node_id(&self) -> usize {
        self.next_node_id
    }

    pub fn fitness(&self) -> f64 {
        self.fitness
    }

    pub fn set_fitness(&mut self, fitness: f64) {
        self.fitness = fitness;
    }

    pub fn node(&self, id: usize) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: usize) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    /// Nodes in ascending id order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn input_ids(&self) -> impl Iterator<Item = usize> + '_ {
        self.ids_of_kind(NodeKind::Input)
    }

    pub fn output_ids(&self) -> impl Iterator<Item = usize> + '_ {
        self.ids_of_kind(NodeKind::Output)
    }

    fn ids_of_kind(&self, kind: NodeKind) -> impl Iterator<Item = usize> + '_ {
        self.nodes.values().filter(move |node| node.kind == kind).map(|node| node.id)
    }

    /// Connection genes in ascending innovation order.
    pub fn connections(&self) -> impl Iterator<Item = &Edge> {
        self.connections.values()
    }

    pub fn connections_mut(&mut self) -> impl Iterator<Item = &mut Edge> {
        self.connections.values_mut()
    }

    pub fn num_connections(&self) -> usize {
        self.connections.len()
    }

    pub fn connection(&self, innov: usize) -> Option<&Edge> {
        self.connections.get(&innov)
    }

    pub fn connection_mut(&mut self, innov: usize) -> Option<&mut Edge> {
        self.connections.get_mut(&innov)
    }

    pub fn connection_between(&self, source: usize, target: usize) -> Option<&Edge> {
        self.links.get(&(source, target)).and_then(|innov| self.connections.get(innov))
    }

    pub fn connection_between_mut(&mut self, source: usize, target: usize) -> Option<&mut Edge> {
        let innov = *self.links.get(&(source, target))?;
        self.connections.get_mut(&innov)
    }

    /// Whether a gene, enabled or not, joins the two nodes in either direction.
    pub fn are_connected(&self, a: usize, b: usize) -> bool {
        self.links.contains_key(&(a, b)) || self.links.contains_key(&(b, a))
    }

    pub fn max_innovation(&self) -> Option<usize> {
        self.connections.keys().next_back().copied()
    }

    /// Structural view over every gene, enabled or not, seeded with the inputs and the bias.
    pub fn graph(&self) -> Graph {
        let edge_list = self.connections.values().map(|edge| [edge.source, edge.target]).collect();
        let nodes = self.nodes.keys().copied().collect();
        let sources = self.input_ids().chain(std::iter::once(self.bias_id())).collect();
        Graph::from_edge_list(edge_list, nodes, sources)
    }

    pub fn topological_order(&self) -> Result<Vec<usize>> {
        self.graph().topological_sort()
    }

    /// Runs a forward pass and returns the output values in ascending node id order.
    pub fn evaluate(&self, inputs: &[f64]) -> Result<Vec<f64>> {
        if inputs.len() != self.num_inputs {
            return Err(NeatError::InvalidInputArity {
                expected: self.num_inputs,
                found: inputs.len(),
            });
        }
        NeuralNetwork::from_genome(self)?.propagate(inputs)
    }

    /// Index of the largest output.
    pub fn evaluate_argmax(&self, inputs: &[f64]) -> Result<usize> {
        let outputs = self.evaluate(inputs)?;
        Ok(argmax(&outputs).unwrap_or(0))
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yml::to_string(self)?)
    }

    pub fn from_yaml(yaml: &str) -> Result<Genome> {
        Ok(serde_yml::from_str(yaml)?)
    }

    pub fn save_yaml<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, self.to_yaml()?)?;
        Ok(())
    }

    pub fn load_yaml<P: AsRef<Path>>(path: P) -> Result<Genome> {
        let yaml = fs::read_to_string(path)?;
        Genome::from_yaml(&yaml)
    }

    // used to construct tests
    #[cfg(test)]
    pub(crate) fn remove_by_innovation(&mut self, innov: usize) {
        if let Some(edge) = self.connections.remove(&innov) {
            self.links.remove(&edge.endpoints());
        }
    }
}

impl fmt::Display for Genome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Nodes:")?;
        for node in self.nodes.values() {
            writeln!(f, "  {} {:?} ({:?})", node.id, node.kind, node.activation)?;
        }
        writeln!(f, "Connections:")?;
        for edge in self.connections.values() {
            writeln!(
                f,
                "  #{} {} -> {} ({}) weight: {:.5}",
                edge.innov,
                edge.source,
                edge.target,
                if edge.enabled { "enabled" } else { "disabled" },
                edge.weight
            )?;
        }
        Ok(())
    }
}

/// On-disk shape of a genome.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct GenomeRecord {
    num_inputs: usize,
    num_outputs: usize,
    nodes: Vec<Node>,
    connections: Vec<Edge>,
    #[serde(default)]
    fitness: f64,
}

impl From<Genome> for GenomeRecord {
    fn from(genome: Genome) -> GenomeRecord {
        GenomeRecord {
            num_inputs: genome.num_inputs,
            num_outputs: genome.num_outputs,
            nodes: genome.nodes.into_values().collect(),
            connections: genome.connections.into_values().collect(),
            fitness: genome.fitness,
        }
    }
}

impl TryFrom<GenomeRecord> for Genome {
    type Error = NeatError;

    fn try_from(record: GenomeRecord) -> Result<Genome> {
        let mut genome = Genome::from_genes(record.num_inputs, record.num_outputs, record.nodes, record.connections)?;
        genome.fitness = record.fitness;
        Ok(genome)
    }
}
