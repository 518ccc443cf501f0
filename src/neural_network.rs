//! Feed-forward evaluation of a genome.

pub mod edge;
pub mod graph;
pub mod node;

use std::collections::HashMap;

use crate::error::{NeatError, Result};
use crate::neural_network::node::{Node, NodeKind};
use crate::population::genome::Genome;

/// An evaluable snapshot of a genome. Nodes are held in topological order so a single pass
/// activates every node after all of its sources.
#[derive(Clone, Debug)]
pub struct NeuralNetwork {
    nodes: Vec<Node>,
    in_edges: Vec<Vec<(usize, f64)>>, // (source position, weight) of enabled genes
    input_idx: Vec<usize>,
    output_idx: Vec<usize>,
}

impl NeuralNetwork {
    /// Construct a network from a genome, sorting its nodes topologically. Fails with
    /// `CycleDetected` when the genome is not a DAG.
    pub fn from_genome(genome: &Genome) -> Result<NeuralNetwork> {
        let order = genome.topological_order()?;

        let mut position = HashMap::with_capacity(order.len());
        let mut nodes = Vec::with_capacity(order.len());
        for (pos, id) in order.iter().enumerate() {
            let node = genome.node(*id).ok_or(NeatError::CycleDetected)?;
            position.insert(*id, pos);
            nodes.push(node.clone());
        }

        // only enabled genes carry signal
        let mut in_edges = vec![Vec::new(); nodes.len()];
        for edge in genome.connections().filter(|edge| edge.enabled) {
            let source_i = position[&edge.source];
            let target_i = position[&edge.target];
            in_edges[target_i].push((source_i, edge.weight));
        }

        let input_idx = genome.input_ids().map(|id| position[&id]).collect();
        let output_idx = genome.output_ids().map(|id| position[&id]).collect();

        Ok(NeuralNetwork {
            nodes,
            in_edges,
            input_idx,
            output_idx,
        })
    }

    /// Convert sensor values to outputs. Output values are returned in ascending node id order.
    pub fn propagate(&mut self, inputs: &[f64]) -> Result<Vec<f64>> {
        self.load_sensors(inputs)?;

        for node_i in 0..self.nodes.len() {
            match self.nodes[node_i].kind {
                NodeKind::Input => {}
                NodeKind::Bias => self.nodes[node_i].output = 1.0,
                NodeKind::Output | NodeKind::Hidden => {
                    let net_input = self.net_input(node_i);
                    self.nodes[node_i].activate(net_input);
                }
            }
        }

        Ok(self.get_outputs())
    }

    // weighted sum of the outputs feeding a node
    fn net_input(&self, node_i: usize) -> f64 {
        self.in_edges[node_i]
            .iter()
            .map(|(source_i, weight)| self.nodes[*source_i].output * weight)
            .sum()
    }

    fn get_outputs(&self) -> Vec<f64> {
        self.output_idx.iter().map(|i| self.nodes[*i].output).collect()
    }

    // activates the sensor nodes by setting the output to their observed value
    fn load_sensors(&mut self, values: &[f64]) -> Result<()> {
        if values.len() != self.input_idx.len() {
            return Err(NeatError::InvalidInputArity {
                expected: self.input_idx.len(),
                found: values.len(),
            });
        }

        for (value, sensor_i) in values.iter().zip(&self.input_idx) {
            self.nodes[*sensor_i].output = *value;
        }
        Ok(())
    }
}

/// Index of the largest value, the first one winning ties. `None` for an empty slice.
pub fn argmax(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, v)| match best {
            Some((_, b)) if b >= *v => best,
            _ => Some((i, *v)),
        })
        .map(|(i, _)| i)
}
