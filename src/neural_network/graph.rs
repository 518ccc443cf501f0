use std::collections::{BTreeMap, BTreeSet, VecDeque};

use topo_sort::{CycleError, TopoSort};

use crate::error::{NeatError, Result};

/// The Graph struct contains structural information about a network without the details needed to
/// fully compute activation.
///
/// We use a Graph primarily to determine the activation order of nodes in a genome and to check
/// whether a prospective connection would close a cycle. Maps are ordered so that every query is
/// deterministic for a given edge list.
#[derive(Clone, Debug, Default)]
pub struct Graph {
    pub edge_list: Vec<[usize; 2]>,
    pub preds: BTreeMap<usize, BTreeSet<usize>>,
    pub succs: BTreeMap<usize, BTreeSet<usize>>,
    sources: Vec<usize>,
}

impl Graph {
    /// Builds a graph from an edge list. `nodes` lists every node so isolated ones are kept, and
    /// `sources` are the nodes the topological sort is seeded with first.
    ///
    /// # Example
    ///
    /// ```
    /// use neat_engine::neural_network::graph::Graph;
    ///
    /// let edges = vec![[0, 2], [0, 1], [1, 2]];
    /// let my_graph = Graph::from_edge_list(edges, vec![0, 1, 2], vec![0]);
    /// assert_eq!(my_graph.preds[&2].len(), 2);
    /// ```
    pub fn from_edge_list(edge_list: Vec<[usize; 2]>, nodes: Vec<usize>, sources: Vec<usize>) -> Graph {
        let mut preds = Self::dependency_map(&edge_list, true);
        let mut succs = Self::dependency_map(&edge_list, false);

        // make sure isolated nodes take part in the sort
        for node in nodes.iter().chain(sources.iter()) {
            preds.entry(*node).or_default();
            succs.entry(*node).or_default();
        }

        Graph {
            edge_list,
            preds,
            succs,
            sources,
        }
    }

    /// Produces a lookup for neighbors of a node looking either forward or backward.
    ///
    /// # Example
    ///
    /// ```
    /// use neat_engine::neural_network::graph::Graph;
    /// use std::collections::BTreeSet;
    ///
    /// let edges = vec![[0, 1], [1, 2], [0, 2]];
    /// let preds = Graph::dependency_map(&edges, true);
    ///
    /// let known: BTreeSet<usize> = [0, 1].into_iter().collect();
    /// assert_eq!(preds[&2], known)
    /// ```
    pub fn dependency_map(edge_list: &[[usize; 2]], backward: bool) -> BTreeMap<usize, BTreeSet<usize>> {
        let mut dep_map: BTreeMap<usize, BTreeSet<usize>> = BTreeMap::new();

        for edge in edge_list {
            let (key_node, val_node) = match backward {
                true => (edge[1], edge[0]),
                false => (edge[0], edge[1]),
            };

            dep_map.entry(key_node).or_default().insert(val_node);

            // the other end must exist as a key as well
            dep_map.entry(val_node).or_default();
        }

        dep_map
    }

    /// Records a new edge in both dependency maps.
    pub fn add_edge(&mut self, source: usize, target: usize) {
        self.edge_list.push([source, target]);
        self.succs.entry(source).or_default().insert(target);
        self.preds.entry(target).or_default().insert(source);
        self.succs.entry(target).or_default();
        self.preds.entry(source).or_default();
    }

    /// Calculates an ordering of node ids according to the topological sort of the graph. If the
    /// graph is not a DAG this returns `CycleDetected`.
    ///
    /// The sorted nodes are then ranked by depth, the longest path reaching them, with sources
    /// ahead of other nodes of the same depth and ties broken by id. The result only depends on
    /// the edge list.
    ///
    /// # Example
    ///
    /// ```
    /// use neat_engine::neural_network::graph::Graph;
    ///
    /// let edges = vec![[0, 1], [1, 2], [0, 2]];
    /// let g = Graph::from_edge_list(edges, vec![0, 1, 2], vec![0]);
    /// assert_eq!(g.topological_sort().unwrap(), vec![0, 1, 2])
    /// ```
    pub fn topological_sort(&self) -> Result<Vec<usize>> {
        let mut ts = TopoSort::with_capacity(self.preds.len());

        for (node, preds) in &self.preds {
            ts.insert(node, preds);
        }

        let mut depth: BTreeMap<usize, usize> = BTreeMap::new();

        for node in ts {
            match node {
                Ok((node, _)) => {
                    // every predecessor is already placed
                    let node_depth = self.preds[node]
                        .iter()
                        .filter_map(|pred| depth.get(pred))
                        .map(|d| d + 1)
                        .max()
                        .unwrap_or(0);
                    depth.insert(*node, node_depth);
                }
                Err(CycleError) => return Err(NeatError::CycleDetected),
            }
        }

        let mut ranked: Vec<(usize, bool, usize)> = depth
            .into_iter()
            .map(|(node, d)| (d, !self.sources.contains(&node), node))
            .collect();
        ranked.sort_unstable();

        Ok(ranked.into_iter().map(|(_, _, node)| node).collect())
    }

    /// Whether `target` can be reached from `source` following edges forward.
    ///
    /// # Example
    ///
    /// ```
    /// use neat_engine::neural_network::graph::Graph;
    ///
    /// let edges = vec![[0, 2], [1, 2], [2, 3]];
    /// let g = Graph::from_edge_list(edges, vec![0, 1, 2, 3], vec![0, 1]);
    /// assert!(g.has_path(0, 3));
    /// assert!(!g.has_path(3, 0));
    /// ```
    pub fn has_path(&self, source: usize, target: usize) -> bool {
        let mut queue = VecDeque::new();
        let mut visited = BTreeSet::new();

        queue.push_back(source);
        while let Some(curr) = queue.pop_front() {
            if curr == target {
                return true;
            }

            // don't want to get stuck in a loop!
            if !visited.insert(curr) {
                continue;
            }

            if let Some(neighbors) = self.succs.get(&curr) {
                for neighbor in neighbors {
                    if !visited.contains(neighbor) {
                        queue.push_back(*neighbor);
                    }
                }
            }
        }

        false
    }

    /// An edge `source -> target` closes a cycle iff `source` is reachable from `target`.
    pub fn would_create_cycle(&self, source: usize, target: usize) -> bool {
        source == target || self.has_path(target, source)
    }
}
