use serde::{Deserialize, Serialize};

/// Role a node plays in the network.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Input,
    Output,
    Bias,
    Hidden,
}

impl NodeKind {
    /// Classifies a node purely from its id using the layout every genome
    /// starts with: inputs `[0, n_in)`, outputs `[n_in, n_in + n_out)`, the
    /// bias at `n_in + n_out` and hidden nodes above that.
    ///
    /// # Example
    ///
    /// ```
    /// use neat_engine::neural_network::node::NodeKind;
    ///
    /// assert_eq!(NodeKind::from_id(0, 2, 1), NodeKind::Input);
    /// assert_eq!(NodeKind::from_id(2, 2, 1), NodeKind::Output);
    /// assert_eq!(NodeKind::from_id(3, 2, 1), NodeKind::Bias);
    /// assert_eq!(NodeKind::from_id(4, 2, 1), NodeKind::Hidden);
    /// ```
    pub fn from_id(id: usize, num_inputs: usize, num_outputs: usize) -> NodeKind {
        if id < num_inputs {
            NodeKind::Input
        } else if id < num_inputs + num_outputs {
            NodeKind::Output
        } else if id == num_inputs + num_outputs {
            NodeKind::Bias
        } else {
            NodeKind::Hidden
        }
    }

    /// Inputs and the bias never receive connections.
    pub fn is_source(&self) -> bool {
        matches!(self, NodeKind::Input | NodeKind::Bias)
    }
}

/// Activation functions a node can apply to its net input.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Activation {
    Identity,
    Sigmoid,
    /// `1 / (1 + exp(-4.9x))`, the curve used in the original NEAT paper
    #[default]
    SteepenedSigmoid,
    Tanh,
    Relu,
    Step,
}

impl Activation {
    pub fn apply(self, x: f64) -> f64 {
        match self {
            Activation::Identity => x,
            Activation::Sigmoid => 1. / (1. + (-x).exp()),
            Activation::SteepenedSigmoid => 1. / (1. + (-4.9 * x).exp()),
            Activation::Tanh => x.tanh(),
            Activation::Relu => x.max(0.0),
            Activation::Step => {
                if x < 0.0 {
                    0.0
                } else {
                    1.0
                }
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: usize,
    pub kind: NodeKind,
    pub activation: Activation,
    #[serde(skip)]
    pub output: f64, // signal sent to downstream nodes during a pass
}

impl Node {
    pub fn new(id: usize, kind: NodeKind, activation: Activation) -> Node {
        Node {
            id,
            kind,
            activation,
            output: 0.0,
        }
    }

    // net input -> output
    pub fn activate(&mut self, net_input: f64) {
        self.output = self.activation.apply(net_input);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Activation::Identity, 0.3, 0.3)]
    #[case(Activation::Sigmoid, 0.0, 0.5)]
    #[case(Activation::SteepenedSigmoid, 0.0, 0.5)]
    #[case(Activation::Tanh, 0.0, 0.0)]
    #[case(Activation::Relu, -2.0, 0.0)]
    #[case(Activation::Relu, 2.0, 2.0)]
    #[case(Activation::Step, -0.1, 0.0)]
    #[case(Activation::Step, 0.0, 1.0)]
    fn test_activation(#[case] activation: Activation, #[case] x: f64, #[case] expected: f64) {
        assert!((activation.apply(x) - expected).abs() < 1e-12)
    }

    #[test]
    fn test_steepened_sigmoid_is_steeper() {
        let x = 0.5;
        assert!(Activation::SteepenedSigmoid.apply(x) > Activation::Sigmoid.apply(x));
        let expected = 1. / (1. + (-4.9_f64 * x).exp());
        assert!((Activation::SteepenedSigmoid.apply(x) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_activate_sets_output() {
        let mut node = Node::new(4, NodeKind::Hidden, Activation::Identity);
        node.activate(-0.75);
        assert_eq!(node.output, -0.75);
    }

    #[rstest]
    #[case(1, NodeKind::Input)]
    #[case(3, NodeKind::Output)]
    #[case(5, NodeKind::Bias)]
    #[case(9, NodeKind::Hidden)]
    fn test_from_id(#[case] id: usize, #[case] expected: NodeKind) {
        assert_eq!(NodeKind::from_id(id, 3, 2), expected)
    }
}
