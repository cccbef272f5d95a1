//! Flat memory layout of the neural network bank.
//!
//! Every creature owns one contiguous weight vector and one contiguous
//! neuron-output vector. Both are addressed through offset tables computed
//! once from the layer sizes:
//!
//! ```text
//! weight_offset[0] = 0
//! weight_offset[i] = weight_offset[i-1] + (layer[i-1] + 2) * layer[i]
//! neuron_offset[i] = layer[0] + ... + layer[i-1]
//! ```
//!
//! The weights of layer `i >= 1` occupy `weight_offset[i-1]..weight_offset[i]`;
//! each neuron there owns `layer[i-1]` input weights, one bias, and one
//! self-recurrent weight. Creature `c` starts at `c * weights_per_agent` in the
//! flat weight array and at `c * neurons_per_agent` in the output array.

use std::ops::Range;

use crate::engine::error::ConfigError;

/// Immutable layer sizes plus derived offset tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkTopology {
    layers: Vec<usize>,
    weight_offsets: Vec<usize>,
    neuron_offsets: Vec<usize>,
    weights_per_agent: usize,
    neurons_per_agent: usize,
}

impl NetworkTopology {
    /// Computes the offset tables by a forward scan over `layers`.
    ///
    /// ## Errors
    /// `Topology` if there are fewer than two layers, a layer is empty, or a
    /// table would not fit the `i32` indices the kernels use.
    pub fn new(layers: &[usize]) -> Result<Self, ConfigError> {
        if layers.len() < 2 {
            return Err(ConfigError::Topology {
                reason: format!("need at least an input and an output layer, got {}", layers.len()),
            });
        }
        if let Some(index) = layers.iter().position(|&n| n == 0) {
            return Err(ConfigError::Topology {
                reason: format!("layer {index} is empty"),
            });
        }

        let mut weight_offsets = Vec::with_capacity(layers.len());
        weight_offsets.push(0);
        let mut total = 0usize;
        for i in 1..layers.len() {
            total += (layers[i - 1] + 2) * layers[i];
            weight_offsets.push(total);
        }

        let mut neuron_offsets = Vec::with_capacity(layers.len());
        let mut neurons = 0usize;
        for &n in layers {
            neuron_offsets.push(neurons);
            neurons += n;
        }

        if i32::try_from(total).is_err() || i32::try_from(neurons).is_err() {
            return Err(ConfigError::Topology {
                reason: String::from("network is too large for 32-bit offsets"),
            });
        }

        Ok(Self {
            layers: layers.to_vec(),
            weight_offsets,
            neuron_offsets,
            weights_per_agent: total,
            neurons_per_agent: neurons,
        })
    }

    /// Layer sizes, input first.
    pub fn layers(&self) -> &[usize] {
        &self.layers
    }

    /// Cumulative weight offsets; the last entry is the per-agent total.
    pub fn weight_offsets(&self) -> &[usize] {
        &self.weight_offsets
    }

    /// Index of each layer's first neuron.
    pub fn neuron_offsets(&self) -> &[usize] {
        &self.neuron_offsets
    }

    /// Length of one creature's weight vector.
    pub fn weights_per_agent(&self) -> usize {
        self.weights_per_agent
    }

    /// Length of one creature's neuron-output vector.
    pub fn neurons_per_agent(&self) -> usize {
        self.neurons_per_agent
    }

    /// Width of the input layer.
    pub fn inputs(&self) -> usize {
        self.layers[0]
    }

    /// Width of the output layer.
    pub fn outputs(&self) -> usize {
        self.layers[self.layers.len() - 1]
    }

    /// Weight range of layer `layer` (which must be `>= 1`) inside one
    /// creature's vector.
    pub fn layer_weights(&self, layer: usize) -> Option<Range<usize>> {
        if layer == 0 || layer >= self.layers.len() {
            return None;
        }
        Some(self.weight_offsets[layer - 1]..self.weight_offsets[layer])
    }

    /// Range of `agent`'s weights in the flat weight array.
    pub fn agent_weights(&self, agent: usize) -> Range<usize> {
        agent * self.weights_per_agent..(agent + 1) * self.weights_per_agent
    }

    /// Range of `agent`'s outputs in the flat neuron-output array.
    pub fn agent_neurons(&self, agent: usize) -> Range<usize> {
        agent * self.neurons_per_agent..(agent + 1) * self.neurons_per_agent
    }

    /// Device form of the layer sizes and offset tables.
    pub(crate) fn device_tables(&self) -> [Vec<i32>; 3] {
        let to_i32 = |values: &[usize]| values.iter().map(|&v| v as i32).collect::<Vec<_>>();
        [
            to_i32(&self.layers),
            to_i32(&self.weight_offsets),
            to_i32(&self.neuron_offsets),
        ]
    }
}
