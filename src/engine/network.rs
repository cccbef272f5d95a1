//! Device-resident neural network bank.
//!
//! All creatures share one [`NetworkTopology`]. Their parameters live in two
//! flat arrays (weights and neuron outputs) addressed through the topology's
//! offset tables, which are uploaded alongside so kernels never recompute them.

use crate::compute::{BufferHandle, ComputeContext, DeviceArray};
use crate::engine::config::NetworkConfig;
use crate::engine::error::{ComputeResult, ConfigError};
use crate::engine::layout::NetworkTopology;
use crate::engine::random::SeedStream;
use crate::kernels::BufferSlot;

/// Host-side network parameters before allocation.
#[derive(Debug, Clone)]
pub struct NetworkHost {
    /// Shared shape.
    pub topology: NetworkTopology,
    /// Vision window width and height.
    pub vision: [i32; 2],
    /// Flat weights, `creatures * weights_per_agent` long.
    pub weights: Vec<f32>,
}

impl NetworkHost {
    /// Derives the topology and draws every weight uniformly from `[-1, 1)`.
    pub fn seed(
        config: &NetworkConfig,
        creatures: usize,
        rng: &mut SeedStream,
    ) -> Result<Self, ConfigError> {
        let topology = config.topology()?;
        let weights = (0..creatures * topology.weights_per_agent())
            .map(|_| rng.next_signed_unit())
            .collect();
        let side = config.vision_width() as i32;
        Ok(Self { topology, vision: [side, side], weights })
    }
}

/// Layer tables plus per-creature weight and output arrays on the device.
#[derive(Debug)]
pub struct NeuralNetworkBank {
    topology: NetworkTopology,
    pub(crate) vision_size: DeviceArray<i32>,
    pub(crate) layer_sizes: DeviceArray<i32>,
    pub(crate) layer_count: DeviceArray<i32>,
    pub(crate) weight_offsets: DeviceArray<i32>,
    pub(crate) neuron_offsets: DeviceArray<i32>,
    pub(crate) weights_per_agent: DeviceArray<i32>,
    pub(crate) neurons_per_agent: DeviceArray<i32>,
    pub(crate) weights: DeviceArray<f32>,
    pub(crate) outputs: DeviceArray<f32>,
}

impl NeuralNetworkBank {
    /// Allocates the tables and flat arrays. Neuron outputs start at zero.
    pub fn allocate(
        ctx: &mut ComputeContext,
        host: NetworkHost,
        creatures: usize,
    ) -> ComputeResult<Self> {
        let topology = host.topology;
        let [layers, weight_offsets, neuron_offsets] = topology.device_tables();
        let layer_count = layers.len() as i32;

        Ok(Self {
            vision_size: DeviceArray::new(ctx, "vision_size", host.vision.to_vec())?,
            layer_sizes: DeviceArray::new(ctx, "nn_structure", layers)?,
            layer_count: DeviceArray::new(ctx, "nn_num_layers", vec![layer_count])?,
            weight_offsets: DeviceArray::new(ctx, "weight_layer_start", weight_offsets)?,
            neuron_offsets: DeviceArray::new(ctx, "neuron_layer_start", neuron_offsets)?,
            weights_per_agent: DeviceArray::new(
                ctx,
                "weights_per_nn",
                vec![topology.weights_per_agent() as i32],
            )?,
            neurons_per_agent: DeviceArray::new(
                ctx,
                "neurons_per_nn",
                vec![topology.neurons_per_agent() as i32],
            )?,
            weights: DeviceArray::new(ctx, "nn_weights", host.weights)?,
            outputs: DeviceArray::zeroed(ctx, "nn_neuron_outputs", creatures * topology.neurons_per_agent())?,
            topology,
        })
    }

    /// Shared shape.
    pub fn topology(&self) -> &NetworkTopology {
        &self.topology
    }

    /// Host mirror of the flat weight array (current as of the last download).
    pub fn weights(&self) -> &[f32] {
        self.weights.host()
    }

    pub(crate) fn handle(&self, slot: BufferSlot) -> Option<BufferHandle> {
        let handle = match slot {
            BufferSlot::VisionSize => self.vision_size.handle(),
            BufferSlot::LayerSizes => self.layer_sizes.handle(),
            BufferSlot::LayerCount => self.layer_count.handle(),
            BufferSlot::WeightOffsets => self.weight_offsets.handle(),
            BufferSlot::NeuronOffsets => self.neuron_offsets.handle(),
            BufferSlot::WeightsPerAgent => self.weights_per_agent.handle(),
            BufferSlot::NeuronsPerAgent => self.neurons_per_agent.handle(),
            BufferSlot::Weights => self.weights.handle(),
            BufferSlot::NeuronOutputs => self.outputs.handle(),
            _ => return None,
        };
        Some(handle)
    }

    pub(crate) fn download(&mut self, ctx: &mut ComputeContext) -> ComputeResult<()> {
        self.weights.download(ctx)?;
        self.outputs.download(ctx)
    }
}
