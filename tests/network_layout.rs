// Run:
//   cargo test --test network_layout

mod common;

use common::*;

use creature_sim::kernels::brain::decide;
use creature_sim::{Action, ConfigError, Direction, NetworkConfig, NetworkTopology, SimResult};

#[test]
fn offset_tables_follow_layer_sizes() {
    let topology = NetworkTopology::new(&[3, 4, 2]).expect("valid topology");

    assert_eq!(topology.weight_offsets(), &[0, 20, 32]);
    assert_eq!(topology.neuron_offsets(), &[0, 3, 7]);
    assert_eq!(topology.weights_per_agent(), 32);
    assert_eq!(topology.neurons_per_agent(), 9);
    assert_eq!(topology.inputs(), 3);
    assert_eq!(topology.outputs(), 2);

    assert_eq!(topology.layer_weights(0), None);
    assert_eq!(topology.layer_weights(1), Some(0..20));
    assert_eq!(topology.layer_weights(2), Some(20..32));
    assert_eq!(topology.layer_weights(3), None);
    assert_eq!(topology.agent_weights(2), 64..96);
    assert_eq!(topology.agent_neurons(2), 18..27);
}

#[test]
fn offset_identities_hold_for_default_network() {
    let topology = NetworkConfig::default().topology().expect("default topology");
    let layers = topology.layers();
    assert_eq!(layers, &[77, 20, 18, 18, 18, 15, 10]);

    for i in 1..layers.len() {
        let expected = topology.weight_offsets()[i - 1] + (layers[i - 1] + 2) * layers[i];
        assert_eq!(topology.weight_offsets()[i], expected);
        assert_eq!(topology.neuron_offsets()[i], layers[..i].iter().sum::<usize>());
    }
    assert_eq!(topology.weights_per_agent(), 3166);
    assert_eq!(topology.neurons_per_agent(), 176);
}

#[test]
fn degenerate_topologies_are_rejected() {
    assert!(matches!(NetworkTopology::new(&[5]), Err(ConfigError::Topology { .. })));
    assert!(matches!(NetworkTopology::new(&[3, 0, 2]), Err(ConfigError::Topology { .. })));
}

#[test]
fn flat_buffers_scale_with_population() -> SimResult<()> {
    let mut sim = small_sim(SEED)?;
    let per_agent = sim.topology().weights_per_agent();
    let neurons = sim.topology().neurons_per_agent();
    let snap = sim.snapshot()?;
    assert_eq!(snap.weights.len(), CREATURES as usize * per_agent);
    assert_eq!(snap.outputs.len(), CREATURES as usize * neurons);
    Ok(())
}

#[test]
fn perception_fills_input_layer() -> SimResult<()> {
    let mut sim = small_sim(SEED)?;
    sim.tick()?;
    let snap = sim.snapshot()?;
    let topology = sim.topology().clone();

    for id in 0..snap.population() {
        let outputs = &snap.outputs[topology.agent_neurons(id)];
        let inputs = &outputs[..topology.inputs()];
        // Last-action-success from seeding, then the food underfoot.
        assert_eq!(inputs[inputs.len() - 2], 1.0);
        assert!(inputs[..inputs.len() - 2].iter().all(|v| (0.0..=1.0).contains(v)));
        let hidden = &outputs[topology.inputs()..];
        assert!(hidden.iter().all(|v| (-1.0..=1.0).contains(v)));
    }
    Ok(())
}

fn logits(action: usize, turn: f32, hue: (f32, f32)) -> Vec<f32> {
    let mut last = vec![0.0; Action::COUNT + 3];
    last[action] = 0.9;
    last[Action::COUNT] = turn;
    last[Action::COUNT + 1] = hue.0;
    last[Action::COUNT + 2] = hue.1;
    last
}

#[test]
fn decision_takes_first_maximum() {
    let decision = decide(&logits(Action::Eat as usize, 0.0, (1.0, 0.0)), Direction::East);
    assert_eq!(decision.action, Action::Eat);
    assert_eq!(decision.direction, Direction::East);
    assert_eq!(decision.hue, 0.0);

    let tied = vec![0.5, 0.5, 0.5, 0.5, 0.5, 0.5, 0.5, 0.0, 1.0, 0.0];
    assert_eq!(decide(&tied, Direction::North).action, Action::Nothing);
}

#[test]
fn rotation_follows_turn_bias() {
    let right = decide(&logits(Action::Rotate as usize, 0.3, (1.0, 0.0)), Direction::North);
    assert_eq!(right.direction, Direction::East);

    let left = decide(&logits(Action::Rotate as usize, -0.3, (1.0, 0.0)), Direction::North);
    assert_eq!(left.direction, Direction::West);

    let moving = decide(&logits(Action::Move as usize, 0.9, (1.0, 0.0)), Direction::South);
    assert_eq!(moving.direction, Direction::South);
}

#[test]
fn hue_is_angle_of_output_pair() {
    let up = decide(&logits(0, 0.0, (0.0, 1.0)), Direction::North);
    assert!((up.hue - std::f32::consts::FRAC_PI_2).abs() < 1e-6);

    let down = decide(&logits(0, 0.0, (0.0, -1.0)), Direction::North);
    assert!((down.hue - 3.0 * std::f32::consts::FRAC_PI_2).abs() < 1e-5);
}
