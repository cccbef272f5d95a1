// Run:
//   cargo test --test config

mod common;

use std::io::Write;

use creature_sim::{ConfigError, ProgramSource, SimError, SimulationConfig, Simulator};

fn write_toml(text: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(text.as_bytes()).expect("write config");
    file
}

#[test]
fn minimal_toml_fills_defaults() {
    let file = write_toml(
        r#"
        world_width = 64
        world_height = 32
        creatures = 50
        seed = 7
        "#,
    );
    let config = SimulationConfig::load(file.path()).expect("valid config");

    assert_eq!(config, SimulationConfig::new(64, 32, 50, ProgramSource::Reference, 7));
    assert_eq!(config.framebuffer_width, 640);
    assert_eq!(config.framebuffer_height, 360);
    assert_eq!(config.network.vision_radius, 2);
    assert_eq!(config.network.hidden_layers, vec![20, 18, 18, 18, 15]);
    assert_eq!(config.network.outputs, 10);
    assert_eq!(config.dynamics.initial_energy, 200);
    assert_eq!(config.dynamics.energy_variance, 6000);
    assert_eq!(config.dynamics.food_period, 32);
    assert_eq!(config.dynamics.detail_zoom, 4.0);
}

#[test]
fn shipped_default_config_is_valid() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/default.toml");
    let config = SimulationConfig::load(path).expect("shipped config");
    assert_eq!((config.world_width, config.world_height), (640, 360));
    assert_eq!(config.creatures, 640 * 360 / 32 + 1);
    assert_eq!(config.seed, 42);

    let embedded = SimulationConfig::parse(include_str!("../config/default.toml"))
        .expect("embedded config");
    assert_eq!(embedded, config);
}

#[test]
fn nested_sections_override_tunables() {
    let file = write_toml(
        r#"
        world_width = 20
        world_height = 20
        creatures = 10
        seed = 1

        [program]
        kind = "wgsl"
        path = "shaders/creatures.wgsl"

        [network]
        vision_radius = 1
        hidden_layers = [8]

        [dynamics]
        food_period = 4
        "#,
    );
    let config = SimulationConfig::load(file.path()).expect("valid config");
    assert_eq!(
        config.program,
        ProgramSource::Wgsl { path: "shaders/creatures.wgsl".into() }
    );
    assert_eq!(config.network.layers(), vec![3 * 3 * 3 + 2, 8, 10]);
    assert_eq!(config.dynamics.food_period, 4);
    assert_eq!(config.dynamics.initial_energy, 200);
}

#[test]
fn missing_file_and_bad_toml_are_reported() {
    let err = SimulationConfig::load("/nonexistent/creatures.toml").unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));

    let file = write_toml("world_width = \"wide\"");
    let err = SimulationConfig::load(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn validation_rejects_unusable_worlds() {
    let base = || SimulationConfig::new(4, 4, 3, ProgramSource::Reference, 0);

    let mut config = base();
    config.world_width = 0;
    assert!(matches!(config.validate(), Err(ConfigError::EmptyWorld { width: 0, height: 4 })));

    let mut config = base();
    config.creatures = 0;
    assert!(matches!(config.validate(), Err(ConfigError::NoCreatures)));

    let mut config = base();
    config.creatures = 16;
    assert!(matches!(config.validate(), Err(ConfigError::Overcrowded(_))));

    let mut config = base();
    config.creatures = 15;
    assert!(config.validate().is_ok());

    let mut config = base();
    config.network.outputs = 9;
    assert!(matches!(config.validate(), Err(ConfigError::Topology { .. })));

    let mut config = base();
    config.network.hidden_layers = vec![12, 0];
    assert!(matches!(config.validate(), Err(ConfigError::Topology { .. })));

    let mut config = base();
    config.dynamics.food_period = 0;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidField { field: "food_period", .. })
    ));

    let mut config = base();
    config.dynamics.detail_zoom = f32::NAN;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidField { field: "detail_zoom", .. })
    ));
}

#[test]
fn framebuffer_must_fit_one_dispatch() {
    let mut config = SimulationConfig::new(4, 4, 3, ProgramSource::Reference, 0);
    config.framebuffer_width = 70_000;
    config.framebuffer_height = 70_000;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidField { field: "framebuffer_width", .. })
    ));

    config.framebuffer_width = 65_536;
    config.framebuffer_height = 65_535;
    assert!(config.validate().is_ok());
}

#[test]
fn simulator_refuses_invalid_config() {
    let config = SimulationConfig::new(2, 2, 4, ProgramSource::Reference, 0);
    let err = Simulator::new(config).unwrap_err();
    assert!(matches!(err, SimError::Config(ConfigError::Overcrowded(_))));
}

#[cfg(not(feature = "gpu"))]
#[test]
fn wgsl_program_needs_gpu_feature() {
    let config = SimulationConfig::new(
        8,
        8,
        4,
        ProgramSource::Wgsl { path: "creatures.wgsl".into() },
        0,
    );
    let err = Simulator::new(config).unwrap_err();
    assert!(matches!(err, SimError::Compute(creature_sim::ComputeError::NoDevice { .. })));
}
