// Run with GPU backend enabled:
//   cargo test --features gpu --test gpu_backend -- --nocapture
//
// Tests skip themselves when no adapter is available.

#![cfg(feature = "gpu")]

use creature_sim::compute::{ComputeContext, DeviceArray, WgpuBackend};
use creature_sim::{ComputeError, ComputeResult};

const DOUBLE_WGSL: &str = r#"
struct Params { work_size: u32, _p0: u32, _p1: u32, _p2: u32 };

@group(0) @binding(0) var<storage, read_write> values: array<i32>;
@group(1) @binding(0) var<uniform> params: Params;

@compute @workgroup_size(64)
fn double(@builtin(global_invocation_id) gid: vec3<u32>) {
    if (gid.x >= params.work_size) { return; }
    values[gid.x] = values[gid.x] * 2;
}
"#;

fn open(source: &str, kernels: &[&str]) -> Option<ComputeResult<ComputeContext>> {
    match WgpuBackend::from_source(source.to_owned()) {
        Ok(backend) => Some(ComputeContext::new(Box::new(backend), kernels)),
        Err(ComputeError::NoDevice { message }) => {
            eprintln!("skipping: {message}");
            None
        }
        Err(e) => Some(Err(e)),
    }
}

#[test]
fn wgsl_kernel_doubles_values() -> ComputeResult<()> {
    let Some(ctx) = open(DOUBLE_WGSL, &["double"]) else { return Ok(()) };
    let mut ctx = ctx?;

    let mut values = DeviceArray::new(&mut ctx, "values", (0..100).collect::<Vec<i32>>())?;
    values.bind(&mut ctx, "double", 0)?;
    ctx.dispatch("double", 70)?;
    ctx.finish()?;
    values.download(&mut ctx)?;

    for (i, &v) in values.host().iter().enumerate() {
        let expected = if i < 70 { 2 * i as i32 } else { i as i32 };
        assert_eq!(v, expected, "element {i}");
    }
    ctx.dispose_all()
}

#[test]
fn missing_entry_point_fails_to_compile() {
    let Some(result) = open(DOUBLE_WGSL, &["double", "triple"]) else { return };
    assert!(matches!(result, Err(ComputeError::ProgramCompile { .. })));
}

#[test]
fn invalid_wgsl_fails_to_compile() {
    let Some(result) = open("fn broken( {", &["double"]) else { return };
    assert!(matches!(result, Err(ComputeError::ProgramCompile { .. })));
}
