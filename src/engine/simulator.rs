//! The simulator: construction, the tick and render pipelines, and disposal.
//!
//! ## Construction
//!
//! [`Simulator::new`] validates the configuration, seeds every host buffer
//! from one generator stream (network weights, then the world, then the
//! creatures), opens a [`ComputeContext`] on the configured program, uploads
//! every buffer once, and binds each buffer to its argument slot on every
//! kernel by walking the kernel contract table. Binding happens exactly once,
//! before any dispatch.
//!
//! ## Host access
//!
//! Between calls the device owns simulation state. The host only sees it
//! through explicit downloads: [`Simulator::snapshot`] for state and
//! [`Simulator::framebuffer`] for the last rendered frame.
//!
//! ## Lifecycle
//!
//! [`Simulator::dispose`] releases every device resource. Every call that
//! touches the device after that, including a second `dispose`, returns
//! [`SimError::Disposed`]. The metadata getters ([`Simulator::current_tick`],
//! [`Simulator::config`], [`Simulator::topology`], [`Simulator::population`],
//! [`Simulator::context`], [`Simulator::is_disposed`]) read host-side values
//! only and stay valid, so a caller can still report on a disposed simulator.

use tracing::{debug, debug_span, info, trace};

use crate::compute::{BufferHandle, ComputeContext, DeviceArray};
use crate::engine::config::{ProgramSource, SimulationConfig};
use crate::engine::error::{ComputeError, ComputeResult, SimError, SimResult};
use crate::engine::layout::NetworkTopology;
use crate::engine::network::{NetworkHost, NeuralNetworkBank};
use crate::engine::pipeline::{
    food_due, phases_for_tick, ForegroundKernel, RenderOutcome, RenderRequest, WorkSize,
};
use crate::engine::population::{PopulationHost, PopulationState};
use crate::engine::random::SeedStream;
use crate::engine::snapshot::{PopulationStats, WorldSnapshot};
use crate::engine::types::{AgentId, Tick, VIEW_PARAMS_LEN};
use crate::engine::world::{WorldHost, WorldState};
use crate::kernels::{
    kernel_names, reference_program, BufferSlot, COPY_SPECTATING_TO_ALL, KERNELS,
    RENDER_BACKGROUND, SPECTATE_CREATURE,
};

/// Camera parameters, framebuffer, and the spectate/broadcast scalar.
#[derive(Debug)]
struct ViewState {
    params: DeviceArray<f32>,
    framebuffer: DeviceArray<u32>,
    target: DeviceArray<i32>,
}

impl ViewState {
    fn allocate(ctx: &mut ComputeContext, config: &SimulationConfig) -> ComputeResult<Self> {
        let params = vec![
            config.framebuffer_width as f32,
            config.framebuffer_height as f32,
            config.world_width as f32 * 0.5,
            config.world_height as f32 * 0.5,
            1.0,
            0.0,
        ];
        Ok(Self {
            params: DeviceArray::new(ctx, "view_params", params)?,
            framebuffer: DeviceArray::zeroed(ctx, "screen", config.pixels())?,
            target: DeviceArray::new(ctx, "spectate_target", vec![0])?,
        })
    }

    fn handle(&self, slot: BufferSlot) -> Option<BufferHandle> {
        match slot {
            BufferSlot::ViewParams => Some(self.params.handle()),
            BufferSlot::Framebuffer => Some(self.framebuffer.handle()),
            BufferSlot::SpectateTarget => Some(self.target.handle()),
            _ => None,
        }
    }
}

/// A running simulation bound to one compute context.
#[derive(Debug)]
pub struct Simulator {
    config: SimulationConfig,
    context: ComputeContext,
    world: WorldState,
    population: PopulationState,
    network: NeuralNetworkBank,
    view: ViewState,
    tick: Tick,
    disposed: bool,
}

impl Simulator {
    /// Builds a simulator from `config`.
    ///
    /// ## Errors
    /// * `Config` if the configuration is invalid.
    /// * `Compute` if no device is available, the program does not compile,
    ///   or an allocation fails.
    ///
    /// Nothing partially built is returned; device resources allocated before
    /// a failure are released when the context drops.
    pub fn new(config: SimulationConfig) -> SimResult<Self> {
        config.validate()?;
        let span = debug_span!("init", seed = config.seed);
        let _guard = span.enter();

        let creatures = config.creatures as usize;
        let mut rng = SeedStream::new(config.seed);
        let network = NetworkHost::seed(&config.network, creatures, &mut rng)?;
        let mut world = WorldHost::seed(
            config.world_width as usize,
            config.world_height as usize,
            &mut rng,
        );
        let population = PopulationHost::seed(creatures, &config.dynamics, &mut world, &mut rng);

        let mut context = open_context(&config.program)?;
        let network = NeuralNetworkBank::allocate(&mut context, network, creatures)?;
        let world = WorldState::allocate(&mut context, world)?;
        let population = PopulationState::allocate(&mut context, population)?;
        let view = ViewState::allocate(&mut context, &config)?;
        debug!(
            buffers = context.live_buffer_count(),
            bytes = context.live_bytes(),
            "simulation buffers allocated"
        );

        let mut sim = Self {
            config,
            context,
            world,
            population,
            network,
            view,
            tick: 0,
            disposed: false,
        };
        sim.bind_all()?;
        info!(
            width = sim.config.world_width,
            height = sim.config.world_height,
            creatures,
            backend = sim.context.backend_name(),
            "simulator ready"
        );
        Ok(sim)
    }

    /// Advances the simulation by one tick.
    ///
    /// Runs CLEANUP, FLIP, PERCEIVE_DECIDE and ACT, then the two food phases
    /// when the food period has elapsed. Each phase is followed by a full
    /// barrier. The tick counter increments afterwards.
    pub fn tick(&mut self) -> SimResult<()> {
        self.ensure_live()?;
        let span = debug_span!("tick", tick = self.tick);
        let _guard = span.enter();

        for phase in phases_for_tick(self.tick, self.config.dynamics.food_period) {
            let items = match phase.work_size() {
                WorkSize::Single => 1,
                WorkSize::Population => self.population.len(),
                WorkSize::Cells => self.world.cells(),
            };
            self.context.dispatch(phase.kernel(), items as u32)?;
            self.context.finish()?;
        }
        if food_due(self.tick, self.config.dynamics.food_period) {
            trace!(tick = self.tick, "food grown and spread");
        }

        self.tick += 1;
        Ok(())
    }

    /// Advances the simulation by `n` ticks.
    pub fn run(&mut self, n: u64) -> SimResult<()> {
        for _ in 0..n {
            self.tick()?;
        }
        Ok(())
    }

    /// Draws one frame into the framebuffer and downloads it.
    ///
    /// ## Errors
    /// * `InvalidZoom` unless zoom is finite and at least 1.
    /// * `InvalidProgress` unless progress lies in `[0, 1]`.
    /// * `AgentOutOfRange` if the spectated id is not a creature.
    pub fn render(&mut self, request: RenderRequest) -> SimResult<RenderOutcome> {
        self.ensure_live()?;
        if !request.zoom.is_finite() || request.zoom < 1.0 {
            return Err(SimError::InvalidZoom(request.zoom));
        }
        if !(0.0..=1.0).contains(&request.progress) {
            return Err(SimError::InvalidProgress(request.progress));
        }
        if let Some(id) = request.spectate {
            self.check_agent(id)?;
        }
        let span = debug_span!("render", zoom = request.zoom, spectate = ?request.spectate);
        let _guard = span.enter();

        let params: [f32; VIEW_PARAMS_LEN] = [
            self.config.framebuffer_width as f32,
            self.config.framebuffer_height as f32,
            request.center_x,
            request.center_y,
            request.zoom,
            request.progress,
        ];
        self.view.params.host_mut().copy_from_slice(&params);
        self.view.params.upload(&mut self.context)?;

        let mut center = (request.center_x, request.center_y);
        if let Some(id) = request.spectate {
            self.view.target.host_mut()[0] = id as i32;
            self.view.target.upload(&mut self.context)?;
            self.context.dispatch(SPECTATE_CREATURE, 1)?;
            self.context.finish()?;
            self.view.params.download(&mut self.context)?;
            let params = self.view.params.host();
            center = (params[2], params[3]);
        }

        let pixels = self.config.pixels() as u32;
        self.context.dispatch(RENDER_BACKGROUND, pixels)?;
        self.context.finish()?;

        let foreground = ForegroundKernel::for_zoom(request.zoom, self.config.dynamics.detail_zoom);
        self.context.dispatch(foreground.kernel(), pixels)?;
        self.context.finish()?;

        self.view.framebuffer.download(&mut self.context)?;
        Ok(RenderOutcome { center, foreground })
    }

    /// Pixels of the last rendered frame, row-major, `0xAARRGGBB`.
    pub fn framebuffer(&self) -> SimResult<&[u32]> {
        self.ensure_live()?;
        Ok(self.view.framebuffer.host())
    }

    /// Overwrites every creature's weights with creature `id`'s weights.
    pub fn replicate_to_all(&mut self, id: AgentId) -> SimResult<()> {
        self.ensure_live()?;
        self.check_agent(id)?;

        self.view.target.host_mut()[0] = id as i32;
        self.view.target.upload(&mut self.context)?;
        self.context.dispatch(COPY_SPECTATING_TO_ALL, self.population.len() as u32)?;
        self.context.finish()?;
        debug!(source = id, "weights replicated to every creature");
        Ok(())
    }

    /// Downloads every simulation buffer into an owned snapshot.
    pub fn snapshot(&mut self) -> SimResult<WorldSnapshot> {
        self.ensure_live()?;
        self.world.download(&mut self.context)?;
        self.population.download(&mut self.context)?;
        self.network.download(&mut self.context)?;

        let (world, population, network) = (&self.world, &self.population, &self.network);
        Ok(WorldSnapshot {
            tick: self.tick,
            width: world.width(),
            height: world.height(),
            writing_to_a: world.writing_to_a.host()[0],
            grid_a: world.grid_a.host().to_vec(),
            grid_b: world.grid_b.host().to_vec(),
            objects: world.objects.host().to_vec(),
            food: world.food.host().to_vec(),
            random: world.random.host().to_vec(),
            x: population.x.host().to_vec(),
            y: population.y.host().to_vec(),
            prev_x: population.prev_x.host().to_vec(),
            prev_y: population.prev_y.host().to_vec(),
            energy: population.energy.host().to_vec(),
            hue: population.hue.host().to_vec(),
            direction: population.direction.host().to_vec(),
            action: population.action.host().to_vec(),
            last_success: population.last_success.host().to_vec(),
            weights: network.weights.host().to_vec(),
            outputs: network.outputs.host().to_vec(),
        })
    }

    /// Summary statistics of the current state.
    pub fn stats(&mut self) -> SimResult<PopulationStats> {
        Ok(self.snapshot()?.stats())
    }

    /// Releases every device resource. The simulator is unusable afterwards.
    pub fn dispose(&mut self) -> SimResult<()> {
        self.ensure_live()?;
        self.disposed = true;
        self.context.dispose_all()?;
        info!(ticks = self.tick, "simulator disposed");
        Ok(())
    }

    /// Number of completed ticks. Valid after dispose.
    pub fn current_tick(&self) -> Tick {
        self.tick
    }

    /// Configuration the simulator was built from. Valid after dispose.
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Shared network shape. Valid after dispose.
    pub fn topology(&self) -> &NetworkTopology {
        self.network.topology()
    }

    /// Number of creatures. Valid after dispose.
    pub fn population(&self) -> usize {
        self.population.len()
    }

    /// Underlying compute context, for dispatch counters and memory totals.
    /// After dispose it reports zero live buffers and rejects device work.
    pub fn context(&self) -> &ComputeContext {
        &self.context
    }

    /// Whether [`Simulator::dispose`] has run.
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    fn bind_all(&mut self) -> SimResult<()> {
        for spec in KERNELS.iter() {
            for (arg, &slot) in spec.args.iter().enumerate() {
                let handle = self.handle(slot).ok_or_else(|| ComputeError::UnboundArgument {
                    kernel: spec.name.to_owned(),
                    arg: arg as u32,
                })?;
                self.context.bind(spec.name, arg as u32, handle)?;
            }
        }
        debug!(kernels = KERNELS.len(), "kernel arguments bound");
        Ok(())
    }

    fn handle(&self, slot: BufferSlot) -> Option<BufferHandle> {
        self.world
            .handle(slot)
            .or_else(|| self.population.handle(slot))
            .or_else(|| self.network.handle(slot))
            .or_else(|| self.view.handle(slot))
    }

    fn check_agent(&self, id: AgentId) -> SimResult<()> {
        if id as usize >= self.population.len() {
            return Err(SimError::AgentOutOfRange {
                id,
                population: self.population.len(),
            });
        }
        Ok(())
    }

    fn ensure_live(&self) -> SimResult<()> {
        if self.disposed { Err(SimError::Disposed) } else { Ok(()) }
    }
}

fn open_context(program: &ProgramSource) -> ComputeResult<ComputeContext> {
    let kernels = kernel_names();
    match program {
        ProgramSource::Reference => ComputeContext::host(reference_program(), &kernels),
        #[cfg(feature = "gpu")]
        ProgramSource::Wgsl { path } => ComputeContext::wgpu(path, &kernels),
        #[cfg(not(feature = "gpu"))]
        ProgramSource::Wgsl { path } => Err(ComputeError::NoDevice {
            message: format!("{} requires the `gpu` feature", path.display()),
        }),
    }
}
