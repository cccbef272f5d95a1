// Run:
//   cargo test --test kernels

use creature_sim::compute::{BufferHandle, ComputeContext, DeviceArray};
use creature_sim::engine::types::{OBJECT_NONE, OBJECT_WALL};
use creature_sim::kernels::grid::{
    COPY_COST, DAMAGE_AMOUNT, DAMAGE_GAIN, FOOD_ENERGY, MUTATION_SCALE, TICK_ENERGY_COST,
    WALL_COST,
};
use creature_sim::kernels::{
    kernel_names, reference_program, BufferSlot as S, KernelSpec, ACTION, ACTION_SPEC, ADD_FOOD,
    ADD_FOOD_SPEC, KERNELS, SPREAD_FOOD, SPREAD_FOOD_SPEC,
};
use creature_sim::{Action, ComputeResult, Direction, EMPTY_CELL};

const W: usize = 8;
const H: usize = 8;
const WEIGHTS: usize = 6;
const NEURONS: usize = 4;

fn cell(x: i32, y: i32) -> usize {
    x as usize + y as usize * W
}

#[derive(Clone, Copy)]
struct Creature {
    x: i32,
    y: i32,
    facing: Direction,
    action: Action,
    energy: i16,
    weight: f32,
}

impl Creature {
    fn at(x: i32, y: i32, facing: Direction, action: Action) -> Self {
        Self { x, y, facing, action, energy: 100, weight: 0.0 }
    }
}

/// A hand-built world on the reference program, with the action and food
/// kernels bound the way the simulator binds them.
struct Board {
    ctx: ComputeContext,
    world_size: DeviceArray<i32>,
    writing_to_a: DeviceArray<i32>,
    grid_a: DeviceArray<i32>,
    grid_b: DeviceArray<i32>,
    objects: DeviceArray<u8>,
    food: DeviceArray<f32>,
    food_back: DeviceArray<f32>,
    random: DeviceArray<i32>,
    x: DeviceArray<i32>,
    y: DeviceArray<i32>,
    prev_x: DeviceArray<i32>,
    prev_y: DeviceArray<i32>,
    energy: DeviceArray<i16>,
    direction: DeviceArray<u8>,
    action: DeviceArray<u8>,
    last_success: DeviceArray<u8>,
    select_x: DeviceArray<i8>,
    select_y: DeviceArray<i8>,
    weights_per_agent: DeviceArray<i32>,
    neurons_per_agent: DeviceArray<i32>,
    weights: DeviceArray<f32>,
    outputs: DeviceArray<f32>,
}

impl Board {
    /// Writes grid A and reads grid B; both start with every creature stamped.
    fn new(creatures: &[Creature], food: Vec<f32>) -> ComputeResult<Self> {
        let mut ctx = ComputeContext::host(reference_program(), &kernel_names())?;
        let n = creatures.len();

        let mut grid = vec![EMPTY_CELL; W * H];
        for (id, c) in creatures.iter().enumerate() {
            grid[cell(c.x, c.y)] = id as i32;
        }
        let xs: Vec<i32> = creatures.iter().map(|c| c.x).collect();
        let ys: Vec<i32> = creatures.iter().map(|c| c.y).collect();
        let weights = creatures
            .iter()
            .flat_map(|c| std::iter::repeat(c.weight).take(WEIGHTS))
            .collect();

        let board = Self {
            world_size: DeviceArray::new(&mut ctx, "world_size", vec![W as i32, H as i32])?,
            writing_to_a: DeviceArray::new(&mut ctx, "writing_to_a", vec![1])?,
            grid_a: DeviceArray::new(&mut ctx, "world_a", grid.clone())?,
            grid_b: DeviceArray::new(&mut ctx, "world_b", grid)?,
            objects: DeviceArray::new(&mut ctx, "world_objects", vec![OBJECT_NONE; W * H])?,
            food_back: DeviceArray::new(&mut ctx, "world_food_back", food.clone())?,
            food: DeviceArray::new(&mut ctx, "world_food", food)?,
            random: DeviceArray::new(
                &mut ctx,
                "random_numbers",
                (0..(W * H) as i32).map(|c| 0x1234_5678 + c).collect(),
            )?,
            prev_x: DeviceArray::new(&mut ctx, "p_creature_x", xs.clone())?,
            prev_y: DeviceArray::new(&mut ctx, "p_creature_y", ys.clone())?,
            x: DeviceArray::new(&mut ctx, "creature_x", xs)?,
            y: DeviceArray::new(&mut ctx, "creature_y", ys)?,
            energy: DeviceArray::new(
                &mut ctx,
                "creature_energy",
                creatures.iter().map(|c| c.energy).collect(),
            )?,
            direction: DeviceArray::new(
                &mut ctx,
                "creature_direction",
                creatures.iter().map(|c| c.facing as u8).collect(),
            )?,
            action: DeviceArray::new(
                &mut ctx,
                "creature_action",
                creatures.iter().map(|c| c.action as u8).collect(),
            )?,
            last_success: DeviceArray::new(&mut ctx, "last_action_success", vec![1; n])?,
            select_x: DeviceArray::zeroed(&mut ctx, "select_x", n)?,
            select_y: DeviceArray::zeroed(&mut ctx, "select_y", n)?,
            weights_per_agent: DeviceArray::new(&mut ctx, "weights_per_nn", vec![WEIGHTS as i32])?,
            neurons_per_agent: DeviceArray::new(&mut ctx, "neurons_per_nn", vec![NEURONS as i32])?,
            weights: DeviceArray::new(&mut ctx, "nn_weights", weights)?,
            outputs: DeviceArray::new(&mut ctx, "nn_neuron_outputs", vec![1.0; n * NEURONS])?,
            ctx,
        };
        board.bind_all()
    }

    fn handle(&self, slot: S) -> BufferHandle {
        match slot {
            S::WorldSize => self.world_size.handle(),
            S::WritingToA => self.writing_to_a.handle(),
            S::GridA => self.grid_a.handle(),
            S::GridB => self.grid_b.handle(),
            S::Objects => self.objects.handle(),
            S::Food => self.food.handle(),
            S::FoodBack => self.food_back.handle(),
            S::RandomField => self.random.handle(),
            S::CreatureX => self.x.handle(),
            S::CreatureY => self.y.handle(),
            S::PrevX => self.prev_x.handle(),
            S::PrevY => self.prev_y.handle(),
            S::Energy => self.energy.handle(),
            S::Direction => self.direction.handle(),
            S::Action => self.action.handle(),
            S::LastSuccess => self.last_success.handle(),
            S::SelectX => self.select_x.handle(),
            S::SelectY => self.select_y.handle(),
            S::WeightsPerAgent => self.weights_per_agent.handle(),
            S::NeuronsPerAgent => self.neurons_per_agent.handle(),
            S::Weights => self.weights.handle(),
            S::NeuronOutputs => self.outputs.handle(),
            other => panic!("board has no {other:?} buffer"),
        }
    }

    fn bind_all(mut self) -> ComputeResult<Self> {
        let specs: [&KernelSpec; 3] = [&ACTION_SPEC, &ADD_FOOD_SPEC, &SPREAD_FOOD_SPEC];
        for spec in specs {
            for (arg, &slot) in spec.args.iter().enumerate() {
                let handle = self.handle(slot);
                self.ctx.bind(spec.name, arg as u32, handle)?;
            }
        }
        Ok(self)
    }

    /// Dispatches `kernel` over `items`, waits, and downloads every buffer.
    fn run(&mut self, kernel: &str, items: usize) -> ComputeResult<()> {
        self.ctx.dispatch(kernel, items as u32)?;
        self.ctx.finish()?;

        let ctx = &mut self.ctx;
        self.grid_a.download(ctx)?;
        self.grid_b.download(ctx)?;
        self.objects.download(ctx)?;
        self.food.download(ctx)?;
        self.food_back.download(ctx)?;
        self.random.download(ctx)?;
        self.x.download(ctx)?;
        self.y.download(ctx)?;
        self.prev_x.download(ctx)?;
        self.prev_y.download(ctx)?;
        self.energy.download(ctx)?;
        self.last_success.download(ctx)?;
        self.weights.download(ctx)?;
        self.outputs.download(ctx)
    }

    fn act(&mut self) -> ComputeResult<()> {
        let n = self.energy.len();
        self.run(ACTION, n)
    }
}

fn flat_food(level: f32) -> Vec<f32> {
    vec![level; W * H]
}

#[test]
fn kernel_table_matches_binding_layout() {
    let foreground: &[S] = &[
        S::WorldSize, S::WritingToA, S::GridA, S::GridB, S::CreatureX, S::CreatureY, S::PrevX,
        S::PrevY, S::ViewParams, S::Framebuffer, S::SelectX, S::SelectY, S::Hue, S::Energy,
    ];
    let expected: [(&str, &[S]); 11] = [
        (
            "actionKernel",
            &[
                S::WorldSize, S::WritingToA, S::GridA, S::GridB, S::SelectX, S::SelectY,
                S::CreatureX, S::CreatureY, S::PrevX, S::PrevY, S::LastSuccess, S::Energy,
                S::Action, S::Objects, S::RandomField, S::WeightsPerAgent, S::Weights,
                S::NeuronsPerAgent, S::NeuronOutputs, S::Direction, S::Food,
            ],
        ),
        (
            "actionCleanupKernel",
            &[
                S::WorldSize, S::WritingToA, S::GridA, S::GridB, S::PrevX, S::PrevY,
                S::CreatureX, S::CreatureY,
            ],
        ),
        ("renderForegroundSimpleKernel", foreground),
        ("renderForegroundDetailedKernel", foreground),
        (
            "updateCreatureKernel",
            &[
                S::WorldSize, S::WritingToA, S::GridA, S::GridB, S::SelectX, S::SelectY,
                S::LastSuccess, S::RandomField, S::CreatureX, S::CreatureY, S::Energy, S::Food,
                S::Action, S::Direction, S::VisionSize, S::Hue, S::Objects, S::NeuronOutputs,
                S::NeuronsPerAgent, S::WeightsPerAgent, S::LayerSizes, S::LayerCount,
                S::WeightOffsets, S::NeuronOffsets, S::Weights,
            ],
        ),
        ("addFoodKernel", &[S::WorldSize, S::Food, S::FoodBack, S::RandomField]),
        ("spreadFoodKernel", &[S::WorldSize, S::Food, S::FoodBack, S::RandomField]),
        ("flipWritingToAKernel", &[S::WritingToA]),
        (
            "renderBackgroundKernel",
            &[S::WorldSize, S::ViewParams, S::Food, S::Objects, S::Framebuffer],
        ),
        (
            "spectateCreatureKernel",
            &[
                S::WorldSize, S::CreatureX, S::CreatureY, S::PrevX, S::PrevY,
                S::SpectateTarget, S::ViewParams,
            ],
        ),
        ("copySpectatingToAll", &[S::SpectateTarget, S::WeightsPerAgent, S::Weights]),
    ];

    let actual: Vec<(&str, &[S])> = KERNELS.iter().map(|k| (k.name, k.args)).collect();
    assert_eq!(actual, expected.to_vec());
    assert_eq!(kernel_names(), expected.iter().map(|(name, _)| *name).collect::<Vec<_>>());
}

#[test]
fn contested_move_goes_to_lower_id() -> ComputeResult<()> {
    for (left, right) in [(0usize, 1usize), (1, 0)] {
        let mut creatures = [Creature::at(0, 0, Direction::North, Action::Nothing); 2];
        creatures[left] = Creature::at(1, 2, Direction::East, Action::Move);
        creatures[right] = Creature::at(3, 2, Direction::West, Action::Move);
        let mut board = Board::new(&creatures, flat_food(0.0))?;

        board.act()?;

        let target = cell(2, 2);
        assert_eq!(board.grid_a.host()[target], 0, "lower id takes the cell");
        assert_eq!(board.last_success.host(), &[1, 0]);
        assert_eq!(board.energy.host(), &[100 - TICK_ENERGY_COST; 2]);

        let (winner_from, loser_at) = if left == 0 { (1, 3) } else { (3, 1) };
        assert_eq!(board.x.host()[0], 2);
        assert_eq!(board.prev_x.host()[0], winner_from);
        assert_eq!(board.x.host()[1], loser_at);
        assert_eq!(board.grid_a.host()[cell(winner_from, 2)], EMPTY_CELL);
        assert_eq!(board.grid_a.host()[cell(loser_at, 2)], 1);
        assert_eq!(board.grid_b.host()[target], EMPTY_CELL, "read grid is untouched");
    }
    Ok(())
}

#[test]
fn eating_clears_food_and_gains_energy() -> ComputeResult<()> {
    let mut food = flat_food(0.1);
    food[cell(4, 4)] = 0.5;
    let mut board = Board::new(&[Creature::at(4, 4, Direction::South, Action::Eat)], food)?;

    board.act()?;

    assert_eq!(board.food.host()[cell(4, 4)], 0.0);
    assert_eq!(board.food.host()[cell(4, 5)], 0.1);
    let gain = (0.5 * FOOD_ENERGY) as i16;
    assert_eq!(board.energy.host(), &[100 - TICK_ENERGY_COST + gain]);
    assert_eq!(board.last_success.host(), &[1]);
    Ok(())
}

#[test]
fn placed_wall_blocks_a_later_move() -> ComputeResult<()> {
    let creatures = [
        Creature::at(1, 1, Direction::East, Action::PlaceWall),
        Creature::at(3, 1, Direction::West, Action::Move),
    ];
    let mut board = Board::new(&creatures, flat_food(0.0))?;

    board.act()?;

    assert_eq!(board.objects.host()[cell(2, 1)], OBJECT_WALL);
    assert_eq!(board.last_success.host(), &[1, 0]);
    assert_eq!(board.energy.host()[0], 100 - TICK_ENERGY_COST - WALL_COST);
    assert_eq!((board.x.host()[1], board.y.host()[1]), (3, 1));
    assert_eq!(board.grid_a.host()[cell(2, 1)], EMPTY_CELL);
    assert_eq!(board.grid_a.host()[cell(3, 1)], 1);
    Ok(())
}

#[test]
fn damage_drains_the_creature_in_front() -> ComputeResult<()> {
    let mut target = Creature::at(3, 2, Direction::North, Action::Nothing);
    target.energy = 200;
    let creatures = [Creature::at(2, 2, Direction::East, Action::Damage), target];
    let mut board = Board::new(&creatures, flat_food(0.0))?;

    board.act()?;

    assert_eq!(
        board.energy.host(),
        &[
            100 - TICK_ENERGY_COST + DAMAGE_GAIN,
            200 - DAMAGE_AMOUNT - TICK_ENERGY_COST,
        ]
    );
    assert_eq!(board.last_success.host(), &[1, 1]);
    Ok(())
}

#[test]
fn copy_overwrites_the_target_network() -> ComputeResult<()> {
    let mut source = Creature::at(2, 2, Direction::East, Action::Copy);
    source.weight = 0.5;
    let mut target = Creature::at(3, 2, Direction::North, Action::Nothing);
    target.weight = 5.0;
    let mut board = Board::new(&[source, target], flat_food(0.0))?;

    board.act()?;

    let weights = board.weights.host();
    assert!(weights[..WEIGHTS].iter().all(|&w| w == 0.5), "source is unchanged");
    for &w in &weights[WEIGHTS..] {
        assert!((w - 0.5).abs() <= MUTATION_SCALE + 1e-6, "copied weight {w}");
    }
    let outputs = board.outputs.host();
    assert!(outputs[..NEURONS].iter().all(|&o| o == 1.0));
    assert!(outputs[NEURONS..].iter().all(|&o| o == 0.0), "target outputs reset");
    assert_eq!(board.energy.host()[0], 100 - TICK_ENERGY_COST - COPY_COST);
    assert_eq!(board.last_success.host(), &[1, 1]);
    Ok(())
}

#[test]
fn spreading_conserves_food() -> ComputeResult<()> {
    let food: Vec<f32> = (0..W * H).map(|c| ((c * 7919) % 13) as f32 * 0.05).collect();
    let mut board = Board::new(&[Creature::at(0, 0, Direction::North, Action::Nothing)], food)?;
    let before: f64 = board.food.host().iter().map(|&f| f as f64).sum();

    board.run(ADD_FOOD, W * H)?;
    let grown: f64 = board.food.host().iter().map(|&f| f as f64).sum();
    assert!(grown >= before);
    assert_eq!(board.food.host(), board.food_back.host());

    board.run(SPREAD_FOOD, W * H)?;
    let spread: f64 = board.food.host().iter().map(|&f| f as f64).sum();
    assert!((spread - grown).abs() < 1e-4, "total {grown} became {spread}");
    assert!(board.food.host().iter().all(|&f| f >= 0.0));
    assert_ne!(board.food.host(), board.food_back.host(), "food moved between cells");
    Ok(())
}
