//! Evolve a fuzzy food-seeking controller for a point robot.
//!
//! Each chromosome is one fuzzy rule: a distance condition per range sensor,
//! a smell condition on the bearing to the food, and two return genes for the
//! turn angle and step length. A toy arena stands in for the simulator.
//!
//! Run with: cargo run --release --example fuzzy_controller -- --generations 50

// Allow print in the demo binary
#![allow(clippy::print_stdout, clippy::print_stderr)]
#![allow(missing_docs)]
// Tick and collision counts feed the fitness score
#![allow(clippy::cast_precision_loss)]

use clap::Parser;
use evobot::ga::{
    Args as GeneArgs, Checkpoint, Chromosome, EvolutionConfig, GeneticAlgorithm, Genotype, Inputs,
    Registry, StallDetector, checkpoint_path, save_checkpoint, save_rule_rows,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const SENSORS: [(&str, f64); 3] = [("left", -45.0), ("front", 0.0), ("right", 45.0)];
const SENSOR_RANGE: f64 = 100.0;
const RULES: usize = 10;

/// Evolve a fuzzy controller in a square arena
#[derive(Parser, Debug)]
#[command(name = "fuzzy_controller")]
struct Cli {
    /// Number of generations
    #[arg(short, long, default_value = "50")]
    generations: usize,

    /// Simulation ticks per episode
    #[arg(short, long, default_value = "200")]
    ticks: usize,

    /// JSON evolution config (defaults when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Random seed, overriding the config
    #[arg(short, long)]
    seed: Option<u64>,

    /// Directory for checkpoints and the best rule rows
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Checkpoint every N generations
    #[arg(long, default_value = "10")]
    checkpoint_interval: usize,

    /// Show a progress bar
    #[arg(short, long)]
    verbose: bool,
}

/// Triangular membership: 1 at `peak`, 0 at `peak ± width`.
fn triangle(x: f64, peak: f64, width: f64) -> f64 {
    (1.0 - (x - peak).abs() / width).max(0.0)
}

fn near(a: &GeneArgs) -> Result<f64, evobot::CapabilityError> {
    Ok((1.0 - a.get("distance")? / SENSOR_RANGE).clamp(0.0, 1.0))
}

fn far(a: &GeneArgs) -> Result<f64, evobot::CapabilityError> {
    Ok((a.get("distance")? / SENSOR_RANGE).clamp(0.0, 1.0))
}

/// Controller template plus the registry its genes resolve in.
fn template() -> evobot::Result<Genotype> {
    let mut builder = Registry::builder();
    let distance = builder
        .rule_table()
        .entry("_", |_: &GeneArgs| Ok(1.0))
        .entry("near", near)
        .entry("far", far)
        .finish();
    let smell = builder
        .rule_table()
        .entry("_", |_: &GeneArgs| Ok(1.0))
        .entry("left", |a: &GeneArgs| Ok(triangle(a.get("bearing")?, -90.0, 90.0)))
        .entry("center", |a: &GeneArgs| Ok(triangle(a.get("bearing")?, 0.0, 45.0)))
        .entry("right", |a: &GeneArgs| Ok(triangle(a.get("bearing")?, 90.0, 90.0)))
        .finish();
    let turn = builder.transform(|x, _: &GeneArgs| Ok(x.rem_euclid(181.0) - 90.0));
    let step = builder.transform(|x, _: &GeneArgs| Ok(x.rem_euclid(21.0) - 10.0));
    let registry = builder.build();

    let wildcard = registry
        .symbol("_")
        .ok_or_else(|| evobot::GeneticError::InvalidConfig("wildcard symbol missing".into()))?;
    let mut genotype = Genotype::new(Arc::clone(&registry));
    for _ in 0..RULES {
        let mut rule = Chromosome::new(Arc::clone(&registry));
        for (sensor, _) in SENSORS {
            rule.add_rule_gene(wildcard, distance, Some(sensor.into()))?;
        }
        rule.add_rule_gene(wildcard, smell, Some("smell".into()))?;
        rule.add_return_gene(90.0, turn, Some("turn".into()))?;
        rule.add_return_gene(10.0, step, Some("step".into()))?;
        genotype.add_chromosome(rule)?;
    }
    Ok(genotype)
}

/// Square arena with one piece of food.
#[derive(Debug, Clone, Copy)]
struct Arena {
    size: f64,
    food: (f64, f64),
}

/// Mutable state of one robot during an episode.
#[derive(Debug, Clone, Copy)]
struct Robot {
    x: f64,
    y: f64,
    heading: f64,
    collisions: usize,
}

impl Robot {
    fn new(arena: &Arena) -> Self {
        Self {
            x: arena.size / 2.0,
            y: arena.size / 2.0,
            heading: 0.0,
            collisions: 0,
        }
    }

    /// Distance along `bearing` (degrees relative to heading) to the nearest wall.
    fn ray(&self, arena: &Arena, bearing: f64) -> f64 {
        let (dy, dx) = (self.heading + bearing).to_radians().sin_cos();
        let mut hit = f64::INFINITY;
        for (pos, dir) in [(self.x, dx), (self.y, dy)] {
            if dir > 1e-9 {
                hit = hit.min((arena.size - pos) / dir);
            } else if dir < -1e-9 {
                hit = hit.min(-pos / dir);
            }
        }
        hit.min(SENSOR_RANGE)
    }

    /// Bearing of the food relative to the heading, in `[-180, 180)`.
    fn smell(&self, arena: &Arena) -> f64 {
        let angle = (arena.food.1 - self.y).atan2(arena.food.0 - self.x).to_degrees();
        (angle - self.heading + 180.0).rem_euclid(360.0) - 180.0
    }

    fn food_distance(&self, arena: &Arena) -> f64 {
        (arena.food.0 - self.x).hypot(arena.food.1 - self.y)
    }

    fn sense(&self, arena: &Arena) -> Inputs {
        let mut inputs = Inputs::new();
        for (sensor, bearing) in SENSORS {
            inputs.insert(sensor, GeneArgs::new().with("distance", self.ray(arena, bearing)));
        }
        inputs.insert("smell", GeneArgs::new().with("bearing", self.smell(arena)));
        inputs
    }

    fn act(&mut self, arena: &Arena, turn: f64, step: f64) {
        self.heading = (self.heading + turn).rem_euclid(360.0);
        let (dy, dx) = self.heading.to_radians().sin_cos();
        let (x, y) = (self.x + dx * step, self.y + dy * step);
        let clamped = (x.clamp(0.0, arena.size), y.clamp(0.0, arena.size));
        if clamped != (x, y) {
            self.collisions += 1;
        }
        (self.x, self.y) = clamped;
    }
}

/// Run one episode; reaching the food early scores highest.
fn episode(genotype: &Genotype, arena: &Arena, ticks: usize) -> evobot::Result<f64> {
    let mut robot = Robot::new(arena);
    for tick in 0..ticks {
        let decision = genotype.evaluate(&robot.sense(arena))?;
        robot.act(arena, decision[0], decision[1].clamp(-10.0, 10.0));
        if robot.food_distance(arena) < 10.0 {
            return Ok(1000.0 + (ticks - tick) as f64);
        }
    }
    Ok(500.0 - robot.food_distance(arena) - 2.0 * robot.collisions as f64)
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => EvolutionConfig::from_json_file(path)?,
        None => EvolutionConfig::default(),
    };
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }
    config.verbose = cli.verbose;
    if let Some(dir) = &cli.output {
        std::fs::create_dir_all(dir)?;
    }

    let template = template()?;
    let arena = Arena {
        size: 400.0,
        food: (340.0, 80.0),
    };
    let mut ga = GeneticAlgorithm::new(config)?;
    ga.initialize_population(&template)?;
    let mut stall = StallDetector::default();

    info!(
        generations = cli.generations,
        population = ga.config().population_size,
        seed = ga.config().seed,
        "starting evolution"
    );

    for _ in 0..cli.generations {
        ga.evaluate_population_with(|_, genotype| episode(genotype, &arena, cli.ticks))?;
        let best = ga.best().map_or(f64::NEG_INFINITY, |(_, fit)| fit);

        if stall.observe(best) {
            // Replace the weaker half so the population can escape the plateau.
            let mut order: Vec<usize> = (0..ga.population().len()).collect();
            order.sort_by(|&a, &b| ga.fitness()[a].total_cmp(&ga.fitness()[b]));
            let reborn = order.len() / 2;
            for &index in &order[..reborn] {
                ga.rebirth(index)?;
            }
            warn!(generation = ga.generation(), reborn, "fitness stalled");
            stall.reset();
        }

        if let Some(dir) = &cli.output
            && cli.checkpoint_interval > 0
            && ga.generation().is_multiple_of(cli.checkpoint_interval)
        {
            let path = checkpoint_path(dir, ga.generation());
            save_checkpoint(&Checkpoint::capture(&ga), &path)?;
            info!(path = %path.display(), "checkpoint saved");
        }

        ga.create_next_generation()?;
    }

    ga.evaluate_population_with(|_, genotype| episode(genotype, &arena, cli.ticks))?;
    let Some((best, fitness)) = ga.best() else {
        return Err("population was not evaluated".into());
    };
    println!("Best fitness after {} generations: {fitness:.2}", ga.generation());
    println!("{best}");

    if let Some(dir) = &cli.output {
        let path = dir.join("best_rules.csv");
        save_rule_rows(best, &path)?;
        println!("Rules written to {}", path.display());
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
