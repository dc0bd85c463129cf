//! Generational evolution driver.
//!
//! [`GeneticAlgorithm`] owns a population of genotypes and its index-aligned
//! fitness scores. One generation is:
//!
//! 1. fitness is assigned (evaluated in-engine, by a closure, or reported by
//!    the caller after an episode),
//! 2. the elite are copied over unchanged,
//! 3. pairs of parents are selected, recombined and mutated until the next
//!    population is full.
//!
//! Fitness is cleared whenever the population is replaced, so a generation
//! step can never run on scores that belong to a different population.

// Elite counts and progress lengths use intentional casts
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]

use crate::error::{GeneticError, Result};
use crate::ga::crossover::Crossover;
use crate::ga::genotype::Genotype;
use crate::ga::mutation::Mutation;
use crate::ga::persistence::PersistenceError;
use crate::ga::registry::Inputs;
use crate::ga::selection::{FitnessStats, Selection, check_fitness, select_elite};
use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Configuration for the evolution process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionConfig {
    /// Number of individuals per generation.
    pub population_size: usize,
    /// Fraction of the population copied unchanged into the next generation.
    pub elitism_percentage: f64,
    /// Chance that a parent pair is recombined rather than cloned.
    pub crossover_rate: f64,
    /// Parent selection strategy.
    pub selection: Selection,
    /// Recombination strategy.
    pub crossover: Crossover,
    /// Mutation applied to every child.
    pub mutation: Mutation,
    /// RNG seed for reproducibility.
    pub seed: u64,
    /// Whether to draw a progress bar during [`GeneticAlgorithm::run`].
    pub verbose: bool,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            population_size: 50,
            elitism_percentage: 0.1,
            crossover_rate: 1.0,
            selection: Selection::default(),
            crossover: Crossover::default(),
            mutation: Mutation::default(),
            seed: 42,
            verbose: false,
        }
    }
}

impl EvolutionConfig {
    /// Check every parameter range.
    ///
    /// # Errors
    ///
    /// [`GeneticError::InvalidConfig`] for sizes and fractions out of range,
    /// [`GeneticError::InvalidProbability`] for the crossover rate, and any
    /// error from [`Mutation::validate`].
    pub fn validate(&self) -> Result<()> {
        if self.population_size == 0 {
            return Err(GeneticError::InvalidConfig(
                "population_size must be at least 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.elitism_percentage) {
            return Err(GeneticError::InvalidConfig(format!(
                "elitism_percentage {} must be within [0, 1]",
                self.elitism_percentage
            )));
        }
        if !(0.0..=1.0).contains(&self.crossover_rate) {
            return Err(GeneticError::InvalidProbability(self.crossover_rate));
        }
        let tournament_size = match self.selection {
            Selection::Tournament { size } => size,
            _ => 1,
        };
        if tournament_size == 0 || tournament_size > self.population_size {
            return Err(GeneticError::InvalidTournamentSize {
                size: tournament_size,
                population: self.population_size,
            });
        }
        self.mutation.validate()
    }

    /// Number of elite individuals: `ceil(elitism_percentage * population_size)`.
    #[must_use]
    pub fn elite_count(&self) -> usize {
        let count = (self.elitism_percentage * self.population_size as f64).ceil();
        (count.max(0.0) as usize).min(self.population_size)
    }

    /// Parse and validate a JSON configuration. Missing fields take defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or the values are out of range.
    pub fn from_json_str(json: &str) -> std::result::Result<Self, PersistenceError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or
    /// [`EvolutionConfig::from_json_str`] fails.
    pub fn from_json_file(path: &Path) -> std::result::Result<Self, PersistenceError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}

/// Lifecycle of the population held by a [`GeneticAlgorithm`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// No population yet.
    Uninitialized,
    /// Initial population awaiting fitness.
    Ready,
    /// Fitness is assigned to the current population.
    Evaluated,
    /// A new generation replaced the population and awaits fitness.
    NextGeneration,
}

/// Statistics for a single generation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationStats {
    /// Generation number.
    pub generation: usize,
    /// Best fitness in this generation.
    pub best_fitness: f64,
    /// Mean fitness.
    pub mean_fitness: f64,
    /// Fitness standard deviation.
    pub fitness_std: f64,
}

/// Overall statistics from an evolution run.
#[derive(Debug, Clone)]
pub struct EvolutionStats {
    /// Statistics per generation.
    pub generations: Vec<GenerationStats>,
    /// Best fitness achieved.
    pub best_fitness: f64,
    /// Generation where best fitness was achieved.
    pub best_generation: usize,
    /// Total time in seconds.
    pub elapsed_seconds: f64,
}

/// Genetic algorithm over a population of [`Genotype`]s.
#[derive(Debug)]
pub struct GeneticAlgorithm<R: Rng = SmallRng> {
    config: EvolutionConfig,
    population: Vec<Genotype>,
    fitness: Vec<f64>,
    phase: Phase,
    generation: usize,
    rng: R,
    history: Vec<GenerationStats>,
}

impl GeneticAlgorithm<SmallRng> {
    /// Create a driver seeded from `config.seed`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: EvolutionConfig) -> Result<Self> {
        let rng = SmallRng::seed_from_u64(config.seed);
        Self::with_rng(config, rng)
    }
}

impl<R: Rng> GeneticAlgorithm<R> {
    /// Create a driver drawing all randomness from `rng`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_rng(config: EvolutionConfig, rng: R) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            population: Vec::new(),
            fitness: Vec::new(),
            phase: Phase::Uninitialized,
            generation: 0,
            rng,
            history: Vec::new(),
        })
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &EvolutionConfig {
        &self.config
    }

    /// Current population.
    #[must_use]
    pub fn population(&self) -> &[Genotype] {
        &self.population
    }

    /// Fitness of the current population; empty until assigned.
    #[must_use]
    pub fn fitness(&self) -> &[f64] {
        &self.fitness
    }

    /// Current lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Number of generations produced so far.
    #[must_use]
    pub fn generation(&self) -> usize {
        self.generation
    }

    /// Statistics of every completed generation.
    #[must_use]
    pub fn history(&self) -> &[GenerationStats] {
        &self.history
    }

    /// Fill the population with randomized clones of `template`.
    ///
    /// Resets the generation counter and history.
    ///
    /// # Errors
    ///
    /// [`GeneticError::EmptyGenotype`] for a template without chromosomes, or
    /// an error from randomization.
    pub fn initialize_population(&mut self, template: &Genotype) -> Result<()> {
        if template.is_empty() {
            return Err(GeneticError::EmptyGenotype);
        }
        let mut population = Vec::with_capacity(self.config.population_size);
        for _ in 0..self.config.population_size {
            let mut individual = template.clone();
            individual.randomize(&mut self.rng)?;
            population.push(individual);
        }
        self.population = population;
        self.fitness.clear();
        self.generation = 0;
        self.history.clear();
        self.phase = Phase::Ready;
        debug!(
            population = self.population.len(),
            chromosomes = template.len(),
            "population initialized"
        );
        Ok(())
    }

    fn ensure_population(&self) -> Result<()> {
        if self.phase == Phase::Uninitialized || self.population.is_empty() {
            Err(GeneticError::EmptyPopulation)
        } else {
            Ok(())
        }
    }

    /// Score every individual by the first output channel of its decision
    /// for `inputs`. Individuals are evaluated in parallel.
    ///
    /// # Errors
    ///
    /// [`GeneticError::EmptyPopulation`] before initialization,
    /// [`GeneticError::NoOutputChannels`] for genotypes without return genes,
    /// [`GeneticError::InvalidFitness`] for a NaN or infinite decision, or
    /// the first evaluation error. Fitness is left unchanged on error.
    pub fn evaluate_population(&mut self, inputs: &Inputs) -> Result<()> {
        self.ensure_population()?;
        let fitness = self
            .population
            .par_iter()
            .map(|genotype| {
                genotype
                    .evaluate(inputs)?
                    .first()
                    .copied()
                    .ok_or(GeneticError::NoOutputChannels)
            })
            .collect::<Result<Vec<f64>>>()?;
        self.assign_fitness(fitness)
    }

    /// Score every individual with `fitness_fn(index, genotype)`.
    ///
    /// # Errors
    ///
    /// [`GeneticError::EmptyPopulation`] before initialization,
    /// [`GeneticError::InvalidFitness`] for a non-finite score, or the first
    /// error returned by `fitness_fn`.
    pub fn evaluate_population_with<F>(&mut self, mut fitness_fn: F) -> Result<()>
    where
        F: FnMut(usize, &Genotype) -> Result<f64>,
    {
        self.ensure_population()?;
        let fitness = self
            .population
            .iter()
            .enumerate()
            .map(|(i, genotype)| fitness_fn(i, genotype))
            .collect::<Result<Vec<f64>>>()?;
        self.assign_fitness(fitness)
    }

    /// Assign fitness reported by the caller, index-aligned with the population.
    ///
    /// # Errors
    ///
    /// [`GeneticError::EmptyPopulation`] before initialization,
    /// [`GeneticError::FitnessLengthMismatch`] when the lengths differ,
    /// [`GeneticError::InvalidFitness`] for a NaN or infinite score.
    pub fn set_fitness_scores(&mut self, scores: Vec<f64>) -> Result<()> {
        self.ensure_population()?;
        if scores.len() != self.population.len() {
            return Err(GeneticError::FitnessLengthMismatch {
                population: self.population.len(),
                fitness: scores.len(),
            });
        }
        self.assign_fitness(scores)
    }

    fn assign_fitness(&mut self, fitness: Vec<f64>) -> Result<()> {
        check_fitness(&fitness)?;
        self.fitness = fitness;
        self.phase = Phase::Evaluated;
        Ok(())
    }

    /// Clones of the top `ceil(elitism_percentage * N)` individuals by
    /// descending fitness; ties keep population order.
    ///
    /// # Errors
    ///
    /// [`GeneticError::NotEvaluated`] unless fitness is assigned.
    pub fn elitism(&self) -> Result<Vec<Genotype>> {
        self.ensure_evaluated()?;
        let count = self.config.elite_count();
        Ok(select_elite(&self.fitness, count)
            .into_iter()
            .map(|i| self.population[i].clone())
            .collect())
    }

    fn ensure_evaluated(&self) -> Result<()> {
        match self.phase {
            Phase::Evaluated => Ok(()),
            Phase::Uninitialized => Err(GeneticError::EmptyPopulation),
            Phase::Ready | Phase::NextGeneration => Err(GeneticError::NotEvaluated("evaluated")),
        }
    }

    /// Replace the population with the next generation.
    ///
    /// Elites are carried over first; the rest are children of selected
    /// parent pairs, recombined with probability `crossover_rate` and then
    /// mutated. Fitness is cleared afterwards.
    ///
    /// Returns the statistics of the generation that was just replaced.
    ///
    /// # Errors
    ///
    /// [`GeneticError::NotEvaluated`] unless fitness is assigned, or the first
    /// selection, crossover or mutation error. On error the current
    /// population and fitness are left untouched.
    pub fn create_next_generation(&mut self) -> Result<GenerationStats> {
        self.ensure_evaluated()?;
        let target = self.config.population_size;
        let stats = FitnessStats::from_fitness(&self.fitness);

        let mut next = self.elitism()?;
        debug!(
            generation = self.generation,
            elites = next.len(),
            "carrying over elite"
        );

        while next.len() < target {
            let i = self
                .config
                .selection
                .select_index(self.population.len(), &self.fitness, &mut self.rng)?;
            let j = self
                .config
                .selection
                .select_index(self.population.len(), &self.fitness, &mut self.rng)?;

            let strategy = if self.rng.gen_bool(self.config.crossover_rate) {
                self.config.crossover
            } else {
                Crossover::None
            };
            let (mut child1, mut child2) =
                strategy.crossover(&self.population[i], &self.population[j], &mut self.rng)?;
            self.config.mutation.mutate(&mut child1, &mut self.rng)?;
            self.config.mutation.mutate(&mut child2, &mut self.rng)?;
            next.push(child1);
            next.push(child2);
        }
        next.truncate(target);

        let generation_stats = GenerationStats {
            generation: self.generation,
            best_fitness: stats.best_fitness,
            mean_fitness: stats.mean_fitness,
            fitness_std: stats.fitness_std,
        };
        info!(
            generation = generation_stats.generation,
            best = generation_stats.best_fitness,
            mean = generation_stats.mean_fitness,
            std = generation_stats.fitness_std,
            "generation complete"
        );

        self.population = next;
        self.fitness.clear();
        self.history.push(generation_stats);
        self.generation += 1;
        self.phase = Phase::NextGeneration;
        Ok(generation_stats)
    }

    /// Evolve for `generations` steps, scoring each population by the first
    /// output channel for `inputs`.
    ///
    /// The final population is evaluated before returning, so
    /// [`GeneticAlgorithm::best`] is available afterwards.
    ///
    /// # Errors
    ///
    /// Returns the first evaluation or generation error.
    pub fn run(&mut self, generations: usize, inputs: &Inputs) -> Result<EvolutionStats> {
        self.run_loop(generations, |ga| ga.evaluate_population(inputs))
    }

    /// Evolve for `generations` steps, scoring with `fitness_fn(index, genotype)`.
    ///
    /// # Errors
    ///
    /// Returns the first fitness or generation error.
    pub fn run_with<F>(&mut self, generations: usize, mut fitness_fn: F) -> Result<EvolutionStats>
    where
        F: FnMut(usize, &Genotype) -> Result<f64>,
    {
        self.run_loop(generations, |ga| ga.evaluate_population_with(&mut fitness_fn))
    }

    fn run_loop<E>(&mut self, generations: usize, mut evaluate: E) -> Result<EvolutionStats>
    where
        E: FnMut(&mut Self) -> Result<()>,
    {
        self.ensure_population()?;
        let start_time = Instant::now();

        let pb = if self.config.verbose {
            let pb = ProgressBar::new(generations as u64);
            if let Ok(style) = ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} generations {msg}",
            ) {
                pb.set_style(style.progress_chars("=>-"));
            }
            pb
        } else {
            ProgressBar::hidden()
        };

        let mut gen_stats = Vec::with_capacity(generations);
        let mut best_fitness = f64::NEG_INFINITY;
        let mut best_generation = self.generation;

        for _ in 0..generations {
            evaluate(self)?;
            let stats = self.create_next_generation()?;
            if stats.best_fitness > best_fitness {
                best_fitness = stats.best_fitness;
                best_generation = stats.generation;
            }
            pb.set_message(format!("best={:.4}", stats.best_fitness));
            pb.inc(1);
            gen_stats.push(stats);
        }

        evaluate(self)?;
        let final_best = self.best().map_or(f64::NEG_INFINITY, |(_, fit)| fit);
        if final_best > best_fitness {
            best_fitness = final_best;
            best_generation = self.generation;
        }
        pb.finish_and_clear();

        Ok(EvolutionStats {
            generations: gen_stats,
            best_fitness,
            best_generation,
            elapsed_seconds: start_time.elapsed().as_secs_f64(),
        })
    }

    /// Replace one individual with a fresh random genotype of the same
    /// layout. Its recorded fitness, if any, is reset to zero.
    ///
    /// # Errors
    ///
    /// [`GeneticError::IndexOutOfRange`] for an index outside the population.
    pub fn rebirth(&mut self, index: usize) -> Result<()> {
        let len = self.population.len();
        let individual = self
            .population
            .get_mut(index)
            .ok_or(GeneticError::IndexOutOfRange { index, len })?;
        individual.randomize(&mut self.rng)?;
        if let Some(fit) = self.fitness.get_mut(index) {
            *fit = 0.0;
        }
        warn!(index, generation = self.generation, "individual reborn");
        Ok(())
    }

    /// Fittest individual of the evaluated population; ties go to the lowest
    /// index.
    #[must_use]
    pub fn best(&self) -> Option<(&Genotype, f64)> {
        if self.phase != Phase::Evaluated {
            return None;
        }
        let mut best: Option<(usize, f64)> = None;
        for (i, &fit) in self.fitness.iter().enumerate() {
            if best.is_none_or(|(_, b)| fit > b) {
                best = Some((i, fit));
            }
        }
        best.map(|(i, fit)| (&self.population[i], fit))
    }

    /// Install a restored population. Empty `fitness` leaves it awaiting
    /// evaluation.
    pub(crate) fn replace_population(
        &mut self,
        population: Vec<Genotype>,
        fitness: Vec<f64>,
        generation: usize,
    ) -> Result<()> {
        if population.is_empty() {
            return Err(GeneticError::EmptyPopulation);
        }
        if !fitness.is_empty() && fitness.len() != population.len() {
            return Err(GeneticError::FitnessLengthMismatch {
                population: population.len(),
                fitness: fitness.len(),
            });
        }
        check_fitness(&fitness)?;
        self.phase = match (fitness.is_empty(), generation) {
            (false, _) => Phase::Evaluated,
            (true, 0) => Phase::Ready,
            (true, _) => Phase::NextGeneration,
        };
        self.population = population;
        self.fitness = fitness;
        self.generation = generation;
        self.history.clear();
        Ok(())
    }
}

/// Convergence check: the best fitness moved less than `threshold` across
/// the last `window` generations.
#[derive(Debug, Clone)]
pub struct StallDetector {
    window: usize,
    threshold: f64,
    recent: VecDeque<f64>,
}

impl Default for StallDetector {
    fn default() -> Self {
        Self::new(50, 10.0)
    }
}

impl StallDetector {
    /// Create a detector over `window` generations.
    #[must_use]
    pub fn new(window: usize, threshold: f64) -> Self {
        Self {
            window,
            threshold,
            recent: VecDeque::with_capacity(window + 1),
        }
    }

    /// Record a generation's best fitness; returns whether evolution stalled.
    pub fn observe(&mut self, best_fitness: f64) -> bool {
        self.recent.push_back(best_fitness);
        while self.recent.len() > self.window + 1 {
            self.recent.pop_front();
        }
        self.is_stalled()
    }

    /// Whether a full window has been seen and its spread is below the threshold.
    #[must_use]
    pub fn is_stalled(&self) -> bool {
        if self.recent.len() <= self.window {
            return false;
        }
        let max = self.recent.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min = self.recent.iter().copied().fold(f64::INFINITY, f64::min);
        max - min < self.threshold
    }

    /// Forget every observation.
    pub fn reset(&mut self) {
        self.recent.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ga::chromosome::Chromosome;
    use crate::ga::gene::Bounds;
    use crate::ga::registry::{Args, Registry};
    use std::sync::Arc;

    /// Two chromosomes, each a pass-through rule gene and one float return
    /// gene in `[0, 100)`; the decision is the sum of the two values.
    fn template() -> Genotype {
        let mut builder = Registry::builder();
        let table = builder.rule_table().entry("_", |_: &Args| Ok(1.0)).finish();
        let identity = builder.transform(|x, _: &Args| Ok(x));
        let registry = builder.build();
        let blank = registry.symbol("_").unwrap();

        let mut g = Genotype::new(Arc::clone(&registry));
        for _ in 0..2 {
            let mut c = Chromosome::new(Arc::clone(&registry));
            c.add_rule_gene(blank, table, None).unwrap();
            c.add_return_gene_in(0.0, identity, Bounds::new(0.0, 100.0), None)
                .unwrap();
            g.add_chromosome(c).unwrap();
        }
        g
    }

    fn config(population_size: usize) -> EvolutionConfig {
        EvolutionConfig {
            population_size,
            mutation: Mutation::Gaussian {
                probability: 0.2,
                mean: 0.0,
                stddev: 5.0,
            },
            ..EvolutionConfig::default()
        }
    }

    #[test]
    fn test_evolution_config_default() {
        let config = EvolutionConfig::default();
        assert_eq!(config.population_size, 50);
        assert_eq!(config.elite_count(), 5);
        assert_eq!(config.selection, Selection::Tournament { size: 3 });
        assert_eq!(config.crossover, Crossover::TwoPoint);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_elite_count_rounds_up() {
        let config = EvolutionConfig {
            population_size: 7,
            elitism_percentage: 0.1,
            ..EvolutionConfig::default()
        };
        assert_eq!(config.elite_count(), 1);
        let none = EvolutionConfig {
            elitism_percentage: 0.0,
            ..config
        };
        assert_eq!(none.elite_count(), 0);
    }

    #[test]
    fn test_invalid_config() {
        let bad = [
            EvolutionConfig {
                population_size: 0,
                ..EvolutionConfig::default()
            },
            EvolutionConfig {
                elitism_percentage: 1.5,
                ..EvolutionConfig::default()
            },
            EvolutionConfig {
                crossover_rate: -0.1,
                ..EvolutionConfig::default()
            },
            EvolutionConfig {
                population_size: 2,
                ..EvolutionConfig::default()
            },
        ];
        for config in bad {
            assert!(GeneticAlgorithm::new(config).is_err());
        }
    }

    #[test]
    fn test_config_from_json_uses_defaults() {
        let config = EvolutionConfig::from_json_str(
            r#"{"population_size": 20, "selection": {"kind": "roulette_wheel"}}"#,
        )
        .unwrap();
        assert_eq!(config.population_size, 20);
        assert_eq!(config.selection, Selection::RouletteWheel);
        assert_eq!(config.seed, 42);
        assert!(EvolutionConfig::from_json_str(r#"{"crossover_rate": 2.0}"#).is_err());
        assert!(EvolutionConfig::from_json_str("{").is_err());
    }

    #[test]
    fn test_generation_requires_fitness() {
        let mut ga = GeneticAlgorithm::new(config(10)).unwrap();
        assert_eq!(ga.phase(), Phase::Uninitialized);
        assert!(matches!(
            ga.create_next_generation(),
            Err(GeneticError::EmptyPopulation)
        ));

        ga.initialize_population(&template()).unwrap();
        assert_eq!(ga.phase(), Phase::Ready);
        assert_eq!(ga.population().len(), 10);
        assert!(matches!(
            ga.create_next_generation(),
            Err(GeneticError::NotEvaluated(_))
        ));

        ga.evaluate_population(&Inputs::new()).unwrap();
        assert_eq!(ga.phase(), Phase::Evaluated);
        ga.create_next_generation().unwrap();
        assert_eq!(ga.phase(), Phase::NextGeneration);
        assert!(ga.fitness().is_empty());
        assert!(ga.create_next_generation().is_err());
    }

    #[test]
    fn test_initial_population_is_randomized() {
        let mut ga = GeneticAlgorithm::new(config(10)).unwrap();
        ga.initialize_population(&template()).unwrap();
        ga.evaluate_population(&Inputs::new()).unwrap();
        let distinct = ga
            .fitness()
            .iter()
            .filter(|f| (**f - ga.fitness()[0]).abs() > 1e-9)
            .count();
        assert!(distinct > 0);
        assert!(ga.fitness().iter().all(|f| (0.0..200.0).contains(f)));
    }

    #[test]
    fn test_elites_survive_unchanged() {
        let mut ga = GeneticAlgorithm::new(EvolutionConfig {
            elitism_percentage: 0.2,
            ..config(10)
        })
        .unwrap();
        ga.initialize_population(&template()).unwrap();
        ga.evaluate_population(&Inputs::new()).unwrap();

        let elites = ga.elitism().unwrap();
        assert_eq!(elites.len(), 2);
        let best = ga.best().unwrap().0.clone();
        assert_eq!(elites[0], best);

        ga.create_next_generation().unwrap();
        assert_eq!(&ga.population()[..2], &elites[..]);
    }

    #[test]
    fn test_best_fitness_never_decreases_with_elitism() {
        let mut ga = GeneticAlgorithm::new(config(20)).unwrap();
        ga.initialize_population(&template()).unwrap();

        let mut previous = f64::NEG_INFINITY;
        for _ in 0..15 {
            ga.evaluate_population(&Inputs::new()).unwrap();
            let (_, best) = ga.best().unwrap();
            assert!(best >= previous);
            previous = best;
            ga.create_next_generation().unwrap();
        }
        assert_eq!(ga.generation(), 15);
        assert_eq!(ga.history().len(), 15);
    }

    #[test]
    fn test_set_fitness_scores() {
        let mut ga = GeneticAlgorithm::new(config(4)).unwrap();
        assert!(ga.set_fitness_scores(vec![1.0; 4]).is_err());
        ga.initialize_population(&template()).unwrap();
        assert!(matches!(
            ga.set_fitness_scores(vec![1.0; 3]),
            Err(GeneticError::FitnessLengthMismatch {
                population: 4,
                fitness: 3
            })
        ));
        ga.set_fitness_scores(vec![1.0, 9.0, 9.0, 2.0]).unwrap();
        let (best, fit) = ga.best().unwrap();
        assert!((fit - 9.0).abs() < f64::EPSILON);
        assert_eq!(best, &ga.population()[1]);
    }

    #[test]
    fn test_non_finite_fitness_rejected() {
        let config = EvolutionConfig {
            elitism_percentage: 0.25,
            ..config(4)
        };
        let mut ga = GeneticAlgorithm::new(config).unwrap();
        ga.initialize_population(&template()).unwrap();

        assert!(matches!(
            ga.set_fitness_scores(vec![1.0, f64::NAN, 9.0, 2.0]),
            Err(GeneticError::InvalidFitness { index: 1, .. })
        ));
        assert_eq!(ga.phase(), Phase::Ready);
        assert!(ga.fitness().is_empty());

        assert!(matches!(
            ga.evaluate_population_with(|i, _| Ok(if i == 3 { f64::INFINITY } else { 0.0 })),
            Err(GeneticError::InvalidFitness { index: 3, .. })
        ));
        assert!(ga.elitism().is_err());

        // A transform producing NaN cannot sneak in through evaluation either.
        let mut builder = Registry::builder();
        let table = builder.rule_table().entry("_", |_: &Args| Ok(1.0)).finish();
        let broken = builder.transform(|_, _: &Args| Ok(f64::NAN));
        let registry = builder.build();
        let mut c = Chromosome::new(Arc::clone(&registry));
        c.add_rule_gene(registry.symbol("_").unwrap(), table, None)
            .unwrap();
        c.add_return_gene(1.0, broken, None).unwrap();
        let mut nan_template = Genotype::new(registry);
        nan_template.add_chromosome(c).unwrap();
        ga.initialize_population(&nan_template).unwrap();
        assert!(matches!(
            ga.evaluate_population(&Inputs::new()),
            Err(GeneticError::InvalidFitness { index: 0, .. })
        ));

        ga.initialize_population(&template()).unwrap();
        ga.set_fitness_scores(vec![1.0, 3.0, 9.0, 2.0]).unwrap();
        let elites = ga.elitism().unwrap();
        assert_eq!(elites.len(), 1);
        assert_eq!(elites[0], ga.population()[2]);
        assert!((ga.best().unwrap().1 - 9.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_run_with_external_fitness() {
        let mut ga = GeneticAlgorithm::new(config(16)).unwrap();
        ga.initialize_population(&template()).unwrap();

        // Reward decisions close to 42.
        let stats = ga
            .run_with(20, |_, g| {
                let out = g.evaluate(&Inputs::new())?;
                Ok(-(out[0] - 42.0).abs())
            })
            .unwrap();

        assert_eq!(stats.generations.len(), 20);
        assert_eq!(ga.generation(), 20);
        assert_eq!(ga.phase(), Phase::Evaluated);
        let first = stats.generations[0].best_fitness;
        assert!(stats.best_fitness >= first);
        assert!(stats.elapsed_seconds >= 0.0);
    }

    #[test]
    fn test_run_is_reproducible_for_a_seed() {
        let run = || {
            let mut ga = GeneticAlgorithm::new(config(12)).unwrap();
            ga.initialize_population(&template()).unwrap();
            ga.run(5, &Inputs::new()).unwrap();
            ga.fitness().to_vec()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_missing_output_channel() {
        let mut builder = Registry::builder();
        let table = builder.rule_table().entry("_", |_: &Args| Ok(1.0)).finish();
        let registry = builder.build();
        let mut c = Chromosome::new(Arc::clone(&registry));
        c.add_rule_gene(registry.symbol("_").unwrap(), table, None)
            .unwrap();
        let mut g = Genotype::new(registry);
        g.add_chromosome(c).unwrap();

        let mut ga = GeneticAlgorithm::new(config(4)).unwrap();
        ga.initialize_population(&g).unwrap();
        assert!(matches!(
            ga.evaluate_population(&Inputs::new()),
            Err(GeneticError::NoOutputChannels)
        ));
    }

    #[test]
    fn test_rebirth() {
        let mut ga = GeneticAlgorithm::new(config(4)).unwrap();
        ga.initialize_population(&template()).unwrap();
        ga.set_fitness_scores(vec![5.0; 4]).unwrap();

        let before = ga.population()[2].clone();
        ga.rebirth(2).unwrap();
        assert_ne!(ga.population()[2], before);
        assert_eq!(ga.population()[2].shape(), before.shape());
        assert!(ga.fitness()[2].abs() < f64::EPSILON);
        assert!(matches!(
            ga.rebirth(4),
            Err(GeneticError::IndexOutOfRange { index: 4, len: 4 })
        ));
    }

    #[test]
    fn test_stall_detector() {
        let mut detector = StallDetector::new(3, 1.0);
        assert!(!detector.observe(10.0));
        assert!(!detector.observe(10.2));
        assert!(!detector.observe(10.4));
        // Window full: spread 0.6 < 1.0.
        assert!(detector.observe(10.5));
        // A jump resets the verdict until it leaves the window.
        assert!(!detector.observe(20.0));
        detector.reset();
        assert!(!detector.is_stalled());
    }
}
