//! Selection operators.
//!
//! Selection picks the parents of the next generation from a population and
//! its index-aligned fitness scores. Every strategy returns an independent
//! clone, so the caller may mutate the selected genotype freely.

// Selection uses intentional casts for rank weights and statistics
#![allow(clippy::cast_precision_loss)]

use crate::error::{GeneticError, Result};
use crate::ga::genotype::Genotype;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Parent selection strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Selection {
    /// Fitness-proportional selection. Fitness must be non-negative.
    RouletteWheel,
    /// Best of `size` distinct individuals drawn uniformly.
    Tournament {
        /// Number of contestants.
        size: usize,
    },
    /// Roulette over ranks `1..=N` in ascending fitness order.
    RankBased,
    /// Uniform pick, ignoring fitness.
    Random,
}

impl Default for Selection {
    fn default() -> Self {
        Self::Tournament { size: 3 }
    }
}

impl Selection {
    /// Select one individual and return a clone of it.
    ///
    /// # Errors
    ///
    /// See [`Selection::select_index`].
    pub fn select<R: Rng>(
        &self,
        population: &[Genotype],
        fitness: &[f64],
        rng: &mut R,
    ) -> Result<Genotype> {
        let index = self.select_index(population.len(), fitness, rng)?;
        Ok(population[index].clone())
    }

    /// Select the index of one individual in a population of `population` members.
    ///
    /// # Errors
    ///
    /// [`GeneticError::EmptyPopulation`],
    /// [`GeneticError::FitnessLengthMismatch`] and
    /// [`GeneticError::InvalidFitness`] for non-finite scores in every
    /// strategy; roulette additionally fails on negative fitness and on a
    /// zero total, tournament on a size of zero or larger than the population.
    pub fn select_index<R: Rng>(
        &self,
        population: usize,
        fitness: &[f64],
        rng: &mut R,
    ) -> Result<usize> {
        if population == 0 {
            return Err(GeneticError::EmptyPopulation);
        }
        if fitness.len() != population {
            return Err(GeneticError::FitnessLengthMismatch {
                population,
                fitness: fitness.len(),
            });
        }

        check_fitness(fitness)?;

        match *self {
            Self::RouletteWheel => {
                if let Some((index, &value)) =
                    fitness.iter().enumerate().find(|(_, f)| **f < 0.0)
                {
                    return Err(GeneticError::InvalidFitness { index, value });
                }
                let mut weights = fitness.to_vec();
                let mut total: f64 = weights.iter().sum();
                if total.is_infinite() {
                    // Large finite scores can overflow the sum; spin on
                    // weights relative to the maximum instead.
                    let max = weights.iter().copied().fold(0.0, f64::max);
                    for w in &mut weights {
                        *w /= max;
                    }
                    total = weights.iter().sum();
                }
                if total <= 0.0 {
                    return Err(GeneticError::ZeroTotalFitness);
                }
                let pick = rng.gen_range(0.0..total);
                Ok(spin_wheel(&weights, pick))
            }
            Self::Tournament { size } => {
                if size == 0 || size > population {
                    return Err(GeneticError::InvalidTournamentSize { size, population });
                }
                let contestants = rand::seq::index::sample(rng, population, size).into_vec();
                Ok(tournament_winner(fitness, &contestants))
            }
            Self::RankBased => {
                let mut order: Vec<usize> = (0..population).collect();
                order.sort_by(|&a, &b| fitness[a].total_cmp(&fitness[b]));
                let ranks: Vec<f64> = (1..=population).map(|r| r as f64).collect();
                let total = (population * (population + 1)) as f64 / 2.0;
                let pick = rng.gen_range(0.0..total);
                Ok(order[spin_wheel(&ranks, pick)])
            }
            Self::Random => Ok(rng.gen_range(0..population)),
        }
    }
}

/// Reject NaN and infinite scores, which have no place in a fitness order.
pub(crate) fn check_fitness(fitness: &[f64]) -> Result<()> {
    match fitness.iter().position(|f| !f.is_finite()) {
        Some(index) => Err(GeneticError::InvalidFitness {
            index,
            value: fitness[index],
        }),
        None => Ok(()),
    }
}

/// First index whose cumulative weight is strictly greater than `pick`.
///
/// Falls back to the last positive weight when rounding leaves `pick` at or
/// above the total.
pub(crate) fn spin_wheel(weights: &[f64], pick: f64) -> usize {
    let mut cumulative = 0.0;
    for (i, w) in weights.iter().enumerate() {
        cumulative += w;
        if cumulative > pick {
            return i;
        }
    }
    weights
        .iter()
        .rposition(|w| *w > 0.0)
        .unwrap_or(weights.len().saturating_sub(1))
}

/// Highest-fitness contestant; ties go to the first one drawn.
pub(crate) fn tournament_winner(fitness: &[f64], contestants: &[usize]) -> usize {
    let mut winner = contestants[0];
    for &idx in &contestants[1..] {
        if fitness[idx] > fitness[winner] {
            winner = idx;
        }
    }
    winner
}

/// Indices of the top `count` individuals by descending fitness; ties keep
/// population order.
pub(crate) fn select_elite(fitness: &[f64], count: usize) -> Vec<usize> {
    let mut indexed: Vec<(usize, f64)> = fitness.iter().copied().enumerate().collect();
    indexed.sort_by(|a, b| b.1.total_cmp(&a.1));
    indexed.into_iter().take(count).map(|(i, _)| i).collect()
}

/// Summary statistics over a population's fitness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FitnessStats {
    /// Mean fitness of the population.
    pub mean_fitness: f64,
    /// Best fitness in the population.
    pub best_fitness: f64,
    /// Worst fitness in the population.
    pub worst_fitness: f64,
    /// Population standard deviation of fitness.
    pub fitness_std: f64,
}

impl FitnessStats {
    /// Summarize index-aligned fitness scores; all zero for an empty slice.
    ///
    /// Best and worst use the same total order as elite selection.
    #[must_use]
    pub fn from_fitness(fitness: &[f64]) -> Self {
        let Some(&first) = fitness.first() else {
            return Self::default();
        };
        let n = fitness.len() as f64;
        let mut best = first;
        let mut worst = first;
        let mut sum = 0.0;
        for &f in fitness {
            if f.total_cmp(&best).is_gt() {
                best = f;
            }
            if f.total_cmp(&worst).is_lt() {
                worst = f;
            }
            sum += f;
        }
        let mean = sum / n;
        let variance = fitness.iter().map(|f| (f - mean) * (f - mean)).sum::<f64>() / n;

        Self {
            mean_fitness: mean,
            best_fitness: best,
            worst_fitness: worst,
            fitness_std: variance.sqrt(),
        }
    }
}
