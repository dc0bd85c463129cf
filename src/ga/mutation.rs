//! Mutation operators.
//!
//! Mutations introduce random variation into a genotype. Each concrete
//! strategy draws an independent coin per gene (per chromosome half for
//! swaps) and only touches the gene kinds it targets. Chromosomes are
//! perturbed on a clone that is written back, so a failing capability lookup
//! never leaves a half-mutated chromosome behind.

use crate::error::{GeneticError, Result};
use crate::ga::chromosome::Chromosome;
use crate::ga::gene::Number;
use crate::ga::genotype::Genotype;
use crate::ga::registry::Registry;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Which halves of a chromosome a mutation may touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneKinds {
    /// Rule genes are eligible.
    pub rules: bool,
    /// Return genes are eligible.
    pub returns: bool,
}

impl GeneKinds {
    /// Rule and return genes.
    pub const ALL: Self = Self {
        rules: true,
        returns: true,
    };
    /// Rule genes only.
    pub const RULES: Self = Self {
        rules: true,
        returns: false,
    };
    /// Return genes only.
    pub const RETURNS: Self = Self {
        rules: false,
        returns: true,
    };
}

impl Default for GeneKinds {
    fn default() -> Self {
        Self::ALL
    }
}

/// Per-gene probability and target kinds shared by the point mutations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MutationRate {
    /// Chance of mutating each eligible gene, in `[0, 1]`.
    pub probability: f64,
    /// Gene kinds the mutation applies to.
    #[serde(default)]
    pub targets: GeneKinds,
}

impl MutationRate {
    /// Rate applying to every gene kind.
    #[must_use]
    pub fn new(probability: f64) -> Self {
        Self::only(probability, GeneKinds::ALL)
    }

    /// Rate restricted to some gene kinds.
    #[must_use]
    pub fn only(probability: f64, targets: GeneKinds) -> Self {
        Self {
            probability,
            targets,
        }
    }
}

fn unit_stddev() -> f64 {
    1.0
}

/// Mutation strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Mutation {
    /// Flip two-symbol rule genes to the other symbol and integer return
    /// genes between 0 and 1.
    BitFlip(MutationRate),
    /// Replace the value with a fresh draw from the gene's variant.
    RandomReset(MutationRate),
    /// Swap two distinct genes within a chromosome half.
    Swap(MutationRate),
    /// Add normal noise to float return genes.
    Gaussian {
        /// Chance of perturbing each float return gene.
        probability: f64,
        /// Noise mean.
        #[serde(default)]
        mean: f64,
        /// Noise standard deviation.
        #[serde(default = "unit_stddev")]
        stddev: f64,
    },
    /// Apply each strategy in order.
    Composite {
        /// Strategies to apply.
        strategies: Vec<Mutation>,
    },
}

impl Default for Mutation {
    fn default() -> Self {
        Self::Composite {
            strategies: vec![
                Self::RandomReset(MutationRate::only(0.1, GeneKinds::RULES)),
                Self::Gaussian {
                    probability: 0.05,
                    mean: 0.0,
                    stddev: 20.0,
                },
            ],
        }
    }
}

fn check_probability(probability: f64) -> Result<()> {
    if (0.0..=1.0).contains(&probability) {
        Ok(())
    } else {
        Err(GeneticError::InvalidProbability(probability))
    }
}

fn normal(mean: f64, stddev: f64) -> Result<Normal<f64>> {
    if !mean.is_finite() {
        return Err(GeneticError::InvalidDistribution(format!(
            "mean {mean} is not finite"
        )));
    }
    // rand_distr 0.4 accepts a negative stddev and mirrors the distribution.
    if !(stddev.is_finite() && stddev >= 0.0) {
        return Err(GeneticError::InvalidDistribution(format!(
            "stddev {stddev} must be finite and non-negative"
        )));
    }
    Normal::new(mean, stddev)
        .map_err(|e| GeneticError::InvalidDistribution(format!("stddev {stddev}: {e}")))
}

impl Mutation {
    /// Check every probability and distribution parameter, recursing into
    /// composites.
    ///
    /// # Errors
    ///
    /// [`GeneticError::InvalidProbability`] or
    /// [`GeneticError::InvalidDistribution`].
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::BitFlip(rate) | Self::RandomReset(rate) | Self::Swap(rate) => {
                check_probability(rate.probability)
            }
            Self::Gaussian {
                probability,
                mean,
                stddev,
            } => {
                check_probability(*probability)?;
                normal(*mean, *stddev).map(|_| ())
            }
            Self::Composite { strategies } => strategies.iter().try_for_each(Self::validate),
        }
    }

    /// Mutate a genotype in place.
    ///
    /// # Errors
    ///
    /// Invalid parameters are reported before any gene changes. Otherwise
    /// fails only if a rule gene refers to an unknown table.
    pub fn mutate<R: Rng>(&self, genotype: &mut Genotype, rng: &mut R) -> Result<()> {
        self.validate()?;
        self.apply(genotype, rng)
    }

    fn apply<R: Rng>(&self, genotype: &mut Genotype, rng: &mut R) -> Result<()> {
        match self {
            Self::BitFlip(rate) => {
                for_each_chromosome(genotype, |c, reg| bit_flip(*rate, c, reg, rng))
            }
            Self::RandomReset(rate) => {
                for_each_chromosome(genotype, |c, reg| random_reset(*rate, c, reg, rng))
            }
            Self::Swap(rate) => for_each_chromosome(genotype, |c, _| {
                swap(*rate, c, rng);
                Ok(())
            }),
            Self::Gaussian {
                probability,
                mean,
                stddev,
            } => {
                let noise = normal(*mean, *stddev)?;
                for_each_chromosome(genotype, |c, _| {
                    gaussian(*probability, &noise, c, rng);
                    Ok(())
                })
            }
            Self::Composite { strategies } => {
                for strategy in strategies {
                    strategy.apply(genotype, rng)?;
                }
                Ok(())
            }
        }
    }
}

/// Run `f` on a clone of each chromosome and write the clone back.
fn for_each_chromosome<F>(genotype: &mut Genotype, mut f: F) -> Result<()>
where
    F: FnMut(&mut Chromosome, &Registry) -> Result<()>,
{
    let registry = Arc::clone(genotype.registry());
    for slot in genotype.chromosomes_mut() {
        let mut offspring = slot.clone();
        f(&mut offspring, &registry)?;
        *slot = offspring;
    }
    Ok(())
}

fn bit_flip<R: Rng>(
    rate: MutationRate,
    chromosome: &mut Chromosome,
    registry: &Registry,
    rng: &mut R,
) -> Result<()> {
    if rate.targets.rules {
        for gene in chromosome.rules_mut() {
            let variant = registry.table(gene.table)?.variant();
            if variant.len() != 2 {
                continue;
            }
            // Values outside the variant have no counterpart to flip to.
            let Some(pos) = variant.iter().position(|s| *s == gene.value) else {
                continue;
            };
            if rng.gen_bool(rate.probability) {
                gene.value = variant[1 - pos];
            }
        }
    }
    if rate.targets.returns {
        for gene in chromosome.returns_mut() {
            let Number::Int(value) = gene.value else {
                continue;
            };
            if rng.gen_bool(rate.probability) {
                gene.value = Number::Int(i64::from(value == 0));
            }
        }
    }
    Ok(())
}

fn random_reset<R: Rng>(
    rate: MutationRate,
    chromosome: &mut Chromosome,
    registry: &Registry,
    rng: &mut R,
) -> Result<()> {
    if rate.targets.rules {
        for gene in chromosome.rules_mut() {
            if rng.gen_bool(rate.probability) {
                gene.randomize(registry, rng)?;
            }
        }
    }
    if rate.targets.returns {
        for gene in chromosome.returns_mut() {
            if rng.gen_bool(rate.probability) {
                gene.value = gene.variant.sample_like(gene.value, rng);
            }
        }
    }
    Ok(())
}

fn swap<R: Rng>(rate: MutationRate, chromosome: &mut Chromosome, rng: &mut R) {
    if rate.targets.rules {
        let rules = chromosome.rules_mut();
        if rng.gen_bool(rate.probability) && rules.len() >= 2 {
            let pair = rand::seq::index::sample(rng, rules.len(), 2);
            rules.swap(pair.index(0), pair.index(1));
        }
    }
    if rate.targets.returns {
        let returns = chromosome.returns_mut();
        if rng.gen_bool(rate.probability) && returns.len() >= 2 {
            let pair = rand::seq::index::sample(rng, returns.len(), 2);
            returns.swap(pair.index(0), pair.index(1));
        }
    }
}

fn gaussian<R: Rng>(
    probability: f64,
    noise: &Normal<f64>,
    chromosome: &mut Chromosome,
    rng: &mut R,
) {
    for gene in chromosome.returns_mut() {
        let Number::Float(value) = gene.value else {
            continue;
        };
        if rng.gen_bool(probability) {
            gene.value = Number::Float(value + noise.sample(rng));
        }
    }
}
