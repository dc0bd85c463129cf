//! Crossover operators.
//!
//! Crossover works gene-by-gene inside each chromosome pair: the two children
//! start as clones of the parents and exchange the genes at the chosen
//! positions. Parents must share a layout, so exchanged genes always land in
//! the half (rule or return) they came from.

use crate::error::Result;
use crate::ga::genotype::Genotype;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Gene-level recombination strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Crossover {
    /// Exchange every gene from a random cut to the end.
    OnePoint,
    /// Exchange the genes between two random cuts.
    #[default]
    TwoPoint,
    /// Exchange each gene with probability 0.5.
    Uniform,
    /// Children are clones of the parents.
    None,
}

impl Crossover {
    /// Produce two children from two parents. The parents are not modified.
    ///
    /// # Errors
    ///
    /// Returns [`GeneticError::ShapeMismatch`](crate::error::GeneticError::ShapeMismatch)
    /// if the parents' chromosome layouts differ.
    pub fn crossover<R: Rng>(
        &self,
        parent1: &Genotype,
        parent2: &Genotype,
        rng: &mut R,
    ) -> Result<(Genotype, Genotype)> {
        if *self == Self::None {
            return Ok((parent1.clone(), parent2.clone()));
        }
        parent1.ensure_same_shape(parent2)?;

        let mut child1 = parent1.clone();
        let mut child2 = parent2.clone();
        let pairs = child1
            .chromosomes_mut()
            .iter_mut()
            .zip(child2.chromosomes_mut().iter_mut());

        for (c1, c2) in pairs {
            let len = c1.len();
            match self {
                Self::OnePoint => {
                    if len == 0 {
                        continue;
                    }
                    let cut = rng.gen_range(0..len);
                    for i in cut..len {
                        c1.exchange_gene(c2, i)?;
                    }
                }
                Self::TwoPoint => {
                    // Too short for two cuts; copied unchanged.
                    if len < 2 {
                        continue;
                    }
                    let p1 = rng.gen_range(0..=len - 2);
                    let p2 = rng.gen_range(p1 + 1..len);
                    for i in p1..p2 {
                        c1.exchange_gene(c2, i)?;
                    }
                }
                Self::Uniform => {
                    for i in 0..len {
                        if rng.gen_bool(0.5) {
                            c1.exchange_gene(c2, i)?;
                        }
                    }
                }
                Self::None => {}
            }
        }

        Ok((child1, child2))
    }
}
