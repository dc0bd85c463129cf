//! Genotypes: the complete controller of one individual.
//!
//! A genotype is an ordered set of chromosomes that all produce the same
//! number of output channels. Its decision is the element-wise sum of every
//! chromosome's weighted output, so chromosomes whose rules fire strongly
//! dominate the result.

use crate::error::{GeneticError, Result};
use crate::ga::chromosome::Chromosome;
use crate::ga::registry::{Inputs, Registry};
use rand::Rng;
use std::fmt;
use std::sync::Arc;

/// Ordered chromosomes with a fixed return-gene count.
#[derive(Debug, Clone)]
pub struct Genotype {
    registry: Arc<Registry>,
    chromosomes: Vec<Chromosome>,
    return_length: Option<usize>,
}

impl PartialEq for Genotype {
    fn eq(&self, other: &Self) -> bool {
        self.chromosomes == other.chromosomes
    }
}

impl Genotype {
    /// Create an empty genotype over a registry.
    #[must_use]
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            chromosomes: Vec::new(),
            return_length: None,
        }
    }

    /// The registry every chromosome resolves capabilities in.
    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Append a chromosome. The first chromosome fixes the return-gene count.
    ///
    /// # Errors
    ///
    /// [`GeneticError::RegistryMismatch`] if the chromosome was built on a
    /// different registry, [`GeneticError::ReturnLengthMismatch`] if its
    /// return-gene count differs from the genotype's.
    pub fn add_chromosome(&mut self, chromosome: Chromosome) -> Result<()> {
        if !Arc::ptr_eq(&self.registry, chromosome.registry()) {
            return Err(GeneticError::RegistryMismatch);
        }
        let actual = chromosome.returns().len();
        match self.return_length {
            Some(expected) if expected != actual => {
                return Err(GeneticError::ReturnLengthMismatch { expected, actual });
            }
            Some(_) => {}
            None => self.return_length = Some(actual),
        }
        self.chromosomes.push(chromosome);
        Ok(())
    }

    /// Chromosomes in order.
    #[must_use]
    pub fn chromosomes(&self) -> &[Chromosome] {
        &self.chromosomes
    }

    pub(crate) fn chromosomes_mut(&mut self) -> &mut [Chromosome] {
        &mut self.chromosomes
    }

    /// Number of chromosomes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.chromosomes.len()
    }

    /// Whether the genotype has no chromosomes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chromosomes.is_empty()
    }

    /// Return-gene count shared by every chromosome, once one is added.
    #[must_use]
    pub fn chromosome_return_length(&self) -> Option<usize> {
        self.return_length
    }

    /// `(rule genes, return genes)` per chromosome.
    #[must_use]
    pub fn shape(&self) -> Vec<(usize, usize)> {
        self.chromosomes
            .iter()
            .map(|c| (c.rules().len(), c.returns().len()))
            .collect()
    }

    /// Fail unless `other` has the same chromosome layout.
    pub(crate) fn ensure_same_shape(&self, other: &Self) -> Result<()> {
        let (a, b) = (self.shape(), other.shape());
        if a == b {
            Ok(())
        } else {
            Err(GeneticError::ShapeMismatch(format!(
                "genotype layouts {a:?} and {b:?} differ"
            )))
        }
    }

    /// Evaluate to the element-wise sum of chromosome outputs.
    ///
    /// # Errors
    ///
    /// [`GeneticError::EmptyGenotype`] without chromosomes; otherwise the
    /// first gene evaluation error.
    pub fn evaluate(&self, inputs: &Inputs) -> Result<Vec<f64>> {
        let mut chromosomes = self.chromosomes.iter();
        let first = chromosomes.next().ok_or(GeneticError::EmptyGenotype)?;
        let mut totals = first.evaluate(inputs)?;
        for chromosome in chromosomes {
            for (total, value) in totals.iter_mut().zip(chromosome.evaluate(inputs)?) {
                *total += value;
            }
        }
        Ok(totals)
    }

    /// Randomize every gene within its variant.
    ///
    /// # Errors
    ///
    /// Returns an error if a rule gene's table handle is unknown.
    pub fn randomize<R: Rng>(&mut self, rng: &mut R) -> Result<()> {
        for chromosome in &mut self.chromosomes {
            let registry = Arc::clone(chromosome.registry());
            for rule in chromosome.rules_mut() {
                rule.randomize(&registry, rng)?;
            }
            for ret in chromosome.returns_mut() {
                ret.randomize(rng);
            }
        }
        Ok(())
    }
}

impl fmt::Display for Genotype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, chromosome) in self.chromosomes.iter().enumerate() {
            if idx > 0 {
                f.write_str(", \n")?;
            }
            write!(f, "{idx}: {chromosome}")?;
        }
        Ok(())
    }
}
