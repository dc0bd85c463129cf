//! Gene representation.
//!
//! A gene is the smallest evolvable unit: a name plus one allele. Rule genes
//! carry a discrete [`Symbol`] that selects a scorer from their rule table;
//! return genes carry a [`Number`] that their transform maps to an output
//! channel value.

// Random reset draws integers from float bounds
#![allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]

use crate::error::{GeneticError, Result};
use crate::ga::registry::{Args, Registry, Symbol, TableId, TransformId};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Gene name used as the key into [`Inputs`](crate::ga::Inputs).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GeneName {
    /// Positional name assigned when none is given.
    Index(usize),
    /// Explicit label such as `"front"` or `"turn"`.
    Label(Arc<str>),
}

impl From<usize> for GeneName {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl From<&str> for GeneName {
    fn from(label: &str) -> Self {
        Self::Label(Arc::from(label))
    }
}

impl From<String> for GeneName {
    fn from(label: String) -> Self {
        Self::Label(Arc::from(label))
    }
}

impl fmt::Display for GeneName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(i) => write!(f, "{i}"),
            Self::Label(label) => write!(f, "{label}"),
        }
    }
}

/// Numeric allele of a return gene.
///
/// Integer values take part in bit-flip mutation, float values in Gaussian
/// mutation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Number {
    /// Integer allele.
    Int(i64),
    /// Floating-point allele.
    Float(f64),
}

impl Number {
    /// Value as `f64` for transforms.
    #[must_use]
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Int(i) => i as f64,
            Self::Float(x) => x,
        }
    }

    /// Whether this is a float allele.
    #[must_use]
    pub fn is_float(self) -> bool {
        matches!(self, Self::Float(_))
    }
}

impl From<i64> for Number {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Number {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for Number {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{i}"),
            // Debug keeps the decimal point so rows read back as floats.
            Self::Float(x) => write!(f, "{x:?}"),
        }
    }
}

/// Numeric range a return gene is initialized and reset within.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    /// Inclusive lower bound.
    pub low: f64,
    /// Exclusive upper bound.
    pub high: f64,
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            low: 0.0,
            high: 100.0,
        }
    }
}

impl Bounds {
    /// Create bounds.
    #[must_use]
    pub fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    /// Uniform float in `[low, high)`; `low` for an empty range.
    pub fn sample_float<R: Rng>(&self, rng: &mut R) -> f64 {
        if self.low < self.high {
            rng.gen_range(self.low..self.high)
        } else {
            self.low
        }
    }

    /// Fresh value of the same kind as `like`.
    pub fn sample_like<R: Rng>(&self, like: Number, rng: &mut R) -> Number {
        match like {
            Number::Float(_) => Number::Float(self.sample_float(rng)),
            Number::Int(_) => {
                let low = self.low.ceil() as i64;
                let high = self.high.ceil() as i64;
                if low < high {
                    Number::Int(rng.gen_range(low..high))
                } else {
                    Number::Int(low)
                }
            }
        }
    }
}

/// Gene whose symbol selects a scorer that gates its chromosome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleGene {
    /// Key into the evaluation inputs.
    pub name: GeneName,
    /// Current allele.
    pub value: Symbol,
    /// Rule table the allele is looked up in.
    pub table: TableId,
}

impl RuleGene {
    /// Score this gene.
    ///
    /// # Errors
    ///
    /// [`GeneticError::UnknownSymbol`] when the value has no scorer in the
    /// table, [`GeneticError::Evaluation`] when the scorer fails.
    pub fn evaluate(&self, registry: &Registry, args: &Args) -> Result<f64> {
        let table = registry.table(self.table)?;
        let scorer = table
            .scorer(self.value)
            .ok_or_else(|| GeneticError::UnknownSymbol {
                gene: self.name.clone(),
                symbol: registry
                    .symbol_name(self.value)
                    .unwrap_or("<foreign symbol>")
                    .to_owned(),
            })?;
        scorer.score(args).map_err(|source| GeneticError::Evaluation {
            gene: self.name.clone(),
            source,
        })
    }

    /// Reset the value to a uniform choice from the table's variant.
    ///
    /// # Errors
    ///
    /// Returns an error if the table handle is unknown.
    pub fn randomize<R: Rng>(&mut self, registry: &Registry, rng: &mut R) -> Result<()> {
        let table = registry.table(self.table)?;
        if let Some(symbol) = table.variant().choose(rng) {
            self.value = *symbol;
        }
        Ok(())
    }
}

/// Gene producing one output channel's raw value.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnGene {
    /// Key into the evaluation inputs.
    pub name: GeneName,
    /// Current allele.
    pub value: Number,
    /// Transform applied to the allele.
    pub transform: TransformId,
    /// Range used by initialization and mutation; not enforced on `value`.
    pub variant: Bounds,
}

impl ReturnGene {
    /// Apply the transform to this gene's value.
    ///
    /// # Errors
    ///
    /// [`GeneticError::Evaluation`] when the transform fails.
    pub fn evaluate(&self, registry: &Registry, args: &Args) -> Result<f64> {
        let transform = registry.transform(self.transform)?;
        transform
            .apply(self.value.as_f64(), args)
            .map_err(|source| GeneticError::Evaluation {
                gene: self.name.clone(),
                source,
            })
    }

    /// Reset the value to a uniform float within the variant bounds.
    pub fn randomize<R: Rng>(&mut self, rng: &mut R) {
        self.value = Number::Float(self.variant.sample_float(rng));
    }
}

/// Which half of a chromosome a gene belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeneKind {
    /// Rule gene.
    Rule,
    /// Return gene.
    Return,
}

impl GeneKind {
    pub(crate) fn label(self) -> &'static str {
        match self {
            Self::Rule => "rule",
            Self::Return => "return",
        }
    }
}

/// Either kind of gene, for position-addressed access across a chromosome.
#[derive(Debug, Clone, PartialEq)]
pub enum Gene {
    /// A rule gene.
    Rule(RuleGene),
    /// A return gene.
    Return(ReturnGene),
}

impl Gene {
    /// The gene's name.
    #[must_use]
    pub fn name(&self) -> &GeneName {
        match self {
            Self::Rule(g) => &g.name,
            Self::Return(g) => &g.name,
        }
    }

    /// The gene's kind.
    #[must_use]
    pub fn kind(&self) -> GeneKind {
        match self {
            Self::Rule(_) => GeneKind::Rule,
            Self::Return(_) => GeneKind::Return,
        }
    }

    /// Evaluate whichever gene this is.
    ///
    /// # Errors
    ///
    /// Propagates the underlying gene's evaluation error.
    pub fn evaluate(&self, registry: &Registry, args: &Args) -> Result<f64> {
        match self {
            Self::Rule(g) => g.evaluate(registry, args),
            Self::Return(g) => g.evaluate(registry, args),
        }
    }
}
