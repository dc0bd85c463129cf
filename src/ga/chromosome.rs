//! Chromosomes: ordered rule genes followed by ordered return genes.
//!
//! The concatenation `rules ++ returns` is the addressable gene sequence used
//! by position-based operators. Evaluation multiplies every rule score into a
//! single gating weight and scales each return gene's output by it, so a
//! chromosome contributes in proportion to how well its rule conditions match
//! the current input.

use crate::error::{GeneticError, Result};
use crate::ga::gene::{Bounds, Gene, GeneKind, GeneName, Number, ReturnGene, RuleGene};
use crate::ga::registry::{Inputs, Registry, Symbol, TableId, TransformId};
use std::fmt;
use std::sync::Arc;

/// Ordered rule genes and return genes sharing one capability registry.
#[derive(Debug, Clone)]
pub struct Chromosome {
    registry: Arc<Registry>,
    rules: Vec<RuleGene>,
    returns: Vec<ReturnGene>,
}

impl PartialEq for Chromosome {
    fn eq(&self, other: &Self) -> bool {
        self.rules == other.rules && self.returns == other.returns
    }
}

impl Chromosome {
    /// Create an empty chromosome over a registry.
    #[must_use]
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            rules: Vec::new(),
            returns: Vec::new(),
        }
    }

    /// The registry genes resolve their capabilities in.
    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Append a rule gene. Without a name it is numbered by its position
    /// among the rule genes.
    ///
    /// The value is not checked against the table; an unmapped value fails
    /// at evaluation time.
    ///
    /// # Errors
    ///
    /// Returns [`GeneticError::UnknownCapability`] if the table does not exist.
    pub fn add_rule_gene(
        &mut self,
        value: Symbol,
        table: TableId,
        name: Option<GeneName>,
    ) -> Result<()> {
        self.registry.table(table)?;
        let name = name.unwrap_or(GeneName::Index(self.rules.len()));
        self.rules.push(RuleGene { name, value, table });
        Ok(())
    }

    /// Append a return gene with the default `[0, 100)` variant. Without a
    /// name it is numbered by its position in the full gene sequence.
    ///
    /// # Errors
    ///
    /// Returns [`GeneticError::UnknownCapability`] if the transform does not exist.
    pub fn add_return_gene(
        &mut self,
        value: impl Into<Number>,
        transform: TransformId,
        name: Option<GeneName>,
    ) -> Result<()> {
        self.add_return_gene_in(value, transform, Bounds::default(), name)
    }

    /// Append a return gene with explicit variant bounds.
    ///
    /// # Errors
    ///
    /// Returns [`GeneticError::UnknownCapability`] if the transform does not exist.
    pub fn add_return_gene_in(
        &mut self,
        value: impl Into<Number>,
        transform: TransformId,
        variant: Bounds,
        name: Option<GeneName>,
    ) -> Result<()> {
        self.registry.transform(transform)?;
        let name = name.unwrap_or(GeneName::Index(self.len()));
        self.returns.push(ReturnGene {
            name,
            value: value.into(),
            transform,
            variant,
        });
        Ok(())
    }

    /// Rule genes in order.
    #[must_use]
    pub fn rules(&self) -> &[RuleGene] {
        &self.rules
    }

    /// Return genes in order.
    #[must_use]
    pub fn returns(&self) -> &[ReturnGene] {
        &self.returns
    }

    /// Mutable rule genes; the count cannot change.
    pub fn rules_mut(&mut self) -> &mut [RuleGene] {
        &mut self.rules
    }

    /// Mutable return genes; the count cannot change.
    pub fn returns_mut(&mut self) -> &mut [ReturnGene] {
        &mut self.returns
    }

    /// Total number of genes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len() + self.returns.len()
    }

    /// Whether the chromosome has no genes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Kind of gene stored at a position, if in range.
    #[must_use]
    pub fn kind_at(&self, index: usize) -> Option<GeneKind> {
        if index < self.rules.len() {
            Some(GeneKind::Rule)
        } else if index < self.len() {
            Some(GeneKind::Return)
        } else {
            None
        }
    }

    /// Copy of the gene at a position in the concatenated sequence.
    ///
    /// # Errors
    ///
    /// Returns [`GeneticError::IndexOutOfRange`] outside `[0, len)`.
    pub fn gene_at(&self, index: usize) -> Result<Gene> {
        let num_rules = self.rules.len();
        if index < num_rules {
            Ok(Gene::Rule(self.rules[index].clone()))
        } else if let Some(gene) = self.returns.get(index - num_rules) {
            Ok(Gene::Return(gene.clone()))
        } else {
            Err(GeneticError::IndexOutOfRange {
                index,
                len: self.len(),
            })
        }
    }

    /// Overwrite the gene at a position in the concatenated sequence.
    ///
    /// # Errors
    ///
    /// [`GeneticError::IndexOutOfRange`] outside `[0, len)`, and
    /// [`GeneticError::GeneKindMismatch`] when the gene kind does not match
    /// the half the position falls in.
    pub fn set_gene_at_index(&mut self, index: usize, gene: Gene) -> Result<()> {
        let Some(kind) = self.kind_at(index) else {
            return Err(GeneticError::IndexOutOfRange {
                index,
                len: self.len(),
            });
        };
        let num_rules = self.rules.len();
        match (kind, gene) {
            (GeneKind::Rule, Gene::Rule(g)) => self.rules[index] = g,
            (GeneKind::Return, Gene::Return(g)) => self.returns[index - num_rules] = g,
            (expected, _) => {
                return Err(GeneticError::GeneKindMismatch {
                    index,
                    expected: expected.label(),
                });
            }
        }
        Ok(())
    }

    /// Exchange the gene at `index` with the same position in `other`.
    pub(crate) fn exchange_gene(&mut self, other: &mut Self, index: usize) -> Result<()> {
        if self.rules.len() != other.rules.len() || self.returns.len() != other.returns.len() {
            return Err(GeneticError::ShapeMismatch(format!(
                "chromosome layouts {}+{} and {}+{} differ",
                self.rules.len(),
                self.returns.len(),
                other.rules.len(),
                other.returns.len()
            )));
        }
        let num_rules = self.rules.len();
        if index < num_rules {
            std::mem::swap(&mut self.rules[index], &mut other.rules[index]);
        } else if index < self.len() {
            std::mem::swap(
                &mut self.returns[index - num_rules],
                &mut other.returns[index - num_rules],
            );
        } else {
            return Err(GeneticError::IndexOutOfRange {
                index,
                len: self.len(),
            });
        }
        Ok(())
    }

    /// Evaluate to one weighted value per return gene.
    ///
    /// # Errors
    ///
    /// Propagates the first gene evaluation error.
    pub fn evaluate(&self, inputs: &Inputs) -> Result<Vec<f64>> {
        let mut weight = 1.0;
        for rule in &self.rules {
            weight *= rule.evaluate(&self.registry, inputs.args_for(&rule.name))?;
        }
        self.returns
            .iter()
            .map(|ret| Ok(weight * ret.evaluate(&self.registry, inputs.args_for(&ret.name))?))
            .collect()
    }
}

impl fmt::Display for Chromosome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{ ")?;
        let mut first = true;
        for rule in &self.rules {
            if !first {
                write!(f, ", ")?;
            }
            first = false;
            let symbol = self.registry.symbol_name(rule.value).unwrap_or("?");
            write!(f, "{}: {symbol}", rule.name)?;
        }
        for ret in &self.returns {
            if !first {
                write!(f, ", ")?;
            }
            first = false;
            write!(f, "{}: {}", ret.name, ret.value)?;
        }
        write!(f, " }}")
    }
}
