//! Error types for the evolution engine.

use crate::ga::GeneName;
use thiserror::Error;

/// Boxed error returned by externally supplied scoring and transform capabilities.
pub type CapabilityError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised by genes, chromosomes, genotypes, operators and the driver.
#[derive(Debug, Error)]
pub enum GeneticError {
    // === Configuration errors ===
    /// A chromosome's return-gene count differs from the genotype's.
    #[error("chromosome has {actual} return genes, genotype expects {expected}")]
    ReturnLengthMismatch {
        /// Return-gene count fixed by the first chromosome.
        expected: usize,
        /// Return-gene count of the rejected chromosome.
        actual: usize,
    },
    /// Two genotypes that must share a layout do not.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),
    /// A chromosome was built against a different capability registry.
    #[error("chromosome uses a different capability registry than the genotype")]
    RegistryMismatch,
    /// A rule gene was written into the return half or vice versa.
    #[error("gene kind mismatch at index {index}: expected {expected} gene")]
    GeneKindMismatch {
        /// Position in the concatenated gene sequence.
        index: usize,
        /// Kind of gene the position holds.
        expected: &'static str,
    },
    /// Position outside a gene sequence or population.
    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange {
        /// Requested position.
        index: usize,
        /// Length of the indexed sequence.
        len: usize,
    },
    /// A rule gene's value is not a key of its rule table.
    #[error("rule gene '{gene}': value '{symbol}' not found in mapping")]
    UnknownSymbol {
        /// Name of the offending gene.
        gene: GeneName,
        /// The symbol that has no scorer.
        symbol: String,
    },
    /// A table or transform handle does not exist in the registry.
    #[error("unknown {kind} handle {id}")]
    UnknownCapability {
        /// "rule table" or "transform".
        kind: &'static str,
        /// Raw handle value.
        id: usize,
    },
    /// Probability outside `[0, 1]`.
    #[error("invalid probability {0}: must be within [0, 1]")]
    InvalidProbability(f64),
    /// Gaussian noise parameters rejected by the distribution.
    #[error("invalid distribution parameters: {0}")]
    InvalidDistribution(String),
    /// Tournament size is zero or larger than the population.
    #[error("invalid tournament size {size} for population of {population}")]
    InvalidTournamentSize {
        /// Requested tournament size.
        size: usize,
        /// Population size.
        population: usize,
    },
    /// Evolution configuration out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // === Evaluation errors ===
    /// A scoring or transform capability failed.
    #[error("error evaluating gene '{gene}': {source}")]
    Evaluation {
        /// Name of the gene whose capability failed.
        gene: GeneName,
        /// Error raised by the capability.
        #[source]
        source: CapabilityError,
    },

    // === Degenerate input errors ===
    /// Genotype evaluated with no chromosomes.
    #[error("no chromosomes to evaluate")]
    EmptyGenotype,
    /// Operation on an empty population.
    #[error("population is empty")]
    EmptyPopulation,
    /// Roulette selection over fitness that sums to zero.
    #[error("total fitness is zero")]
    ZeroTotalFitness,
    /// Fitness value unusable for proportional selection.
    #[error("invalid fitness {value} at index {index}")]
    InvalidFitness {
        /// Position in the population.
        index: usize,
        /// The offending fitness value.
        value: f64,
    },
    /// Fitness list and population are not index-aligned.
    #[error("{fitness} fitness scores for a population of {population}")]
    FitnessLengthMismatch {
        /// Population size.
        population: usize,
        /// Number of fitness scores.
        fitness: usize,
    },
    /// Genotype has no return genes, so there is no output channel to score.
    #[error("genotype produces no output channels")]
    NoOutputChannels,
    /// Generation step requested before fitness was assigned.
    #[error("population has not been {0}")]
    NotEvaluated(&'static str),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, GeneticError>;
