//! Genetic encoding and evolution of rule-based controllers.
//!
//! A controller is a [`Genotype`]: chromosomes of rule genes, whose symbols
//! pick a scoring capability such as a fuzzy membership lookup, and return
//! genes, whose values feed an output transform. Each chromosome multiplies
//! its rule scores into a weight that scales its return values, and the
//! genotype sums the weighted outputs into one decision per output channel.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │      GeneticAlgorithm driver        │
//! ├─────────────────────────────────────┤
//! │  Selection │ Crossover │ Mutation   │
//! ├─────────────────────────────────────┤
//! │  Genotype → Chromosome → Gene       │
//! ├─────────────────────────────────────┤
//! │  Registry (symbols, scorers, maps)  │
//! └─────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use evobot::ga::{Args, Chromosome, Genotype, Inputs, Registry};
//! use std::sync::Arc;
//!
//! let mut builder = Registry::builder();
//! let distance = builder
//!     .rule_table()
//!     .entry("_", |_: &Args| Ok(1.0))
//!     .entry("near", |a: &Args| Ok(1.0 - a.get("x")? / 100.0))
//!     .finish();
//! let turn = builder.transform(|x, _: &Args| Ok(x % 181.0 - 90.0));
//! let registry = builder.build();
//!
//! let mut chromosome = Chromosome::new(Arc::clone(&registry));
//! chromosome.add_rule_gene(registry.symbol("near").unwrap(), distance, Some("front".into()))?;
//! chromosome.add_return_gene(180.0, turn, Some("turn".into()))?;
//!
//! let mut genotype = Genotype::new(registry);
//! genotype.add_chromosome(chromosome)?;
//!
//! let inputs = Inputs::new().with("front", Args::new().with("x", 25.0));
//! let decision = genotype.evaluate(&inputs)?;
//! assert!((decision[0] - 0.75 * 90.0).abs() < 1e-9);
//! # Ok::<(), evobot::GeneticError>(())
//! ```

mod chromosome;
mod crossover;
mod evolution;
mod gene;
mod genotype;
mod mutation;
mod persistence;
mod registry;
mod selection;

pub use chromosome::Chromosome;
pub use crossover::Crossover;
pub use evolution::{
    EvolutionConfig, EvolutionStats, GenerationStats, GeneticAlgorithm, Phase, StallDetector,
};
pub use gene::{Bounds, Gene, GeneKind, GeneName, Number, ReturnGene, RuleGene};
pub use genotype::Genotype;
pub use mutation::{GeneKinds, Mutation, MutationRate};
pub use persistence::{
    Checkpoint, ChromosomeRecord, GenotypeRecord, PersistenceError, checkpoint_path,
    load_checkpoint, load_rule_rows, read_rule_rows, save_checkpoint, save_rule_rows,
    write_rule_rows,
};
pub use registry::{
    Args, Inputs, MissingArgument, Registry, RegistryBuilder, RuleTable, Score, Symbol, TableBuilder,
    TableId, Transform, TransformId,
};
pub use selection::{FitnessStats, Selection};
