// Allow unwrap in tests (test code is not production)
#![cfg_attr(test, allow(clippy::unwrap_used))]
//! Evobot: genetic encoding and evolution engine for rule-based agent controllers.
//!
//! This crate provides:
//! - Rule and return genes resolved through a shared capability registry
//! - Chromosome and genotype evaluation of per-gene sensory input
//! - Pluggable selection, crossover and mutation strategies
//! - A generational driver with elitism, checkpoints and rule-row export
//!
//! Simulation, sensing and actuation stay with the caller: it supplies
//! [`ga::Inputs`] for every decision and reports fitness after each episode.

pub mod error;
pub mod ga;

pub use error::{CapabilityError, GeneticError, Result};

// Re-export the driver and encoding types at crate root for convenience
pub use ga::{
    Chromosome, Crossover, EvolutionConfig, GeneticAlgorithm, Genotype, Inputs, Mutation,
    Registry, Selection,
};
