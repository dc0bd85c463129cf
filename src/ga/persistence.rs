//! Persistence for genotypes and evolution state.
//!
//! Two formats are supported:
//!
//! - **Rule rows**: one comma-delimited row per chromosome holding the rule
//!   symbol names followed by the return values. Integer values are written
//!   without a decimal point, float values with one, so a row reads back with
//!   the same value kinds.
//! - **Checkpoints**: the population, its fitness and the driver's generation
//!   as pretty JSON.
//!
//! Both store symbols by name rather than by handle, so a saved genotype is
//! independent of the registry it came from. Loading applies the stored
//! values onto a template genotype built against the live registry.

use crate::error::GeneticError;
use crate::ga::chromosome::Chromosome;
use crate::ga::evolution::GeneticAlgorithm;
use crate::ga::gene::Number;
use crate::ga::genotype::Genotype;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from loading or saving genotypes and checkpoints.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// File I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// JSON encoding or decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// A rule row could not be parsed.
    #[error("line {line}: {message}")]
    Parse {
        /// 1-based line number.
        line: usize,
        /// What was wrong with the row.
        message: String,
    },
    /// Stored values do not fit the template or configuration.
    #[error(transparent)]
    Genetic(#[from] GeneticError),
}

/// Registry-independent values of one chromosome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChromosomeRecord {
    /// Rule gene symbol names in order.
    pub rules: Vec<String>,
    /// Return gene values in order.
    pub returns: Vec<Number>,
}

impl ChromosomeRecord {
    /// Capture a chromosome's current values.
    #[must_use]
    pub fn from_chromosome(chromosome: &Chromosome) -> Self {
        let registry = chromosome.registry();
        Self {
            rules: chromosome
                .rules()
                .iter()
                .map(|g| registry.symbol_name(g.value).unwrap_or_default().to_owned())
                .collect(),
            returns: chromosome.returns().iter().map(|g| g.value).collect(),
        }
    }

    fn apply_to(&self, chromosome: &mut Chromosome) -> Result<(), GeneticError> {
        if self.rules.len() != chromosome.rules().len()
            || self.returns.len() != chromosome.returns().len()
        {
            return Err(GeneticError::ShapeMismatch(format!(
                "record has {}+{} genes, chromosome has {}+{}",
                self.rules.len(),
                self.returns.len(),
                chromosome.rules().len(),
                chromosome.returns().len()
            )));
        }
        let registry = std::sync::Arc::clone(chromosome.registry());
        for (gene, name) in chromosome.rules_mut().iter_mut().zip(&self.rules) {
            gene.value = registry
                .symbol(name)
                .ok_or_else(|| GeneticError::UnknownSymbol {
                    gene: gene.name.clone(),
                    symbol: name.clone(),
                })?;
        }
        for (gene, value) in chromosome.returns_mut().iter_mut().zip(&self.returns) {
            gene.value = *value;
        }
        Ok(())
    }
}

/// Registry-independent values of one genotype.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenotypeRecord {
    /// One record per chromosome.
    pub chromosomes: Vec<ChromosomeRecord>,
}

impl GenotypeRecord {
    /// Capture a genotype's current values.
    #[must_use]
    pub fn from_genotype(genotype: &Genotype) -> Self {
        Self {
            chromosomes: genotype
                .chromosomes()
                .iter()
                .map(ChromosomeRecord::from_chromosome)
                .collect(),
        }
    }

    /// Clone `template` and overwrite its values with this record's.
    ///
    /// # Errors
    ///
    /// [`GeneticError::ShapeMismatch`] if the layouts differ,
    /// [`GeneticError::UnknownSymbol`] for a name the registry never interned.
    pub fn apply(&self, template: &Genotype) -> Result<Genotype, GeneticError> {
        if self.chromosomes.len() != template.len() {
            return Err(GeneticError::ShapeMismatch(format!(
                "record has {} chromosomes, template has {}",
                self.chromosomes.len(),
                template.len()
            )));
        }
        let mut genotype = template.clone();
        for (chromosome, record) in genotype.chromosomes_mut().iter_mut().zip(&self.chromosomes) {
            record.apply_to(chromosome)?;
        }
        Ok(genotype)
    }
}

/// Evolution checkpoint containing population and metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Generation number of the stored population.
    pub generation: usize,
    /// Population values.
    pub population: Vec<GenotypeRecord>,
    /// Fitness of each individual; empty if the population was not evaluated.
    pub fitness: Vec<f64>,
    /// Best fitness of the stored population, if evaluated.
    pub best_fitness: Option<f64>,
    /// Seed the run was configured with.
    pub seed: u64,
}

impl Checkpoint {
    /// Snapshot a driver's population.
    #[must_use]
    pub fn capture<R: Rng>(ga: &GeneticAlgorithm<R>) -> Self {
        Self {
            generation: ga.generation(),
            population: ga
                .population()
                .iter()
                .map(GenotypeRecord::from_genotype)
                .collect(),
            fitness: ga.fitness().to_vec(),
            best_fitness: ga.best().map(|(_, fit)| fit),
            seed: ga.config().seed,
        }
    }

    /// Install the stored population into `ga`, rebuilding each individual
    /// from `template`.
    ///
    /// # Errors
    ///
    /// Returns an error if a record does not fit the template or the stored
    /// fitness is not aligned with the population.
    pub fn restore<R: Rng>(
        &self,
        ga: &mut GeneticAlgorithm<R>,
        template: &Genotype,
    ) -> Result<(), PersistenceError> {
        let population = self
            .population
            .iter()
            .map(|record| record.apply(template))
            .collect::<Result<Vec<_>, _>>()?;
        ga.replace_population(population, self.fitness.clone(), self.generation)?;
        Ok(())
    }
}

/// Save a checkpoint as pretty JSON.
///
/// # Errors
///
/// Returns an error if serialization or file I/O fails.
pub fn save_checkpoint(checkpoint: &Checkpoint, path: &Path) -> Result<(), PersistenceError> {
    let json = serde_json::to_string_pretty(checkpoint)?;
    fs::write(path, json)?;
    Ok(())
}

/// Load a checkpoint saved by [`save_checkpoint`].
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a valid checkpoint.
pub fn load_checkpoint(path: &Path) -> Result<Checkpoint, PersistenceError> {
    let json = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}

/// Get the path for a generation checkpoint file.
#[must_use]
pub fn checkpoint_path(output_dir: &Path, generation: usize) -> PathBuf {
    output_dir.join(format!("gen_{generation:05}.json"))
}

/// Write one row per chromosome: rule symbol names, then return values.
///
/// Symbol names must not contain commas or line breaks.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_rule_rows<W: Write>(
    genotype: &Genotype,
    writer: &mut W,
) -> Result<(), PersistenceError> {
    for chromosome in genotype.chromosomes() {
        let record = ChromosomeRecord::from_chromosome(chromosome);
        let fields: Vec<String> = record
            .rules
            .into_iter()
            .chain(record.returns.iter().map(ToString::to_string))
            .collect();
        writeln!(writer, "{}", fields.join(","))?;
    }
    Ok(())
}

/// Read rows written by [`write_rule_rows`] onto a clone of `template`.
///
/// Blank lines are skipped. Each remaining row must hold exactly as many
/// fields as its chromosome has genes.
///
/// # Errors
///
/// [`PersistenceError::Parse`] for malformed rows or a row count that does
/// not match the template, and [`PersistenceError::Genetic`] for unknown
/// symbol names.
pub fn read_rule_rows<B: BufRead>(
    reader: B,
    template: &Genotype,
) -> Result<Genotype, PersistenceError> {
    let mut rows = Vec::with_capacity(template.len());
    let mut last_line = 0;
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        last_line = idx + 1;
        if line.trim().is_empty() {
            continue;
        }
        let Some(shape) = template.chromosomes().get(rows.len()) else {
            return Err(PersistenceError::Parse {
                line: idx + 1,
                message: format!("template has only {} chromosomes", template.len()),
            });
        };
        rows.push(parse_row(&line, idx + 1, shape)?);
    }
    if rows.len() != template.len() {
        return Err(PersistenceError::Parse {
            line: last_line,
            message: format!(
                "found {} rows, template has {} chromosomes",
                rows.len(),
                template.len()
            ),
        });
    }
    Ok(GenotypeRecord { chromosomes: rows }.apply(template)?)
}

fn parse_row(
    line: &str,
    line_no: usize,
    shape: &Chromosome,
) -> Result<ChromosomeRecord, PersistenceError> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    let num_rules = shape.rules().len();
    if fields.len() != shape.len() {
        return Err(PersistenceError::Parse {
            line: line_no,
            message: format!("expected {} fields, found {}", shape.len(), fields.len()),
        });
    }
    let returns = fields[num_rules..]
        .iter()
        .map(|field| {
            parse_number(field).ok_or_else(|| PersistenceError::Parse {
                line: line_no,
                message: format!("'{field}' is not a number"),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ChromosomeRecord {
        rules: fields[..num_rules].iter().map(|s| (*s).to_owned()).collect(),
        returns,
    })
}

fn parse_number(field: &str) -> Option<Number> {
    if let Ok(i) = field.parse::<i64>() {
        return Some(Number::Int(i));
    }
    field.parse::<f64>().ok().map(Number::Float)
}

/// Save a genotype's rule rows to a file.
///
/// # Errors
///
/// Returns an error if file I/O fails.
pub fn save_rule_rows(genotype: &Genotype, path: &Path) -> Result<(), PersistenceError> {
    let mut writer = BufWriter::new(fs::File::create(path)?);
    write_rule_rows(genotype, &mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Load rule rows from a file onto a clone of `template`.
///
/// # Errors
///
/// Returns an error if file I/O fails or [`read_rule_rows`] rejects the rows.
pub fn load_rule_rows(path: &Path, template: &Genotype) -> Result<Genotype, PersistenceError> {
    read_rule_rows(BufReader::new(fs::File::open(path)?), template)
}
