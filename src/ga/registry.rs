//! Capability registry for gene evaluation.
//!
//! Rule genes hold an interned [`Symbol`] and a [`TableId`]; return genes hold
//! a [`TransformId`]. The registry owns the scoring and transform capabilities
//! those handles resolve to, so genes stay small plain values that clone
//! without touching any closure.
//!
//! A registry is assembled once with [`RegistryBuilder`] and then shared
//! read-only behind an [`Arc`] by every chromosome and genotype built on it.

use crate::error::{CapabilityError, GeneticError, Result};
use crate::ga::gene::GeneName;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Handle to an interned symbol name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Symbol(u32);

/// Handle to a rule table in a [`Registry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableId(u32);

/// Handle to a return transform in a [`Registry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransformId(u32);

/// Scoring capability selected by a rule gene's symbol.
pub trait Score: Send + Sync {
    /// Score the gene's keyword arguments.
    ///
    /// # Errors
    ///
    /// Any error is wrapped with the gene's name by the caller.
    fn score(&self, args: &Args) -> std::result::Result<f64, CapabilityError>;
}

impl<F> Score for F
where
    F: Fn(&Args) -> std::result::Result<f64, CapabilityError> + Send + Sync,
{
    fn score(&self, args: &Args) -> std::result::Result<f64, CapabilityError> {
        self(args)
    }
}

/// Transform applied to a return gene's numeric value.
pub trait Transform: Send + Sync {
    /// Map the gene value to an output channel value.
    ///
    /// # Errors
    ///
    /// Any error is wrapped with the gene's name by the caller.
    fn apply(&self, value: f64, args: &Args) -> std::result::Result<f64, CapabilityError>;
}

impl<F> Transform for F
where
    F: Fn(f64, &Args) -> std::result::Result<f64, CapabilityError> + Send + Sync,
{
    fn apply(&self, value: f64, args: &Args) -> std::result::Result<f64, CapabilityError> {
        self(value, args)
    }
}

/// A keyword argument a capability asked for was not supplied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("missing argument '{0}'")]
pub struct MissingArgument(pub String);

/// Keyword-argument bag passed to a single gene's capability.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args(BTreeMap<String, f64>);

static EMPTY_ARGS: Args = Args(BTreeMap::new());

impl Args {
    /// Create an empty bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: f64) -> Self {
        self.0.insert(key.into(), value);
        self
    }

    /// Insert or replace an argument.
    pub fn insert(&mut self, key: impl Into<String>, value: f64) {
        self.0.insert(key.into(), value);
    }

    /// Look up a required argument.
    ///
    /// # Errors
    ///
    /// Returns [`MissingArgument`] (boxed) when the key is absent.
    pub fn get(&self, key: &str) -> std::result::Result<f64, CapabilityError> {
        self.0
            .get(key)
            .copied()
            .ok_or_else(|| Box::new(MissingArgument(key.to_owned())) as CapabilityError)
    }

    /// Look up an optional argument.
    #[must_use]
    pub fn get_or(&self, key: &str, default: f64) -> f64 {
        self.0.get(key).copied().unwrap_or(default)
    }

    /// Number of arguments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the bag is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for Args {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Sensory input for one evaluation: each gene reads the bag stored under its name.
#[derive(Debug, Clone, Default)]
pub struct Inputs(HashMap<GeneName, Args>);

impl Inputs {
    /// Create an empty input map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, gene: impl Into<GeneName>, args: Args) -> Self {
        self.0.insert(gene.into(), args);
        self
    }

    /// Insert or replace the bag for a gene.
    pub fn insert(&mut self, gene: impl Into<GeneName>, args: Args) {
        self.0.insert(gene.into(), args);
    }

    /// Arguments for a gene; genes without an entry see an empty bag.
    #[must_use]
    pub fn args_for(&self, gene: &GeneName) -> &Args {
        self.0.get(gene).unwrap_or(&EMPTY_ARGS)
    }
}

/// Symbol → scorer table referenced by rule genes.
pub struct RuleTable {
    entries: Vec<(Symbol, Box<dyn Score>)>,
    variant: Vec<Symbol>,
}

impl RuleTable {
    /// Scorer for a symbol, if the table maps it.
    #[must_use]
    pub fn scorer(&self, symbol: Symbol) -> Option<&dyn Score> {
        self.entries
            .iter()
            .find(|(s, _)| *s == symbol)
            .map(|(_, scorer)| &**scorer)
    }

    /// Symbols valid for randomization and mutation.
    #[must_use]
    pub fn variant(&self) -> &[Symbol] {
        &self.variant
    }

    /// Symbols the table maps, in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = Symbol> + '_ {
        self.entries.iter().map(|(s, _)| *s)
    }
}

impl fmt::Debug for RuleTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleTable")
            .field("keys", &self.keys().collect::<Vec<_>>())
            .field("variant", &self.variant)
            .finish()
    }
}

/// Immutable set of symbols and capabilities that genes refer to by handle.
pub struct Registry {
    symbols: Vec<String>,
    index: HashMap<String, Symbol>,
    tables: Vec<RuleTable>,
    transforms: Vec<Box<dyn Transform>>,
}

impl Registry {
    /// Start building a registry.
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Resolve an interned name.
    #[must_use]
    pub fn symbol(&self, name: &str) -> Option<Symbol> {
        self.index.get(name).copied()
    }

    /// Name of an interned symbol.
    #[must_use]
    pub fn symbol_name(&self, symbol: Symbol) -> Option<&str> {
        self.symbols.get(symbol.0 as usize).map(String::as_str)
    }

    /// Look up a rule table.
    ///
    /// # Errors
    ///
    /// Returns [`GeneticError::UnknownCapability`] for a foreign handle.
    pub fn table(&self, id: TableId) -> Result<&RuleTable> {
        self.tables
            .get(id.0 as usize)
            .ok_or(GeneticError::UnknownCapability {
                kind: "rule table",
                id: id.0 as usize,
            })
    }

    /// Look up a return transform.
    ///
    /// # Errors
    ///
    /// Returns [`GeneticError::UnknownCapability`] for a foreign handle.
    pub fn transform(&self, id: TransformId) -> Result<&dyn Transform> {
        self.transforms
            .get(id.0 as usize)
            .map(|transform| &**transform)
            .ok_or(GeneticError::UnknownCapability {
                kind: "transform",
                id: id.0 as usize,
            })
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("symbols", &self.symbols)
            .field("tables", &self.tables)
            .field("transforms", &self.transforms.len())
            .finish()
    }
}

/// Mutable builder for a [`Registry`].
#[derive(Default)]
pub struct RegistryBuilder {
    symbols: Vec<String>,
    index: HashMap<String, Symbol>,
    tables: Vec<RuleTable>,
    transforms: Vec<Box<dyn Transform>>,
}

impl RegistryBuilder {
    /// Intern a name, returning the existing handle if already present.
    pub fn intern(&mut self, name: &str) -> Symbol {
        if let Some(symbol) = self.index.get(name) {
            return *symbol;
        }
        let symbol = Symbol(u32::try_from(self.symbols.len()).unwrap_or(u32::MAX));
        self.symbols.push(name.to_owned());
        self.index.insert(name.to_owned(), symbol);
        symbol
    }

    /// Start a new rule table.
    pub fn rule_table(&mut self) -> TableBuilder<'_> {
        TableBuilder {
            registry: self,
            entries: Vec::new(),
            variant: None,
        }
    }

    /// Register a return transform closure.
    pub fn transform<F>(&mut self, transform: F) -> TransformId
    where
        F: Fn(f64, &Args) -> std::result::Result<f64, CapabilityError> + Send + Sync + 'static,
    {
        self.transform_with(transform)
    }

    /// Register any [`Transform`] implementation.
    pub fn transform_with<T: Transform + 'static>(&mut self, transform: T) -> TransformId {
        let id = TransformId(u32::try_from(self.transforms.len()).unwrap_or(u32::MAX));
        self.transforms.push(Box::new(transform));
        id
    }

    /// Freeze the registry for sharing.
    #[must_use]
    pub fn build(self) -> Arc<Registry> {
        Arc::new(Registry {
            symbols: self.symbols,
            index: self.index,
            tables: self.tables,
            transforms: self.transforms,
        })
    }
}

impl fmt::Debug for RegistryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryBuilder")
            .field("symbols", &self.symbols)
            .field("tables", &self.tables.len())
            .field("transforms", &self.transforms.len())
            .finish()
    }
}

/// Builder for one [`RuleTable`].
pub struct TableBuilder<'a> {
    registry: &'a mut RegistryBuilder,
    entries: Vec<(Symbol, Box<dyn Score>)>,
    variant: Option<Vec<Symbol>>,
}

impl TableBuilder<'_> {
    /// Map a symbol to a scoring closure.
    #[must_use]
    pub fn entry<F>(self, name: &str, scorer: F) -> Self
    where
        F: Fn(&Args) -> std::result::Result<f64, CapabilityError> + Send + Sync + 'static,
    {
        self.entry_with(name, scorer)
    }

    /// Map a symbol to any [`Score`] implementation.
    #[must_use]
    pub fn entry_with<S: Score + 'static>(mut self, name: &str, scorer: S) -> Self {
        let symbol = self.registry.intern(name);
        // Later entries replace earlier ones with the same symbol.
        self.entries.retain(|(s, _)| *s != symbol);
        self.entries.push((symbol, Box::new(scorer)));
        self
    }

    /// Override the symbols used by randomization and mutation.
    ///
    /// Names are interned even when the table has no scorer for them.
    #[must_use]
    pub fn variant<'n, I>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = &'n str>,
    {
        let symbols = names.into_iter().map(|n| self.registry.intern(n)).collect();
        self.variant = Some(symbols);
        self
    }

    /// Register the table.
    pub fn finish(self) -> TableId {
        let variant = self
            .variant
            .unwrap_or_else(|| self.entries.iter().map(|(s, _)| *s).collect());
        let id = TableId(u32::try_from(self.registry.tables.len()).unwrap_or(u32::MAX));
        self.registry.tables.push(RuleTable {
            entries: self.entries,
            variant,
        });
        id
    }
}

impl fmt::Debug for TableBuilder<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableBuilder")
            .field("entries", &self.entries.len())
            .field("variant", &self.variant)
            .finish_non_exhaustive()
    }
}
