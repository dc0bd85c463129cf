//! Property-based tests for the genetic operators.
//!
//! These tests verify structural invariants of genotypes under selection,
//! crossover and mutation for arbitrary layouts and seeds.
//! Run with: cargo test --release prop_operators

#![allow(missing_docs)]
#![allow(clippy::unwrap_used)]

use proptest::prelude::*;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use std::sync::Arc;

use evobot::GeneticError;
use evobot::ga::{
    Args, Chromosome, Crossover, GeneKinds, Genotype, Inputs, Mutation, MutationRate, Registry,
    Selection, TableId, TransformId,
};

const SYMBOLS: [&str; 3] = ["_", "near", "far"];

struct Fixture {
    registry: Arc<Registry>,
    table: TableId,
    identity: TransformId,
}

fn fixture() -> Fixture {
    let mut builder = Registry::builder();
    let table = builder
        .rule_table()
        .entry("_", |_: &Args| Ok(1.0))
        .entry("near", |_: &Args| Ok(0.5))
        .entry("far", |_: &Args| Ok(0.25))
        .finish();
    let identity = builder.transform(|x, _: &Args| Ok(x));
    Fixture {
        registry: builder.build(),
        table,
        identity,
    }
}

/// Layout plus values: per chromosome, rule symbol indices and return values.
type Layout = Vec<(Vec<usize>, Vec<f64>)>;

fn layout() -> impl Strategy<Value = Layout> {
    (1usize..5, 0usize..5, 1usize..4).prop_flat_map(|(chromosomes, rules, returns)| {
        prop::collection::vec(
            (
                prop::collection::vec(0usize..SYMBOLS.len(), rules),
                prop::collection::vec(-100.0f64..100.0, returns),
            ),
            chromosomes,
        )
    })
}

fn build(fx: &Fixture, layout: &Layout) -> Genotype {
    let mut g = Genotype::new(Arc::clone(&fx.registry));
    for (rules, returns) in layout {
        let mut c = Chromosome::new(Arc::clone(&fx.registry));
        for &s in rules {
            c.add_rule_gene(fx.registry.symbol(SYMBOLS[s]).unwrap(), fx.table, None)
                .unwrap();
        }
        for &v in returns {
            c.add_return_gene(v, fx.identity, None).unwrap();
        }
        g.add_chromosome(c).unwrap();
    }
    g
}

/// Same layout with every rule set to `symbol` and every return set to `value`.
fn uniform_like(fx: &Fixture, layout: &Layout, symbol: usize, value: f64) -> Genotype {
    let filled: Layout = layout
        .iter()
        .map(|(r, v)| (vec![symbol; r.len()], vec![value; v.len()]))
        .collect();
    build(fx, &filled)
}

fn all_crossovers() -> [Crossover; 4] {
    [
        Crossover::OnePoint,
        Crossover::TwoPoint,
        Crossover::Uniform,
        Crossover::None,
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Every chromosome of a genotype keeps the return length fixed by the first.
    #[test]
    fn prop_return_length_is_consistent(layout in layout(), extra in 1usize..3) {
        let fx = fixture();
        let mut g = build(&fx, &layout);
        let expected = layout[0].1.len();
        prop_assert_eq!(g.chromosome_return_length(), Some(expected));

        let mut wider = Chromosome::new(Arc::clone(&fx.registry));
        for _ in 0..expected + extra {
            wider.add_return_gene(1.0, fx.identity, None).unwrap();
        }
        let rejected = matches!(
            g.add_chromosome(wider),
            Err(GeneticError::ReturnLengthMismatch { .. })
        );
        prop_assert!(rejected);
        prop_assert!(g.chromosomes().iter().all(|c| c.returns().len() == expected));
        prop_assert_eq!(g.evaluate(&Inputs::new()).unwrap().len(), expected);
    }

    /// Mutating a clone never changes the original.
    #[test]
    fn prop_clone_is_independent(layout in layout(), seed in any::<u64>()) {
        let fx = fixture();
        let original = build(&fx, &layout);
        let snapshot = original.clone();
        let mut copy = original.clone();

        let mut rng = SmallRng::seed_from_u64(seed);
        let gaussian = Mutation::Gaussian { probability: 1.0, mean: 0.0, stddev: 5.0 };
        let strategies = [
            Mutation::BitFlip(MutationRate::new(1.0)),
            Mutation::RandomReset(MutationRate::new(1.0)),
            Mutation::Swap(MutationRate::new(1.0)),
            gaussian.clone(),
            Mutation::Composite {
                strategies: vec![Mutation::BitFlip(MutationRate::new(1.0)), gaussian],
            },
        ];
        for strategy in &strategies {
            strategy.mutate(&mut copy, &mut rng).unwrap();
            prop_assert_eq!(&original, &snapshot);
        }
    }

    /// Probability-zero mutation is the identity for every strategy.
    #[test]
    fn prop_zero_probability_mutation_is_identity(layout in layout(), seed in any::<u64>()) {
        let fx = fixture();
        let mut g = build(&fx, &layout);
        let before = g.clone();
        let mut rng = SmallRng::seed_from_u64(seed);

        let strategy = Mutation::Composite {
            strategies: vec![
                Mutation::BitFlip(MutationRate::new(0.0)),
                Mutation::RandomReset(MutationRate::new(0.0)),
                Mutation::Swap(MutationRate::only(0.0, GeneKinds::RULES)),
                Mutation::Gaussian { probability: 0.0, mean: 0.0, stddev: 10.0 },
            ],
        };
        strategy.mutate(&mut g, &mut rng).unwrap();
        prop_assert_eq!(g, before);
    }

    /// Crossing a genotype with itself yields two copies of it.
    #[test]
    fn prop_self_crossover_is_identity(layout in layout(), seed in any::<u64>()) {
        let fx = fixture();
        let a = build(&fx, &layout);
        let mut rng = SmallRng::seed_from_u64(seed);
        for strategy in all_crossovers() {
            let (c1, c2) = strategy.crossover(&a, &a, &mut rng).unwrap();
            prop_assert_eq!(&c1, &a);
            prop_assert_eq!(&c2, &a);
        }
    }

    /// Children keep the parents' layout and take each gene from one parent
    /// while the sibling takes it from the other.
    #[test]
    fn prop_crossover_conserves_genes(layout in layout(), seed in any::<u64>()) {
        let fx = fixture();
        let p1 = uniform_like(&fx, &layout, 1, 1.0);
        let p2 = uniform_like(&fx, &layout, 2, 2.0);
        let near = fx.registry.symbol("near").unwrap();
        let mut rng = SmallRng::seed_from_u64(seed);

        for strategy in all_crossovers() {
            let (c1, c2) = strategy.crossover(&p1, &p2, &mut rng).unwrap();
            prop_assert_eq!(c1.shape(), p1.shape());
            prop_assert_eq!(c2.shape(), p1.shape());
            for (x, y) in c1.chromosomes().iter().zip(c2.chromosomes()) {
                for (gx, gy) in x.rules().iter().zip(y.rules()) {
                    prop_assert!((gx.value == near) != (gy.value == near));
                }
                for (gx, gy) in x.returns().iter().zip(y.returns()) {
                    prop_assert!((gx.value.as_f64() + gy.value.as_f64() - 3.0).abs() < 1e-12);
                }
            }
        }
    }

    /// Every strategy selects a member of the population.
    #[test]
    fn prop_selection_returns_member(
        fitness in prop::collection::vec(0.0f64..100.0, 1..20),
        seed in any::<u64>(),
    ) {
        let n = fitness.len();
        let mut rng = SmallRng::seed_from_u64(seed);
        let mut strategies = vec![
            Selection::Tournament { size: 1.max(n / 2) },
            Selection::RankBased,
            Selection::Random,
        ];
        if fitness.iter().sum::<f64>() > 0.0 {
            strategies.push(Selection::RouletteWheel);
        }
        for strategy in strategies {
            let idx = strategy.select_index(n, &fitness, &mut rng).unwrap();
            prop_assert!(idx < n);
        }
    }

    /// Tournament over the whole population always returns the first best.
    #[test]
    fn prop_full_tournament_picks_best(
        fitness in prop::collection::vec(-50.0f64..50.0, 1..20),
        seed in any::<u64>(),
    ) {
        let n = fitness.len();
        let mut rng = SmallRng::seed_from_u64(seed);
        let idx = Selection::Tournament { size: n }
            .select_index(n, &fitness, &mut rng)
            .unwrap();
        let best = fitness.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        prop_assert!((fitness[idx] - best).abs() < f64::EPSILON);
    }

    /// Randomization keeps the layout and draws returns from the variant bounds.
    #[test]
    fn prop_randomize_respects_variant(layout in layout(), seed in any::<u64>()) {
        let fx = fixture();
        let mut g = build(&fx, &layout);
        let shape = g.shape();
        let mut rng = SmallRng::seed_from_u64(seed);
        g.randomize(&mut rng).unwrap();

        prop_assert_eq!(g.shape(), shape);
        for c in g.chromosomes() {
            for r in c.returns() {
                prop_assert!((0.0..100.0).contains(&r.value.as_f64()));
            }
        }
    }
}
