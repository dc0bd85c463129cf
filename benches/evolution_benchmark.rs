//! Benchmarks for genotype evaluation and the generational loop.
//!
//! Evaluation runs once per individual per decision, so it dominates real
//! deployments; the generation step covers selection, crossover and mutation.

#![allow(missing_docs)]
#![allow(clippy::unwrap_used)]

use std::hint::black_box;
use std::sync::Arc;

use criterion::{Criterion, criterion_group, criterion_main};
use evobot::ga::{
    Args, Chromosome, EvolutionConfig, GeneticAlgorithm, Genotype, Inputs, Mutation, Registry,
};
use rand::SeedableRng;
use rand::rngs::SmallRng;

/// Fuzzy controller: 8 chromosomes of 3 distance rules and 2 outputs.
fn controller() -> (Genotype, Inputs) {
    let mut builder = Registry::builder();
    let distance = builder
        .rule_table()
        .entry("_", |_: &Args| Ok(1.0))
        .entry("near", |a: &Args| Ok((1.0 - a.get("x")? / 100.0).max(0.0)))
        .entry("far", |a: &Args| Ok((a.get("x")? / 100.0).min(1.0)))
        .finish();
    let turn = builder.transform(|x, _: &Args| Ok(x % 181.0 - 90.0));
    let speed = builder.transform(|x, _: &Args| Ok(x / 100.0));
    let registry = builder.build();

    let sensors = ["left", "front", "right"];
    let mut genotype = Genotype::new(Arc::clone(&registry));
    for _ in 0..8 {
        let mut c = Chromosome::new(Arc::clone(&registry));
        for sensor in sensors {
            c.add_rule_gene(registry.symbol("near").unwrap(), distance, Some(sensor.into()))
                .unwrap();
        }
        c.add_return_gene(45.0, turn, Some("turn".into())).unwrap();
        c.add_return_gene(50.0, speed, None).unwrap();
        genotype.add_chromosome(c).unwrap();
    }
    let mut rng = SmallRng::seed_from_u64(42);
    genotype.randomize(&mut rng).unwrap();

    let inputs = sensors
        .iter()
        .zip([30.0, 70.0, 10.0])
        .fold(Inputs::new(), |inputs, (sensor, x)| {
            inputs.with(*sensor, Args::new().with("x", x))
        });
    (genotype, inputs)
}

fn bench_evaluate(c: &mut Criterion) {
    let (genotype, inputs) = controller();

    c.bench_function("genotype_evaluate", |b| {
        b.iter(|| black_box(genotype.evaluate(black_box(&inputs))));
    });
}

fn bench_mutate(c: &mut Criterion) {
    let (genotype, _) = controller();
    let mutation = Mutation::default();
    let mut rng = SmallRng::seed_from_u64(7);

    c.bench_function("mutate_default", |b| {
        b.iter(|| {
            let mut child = genotype.clone();
            mutation.mutate(&mut child, &mut rng).unwrap();
            black_box(child)
        });
    });
}

fn bench_generation(c: &mut Criterion) {
    let (template, inputs) = controller();
    let config = EvolutionConfig {
        population_size: 100,
        ..Default::default()
    };

    c.bench_function("generation_100", |b| {
        let mut ga = GeneticAlgorithm::new(config.clone()).unwrap();
        ga.initialize_population(&template).unwrap();
        b.iter(|| {
            ga.evaluate_population(black_box(&inputs)).unwrap();
            black_box(ga.create_next_generation().unwrap())
        });
    });
}

criterion_group!(benches, bench_evaluate, bench_mutate, bench_generation);
criterion_main!(benches);
