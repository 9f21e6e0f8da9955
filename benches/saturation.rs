//! Benchmarks for classification and incremental updates.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::{Rng, SeedableRng};

use el_classifier::config::ReasonerConfig;
use el_classifier::model::{Axiom, ClassExpression};
use el_classifier::reasoner::Reasoner;

/// Random EL ontology over `classes` classes with existentials and conjunctions.
fn ontology(classes: usize, seed: u64) -> Vec<Axiom> {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    let class = |i: usize| ClassExpression::class(format!("C{i}"));
    let mut axioms = vec![Axiom::TransitiveObjectProperty("partOf".into())];
    for i in 1..classes {
        axioms.push(Axiom::SubClassOf {
            sub: class(i),
            sup: class(rng.gen_range(0..i)),
        });
        if i % 3 == 0 {
            axioms.push(Axiom::SubClassOf {
                sub: class(i),
                sup: ClassExpression::some("partOf", class(rng.gen_range(0..classes))),
            });
        }
        if i % 5 == 0 {
            axioms.push(Axiom::SubClassOf {
                sub: ClassExpression::and([class(rng.gen_range(0..i)), class(rng.gen_range(0..i))]),
                sup: class(i),
            });
        }
        if i % 7 == 0 {
            axioms.push(Axiom::SubClassOf {
                sub: ClassExpression::some("partOf", class(rng.gen_range(0..classes))),
                sup: class(i),
            });
        }
    }
    axioms
}

fn bench_classify(c: &mut Criterion) {
    let axioms = ontology(2_000, 0);
    let mut group = c.benchmark_group("classify_2k");
    for workers in [1, 2, 4] {
        group.bench_with_input(BenchmarkId::from_parameter(workers), &workers, |bench, &workers| {
            bench.iter(|| {
                let mut reasoner = Reasoner::new(ReasonerConfig::with_workers(workers)).unwrap();
                reasoner.add_axioms(&axioms).unwrap();
                black_box(reasoner.classify().unwrap().len())
            })
        });
    }
    group.finish();
}

fn bench_incremental(c: &mut Criterion) {
    let axioms = ontology(2_000, 1);
    let mut reasoner = Reasoner::new(ReasonerConfig::with_workers(4)).unwrap();
    reasoner.add_axioms(&axioms).unwrap();
    reasoner.classify().unwrap();
    let toggled = Axiom::sub_class_of("C1500", "C10");

    c.bench_function("toggle_axiom_2k", |bench| {
        bench.iter(|| {
            reasoner.add_axiom(&toggled).unwrap();
            reasoner.classify().unwrap();
            reasoner.remove_axiom(&toggled).unwrap();
            black_box(reasoner.classify().unwrap().len())
        })
    });
}

criterion_group!(benches, bench_classify, bench_incremental);
criterion_main!(benches);
