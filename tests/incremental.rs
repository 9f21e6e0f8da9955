//! Random assert/retract walks: after every step the incrementally maintained
//! taxonomy must equal the one computed from scratch.

use std::collections::{BTreeMap, BTreeSet};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use el_classifier::config::ReasonerConfig;
use el_classifier::model::{Axiom, ClassExpression, PropertyExpression};
use el_classifier::reasoner::Reasoner;

fn hierarchy(r: &mut Reasoner) -> BTreeMap<String, BTreeSet<String>> {
    let taxonomy = r.classify().unwrap();
    let mut out = BTreeMap::new();
    for (_, node) in taxonomy.nodes() {
        for member in node.members() {
            let supers = taxonomy.direct_super_classes(member).unwrap_or_default();
            out.insert(
                member.clone(),
                supers.into_iter().map(str::to_string).collect(),
            );
        }
    }
    out
}

fn class(i: usize) -> ClassExpression {
    ClassExpression::class(format!("C{i}"))
}

/// A pool of candidate class axioms over ten classes and two properties.
fn candidates(rng: &mut StdRng) -> Vec<Axiom> {
    let mut pool = Vec::new();
    for _ in 0..30 {
        let a = rng.gen_range(0..10);
        let b = rng.gen_range(0..10);
        let c = rng.gen_range(0..10);
        let property = if rng.gen_bool(0.5) { "r" } else { "s" };
        let axiom = match rng.gen_range(0..5) {
            0 | 1 => Axiom::SubClassOf {
                sub: class(a),
                sup: class(b),
            },
            2 => Axiom::SubClassOf {
                sub: class(a),
                sup: ClassExpression::some(property, class(b)),
            },
            3 => Axiom::SubClassOf {
                sub: ClassExpression::some(property, class(b)),
                sup: class(c),
            },
            _ => Axiom::SubClassOf {
                sub: ClassExpression::and([class(a), class(b)]),
                sup: class(c),
            },
        };
        pool.push(axiom);
    }
    pool.push(Axiom::disjoint(["C8", "C9"]));
    pool
}

fn fixed_axioms() -> Vec<Axiom> {
    vec![
        Axiom::SubObjectPropertyOf {
            sub: PropertyExpression::named("r"),
            sup: "s".into(),
        },
        Axiom::TransitiveObjectProperty("s".into()),
    ]
}

fn walk(seed: u64, steps: usize, workers: usize) {
    let mut rng = StdRng::seed_from_u64(seed);
    let pool = candidates(&mut rng);

    let mut incremental = Reasoner::new(ReasonerConfig::with_workers(workers)).unwrap();
    incremental.add_axioms(&fixed_axioms()).unwrap();
    let mut asserted: Vec<Axiom> = Vec::new();

    for step in 0..steps {
        let batch = rng.gen_range(1..=3);
        for _ in 0..batch {
            let remove = !asserted.is_empty() && rng.gen_bool(0.4);
            if remove {
                let at = rng.gen_range(0..asserted.len());
                let axiom = asserted.swap_remove(at);
                incremental.remove_axiom(&axiom).unwrap();
            } else if let Some(axiom) = pool.choose(&mut rng) {
                if !asserted.contains(axiom) {
                    incremental.add_axiom(axiom).unwrap();
                    asserted.push(axiom.clone());
                }
            }
        }

        let mut scratch = Reasoner::new(ReasonerConfig::with_workers(1)).unwrap();
        scratch.add_axioms(&fixed_axioms()).unwrap();
        scratch.add_axioms(&asserted).unwrap();
        assert_eq!(
            hierarchy(&mut incremental),
            hierarchy(&mut scratch),
            "seed {seed}, step {step}, axioms {asserted:?}"
        );
    }
}

#[test]
fn random_walk_single_worker() {
    walk(7, 25, 1);
}

#[test]
fn random_walk_parallel() {
    for seed in [1, 2, 3] {
        walk(seed, 25, 4);
    }
}
