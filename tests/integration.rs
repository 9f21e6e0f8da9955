//! End-to-end tests against the public reasoner API.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use el_classifier::config::ReasonerConfig;
use el_classifier::interrupt::InterruptHandle;
use el_classifier::model::{Axiom, ClassExpression, PropertyExpression, OWL_NOTHING, OWL_THING};
use el_classifier::reasoner::Reasoner;
use el_classifier::saturation::{Context, ContextCreationListener};

fn reasoner(workers: usize) -> Reasoner {
    let config = ReasonerConfig {
        validate_taxonomy: true,
        ..ReasonerConfig::with_workers(workers)
    };
    Reasoner::new(config).unwrap()
}

fn class(iri: &str) -> ClassExpression {
    ClassExpression::class(iri)
}

fn sub(sub: ClassExpression, sup: ClassExpression) -> Axiom {
    Axiom::SubClassOf { sub, sup }
}

fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Named subsumers in the saturated context of `class`.
fn derived_supers(r: &Reasoner, class: &str) -> BTreeSet<String> {
    let index = r.index();
    let id = index.class_id(class).expect("class is indexed");
    let context = r
        .saturation_state()
        .context(id)
        .expect("class has a context");
    context
        .subsumers()
        .into_iter()
        .filter(|s| index.is_class(*s))
        .filter_map(|s| index.iri(s).map(str::to_string))
        .collect()
}

/// Every named class mapped to the canonical names of its direct supers.
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

fn classify_from_scratch(axioms: &[Axiom], workers: usize) -> BTreeMap<String, BTreeSet<String>> {
    let mut r = reasoner(workers);
    r.add_axioms(axioms).unwrap();
    hierarchy(&mut r)
}

/// A mid-sized ontology exercising conjunctions, existentials, property
/// hierarchies and chains.
fn anatomy() -> Vec<Axiom> {
    let mut axioms = vec![
        Axiom::TransitiveObjectProperty("partOf".into()),
        Axiom::SubObjectPropertyOf {
            sub: PropertyExpression::named("directPartOf"),
            sup: "partOf".into(),
        },
        Axiom::SubObjectPropertyOf {
            sub: PropertyExpression::chain(["locatedIn", "partOf"]),
            sup: "locatedIn".into(),
        },
        Axiom::equivalent([
            class("HeartPart"),
            ClassExpression::some("partOf", class("Heart")),
        ]),
        Axiom::equivalent([
            class("CardiacCell"),
            ClassExpression::and([class("Cell"), ClassExpression::some("locatedIn", class("Heart"))]),
        ]),
        Axiom::sub_class_of("Heart", "Organ"),
        Axiom::sub_class_of("Organ", "AnatomicalEntity"),
        Axiom::sub_class_of("Cell", "AnatomicalEntity"),
        sub(class("Valve"), ClassExpression::some("directPartOf", class("Heart"))),
        sub(class("Cusp"), ClassExpression::some("directPartOf", class("Valve"))),
        sub(
            class("Myocyte"),
            ClassExpression::and([class("Cell"), ClassExpression::some("locatedIn", class("Cusp"))]),
        ),
    ];
    for i in 0..40 {
        axioms.push(Axiom::sub_class_of(format!("Tissue{i}"), "AnatomicalEntity"));
        axioms.push(sub(
            class(&format!("Tissue{i}")),
            ClassExpression::some("partOf", class(if i % 2 == 0 { "Valve" } else { "Organ" })),
        ));
        if i > 0 {
            axioms.push(Axiom::sub_class_of(format!("Tissue{i}"), format!("Tissue{}", i - 1)));
        }
    }
    axioms
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn told_chain_is_reduced() {
    let mut r = reasoner(2);
    r.add_axioms(&[
        Axiom::sub_class_of("A", "B"),
        Axiom::sub_class_of("B", "C"),
        Axiom::sub_class_of("A", "C"),
    ])
    .unwrap();
    r.classify().unwrap();

    assert_eq!(derived_supers(&r, "A"), set(&["A", "B", "C", OWL_THING]));
    assert_eq!(r.super_classes("A", true).unwrap(), set(&["B"]));
    assert_eq!(r.super_classes("B", true).unwrap(), set(&["C"]));
    assert_eq!(r.super_classes("C", true).unwrap(), set(&[OWL_THING]));
    assert_eq!(r.sub_classes("C", true).unwrap(), set(&["B"]));
    assert_eq!(r.sub_classes("A", true).unwrap(), set(&[OWL_NOTHING]));
}

#[test]
fn removing_a_link_retracts_everything_above_it() {
    let mut r = reasoner(2);
    r.add_axioms(&[Axiom::sub_class_of("A", "B"), Axiom::sub_class_of("B", "C")])
        .unwrap();
    r.classify().unwrap();

    r.add_axiom(&Axiom::sub_class_of("C", "D")).unwrap();
    r.remove_axiom(&Axiom::sub_class_of("B", "C")).unwrap();
    r.classify().unwrap();

    assert_eq!(r.super_classes("A", true).unwrap(), set(&["B"]));
    assert_eq!(r.super_classes("B", true).unwrap(), set(&[OWL_THING]));
    let derived = derived_supers(&r, "A");
    assert!(!derived.contains("C"));
    assert!(!derived.contains("D"));
    assert_eq!(r.super_classes("C", true).unwrap(), set(&["D"]));
}

#[test]
fn told_shortcut_survives_removal_of_the_long_path() {
    let mut r = reasoner(2);
    r.add_axioms(&[
        Axiom::sub_class_of("A", "B"),
        Axiom::sub_class_of("B", "C"),
        Axiom::sub_class_of("A", "C"),
    ])
    .unwrap();
    r.classify().unwrap();

    r.add_axiom(&Axiom::sub_class_of("C", "D")).unwrap();
    r.remove_axiom(&Axiom::sub_class_of("B", "C")).unwrap();
    r.classify().unwrap();

    assert_eq!(r.super_classes("A", true).unwrap(), set(&["B", "C"]));
    assert_eq!(r.super_classes("B", true).unwrap(), set(&[OWL_THING]));
    assert!(derived_supers(&r, "A").contains("D"));
    assert!(!derived_supers(&r, "B").contains("D"));
}

#[test]
fn disjoint_supers_make_a_class_unsatisfiable() {
    let mut r = reasoner(2);
    r.add_axioms(&[
        Axiom::disjoint(["A", "B"]),
        Axiom::sub_class_of("X", "A"),
        Axiom::sub_class_of("X", "B"),
    ])
    .unwrap();

    assert!(!r.is_satisfiable("X").unwrap());
    assert!(r.is_satisfiable("A").unwrap());
    assert!(!r.is_inconsistent().unwrap());
    assert!(r.classify().unwrap().is_bottom("X"));
    assert_eq!(r.equivalent_classes("X").unwrap(), set(&[OWL_NOTHING, "X"]));
    assert!(r.is_subsumed("X", "A").unwrap());
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

#[test]
fn conjunctions_compose() {
    let mut r = reasoner(2);
    r.add_axioms(&[
        Axiom::sub_class_of("A", "B"),
        Axiom::sub_class_of("A", "C"),
        sub(ClassExpression::and([class("B"), class("C")]), class("D")),
    ])
    .unwrap();
    assert!(r.is_subsumed("A", "D").unwrap());
    assert!(!r.is_subsumed("B", "D").unwrap());
}

#[test]
fn existentials_propagate_through_filler_supers() {
    let mut r = reasoner(2);
    r.add_axioms(&[
        sub(class("A"), ClassExpression::some("r", class("B"))),
        Axiom::sub_class_of("B", "C"),
        sub(ClassExpression::some("r", class("C")), class("D")),
    ])
    .unwrap();
    assert!(r.is_subsumed("A", "D").unwrap());
    assert_eq!(r.super_classes("A", true).unwrap(), set(&["D"]));
}

#[test]
fn sub_properties_carry_existentials() {
    let mut r = reasoner(2);
    r.add_axioms(&[
        Axiom::SubObjectPropertyOf {
            sub: PropertyExpression::named("r"),
            sup: "s".into(),
        },
        sub(class("A"), ClassExpression::some("r", class("B"))),
        sub(ClassExpression::some("s", class("B")), class("C")),
    ])
    .unwrap();
    assert!(r.is_subsumed("A", "C").unwrap());
}

#[test]
fn property_chains_compose() {
    let mut r = reasoner(2);
    r.add_axioms(&[
        Axiom::SubObjectPropertyOf {
            sub: PropertyExpression::chain(["hasParent", "hasBrother"]),
            sup: "hasUncle".into(),
        },
        sub(class("A"), ClassExpression::some("hasParent", class("B"))),
        sub(class("B"), ClassExpression::some("hasBrother", class("C"))),
        sub(ClassExpression::some("hasUncle", class("C")), class("U")),
    ])
    .unwrap();
    assert!(r.is_subsumed("A", "U").unwrap());
    assert!(!r.is_subsumed("B", "U").unwrap());
}

#[test]
fn transitivity_reaches_distant_fillers() {
    let mut r = reasoner(2);
    r.add_axioms(&[
        Axiom::TransitiveObjectProperty("partOf".into()),
        sub(class("A"), ClassExpression::some("partOf", class("B"))),
        sub(class("B"), ClassExpression::some("partOf", class("C"))),
        sub(class("C"), ClassExpression::some("partOf", class("D"))),
        sub(ClassExpression::some("partOf", class("D")), class("InD")),
    ])
    .unwrap();
    assert!(r.is_subsumed("A", "InD").unwrap());
    assert!(r.is_subsumed("B", "InD").unwrap());
    assert!(!r.is_subsumed("D", "InD").unwrap());
}

#[test]
fn equivalent_classes_share_a_node() {
    let mut r = reasoner(2);
    r.add_axioms(&[
        Axiom::equivalent([class("Human"), class("Person")]),
        Axiom::sub_class_of("Person", "Agent"),
    ])
    .unwrap();
    let taxonomy = r.classify().unwrap();
    let node = taxonomy.node("Person").unwrap();
    assert_eq!(node.canonical(), "Human");
    assert_eq!(r.equivalent_classes("Person").unwrap(), set(&["Human", "Person"]));
    assert_eq!(r.super_classes("Human", true).unwrap(), set(&["Agent"]));
    assert_eq!(r.sub_classes("Agent", true).unwrap(), set(&["Human"]));
}

// ---------------------------------------------------------------------------
// Individuals
// ---------------------------------------------------------------------------

#[test]
fn individuals_are_realized() {
    let mut r = reasoner(2);
    r.add_axioms(&[
        Axiom::ClassAssertion {
            class: class("Dog"),
            individual: "rex".into(),
        },
        Axiom::sub_class_of("Dog", "Mammal"),
        Axiom::ObjectPropertyAssertion {
            property: "owns".into(),
            subject: "alice".into(),
            object: "rex".into(),
        },
        sub(ClassExpression::some("owns", class("Mammal")), class("PetOwner")),
    ])
    .unwrap();

    assert_eq!(r.types("rex", true).unwrap(), set(&["Dog"]));
    assert_eq!(r.types("rex", false).unwrap(), set(&["Dog", "Mammal", OWL_THING]));
    assert_eq!(r.types("alice", true).unwrap(), set(&["PetOwner"]));
    let instances = r.realize().unwrap();
    assert!(instances.direct_instances("Dog").unwrap().contains("rex"));
}

#[test]
fn clashing_assertions_make_the_ontology_inconsistent() {
    let mut r = reasoner(2);
    r.add_axioms(&[
        Axiom::disjoint(["Cat", "Dog"]),
        Axiom::ClassAssertion {
            class: class("Cat"),
            individual: "tom".into(),
        },
        Axiom::ClassAssertion {
            class: class("Dog"),
            individual: "tom".into(),
        },
        Axiom::sub_class_of("Cat", "Animal"),
    ])
    .unwrap();

    assert!(r.is_inconsistent().unwrap());
    assert!(!r.is_satisfiable("Animal").unwrap());
    let taxonomy = r.classify().unwrap();
    assert_eq!(taxonomy.len(), 1);
    assert!(taxonomy.is_bottom("Animal"));
    assert!(taxonomy.is_bottom(OWL_THING));

    r.remove_axiom(&Axiom::ClassAssertion {
        class: class("Dog"),
        individual: "tom".into(),
    })
    .unwrap();
    assert!(!r.is_inconsistent().unwrap());
    assert_eq!(r.types("tom", true).unwrap(), set(&["Cat"]));
}

// ---------------------------------------------------------------------------
// Properties of the procedure
// ---------------------------------------------------------------------------

#[test]
fn result_does_not_depend_on_worker_count() {
    let axioms = anatomy();
    let expected = classify_from_scratch(&axioms, 1);
    assert!(expected["Myocyte"].contains("CardiacCell"));
    assert!(expected["Cusp"].contains("HeartPart"));
    for workers in [2, 4, 8] {
        assert_eq!(classify_from_scratch(&axioms, workers), expected, "workers = {workers}");
    }
}

#[test]
fn result_does_not_depend_on_axiom_order() {
    let mut axioms = anatomy();
    let expected = classify_from_scratch(&axioms, 4);
    axioms.reverse();
    assert_eq!(classify_from_scratch(&axioms, 4), expected);
    axioms.rotate_left(17);
    assert_eq!(classify_from_scratch(&axioms, 4), expected);
}

#[test]
fn assert_then_retract_restores_the_taxonomy() {
    let axioms = anatomy();
    let mut r = reasoner(4);
    r.add_axioms(&axioms).unwrap();
    let before = hierarchy(&mut r);
    let contexts_before = r.saturation_state().context_count();

    let extra = [
        Axiom::sub_class_of("Valve", "Organ"),
        sub(class("Tissue3"), ClassExpression::some("locatedIn", class("Heart"))),
        Axiom::disjoint(["Cell", "Organ"]),
    ];
    r.add_axioms(&extra).unwrap();
    let during = hierarchy(&mut r);
    assert_ne!(during, before);

    for axiom in &extra {
        assert!(r.remove_axiom(axiom).unwrap());
    }
    assert_eq!(hierarchy(&mut r), before);
    assert!(r.saturation_state().context_count() >= contexts_before);
}

#[test]
fn repeated_retraction_is_a_no_op() {
    let mut r = reasoner(2);
    r.add_axioms(&[Axiom::sub_class_of("A", "B"), Axiom::sub_class_of("B", "C")])
        .unwrap();
    r.classify().unwrap();
    assert!(r.remove_axiom(&Axiom::sub_class_of("B", "C")).unwrap());
    assert!(!r.remove_axiom(&Axiom::sub_class_of("B", "C")).unwrap());
    let once = hierarchy(&mut r);
    assert!(!r.remove_axiom(&Axiom::sub_class_of("B", "C")).unwrap());
    assert_eq!(hierarchy(&mut r), once);
}

#[test]
fn duplicate_assertions_need_matching_retractions() {
    let mut r = reasoner(2);
    let axiom = Axiom::sub_class_of("A", "B");
    r.add_axiom(&axiom).unwrap();
    r.add_axiom(&axiom).unwrap();
    r.classify().unwrap();
    r.remove_axiom(&axiom).unwrap();
    assert!(r.is_subsumed("A", "B").unwrap());
    r.remove_axiom(&axiom).unwrap();
    assert!(!r.is_subsumed("A", "B").unwrap());
}

#[test]
fn conjunctions_are_indexed_once_regardless_of_order() {
    let mut r = reasoner(1);
    r.add_axiom(&sub(
        ClassExpression::and([class("A"), class("B"), class("C")]),
        class("D"),
    ))
    .unwrap();
    let len = r.index().len();

    r.add_axiom(&sub(
        ClassExpression::and([class("C"), ClassExpression::and([class("A"), class("B")])]),
        class("E"),
    ))
    .unwrap();
    assert_eq!(r.index().len(), len + 1);

    r.add_axiom(&sub(
        ClassExpression::and([class("B"), class("C"), class("A")]),
        class("F"),
    ))
    .unwrap();
    assert_eq!(r.index().len(), len + 2);
}

#[test]
fn direct_supers_are_minimal() {
    let mut r = reasoner(4);
    r.add_axioms(&anatomy()).unwrap();
    let taxonomy = r.classify().unwrap();
    for (id, node) in taxonomy.nodes() {
        let supers = node.direct_super_nodes();
        for &a in supers {
            let above_a = taxonomy.ancestors(a);
            for &b in supers {
                assert!(a == b || !above_a.contains(&b), "{} has a redundant super", node.canonical());
            }
        }
        if id != taxonomy.top() {
            assert!(!supers.is_empty(), "{} has no super", node.canonical());
        }
    }
}

#[test]
fn interrupted_classification_resumes() {
    let mut r = reasoner(4);
    r.add_axioms(&anatomy()).unwrap();
    let handle = r.interrupt_handle();
    handle.interrupt();
    let err = r.classify().unwrap_err();
    assert!(err.is_interrupted());
    assert!(!handle.is_interrupted());

    let resumed = hierarchy(&mut r);
    assert_eq!(resumed, classify_from_scratch(&anatomy(), 1));
}

/// Interrupts the reasoner once the `at`-th context has been created.
struct InterruptAt {
    created: AtomicUsize,
    at: usize,
    handle: InterruptHandle,
}

impl ContextCreationListener for InterruptAt {
    fn context_created(&self, _context: &Context) {
        if self.created.fetch_add(1, Ordering::SeqCst) + 1 == self.at {
            self.handle.interrupt();
        }
    }
}

#[test]
fn axiom_change_after_interrupted_saturation_keeps_pending_work() {
    let mut axioms = vec![
        Axiom::sub_class_of("A", "B"),
        Axiom::sub_class_of("B", "C"),
        Axiom::sub_class_of("C", "D"),
        Axiom::sub_class_of("D", "E"),
    ];
    let mut r = reasoner(2);
    r.add_axioms(&axioms).unwrap();

    let listener = Arc::new(InterruptAt {
        created: AtomicUsize::new(0),
        at: 3,
        handle: r.interrupt_handle(),
    });
    let id = r
        .saturation_state()
        .register_listener(Arc::clone(&listener) as Arc<dyn ContextCreationListener>);
    let err = r.classify().unwrap_err();
    assert!(err.is_interrupted());
    assert!(r.saturation_state().deregister_listener(id));
    assert!(r.saturation_state().has_active_contexts());

    let extra = Axiom::sub_class_of("X", "Y");
    r.add_axiom(&extra).unwrap();
    axioms.push(extra);
    assert_eq!(r.super_classes("A", true).unwrap(), set(&["B"]));
    assert_eq!(hierarchy(&mut r), classify_from_scratch(&axioms, 1));
}

#[test]
fn contexts_can_be_created_right_after_an_axiom_change() {
    let mut r = reasoner(2);
    r.add_axiom(&Axiom::sub_class_of("A", "B")).unwrap();
    r.classify().unwrap();

    r.add_axiom(&Axiom::sub_class_of("New", "A")).unwrap();
    let id = r.index().class_id("New").unwrap();
    let context = r.saturation_state().get_create_context(id);
    assert_eq!(context.root(), id);
    assert_eq!(r.super_classes("New", false).unwrap(), set(&["A", "B", OWL_THING]));
}

#[test]
fn satisfiability_returns_only_when_every_clash_is_gone() {
    for workers in [1, 4] {
        let via_disjointness = Axiom::sub_class_of("X", "B");
        let via_nothing = sub(class("X"), ClassExpression::Nothing);
        let mut r = reasoner(workers);
        r.add_axioms(&[
            Axiom::disjoint(["A", "B"]),
            Axiom::sub_class_of("X", "A"),
            via_disjointness.clone(),
            via_nothing.clone(),
            sub(class("Y"), ClassExpression::some("r", class("X"))),
        ])
        .unwrap();
        assert!(!r.is_satisfiable("X").unwrap());
        assert!(!r.is_satisfiable("Y").unwrap());

        r.remove_axiom(&via_disjointness).unwrap();
        assert!(!r.is_satisfiable("X").unwrap(), "workers = {workers}");
        assert!(!r.is_satisfiable("Y").unwrap(), "workers = {workers}");
        assert!(r.classify().unwrap().is_bottom("Y"));

        r.remove_axiom(&via_nothing).unwrap();
        assert!(r.is_satisfiable("X").unwrap(), "workers = {workers}");
        assert!(r.is_satisfiable("Y").unwrap(), "workers = {workers}");
        assert!(!r.classify().unwrap().is_bottom("Y"));
    }
}

#[test]
fn statistics_accumulate_across_runs() {
    let mut r = reasoner(2);
    r.add_axiom(&Axiom::sub_class_of("A", "B")).unwrap();
    r.classify().unwrap();
    let first = r.statistics().total_processed();
    assert!(first > 0);
    r.add_axiom(&Axiom::sub_class_of("B", "C")).unwrap();
    r.classify().unwrap();
    assert!(r.statistics().total_processed() > first);
}

#[test]
fn non_incremental_mode_matches_incremental() {
    let axioms = anatomy();
    let mut incremental = reasoner(2);
    let mut scratch = Reasoner::new(ReasonerConfig {
        incremental: false,
        ..ReasonerConfig::with_workers(2)
    })
    .unwrap();
    for r in [&mut incremental, &mut scratch] {
        r.add_axioms(&axioms).unwrap();
        r.classify().unwrap();
        r.remove_axiom(&Axiom::sub_class_of("Heart", "Organ")).unwrap();
        r.add_axiom(&Axiom::sub_class_of("Valve", "Organ")).unwrap();
    }
    assert_eq!(hierarchy(&mut incremental), hierarchy(&mut scratch));
}
