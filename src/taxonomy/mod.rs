//! Class and instance taxonomies extracted from saturated contexts.
//!
//! The direct super-classes of a class are the minimal elements of its atomic
//! subsumers under derived subsumption. Classes subsuming each other collapse
//! into one [`TaxonomyNode`], represented by the lexicographically smallest
//! IRI (`owl:Thing` and `owl:Nothing` always represent their nodes).
//! Unsatisfiable classes all land in the bottom node. When the ontology is
//! inconsistent every class is equivalent to `owl:Nothing`.

pub mod validate;

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use dashmap::DashMap;
use rayon::prelude::*;
use serde::Serialize;

use crate::index::{ExprId, OntologyIndex};
use crate::model::{OWL_NOTHING, OWL_THING};
use crate::saturation::SaturationState;

pub use validate::validate;

/// Index of a node within its [`Taxonomy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// One equivalence class of named classes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaxonomyNode {
    /// Canonical member first, the rest sorted.
    members: Vec<String>,
    direct_supers: Vec<NodeId>,
    direct_subs: Vec<NodeId>,
}

impl TaxonomyNode {
    pub fn canonical(&self) -> &str {
        &self.members[0]
    }

    pub fn members(&self) -> &[String] {
        &self.members
    }

    pub fn contains(&self, iri: &str) -> bool {
        self.members.iter().any(|m| m == iri)
    }

    pub fn direct_super_nodes(&self) -> &[NodeId] {
        &self.direct_supers
    }

    pub fn direct_sub_nodes(&self) -> &[NodeId] {
        &self.direct_subs
    }
}

/// The direct-subsumption DAG among named classes.
#[derive(Debug, Clone, Serialize)]
pub struct Taxonomy {
    nodes: Vec<TaxonomyNode>,
    #[serde(skip)]
    node_of: HashMap<String, NodeId>,
    top: NodeId,
    bottom: NodeId,
}

impl Taxonomy {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &TaxonomyNode)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    pub fn get(&self, id: NodeId) -> &TaxonomyNode {
        &self.nodes[id.0]
    }

    pub fn top(&self) -> NodeId {
        self.top
    }

    pub fn bottom(&self) -> NodeId {
        self.bottom
    }

    pub fn node_id(&self, iri: &str) -> Option<NodeId> {
        self.node_of.get(iri).copied()
    }

    pub fn node(&self, iri: &str) -> Option<&TaxonomyNode> {
        self.node_id(iri).map(|id| self.get(id))
    }

    /// Whether the class is unsatisfiable.
    pub fn is_bottom(&self, iri: &str) -> bool {
        self.node_id(iri) == Some(self.bottom)
    }

    /// Members of the class's node, the class itself included.
    pub fn equivalent_classes(&self, iri: &str) -> Option<BTreeSet<&str>> {
        self.node(iri)
            .map(|node| node.members.iter().map(String::as_str).collect())
    }

    /// Canonical names of the direct super nodes.
    pub fn direct_super_classes(&self, iri: &str) -> Option<BTreeSet<&str>> {
        self.node(iri).map(|node| self.canonicals(&node.direct_supers))
    }

    /// Canonical names of the direct sub nodes.
    pub fn direct_sub_classes(&self, iri: &str) -> Option<BTreeSet<&str>> {
        self.node(iri).map(|node| self.canonicals(&node.direct_subs))
    }

    /// Canonical names of every strict ancestor node.
    pub fn super_classes(&self, iri: &str) -> Option<BTreeSet<&str>> {
        let start = self.node_id(iri)?;
        Some(self.canonicals(&self.reachable(start, |n| &n.direct_supers)))
    }

    /// Canonical names of every strict descendant node.
    pub fn sub_classes(&self, iri: &str) -> Option<BTreeSet<&str>> {
        let start = self.node_id(iri)?;
        Some(self.canonicals(&self.reachable(start, |n| &n.direct_subs)))
    }

    /// Strict ancestors of a node.
    pub fn ancestors(&self, start: NodeId) -> Vec<NodeId> {
        self.reachable(start, |n| &n.direct_supers)
    }

    fn reachable(&self, start: NodeId, next: impl Fn(&TaxonomyNode) -> &[NodeId]) -> Vec<NodeId> {
        let mut visited = HashSet::from([start]);
        let mut queue = VecDeque::from([start]);
        let mut out = Vec::new();
        while let Some(current) = queue.pop_front() {
            for &n in next(&self.nodes[current.0]) {
                if visited.insert(n) {
                    out.push(n);
                    queue.push_back(n);
                }
            }
        }
        out
    }

    fn canonicals(&self, ids: &[NodeId]) -> BTreeSet<&str> {
        ids.iter().map(|id| self.nodes[id.0].canonical()).collect()
    }
}

// ---------------------------------------------------------------------------
// Class taxonomy
// ---------------------------------------------------------------------------

/// Snapshot of one class's saturated context.
#[derive(Debug, Clone)]
struct ClassSummary {
    satisfiable: bool,
    /// Atomic subsumers that are themselves indexed classes.
    supers: HashSet<ExprId>,
}

/// Result of the transitive reduction for one satisfiable class.
#[derive(Debug, Clone)]
struct ClassReduction {
    class: ExprId,
    equivalents: Vec<ExprId>,
    direct: Vec<ExprId>,
}

fn summarize(index: &OntologyIndex, state: &SaturationState, classes: &[ExprId]) -> DashMap<ExprId, ClassSummary> {
    let indexed: HashSet<ExprId> = classes.iter().copied().collect();
    let summaries = DashMap::with_capacity(classes.len());
    classes.par_iter().for_each(|&class| {
        let summary = match state.context(class) {
            Some(context) => {
                let derived = context.state();
                ClassSummary {
                    satisfiable: !derived.is_inconsistent(),
                    supers: derived
                        .subsumers()
                        .iter()
                        .copied()
                        .filter(|s| indexed.contains(s))
                        .collect(),
                }
            }
            None => ClassSummary {
                satisfiable: true,
                supers: HashSet::from([class, index.thing()]),
            },
        };
        summaries.insert(class, summary);
    });
    summaries
}

/// Minimal elements of `supers` (which contains `class`) under the order
/// given by `supers_of`.
fn reduce<'a>(
    class: ExprId,
    supers: &HashSet<ExprId>,
    supers_of: impl Fn(ExprId) -> Option<&'a HashSet<ExprId>>,
) -> (Vec<ExprId>, Vec<ExprId>) {
    let mut equivalents = vec![class];
    let mut strict = Vec::new();
    for &sup in supers {
        if sup == class {
            continue;
        }
        match supers_of(sup) {
            Some(of_sup) if of_sup.contains(&class) => equivalents.push(sup),
            _ => strict.push(sup),
        }
    }

    let direct = strict
        .iter()
        .copied()
        .filter(|&candidate| {
            !strict.iter().any(|&other| {
                other != candidate
                    && supers_of(other).is_some_and(|s| s.contains(&candidate))
                    && !supers_of(candidate).is_some_and(|s| s.contains(&other))
            })
        })
        .collect();
    equivalents.sort_unstable();
    (equivalents, direct)
}

/// Build the class taxonomy from saturated contexts.
pub fn build_class_taxonomy(index: &OntologyIndex, state: &SaturationState, inconsistent: bool) -> Taxonomy {
    let classes: Vec<ExprId> = index.classes().collect();
    let iri = |id: ExprId| index.iri(id).unwrap_or_default().to_string();

    if inconsistent {
        let mut members: Vec<String> = classes
            .iter()
            .copied()
            .filter(|&c| c != index.nothing())
            .map(iri)
            .collect();
        members.sort();
        members.insert(0, OWL_NOTHING.to_string());
        let node_of = members.iter().map(|m| (m.clone(), NodeId(0))).collect();
        tracing::info!(classes = classes.len(), "ontology inconsistent, collapsing taxonomy");
        return Taxonomy {
            nodes: vec![TaxonomyNode {
                members,
                direct_supers: Vec::new(),
                direct_subs: Vec::new(),
            }],
            node_of,
            top: NodeId(0),
            bottom: NodeId(0),
        };
    }

    let summaries = summarize(index, state, &classes);
    let reductions: Vec<ClassReduction> = classes
        .par_iter()
        .filter_map(|&class| {
            let summary = summaries.get(&class)?;
            if !summary.satisfiable {
                return None;
            }
            let supers_of = |id: ExprId| {
                summaries
                    .get(&id)
                    .map(|s| s.supers.clone())
            };
            // Owned snapshots keep DashMap guards short-lived.
            let owned: HashMap<ExprId, HashSet<ExprId>> = summary
                .supers
                .iter()
                .filter_map(|&s| supers_of(s).map(|set| (s, set)))
                .collect();
            let (equivalents, direct) = reduce(class, &summary.supers, |id| owned.get(&id));
            Some(ClassReduction {
                class,
                equivalents,
                direct,
            })
        })
        .collect();

    assemble(index, &classes, &summaries, reductions, iri)
}

fn assemble(
    index: &OntologyIndex,
    classes: &[ExprId],
    summaries: &DashMap<ExprId, ClassSummary>,
    reductions: Vec<ClassReduction>,
    iri: impl Fn(ExprId) -> String,
) -> Taxonomy {
    let mut nodes: Vec<TaxonomyNode> = Vec::new();
    let mut node_of_class: HashMap<ExprId, NodeId> = HashMap::new();
    let mut reduction_of_node: Vec<&ClassReduction> = Vec::new();

    let mut ordered: Vec<&ClassReduction> = reductions.iter().collect();
    ordered.sort_by_key(|r| r.class);
    for reduction in ordered {
        if node_of_class.contains_key(&reduction.class) {
            continue;
        }
        let id = NodeId(nodes.len());
        let mut members: Vec<String> = reduction.equivalents.iter().map(|&c| iri(c)).collect();
        members.sort();
        if let Some(pos) = members.iter().position(|m| m == OWL_THING) {
            members.remove(pos);
            members.insert(0, OWL_THING.to_string());
        }
        for &member in &reduction.equivalents {
            node_of_class.insert(member, id);
        }
        nodes.push(TaxonomyNode {
            members,
            direct_supers: Vec::new(),
            direct_subs: Vec::new(),
        });
        reduction_of_node.push(reduction);
    }

    let bottom = NodeId(nodes.len());
    let mut bottom_members: Vec<String> = classes
        .iter()
        .copied()
        .filter(|c| *c != index.nothing())
        .filter(|c| summaries.get(c).is_some_and(|s| !s.satisfiable))
        .map(&iri)
        .collect();
    bottom_members.sort();
    bottom_members.insert(0, OWL_NOTHING.to_string());
    nodes.push(TaxonomyNode {
        members: bottom_members,
        direct_supers: Vec::new(),
        direct_subs: Vec::new(),
    });

    let top = node_of_class.get(&index.thing()).copied().unwrap_or(bottom);

    for (i, reduction) in reduction_of_node.iter().enumerate() {
        let mut supers: Vec<NodeId> = reduction
            .direct
            .iter()
            .filter_map(|c| node_of_class.get(c).copied())
            .filter(|n| n.0 != i)
            .collect();
        supers.sort_unstable();
        supers.dedup();
        if supers.is_empty() && NodeId(i) != top && top != bottom {
            supers.push(top);
        }
        for &sup in &supers {
            nodes[sup.0].direct_subs.push(NodeId(i));
        }
        nodes[i].direct_supers = supers;
    }

    let leaves: Vec<NodeId> = (0..bottom.0)
        .filter(|&i| nodes[i].direct_subs.is_empty())
        .map(NodeId)
        .collect();
    for &leaf in &leaves {
        nodes[leaf.0].direct_subs.push(bottom);
    }
    nodes[bottom.0].direct_supers = leaves;
    for node in &mut nodes {
        node.direct_subs.sort_unstable();
    }

    let mut node_of = HashMap::new();
    for (i, node) in nodes.iter().enumerate() {
        for member in &node.members {
            node_of.insert(member.clone(), NodeId(i));
        }
    }

    tracing::debug!(nodes = nodes.len(), classes = classes.len(), "class taxonomy built");
    Taxonomy {
        nodes,
        node_of,
        top,
        bottom,
    }
}

// ---------------------------------------------------------------------------
// Instance taxonomy
// ---------------------------------------------------------------------------

/// Direct types of named individuals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstanceTaxonomy {
    /// Individual → canonical names of its direct type nodes.
    types: BTreeMap<String, BTreeSet<String>>,
    /// Canonical class name → individuals it directly types.
    instances: BTreeMap<String, BTreeSet<String>>,
}

impl InstanceTaxonomy {
    pub fn individuals(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    pub fn direct_types(&self, individual: &str) -> Option<&BTreeSet<String>> {
        self.types.get(individual)
    }

    /// Canonical names of all type nodes, direct or inherited.
    pub fn types(&self, individual: &str, taxonomy: &Taxonomy) -> Option<BTreeSet<String>> {
        let direct = self.types.get(individual)?;
        let mut all = direct.clone();
        for name in direct {
            if let Some(id) = taxonomy.node_id(name) {
                all.extend(
                    taxonomy
                        .ancestors(id)
                        .into_iter()
                        .map(|n| taxonomy.get(n).canonical().to_string()),
                );
            }
        }
        Some(all)
    }

    /// Individuals whose direct types include the class's node.
    pub fn direct_instances(&self, canonical: &str) -> Option<&BTreeSet<String>> {
        self.instances.get(canonical)
    }

    /// Individuals typed by the class's node or any node below it.
    pub fn instances(&self, class: &str, taxonomy: &Taxonomy) -> BTreeSet<String> {
        let Some(start) = taxonomy.node_id(class) else {
            return BTreeSet::new();
        };
        let mut below = vec![start];
        below.extend(taxonomy.reachable(start, |n| &n.direct_subs));
        below
            .into_iter()
            .filter_map(|n| self.instances.get(taxonomy.get(n).canonical()))
            .flatten()
            .cloned()
            .collect()
    }
}

/// Realize every indexed individual against the class taxonomy.
pub fn build_instance_taxonomy(
    index: &OntologyIndex,
    state: &SaturationState,
    taxonomy: &Taxonomy,
    inconsistent: bool,
) -> InstanceTaxonomy {
    let individuals: Vec<ExprId> = index.individuals().collect();

    let types: Vec<(String, BTreeSet<String>)> = individuals
        .par_iter()
        .map(|&individual| {
            let name = index.iri(individual).unwrap_or_default().to_string();
            if inconsistent {
                let bottom = taxonomy.get(taxonomy.bottom()).canonical().to_string();
                return (name, BTreeSet::from([bottom]));
            }
            let mut candidates: Vec<NodeId> = state
                .context(individual)
                .map(|context| {
                    context
                        .subsumers()
                        .into_iter()
                        .filter(|&s| index.is_class(s))
                        .filter_map(|s| index.iri(s).and_then(|iri| taxonomy.node_id(iri)))
                        .collect()
                })
                .unwrap_or_else(|| vec![taxonomy.top()]);
            candidates.sort_unstable();
            candidates.dedup();

            let ancestors: HashMap<NodeId, HashSet<NodeId>> = candidates
                .iter()
                .map(|&n| (n, taxonomy.ancestors(n).into_iter().collect()))
                .collect();
            let direct = candidates
                .iter()
                .filter(|&&n| {
                    !candidates
                        .iter()
                        .any(|&m| m != n && ancestors.get(&m).is_some_and(|a| a.contains(&n)))
                })
                .map(|&n| taxonomy.get(n).canonical().to_string())
                .collect();
            (name, direct)
        })
        .collect();

    let mut realization = InstanceTaxonomy::default();
    for (individual, direct) in types {
        for class in &direct {
            realization
                .instances
                .entry(class.clone())
                .or_default()
                .insert(individual.clone());
        }
        realization.types.insert(individual, direct);
    }
    tracing::debug!(individuals = realization.types.len(), "instance taxonomy built");
    realization
}
