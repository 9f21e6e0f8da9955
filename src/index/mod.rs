//! Ontology index: canonical, hash-consed class expression nodes.
//!
//! Every class expression reachable from an asserted axiom is interned into an
//! [`IndexedClassExpression`] addressed by an [`ExprId`]. Interning goes through
//! a cache keyed by the node's shape, whose children are already canonical ids,
//! so structurally identical expressions always share one node. N-ary
//! conjunctions are flattened, ordered by canonical structural hash and folded
//! into a left-deep binary tree.
//!
//! Asserting or retracting an axiom updates occurrence counters immediately and
//! records [`RuleDelta`]s in a pending [`AxiomChanges`]; rule chains themselves
//! only change in [`OntologyIndex::commit`], which the reasoner calls in a
//! sequential phase once incremental de-saturation is done with the old rules.

pub mod properties;
pub mod rules;

use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::error::{IndexingError, IndexingResult};
use crate::model::{Axiom, ClassExpression, DataRange, Entity, OWL_NOTHING, OWL_THING, PropertyExpression};

pub use properties::PropertyHierarchy;
pub use rules::{AxiomChanges, ChainableRule, RuleChain, RuleDelta, RuleKind};

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Identifier of an indexed class expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct ExprId(u32);

impl ExprId {
    pub(crate) fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u32 {
        self.0
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for ExprId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "expr:{}", self.0)
    }
}

/// Identifier of an indexed object property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct PropertyId(u32);

impl PropertyId {
    pub(crate) fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for PropertyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "prop:{}", self.0)
    }
}

/// Identifier of an indexed disjointness axiom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct AxiomId(u32);

impl AxiomId {
    pub(crate) fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

/// Value space of a datatype expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueSpace {
    Entire { datatype: String },
    Value { datatype: String, lexical: String },
    Length { datatype: String, min: Option<u32>, max: Option<u32> },
}

/// Shape of an indexed node. Children are canonical ids, so derived
/// equality is structural equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExprKind {
    Class(String),
    Conjunction { first: ExprId, second: ExprId },
    Existential { property: PropertyId, filler: ExprId },
    Datatype { property: String, value_space: ValueSpace },
    Nominal(String),
}

/// Occurrence polarity of a subexpression inside an axiom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Polarity {
    Positive,
    Negative,
}

/// Canonical node for one class expression shape.
#[derive(Debug, Clone)]
pub struct IndexedClassExpression {
    kind: ExprKind,
    hash: u64,
    occurrences: usize,
    negative_occurrences: usize,
    rules: RuleChain,
}

impl IndexedClassExpression {
    pub fn kind(&self) -> &ExprKind {
        &self.kind
    }

    /// Canonical structural hash.
    pub fn structural_hash(&self) -> u64 {
        self.hash
    }

    pub fn occurrences(&self) -> usize {
        self.occurrences
    }

    pub fn negative_occurrences(&self) -> usize {
        self.negative_occurrences
    }

    pub fn rules(&self) -> &RuleChain {
        &self.rules
    }
}

#[derive(Debug, Clone)]
struct DisjointnessAxiom {
    members: Vec<ExprId>,
    occurrences: usize,
}

/// Order conjunct `(hash, id)` pairs canonically.
///
/// Returns the first pair of distinct operands sharing a hash, which makes the
/// order ambiguous. Equal ids are duplicate conjuncts and are kept.
pub(crate) fn canonical_order(operands: &mut [(u64, ExprId)]) -> Result<(), (ExprId, ExprId, u64)> {
    operands.sort_unstable();
    for pair in operands.windows(2) {
        let ((h1, a), (h2, b)) = (pair[0], pair[1]);
        if h1 == h2 && a != b {
            return Err((a, b, h1));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// OntologyIndex
// ---------------------------------------------------------------------------

/// The canonical index of all asserted axioms.
pub struct OntologyIndex {
    nodes: Vec<IndexedClassExpression>,
    cache: HashMap<ExprKind, ExprId>,
    properties: Vec<String>,
    property_ids: HashMap<String, PropertyId>,
    told_sub_properties: Vec<(PropertyId, PropertyId)>,
    told_chains: Vec<(PropertyId, PropertyId, PropertyId)>,
    disjointness: Vec<DisjointnessAxiom>,
    disjointness_ids: HashMap<Vec<ExprId>, AxiomId>,
    axioms: HashMap<Axiom, usize>,
    pending: AxiomChanges,
    property_axioms_changed: bool,
    thing: ExprId,
    nothing: ExprId,
}

impl OntologyIndex {
    pub fn new() -> Self {
        let mut index = Self {
            nodes: Vec::new(),
            cache: HashMap::new(),
            properties: Vec::new(),
            property_ids: HashMap::new(),
            told_sub_properties: Vec::new(),
            told_chains: Vec::new(),
            disjointness: Vec::new(),
            disjointness_ids: HashMap::new(),
            axioms: HashMap::new(),
            pending: AxiomChanges::default(),
            property_axioms_changed: false,
            thing: ExprId::new(0),
            nothing: ExprId::new(1),
        };
        index.thing = index.intern_kind(ExprKind::Class(OWL_THING.to_string()));
        index.nothing = index.intern_kind(ExprKind::Class(OWL_NOTHING.to_string()));
        index
    }

    // -- queries ------------------------------------------------------------

    /// Number of nodes ever interned; valid ids are `0..len()`.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.axioms.is_empty()
    }

    pub fn thing(&self) -> ExprId {
        self.thing
    }

    pub fn nothing(&self) -> ExprId {
        self.nothing
    }

    pub fn node(&self, id: ExprId) -> &IndexedClassExpression {
        &self.nodes[id.index()]
    }

    pub fn kind(&self, id: ExprId) -> &ExprKind {
        &self.nodes[id.index()].kind
    }

    pub fn rules(&self, id: ExprId) -> &RuleChain {
        &self.nodes[id.index()].rules
    }

    /// Named classes currently occurring in some axiom, plus Thing and Nothing.
    pub fn classes(&self) -> impl Iterator<Item = ExprId> + '_ {
        self.nodes.iter().enumerate().filter_map(move |(i, node)| {
            let id = ExprId::new(i as u32);
            let indexed = node.occurrences > 0 || id == self.thing || id == self.nothing;
            (indexed && matches!(node.kind, ExprKind::Class(_))).then_some(id)
        })
    }

    /// Nominals of individuals currently occurring in some axiom.
    pub fn individuals(&self) -> impl Iterator<Item = ExprId> + '_ {
        self.nodes.iter().enumerate().filter_map(|(i, node)| {
            (node.occurrences > 0 && matches!(node.kind, ExprKind::Nominal(_)))
                .then_some(ExprId::new(i as u32))
        })
    }

    pub fn class_id(&self, iri: &str) -> Option<ExprId> {
        self.cache.get(&ExprKind::Class(iri.to_string())).copied()
    }

    pub fn individual_id(&self, iri: &str) -> Option<ExprId> {
        self.cache.get(&ExprKind::Nominal(iri.to_string())).copied()
    }

    pub fn is_class(&self, id: ExprId) -> bool {
        matches!(self.kind(id), ExprKind::Class(_))
    }

    /// IRI of a named class or individual node.
    pub fn iri(&self, id: ExprId) -> Option<&str> {
        match self.kind(id) {
            ExprKind::Class(iri) | ExprKind::Nominal(iri) => Some(iri),
            _ => None,
        }
    }

    pub fn property_iri(&self, property: PropertyId) -> &str {
        &self.properties[property.index()]
    }

    pub fn property_id(&self, iri: &str) -> Option<PropertyId> {
        self.property_ids.get(iri).copied()
    }

    pub fn property_count(&self) -> usize {
        self.properties.len()
    }

    pub fn told_sub_properties(&self) -> &[(PropertyId, PropertyId)] {
        &self.told_sub_properties
    }

    /// Binary chains `(left, right, super)` meaning `left ∘ right ⊑ super`.
    pub fn told_chains(&self) -> &[(PropertyId, PropertyId, PropertyId)] {
        &self.told_chains
    }

    pub fn disjointness_members(&self, axiom: AxiomId) -> &[ExprId] {
        &self.disjointness[axiom.index()].members
    }

    /// Whether the axiom is currently asserted.
    pub fn contains_axiom(&self, axiom: &Axiom) -> bool {
        self.axioms.contains_key(axiom)
    }

    pub fn axiom_count(&self) -> usize {
        self.axioms.len()
    }

    /// Rule contributions recorded since the last commit.
    pub fn pending(&self) -> &AxiomChanges {
        &self.pending
    }

    pub fn has_pending_changes(&self) -> bool {
        !self.pending.is_empty() || self.property_axioms_changed
    }

    /// Human-readable rendering of a node.
    pub fn display(&self, id: ExprId) -> String {
        match self.kind(id) {
            ExprKind::Class(iri) => iri.clone(),
            ExprKind::Conjunction { first, second } => {
                format!("({} ⊓ {})", self.display(*first), self.display(*second))
            }
            ExprKind::Existential { property, filler } => {
                format!("∃{}.{}", self.property_iri(*property), self.display(*filler))
            }
            ExprKind::Datatype { property, value_space } => match value_space {
                ValueSpace::Entire { datatype } => format!("∃{property}.{datatype}"),
                ValueSpace::Value { datatype, lexical } => {
                    format!("∃{property}.{{\"{lexical}\"^^{datatype}}}")
                }
                ValueSpace::Length { datatype, min, max } => {
                    format!("∃{property}.{datatype}[{min:?}..{max:?}]")
                }
            },
            ExprKind::Nominal(iri) => format!("{{{iri}}}"),
        }
    }

    // -- axiom changes ------------------------------------------------------

    /// Assert an axiom. Returns `false` if it was already asserted.
    ///
    /// On error nothing is committed: occurrence counters and pending rule
    /// changes are untouched.
    pub fn add_axiom(&mut self, axiom: &Axiom) -> IndexingResult<bool> {
        if let Some(count) = self.axioms.get_mut(axiom) {
            *count += 1;
            return Ok(false);
        }
        self.index_axiom(axiom, true)?;
        self.axioms.insert(axiom.clone(), 1);
        Ok(true)
    }

    /// Retract an axiom. Returns `false` if it was not asserted or is still
    /// asserted by an earlier duplicate addition.
    pub fn remove_axiom(&mut self, axiom: &Axiom) -> IndexingResult<bool> {
        match self.axioms.get_mut(axiom) {
            None => {
                tracing::warn!(axiom = axiom.kind_name(), "retracting an axiom that is not asserted");
                Ok(false)
            }
            Some(count) if *count > 1 => {
                *count -= 1;
                Ok(false)
            }
            Some(_) => {
                self.index_axiom(axiom, false)?;
                self.axioms.remove(axiom);
                Ok(true)
            }
        }
    }

    /// Attach added and detach removed rule contributions, returning them.
    pub fn commit(&mut self) -> AxiomChanges {
        let changes = std::mem::take(&mut self.pending);
        for delta in changes.added() {
            self.nodes[delta.premise().index()].rules.add(delta);
        }
        for delta in changes.removed() {
            self.nodes[delta.premise().index()].rules.remove(delta);
        }
        tracing::debug!(
            added = changes.added().len(),
            removed = changes.removed().len(),
            "committed rule changes"
        );
        changes
    }

    /// Whether property axioms changed since the flag was last taken.
    pub fn take_property_axioms_changed(&mut self) -> bool {
        std::mem::take(&mut self.property_axioms_changed)
    }

    fn index_axiom(&mut self, axiom: &Axiom, insert: bool) -> IndexingResult<()> {
        match axiom {
            Axiom::Declaration(Entity::Class(iri)) => {
                let id = self.intern_class(iri);
                self.count(id, Polarity::Positive, insert);
            }
            Axiom::Declaration(Entity::NamedIndividual(iri)) => {
                let id = self.intern_kind(ExprKind::Nominal(iri.clone()));
                self.count(id, Polarity::Positive, insert);
            }
            Axiom::Declaration(Entity::ObjectProperty(iri)) => {
                self.intern_property(iri);
            }
            Axiom::SubClassOf { sub, sup } => {
                let sub = self.intern(sub)?;
                let sup = self.intern(sup)?;
                self.index_subsumption(sub, sup, insert);
            }
            Axiom::EquivalentClasses(members) => {
                let ids = self.intern_all(members)?;
                if let Some((&first, rest)) = ids.split_first() {
                    for &other in rest {
                        self.index_subsumption(first, other, insert);
                        self.index_subsumption(other, first, insert);
                    }
                }
            }
            Axiom::DisjointClasses(members) => {
                let ids = self.intern_all(members)?;
                self.index_disjointness(ids, insert);
            }
            Axiom::ClassAssertion { class, individual } => {
                let class = self.intern(class)?;
                let nominal = self.intern_kind(ExprKind::Nominal(individual.clone()));
                self.index_subsumption(nominal, class, insert);
            }
            Axiom::ObjectPropertyAssertion {
                property,
                subject,
                object,
            } => {
                let subject = self.intern_kind(ExprKind::Nominal(subject.clone()));
                let object = self.intern_kind(ExprKind::Nominal(object.clone()));
                let property = self.intern_property(property);
                let existential = self.intern_kind(ExprKind::Existential {
                    property,
                    filler: object,
                });
                self.index_subsumption(subject, existential, insert);
            }
            Axiom::SubObjectPropertyOf { sub, sup } => {
                let sup = self.intern_property(sup);
                match sub {
                    PropertyExpression::Property(sub) => {
                        let sub = self.intern_property(sub);
                        self.record_sub_property(sub, sup, insert);
                    }
                    PropertyExpression::Chain(chain) => match chain.as_slice() {
                        [] => return Err(IndexingError::EmptyPropertyChain),
                        [single] => {
                            let sub = self.intern_property(single);
                            self.record_sub_property(sub, sup, insert);
                        }
                        _ => self.index_chain(chain, sup, insert),
                    },
                }
                self.property_axioms_changed = true;
            }
            Axiom::EquivalentObjectProperties(properties) => {
                let ids: Vec<PropertyId> = properties.iter().map(|p| self.intern_property(p)).collect();
                if let Some((&first, rest)) = ids.split_first() {
                    for &other in rest {
                        self.record_sub_property(first, other, insert);
                        self.record_sub_property(other, first, insert);
                    }
                }
                self.property_axioms_changed = true;
            }
            Axiom::TransitiveObjectProperty(property) => {
                let id = self.intern_property(property);
                self.record_chain(id, id, id, insert);
                self.property_axioms_changed = true;
            }
        }
        Ok(())
    }

    fn index_subsumption(&mut self, sub: ExprId, sup: ExprId, insert: bool) {
        self.count(sub, Polarity::Negative, insert);
        self.count(sup, Polarity::Positive, insert);
        self.record(insert, RuleDelta::ToldSuper { sub, sup });
    }

    fn index_disjointness(&mut self, mut members: Vec<ExprId>, insert: bool) {
        members.sort_unstable();
        for &member in &members {
            self.count(member, Polarity::Negative, insert);
        }
        let axiom = match self.disjointness_ids.get(&members) {
            Some(&axiom) => axiom,
            None if insert => {
                let axiom = AxiomId::new(self.disjointness.len() as u32);
                self.disjointness.push(DisjointnessAxiom {
                    members: members.clone(),
                    occurrences: 0,
                });
                self.disjointness_ids.insert(members.clone(), axiom);
                axiom
            }
            None => return,
        };

        let entry = &mut self.disjointness[axiom.index()];
        let transition = if insert {
            entry.occurrences += 1;
            entry.occurrences == 1
        } else {
            entry.occurrences = entry.occurrences.saturating_sub(1);
            entry.occurrences == 0
        };
        if !transition {
            return;
        }

        // A class listed twice is disjoint with itself.
        let mut i = 0;
        while i < members.len() {
            let member = members[i];
            let mut j = i + 1;
            while j < members.len() && members[j] == member {
                j += 1;
            }
            let delta = if j - i > 1 {
                RuleDelta::ToldSuper {
                    sub: member,
                    sup: self.nothing,
                }
            } else {
                RuleDelta::Disjointness { member, axiom }
            };
            self.record(insert, delta);
            i = j;
        }
    }

    /// Binarize `r1 ∘ r2 ∘ … ∘ rn ⊑ sup` with auxiliary suffix properties.
    fn index_chain(&mut self, chain: &[String], sup: PropertyId, insert: bool) {
        let ids: Vec<PropertyId> = chain.iter().map(|p| self.intern_property(p)).collect();
        let last = ids.len() - 1;
        let mut right = ids[last];
        let mut right_name = chain[last].clone();
        for i in (1..last).rev() {
            let name = format!("{}∘{}", chain[i], right_name);
            let aux = self.intern_property(&name);
            self.record_chain(ids[i], right, aux, insert);
            right = aux;
            right_name = name;
        }
        self.record_chain(ids[0], right, sup, insert);
    }

    fn record_sub_property(&mut self, sub: PropertyId, sup: PropertyId, insert: bool) {
        if insert {
            self.told_sub_properties.push((sub, sup));
        } else if let Some(pos) = self.told_sub_properties.iter().position(|e| *e == (sub, sup)) {
            self.told_sub_properties.swap_remove(pos);
        }
    }

    fn record_chain(&mut self, left: PropertyId, right: PropertyId, sup: PropertyId, insert: bool) {
        let chain = (left, right, sup);
        if insert {
            self.told_chains.push(chain);
        } else if let Some(pos) = self.told_chains.iter().position(|c| *c == chain) {
            self.told_chains.swap_remove(pos);
        }
    }

    fn record(&mut self, insert: bool, delta: RuleDelta) {
        if insert {
            self.pending.record_addition(delta);
        } else {
            self.pending.record_removal(delta);
        }
    }

    /// Update occurrence counters of a node and its subexpressions. Rules of
    /// negatively occurring conjunctions and existentials are attached on the
    /// 0→1 transition and detached on 1→0.
    fn count(&mut self, id: ExprId, polarity: Polarity, insert: bool) {
        let node = &mut self.nodes[id.index()];
        if insert {
            node.occurrences += 1;
        } else {
            node.occurrences = node.occurrences.saturating_sub(1);
        }
        let transition = match polarity {
            Polarity::Positive => false,
            Polarity::Negative if insert => {
                node.negative_occurrences += 1;
                node.negative_occurrences == 1
            }
            Polarity::Negative => {
                node.negative_occurrences = node.negative_occurrences.saturating_sub(1);
                node.negative_occurrences == 0
            }
        };

        match self.nodes[id.index()].kind {
            ExprKind::Conjunction { first, second } => {
                if transition {
                    self.record(
                        insert,
                        RuleDelta::ConjunctionComposition {
                            conjunct: first,
                            other: second,
                            conjunction: id,
                        },
                    );
                    if first != second {
                        self.record(
                            insert,
                            RuleDelta::ConjunctionComposition {
                                conjunct: second,
                                other: first,
                                conjunction: id,
                            },
                        );
                    }
                }
                self.count(first, polarity, insert);
                self.count(second, polarity, insert);
            }
            ExprKind::Existential { property, filler } => {
                if transition {
                    self.record(
                        insert,
                        RuleDelta::ExistentialPropagation {
                            filler,
                            property,
                            existential: id,
                        },
                    );
                }
                self.count(filler, polarity, insert);
            }
            _ => {}
        }
    }

    // -- interning ----------------------------------------------------------

    fn intern_all(&mut self, expressions: &[ClassExpression]) -> IndexingResult<Vec<ExprId>> {
        expressions.iter().map(|e| self.intern(e)).collect()
    }

    /// Intern a class expression, returning its canonical node.
    pub(crate) fn intern(&mut self, expression: &ClassExpression) -> IndexingResult<ExprId> {
        match expression {
            ClassExpression::Class(iri) => Ok(self.intern_class(iri)),
            ClassExpression::Thing => Ok(self.thing),
            ClassExpression::Nothing => Ok(self.nothing),
            ClassExpression::IntersectionOf(operands) => self.intern_conjunction(operands),
            ClassExpression::SomeValuesFrom { property, filler } => {
                let filler = self.intern(filler)?;
                let property = self.intern_property(property);
                Ok(self.intern_kind(ExprKind::Existential { property, filler }))
            }
            ClassExpression::HasValue {
                property,
                individual,
            } => {
                let filler = self.intern_kind(ExprKind::Nominal(individual.clone()));
                let property = self.intern_property(property);
                Ok(self.intern_kind(ExprKind::Existential { property, filler }))
            }
            ClassExpression::OneOf(individual) => {
                Ok(self.intern_kind(ExprKind::Nominal(individual.clone())))
            }
            ClassExpression::DataHasValue { property, literal } => {
                Ok(self.intern_kind(ExprKind::Datatype {
                    property: property.clone(),
                    value_space: ValueSpace::Value {
                        datatype: literal.datatype.clone(),
                        lexical: literal.lexical.clone(),
                    },
                }))
            }
            ClassExpression::DataSomeValuesFrom { property, range } => {
                let value_space = match range {
                    DataRange::Datatype(datatype) => ValueSpace::Entire {
                        datatype: datatype.clone(),
                    },
                    DataRange::LengthRestriction {
                        datatype,
                        min_length,
                        max_length,
                    } => ValueSpace::Length {
                        datatype: datatype.clone(),
                        min: *min_length,
                        max: *max_length,
                    },
                };
                Ok(self.intern_kind(ExprKind::Datatype {
                    property: property.clone(),
                    value_space,
                }))
            }
        }
    }

    fn intern_class(&mut self, iri: &str) -> ExprId {
        self.intern_kind(ExprKind::Class(iri.to_string()))
    }

    fn intern_conjunction(&mut self, operands: &[ClassExpression]) -> IndexingResult<ExprId> {
        let mut leaves = Vec::new();
        flatten_intersection(operands, &mut leaves);
        if leaves.is_empty() {
            return Err(IndexingError::EmptyIntersection);
        }

        let mut conjuncts = Vec::with_capacity(leaves.len());
        for leaf in leaves {
            let id = self.intern(leaf)?;
            conjuncts.push((self.nodes[id.index()].hash, id));
        }
        canonical_order(&mut conjuncts).map_err(|(a, b, hash)| IndexingError::HashCollision {
            first: self.display(a),
            second: self.display(b),
            hash,
        })?;

        let mut acc = conjuncts[0].1;
        for &(_, next) in &conjuncts[1..] {
            acc = self.intern_kind(ExprKind::Conjunction {
                first: acc,
                second: next,
            });
        }
        Ok(acc)
    }

    fn intern_property(&mut self, iri: &str) -> PropertyId {
        if let Some(&id) = self.property_ids.get(iri) {
            return id;
        }
        let id = PropertyId::new(self.properties.len() as u32);
        self.properties.push(iri.to_string());
        self.property_ids.insert(iri.to_string(), id);
        id
    }

    fn intern_kind(&mut self, kind: ExprKind) -> ExprId {
        if let Some(&id) = self.cache.get(&kind) {
            return id;
        }
        let id = ExprId::new(self.nodes.len() as u32);
        let hash = self.structural_hash(&kind);
        self.nodes.push(IndexedClassExpression {
            kind: kind.clone(),
            hash,
            occurrences: 0,
            negative_occurrences: 0,
            rules: RuleChain::default(),
        });
        self.cache.insert(kind, id);
        id
    }

    fn structural_hash(&self, kind: &ExprKind) -> u64 {
        let mut hasher = DefaultHasher::new();
        match kind {
            ExprKind::Class(iri) => {
                0u8.hash(&mut hasher);
                iri.hash(&mut hasher);
            }
            ExprKind::Conjunction { first, second } => {
                1u8.hash(&mut hasher);
                self.nodes[first.index()].hash.hash(&mut hasher);
                self.nodes[second.index()].hash.hash(&mut hasher);
            }
            ExprKind::Existential { property, filler } => {
                2u8.hash(&mut hasher);
                self.properties[property.index()].hash(&mut hasher);
                self.nodes[filler.index()].hash.hash(&mut hasher);
            }
            ExprKind::Datatype {
                property,
                value_space,
            } => {
                3u8.hash(&mut hasher);
                property.hash(&mut hasher);
                value_space.hash(&mut hasher);
            }
            ExprKind::Nominal(iri) => {
                4u8.hash(&mut hasher);
                iri.hash(&mut hasher);
            }
        }
        hasher.finish()
    }
}

impl Default for OntologyIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for OntologyIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OntologyIndex")
            .field("nodes", &self.nodes.len())
            .field("properties", &self.properties.len())
            .field("axioms", &self.axioms.len())
            .field("pending", &self.pending)
            .finish()
    }
}

fn flatten_intersection<'a>(operands: &'a [ClassExpression], out: &mut Vec<&'a ClassExpression>) {
    for operand in operands {
        match operand {
            ClassExpression::IntersectionOf(inner) => flatten_intersection(inner, out),
            other => out.push(other),
        }
    }
}
