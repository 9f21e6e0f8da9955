//! Object property hierarchy and chain compositions.
//!
//! Precomputed from the told `SubObjectPropertyOf` edges and binary chains of
//! the index before saturation. For property R, `sub_properties(R)` is the
//! reflexive-transitive closure of the told sub-property relation below R.
//! For a told chain `L ∘ R ⊑ V`, every pair `(L', R')` with `L' ⊑* L` and
//! `R' ⊑* R` composes to `V`; transitivity of R is the chain `R ∘ R ⊑ R`.

use std::collections::{HashMap, HashSet, VecDeque};

use super::{OntologyIndex, PropertyId};

/// Cached role hierarchy used by the saturation rules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyHierarchy {
    /// Reflexive-transitive sub-properties, indexed by property.
    sub_properties: Vec<Vec<PropertyId>>,
    /// Reflexive-transitive super-properties, indexed by property.
    super_properties: Vec<Vec<PropertyId>>,
    /// `(left, right)` → properties the composition implies.
    compositions: HashMap<(PropertyId, PropertyId), Vec<PropertyId>>,
    /// Properties occurring as the right operand of some composition.
    right_composable: HashSet<PropertyId>,
}

impl PropertyHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute the closure over every property the index knows.
    pub fn build(index: &OntologyIndex) -> Self {
        let count = index.property_count();
        let mut children_of: Vec<Vec<PropertyId>> = vec![Vec::new(); count];
        let mut parents_of: Vec<Vec<PropertyId>> = vec![Vec::new(); count];
        for &(sub, sup) in index.told_sub_properties() {
            children_of[sup.index()].push(sub);
            parents_of[sub.index()].push(sup);
        }

        let sub_properties = (0..count)
            .map(|i| reflexive_closure(PropertyId::new(i as u32), &children_of))
            .collect::<Vec<_>>();
        let super_properties = (0..count)
            .map(|i| reflexive_closure(PropertyId::new(i as u32), &parents_of))
            .collect::<Vec<_>>();

        let mut compositions: HashMap<(PropertyId, PropertyId), Vec<PropertyId>> = HashMap::new();
        let mut right_composable = HashSet::new();
        for &(left, right, sup) in index.told_chains() {
            for &l in &sub_properties[left.index()] {
                for &r in &sub_properties[right.index()] {
                    let implied = compositions.entry((l, r)).or_default();
                    if !implied.contains(&sup) {
                        implied.push(sup);
                    }
                    right_composable.insert(r);
                }
            }
        }

        tracing::debug!(
            properties = count,
            compositions = compositions.len(),
            "built property hierarchy"
        );

        Self {
            sub_properties,
            super_properties,
            compositions,
            right_composable,
        }
    }

    /// Number of properties covered.
    pub fn len(&self) -> usize {
        self.sub_properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sub_properties.is_empty()
    }

    /// All properties S with `S ⊑* property`, including `property` itself.
    pub fn sub_properties(&self, property: PropertyId) -> &[PropertyId] {
        self.sub_properties
            .get(property.index())
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// All properties S with `property ⊑* S`, including `property` itself.
    pub fn super_properties(&self, property: PropertyId) -> &[PropertyId] {
        self.super_properties
            .get(property.index())
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Properties implied by `left ∘ right`.
    pub fn compositions(&self, left: PropertyId, right: PropertyId) -> &[PropertyId] {
        self.compositions
            .get(&(left, right))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Whether the property can be the right operand of a composition, in
    /// which case backward links over it also need forward links.
    pub fn is_right_composable(&self, property: PropertyId) -> bool {
        self.right_composable.contains(&property)
    }

    pub fn is_sub_property_of(&self, sub: PropertyId, sup: PropertyId) -> bool {
        self.sub_properties(sup).contains(&sub)
    }
}

/// BFS over `edges` from `start`, returning `start` followed by everything reachable.
fn reflexive_closure(start: PropertyId, edges: &[Vec<PropertyId>]) -> Vec<PropertyId> {
    let mut reached = vec![start];
    let mut visited = HashSet::from([start]);
    let mut queue = VecDeque::from([start]);
    while let Some(current) = queue.pop_front() {
        for &next in &edges[current.index()] {
            if visited.insert(next) {
                reached.push(next);
                queue.push_back(next);
            }
        }
    }
    reached
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Axiom, PropertyExpression};

    fn sub_property(index: &mut OntologyIndex, sub: &str, sup: &str) {
        index
            .add_axiom(&Axiom::SubObjectPropertyOf {
                sub: PropertyExpression::named(sub),
                sup: sup.into(),
            })
            .unwrap();
    }

    #[test]
    fn closure_is_reflexive_and_transitive() {
        let mut index = OntologyIndex::new();
        sub_property(&mut index, "hasMother", "hasParent");
        sub_property(&mut index, "hasParent", "hasAncestor");
        let hierarchy = PropertyHierarchy::build(&index);

        let mother = index.property_id("hasMother").unwrap();
        let ancestor = index.property_id("hasAncestor").unwrap();
        assert!(hierarchy.is_sub_property_of(mother, ancestor));
        assert!(hierarchy.is_sub_property_of(ancestor, ancestor));
        assert!(!hierarchy.is_sub_property_of(ancestor, mother));
        assert_eq!(hierarchy.super_properties(mother).len(), 3);
    }

    #[test]
    fn cycles_terminate() {
        let mut index = OntologyIndex::new();
        sub_property(&mut index, "r", "s");
        sub_property(&mut index, "s", "r");
        let hierarchy = PropertyHierarchy::build(&index);
        let r = index.property_id("r").unwrap();
        let s = index.property_id("s").unwrap();
        assert!(hierarchy.is_sub_property_of(r, s));
        assert!(hierarchy.is_sub_property_of(s, r));
        assert_eq!(hierarchy.sub_properties(r).len(), 2);
    }

    #[test]
    fn compositions_cover_sub_properties() {
        let mut index = OntologyIndex::new();
        index
            .add_axiom(&Axiom::TransitiveObjectProperty("partOf".into()))
            .unwrap();
        sub_property(&mut index, "directlyPartOf", "partOf");
        let hierarchy = PropertyHierarchy::build(&index);

        let part_of = index.property_id("partOf").unwrap();
        let direct = index.property_id("directlyPartOf").unwrap();
        assert_eq!(hierarchy.compositions(direct, direct), &[part_of]);
        assert_eq!(hierarchy.compositions(part_of, direct), &[part_of]);
        assert!(hierarchy.is_right_composable(direct));
        assert!(hierarchy.compositions(part_of, PropertyId::new(99)).is_empty());
    }
}
