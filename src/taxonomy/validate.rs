//! Structural checks of a class taxonomy against the index it was built from.

use std::collections::HashMap;

use petgraph::algo::{has_path_connecting, toposort};
use petgraph::graph::{DiGraph, NodeIndex};

use super::{NodeId, Taxonomy};
use crate::error::{TaxonomyError, TaxonomyResult};
use crate::index::OntologyIndex;

/// Check that the taxonomy is a well-formed transitive reduction covering
/// every indexed class exactly once.
pub fn validate(taxonomy: &Taxonomy, index: &OntologyIndex) -> TaxonomyResult<()> {
    check_membership(taxonomy, index)?;
    check_links(taxonomy)?;
    check_reduction(taxonomy)?;
    tracing::debug!(nodes = taxonomy.len(), "taxonomy validated");
    Ok(())
}

fn check_reduction(taxonomy: &Taxonomy) -> TaxonomyResult<()> {
    // Edges point from a node to its direct super-nodes.
    let mut graph: DiGraph<NodeId, ()> = DiGraph::with_capacity(taxonomy.len(), 0);
    let handles: Vec<NodeIndex> = taxonomy.nodes().map(|(id, _)| graph.add_node(id)).collect();
    for (id, node) in taxonomy.nodes() {
        for sup in node.direct_super_nodes() {
            graph.add_edge(handles[id.index()], handles[sup.index()], ());
        }
    }

    toposort(&graph, None).map_err(|cycle| TaxonomyError::Cycle {
        node: taxonomy.get(graph[cycle.node_id()]).canonical().to_string(),
    })?;

    for (id, node) in taxonomy.nodes() {
        let supers = node.direct_super_nodes();
        for &via in supers {
            for &redundant in supers.iter().filter(|s| **s != via) {
                if has_path_connecting(&graph, handles[via.index()], handles[redundant.index()], None) {
                    return Err(TaxonomyError::RedundantEdge {
                        sub: taxonomy.get(id).canonical().to_string(),
                        redundant: taxonomy.get(redundant).canonical().to_string(),
                        via: taxonomy.get(via).canonical().to_string(),
                    });
                }
            }
        }
    }
    Ok(())
}

fn check_membership(taxonomy: &Taxonomy, index: &OntologyIndex) -> TaxonomyResult<()> {
    let mut owner: HashMap<&str, NodeId> = HashMap::new();
    for (id, node) in taxonomy.nodes() {
        for member in node.members() {
            if owner.insert(member, id).is_some() {
                return Err(TaxonomyError::DuplicateMember {
                    class: member.clone(),
                });
            }
        }
    }
    if let Some((member, _)) = owner.iter().find(|(m, id)| taxonomy.node_id(m) != Some(**id)) {
        return Err(TaxonomyError::IndexMismatch {
            class: member.to_string(),
        });
    }

    for class in index.classes() {
        let iri = index.iri(class).unwrap_or_default();
        if !owner.contains_key(iri) {
            return Err(TaxonomyError::MissingClass {
                class: iri.to_string(),
            });
        }
    }
    Ok(())
}

fn check_links(taxonomy: &Taxonomy) -> TaxonomyResult<()> {
    let mismatch = |a: NodeId, b: NodeId| TaxonomyError::LinkMismatch {
        node: taxonomy.get(a).canonical().to_string(),
        other: taxonomy.get(b).canonical().to_string(),
    };
    for (id, node) in taxonomy.nodes() {
        for &sup in node.direct_super_nodes() {
            if !taxonomy.get(sup).direct_sub_nodes().contains(&id) {
                return Err(mismatch(id, sup));
            }
        }
        for &sub in node.direct_sub_nodes() {
            if !taxonomy.get(sub).direct_super_nodes().contains(&id) {
                return Err(mismatch(id, sub));
            }
        }
    }
    Ok(())
}
