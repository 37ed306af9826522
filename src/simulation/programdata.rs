use std::sync::Arc;

use petgraph::graph::DiGraph;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::{
    channel::{channel_spec::ChannelSpec, ChannelID},
    context::Context,
    datastructures::{Identifier, VerboseIdentifier},
};

use super::InitializationError;

#[derive(Default)]
pub(super) struct ProgramData<'a> {
    pub(super) nodes: Vec<Box<dyn Context + 'a>>,
    pub(super) externals: Vec<VerboseIdentifier>,
    pub(super) edges: Vec<Arc<ChannelSpec>>,
}

impl ProgramData<'_> {
    pub(super) fn node_identifiers(&self) -> FxHashMap<Identifier, String> {
        self.nodes
            .iter()
            .map(|node| (node.id(), node.name()))
            .chain(
                self.externals
                    .iter()
                    .map(|external| (external.id, external.name.clone())),
            )
            .collect()
    }

    pub(super) fn check(&self) -> Result<(), InitializationError> {
        // Make sure that all edges have registered endpoints.
        for edge in &self.edges {
            if edge.sender_ids().is_empty() {
                return Err(InitializationError::DisconnectedSender(edge.id()));
            }
            if edge.receiver_id().is_none() {
                return Err(InitializationError::DisconnectedReceiver(edge.id()));
            }
        }

        let all_node_ids = self.node_identifiers();
        // check that all of our edge targets are in the nodes
        for edge in &self.edges {
            for id in edge.sender_ids().iter().chain(edge.receiver_id().iter()) {
                if !all_node_ids.contains_key(id) {
                    return Err(InitializationError::UnregisteredNode(*id));
                }
            }
        }

        Ok(())
    }

    pub(super) fn check_acyclic(&self) -> Result<(), InitializationError> {
        let externals: FxHashSet<Identifier> =
            self.externals.iter().map(|external| external.id).collect();

        let mut graph = DiGraph::<Identifier, ChannelID>::new();
        let mut node_map = FxHashMap::default();
        for node in &self.nodes {
            let id = node.id();
            node_map.insert(id, graph.add_node(id));
        }

        for edge in &self.edges {
            let Some(dst) = edge.receiver_id() else {
                continue;
            };
            if externals.contains(&dst) {
                continue;
            }
            for src in edge.sender_ids() {
                if externals.contains(&src) {
                    continue;
                }
                if let (Some(src_node), Some(dst_node)) = (node_map.get(&src), node_map.get(&dst)) {
                    graph.add_edge(*src_node, *dst_node, edge.id());
                }
            }
        }

        if let Err(cycle) = petgraph::algo::toposort(&graph, None) {
            let id = graph[cycle.node_id()];
            let name = self
                .node_identifiers()
                .get(&id)
                .cloned()
                .unwrap_or_default();
            return Err(InitializationError::Cycle(VerboseIdentifier { id, name }));
        }
        Ok(())
    }
}
