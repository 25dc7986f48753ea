use {
    super::{BuilderGraph, EdgeKind, NodeKind},
    std::collections::{HashMap, HashSet, VecDeque},
    thiserror::Error,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("cycle detected through edge {edge_source} -> {target}")]
    Cycle { edge_source: String, target: String },

    #[error("edge references unknown node '{node_id}'")]
    UnknownNode { node_id: String },

    #[error("node '{node_id}': required input '{port}' has no edge or wallet default")]
    UnsatisfiedInput { node_id: String, port: String },

    #[error("node '{node_id}': payload is missing field '{field}'")]
    MissingField { node_id: String, field: String },

    #[error("graph has {count} execute-config nodes; at most one is allowed")]
    MultipleExecuteConfigs { count: usize },

    #[error("horizontal group anchored at '{anchor}' has no vertical connection")]
    DanglingHorizontalGroup { anchor: String },
}

impl GraphError {
    pub fn node_id(&self) -> Option<&str> {
        match self {
            GraphError::Cycle { edge_source, .. } => Some(edge_source),
            GraphError::UnknownNode { node_id } => Some(node_id),
            GraphError::UnsatisfiedInput { node_id, .. } => Some(node_id),
            GraphError::MissingField { node_id, .. } => Some(node_id),
            GraphError::MultipleExecuteConfigs { .. } => None,
            GraphError::DanglingHorizontalGroup { anchor } => Some(anchor),
        }
    }
}

/// Checks the structural invariants: acyclicity, input satisfaction,
/// execute-config cardinality, and horizontal-group anchoring. An empty
/// list means the graph is compilable.
pub fn validate(graph: &BuilderGraph) -> Vec<GraphError> {
    let mut errors = Vec::new();

    for edge in graph.edges() {
        for endpoint in [&edge.source, &edge.target] {
            if graph.node(endpoint).is_none() {
                errors.push(GraphError::UnknownNode {
                    node_id: endpoint.clone(),
                });
            }
        }
    }
    if !errors.is_empty() {
        // Structural checks below assume every endpoint resolves.
        return errors;
    }

    errors.extend(find_cycle(graph));
    errors.extend(check_inputs(graph));
    errors.extend(check_execute_configs(graph));
    errors.extend(check_horizontal_groups(graph));
    errors
}

/// Kahn pass; when fewer than |V| nodes drain, some edge inside the
/// remainder closes a cycle, and that edge is reported.
fn find_cycle(graph: &BuilderGraph) -> Option<GraphError> {
    let mut in_degree: HashMap<&str, usize> = graph
        .nodes()
        .iter()
        .map(|node| (node.id.as_str(), 0))
        .collect();
    for edge in graph.edges() {
        *in_degree.get_mut(edge.target.as_str()).unwrap() += 1;
    }

    let mut queue: VecDeque<&str> = graph
        .nodes()
        .iter()
        .filter(|node| in_degree[node.id.as_str()] == 0)
        .map(|node| node.id.as_str())
        .collect();
    let mut drained = 0usize;
    while let Some(id) = queue.pop_front() {
        drained += 1;
        for edge in graph.outgoing(id) {
            let degree = in_degree.get_mut(edge.target.as_str()).unwrap();
            *degree -= 1;
            if *degree == 0 {
                queue.push_back(edge.target.as_str());
            }
        }
    }
    if drained == graph.nodes().len() {
        return None;
    }

    // Surface a concrete offending edge, not just "cycle detected".
    let stuck: HashSet<&str> = in_degree
        .iter()
        .filter(|(_, degree)| **degree > 0)
        .map(|(id, _)| *id)
        .collect();
    graph
        .edges()
        .iter()
        .find(|edge| stuck.contains(edge.source.as_str()) && stuck.contains(edge.target.as_str()))
        .map(|edge| GraphError::Cycle {
            edge_source: edge.source.clone(),
            target: edge.target.clone(),
        })
}

fn check_inputs(graph: &BuilderGraph) -> Vec<GraphError> {
    let mut errors = Vec::new();
    for node in graph.nodes() {
        let incoming: HashSet<&str> = graph
            .incoming(&node.id)
            .map(|edge| edge.target_port.as_str())
            .collect();
        for spec in node.kind.input_ports() {
            if !spec.required {
                continue;
            }
            if !incoming.contains(spec.name) && !node.defaults_from_wallet(spec.name) {
                errors.push(GraphError::UnsatisfiedInput {
                    node_id: node.id.clone(),
                    port: spec.name.to_string(),
                });
            }
        }
        // Field presence only; a present-but-blank value downgrades the
        // node to a no-op at compile time instead.
        for field in node.kind.payload_fields() {
            if node.data.get(field).is_none() {
                errors.push(GraphError::MissingField {
                    node_id: node.id.clone(),
                    field: field.to_string(),
                });
            }
        }
    }
    errors
}

fn check_execute_configs(graph: &BuilderGraph) -> Option<GraphError> {
    let count = graph
        .nodes()
        .iter()
        .filter(|node| node.kind == NodeKind::ExecuteConfig)
        .count();
    (count > 1).then_some(GraphError::MultipleExecuteConfigs { count })
}

/// Horizontal edges form disjoint connected groups. Each group's anchor
/// (its earliest-inserted member) must either carry a vertical connection
/// or be fully satisfiable from wallet defaults; otherwise the group has no
/// way to receive its upstream values.
fn check_horizontal_groups(graph: &BuilderGraph) -> Vec<GraphError> {
    let mut errors = Vec::new();
    let mut visited: HashSet<&str> = HashSet::new();

    for node in graph.nodes() {
        if visited.contains(node.id.as_str()) {
            continue;
        }
        // Flood-fill the horizontal component containing this node.
        let mut group: Vec<&str> = Vec::new();
        let mut frontier = vec![node.id.as_str()];
        while let Some(id) = frontier.pop() {
            if !visited.insert(id) {
                continue;
            }
            group.push(id);
            for edge in graph.edges() {
                if edge.kind != EdgeKind::Horizontal {
                    continue;
                }
                if edge.source == id {
                    frontier.push(edge.target.as_str());
                } else if edge.target == id {
                    frontier.push(edge.source.as_str());
                }
            }
        }
        if group.len() < 2 {
            continue;
        }

        let anchor = group
            .iter()
            .min_by_key(|id| graph.node_position(id).unwrap_or(usize::MAX))
            .copied()
            .unwrap();
        let anchor_has_vertical = graph.edges().iter().any(|edge| {
            edge.kind == EdgeKind::Vertical && (edge.source == anchor || edge.target == anchor)
        });
        if anchor_has_vertical {
            continue;
        }
        let group_self_sufficient = group.iter().all(|id| {
            let member = graph.node(id).expect("group member exists");
            member
                .kind
                .input_ports()
                .iter()
                .filter(|spec| spec.required)
                .all(|spec| member.defaults_from_wallet(spec.name))
        });
        if !group_self_sufficient {
            errors.push(GraphError::DanglingHorizontalGroup {
                anchor: anchor.to_string(),
            });
        }
    }
    errors
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::graph::{GraphNode, NodeKind},
        serde_json::json,
    };

    fn transfer_node(id: &str) -> GraphNode {
        GraphNode::new(
            id,
            NodeKind::TransferNative,
            json!({"amount": "0.1", "destination": solana_pubkey::Pubkey::new_unique().to_string()}),
        )
    }

    #[test]
    fn test_empty_graph_is_valid() {
        let graph = BuilderGraph::new();
        assert!(validate(&graph).is_empty());
    }

    #[test]
    fn test_cycle_reports_offending_edge() {
        let mut graph = BuilderGraph::new();
        graph.add_node(transfer_node("a"));
        graph.add_node(transfer_node("b"));
        graph.connect("a", "out", "b", "source", EdgeKind::Vertical);
        graph.connect("b", "out", "a", "source", EdgeKind::Vertical);

        let errors = validate(&graph);
        assert!(
            errors
                .iter()
                .any(|error| matches!(error, GraphError::Cycle { .. })),
            "expected a cycle error, got {errors:?}"
        );
    }

    #[test]
    fn test_unknown_edge_endpoint_is_reported() {
        let mut graph = BuilderGraph::new();
        graph.add_node(transfer_node("a"));
        graph.connect("a", "out", "ghost", "source", EdgeKind::Vertical);

        let errors = validate(&graph);
        assert_eq!(
            errors,
            vec![GraphError::UnknownNode {
                node_id: "ghost".to_string()
            }]
        );
    }

    #[test]
    fn test_two_execute_configs_rejected() {
        let mut graph = BuilderGraph::new();
        graph.add_node(GraphNode::new(
            "cfg1",
            NodeKind::ExecuteConfig,
            json!({"strategy": "ultra"}),
        ));
        graph.add_node(GraphNode::new(
            "cfg2",
            NodeKind::ExecuteConfig,
            json!({"strategy": "fast"}),
        ));

        let errors = validate(&graph);
        assert_eq!(
            errors,
            vec![GraphError::MultipleExecuteConfigs { count: 2 }]
        );
    }

    #[test]
    fn test_horizontal_group_of_wallet_default_transfers_is_valid() {
        let mut graph = BuilderGraph::new();
        graph.add_node(transfer_node("t1"));
        graph.add_node(transfer_node("t2"));
        graph.add_node(transfer_node("t3"));
        graph.connect("t1", "batch", "t2", "batch", EdgeKind::Horizontal);
        graph.connect("t2", "batch", "t3", "batch", EdgeKind::Horizontal);

        assert!(validate(&graph).is_empty());
    }
}
