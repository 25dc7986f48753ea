use {
    super::{BuilderGraph, PortValue, nodes, validate},
    crate::{
        artifact::CompiledArtifact,
        context::CompileContext,
        error::{PipelineResult, SlipstreamError},
    },
    log::debug,
    std::collections::{BTreeSet, HashMap},
};

/// Compiles a validated graph into an artifact.
///
/// Nodes run in topological order (Kahn), ties broken by insertion order so
/// the same graph always yields the same instruction sequence. Inputs are
/// resolved from incoming edges first, then from default-from-wallet
/// markers. An empty graph compiles to an empty artifact.
pub async fn compile(
    graph: &BuilderGraph,
    ctx: &CompileContext,
) -> PipelineResult<CompiledArtifact> {
    let errors = validate::validate(graph);
    if let Some(error) = errors.first() {
        return Err(SlipstreamError::Compilation {
            node_id: error.node_id().unwrap_or("graph").to_string(),
            cause: errors
                .iter()
                .map(|error| error.to_string())
                .collect::<Vec<_>>()
                .join("; "),
        });
    }

    let order = topological_order(graph);
    debug!("compiling {} nodes", order.len());

    let mut artifact = CompiledArtifact::default();
    for position in order {
        let node = &graph.nodes()[position];
        let inputs = resolve_inputs(graph, &artifact, &node.id);

        let output = nodes::compile_node(node, &inputs, ctx)
            .await
            .map_err(|cause| SlipstreamError::Compilation {
                node_id: node.id.clone(),
                cause: format!("{cause:#}"),
            })?;

        artifact.instructions.extend(output.instructions);
        artifact.compute_unit_hint += output.compute_units;
        for table in output.lookup_tables {
            if !artifact.lookup_tables.contains(&table) {
                artifact.lookup_tables.push(table);
            }
        }
        artifact.transfers.record_native(output.native_transfer);
        for transfer in output.token_transfers {
            artifact.transfers.record_token(transfer);
        }
        if output.profile.is_some() {
            artifact.profile = output.profile;
        }
        artifact.node_outputs.insert(node.id.clone(), output.outputs);
    }

    Ok(artifact)
}

/// Kahn order over node positions; the ready set is kept sorted by
/// insertion index so equal in-degree nodes drain in authoring order.
fn topological_order(graph: &BuilderGraph) -> Vec<usize> {
    let mut in_degree: HashMap<usize, usize> =
        (0..graph.nodes().len()).map(|index| (index, 0)).collect();
    for edge in graph.edges() {
        if let Some(target) = graph.node_position(&edge.target) {
            *in_degree.get_mut(&target).unwrap() += 1;
        }
    }

    let mut ready: BTreeSet<usize> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(index, _)| *index)
        .collect();
    let mut order = Vec::with_capacity(graph.nodes().len());

    while let Some(position) = ready.pop_first() {
        order.push(position);
        let id = &graph.nodes()[position].id;
        for edge in graph.outgoing(id) {
            if let Some(target) = graph.node_position(&edge.target) {
                let degree = in_degree.get_mut(&target).unwrap();
                *degree -= 1;
                if *degree == 0 {
                    ready.insert(target);
                }
            }
        }
    }
    order
}

/// Edge-fed inputs for one node: the named output of each source node's
/// prior result, keyed by the edge's target port.
fn resolve_inputs(
    graph: &BuilderGraph,
    artifact: &CompiledArtifact,
    node_id: &str,
) -> HashMap<String, PortValue> {
    let mut inputs = HashMap::new();
    for edge in graph.incoming(node_id) {
        if let Some(value) = artifact.node_output(&edge.source, &edge.source_port) {
            inputs.insert(edge.target_port.clone(), value.clone());
        }
    }
    inputs
}
