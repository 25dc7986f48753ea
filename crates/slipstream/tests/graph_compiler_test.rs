/// Graph compiler tests: topological ordering, node contracts, and the
/// boundary behaviors around empty and underspecified graphs.
use {
    serde_json::json,
    slipstream::{
        BuilderGraph, CompileContext, EdgeKind, GraphNode, NodeKind, PortValue, SlipstreamError,
        SubmissionStrategy,
        constants::{LAMPORTS_PER_SOL, MEMO_PROGRAM_ID},
        graph::compile,
    },
    solana_keypair::{Keypair, Signer},
    solana_pubkey::Pubkey,
    solana_rpc_client::nonblocking::rpc_client::RpcClient,
    std::sync::Arc,
};

fn test_context() -> (CompileContext, Pubkey) {
    let wallet = Keypair::new().pubkey();
    let rpc = Arc::new(RpcClient::new("http://localhost:8899".to_string()));
    (CompileContext::new(wallet, wallet, rpc), wallet)
}

fn native_transfer(id: &str, amount: &str, destination: &Pubkey) -> GraphNode {
    GraphNode::new(
        id,
        NodeKind::TransferNative,
        json!({"amount": amount, "destination": destination.to_string()}),
    )
}

#[tokio::test]
async fn test_empty_graph_compiles_to_empty_artifact() {
    let (ctx, _) = test_context();
    let graph = BuilderGraph::new();

    let artifact = compile(&graph, &ctx).await.expect("empty graph compiles");
    assert!(artifact.is_empty());
    assert_eq!(artifact.compute_unit_hint(), 0);
}

#[tokio::test]
async fn test_wallet_node_publishes_address_and_no_instructions() {
    let (ctx, wallet) = test_context();
    let mut graph = BuilderGraph::new();
    graph.add_node(GraphNode::new("w", NodeKind::Wallet, json!({})));

    let artifact = compile(&graph, &ctx).await.unwrap();
    assert!(artifact.is_empty());
    assert_eq!(
        artifact.node_output("w", "address"),
        Some(&PortValue::Address(wallet))
    );
}

#[tokio::test]
async fn test_native_transfer_amount_scaling() {
    let (ctx, wallet) = test_context();
    let destination = Keypair::new().pubkey();
    let mut graph = BuilderGraph::new();
    graph.add_node(native_transfer("t", "0.1", &destination));

    let artifact = compile(&graph, &ctx).await.unwrap();
    assert_eq!(artifact.instructions().len(), 1);
    assert_eq!(artifact.transfers().native_lamports, LAMPORTS_PER_SOL / 10);

    let instruction = &artifact.instructions()[0];
    assert_eq!(instruction.program_id, solana_sdk_ids::system_program::id());
    assert_eq!(instruction.accounts[0].pubkey, wallet, "source is the wallet");
    assert_eq!(instruction.accounts[1].pubkey, destination);
}

#[tokio::test]
async fn test_unparseable_amount_compiles_to_noop() {
    let (ctx, _) = test_context();
    let destination = Keypair::new().pubkey();
    let mut graph = BuilderGraph::new();
    graph.add_node(native_transfer("t", "not-a-number", &destination));

    let artifact = compile(&graph, &ctx).await.unwrap();
    assert!(artifact.is_empty(), "bad amount downgrades to a no-op");
}

#[tokio::test]
async fn test_blank_required_fields_compile_to_noop() {
    let (ctx, _) = test_context();
    let mut graph = BuilderGraph::new();
    graph.add_node(GraphNode::new("m", NodeKind::Memo, json!({"message": ""})));

    let artifact = compile(&graph, &ctx).await.unwrap();
    assert!(artifact.is_empty());
}

#[tokio::test]
async fn test_batched_transfers_keep_insertion_order() {
    let (ctx, _) = test_context();
    let d1 = Keypair::new().pubkey();
    let d2 = Keypair::new().pubkey();
    let d3 = Keypair::new().pubkey();
    let mut graph = BuilderGraph::new();
    graph.add_node(native_transfer("t1", "0.1", &d1));
    graph.add_node(native_transfer("t2", "0.2", &d2));
    graph.add_node(native_transfer("t3", "0.3", &d3));
    graph.connect("t1", "batch", "t2", "batch", EdgeKind::Horizontal);
    graph.connect("t2", "batch", "t3", "batch", EdgeKind::Horizontal);

    let artifact = compile(&graph, &ctx).await.unwrap();
    assert_eq!(artifact.instructions().len(), 3);
    let destinations: Vec<Pubkey> = artifact
        .instructions()
        .iter()
        .map(|instruction| instruction.accounts[1].pubkey)
        .collect();
    assert_eq!(destinations, vec![d1, d2, d3]);
    assert_eq!(
        artifact.transfers().native_lamports,
        100_000_000 + 200_000_000 + 300_000_000
    );
}

#[tokio::test]
async fn test_vertical_edge_feeds_downstream_input() {
    let (ctx, wallet) = test_context();
    let mut graph = BuilderGraph::new();
    graph.add_node(GraphNode::new("w", NodeKind::Wallet, json!({})));
    graph.add_node(GraphNode::new(
        "t",
        NodeKind::TransferNative,
        json!({"amount": "1"}),
    ));
    graph.connect("w", "address", "t", "destination", EdgeKind::Vertical);

    let artifact = compile(&graph, &ctx).await.unwrap();
    assert_eq!(artifact.instructions().len(), 1);
    assert_eq!(
        artifact.instructions()[0].accounts[1].pubkey, wallet,
        "destination resolved from the wallet node's output port"
    );
}

#[tokio::test]
async fn test_instruction_order_respects_edges() {
    let (ctx, _) = test_context();
    let destination = Keypair::new().pubkey();
    let mut graph = BuilderGraph::new();
    // Inserted out of dependency order on purpose.
    graph.add_node(GraphNode::new(
        "late",
        NodeKind::Memo,
        json!({"message": "after"}),
    ));
    graph.add_node(native_transfer("early", "0.5", &destination));
    graph.connect("early", "source", "late", "signer", EdgeKind::Vertical);

    let artifact = compile(&graph, &ctx).await.unwrap();
    assert_eq!(artifact.instructions().len(), 2);
    assert_eq!(
        artifact.instructions()[0].program_id,
        solana_sdk_ids::system_program::id(),
        "upstream transfer compiles before its dependent memo"
    );
    assert_eq!(artifact.instructions()[1].program_id, MEMO_PROGRAM_ID);
}

#[tokio::test]
async fn test_cycle_is_a_fatal_compilation_error() {
    let (ctx, _) = test_context();
    let destination = Keypair::new().pubkey();
    let mut graph = BuilderGraph::new();
    graph.add_node(native_transfer("a", "0.1", &destination));
    graph.add_node(native_transfer("b", "0.1", &destination));
    graph.connect("a", "source", "b", "source", EdgeKind::Vertical);
    graph.connect("b", "source", "a", "source", EdgeKind::Vertical);

    let error = compile(&graph, &ctx).await.unwrap_err();
    match error {
        SlipstreamError::Compilation { cause, .. } => {
            assert!(cause.contains("cycle"), "cause should name the cycle: {cause}");
        }
        other => panic!("expected Compilation error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_memo_node_emits_readonly_signer_instruction() {
    let (ctx, wallet) = test_context();
    let mut graph = BuilderGraph::new();
    graph.add_node(GraphNode::new(
        "m",
        NodeKind::Memo,
        json!({"message": "gm"}),
    ));

    let artifact = compile(&graph, &ctx).await.unwrap();
    let instruction = &artifact.instructions()[0];
    assert_eq!(instruction.program_id, MEMO_PROGRAM_ID);
    assert_eq!(instruction.data, b"gm");
    assert!(instruction.accounts[0].is_signer);
    assert!(!instruction.accounts[0].is_writable);
    assert_eq!(instruction.accounts[0].pubkey, wallet);
}

#[tokio::test]
async fn test_execute_config_selects_strategy() {
    let (ctx, _) = test_context();
    let mut graph = BuilderGraph::new();
    graph.add_node(GraphNode::new(
        "cfg",
        NodeKind::ExecuteConfig,
        json!({"strategy": "ultra", "fanout": 8}),
    ));
    graph.add_node(GraphNode::new(
        "m",
        NodeKind::Memo,
        json!({"message": "strategy probe"}),
    ));

    let artifact = compile(&graph, &ctx).await.unwrap();
    let profile = artifact.profile().expect("profile from execute-config");
    assert_eq!(profile.strategy, SubmissionStrategy::Ultra);
    assert!(profile.fanout >= 6);
    assert_eq!(artifact.instructions().len(), 1, "config emits nothing");
}

#[tokio::test]
async fn test_swap_without_adapter_fails_compilation() {
    let (ctx, _) = test_context();
    let mut graph = BuilderGraph::new();
    graph.add_node(GraphNode::new(
        "s",
        NodeKind::Swap,
        json!({
            "inputMint": Keypair::new().pubkey().to_string(),
            "outputMint": Keypair::new().pubkey().to_string(),
            "amount": 1_000_000u64,
        }),
    ));

    let error = compile(&graph, &ctx).await.unwrap_err();
    assert!(matches!(error, SlipstreamError::Compilation { ref node_id, .. } if node_id == "s"));
}

#[tokio::test]
async fn test_token_transfer_derives_atas_and_records_transfer() {
    let (ctx, wallet) = test_context();
    let mint = Keypair::new().pubkey();
    let destination = Keypair::new().pubkey();
    let mut graph = BuilderGraph::new();
    graph.add_node(GraphNode::new(
        "tt",
        NodeKind::TransferToken,
        json!({
            "amount": "2.5",
            "mint": mint.to_string(),
            "decimals": 6,
            "destination": destination.to_string(),
        }),
    ));

    let artifact = compile(&graph, &ctx).await.unwrap();
    assert_eq!(artifact.instructions().len(), 1);

    let transfer = &artifact.transfers().tokens[0];
    assert_eq!(transfer.mint, mint);
    assert_eq!(transfer.base_units, 2_500_000);
    assert_eq!(transfer.decimals, 6);

    let instruction = &artifact.instructions()[0];
    // TransferChecked layout: source ata, mint, destination ata, owner.
    assert_eq!(instruction.accounts.len(), 4);
    assert_eq!(instruction.accounts[1].pubkey, mint);
    assert_eq!(instruction.accounts[3].pubkey, wallet);
    assert!(instruction.accounts[3].is_signer);
    assert_eq!(instruction.data[0], 12, "TransferChecked discriminant");
}
