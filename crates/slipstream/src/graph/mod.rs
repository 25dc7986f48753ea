pub mod compiler;
pub mod nodes;
pub mod validate;

pub use {
    compiler::compile,
    validate::{GraphError, validate},
};

use {
    crate::types::ExecutionProfile,
    solana_pubkey::Pubkey,
    std::collections::{BTreeSet, HashMap},
};

/// Closed set of node types. Extensions integrate through the swap-adapter
/// interface, not by widening this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Wallet,
    TransferNative,
    TransferToken,
    CreateAssociatedAccount,
    Swap,
    Memo,
    ExecuteConfig,
}

/// Declared input port of a node kind.
#[derive(Debug, Clone, Copy)]
pub struct PortSpec {
    pub name: &'static str,
    pub required: bool,
    /// Satisfied by the wallet address when no edge feeds it.
    pub wallet_default: bool,
}

const fn port(name: &'static str, required: bool, wallet_default: bool) -> PortSpec {
    PortSpec {
        name,
        required,
        wallet_default,
    }
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Wallet => "wallet",
            NodeKind::TransferNative => "transfer-native",
            NodeKind::TransferToken => "transfer-token",
            NodeKind::CreateAssociatedAccount => "create-associated-account",
            NodeKind::Swap => "swap",
            NodeKind::Memo => "memo",
            NodeKind::ExecuteConfig => "execute-config",
        }
    }

    pub fn input_ports(&self) -> &'static [PortSpec] {
        const TRANSFER_NATIVE_PORTS: [PortSpec; 2] =
            [port("source", true, true), port("destination", false, false)];
        const TRANSFER_TOKEN_PORTS: [PortSpec; 2] =
            [port("source", true, true), port("destination", false, false)];
        const CREATE_ASSOCIATED_ACCOUNT_PORTS: [PortSpec; 1] = [port("payer", true, true)];
        const SWAP_PORTS: [PortSpec; 1] = [port("owner", true, true)];
        const MEMO_PORTS: [PortSpec; 1] = [port("signer", true, true)];
        match self {
            NodeKind::Wallet => &[],
            NodeKind::TransferNative => &TRANSFER_NATIVE_PORTS,
            NodeKind::TransferToken => &TRANSFER_TOKEN_PORTS,
            NodeKind::CreateAssociatedAccount => &CREATE_ASSOCIATED_ACCOUNT_PORTS,
            NodeKind::Swap => &SWAP_PORTS,
            NodeKind::Memo => &MEMO_PORTS,
            NodeKind::ExecuteConfig => &[],
        }
    }

    /// Fields the payload must carry for the node to do anything. A blank
    /// one downgrades the node to a no-op rather than failing the graph.
    pub fn payload_fields(&self) -> &'static [&'static str] {
        match self {
            NodeKind::Wallet => &[],
            NodeKind::TransferNative => &["amount"],
            NodeKind::TransferToken => &["amount", "mint", "decimals"],
            NodeKind::CreateAssociatedAccount => &["mint"],
            NodeKind::Swap => &["inputMint", "outputMint", "amount"],
            NodeKind::Memo => &["message"],
            NodeKind::ExecuteConfig => &["strategy"],
        }
    }
}

/// Value flowing across an edge from one node's output port.
#[derive(Debug, Clone, PartialEq)]
pub enum PortValue {
    Address(Pubkey),
    Lamports(u64),
    Text(String),
    Profile(ExecutionProfile),
}

impl PortValue {
    pub fn as_address(&self) -> Option<Pubkey> {
        match self {
            PortValue::Address(address) => Some(*address),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    /// Sequential dependency; source and target may land in distinct batches.
    Vertical,
    /// Co-batched: source and target share one transaction.
    Horizontal,
}

#[derive(Debug, Clone)]
pub struct GraphEdge {
    pub source: String,
    pub source_port: String,
    pub target: String,
    pub target_port: String,
    pub kind: EdgeKind,
}

#[derive(Debug, Clone)]
pub struct GraphNode {
    pub id: String,
    pub kind: NodeKind,
    /// Free-form payload; the kind decides which fields matter.
    pub data: serde_json::Value,
    /// Input ports explicitly marked default-from-wallet, beyond the ones
    /// the kind already defaults.
    pub wallet_defaults: BTreeSet<String>,
}

impl GraphNode {
    pub fn new(id: impl Into<String>, kind: NodeKind, data: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            kind,
            data,
            wallet_defaults: BTreeSet::new(),
        }
    }

    pub fn with_wallet_default(mut self, port: impl Into<String>) -> Self {
        self.wallet_defaults.insert(port.into());
        self
    }

    pub fn defaults_from_wallet(&self, port: &str) -> bool {
        self.wallet_defaults.contains(port)
            || self
                .kind
                .input_ports()
                .iter()
                .any(|spec| spec.name == port && spec.wallet_default)
    }

    pub(crate) fn field_str(&self, field: &str) -> Option<&str> {
        self.data.get(field).and_then(|value| value.as_str())
    }

    pub(crate) fn field_u64(&self, field: &str) -> Option<u64> {
        self.data.get(field).and_then(|value| value.as_u64())
    }
}

/// User-authored DAG of operation nodes. Insertion order is meaningful: it
/// breaks topological ties, so compiled output is deterministic.
#[derive(Debug, Clone, Default)]
pub struct BuilderGraph {
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
    index: HashMap<String, usize>,
}

impl BuilderGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: GraphNode) -> &mut Self {
        self.index.insert(node.id.clone(), self.nodes.len());
        self.nodes.push(node);
        self
    }

    pub fn add_edge(&mut self, edge: GraphEdge) -> &mut Self {
        self.edges.push(edge);
        self
    }

    pub fn connect(
        &mut self,
        source: impl Into<String>,
        source_port: impl Into<String>,
        target: impl Into<String>,
        target_port: impl Into<String>,
        kind: EdgeKind,
    ) -> &mut Self {
        self.add_edge(GraphEdge {
            source: source.into(),
            source_port: source_port.into(),
            target: target.into(),
            target_port: target_port.into(),
            kind,
        })
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.index.get(id).map(|position| &self.nodes[*position])
    }

    pub fn node_position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn incoming(&self, target: &str) -> impl Iterator<Item = &GraphEdge> {
        self.edges.iter().filter(move |edge| edge.target == target)
    }

    pub fn outgoing(&self, source: &str) -> impl Iterator<Item = &GraphEdge> {
        self.edges.iter().filter(move |edge| edge.source == source)
    }
}
