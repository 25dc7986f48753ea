//! Solana transaction pipeline with aggressive landing guarantees.
//!
//! Three subsystems feed each other: the graph [`compiler`](graph) turns a
//! DAG of operation nodes into ordered instructions, the
//! [`TransactionBuilder`](builder::TransactionBuilder) assembles them into a
//! size-bounded signed v0 transaction, and the
//! [`SubmissionEngine`](submit::SubmissionEngine) races direct-to-leader
//! QUIC delivery, RPC fan-out, and block-engine bundles until the signature
//! confirms or the blockhash expires.

pub mod artifact;
pub mod builder;
pub mod constants;
pub mod context;
pub mod error;
pub mod fees;
pub mod graph;
pub mod helpers;
pub mod lookup;
pub mod pipeline;
pub mod signer;
pub mod submit;
pub mod swap;
pub mod types;

pub use {
    artifact::{CompiledArtifact, TokenTransfer, TransferSummary},
    builder::{SignedTransaction, SimulationOutcome, SizeInfo, TransactionBuilder},
    context::CompileContext,
    error::{PipelineResult, SlipstreamError},
    fees::{ComputeUnitLimit, PriorityFeeConfig, PriorityFeeLevel},
    graph::{BuilderGraph, EdgeKind, GraphEdge, GraphError, GraphNode, NodeKind, PortValue},
    pipeline::{ExecuteOptions, Pipeline},
    signer::TransactionSigner,
    submit::{
        EventBus, ExecuteRequest, JitoClient, JitoRegion, PipelineEvent, SubmissionEngine,
        TpuSubmitRequest, TpuSubmitResponse, handle_tpu_submit,
    },
    swap::{SwapAdapter, SwapQuote, SwapRequest},
    types::{
        ConfirmationChannel, ExecutionProfile, SubmissionResult, SubmissionRound,
        SubmissionStrategy,
    },
};
