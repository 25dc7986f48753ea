use {
    crate::{
        builder::TransactionBuilder,
        context::CompileContext,
        error::{PipelineResult, SlipstreamError},
        fees::{ComputeUnitLimit, PriorityFeeConfig},
        graph::{BuilderGraph, compile},
        signer::TransactionSigner,
        submit::{
            engine::{ExecuteRequest, SubmissionEngine},
            jito,
        },
        types::{ExecutionProfile, SubmissionResult},
    },
    log::debug,
    std::sync::Arc,
    tokio_util::sync::CancellationToken,
};

/// Per-execute knobs. Strategy comes from the graph's execute-config node;
/// fee selection stays here and is never overridden by the strategy.
#[derive(Clone, Default)]
pub struct ExecuteOptions {
    pub priority_fee: PriorityFeeConfig,
    pub compute_units: ComputeUnitLimit,
    /// Overrides the graph's execute-config output when set.
    pub profile: Option<ExecutionProfile>,
    pub abort: Option<CancellationToken>,
}

/// End-to-end pipeline handle: compiles a graph, builds and signs the
/// transaction, and drives the submission engine. Owns nothing global;
/// concurrent pipelines are independent.
pub struct Pipeline {
    ctx: CompileContext,
    fee_payer: Arc<dyn TransactionSigner>,
    extra_signers: Vec<Arc<dyn TransactionSigner>>,
    engine: Arc<SubmissionEngine>,
}

impl Pipeline {
    pub fn new(
        ctx: CompileContext,
        fee_payer: Arc<dyn TransactionSigner>,
        engine: Arc<SubmissionEngine>,
    ) -> Self {
        Self {
            ctx,
            fee_payer,
            extra_signers: Vec::new(),
            engine,
        }
    }

    pub fn add_signer(mut self, signer: Arc<dyn TransactionSigner>) -> Self {
        self.extra_signers.push(signer);
        self
    }

    pub fn context(&self) -> &CompileContext {
        &self.ctx
    }

    pub fn engine(&self) -> &Arc<SubmissionEngine> {
        &self.engine
    }

    /// Builder primed with a compiled graph, for callers that want to
    /// inspect size or simulate before executing.
    pub async fn builder_for_graph(
        &self,
        graph: &BuilderGraph,
        options: &ExecuteOptions,
    ) -> PipelineResult<(TransactionBuilder, ExecutionProfile)> {
        let artifact = compile(graph, &self.ctx).await?;
        if artifact.is_empty() {
            return Err(SlipstreamError::Compilation {
                node_id: "graph".to_string(),
                cause: "graph compiled to an empty artifact".to_string(),
            });
        }

        let profile = options
            .profile
            .clone()
            .or_else(|| artifact.profile().cloned())
            .unwrap_or_default();
        debug!(
            "graph compiled: {} instructions, strategy {}",
            artifact.instructions().len(),
            profile.strategy
        );

        let mut builder = TransactionBuilder::new()
            .with_fee_payer(self.fee_payer.clone())
            .with_lookup_tables(artifact.lookup_tables().iter().copied())
            .with_priority_fee(options.priority_fee.clone())
            .with_compute_units(options.compute_units);
        for signer in &self.extra_signers {
            builder = builder.add_signer(signer.clone());
        }
        builder = builder.add_instructions(artifact.into_instructions());

        Ok((builder, profile))
    }

    /// The single call that drives the whole pipeline: compile, build,
    /// sign, then race the submission channels until confirmation or
    /// expiry.
    pub async fn execute(
        &self,
        graph: &BuilderGraph,
        options: ExecuteOptions,
    ) -> PipelineResult<SubmissionResult> {
        let (builder, profile) = self.builder_for_graph(graph, &options).await?;
        let signed = builder.build_signed(self.ctx.rpc()).await?;

        // The bundle path wants a tip transaction riding ahead of the
        // target, signed against the same blockhash lifetime.
        let tip_wire = if profile.strategy.uses_bundle() && profile.tip_lamports > 0 {
            let seed = signed.signature.as_ref()[0] as u64;
            let tip = TransactionBuilder::new()
                .with_fee_payer(self.fee_payer.clone())
                .add_instruction(jito::tip_instruction(
                    &self.fee_payer.address(),
                    profile.tip_lamports,
                    seed,
                ))
                .with_blockhash_lifetime(signed.blockhash, signed.last_valid_block_height)
                .with_priority_fee(options.priority_fee.clone())
                .with_compute_units(ComputeUnitLimit::Fixed(5_000))
                .build_signed(self.ctx.rpc())
                .await?;
            Some(tip.wire)
        } else {
            None
        };

        self.engine
            .execute(ExecuteRequest {
                wire: signed.wire,
                signature: signed.signature,
                last_valid_block_height: signed.last_valid_block_height,
                profile,
                tip_wire,
                abort: options.abort,
            })
            .await
    }
}
