use {
    crate::{
        constants::SLOT_DURATION,
        error::{PipelineResult, SlipstreamError},
        submit::{
            confirmation::{ConfirmationSignal, ConfirmationWatcher, SlotClock},
            events::{EventBus, PipelineEvent},
            jito::{BundleState, JitoClient},
        },
        types::{ConfirmationChannel, ExecutionProfile, SubmissionResult, SubmissionRound},
    },
    log::{debug, warn},
    slipstream_tpu::{SubmitOptions, TpuClient},
    solana_commitment_config::CommitmentConfig,
    solana_pubsub_client::nonblocking::pubsub_client::PubsubClient,
    solana_rpc_client::nonblocking::rpc_client::RpcClient,
    solana_rpc_client_api::config::RpcSendTransactionConfig,
    solana_signature::Signature,
    solana_transaction::versioned::VersionedTransaction,
    std::{
        collections::BTreeMap,
        sync::{Arc, Mutex},
        time::Instant,
    },
    tokio::time::sleep,
    tokio_util::sync::CancellationToken,
};

/// One `execute` worth of work for the engine: signed wire bytes plus the
/// blockhash lifetime that bounds the loop.
#[derive(Debug, Clone)]
pub struct ExecuteRequest {
    pub wire: Vec<u8>,
    pub signature: Signature,
    pub last_valid_block_height: u64,
    pub profile: ExecutionProfile,
    /// Pre-signed tip transaction, bundled ahead of the target when the
    /// strategy takes the block-engine path.
    pub tip_wire: Option<Vec<u8>>,
    pub abort: Option<CancellationToken>,
}

/// Multi-path submission engine. One instance per client handle; the leader
/// schedule and connection pool under `tpu` are shared by its executes and
/// by nothing else.
pub struct SubmissionEngine {
    rpc: Arc<RpcClient>,
    rpc_fanout: Vec<Arc<RpcClient>>,
    pubsub: Option<Arc<PubsubClient>>,
    tpu: Option<Arc<TpuClient>>,
    jito: Option<Arc<JitoClient>>,
    events: EventBus,
    commitment: CommitmentConfig,
}

impl SubmissionEngine {
    pub fn new(rpc: Arc<RpcClient>) -> Self {
        Self {
            rpc,
            rpc_fanout: Vec::new(),
            pubsub: None,
            tpu: None,
            jito: None,
            events: EventBus::default(),
            commitment: CommitmentConfig::confirmed(),
        }
    }

    pub fn with_pubsub(mut self, pubsub: Arc<PubsubClient>) -> Self {
        self.pubsub = Some(pubsub);
        self
    }

    pub fn with_tpu(mut self, tpu: Arc<TpuClient>) -> Self {
        self.tpu = Some(tpu);
        self
    }

    pub fn with_jito(mut self, jito: Arc<JitoClient>) -> Self {
        self.jito = Some(jito);
        self
    }

    /// Extra RPC endpoints raced alongside the primary on sends.
    pub fn with_rpc_fanout(mut self, endpoints: Vec<Arc<RpcClient>>) -> Self {
        self.rpc_fanout = endpoints;
        self
    }

    pub fn with_commitment(mut self, commitment: CommitmentConfig) -> Self {
        self.commitment = commitment;
        self
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn rpc(&self) -> &Arc<RpcClient> {
        &self.rpc
    }

    /// Drives submission rounds until confirmation or blockhash expiry.
    ///
    /// Rounds are strictly sequential; within one round the channel sends
    /// run concurrently. The first confirmation on any channel wins and
    /// cancels everything else cooperatively. The terminal result is
    /// produced exactly once and also emitted on the event bus.
    pub async fn execute(&self, request: ExecuteRequest) -> PipelineResult<SubmissionResult> {
        let cancel = request.abort.clone().unwrap_or_default();
        let scope = cancel.child_token();

        let initial_slot = self.rpc.get_slot().await.unwrap_or_default();
        let slot_clock = SlotClock::spawn(
            self.rpc.clone(),
            self.pubsub.clone(),
            initial_slot,
            scope.clone(),
        );
        let mut watcher = ConfirmationWatcher::spawn(
            self.rpc.clone(),
            self.pubsub.clone(),
            request.signature,
            self.commitment,
            scope.clone(),
        );

        // Channel name -> last observed error, for the terminal report. The
        // bundle task writes its terminal state here too.
        let channel_errors: Arc<Mutex<BTreeMap<&'static str, String>>> =
            Arc::new(Mutex::new(BTreeMap::new()));

        if request.profile.strategy.uses_bundle() {
            match self.jito.clone() {
                Some(jito) => self.spawn_bundle_path(
                    &jito,
                    &request,
                    watcher.handle(),
                    channel_errors.clone(),
                    scope.clone(),
                ),
                None => {
                    channel_errors
                        .lock()
                        .unwrap()
                        .insert("block-engine", "no jito client configured".to_string());
                }
            }
        }

        let started = Instant::now();
        let mut round_log: Vec<SubmissionRound> = Vec::new();
        let mut total_leaders: u64 = 0;
        self.events.emit(PipelineEvent::TpuStart);

        let outcome = loop {
            // Round 1 always fires; expiry is checked only after a round so
            // a deadline already in the past still gets one attempt.
            let round_index = round_log.len() as u64 + 1;
            if scope.is_cancelled() {
                break LoopOutcome::Cancelled;
            }
            let current_slot = slot_clock.current();
            let round_started = Instant::now();
            let sent_at_ms = started.elapsed().as_millis() as u64;
            let round_work = self.run_round(&request, current_slot);

            tokio::select! {
                signal = watcher.confirmed() => {
                    // Mid-flight sends are allowed to settle on their own;
                    // their outcomes are dropped with the round stub.
                    round_log.push(SubmissionRound::without_leaders(round_index, sent_at_ms));
                    break LoopOutcome::Confirmed(signal);
                }
                _ = scope.cancelled() => break LoopOutcome::Cancelled,
                (round, rpc_error) = round_work => {
                    if let Some(error) = rpc_error {
                        channel_errors.lock().unwrap().insert("rpc", error);
                    }
                    if let Some(round) = round {
                        total_leaders += round.leaders.len() as u64;
                        if round.no_leaders {
                            channel_errors.lock().unwrap().insert("tpu", "no-leaders".to_string());
                        } else if round.delivered_count() > 0 {
                            // Delivery without an indexed signature keeps
                            // looping until a channel confirms or the
                            // blockhash expires.
                            debug!(
                                "round {round_index} delivered to {} leaders, awaiting confirmation",
                                round.delivered_count()
                            );
                        }
                        round_log.push(SubmissionRound {
                            index: round_index,
                            sent_at_ms,
                            leaders: round.leaders,
                            no_leaders: round.no_leaders,
                        });
                    } else {
                        round_log.push(SubmissionRound::without_leaders(round_index, sent_at_ms));
                    }
                }
            }

            // Remainder of the slot, still racing the confirmation signal.
            let elapsed = round_started.elapsed();
            if elapsed < SLOT_DURATION {
                tokio::select! {
                    signal = watcher.confirmed() => break LoopOutcome::Confirmed(signal),
                    _ = scope.cancelled() => break LoopOutcome::Cancelled,
                    _ = sleep(SLOT_DURATION - elapsed) => {}
                }
            }

            if slot_clock.current() > request.last_valid_block_height {
                break LoopOutcome::Expired;
            }
        };

        // Cancel peers; in-flight work settles cooperatively.
        scope.cancel();

        let rounds = round_log.len().max(1) as u64;
        let result = match outcome {
            LoopOutcome::Confirmed(signal) => SubmissionResult {
                confirmed: signal.err.is_none(),
                signature: signal.signature,
                rounds,
                total_leaders_contacted: total_leaders,
                total_latency_ms: started.elapsed().as_millis() as u64,
                round_log,
                channel: Some(signal.channel),
                error: signal.err,
            },
            LoopOutcome::Cancelled => {
                self.events.emit(PipelineEvent::TpuResult(SubmissionResult {
                    confirmed: false,
                    signature: request.signature,
                    rounds,
                    total_leaders_contacted: total_leaders,
                    total_latency_ms: started.elapsed().as_millis() as u64,
                    round_log,
                    channel: None,
                    error: Some("cancelled".to_string()),
                }));
                return Err(SlipstreamError::Cancelled);
            }
            LoopOutcome::Expired => {
                let errors: Vec<String> = channel_errors
                    .lock()
                    .unwrap()
                    .iter()
                    .map(|(channel, error)| format!("{channel}: {error}"))
                    .collect();
                self.events.emit(PipelineEvent::TpuResult(SubmissionResult {
                    confirmed: false,
                    signature: request.signature,
                    rounds,
                    total_leaders_contacted: total_leaders,
                    total_latency_ms: started.elapsed().as_millis() as u64,
                    round_log,
                    channel: None,
                    error: Some("blockhash expired".to_string()),
                }));
                return Err(SlipstreamError::BlockhashExpired {
                    rounds,
                    channel_errors: errors,
                });
            }
        };

        self.events.emit(PipelineEvent::TpuResult(result.clone()));
        Ok(result)
    }

    /// One round: TPU fan-out and RPC posts, concurrently. Returns the TPU
    /// round report (when the strategy uses TPU) and the last RPC error.
    async fn run_round(
        &self,
        request: &ExecuteRequest,
        current_slot: u64,
    ) -> (Option<slipstream_tpu::RoundReport>, Option<String>) {
        let tpu_send = async {
            if !request.profile.strategy.uses_tpu() {
                return None;
            }
            let tpu = self.tpu.as_ref()?;
            let options = SubmitOptions {
                fanout: request.profile.fanout,
                deadline: SLOT_DURATION,
            };
            Some(tpu.submit(&request.wire, current_slot, &options).await)
        };

        let rpc_send = async {
            if !request.profile.strategy.uses_rpc() {
                return None;
            }
            self.post_to_rpc(&request.wire).await
        };

        tokio::join!(tpu_send, rpc_send)
    }

    /// Posts the wire bytes to the primary and every fan-out endpoint with
    /// preflight skipped; the validator-side dedup makes repeats harmless.
    async fn post_to_rpc(&self, wire: &[u8]) -> Option<String> {
        let transaction: VersionedTransaction = match bincode::deserialize(wire) {
            Ok(transaction) => transaction,
            Err(err) => return Some(format!("wire decode: {err}")),
        };
        let config = RpcSendTransactionConfig {
            skip_preflight: true,
            preflight_commitment: Some(self.commitment.commitment),
            max_retries: Some(0),
            ..RpcSendTransactionConfig::default()
        };

        let mut last_error = None;
        let sends = std::iter::once(&self.rpc)
            .chain(self.rpc_fanout.iter())
            .map(|client| client.send_transaction_with_config(&transaction, config.clone()));
        for result in futures::future::join_all(sends).await {
            if let Err(err) = result {
                last_error = Some(err.to_string());
            }
        }
        last_error
    }

    fn spawn_bundle_path(
        &self,
        jito: &Arc<JitoClient>,
        request: &ExecuteRequest,
        handle: crate::submit::confirmation::ConfirmationHandle,
        channel_errors: Arc<Mutex<BTreeMap<&'static str, String>>>,
        cancel: CancellationToken,
    ) {
        let jito = jito.clone();
        let signature = request.signature;
        let mut bundle: Vec<Vec<u8>> = Vec::with_capacity(2);
        if let Some(tip) = &request.tip_wire {
            bundle.push(tip.clone());
        }
        bundle.push(request.wire.clone());

        tokio::spawn(async move {
            let bundle_id = match jito.send_bundle(&bundle).await {
                Ok(bundle_id) => bundle_id,
                Err(err) => {
                    warn!("bundle submission failed: {err}");
                    channel_errors
                        .lock()
                        .unwrap()
                        .insert("block-engine", err.to_string());
                    return;
                }
            };
            let mut ticker = tokio::time::interval(SLOT_DURATION * 2);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = ticker.tick() => {}
                }
                match jito.bundle_state(&bundle_id).await {
                    Ok(BundleState::Landed) => {
                        handle.signal(ConfirmationSignal {
                            signature,
                            channel: ConfirmationChannel::BlockEngine,
                            slot: None,
                            err: None,
                        });
                        return;
                    }
                    Ok(state) if state.is_terminal() => {
                        warn!("bundle {bundle_id} terminal without landing: {state:?}");
                        channel_errors
                            .lock()
                            .unwrap()
                            .insert("block-engine", format!("bundle {state:?}").to_lowercase());
                        return;
                    }
                    Ok(_) => {}
                    Err(err) => debug!("bundle status poll failed: {err}"),
                }
            }
        });
    }
}

enum LoopOutcome {
    Confirmed(ConfirmationSignal),
    Cancelled,
    Expired,
}
