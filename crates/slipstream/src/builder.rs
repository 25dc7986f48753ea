use {
    crate::{
        constants::PACKET_DATA_SIZE,
        error::{PipelineResult, SlipstreamError},
        fees::{self, ComputeUnitLimit, PriorityFeeConfig, PriorityFeeLevel},
        lookup,
        signer::TransactionSigner,
        submit::engine::{ExecuteRequest, SubmissionEngine},
        types::{ExecutionProfile, SubmissionResult},
    },
    log::debug,
    solana_hash::Hash,
    solana_instruction::Instruction,
    solana_message::{AddressLookupTableAccount, VersionedMessage, v0},
    solana_pubkey::Pubkey,
    solana_rpc_client::nonblocking::rpc_client::RpcClient,
    solana_rpc_client_api::config::RpcSimulateTransactionConfig,
    solana_signature::Signature,
    solana_transaction::versioned::VersionedTransaction,
    std::sync::Arc,
    tokio_util::sync::CancellationToken,
};

/// Wire-size estimate for the current builder state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizeInfo {
    pub size: usize,
    pub limit: usize,
    pub remaining: usize,
    pub percent_used: f64,
    pub can_fit_more: bool,
}

/// Pre-flight simulation report.
#[derive(Debug, Clone)]
pub struct SimulationOutcome {
    pub ok: bool,
    pub units_consumed: Option<u64>,
    pub error: Option<String>,
    pub logs: Vec<String>,
}

/// Signed wire bytes plus the lifetime that bounds their submission.
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    pub wire: Vec<u8>,
    pub signature: Signature,
    pub blockhash: Hash,
    pub last_valid_block_height: u64,
}

/// Assembles compiled instructions into one signed v0 transaction.
/// Mutators consume and return the builder, so configuration chains read
/// top to bottom.
#[derive(Clone, Default)]
pub struct TransactionBuilder {
    fee_payer: Option<Arc<dyn TransactionSigner>>,
    signers: Vec<Arc<dyn TransactionSigner>>,
    instructions: Vec<Instruction>,
    blockhash: Option<(Hash, u64)>,
    lookup_table_candidates: Vec<Pubkey>,
    priority_fee: PriorityFeeConfig,
    compute_units: ComputeUnitLimit,
}

impl TransactionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fee payer signs first, which pins signature ordering.
    pub fn with_fee_payer(mut self, signer: Arc<dyn TransactionSigner>) -> Self {
        self.fee_payer = Some(signer);
        self
    }

    pub fn add_signer(mut self, signer: Arc<dyn TransactionSigner>) -> Self {
        self.signers.push(signer);
        self
    }

    pub fn add_instruction(mut self, instruction: Instruction) -> Self {
        self.instructions.push(instruction);
        self
    }

    pub fn add_instructions(mut self, instructions: impl IntoIterator<Item = Instruction>) -> Self {
        self.instructions.extend(instructions);
        self
    }

    pub fn with_blockhash_lifetime(mut self, blockhash: Hash, last_valid_block_height: u64) -> Self {
        self.blockhash = Some((blockhash, last_valid_block_height));
        self
    }

    pub fn with_lookup_tables(mut self, addresses: impl IntoIterator<Item = Pubkey>) -> Self {
        self.lookup_table_candidates.extend(addresses);
        self
    }

    pub fn with_priority_fee(mut self, config: impl Into<PriorityFeeConfig>) -> Self {
        self.priority_fee = config.into();
        self
    }

    pub fn with_compute_units(mut self, limit: ComputeUnitLimit) -> Self {
        self.compute_units = limit;
        self
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    fn fee_payer_address(&self) -> PipelineResult<Pubkey> {
        self.fee_payer
            .as_ref()
            .map(|signer| signer.address())
            .ok_or_else(|| SlipstreamError::Signing("fee payer not set".to_string()))
    }

    fn probe_transaction(
        &self,
        tables: &[AddressLookupTableAccount],
    ) -> PipelineResult<VersionedTransaction> {
        let payer = self.fee_payer_address()?;
        let (blockhash, _) = self.blockhash.unwrap_or((Hash::default(), 0));

        let message = v0::Message::try_compile(&payer, &self.instructions, tables, blockhash)
            .map_err(|err| SlipstreamError::Signing(format!("message compile: {err}")))?;
        Ok(VersionedTransaction {
            signatures: vec![
                Signature::default();
                message.header.num_required_signatures.into()
            ],
            message: VersionedMessage::V0(message),
        })
    }

    /// Wire-size estimate from a probe transaction carrying placeholder
    /// signatures. Compute-budget injection and lookup-table compression
    /// happen at build time; `build_signed` re-checks the bound after both.
    pub fn size_info(&self) -> PipelineResult<SizeInfo> {
        let probe = self.probe_transaction(&[])?;
        let size = bincode::serialized_size(&probe)
            .map_err(|err| SlipstreamError::Signing(format!("serialize probe: {err}")))?
            as usize;

        let remaining = PACKET_DATA_SIZE.saturating_sub(size);
        Ok(SizeInfo {
            size,
            limit: PACKET_DATA_SIZE,
            remaining,
            percent_used: size as f64 * 100.0 / PACKET_DATA_SIZE as f64,
            can_fit_more: remaining > 0,
        })
    }

    /// Signs and runs pre-flight simulation; advisory only.
    pub async fn simulate(&self, rpc: &RpcClient) -> PipelineResult<SimulationOutcome> {
        let probe = self.probe_transaction(&[])?;
        let response = rpc
            .simulate_transaction_with_config(
                &probe,
                RpcSimulateTransactionConfig {
                    sig_verify: false,
                    replace_recent_blockhash: true,
                    ..RpcSimulateTransactionConfig::default()
                },
            )
            .await?;

        Ok(SimulationOutcome {
            ok: response.value.err.is_none(),
            units_consumed: response.value.units_consumed,
            error: response.value.err.map(|err| err.to_string()),
            logs: response.value.logs.unwrap_or_default(),
        })
    }

    /// Finalizes the transaction: compute-budget injection, blockhash
    /// fetch, lookup-table compression, signer completeness, the size
    /// bound, then signing.
    pub async fn build_signed(&self, rpc: &RpcClient) -> PipelineResult<SignedTransaction> {
        let payer = self.fee_payer_address()?;

        let writable: Vec<Pubkey> = self
            .instructions
            .iter()
            .flat_map(|instruction| instruction.accounts.iter())
            .filter(|account| account.is_writable)
            .map(|account| account.pubkey)
            .collect();
        let unit_price = fees::resolve_unit_price(rpc, &self.priority_fee, &writable).await?;

        let tables =
            lookup::resolve_lookup_tables(rpc, &self.lookup_table_candidates, &self.instructions)
                .await;

        let unit_limit =
            fees::resolve_unit_limit(rpc, self.compute_units, &payer, &self.instructions, &tables)
                .await?;

        let mut instructions = Vec::with_capacity(self.instructions.len() + 2);
        instructions.extend(fees::budget_instructions(unit_limit, unit_price));
        instructions.extend_from_slice(&self.instructions);

        // Local checks run on a probe compiled against a placeholder hash:
        // account layout and wire size do not depend on the blockhash.
        let probe_hash = self.blockhash.map(|(hash, _)| hash).unwrap_or_default();
        let probe_message = v0::Message::try_compile(&payer, &instructions, &tables, probe_hash)
            .map_err(|err| SlipstreamError::Signing(format!("message compile: {err}")))?;

        let required_signers: Vec<Pubkey> = probe_message.account_keys
            [..probe_message.header.num_required_signatures as usize]
            .to_vec();
        for account in &required_signers {
            if self.available_signer(account).is_none() {
                return Err(SlipstreamError::SignerMissing { account: *account });
            }
        }

        // Size check happens after compression and before signing; the
        // placeholder signatures below are the same width as real ones.
        let probe = VersionedTransaction {
            signatures: vec![Signature::default(); required_signers.len()],
            message: VersionedMessage::V0(probe_message),
        };
        let size = bincode::serialized_size(&probe)
            .map_err(|err| SlipstreamError::Signing(format!("serialize probe: {err}")))?
            as usize;
        if size > PACKET_DATA_SIZE {
            return Err(SlipstreamError::TransactionTooLarge {
                excess: size - PACKET_DATA_SIZE,
            });
        }

        let (blockhash, last_valid_block_height) = match self.blockhash {
            Some(lifetime) => {
                // An expired blockhash is never re-signed.
                let block_height = rpc.get_epoch_info().await?.block_height;
                if block_height > lifetime.1 {
                    return Err(SlipstreamError::BlockhashExpired {
                        rounds: 0,
                        channel_errors: Vec::new(),
                    });
                }
                lifetime
            }
            None => latest_blockhash_with_retry(rpc).await?,
        };

        let message = v0::Message::try_compile(&payer, &instructions, &tables, blockhash)
            .map_err(|err| SlipstreamError::Signing(format!("message compile: {err}")))?;
        let message = VersionedMessage::V0(message);
        let message_bytes = message.serialize();

        // Required signers sign in account order, which puts the fee payer
        // (account zero) first.
        let mut signatures = Vec::with_capacity(required_signers.len());
        for account in &required_signers {
            let signer = self
                .available_signer(account)
                .ok_or(SlipstreamError::SignerMissing { account: *account })?;
            let signature = signer.sign(&message_bytes).await.map_err(|err| {
                SlipstreamError::from_wallet_message(&err.to_string())
                    .unwrap_or_else(|| SlipstreamError::Signing(err.to_string()))
            })?;
            signatures.push(signature);
        }

        let transaction = VersionedTransaction {
            signatures,
            message,
        };
        let wire = bincode::serialize(&transaction)
            .map_err(|err| SlipstreamError::Signing(format!("serialize: {err}")))?;
        debug!(
            "built transaction {} ({} bytes, {} signers)",
            transaction.signatures[0],
            wire.len(),
            required_signers.len()
        );

        Ok(SignedTransaction {
            wire,
            signature: transaction.signatures[0],
            blockhash,
            last_valid_block_height,
        })
    }

    fn available_signer(&self, account: &Pubkey) -> Option<&Arc<dyn TransactionSigner>> {
        self.fee_payer
            .iter()
            .chain(self.signers.iter())
            .find(|signer| signer.address() == *account)
    }

    /// Builds, signs, and hands off to the submission engine.
    pub async fn execute(
        &self,
        engine: &SubmissionEngine,
        profile: ExecutionProfile,
        abort: Option<CancellationToken>,
    ) -> PipelineResult<SubmissionResult> {
        let signed = self.build_signed(engine.rpc()).await?;
        engine
            .execute(ExecuteRequest {
                wire: signed.wire,
                signature: signed.signature,
                last_valid_block_height: signed.last_valid_block_height,
                profile,
                tip_wire: None,
                abort,
            })
            .await
    }
}

impl From<PriorityFeeLevel> for PriorityFeeConfig {
    fn from(level: PriorityFeeLevel) -> Self {
        PriorityFeeConfig::Level(level)
    }
}

/// Transient blockhash-fetch failures get a few quiet retries before the
/// error propagates.
async fn latest_blockhash_with_retry(rpc: &RpcClient) -> PipelineResult<(Hash, u64)> {
    for _ in 1..4 {
        if let Ok(lifetime) = rpc
            .get_latest_blockhash_with_commitment(rpc.commitment())
            .await
        {
            return Ok(lifetime);
        }
    }
    Ok(rpc
        .get_latest_blockhash_with_commitment(rpc.commitment())
        .await?)
}
