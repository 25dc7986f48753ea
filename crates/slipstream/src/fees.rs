use {
    crate::{
        constants::{COMPUTE_UNIT_SAFETY_FACTOR, DEFAULT_COMPUTE_UNIT_LIMIT, MAX_COMPUTE_UNIT_LIMIT},
        error::{PipelineResult, SlipstreamError},
    },
    log::debug,
    serde::{Deserialize, Serialize},
    solana_compute_budget_interface::ComputeBudgetInstruction,
    solana_hash::Hash,
    solana_instruction::Instruction,
    solana_message::{AddressLookupTableAccount, VersionedMessage, v0},
    solana_pubkey::Pubkey,
    solana_rpc_client::nonblocking::rpc_client::RpcClient,
    solana_rpc_client_api::config::RpcSimulateTransactionConfig,
    solana_signature::Signature,
    solana_transaction::versioned::VersionedTransaction,
    std::{fmt, str::FromStr},
};

/// Fixed price ladder, in micro-lamports per compute unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PriorityFeeLevel {
    None,
    Low,
    Medium,
    High,
    VeryHigh,
    Max,
}

impl PriorityFeeLevel {
    pub fn micro_lamports(&self) -> u64 {
        match self {
            PriorityFeeLevel::None => 0,
            PriorityFeeLevel::Low => 1_000,
            PriorityFeeLevel::Medium => 10_000,
            PriorityFeeLevel::High => 100_000,
            PriorityFeeLevel::VeryHigh => 1_000_000,
            PriorityFeeLevel::Max => 5_000_000,
        }
    }

    /// Upper bound of the ladder; percentile queries clamp to it.
    pub const CEILING: u64 = 5_000_000;
}

impl fmt::Display for PriorityFeeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PriorityFeeLevel::None => "none",
            PriorityFeeLevel::Low => "low",
            PriorityFeeLevel::Medium => "medium",
            PriorityFeeLevel::High => "high",
            PriorityFeeLevel::VeryHigh => "veryHigh",
            PriorityFeeLevel::Max => "max",
        })
    }
}

impl FromStr for PriorityFeeLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(PriorityFeeLevel::None),
            "low" => Ok(PriorityFeeLevel::Low),
            "medium" => Ok(PriorityFeeLevel::Medium),
            "high" => Ok(PriorityFeeLevel::High),
            "veryHigh" => Ok(PriorityFeeLevel::VeryHigh),
            "max" => Ok(PriorityFeeLevel::Max),
            other => Err(anyhow::anyhow!("unknown priority fee level '{other}'")),
        }
    }
}

/// How the unit price is chosen.
#[derive(Debug, Clone, PartialEq)]
pub enum PriorityFeeConfig {
    Level(PriorityFeeLevel),
    /// Exact micro-lamports per compute unit.
    Exact(u64),
    /// Percentile over `getRecentPrioritizationFees` for the writable set.
    Percentile { percentile: u8 },
}

impl Default for PriorityFeeConfig {
    fn default() -> Self {
        PriorityFeeConfig::Level(PriorityFeeLevel::Medium)
    }
}

/// How the unit limit is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ComputeUnitLimit {
    /// Simulate, pad by the safety factor, clamp to the network maximum.
    #[default]
    Auto,
    Fixed(u32),
}

/// Resolves the unit price, hitting RPC only for percentile configs.
pub async fn resolve_unit_price(
    rpc: &RpcClient,
    config: &PriorityFeeConfig,
    writable: &[Pubkey],
) -> PipelineResult<u64> {
    match config {
        PriorityFeeConfig::Level(level) => Ok(level.micro_lamports()),
        PriorityFeeConfig::Exact(price) => Ok(*price),
        PriorityFeeConfig::Percentile { percentile } => {
            let fees = rpc.get_recent_prioritization_fees(writable).await?;
            Ok(percentile_fee(
                fees.iter().map(|f| f.prioritization_fee),
                *percentile,
            ))
        }
    }
}

/// Ascending-sort percentile pick over observed fees, clamped to the ladder.
fn percentile_fee(fees: impl Iterator<Item = u64>, percentile: u8) -> u64 {
    let mut observed: Vec<u64> = fees.collect();
    if observed.is_empty() {
        return 0;
    }
    observed.sort_unstable();
    let percentile = percentile.min(100) as usize;
    let index = (observed.len() - 1) * percentile / 100;
    observed[index].min(PriorityFeeLevel::CEILING)
}

/// Resolves the unit limit, simulating when the caller asked for `Auto`.
pub async fn resolve_unit_limit(
    rpc: &RpcClient,
    limit: ComputeUnitLimit,
    payer: &Pubkey,
    instructions: &[Instruction],
    lookup_tables: &[AddressLookupTableAccount],
) -> PipelineResult<u32> {
    match limit {
        ComputeUnitLimit::Fixed(units) => Ok(units.min(MAX_COMPUTE_UNIT_LIMIT)),
        ComputeUnitLimit::Auto => {
            let consumed =
                simulate_consumption(rpc, payer, instructions, lookup_tables).await?;
            let padded = (consumed as f64 * COMPUTE_UNIT_SAFETY_FACTOR).ceil() as u64;
            Ok((padded as u32).min(MAX_COMPUTE_UNIT_LIMIT))
        }
    }
}

/// Pre-flight simulation with a probe message; reports units consumed.
async fn simulate_consumption(
    rpc: &RpcClient,
    payer: &Pubkey,
    instructions: &[Instruction],
    lookup_tables: &[AddressLookupTableAccount],
) -> PipelineResult<u64> {
    // The probe carries the network ceiling so simulation never under-reports.
    let mut probe_instructions =
        Vec::with_capacity(instructions.len() + 1);
    probe_instructions.push(ComputeBudgetInstruction::set_compute_unit_limit(
        MAX_COMPUTE_UNIT_LIMIT,
    ));
    probe_instructions.extend_from_slice(instructions);

    let message = v0::Message::try_compile(payer, &probe_instructions, lookup_tables, Hash::default())
        .map_err(|err| SlipstreamError::SimulationFailed {
            reason: format!("probe compile failed: {err}"),
            logs: Vec::new(),
        })?;
    let transaction = VersionedTransaction {
        signatures: vec![Signature::default(); message.header.num_required_signatures.into()],
        message: VersionedMessage::V0(message),
    };

    let response = rpc
        .simulate_transaction_with_config(
            &transaction,
            RpcSimulateTransactionConfig {
                sig_verify: false,
                replace_recent_blockhash: true,
                ..RpcSimulateTransactionConfig::default()
            },
        )
        .await?;

    if let Some(err) = response.value.err {
        return Err(SlipstreamError::SimulationFailed {
            reason: err.to_string(),
            logs: response.value.logs.unwrap_or_default(),
        });
    }
    let consumed = response
        .value
        .units_consumed
        .unwrap_or(DEFAULT_COMPUTE_UNIT_LIMIT as u64);
    debug!("simulation consumed {consumed} compute units");
    Ok(consumed)
}

/// The two leading compute-budget instructions: unit limit, then unit price.
pub fn budget_instructions(unit_limit: u32, unit_price: u64) -> [Instruction; 2] {
    [
        ComputeBudgetInstruction::set_compute_unit_limit(unit_limit),
        ComputeBudgetInstruction::set_compute_unit_price(unit_price),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_table_matches_ladder() {
        let expected = [
            (PriorityFeeLevel::None, 0),
            (PriorityFeeLevel::Low, 1_000),
            (PriorityFeeLevel::Medium, 10_000),
            (PriorityFeeLevel::High, 100_000),
            (PriorityFeeLevel::VeryHigh, 1_000_000),
            (PriorityFeeLevel::Max, 5_000_000),
        ];
        for (level, micro_lamports) in expected {
            assert_eq!(level.micro_lamports(), micro_lamports, "level {level}");
        }
    }

    #[test]
    fn test_level_round_trips_through_str() {
        for name in ["none", "low", "medium", "high", "veryHigh", "max"] {
            let level: PriorityFeeLevel = name.parse().unwrap();
            assert_eq!(level.to_string(), name);
        }
        assert!("extreme".parse::<PriorityFeeLevel>().is_err());
    }

    #[test]
    fn test_percentile_picks_from_sorted_fees() {
        let fees = [5u64, 1, 9, 3, 7];
        assert_eq!(percentile_fee(fees.iter().copied(), 0), 1);
        assert_eq!(percentile_fee(fees.iter().copied(), 50), 5);
        assert_eq!(percentile_fee(fees.iter().copied(), 100), 9);
    }

    #[test]
    fn test_percentile_clamps_to_ceiling() {
        let fees = [10_000_000u64];
        assert_eq!(
            percentile_fee(fees.iter().copied(), 100),
            PriorityFeeLevel::CEILING
        );
        assert_eq!(percentile_fee(std::iter::empty(), 50), 0);
    }

    #[test]
    fn test_budget_instructions_lead_with_unit_limit() {
        let [limit_ix, price_ix] = budget_instructions(600_000, 10_000);
        assert_eq!(limit_ix.program_id, solana_sdk_ids::compute_budget::id());
        assert_eq!(price_ix.program_id, solana_sdk_ids::compute_budget::id());
        assert_ne!(limit_ix.data, price_ix.data);
    }
}
