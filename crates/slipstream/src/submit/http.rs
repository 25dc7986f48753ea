use {
    crate::{
        constants::MAX_BLOCKHASH_AGE_SLOTS,
        error::SlipstreamError,
        helpers::decode_wire_transaction,
        submit::engine::{ExecuteRequest, SubmissionEngine},
        types::{ExecutionProfile, SubmissionResult, SubmissionStrategy},
    },
    serde::{Deserialize, Serialize},
    slipstream_tpu::SendOutcome,
};

/// Body of `POST /tpu`.
#[derive(Debug, Clone, Deserialize)]
pub struct TpuSubmitRequest {
    /// Base64-encoded signed transaction.
    pub transaction: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TpuLeaderEntry {
    pub identity: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub success: bool,
    pub latency_ms: u64,
    pub attempts: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

/// Response of `POST /tpu`. Field names are part of the route contract.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TpuSubmitResponse {
    pub delivered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    pub rounds: u64,
    pub total_leaders_sent: u64,
    pub leader_count: usize,
    pub latency_ms: u64,
    pub leaders: Vec<TpuLeaderEntry>,
    pub retry_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TpuSubmitResponse {
    pub fn from_result(result: &SubmissionResult) -> Self {
        let leaders: Vec<TpuLeaderEntry> = result
            .round_log
            .iter()
            .flat_map(|round| round.leaders.iter())
            .map(|leader| TpuLeaderEntry {
                identity: leader.identity.to_string(),
                address: leader.address.map(|addr| addr.to_string()),
                success: leader.outcome == SendOutcome::Delivered,
                latency_ms: leader.latency_ms,
                attempts: leader.attempts,
                error: leader.error.clone(),
                error_code: (leader.outcome != SendOutcome::Delivered)
                    .then(|| leader.outcome.code().to_string()),
            })
            .collect();
        let retry_count: u64 = leaders
            .iter()
            .map(|leader| leader.attempts.saturating_sub(1) as u64)
            .sum();

        Self {
            delivered: result.delivered(),
            confirmed: Some(result.confirmed),
            signature: Some(result.signature.to_string()),
            rounds: result.rounds,
            total_leaders_sent: result.total_leaders_contacted,
            leader_count: leaders.len(),
            latency_ms: result.total_latency_ms,
            leaders,
            retry_count,
            error: result.error.clone(),
        }
    }

    pub fn from_error(error: &SlipstreamError) -> Self {
        Self {
            delivered: false,
            confirmed: Some(false),
            signature: None,
            rounds: 0,
            total_leaders_sent: 0,
            leader_count: 0,
            latency_ms: 0,
            leaders: Vec::new(),
            retry_count: 0,
            error: Some(error.to_string()),
        }
    }
}

/// Transport-agnostic handler behind `POST /tpu`; the outer wrapper owns
/// routing and serialization framing.
pub async fn handle_tpu_submit(
    engine: &SubmissionEngine,
    request: TpuSubmitRequest,
) -> TpuSubmitResponse {
    let transaction = match decode_wire_transaction(&request.transaction) {
        Ok(transaction) => transaction,
        Err(err) => {
            return TpuSubmitResponse::from_error(&SlipstreamError::Signing(err.to_string()));
        }
    };
    let Some(signature) = transaction.signatures.first().copied() else {
        return TpuSubmitResponse::from_error(&SlipstreamError::Signing(
            "transaction carries no signature".to_string(),
        ));
    };

    // The wire blob does not carry its own lifetime bound; the loop is
    // bounded by the maximum blockhash age from the current slot instead.
    let current_slot = engine.rpc().get_slot().await.unwrap_or_default();
    let wire = match bincode::serialize(&transaction) {
        Ok(wire) => wire,
        Err(err) => {
            return TpuSubmitResponse::from_error(&SlipstreamError::Signing(err.to_string()));
        }
    };

    let execute = ExecuteRequest {
        wire,
        signature,
        last_valid_block_height: current_slot + MAX_BLOCKHASH_AGE_SLOTS,
        profile: ExecutionProfile {
            strategy: SubmissionStrategy::Ultra,
            ..ExecutionProfile::default()
        },
        tip_wire: None,
        abort: None,
    };

    match engine.execute(execute).await {
        Ok(result) => TpuSubmitResponse::from_result(&result),
        Err(err) => TpuSubmitResponse::from_error(&err),
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::types::{ConfirmationChannel, SubmissionRound},
        solana_signature::Signature,
    };

    #[test]
    fn test_response_shape_matches_route_contract() {
        let result = SubmissionResult {
            confirmed: true,
            signature: Signature::default(),
            rounds: 2,
            total_leaders_contacted: 10,
            total_latency_ms: 812,
            round_log: vec![
                SubmissionRound::without_leaders(1, 0),
                SubmissionRound::without_leaders(2, 400),
            ],
            channel: Some(ConfirmationChannel::Subscription),
            error: None,
        };

        let response = TpuSubmitResponse::from_result(&result);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["rounds"], 2);
        assert_eq!(json["totalLeadersSent"], 10);
        assert_eq!(json["latencyMs"], 812);
        assert_eq!(json["retryCount"], 0);
        assert!(json.get("leaderCount").is_some());
        assert!(json.get("delivered").is_some());
    }

    #[test]
    fn test_error_response_carries_message() {
        let response =
            TpuSubmitResponse::from_error(&SlipstreamError::TransactionTooLarge { excess: 9 });
        assert!(!response.delivered);
        assert!(response.error.unwrap().contains("9"));
    }
}
