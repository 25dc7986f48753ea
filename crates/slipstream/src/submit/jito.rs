use {
    crate::{
        constants::JITO_TIP_ACCOUNTS,
        error::{PipelineResult, SlipstreamError},
        helpers::encode_base64,
    },
    log::debug,
    serde::Deserialize,
    solana_instruction::Instruction,
    solana_pubkey::Pubkey,
    solana_system_interface::instruction as system_instruction,
    std::{fmt, str::FromStr, time::Duration},
};

/// Block-engine region. `Mainnet` is the auto-balanced global endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JitoRegion {
    #[default]
    Mainnet,
    Ny,
    Amsterdam,
    Frankfurt,
    Tokyo,
    Singapore,
    Slc,
}

impl JitoRegion {
    pub fn endpoint(&self) -> &'static str {
        match self {
            JitoRegion::Mainnet => "https://mainnet.block-engine.jito.wtf",
            JitoRegion::Ny => "https://ny.mainnet.block-engine.jito.wtf",
            JitoRegion::Amsterdam => "https://amsterdam.mainnet.block-engine.jito.wtf",
            JitoRegion::Frankfurt => "https://frankfurt.mainnet.block-engine.jito.wtf",
            JitoRegion::Tokyo => "https://tokyo.mainnet.block-engine.jito.wtf",
            JitoRegion::Singapore => "https://singapore.mainnet.block-engine.jito.wtf",
            JitoRegion::Slc => "https://slc.mainnet.block-engine.jito.wtf",
        }
    }
}

impl fmt::Display for JitoRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            JitoRegion::Mainnet => "mainnet",
            JitoRegion::Ny => "ny",
            JitoRegion::Amsterdam => "amsterdam",
            JitoRegion::Frankfurt => "frankfurt",
            JitoRegion::Tokyo => "tokyo",
            JitoRegion::Singapore => "singapore",
            JitoRegion::Slc => "slc",
        })
    }
}

impl FromStr for JitoRegion {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mainnet" => Ok(JitoRegion::Mainnet),
            "ny" => Ok(JitoRegion::Ny),
            "amsterdam" => Ok(JitoRegion::Amsterdam),
            "frankfurt" => Ok(JitoRegion::Frankfurt),
            "tokyo" => Ok(JitoRegion::Tokyo),
            "singapore" => Ok(JitoRegion::Singapore),
            "slc" => Ok(JitoRegion::Slc),
            other => Err(anyhow::anyhow!("unknown jito region '{other}'")),
        }
    }
}

/// Terminal or pending state of a submitted bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BundleState {
    Pending,
    Landed,
    Failed,
    Dropped,
}

impl BundleState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, BundleState::Pending)
    }
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct InflightStatusesValue {
    value: Vec<InflightStatus>,
}

#[derive(Debug, Deserialize)]
struct InflightStatus {
    bundle_id: String,
    status: String,
}

/// Minimal block-engine client: `sendBundle` plus inflight status polling
/// over plain JSON-RPC.
pub struct JitoClient {
    http: reqwest::Client,
    endpoint: String,
    uuid: Option<String>,
}

impl JitoClient {
    pub fn new(region: JitoRegion, uuid: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: format!("{}/api/v1/bundles", region.endpoint()),
            uuid,
        }
    }

    /// Custom endpoint, for tests and self-hosted relays.
    pub fn with_endpoint(endpoint: impl Into<String>, uuid: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
            uuid,
        }
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> PipelineResult<T> {
        let mut url = self.endpoint.clone();
        if let Some(uuid) = &self.uuid {
            url = format!("{url}?uuid={uuid}");
        }
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response = self
            .http
            .post(&url)
            .json(&body)
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map_err(|err| SlipstreamError::RpcStatus {
                status: err.status().map(|s| s.as_u16()).unwrap_or(0),
                body: err.to_string(),
            })?;
        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SlipstreamError::RpcStatus { status, body });
        }

        let parsed: JsonRpcResponse<T> =
            response
                .json()
                .await
                .map_err(|err| SlipstreamError::RpcStatus {
                    status,
                    body: err.to_string(),
                })?;
        if let Some(error) = parsed.error {
            return Err(SlipstreamError::BundleRejected {
                status: format!("{} ({})", error.message, error.code),
            });
        }
        parsed.result.ok_or(SlipstreamError::RpcStatus {
            status,
            body: "empty json-rpc result".to_string(),
        })
    }

    /// Submits one bundle (tip transaction first when present) and returns
    /// the block-engine bundle id.
    pub async fn send_bundle(&self, transactions: &[Vec<u8>]) -> PipelineResult<String> {
        let encoded: Vec<serde_json::Value> = transactions
            .iter()
            .map(|wire| serde_json::Value::String(encode_base64(wire)))
            .collect();
        let params = serde_json::json!([encoded, {"encoding": "base64"}]);

        let bundle_id: String = self.call("sendBundle", params).await?;
        debug!("bundle {bundle_id} submitted");
        Ok(bundle_id)
    }

    /// One inflight-status poll for a bundle id.
    pub async fn bundle_state(&self, bundle_id: &str) -> PipelineResult<BundleState> {
        let params = serde_json::json!([[bundle_id]]);
        let statuses: InflightStatusesValue =
            self.call("getInflightBundleStatuses", params).await?;

        let state = statuses
            .value
            .iter()
            .find(|status| status.bundle_id == bundle_id)
            .map(|status| match status.status.as_str() {
                "Landed" => BundleState::Landed,
                "Failed" => BundleState::Failed,
                "Invalid" => BundleState::Dropped,
                _ => BundleState::Pending,
            })
            .unwrap_or(BundleState::Pending);
        Ok(state)
    }
}

/// Tip transfer instruction; the account is picked deterministically from
/// the seed so repeat bundles spread across the tip set.
pub fn tip_instruction(payer: &Pubkey, tip_lamports: u64, seed: u64) -> Instruction {
    let account = &JITO_TIP_ACCOUNTS[(seed as usize) % JITO_TIP_ACCOUNTS.len()];
    system_instruction::transfer(payer, account, tip_lamports)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_endpoint_map_is_fixed() {
        let cases = [
            (JitoRegion::Mainnet, "https://mainnet.block-engine.jito.wtf"),
            (JitoRegion::Ny, "https://ny.mainnet.block-engine.jito.wtf"),
            (JitoRegion::Slc, "https://slc.mainnet.block-engine.jito.wtf"),
        ];
        for (region, endpoint) in cases {
            assert_eq!(region.endpoint(), endpoint);
        }
    }

    #[test]
    fn test_region_round_trips_through_str() {
        for name in [
            "mainnet",
            "ny",
            "amsterdam",
            "frankfurt",
            "tokyo",
            "singapore",
            "slc",
        ] {
            let region: JitoRegion = name.parse().unwrap();
            assert_eq!(region.to_string(), name);
        }
    }

    #[test]
    fn test_tip_instruction_rotates_accounts() {
        let payer = Pubkey::new_unique();
        let first = tip_instruction(&payer, 1_000, 0);
        let second = tip_instruction(&payer, 1_000, 1);
        assert_ne!(
            first.accounts[1].pubkey, second.accounts[1].pubkey,
            "consecutive seeds should pick different tip accounts"
        );
    }

    #[test]
    fn test_bundle_state_terminality() {
        assert!(!BundleState::Pending.is_terminal());
        assert!(BundleState::Landed.is_terminal());
        assert!(BundleState::Dropped.is_terminal());
    }
}
