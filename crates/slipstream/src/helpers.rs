use {
    crate::constants::LAMPORTS_PER_SOL,
    anyhow::{anyhow, bail},
    base64::Engine,
    solana_pubkey::Pubkey,
    solana_transaction::versioned::VersionedTransaction,
    std::str::FromStr,
};

pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / LAMPORTS_PER_SOL as f64
}

pub fn sol_to_lamports(sol: f64) -> u64 {
    (sol * LAMPORTS_PER_SOL as f64) as u64
}

/// Parses a decimal amount string into base units, flooring at the given
/// number of decimal places. Returns `None` for anything non-numeric,
/// negative, or non-finite; the graph treats those nodes as no-ops.
pub fn parse_amount(amount: &str, decimals: u8) -> Option<u64> {
    let trimmed = amount.trim();
    if trimmed.is_empty() {
        return None;
    }
    let value: f64 = trimmed.parse().ok()?;
    if value < 0.0 || !value.is_finite() {
        return None;
    }
    let scaled = value * 10f64.powi(decimals as i32);
    if scaled > u64::MAX as f64 {
        return None;
    }
    Some(scaled.floor() as u64)
}

/// Checked SOL amount for display paths; rejects what a wallet would reject.
#[derive(Debug, Clone, Copy)]
pub struct SolAmount(f64);

impl SolAmount {
    pub fn value(&self) -> f64 {
        self.0
    }

    pub fn to_lamports(&self) -> u64 {
        sol_to_lamports(self.0)
    }
}

impl FromStr for SolAmount {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // The whole u64 lamport range, expressed in SOL.
        const MAX_SOL: f64 = u64::MAX as f64 / LAMPORTS_PER_SOL as f64;

        let trimmed = s.trim();
        let sol: f64 = trimmed
            .parse()
            .map_err(|_| anyhow!("'{trimmed}' is not a numeric SOL amount"))?;
        match sol {
            sol if !sol.is_finite() => bail!("SOL amount cannot be NaN or infinite"),
            sol if sol <= 0.0 => bail!("SOL amount must be above zero, not {sol}"),
            sol if sol > MAX_SOL => {
                bail!("{sol} SOL does not fit in the lamport range (max {MAX_SOL:.0})")
            }
            sol => Ok(SolAmount(sol)),
        }
    }
}

pub fn decode_base64(encoded: &str) -> anyhow::Result<Vec<u8>> {
    base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|e| anyhow!("Failed to decode Base64: {e}"))
}

pub fn decode_base58(encoded: &str) -> anyhow::Result<Vec<u8>> {
    bs58::decode(encoded.trim())
        .into_vec()
        .map_err(|e| anyhow!("Failed to decode Base58: {e}"))
}

pub fn encode_base64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Decodes a base64 wire blob into a versioned transaction.
pub fn decode_wire_transaction(encoded: &str) -> anyhow::Result<VersionedTransaction> {
    let bytes = decode_base64(encoded)?;
    bincode::deserialize(&bytes).map_err(|e| anyhow!("Failed to deserialize transaction: {e}"))
}

pub fn explorer_url(signature: impl std::fmt::Display, cluster: Option<&str>) -> String {
    let cluster = cluster.unwrap_or("mainnet");
    if cluster.eq_ignore_ascii_case("mainnet") || cluster.eq_ignore_ascii_case("mainnet-beta") {
        format!("https://explorer.solana.com/tx/{signature}")
    } else {
        format!("https://explorer.solana.com/tx/{signature}?cluster={cluster}")
    }
}

/// Elides the middle of a base58 address for log lines and round reports.
pub fn abbreviate_pubkey(pk: &Pubkey) -> String {
    let full = pk.to_string();
    let (head, tail) = (&full[..6], &full[full.len() - 4..]);
    format!("{head}…{tail}")
}
