use {
    crate::constants::PACKET_DATA_SIZE, solana_pubkey::Pubkey,
    solana_rpc_client_api::client_error::Error as ClientError, thiserror::Error,
};

pub type PipelineResult<T> = Result<T, SlipstreamError>;

/// Everything the pipeline can surface to a caller. Each variant carries a
/// stable discriminator so consumers can branch without string matching.
#[derive(Debug, Error)]
pub enum SlipstreamError {
    #[error("compilation failed at node '{node_id}': {cause}")]
    Compilation { node_id: String, cause: String },

    #[error("missing signer for account {account}")]
    SignerMissing { account: Pubkey },

    #[error("transaction exceeds {PACKET_DATA_SIZE} bytes by {excess}")]
    TransactionTooLarge { excess: usize },

    #[error("blockhash expired after {rounds} submission rounds")]
    BlockhashExpired {
        rounds: u64,
        /// Last observed error per channel, for the terminal report.
        channel_errors: Vec<String>,
    },

    #[error("simulation failed: {reason}")]
    SimulationFailed { reason: String, logs: Vec<String> },

    #[error(transparent)]
    TpuSubmission(#[from] slipstream_tpu::TpuSendError),

    #[error("rpc endpoint returned {status}: {body}")]
    RpcStatus { status: u16, body: String },

    #[error(transparent)]
    Rpc(#[from] ClientError),

    #[error("execution cancelled")]
    Cancelled,

    #[error("bundle rejected with status '{status}'")]
    BundleRejected { status: String },

    #[error("user rejected the request")]
    UserRejected,

    #[error("insufficient funds")]
    InsufficientFunds,

    #[error("signing failed: {0}")]
    Signing(String),
}

impl SlipstreamError {
    /// Stable machine-readable discriminator for each variant.
    pub fn discriminator(&self) -> &'static str {
        match self {
            SlipstreamError::Compilation { .. } => "compilation",
            SlipstreamError::SignerMissing { .. } => "signer-missing",
            SlipstreamError::TransactionTooLarge { .. } => "transaction-too-large",
            SlipstreamError::BlockhashExpired { .. } => "blockhash-expired",
            SlipstreamError::SimulationFailed { .. } => "simulation-failed",
            SlipstreamError::TpuSubmission(_) => "tpu-submission",
            SlipstreamError::RpcStatus { .. } | SlipstreamError::Rpc(_) => "rpc",
            SlipstreamError::Cancelled => "cancelled",
            SlipstreamError::BundleRejected { .. } => "bundle-rejected",
            SlipstreamError::UserRejected => "user-rejected",
            SlipstreamError::InsufficientFunds => "insufficient-funds",
            SlipstreamError::Signing(_) => "signing",
        }
    }

    /// Remaps wallet-level message text onto dedicated variants so consumers
    /// can render friendly text without string-matching twice.
    pub fn from_wallet_message(message: &str) -> Option<Self> {
        let lowered = message.to_ascii_lowercase();
        if lowered.contains("user rejected") || lowered.contains("rejected the request") {
            return Some(SlipstreamError::UserRejected);
        }
        if lowered.contains("insufficient funds") || lowered.contains("insufficient lamports") {
            return Some(SlipstreamError::InsufficientFunds);
        }
        None
    }

    /// Compilation, signer, and size errors are never retried.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SlipstreamError::Compilation { .. }
                | SlipstreamError::SignerMissing { .. }
                | SlipstreamError::TransactionTooLarge { .. }
                | SlipstreamError::Cancelled
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wallet_message_remap() {
        let err = SlipstreamError::from_wallet_message("User rejected the request in wallet")
            .expect("should remap");
        assert!(matches!(err, SlipstreamError::UserRejected));

        let err = SlipstreamError::from_wallet_message("Transfer: insufficient lamports 0, need 5")
            .expect("should remap");
        assert!(matches!(err, SlipstreamError::InsufficientFunds));

        assert!(SlipstreamError::from_wallet_message("custom program error 0x1771").is_none());
    }

    #[test]
    fn test_discriminators_are_stable() {
        let err = SlipstreamError::TransactionTooLarge { excess: 41 };
        assert_eq!(err.discriminator(), "transaction-too-large");
        assert!(err.to_string().contains("41"), "message carries the excess");

        let err = SlipstreamError::BlockhashExpired {
            rounds: 3,
            channel_errors: vec![],
        };
        assert_eq!(err.discriminator(), "blockhash-expired");
        assert!(!err.is_terminal(), "expiry may be retried by caller");
    }

    #[test]
    fn test_terminal_errors_never_retryable() {
        let err = SlipstreamError::SignerMissing {
            account: Pubkey::new_unique(),
        };
        assert!(err.is_terminal());
        assert!(SlipstreamError::Cancelled.is_terminal());
    }
}
