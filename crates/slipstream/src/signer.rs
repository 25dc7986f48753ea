use {
    async_trait::async_trait,
    solana_keypair::{Keypair, Signer},
    solana_pubkey::Pubkey,
    solana_signature::Signature,
};

/// Opaque signing capability. Wallet-backed implementations may suspend
/// (hardware prompt, browser popup); the pipeline never persists one.
#[async_trait]
pub trait TransactionSigner: Send + Sync {
    fn address(&self) -> Pubkey;

    async fn sign(&self, message: &[u8]) -> anyhow::Result<Signature>;
}

#[async_trait]
impl TransactionSigner for Keypair {
    fn address(&self) -> Pubkey {
        self.pubkey()
    }

    async fn sign(&self, message: &[u8]) -> anyhow::Result<Signature> {
        Ok(self.sign_message(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_keypair_signer_roundtrip() -> anyhow::Result<()> {
        let keypair = Keypair::new();
        let message = b"slipstream probe";

        let signature = TransactionSigner::sign(&keypair, message).await?;
        assert_eq!(
            signature,
            keypair.sign_message(message),
            "capability signing matches direct keypair signing"
        );
        assert_eq!(TransactionSigner::address(&keypair), keypair.pubkey());
        Ok(())
    }
}
