use {
    crate::context::CompileContext,
    async_trait::async_trait,
    solana_instruction::Instruction,
    solana_pubkey::Pubkey,
};

#[derive(Debug, Clone)]
pub struct SwapRequest {
    pub input_mint: Pubkey,
    pub output_mint: Pubkey,
    /// Input-side amount in base units.
    pub amount: u64,
    pub slippage_bps: u16,
}

/// What an adapter hands back for one swap: ready-to-append instructions
/// plus the metadata the pipeline folds into the artifact.
#[derive(Debug, Clone)]
pub struct SwapQuote {
    pub instructions: Vec<Instruction>,
    pub compute_units: Option<u32>,
    pub lookup_tables: Vec<Pubkey>,
    /// Route/price details, opaque to the pipeline, surfaced for display.
    pub metadata: serde_json::Value,
}

/// External swap integration point. Adapters own quoting and instruction
/// construction; the pipeline only checks the contract below.
#[async_trait]
pub trait SwapAdapter: Send + Sync {
    async fn build_swap(
        &self,
        request: SwapRequest,
        ctx: &CompileContext,
    ) -> anyhow::Result<SwapQuote>;
}

/// Contract check applied to every adapter result: any signer-flagged
/// account in the returned instructions must be the compiling signer.
/// Lookup-table resolvability is checked later, at build time.
pub(crate) fn verify_quote(quote: &SwapQuote, signer: &Pubkey) -> anyhow::Result<()> {
    for instruction in &quote.instructions {
        for account in &instruction.accounts {
            if account.is_signer && account.pubkey != *signer {
                anyhow::bail!(
                    "swap adapter instruction requires foreign signer {}",
                    account.pubkey
                );
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use {super::*, solana_instruction::AccountMeta};

    #[test]
    fn test_verify_quote_rejects_foreign_signer() {
        let signer = Pubkey::new_unique();
        let foreign = Pubkey::new_unique();
        let quote = SwapQuote {
            instructions: vec![Instruction::new_with_bytes(
                Pubkey::new_unique(),
                &[1, 2, 3],
                vec![AccountMeta::new(foreign, true)],
            )],
            compute_units: None,
            lookup_tables: vec![],
            metadata: serde_json::Value::Null,
        };

        assert!(verify_quote(&quote, &signer).is_err());
        assert!(verify_quote(&quote, &foreign).is_ok());
    }
}
