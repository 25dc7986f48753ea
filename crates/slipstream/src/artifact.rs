use {
    crate::{graph::PortValue, types::ExecutionProfile},
    solana_instruction::Instruction,
    solana_pubkey::Pubkey,
    std::collections::HashMap,
};

/// One token movement recorded for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenTransfer {
    pub mint: Pubkey,
    pub base_units: u64,
    pub decimals: u8,
}

/// Aggregated value movement across the whole artifact.
#[derive(Debug, Clone, Default)]
pub struct TransferSummary {
    pub native_lamports: u64,
    pub tokens: Vec<TokenTransfer>,
}

impl TransferSummary {
    pub(crate) fn record_native(&mut self, lamports: u64) {
        self.native_lamports += lamports;
    }

    pub(crate) fn record_token(&mut self, transfer: TokenTransfer) {
        self.tokens.push(transfer);
    }
}

/// Output of one graph compilation. Produced atomically; never mutated.
#[derive(Debug, Clone, Default)]
pub struct CompiledArtifact {
    pub(crate) instructions: Vec<Instruction>,
    pub(crate) compute_unit_hint: u32,
    pub(crate) lookup_tables: Vec<Pubkey>,
    pub(crate) transfers: TransferSummary,
    pub(crate) profile: Option<ExecutionProfile>,
    pub(crate) node_outputs: HashMap<String, HashMap<String, PortValue>>,
}

impl CompiledArtifact {
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn into_instructions(self) -> Vec<Instruction> {
        self.instructions
    }

    /// Sum of per-node compute-unit hints.
    pub fn compute_unit_hint(&self) -> u32 {
        self.compute_unit_hint
    }

    pub fn lookup_tables(&self) -> &[Pubkey] {
        &self.lookup_tables
    }

    pub fn transfers(&self) -> &TransferSummary {
        &self.transfers
    }

    /// Execute-config output, when the graph carried one.
    pub fn profile(&self) -> Option<&ExecutionProfile> {
        self.profile.as_ref()
    }

    /// Output ports published by a node during compilation.
    pub fn node_output(&self, node_id: &str, port: &str) -> Option<&PortValue> {
        self.node_outputs.get(node_id)?.get(port)
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}
