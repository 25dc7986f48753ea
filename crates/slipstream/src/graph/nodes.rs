use {
    super::{GraphNode, NodeKind, PortValue},
    crate::{
        artifact::TokenTransfer,
        constants::{
            ASSOCIATED_TOKEN_PROGRAM_ID, MEMO_PROGRAM_ID, NATIVE_DECIMALS, SPL_TOKEN_PROGRAM_ID,
        },
        context::CompileContext,
        helpers::parse_amount,
        swap::{self, SwapRequest},
        types::ExecutionProfile,
    },
    anyhow::{Context, anyhow},
    log::debug,
    solana_instruction::{AccountMeta, Instruction},
    solana_pubkey::Pubkey,
    solana_system_interface::instruction as system_instruction,
    std::{collections::HashMap, str::FromStr},
};

// Per-node compute-unit hints, padded the way chain-side costs run.
const CU_TRANSFER_NATIVE: u32 = 450;
const CU_TRANSFER_TOKEN: u32 = 6_000;
const CU_CREATE_ATA: u32 = 25_000;
const CU_MEMO: u32 = 3_000;

/// SPL-Token `TransferChecked` discriminant.
const TOKEN_IX_TRANSFER_CHECKED: u8 = 12;

/// Associated-token-account `CreateIdempotent` discriminant.
const ATA_IX_CREATE_IDEMPOTENT: u8 = 1;

/// Everything one node contributes to the artifact.
#[derive(Debug, Default)]
pub struct NodeOutput {
    pub instructions: Vec<Instruction>,
    pub compute_units: u32,
    pub lookup_tables: Vec<Pubkey>,
    pub native_transfer: u64,
    pub token_transfers: Vec<TokenTransfer>,
    pub outputs: HashMap<String, PortValue>,
    pub profile: Option<ExecutionProfile>,
}

/// Associated-token-address derivation: seeds are exactly
/// {owner, token-program, mint}, in that order.
pub fn derive_associated_token_address(
    owner: &Pubkey,
    token_program: &Pubkey,
    mint: &Pubkey,
) -> Pubkey {
    Pubkey::find_program_address(
        &[owner.as_ref(), token_program.as_ref(), mint.as_ref()],
        &ASSOCIATED_TOKEN_PROGRAM_ID,
    )
    .0
}

/// Compiles one node. Pure in {data, resolved inputs, ctx}; the only
/// suspension is the swap adapter's network round-trip.
pub(crate) async fn compile_node(
    node: &GraphNode,
    inputs: &HashMap<String, PortValue>,
    ctx: &CompileContext,
) -> anyhow::Result<NodeOutput> {
    match node.kind {
        NodeKind::Wallet => compile_wallet(ctx),
        NodeKind::TransferNative => compile_transfer_native(node, inputs, ctx),
        NodeKind::TransferToken => compile_transfer_token(node, inputs, ctx),
        NodeKind::CreateAssociatedAccount => compile_create_ata(node, inputs, ctx),
        NodeKind::Swap => compile_swap(node, ctx).await,
        NodeKind::Memo => compile_memo(node, ctx),
        NodeKind::ExecuteConfig => compile_execute_config(node),
    }
}

fn compile_wallet(ctx: &CompileContext) -> anyhow::Result<NodeOutput> {
    Ok(NodeOutput {
        outputs: HashMap::from([(
            "address".to_string(),
            PortValue::Address(*ctx.wallet()),
        )]),
        ..NodeOutput::default()
    })
}

fn resolve_address(
    node: &GraphNode,
    inputs: &HashMap<String, PortValue>,
    ctx: &CompileContext,
    port: &str,
    field: &str,
) -> Option<Pubkey> {
    if let Some(value) = inputs.get(port) {
        return value.as_address();
    }
    if let Some(text) = node.field_str(field)
        && let Ok(address) = Pubkey::from_str(text.trim())
    {
        return Some(address);
    }
    node.defaults_from_wallet(port).then(|| *ctx.wallet())
}

fn compile_transfer_native(
    node: &GraphNode,
    inputs: &HashMap<String, PortValue>,
    ctx: &CompileContext,
) -> anyhow::Result<NodeOutput> {
    let source = resolve_address(node, inputs, ctx, "source", "source")
        .unwrap_or_else(|| *ctx.wallet());
    let Some(destination) = resolve_address(node, inputs, ctx, "destination", "destination")
    else {
        debug!("transfer-native '{}' has no destination, skipping", node.id);
        return Ok(NodeOutput::default());
    };
    let Some(lamports) = node
        .field_str("amount")
        .and_then(|amount| parse_amount(amount, NATIVE_DECIMALS))
    else {
        debug!("transfer-native '{}' amount unparseable, skipping", node.id);
        return Ok(NodeOutput::default());
    };

    Ok(NodeOutput {
        instructions: vec![system_instruction::transfer(&source, &destination, lamports)],
        compute_units: CU_TRANSFER_NATIVE,
        native_transfer: lamports,
        outputs: HashMap::from([("source".to_string(), PortValue::Address(source))]),
        ..NodeOutput::default()
    })
}

fn compile_transfer_token(
    node: &GraphNode,
    inputs: &HashMap<String, PortValue>,
    ctx: &CompileContext,
) -> anyhow::Result<NodeOutput> {
    let owner = resolve_address(node, inputs, ctx, "source", "source")
        .unwrap_or_else(|| *ctx.wallet());
    let (Some(destination_owner), Some(mint)) = (
        resolve_address(node, inputs, ctx, "destination", "destination"),
        node.field_str("mint")
            .and_then(|text| Pubkey::from_str(text.trim()).ok()),
    ) else {
        debug!("transfer-token '{}' underspecified, skipping", node.id);
        return Ok(NodeOutput::default());
    };
    let decimals = node.field_u64("decimals").unwrap_or(0) as u8;
    let Some(base_units) = node
        .field_str("amount")
        .and_then(|amount| parse_amount(amount, decimals))
    else {
        debug!("transfer-token '{}' amount unparseable, skipping", node.id);
        return Ok(NodeOutput::default());
    };
    let token_program = node
        .field_str("tokenProgram")
        .and_then(|text| Pubkey::from_str(text.trim()).ok())
        .unwrap_or(SPL_TOKEN_PROGRAM_ID);

    let source_ata = derive_associated_token_address(&owner, &token_program, &mint);
    let destination_ata =
        derive_associated_token_address(&destination_owner, &token_program, &mint);

    let mut data = Vec::with_capacity(10);
    data.push(TOKEN_IX_TRANSFER_CHECKED);
    data.extend_from_slice(&base_units.to_le_bytes());
    data.push(decimals);
    let instruction = Instruction::new_with_bytes(
        token_program,
        &data,
        vec![
            AccountMeta::new(source_ata, false),
            AccountMeta::new_readonly(mint, false),
            AccountMeta::new(destination_ata, false),
            AccountMeta::new_readonly(owner, true),
        ],
    );

    Ok(NodeOutput {
        instructions: vec![instruction],
        compute_units: CU_TRANSFER_TOKEN,
        token_transfers: vec![TokenTransfer {
            mint,
            base_units,
            decimals,
        }],
        outputs: HashMap::from([("source".to_string(), PortValue::Address(source_ata))]),
        ..NodeOutput::default()
    })
}

fn compile_create_ata(
    node: &GraphNode,
    inputs: &HashMap<String, PortValue>,
    ctx: &CompileContext,
) -> anyhow::Result<NodeOutput> {
    let payer = resolve_address(node, inputs, ctx, "payer", "payer")
        .unwrap_or_else(|| *ctx.wallet());
    let owner = node
        .field_str("owner")
        .and_then(|text| Pubkey::from_str(text.trim()).ok())
        .unwrap_or(*ctx.wallet());
    let Some(mint) = node
        .field_str("mint")
        .and_then(|text| Pubkey::from_str(text.trim()).ok())
    else {
        debug!("create-associated-account '{}' has no mint, skipping", node.id);
        return Ok(NodeOutput::default());
    };
    let token_program = node
        .field_str("tokenProgram")
        .and_then(|text| Pubkey::from_str(text.trim()).ok())
        .unwrap_or(SPL_TOKEN_PROGRAM_ID);

    let ata = derive_associated_token_address(&owner, &token_program, &mint);
    // CreateIdempotent: duplicate creation is a no-op on-chain.
    let instruction = Instruction::new_with_bytes(
        ASSOCIATED_TOKEN_PROGRAM_ID,
        &[ATA_IX_CREATE_IDEMPOTENT],
        vec![
            AccountMeta::new(payer, true),
            AccountMeta::new(ata, false),
            AccountMeta::new_readonly(owner, false),
            AccountMeta::new_readonly(mint, false),
            AccountMeta::new_readonly(solana_sdk_ids::system_program::id(), false),
            AccountMeta::new_readonly(token_program, false),
        ],
    );

    Ok(NodeOutput {
        instructions: vec![instruction],
        compute_units: CU_CREATE_ATA,
        outputs: HashMap::from([("account".to_string(), PortValue::Address(ata))]),
        ..NodeOutput::default()
    })
}

async fn compile_swap(node: &GraphNode, ctx: &CompileContext) -> anyhow::Result<NodeOutput> {
    let adapter = ctx
        .swap_adapter()
        .ok_or_else(|| anyhow!("swap node '{}' requires a swap adapter", node.id))?;

    let (Some(input_mint), Some(output_mint), Some(amount)) = (
        node.field_str("inputMint")
            .and_then(|text| Pubkey::from_str(text.trim()).ok()),
        node.field_str("outputMint")
            .and_then(|text| Pubkey::from_str(text.trim()).ok()),
        node.field_u64("amount"),
    ) else {
        debug!("swap '{}' underspecified, skipping", node.id);
        return Ok(NodeOutput::default());
    };
    let slippage_bps = node.field_u64("slippageBps").unwrap_or(50) as u16;

    let request = SwapRequest {
        input_mint,
        output_mint,
        amount,
        slippage_bps,
    };
    // Quote failures surface as compilation errors; the pipeline never
    // retries a node compile.
    let quote = adapter
        .build_swap(request, ctx)
        .await
        .with_context(|| format!("swap adapter failed for node '{}'", node.id))?;
    swap::verify_quote(&quote, ctx.signer())?;

    let decimals = node.field_u64("decimals").unwrap_or(0) as u8;
    Ok(NodeOutput {
        instructions: quote.instructions,
        compute_units: quote.compute_units.unwrap_or(0),
        lookup_tables: quote.lookup_tables,
        token_transfers: vec![TokenTransfer {
            mint: input_mint,
            base_units: amount,
            decimals,
        }],
        outputs: HashMap::from([(
            "quote".to_string(),
            PortValue::Text(quote.metadata.to_string()),
        )]),
        ..NodeOutput::default()
    })
}

fn compile_memo(node: &GraphNode, ctx: &CompileContext) -> anyhow::Result<NodeOutput> {
    let Some(message) = node.field_str("message").filter(|text| !text.is_empty()) else {
        debug!("memo '{}' has no message, skipping", node.id);
        return Ok(NodeOutput::default());
    };

    let instruction = Instruction::new_with_bytes(
        MEMO_PROGRAM_ID,
        message.as_bytes(),
        vec![AccountMeta::new_readonly(*ctx.wallet(), true)],
    );
    Ok(NodeOutput {
        instructions: vec![instruction],
        compute_units: CU_MEMO,
        ..NodeOutput::default()
    })
}

fn compile_execute_config(node: &GraphNode) -> anyhow::Result<NodeOutput> {
    let mut profile = ExecutionProfile::default();
    if let Some(strategy) = node.field_str("strategy") {
        profile.strategy = strategy.parse()?;
    }
    if let Some(fanout) = node.field_u64("fanout") {
        profile.fanout = fanout as usize;
    }
    if let Some(region) = node.field_str("region") {
        profile.region = region.parse()?;
    }
    if let Some(tip) = node.field_u64("tipLamports") {
        profile.tip_lamports = tip;
    }

    Ok(NodeOutput {
        outputs: HashMap::from([(
            "profile".to_string(),
            PortValue::Profile(profile.clone()),
        )]),
        profile: Some(profile),
        ..NodeOutput::default()
    })
}

#[cfg(test)]
mod tests {
    use {super::*, crate::constants::SPL_TOKEN_PROGRAM_ID};

    #[test]
    fn test_ata_derivation_uses_owner_program_mint_seed_order() {
        let owner = Pubkey::new_unique();
        let mint = Pubkey::new_unique();

        let derived = derive_associated_token_address(&owner, &SPL_TOKEN_PROGRAM_ID, &mint);
        let (expected, _) = Pubkey::find_program_address(
            &[
                owner.as_ref(),
                SPL_TOKEN_PROGRAM_ID.as_ref(),
                mint.as_ref(),
            ],
            &ASSOCIATED_TOKEN_PROGRAM_ID,
        );
        assert_eq!(derived, expected);

        // Swapping seed order must change the address.
        let (swapped, _) = Pubkey::find_program_address(
            &[
                mint.as_ref(),
                SPL_TOKEN_PROGRAM_ID.as_ref(),
                owner.as_ref(),
            ],
            &ASSOCIATED_TOKEN_PROGRAM_ID,
        );
        assert_ne!(derived, swapped);
    }
}
