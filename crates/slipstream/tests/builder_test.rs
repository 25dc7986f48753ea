/// Transaction builder tests: size accounting, signer completeness, the
/// oversize bound, and deterministic output for pinned blockhashes.
use {
    slipstream::{
        ComputeUnitLimit, PriorityFeeLevel, SlipstreamError, TransactionBuilder,
        constants::{PACKET_DATA_SIZE, SPL_TOKEN_PROGRAM_ID},
        graph::nodes::derive_associated_token_address,
    },
    solana_hash::Hash,
    solana_instruction::{AccountMeta, Instruction},
    solana_keypair::{Keypair, Signer},
    solana_message::{VersionedMessage, v0},
    solana_pubkey::Pubkey,
    solana_rpc_client::nonblocking::rpc_client::RpcClient,
    solana_system_interface::instruction as system_instruction,
    solana_transaction::versioned::VersionedTransaction,
    std::sync::Arc,
};

fn offline_rpc() -> RpcClient {
    RpcClient::new("http://localhost:8899".to_string())
}

/// Hand-rolled TransferChecked with unique accounts, to inflate size.
fn token_transfer_instruction(owner: &Pubkey) -> Instruction {
    let mint = Keypair::new().pubkey();
    let destination_owner = Keypair::new().pubkey();
    let source = derive_associated_token_address(owner, &SPL_TOKEN_PROGRAM_ID, &mint);
    let destination =
        derive_associated_token_address(&destination_owner, &SPL_TOKEN_PROGRAM_ID, &mint);

    let mut data = vec![12u8];
    data.extend_from_slice(&1_000u64.to_le_bytes());
    data.push(6);
    Instruction::new_with_bytes(
        SPL_TOKEN_PROGRAM_ID,
        &data,
        vec![
            AccountMeta::new(source, false),
            AccountMeta::new_readonly(mint, false),
            AccountMeta::new(destination, false),
            AccountMeta::new_readonly(*owner, true),
        ],
    )
}

#[tokio::test]
async fn test_twelve_token_transfers_overflow_the_packet() {
    let payer = Keypair::new();
    let owner = payer.pubkey();
    let instructions: Vec<Instruction> =
        (0..12).map(|_| token_transfer_instruction(&owner)).collect();

    let builder = TransactionBuilder::new()
        .with_fee_payer(Arc::new(payer))
        .add_instructions(instructions)
        .with_priority_fee(PriorityFeeLevel::Medium)
        .with_compute_units(ComputeUnitLimit::Fixed(600_000))
        .with_blockhash_lifetime(Hash::new_from_array([7u8; 32]), u64::MAX);

    let info = builder.size_info().unwrap();
    assert!(info.size > PACKET_DATA_SIZE, "probe size {}", info.size);
    assert!(!info.can_fit_more);
    assert_eq!(info.remaining, 0);

    // build_signed fails on the size bound before any submission happens.
    let error = builder.build_signed(&offline_rpc()).await.unwrap_err();
    match error {
        SlipstreamError::TransactionTooLarge { excess } => {
            assert!(excess > 0, "excess byte count must be positive");
        }
        other => panic!("expected TransactionTooLarge, got {other:?}"),
    }
}

#[tokio::test]
async fn test_missing_signer_is_detected_before_submission() {
    let payer = Keypair::new();
    let payer_pubkey = payer.pubkey();
    let second_signer = Keypair::new().pubkey();

    // An instruction demanding a signature nobody can provide.
    let instruction = Instruction::new_with_bytes(
        Pubkey::new_unique(),
        &[0],
        vec![
            AccountMeta::new(payer_pubkey, true),
            AccountMeta::new_readonly(second_signer, true),
        ],
    );
    let builder = TransactionBuilder::new()
        .with_fee_payer(Arc::new(payer))
        .add_instruction(instruction)
        .with_compute_units(ComputeUnitLimit::Fixed(200_000))
        .with_blockhash_lifetime(Hash::new_from_array([7u8; 32]), u64::MAX);

    let error = builder.build_signed(&offline_rpc()).await.unwrap_err();
    match error {
        SlipstreamError::SignerMissing { account } => assert_eq!(account, second_signer),
        other => panic!("expected SignerMissing, got {other:?}"),
    }
}

#[test]
fn test_pinned_blockhash_yields_byte_identical_messages() {
    let payer = Keypair::new();
    let payer_pubkey = payer.pubkey();
    let destination = Pubkey::new_unique();
    let blockhash = Hash::new_from_array([7u8; 32]);

    let build = || {
        let instructions =
            vec![system_instruction::transfer(&payer_pubkey, &destination, 42)];
        let message =
            v0::Message::try_compile(&payer_pubkey, &instructions, &[], blockhash).unwrap();
        let message = VersionedMessage::V0(message);
        let signature = payer.sign_message(&message.serialize());
        bincode::serialize(&VersionedTransaction {
            signatures: vec![signature],
            message,
        })
        .unwrap()
    };

    assert_eq!(build(), build(), "same inputs must produce identical wire");
}

#[test]
fn test_signature_count_matches_declared_signers() {
    let payer = Keypair::new();
    let payer_pubkey = payer.pubkey();
    let co_signer = Keypair::new();
    let co_pubkey = co_signer.pubkey();

    let instruction = Instruction::new_with_bytes(
        Pubkey::new_unique(),
        &[7],
        vec![
            AccountMeta::new(payer_pubkey, true),
            AccountMeta::new_readonly(co_pubkey, true),
        ],
    );
    let message =
        v0::Message::try_compile(&payer_pubkey, &[instruction], &[], Hash::new_from_array([7u8; 32])).unwrap();
    assert_eq!(message.header.num_required_signatures, 2);
    assert_eq!(
        message.account_keys[0], payer_pubkey,
        "fee payer is account zero, so it signs first"
    );
}
