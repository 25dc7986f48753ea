/// Tests for the error taxonomy: stable discriminators, human-readable
/// messages, and wallet-message remapping.
use {slipstream::SlipstreamError, solana_pubkey::Pubkey};

#[test]
fn test_compilation_error_names_the_node() {
    let err = SlipstreamError::Compilation {
        node_id: "swap-1".to_string(),
        cause: "quote timed out".to_string(),
    };
    let message = err.to_string();
    assert!(message.contains("swap-1"), "message: {message}");
    assert!(message.contains("quote timed out"), "message: {message}");
    assert_eq!(err.discriminator(), "compilation");
}

#[test]
fn test_signer_missing_carries_the_account() {
    let account = Pubkey::new_unique();
    let err = SlipstreamError::SignerMissing { account };
    assert!(err.to_string().contains(&account.to_string()));
    assert!(err.is_terminal(), "signer errors are never retried");
}

#[test]
fn test_blockhash_expired_reports_round_count() {
    let err = SlipstreamError::BlockhashExpired {
        rounds: 7,
        channel_errors: vec!["tpu: no-leaders".to_string()],
    };
    assert!(err.to_string().contains("7"));
    assert_eq!(err.discriminator(), "blockhash-expired");
}

#[test]
fn test_bundle_rejected_discriminator() {
    let err = SlipstreamError::BundleRejected {
        status: "Failed".to_string(),
    };
    assert_eq!(err.discriminator(), "bundle-rejected");
    assert!(err.to_string().contains("Failed"));
}

#[test]
fn test_wallet_substring_remap_is_case_insensitive() {
    let remapped =
        SlipstreamError::from_wallet_message("USER REJECTED the request").expect("remaps");
    assert_eq!(remapped.discriminator(), "user-rejected");

    let remapped =
        SlipstreamError::from_wallet_message("Insufficient Funds for rent").expect("remaps");
    assert_eq!(remapped.discriminator(), "insufficient-funds");
}

#[test]
fn test_unrelated_messages_do_not_remap() {
    for message in [
        "custom program error: 0x1",
        "Blockhash not found",
        "account in use",
    ] {
        assert!(
            SlipstreamError::from_wallet_message(message).is_none(),
            "'{message}' should not remap"
        );
    }
}
