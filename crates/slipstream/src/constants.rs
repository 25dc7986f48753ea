use {solana_pubkey::Pubkey, std::time::Duration};

pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Native SOL uses nine decimal places.
pub const NATIVE_DECIMALS: u8 = 9;

/// Hard wire-size ceiling for a serialized transaction packet.
pub const PACKET_DATA_SIZE: usize = 1232;

/// Network ceiling for a per-transaction compute-unit limit.
pub const MAX_COMPUTE_UNIT_LIMIT: u32 = 1_400_000;

/// Simulated consumption is padded by this factor before becoming the limit.
pub const COMPUTE_UNIT_SAFETY_FACTOR: f64 = 1.2;

/// Fallback unit limit when neither the caller nor simulation provides one.
pub const DEFAULT_COMPUTE_UNIT_LIMIT: u32 = 200_000;

/// Nominal slot duration; the resubmission loop runs at this cadence.
pub const SLOT_DURATION: Duration = Duration::from_millis(400);

/// Signed transactions stay landable for roughly this many slots.
pub const MAX_BLOCKHASH_AGE_SLOTS: u64 = 150;

/// Cooperative cancellation must settle within this bound.
pub const CANCEL_GRACE: Duration = Duration::from_millis(50);

pub const MEMO_PROGRAM_ID: Pubkey =
    Pubkey::from_str_const("MemoSq4gqABAXKb96qnH8TysNcWxMyWCqXgDLGmfcHr");

pub const SPL_TOKEN_PROGRAM_ID: Pubkey =
    Pubkey::from_str_const("TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA");

pub const ASSOCIATED_TOKEN_PROGRAM_ID: Pubkey =
    Pubkey::from_str_const("ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL");

/// Well-known block-engine tip accounts; one is picked per bundle.
pub const JITO_TIP_ACCOUNTS: [Pubkey; 8] = [
    Pubkey::from_str_const("96gYZGLnJYVFmbjzopPSU6QiEV5fGqZNyN9nmNhvrZU5"),
    Pubkey::from_str_const("HFqU5x63VTqvQss8hp11i4wVV8bD44PvwucfZ2bU7gRe"),
    Pubkey::from_str_const("Cw8CFyM9FkoMi7K7Crf6HNQqf4uEMzpKw6QNghXLvLkY"),
    Pubkey::from_str_const("ADaUMid9yfUytqMBgopwjb2DTLSokTSzL1zt6iGPaS49"),
    Pubkey::from_str_const("DfXygSm4jCyNCybVYYK6DwvWqjKee8pbDmJGcLWNDXjh"),
    Pubkey::from_str_const("ADuUkR4vqLUMWXxW9gh6D6L8pMSawimctcNZ5pGwDcEt"),
    Pubkey::from_str_const("DttWaMuVvTiduZRnguLF7jNxTgiMBZ1hyAumKUiL2KRL"),
    Pubkey::from_str_const("3AVi9Tg9Uo68tJfuvoKvqKNWKkC5wPdSSdeBnizKZ6jT"),
];
