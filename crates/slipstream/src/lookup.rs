use {
    crate::error::PipelineResult,
    log::warn,
    solana_address_lookup_table_interface::state::AddressLookupTable,
    solana_instruction::Instruction,
    solana_message::AddressLookupTableAccount,
    solana_pubkey::Pubkey,
    solana_rpc_client::nonblocking::rpc_client::RpcClient,
    std::collections::HashSet,
};

/// Referencing a table costs its 32-byte address plus the two index-array
/// length prefixes.
const TABLE_OVERHEAD_BYTES: usize = 34;

/// A key moved into a table shrinks from 32 bytes to a 1-byte index.
const BYTES_SAVED_PER_KEY: usize = 31;

/// Fetches one lookup table's on-chain contents.
pub async fn fetch_lookup_table(
    rpc: &RpcClient,
    address: Pubkey,
) -> PipelineResult<AddressLookupTableAccount> {
    let account = rpc.get_account(&address).await?;
    let table = AddressLookupTable::deserialize(&account.data).map_err(|err| {
        crate::error::SlipstreamError::RpcStatus {
            status: 0,
            body: format!("lookup table {address} deserialize: {err}"),
        }
    })?;
    Ok(AddressLookupTableAccount {
        key: address,
        addresses: table.addresses.to_vec(),
    })
}

/// Keys eligible for compression: non-signer accounts referenced by the
/// instructions. Signers and program ids must stay static.
fn compressible_keys(instructions: &[Instruction]) -> HashSet<Pubkey> {
    instructions
        .iter()
        .flat_map(|instruction| instruction.accounts.iter())
        .filter(|account| !account.is_signer)
        .map(|account| account.pubkey)
        .collect()
}

/// Net byte savings from referencing `table`; negative when the reference
/// overhead outweighs the matched keys.
pub fn table_net_savings(table: &AddressLookupTableAccount, instructions: &[Instruction]) -> i64 {
    let keys = compressible_keys(instructions);
    let matched = table
        .addresses
        .iter()
        .filter(|address| keys.contains(address))
        .count();
    matched as i64 * BYTES_SAVED_PER_KEY as i64 - TABLE_OVERHEAD_BYTES as i64
}

/// Resolves candidate tables and keeps the ones that pay for themselves.
/// A table whose fetch fails is dropped with a warning, never fatal.
pub async fn resolve_lookup_tables(
    rpc: &RpcClient,
    candidates: &[Pubkey],
    instructions: &[Instruction],
) -> Vec<AddressLookupTableAccount> {
    let mut resolved = Vec::with_capacity(candidates.len());
    for address in candidates {
        let table = match fetch_lookup_table(rpc, *address).await {
            Ok(table) => table,
            Err(err) => {
                warn!("dropping lookup table {address}: {err}");
                continue;
            }
        };
        let savings = table_net_savings(&table, instructions);
        if savings > 0 {
            resolved.push(table);
        } else {
            warn!("lookup table {address} saves nothing ({savings} bytes), skipping");
        }
    }
    resolved
}

#[cfg(test)]
mod tests {
    use {super::*, solana_instruction::AccountMeta};

    fn instruction_with_accounts(accounts: Vec<AccountMeta>) -> Instruction {
        Instruction::new_with_bytes(Pubkey::new_unique(), &[0], accounts)
    }

    #[test]
    fn test_single_matched_key_does_not_pay_for_table() {
        let shared = Pubkey::new_unique();
        let instruction =
            instruction_with_accounts(vec![AccountMeta::new(shared, false)]);
        let table = AddressLookupTableAccount {
            key: Pubkey::new_unique(),
            addresses: vec![shared],
        };

        // 31 bytes saved < 34 bytes of reference overhead.
        assert!(table_net_savings(&table, &[instruction]) < 0);
    }

    #[test]
    fn test_two_matched_keys_pay_for_table() {
        let a = Pubkey::new_unique();
        let b = Pubkey::new_unique();
        let instruction = instruction_with_accounts(vec![
            AccountMeta::new(a, false),
            AccountMeta::new_readonly(b, false),
        ]);
        let table = AddressLookupTableAccount {
            key: Pubkey::new_unique(),
            addresses: vec![a, b, Pubkey::new_unique()],
        };

        assert_eq!(table_net_savings(&table, &[instruction]), 2 * 31 - 34);
    }

    #[test]
    fn test_signer_keys_are_never_compressed() {
        let signer = Pubkey::new_unique();
        let instruction = instruction_with_accounts(vec![AccountMeta::new(signer, true)]);
        let table = AddressLookupTableAccount {
            key: Pubkey::new_unique(),
            addresses: vec![signer],
        };

        assert!(table_net_savings(&table, &[instruction]) < 0);
    }
}
