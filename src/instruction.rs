// instruction.rs
use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
};
use solana_system_interface::instruction as system_instruction;

use crate::state::CounterAccount;

/// An ordered set of instructions meant to land in a single transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRequest {
    pub payer: Pubkey,
    pub counter: Pubkey,
    pub program_id: Pubkey,
    /// Whether the first instruction allocates `counter`.
    pub allocates_counter: bool,
    pub instructions: Vec<Instruction>,
}

/// Allocates `new_account` for the counter program and increments it in the same transaction.
///
/// `min_balance` must be the rent-exempt minimum for [`CounterAccount::SIZE`] bytes.
/// Nothing is checked against the cluster here; an already existing `new_account`
/// is rejected at submission time.
pub fn build(
    payer: &Pubkey,
    new_account: &Pubkey,
    program_id: &Pubkey,
    min_balance: u64,
) -> TransactionRequest {
    let create_ix = system_instruction::create_account(
        payer,
        new_account,
        min_balance,
        CounterAccount::size_of() as u64,
        program_id,
    );

    TransactionRequest {
        payer: *payer,
        counter: *new_account,
        program_id: *program_id,
        allocates_counter: true,
        instructions: vec![create_ix, increment_counter(new_account, program_id)],
    }
}

/// Increments an existing counter account.
pub fn build_increment(
    payer: &Pubkey,
    counter: &Pubkey,
    program_id: &Pubkey,
) -> TransactionRequest {
    TransactionRequest {
        payer: *payer,
        counter: *counter,
        program_id: *program_id,
        allocates_counter: false,
        instructions: vec![increment_counter(counter, program_id)],
    }
}

// The counter program takes no instruction data, only the writable counter account
fn increment_counter(counter: &Pubkey, program_id: &Pubkey) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![AccountMeta::new(*counter, false)],
        data: vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_creates_then_increments() {
        let payer = Pubkey::new_unique();
        let counter = Pubkey::new_unique();
        let program_id = Pubkey::new_unique();

        let request = build(&payer, &counter, &program_id, 890_880);

        assert!(request.allocates_counter);
        assert_eq!(request.payer, payer);
        assert_eq!(request.counter, counter);
        assert_eq!(request.instructions.len(), 2);

        let create_ix = &request.instructions[0];
        assert_eq!(create_ix.program_id, solana_system_interface::program::ID);
        assert_eq!(
            create_ix.accounts,
            vec![AccountMeta::new(payer, true), AccountMeta::new(counter, true)]
        );
        // bincode layout: u32 variant tag, lamports, space, owner
        assert_eq!(create_ix.data.len(), 52);
        assert_eq!(create_ix.data[..4], 0u32.to_le_bytes());
        assert_eq!(create_ix.data[4..12], 890_880u64.to_le_bytes());
        assert_eq!(create_ix.data[12..20], 4u64.to_le_bytes());
        assert_eq!(create_ix.data[20..], program_id.to_bytes());

        let increment_ix = &request.instructions[1];
        assert_eq!(increment_ix.program_id, program_id);
        assert_eq!(increment_ix.accounts, vec![AccountMeta::new(counter, false)]);
        assert!(increment_ix.data.is_empty());
    }

    #[test]
    fn build_increment_touches_only_the_counter() {
        let payer = Pubkey::new_unique();
        let counter = Pubkey::new_unique();
        let program_id = Pubkey::new_unique();

        let request = build_increment(&payer, &counter, &program_id);

        assert!(!request.allocates_counter);
        assert_eq!(request.instructions.len(), 1);
        assert_eq!(request.instructions[0].program_id, program_id);
        assert!(request.instructions[0].accounts[0].is_writable);
        assert!(!request.instructions[0].accounts[0].is_signer);
    }
}
