#![allow(dead_code)]

use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use counter_client::{
    ClientConfig, ClusterRpc, CounterAccount, CounterClient, RpcError, SignatureStatus,
};
use solana_program::{
    account_info::{next_account_info, AccountInfo},
    entrypoint::ProgramResult,
    msg,
    program_error::ProgramError,
};
use solana_program_test::{
    processor, BanksClient, BanksClientError, ProgramTest, ProgramTestContext,
};
use solana_sdk::{
    account::Account, commitment_config::CommitmentConfig, hash::Hash, pubkey::Pubkey,
    signature::Signature, transaction::Transaction,
};

pub const PROGRAM: Pubkey = Pubkey::new_from_array([7u8; 32]);

// Stand-in for the deployed counter program: bumps the u32 in the first account by one
pub fn process_instruction(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    _instruction_data: &[u8],
) -> ProgramResult {
    let accounts_iter = &mut accounts.iter();
    let account = next_account_info(accounts_iter)?;
    if account.owner != program_id {
        msg!("Counter account does not have the correct program id");
        return Err(ProgramError::IncorrectProgramId);
    }

    let count = CounterAccount::decode(&account.data.borrow())
        .map_err(|_| ProgramError::InvalidAccountData)?;
    let count = count.checked_add(1).ok_or(ProgramError::ArithmeticOverflow)?;
    account
        .data
        .borrow_mut()
        .copy_from_slice(&CounterAccount::encode(count));
    msg!("Counter {} count: {}", account.key, count);

    Ok(())
}

pub async fn start() -> ProgramTestContext {
    let mut program_test =
        ProgramTest::new("counter_program", PROGRAM, processor!(process_instruction));
    program_test.prefer_bpf(false);
    program_test.start_with_context().await
}

pub fn config() -> ClientConfig {
    ClientConfig {
        program_id: PROGRAM,
        confirm_timeout: Duration::from_secs(10),
        poll_interval: Duration::from_millis(10),
        ..ClientConfig::default()
    }
}

pub fn client(context: &ProgramTestContext, config: ClientConfig) -> CounterClient<BanksRpc> {
    CounterClient::new(BanksRpc::new(context.banks_client.clone()), config)
}

/// `ClusterRpc` over the in-process bank.
///
/// Sends are processed synchronously, and a failing transaction is reported from
/// `send_transaction` the way preflight simulation reports it on a real cluster.
pub struct BanksRpc {
    banks: BanksClient,
    landed: Mutex<HashSet<Signature>>,
    sends_to_drop: AtomicUsize,
}

impl BanksRpc {
    pub fn new(banks: BanksClient) -> Self {
        Self {
            banks,
            landed: Mutex::new(HashSet::new()),
            sends_to_drop: AtomicUsize::new(0),
        }
    }

    /// The next `count` sends are acknowledged but never reach the bank.
    pub fn drop_next_sends(&self, count: usize) {
        self.sends_to_drop.store(count, Ordering::SeqCst);
    }

    fn take_drop(&self) -> bool {
        self.sends_to_drop
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok()
    }
}

fn transport(err: BanksClientError) -> RpcError {
    match err {
        BanksClientError::TransactionError(err) => RpcError::Rejected(err),
        err => RpcError::Transport(err.to_string()),
    }
}

#[async_trait]
impl ClusterRpc for BanksRpc {
    async fn minimum_balance_for_rent_exemption(&self, data_len: usize) -> Result<u64, RpcError> {
        let rent = self.banks.get_rent().await.map_err(transport)?;
        Ok(rent.minimum_balance(data_len))
    }

    async fn latest_blockhash(&self) -> Result<Hash, RpcError> {
        self.banks.get_latest_blockhash().await.map_err(transport)
    }

    async fn send_transaction(&self, transaction: &Transaction) -> Result<Signature, RpcError> {
        let signature = transaction.signatures[0];
        if self.take_drop() {
            return Ok(signature);
        }
        let processed = self
            .banks
            .process_transaction_with_metadata(transaction.clone())
            .await
            .map_err(transport)?;
        processed.result?;
        self.landed.lock().unwrap().insert(signature);
        Ok(signature)
    }

    async fn signature_status(
        &self,
        signature: &Signature,
        _commitment: CommitmentConfig,
    ) -> Result<SignatureStatus, RpcError> {
        // A single bank has no forks, processed is as final as it gets
        if self.landed.lock().unwrap().contains(signature) {
            Ok(SignatureStatus::Confirmed)
        } else {
            Ok(SignatureStatus::Pending)
        }
    }

    async fn account(
        &self,
        address: &Pubkey,
        _commitment: CommitmentConfig,
    ) -> Result<Option<Account>, RpcError> {
        self.banks.get_account(*address).await.map_err(transport)
    }

    async fn balance(&self, address: &Pubkey) -> Result<u64, RpcError> {
        self.banks.get_balance(*address).await.map_err(transport)
    }
}
