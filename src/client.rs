use std::time::Duration;

use solana_sdk::{
    commitment_config::CommitmentConfig,
    instruction::InstructionError,
    pubkey,
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
    transaction::{Transaction, TransactionError},
};
use solana_system_interface::error::SystemError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    error::{CounterError, RpcError, SubmissionFailure},
    instruction::{self, TransactionRequest},
    rpc::{ClusterRpc, SignatureStatus},
    state::CounterAccount,
};

pub const DEFAULT_PROGRAM_ID: Pubkey = pubkey!("3wGUG3qnLtCZFg3ukqeQXNhVYjrr3Jai4RnzEDyqjphc");

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub program_id: Pubkey,
    pub commitment: CommitmentConfig,
    /// Upper bound on the wait for a sent transaction to reach `commitment`.
    ///
    /// Only the confirmation polling is bounded by this. Fetching the blockhash and
    /// sending the transaction are bounded by the RPC client's own request timeout.
    pub confirm_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            program_id: DEFAULT_PROGRAM_ID,
            commitment: CommitmentConfig::confirmed(),
            confirm_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// Lifecycle of a single submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SubmissionState {
    Built,
    Sent(Signature),
    Confirmed(Signature),
    Rejected,
    TimedOut(Signature),
}

impl SubmissionState {
    pub(crate) fn is_terminal(&self) -> bool {
        matches!(
            self,
            SubmissionState::Confirmed(_) | SubmissionState::Rejected | SubmissionState::TimedOut(_)
        )
    }
}

/// Signs, sends and confirms counter transactions against a cluster.
///
/// The client keeps no state between calls; independent workflows can share it
/// as long as they use distinct counter accounts.
pub struct CounterClient<R> {
    rpc: R,
    config: ClientConfig,
}

impl<R: ClusterRpc> CounterClient<R> {
    pub fn new(rpc: R, config: ClientConfig) -> Self {
        Self { rpc, config }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn rpc(&self) -> &R {
        &self.rpc
    }

    /// Allocates `counter` for the counter program, increments it once and
    /// returns the count read back from the cluster.
    pub async fn create_and_increment(
        &self,
        payer: &Keypair,
        counter: &Keypair,
        cancel: &CancellationToken,
    ) -> Result<u32, CounterError> {
        let counter_pubkey = counter.pubkey();
        if self
            .rpc
            .account(&counter_pubkey, self.config.commitment)
            .await?
            .is_some()
        {
            warn!(counter = %counter_pubkey, "Counter account already exists");
            return Err(CounterError::AccountAlreadyExists(counter_pubkey));
        }

        let min_balance = self
            .rpc
            .minimum_balance_for_rent_exemption(CounterAccount::size_of())
            .await?;
        info!(
            counter = %counter_pubkey,
            lamports = min_balance,
            space = CounterAccount::size_of(),
            "Creating counter account"
        );

        let request = instruction::build(
            &payer.pubkey(),
            &counter_pubkey,
            &self.config.program_id,
            min_balance,
        );
        let signature = self.submit(&request, &[payer, counter], cancel).await?;
        info!(%signature, "Use 'solana confirm -v {}' to see the logs", signature);

        self.fetch_counter(&counter_pubkey).await
    }

    /// Increments an already allocated counter and returns the new count.
    pub async fn increment(
        &self,
        payer: &Keypair,
        counter: &Pubkey,
        cancel: &CancellationToken,
    ) -> Result<u32, CounterError> {
        let request =
            instruction::build_increment(&payer.pubkey(), counter, &self.config.program_id);
        self.submit(&request, &[payer], cancel).await?;
        self.fetch_counter(counter).await
    }

    /// Signs `request` with `signers`, sends it and waits until the cluster reports it
    /// at the configured commitment.
    ///
    /// Nothing is retried. On timeout or cancellation the transaction may still land,
    /// so a caller that wants to try again should do so with a fresh counter identity.
    /// A token that is already cancelled stops the submission before anything is sent.
    pub async fn submit(
        &self,
        request: &TransactionRequest,
        signers: &[&Keypair],
        cancel: &CancellationToken,
    ) -> Result<Signature, CounterError> {
        let mut state = SubmissionState::Built;

        let blockhash = self
            .rpc
            .latest_blockhash()
            .await
            .map_err(SubmissionFailure::from)?;
        let mut transaction =
            Transaction::new_with_payer(&request.instructions, Some(&request.payer));
        if let Err(err) = transaction.try_sign(signers, blockhash) {
            transition(&mut state, SubmissionState::Rejected);
            return Err(SubmissionFailure::Signing(err).into());
        }

        if cancel.is_cancelled() {
            let signature = transaction.signatures[0];
            debug!(%signature, "Submission cancelled before sending");
            return Err(CounterError::Cancelled { signature });
        }

        let signature = match self.rpc.send_transaction(&transaction).await {
            Ok(signature) => signature,
            Err(err) => {
                transition(&mut state, SubmissionState::Rejected);
                return Err(classify_rejection(request, err.into()));
            }
        };
        transition(&mut state, SubmissionState::Sent(signature));

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(CounterError::Cancelled { signature }),
            polled = tokio::time::timeout(
                self.config.confirm_timeout,
                self.poll_until_settled(&signature),
            ) => match polled {
                Ok(result) => result,
                Err(_) => Err(CounterError::Timeout {
                    signature,
                    waited: self.config.confirm_timeout,
                }),
            },
        };

        match outcome {
            Ok(()) => {
                transition(&mut state, SubmissionState::Confirmed(signature));
                Ok(signature)
            }
            Err(CounterError::Timeout { signature, waited }) => {
                transition(&mut state, SubmissionState::TimedOut(signature));
                Err(CounterError::Timeout { signature, waited })
            }
            Err(CounterError::Submission(failure)) => {
                transition(&mut state, SubmissionState::Rejected);
                Err(classify_rejection(request, failure))
            }
            // Cancelled while waiting, the outcome on the cluster is unknown
            Err(err) => Err(err),
        }
    }

    // Runs until the signature settles; the caller bounds it with `confirm_timeout`
    async fn poll_until_settled(&self, signature: &Signature) -> Result<(), CounterError> {
        loop {
            match self
                .rpc
                .signature_status(signature, self.config.commitment)
                .await
            {
                Ok(SignatureStatus::Confirmed) => return Ok(()),
                Ok(SignatureStatus::Failed(err)) | Err(RpcError::Rejected(err)) => {
                    return Err(SubmissionFailure::Rejected(err).into());
                }
                Ok(SignatureStatus::Pending) => {
                    debug!(%signature, "Waiting for confirmation");
                }
                Err(RpcError::Transport(reason)) => {
                    warn!(%signature, %reason, "Signature status unavailable, still waiting");
                }
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    /// Raw data of the account at `address`.
    pub async fn fetch_account(&self, address: &Pubkey) -> Result<Vec<u8>, CounterError> {
        self.rpc
            .account(address, self.config.commitment)
            .await?
            .map(|account| account.data)
            .ok_or(CounterError::AccountNotFound(*address))
    }

    /// Reads the counter at `address`, checking that the counter program owns it.
    pub async fn fetch_counter(&self, address: &Pubkey) -> Result<u32, CounterError> {
        let account = self
            .rpc
            .account(address, self.config.commitment)
            .await?
            .ok_or(CounterError::AccountNotFound(*address))?;
        if account.owner != self.config.program_id {
            return Err(CounterError::IncorrectOwner {
                address: *address,
                owner: account.owner,
            });
        }
        let count = CounterAccount::decode(&account.data)?;
        info!(counter = %address, count, "Fetched counter");
        Ok(count)
    }

    pub async fn balance(&self, address: &Pubkey) -> Result<u64, CounterError> {
        Ok(self.rpc.balance(address).await?)
    }
}

fn transition(state: &mut SubmissionState, next: SubmissionState) {
    debug_assert!(!state.is_terminal(), "no transition out of {state:?}");
    debug!(from = ?state, to = ?next, "Submission state changed");
    *state = next;
}

/// Maps a rejected transaction to the most specific error kind.
fn classify_rejection(request: &TransactionRequest, failure: SubmissionFailure) -> CounterError {
    match failure {
        SubmissionFailure::Rejected(TransactionError::InstructionError(
            0,
            InstructionError::Custom(code),
        )) if request.allocates_counter && code == SystemError::AccountAlreadyInUse as u32 => {
            CounterError::AccountAlreadyExists(request.counter)
        }
        failure => {
            warn!(counter = %request.counter, error = %failure, "Transaction rejected");
            CounterError::Submission(failure)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Mutex,
        },
    };

    use async_trait::async_trait;
    use solana_sdk::{account::Account, hash::Hash};

    use super::*;

    /// Answers `signature_status` from a script, then reports `Pending`.
    #[derive(Default)]
    struct ScriptedRpc {
        statuses: Mutex<VecDeque<Result<SignatureStatus, RpcError>>>,
        sends: AtomicUsize,
        status_calls: AtomicUsize,
    }

    impl ScriptedRpc {
        fn with_statuses(statuses: Vec<Result<SignatureStatus, RpcError>>) -> Self {
            Self {
                statuses: Mutex::new(statuses.into()),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl ClusterRpc for ScriptedRpc {
        async fn minimum_balance_for_rent_exemption(&self, _: usize) -> Result<u64, RpcError> {
            Ok(890_880)
        }

        async fn latest_blockhash(&self) -> Result<Hash, RpcError> {
            Ok(Hash::new_unique())
        }

        async fn send_transaction(&self, transaction: &Transaction) -> Result<Signature, RpcError> {
            self.sends.fetch_add(1, Ordering::SeqCst);
            Ok(transaction.signatures[0])
        }

        async fn signature_status(
            &self,
            _: &Signature,
            _: CommitmentConfig,
        ) -> Result<SignatureStatus, RpcError> {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            self.statuses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(SignatureStatus::Pending))
        }

        async fn account(
            &self,
            _: &Pubkey,
            _: CommitmentConfig,
        ) -> Result<Option<Account>, RpcError> {
            Ok(None)
        }

        async fn balance(&self, _: &Pubkey) -> Result<u64, RpcError> {
            Ok(0)
        }
    }

    fn scripted_client(
        statuses: Vec<Result<SignatureStatus, RpcError>>,
    ) -> CounterClient<ScriptedRpc> {
        CounterClient::new(
            ScriptedRpc::with_statuses(statuses),
            ClientConfig {
                confirm_timeout: Duration::from_millis(500),
                poll_interval: Duration::from_millis(5),
                ..ClientConfig::default()
            },
        )
    }

    async fn submit_create(client: &CounterClient<ScriptedRpc>) -> Result<Signature, CounterError> {
        let payer = Keypair::new();
        let counter = Keypair::new();
        let request =
            instruction::build(&payer.pubkey(), &counter.pubkey(), &DEFAULT_PROGRAM_ID, 1);
        client
            .submit(&request, &[&payer, &counter], &CancellationToken::new())
            .await
    }

    #[tokio::test]
    async fn transport_errors_while_polling_keep_waiting() {
        let client = scripted_client(vec![
            Err(RpcError::Transport("503 temporarily unavailable".to_string())),
            Ok(SignatureStatus::Pending),
            Ok(SignatureStatus::Confirmed),
        ]);

        submit_create(&client).await.unwrap();

        assert_eq!(client.rpc().status_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn unreachable_status_ends_in_timeout() {
        let client = scripted_client(
            (0..1_000)
                .map(|_| Err(RpcError::Transport("connection refused".to_string())))
                .collect(),
        );

        assert!(matches!(
            submit_create(&client).await,
            Err(CounterError::Timeout { .. })
        ));
    }

    #[tokio::test]
    async fn landed_allocation_failure_maps_to_already_exists() {
        let client = scripted_client(vec![Ok(SignatureStatus::Failed(
            TransactionError::InstructionError(
                0,
                InstructionError::Custom(SystemError::AccountAlreadyInUse as u32),
            ),
        ))]);

        assert!(matches!(
            submit_create(&client).await,
            Err(CounterError::AccountAlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn landed_program_failure_is_rejected() {
        let client = scripted_client(vec![
            Ok(SignatureStatus::Pending),
            Ok(SignatureStatus::Failed(TransactionError::InstructionError(
                1,
                InstructionError::IncorrectProgramId,
            ))),
        ]);

        assert!(matches!(
            submit_create(&client).await,
            Err(CounterError::Submission(SubmissionFailure::Rejected(
                TransactionError::InstructionError(1, InstructionError::IncorrectProgramId)
            )))
        ));
    }

    #[tokio::test]
    async fn cancelled_token_sends_nothing() {
        let client = scripted_client(vec![Ok(SignatureStatus::Confirmed)]);
        let payer = Keypair::new();
        let counter = Keypair::new();
        let request =
            instruction::build(&payer.pubkey(), &counter.pubkey(), &DEFAULT_PROGRAM_ID, 1);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = client
            .submit(&request, &[&payer, &counter], &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, CounterError::Cancelled { .. }));
        assert_eq!(client.rpc().sends.load(Ordering::SeqCst), 0);
        assert_eq!(client.rpc().status_calls.load(Ordering::SeqCst), 0);
    }

    fn request(allocates_counter: bool) -> TransactionRequest {
        let payer = Pubkey::new_unique();
        let counter = Pubkey::new_unique();
        if allocates_counter {
            instruction::build(&payer, &counter, &DEFAULT_PROGRAM_ID, 1)
        } else {
            instruction::build_increment(&payer, &counter, &DEFAULT_PROGRAM_ID)
        }
    }

    #[test]
    fn account_in_use_maps_to_already_exists() {
        let request = request(true);
        let failure = SubmissionFailure::Rejected(TransactionError::InstructionError(
            0,
            InstructionError::Custom(SystemError::AccountAlreadyInUse as u32),
        ));

        match classify_rejection(&request, failure) {
            CounterError::AccountAlreadyExists(address) => assert_eq!(address, request.counter),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn program_errors_stay_submission_errors() {
        // Custom(0) from the counter program itself is not an allocation failure
        let failure = SubmissionFailure::Rejected(TransactionError::InstructionError(
            0,
            InstructionError::Custom(0),
        ));
        assert!(matches!(
            classify_rejection(&request(false), failure),
            CounterError::Submission(SubmissionFailure::Rejected(_))
        ));

        let failure = SubmissionFailure::Rejected(TransactionError::InsufficientFundsForFee);
        assert!(matches!(
            classify_rejection(&request(true), failure),
            CounterError::Submission(SubmissionFailure::Rejected(
                TransactionError::InsufficientFundsForFee
            ))
        ));
    }

    #[test]
    fn terminal_states() {
        let signature = Signature::default();
        assert!(!SubmissionState::Built.is_terminal());
        assert!(!SubmissionState::Sent(signature).is_terminal());
        assert!(SubmissionState::Confirmed(signature).is_terminal());
        assert!(SubmissionState::Rejected.is_terminal());
        assert!(SubmissionState::TimedOut(signature).is_terminal());
    }

    #[test]
    fn default_config_waits_for_confirmed() {
        let config = ClientConfig::default();
        assert_eq!(config.commitment, CommitmentConfig::confirmed());
        assert_eq!(config.program_id, DEFAULT_PROGRAM_ID);
        assert!(config.poll_interval < config.confirm_timeout);
    }
}
