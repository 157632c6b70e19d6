use std::time::Duration;

use solana_sdk::{
    pubkey::Pubkey, signature::Signature, signer::SignerError, transaction::TransactionError,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CounterError {
    #[error("malformed counter account: expected {expected} bytes, found {actual}")]
    MalformedAccount { expected: usize, actual: usize },
    #[error("account {0} already exists")]
    AccountAlreadyExists(Pubkey),
    #[error("submission failed: {0}")]
    Submission(#[from] SubmissionFailure),
    #[error("transaction {signature} not confirmed after {waited:?}")]
    Timeout { signature: Signature, waited: Duration },
    #[error("submission of transaction {signature} was cancelled")]
    Cancelled { signature: Signature },
    #[error("account {0} not found")]
    AccountNotFound(Pubkey),
    #[error("account {address} is owned by {owner}, not the counter program")]
    IncorrectOwner { address: Pubkey, owner: Pubkey },
    #[error(transparent)]
    Rpc(#[from] RpcError),
}

/// Why the network (or local signing) refused a transaction.
#[derive(Debug, Error)]
pub enum SubmissionFailure {
    #[error("signing failed: {0}")]
    Signing(#[from] SignerError),
    #[error("rejected: {0}")]
    Rejected(TransactionError),
    #[error("transport: {0}")]
    Transport(String),
}

/// Errors reported by a [`crate::rpc::ClusterRpc`] backend.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("transaction rejected: {0}")]
    Rejected(#[from] TransactionError),
    #[error("rpc request failed: {0}")]
    Transport(String),
}

impl From<RpcError> for SubmissionFailure {
    fn from(err: RpcError) -> Self {
        match err {
            RpcError::Rejected(err) => SubmissionFailure::Rejected(err),
            RpcError::Transport(msg) => SubmissionFailure::Transport(msg),
        }
    }
}
