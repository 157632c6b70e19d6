use async_trait::async_trait;
use solana_client::{client_error::ClientError, nonblocking::rpc_client::RpcClient};
use solana_sdk::{
    account::Account, commitment_config::CommitmentConfig, hash::Hash, pubkey::Pubkey,
    signature::Signature, transaction::Transaction, transaction::TransactionError,
};

use crate::error::RpcError;

/// Where a sent signature stands on the cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureStatus {
    /// Unknown to the cluster, or known but below the requested commitment.
    Pending,
    Confirmed,
    Failed(TransactionError),
}

/// The cluster calls the counter client relies on.
#[async_trait]
pub trait ClusterRpc: Send + Sync {
    async fn minimum_balance_for_rent_exemption(&self, data_len: usize) -> Result<u64, RpcError>;

    async fn latest_blockhash(&self) -> Result<Hash, RpcError>;

    /// Hands a signed transaction to the cluster without waiting for it to land.
    async fn send_transaction(&self, transaction: &Transaction) -> Result<Signature, RpcError>;

    async fn signature_status(
        &self,
        signature: &Signature,
        commitment: CommitmentConfig,
    ) -> Result<SignatureStatus, RpcError>;

    async fn account(
        &self,
        address: &Pubkey,
        commitment: CommitmentConfig,
    ) -> Result<Option<Account>, RpcError>;

    async fn balance(&self, address: &Pubkey) -> Result<u64, RpcError>;
}

impl From<ClientError> for RpcError {
    fn from(err: ClientError) -> Self {
        match err.get_transaction_error() {
            Some(tx_err) => RpcError::Rejected(tx_err),
            None => RpcError::Transport(err.to_string()),
        }
    }
}

#[async_trait]
impl ClusterRpc for RpcClient {
    async fn minimum_balance_for_rent_exemption(&self, data_len: usize) -> Result<u64, RpcError> {
        Ok(self.get_minimum_balance_for_rent_exemption(data_len).await?)
    }

    async fn latest_blockhash(&self) -> Result<Hash, RpcError> {
        Ok(self.get_latest_blockhash().await?)
    }

    async fn send_transaction(&self, transaction: &Transaction) -> Result<Signature, RpcError> {
        // Preflight simulation runs here, so program errors surface before confirmation
        Ok(RpcClient::send_transaction(self, transaction).await?)
    }

    async fn signature_status(
        &self,
        signature: &Signature,
        commitment: CommitmentConfig,
    ) -> Result<SignatureStatus, RpcError> {
        let statuses = self.get_signature_statuses(&[*signature]).await?.value;
        let status = match statuses.into_iter().next().flatten() {
            Some(status) => status,
            None => return Ok(SignatureStatus::Pending),
        };
        if let Some(err) = status.err.clone() {
            return Ok(SignatureStatus::Failed(err));
        }
        if status.satisfies_commitment(commitment) {
            Ok(SignatureStatus::Confirmed)
        } else {
            Ok(SignatureStatus::Pending)
        }
    }

    async fn account(
        &self,
        address: &Pubkey,
        commitment: CommitmentConfig,
    ) -> Result<Option<Account>, RpcError> {
        Ok(self
            .get_account_with_commitment(address, commitment)
            .await?
            .value)
    }

    async fn balance(&self, address: &Pubkey) -> Result<u64, RpcError> {
        Ok(self.get_balance(address).await?)
    }
}
