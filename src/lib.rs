pub mod client; // where transactions are signed, sent and confirmed
pub mod error; // error kinds surfaced to callers
pub mod instruction; // where the create + increment transaction is assembled
pub mod rpc; // the cluster RPC seam and its solana-client implementation
pub mod state; // where the on-chain counter account layout is defined

pub use crate::client::{ClientConfig, CounterClient};
pub use crate::error::{CounterError, RpcError, SubmissionFailure};
pub use crate::instruction::TransactionRequest;
pub use crate::rpc::{ClusterRpc, SignatureStatus};
pub use crate::state::CounterAccount;
