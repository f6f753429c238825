//! Account state reader
//!
//! The price service only needs raw account bytes; the trait lets tests and
//! alternative backends stand in for the rpc client.

use crate::error::FetchError;
use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;

#[async_trait]
pub trait AccountFetcher: Send + Sync {
    /// `Ok(None)` when the account does not exist.
    async fn fetch_account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, FetchError>;
}

/// JSON-RPC backed fetcher
pub struct RpcAccountFetcher {
    client: Arc<RpcClient>,
}

impl RpcAccountFetcher {
    pub fn new(rpc_endpoint: impl Into<String>) -> Self {
        Self::with_commitment(rpc_endpoint, CommitmentConfig::confirmed())
    }

    pub fn with_commitment(rpc_endpoint: impl Into<String>, commitment: CommitmentConfig) -> Self {
        Self { client: Arc::new(RpcClient::new_with_commitment(rpc_endpoint.into(), commitment)) }
    }

    pub fn from_client(client: Arc<RpcClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AccountFetcher for RpcAccountFetcher {
    async fn fetch_account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, FetchError> {
        let response = self
            .client
            .get_account_with_commitment(address, self.client.commitment())
            .await
            .map_err(|e| FetchError::from_rpc_message(e.to_string()))?;
        Ok(response.value.map(|account| account.data))
    }
}
