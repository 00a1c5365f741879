use chrono::{DateTime, Utc};
use interop_core::driver::{Relay, StateQueryExecutor};
use interop_core::error::{InteropError, Result};
use interop_core::id::TokenId;
use interop_proofs::keys::{QUERY_TOKEN_DOES_NOT_EXIST, QUERY_TOKEN_EXISTENCE, QUERY_TOKEN_EXISTS_WITH_METADATA};
use interop_proofs::ProofQuery;
use log::debug;
use std::sync::Arc;

/// Asks the relay for proofs about one target ledger
pub struct RelayQueryExecutor {
    relay: Arc<dyn Relay>,
    target_url: String,
}

impl RelayQueryExecutor {
    pub fn new(relay: Arc<dyn Relay>, target_url: &str) -> Self {
        RelayQueryExecutor {
            relay,
            target_url: target_url.to_string(),
        }
    }

    fn request_proof(&self, function: &str, query: &ProofQuery) -> Result<Vec<u8>> {
        let argument = serde_json::to_vec(query)?;
        debug!("querying [{}] on [{}]", function, self.target_url);

        let response = self
            .relay
            .query(&self.target_url, function, &argument)
            .map_err(|e| InteropError::RelayQueryFailed(format!("{} on [{}]: {}", function, self.target_url, e)))?;
        if response.proof.is_empty() {
            return Err(InteropError::RelayQueryFailed(format!(
                "{} on [{}] returned an empty proof",
                function, self.target_url
            )));
        }

        debug!("received proof of {} bytes from [{}]", response.proof.len(), self.target_url);
        Ok(response.proof)
    }
}

impl StateQueryExecutor for RelayQueryExecutor {
    fn exist(&self, token_id: &TokenId) -> Result<Vec<u8>> {
        self.request_proof(
            QUERY_TOKEN_EXISTENCE,
            &ProofQuery::Existence {
                token_id: token_id.clone(),
            },
        )
    }

    fn does_not_exist(&self, token_id: &TokenId, origin: &str, deadline: DateTime<Utc>) -> Result<Vec<u8>> {
        self.request_proof(
            QUERY_TOKEN_DOES_NOT_EXIST,
            &ProofQuery::NonExistence {
                token_id: token_id.clone(),
                origin: origin.to_string(),
                deadline,
            },
        )
    }

    fn exists_with_metadata(&self, token_id: &TokenId, origin: &str) -> Result<Vec<u8>> {
        self.request_proof(
            QUERY_TOKEN_EXISTS_WITH_METADATA,
            &ProofQuery::MetadataExistence {
                token_id: token_id.clone(),
                origin: origin.to_string(),
            },
        )
    }
}
