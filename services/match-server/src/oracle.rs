//! External oracle clients.
//!
//! The match server treats the chain as two narrow collaborators: a stake
//! oracle that answers "did this transaction fund this room?" before a seat
//! is granted, and a payout authority that signs a ticket the winner redeems
//! against the on-chain vault. Neither ever touches game state; oracle
//! failures surface to clients as retryable errors while the locally
//! authoritative match result stands.
//!
//! With no base URL configured both clients run in dev mode: the stake
//! oracle is permissive and the payout authority stamps locally-built
//! tickets with a stub signature.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use ludovault_types::PayoutTicket;

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("oracle rejected the request: {0}")]
    Rejected(String),
}

/// Gate for `join_match`: confirms the claimed funding transaction.
pub struct StakeOracle {
    client: reqwest::Client,
    base_url: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VerifyRequest<'a> {
    room_id: &'a str,
    player_address: &'a str,
    tx_ref: Option<&'a str>,
}

#[derive(Deserialize)]
struct VerifyResponse {
    funded: bool,
}

impl StakeOracle {
    pub fn new(base_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    pub async fn verify_funding(
        &self,
        room_id: &str,
        player_address: &str,
        tx_ref: Option<&str>,
    ) -> Result<bool, OracleError> {
        let Some(base_url) = &self.base_url else {
            debug!(room_id, player_address, "stake oracle unset, allowing join");
            return Ok(true);
        };
        let response = self
            .client
            .post(format!("{base_url}/verify"))
            .json(&VerifyRequest {
                room_id,
                player_address,
                tx_ref,
            })
            .send()
            .await?
            .error_for_status()?;
        let verdict: VerifyResponse = response.json().await?;
        Ok(verdict.funded)
    }
}

/// Issues signed payout authorizations once per completed match.
pub struct PayoutAuthority {
    client: reqwest::Client,
    base_url: Option<String>,
    deadline_ms: u64,
    dev_nonce: AtomicU64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthorizeRequest<'a> {
    room_id: &'a str,
    winner_address: &'a str,
    amount_owed: u64,
}

impl PayoutAuthority {
    pub fn new(base_url: Option<String>, deadline_ms: u64) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            deadline_ms,
            dev_nonce: AtomicU64::new(1),
        }
    }

    pub async fn authorize(
        &self,
        room_id: &str,
        winner_address: &str,
        amount: u64,
        now_ms: u64,
    ) -> Result<PayoutTicket, OracleError> {
        let Some(base_url) = &self.base_url else {
            let nonce = self.dev_nonce.fetch_add(1, Ordering::Relaxed);
            debug!(room_id, winner_address, nonce, "payout authority unset, stub ticket");
            return Ok(PayoutTicket {
                winner_address: winner_address.to_string(),
                amount,
                nonce,
                deadline_ms: now_ms.saturating_add(self.deadline_ms),
                signature: format!("dev:{room_id}:{nonce:016x}"),
            });
        };
        let response = self
            .client
            .post(format!("{base_url}/authorize"))
            .json(&AuthorizeRequest {
                room_id,
                winner_address,
                amount_owed: amount,
            })
            .send()
            .await?
            .error_for_status()?;
        let ticket: PayoutTicket = response.json().await?;
        if ticket.winner_address != winner_address {
            return Err(OracleError::Rejected(
                "ticket issued for a different address".to_string(),
            ));
        }
        Ok(ticket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dev_mode_stake_oracle_is_permissive() {
        let oracle = StakeOracle::new(None);
        assert!(oracle
            .verify_funding("room-1", "0xabc", None)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_dev_mode_payout_tickets_are_unique_and_bounded() {
        let authority = PayoutAuthority::new(None, 1_000);
        let first = authority.authorize("room-1", "0xabc", 500, 10).await.unwrap();
        let second = authority.authorize("room-1", "0xabc", 500, 10).await.unwrap();
        assert_ne!(first.nonce, second.nonce);
        assert_eq!(first.amount, 500);
        assert_eq!(first.deadline_ms, 1_010);
        assert!(first.signature.starts_with("dev:room-1:"));
    }
}
