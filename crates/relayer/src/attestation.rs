use async_trait::async_trait;
use cosmwasm_std::Binary;
use intent_settle_ratelimit::Backoff;
use intent_settle_types::NetworkId;
use std::time::Duration;
use tracing::{debug, warn};

use crate::ChainError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttestationStatus {
    Pending,
    Ready { message: Binary, attestation: Binary },
}

/// Off-chain signer that attests bridge burns.
#[async_trait]
pub trait AttestationService: Send + Sync {
    async fn fetch_attestation(
        &self,
        source_network: &NetworkId,
        burn_tx_hash: &str,
    ) -> Result<AttestationStatus, ChainError>;
}

/// Poll until the attestation is ready or `deadline` elapses.
///
/// Transient fetch errors are treated like `Pending`.
pub async fn poll_attestation<B>(
    service: &dyn AttestationService,
    source_network: &NetworkId,
    burn_tx_hash: &str,
    backoff: &mut B,
    deadline: Duration,
) -> Result<(Binary, Binary), ChainError>
where
    B: Backoff + ?Sized,
{
    let poll = async {
        loop {
            match service.fetch_attestation(source_network, burn_tx_hash).await {
                Ok(AttestationStatus::Ready {
                    message,
                    attestation,
                }) => return Ok((message, attestation)),
                Ok(AttestationStatus::Pending) => {
                    debug!(
                        network = %source_network,
                        burn_tx_hash = %burn_tx_hash,
                        attempt = backoff.current_attempt(),
                        "Attestation pending"
                    );
                }
                Err(e) if e.is_transient() => {
                    warn!(network = %source_network, error = %e, "Attestation fetch failed");
                }
                Err(e) => return Err(e),
            }
            tokio::time::sleep(backoff.next_delay()).await;
        }
    };

    tokio::time::timeout(deadline, poll).await.map_err(|_| {
        ChainError::Timeout(format!(
            "attestation for {burn_tx_hash} not ready after {deadline:?}"
        ))
    })?
}
