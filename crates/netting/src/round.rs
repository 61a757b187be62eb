//! Commit-reveal netting round.
//!
//! Participants first publish a [`SealedCommitment`] per intent. Once the
//! commitment window closes they reveal `(amount, randomness)`; the round
//! checks every opening and the per-direction aggregates before producing
//! the [`NettingBatch`].

use cosmwasm_std::Uint256;
use intent_settle_types::{Direction, IntentId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::{
    aggregate, compute_netting, verify, verify_aggregate, NettingBatch, NettingError, NettingLeg,
    Randomness, SealedCommitment,
};

/// Public part of a leg, sent before the reveal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommittedLeg {
    pub intent_id: IntentId,
    pub direction: Direction,
    pub commitment: SealedCommitment,
}

/// Opening disclosed at the reveal stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reveal {
    pub amount: Uint256,
    pub randomness: Randomness,
}

/// Result of a completed round.
#[derive(Debug, Clone)]
pub struct RoundOutcome {
    pub batch: NettingBatch,
    pub sell_commitment: SealedCommitment,
    pub buy_commitment: SealedCommitment,
}

#[derive(Debug, Default)]
pub struct NettingRound {
    legs: BTreeMap<IntentId, CommittedLeg>,
    reveals: BTreeMap<IntentId, Reveal>,
}

impl NettingRound {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.legs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.legs.is_empty()
    }

    pub fn submit_commitment(&mut self, leg: CommittedLeg) -> Result<(), NettingError> {
        if self.legs.contains_key(&leg.intent_id) {
            return Err(NettingError::DuplicateLeg {
                intent_id: leg.intent_id,
            });
        }
        debug!(
            intent_id = %leg.intent_id,
            direction = %leg.direction,
            commitment = %leg.commitment.to_hex(),
            "Commitment accepted"
        );
        self.legs.insert(leg.intent_id.clone(), leg);
        Ok(())
    }

    /// Record an opening. It is checked against the commitment immediately
    /// so a bad reveal is rejected before the round closes.
    pub fn reveal(&mut self, intent_id: &IntentId, reveal: Reveal) -> Result<(), NettingError> {
        let leg = self
            .legs
            .get(intent_id)
            .ok_or_else(|| NettingError::UnknownIntent {
                intent_id: intent_id.clone(),
            })?;

        if !verify(&leg.commitment, reveal.amount, reveal.randomness.as_bytes()) {
            warn!(intent_id = %intent_id, "Reveal does not match commitment");
            return Err(NettingError::CommitmentMismatch {
                intent_id: intent_id.clone(),
            });
        }

        self.reveals.insert(intent_id.clone(), reveal);
        Ok(())
    }

    /// Close the round and compute the batch.
    pub fn finalize(self) -> Result<RoundOutcome, NettingError> {
        let mut legs = Vec::with_capacity(self.legs.len());
        let mut sell_openings = Vec::new();
        let mut buy_openings = Vec::new();
        let mut sell_commitments = Vec::new();
        let mut buy_commitments = Vec::new();

        for (intent_id, leg) in &self.legs {
            let reveal = self
                .reveals
                .get(intent_id)
                .ok_or_else(|| NettingError::MissingReveal {
                    intent_id: intent_id.clone(),
                })?;

            let opening = (reveal.amount, reveal.randomness.clone());
            match leg.direction {
                Direction::Sell => {
                    sell_openings.push(opening);
                    sell_commitments.push(&leg.commitment);
                }
                Direction::Buy => {
                    buy_openings.push(opening);
                    buy_commitments.push(&leg.commitment);
                }
            }
            legs.push(NettingLeg::new(intent_id.clone(), leg.direction, reveal.amount));
        }

        let sell_commitment = aggregate(sell_commitments)?;
        if !verify_aggregate(&sell_commitment, &sell_openings) {
            return Err(NettingError::AggregateMismatch {
                direction: Direction::Sell,
            });
        }
        let buy_commitment = aggregate(buy_commitments)?;
        if !verify_aggregate(&buy_commitment, &buy_openings) {
            return Err(NettingError::AggregateMismatch {
                direction: Direction::Buy,
            });
        }

        Ok(RoundOutcome {
            batch: compute_netting(&legs),
            sell_commitment,
            buy_commitment,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commit;
    use cosmwasm_std::Uint512;

    fn committed(id: &str, direction: Direction, amount: u128) -> (CommittedLeg, Reveal) {
        let c = commit(Uint256::from(amount), None).unwrap();
        let (sealed, randomness) = c.into_parts();
        (
            CommittedLeg {
                intent_id: IntentId::from(id),
                direction,
                commitment: sealed,
            },
            Reveal {
                amount: Uint256::from(amount),
                randomness,
            },
        )
    }

    #[test]
    fn test_round_produces_batch() {
        let mut round = NettingRound::new();
        let entries = vec![
            committed("a", Direction::Sell, 100),
            committed("b", Direction::Buy, 40),
        ];
        for (leg, _) in &entries {
            round.submit_commitment(leg.clone()).unwrap();
        }
        for (leg, reveal) in entries {
            round.reveal(&leg.intent_id, reveal).unwrap();
        }

        let outcome = round.finalize().unwrap();
        assert_eq!(outcome.batch.residual(), Uint512::from(60u128));
        assert_eq!(outcome.batch.residual_direction(), Direction::Sell);
    }

    #[test]
    fn test_duplicate_commitment_rejected() {
        let mut round = NettingRound::new();
        let (leg, _) = committed("a", Direction::Sell, 1);
        round.submit_commitment(leg.clone()).unwrap();
        assert!(matches!(
            round.submit_commitment(leg),
            Err(NettingError::DuplicateLeg { .. })
        ));
    }

    #[test]
    fn test_bad_reveal_rejected() {
        let mut round = NettingRound::new();
        let (leg, mut reveal) = committed("a", Direction::Sell, 10);
        round.submit_commitment(leg.clone()).unwrap();

        reveal.amount = Uint256::from(11u128);
        assert!(matches!(
            round.reveal(&leg.intent_id, reveal),
            Err(NettingError::CommitmentMismatch { .. })
        ));
    }

    #[test]
    fn test_unknown_reveal_rejected() {
        let mut round = NettingRound::new();
        let (_, reveal) = committed("a", Direction::Sell, 10);
        assert!(matches!(
            round.reveal(&IntentId::from("ghost"), reveal),
            Err(NettingError::UnknownIntent { .. })
        ));
    }

    #[test]
    fn test_missing_reveal_blocks_finalize() {
        let mut round = NettingRound::new();
        let (a, ra) = committed("a", Direction::Sell, 10);
        let (b, _) = committed("b", Direction::Buy, 10);
        round.submit_commitment(a.clone()).unwrap();
        round.submit_commitment(b).unwrap();
        round.reveal(&a.intent_id, ra).unwrap();

        assert!(matches!(
            round.finalize(),
            Err(NettingError::MissingReveal { intent_id }) if intent_id.as_str() == "b"
        ));
    }
}
