use cosmwasm_std::Uint256;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{BridgeTransfer, ExecutionReceipt, IntentFailure, IntentStatus, NetworkId, TradingPair};

/// Opaque intent identifier (UUID v4), never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IntentId(String);

impl IntentId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IntentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for IntentId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for IntentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntentKind {
    Swap,
    Payment,
}

/// Trade direction relative to `asset`: `Sell` gives `asset` away,
/// `Buy` acquires it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Direction::Buy => Direction::Sell,
            Direction::Sell => Direction::Buy,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Buy => f.write_str("buy"),
            Direction::Sell => f.write_str("sell"),
        }
    }
}

/// One entry of an intent's append-only timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub stage: IntentStatus,
    pub message: String,
    pub timestamp_millis: u64,
}

/// Canonical per-intent record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intent {
    pub id: IntentId,
    pub kind: IntentKind,

    /// Amount of `asset` in its smallest unit.
    pub amount: Uint256,

    /// Only meaningful for swaps.
    pub direction: Direction,

    /// Asset being moved (payments) or traded (swaps).
    pub asset: String,

    /// Asset on the other side of a swap.
    pub counter_asset: Option<String>,

    /// Payment recipient on the destination network.
    pub recipient: Option<String>,

    pub source_network: NetworkId,
    pub dest_network: NetworkId,

    pub status: IntentStatus,
    pub timeline: Vec<TimelineEntry>,
    pub result: Option<ExecutionReceipt>,
    pub error: Option<IntentFailure>,

    /// A cancellation arrived while executing; a later failure is reported
    /// as cancelled instead of being retried.
    #[serde(default)]
    pub cancel_requested: bool,

    #[serde(default)]
    pub bridge_transfer: Option<BridgeTransfer>,

    pub created_at: u64,
    pub updated_at: u64,
}

impl Intent {
    /// Materialise a request into a record in `Created`.
    pub fn from_request(id: IntentId, request: NewIntent, now_millis: u64) -> Self {
        Self {
            id,
            kind: request.kind,
            amount: request.amount,
            direction: request.direction,
            asset: request.asset,
            counter_asset: request.counter_asset,
            recipient: request.recipient,
            source_network: request.source_network,
            dest_network: request.dest_network,
            status: IntentStatus::Created,
            timeline: vec![TimelineEntry {
                stage: IntentStatus::Created,
                message: "intent created".to_string(),
                timestamp_millis: now_millis,
            }],
            result: None,
            error: None,
            cancel_requested: false,
            bridge_transfer: None,
            created_at: now_millis,
            updated_at: now_millis,
        }
    }

    pub fn is_cross_network(&self) -> bool {
        self.source_network != self.dest_network
    }

    /// Trading pair for swaps.
    pub fn pair(&self) -> Option<TradingPair> {
        self.counter_asset
            .as_ref()
            .map(|counter| TradingPair::new(&self.asset, counter))
    }

    pub fn last_timeline_timestamp(&self) -> u64 {
        self.timeline
            .last()
            .map(|e| e.timestamp_millis)
            .unwrap_or(self.created_at)
    }
}

/// Request to create an intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewIntent {
    pub kind: IntentKind,
    pub amount: Uint256,
    #[serde(default = "default_direction")]
    pub direction: Direction,
    pub asset: String,
    #[serde(default)]
    pub counter_asset: Option<String>,
    #[serde(default)]
    pub recipient: Option<String>,
    pub source_network: NetworkId,
    pub dest_network: NetworkId,
}

fn default_direction() -> Direction {
    Direction::Sell
}

impl NewIntent {
    /// Same-network swap.
    pub fn swap(
        network: impl Into<NetworkId>,
        direction: Direction,
        asset: impl Into<String>,
        counter_asset: impl Into<String>,
        amount: Uint256,
    ) -> Self {
        let network = network.into();
        Self {
            kind: IntentKind::Swap,
            amount,
            direction,
            asset: asset.into(),
            counter_asset: Some(counter_asset.into()),
            recipient: None,
            source_network: network.clone(),
            dest_network: network,
        }
    }

    /// Payment, cross-network when the two networks differ.
    pub fn payment(
        source_network: impl Into<NetworkId>,
        dest_network: impl Into<NetworkId>,
        asset: impl Into<String>,
        recipient: impl Into<String>,
        amount: Uint256,
    ) -> Self {
        Self {
            kind: IntentKind::Payment,
            amount,
            direction: Direction::Sell,
            asset: asset.into(),
            counter_asset: None,
            recipient: Some(recipient.into()),
            source_network: source_network.into(),
            dest_network: dest_network.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_request_starts_created_with_timeline() {
        let request = NewIntent::swap(
            "base",
            Direction::Sell,
            "WETH",
            "USDC",
            Uint256::from(100u128),
        );
        let intent = Intent::from_request(IntentId::from("i-1"), request, 1_000);

        assert_eq!(intent.status, IntentStatus::Created);
        assert_eq!(intent.timeline.len(), 1);
        assert_eq!(intent.timeline[0].stage, IntentStatus::Created);
        assert!(!intent.is_cross_network());
        assert_eq!(intent.pair(), Some(TradingPair::new("WETH", "USDC")));
        assert!(intent.result.is_none() && intent.error.is_none());
    }

    #[test]
    fn test_payment_cross_network() {
        let request = NewIntent::payment(
            "base",
            "arbitrum",
            "USDC",
            "0x000000000000000000000000000000000000dEaD",
            Uint256::from(5u128),
        );
        let intent = Intent::from_request(IntentId::generate(), request, 0);
        assert!(intent.is_cross_network());
        assert_eq!(intent.pair(), None);
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let a = IntentId::generate();
        let b = IntentId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_intent_json_amount_is_string() {
        let request = NewIntent::swap(
            "base",
            Direction::Buy,
            "WETH",
            "USDC",
            Uint256::from(42u128),
        );
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["amount"], "42");
        let back: NewIntent = serde_json::from_value(json).unwrap();
        assert_eq!(back, request);
    }
}
