//! Interfaces to the collaborators around the engine: the free-text intent
//! classifier and pool discovery. The keyword classifier and static pool
//! table back the demo service and the tests.

use async_trait::async_trait;
use intent_settle_types::{parse_units, Direction, NetworkId, NewIntent, TradingPair, Uint256};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

/// Fee tier assumed when no pool is known: 3000 ppm (0.30%).
pub const DEFAULT_FEE_TIER_PPM: u32 = 3000;

/// Structured action produced by a classifier.
pub type StructuredIntent = NewIntent;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolDescriptor {
    pub pool_id: String,
    pub pair: TradingPair,
    pub fee_tier_ppm: u32,
}

impl PoolDescriptor {
    /// Pool assumed for a pair with no discovered pool.
    pub fn fallback(network: &NetworkId, pair: &TradingPair) -> Self {
        let pair = pair.canonical();
        Self {
            pool_id: format!(
                "{}:{}/{}:{}",
                network, pair.base, pair.quote, DEFAULT_FEE_TIER_PPM
            ),
            pair,
            fee_tier_ppm: DEFAULT_FEE_TIER_PPM,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClassifierError {
    #[error("classifier unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait IntentClassifier: Send + Sync {
    /// Zero results is a valid answer, not an error.
    async fn parse(
        &self,
        text: &str,
        network_hint: &NetworkId,
    ) -> Result<Vec<StructuredIntent>, ClassifierError>;
}

#[async_trait]
pub trait PoolDiscovery: Send + Sync {
    async fn find_pool(
        &self,
        token_a: &str,
        token_b: &str,
        network: &NetworkId,
    ) -> Option<PoolDescriptor>;
}

/// Line-oriented keyword classifier.
///
/// Understands one command per line or `;`-separated clause:
///
/// ```text
/// sell 1.5 WETH for USDC
/// swap 1.5 WETH for USDC
/// buy 2 WETH with USDC
/// pay 25 USDC to 0xabc on arbitrum
/// ```
///
/// Amounts are decimal and scaled by the asset's registered decimals.
/// Clauses with unknown assets or an unfamiliar shape are skipped.
pub struct KeywordClassifier {
    decimals: HashMap<String, u32>,
}

impl KeywordClassifier {
    pub fn new() -> Self {
        Self {
            decimals: HashMap::new(),
        }
    }

    pub fn with_asset(mut self, symbol: impl Into<String>, decimals: u32) -> Self {
        self.decimals.insert(symbol.into().to_uppercase(), decimals);
        self
    }

    fn clause(&self, clause: &str, network_hint: &NetworkId) -> Option<StructuredIntent> {
        let words: Vec<&str> = clause.split_whitespace().collect();
        let verb = words.first()?.to_lowercase();

        match (verb.as_str(), words.as_slice()) {
            ("sell" | "swap", [_, amount, asset, "for", counter]) => {
                self.swap(network_hint, Direction::Sell, amount, asset, counter)
            }
            ("buy", [_, amount, asset, "with", counter]) => {
                self.swap(network_hint, Direction::Buy, amount, asset, counter)
            }
            ("pay" | "send", [_, amount, asset, "to", recipient]) => {
                self.payment(network_hint, network_hint.clone(), amount, asset, recipient)
            }
            ("pay" | "send", [_, amount, asset, "to", recipient, "on", dest]) => self.payment(
                network_hint,
                NetworkId::from(dest.to_lowercase()),
                amount,
                asset,
                recipient,
            ),
            _ => None,
        }
    }

    fn units(&self, amount: &str, asset: &str) -> Option<(String, Uint256)> {
        let symbol = asset.to_uppercase();
        let decimals = *self.decimals.get(&symbol)?;
        let amount = parse_units(amount, decimals).ok()?;
        Some((symbol, amount))
    }

    fn swap(
        &self,
        network: &NetworkId,
        direction: Direction,
        amount: &str,
        asset: &str,
        counter: &str,
    ) -> Option<StructuredIntent> {
        let (asset, amount) = self.units(amount, asset)?;
        let counter = counter.to_uppercase();
        if !self.decimals.contains_key(&counter) {
            return None;
        }
        Some(NewIntent::swap(network.clone(), direction, asset, counter, amount))
    }

    fn payment(
        &self,
        source: &NetworkId,
        dest: NetworkId,
        amount: &str,
        asset: &str,
        recipient: &str,
    ) -> Option<StructuredIntent> {
        let (asset, amount) = self.units(amount, asset)?;
        Some(NewIntent::payment(source.clone(), dest, asset, recipient, amount))
    }
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new()
            .with_asset("USDC", 6)
            .with_asset("USDT", 6)
            .with_asset("WETH", 18)
            .with_asset("ETH", 18)
            .with_asset("WBTC", 8)
    }
}

#[async_trait]
impl IntentClassifier for KeywordClassifier {
    async fn parse(
        &self,
        text: &str,
        network_hint: &NetworkId,
    ) -> Result<Vec<StructuredIntent>, ClassifierError> {
        let intents: Vec<_> = text
            .split(['\n', ';'])
            .map(str::trim)
            .filter(|clause| !clause.is_empty())
            .filter_map(|clause| {
                let parsed = self.clause(clause, network_hint);
                if parsed.is_none() {
                    debug!(clause = %clause, "Clause not understood");
                }
                parsed
            })
            .collect();
        Ok(intents)
    }
}

/// Fixed pool table keyed by network and canonical pair.
#[derive(Debug, Clone, Default)]
pub struct StaticPoolDiscovery {
    pools: HashMap<(NetworkId, TradingPair), PoolDescriptor>,
}

impl StaticPoolDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pool(mut self, network: impl Into<NetworkId>, pool: PoolDescriptor) -> Self {
        self.pools
            .insert((network.into(), pool.pair.canonical()), pool);
        self
    }
}

#[async_trait]
impl PoolDiscovery for StaticPoolDiscovery {
    async fn find_pool(
        &self,
        token_a: &str,
        token_b: &str,
        network: &NetworkId,
    ) -> Option<PoolDescriptor> {
        let pair = TradingPair::new(token_a, token_b).canonical();
        self.pools.get(&(network.clone(), pair)).cloned()
    }
}
