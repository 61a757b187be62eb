use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a blockchain network (e.g. "base", "arbitrum").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetworkId(String);

impl NetworkId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NetworkId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for NetworkId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Trading pair of two assets on one network. Order-insensitive so both
/// sides of a market land in the same netting group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TradingPair {
    pub base: String,
    pub quote: String,
}

impl TradingPair {
    pub fn new(base: impl Into<String>, quote: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            quote: quote.into(),
        }
    }

    /// Canonical form with the lexicographically smaller asset first.
    pub fn canonical(&self) -> Self {
        if self.base <= self.quote {
            self.clone()
        } else {
            Self::new(self.quote.clone(), self.base.clone())
        }
    }
}

impl fmt::Display for TradingPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_id_serializes_as_string() {
        let id = NetworkId::new("base");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"base\"");
        assert_eq!(id.to_string(), "base");
    }

    #[test]
    fn test_trading_pair_canonical() {
        let a = TradingPair::new("WETH", "USDC");
        let b = TradingPair::new("USDC", "WETH");
        assert_eq!(a.canonical(), b.canonical());
        assert_eq!(a.canonical().base, "USDC");
    }
}
