use intent_settle_types::{Intent, IntentKind, NetworkId, NewIntent, Uint256};
use std::collections::HashSet;
use thiserror::Error;

/// Checks run before an intent is created (request shape) and while it is
/// analysed (network support).
#[derive(Debug, Clone)]
pub struct IntentValidator {
    /// Empty means every network is accepted.
    supported_networks: HashSet<NetworkId>,
    /// Minimum amount in base units (to prevent dust)
    min_amount: Uint256,
}

impl IntentValidator {
    pub fn new(supported_networks: HashSet<NetworkId>, min_amount: Uint256) -> Self {
        Self {
            supported_networks,
            min_amount,
        }
    }

    pub fn add_supported_network(&mut self, network: impl Into<NetworkId>) {
        self.supported_networks.insert(network.into());
    }

    /// Reject malformed requests before any state exists for them.
    pub fn validate_request(&self, request: &NewIntent) -> Result<(), ValidationError> {
        self.validate_amount(request)?;

        if request.asset.trim().is_empty() {
            return Err(ValidationError::MissingAsset);
        }

        match request.kind {
            IntentKind::Swap => self.validate_swap(request),
            IntentKind::Payment => self.validate_payment(request),
        }
    }

    pub fn validate_networks(&self, intent: &Intent) -> Result<(), ValidationError> {
        if self.supported_networks.is_empty() {
            return Ok(());
        }
        for network in [&intent.source_network, &intent.dest_network] {
            if !self.supported_networks.contains(network) {
                return Err(ValidationError::UnsupportedNetwork {
                    network: network.clone(),
                });
            }
        }
        Ok(())
    }

    fn validate_amount(&self, request: &NewIntent) -> Result<(), ValidationError> {
        if request.amount.is_zero() {
            return Err(ValidationError::ZeroAmount);
        }
        if request.amount < self.min_amount {
            return Err(ValidationError::AmountTooSmall {
                amount: request.amount,
                minimum: self.min_amount,
            });
        }
        Ok(())
    }

    fn validate_swap(&self, request: &NewIntent) -> Result<(), ValidationError> {
        let counter = request
            .counter_asset
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .ok_or(ValidationError::MissingCounterAsset)?;

        if counter == request.asset {
            return Err(ValidationError::SameAssetTrading {
                asset: request.asset.clone(),
            });
        }
        if request.source_network != request.dest_network {
            return Err(ValidationError::CrossNetworkSwap {
                source_network: request.source_network.clone(),
                dest_network: request.dest_network.clone(),
            });
        }
        Ok(())
    }

    fn validate_payment(&self, request: &NewIntent) -> Result<(), ValidationError> {
        let recipient = request
            .recipient
            .as_deref()
            .ok_or(ValidationError::MissingRecipient)?;

        if !is_well_formed_address(recipient) {
            return Err(ValidationError::InvalidRecipient {
                recipient: recipient.to_string(),
            });
        }
        Ok(())
    }
}

impl Default for IntentValidator {
    fn default() -> Self {
        Self::new(HashSet::new(), Uint256::one())
    }
}

/// Hex addresses must be 20 bytes; anything else must be a single
/// alphanumeric token (bech32 and friends).
fn is_well_formed_address(address: &str) -> bool {
    if let Some(hex) = address.strip_prefix("0x") {
        return hex.len() == 40 && hex.bytes().all(|b| b.is_ascii_hexdigit());
    }
    !address.is_empty() && address.bytes().all(|b| b.is_ascii_alphanumeric())
}

/// Validation errors with detailed reasons
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("amount must be greater than zero")]
    ZeroAmount,

    #[error("amount {amount} below minimum {minimum}")]
    AmountTooSmall { amount: Uint256, minimum: Uint256 },

    #[error("asset is required")]
    MissingAsset,

    #[error("swap requires a counter asset")]
    MissingCounterAsset,

    #[error("same asset trading not allowed: {asset}")]
    SameAssetTrading { asset: String },

    #[error("swap must stay on one network, got {source_network} -> {dest_network}")]
    CrossNetworkSwap {
        source_network: NetworkId,
        dest_network: NetworkId,
    },

    #[error("payment requires a recipient")]
    MissingRecipient,

    #[error("malformed recipient address: {recipient}")]
    InvalidRecipient { recipient: String },

    #[error("unsupported network: {network}")]
    UnsupportedNetwork { network: NetworkId },
}

#[cfg(test)]
mod tests {
    use super::*;
    use intent_settle_types::{Direction, IntentId};

    const RECIPIENT: &str = "0x00000000000000000000000000000000000000aa";

    fn swap(amount: u128) -> NewIntent {
        NewIntent::swap("base", Direction::Sell, "WETH", "USDC", Uint256::from(amount))
    }

    #[test]
    fn test_valid_requests() {
        let validator = IntentValidator::default();
        assert_eq!(validator.validate_request(&swap(10)), Ok(()));

        let payment = NewIntent::payment("base", "arbitrum", "USDC", RECIPIENT, Uint256::from(5u128));
        assert_eq!(validator.validate_request(&payment), Ok(()));

        let bech32 = NewIntent::payment("noble-1", "noble-1", "uusdc", "noble1user", Uint256::from(5u128));
        assert_eq!(validator.validate_request(&bech32), Ok(()));
    }

    #[test]
    fn test_amount_checks() {
        let validator = IntentValidator::new(HashSet::new(), Uint256::from(1000u128));
        assert_eq!(validator.validate_request(&swap(0)), Err(ValidationError::ZeroAmount));
        assert!(matches!(
            validator.validate_request(&swap(999)),
            Err(ValidationError::AmountTooSmall { .. })
        ));
        assert_eq!(validator.validate_request(&swap(1000)), Ok(()));
    }

    #[test]
    fn test_swap_shape() {
        let validator = IntentValidator::default();

        let mut same = swap(10);
        same.counter_asset = Some("WETH".to_string());
        assert!(matches!(
            validator.validate_request(&same),
            Err(ValidationError::SameAssetTrading { .. })
        ));

        let mut missing = swap(10);
        missing.counter_asset = None;
        assert_eq!(
            validator.validate_request(&missing),
            Err(ValidationError::MissingCounterAsset)
        );

        let mut bridged = swap(10);
        bridged.dest_network = NetworkId::from("arbitrum");
        assert!(matches!(
            validator.validate_request(&bridged),
            Err(ValidationError::CrossNetworkSwap { .. })
        ));
    }

    #[test]
    fn test_recipient_format() {
        let validator = IntentValidator::default();
        for bad in ["0x1234", "0xzz000000000000000000000000000000000000aa", "two words", ""] {
            let payment = NewIntent::payment("base", "base", "USDC", bad, Uint256::from(5u128));
            assert!(
                matches!(
                    validator.validate_request(&payment),
                    Err(ValidationError::InvalidRecipient { .. })
                ),
                "{bad:?} accepted"
            );
        }

        let mut missing = NewIntent::payment("base", "base", "USDC", RECIPIENT, Uint256::from(5u128));
        missing.recipient = None;
        assert_eq!(
            validator.validate_request(&missing),
            Err(ValidationError::MissingRecipient)
        );
    }

    #[test]
    fn test_network_support() {
        let mut validator = IntentValidator::default();
        validator.add_supported_network("base");

        let request = NewIntent::payment("base", "arbitrum", "USDC", RECIPIENT, Uint256::from(5u128));
        let intent = Intent::from_request(IntentId::from("i-1"), request, 0);
        assert_eq!(
            validator.validate_networks(&intent),
            Err(ValidationError::UnsupportedNetwork {
                network: NetworkId::from("arbitrum")
            })
        );

        validator.add_supported_network("arbitrum");
        assert_eq!(validator.validate_networks(&intent), Ok(()));
    }
}
