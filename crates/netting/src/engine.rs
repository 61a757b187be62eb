use cosmwasm_std::{Uint128, Uint256, Uint512};
use intent_settle_types::{Direction, Intent, IntentId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::NettingError;

/// Fractional digits carried by `netting_efficiency`.
pub const EFFICIENCY_SCALE: u32 = 18;

/// One intent's contribution to a netting batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NettingLeg {
    pub intent_id: IntentId,
    pub direction: Direction,
    pub amount: Uint256,
}

impl NettingLeg {
    pub fn new(intent_id: impl Into<IntentId>, direction: Direction, amount: Uint256) -> Self {
        Self {
            intent_id: intent_id.into(),
            direction,
            amount,
        }
    }
}

impl From<&Intent> for NettingLeg {
    fn from(intent: &Intent) -> Self {
        Self {
            intent_id: intent.id.clone(),
            direction: intent.direction,
            amount: intent.amount,
        }
    }
}

/// Outcome of one netting round. Immutable once computed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NettingBatch {
    id: String,
    intent_ids: Vec<IntentId>,
    sell_total: Uint512,
    buy_total: Uint512,
    residual: Uint512,
    residual_direction: Direction,
    netting_efficiency: Decimal,
}

impl NettingBatch {
    /// Deterministic id derived from the sorted member ids.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Member intents, sorted.
    pub fn intent_ids(&self) -> &[IntentId] {
        &self.intent_ids
    }

    pub fn sell_total(&self) -> Uint512 {
        self.sell_total
    }

    pub fn buy_total(&self) -> Uint512 {
        self.buy_total
    }

    pub fn gross(&self) -> Uint512 {
        self.sell_total.saturating_add(self.buy_total)
    }

    pub fn residual(&self) -> Uint512 {
        self.residual
    }

    /// Direction of the residual. `Sell` when the totals tie; consumers must
    /// not read anything into the direction of a zero residual.
    pub fn residual_direction(&self) -> Direction {
        self.residual_direction
    }

    /// `1 - residual / gross`, or `0` for an empty batch.
    pub fn netting_efficiency(&self) -> Decimal {
        self.netting_efficiency
    }

    /// `residual / gross`, or `0` for an empty batch.
    pub fn residual_ratio(&self) -> Decimal {
        if self.gross().is_zero() {
            Decimal::ZERO
        } else {
            Decimal::ONE - self.netting_efficiency
        }
    }

    pub fn is_fully_netted(&self) -> bool {
        self.residual.is_zero()
    }

    /// Residual narrowed to the on-chain amount domain.
    pub fn residual_amount(&self) -> Result<Uint256, NettingError> {
        Uint256::try_from(self.residual).map_err(|_| NettingError::ResidualOverflow)
    }
}

/// Aggregate the legs of a batch into a residual to execute.
///
/// Pure and O(n). Totals use 512-bit integer arithmetic so mixing 6- and
/// 18-decimal magnitudes never loses precision. The result does not depend
/// on the order of `legs`.
pub fn compute_netting<'a, I>(legs: I) -> NettingBatch
where
    I: IntoIterator<Item = &'a NettingLeg>,
{
    let mut sell_total = Uint512::zero();
    let mut buy_total = Uint512::zero();
    let mut intent_ids = Vec::new();

    for leg in legs {
        // Saturation needs more than 2^256 legs.
        match leg.direction {
            Direction::Sell => sell_total = sell_total.saturating_add(Uint512::from(leg.amount)),
            Direction::Buy => buy_total = buy_total.saturating_add(Uint512::from(leg.amount)),
        }
        intent_ids.push(leg.intent_id.clone());
    }
    intent_ids.sort();

    let (residual, residual_direction) = if sell_total > buy_total {
        (sell_total - buy_total, Direction::Sell)
    } else if buy_total > sell_total {
        (buy_total - sell_total, Direction::Buy)
    } else {
        (Uint512::zero(), Direction::Sell)
    };

    let gross = sell_total.saturating_add(buy_total);
    let netting_efficiency = efficiency(residual, gross);

    NettingBatch {
        id: batch_id(&intent_ids),
        intent_ids,
        sell_total,
        buy_total,
        residual,
        residual_direction,
        netting_efficiency,
    }
}

/// Convenience wrapper over intents.
pub fn compute_netting_for_intents(intents: &[Intent]) -> NettingBatch {
    let legs: Vec<NettingLeg> = intents.iter().map(NettingLeg::from).collect();
    compute_netting(&legs)
}

fn efficiency(residual: Uint512, gross: Uint512) -> Decimal {
    if gross.is_zero() {
        return Decimal::ZERO;
    }

    let mut matched = gross - residual;
    let mut gross = gross;

    // Keep `matched * 10^18` inside 512 bits.
    let limit = Uint512::MAX >> 64u32;
    while gross > limit {
        matched = matched >> 64u32;
        gross = gross >> 64u32;
    }

    let scale = Uint512::from(10u128.pow(EFFICIENCY_SCALE));
    let scaled = matched.saturating_mul(scale) / gross;

    // matched <= gross, so scaled <= 10^18
    match Uint128::try_from(scaled) {
        Ok(value) => Decimal::from_i128_with_scale(value.u128() as i128, EFFICIENCY_SCALE).normalize(),
        Err(_) => Decimal::ONE,
    }
}

fn batch_id(sorted_ids: &[IntentId]) -> String {
    let mut hasher = Sha256::new();
    for id in sorted_ids {
        hasher.update(id.as_str().as_bytes());
        hasher.update([0u8]);
    }
    let hash: [u8; 32] = hasher.finalize().into();
    hex::encode(&hash[..16])
}

#[cfg(test)]
mod tests {
    use super::*;
    use intent_settle_types::parse_units;
    use std::str::FromStr;

    fn leg(id: &str, direction: Direction, amount: u128) -> NettingLeg {
        NettingLeg::new(id, direction, Uint256::from(amount))
    }

    fn usdc(value: &str) -> Uint256 {
        parse_units(value, 6).unwrap()
    }

    #[test]
    fn test_perfect_netting() {
        let legs = vec![
            NettingLeg::new("a", Direction::Sell, usdc("1.5")),
            NettingLeg::new("b", Direction::Sell, usdc("0.8")),
            NettingLeg::new("c", Direction::Buy, usdc("2.0")),
            NettingLeg::new("d", Direction::Buy, usdc("0.3")),
        ];
        let batch = compute_netting(&legs);

        assert_eq!(batch.sell_total(), Uint512::from(2_300_000u128));
        assert_eq!(batch.buy_total(), Uint512::from(2_300_000u128));
        assert_eq!(batch.residual(), Uint512::zero());
        assert!(batch.is_fully_netted());
        assert_eq!(batch.residual_direction(), Direction::Sell);
        assert_eq!(batch.netting_efficiency(), Decimal::ONE);
        assert_eq!(batch.residual_ratio(), Decimal::ZERO);
    }

    #[test]
    fn test_partial_netting() {
        let legs = vec![leg("a", Direction::Sell, 100), leg("b", Direction::Buy, 40)];
        let batch = compute_netting(&legs);

        assert_eq!(batch.residual(), Uint512::from(60u128));
        assert_eq!(batch.residual_amount().unwrap(), Uint256::from(60u128));
        assert_eq!(batch.residual_direction(), Direction::Sell);

        // 1 - 60/140
        let expected = Decimal::from_str("0.571428571428571428").unwrap();
        assert_eq!(batch.netting_efficiency(), expected);
        // 60/140
        assert_eq!(
            batch.residual_ratio().round_dp(4),
            Decimal::from_str("0.4286").unwrap()
        );
    }

    #[test]
    fn test_buy_side_residual() {
        let legs = vec![leg("a", Direction::Sell, 10), leg("b", Direction::Buy, 25)];
        let batch = compute_netting(&legs);
        assert_eq!(batch.residual(), Uint512::from(15u128));
        assert_eq!(batch.residual_direction(), Direction::Buy);
    }

    #[test]
    fn test_empty_batch() {
        let batch = compute_netting(&[]);
        assert_eq!(batch.residual(), Uint512::zero());
        assert_eq!(batch.netting_efficiency(), Decimal::ZERO);
        assert_eq!(batch.residual_direction(), Direction::Sell);
        assert!(batch.intent_ids().is_empty());
    }

    #[test]
    fn test_one_sided_batch_has_zero_efficiency() {
        let legs = vec![leg("a", Direction::Buy, 10), leg("b", Direction::Buy, 5)];
        let batch = compute_netting(&legs);
        assert_eq!(batch.residual(), Uint512::from(15u128));
        assert_eq!(batch.netting_efficiency(), Decimal::ZERO);
    }

    #[test]
    fn test_order_independence() {
        let legs = vec![
            leg("a", Direction::Sell, 7),
            leg("b", Direction::Buy, 3),
            leg("c", Direction::Sell, 11),
            leg("d", Direction::Buy, 13),
            leg("e", Direction::Sell, 1),
        ];
        let reference = compute_netting(&legs);

        let mut rotated = legs.clone();
        for _ in 0..legs.len() {
            rotated.rotate_left(1);
            assert_eq!(compute_netting(&rotated), reference);
        }
        let reversed: Vec<_> = legs.iter().rev().cloned().collect();
        assert_eq!(compute_netting(&reversed), reference);
    }

    #[test]
    fn test_efficiency_bounds_across_magnitudes() {
        let amounts: [u128; 6] = [0, 1, 999, 1_000_000, 10u128.pow(18), u128::MAX];
        for sell in amounts {
            for buy in amounts {
                let batch = compute_netting(&[
                    leg("s", Direction::Sell, sell),
                    leg("b", Direction::Buy, buy),
                ]);
                let e = batch.netting_efficiency();
                assert!(e >= Decimal::ZERO && e <= Decimal::ONE, "{sell} vs {buy}: {e}");
                if sell == buy {
                    assert_eq!(batch.residual(), Uint512::zero());
                }
            }
        }
    }

    #[test]
    fn test_totals_beyond_256_bits() {
        let legs: Vec<NettingLeg> = (0..4)
            .map(|i| NettingLeg::new(format!("s{i}").as_str(), Direction::Sell, Uint256::MAX))
            .collect();
        let batch = compute_netting(&legs);
        assert!(batch.sell_total() > Uint512::from(Uint256::MAX));
        assert_eq!(batch.residual_amount(), Err(NettingError::ResidualOverflow));
        assert_eq!(batch.netting_efficiency(), Decimal::ZERO);
    }

    #[test]
    fn test_batch_id_depends_on_members_only() {
        let a = compute_netting(&[leg("x", Direction::Sell, 1), leg("y", Direction::Buy, 2)]);
        let b = compute_netting(&[leg("y", Direction::Buy, 2), leg("x", Direction::Sell, 1)]);
        let c = compute_netting(&[leg("x", Direction::Sell, 1)]);
        assert_eq!(a.id(), b.id());
        assert_ne!(a.id(), c.id());
        assert_eq!(a.id().len(), 32);
    }
}
