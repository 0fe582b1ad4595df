//! LMSR pricing
//!
//! Cost function `C(q) = b * ln(Σ exp(q_i / b))` evaluated with the
//! log-sum-exp shift `C(q) = max(q) + b * ln(Σ exp((q_i - max q) / b))`, so
//! every exponent is non-positive and the sum lies in `[1, N]`.
//!
//! Shares, `b` and collateral are token base units (`u64`). Intermediate costs
//! are WAD-scaled `u128`. Nothing is cached: every quote is computed from the
//! `q` and `b` passed in.

use crate::error::LmsrMarketError;
use crate::math::{self, WAD};

/// Probabilities are scaled so that all outcomes sum to this unit (1e18)
pub const PROBABILITY_UNIT: u64 = 1_000_000_000_000_000_000;

/// Divisor applied to the settlement pool when growing `b`
pub const LIQUIDITY_SCALING_FACTOR: u64 = 10;

/// Adaptive liquidity: `max(initial_b, pool / LIQUIDITY_SCALING_FACTOR)`
pub fn liquidity_for_pool(initial_b: u64, settlement_pool: u64) -> u64 {
    initial_b.max(settlement_pool / LIQUIDITY_SCALING_FACTOR)
}

/// Shifted weights `exp((q_i - max q) / b)` in WAD, plus the shift itself.
/// The largest outcome always weighs exactly WAD.
fn shifted_weights(q: &[u64], b: u64) -> Result<(u64, Vec<u128>), LmsrMarketError> {
    if b == 0 {
        return Err(LmsrMarketError::InvalidLiquidity);
    }
    if q.len() < 2 {
        return Err(LmsrMarketError::InvalidOutcomeCount);
    }

    let max_q = q.iter().copied().max().unwrap_or(0);
    let mut weights = Vec::with_capacity(q.len());
    for &q_i in q {
        // (max - q_i) * WAD <= u64::MAX * 1e18 < i128::MAX
        let gap = ((max_q - q_i) as u128) * WAD / (b as u128);
        let exponent = -(gap as i128);
        weights.push(math::exp(exponent)?);
    }

    Ok((max_q, weights))
}

/// `C(q)` in WAD-scaled collateral units
pub fn cost(q: &[u64], b: u64) -> Result<u128, LmsrMarketError> {
    let (max_q, weights) = shifted_weights(q, b)?;

    let sum = weights
        .iter()
        .try_fold(0u128, |acc, w| acc.checked_add(*w))
        .ok_or(LmsrMarketError::NumericOverflow)?;

    // sum >= WAD, so ln(sum) >= 0
    let ln_sum = math::ln(sum)?.max(0) as u128;

    (max_q as u128)
        .checked_mul(WAD)
        .and_then(|base| {
            (b as u128)
                .checked_mul(ln_sum)
                .and_then(|scaled| base.checked_add(scaled))
        })
        .ok_or(LmsrMarketError::NumericOverflow)
}

/// Instantaneous price of `outcome`, scaled to [`PROBABILITY_UNIT`]
pub fn price(q: &[u64], b: u64, outcome: usize) -> Result<u64, LmsrMarketError> {
    if outcome >= q.len() {
        return Err(LmsrMarketError::InvalidOutcomeIndex);
    }
    let prices = prices(q, b)?;
    Ok(prices[outcome])
}

/// Prices of every outcome, each scaled to [`PROBABILITY_UNIT`].
/// They sum to the unit up to one unit of rounding per outcome.
pub fn prices(q: &[u64], b: u64) -> Result<Vec<u64>, LmsrMarketError> {
    let (_, weights) = shifted_weights(q, b)?;
    let sum: u128 = weights.iter().sum();

    Ok(weights
        .iter()
        .map(|w| (w * PROBABILITY_UNIT as u128 / sum) as u64)
        .collect())
}

/// Collateral charged for buying `shares` of `outcome`.
///
/// Rounded up, and never less than one unit.
pub fn buy_cost(q: &[u64], b: u64, outcome: usize, shares: u64) -> Result<u64, LmsrMarketError> {
    if outcome >= q.len() {
        return Err(LmsrMarketError::InvalidOutcomeIndex);
    }
    if shares == 0 {
        return Err(LmsrMarketError::ZeroAmount);
    }

    let before = cost(q, b)?;
    let mut after_q = q.to_vec();
    after_q[outcome] = after_q[outcome]
        .checked_add(shares)
        .ok_or(LmsrMarketError::NumericOverflow)?;
    let after = cost(&after_q, b)?;

    let delta = after.saturating_sub(before);
    let charged = (delta + WAD - 1) / WAD;
    u64::try_from(charged.max(1)).map_err(|_| LmsrMarketError::NumericOverflow)
}

/// Raw collateral released by selling `shares` of `outcome`, rounded down.
///
/// This is the uncapped LMSR figure; the trading path caps it against the
/// seller's cost basis and the pool.
pub fn sell_refund(q: &[u64], b: u64, outcome: usize, shares: u64) -> Result<u64, LmsrMarketError> {
    if outcome >= q.len() {
        return Err(LmsrMarketError::InvalidOutcomeIndex);
    }
    if shares == 0 {
        return Err(LmsrMarketError::ZeroAmount);
    }
    if shares > q[outcome] {
        return Err(LmsrMarketError::InsufficientLiquidity);
    }

    let before = cost(q, b)?;
    let mut after_q = q.to_vec();
    after_q[outcome] -= shares;
    let after = cost(&after_q, b)?;

    let delta = before.saturating_sub(after);
    u64::try_from(delta / WAD).map_err(|_| LmsrMarketError::NumericOverflow)
}

#[cfg(test)]
mod tests {
    use super::*;

    const B: u64 = 1_000_000;

    fn price_sum(q: &[u64], b: u64) -> u64 {
        prices(q, b).unwrap().iter().sum()
    }

    #[test]
    fn test_uniform_prices() {
        let p = prices(&[0, 0], B).unwrap();
        assert_eq!(p, vec![PROBABILITY_UNIT / 2, PROBABILITY_UNIT / 2]);

        let p = prices(&[0, 0, 0, 0], B).unwrap();
        assert!(p.iter().all(|&x| x == PROBABILITY_UNIT / 4));
    }

    #[test]
    fn test_price_normalization() {
        let cases: Vec<Vec<u64>> = vec![
            vec![0, 0],
            vec![500_000, 0],
            vec![10_000_000, 3],
            vec![1, 2, 3],
            vec![250_000, 0, 999_999, 42, 7_000_000],
            vec![u32::MAX as u64, 0, 1_000],
        ];
        for q in cases {
            let sum = price_sum(&q, B);
            let n = q.len() as u64;
            assert!(sum <= PROBABILITY_UNIT, "q={:?} sum={}", q, sum);
            assert!(sum + n >= PROBABILITY_UNIT, "q={:?} sum={}", q, sum);
        }
    }

    #[test]
    fn test_cost_of_empty_book_is_b_ln_n() {
        // C(0, 0) = b * ln 2
        let c = cost(&[0, 0], B).unwrap();
        let expected = (B as u128) * crate::math::LN_2;
        let diff = if c > expected { c - expected } else { expected - c };
        assert!(diff < WAD / 1_000_000, "cost={} expected={}", c, expected);
    }

    #[test]
    fn test_buying_raises_price_and_marginal_cost() {
        let mut q = vec![0u64, 0];
        let mut last_price = price(&q, B, 0).unwrap();
        let mut last_cost = buy_cost(&q, B, 0, 100_000).unwrap();

        for _ in 0..5 {
            q[0] += 100_000;
            let p = price(&q, B, 0).unwrap();
            let c = buy_cost(&q, B, 0, 100_000).unwrap();
            assert!(p > last_price);
            assert!(c > last_cost);
            last_price = p;
            last_cost = c;
        }
    }

    #[test]
    fn test_concrete_binary_scenario() {
        // b * ln((e^0.5 + 1) / 2) = 280_929.96...
        let c1 = buy_cost(&[0, 0], B, 0, 500_000).unwrap();
        assert_eq!(c1, 280_930);

        let q = [500_000u64, 0];
        assert!(price(&q, B, 0).unwrap() > PROBABILITY_UNIT / 2);

        let q = [500_000u64, 500_000];
        let p0 = price(&q, B, 0).unwrap();
        assert_eq!(p0, PROBABILITY_UNIT / 2);
    }

    #[test]
    fn test_round_trip_never_profits() {
        let q = [123_456u64, 654_321, 42];
        for &delta in [1u64, 17, 1_000, 250_000].iter() {
            let paid = buy_cost(&q, B, 2, delta).unwrap();
            let mut after = q;
            after[2] += delta;
            let back = sell_refund(&after, B, 2, delta).unwrap();
            assert!(back <= paid, "delta={} paid={} back={}", delta, paid, back);
        }
    }

    #[test]
    fn test_minimum_cost_is_one_unit() {
        // One share against a very deep book still costs one unit
        assert_eq!(buy_cost(&[0, 0], 1_000_000_000_000, 0, 1).unwrap(), 1);
    }

    #[test]
    fn test_invalid_inputs() {
        assert_eq!(cost(&[0, 0], 0), Err(LmsrMarketError::InvalidLiquidity));
        assert_eq!(cost(&[0], B), Err(LmsrMarketError::InvalidOutcomeCount));
        assert_eq!(buy_cost(&[0, 0], B, 2, 1), Err(LmsrMarketError::InvalidOutcomeIndex));
        assert_eq!(buy_cost(&[0, 0], B, 0, 0), Err(LmsrMarketError::ZeroAmount));
        assert_eq!(sell_refund(&[5, 0], B, 0, 6), Err(LmsrMarketError::InsufficientLiquidity));
        assert_eq!(buy_cost(&[u64::MAX, 0], B, 0, 1), Err(LmsrMarketError::NumericOverflow));
    }

    #[test]
    fn test_liquidity_for_pool() {
        assert_eq!(liquidity_for_pool(1_000, 0), 1_000);
        assert_eq!(liquidity_for_pool(1_000, 9_999), 1_000);
        assert_eq!(liquidity_for_pool(1_000, 50_000), 5_000);
    }
}
