//! Published Bybit fee tiers.
//!
//! Rates are taken from the public fee schedule and expressed as fractions,
//! so 0.1% is `0.0010`. They change rarely but are not fetched live; callers
//! needing exact fees should read them from `get_account_info`.

use crate::rest::endpoints::MarketType;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liquidity {
    Maker,
    Taker,
}

/// Maker/taker rate pair for one VIP tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeRate {
    pub maker: Decimal,
    pub taker: Decimal,
}

fn spot_tiers() -> &'static HashMap<&'static str, FeeRate> {
    static TIERS: OnceLock<HashMap<&'static str, FeeRate>> = OnceLock::new();
    TIERS.get_or_init(|| {
        HashMap::from([
            (
                "Non-VIP",
                FeeRate {
                    maker: Decimal::new(10, 4),
                    taker: Decimal::new(10, 4),
                },
            ),
            (
                "VIP1",
                FeeRate {
                    maker: Decimal::new(675, 6),
                    taker: Decimal::new(10, 4),
                },
            ),
            (
                "VIP2",
                FeeRate {
                    maker: Decimal::new(650, 6),
                    taker: Decimal::new(775, 6),
                },
            ),
            (
                "VIP3",
                FeeRate {
                    maker: Decimal::new(625, 6),
                    taker: Decimal::new(750, 6),
                },
            ),
            (
                "VIP4",
                FeeRate {
                    maker: Decimal::new(5, 4),
                    taker: Decimal::new(6, 4),
                },
            ),
            (
                "VIP5",
                FeeRate {
                    maker: Decimal::new(4, 4),
                    taker: Decimal::new(5, 4),
                },
            ),
            (
                "Supreme VIP",
                FeeRate {
                    maker: Decimal::new(3, 4),
                    taker: Decimal::new(45, 5),
                },
            ),
        ])
    })
}

fn derivatives_tiers() -> &'static HashMap<&'static str, FeeRate> {
    static TIERS: OnceLock<HashMap<&'static str, FeeRate>> = OnceLock::new();
    TIERS.get_or_init(|| {
        HashMap::from([(
            "Non-VIP",
            FeeRate {
                maker: Decimal::new(4, 4),
                taker: Decimal::new(10, 4),
            },
        )])
    })
}

/// Fee rate for a VIP tier; unknown tiers fall back to Non-VIP.
#[must_use]
pub fn spot_fee_rate(vip_tier: &str) -> FeeRate {
    let tiers = spot_tiers();
    tiers
        .get(vip_tier)
        .or_else(|| tiers.get("Non-VIP"))
        .copied()
        .unwrap_or(FeeRate {
            maker: Decimal::new(10, 4),
            taker: Decimal::new(10, 4),
        })
}

#[must_use]
pub fn derivatives_fee_rate(vip_tier: &str) -> FeeRate {
    let tiers = derivatives_tiers();
    tiers
        .get(vip_tier)
        .or_else(|| tiers.get("Non-VIP"))
        .copied()
        .unwrap_or(FeeRate {
            maker: Decimal::new(4, 4),
            taker: Decimal::new(10, 4),
        })
}

/// Fee paid on `notional` for a trade of the given market, tier and
/// liquidity.
#[must_use]
pub fn compute_fee(
    market: MarketType,
    notional: Decimal,
    vip_tier: &str,
    liquidity: Liquidity,
) -> Decimal {
    let rate = match market {
        MarketType::Spot => spot_fee_rate(vip_tier),
        MarketType::Linear => derivatives_fee_rate(vip_tier),
    };
    let rate = match liquidity {
        Liquidity::Maker => rate.maker,
        Liquidity::Taker => rate.taker,
    };
    notional * rate
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_vip_spot_rates() {
        let rate = spot_fee_rate("Non-VIP");
        assert_eq!(rate.maker, Decimal::new(10, 4));
        assert_eq!(rate.taker, Decimal::new(10, 4));
    }

    #[test]
    fn unknown_tier_falls_back_to_non_vip() {
        assert_eq!(spot_fee_rate("VIP99"), spot_fee_rate("Non-VIP"));
        assert_eq!(derivatives_fee_rate("VIP3"), derivatives_fee_rate("Non-VIP"));
    }

    #[test]
    fn supreme_vip_is_cheapest_spot_tier() {
        let supreme = spot_fee_rate("Supreme VIP");
        assert_eq!(supreme.maker, Decimal::new(3, 4));
        assert_eq!(supreme.taker, Decimal::new(45, 5));

        for tier in ["Non-VIP", "VIP1", "VIP2", "VIP3", "VIP4", "VIP5"] {
            let rate = spot_fee_rate(tier);
            assert!(supreme.maker <= rate.maker, "{tier}");
            assert!(supreme.taker <= rate.taker, "{tier}");
        }
    }

    #[test]
    fn spot_fee_on_notional() {
        // 10,000 USDT taker at Non-VIP is 10 USDT
        let fee = compute_fee(
            MarketType::Spot,
            Decimal::new(10_000, 0),
            "Non-VIP",
            Liquidity::Taker,
        );
        assert_eq!(fee, Decimal::new(10, 0));

        let fee = compute_fee(
            MarketType::Spot,
            Decimal::new(10_000, 0),
            "VIP4",
            Liquidity::Maker,
        );
        assert_eq!(fee, Decimal::new(5, 0));
    }

    #[test]
    fn derivatives_fee_on_notional() {
        // Derivatives maker 0.04%, taker 0.10% at Non-VIP
        let fee = compute_fee(
            MarketType::Linear,
            Decimal::new(10_000, 0),
            "Non-VIP",
            Liquidity::Maker,
        );
        assert_eq!(fee, Decimal::new(4, 0));

        let fee = compute_fee(
            MarketType::Linear,
            Decimal::new(10_000, 0),
            "VIP2",
            Liquidity::Taker,
        );
        assert_eq!(fee, Decimal::new(10, 0));
    }
}
