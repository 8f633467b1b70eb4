//! Microstructure metrics computed directly from a book snapshot (C6).
//! Pure functions: no mutable state, no I/O, never touches the book.

use rust_decimal::Decimal;

/// One bps-precision basis-point scalar.
const BASIS_POINTS: Decimal = Decimal::from_parts(10000, 0, 0, false, 0);
/// `0.995`, the half-percent band below best bid used for `depth_half_pct_bid`.
const HALF_PCT_BELOW: Decimal = Decimal::from_parts(995, 0, 0, false, 3);
/// `1.005`, the half-percent band above best ask used for `depth_half_pct_ask`.
const HALF_PCT_ABOVE: Decimal = Decimal::from_parts(1005, 0, 0, false, 3);
/// `0.01`, the 1% depth fraction used for `impact_1pct`.
const ONE_PERCENT: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Microstructure metrics. Only produced when both sides
/// of the snapshot are non-empty (see [`compute`]); within that, `imbalance`
/// and `market_pressure` fall back to their documented neutral values when
/// the ask side carries zero volume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Metrics {
    pub best_bid: Decimal,
    pub best_ask: Decimal,
    pub spread: Decimal,
    pub spread_bps: Decimal,
    pub imbalance: Decimal,
    pub market_pressure: Decimal,
    pub vwap_bid: Decimal,
    pub vwap_ask: Decimal,
    pub depth_half_pct_bid: Decimal,
    pub depth_half_pct_ask: Decimal,
    /// Relative price move needed to absorb 1% of total resting depth by
    /// walking the ask side. `None` if the ask side's resting depth itself
    /// doesn't reach the 1% target (no price in the snapshot satisfies it).
    pub impact_1pct: Option<Decimal>,
}

impl Metrics {
    /// The all-neutral reading: `imbalance = 1.0`, `market_pressure = 0.0`,
    /// every other field zeroed or `None`. For callers that want a value to
    /// render rather than an `Option<Metrics>` when a book side is empty —
    /// [`compute`] itself always returns `None` in that case, since all
    /// metrics are only defined when both sides are non-empty.
    pub fn neutral() -> Self {
        Self {
            best_bid: Decimal::ZERO,
            best_ask: Decimal::ZERO,
            spread: Decimal::ZERO,
            spread_bps: Decimal::ZERO,
            imbalance: Decimal::ONE,
            market_pressure: Decimal::ZERO,
            vwap_bid: Decimal::ZERO,
            vwap_ask: Decimal::ZERO,
            depth_half_pct_bid: Decimal::ZERO,
            depth_half_pct_ask: Decimal::ZERO,
            impact_1pct: None,
        }
    }
}

/// Computes [`Metrics`] from top-of-book level snapshots. `bids` and `asks`
/// must each be in priority order (best price first), as returned by
/// [`crate::book::OrderBook::bid_levels`]/[`crate::book::OrderBook::ask_levels`].
///
/// Returns `None` when either side is empty — all metrics are
/// defined only when both sides are non-empty.
pub fn compute(bids: &[(Decimal, Decimal)], asks: &[(Decimal, Decimal)]) -> Option<Metrics> {
    let (best_bid, _) = *bids.first()?;
    let (best_ask, _) = *asks.first()?;

    let spread = best_ask - best_bid;
    let midpoint = (best_bid + best_ask) / Decimal::TWO;
    let spread_bps = if midpoint.is_zero() {
        Decimal::ZERO
    } else {
        (spread / midpoint) * BASIS_POINTS
    };

    let bid_total: Decimal = bids.iter().map(|(_, size)| *size).sum();
    let ask_total: Decimal = asks.iter().map(|(_, size)| *size).sum();
    let imbalance = if ask_total.is_zero() {
        Decimal::ONE
    } else {
        bid_total / ask_total
    };
    let market_pressure = (imbalance - Decimal::ONE) / (imbalance + Decimal::ONE);

    let vwap_bid = volume_weighted_average_price(bids);
    let vwap_ask = volume_weighted_average_price(asks);

    let bid_band = best_bid * HALF_PCT_BELOW;
    let depth_half_pct_bid: Decimal = bids
        .iter()
        .filter(|(price, _)| *price >= bid_band)
        .map(|(_, size)| *size)
        .sum();

    let ask_band = best_ask * HALF_PCT_ABOVE;
    let depth_half_pct_ask: Decimal = asks
        .iter()
        .filter(|(price, _)| *price <= ask_band)
        .map(|(_, size)| *size)
        .sum();

    let impact_target = (bid_total + ask_total) * ONE_PERCENT;
    let mut cumulative = Decimal::ZERO;
    let mut impact_price = None;
    for (price, size) in asks {
        cumulative += *size;
        if cumulative >= impact_target {
            impact_price = Some(*price);
            break;
        }
    }
    let impact_1pct = impact_price.map(|price| (price - best_ask) / best_ask);

    Some(Metrics {
        best_bid,
        best_ask,
        spread,
        spread_bps,
        imbalance,
        market_pressure,
        vwap_bid,
        vwap_ask,
        depth_half_pct_bid,
        depth_half_pct_ask,
        impact_1pct,
    })
}

fn volume_weighted_average_price(levels: &[(Decimal, Decimal)]) -> Decimal {
    let (numerator, denominator) = levels
        .iter()
        .fold((Decimal::ZERO, Decimal::ZERO), |(num, den), (price, size)| {
            (num + price * size, den + size)
        });
    if denominator.is_zero() {
        Decimal::ZERO
    } else {
        numerator / denominator
    }
}
