//! 3-6-9 price ladder generator

use crate::state::AlertCondition;

/// One candidate alert level
#[derive(Debug, Clone, PartialEq)]
pub struct Level {
    pub price: f64,
    pub condition: AlertCondition,
}

/// Iterations per walk; enough rungs to cover an intraday move.
const WALK_STEPS: usize = 10;

/// Large-cap prices step in tens to keep rungs meaningful.
const WIDE_PATTERN_THRESHOLD: f64 = 3333.0;

/// Derive alert levels from a reference close.
///
/// Two independent walks from the anchor: resistance adds the cyclic
/// 3-6-9 step pattern, support subtracts it. Resistance totals above the
/// last traded price and support totals below it become levels; both walks
/// always run the full step count. Returns nothing without a valid anchor.
pub fn generate_levels(last_traded_price: f64, reference_close: f64) -> Vec<Level> {
    if reference_close <= 0.0 {
        return Vec::new();
    }

    let pattern: [f64; 3] = if reference_close > WIDE_PATTERN_THRESHOLD {
        [30.0, 60.0, 90.0]
    } else {
        [3.0, 6.0, 9.0]
    };

    let mut levels = Vec::new();
    let mut resistance = reference_close;
    let mut support = reference_close;

    for i in 0..WALK_STEPS {
        let step = pattern[i % 3];

        resistance += step;
        if resistance > last_traded_price {
            levels.push(Level {
                price: round2(resistance),
                condition: AlertCondition::Above,
            });
        }

        support -= step;
        if support < last_traded_price {
            levels.push(Level {
                price: round2(support),
                condition: AlertCondition::Below,
            });
        }
    }

    levels
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_is_deterministic() {
        let a = generate_levels(100.0, 90.0);
        let b = generate_levels(100.0, 90.0);
        assert_eq!(a, b);
        assert!(!a.is_empty());
    }

    #[test]
    fn test_narrow_pattern_walks_from_anchor() {
        let levels = generate_levels(100.0, 90.0);

        // Resistance walk: 93, 99, 108, 111, 117, 126, ... only totals
        // above the LTP qualify
        let above: Vec<f64> = levels
            .iter()
            .filter(|l| l.condition == AlertCondition::Above)
            .map(|l| l.price)
            .collect();
        assert_eq!(above[0], 108.0);
        assert!(above.iter().all(|p| *p > 100.0));

        // Support walk: 87, 81, 72, ... all below the LTP
        let below: Vec<f64> = levels
            .iter()
            .filter(|l| l.condition == AlertCondition::Below)
            .map(|l| l.price)
            .collect();
        assert_eq!(below[0], 87.0);
        assert_eq!(below.len(), 10);
    }

    #[test]
    fn test_wide_pattern_above_threshold() {
        let levels = generate_levels(3400.0, 3400.0);

        // 3400 > 3333 switches steps to [30, 60, 90]
        let above: Vec<f64> = levels
            .iter()
            .filter(|l| l.condition == AlertCondition::Above)
            .map(|l| l.price)
            .collect();
        assert_eq!(above[0], 3430.0);
        assert_eq!(above[1], 3490.0);
        assert_eq!(above[2], 3580.0);

        let below: Vec<f64> = levels
            .iter()
            .filter(|l| l.condition == AlertCondition::Below)
            .map(|l| l.price)
            .collect();
        assert_eq!(below[0], 3370.0);
    }

    #[test]
    fn test_threshold_is_on_reference_close_not_ltp() {
        // Anchor below the threshold keeps the narrow pattern even when
        // the LTP is above it
        let levels = generate_levels(4000.0, 3000.0);
        let above: Vec<f64> = levels
            .iter()
            .filter(|l| l.condition == AlertCondition::Above)
            .map(|l| l.price)
            .collect();
        // Narrow walk tops out at 3000 + 60 = 3060, all below the LTP
        assert!(above.is_empty());
        assert!(!levels.is_empty());
    }

    #[test]
    fn test_no_levels_without_anchor() {
        assert!(generate_levels(100.0, 0.0).is_empty());
        assert!(generate_levels(100.0, -5.0).is_empty());
    }

    #[test]
    fn test_totals_equal_to_ltp_are_not_emitted() {
        // Anchor 97, first resistance rung lands exactly on the LTP (100)
        let levels = generate_levels(100.0, 97.0);
        assert!(levels
            .iter()
            .all(|l| l.price != 100.0));
    }

    #[test]
    fn test_rounding_to_two_decimals() {
        let levels = generate_levels(10.0, 5.155);
        for level in levels {
            let scaled = level.price * 100.0;
            assert!((scaled - scaled.round()).abs() < 1e-9);
        }
    }
}
