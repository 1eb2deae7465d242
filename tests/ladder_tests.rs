//! Ladder sizing and balance clamping properties

use approx::assert_relative_eq;
use proptest::prelude::*;

use market_bots::ladder::{build_ladder, LadderParams};

// =============================================================================
// Scenarios
// =============================================================================

#[test]
fn test_funded_ladder_prices_and_amounts() {
    let params = LadderParams::new(0.02, 2, 10.0).unwrap();
    let mut ladder = build_ladder(100.0, &params);
    let report = ladder.clamp_to_balances(1_000.0, 5_000.0);

    assert!(!report.is_clamped());

    let buy_prices: Vec<f64> = ladder.buys.iter().map(|r| r.price).collect();
    let sell_prices: Vec<f64> = ladder.sells.iter().map(|r| r.price).collect();
    assert_relative_eq!(buy_prices[0], 99.0, epsilon = 1e-9);
    assert_relative_eq!(buy_prices[1], 98.0, epsilon = 1e-9);
    assert_relative_eq!(sell_prices[0], 101.0, epsilon = 1e-9);
    assert_relative_eq!(sell_prices[1], 102.0, epsilon = 1e-9);

    for rung in ladder.buys.iter().chain(ladder.sells.iter()) {
        assert_relative_eq!(rung.amount, 10.0);
    }
    assert_relative_eq!(ladder.required_quote(), 1970.0, epsilon = 1e-9);
}

#[test]
fn test_underfunded_buys_are_scaled() {
    let params = LadderParams::new(0.02, 2, 10.0).unwrap();
    let mut ladder = build_ladder(100.0, &params);
    let report = ladder.clamp_to_balances(1_000.0, 500.0);

    let factor = report.buy_factor.unwrap();
    assert_relative_eq!(factor, 500.0 / 1970.0, epsilon = 1e-12);
    assert_relative_eq!(factor, 0.2538, epsilon = 1e-4);
    for rung in &ladder.buys {
        assert_relative_eq!(rung.amount, 2.538, epsilon = 1e-3);
    }
    assert_eq!(report.sell_factor, None);
    assert_relative_eq!(ladder.required_quote(), 500.0, epsilon = 1e-9);
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #[test]
    fn prop_rung_prices_follow_level_spacing(
        mid in 0.0001f64..100_000.0,
        levels in 1usize..=10,
        spread in 0.001f64..0.5,
    ) {
        let params = LadderParams::new(spread, levels, 1.0).unwrap();
        let ladder = build_ladder(mid, &params);

        prop_assert_eq!(ladder.buys.len(), levels);
        prop_assert_eq!(ladder.sells.len(), levels);
        for k in 1..=levels {
            let offset = spread * k as f64 / levels as f64;
            let buy = ladder.buys[k - 1];
            let sell = ladder.sells[k - 1];
            prop_assert_eq!(buy.level, k);
            prop_assert!((buy.price - mid * (1.0 - offset)).abs() <= 1e-9 * mid);
            prop_assert!((sell.price - mid * (1.0 + offset)).abs() <= 1e-9 * mid);
        }
    }

    #[test]
    fn prop_clamped_buys_fit_quote_balance(
        mid in 0.01f64..10_000.0,
        levels in 1usize..=10,
        amount in 0.001f64..1_000.0,
        quote in 0.0f64..100_000.0,
    ) {
        let params = LadderParams::new(0.02, levels, amount).unwrap();
        let mut ladder = build_ladder(mid, &params);
        let required = ladder.required_quote();
        let report = ladder.clamp_to_balances(f64::MAX, quote);

        if required > quote {
            let factor = quote / required;
            prop_assert_eq!(report.buy_factor, Some(factor));
            for rung in &ladder.buys {
                prop_assert!((rung.amount - amount * factor).abs() <= 1e-9 * amount);
            }
            prop_assert!(ladder.required_quote() <= quote * (1.0 + 1e-9) + 1e-9);
        } else {
            prop_assert_eq!(report.buy_factor, None);
        }
    }

    #[test]
    fn prop_non_positive_rungs_are_not_submitted(
        levels in 1usize..=10,
        amount in 0.0f64..10.0,
        base in 0.0f64..5.0,
    ) {
        let params = LadderParams::new(0.02, levels, amount).unwrap();
        let mut ladder = build_ladder(50.0, &params);
        ladder.clamp_to_balances(base, 0.0);

        prop_assert_eq!(ladder.submittable_buys().count(), 0);
        prop_assert!(ladder.submittable_sells().all(|r| r.amount > 0.0));
    }
}
