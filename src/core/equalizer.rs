//! Gross-up solver for the equal-lifestyle withdrawal.
//!
//! Tax owed depends on the gross withdrawal, and the gross withdrawal must
//! leave `target_net` after tax. Tax is a non-decreasing piecewise linear
//! function of gross with every marginal rate below 1, so a Newton step using
//! the local marginal rate lands on the solution once the guess sits in the
//! right segment. High top rates need no more steps than low ones.

use super::error::SimulationError;
use super::tax::{BracketSchedule, bracket_tax};
use super::types::SolverSettings;

/// Width of the forward difference used to read the local marginal rate.
const SLOPE_STEP: f64 = 1.0;
/// Slopes at or above this are treated as unusable and the step falls back to
/// the raw shortfall.
const MAX_USABLE_SLOPE: f64 = 1.0 - 1e-9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WithdrawalSolution {
    pub gross: f64,
    pub tax: f64,
    pub net: f64,
    pub iterations: u32,
}

/// Gross withdrawal whose bracket tax leaves `target_net` spendable.
pub fn solve_withdrawal(
    target_net: f64,
    schedule: &BracketSchedule,
    starting_guess: f64,
) -> Result<f64, SimulationError> {
    solve_gross_for_net(
        target_net,
        starting_guess,
        SolverSettings::default(),
        |gross| bracket_tax(gross, schedule).tax_owed,
    )
    .map(|solution| solution.gross)
}

/// Newton solve of `gross - tax_of(gross) == target_net`.
///
/// `tax_of` must be non-decreasing in gross with slope below 1. Its slope is
/// read by forward difference at each guess, and a step that would leave the
/// bracket of guesses already seen to net low and high bisects instead. A
/// non-finite or negative `starting_guess` falls back to the target itself.
pub fn solve_gross_for_net<F>(
    target_net: f64,
    starting_guess: f64,
    settings: SolverSettings,
    tax_of: F,
) -> Result<WithdrawalSolution, SimulationError>
where
    F: Fn(f64) -> f64,
{
    if !target_net.is_finite() || target_net < 0.0 {
        return Err(SimulationError::invalid(format!(
            "target net income must be a non-negative amount, got {target_net}"
        )));
    }
    if !settings.tolerance.is_finite() || settings.tolerance <= 0.0 {
        return Err(SimulationError::config("solver tolerance must be > 0"));
    }

    let mut gross = if starting_guess.is_finite() && starting_guess >= 0.0 {
        starting_guess
    } else {
        target_net
    };

    // Grosses known to net below (`lo`) and above (`hi`) the target.
    let mut lo = 0.0_f64;
    let mut hi = f64::INFINITY;

    for iteration in 1..=settings.max_iterations {
        let tax = tax_of(gross).max(0.0);
        let net = gross - tax;
        let shortfall = target_net - net;
        if shortfall.abs() <= settings.tolerance {
            return Ok(WithdrawalSolution {
                gross,
                tax,
                net,
                iterations: iteration,
            });
        }
        if shortfall > 0.0 {
            lo = lo.max(gross);
        } else {
            hi = hi.min(gross);
        }

        let slope = (tax_of(gross + SLOPE_STEP).max(0.0) - tax) / SLOPE_STEP;
        let step = if slope.is_finite() && (0.0..MAX_USABLE_SLOPE).contains(&slope) {
            shortfall / (1.0 - slope)
        } else {
            shortfall
        };
        let next = gross + step;
        // A step that leaves the bracket can cycle on non-concave tax curves.
        gross = if next > lo && next < hi {
            next
        } else if hi.is_finite() {
            (lo + hi) * 0.5
        } else {
            next.max(lo)
        };
    }

    Err(SimulationError::Convergence {
        target_net,
        iterations: settings.max_iterations,
        last_gross: gross,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::{prop_assert, proptest};

    fn federal() -> BracketSchedule {
        BracketSchedule::us_federal_single_2024()
    }

    fn net_of(gross: f64) -> f64 {
        gross - bracket_tax(gross, &federal()).tax_owed
    }

    #[test]
    fn solves_reference_targets_within_a_cent() {
        for target in [0.0, 50_000.0, 1_000_000.0] {
            let gross = solve_withdrawal(target, &federal(), target).expect("converges");
            assert!(
                (net_of(gross) - target).abs() <= 0.01,
                "target {target}: gross {gross} nets {}",
                net_of(gross)
            );
            assert!(gross + 1e-9 >= target);
        }
    }

    #[test]
    fn zero_target_needs_no_iteration_beyond_the_first() {
        let solution = solve_gross_for_net(0.0, 0.0, SolverSettings::default(), |g| g * 0.3)
            .expect("trivial");
        assert_eq!(solution.iterations, 1);
        assert_eq!(solution.gross, 0.0);
    }

    #[test]
    fn flat_tax_matches_closed_form_gross_up() {
        let solution =
            solve_gross_for_net(70_000.0, 70_000.0, SolverSettings::default(), |g| g * 0.3)
                .expect("converges");
        assert!((solution.gross - 100_000.0).abs() < 0.02);
        assert!((solution.net - 70_000.0).abs() <= 0.01);
        assert!((solution.tax - solution.gross * 0.3).abs() < 1e-9);
    }

    #[test]
    fn bad_guess_falls_back_to_target() {
        let a = solve_withdrawal(50_000.0, &federal(), f64::NAN).expect("converges");
        let b = solve_withdrawal(50_000.0, &federal(), -10.0).expect("converges");
        let c = solve_withdrawal(50_000.0, &federal(), 50_000.0).expect("converges");
        assert_eq!(a, c);
        assert_eq!(b, c);
    }

    #[test]
    fn negative_target_is_invalid_input() {
        let err = solve_withdrawal(-1.0, &federal(), 0.0).expect_err("must reject");
        assert!(matches!(err, SimulationError::InvalidInput(_)));
    }

    #[test]
    fn iteration_cap_surfaces_as_convergence_error() {
        let settings = SolverSettings {
            tolerance: 0.01,
            max_iterations: 1,
        };
        let err = solve_gross_for_net(1_000_000.0, 0.0, settings, |g| g * 0.9)
            .expect_err("cannot converge in one step");
        match err {
            SimulationError::Convergence { iterations, .. } => assert_eq!(iterations, 1),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn near_confiscatory_top_bracket_converges_quickly() {
        for top in [0.9, 0.99, 0.995] {
            let schedule =
                BracketSchedule::new(&[(10_000.0, 0.1), (f64::INFINITY, top)]).expect("valid");
            let solution = solve_gross_for_net(
                1_000_000.0,
                1_000_000.0,
                SolverSettings::default(),
                |g| bracket_tax(g, &schedule).tax_owed,
            )
            .expect("converges");
            let expected = 10_000.0 + (1_000_000.0 - 9_000.0) / (1.0 - top);
            assert!((solution.net - 1_000_000.0).abs() <= 0.01, "top {top}");
            assert!((solution.gross - expected).abs() < 1.0, "top {top}");
            assert!(solution.iterations <= 6, "top {top}: {}", solution.iterations);
        }
    }

    #[test]
    fn guess_inside_a_lower_bracket_walks_up_the_schedule() {
        let solution = solve_gross_for_net(
            400_000.0,
            0.0,
            SolverSettings::default(),
            |g| bracket_tax(g, &federal()).tax_owed,
        )
        .expect("converges");
        assert!((solution.net - 400_000.0).abs() <= 0.01);
        assert!(solution.iterations <= federal().brackets().len() as u32 + 2);
    }

    #[test]
    fn falling_marginal_rate_still_converges() {
        let tax_of = |g: f64| 0.5 * g.min(10_000.0) + 0.05 * (g - 10_000.0).max(0.0);
        let solution = solve_gross_for_net(20_000.0, 0.0, SolverSettings::default(), tax_of)
            .expect("converges");
        assert!((solution.net - 20_000.0).abs() <= 0.01);
        assert!((solution.gross - 24_500.0 / 0.95).abs() < 0.02);
    }

    #[test]
    fn guess_above_solution_still_converges() {
        let gross = solve_withdrawal(50_000.0, &federal(), 5_000_000.0).expect("converges");
        assert!((net_of(gross) - 50_000.0).abs() <= 0.01);
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(128))]

        #[test]
        fn prop_solution_nets_target_within_tolerance(target_cents in 0u64..500_000_000) {
            let target = target_cents as f64 / 100.0;
            let gross = solve_withdrawal(target, &federal(), target).expect("converges");
            prop_assert!((net_of(gross) - target).abs() <= 0.01);
            prop_assert!(gross + 0.01 >= target);
        }

        #[test]
        fn prop_larger_targets_need_larger_withdrawals(
            target_cents in 0u64..100_000_000,
            bump_cents in 100u64..10_000_000
        ) {
            let low = target_cents as f64 / 100.0;
            let high = low + bump_cents as f64 / 100.0;
            let g_low = solve_withdrawal(low, &federal(), low).expect("converges");
            let g_high = solve_withdrawal(high, &federal(), high).expect("converges");
            prop_assert!(g_high > g_low);
        }
    }
}
