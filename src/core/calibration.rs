use tracing::debug;

use super::drawdown::{DrawdownOutcome, simulate_drawdown};
use super::error::SimulationError;
use super::types::{Balances, SimulationConfig, Strategy};

const CALIBRATION_TOLERANCE: f64 = 1e-4;
const CALIBRATION_MAX_ITERATIONS: u32 = 200;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationIteration {
    pub iteration: u32,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub candidate: f64,
    pub ending_balance: f64,
    pub shortfall_years: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationOutcome {
    pub target_net_income: f64,
    pub drawdown: DrawdownOutcome,
    pub iterations: Vec<CalibrationIteration>,
    pub converged: bool,
    pub feasible: bool,
}

/// Largest first-year net income the accounts can pay every retirement year
/// while still ending at `terminal_balance`.
///
/// Bisects between zero spending and the level annuity the whole opening
/// balance could buy before tax, which no after-tax plan can exceed.
pub fn calibrate_net_income(
    config: &SimulationConfig,
    strategy: Strategy,
    opening: Balances,
    terminal_balance: f64,
) -> Result<CalibrationOutcome, SimulationError> {
    if !terminal_balance.is_finite() || terminal_balance < 0.0 {
        return Err(SimulationError::invalid(format!(
            "terminal balance must be a non-negative amount, got {terminal_balance}"
        )));
    }

    let is_feasible = |outcome: &DrawdownOutcome| {
        outcome.shortfall_years == 0 && outcome.ending.total() >= terminal_balance
    };

    let floor = simulate_drawdown(config, strategy, opening, 0.0)?;
    if config.retirement_years() == 0 || !is_feasible(&floor) {
        let feasible = is_feasible(&floor);
        return Ok(CalibrationOutcome {
            target_net_income: 0.0,
            drawdown: floor,
            iterations: Vec::new(),
            converged: true,
            feasible,
        });
    }

    let mut lo = 0.0;
    let mut hi = annuity_ceiling(config, opening.total());
    let mut best = floor;
    let mut iterations = Vec::new();
    let mut converged = false;

    for iteration in 1..=CALIBRATION_MAX_ITERATIONS {
        let mid = (lo + hi) * 0.5;
        let outcome = simulate_drawdown(config, strategy, opening, mid)?;
        iterations.push(CalibrationIteration {
            iteration,
            lower_bound: lo,
            upper_bound: hi,
            candidate: mid,
            ending_balance: outcome.ending.total(),
            shortfall_years: outcome.shortfall_years,
        });

        if is_feasible(&outcome) {
            lo = mid;
            best = outcome;
        } else {
            hi = mid;
        }

        if hi - lo <= CALIBRATION_TOLERANCE {
            converged = true;
            break;
        }
    }

    debug!(
        strategy = strategy.label(),
        target_net_income = lo,
        iterations = iterations.len(),
        converged,
        "calibrated retirement income"
    );

    Ok(CalibrationOutcome {
        target_net_income: lo,
        drawdown: best,
        iterations,
        converged,
        feasible: true,
    })
}

/// Start-of-year payment, growing with spending, that exhausts `total` exactly
/// with no tax at all.
fn annuity_ceiling(config: &SimulationConfig, total: f64) -> f64 {
    let ratio = (1.0 + config.spending_growth) / (1.0 + config.retirement_return);
    let factor: f64 = (0..config.retirement_years())
        .map(|k| ratio.powi(k as i32))
        .sum();
    if factor <= 0.0 {
        return total.max(0.0) + 1.0;
    }
    total.max(0.0) / factor * (1.0 + 1e-6) + 1.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::accumulation::tests::sample_config;
    use proptest::prelude::{prop_assert, proptest};

    fn assert_approx_tol(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn roth_only_calibration_matches_annuity_payment() {
        let mut config = sample_config();
        config.terminal_age = config.retirement_age + 20;
        let opening = Balances {
            roth: 1_000_000.0,
            ..Balances::default()
        };
        let outcome =
            calibrate_net_income(&config, Strategy::Roth, opening, 0.0).expect("calibrates");

        // Annuity due: 1_000_000 / sum_{k<20} 1.05^-k
        let factor: f64 = (0..20).map(|k| 1.05f64.powi(-k)).sum();
        assert!(outcome.converged && outcome.feasible);
        assert_approx_tol(outcome.target_net_income, 1_000_000.0 / factor, 0.05);
        assert_eq!(outcome.drawdown.shortfall_years, 0);
        assert_approx_tol(outcome.drawdown.ending.total(), 0.0, 1.0);
    }

    #[test]
    fn calibration_hits_a_positive_terminal_balance() {
        let mut config = sample_config();
        config.terminal_age = config.retirement_age + 25;
        let opening = Balances {
            pretax: 2_000_000.0,
            roth: 500_000.0,
            taxable: 300_000.0,
            taxable_basis: 150_000.0,
        };
        let outcome = calibrate_net_income(&config, Strategy::Traditional, opening, 250_000.0)
            .expect("calibrates");

        assert!(outcome.converged);
        assert_eq!(outcome.drawdown.shortfall_years, 0);
        assert!(outcome.drawdown.ending.total() >= 250_000.0);
        assert_approx_tol(outcome.drawdown.ending.total(), 250_000.0, 50.0);
    }

    #[test]
    fn unreachable_terminal_balance_spends_nothing() {
        let mut config = sample_config();
        config.terminal_age = config.retirement_age + 5;
        let opening = Balances {
            roth: 100.0,
            ..Balances::default()
        };
        let outcome =
            calibrate_net_income(&config, Strategy::Roth, opening, 1_000_000.0).expect("runs");
        assert!(!outcome.feasible);
        assert_eq!(outcome.target_net_income, 0.0);
    }

    #[test]
    fn no_retirement_years_skips_the_search() {
        let mut config = sample_config();
        config.terminal_age = config.retirement_age;
        let opening = Balances {
            roth: 100_000.0,
            ..Balances::default()
        };
        let outcome = calibrate_net_income(&config, Strategy::Roth, opening, 0.0).expect("runs");
        assert!(outcome.iterations.is_empty());
        assert!(outcome.drawdown.records.is_empty());
    }

    #[test]
    fn bisection_brackets_shrink_every_iteration() {
        let mut config = sample_config();
        config.terminal_age = config.retirement_age + 10;
        let opening = Balances {
            pretax: 800_000.0,
            ..Balances::default()
        };
        let outcome =
            calibrate_net_income(&config, Strategy::Traditional, opening, 0.0).expect("runs");
        for pair in outcome.iterations.windows(2) {
            let prev = pair[0].upper_bound - pair[0].lower_bound;
            let next = pair[1].upper_bound - pair[1].lower_bound;
            assert_approx_tol(next, prev * 0.5, 1e-6);
        }
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(12))]

        #[test]
        fn prop_calibrated_income_depletes_without_shortfall(
            pretax in 100_000u32..3_000_000,
            roth in 0u32..1_000_000,
            years in 1u32..35
        ) {
            let mut config = sample_config();
            config.terminal_age = config.retirement_age + years;
            let opening = Balances {
                pretax: pretax as f64,
                roth: roth as f64,
                ..Balances::default()
            };
            let outcome = calibrate_net_income(&config, Strategy::Traditional, opening, 0.0)
                .expect("calibrates");
            prop_assert!(outcome.target_net_income > 0.0);
            prop_assert!(outcome.drawdown.shortfall_years == 0);
            prop_assert!(outcome.drawdown.ending.total() < 0.01 * opening.total());
        }
    }
}
