use tracing::debug;

use super::accounts::{TaxContext, apply_withdrawal, split_withdrawal};
use super::equalizer::solve_gross_for_net;
use super::error::SimulationError;
use super::types::{Balances, Phase, SimulationConfig, Strategy, YearRecord};

#[derive(Debug, Clone, PartialEq)]
pub struct DrawdownOutcome {
    pub records: Vec<YearRecord>,
    pub ending: Balances,
    pub shortfall_years: u32,
}

/// Retirement years from `retirement_age` up to (not including) `terminal_age`.
///
/// At the start of each year the gross withdrawal that leaves the year's
/// target net income after tax is taken from the accounts, then the remaining
/// balances grow at the retirement return. When the accounts cannot cover the
/// target everything left is withdrawn and the year is marked short.
pub fn simulate_drawdown(
    config: &SimulationConfig,
    strategy: Strategy,
    opening: Balances,
    target_net_income: f64,
) -> Result<DrawdownOutcome, SimulationError> {
    if !target_net_income.is_finite() || target_net_income < 0.0 {
        return Err(SimulationError::invalid(format!(
            "target net income must be a non-negative amount, got {target_net_income}"
        )));
    }

    let ctx = TaxContext {
        schedule: &config.bracket_schedule,
        standard_deduction: config.standard_deduction,
        side: config.side_account_tax,
    };
    let growth = config.retirement_return;
    let tolerance = config.solver.tolerance;
    let first_index = config.working_years();

    let mut balances = opening;
    let mut shortfall_years = 0;
    let mut records = Vec::with_capacity(config.retirement_years() as usize);

    for offset in 0..config.retirement_years() {
        let age = config.retirement_age + offset;
        let calendar_year = config.retirement_start_year() + offset as i32;
        let target = target_net_income * (1.0 + config.spending_growth).powi(offset as i32);

        let start = balances;
        let available = start.total();
        let order = config.withdrawal_order;
        let tax_of = |gross: f64| {
            let split = split_withdrawal(gross, &start, order);
            ctx.withdrawal_tax(&split, &start).total()
        };

        let max_net = available - tax_of(available);
        let gross = if target <= 0.0 || available <= 0.0 {
            0.0
        } else if max_net + tolerance < target {
            available
        } else {
            let guess = records
                .last()
                .map(|prev: &YearRecord| prev.gross_withdrawal)
                .unwrap_or(target);
            solve_gross_for_net(target, guess, config.solver, tax_of)?
                .gross
                .min(available)
        };

        let split = split_withdrawal(gross, &start, order);
        let tax = ctx.withdrawal_tax(&split, &start);
        let net_spendable = split.total() - tax.total();
        let shortfall = if net_spendable + tolerance < target {
            target - net_spendable
        } else {
            0.0
        };
        if shortfall > 0.0 {
            shortfall_years += 1;
            debug!(
                strategy = strategy.label(),
                age,
                target,
                net_spendable,
                "withdrawal shortfall"
            );
        }

        apply_withdrawal(&mut balances, &split);
        balances.pretax *= 1.0 + growth;
        balances.roth *= 1.0 + growth;
        let side_account_tax = ctx.grow_side_account(&mut balances, growth, split.pretax);

        let mut record = YearRecord::blank(
            strategy,
            Phase::Drawdown,
            first_index + offset,
            age,
            calendar_year,
            &balances,
        );
        record.gross_income = split.total();
        record.side_account_tax = side_account_tax;
        record.withdrawal_tax = tax.total();
        record.total_tax = tax.total() + side_account_tax;
        record.marginal_rate = tax.marginal_rate;
        record.effective_rate = if split.total() > 0.0 {
            tax.total() / split.total()
        } else {
            0.0
        };
        record.target_net_income = target;
        record.gross_withdrawal = split.total();
        record.withdrawal_pretax = split.pretax;
        record.withdrawal_roth = split.roth;
        record.withdrawal_taxable = split.taxable;
        record.net_spendable = net_spendable;
        record.shortfall = shortfall;
        records.push(record);
    }

    Ok(DrawdownOutcome {
        records,
        ending: balances,
        shortfall_years,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::accumulation::tests::sample_config;
    use crate::core::tax::bracket_tax;
    use crate::core::types::WithdrawalOrder;
    use proptest::prelude::{prop_assert, proptest};

    fn assert_approx_tol(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected}, got {actual}"
        );
    }

    fn roth_only(balance: f64) -> Balances {
        Balances {
            roth: balance,
            ..Balances::default()
        }
    }

    #[test]
    fn roth_withdrawals_are_untaxed() {
        let mut config = sample_config();
        config.terminal_age = config.retirement_age + 3;
        let outcome =
            simulate_drawdown(&config, Strategy::Roth, roth_only(1_000_000.0), 60_000.0)
                .expect("runs");

        assert_eq!(outcome.records.len(), 3);
        assert_eq!(outcome.shortfall_years, 0);
        for r in &outcome.records {
            assert_approx_tol(r.gross_withdrawal, 60_000.0, 1e-9);
            assert_eq!(r.withdrawal_tax, 0.0);
            assert_eq!(r.phase, Phase::Drawdown);
        }
        // (1_000_000 - 60_000) * 1.05
        assert_approx_tol(outcome.records[0].end_roth, 987_000.0, 1e-6);
        assert_eq!(outcome.records[0].year_index, config.working_years());
        assert_eq!(outcome.records[0].calendar_year, 2054);
    }

    #[test]
    fn pretax_withdrawals_are_grossed_up_for_tax() {
        let mut config = sample_config();
        config.terminal_age = config.retirement_age + 1;
        let opening = Balances {
            pretax: 2_000_000.0,
            ..Balances::default()
        };
        let outcome =
            simulate_drawdown(&config, Strategy::Traditional, opening, 80_000.0).expect("runs");
        let year = outcome.records[0];

        let tax = bracket_tax(year.gross_withdrawal - 14_600.0, &config.bracket_schedule).tax_owed;
        assert_approx_tol(year.withdrawal_tax, tax, 1e-6);
        assert_approx_tol(year.net_spendable, 80_000.0, config.solver.tolerance);
        assert!(year.gross_withdrawal > 80_000.0);
        assert_eq!(year.marginal_rate, 0.22);
    }

    #[test]
    fn insufficient_balance_withdraws_everything_and_flags_shortfall() {
        let mut config = sample_config();
        config.terminal_age = config.retirement_age + 2;
        let outcome =
            simulate_drawdown(&config, Strategy::Roth, roth_only(50_000.0), 40_000.0)
                .expect("runs");

        assert_eq!(outcome.shortfall_years, 1);
        let second = outcome.records[1];
        assert_approx_tol(second.gross_withdrawal, 10_500.0, 1e-6);
        assert_approx_tol(second.shortfall, 29_500.0, 1e-6);
        assert_eq!(outcome.ending.total(), 0.0);
    }

    #[test]
    fn zero_retirement_years_produce_empty_drawdown() {
        let mut config = sample_config();
        config.terminal_age = config.retirement_age;
        let opening = roth_only(500_000.0);
        let outcome = simulate_drawdown(&config, Strategy::Roth, opening, 10_000.0).expect("runs");
        assert!(outcome.records.is_empty());
        assert_eq!(outcome.ending, opening);
    }

    #[test]
    fn spending_growth_raises_later_targets() {
        let mut config = sample_config();
        config.terminal_age = config.retirement_age + 3;
        config.spending_growth = 0.10;
        let outcome =
            simulate_drawdown(&config, Strategy::Roth, roth_only(1_000_000.0), 10_000.0)
                .expect("runs");
        assert_approx_tol(outcome.records[2].target_net_income, 12_100.0, 1e-6);
        assert_approx_tol(outcome.records[2].net_spendable, 12_100.0, 1e-6);
    }

    #[test]
    fn taxable_first_pays_capital_gains_only_on_gains() {
        let mut config = sample_config();
        config.terminal_age = config.retirement_age + 1;
        config.withdrawal_order = WithdrawalOrder::TaxableFirst;
        let opening = Balances {
            pretax: 1_000_000.0,
            roth: 0.0,
            taxable: 200_000.0,
            taxable_basis: 100_000.0,
        };
        let outcome =
            simulate_drawdown(&config, Strategy::Traditional, opening, 50_000.0).expect("runs");
        let year = outcome.records[0];

        assert_eq!(year.withdrawal_pretax, 0.0);
        // Half of each dollar is gain taxed at 15%: gross * (1 - 0.075) = net.
        assert_approx_tol(year.gross_withdrawal, 50_000.0 / 0.925, 0.05);
    }

    #[test]
    fn negative_target_is_invalid_input() {
        let config = sample_config();
        let err = simulate_drawdown(&config, Strategy::Roth, roth_only(1.0), -5.0)
            .expect_err("rejects");
        assert!(matches!(err, SimulationError::InvalidInput(_)));
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(32))]

        #[test]
        fn prop_balances_never_go_negative(
            pretax in 0u32..3_000_000,
            roth in 0u32..3_000_000,
            taxable in 0u32..1_000_000,
            target in 0u32..400_000
        ) {
            let mut config = sample_config();
            config.terminal_age = config.retirement_age + 10;
            let opening = Balances {
                pretax: pretax as f64,
                roth: roth as f64,
                taxable: taxable as f64,
                taxable_basis: taxable as f64 / 2.0,
            };
            let outcome =
                simulate_drawdown(&config, Strategy::Traditional, opening, target as f64)
                    .expect("runs");
            for r in &outcome.records {
                prop_assert!(r.end_pretax >= 0.0 && r.end_roth >= 0.0 && r.end_taxable >= 0.0);
                prop_assert!(r.net_spendable <= r.target_net_income + config.solver.tolerance);
                prop_assert!(r.shortfall == 0.0 || r.end_total == 0.0);
            }
        }
    }
}
