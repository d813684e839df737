use tracing::debug;

use super::accounts::TaxContext;
use super::error::SimulationError;
use super::limits::resolve_limit_parts;
use super::tax::ordinary_income_tax;
use super::types::{Balances, ContributionPolicy, Phase, SimulationConfig, Strategy, YearRecord};

#[derive(Debug, Clone, PartialEq)]
pub struct AccumulationOutcome {
    pub records: Vec<YearRecord>,
    pub ending: Balances,
}

/// Working years from `current_age` up to (not including) `retirement_age`.
///
/// Each year the capped contribution and any employer match land in the
/// strategy's accounts, the income tax saved by pre-tax dollars is partly
/// invested in the side account, then every balance grows at the
/// accumulation return.
pub fn simulate_accumulation(
    config: &SimulationConfig,
    strategy: Strategy,
) -> Result<AccumulationOutcome, SimulationError> {
    let ctx = TaxContext {
        schedule: &config.bracket_schedule,
        standard_deduction: config.standard_deduction,
        side: config.side_account_tax,
    };
    let growth = config.accumulation_return;
    let pretax_share = strategy.pretax_share(config.roth_split);

    let mut balances = Balances {
        pretax: config.starting_pretax_balance,
        roth: config.starting_roth_balance,
        taxable: 0.0,
        taxable_basis: 0.0,
    };
    let mut records = Vec::with_capacity(config.working_years() as usize);

    for year_index in 0..config.working_years() {
        let age = config.current_age + year_index;
        let calendar_year = config.start_year + year_index as i32;
        let income = config.annual_income * (1.0 + config.annual_raise).powi(year_index as i32);

        let limit = resolve_limit_parts(age, calendar_year, &config.contribution_limits)?;
        if limit.total() <= 0.0 {
            return Err(SimulationError::invalid(format!(
                "contribution limit for {calendar_year} must be positive"
            )));
        }
        let desired = match config.contribution {
            ContributionPolicy::RateOfIncome(rate) => rate * income,
            ContributionPolicy::FixedAmount(amount) => amount,
            ContributionPolicy::MaxLimit => limit.total(),
        };
        if !desired.is_finite() || desired < 0.0 {
            return Err(SimulationError::invalid(format!(
                "age {age}: contribution {desired} must be a non-negative amount"
            )));
        }
        let contribution = desired.min(limit.total()).min(income);

        let (pretax_contribution, roth_contribution) = match config.roth_catch_up_wage_threshold {
            Some(threshold) if income > threshold => {
                let regular = contribution.min(limit.base);
                let catch_up = contribution - regular;
                (
                    regular * pretax_share,
                    regular * (1.0 - pretax_share) + catch_up,
                )
            }
            _ => (
                contribution * pretax_share,
                contribution * (1.0 - pretax_share),
            ),
        };

        let employer_match = config
            .employer_match
            .map(|m| m.match_rate * contribution.min(m.salary_cap * income))
            .unwrap_or(0.0);

        let tax_without_deferral =
            ordinary_income_tax(income, config.standard_deduction, &config.bracket_schedule);
        let income_tax = ordinary_income_tax(
            income - pretax_contribution,
            config.standard_deduction,
            &config.bracket_schedule,
        );
        let tax_savings = (tax_without_deferral.tax_owed - income_tax.tax_owed).max(0.0);
        let tax_savings_invested = tax_savings * config.invest_tax_savings;

        balances.pretax += pretax_contribution + employer_match;
        balances.roth += roth_contribution;
        balances.taxable += tax_savings_invested;
        balances.taxable_basis += tax_savings_invested;

        balances.pretax *= 1.0 + growth;
        balances.roth *= 1.0 + growth;
        let side_account_tax =
            ctx.grow_side_account(&mut balances, growth, income - pretax_contribution);

        let total_tax = income_tax.tax_owed + side_account_tax;
        let mut record = YearRecord::blank(
            strategy,
            Phase::Accumulation,
            year_index,
            age,
            calendar_year,
            &balances,
        );
        record.gross_income = income;
        record.contribution = contribution;
        record.pretax_contribution = pretax_contribution;
        record.roth_contribution = roth_contribution;
        record.employer_match = employer_match;
        record.tax_savings_invested = tax_savings_invested;
        record.income_tax = income_tax.tax_owed;
        record.side_account_tax = side_account_tax;
        record.total_tax = total_tax;
        record.marginal_rate = income_tax.marginal_rate;
        record.effective_rate = if income > 0.0 { total_tax / income } else { 0.0 };
        records.push(record);
    }

    debug!(
        strategy = strategy.label(),
        years = records.len(),
        ending_total = balances.total(),
        "accumulation finished"
    );

    Ok(AccumulationOutcome {
        records,
        ending: balances,
    })
}
