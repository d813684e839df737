use std::ops::RangeInclusive;

use tracing::debug;

use super::accumulation::simulate_accumulation;
use super::calibration::calibrate_net_income;
use super::drawdown::simulate_drawdown;
use super::error::SimulationError;
use super::types::{
    ComparisonResult, ContributionPolicy, RetirementSpending, SimulationConfig, Strategy,
    StrategyRun,
};

/// Oldest age any phase may reach.
pub const MAX_AGE: u32 = 120;
/// Calendar years a simulation may start in.
pub const START_YEAR_RANGE: RangeInclusive<i32> = 1900..=2200;

/// Runs every configured strategy over the same assumptions.
///
/// Output is a pure function of `config`; runs share nothing.
pub fn run_comparison(config: &SimulationConfig) -> Result<ComparisonResult, SimulationError> {
    validate_config(config)?;

    let runs = config
        .strategies
        .iter()
        .map(|&strategy| simulate_strategy(config, strategy))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ComparisonResult { runs })
}

/// Accumulation followed by drawdown for a single strategy.
pub fn run_strategy(
    config: &SimulationConfig,
    strategy: Strategy,
) -> Result<StrategyRun, SimulationError> {
    validate_config(config)?;
    simulate_strategy(config, strategy)
}

fn simulate_strategy(
    config: &SimulationConfig,
    strategy: Strategy,
) -> Result<StrategyRun, SimulationError> {
    let accumulation = simulate_accumulation(config, strategy)?;
    let retirement_balances = accumulation.ending;

    let (target_net_income, drawdown, terminal_target) = match config.retirement_spending {
        RetirementSpending::Fixed { net_income } => (
            net_income,
            simulate_drawdown(config, strategy, retirement_balances, net_income)?,
            0.0,
        ),
        RetirementSpending::Deplete { terminal_balance } => {
            let calibrated =
                calibrate_net_income(config, strategy, retirement_balances, terminal_balance)?;
            (
                calibrated.target_net_income,
                calibrated.drawdown,
                terminal_balance,
            )
        }
    };

    debug!(
        strategy = strategy.label(),
        retirement_total = retirement_balances.total(),
        target_net_income,
        shortfall_years = drawdown.shortfall_years,
        "strategy run finished"
    );

    let mut records = accumulation.records;
    records.extend(drawdown.records);

    Ok(StrategyRun {
        strategy,
        records,
        retirement_balances,
        target_net_income,
        terminal_balance: drawdown.ending.total(),
        terminal_target,
        shortfall_years: drawdown.shortfall_years,
    })
}

pub fn validate_config(config: &SimulationConfig) -> Result<(), SimulationError> {
    if !START_YEAR_RANGE.contains(&config.start_year) {
        return Err(SimulationError::invalid(format!(
            "start year {} must be within {}..={}",
            config.start_year,
            START_YEAR_RANGE.start(),
            START_YEAR_RANGE.end()
        )));
    }
    for (name, age) in [
        ("current age", config.current_age),
        ("retirement age", config.retirement_age),
        ("terminal age", config.terminal_age),
    ] {
        if age > MAX_AGE {
            return Err(SimulationError::invalid(format!(
                "{name} {age} must be at most {MAX_AGE}"
            )));
        }
    }
    if config.retirement_age < config.current_age {
        return Err(SimulationError::invalid(format!(
            "retirement age {} is before current age {}",
            config.retirement_age, config.current_age
        )));
    }
    if config.terminal_age < config.retirement_age {
        return Err(SimulationError::invalid(format!(
            "terminal age {} is before retirement age {}",
            config.terminal_age, config.retirement_age
        )));
    }
    if config.strategies.is_empty() {
        return Err(SimulationError::invalid("at least one strategy is required"));
    }

    non_negative("annual income", config.annual_income)?;
    non_negative("standard deduction", config.standard_deduction)?;
    non_negative("starting pre-tax balance", config.starting_pretax_balance)?;
    non_negative("starting Roth balance", config.starting_roth_balance)?;
    fraction("invest tax savings", config.invest_tax_savings)?;
    fraction("Roth split", config.roth_split)?;
    fraction(
        "realized gains fraction",
        config.side_account_tax.realized_fraction,
    )?;
    if !(0.0..1.0).contains(&config.side_account_tax.capital_gains_rate) {
        return Err(SimulationError::invalid(format!(
            "capital gains rate must be within [0, 1), got {}",
            config.side_account_tax.capital_gains_rate
        )));
    }

    for (name, rate) in [
        ("annual raise", config.annual_raise),
        ("accumulation return", config.accumulation_return),
        ("retirement return", config.retirement_return),
        ("spending growth", config.spending_growth),
    ] {
        if !rate.is_finite() || rate <= -1.0 {
            return Err(SimulationError::invalid(format!(
                "{name} must be greater than -100%, got {rate}"
            )));
        }
    }

    match config.contribution {
        ContributionPolicy::RateOfIncome(rate) => non_negative("contribution rate", rate)?,
        ContributionPolicy::FixedAmount(amount) => non_negative("contribution amount", amount)?,
        ContributionPolicy::MaxLimit => {}
    }
    if let Some(m) = config.employer_match {
        non_negative("employer match rate", m.match_rate)?;
        non_negative("employer match salary cap", m.salary_cap)?;
    }
    if let Some(threshold) = config.roth_catch_up_wage_threshold {
        non_negative("Roth catch-up wage threshold", threshold)?;
    }
    match config.retirement_spending {
        RetirementSpending::Fixed { net_income } => {
            non_negative("retirement net income", net_income)?
        }
        RetirementSpending::Deplete { terminal_balance } => {
            non_negative("terminal balance", terminal_balance)?
        }
    }

    if !config.solver.tolerance.is_finite() || config.solver.tolerance <= 0.0 {
        return Err(SimulationError::config("solver tolerance must be > 0"));
    }
    if config.solver.max_iterations == 0 {
        return Err(SimulationError::config("solver max iterations must be > 0"));
    }
    Ok(())
}

fn non_negative(name: &str, value: f64) -> Result<(), SimulationError> {
    if !value.is_finite() || value < 0.0 {
        return Err(SimulationError::invalid(format!(
            "{name} must be a non-negative amount, got {value}"
        )));
    }
    Ok(())
}

fn fraction(name: &str, value: f64) -> Result<(), SimulationError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(SimulationError::invalid(format!(
            "{name} must be within [0, 1], got {value}"
        )));
    }
    Ok(())
}
