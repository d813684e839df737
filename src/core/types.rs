use serde::Serialize;

use super::limits::ContributionLimitTable;
use super::tax::BracketSchedule;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    Traditional,
    Roth,
    Split,
}

impl Strategy {
    /// Share of each employee contribution that goes to the pre-tax account.
    pub fn pretax_share(self, roth_split: f64) -> f64 {
        match self {
            Strategy::Traditional => 1.0,
            Strategy::Roth => 0.0,
            Strategy::Split => (1.0 - roth_split).clamp(0.0, 1.0),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Strategy::Traditional => "traditional",
            Strategy::Roth => "roth",
            Strategy::Split => "split",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ContributionPolicy {
    /// Fraction of gross income, capped at the resolved limit.
    RateOfIncome(f64),
    FixedAmount(f64),
    MaxLimit,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct EmployerMatch {
    /// Employer dollars per employee dollar.
    pub match_rate: f64,
    /// Matched employee dollars are capped at this fraction of salary.
    pub salary_cap: f64,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SideTaxMode {
    /// Realized gains taxed at the flat capital gains rate.
    Flat,
    /// Realized gains stacked on the year's ordinary income and run through the brackets.
    Ordinary,
}

/// How growth in the side-taxable account is taxed.
///
/// `realized_fraction` of each year's growth is realized and taxed that year,
/// paid out of the account. Whatever is left unrealized is taxed at
/// `capital_gains_rate` when it is withdrawn.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SideAccountTax {
    pub mode: SideTaxMode,
    pub capital_gains_rate: f64,
    pub realized_fraction: f64,
}

impl Default for SideAccountTax {
    fn default() -> Self {
        Self {
            mode: SideTaxMode::Flat,
            capital_gains_rate: 0.15,
            realized_fraction: 1.0,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum RetirementSpending {
    /// Spend this net amount in the first retirement year.
    Fixed { net_income: f64 },
    /// Spend the largest net amount that still ends at `terminal_balance`.
    Deplete { terminal_balance: f64 },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum WithdrawalOrder {
    ProRata,
    TaxableFirst,
    PreTaxFirst,
    RothFirst,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SolverSettings {
    pub tolerance: f64,
    pub max_iterations: u32,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            tolerance: 0.01,
            max_iterations: 1_000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub annual_income: f64,
    pub annual_raise: f64,
    pub current_age: u32,
    pub retirement_age: u32,
    pub terminal_age: u32,
    pub start_year: i32,
    pub contribution: ContributionPolicy,
    pub accumulation_return: f64,
    pub retirement_return: f64,
    pub bracket_schedule: BracketSchedule,
    pub standard_deduction: f64,
    pub contribution_limits: ContributionLimitTable,
    pub employer_match: Option<EmployerMatch>,
    pub roth_catch_up_wage_threshold: Option<f64>,
    pub starting_pretax_balance: f64,
    pub starting_roth_balance: f64,
    pub invest_tax_savings: f64,
    pub roth_split: f64,
    pub side_account_tax: SideAccountTax,
    pub retirement_spending: RetirementSpending,
    pub spending_growth: f64,
    pub withdrawal_order: WithdrawalOrder,
    pub strategies: Vec<Strategy>,
    pub solver: SolverSettings,
}

impl SimulationConfig {
    pub fn working_years(&self) -> u32 {
        self.retirement_age.saturating_sub(self.current_age)
    }

    pub fn retirement_years(&self) -> u32 {
        self.terminal_age.saturating_sub(self.retirement_age)
    }

    pub fn retirement_start_year(&self) -> i32 {
        self.start_year + self.working_years() as i32
    }
}

/// Per-strategy account state: pre-tax 401k, Roth 401k and the side-taxable
/// account with its cost basis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Balances {
    pub pretax: f64,
    pub roth: f64,
    pub taxable: f64,
    pub taxable_basis: f64,
}

impl Balances {
    pub fn total(&self) -> f64 {
        self.pretax + self.roth + self.taxable
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Accumulation,
    Drawdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearRecord {
    pub strategy: Strategy,
    pub phase: Phase,
    pub year_index: u32,
    pub age: u32,
    pub calendar_year: i32,
    pub gross_income: f64,
    pub contribution: f64,
    pub pretax_contribution: f64,
    pub roth_contribution: f64,
    pub employer_match: f64,
    pub tax_savings_invested: f64,
    pub income_tax: f64,
    pub side_account_tax: f64,
    pub withdrawal_tax: f64,
    pub total_tax: f64,
    pub marginal_rate: f64,
    pub effective_rate: f64,
    pub target_net_income: f64,
    pub gross_withdrawal: f64,
    pub withdrawal_pretax: f64,
    pub withdrawal_roth: f64,
    pub withdrawal_taxable: f64,
    pub net_spendable: f64,
    pub shortfall: f64,
    pub end_pretax: f64,
    pub end_roth: f64,
    pub end_taxable: f64,
    pub end_taxable_basis: f64,
    pub end_total: f64,
}

impl YearRecord {
    /// Record with every amount zeroed and ending balances taken from `balances`.
    pub(crate) fn blank(
        strategy: Strategy,
        phase: Phase,
        year_index: u32,
        age: u32,
        calendar_year: i32,
        balances: &Balances,
    ) -> Self {
        Self {
            strategy,
            phase,
            year_index,
            age,
            calendar_year,
            gross_income: 0.0,
            contribution: 0.0,
            pretax_contribution: 0.0,
            roth_contribution: 0.0,
            employer_match: 0.0,
            tax_savings_invested: 0.0,
            income_tax: 0.0,
            side_account_tax: 0.0,
            withdrawal_tax: 0.0,
            total_tax: 0.0,
            marginal_rate: 0.0,
            effective_rate: 0.0,
            target_net_income: 0.0,
            gross_withdrawal: 0.0,
            withdrawal_pretax: 0.0,
            withdrawal_roth: 0.0,
            withdrawal_taxable: 0.0,
            net_spendable: 0.0,
            shortfall: 0.0,
            end_pretax: balances.pretax,
            end_roth: balances.roth,
            end_taxable: balances.taxable,
            end_taxable_basis: balances.taxable_basis,
            end_total: balances.total(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyRun {
    pub strategy: Strategy,
    pub records: Vec<YearRecord>,
    pub retirement_balances: Balances,
    pub target_net_income: f64,
    pub terminal_balance: f64,
    pub terminal_target: f64,
    pub shortfall_years: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategySummary {
    pub strategy: Strategy,
    pub retirement_balances: Balances,
    pub retirement_total: f64,
    pub target_net_income: f64,
    pub terminal_balance: f64,
    pub terminal_deviation: f64,
    pub shortfall_years: u32,
    pub total_contributions: f64,
    pub total_employer_match: f64,
    pub lifetime_tax: f64,
    pub lifetime_net_income: f64,
    pub average_retirement_effective_rate: f64,
}

impl StrategyRun {
    pub fn terminal_deviation(&self) -> f64 {
        self.terminal_balance - self.terminal_target
    }

    pub fn drawdown(&self) -> impl Iterator<Item = &YearRecord> {
        self.records.iter().filter(|r| r.phase == Phase::Drawdown)
    }

    pub fn summary(&self) -> StrategySummary {
        let drawdown_years = self.drawdown().count();
        let average_retirement_effective_rate = if drawdown_years == 0 {
            0.0
        } else {
            self.drawdown().map(|r| r.effective_rate).sum::<f64>() / drawdown_years as f64
        };

        StrategySummary {
            strategy: self.strategy,
            retirement_balances: self.retirement_balances,
            retirement_total: self.retirement_balances.total(),
            target_net_income: self.target_net_income,
            terminal_balance: self.terminal_balance,
            terminal_deviation: self.terminal_deviation(),
            shortfall_years: self.shortfall_years,
            total_contributions: self.records.iter().map(|r| r.contribution).sum(),
            total_employer_match: self.records.iter().map(|r| r.employer_match).sum(),
            lifetime_tax: self.records.iter().map(|r| r.total_tax).sum(),
            lifetime_net_income: self.drawdown().map(|r| r.net_spendable).sum(),
            average_retirement_effective_rate,
        }
    }
}

/// Traditional minus Roth net spendable income for one retirement age.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvantageRow {
    pub age: u32,
    pub traditional_net: f64,
    pub roth_net: f64,
    pub difference: f64,
    pub cumulative_difference: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonResult {
    pub runs: Vec<StrategyRun>,
}

impl ComparisonResult {
    pub fn run(&self, strategy: Strategy) -> Option<&StrategyRun> {
        self.runs.iter().find(|r| r.strategy == strategy)
    }

    /// Every record of every run, grouped by strategy and ordered by age.
    pub fn ledger(&self) -> impl Iterator<Item = &YearRecord> {
        self.runs.iter().flat_map(|r| r.records.iter())
    }

    pub fn advantage(&self) -> Vec<AdvantageRow> {
        let (Some(traditional), Some(roth)) = (
            self.run(Strategy::Traditional),
            self.run(Strategy::Roth),
        ) else {
            return Vec::new();
        };

        let mut cumulative = 0.0;
        traditional
            .drawdown()
            .zip(roth.drawdown())
            .map(|(t, r)| {
                let difference = t.net_spendable - r.net_spendable;
                cumulative += difference;
                AdvantageRow {
                    age: t.age,
                    traditional_net: t.net_spendable,
                    roth_net: r.net_spendable,
                    difference,
                    cumulative_difference: cumulative,
                }
            })
            .collect()
    }
}
