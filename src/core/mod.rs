mod accounts;
mod accumulation;
mod calibration;
mod drawdown;
mod engine;
mod equalizer;
mod error;
mod limits;
mod tax;
mod types;

pub use accumulation::{AccumulationOutcome, simulate_accumulation};
pub use calibration::{CalibrationIteration, CalibrationOutcome, calibrate_net_income};
pub use drawdown::{DrawdownOutcome, simulate_drawdown};
pub use engine::{MAX_AGE, START_YEAR_RANGE, run_comparison, run_strategy, validate_config};
pub use equalizer::{WithdrawalSolution, solve_gross_for_net, solve_withdrawal};
pub use error::SimulationError;
pub use limits::{
    ContributionLimitTable, DEFAULT_CATCH_UP_AGE, EnhancedCatchUp, LimitEntry, ResolvedLimit,
    resolve_limit, resolve_limit_parts,
};
pub use tax::{Bracket, BracketSchedule, STANDARD_DEDUCTION_2024, TaxOutcome, compute_tax};
pub use types::{
    AdvantageRow, Balances, ComparisonResult, ContributionPolicy, EmployerMatch, Phase,
    RetirementSpending, SideAccountTax, SideTaxMode, SimulationConfig, SolverSettings, Strategy,
    StrategyRun, StrategySummary, WithdrawalOrder, YearRecord,
};
