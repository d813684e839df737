mod tables;

use axum::{
    Router,
    extract::{Json, Query},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::core::{
    AdvantageRow, BracketSchedule, ComparisonResult, ContributionLimitTable, ContributionPolicy,
    EmployerMatch, RetirementSpending, STANDARD_DEDUCTION_2024, SideAccountTax, SideTaxMode,
    MAX_AGE, START_YEAR_RANGE, SimulationConfig, SimulationError, SolverSettings, Strategy,
    StrategySummary, WithdrawalOrder, YearRecord, compute_tax, run_comparison, validate_config,
};
use tables::TablesFile;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliStrategy {
    Traditional,
    Roth,
    Split,
}

impl From<CliStrategy> for Strategy {
    fn from(value: CliStrategy) -> Self {
        match value {
            CliStrategy::Traditional => Strategy::Traditional,
            CliStrategy::Roth => Strategy::Roth,
            CliStrategy::Split => Strategy::Split,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliContributionMode {
    /// Contribute the full limit every year.
    Max,
    /// Contribute --contribution-rate percent of income.
    Rate,
    /// Contribute --contribution-amount dollars.
    Amount,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliWithdrawalOrder {
    ProRata,
    TaxableFirst,
    PretaxFirst,
    RothFirst,
}

impl From<CliWithdrawalOrder> for WithdrawalOrder {
    fn from(value: CliWithdrawalOrder) -> Self {
        match value {
            CliWithdrawalOrder::ProRata => WithdrawalOrder::ProRata,
            CliWithdrawalOrder::TaxableFirst => WithdrawalOrder::TaxableFirst,
            CliWithdrawalOrder::PretaxFirst => WithdrawalOrder::PreTaxFirst,
            CliWithdrawalOrder::RothFirst => WithdrawalOrder::RothFirst,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliSideTaxMode {
    Flat,
    Ordinary,
}

impl From<CliSideTaxMode> for SideTaxMode {
    fn from(value: CliSideTaxMode) -> Self {
        match value {
            CliSideTaxMode::Flat => SideTaxMode::Flat,
            CliSideTaxMode::Ordinary => SideTaxMode::Ordinary,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiContributionMode {
    #[serde(alias = "maxLimit", alias = "max_limit", alias = "max-limit")]
    Max,
    #[serde(alias = "rateOfIncome", alias = "rate_of_income")]
    Rate,
    #[serde(alias = "fixedAmount", alias = "fixed_amount")]
    Amount,
}

impl From<ApiContributionMode> for CliContributionMode {
    fn from(value: ApiContributionMode) -> Self {
        match value {
            ApiContributionMode::Max => CliContributionMode::Max,
            ApiContributionMode::Rate => CliContributionMode::Rate,
            ApiContributionMode::Amount => CliContributionMode::Amount,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiWithdrawalOrder {
    #[serde(alias = "proRata", alias = "pro_rata")]
    ProRata,
    #[serde(alias = "taxableFirst", alias = "taxable_first")]
    TaxableFirst,
    #[serde(alias = "pretaxFirst", alias = "pretax_first", alias = "preTaxFirst")]
    PretaxFirst,
    #[serde(alias = "rothFirst", alias = "roth_first")]
    RothFirst,
}

impl From<ApiWithdrawalOrder> for CliWithdrawalOrder {
    fn from(value: ApiWithdrawalOrder) -> Self {
        match value {
            ApiWithdrawalOrder::ProRata => CliWithdrawalOrder::ProRata,
            ApiWithdrawalOrder::TaxableFirst => CliWithdrawalOrder::TaxableFirst,
            ApiWithdrawalOrder::PretaxFirst => CliWithdrawalOrder::PretaxFirst,
            ApiWithdrawalOrder::RothFirst => CliWithdrawalOrder::RothFirst,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiSideTaxMode {
    #[serde(alias = "flatRate", alias = "flat_rate")]
    Flat,
    #[serde(alias = "ordinaryIncome", alias = "ordinary_income")]
    Ordinary,
}

impl From<ApiSideTaxMode> for CliSideTaxMode {
    fn from(value: ApiSideTaxMode) -> Self {
        match value {
            ApiSideTaxMode::Flat => CliSideTaxMode::Flat,
            ApiSideTaxMode::Ordinary => CliSideTaxMode::Ordinary,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SimulatePayload {
    annual_income: Option<f64>,
    annual_raise: Option<f64>,
    current_age: Option<u32>,
    retirement_age: Option<u32>,
    terminal_age: Option<u32>,
    start_year: Option<i32>,

    contribution_mode: Option<ApiContributionMode>,
    contribution_rate: Option<f64>,
    contribution_amount: Option<f64>,
    employer_match: Option<f64>,
    employer_match_cap: Option<f64>,
    roth_catch_up_wage_threshold: Option<f64>,
    pretax_start: Option<f64>,
    roth_start: Option<f64>,

    accumulation_return: Option<f64>,
    retirement_return: Option<f64>,
    limit_inflation: Option<f64>,
    standard_deduction: Option<f64>,

    capital_gains_rate: Option<f64>,
    realized_gains: Option<f64>,
    side_tax_mode: Option<ApiSideTaxMode>,
    invest_tax_savings: Option<f64>,
    roth_split: Option<f64>,

    retirement_net_income: Option<f64>,
    terminal_balance: Option<f64>,
    spending_growth: Option<f64>,
    withdrawal_order: Option<ApiWithdrawalOrder>,
    /// Comma separated, e.g. `traditional,roth,split`.
    strategies: Option<String>,

    solver_tolerance: Option<f64>,
    solver_max_iterations: Option<u32>,

    include_ledger: Option<bool>,
}

#[derive(Parser, Debug)]
#[command(
    name = "roth-compare",
    about = "Traditional vs Roth 401k comparison (accumulation, invested tax savings, equal-lifestyle drawdown)"
)]
struct Cli {
    #[arg(long, default_value_t = 550_000.0)]
    annual_income: f64,
    #[arg(long, default_value_t = 0.0, help = "Annual pay rise in percent")]
    annual_raise: f64,
    #[arg(long, default_value_t = 35)]
    current_age: u32,
    #[arg(long, default_value_t = 65)]
    retirement_age: u32,
    #[arg(long, default_value_t = 95, help = "Age at which the drawdown ends")]
    terminal_age: u32,
    #[arg(long, default_value_t = 2024, help = "Calendar year of the first working year")]
    start_year: i32,

    #[arg(long, value_enum, default_value_t = CliContributionMode::Max)]
    contribution_mode: CliContributionMode,
    #[arg(
        long,
        default_value_t = 10.0,
        help = "Contribution as percent of income when --contribution-mode rate"
    )]
    contribution_rate: f64,
    #[arg(long, default_value_t = 23_000.0)]
    contribution_amount: f64,
    #[arg(long, default_value_t = 0.0, help = "Employer match in percent of each employee dollar")]
    employer_match: f64,
    #[arg(
        long,
        default_value_t = 0.0,
        help = "Matched employee dollars capped at this percent of salary"
    )]
    employer_match_cap: f64,
    #[arg(long, help = "Wages above which catch-up contributions must go to Roth")]
    roth_catch_up_wage_threshold: Option<f64>,
    #[arg(long, default_value_t = 0.0)]
    pretax_start: f64,
    #[arg(long, default_value_t = 0.0)]
    roth_start: f64,

    #[arg(long, default_value_t = 7.0, help = "Annual return while working, in percent")]
    accumulation_return: f64,
    #[arg(long, default_value_t = 5.0, help = "Annual return in retirement, in percent")]
    retirement_return: f64,
    #[arg(
        long,
        default_value_t = 2.5,
        help = "Inflation used to project contribution limits past 2026, in percent"
    )]
    limit_inflation: f64,
    #[arg(long, help = "Standard deduction, defaults to the tables file or 14600")]
    standard_deduction: Option<f64>,

    #[arg(long, default_value_t = 15.0, help = "Side account capital gains rate in percent")]
    capital_gains_rate: f64,
    #[arg(
        long,
        default_value_t = 100.0,
        help = "Percent of yearly side account growth realized and taxed that year"
    )]
    realized_gains: f64,
    #[arg(long, value_enum, default_value_t = CliSideTaxMode::Flat)]
    side_tax_mode: CliSideTaxMode,
    #[arg(
        long,
        default_value_t = 100.0,
        help = "Percent of pre-tax contribution tax savings invested in the side account"
    )]
    invest_tax_savings: f64,
    #[arg(
        long,
        default_value_t = 50.0,
        help = "Percent of contributions sent to Roth under the split strategy"
    )]
    roth_split: f64,

    #[arg(
        long,
        help = "Fixed first-year net retirement income; omit to spend down to --terminal-balance"
    )]
    retirement_net_income: Option<f64>,
    #[arg(long, default_value_t = 0.0)]
    terminal_balance: f64,
    #[arg(
        long,
        default_value_t = 0.0,
        help = "Yearly growth of the retirement net income target in percent"
    )]
    spending_growth: f64,
    #[arg(long, value_enum, default_value_t = CliWithdrawalOrder::ProRata)]
    withdrawal_order: CliWithdrawalOrder,
    #[arg(
        long,
        value_enum,
        value_delimiter = ',',
        default_values_t = [CliStrategy::Traditional, CliStrategy::Roth]
    )]
    strategies: Vec<CliStrategy>,

    #[arg(long, help = "TOML file with brackets, standard deduction and limit rows")]
    tables: Option<PathBuf>,
    #[arg(long, default_value_t = 0.01)]
    solver_tolerance: f64,
    #[arg(long, default_value_t = 1_000)]
    solver_max_iterations: u32,
}

#[derive(Copy, Clone, Debug)]
struct ApiOptions {
    include_ledger: bool,
}

#[derive(Debug)]
struct ApiRequest {
    config: SimulationConfig,
    options: ApiOptions,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulateResponse {
    strategies: Vec<StrategySummary>,
    advantage: Vec<AdvantageRow>,
    ledger: Vec<YearRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaxQuery {
    income: f64,
    #[serde(default)]
    standard_deduction: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TaxResponse {
    income: f64,
    taxable_income: f64,
    tax_owed: f64,
    effective_rate: f64,
    marginal_rate: f64,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn percent_in_range(flag: &str, value: f64, max: f64) -> Result<f64, String> {
    if !(0.0..=max).contains(&value) {
        return Err(format!("{flag} must be between 0 and {max}"));
    }
    Ok(value / 100.0)
}

fn rate_above_minus_100(flag: &str, value: f64) -> Result<f64, String> {
    if !value.is_finite() || value <= -100.0 {
        return Err(format!("{flag} must be > -100"));
    }
    Ok(value / 100.0)
}

fn non_negative(flag: &str, value: f64) -> Result<f64, String> {
    if !value.is_finite() || value < 0.0 {
        return Err(format!("{flag} must be >= 0"));
    }
    Ok(value)
}

fn build_inputs(cli: Cli) -> Result<SimulationConfig, String> {
    if !START_YEAR_RANGE.contains(&cli.start_year) {
        return Err(format!(
            "--start-year must be within {}..={}",
            START_YEAR_RANGE.start(),
            START_YEAR_RANGE.end()
        ));
    }
    for (flag, age) in [
        ("--current-age", cli.current_age),
        ("--retirement-age", cli.retirement_age),
        ("--terminal-age", cli.terminal_age),
    ] {
        if age > MAX_AGE {
            return Err(format!("{flag} must be at most {MAX_AGE}"));
        }
    }
    if cli.retirement_age < cli.current_age {
        return Err("--retirement-age must be >= --current-age".to_string());
    }
    if cli.terminal_age < cli.retirement_age {
        return Err("--terminal-age must be >= --retirement-age".to_string());
    }
    if cli.strategies.is_empty() {
        return Err("--strategies must name at least one strategy".to_string());
    }
    if cli.capital_gains_rate >= 100.0 {
        return Err("--capital-gains-rate must be below 100".to_string());
    }
    if !cli.solver_tolerance.is_finite() || cli.solver_tolerance <= 0.0 {
        return Err("--solver-tolerance must be > 0".to_string());
    }
    if cli.solver_max_iterations == 0 {
        return Err("--solver-max-iterations must be > 0".to_string());
    }

    let annual_income = non_negative("--annual-income", cli.annual_income)?;
    let contribution = match cli.contribution_mode {
        CliContributionMode::Max => ContributionPolicy::MaxLimit,
        CliContributionMode::Rate => ContributionPolicy::RateOfIncome(percent_in_range(
            "--contribution-rate",
            cli.contribution_rate,
            100.0,
        )?),
        CliContributionMode::Amount => ContributionPolicy::FixedAmount(non_negative(
            "--contribution-amount",
            cli.contribution_amount,
        )?),
    };

    let match_rate = non_negative("--employer-match", cli.employer_match)? / 100.0;
    let salary_cap = percent_in_range("--employer-match-cap", cli.employer_match_cap, 100.0)?;
    let employer_match = (match_rate > 0.0 && salary_cap > 0.0).then_some(EmployerMatch {
        match_rate,
        salary_cap,
    });
    let roth_catch_up_wage_threshold = cli
        .roth_catch_up_wage_threshold
        .map(|v| non_negative("--roth-catch-up-wage-threshold", v))
        .transpose()?;

    let retirement_spending = match cli.retirement_net_income {
        Some(net_income) => RetirementSpending::Fixed {
            net_income: non_negative("--retirement-net-income", net_income)?,
        },
        None => RetirementSpending::Deplete {
            terminal_balance: non_negative("--terminal-balance", cli.terminal_balance)?,
        },
    };

    let tables = match &cli.tables {
        Some(path) => TablesFile::from_file(path)?,
        None => TablesFile::default(),
    };
    let bracket_schedule = tables
        .bracket_schedule()?
        .unwrap_or_else(BracketSchedule::us_federal_single_2024);
    let standard_deduction = non_negative(
        "--standard-deduction",
        cli.standard_deduction
            .or(tables.standard_deduction)
            .unwrap_or(STANDARD_DEDUCTION_2024),
    )?;
    let limit_inflation = rate_above_minus_100("--limit-inflation", cli.limit_inflation)?;
    let contribution_limits = match tables.limit_table()? {
        Some(table) => table,
        None => {
            let working_years = cli.retirement_age - cli.current_age;
            let last_year = cli.start_year + working_years.saturating_sub(1) as i32;
            ContributionLimitTable::projected(cli.start_year, last_year, limit_inflation)
                .map_err(|e| e.to_string())?
        }
    };

    let mut strategies: Vec<Strategy> = Vec::with_capacity(cli.strategies.len());
    for strategy in cli.strategies.iter().copied().map(Strategy::from) {
        if !strategies.contains(&strategy) {
            strategies.push(strategy);
        }
    }

    let config = SimulationConfig {
        annual_income,
        annual_raise: rate_above_minus_100("--annual-raise", cli.annual_raise)?,
        current_age: cli.current_age,
        retirement_age: cli.retirement_age,
        terminal_age: cli.terminal_age,
        start_year: cli.start_year,
        contribution,
        accumulation_return: rate_above_minus_100(
            "--accumulation-return",
            cli.accumulation_return,
        )?,
        retirement_return: rate_above_minus_100("--retirement-return", cli.retirement_return)?,
        bracket_schedule,
        standard_deduction,
        contribution_limits,
        employer_match,
        roth_catch_up_wage_threshold,
        starting_pretax_balance: non_negative("--pretax-start", cli.pretax_start)?,
        starting_roth_balance: non_negative("--roth-start", cli.roth_start)?,
        invest_tax_savings: percent_in_range(
            "--invest-tax-savings",
            cli.invest_tax_savings,
            100.0,
        )?,
        roth_split: percent_in_range("--roth-split", cli.roth_split, 100.0)?,
        side_account_tax: SideAccountTax {
            mode: cli.side_tax_mode.into(),
            capital_gains_rate: percent_in_range(
                "--capital-gains-rate",
                cli.capital_gains_rate,
                100.0,
            )?,
            realized_fraction: percent_in_range("--realized-gains", cli.realized_gains, 100.0)?,
        },
        retirement_spending,
        spending_growth: rate_above_minus_100("--spending-growth", cli.spending_growth)?,
        withdrawal_order: cli.withdrawal_order.into(),
        strategies,
        solver: SolverSettings {
            tolerance: cli.solver_tolerance,
            max_iterations: cli.solver_max_iterations,
        },
    };

    validate_config(&config).map_err(|e| e.to_string())?;
    Ok(config)
}

/// Parses the process arguments, runs the comparison and returns the JSON report.
pub fn run_cli() -> Result<String, String> {
    let config = build_inputs(Cli::parse())?;
    let result = run_comparison(&config).map_err(|e| e.to_string())?;
    serde_json::to_string_pretty(&build_simulate_response(&result, true))
        .map_err(|e| format!("failed to serialize report: {e}"))
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route(
            "/api/simulate",
            get(simulate_get_handler).post(simulate_post_handler),
        )
        .route("/api/tax", get(tax_handler))
        .route("/health", get(health_handler))
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "roth-compare HTTP API listening");
    info!("local access: http://127.0.0.1:{port}/api/simulate");

    axum::serve(listener, app).await
}

async fn health_handler() -> Response {
    json_response(StatusCode::OK, serde_json::json!({ "status": "ok" }))
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn tax_handler(Query(query): Query<TaxQuery>) -> Response {
    match tax_response(&query) {
        Ok(body) => json_response(StatusCode::OK, body),
        Err(err) => simulation_error_response(&err),
    }
}

fn tax_response(query: &TaxQuery) -> Result<TaxResponse, SimulationError> {
    let deduction = query.standard_deduction.unwrap_or(0.0).max(0.0);
    if !query.income.is_finite() || query.income < 0.0 {
        return Err(SimulationError::InvalidInput(format!(
            "income must be a non-negative amount, got {}",
            query.income
        )));
    }
    let taxable_income = (query.income - deduction).max(0.0);
    let schedule = BracketSchedule::us_federal_single_2024();
    let outcome = compute_tax(taxable_income, &schedule)?;
    Ok(TaxResponse {
        income: query.income,
        taxable_income,
        tax_owed: outcome.tax_owed,
        effective_rate: outcome.effective_rate,
        marginal_rate: outcome.marginal_rate,
    })
}

async fn simulate_get_handler(Query(payload): Query<SimulatePayload>) -> Response {
    simulate_handler_impl(payload).await
}

async fn simulate_post_handler(Json(payload): Json<SimulatePayload>) -> Response {
    simulate_handler_impl(payload).await
}

async fn simulate_handler_impl(payload: SimulatePayload) -> Response {
    let request = match api_request_from_payload(payload) {
        Ok(request) => request,
        Err(msg) => {
            warn!(error = %msg, "rejected simulate request");
            return error_response(StatusCode::BAD_REQUEST, &msg);
        }
    };

    match run_comparison(&request.config) {
        Ok(result) => json_response(
            StatusCode::OK,
            build_simulate_response(&result, request.options.include_ledger),
        ),
        Err(err) => simulation_error_response(&err),
    }
}

fn simulation_error_response(err: &SimulationError) -> Response {
    let status = match err {
        SimulationError::InvalidInput(_) | SimulationError::Configuration(_) => {
            StatusCode::BAD_REQUEST
        }
        SimulationError::Convergence { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    warn!(error = %err, status = status.as_u16(), "simulation failed");
    error_response(status, &err.to_string())
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
fn api_request_from_json(json: &str) -> Result<ApiRequest, String> {
    let payload = serde_json::from_str::<SimulatePayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    api_request_from_payload(payload)
}

fn api_request_from_payload(payload: SimulatePayload) -> Result<ApiRequest, String> {
    let mut cli = default_cli_for_api();
    let options = ApiOptions {
        include_ledger: payload.include_ledger.unwrap_or(true),
    };

    if let Some(v) = payload.annual_income {
        cli.annual_income = v;
    }
    if let Some(v) = payload.annual_raise {
        cli.annual_raise = v;
    }
    if let Some(v) = payload.current_age {
        cli.current_age = v;
    }
    if let Some(v) = payload.retirement_age {
        cli.retirement_age = v;
    }
    if let Some(v) = payload.terminal_age {
        cli.terminal_age = v;
    }
    if let Some(v) = payload.start_year {
        cli.start_year = v;
    }

    if let Some(v) = payload.contribution_mode {
        cli.contribution_mode = v.into();
    }
    if let Some(v) = payload.contribution_rate {
        cli.contribution_rate = v;
    }
    if let Some(v) = payload.contribution_amount {
        cli.contribution_amount = v;
    }
    if let Some(v) = payload.employer_match {
        cli.employer_match = v;
    }
    if let Some(v) = payload.employer_match_cap {
        cli.employer_match_cap = v;
    }
    if payload.roth_catch_up_wage_threshold.is_some() {
        cli.roth_catch_up_wage_threshold = payload.roth_catch_up_wage_threshold;
    }
    if let Some(v) = payload.pretax_start {
        cli.pretax_start = v;
    }
    if let Some(v) = payload.roth_start {
        cli.roth_start = v;
    }

    if let Some(v) = payload.accumulation_return {
        cli.accumulation_return = v;
    }
    if let Some(v) = payload.retirement_return {
        cli.retirement_return = v;
    }
    if let Some(v) = payload.limit_inflation {
        cli.limit_inflation = v;
    }
    if payload.standard_deduction.is_some() {
        cli.standard_deduction = payload.standard_deduction;
    }

    if let Some(v) = payload.capital_gains_rate {
        cli.capital_gains_rate = v;
    }
    if let Some(v) = payload.realized_gains {
        cli.realized_gains = v;
    }
    if let Some(v) = payload.side_tax_mode {
        cli.side_tax_mode = v.into();
    }
    if let Some(v) = payload.invest_tax_savings {
        cli.invest_tax_savings = v;
    }
    if let Some(v) = payload.roth_split {
        cli.roth_split = v;
    }

    if payload.retirement_net_income.is_some() {
        cli.retirement_net_income = payload.retirement_net_income;
    }
    if let Some(v) = payload.terminal_balance {
        cli.terminal_balance = v;
    }
    if let Some(v) = payload.spending_growth {
        cli.spending_growth = v;
    }
    if let Some(v) = payload.withdrawal_order {
        cli.withdrawal_order = v.into();
    }
    if let Some(raw) = payload.strategies.as_deref() {
        cli.strategies = parse_strategies(raw)?;
    }

    if let Some(v) = payload.solver_tolerance {
        cli.solver_tolerance = v;
    }
    if let Some(v) = payload.solver_max_iterations {
        cli.solver_max_iterations = v;
    }

    let config = build_inputs(cli)?;
    Ok(ApiRequest { config, options })
}

fn parse_strategies(raw: &str) -> Result<Vec<CliStrategy>, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            CliStrategy::from_str(s, true).map_err(|_| {
                format!("strategies: unknown strategy '{s}' (expected traditional, roth or split)")
            })
        })
        .collect()
}

fn default_cli_for_api() -> Cli {
    Cli {
        annual_income: 550_000.0,
        annual_raise: 0.0,
        current_age: 35,
        retirement_age: 65,
        terminal_age: 95,
        start_year: 2024,
        contribution_mode: CliContributionMode::Max,
        contribution_rate: 10.0,
        contribution_amount: 23_000.0,
        employer_match: 0.0,
        employer_match_cap: 0.0,
        roth_catch_up_wage_threshold: None,
        pretax_start: 0.0,
        roth_start: 0.0,
        accumulation_return: 7.0,
        retirement_return: 5.0,
        limit_inflation: 2.5,
        standard_deduction: None,
        capital_gains_rate: 15.0,
        realized_gains: 100.0,
        side_tax_mode: CliSideTaxMode::Flat,
        invest_tax_savings: 100.0,
        roth_split: 50.0,
        retirement_net_income: None,
        terminal_balance: 0.0,
        spending_growth: 0.0,
        withdrawal_order: CliWithdrawalOrder::ProRata,
        strategies: vec![CliStrategy::Traditional, CliStrategy::Roth],
        tables: None,
        solver_tolerance: 0.01,
        solver_max_iterations: 1_000,
    }
}

fn build_simulate_response(result: &ComparisonResult, include_ledger: bool) -> SimulateResponse {
    SimulateResponse {
        strategies: result.runs.iter().map(|run| run.summary()).collect(),
        advantage: result.advantage(),
        ledger: if include_ledger {
            result.ledger().copied().collect()
        } else {
            Vec::new()
        },
    }
}
