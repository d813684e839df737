//! Progressive bracket tax.
//!
//! A [`BracketSchedule`] is a run of `(upper_bound_inclusive, marginal_rate)`
//! segments covering `[0, inf)`. Only the slice of income inside a segment is
//! taxed at that segment's rate.

use super::error::SimulationError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bracket {
    pub upper: f64,
    pub rate: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BracketSchedule {
    brackets: Vec<Bracket>,
}

/// Tax owed on an amount together with the rates it implies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaxOutcome {
    pub tax_owed: f64,
    pub effective_rate: f64,
    pub marginal_rate: f64,
}

impl TaxOutcome {
    const ZERO: TaxOutcome = TaxOutcome {
        tax_owed: 0.0,
        effective_rate: 0.0,
        marginal_rate: 0.0,
    };
}

/// 2024 US federal standard deduction, single filer.
pub const STANDARD_DEDUCTION_2024: f64 = 14_600.0;

impl BracketSchedule {
    /// Builds a schedule from `(upper_bound, rate)` pairs.
    ///
    /// Bounds must be strictly increasing and positive with the final bound
    /// infinite; rates must be non-decreasing and within `[0, 1)`.
    pub fn new(pairs: &[(f64, f64)]) -> Result<Self, SimulationError> {
        let Some(last) = pairs.last() else {
            return Err(SimulationError::config(
                "bracket schedule must contain at least one bracket",
            ));
        };
        if last.0 != f64::INFINITY {
            return Err(SimulationError::config(
                "final bracket bound must be unbounded (infinity)",
            ));
        }

        let mut prev_upper = 0.0;
        let mut prev_rate = 0.0;
        for (idx, &(upper, rate)) in pairs.iter().enumerate() {
            if upper.is_nan() || upper <= prev_upper {
                return Err(SimulationError::config(format!(
                    "bracket {idx}: bound {upper} must be greater than {prev_upper}"
                )));
            }
            if idx + 1 < pairs.len() && !upper.is_finite() {
                return Err(SimulationError::config(format!(
                    "bracket {idx}: only the final bracket may be unbounded"
                )));
            }
            if !(0.0..1.0).contains(&rate) {
                return Err(SimulationError::config(format!(
                    "bracket {idx}: rate {rate} must be within [0, 1)"
                )));
            }
            if rate < prev_rate {
                return Err(SimulationError::config(format!(
                    "bracket {idx}: rate {rate} is lower than the previous rate {prev_rate}"
                )));
            }
            prev_upper = upper;
            prev_rate = rate;
        }

        Ok(Self {
            brackets: pairs
                .iter()
                .map(|&(upper, rate)| Bracket { upper, rate })
                .collect(),
        })
    }

    /// 2024 US federal brackets for a single filer.
    pub fn us_federal_single_2024() -> Self {
        Self {
            brackets: vec![
                Bracket { upper: 11_600.0, rate: 0.10 },
                Bracket { upper: 47_150.0, rate: 0.12 },
                Bracket { upper: 100_525.0, rate: 0.22 },
                Bracket { upper: 191_950.0, rate: 0.24 },
                Bracket { upper: 243_725.0, rate: 0.32 },
                Bracket { upper: 609_350.0, rate: 0.35 },
                Bracket { upper: f64::INFINITY, rate: 0.37 },
            ],
        }
    }

    pub fn brackets(&self) -> &[Bracket] {
        &self.brackets
    }

    pub fn top_rate(&self) -> f64 {
        self.brackets.last().map(|b| b.rate).unwrap_or(0.0)
    }
}

/// Tax owed on `taxable_income` under `schedule`.
pub fn compute_tax(
    taxable_income: f64,
    schedule: &BracketSchedule,
) -> Result<TaxOutcome, SimulationError> {
    if !taxable_income.is_finite() || taxable_income < 0.0 {
        return Err(SimulationError::invalid(format!(
            "taxable income must be a non-negative amount, got {taxable_income}"
        )));
    }
    Ok(bracket_tax(taxable_income, schedule))
}

pub(crate) fn bracket_tax(taxable_income: f64, schedule: &BracketSchedule) -> TaxOutcome {
    let income = taxable_income.max(0.0);
    let mut lower = 0.0;
    let mut tax = 0.0;
    let mut marginal = schedule.brackets.first().map(|b| b.rate).unwrap_or(0.0);

    for bracket in &schedule.brackets {
        if income <= lower {
            break;
        }
        let slice = income.min(bracket.upper) - lower;
        tax += slice * bracket.rate;
        marginal = bracket.rate;
        if income <= bracket.upper {
            break;
        }
        lower = bracket.upper;
    }

    TaxOutcome {
        tax_owed: tax,
        effective_rate: if income > 0.0 { tax / income } else { 0.0 },
        marginal_rate: marginal,
    }
}

/// Tax on gross ordinary income after the standard deduction.
///
/// Rates are expressed against the gross amount; the marginal rate is zero
/// while income stays inside the deduction.
pub(crate) fn ordinary_income_tax(
    gross_income: f64,
    standard_deduction: f64,
    schedule: &BracketSchedule,
) -> TaxOutcome {
    let gross = gross_income.max(0.0);
    let taxable = gross - standard_deduction.max(0.0);
    if taxable <= 0.0 {
        return TaxOutcome::ZERO;
    }

    let outcome = bracket_tax(taxable, schedule);
    TaxOutcome {
        tax_owed: outcome.tax_owed,
        effective_rate: outcome.tax_owed / gross,
        marginal_rate: outcome.marginal_rate,
    }
}

/// Extra ordinary tax caused by stacking `extra` on top of `base` income.
pub(crate) fn incremental_ordinary_tax(
    base_income: f64,
    extra: f64,
    standard_deduction: f64,
    schedule: &BracketSchedule,
) -> f64 {
    if extra <= 0.0 {
        return 0.0;
    }
    let before = ordinary_income_tax(base_income, standard_deduction, schedule).tax_owed;
    let after = ordinary_income_tax(base_income + extra, standard_deduction, schedule).tax_owed;
    (after - before).max(0.0)
}
