use super::tax::{BracketSchedule, incremental_ordinary_tax, ordinary_income_tax};
use super::types::{Balances, SideAccountTax, SideTaxMode, WithdrawalOrder};

/// Amount taken from each account for one year's gross withdrawal.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct WithdrawalSplit {
    pub pretax: f64,
    pub roth: f64,
    pub taxable: f64,
}

impl WithdrawalSplit {
    pub fn total(&self) -> f64 {
        self.pretax + self.roth + self.taxable
    }
}

/// Tax on one year's withdrawal split.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct WithdrawalTax {
    pub ordinary: f64,
    pub capital_gains: f64,
    pub marginal_rate: f64,
}

impl WithdrawalTax {
    pub fn total(&self) -> f64 {
        self.ordinary + self.capital_gains
    }
}

/// Tax rules that apply to drawdown and side-account growth.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TaxContext<'a> {
    pub schedule: &'a BracketSchedule,
    pub standard_deduction: f64,
    pub side: SideAccountTax,
}

impl TaxContext<'_> {
    pub fn withdrawal_tax(&self, split: &WithdrawalSplit, start: &Balances) -> WithdrawalTax {
        let ordinary =
            ordinary_income_tax(split.pretax, self.standard_deduction, self.schedule);
        let gains = split.taxable * unrealized_gain_share(start);
        WithdrawalTax {
            ordinary: ordinary.tax_owed,
            capital_gains: gains * self.side.capital_gains_rate,
            marginal_rate: ordinary.marginal_rate,
        }
    }

    /// Grows the side account by `rate` and pays tax on the realized share of
    /// the growth out of the account. `ordinary_income` is the year's other
    /// ordinary income, used when realized gains are taxed through the brackets.
    pub fn grow_side_account(
        &self,
        balances: &mut Balances,
        rate: f64,
        ordinary_income: f64,
    ) -> f64 {
        let growth = balances.taxable * rate;
        balances.taxable += growth;
        if growth <= 0.0 {
            balances.taxable_basis = balances.taxable_basis.min(balances.taxable);
            return 0.0;
        }

        let realized = growth * self.side.realized_fraction;
        let tax = match self.side.mode {
            SideTaxMode::Flat => realized * self.side.capital_gains_rate,
            SideTaxMode::Ordinary => incremental_ordinary_tax(
                ordinary_income,
                realized,
                self.standard_deduction,
                self.schedule,
            ),
        }
        .min(balances.taxable);

        balances.taxable -= tax;
        balances.taxable_basis = (balances.taxable_basis + realized - tax)
            .max(0.0)
            .min(balances.taxable);
        tax
    }
}

fn unrealized_gain_share(balances: &Balances) -> f64 {
    if balances.taxable <= 0.0 {
        return 0.0;
    }
    ((balances.taxable - balances.taxable_basis) / balances.taxable).clamp(0.0, 1.0)
}

/// Splits a gross withdrawal across the accounts held in `balances`.
///
/// Amounts beyond the combined balance are dropped.
pub(crate) fn split_withdrawal(
    gross: f64,
    balances: &Balances,
    order: WithdrawalOrder,
) -> WithdrawalSplit {
    let available = balances.total();
    let gross = gross.clamp(0.0, available.max(0.0));
    if gross <= 0.0 {
        return WithdrawalSplit::default();
    }

    let priority = match order {
        WithdrawalOrder::ProRata => {
            let share = gross / available;
            return WithdrawalSplit {
                pretax: balances.pretax * share,
                roth: balances.roth * share,
                taxable: balances.taxable * share,
            };
        }
        WithdrawalOrder::TaxableFirst => [Bucket::Taxable, Bucket::PreTax, Bucket::Roth],
        WithdrawalOrder::PreTaxFirst => [Bucket::PreTax, Bucket::Taxable, Bucket::Roth],
        WithdrawalOrder::RothFirst => [Bucket::Roth, Bucket::Taxable, Bucket::PreTax],
    };

    let mut split = WithdrawalSplit::default();
    let mut remaining = gross;
    for bucket in priority {
        let (held, slot) = match bucket {
            Bucket::PreTax => (balances.pretax, &mut split.pretax),
            Bucket::Roth => (balances.roth, &mut split.roth),
            Bucket::Taxable => (balances.taxable, &mut split.taxable),
        };
        let take = remaining.min(held.max(0.0));
        *slot = take;
        remaining -= take;
    }
    split
}

#[derive(Copy, Clone)]
enum Bucket {
    PreTax,
    Roth,
    Taxable,
}

/// Removes `split` from `balances`, reducing the cost basis in proportion.
pub(crate) fn apply_withdrawal(balances: &mut Balances, split: &WithdrawalSplit) {
    if balances.taxable > 0.0 {
        let kept = ((balances.taxable - split.taxable) / balances.taxable).clamp(0.0, 1.0);
        balances.taxable_basis *= kept;
    }
    balances.pretax = (balances.pretax - split.pretax).max(0.0);
    balances.roth = (balances.roth - split.roth).max(0.0);
    balances.taxable = (balances.taxable - split.taxable).max(0.0);
}
