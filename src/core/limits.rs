use std::collections::BTreeMap;

use super::error::SimulationError;

pub const DEFAULT_CATCH_UP_AGE: u32 = 50;

/// Ages 60 through 63 get a larger catch-up from 2025 onwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnhancedCatchUp {
    pub limit: f64,
    pub min_age: u32,
    pub max_age: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LimitEntry {
    pub base_limit: f64,
    pub catch_up_limit: f64,
    pub catch_up_age: u32,
    pub enhanced_catch_up: Option<EnhancedCatchUp>,
}

/// Contribution ceiling for one participant in one year.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedLimit {
    pub base: f64,
    pub catch_up: f64,
}

impl ResolvedLimit {
    pub fn total(self) -> f64 {
        self.base + self.catch_up
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContributionLimitTable {
    entries: BTreeMap<i32, LimitEntry>,
}

impl ContributionLimitTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, year: i32, entry: LimitEntry) -> Result<(), SimulationError> {
        for (name, value) in [
            ("base limit", entry.base_limit),
            ("catch-up limit", entry.catch_up_limit),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(SimulationError::config(format!(
                    "{year}: {name} must be a non-negative amount, got {value}"
                )));
            }
        }
        if let Some(enhanced) = entry.enhanced_catch_up {
            if !enhanced.limit.is_finite() || enhanced.limit < 0.0 {
                return Err(SimulationError::config(format!(
                    "{year}: enhanced catch-up limit must be a non-negative amount"
                )));
            }
            if enhanced.min_age > enhanced.max_age {
                return Err(SimulationError::config(format!(
                    "{year}: enhanced catch-up age window is empty"
                )));
            }
        }
        self.entries.insert(year, entry);
        Ok(())
    }

    pub fn get(&self, year: i32) -> Option<&LimitEntry> {
        self.entries.get(&year)
    }

    pub fn years(&self) -> impl Iterator<Item = i32> + '_ {
        self.entries.keys().copied()
    }

    /// Standard IRS 401k limits for `first_year..=last_year`.
    ///
    /// 2024 through 2026 use the published figures. Later years index the 2026
    /// figures by `inflation` and round to the nearest $500 (the enhanced
    /// catch-up to the nearest $250); earlier years deflate the 2024 figures.
    pub fn projected(
        first_year: i32,
        last_year: i32,
        inflation: f64,
    ) -> Result<Self, SimulationError> {
        if last_year < first_year {
            return Err(SimulationError::config(format!(
                "limit table range {first_year}..={last_year} is empty"
            )));
        }
        if !inflation.is_finite() || inflation <= -1.0 {
            return Err(SimulationError::config(format!(
                "limit inflation must be > -100%, got {inflation}"
            )));
        }

        let mut table = Self::new();
        for year in first_year..=last_year {
            table.insert(year, projected_entry(year, inflation))?;
        }
        Ok(table)
    }
}

fn projected_entry(year: i32, inflation: f64) -> LimitEntry {
    let enhanced = |limit: f64| {
        Some(EnhancedCatchUp {
            limit,
            min_age: 60,
            max_age: 63,
        })
    };
    let entry = |base_limit, catch_up_limit, enhanced_catch_up| LimitEntry {
        base_limit,
        catch_up_limit,
        catch_up_age: DEFAULT_CATCH_UP_AGE,
        enhanced_catch_up,
    };

    match year {
        2024 => entry(23_000.0, 7_500.0, None),
        2025 => entry(23_500.0, 7_500.0, enhanced(11_250.0)),
        2026 => entry(24_500.0, 8_000.0, enhanced(11_250.0)),
        y if y > 2026 => {
            let factor = (1.0 + inflation).powi(y - 2026);
            entry(
                round_to(24_500.0 * factor, 500.0),
                round_to(8_000.0 * factor, 500.0),
                enhanced(round_to(11_250.0 * factor, 250.0)),
            )
        }
        y => {
            let factor = (1.0 + inflation).powi(y - 2024);
            entry(
                round_to(23_000.0 * factor, 500.0),
                round_to(7_500.0 * factor, 500.0),
                None,
            )
        }
    }
}

fn round_to(value: f64, step: f64) -> f64 {
    (value / step).round() * step
}

/// Full contribution ceiling for `age` in `year`.
pub fn resolve_limit(
    age: u32,
    year: i32,
    table: &ContributionLimitTable,
) -> Result<f64, SimulationError> {
    resolve_limit_parts(age, year, table).map(ResolvedLimit::total)
}

pub fn resolve_limit_parts(
    age: u32,
    year: i32,
    table: &ContributionLimitTable,
) -> Result<ResolvedLimit, SimulationError> {
    let entry = table.get(year).ok_or_else(|| {
        SimulationError::config(format!("contribution limit table has no entry for {year}"))
    })?;

    let catch_up = match entry.enhanced_catch_up {
        Some(enhanced) if (enhanced.min_age..=enhanced.max_age).contains(&age) => enhanced.limit,
        _ if age >= entry.catch_up_age => entry.catch_up_limit,
        _ => 0.0,
    };

    Ok(ResolvedLimit {
        base: entry.base_limit,
        catch_up,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::{prop_assert, prop_assert_eq, proptest};

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    fn plain_table() -> ContributionLimitTable {
        let mut table = ContributionLimitTable::new();
        for (year, base) in [(2030, 30_000.0), (2031, 31_000.0), (2032, 32_000.0)] {
            table
                .insert(
                    year,
                    LimitEntry {
                        base_limit: base,
                        catch_up_limit: 10_000.0,
                        catch_up_age: 50,
                        enhanced_catch_up: None,
                    },
                )
                .expect("valid entry");
        }
        table
    }

    #[test]
    fn catch_up_starts_at_threshold_age() {
        let table = plain_table();
        assert_approx(resolve_limit(49, 2030, &table).expect("present"), 30_000.0);
        assert_approx(resolve_limit(50, 2030, &table).expect("present"), 40_000.0);
        assert_approx(resolve_limit(71, 2032, &table).expect("present"), 42_000.0);
    }

    #[test]
    fn missing_year_is_a_configuration_error() {
        let err = resolve_limit(40, 2040, &plain_table()).expect_err("no extrapolation");
        assert!(matches!(err, SimulationError::Configuration(_)));
        assert!(err.to_string().contains("2040"));
    }

    #[test]
    fn projected_table_matches_published_limits() {
        let table = ContributionLimitTable::projected(2024, 2030, 0.025).expect("valid");

        assert_approx(resolve_limit(30, 2024, &table).expect("2024"), 23_000.0);
        assert_approx(resolve_limit(50, 2024, &table).expect("2024"), 30_500.0);
        assert_approx(resolve_limit(30, 2025, &table).expect("2025"), 23_500.0);
        assert_approx(resolve_limit(30, 2026, &table).expect("2026"), 24_500.0);

        let parts = resolve_limit_parts(50, 2026, &table).expect("2026");
        assert_approx(parts.catch_up, 8_000.0);
    }

    #[test]
    fn enhanced_catch_up_applies_only_between_sixty_and_sixty_three() {
        let table = ContributionLimitTable::projected(2024, 2026, 0.025).expect("valid");

        for (age, expected) in [(59, 7_500.0), (60, 11_250.0), (63, 11_250.0), (64, 7_500.0)] {
            let parts = resolve_limit_parts(age, 2025, &table).expect("2025");
            assert_approx(parts.catch_up, expected);
        }
        // Not yet in force in 2024.
        let parts = resolve_limit_parts(61, 2024, &table).expect("2024");
        assert_approx(parts.catch_up, 7_500.0);
    }

    #[test]
    fn projection_indexes_and_rounds_to_five_hundred() {
        // 24_500 * 1.04 = 25_480 -> 25_500
        let table = ContributionLimitTable::projected(2027, 2027, 0.04).expect("valid");
        let entry = table.get(2027).expect("2027");
        assert_approx(entry.base_limit, 25_500.0);
        // 8_000 * 1.04 = 8_320 -> 8_500
        assert_approx(entry.catch_up_limit, 8_500.0);
        assert_eq!(table.years().collect::<Vec<_>>(), vec![2027]);
    }

    #[test]
    fn table_rejects_bad_entries_and_ranges() {
        let mut table = ContributionLimitTable::new();
        let err = table
            .insert(
                2030,
                LimitEntry {
                    base_limit: -1.0,
                    catch_up_limit: 0.0,
                    catch_up_age: 50,
                    enhanced_catch_up: None,
                },
            )
            .expect_err("negative base");
        assert!(matches!(err, SimulationError::Configuration(_)));
        assert!(ContributionLimitTable::projected(2030, 2029, 0.02).is_err());
        assert!(ContributionLimitTable::projected(2030, 2031, -1.0).is_err());
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(128))]

        #[test]
        fn prop_catch_up_added_iff_age_reaches_threshold(
            age in 18u32..100,
            year in 2030i32..2033,
            threshold in 40u32..70
        ) {
            let mut table = plain_table();
            let mut entry = *table.get(year).expect("seeded");
            entry.catch_up_age = threshold;
            table.insert(year, entry).expect("valid");

            let limit = resolve_limit(age, year, &table).expect("present");
            if age >= threshold {
                prop_assert!((limit - (entry.base_limit + entry.catch_up_limit)).abs() < 1e-9);
            } else {
                prop_assert!((limit - entry.base_limit).abs() < 1e-9);
            }
        }

        #[test]
        fn prop_years_outside_table_always_fail(age in 18u32..100, year in 1900i32..2029) {
            let err = resolve_limit(age, year, &plain_table());
            prop_assert_eq!(
                err.map_err(|e| matches!(e, SimulationError::Configuration(_))),
                Err(true)
            );
        }
    }
}
