use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::core::{
    BracketSchedule, ContributionLimitTable, DEFAULT_CATCH_UP_AGE, EnhancedCatchUp, LimitEntry,
};

/// Tax tables loaded from a TOML file.
///
/// ```toml
/// standard_deduction = 14600.0
///
/// [[brackets]]
/// upper = 11600.0
/// rate = 0.10
///
/// [[brackets]]
/// rate = 0.37
///
/// [[limits]]
/// year = 2025
/// base = 23500.0
/// catch_up = 7500.0
/// enhanced_catch_up = 11250.0
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct TablesFile {
    pub standard_deduction: Option<f64>,
    pub brackets: Vec<BracketRow>,
    pub limits: Vec<LimitRow>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct BracketRow {
    /// Missing on the top bracket.
    pub upper: Option<f64>,
    pub rate: f64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct LimitRow {
    pub year: i32,
    pub base: f64,
    #[serde(default)]
    pub catch_up: f64,
    pub catch_up_age: Option<u32>,
    pub enhanced_catch_up: Option<f64>,
    pub enhanced_min_age: Option<u32>,
    pub enhanced_max_age: Option<u32>,
}

impl TablesFile {
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let raw = fs::read_to_string(path)
            .map_err(|e| format!("--tables: cannot read {}: {e}", path.display()))?;
        Self::from_toml_str(&raw).map_err(|e| format!("--tables {}: {e}", path.display()))
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, String> {
        toml::from_str(raw).map_err(|e| format!("invalid tables file: {e}"))
    }

    /// `None` when the file leaves the brackets to the built-in schedule.
    pub fn bracket_schedule(&self) -> Result<Option<BracketSchedule>, String> {
        if self.brackets.is_empty() {
            return Ok(None);
        }
        let pairs: Vec<(f64, f64)> = self
            .brackets
            .iter()
            .map(|row| (row.upper.unwrap_or(f64::INFINITY), row.rate))
            .collect();
        BracketSchedule::new(&pairs)
            .map(Some)
            .map_err(|e| e.to_string())
    }

    /// `None` when the file leaves the limits to the standard projection.
    pub fn limit_table(&self) -> Result<Option<ContributionLimitTable>, String> {
        if self.limits.is_empty() {
            return Ok(None);
        }
        let mut table = ContributionLimitTable::new();
        for row in &self.limits {
            let enhanced_catch_up = row.enhanced_catch_up.map(|limit| EnhancedCatchUp {
                limit,
                min_age: row.enhanced_min_age.unwrap_or(60),
                max_age: row.enhanced_max_age.unwrap_or(63),
            });
            table
                .insert(
                    row.year,
                    LimitEntry {
                        base_limit: row.base,
                        catch_up_limit: row.catch_up,
                        catch_up_age: row.catch_up_age.unwrap_or(DEFAULT_CATCH_UP_AGE),
                        enhanced_catch_up,
                    },
                )
                .map_err(|e| e.to_string())?;
        }
        Ok(Some(table))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{compute_tax, resolve_limit};

    const SAMPLE: &str = r#"
standard_deduction = 15000.0

[[brackets]]
upper = 10000.0
rate = 0.10

[[brackets]]
upper = 50000.0
rate = 0.20

[[brackets]]
rate = 0.30

[[limits]]
year = 2030
base = 30000.0
catch_up = 10000.0

[[limits]]
year = 2031
base = 31000.0
catch_up = 10000.0
catch_up_age = 55
enhanced_catch_up = 15000.0
"#;

    #[test]
    fn parses_brackets_with_unbounded_top() {
        let tables = TablesFile::from_toml_str(SAMPLE).expect("valid toml");
        assert_eq!(tables.standard_deduction, Some(15_000.0));

        let schedule = tables
            .bracket_schedule()
            .expect("valid schedule")
            .expect("brackets present");
        assert_eq!(schedule.brackets().len(), 3);
        assert_eq!(schedule.top_rate(), 0.30);
        // 1_000 + 8_000 + 15_000
        let tax = compute_tax(100_000.0, &schedule).expect("valid income");
        assert!((tax.tax_owed - 24_000.0).abs() < 1e-9);
    }

    #[test]
    fn parses_limit_rows() {
        let tables = TablesFile::from_toml_str(SAMPLE).expect("valid toml");
        let table = tables.limit_table().expect("valid").expect("limits present");

        assert_eq!(resolve_limit(50, 2030, &table).expect("2030"), 40_000.0);
        assert_eq!(resolve_limit(54, 2031, &table).expect("2031"), 31_000.0);
        assert_eq!(resolve_limit(61, 2031, &table).expect("2031"), 46_000.0);
        assert!(resolve_limit(40, 2032, &table).is_err());
    }

    #[test]
    fn empty_file_defers_to_defaults() {
        let tables = TablesFile::from_toml_str("").expect("valid toml");
        assert!(tables.bracket_schedule().expect("ok").is_none());
        assert!(tables.limit_table().expect("ok").is_none());
        assert!(tables.standard_deduction.is_none());
    }

    #[test]
    fn rejects_schedules_without_open_top_bracket() {
        let raw = r#"
[[brackets]]
upper = 10000.0
rate = 0.10
"#;
        let tables = TablesFile::from_toml_str(raw).expect("valid toml");
        let err = tables.bracket_schedule().expect_err("bounded top bracket");
        assert!(err.contains("unbounded"));
    }

    #[test]
    fn rejects_unknown_keys() {
        let err = TablesFile::from_toml_str("deduction = 1.0").expect_err("unknown key");
        assert!(err.contains("invalid tables file"));
    }
}
