//! Professional Tax rules.
//!
//! The `tax` module defines the [`ProfessionalTaxRule`] abstraction the
//! salary engine calls for the Professional Tax deduction, and a
//! slab-table implementation that can be loaded from versioned JSON
//! files, one per state.

use crate::models::Gender;
use anyhow::Result;
use chrono::Month;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Works out the monthly Professional Tax for a gross salary.
///
/// Rules must be thread-safe (`Send + Sync`) because payroll runs
/// evaluate them concurrently across employees.
pub trait ProfessionalTaxRule: Send + Sync {
    /// Returns the state code the rule belongs to (e.g. `"MH"`).
    fn region_code(&self) -> &str;
    /// Returns the tax for `gross` in `month`.  Without a gender the
    /// slab cannot be determined and the result is zero.
    fn calculate(&self, gross: Decimal, gender: Option<Gender>, month: Month) -> Decimal;
}

/// One row of a slab table.  `up_to` is inclusive; the last slab of a
/// table leaves it empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slab {
    #[serde(default)]
    pub up_to: Option<Decimal>,
    pub amount: Decimal,
}

/// Professional Tax slabs for a state at a specific version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfessionalTaxTable {
    /// A state code such as `"MH"` or `"KA"`.
    pub region: String,
    /// Version string, e.g. `"2024"`.
    pub version: String,
    /// Charged in February instead of the slab amount whenever the
    /// salary is not exempt.
    pub february_amount: Decimal,
    pub male: Vec<Slab>,
    pub female: Vec<Slab>,
}

impl ProfessionalTaxTable {
    /// The Maharashtra schedule, used when no table files are found.
    pub fn maharashtra() -> Self {
        Self {
            region: "MH".to_string(),
            version: "2024".to_string(),
            february_amount: dec!(300),
            male: vec![
                Slab { up_to: Some(dec!(7500)), amount: Decimal::ZERO },
                Slab { up_to: Some(dec!(10000)), amount: dec!(175) },
                Slab { up_to: None, amount: dec!(200) },
            ],
            female: vec![
                Slab { up_to: Some(dec!(25000)), amount: Decimal::ZERO },
                Slab { up_to: None, amount: dec!(200) },
            ],
        }
    }

    fn slabs_for(&self, gender: Gender) -> &[Slab] {
        match gender {
            Gender::Female => &self.female,
            Gender::Male | Gender::Other => &self.male,
        }
    }

    /// Slab amount for `gross`, ignoring the February rule.
    pub fn slab_amount(&self, gross: Decimal, gender: Gender) -> Decimal {
        self.slabs_for(gender)
            .iter()
            .find(|slab| slab.up_to.map_or(true, |limit| gross <= limit))
            .map(|slab| slab.amount)
            .unwrap_or(Decimal::ZERO)
    }
}

impl ProfessionalTaxRule for ProfessionalTaxTable {
    fn region_code(&self) -> &str {
        &self.region
    }

    fn calculate(&self, gross: Decimal, gender: Option<Gender>, month: Month) -> Decimal {
        let Some(gender) = gender else {
            return Decimal::ZERO;
        };
        let amount = self.slab_amount(gross, gender);
        if amount.is_zero() {
            Decimal::ZERO
        } else if month == Month::February {
            self.february_amount
        } else {
            amount
        }
    }
}

/// Load all Professional Tax tables from a directory.
///
/// Every `.json` file is parsed as a [`ProfessionalTaxTable`]; files
/// that fail to parse are logged and skipped.  A missing directory
/// yields an empty list.
pub fn load_tables_from_dir(path: &std::path::Path) -> Result<Vec<ProfessionalTaxTable>> {
    let mut tables = Vec::new();
    if path.is_dir() {
        for entry in std::fs::read_dir(path)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if entry.path().extension().map_or(true, |ext| ext != "json") {
                continue;
            }
            let data = std::fs::read_to_string(entry.path())?;
            match serde_json::from_str::<ProfessionalTaxTable>(&data) {
                Ok(table) => {
                    debug!(region = %table.region, version = %table.version, "loaded professional tax table");
                    tables.push(table);
                }
                Err(err) => warn!(path = ?entry.path(), %err, "failed to parse professional tax table"),
            }
        }
    }
    Ok(tables)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn male_slabs() {
        let table = ProfessionalTaxTable::maharashtra();
        let male = Some(Gender::Male);
        assert_eq!(table.calculate(dec!(7500), male, Month::March), Decimal::ZERO);
        assert_eq!(table.calculate(dec!(9000), male, Month::March), dec!(175));
        assert_eq!(table.calculate(dec!(36000), male, Month::March), dec!(200));
    }

    #[test]
    fn female_exemption_threshold() {
        let table = ProfessionalTaxTable::maharashtra();
        let female = Some(Gender::Female);
        assert_eq!(table.calculate(dec!(25000), female, Month::June), Decimal::ZERO);
        assert_eq!(table.calculate(dec!(25001), female, Month::June), dec!(200));
    }

    #[test]
    fn february_charges_fixed_amount_unless_exempt() {
        let table = ProfessionalTaxTable::maharashtra();
        let male = Some(Gender::Male);
        assert_eq!(table.calculate(dec!(9000), male, Month::February), dec!(300));
        assert_eq!(table.calculate(dec!(90000), male, Month::February), dec!(300));
        assert_eq!(table.calculate(dec!(5000), male, Month::February), Decimal::ZERO);
    }

    #[test]
    fn missing_gender_yields_zero() {
        let table = ProfessionalTaxTable::maharashtra();
        assert_eq!(table.calculate(dec!(50000), None, Month::March), Decimal::ZERO);
    }

    #[test]
    fn other_gender_uses_male_slabs() {
        let table = ProfessionalTaxTable::maharashtra();
        assert_eq!(table.calculate(dec!(12000), Some(Gender::Other), Month::May), dec!(200));
    }

    #[test]
    fn table_parses_from_json() {
        let table: ProfessionalTaxTable = serde_json::from_str(
            r#"{
                "region": "KA",
                "version": "2023",
                "february_amount": "200",
                "male": [{"up_to": "24999", "amount": "0"}, {"amount": "200"}],
                "female": [{"up_to": "24999", "amount": "0"}, {"amount": "200"}]
            }"#,
        )
        .unwrap();
        assert_eq!(table.region_code(), "KA");
        assert_eq!(table.calculate(dec!(30000), Some(Gender::Female), Month::February), dec!(200));
    }

    #[test]
    fn bundled_tables_match_builtin() {
        let dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("pt_tables");
        let tables = load_tables_from_dir(&dir).unwrap();
        let mh = tables.iter().find(|t| t.region == "MH").unwrap();
        assert_eq!(mh, &ProfessionalTaxTable::maharashtra());
    }

    #[test]
    fn missing_directory_loads_nothing() {
        let tables = load_tables_from_dir(std::path::Path::new("does/not/exist")).unwrap();
        assert!(tables.is_empty());
    }
}
