//! Data models for the Payslip Engine.
//!
//! The `models` module defines the serialisable salary structure an
//! administrator edits for one employee: basic and gross salary, the
//! earning and deduction components, and the inputs the statutory
//! deductions depend on.  Field names follow the camelCase JSON used
//! by the back-office UI so structures can be posted as-is.

use chrono::Month;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::str::FromStr;

/// Display name of the system-managed Professional Tax deduction.
pub const PROFESSIONAL_TAX: &str = "Professional Tax";
/// Display name of the system-managed employee PF deduction.
pub const PROVIDENT_FUND_EMPLOYEE: &str = "Provident Fund (Employee)";
/// Day counts used for the per-day salary projection.
pub const PROJECTION_DAYS: [u32; 4] = [22, 24, 26, 30];
/// Largest amount the engine accepts.  Higher inputs saturate here so
/// that percentages, day multipliers and batch totals stay well inside
/// `Decimal` range.
pub const MAX_AMOUNT: Decimal = dec!(1_000_000_000_000);

/// Whether `basic_salary` is a monthly figure or a single day's rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SalaryType {
    Monthly,
    #[serde(alias = "perDay", alias = "per_day")]
    Perday,
}

/// Selects the Professional Tax slabs.  `Other` is taxed on the male
/// slabs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    #[serde(alias = "male")]
    Male,
    #[serde(alias = "female")]
    Female,
    #[serde(alias = "other")]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalculationType {
    /// Percentage of basic salary.
    Percentage,
    /// Flat amount regardless of basic salary.
    Fixed,
}

/// What a component is, as opposed to what it is called.
///
/// The two statutory kinds are computed by the engine and never use
/// the component's own calculation settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ComponentKind {
    #[default]
    Generic,
    ProfessionalTax,
    ProvidentFund,
}

impl ComponentKind {
    /// Maps a reserved display name onto its kind.
    pub fn for_name(name: &str) -> Self {
        match name.trim() {
            PROFESSIONAL_TAX => ComponentKind::ProfessionalTax,
            PROVIDENT_FUND_EMPLOYEE => ComponentKind::ProvidentFund,
            _ => ComponentKind::Generic,
        }
    }

    pub fn is_system_managed(self) -> bool {
        self != ComponentKind::Generic
    }
}

/// An earning or deduction line item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    /// Free-text label shown on the payslip.
    pub name: String,
    /// Disabled components stay in the list but count for nothing.
    pub enabled: bool,
    /// Whether the UI offers the component for editing.  Always false
    /// for system-managed deductions.
    pub editable: bool,
    /// Derived from the name when absent; see
    /// [`PayslipStructure::normalize`].
    #[serde(default)]
    pub kind: ComponentKind,
    /// Which of `percentage` and `fixed_amount` applies.
    pub calculation_type: CalculationType,
    /// Percent of basic salary, `0..=100`.
    #[serde(default, deserialize_with = "lenient_amount")]
    pub percentage: Decimal,
    /// Flat amount used when `calculation_type` is `fixed`.
    #[serde(default, deserialize_with = "lenient_amount")]
    pub fixed_amount: Decimal,
}

impl Component {
    /// A user-defined component, named by the user afterwards.
    pub fn blank() -> Self {
        Self {
            name: String::new(),
            enabled: true,
            editable: true,
            kind: ComponentKind::Generic,
            calculation_type: CalculationType::Percentage,
            percentage: Decimal::ZERO,
            fixed_amount: Decimal::ZERO,
        }
    }

    pub fn professional_tax() -> Self {
        Self {
            name: PROFESSIONAL_TAX.to_string(),
            enabled: true,
            editable: false,
            kind: ComponentKind::ProfessionalTax,
            calculation_type: CalculationType::Fixed,
            percentage: Decimal::ZERO,
            fixed_amount: Decimal::ZERO,
        }
    }

    pub fn provident_fund() -> Self {
        Self {
            name: PROVIDENT_FUND_EMPLOYEE.to_string(),
            enabled: true,
            editable: false,
            kind: ComponentKind::ProvidentFund,
            calculation_type: CalculationType::Percentage,
            percentage: dec!(12),
            fixed_amount: Decimal::ZERO,
        }
    }

    /// Amount of a generic component against the given basic salary.
    pub fn amount_on(&self, basic_salary: Decimal) -> Decimal {
        match self.calculation_type {
            CalculationType::Fixed => self.fixed_amount,
            CalculationType::Percentage => basic_salary * self.percentage / dec!(100),
        }
    }
}

/// A single-field edit to a component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "camelCase")]
pub enum ComponentUpdate {
    Name(String),
    Enabled(bool),
    CalculationType(CalculationType),
    Percentage(#[serde(deserialize_with = "lenient_amount")] Decimal),
    FixedAmount(#[serde(deserialize_with = "lenient_amount")] Decimal),
}

impl ComponentUpdate {
    /// Whether the edit touches how the amount is calculated.
    pub fn changes_calculation(&self) -> bool {
        matches!(
            self,
            ComponentUpdate::CalculationType(_)
                | ComponentUpdate::Percentage(_)
                | ComponentUpdate::FixedAmount(_)
        )
    }
}

/// One employee's compensation configuration.
///
/// Built with [`PayslipStructure::new`] or deserialised from the UI;
/// either way it is normalised when handed to the
/// [`SalaryStructureEngine`](crate::engine::SalaryStructureEngine),
/// which is the only place it is mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayslipStructure {
    pub(crate) salary_type: SalaryType,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub(crate) basic_salary: Decimal,
    #[serde(default, deserialize_with = "lenient_optional_amount")]
    pub(crate) gross_salary: Option<Decimal>,
    #[serde(default)]
    pub(crate) earnings: Vec<Component>,
    #[serde(default)]
    pub(crate) deductions: Vec<Component>,
    #[serde(default, deserialize_with = "lenient_gender")]
    pub(crate) gender: Option<Gender>,
    #[serde(default)]
    pub(crate) pf_applicable: bool,
    pub(crate) selected_month: Month,
}

impl PayslipStructure {
    /// An empty structure with the Professional Tax deduction seeded.
    pub fn new(salary_type: SalaryType, selected_month: Month) -> Self {
        Self {
            salary_type,
            basic_salary: Decimal::ZERO,
            gross_salary: None,
            earnings: Vec::new(),
            deductions: vec![Component::professional_tax()],
            gender: None,
            pf_applicable: false,
            selected_month,
        }
    }

    /// Whether basic salary is monthly or a day rate.
    pub fn salary_type(&self) -> SalaryType {
        self.salary_type
    }

    /// Base figure every percentage component is taken of.
    pub fn basic_salary(&self) -> Decimal {
        self.basic_salary
    }

    /// The explicitly entered gross, if any.
    pub fn gross_salary(&self) -> Option<Decimal> {
        self.gross_salary
    }

    /// Earning components in display order.
    pub fn earnings(&self) -> &[Component] {
        &self.earnings
    }

    /// Deduction components in display order, statutory lines included.
    pub fn deductions(&self) -> &[Component] {
        &self.deductions
    }

    /// Gender used for the Professional Tax slab, if known.
    pub fn gender(&self) -> Option<Gender> {
        self.gender
    }

    /// Whether Provident Fund is deducted.
    pub fn pf_applicable(&self) -> bool {
        self.pf_applicable
    }

    /// Month the Professional Tax is computed for.
    pub fn selected_month(&self) -> Month {
        self.selected_month
    }

    /// Restores the structural invariants on data that may have come
    /// from outside the engine.
    ///
    /// Reserved names are mapped onto their kinds, duplicate statutory
    /// deductions are dropped (the first one wins), Professional Tax
    /// is seeded when missing and Provident Fund is seeded when PF
    /// applies.  Amounts are clamped into their valid ranges.
    pub fn normalize(&mut self) {
        self.basic_salary = coerce_amount(self.basic_salary);
        self.gross_salary = self.gross_salary.map(coerce_amount);

        for earning in &mut self.earnings {
            earning.kind = ComponentKind::Generic;
            clamp_component(earning);
        }

        let mut seen_pt = false;
        let mut seen_pf = false;
        self.deductions.retain_mut(|deduction| {
            if deduction.kind == ComponentKind::Generic {
                deduction.kind = ComponentKind::for_name(&deduction.name);
            }
            let seen = match deduction.kind {
                ComponentKind::Generic => {
                    clamp_component(deduction);
                    return true;
                }
                ComponentKind::ProfessionalTax => &mut seen_pt,
                ComponentKind::ProvidentFund => &mut seen_pf,
            };
            if *seen {
                return false;
            }
            *seen = true;
            let seeded = match deduction.kind {
                ComponentKind::ProvidentFund => Component::provident_fund(),
                _ => Component::professional_tax(),
            };
            *deduction = Component {
                enabled: deduction.enabled,
                ..seeded
            };
            true
        });

        if !seen_pt {
            self.deductions.push(Component::professional_tax());
        }
        if self.pf_applicable && !seen_pf {
            self.deductions.push(Component::provident_fund());
        }
    }
}

fn clamp_component(component: &mut Component) {
    component.percentage = coerce_percentage(component.percentage);
    component.fixed_amount = coerce_amount(component.fixed_amount);
}

/// A named amount on a payslip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineAmount {
    pub name: String,
    /// Lets the UI tell statutory lines apart from user-defined ones.
    pub kind: ComponentKind,
    pub amount: Decimal,
}

/// Net pay for a given number of working days.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DayProjection {
    pub days: u32,
    /// `basic_salary * days`.
    pub amount: Decimal,
}

/// Every derived figure for a structure at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayslipSummary {
    pub salary_type: SalaryType,
    pub basic_salary: Decimal,
    /// The explicit gross salary, or total earnings when none is set.
    pub gross_salary: Decimal,
    pub earnings: Vec<LineAmount>,
    pub deductions: Vec<LineAmount>,
    pub total_earnings: Decimal,
    pub professional_tax: Decimal,
    pub employee_pf: Decimal,
    pub employer_pf: Decimal,
    pub total_deductions: Decimal,
    pub net_salary: Decimal,
    pub needs_adjustment: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_day: Option<Vec<DayProjection>>,
}

/// Parses user-entered money.  Anything that is not a finite number
/// becomes zero; the result is clamped to `0..=MAX_AMOUNT`.
pub fn parse_amount(input: &str) -> Decimal {
    let trimmed = input.trim();
    let parsed = Decimal::from_str(trimmed).ok().or_else(|| {
        let value = trimmed.parse::<f64>().ok().filter(|v| v.is_finite())?;
        // Finite floats beyond Decimal's range saturate instead of vanishing.
        Some(Decimal::from_f64(value).unwrap_or(if value > 0.0 { MAX_AMOUNT } else { Decimal::ZERO }))
    });
    coerce_amount(parsed.unwrap_or(Decimal::ZERO))
}

/// Reads an amount from whatever JSON the UI sent: numbers and numeric
/// strings parse, everything else (`""`, `null`, junk) is zero.
pub fn amount_from_value(value: &Value) -> Decimal {
    match value {
        Value::String(raw) => parse_amount(raw),
        Value::Number(number) => parse_amount(&number.to_string()),
        _ => Decimal::ZERO,
    }
}

pub fn coerce_amount(amount: Decimal) -> Decimal {
    amount.clamp(Decimal::ZERO, MAX_AMOUNT)
}

fn lenient_amount<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(amount_from_value(&Value::deserialize(deserializer)?))
}

/// A blank or `null` field means "not set".
fn lenient_optional_amount<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::String(raw) if raw.trim().is_empty() => None,
        value => Some(amount_from_value(&value)),
    })
}

fn lenient_gender<'de, D>(deserializer: D) -> Result<Option<Gender>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(raw) if raw.trim().is_empty() => Ok(None),
        value => serde_json::from_value(value).map(Some).map_err(serde::de::Error::custom),
    }
}

pub fn coerce_percentage(percentage: Decimal) -> Decimal {
    percentage.clamp(Decimal::ZERO, dec!(100))
}
