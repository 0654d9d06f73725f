//! Salary structure computation engine.
//!
//! The `engine` module owns a [`PayslipStructure`] while it is being
//! edited and derives every monetary figure from it: component
//! amounts, statutory deductions, totals and net salary.  It also
//! reconciles basic against gross salary, spreading the gap between
//! them across the enabled earnings whichever of the two was edited
//! last.  Professional Tax is delegated to a [`ProfessionalTaxRule`].

use crate::error::StructureError;
use crate::models::{
    coerce_amount, coerce_percentage, CalculationType, Component, ComponentKind, ComponentUpdate,
    DayProjection, Gender, LineAmount, PayslipStructure, PayslipSummary, SalaryType,
    PROJECTION_DAYS,
};
use crate::tax::ProfessionalTaxRule;
use chrono::Month;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tracing::debug;

/// Employee Provident Fund contribution, percent of basic.
const EMPLOYEE_PF_RATE: Decimal = dec!(12);
/// Employer Provident Fund contribution, percent of basic.
const EMPLOYER_PF_RATE: Decimal = dec!(13);

/// Edits one [`PayslipStructure`] and computes its payslip figures.
///
/// Every mutation keeps the structure normalised, so the statutory
/// deductions are always present exactly once.
pub struct SalaryStructureEngine {
    structure: PayslipStructure,
    pt_rule: Arc<dyn ProfessionalTaxRule>,
}

impl SalaryStructureEngine {
    /// Takes ownership of `structure`, normalising it first.
    pub fn new(mut structure: PayslipStructure, pt_rule: Arc<dyn ProfessionalTaxRule>) -> Self {
        structure.normalize();
        Self { structure, pt_rule }
    }

    pub fn structure(&self) -> &PayslipStructure {
        &self.structure
    }

    pub fn into_structure(self) -> PayslipStructure {
        self.structure
    }

    pub fn earning_amount(&self, earning: &Component) -> Decimal {
        earning.amount_on(self.structure.basic_salary)
    }

    pub fn deduction_amount(&self, deduction: &Component) -> Decimal {
        match deduction.kind {
            ComponentKind::ProfessionalTax => self.professional_tax(),
            ComponentKind::ProvidentFund => self.employee_pf(),
            ComponentKind::Generic => deduction.amount_on(self.structure.basic_salary),
        }
    }

    pub fn professional_tax(&self) -> Decimal {
        self.pt_rule.calculate(
            self.total_earnings(),
            self.structure.gender,
            self.structure.selected_month,
        )
    }

    pub fn employee_pf(&self) -> Decimal {
        self.pf_at(EMPLOYEE_PF_RATE)
    }

    pub fn employer_pf(&self) -> Decimal {
        self.pf_at(EMPLOYER_PF_RATE)
    }

    fn pf_at(&self, rate: Decimal) -> Decimal {
        if self.structure.pf_applicable {
            self.structure.basic_salary * rate / dec!(100)
        } else {
            Decimal::ZERO
        }
    }

    /// Basic salary plus every enabled earning.
    pub fn total_earnings(&self) -> Decimal {
        self.structure.basic_salary
            + self
                .structure
                .earnings
                .iter()
                .filter(|e| e.enabled)
                .map(|e| self.earning_amount(e))
                .sum::<Decimal>()
    }

    /// Statutory deductions plus every enabled generic deduction.
    pub fn total_deductions(&self) -> Decimal {
        let generic: Decimal = self
            .structure
            .deductions
            .iter()
            .filter(|d| d.enabled && d.kind == ComponentKind::Generic)
            .map(|d| d.amount_on(self.structure.basic_salary))
            .sum();
        self.employee_pf() + self.professional_tax() + generic
    }

    /// Gross (or total earnings when no gross is set) less deductions.
    /// May be negative.
    pub fn net_salary(&self) -> Decimal {
        let gross = self.structure.gross_salary.unwrap_or_else(|| self.total_earnings());
        gross - self.total_deductions()
    }

    /// Net salary over the reference day counts, for per-day salaries
    /// only.
    pub fn per_day_projection(&self) -> Option<Vec<DayProjection>> {
        if self.structure.salary_type != SalaryType::Perday {
            return None;
        }
        let net = self.net_salary();
        Some(
            PROJECTION_DAYS
                .iter()
                .map(|&days| DayProjection {
                    days,
                    amount: net * Decimal::from(days),
                })
                .collect(),
        )
    }

    pub fn summary(&self) -> PayslipSummary {
        let basic = self.structure.basic_salary;
        let total_earnings = self.total_earnings();
        let net_salary = self.net_salary();
        let over_allocated = self
            .structure
            .gross_salary
            .map_or(false, |gross| total_earnings > gross);

        PayslipSummary {
            salary_type: self.structure.salary_type,
            basic_salary: basic,
            gross_salary: self.structure.gross_salary.unwrap_or(total_earnings),
            earnings: self
                .structure
                .earnings
                .iter()
                .filter(|e| e.enabled)
                .map(|e| line(e, self.earning_amount(e)))
                .collect(),
            deductions: self
                .structure
                .deductions
                .iter()
                .filter(|d| match d.kind {
                    ComponentKind::Generic => d.enabled,
                    ComponentKind::ProfessionalTax => true,
                    ComponentKind::ProvidentFund => self.structure.pf_applicable,
                })
                .map(|d| line(d, self.deduction_amount(d)))
                .collect(),
            total_earnings,
            professional_tax: self.professional_tax(),
            employee_pf: self.employee_pf(),
            employer_pf: self.employer_pf(),
            total_deductions: self.total_deductions(),
            net_salary,
            needs_adjustment: net_salary < Decimal::ZERO || over_allocated,
            per_day: self.per_day_projection(),
        }
    }

    /// Sets gross salary and spreads `gross - basic` evenly over the
    /// enabled earnings as fixed amounts.  The last enabled earning
    /// absorbs the division remainder, so the shares add up to the
    /// difference exactly.
    ///
    /// When gross does not exceed basic, or nothing is enabled, the
    /// value is stored and the earnings are left as they are, even if
    /// they now add up to more than the new gross.
    pub fn set_gross_salary(&mut self, gross: Decimal) {
        let gross = coerce_amount(gross);
        let difference = gross - self.structure.basic_salary;
        self.structure.gross_salary = Some(gross);
        let spread = self.spread_over_enabled_earnings(difference);
        debug!(%gross, %difference, spread, "gross salary set");
    }

    /// Sets basic salary and spreads the gap to the current gross
    /// evenly over the enabled earnings as fixed amounts.
    ///
    /// Gross is never changed here.  A missing gross counts as zero,
    /// so only the basic salary moves.
    pub fn set_basic_salary(&mut self, basic: Decimal) {
        let basic = coerce_amount(basic);
        let difference = self.structure.gross_salary.unwrap_or(Decimal::ZERO) - basic;
        self.structure.basic_salary = basic;
        let spread = self.spread_over_enabled_earnings(difference);
        debug!(%basic, %difference, spread, "basic salary set");
    }

    fn spread_over_enabled_earnings(&mut self, difference: Decimal) -> bool {
        let enabled = self.structure.earnings.iter().filter(|e| e.enabled).count();
        if difference <= Decimal::ZERO || enabled == 0 {
            return false;
        }
        let share = difference / Decimal::from(enabled);
        let last = difference - share * Decimal::from(enabled - 1);
        for (i, earning) in self
            .structure
            .earnings
            .iter_mut()
            .filter(|e| e.enabled)
            .enumerate()
        {
            earning.calculation_type = CalculationType::Fixed;
            earning.fixed_amount = if i + 1 == enabled { last } else { share };
            earning.percentage = Decimal::ZERO;
        }
        true
    }

    pub fn set_gender(&mut self, gender: Option<Gender>) {
        self.structure.gender = gender;
    }

    pub fn set_selected_month(&mut self, month: Month) {
        self.structure.selected_month = month;
    }

    pub fn set_salary_type(&mut self, salary_type: SalaryType) {
        self.structure.salary_type = salary_type;
    }

    /// Turning PF on for the first time seeds the employee PF
    /// deduction.  Turning it off keeps the line, which then counts
    /// for nothing.
    pub fn set_pf_applicable(&mut self, applicable: bool) {
        self.structure.pf_applicable = applicable;
        if applicable {
            self.structure.normalize();
        }
    }

    /// Appends a blank earning and returns its index.
    pub fn add_earning(&mut self) -> usize {
        self.structure.earnings.push(Component::blank());
        self.structure.earnings.len() - 1
    }

    /// Appends a blank deduction and returns its index.
    pub fn add_deduction(&mut self) -> usize {
        self.structure.deductions.push(Component::blank());
        self.structure.deductions.len() - 1
    }

    pub fn remove_earning(&mut self, index: usize) -> Result<Component, StructureError> {
        if index >= self.structure.earnings.len() {
            return Err(StructureError::EarningIndexOutOfRange(index));
        }
        Ok(self.structure.earnings.remove(index))
    }

    /// Statutory deductions cannot be removed.
    pub fn remove_deduction(&mut self, index: usize) -> Result<Component, StructureError> {
        let deduction = self
            .structure
            .deductions
            .get(index)
            .ok_or(StructureError::DeductionIndexOutOfRange(index))?;
        if deduction.kind.is_system_managed() {
            return Err(StructureError::SystemManaged(deduction.name.clone()));
        }
        Ok(self.structure.deductions.remove(index))
    }

    pub fn update_earning(
        &mut self,
        index: usize,
        update: ComponentUpdate,
    ) -> Result<(), StructureError> {
        let earning = self
            .structure
            .earnings
            .get_mut(index)
            .ok_or(StructureError::EarningIndexOutOfRange(index))?;
        apply_update(earning, update);
        Ok(())
    }

    /// Statutory deductions may only be enabled or disabled, and no
    /// other deduction may take a statutory name.
    pub fn update_deduction(
        &mut self,
        index: usize,
        update: ComponentUpdate,
    ) -> Result<(), StructureError> {
        let deduction = self
            .structure
            .deductions
            .get_mut(index)
            .ok_or(StructureError::DeductionIndexOutOfRange(index))?;
        let renames = matches!(update, ComponentUpdate::Name(_));
        if deduction.kind.is_system_managed() && (renames || update.changes_calculation()) {
            return Err(StructureError::SystemManaged(deduction.name.clone()));
        }
        if let ComponentUpdate::Name(name) = &update {
            if ComponentKind::for_name(name).is_system_managed() {
                return Err(StructureError::ReservedName(name.clone()));
            }
        }
        apply_update(deduction, update);
        Ok(())
    }
}

fn apply_update(component: &mut Component, update: ComponentUpdate) {
    match update {
        ComponentUpdate::Name(name) => component.name = name,
        ComponentUpdate::Enabled(enabled) => component.enabled = enabled,
        ComponentUpdate::CalculationType(calculation_type) => {
            component.calculation_type = calculation_type
        }
        ComponentUpdate::Percentage(percentage) => {
            component.percentage = coerce_percentage(percentage)
        }
        ComponentUpdate::FixedAmount(amount) => component.fixed_amount = coerce_amount(amount),
    }
}

fn line(component: &Component, amount: Decimal) -> LineAmount {
    LineAmount {
        name: component.name.clone(),
        kind: component.kind,
        amount,
    }
}
