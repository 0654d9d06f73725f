//! Payroll runs.
//!
//! A payroll run turns the salary structures of many employees into
//! payslips for one pay period.  Per-employee calculations are spread
//! across CPU cores with [`rayon`].  A run then moves through
//! `Draft → Processing → Completed → Approved → Locked`.  Completed and
//! approved runs can be rolled back to `Draft`.

use crate::engine::SalaryStructureEngine;
use crate::error::RunError;
use crate::models::{PayslipStructure, PayslipSummary, SalaryType};
use crate::tax::ProfessionalTaxRule;
use chrono::Month;
use rayon::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// The month being paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayPeriod {
    pub month: Month,
    pub year: i32,
}

/// An employee's compensation as submitted to a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeCompensation {
    pub employee_id: String,
    pub name: String,
    pub structure: PayslipStructure,
    /// Required for per-day salaries.
    #[serde(default)]
    pub days_worked: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayrollRunInput {
    pub period: PayPeriod,
    pub employees: Vec<EmployeeCompensation>,
}

/// One employee's result.  The pay figures are for the whole period.
/// For per-day salaries `summary` holds the daily figures; the period
/// figures are those times the days worked, except Professional Tax,
/// which is charged once on the period's gross.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeePayslip {
    pub employee_id: String,
    pub name: String,
    pub days_worked: Option<u32>,
    pub summary: PayslipSummary,
    pub gross_pay: Decimal,
    pub professional_tax: Decimal,
    pub total_deductions: Decimal,
    pub net_pay: Decimal,
    pub employer_pf: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunTotals {
    pub employee_count: usize,
    pub total_gross: Decimal,
    pub total_deductions: Decimal,
    pub total_net: Decimal,
    pub total_employer_pf: Decimal,
}

impl RunTotals {
    fn from_payslips(payslips: &[EmployeePayslip]) -> Self {
        payslips.iter().fold(
            RunTotals {
                employee_count: payslips.len(),
                ..RunTotals::default()
            },
            |mut totals, slip| {
                totals.total_gross += slip.gross_pay;
                totals.total_deductions += slip.total_deductions;
                totals.total_net += slip.net_pay;
                totals.total_employer_pf += slip.employer_pf;
                totals
            },
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Draft,
    /// Only held while [`PayrollRun::process`] computes payslips.
    Processing,
    Completed,
    Approved,
    Locked,
}

/// Computes payslips for every employee in parallel.
///
/// Each structure is normalised and evaluated for `period`'s month.
/// The first employee that cannot be paid fails the whole batch.
pub fn compute_payslips(
    period: PayPeriod,
    employees: &[EmployeeCompensation],
    pt_rule: &Arc<dyn ProfessionalTaxRule>,
) -> Result<Vec<EmployeePayslip>, RunError> {
    employees
        .par_iter()
        .map(|employee| -> Result<EmployeePayslip, RunError> {
            let mut structure = employee.structure.clone();
            structure.selected_month = period.month;
            let engine = SalaryStructureEngine::new(structure, Arc::clone(pt_rule));
            let summary = engine.summary();

            let (days, professional_tax) = match summary.salary_type {
                SalaryType::Monthly => (Decimal::ONE, summary.professional_tax),
                SalaryType::Perday => {
                    let days = employee
                        .days_worked
                        .map(Decimal::from)
                        .ok_or_else(|| RunError::MissingDaysWorked(employee.employee_id.clone()))?;
                    let tax = pt_rule.calculate(
                        summary.total_earnings * days,
                        engine.structure().gender(),
                        period.month,
                    );
                    (days, tax)
                }
            };

            let gross_pay = summary.gross_salary * days;
            let total_deductions =
                (summary.total_deductions - summary.professional_tax) * days + professional_tax;
            Ok(EmployeePayslip {
                employee_id: employee.employee_id.clone(),
                name: employee.name.clone(),
                days_worked: employee.days_worked,
                gross_pay,
                professional_tax,
                total_deductions,
                net_pay: gross_pay - total_deductions,
                employer_pf: summary.employer_pf * days,
                summary,
            })
        })
        .collect()
}

/// A batch of payslips for one period and where it is in its
/// lifecycle.
#[derive(Debug, Clone, Serialize)]
pub struct PayrollRun {
    pub id: String,
    pub period: PayPeriod,
    pub status: RunStatus,
    pub payslips: Vec<EmployeePayslip>,
    pub totals: Option<RunTotals>,
    #[serde(skip)]
    employees: Vec<EmployeeCompensation>,
}

impl PayrollRun {
    pub fn draft(input: PayrollRunInput) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            period: input.period,
            status: RunStatus::Draft,
            payslips: Vec::new(),
            totals: None,
            employees: input.employees,
        }
    }

    /// Computes the payslips of a draft run.  On failure the run falls
    /// back to `Draft` with nothing recorded.
    pub fn process(&mut self, pt_rule: &Arc<dyn ProfessionalTaxRule>) -> Result<(), RunError> {
        self.require(RunStatus::Draft, "process")?;
        self.status = RunStatus::Processing;
        info!(run = %self.id, employees = self.employees.len(), "processing payroll run");

        match compute_payslips(self.period, &self.employees, pt_rule) {
            Ok(payslips) => {
                self.totals = Some(RunTotals::from_payslips(&payslips));
                self.payslips = payslips;
                self.status = RunStatus::Completed;
                info!(run = %self.id, "payroll run completed");
                Ok(())
            }
            Err(err) => {
                warn!(run = %self.id, %err, "payroll run failed, returning to draft");
                self.status = RunStatus::Draft;
                Err(err)
            }
        }
    }

    pub fn approve(&mut self) -> Result<(), RunError> {
        self.require(RunStatus::Completed, "approve")?;
        self.status = RunStatus::Approved;
        info!(run = %self.id, "payroll run approved");
        Ok(())
    }

    /// Locking is final.
    pub fn lock(&mut self) -> Result<(), RunError> {
        self.require(RunStatus::Approved, "lock")?;
        self.status = RunStatus::Locked;
        info!(run = %self.id, "payroll run locked");
        Ok(())
    }

    /// Discards computed payslips and returns a completed or approved
    /// run to `Draft`.
    pub fn rollback(&mut self) -> Result<(), RunError> {
        match self.status {
            RunStatus::Completed | RunStatus::Approved => {
                self.payslips.clear();
                self.totals = None;
                self.status = RunStatus::Draft;
                info!(run = %self.id, "payroll run rolled back");
                Ok(())
            }
            from => Err(RunError::InvalidTransition {
                from,
                action: "roll back",
            }),
        }
    }

    fn require(&self, expected: RunStatus, action: &'static str) -> Result<(), RunError> {
        if self.status == expected {
            Ok(())
        } else {
            Err(RunError::InvalidTransition {
                from: self.status,
                action,
            })
        }
    }
}

/// Drafts and processes a run in one step.
pub fn run_payroll(
    input: PayrollRunInput,
    pt_rule: &Arc<dyn ProfessionalTaxRule>,
) -> Result<PayrollRun, RunError> {
    let mut run = PayrollRun::draft(input);
    run.process(pt_rule)?;
    Ok(run)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Gender;
    use crate::tax::ProfessionalTaxTable;
    use rust_decimal_macros::dec;

    fn rule() -> Arc<dyn ProfessionalTaxRule> {
        Arc::new(ProfessionalTaxTable::maharashtra())
    }

    fn employee(id: &str, salary_type: SalaryType, basic: Decimal, days: Option<u32>) -> EmployeeCompensation {
        let mut structure = PayslipStructure::new(salary_type, Month::January);
        structure.basic_salary = basic;
        structure.gender = Some(Gender::Male);
        EmployeeCompensation {
            employee_id: id.to_string(),
            name: format!("Employee {id}"),
            structure,
            days_worked: days,
        }
    }

    fn input(employees: Vec<EmployeeCompensation>) -> PayrollRunInput {
        PayrollRunInput {
            period: PayPeriod {
                month: Month::February,
                year: 2026,
            },
            employees,
        }
    }

    #[test]
    fn run_uses_period_month_and_scales_per_day() {
        let run = run_payroll(
            input(vec![
                employee("E1", SalaryType::Monthly, dec!(30000), None),
                employee("E2", SalaryType::Perday, dec!(1000), Some(20)),
            ]),
            &rule(),
        )
        .unwrap();

        assert_eq!(run.status, RunStatus::Completed);
        let monthly = &run.payslips[0];
        // February charges the fixed Professional Tax amount.
        assert_eq!(monthly.summary.professional_tax, dec!(300));
        assert_eq!(monthly.net_pay, dec!(29700));

        // Taxed on the 20000 earned over the period, not the day rate.
        let daily = &run.payslips[1];
        assert_eq!(daily.gross_pay, dec!(20000));
        assert_eq!(daily.professional_tax, dec!(300));
        assert_eq!(daily.net_pay, dec!(19700));

        let totals = run.totals.as_ref().unwrap();
        assert_eq!(totals.employee_count, 2);
        assert_eq!(totals.total_gross, dec!(50000));
        assert_eq!(totals.total_net, dec!(49400));
        assert_eq!(totals.total_deductions, dec!(600));
    }

    #[test]
    fn per_day_professional_tax_is_charged_once_on_period_gross() {
        let mut input = input(vec![
            employee("E1", SalaryType::Perday, dec!(1000), Some(20)),
            employee("E2", SalaryType::Perday, dec!(12000), Some(20)),
            employee("E3", SalaryType::Perday, dec!(300), Some(20)),
            employee("E4", SalaryType::Perday, dec!(300), Some(30)),
        ]);
        input.period.month = Month::March;
        let run = run_payroll(input, &rule()).unwrap();

        let slips = &run.payslips;
        assert_eq!(slips[0].professional_tax, dec!(200));
        assert_eq!(slips[0].net_pay, dec!(19800));
        assert_eq!(slips[1].total_deductions, dec!(200));
        assert_eq!(slips[1].net_pay, dec!(239800));
        // 6000 for the period is exempt, 9000 is in the 175 slab.
        assert_eq!(slips[2].professional_tax, Decimal::ZERO);
        assert_eq!(slips[3].professional_tax, dec!(175));
    }

    #[test]
    fn per_day_pf_still_scales_with_days() {
        let mut worker = employee("E1", SalaryType::Perday, dec!(1000), Some(10));
        worker.structure.pf_applicable = true;
        let mut input = input(vec![worker]);
        input.period.month = Month::March;
        let run = run_payroll(input, &rule()).unwrap();

        let slip = &run.payslips[0];
        assert_eq!(slip.employer_pf, dec!(1300));
        // 1200 employee PF plus 175 tax on the 10000 earned.
        assert_eq!(slip.total_deductions, dec!(1375));
        assert_eq!(slip.net_pay, dec!(8625));
    }

    #[test]
    fn missing_days_fails_back_to_draft() {
        let mut run = PayrollRun::draft(input(vec![
            employee("E1", SalaryType::Monthly, dec!(30000), None),
            employee("E2", SalaryType::Perday, dec!(1000), None),
        ]));
        assert_eq!(
            run.process(&rule()),
            Err(RunError::MissingDaysWorked("E2".into()))
        );
        assert_eq!(run.status, RunStatus::Draft);
        assert!(run.payslips.is_empty());
        assert!(run.totals.is_none());
    }

    #[test]
    fn lifecycle_transitions() {
        let mut run = PayrollRun::draft(input(vec![employee("E1", SalaryType::Monthly, dec!(30000), None)]));
        assert!(run.approve().is_err());
        assert!(run.rollback().is_err());

        run.process(&rule()).unwrap();
        assert!(run.process(&rule()).is_err());
        assert!(run.lock().is_err());
        run.approve().unwrap();

        run.rollback().unwrap();
        assert_eq!(run.status, RunStatus::Draft);
        assert!(run.payslips.is_empty());

        run.process(&rule()).unwrap();
        run.approve().unwrap();
        run.lock().unwrap();
        assert_eq!(
            run.rollback(),
            Err(RunError::InvalidTransition {
                from: RunStatus::Locked,
                action: "roll back",
            })
        );
        assert_eq!(run.status, RunStatus::Locked);
        assert_eq!(run.payslips.len(), 1);
    }
}
