//! Payslip Engine library crate.
//!
//! This crate exposes the salary-structure engine, Professional Tax
//! rules, payroll runs and the HTTP API as reusable modules.  External
//! applications may embed [`engine::SalaryStructureEngine`] directly or
//! serve it via `api::build_router`.

pub mod models;
pub mod error;
pub mod tax;
pub mod engine;
pub mod payroll;
pub mod config;
pub mod api;
