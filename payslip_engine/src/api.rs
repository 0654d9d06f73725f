//! HTTP API for the Payslip Engine.
//!
//! This module exposes the salary engine and payroll runs over a small
//! REST API built on [`axum`](https://crates.io/crates/axum).  Payslip
//! endpoints are stateless: the client posts the structure it is
//! editing and gets the derived figures back.  Payroll runs are kept in
//! memory for the lifetime of the process.

use crate::config::Config;
use crate::engine::SalaryStructureEngine;
use crate::error::RunError;
use crate::models::{amount_from_value, PayslipStructure, PayslipSummary};
use crate::payroll::{PayrollRun, PayrollRunInput};
use crate::tax::{load_tables_from_dir, ProfessionalTaxRule, ProfessionalTaxTable};
use anyhow::Result;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::Path as FsPath;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Application state shared across requests.
pub struct AppState {
    pub pt_rule: Arc<dyn ProfessionalTaxRule>,
    pub runs: RwLock<HashMap<String, PayrollRun>>,
}

impl AppState {
    pub fn new(pt_rule: Arc<dyn ProfessionalTaxRule>) -> Arc<Self> {
        Arc::new(Self {
            pt_rule,
            runs: RwLock::new(HashMap::new()),
        })
    }

    /// Picks the Professional Tax table for `region` out of `dir`,
    /// falling back to the built-in Maharashtra table.
    pub fn from_tables(dir: &FsPath, region: &str) -> Result<Arc<Self>> {
        let table = load_tables_from_dir(dir)?
            .into_iter()
            .find(|table| table.region == region);
        let table = match table {
            Some(table) => table,
            None => {
                warn!(region, dir = ?dir, "no professional tax table found, using built-in");
                ProfessionalTaxTable::maharashtra()
            }
        };
        info!(region = %table.region, version = %table.version, "professional tax table selected");
        Ok(Self::new(Arc::new(table)))
    }
}

/// Which field the user edited.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconcileField {
    Basic,
    Gross,
}

#[derive(Debug, Deserialize)]
pub struct ReconcileRequest {
    pub structure: PayslipStructure,
    pub field: ReconcileField,
    /// Raw field contents; anything unparsable counts as zero.
    pub value: Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReconcileResponse {
    pub structure: PayslipStructure,
    pub summary: PayslipSummary,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunAction {
    Process,
    Approve,
    Lock,
    Rollback,
}

/// Maps payroll run failures onto HTTP responses.
pub struct ApiError(RunError);

impl From<RunError> for ApiError {
    fn from(err: RunError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (status_for(&self.0), Json(json!({"error": self.0.to_string()}))).into_response()
    }
}

fn status_for(err: &RunError) -> StatusCode {
    match err {
        RunError::RunNotFound(_) => StatusCode::NOT_FOUND,
        RunError::InvalidTransition { .. } => StatusCode::CONFLICT,
        RunError::MissingDaysWorked(_) => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/payslip/calculate", post(calculate_handler))
        .route("/api/payslip/reconcile", post(reconcile_handler))
        .route("/api/payroll/run", post(create_run_handler))
        .route("/api/payroll/run/:id", get(get_run_handler))
        .route("/api/payroll/run/:id/:action", post(run_action_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Handler for POST /api/payslip/calculate
async fn calculate_handler(
    State(app_state): State<Arc<AppState>>,
    Json(structure): Json<PayslipStructure>,
) -> Json<PayslipSummary> {
    let engine = SalaryStructureEngine::new(structure, Arc::clone(&app_state.pt_rule));
    Json(engine.summary())
}

/// Handler for POST /api/payslip/reconcile
async fn reconcile_handler(
    State(app_state): State<Arc<AppState>>,
    Json(request): Json<ReconcileRequest>,
) -> Json<ReconcileResponse> {
    let amount = amount_from_value(&request.value);
    let mut engine = SalaryStructureEngine::new(request.structure, Arc::clone(&app_state.pt_rule));
    match request.field {
        ReconcileField::Basic => engine.set_basic_salary(amount),
        ReconcileField::Gross => engine.set_gross_salary(amount),
    }
    let summary = engine.summary();
    Json(ReconcileResponse {
        structure: engine.into_structure(),
        summary,
    })
}

/// Handler for POST /api/payroll/run
///
/// The run is stored even when processing fails so it can be fixed up
/// and processed again.
async fn create_run_handler(
    State(app_state): State<Arc<AppState>>,
    Json(input): Json<PayrollRunInput>,
) -> Response {
    let mut run = PayrollRun::draft(input);
    let outcome = run.process(&app_state.pt_rule);
    let id = run.id.clone();
    let body = Json(run.clone());
    app_state.runs.write().await.insert(id.clone(), run);

    match outcome {
        Ok(()) => (StatusCode::CREATED, body).into_response(),
        Err(err) => (
            status_for(&err),
            Json(json!({"error": err.to_string(), "runId": id})),
        )
            .into_response(),
    }
}

/// Handler for GET /api/payroll/run/:id
async fn get_run_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<PayrollRun>, ApiError> {
    let runs = app_state.runs.read().await;
    let run = runs.get(&id).ok_or_else(|| RunError::RunNotFound(id.clone()))?;
    Ok(Json(run.clone()))
}

/// Handler for POST /api/payroll/run/:id/:action
async fn run_action_handler(
    State(app_state): State<Arc<AppState>>,
    Path((id, action)): Path<(String, RunAction)>,
) -> Result<Json<PayrollRun>, ApiError> {
    let mut runs = app_state.runs.write().await;
    let run = runs.get_mut(&id).ok_or_else(|| RunError::RunNotFound(id.clone()))?;
    match action {
        RunAction::Process => run.process(&app_state.pt_rule)?,
        RunAction::Approve => run.approve()?,
        RunAction::Lock => run.lock()?,
        RunAction::Rollback => run.rollback()?,
    }
    Ok(Json(run.clone()))
}

/// Launch the API server.  Blocks until the server terminates.
pub async fn serve(config: Config) -> Result<()> {
    let state = AppState::from_tables(&config.pt_table_dir, &config.pt_region)?;
    let router = build_router(state);
    let listener = TcpListener::bind(config.bind_addr).await?;
    info!(addr = %config.bind_addr, "server listening");
    axum::serve(listener, router).await?;
    Ok(())
}
