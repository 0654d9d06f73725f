//! Environment configuration for the Payslip Engine server.
//!
//! Values come from the process environment.  The binary loads a
//! `.env` file from the working directory before calling [`load`].

use anyhow::{Context, Result};
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::info;

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
pub const DEFAULT_PT_TABLE_DIR: &str = "pt_tables";
pub const DEFAULT_PT_REGION: &str = "MH";

#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP server listens on.
    pub bind_addr: SocketAddr,
    /// Directory of Professional Tax table JSON files.
    pub pt_table_dir: PathBuf,
    /// State whose Professional Tax table the engine applies.
    pub pt_region: String,
}

pub fn load() -> Result<Config> {
    Ok(Config {
        bind_addr: load_bind_addr()?,
        pt_table_dir: PathBuf::from(var_or("PAYSLIP_PT_TABLE_DIR", DEFAULT_PT_TABLE_DIR)),
        pt_region: var_or("PAYSLIP_PT_REGION", DEFAULT_PT_REGION),
    })
}

fn load_bind_addr() -> Result<SocketAddr> {
    let var = var_or("PAYSLIP_BIND_ADDR", DEFAULT_BIND_ADDR);
    var.parse()
        .with_context(|| format!("`PAYSLIP_BIND_ADDR` is not a valid socket address: {var}"))
}

fn var_or(name: &str, default: &str) -> String {
    info!("Loading environment `{name}`");
    env::var(name).unwrap_or_else(|_| default.to_string())
}
