//! Entry point for the Payslip Engine binary.
//!
//! Running this binary starts an HTTP server exposing the salary
//! engine and payroll runs.  Configuration is read from the
//! environment (see [`payslip_engine::config`]); `RUST_LOG` controls
//! log filtering.

use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = Registry::default()
        .with(env_filter)
        .with(fmt::layer().with_line_number(true));
    tracing::subscriber::set_global_default(subscriber)?;

    let config = payslip_engine::config::load()?;
    if let Err(err) = payslip_engine::api::serve(config).await {
        tracing::error!(%err, "server terminated");
        return Err(err);
    }
    Ok(())
}
