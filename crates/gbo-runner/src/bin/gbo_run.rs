use anyhow::Context;
use tracing::{error, info};

use gbo_runner::{execute, RunError, RunFile};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("GBO_RUN_FILE").ok())
        .context("usage: gbo-run <run.json> (or set GBO_RUN_FILE)")?;

    let run = RunFile::load(&path).with_context(|| format!("loading {path}"))?;
    info!("Loaded run file {path}");

    match execute(&run) {
        Ok(result) => {
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        Err(RunError::Aborted(aborted)) => {
            error!(
                "Run aborted while {} at iteration {} with {} recorded evaluations",
                aborted.phase,
                aborted.iteration,
                aborted.history.len()
            );
            println!("{}", serde_json::to_string_pretty(&aborted.history)?);
            Err(aborted.into())
        }
        Err(err) => Err(err.into()),
    }
}
