use std::env;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

use geoproc::{config::AppConfig, plan::Plan, telemetry};
use geoproc_core::SpatialProcessor;

#[tokio::main]
async fn main() -> Result<()> {
    let _telemetry = telemetry::init("geoproc")?;

    let Some(plan_path) = env::args().nth(1) else {
        bail!("usage: geoproc <plan.json>");
    };

    let plan = Plan::load(&plan_path).await?;
    let config = AppConfig::from_env()?;

    let processor = SpatialProcessor::connect(&config.database_url, config.processor)
        .await
        .context("failed to connect to PostGIS")?;

    info!(plan = %plan_path, steps = plan.steps.len(), "running plan");
    if let Err(err) = plan.run(&processor).await {
        if processor.config().journal.enabled {
            report_unresolved(&processor).await;
        }
        return Err(err);
    }
    Ok(())
}

async fn report_unresolved(processor: &SpatialProcessor) {
    match processor.unresolved_replacements().await {
        Ok(unresolved) => {
            for staged in unresolved {
                warn!(
                    staged = %staged.staged,
                    target = %staged.target,
                    kind = %staged.kind,
                    "replacement left uncommitted"
                );
            }
        }
        Err(err) => warn!(error = %err, "could not check for uncommitted replacements"),
    }
}
