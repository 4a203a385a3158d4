use anyhow::{Context, Result};
use tracing::info;

use rust_ptv::pipeline::Pipeline;

fn main() -> Result<()> {
    // Initialize tracing subscriber with environment filter
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let config_path = std::env::args()
        .nth(1)
        .context("usage: particle-tracker <configuration file>")?;

    let pipeline = Pipeline::from_config_file(&config_path)?;
    pipeline.run()?;

    info!("done");
    Ok(())
}
