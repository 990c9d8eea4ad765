//! `partspec extract` — description in, parameter set JSON out.

use partspec_core::ExtractionMode;
use partspec_pipeline::Pipeline;
use std::path::Path;
use tracing::{info, warn};

pub async fn run(
    config_path: Option<&Path>,
    description: &str,
    mode: Option<ExtractionMode>,
    validate: bool,
    output_json: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let mode = mode.unwrap_or(config.extraction.mode);
    let validate = validate && config.validation.enabled;

    let pipeline = Pipeline::from_config(&config);
    let processed = pipeline.process(description, mode, validate).await?;
    if !processed.is_validated() {
        warn!("Parameter set was not geometrically validated");
    }

    let json = processed.to_json()?;
    match output_json {
        Some(path) => {
            std::fs::write(path, &json)?;
            info!(path = %path.display(), "Wrote parameter set");
        }
        None => println!("{json}"),
    }
    Ok(())
}
