//! Shared setup: configuration, logging, and an adapter over a model design.

use std::path::Path;
use std::rc::Rc;

use aion_gpi::{Gpi, GpiConfig};
use aion_gpi_model::ModelBackend;

use crate::GlobalArgs;

/// Name under which the model backend is registered.
pub const MODEL_BACKEND: &str = "model";

/// An adapter context with a model design registered as primary backend.
pub struct Session {
    /// The adapter context.
    pub gpi: Gpi,
    /// The model behind it.
    pub model: Rc<ModelBackend>,
}

/// Loads the configuration file if given, then layers the environment over it.
pub fn load_config(global: &GlobalArgs) -> Result<GpiConfig, Box<dyn std::error::Error>> {
    let config = match &global.config {
        Some(path) => aion_gpi::load_config(Path::new(path))?.with_env_overrides()?,
        None => GpiConfig::from_env()?,
    };
    Ok(config)
}

fn log_filter(global: &GlobalArgs, config: &GpiConfig) -> String {
    if global.verbose {
        "debug".to_string()
    } else if global.quiet {
        "error".to_string()
    } else {
        config.log_level.clone()
    }
}

/// Sets up logging, builds the model, registers it, and loads extra
/// libraries from the configuration.
pub fn open(design: &str, global: &GlobalArgs) -> Result<Session, Box<dyn std::error::Error>> {
    let config = load_config(global)?;
    aion_gpi::init_logging(&log_filter(global, &config));

    let model = ModelBackend::load(MODEL_BACKEND, Path::new(design))?;
    let gpi = Gpi::new();
    gpi.register_backend(model.clone())?;
    let loaded = gpi.load_extras(&config.extra)?;
    tracing::debug!(design, extras = loaded, "session ready");
    Ok(Session { gpi, model })
}
