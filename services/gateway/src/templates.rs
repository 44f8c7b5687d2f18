use std::path::Path;
use std::sync::Arc;

use render_engine::template::{PlaceholderTemplate, Template, TemplateError};

use crate::config::GatewayConfig;

/// Every template the gateway renders with, loaded once at startup.
#[derive(Clone)]
pub struct Templates {
    pub response: Arc<dyn Template>,
    pub error: Arc<dyn Template>,
    pub timestamp: Arc<dyn Template>,
    pub climate: Arc<dyn Template>,
    pub billing: Arc<dyn Template>,
    pub weather_current: Arc<dyn Template>,
    pub weather_forecast: Arc<dyn Template>,
}

impl Templates {
    pub fn load(config: &GatewayConfig) -> Result<Self, TemplateError> {
        let files = &config.templates;
        Ok(Self {
            response: load(config.template_path(&files.response))?,
            error: load(config.template_path(&files.error))?,
            timestamp: load(config.template_path(&files.timestamp))?,
            climate: load(config.template_path(&files.climate))?,
            billing: load(config.template_path(&files.billing))?,
            weather_current: load(config.template_path(&files.weather_current))?,
            weather_forecast: load(config.template_path(&files.weather_forecast))?,
        })
    }
}

fn load(path: impl AsRef<Path>) -> Result<Arc<dyn Template>, TemplateError> {
    let template = PlaceholderTemplate::from_file(path.as_ref())?;
    tracing::debug!(path = %path.as_ref().display(), "Template loaded");
    Ok(Arc::new(template))
}
