//! Builds the configured generator from `AppConfig`.

use std::sync::Arc;

use tracing::{info, warn};
use versa_config::{ApiStyle, AppConfig};
use versa_core::error::GeneratorError;
use versa_core::generator::Generator;

use crate::openai_compat::OpenAiCompatGenerator;

/// Build the generator described by `config`.
///
/// A missing API key is only fatal for hosted chat endpoints; local
/// completions servers usually accept any key.
pub fn build_from_config(config: &AppConfig) -> Result<Arc<dyn Generator>, GeneratorError> {
    let api_key = match (&config.api_key, config.api_style) {
        (Some(key), _) => key.clone(),
        (None, ApiStyle::Completions) => {
            warn!("No API key configured, sending placeholder key to completions endpoint");
            "none".to_string()
        }
        (None, ApiStyle::Chat) => {
            return Err(GeneratorError::NotConfigured(
                "no API key found; set VERSA_API_KEY or OPENAI_API_KEY, or add api_key to ~/.versa/config.toml".into(),
            ));
        }
    };

    let generator = OpenAiCompatGenerator::new(
        generator_name(&config.api_url),
        &config.api_url,
        api_key,
        &config.model,
    )?
    .with_style(config.api_style);

    info!(
        generator = generator.name(),
        model = %config.model,
        style = ?config.api_style,
        "Generator ready"
    );

    Ok(Arc::new(generator))
}

/// Derive a short display name from well-known base URLs.
fn generator_name(api_url: &str) -> &'static str {
    if api_url.contains("api.openai.com") {
        "openai"
    } else if api_url.contains("openrouter.ai") {
        "openrouter"
    } else if api_url.contains("localhost:11434") {
        "ollama"
    } else if api_url.contains("localhost") || api_url.contains("127.0.0.1") {
        "local"
    } else {
        "openai-compatible"
    }
}
