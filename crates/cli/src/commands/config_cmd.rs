//! `versa config` — Configuration management commands.

use versa_config::{ApiStyle, AppConfig};
use versa_core::Persona;

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating configuration...");

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    };
    println!("   ✅ Config parsed successfully");

    match config.persona_registry() {
        Ok(_) => println!("   ✅ Persona templates valid"),
        Err(e) => {
            println!("   ❌ Persona template error: {e}");
            return Err(e.into());
        }
    }

    let warnings = warnings(&config);
    if warnings.is_empty() {
        println!("   ✅ All checks passed");
    } else {
        println!();
        for w in &warnings {
            println!("   ⚠️  {w}");
        }
    }

    println!();
    println!("   Endpoint:  {} ({:?})", config.api_url, config.api_style);
    println!("   Model:     {}", config.model);
    println!("   Persona:   {}", config.persona);
    println!(
        "   Memory:    {} (buffer_len = {})",
        config.memory.kind, config.memory.buffer_len
    );
    println!("   Top-k:     {}", config.retrieval.top_k);
    println!("   Templates: {}", config.personas_dir().display());

    Ok(())
}

/// Non-fatal problems worth pointing out.
fn warnings(config: &AppConfig) -> Vec<&'static str> {
    let mut warnings = Vec::new();

    if !config.has_api_key() && config.api_style == ApiStyle::Chat {
        warnings.push("No API key set (set VERSA_API_KEY or OPENAI_API_KEY env var)");
    }

    if config.generation.stop_marker.is_empty() {
        warnings.push("Empty stop_marker: responses will not be trimmed at a stop marker");
    }

    if config.memory.buffer_len == 0 {
        warnings.push("buffer_len = 0: no recent turns are kept verbatim");
    }

    if matches!(config.persona.parse::<Persona>(), Ok(Persona::DocBot)) {
        warnings.push("Default persona is DocBot: every chat needs --knowledge");
    }

    warnings
}

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    if config.api_key.is_some() {
        config.api_key = Some("***".into());
    }
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_dir().join("config.toml");
    println!("{}", config_path.display());
    Ok(())
}
