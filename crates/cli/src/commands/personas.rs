//! `versa personas` — List personas and their template sources.

use versa_core::{Persona, PersonaRegistry};

use super::load_config;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let registry = config.persona_registry()?;
    let default = config.default_persona()?;

    println!("🎭 Personas");
    println!();
    for line in persona_lines(&registry, default) {
        println!("{line}");
    }
    println!();
    println!("   Template directory: {}", config.personas_dir().display());
    Ok(())
}

/// One line per persona. DocBot is listed last and marked as needing a
/// knowledge source.
fn persona_lines(registry: &PersonaRegistry, default: Persona) -> Vec<String> {
    Persona::ALL
        .iter()
        .map(|&persona| {
            let marker = if persona == default { "*" } else { " " };
            let source = registry
                .template(persona)
                .map(|t| t.source.clone())
                .unwrap_or_else(|_| "<missing>".into());
            let note = if persona.is_grounded() {
                " (requires --knowledge)"
            } else {
                ""
            };
            format!(
                "  {marker} {} {:<10} ~{:>4} tokens  {source}{note}",
                persona.avatar(),
                persona.as_str(),
                registry.estimated_tokens(persona),
            )
        })
        .collect()
}
