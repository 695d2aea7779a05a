//! `docweaver models`: Known context windows and the tier each one gets.

use docweaver_config::AppConfig;
use docweaver_engine::AssemblySettings;
use docweaver_providers::ModelCapabilityRegistry;

pub fn run(
    config: &AppConfig,
    provider: Option<&str>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let registry = ModelCapabilityRegistry::from_overrides(&config.models);
    let settings = AssemblySettings::from(&config.assembly);
    let profiles: Vec<_> = registry
        .profiles()
        .into_iter()
        .filter(|p| provider.is_none_or(|wanted| p.provider.eq_ignore_ascii_case(wanted)))
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&profiles)?);
        return Ok(());
    }

    println!("🤖 Model Context Budgets");
    println!("─────────────────────────────────────────────────────────────────────────");
    println!(
        "{:<14} {:<22} {:>10} {:>9} {:>10}  {}",
        "Provider", "Model", "Window", "Reserve", "Available", "Tier"
    );
    for p in &profiles {
        let active = p.provider.eq_ignore_ascii_case(&config.provider)
            && p.model.eq_ignore_ascii_case(&config.model);
        println!(
            "{:<14} {:<22} {:>10} {:>9} {:>10}  {}{}",
            p.provider,
            p.model,
            p.max_context_tokens,
            p.reserved_output_tokens,
            p.available_budget(),
            settings.tier(p.available_budget()),
            if active { "  ← active" } else { "" }
        );
    }
    println!();
    println!(
        "  {} models · unknown models fall back to an 8192-token window",
        profiles.len()
    );
    Ok(())
}
