//! `docweaver config`: Configuration management commands.

use docweaver_config::AppConfig;
use docweaver_engine::AssemblySettings;
use docweaver_providers::ModelCapabilityRegistry;
use std::path::{Path, PathBuf};

fn resolve(path: Option<&PathBuf>) -> PathBuf {
    path.cloned()
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"))
}

pub fn show(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}

pub fn path(path: Option<&PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", resolve(path).display());
    Ok(())
}

pub fn validate(path: Option<&PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let path = resolve(path);
    println!("🔍 Validating {}", path.display());

    let config = match AppConfig::load_from(&path) {
        Ok(config) => config,
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    };
    println!("   ✅ Config parsed successfully");

    let warnings = check(&config);
    if warnings.is_empty() {
        println!("   ✅ All checks passed");
    } else {
        println!();
        for w in &warnings {
            println!("   ⚠️  {w}");
        }
    }

    let registry = ModelCapabilityRegistry::from_overrides(&config.models);
    let profile = registry.lookup(&config.provider, &config.model);
    let settings = AssemblySettings::from(&config.assembly);
    println!();
    println!("   Model:      {profile}");
    println!(
        "   Budget:     {} tokens ({} tier)",
        profile.available_budget(),
        settings.tier(profile.available_budget())
    );
    println!("   Templates:  {} configured", config.templates.len());
    println!("   Sources:    {} enriched", config.context.enriched.len());
    Ok(())
}

/// Non-fatal problems: the config parses but will behave unexpectedly.
fn check(config: &AppConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    let registry = ModelCapabilityRegistry::from_overrides(&config.models);
    if !registry.contains(&config.provider, &config.model) {
        warnings.push(format!(
            "Model {}/{} is not in the registry; add a [[models]] entry for an exact window",
            config.provider, config.model
        ));
    }
    if let Some(core) = &config.context.core_path {
        if !core.exists() {
            warnings.push(format!("Core context file not found: {}", core.display()));
        }
    }
    for entry in &config.context.enriched {
        if !entry.path.exists() {
            warnings.push(format!(
                "Enriched source '{}' not found: {}",
                entry.key,
                entry.path.display()
            ));
        }
    }
    if config.discovery.max_count == 0 {
        warnings.push("discovery.max_count is 0; discovery will never inject".into());
    }
    warnings
}

pub fn init(path: Option<&PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let path = resolve(path);
    if path.exists() {
        println!("  Config file already exists: {}", path.display());
        return Ok(());
    }
    write_default(&path)?;
    println!("✅ Created {}", path.display());
    Ok(())
}

fn write_default(path: &Path) -> std::io::Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(path, AppConfig::default_toml())
}
