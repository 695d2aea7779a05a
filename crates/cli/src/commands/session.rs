//! Flags shared by `build` and `analyze`, and the engine they produce.

use clap::Args;
use docweaver_config::{AppConfig, EnrichedSourceConfig};
use docweaver_engine::ContextAssemblyEngine;
use std::path::PathBuf;

#[derive(Args, Debug, Clone, Default)]
pub struct SessionArgs {
    /// File with the core project description
    #[arg(long)]
    pub core: Option<PathBuf>,

    /// Enriched context as key=path or key=path:tag,tag (repeatable)
    #[arg(long, value_parser = parse_enriched)]
    pub enriched: Vec<EnrichedSourceConfig>,

    /// Discover and inject project files from this directory
    #[arg(long)]
    pub inject: Option<PathBuf>,

    /// Override the configured provider
    #[arg(long)]
    pub provider: Option<String>,

    /// Override the configured model
    #[arg(long)]
    pub model: Option<String>,
}

/// Parse `key=path[:tag,tag]`.
///
/// The tag list is only split off when the text after the last `:` has no
/// path separator or `.`, so `C:\notes.md` and `my:notes.md` stay whole.
pub fn parse_enriched(raw: &str) -> Result<EnrichedSourceConfig, String> {
    let (key, rest) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=path[:tags], got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing key in '{raw}'"));
    }

    let (path, tags) = match rest.rsplit_once(':') {
        Some((path, tags)) if !path.is_empty() && !tags.contains(['/', '\\', '.']) => (
            path,
            tags.split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(String::from)
                .collect(),
        ),
        _ => (rest, Vec::new()),
    };
    if path.trim().is_empty() {
        return Err(format!("missing path in '{raw}'"));
    }

    Ok(EnrichedSourceConfig {
        key: key.to_string(),
        path: PathBuf::from(path.trim()),
        tags,
        relevance_hint: None,
    })
}

/// Build an engine from config with command-line sources layered on top.
pub fn open(
    config: &AppConfig,
    args: &SessionArgs,
) -> Result<ContextAssemblyEngine, Box<dyn std::error::Error>> {
    let mut config = config.clone();
    if let Some(provider) = &args.provider {
        config.provider = provider.clone();
    }
    if let Some(model) = &args.model {
        config.model = model.clone();
    }
    if let Some(core) = &args.core {
        config.context.core_path = Some(core.clone());
    }
    config.context.enriched.extend(args.enriched.iter().cloned());

    let mut engine = ContextAssemblyEngine::from_config(&config)?;

    if let Some(dir) = &args.inject {
        let options = engine.discovery_options().clone();
        let report = engine.discover(dir, &options);
        tracing::info!(
            dir = %dir.display(),
            injected = report.injected,
            "Injected project files"
        );
    }
    Ok(engine)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_key_and_path() {
        let e = parse_enriched("risk-analysis=docs/risks.md").unwrap();
        assert_eq!(e.key, "risk-analysis");
        assert_eq!(e.path, PathBuf::from("docs/risks.md"));
        assert!(e.tags.is_empty());
    }

    #[test]
    fn parses_tags() {
        let e = parse_enriched("vendor=notes/vendor.md:risk, compliance").unwrap();
        assert_eq!(e.path, PathBuf::from("notes/vendor.md"));
        assert_eq!(e.tags, vec!["risk", "compliance"]);
    }

    #[test]
    fn windows_drive_is_not_a_tag() {
        let e = parse_enriched(r"scope=C:\docs\scope.md").unwrap();
        assert_eq!(e.path, PathBuf::from(r"C:\docs\scope.md"));
        assert!(e.tags.is_empty());
    }

    #[test]
    fn colon_in_file_name_is_not_a_tag() {
        let e = parse_enriched("notes=my:notes.md").unwrap();
        assert_eq!(e.path, PathBuf::from("my:notes.md"));
        assert!(e.tags.is_empty());
    }

    #[test]
    fn rejects_malformed() {
        assert!(parse_enriched("no-equals").is_err());
        assert!(parse_enriched("=path.md").is_err());
        assert!(parse_enriched("key=").is_err());
    }
}
